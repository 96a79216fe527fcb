use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::{
    catalog::Catalog,
    cli::{commands::output::OutputArgs, global::GlobalArgs},
    collector::ResourceKind,
    config::{Overrides, Settings},
    engine::{planned_accounts, RunContext},
    environment::Environment,
    filter::FilterPolicy,
    reporter,
    util::Counted,
};

/// Exit status when the environment's management credential was unavailable.
pub const EXIT_ENVIRONMENT_FAILURE: i32 = 2;

/// Where the account catalog and settings come from. Shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Account catalog: `{ product: { accountId: displayName } }`
    #[arg(long, default_value = "account_lists.json", value_hint = ValueHint::FilePath)]
    pub catalog: PathBuf,

    /// YAML settings file (management roles, role name, limits)
    #[arg(long, env = "CLOUD_INVENTORY_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// How display-name markers are read for accounts without an explicit environment
    #[arg(long, value_enum)]
    pub filter_policy: Option<FilterPolicy>,
}

impl CatalogArgs {
    pub fn load_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::load(&self.catalog)?;
        info!(
            "Loaded {} in {} from {}",
            Counted::regular(catalog.account_count(), "account"),
            Counted::regular(catalog.products().len(), "product"),
            self.catalog.display()
        );
        Ok(catalog)
    }
}

/// Flags that override the settings file for one run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Region the collectors query
    #[arg(long, short = 'r')]
    pub region: Option<String>,

    /// Read-only role assumed inside every account
    #[arg(long)]
    pub role_name: Option<String>,

    /// Maximum number of accounts collected at once
    #[arg(long, short = 'j')]
    pub max_concurrency: Option<usize>,

    /// Per-call timeout in seconds for credential minting and collection
    #[arg(long, value_name = "SECS")]
    pub call_timeout: Option<u64>,

    /// Give up on unfinished accounts after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// AWS profile for the root identity
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,
}

/// `cloud-inventory collect` command and flags
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Resource kind to collect
    #[arg(value_enum)]
    pub kind: ResourceKind,

    /// Target environment
    #[arg(long, short = 'e', value_enum, ignore_case = true)]
    pub env: Environment,

    #[command(flatten)]
    pub source: CatalogArgs,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

impl CollectArgs {
    pub fn settings(&self) -> Result<Settings> {
        let settings = Settings::load(self.source.config.as_deref())?.apply(Overrides {
            region: self.run.region.clone(),
            read_only_role: self.run.role_name.clone(),
            max_concurrency: self.run.max_concurrency,
            call_timeout_secs: self.run.call_timeout,
            deadline_secs: self.run.deadline,
            filter_policy: self.source.filter_policy,
            profile: self.run.profile.clone(),
        });
        settings.validate()?;
        Ok(settings)
    }
}

/// Run a collection and render it. Returns the process exit status.
pub async fn run(global_args: &GlobalArgs, args: &CollectArgs) -> Result<i32> {
    let settings = args.settings().context("Invalid settings")?;
    let catalog = args.source.load_catalog()?;
    let context = RunContext::aws(&settings, args.kind).await;
    run_with_context(global_args, args, &catalog, &context).await
}

/// Everything after the context is built; split out so tests can supply fakes.
pub async fn run_with_context(
    global_args: &GlobalArgs,
    args: &CollectArgs,
    catalog: &Catalog,
    context: &RunContext,
) -> Result<i32> {
    let started = Instant::now();
    let plan = context.plan(catalog, args.env);
    let total = planned_accounts(&plan);
    info!("Collecting {} from {} in {}", args.kind, Counted::regular(total, "account"), args.env);

    let progress = if global_args.use_progress() && total > 0 {
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:40.green/blue}] {pos}/{len} [{elapsed_precise}]",
        )?
        .progress_chars("=>-");
        let pb = ProgressBar::new(total as u64)
            .with_style(style)
            .with_message(format!("Collecting {}", args.kind));
        pb.enable_steady_tick(Duration::from_millis(500));
        pb
    } else {
        ProgressBar::hidden()
    };

    let report = context
        .run(args.env, plan, |product, account, _| {
            progress.set_message(format!("{product}: {}", account.name));
            progress.inc(1);
        })
        .await;
    context.close();
    progress.finish_and_clear();

    reporter::run(global_args, &report, &args.output_args, Some(started.elapsed()))?;

    if report.has_environment_failure() {
        error!("Management credential for {} could not be obtained", args.env);
        return Ok(EXIT_ENVIRONMENT_FAILURE);
    }
    Ok(0)
}
