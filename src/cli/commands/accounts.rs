use anyhow::{Context, Result};
use clap::Args;

use crate::{
    cli::{
        commands::{collect::CatalogArgs, output::ReportOutputFormat},
        global::GlobalArgs,
    },
    config::Settings,
    engine::plan,
    environment::Environment,
    reporter::{styles::Styles, PlanReporter, Reportable},
    util::get_writer_for_file_or_stdout,
};

/// `cloud-inventory accounts` command and flags
#[derive(Args, Debug, Clone)]
pub struct AccountsArgs {
    /// Target environment
    #[arg(long, short = 'e', value_enum, ignore_case = true)]
    pub env: Environment,

    #[command(flatten)]
    pub source: CatalogArgs,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = ReportOutputFormat::Pretty)]
    pub format: ReportOutputFormat,
}

/// Show the filter's decision for every product. Needs no credentials.
pub fn run(global_args: &GlobalArgs, args: &AccountsArgs) -> Result<()> {
    let settings = Settings::load(args.source.config.as_deref()).context("Invalid settings")?;
    let policy = args.source.filter_policy.unwrap_or(settings.filter_policy);
    let catalog = args.source.load_catalog()?;
    let plan = plan(&catalog, args.env, policy);

    let reporter = PlanReporter {
        environment: args.env,
        policy,
        plan: &plan,
        styles: Styles::new(global_args.use_color(std::io::stdout())),
    };
    let writer = get_writer_for_file_or_stdout::<&std::path::Path>(None)?;
    reporter.report(args.format, writer)
}
