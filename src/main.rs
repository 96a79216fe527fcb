use anyhow::{Context, Result};
use cloud_inventory::cli::{
    commands::{accounts, collect},
    global::Command,
    CommandLineArgs, GlobalArgs,
};
use tokio::runtime::Builder;
use tracing::debug;
use tracing_core::metadata::LevelFilter;
use tracing_subscriber::{
    self, fmt, prelude::__tracing_subscriber_SubscriberExt, registry, util::SubscriberInitExt,
};

fn main() -> Result<()> {
    color_backtrace::install();
    let args = CommandLineArgs::parse_args();
    setup_logging(&args.global_args);

    let worker_threads = num_cpus::get().clamp(2, 8);
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    debug!("Started runtime with {worker_threads} worker threads");

    let code = runtime.block_on(async_main(args))?;
    drop(runtime);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn setup_logging(global_args: &GlobalArgs) {
    let level = LevelFilter::from_level(global_args.log_level());
    // `-vvv` also shows the AWS SDK's own logs
    let filter = if !global_args.quiet && global_args.verbose > 2 {
        tracing_subscriber::filter::Targets::new().with_default(LevelFilter::TRACE)
    } else {
        tracing_subscriber::filter::Targets::new()
            .with_default(LevelFilter::ERROR)
            .with_target("cloud_inventory", level)
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .without_time();
    registry().with(fmt_layer).with(filter).init();
}

async fn async_main(args: CommandLineArgs) -> Result<i32> {
    match &args.command {
        Command::Collect(collect_args) => collect::run(&args.global_args, collect_args).await,
        Command::Accounts(accounts_args) => {
            accounts::run(&args.global_args, accounts_args)?;
            Ok(0)
        }
    }
}
