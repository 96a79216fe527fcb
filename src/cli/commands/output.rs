use std::path::PathBuf;

use clap::{Args, ValueEnum, ValueHint};
use strum::Display;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, ValueEnum, Default)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportOutputFormat {
    /// Human-readable summary
    #[default]
    Pretty,
    /// The whole report as one JSON document
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Format of the report written to stdout
    #[arg(long, short = 'f', value_enum, default_value_t = ReportOutputFormat::Pretty)]
    pub format: ReportOutputFormat,

    /// Also write the full JSON report to this file
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub json_out: Option<PathBuf>,

    /// Write one `{product}_{kind}.json` file per product into this directory
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,
}
