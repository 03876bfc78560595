use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "berth",
    version,
    about = "A terminal console for containers and images."
)]
pub struct CliArgs {
    /// Seconds between background list refreshes
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// Docker daemon socket to connect to (passed as -H)
    #[arg(long)]
    pub docker_host: Option<String>,

    /// docker client binary
    #[arg(long)]
    pub docker_bin: Option<String>,

    /// Config file (defaults to $BERTH_CONFIG, ./berth.yaml, ~/.config/berth/config.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
