pub mod partition;
pub mod probe;
pub mod split;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use reachr_common::network::cidr;
use reachr_common::{CidrBlock, ConfigError, ProxyEndpoint};

#[derive(Parser)]
#[command(name = "reachr", version)]
#[command(about = "Partition IPv4 space into balanced jobs and probe it for reachability.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Less decoration; repeat for less
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Do not print the start banner
    #[arg(long, global = true)]
    pub no_banner: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split CIDR blocks into balanced jobs
    #[command(alias = "p")]
    Partition(PartitionArgs),
    /// Break CIDR blocks into every sub-block of one prefix length
    #[command(alias = "s")]
    Split(SplitArgs),
    /// Probe the addresses of one job
    #[command(alias = "r")]
    Probe(ProbeArgs),
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// CIDR blocks given inline and/or in a newline-delimited file.
#[derive(Args, Debug, Clone)]
pub struct BlockSource {
    /// CIDR blocks, e.g. 104.16.0.0/13
    pub cidrs: Vec<String>,

    /// File with one CIDR per line ('-' for stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

impl BlockSource {
    pub fn load(&self) -> anyhow::Result<Vec<CidrBlock>> {
        let mut blocks: Vec<CidrBlock> = self
            .cidrs
            .iter()
            .map(|c| c.parse::<CidrBlock>())
            .collect::<Result<_, _>>()?;

        if let Some(path) = &self.input {
            let text = read_input(path)?;
            blocks.extend(cidr::parse_list(&text).with_context(|| format!("in {}", path.display()))?);
        }

        Ok(blocks)
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read CIDR list from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    #[command(flatten)]
    pub source: BlockSource,

    /// Number of jobs to produce
    #[arg(short, long)]
    pub jobs: usize,

    /// Never split a block finer than this prefix length
    #[arg(long, default_value_t = 32)]
    pub floor_prefix: u8,

    /// Allowed max-min load spread, as a fraction of the per-job target
    #[arg(long, default_value_t = 0.05)]
    pub tolerance: f64,

    /// Cap on rebalancing moves
    #[arg(long, default_value_t = 10_000)]
    pub max_rebalance: usize,

    /// Write the JSON assignment here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub source: BlockSource,

    /// Prefix length of the produced blocks
    #[arg(short, long)]
    pub prefix: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HTTP GET, any status counts unless --strict-status
    Http,
    /// HTTP GET over TLS, certificates not verified
    Https,
    /// Plain TCP handshake
    Tcp,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Http => "http",
            Method::Https => "https",
            Method::Tcp => "tcp",
        }
    }
}

/// `all` or a positive address count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub Option<u64>);

impl FromStr for Limit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Limit(None));
        }
        match s.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Limit(Some(n))),
            _ => Err(ConfigError::InvalidLimit(s.to_string())),
        }
    }
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{s}' is not a valid duration"))
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: BlockSource,

    /// Assignment file written by `reachr partition`
    #[arg(short, long, requires = "job", conflicts_with_all = ["cidrs", "input"])]
    pub assignment: Option<PathBuf>,

    /// Job index inside the assignment, starting at 0
    #[arg(long, requires = "assignment")]
    pub job: Option<usize>,

    /// Probes in flight at once
    #[arg(short, long, default_value_t = 50)]
    pub concurrency: usize,

    /// Per-probe timeout in seconds
    #[arg(short, long, default_value = "3", value_parser = parse_secs)]
    pub timeout: Duration,

    /// HTTP forward proxy, http://[user:pass@]host:port
    #[arg(long, env = "REACHR_PROXY", hide_env_values = true)]
    pub proxy: Option<ProxyEndpoint>,

    /// URL fetched through the proxy before probing
    #[arg(long, default_value = "http://www.cloudflare.com/")]
    pub proxy_check_url: url::Url,

    /// Do not test the proxy before probing
    #[arg(long)]
    pub skip_proxy_check: bool,

    /// Probe only the first N addresses, or 'all'
    #[arg(short, long, default_value = "all")]
    pub limit: Limit,

    /// Seconds between progress reports
    #[arg(long, default_value = "5", value_parser = parse_secs)]
    pub interval: Duration,

    #[arg(short, long, value_enum, default_value_t = Method::Http)]
    pub method: Method,

    /// Target port (default 80 for http, 443 for https and tcp)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Only HTTP 200 counts as reachable
    #[arg(long)]
    pub strict_status: bool,

    /// Directory for the output files
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "unblocked.txt")]
    pub reachable: PathBuf,

    #[arg(long, default_value = "blocked.txt")]
    pub unreachable: PathBuf,

    #[arg(long, default_value = "errors.log")]
    pub diagnostics: PathBuf,

    /// Append to existing output and skip addresses already recorded
    #[arg(long)]
    pub resume: bool,

    /// fsync every record, not just flush it
    #[arg(long)]
    pub fsync: bool,

    /// Stop starting new probes after this many seconds
    #[arg(long, value_parser = parse_secs)]
    pub deadline: Option<Duration>,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
