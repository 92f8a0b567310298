mod commands;
mod terminal;

use commands::{CommandLine, Commands, partition, probe, split};
use reachr_common::config::Config;
use terminal::print;

use crate::terminal::spinner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    spinner::init_logging();

    let cfg = Config {
        no_banner: commands.no_banner,
        quiet: commands.quiet,
    };
    print::banner(cfg.no_banner, cfg.quiet);

    match commands.command {
        Commands::Partition(args) => {
            print::header("partitioning address space", cfg.quiet);
            partition::partition(args, &cfg)
        }
        Commands::Split(args) => {
            print::header("splitting blocks", cfg.quiet);
            split::split(args, &cfg)
        }
        Commands::Probe(args) => {
            print::header("getting ready to probe", cfg.quiet);
            probe::probe(args, &cfg).await
        }
    }
}
