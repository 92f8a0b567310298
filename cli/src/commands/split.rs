use std::io::{self, BufWriter, Write};

use anyhow::Context;
use reachr_common::config::Config;
use reachr_core::partition::split_to_prefix;

use crate::commands::SplitArgs;
use crate::terminal::{format, print};

/// Prints one sub-block per line on stdout.
pub fn split(args: SplitArgs, cfg: &Config) -> anyhow::Result<()> {
    let blocks = args.source.load()?;
    if blocks.is_empty() {
        print::nothing_to_do();
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut written: u64 = 0;
    for block in split_to_prefix(&blocks, args.prefix) {
        writeln!(out, "{block}").context("failed to write to stdout")?;
        written += 1;
    }
    out.flush().context("failed to write to stdout")?;

    if cfg.quiet == 0 {
        print::print_status(format!(
            "{} block(s) became {} sub-block(s) of at most /{}",
            blocks.len(),
            format::count(written),
            args.prefix
        ));
    }
    Ok(())
}
