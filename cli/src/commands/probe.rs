use std::sync::Arc;

use anyhow::Context;
use colored::*;
use reachr_common::config::Config;
use reachr_common::{CidrBlock, ConfigError, Prober};
use reachr_core::engine::{EngineSettings, RunControl};
use reachr_core::network::http::DEFAULT_HTTP_PORT;
use reachr_core::network::https::DEFAULT_HTTPS_PORT;
use reachr_core::network::tcp::DEFAULT_TCP_PORT;
use reachr_core::network::{HttpProber, HttpsProber, StatusPolicy, TcpConnectProber, check_proxy};
use reachr_core::partition::Assignment;
use reachr_core::runner::{JobRunner, ProbeJob, RunSummary, RunnerOptions};
use reachr_core::sink::{OutputPaths, SinkOptions, WriteMode};
use tracing::{info, warn};

use crate::commands::{Method, ProbeArgs};
use crate::mprint;
use crate::terminal::{colors, format, network_fmt, print, spinner};

const KEY_WIDTH: usize = 11;

pub async fn probe(args: ProbeArgs, cfg: &Config) -> anyhow::Result<()> {
    let blocks = load_blocks(&args)?;
    if blocks.is_empty() {
        return Err(ConfigError::EmptyInput.into());
    }
    let job = ProbeJob::new(blocks).with_limit(args.limit.0);

    let prober = build_prober(&args);

    if let Some(proxy) = &args.proxy {
        if args.skip_proxy_check {
            warn!("Skipping the proxy check for {proxy}");
        } else {
            let status = check_proxy(proxy, &args.proxy_check_url, args.timeout).await?;
            info!("Proxy {proxy} answered HTTP {status} for {}", args.proxy_check_url);
        }
    }

    let outputs = OutputPaths {
        reachable: args.out_dir.join(&args.reachable),
        unreachable: args.out_dir.join(&args.unreachable),
        diagnostics: args.out_dir.join(&args.diagnostics),
    };
    let options = RunnerOptions {
        engine: EngineSettings {
            concurrency: args.concurrency,
            timeout: args.timeout,
            proxy: args.proxy.clone(),
        },
        outputs: outputs.clone(),
        sink: SinkOptions {
            mode: if args.resume { WriteMode::Append } else { WriteMode::Truncate },
            sync: args.fsync,
        },
        progress_interval: args.interval,
        deadline: args.deadline,
    };
    let runner = JobRunner::new(prober, options)?;

    print_settings(&args, &job, cfg);
    print::header("probing", cfg.quiet);

    let control = RunControl::new();
    let interrupt = {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; abandoning in-flight probes");
                control.abort();
            }
        })
    };

    let span = spinner::probe_bar(job.planned());
    let guard = span.enter();
    let bar = span.clone();
    let q_level = cfg.quiet;

    let outcome = runner
        .run(&job, &control, move |report| spinner::report_probe_progress(&bar, report, q_level))
        .await;

    drop(guard);
    drop(span);
    interrupt.abort();

    let summary = outcome?;
    print_summary(&summary, &outputs, cfg);

    if summary.aborted {
        anyhow::bail!(
            "run interrupted after {} of {} probes; rerun with --resume to continue",
            summary.counters.attempted,
            summary.total
        );
    }
    Ok(())
}

fn load_blocks(args: &ProbeArgs) -> anyhow::Result<Vec<CidrBlock>> {
    let (Some(path), Some(job)) = (&args.assignment, args.job) else {
        return args.source.load();
    };

    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let assignment = Assignment::from_json(&text).with_context(|| format!("in {}", path.display()))?;
    info!("Probing job {job} of {} from {}", assignment.jobs(), path.display());
    Ok(assignment.job(job)?)
}

fn target_port(args: &ProbeArgs) -> u16 {
    args.port.unwrap_or(match args.method {
        Method::Http => DEFAULT_HTTP_PORT,
        Method::Https => DEFAULT_HTTPS_PORT,
        Method::Tcp => DEFAULT_TCP_PORT,
    })
}

fn build_prober(args: &ProbeArgs) -> Arc<dyn Prober> {
    let port = target_port(args);
    let policy = if args.strict_status {
        StatusPolicy::Exact200
    } else {
        StatusPolicy::AnyResponse
    };

    match args.method {
        Method::Http => Arc::new(HttpProber::new().with_port(port).with_policy(policy)),
        Method::Https => Arc::new(HttpsProber::new().with_port(port).with_policy(policy)),
        Method::Tcp => {
            if args.strict_status {
                warn!("--strict-status has no effect with --method tcp");
            }
            Arc::new(TcpConnectProber::new(port))
        }
    }
}

fn print_settings(args: &ProbeArgs, job: &ProbeJob, cfg: &Config) {
    if cfg.quiet > 0 {
        return;
    }
    print::header("run settings", cfg.quiet);

    print::aligned_line("Blocks", network_fmt::block_span(job.blocks()), KEY_WIDTH);
    print::aligned_line("Targets", format::count(job.planned()), KEY_WIDTH);
    print::aligned_line("Method", format!("{} :{}", args.method.name(), target_port(args)), KEY_WIDTH);
    print::aligned_line("Concurrency", args.concurrency.to_string(), KEY_WIDTH);
    print::aligned_line("Timeout", format::duration(args.timeout), KEY_WIDTH);
    match &args.proxy {
        Some(proxy) => print::aligned_line("Proxy", proxy.to_string(), KEY_WIDTH),
        None => print::aligned_line("Proxy", "direct".dimmed(), KEY_WIDTH),
    }
    if let Some(deadline) = args.deadline {
        print::aligned_line("Deadline", format::duration(deadline), KEY_WIDTH);
    }
    if args.resume {
        print::aligned_line("Resume", "yes".color(colors::ACCENT), KEY_WIDTH);
    }
}

fn print_summary(summary: &RunSummary, outputs: &OutputPaths, cfg: &Config) {
    let c = summary.counters;
    let throughput = if summary.elapsed.as_secs_f64() > 0.0 {
        c.attempted as f64 / summary.elapsed.as_secs_f64()
    } else {
        0.0
    };

    let status: ColoredString = if summary.aborted {
        "interrupted".red().bold()
    } else if summary.deadline_reached {
        "deadline reached".yellow().bold()
    } else {
        "complete".green().bold()
    };

    if cfg.quiet > 0 {
        mprint!();
        info!(
            "Probe {status}: {} probed, {} reachable, {} unreachable ({}) in {}",
            format::count(c.attempted),
            format::count(c.succeeded),
            format::count(c.failed),
            format::percent(summary.success_rate()),
            format::duration(summary.elapsed)
        );
        return;
    }

    print::header("results", cfg.quiet);
    print::aligned_line("Status", status.clone(), KEY_WIDTH);
    print::aligned_line(
        "Probed",
        format!("{} of {}", format::count(c.attempted), format::count(summary.total)),
        KEY_WIDTH,
    );
    if summary.skipped > 0 {
        print::aligned_line("Skipped", format::count(summary.skipped), KEY_WIDTH);
    }
    print::aligned_line("Reachable", format::count(c.succeeded).color(colors::REACHABLE), KEY_WIDTH);
    print::aligned_line("Unreachable", format::count(c.failed).color(colors::UNREACHABLE), KEY_WIDTH);
    print::aligned_line("Rate", format::percent(summary.success_rate()), KEY_WIDTH);
    print::aligned_line("Throughput", format::rate(throughput), KEY_WIDTH);

    mprint!();
    print::tree_head(0, "samples");
    print::as_tree_one_level(&[
        (
            String::from("reachable"),
            network_fmt::sample_line(&summary.reachable_sample, colors::REACHABLE),
        ),
        (
            String::from("unreachable"),
            network_fmt::sample_line(&summary.unreachable_sample, colors::UNREACHABLE),
        ),
    ]);
    print::tree_head(1, "files");
    print::as_tree_one_level(&[
        (String::from("reachable"), outputs.reachable.display().to_string().normal()),
        (String::from("unreachable"), outputs.unreachable.display().to_string().normal()),
        (String::from("diagnostics"), outputs.diagnostics.display().to_string().normal()),
    ]);

    print::fat_separator();
    print::centerln(&format!(
        "Probe {status}: {} reachable of {} in {}",
        format::count(c.succeeded).green().bold(),
        format::count(c.attempted).bold(),
        format::duration(summary.elapsed).yellow().bold()
    ));
    print::end_of_program();
}
