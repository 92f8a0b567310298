use colored::*;
use indicatif::ProgressStyle;
use reachr_core::progress::ProgressReport;
use tracing::{Span, info, info_span};
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::terminal::{format, logging::ReachrFormatter};

const TICK_STRINGS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

/// Installs the global subscriber. Log lines are routed through the
/// indicatif layer so they print above any live progress bar.
pub fn init_logging() {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .event_format(ReachrFormatter)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .init();
}

/// A span that renders as the probe progress bar while entered.
pub fn probe_bar(total: u64) -> Span {
    let style = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] {wide_bar:.green/black} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .tick_strings(TICK_STRINGS)
    .progress_chars("━╸ ");

    let span = info_span!("probe", indicatif.pb_show = true);
    span.pb_set_style(&style);
    span.pb_set_length(total);
    span
}

/// Progress callback: moves the bar and, unless quiet, logs a status line.
pub fn report_probe_progress(span: &Span, report: &ProgressReport, q_level: u8) {
    span.pb_set_position(report.snapshot.attempted);
    span.pb_set_message(&format!(
        "{} reachable, ETA {}",
        format::percent(report.success_rate),
        format::eta(report.eta)
    ));

    if q_level > 0 {
        return;
    }

    info!(
        "{}/{} probed | {} reachable | {} | ETA {}",
        format::count(report.snapshot.attempted).bold(),
        format::count(report.total),
        format::percent(report.success_rate).green(),
        format::rate(report.throughput),
        format::eta(report.eta).yellow()
    );
}
