//! Concrete [`Prober`](reachr_common::Prober) implementations.

use std::time::Duration;

pub mod http;
pub mod https;
pub mod tcp;

pub use http::{HttpProber, StatusPolicy, check_proxy};
pub use https::HttpsProber;
pub use tcp::TcpConnectProber;

pub(crate) fn timed_out(timeout: Duration) -> String {
    format!("timed out after {:.1}s", timeout.as_secs_f64())
}
