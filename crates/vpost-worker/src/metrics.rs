//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use vpost_models::{EncoderTier, ExecutionMode};

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vpost_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vpost_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vpost_jobs_failed_total";
    pub const JOBS_REVOKED_TOTAL: &str = "vpost_jobs_revoked_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "vpost_jobs_dead_lettered_total";
}

/// Start the HTTP listener serving `/metrics`.
pub fn install_exporter(addr: &str) -> WorkerResult<()> {
    let socket: SocketAddr = addr
        .parse()
        .map_err(|e| WorkerError::config_error(format!("invalid METRICS_ADDR {addr}: {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {e}")))?;

    info!(addr = %socket, "Prometheus exporter listening");
    Ok(())
}

pub fn record_submitted(mode: ExecutionMode) {
    counter!(names::JOBS_SUBMITTED_TOTAL, "mode" => mode.as_str()).increment(1);
}

pub fn record_completed(tier: EncoderTier) {
    counter!(names::JOBS_COMPLETED_TOTAL, "tier" => tier.as_str()).increment(1);
}

pub fn record_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_revoked() {
    counter!(names::JOBS_REVOKED_TOTAL).increment(1);
}

pub fn record_dead_lettered() {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_addr_rejected() {
        assert!(matches!(
            install_exporter("not-an-addr"),
            Err(WorkerError::ConfigError(_))
        ));
    }
}
