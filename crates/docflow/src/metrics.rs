use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RUNS_STARTED_TOTAL: IntCounter = IntCounter::new(
        "docflow_runs_started_total",
        "Total number of workflow runs started."
    )
    .unwrap();
    pub static ref RUNS_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "docflow_runs_completed_total",
        "Total number of workflow runs that completed every step."
    )
    .unwrap();
    pub static ref RUNS_FAILED_TOTAL: IntCounter = IntCounter::new(
        "docflow_runs_failed_total",
        "Total number of workflow runs that failed."
    )
    .unwrap();
    pub static ref SCAN_TRIGGERS_TOTAL: IntCounter = IntCounter::new(
        "docflow_scan_triggers_total",
        "Total number of runs started by the background directory scan."
    )
    .unwrap();
}

/// Registers all counters with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> crate::Result<()> {
    let counters = [
        &*RUNS_STARTED_TOTAL,
        &*RUNS_COMPLETED_TOTAL,
        &*RUNS_FAILED_TOTAL,
        &*SCAN_TRIGGERS_TOTAL,
    ];
    for counter in counters {
        match REGISTRY.register(Box::new(counter.clone())) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => {
                return Err(crate::Error::Internal(format!(
                    "failed to register metric: {}",
                    e
                )))
            }
        }
    }
    Ok(())
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("metrics are not valid UTF-8: {}", e)))
}
