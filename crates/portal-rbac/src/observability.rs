//! Observability wiring for hosts of the policy engine.
//!
//! # Purpose
//! Initializes tracing and the Prometheus metrics recorder that the store,
//! seeder and evaluator report into. The host application renders the returned
//! handle wherever it exposes metrics.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
        tracing::debug!(service = service_name, "observability initialized");
    });

    install_metrics_recorder()
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            // A host that already installed its own recorder keeps it; this
            // handle then renders an empty registry.
            if let Err(err) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %err, "metrics recorder already installed");
            }
            handle
        })
        .clone()
}
