use campus_core::workflows::enrollment::{Notification, Notifier, NotifyError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Records notifications in the log stream; delivery is handled by an external mailer.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            template = notification.template.label(),
            email = %notification.email,
            data = ?notification.data,
            "notification queued"
        );
        Ok(())
    }
}
