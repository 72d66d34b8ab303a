//! Notification sink that reports through tracing

use tracing::{error, info, warn};

use super::NotificationService;

/// Writes user notifications to the log under the `notification` target
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl NotificationService for TracingNotifier {
    fn error(&self, message: &str) {
        error!(target: "notification", "{}", message);
    }

    fn warning(&self, message: &str) {
        warn!(target: "notification", "{}", message);
    }

    fn success(&self, message: &str) {
        info!(target: "notification", "{}", message);
    }
}
