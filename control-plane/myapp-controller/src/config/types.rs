use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct ControllerConfig {
    /// Restrict watches to a single namespace; all namespaces when unset.
    /// Env: MYAPP_WATCH_NAMESPACE
    #[envconfig(from = "MYAPP_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Field manager recorded on every create/replace.
    #[envconfig(from = "MYAPP_FIELD_MANAGER", default = "myapp-controller")]
    pub field_manager: String,

    /// Max parallel reconciles across different keys (0 = unbounded).
    #[envconfig(from = "MYAPP_CONCURRENCY", default = "0")]
    pub concurrency: u16,

    #[envconfig(from = "MYAPP_ERROR_REQUEUE_SECS", default = "30")]
    pub error_requeue_secs: u64,

    /// Periodic resync after a successful reconcile (0 = watch events only).
    /// Env: MYAPP_RESYNC_SECS
    #[envconfig(from = "MYAPP_RESYNC_SECS", default = "600")]
    pub resync_secs: u64,
}

impl ControllerConfig {
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs.max(1))
    }

    pub fn resync(&self) -> Option<Duration> {
        (self.resync_secs > 0).then(|| Duration::from_secs(self.resync_secs))
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            field_manager: "myapp-controller".to_string(),
            concurrency: 0,
            error_requeue_secs: 30,
            resync_secs: 600,
        }
    }
}
