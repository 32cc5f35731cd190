use serde::{Deserialize, Serialize};

/// 消息中介的全局开关
///
/// `ExceptionHandling` 与 `Validation` 两个行为始终启用，不受这里的开关影响。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubOptions {
    pub caching_enabled: bool,
    pub retry_enabled: bool,
    pub timeout_enabled: bool,
    pub outbox_enabled: bool,
    pub telemetry_enabled: bool,
    pub dead_letter_queue_enabled: bool,
    pub publish_parallel_by_default: bool,
}

impl HubOptions {
    pub fn enable_caching(mut self) -> Self {
        self.caching_enabled = true;
        self
    }

    pub fn enable_retry(mut self) -> Self {
        self.retry_enabled = true;
        self
    }

    pub fn enable_timeout(mut self) -> Self {
        self.timeout_enabled = true;
        self
    }

    pub fn enable_outbox(mut self) -> Self {
        self.outbox_enabled = true;
        self
    }

    pub fn enable_telemetry(mut self) -> Self {
        self.telemetry_enabled = true;
        self
    }

    pub fn enable_dead_letter_queue(mut self) -> Self {
        self.dead_letter_queue_enabled = true;
        self
    }

    pub fn publish_parallel(mut self) -> Self {
        self.publish_parallel_by_default = true;
        self
    }
}
