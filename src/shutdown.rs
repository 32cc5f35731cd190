use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 优雅关闭管理器
///
/// 持有根取消令牌，后台组件各自拿子令牌。根令牌取消后所有子令牌随之取消。
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅关闭信号，返回根令牌的子令牌
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// 触发关闭，重复调用无副作用
    pub fn shutdown(&self) {
        if self.token.is_cancelled() {
            debug!("关闭管理器已经触发过关闭");
            return;
        }
        info!("触发系统关闭");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 触发关闭并在 `grace` 时间内等待 `drain` 完成，返回是否按时完成
    pub async fn graceful_shutdown<F>(&self, grace: Duration, drain: F) -> bool
    where
        F: Future<Output = ()>,
    {
        self.shutdown();
        match timeout(grace, drain).await {
            Ok(()) => {
                info!("所有组件已停止");
                true
            }
            Err(_) => {
                warn!(grace_seconds = grace.as_secs(), "等待组件停止超时");
                false
            }
        }
    }
}
