use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::HubResult;

use super::message::{Notification, Request};

/// 请求处理器，每个请求类型恰好注册一个
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, cancel: &CancellationToken) -> HubResult<R::Response>;
}

/// 通知处理器，每个通知类型可以注册任意多个
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    async fn handle(&self, notification: &N, cancel: &CancellationToken) -> HubResult<()>;

    /// 写入死信记录和日志的处理器名称
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
