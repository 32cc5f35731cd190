use std::sync::Arc;

use anyhow::{Context, Result};
use messagehub_core::{HubConfig, HubError};
use messagehub_dispatcher::{MessageHub, OutboxProcessor};
use messagehub_infrastructure::OutboxCleanupService;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::features::{
    CreateUserCommand, CreateUserHandler, GetProductsHandler, GetProductsQuery, GetUserHandler,
    GetUserQuery, LoggingBehavior, SendWelcomeEmailHandler, SlowQuery, SlowQueryHandler,
    UpdateUserStatisticsHandler, UserCreatedNotification, UserDirectory, UserStatistics,
};

/// 主应用程序
///
/// 组装带示例功能的消息中介，并托管 Outbox 处理器和清理服务。
pub struct Application {
    config: HubConfig,
    hub: Arc<MessageHub>,
    statistics: UserStatistics,
    products: GetProductsHandler,
}

impl Application {
    pub async fn new(config: HubConfig) -> Result<Self> {
        info!(options = ?config.hub, "初始化消息中介");

        let directory = UserDirectory::with_seed_users().await;
        let statistics = UserStatistics::default();
        let products = GetProductsHandler::new();

        let hub = MessageHub::builder()
            .with_config(&config)
            .register_request_handler::<CreateUserCommand, _>(CreateUserHandler::new(
                directory.clone(),
            ))
            .register_request_handler::<GetUserQuery, _>(GetUserHandler::new(directory))
            .register_request_handler::<GetProductsQuery, _>(products.clone())
            .register_request_handler::<SlowQuery, _>(SlowQueryHandler)
            .register_notification_handler::<UserCreatedNotification, _>(SendWelcomeEmailHandler)
            .register_notification_handler::<UserCreatedNotification, _>(
                UpdateUserStatisticsHandler::new(statistics.clone()),
            )
            .add_behavior(LoggingBehavior)
            .build()
            .context("构建消息中介失败")?;

        info!(
            request_handlers = hub.registry().request_handler_count(),
            notification_handlers = hub.registry().notification_handler_count(),
            "消息中介已就绪"
        );

        Ok(Self {
            config,
            hub: Arc::new(hub),
            statistics,
            products,
        })
    }

    pub fn hub(&self) -> &Arc<MessageHub> {
        &self.hub
    }

    pub fn statistics(&self) -> &UserStatistics {
        &self.statistics
    }

    /// 运行后台组件直到 `shutdown` 被取消
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let (processor, mut cleanup) = if self.config.hub.outbox_enabled {
            let processor = OutboxProcessor::new(self.hub.clone(), self.config.outbox.clone())
                .context("创建Outbox处理器失败")?;
            let cleanup =
                OutboxCleanupService::new(self.hub.outbox_store(), self.config.outbox.clone())
                    .context("创建Outbox清理服务失败")?;
            (Some(processor), Some(cleanup))
        } else {
            info!("Outbox未启用，跳过后台处理器");
            (None, None)
        };

        let processor_handle = processor.map(|p| p.start(shutdown.child_token()));
        if let Some(cleanup) = cleanup.as_mut() {
            cleanup.start().await.context("启动Outbox清理服务失败")?;
        }

        shutdown.cancelled().await;
        info!("停止后台组件");

        if let Some(mut cleanup) = cleanup {
            if let Err(e) = cleanup.stop().await {
                warn!(error = %e, "停止Outbox清理服务失败");
            }
        }
        if let Some(handle) = processor_handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Outbox处理器任务异常退出");
            }
        }
        Ok(())
    }

    /// 依次演示请求、通知、缓存和超时
    pub async fn run_demo(&self) -> Result<()> {
        let user = self
            .hub
            .send(CreateUserCommand {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            })
            .await
            .context("创建用户失败")?;
        info!(user_id = user.id, "示例用户已创建");

        self.hub
            .publish(UserCreatedNotification::from(&user))
            .await
            .context("发布用户创建通知失败")?;
        self.hub
            .publish_parallel(UserCreatedNotification::from(&user))
            .await
            .context("并行发布用户创建通知失败")?;

        match self
            .hub
            .send(CreateUserCommand {
                name: "x".to_string(),
                email: "not-an-email".to_string(),
            })
            .await
        {
            Err(HubError::Validation { field, rule, .. }) => {
                info!(%field, %rule, "非法命令被校验拒绝");
            }
            other => warn!(result = ?other.map(|u| u.id), "非法命令未被拒绝"),
        }

        let fetched = self.hub.send(GetUserQuery { id: user.id }).await?;
        info!(user_id = fetched.id, name = %fetched.name, "查询用户");

        for _ in 0..2 {
            let products = self.hub.send(GetProductsQuery::default()).await?;
            info!(count = products.len(), "查询商品");
        }
        info!(
            handler_executions = self.products.executions(),
            "商品查询处理器执行次数"
        );

        match self.hub.send(SlowQuery { delay_ms: 3000 }).await {
            Ok(result) => info!(%result, "慢查询完成"),
            Err(e) => info!(error = %e, kind = e.kind(), "慢查询失败"),
        }

        let dead_letters = self.hub.dead_letter_queue().count().await?;
        info!(
            users_created = self.statistics.created(),
            dead_letters, "示例流程结束"
        );
        Ok(())
    }
}
