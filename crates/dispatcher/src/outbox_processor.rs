use std::sync::Arc;

use messagehub_core::{HubError, HubResult, OutboxConfig, OutboxMessage, OutboxStore};
use messagehub_infrastructure::{MetricsCollector, RequestTracer};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::hub::MessageHub;

/// 单次轮询的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxBatchStats {
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Outbox 后台处理器
///
/// 按固定间隔拉取未处理消息，解码后重新扇出给处理器并标记结果。单条消息
/// 失败只记录在该消息上；整轮失败（如存储不可用）只记录日志，下一轮继续。
/// 失败的消息在之后的每一轮都会重试，没有自动隔离。
pub struct OutboxProcessor {
    hub: Arc<MessageHub>,
    store: Arc<dyn OutboxStore>,
    config: OutboxConfig,
    metrics: MetricsCollector,
}

impl OutboxProcessor {
    /// 创建处理器，轮询间隔或批大小为 0 时返回 `Configuration`
    pub fn new(hub: Arc<MessageHub>, config: OutboxConfig) -> HubResult<Self> {
        config
            .validate()
            .map_err(|e| HubError::config_error(e.to_string()))?;

        let store = hub.outbox_store();
        Ok(Self {
            hub,
            store,
            config,
            metrics: MetricsCollector::new(),
        })
    }

    /// 处理一批消息
    pub async fn process_batch(&self) -> HubResult<OutboxBatchStats> {
        self.process_batch_with_cancel(&CancellationToken::new())
            .await
    }

    pub async fn process_batch_with_cancel(
        &self,
        shutdown: &CancellationToken,
    ) -> HubResult<OutboxBatchStats> {
        let messages = self.store.get_unprocessed(self.config.batch_size).await?;
        let mut stats = OutboxBatchStats {
            fetched: messages.len(),
            ..Default::default()
        };

        for message in &messages {
            if shutdown.is_cancelled() {
                debug!("收到关闭信号，剩余Outbox消息留待下次处理");
                break;
            }

            if self.process_message(message, shutdown).await {
                stats.processed += 1;
            } else {
                stats.failed += 1;
            }
        }

        self.metrics.record_outbox_processed(stats.processed as u64);
        self.metrics.record_outbox_failed(stats.failed as u64);
        if stats.fetched > 0 {
            info!(
                fetched = stats.fetched,
                processed = stats.processed,
                failed = stats.failed,
                "Outbox批处理完成"
            );
        }
        Ok(stats)
    }

    async fn process_message(&self, message: &OutboxMessage, shutdown: &CancellationToken) -> bool {
        let span = RequestTracer::outbox_span(
            &message.id.to_string(),
            &message.notification_type,
            message.attempts,
        );
        let redelivery = shutdown.child_token();

        match self
            .hub
            .redeliver(message, &redelivery)
            .instrument(span.clone())
            .await
        {
            Ok(report) => {
                if let Err(e) = self.store.mark_processed(message.id).await {
                    error!(message_id = %message.id, error = %e, "标记Outbox消息已处理失败");
                    return false;
                }
                debug!(
                    message_id = %message.id,
                    notification_type = %message.notification_type,
                    handlers = report.handlers,
                    handler_failures = report.failed,
                    "Outbox消息已投递"
                );
                true
            }
            Err(e) => {
                RequestTracer::record_error(&span, &e);
                warn!(
                    message_id = %message.id,
                    notification_type = %message.notification_type,
                    attempts = message.attempts + 1,
                    error = %e,
                    "Outbox消息投递失败"
                );
                if let Err(store_error) = self.store.mark_failed(message.id, &e.to_string()).await {
                    error!(message_id = %message.id, error = %store_error, "记录Outbox消息失败状态失败");
                }
                false
            }
        }
    }

    /// 轮询直到 `shutdown` 被取消
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            polling_interval_seconds = self.config.polling_interval_seconds,
            batch_size = self.config.batch_size,
            "Outbox processor started"
        );

        let mut ticker = interval(self.config.polling_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.process_batch_with_cancel(&shutdown).await {
                        error!(error = %e, "Outbox轮询失败，等待下次轮询");
                    }
                }
            }
        }

        info!("Outbox processor stopped");
    }

    /// 在 tokio 上派生轮询任务
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
