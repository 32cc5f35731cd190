use std::sync::Arc;

use chrono::Utc;
use messagehub_core::{HubError, HubResult, OutboxConfig, OutboxStore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::observability::MetricsCollector;

/// Outbox 清理服务
///
/// 定期删除超过保留时长的已处理消息，防止存储无限增长。未处理的消息
/// 永远不会被清理。
pub struct OutboxCleanupService {
    store: Arc<dyn OutboxStore>,
    config: OutboxConfig,
    metrics: MetricsCollector,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    cleanup_handle: Option<tokio::task::JoinHandle<()>>,
}

impl OutboxCleanupService {
    /// 创建清理服务，配置无效（如清理间隔为 0）时返回 `Configuration`
    pub fn new(store: Arc<dyn OutboxStore>, config: OutboxConfig) -> HubResult<Self> {
        config
            .validate()
            .map_err(|e| HubError::config_error(e.to_string()))?;

        Ok(Self {
            store,
            config,
            metrics: MetricsCollector::new(),
            shutdown_tx: None,
            cleanup_handle: None,
        })
    }

    /// 启动清理服务
    pub async fn start(&mut self) -> HubResult<()> {
        if !self.config.cleanup_enabled {
            info!("Outbox cleanup service is disabled");
            return Ok(());
        }
        if self.cleanup_handle.is_some() {
            warn!("Outbox cleanup service already running");
            return Ok(());
        }

        info!(
            interval_seconds = self.config.cleanup_interval_seconds,
            retention_hours = self.config.retention_hours,
            "Starting outbox cleanup service"
        );

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let store = self.store.clone();
        let config = self.config.clone();
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            let mut cleanup_interval = interval(config.cleanup_interval());
            cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cleanup_interval.tick() => {
                        if let Err(e) = Self::perform_cleanup(store.as_ref(), &config, &metrics).await {
                            error!(error = %e, "Outbox cleanup failed");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Outbox cleanup service shutdown requested");
                        break;
                    }
                }
            }
        });

        self.cleanup_handle = Some(handle);
        Ok(())
    }

    /// 停止清理服务
    pub async fn stop(&mut self) -> HubResult<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(handle) = self.cleanup_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Error waiting for outbox cleanup service to stop");
            }
        }

        info!("Outbox cleanup service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.cleanup_handle.is_some()
    }

    /// 执行一次清理
    pub async fn cleanup_once(&self) -> HubResult<CleanupStats> {
        Self::perform_cleanup(self.store.as_ref(), &self.config, &self.metrics).await
    }

    async fn perform_cleanup(
        store: &dyn OutboxStore,
        config: &OutboxConfig,
        metrics: &MetricsCollector,
    ) -> HubResult<CleanupStats> {
        let start_time = std::time::Instant::now();
        let cutoff = Utc::now() - config.retention();

        let deleted = store.delete_processed_older_than(cutoff).await?;
        metrics.record_outbox_cleanup(deleted);

        let stats = CleanupStats {
            deleted,
            duration: start_time.elapsed(),
        };
        info!(
            deleted = stats.deleted,
            duration_ms = stats.duration.as_millis() as u64,
            cutoff = %cutoff,
            "Outbox cleanup completed"
        );
        Ok(stats)
    }
}

/// 清理统计信息
#[derive(Debug, Default)]
pub struct CleanupStats {
    /// 删除的消息数
    pub deleted: u64,
    /// 清理耗时
    pub duration: std::time::Duration,
}

impl CleanupStats {
    /// 是否有清理操作
    pub fn has_cleanup(&self) -> bool {
        self.deleted > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::InMemoryOutboxStore;
    use messagehub_core::OutboxMessage;

    async fn store_with_processed(count: usize) -> Arc<InMemoryOutboxStore> {
        let store = Arc::new(InMemoryOutboxStore::new());
        for _ in 0..count {
            let message = OutboxMessage::new("Cleaned", "{}");
            let id = message.id;
            store.save(message).await.unwrap();
            store.mark_processed(id).await.unwrap();
        }
        store.save(OutboxMessage::new("Pending", "{}")).await.unwrap();
        // 保证处理时间严格早于清理时刻
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
    }

    #[tokio::test]
    async fn test_cleanup_once_respects_retention() {
        let store = store_with_processed(3).await;

        let keep = OutboxCleanupService::new(store.clone(), OutboxConfig::default()).unwrap();
        let stats = keep.cleanup_once().await.unwrap();
        assert!(!stats.has_cleanup());
        assert_eq!(store.len().await, 4);

        let config = OutboxConfig {
            retention_hours: 0,
            ..OutboxConfig::default()
        };
        let sweep = OutboxCleanupService::new(store.clone(), config).unwrap();
        assert_eq!(sweep.cleanup_once().await.unwrap().deleted, 3);
        assert_eq!(sweep.cleanup_once().await.unwrap().deleted, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let store = store_with_processed(1).await;
        let config = OutboxConfig {
            retention_hours: 0,
            ..OutboxConfig::default()
        };
        let mut service = OutboxCleanupService::new(store.clone(), config).unwrap();

        service.start().await.unwrap();
        assert!(service.is_running());

        // 第一次 tick 立即触发
        for _ in 0..50 {
            if store.len().await == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.len().await, 1);

        service.stop().await.unwrap();
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_start() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let config = OutboxConfig {
            cleanup_enabled: false,
            ..OutboxConfig::default()
        };
        let mut service = OutboxCleanupService::new(store, config).unwrap();
        service.start().await.unwrap();
        assert!(!service.is_running());
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let config = OutboxConfig {
            cleanup_interval_seconds: 0,
            ..OutboxConfig::default()
        };

        let err = OutboxCleanupService::new(store, config).err().unwrap();
        assert_eq!(err.kind(), "configuration");
    }
}
