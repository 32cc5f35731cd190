use std::any::{type_name, TypeId};
use std::sync::Arc;

use futures::future::join_all;
use messagehub_core::{
    short_type_name, AnyNotification, CacheStore, DeadLetterQueue, HubConfig, HubError,
    HubOptions, HubResult, Notification, NotificationHandler, OutboxMessage, OutboxStore,
    Request, RequestHandler, RequestMetadata, RetryConfig, TimeoutConfig,
};
use messagehub_infrastructure::{
    InMemoryCacheStore, InMemoryDeadLetterQueue, InMemoryOutboxStore, MetricsCollector,
    OutboxWriter, RequestTracer,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::behaviors::{
    CacheBehavior, ExceptionHandlingBehavior, RetryBehavior, TelemetryBehavior, TimeoutBehavior,
    ValidationBehavior,
};
use crate::pipeline::{Next, PipelineBehavior, RequestContext};
use crate::registry::{ErasedNotificationHandler, HandlerRegistry};

/// 一次通知扇出的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub handlers: usize,
    pub failed: usize,
}

/// 进程内消息中介
///
/// `send` 把请求交给唯一的处理器并经过行为管道；`publish` 与
/// `publish_parallel` 把通知扇出给所有处理器，单个处理器失败会被隔离并
/// 写入死信队列，不会影响其他处理器，也不会返回给调用方。
pub struct MessageHub {
    registry: HandlerRegistry,
    options: HubOptions,
    outbox_writer: Option<OutboxWriter>,
    outbox_store: Arc<dyn OutboxStore>,
    dead_letter_queue: Arc<dyn DeadLetterQueue>,
    metrics: MetricsCollector,
}

impl MessageHub {
    pub fn builder() -> MessageHubBuilder {
        MessageHubBuilder::new()
    }

    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn outbox_store(&self) -> Arc<dyn OutboxStore> {
        self.outbox_store.clone()
    }

    pub fn dead_letter_queue(&self) -> Arc<dyn DeadLetterQueue> {
        self.dead_letter_queue.clone()
    }

    pub async fn send<R: Request>(&self, request: R) -> HubResult<R::Response> {
        self.send_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// 发送请求，取消令牌贯穿整个管道直到处理器
    pub async fn send_with_cancel<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> HubResult<R::Response> {
        let type_id = TypeId::of::<R>();
        let request_type = short_type_name(type_name::<R>());

        let registration = self
            .registry
            .resolve_request_handler(type_id, request_type)
            .inspect_err(|e| {
                warn!(request_type, error = %e, "请求没有注册处理器");
                self.metrics.record_request_failure(request_type, e.kind());
            })?;

        if cancel.is_cancelled() {
            return Err(HubError::CallerCancelled);
        }

        let behaviors = self.registry.resolve_behaviors(type_id);
        debug!(request_type, behaviors = behaviors.len(), "发送请求");

        let ctx = RequestContext::new(&request, &registration.metadata);
        let response = Next::new(&ctx, &behaviors, registration.handler.as_ref())
            .run(cancel)
            .await?;

        let response = response.downcast::<R::Response>().map_err(|_| {
            HubError::Internal(format!(
                "响应类型不匹配: 请求 {} 期望 {}",
                registration.type_name,
                type_name::<R::Response>()
            ))
        })?;
        Ok(Arc::try_unwrap(response).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// 发布通知；`publish_parallel_by_default` 开启时并行扇出
    pub async fn publish<N: Notification>(&self, notification: N) -> HubResult<()> {
        self.publish_with_cancel(notification, &CancellationToken::new())
            .await
    }

    pub async fn publish_with_cancel<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        let parallel = self.options.publish_parallel_by_default;
        self.dispatch(&notification, parallel, cancel).await
    }

    pub async fn publish_parallel<N: Notification>(&self, notification: N) -> HubResult<()> {
        self.publish_parallel_with_cancel(notification, &CancellationToken::new())
            .await
    }

    pub async fn publish_parallel_with_cancel<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        self.dispatch(&notification, true, cancel).await
    }

    /// 重新投递一条 Outbox 消息，不再经过 Outbox
    ///
    /// 只有解码失败会返回错误；处理器失败已经在扇出中被隔离。
    pub async fn redeliver(
        &self,
        message: &OutboxMessage,
        cancel: &CancellationToken,
    ) -> HubResult<FanOutReport> {
        let notification = self
            .registry
            .decode_notification(&message.notification_type_full_name, &message.payload)?;
        let parallel = self.options.publish_parallel_by_default;
        Ok(self.fan_out(notification.as_ref(), parallel, cancel).await)
    }

    async fn dispatch(
        &self,
        notification: &dyn AnyNotification,
        parallel: bool,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        if let Some(writer) = &self.outbox_writer {
            writer.save(notification).await?;
            debug!(
                notification_type = notification.short_type_name(),
                "通知已写入Outbox，等待后台投递"
            );
            return Ok(());
        }

        self.fan_out(notification, parallel, cancel).await;
        Ok(())
    }

    /// 把通知交给所有处理器，返回处理器数量和失败数量
    pub async fn fan_out(
        &self,
        notification: &dyn AnyNotification,
        parallel: bool,
        cancel: &CancellationToken,
    ) -> FanOutReport {
        let handlers = self
            .registry
            .resolve_notification_handlers(notification.notification_type_id());
        let notification_type = notification.short_type_name();
        self.metrics.record_publish(notification_type, handlers.len());

        if handlers.is_empty() {
            debug!(notification_type, "通知没有注册处理器");
            return FanOutReport::default();
        }

        let failed = if parallel {
            let outcomes = join_all(
                handlers
                    .iter()
                    .map(|handler| self.invoke_handler(handler.as_ref(), notification, cancel)),
            )
            .await;
            outcomes.into_iter().filter(|ok| !ok).count()
        } else {
            let mut failed = 0;
            for handler in handlers {
                if !self.invoke_handler(handler.as_ref(), notification, cancel).await {
                    failed += 1;
                }
            }
            failed
        };

        debug!(
            notification_type,
            handlers = handlers.len(),
            failed,
            parallel,
            "通知扇出完成"
        );
        FanOutReport {
            handlers: handlers.len(),
            failed,
        }
    }

    /// 执行单个通知处理器，失败时上报并返回 `false`
    async fn invoke_handler(
        &self,
        handler: &dyn ErasedNotificationHandler,
        notification: &dyn AnyNotification,
        cancel: &CancellationToken,
    ) -> bool {
        let handler_name = handler.handler_name();
        let span = RequestTracer::notification_span(notification.short_type_name(), handler_name);

        match handler
            .handle(notification, cancel)
            .instrument(span.clone())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                RequestTracer::record_error(&span, &e);
                self.report_failure(notification, handler_name, &e).await;
                false
            }
        }
    }

    async fn report_failure(
        &self,
        notification: &dyn AnyNotification,
        handler_type: &str,
        error: &HubError,
    ) {
        self.metrics
            .record_handler_failure(notification.short_type_name(), handler_type);

        if !self.options.dead_letter_queue_enabled {
            warn!(
                notification_type = notification.short_type_name(),
                handler_type,
                error = %error,
                "通知处理失败，死信队列未启用"
            );
            return;
        }

        if let Err(e) = self
            .dead_letter_queue
            .add(notification, handler_type, error)
            .await
        {
            error!(
                notification_type = notification.short_type_name(),
                handler_type,
                error = %e,
                "写入死信队列失败"
            );
        }
    }
}

/// 消息中介构建器
///
/// 内置行为按固定顺序放在最外层: ExceptionHandling, Validation, Cache,
/// Retry, Timeout, Telemetry；其后是用户行为，按注册顺序排列。
pub struct MessageHubBuilder {
    registry: HandlerRegistry,
    options: HubOptions,
    retry: RetryConfig,
    timeout: TimeoutConfig,
    outbox_store: Option<Arc<dyn OutboxStore>>,
    dead_letter_queue: Option<Arc<dyn DeadLetterQueue>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    user_behaviors: Vec<(Option<TypeId>, Arc<dyn PipelineBehavior>)>,
    registration_error: Option<HubError>,
}

impl Default for MessageHubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHubBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            options: HubOptions::default(),
            retry: RetryConfig::default(),
            timeout: TimeoutConfig::default(),
            outbox_store: None,
            dead_letter_queue: None,
            cache_store: None,
            user_behaviors: Vec::new(),
            registration_error: None,
        }
    }

    pub fn with_options(mut self, options: HubOptions) -> Self {
        self.options = options;
        self
    }

    /// 一次性应用中介开关、重试与超时配置
    pub fn with_config(mut self, config: &HubConfig) -> Self {
        self.options = config.hub.clone();
        self.retry = config.retry.clone();
        self.timeout = config.timeout.clone();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_config(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_outbox_store(mut self, store: Arc<dyn OutboxStore>) -> Self {
        self.outbox_store = Some(store);
        self
    }

    pub fn with_dead_letter_queue(mut self, queue: Arc<dyn DeadLetterQueue>) -> Self {
        self.dead_letter_queue = Some(queue);
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn register_request_handler<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        if let Err(e) = self.registry.register_request_handler::<R, H>(handler) {
            self.registration_error.get_or_insert(e);
        }
        self
    }

    pub fn register_notification_handler<N, H>(mut self, handler: H) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        self.registry.register_notification_handler::<N, H>(handler);
        self
    }

    /// 登记没有处理器的通知类型，使 Outbox 仍能解码它
    pub fn register_notification<N: Notification>(mut self) -> Self {
        self.registry.register_notification::<N>();
        self
    }

    pub fn configure_request<R: Request>(mut self, metadata: RequestMetadata) -> Self {
        self.registry.configure_request::<R>(metadata);
        self
    }

    pub fn add_behavior<B: PipelineBehavior + 'static>(mut self, behavior: B) -> Self {
        self.user_behaviors.push((None, Arc::new(behavior)));
        self
    }

    pub fn add_request_behavior<R, B>(mut self, behavior: B) -> Self
    where
        R: Request,
        B: PipelineBehavior + 'static,
    {
        self.user_behaviors
            .push((Some(TypeId::of::<R>()), Arc::new(behavior)));
        self
    }

    pub fn build(self) -> HubResult<MessageHub> {
        if let Some(e) = self.registration_error {
            return Err(e);
        }

        let mut registry = self.registry;
        let options = self.options;

        registry.add_behavior(Arc::new(ExceptionHandlingBehavior::new()));
        registry.add_behavior(Arc::new(ValidationBehavior::new()));
        if options.caching_enabled {
            let store = self
                .cache_store
                .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()));
            registry.add_behavior(Arc::new(CacheBehavior::new(store)));
        }
        if options.retry_enabled {
            registry.add_behavior(Arc::new(RetryBehavior::from_config(&self.retry)));
        }
        if options.timeout_enabled {
            registry.add_behavior(Arc::new(TimeoutBehavior::from_config(&self.timeout)));
        }
        if options.telemetry_enabled {
            registry.add_behavior(Arc::new(TelemetryBehavior::new()));
        }
        for (scope, behavior) in self.user_behaviors {
            registry.push_scoped_behavior(scope, behavior);
        }

        let outbox_store = self
            .outbox_store
            .unwrap_or_else(|| Arc::new(InMemoryOutboxStore::new()));
        let dead_letter_queue = self
            .dead_letter_queue
            .unwrap_or_else(|| Arc::new(InMemoryDeadLetterQueue::new()));
        let outbox_writer = options
            .outbox_enabled
            .then(|| OutboxWriter::new(outbox_store.clone()));

        info!(
            request_handlers = registry.request_handler_count(),
            notification_handlers = registry.notification_handler_count(),
            caching = options.caching_enabled,
            retry = options.retry_enabled,
            timeout = options.timeout_enabled,
            telemetry = options.telemetry_enabled,
            outbox = options.outbox_enabled,
            dead_letter_queue = options.dead_letter_queue_enabled,
            "消息中介已构建"
        );

        Ok(MessageHub {
            registry,
            options,
            outbox_writer,
            outbox_store,
            dead_letter_queue,
            metrics: MetricsCollector::new(),
        })
    }
}
