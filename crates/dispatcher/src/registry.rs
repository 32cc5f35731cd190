use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use messagehub_core::{
    decode_notification, AnyNotification, HubError, HubResult, Notification,
    NotificationDecoder, NotificationHandler, Request, RequestHandler, RequestMetadata,
};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{ErasedRequestHandler, PipelineBehavior, RequestHandlerAdapter};

/// 类型擦除后的通知处理器
#[async_trait]
pub trait ErasedNotificationHandler: Send + Sync {
    fn handler_name(&self) -> &'static str;

    async fn handle(
        &self,
        notification: &dyn AnyNotification,
        cancel: &CancellationToken,
    ) -> HubResult<()>;
}

struct NotificationHandlerAdapter<N, H> {
    handler: H,
    _notification: PhantomData<fn(N)>,
}

#[async_trait]
impl<N, H> ErasedNotificationHandler for NotificationHandlerAdapter<N, H>
where
    N: Notification,
    H: NotificationHandler<N>,
{
    fn handler_name(&self) -> &'static str {
        self.handler.handler_name()
    }

    async fn handle(
        &self,
        notification: &dyn AnyNotification,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        let notification = notification.as_any().downcast_ref::<N>().ok_or_else(|| {
            HubError::Internal(format!(
                "通知类型不匹配: 期望 {}，实际 {}",
                type_name::<N>(),
                notification.full_type_name()
            ))
        })?;
        self.handler.handle(notification, cancel).await
    }
}

/// 单个请求类型的注册信息
pub struct RequestRegistration {
    pub type_name: &'static str,
    pub handler: Arc<dyn ErasedRequestHandler>,
    pub metadata: RequestMetadata,
}

/// 行为及其作用范围，`None` 表示对所有请求生效
type ScopedBehavior = (Option<TypeId>, Arc<dyn PipelineBehavior>);

/// 处理器注册表
///
/// 以 `TypeId` 为键保存请求处理器、通知处理器和行为。请求元数据在注册
/// 处理器时解析一次并缓存。注册表在 `MessageHubBuilder::build` 之后不再
/// 修改，可以无锁并发读取。
#[derive(Default)]
pub struct HandlerRegistry {
    requests: HashMap<TypeId, RequestRegistration>,
    notifications: HashMap<TypeId, Vec<Arc<dyn ErasedNotificationHandler>>>,
    decoders: HashMap<&'static str, NotificationDecoder>,
    metadata_overrides: HashMap<TypeId, RequestMetadata>,
    behaviors: Vec<ScopedBehavior>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册请求处理器，同一请求类型重复注册返回 `DuplicateHandler`
    pub fn register_request_handler<R, H>(&mut self, handler: H) -> HubResult<()>
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let type_id = TypeId::of::<R>();
        if self.requests.contains_key(&type_id) {
            return Err(HubError::DuplicateHandler {
                request_type: type_name::<R>().to_string(),
            });
        }

        let metadata = self
            .metadata_overrides
            .remove(&type_id)
            .unwrap_or_else(|| RequestMetadata::new(R::cache_policy(), R::timeout()));

        self.requests.insert(
            type_id,
            RequestRegistration {
                type_name: type_name::<R>(),
                handler: Arc::new(RequestHandlerAdapter::<R, H>::new(handler)),
                metadata,
            },
        );
        Ok(())
    }

    /// 覆盖请求类型的元数据，处理器注册前后调用都可以
    pub fn configure_request<R: Request>(&mut self, metadata: RequestMetadata) {
        let type_id = TypeId::of::<R>();
        match self.requests.get_mut(&type_id) {
            Some(registration) => registration.metadata = metadata,
            None => {
                self.metadata_overrides.insert(type_id, metadata);
            }
        }
    }

    pub fn register_notification_handler<N, H>(&mut self, handler: H)
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        self.register_notification::<N>();
        self.notifications
            .entry(TypeId::of::<N>())
            .or_default()
            .push(Arc::new(NotificationHandlerAdapter::<N, H> {
                handler,
                _notification: PhantomData,
            }));
    }

    /// 只登记通知的解码器，不注册处理器
    pub fn register_notification<N: Notification>(&mut self) {
        self.decoders
            .entry(type_name::<N>())
            .or_insert(decode_notification::<N> as NotificationDecoder);
    }

    pub fn add_behavior(&mut self, behavior: Arc<dyn PipelineBehavior>) {
        self.behaviors.push((None, behavior));
    }

    pub fn add_request_behavior<R: Request>(&mut self, behavior: Arc<dyn PipelineBehavior>) {
        self.push_scoped_behavior(Some(TypeId::of::<R>()), behavior);
    }

    pub(crate) fn push_scoped_behavior(
        &mut self,
        scope: Option<TypeId>,
        behavior: Arc<dyn PipelineBehavior>,
    ) {
        self.behaviors.push((scope, behavior));
    }

    /// 查找请求处理器，未注册时返回 `NoHandlerFound`
    pub fn resolve_request_handler(
        &self,
        type_id: TypeId,
        request_type: &str,
    ) -> HubResult<&RequestRegistration> {
        self.requests
            .get(&type_id)
            .ok_or_else(|| HubError::no_handler(request_type))
    }

    /// 按注册顺序返回通知处理器，可能为空
    pub fn resolve_notification_handlers(
        &self,
        type_id: TypeId,
    ) -> &[Arc<dyn ErasedNotificationHandler>] {
        self.notifications
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 按注册顺序返回对该请求类型生效的行为
    pub fn resolve_behaviors(&self, type_id: TypeId) -> Vec<Arc<dyn PipelineBehavior>> {
        self.behaviors
            .iter()
            .filter(|(scope, _)| match scope {
                Some(scoped) => *scoped == type_id,
                None => true,
            })
            .map(|(_, behavior)| behavior.clone())
            .collect()
    }

    /// 按完整类型名把 JSON 负载还原为通知
    pub fn decode_notification(
        &self,
        full_type_name: &str,
        payload: &str,
    ) -> HubResult<Box<dyn AnyNotification>> {
        let decoder = self.decoders.get(full_type_name).ok_or_else(|| {
            HubError::config_error(format!("未注册的通知类型: {full_type_name}"))
        })?;
        decoder(payload)
    }

    pub fn request_metadata(&self, type_id: TypeId) -> Option<&RequestMetadata> {
        self.requests.get(&type_id).map(|r| &r.metadata)
    }

    pub fn request_handler_count(&self) -> usize {
        self.requests.len()
    }

    pub fn notification_handler_count(&self) -> usize {
        self.notifications.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messagehub_core::{CachePolicy, ErasedResponse};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use validator::Validate;

    use crate::pipeline::{Next, RequestContext};

    #[derive(Serialize, Validate)]
    struct Ping {
        seq: u32,
    }

    impl Request for Ping {
        type Response = String;

        fn cache_policy() -> Option<CachePolicy> {
            Some(CachePolicy::for_seconds(30))
        }

        fn timeout() -> Option<Duration> {
            Some(Duration::from_millis(250))
        }
    }

    #[derive(Serialize, Validate)]
    struct Other {
        flag: bool,
    }

    impl Request for Other {
        type Response = ();
    }

    struct PingHandler;

    #[async_trait]
    impl RequestHandler<Ping> for PingHandler {
        async fn handle(&self, _: &Ping, _: &CancellationToken) -> HubResult<String> {
            Ok("pong".to_string())
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Pinged {
        seq: u32,
    }

    impl Notification for Pinged {}

    struct Named(&'static str);

    #[async_trait]
    impl PipelineBehavior for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn handle(
            &self,
            _ctx: &RequestContext<'_>,
            cancel: &CancellationToken,
            next: Next<'_>,
        ) -> HubResult<ErasedResponse> {
            next.run(cancel).await
        }
    }

    #[test]
    fn test_metadata_resolved_at_registration() {
        let mut registry = HandlerRegistry::new();
        registry.register_request_handler::<Ping, _>(PingHandler).unwrap();

        let metadata = registry.request_metadata(TypeId::of::<Ping>()).unwrap();
        assert_eq!(metadata.cache, Some(CachePolicy::for_seconds(30)));
        assert_eq!(metadata.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_metadata_override_before_registration() {
        let mut registry = HandlerRegistry::new();
        registry.configure_request::<Ping>(RequestMetadata::default());
        registry.register_request_handler::<Ping, _>(PingHandler).unwrap();

        let metadata = registry.request_metadata(TypeId::of::<Ping>()).unwrap();
        assert_eq!(metadata, &RequestMetadata::default());
    }

    #[test]
    fn test_duplicate_request_handler_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register_request_handler::<Ping, _>(PingHandler).unwrap();
        let err = registry
            .register_request_handler::<Ping, _>(PingHandler)
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_handler");
    }

    #[test]
    fn test_missing_handler_is_reported() {
        let registry = HandlerRegistry::new();
        let err = registry
            .resolve_request_handler(TypeId::of::<Ping>(), "Ping")
            .err()
            .unwrap();
        assert!(matches!(err, HubError::NoHandlerFound { .. }));
        assert!(registry
            .resolve_notification_handlers(TypeId::of::<Pinged>())
            .is_empty());
    }

    #[test]
    fn test_behaviors_resolved_in_registration_order_with_scope() {
        let mut registry = HandlerRegistry::new();
        registry.add_behavior(Arc::new(Named("global-1")));
        registry.add_request_behavior::<Ping>(Arc::new(Named("ping-only")));
        registry.add_request_behavior::<Other>(Arc::new(Named("other-only")));
        registry.add_behavior(Arc::new(Named("global-2")));

        let names: Vec<_> = registry
            .resolve_behaviors(TypeId::of::<Ping>())
            .iter()
            .map(|b| b.name())
            .collect();
        assert_eq!(names, vec!["global-1", "ping-only", "global-2"]);
    }

    #[test]
    fn test_decoder_registered_with_notification() {
        let mut registry = HandlerRegistry::new();
        registry.register_notification::<Pinged>();

        let decoded = registry
            .decode_notification(type_name::<Pinged>(), r#"{"seq":1}"#)
            .unwrap();
        assert_eq!(decoded.notification_type_id(), TypeId::of::<Pinged>());

        assert!(registry.decode_notification("missing::Type", "{}").is_err());
    }
}
