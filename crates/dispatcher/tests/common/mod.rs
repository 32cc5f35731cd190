#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{
    CachePolicy, ErasedResponse, HubError, HubResult, Notification, NotificationHandler, Request,
    RequestHandler,
};
use messagehub_dispatcher::{Next, PipelineBehavior, RequestContext};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// 共享的调用记录，用来断言执行顺序
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}


#[derive(Debug, Clone, Serialize, Validate)]
pub struct Echo {
    #[validate(length(min = 1, max = 32))]
    pub text: String,
}

impl Request for Echo {
    type Response = String;
}

pub struct EchoHandler {
    pub journal: Journal,
}

#[async_trait]
impl RequestHandler<Echo> for EchoHandler {
    async fn handle(&self, request: &Echo, _cancel: &CancellationToken) -> HubResult<String> {
        self.journal.push("handler");
        Ok(request.text.to_uppercase())
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct Unhandled {
    pub id: u32,
}

impl Request for Unhandled {
    type Response = u32;
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LookupPrice {
    pub sku: String,
}

impl Request for LookupPrice {
    type Response = u64;

    fn cache_policy() -> Option<CachePolicy> {
        Some(CachePolicy::for_seconds(60))
    }
}

pub struct LookupPriceHandler {
    pub calls: CallCounter,
}

#[async_trait]
impl RequestHandler<LookupPrice> for LookupPriceHandler {
    async fn handle(&self, request: &LookupPrice, _cancel: &CancellationToken) -> HubResult<u64> {
        let call = self.calls.increment();
        Ok(request.sku.len() as u64 * 100 + call as u64)
    }
}

/// 前 `failures` 次调用失败，之后成功
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Flaky {
    pub failures: u32,
    pub retryable: bool,
}

impl Request for Flaky {
    type Response = u32;
}

pub struct FlakyHandler {
    pub calls: CallCounter,
}

#[async_trait]
impl RequestHandler<Flaky> for FlakyHandler {
    async fn handle(&self, request: &Flaky, _cancel: &CancellationToken) -> HubResult<u32> {
        let call = self.calls.increment();
        if call <= request.failures {
            return Err(if request.retryable {
                HubError::transient(format!("attempt {call} failed"))
            } else {
                HubError::handler(format!("attempt {call} rejected"))
            });
        }
        Ok(call)
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct Sleepy {
    pub millis: u64,
}

impl Request for Sleepy {
    type Response = ();

    fn timeout() -> Option<Duration> {
        Some(Duration::from_millis(100))
    }
}

pub struct SleepyHandler;

#[async_trait]
impl RequestHandler<Sleepy> for SleepyHandler {
    async fn handle(&self, request: &Sleepy, cancel: &CancellationToken) -> HubResult<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::CallerCancelled),
            _ = tokio::time::sleep(Duration::from_millis(request.millis)) => Ok(()),
        }
    }
}


/// 记录进入与退出的行为
pub struct Marker {
    pub label: &'static str,
    pub journal: Journal,
}

#[async_trait]
impl PipelineBehavior for Marker {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn handle(
        &self,
        _ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        self.journal.push(format!("{}:before", self.label));
        let result = next.run(cancel).await;
        self.journal.push(format!("{}:after", self.label));
        result
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub order_id: u64,
}

impl Notification for OrderShipped {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unobserved {
    pub id: u64,
}

impl Notification for Unobserved {}

pub struct RecordingHandler {
    pub label: &'static str,
    pub journal: Journal,
    pub delay: Option<Duration>,
}

#[async_trait]
impl NotificationHandler<OrderShipped> for RecordingHandler {
    async fn handle(&self, notification: &OrderShipped, _cancel: &CancellationToken) -> HubResult<()> {
        self.journal
            .push(format!("{}:start:{}", self.label, notification.order_id));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.journal
            .push(format!("{}:end:{}", self.label, notification.order_id));
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        self.label
    }
}

pub struct FailingHandler {
    pub label: &'static str,
    pub calls: CallCounter,
}

#[async_trait]
impl NotificationHandler<OrderShipped> for FailingHandler {
    async fn handle(&self, _notification: &OrderShipped, _cancel: &CancellationToken) -> HubResult<()> {
        self.calls.increment();
        Err(HubError::handler_with_source(
            format!("{} failed", self.label),
            HubError::transient("carrier api unavailable"),
        ))
    }

    fn handler_name(&self) -> &'static str {
        self.label
    }
}

pub fn recording(label: &'static str, journal: &Journal) -> RecordingHandler {
    RecordingHandler {
        label,
        journal: journal.clone(),
        delay: None,
    }
}
