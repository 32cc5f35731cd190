use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{
    ErasedRequest, ErasedResponse, HubError, HubResult, Request, RequestMetadata,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::pipeline::{ErasedRequestHandler, Next, PipelineBehavior, RequestContext};

#[derive(Debug, Clone, Serialize, Validate)]
pub struct Probe {
    #[validate(range(min = 1))]
    pub id: u32,
    #[validate(length(min = 1))]
    pub name: String,
}

impl Probe {
    pub fn valid() -> Self {
        Self {
            id: 1,
            name: "probe".to_string(),
        }
    }
}

impl Request for Probe {
    type Response = u32;
}

/// 按脚本依次返回结果的处理器，脚本用完后返回 0
pub struct ScriptedHandler {
    script: Mutex<VecDeque<HubResult<u32>>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedHandler {
    pub fn new(script: Vec<HubResult<u32>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ErasedRequestHandler for ScriptedHandler {
    async fn handle(
        &self,
        _request: &dyn ErasedRequest,
        cancel: &CancellationToken,
    ) -> HubResult<ErasedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(HubError::CallerCancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(0));
        next.map(|value| Arc::new(value) as ErasedResponse)
    }
}

pub async fn run_behavior_with_cancel<B: PipelineBehavior + 'static>(
    behavior: B,
    probe: &Probe,
    metadata: &RequestMetadata,
    handler: &ScriptedHandler,
    cancel: &CancellationToken,
) -> HubResult<ErasedResponse> {
    let behaviors: Vec<Arc<dyn PipelineBehavior>> = vec![Arc::new(behavior)];
    let ctx = RequestContext::new(probe, metadata);
    Next::new(&ctx, &behaviors, handler).run(cancel).await
}

pub async fn run_behavior<B: PipelineBehavior + 'static>(
    behavior: B,
    probe: &Probe,
    metadata: &RequestMetadata,
    handler: &ScriptedHandler,
) -> HubResult<ErasedResponse> {
    run_behavior_with_cancel(behavior, probe, metadata, handler, &CancellationToken::new()).await
}
