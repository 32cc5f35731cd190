//! 请求管道
//!
//! 行为按注册顺序组成一条链，先注册的在最外层。`Next` 是对剩余链的
//! 廉价可复制引用，调用 `run` 时执行下一个行为，链走完后执行处理器。

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use messagehub_core::{
    ErasedRequest, ErasedResponse, HubError, HubResult, Request, RequestHandler,
    RequestMetadata,
};
use tokio_util::sync::CancellationToken;

/// 单次请求在管道中可见的上下文
pub struct RequestContext<'a> {
    request: &'a dyn ErasedRequest,
    metadata: &'a RequestMetadata,
}

impl<'a> RequestContext<'a> {
    pub fn new(request: &'a dyn ErasedRequest, metadata: &'a RequestMetadata) -> Self {
        Self { request, metadata }
    }

    pub fn request(&self) -> &'a dyn ErasedRequest {
        self.request
    }

    /// 请求的短类型名
    pub fn request_type(&self) -> &'static str {
        self.request.short_type_name()
    }

    pub fn full_type_name(&self) -> &'static str {
        self.request.full_type_name()
    }

    pub fn metadata(&self) -> &'a RequestMetadata {
        self.metadata
    }

    /// 取回具体请求类型，行为只关心特定请求时使用
    pub fn downcast<R: Request>(&self) -> Option<&'a R> {
        self.request.as_any().downcast_ref::<R>()
    }
}

/// 管道行为
///
/// 行为包裹 `next`，可以在调用前后做处理，也可以短路或多次调用 `next`。
/// 行为对象在多次调用间共享，不应保存单次调用的状态。
#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse>;
}

/// 类型擦除后的请求处理器
#[async_trait]
pub trait ErasedRequestHandler: Send + Sync {
    async fn handle(
        &self,
        request: &dyn ErasedRequest,
        cancel: &CancellationToken,
    ) -> HubResult<ErasedResponse>;
}

pub(crate) struct RequestHandlerAdapter<R, H> {
    handler: H,
    _request: PhantomData<fn(R)>,
}

impl<R, H> RequestHandlerAdapter<R, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<R, H> ErasedRequestHandler for RequestHandlerAdapter<R, H>
where
    R: Request,
    H: RequestHandler<R>,
{
    async fn handle(
        &self,
        request: &dyn ErasedRequest,
        cancel: &CancellationToken,
    ) -> HubResult<ErasedResponse> {
        let request = request.as_any().downcast_ref::<R>().ok_or_else(|| {
            HubError::Internal(format!(
                "请求类型不匹配: 期望 {}，实际 {}",
                type_name::<R>(),
                request.full_type_name()
            ))
        })?;
        let response = self.handler.handle(request, cancel).await?;
        Ok(Arc::new(response))
    }
}

/// 管道中剩余部分的续体
#[derive(Clone, Copy)]
pub struct Next<'a> {
    ctx: &'a RequestContext<'a>,
    behaviors: &'a [Arc<dyn PipelineBehavior>],
    handler: &'a dyn ErasedRequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(
        ctx: &'a RequestContext<'a>,
        behaviors: &'a [Arc<dyn PipelineBehavior>],
        handler: &'a dyn ErasedRequestHandler,
    ) -> Self {
        Self {
            ctx,
            behaviors,
            handler,
        }
    }

    /// 执行剩余的链；可以多次调用，每次都重新执行内层行为和处理器
    pub async fn run(self, cancel: &CancellationToken) -> HubResult<ErasedResponse> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                let next = Next {
                    behaviors: rest,
                    ..self
                };
                behavior.handle(self.ctx, cancel, next).await
            }
            None => self.handler.handle(self.ctx.request, cancel).await,
        }
    }

    /// 剩余的行为数量，不含处理器
    pub fn remaining(&self) -> usize {
        self.behaviors.len()
    }
}
