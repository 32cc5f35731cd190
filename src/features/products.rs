use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{CachePolicy, HubError, HubResult, Request, RequestHandler};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub price_cents: u64,
    pub stock: u32,
}

/// 商品列表查询，结果缓存 60 秒
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct GetProductsQuery {
    /// 按分类过滤，`None` 返回全部
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
}

impl Request for GetProductsQuery {
    type Response = Vec<ProductDto>;

    fn cache_policy() -> Option<CachePolicy> {
        Some(CachePolicy::for_seconds(60))
    }
}

/// 商品目录查询处理器，记录实际执行次数以便观察缓存命中
#[derive(Debug, Clone)]
pub struct GetProductsHandler {
    catalog: Arc<Vec<ProductDto>>,
    executions: Arc<AtomicUsize>,
}

impl Default for GetProductsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl GetProductsHandler {
    pub fn new() -> Self {
        let product = |id, name: &str, category: &str, price_cents, stock| ProductDto {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price_cents,
            stock,
        };
        Self {
            catalog: Arc::new(vec![
                product(1, "Laptop", "computers", 99_999, 10),
                product(2, "Mouse", "accessories", 2_999, 50),
                product(3, "Keyboard", "accessories", 7_999, 30),
                product(4, "Monitor", "computers", 29_999, 15),
            ]),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestHandler<GetProductsQuery> for GetProductsHandler {
    async fn handle(
        &self,
        request: &GetProductsQuery,
        _cancel: &CancellationToken,
    ) -> HubResult<Vec<ProductDto>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let products: Vec<ProductDto> = self
            .catalog
            .iter()
            .filter(|p| match &request.category {
                Some(category) => &p.category == category,
                None => true,
            })
            .cloned()
            .collect();
        debug!(count = products.len(), "查询商品目录");
        Ok(products)
    }
}

/// 慢查询，单次超时 2 秒
#[derive(Debug, Clone, Serialize, Validate)]
pub struct SlowQuery {
    #[validate(range(max = 60_000))]
    pub delay_ms: u64,
}

impl Request for SlowQuery {
    type Response = String;

    fn timeout() -> Option<Duration> {
        Some(Duration::from_millis(2000))
    }
}

#[derive(Debug, Default)]
pub struct SlowQueryHandler;

#[async_trait]
impl RequestHandler<SlowQuery> for SlowQueryHandler {
    async fn handle(&self, request: &SlowQuery, cancel: &CancellationToken) -> HubResult<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::CallerCancelled),
            _ = tokio::time::sleep(Duration::from_millis(request.delay_ms)) => {
                Ok(format!("completed after {}ms", request.delay_ms))
            }
        }
    }
}
