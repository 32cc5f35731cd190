use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use validator::{Validate, ValidationErrors};

use crate::errors::HubResult;
use crate::models::CachePolicy;

/// 在管道中流转的类型擦除响应
pub type ErasedResponse = Arc<dyn Any + Send + Sync>;

/// 把 JSON 负载还原为具体通知类型的解码函数
pub type NotificationDecoder = fn(&str) -> HubResult<Box<dyn AnyNotification>>;

/// 请求：期望唯一处理器返回一个类型化响应
///
/// `cache_policy` 与 `timeout` 是按请求类型声明的元数据，注册处理器时
/// 解析一次并缓存在注册表中。
pub trait Request: Serialize + Validate + Send + Sync + 'static {
    type Response: Clone + Send + Sync + 'static;

    fn cache_policy() -> Option<CachePolicy> {
        None
    }

    fn timeout() -> Option<Duration> {
        None
    }
}

/// 通知：广播给零个或多个处理器，没有响应
pub trait Notification: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// 请求的对象安全视图，供全局管道行为使用
pub trait ErasedRequest: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn full_type_name(&self) -> &'static str;

    fn short_type_name(&self) -> &'static str {
        short_type_name(self.full_type_name())
    }

    fn to_json(&self) -> HubResult<String>;

    fn validate_request(&self) -> Result<(), ValidationErrors>;
}

impl<R: Request> ErasedRequest for R {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn full_type_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }

    fn to_json(&self) -> HubResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate_request(&self) -> Result<(), ValidationErrors> {
        self.validate()
    }
}

/// 通知的对象安全视图，用于扇出、Outbox 与死信队列
pub trait AnyNotification: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn notification_type_id(&self) -> TypeId;

    fn full_type_name(&self) -> &'static str;

    fn short_type_name(&self) -> &'static str {
        short_type_name(self.full_type_name())
    }

    fn to_json(&self) -> HubResult<String>;
}

impl<N: Notification> AnyNotification for N {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn notification_type_id(&self) -> TypeId {
        TypeId::of::<N>()
    }

    fn full_type_name(&self) -> &'static str {
        std::any::type_name::<N>()
    }

    fn to_json(&self) -> HubResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 具体通知类型的解码器，注册通知处理器时一并登记
pub fn decode_notification<N: Notification>(payload: &str) -> HubResult<Box<dyn AnyNotification>> {
    let notification: N = serde_json::from_str(payload)?;
    Ok(Box::new(notification))
}

/// 去掉模块路径和泛型参数，只保留类型名本身
pub fn short_type_name(full_name: &'static str) -> &'static str {
    let base = full_name.split('<').next().unwrap_or(full_name);
    base.rsplit("::").next().unwrap_or(base)
}
