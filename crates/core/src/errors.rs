use std::error::Error as StdError;

use thiserror::Error;

/// 处理器内部错误的装箱类型
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 消息中介错误类型定义
#[derive(Debug, Error)]
pub enum HubError {
    #[error("未找到请求处理器: {request_type}")]
    NoHandlerFound { request_type: String },

    #[error("请求处理器重复注册: {request_type}")]
    DuplicateHandler { request_type: String },

    #[error("请求校验失败: {request_type} 字段 {field} 违反规则 {rule}")]
    Validation {
        request_type: String,
        field: String,
        rule: String,
    },

    #[error("操作超时: {operation} (超时时间: {timeout_ms}ms)")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("调用方已取消操作")]
    CallerCancelled,

    #[error("暂时性故障: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("处理器执行失败: {message}")]
    Handler {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("存储错误: {0}")]
    Store(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type HubResult<T> = Result<T, HubError>;

impl HubError {
    pub fn no_handler<S: Into<String>>(request_type: S) -> Self {
        Self::NoHandlerFound {
            request_type: request_type.into(),
        }
    }

    pub fn validation(
        request_type: impl Into<String>,
        field: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self::Validation {
            request_type: request_type.into(),
            field: field.into(),
            rule: rule.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    pub fn handler<S: Into<String>>(message: S) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// 包装一个底层错误，保留原始错误作为 source
    pub fn handler_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        Self::Handler {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn store_error<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 错误种类，用于日志字段和指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::NoHandlerFound { .. } => "no_handler_found",
            HubError::DuplicateHandler { .. } => "duplicate_handler",
            HubError::Validation { .. } => "validation",
            HubError::Timeout { .. } => "timeout",
            HubError::CallerCancelled => "caller_cancelled",
            HubError::Transient { .. } => "transient",
            HubError::Handler { .. } => "handler",
            HubError::Serialization(_) => "serialization",
            HubError::Store(_) => "store",
            HubError::Configuration(_) => "configuration",
            HubError::Internal(_) => "internal",
        }
    }

    /// 是否可以重试
    ///
    /// 可重试的错误种类只有 `Timeout` 和 `Transient`。其他种类只要在
    /// `source()` 链中包裹了可重试的 `HubError`，同样视为可重试。
    pub fn is_retryable(&self) -> bool {
        if matches!(self, HubError::Timeout { .. } | HubError::Transient { .. }) {
            return true;
        }

        let mut source = StdError::source(self);
        while let Some(err) = source {
            if let Some(hub_error) = err.downcast_ref::<HubError>() {
                // 嵌套的 HubError 自己会继续沿链检查
                return hub_error.is_retryable();
            }
            source = err.source();
        }
        false
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, HubError::CallerCancelled)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HubError::NoHandlerFound { .. }
                | HubError::DuplicateHandler { .. }
                | HubError::Configuration(_)
                | HubError::Internal(_)
        )
    }

    /// 将错误及其 source 链渲染为多行文本，死信记录用它代替调用栈
    pub fn render_chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = StdError::source(self);
        while let Some(err) = source {
            rendered.push_str("\n  caused by: ");
            rendered.push_str(&err.to_string());
            source = err.source();
        }
        rendered
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for HubError {
    fn from(err: anyhow::Error) -> Self {
        HubError::Internal(err.to_string())
    }
}
