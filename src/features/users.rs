use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use messagehub_core::{
    HubError, HubResult, Notification, NotificationHandler, Request, RequestHandler,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// 内存用户目录，创建和查询处理器共享
#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<u64, UserDto>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// 预置几个演示用户
    pub async fn with_seed_users() -> Self {
        let directory = Self::new();
        let now = Utc::now();
        for (name, email, days_ago) in [
            ("John Doe", "john@example.com", 30),
            ("Jane Smith", "jane@example.com", 20),
            ("Bob Johnson", "bob@example.com", 10),
        ] {
            directory
                .insert(name, email, now - chrono::Duration::days(days_ago))
                .await;
        }
        directory
    }

    async fn insert(&self, name: &str, email: &str, created_at: DateTime<Utc>) -> UserDto {
        let user = UserDto {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            email: email.to_string(),
            created_at,
        };
        self.users.write().await.insert(user.id, user.clone());
        user
    }

    pub async fn get(&self, id: u64) -> Option<UserDto> {
        self.users.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct CreateUserCommand {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

impl Request for CreateUserCommand {
    type Response = UserDto;
}

pub struct CreateUserHandler {
    directory: UserDirectory,
}

impl CreateUserHandler {
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl RequestHandler<CreateUserCommand> for CreateUserHandler {
    async fn handle(
        &self,
        request: &CreateUserCommand,
        _cancel: &CancellationToken,
    ) -> HubResult<UserDto> {
        let user = self
            .directory
            .insert(&request.name, &request.email, Utc::now())
            .await;
        info!(user_id = user.id, "用户已创建");
        Ok(user)
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct GetUserQuery {
    #[validate(range(min = 1))]
    pub id: u64,
}

impl Request for GetUserQuery {
    type Response = UserDto;
}

pub struct GetUserHandler {
    directory: UserDirectory,
}

impl GetUserHandler {
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl RequestHandler<GetUserQuery> for GetUserHandler {
    async fn handle(&self, request: &GetUserQuery, _cancel: &CancellationToken) -> HubResult<UserDto> {
        self.directory
            .get(request.id)
            .await
            .ok_or_else(|| HubError::handler(format!("用户不存在: {}", request.id)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreatedNotification {
    pub user_id: u64,
    pub user_name: String,
    pub email: String,
}

impl Notification for UserCreatedNotification {}

impl From<&UserDto> for UserCreatedNotification {
    fn from(user: &UserDto) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// 模拟发送欢迎邮件
#[derive(Debug, Default)]
pub struct SendWelcomeEmailHandler;

#[async_trait]
impl NotificationHandler<UserCreatedNotification> for SendWelcomeEmailHandler {
    async fn handle(
        &self,
        notification: &UserCreatedNotification,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        info!(
            email = %notification.email,
            user_id = notification.user_id,
            user_name = %notification.user_name,
            "Sending welcome email"
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::CallerCancelled),
            _ = tokio::time::sleep(Duration::from_millis(100)) => Ok(()),
        }
    }

    fn handler_name(&self) -> &'static str {
        "SendWelcomeEmailHandler"
    }
}

/// 用户统计计数
#[derive(Debug, Clone, Default)]
pub struct UserStatistics {
    created: Arc<AtomicU64>,
}

impl UserStatistics {
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

pub struct UpdateUserStatisticsHandler {
    statistics: UserStatistics,
}

impl UpdateUserStatisticsHandler {
    pub fn new(statistics: UserStatistics) -> Self {
        Self { statistics }
    }
}

#[async_trait]
impl NotificationHandler<UserCreatedNotification> for UpdateUserStatisticsHandler {
    async fn handle(
        &self,
        notification: &UserCreatedNotification,
        cancel: &CancellationToken,
    ) -> HubResult<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(HubError::CallerCancelled),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        let total = self.statistics.created.fetch_add(1, Ordering::SeqCst) + 1;
        info!(user_id = notification.user_id, total, "Updated user statistics");
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "UpdateUserStatisticsHandler"
    }
}
