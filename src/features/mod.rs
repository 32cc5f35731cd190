//! 示例业务功能
//!
//! 演示请求、通知、缓存、超时和自定义行为在中介上的注册方式。

pub mod logging_behavior;
pub mod products;
pub mod users;

pub use logging_behavior::LoggingBehavior;
pub use products::{GetProductsHandler, GetProductsQuery, ProductDto, SlowQuery, SlowQueryHandler};
pub use users::{
    CreateUserCommand, CreateUserHandler, GetUserHandler, GetUserQuery, SendWelcomeEmailHandler,
    UpdateUserStatisticsHandler, UserCreatedNotification, UserDirectory, UserDto, UserStatistics,
};
