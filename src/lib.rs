pub mod app;
pub mod features;
pub mod shutdown;
