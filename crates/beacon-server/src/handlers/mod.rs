//! Request handlers behind the instrumentation middleware.

mod data;
mod health;
mod logs;

use async_trait::async_trait;
use axum::extract::Request;

use crate::response::ResponseSink;

pub use data::DataHandler;
pub use health::HealthHandler;
pub use logs::{LogTrigger, LogsHandler};

/// A handler writes its response into `out` instead of returning it, so the
/// middleware can observe the status through a decorator.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn serve(&self, req: Request, out: &mut dyn ResponseSink);
}
