//! Request instrumentation: in-flight gauge, start/completion logs, request
//! counter and latency histogram around every wrapped handler.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};
use futures_util::FutureExt;
use serde_json::json;

use beacon_core::metrics::{ACTIVE_CONNECTIONS, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use beacon_core::{Registry, StructuredLogger};

use crate::error::ApiError;
use crate::handlers::Handler;
use crate::middleware::recorder::ResponseRecorder;
use crate::response::BufferedResponse;

/// Per-request bookkeeping, owned by one middleware invocation.
///
/// `status` stays 200 until the handler finishes and its recorded status is
/// copied in.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub remote_addr: String,
    pub start: Instant,
    pub status: StatusCode,
}

impl RequestContext {
    pub fn from_request(req: &Request) -> Self {
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            remote_addr,
            start: Instant::now(),
            status: StatusCode::OK,
        }
    }
}

/// Shared in-flight counter whose value is pushed into `active_connections`
/// after every change.
#[derive(Debug, Clone)]
pub struct InFlight {
    count: Arc<AtomicI64>,
    registry: Arc<Registry>,
}

impl InFlight {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            count: Arc::new(AtomicI64::new(0)),
            registry,
        }
    }

    pub fn current(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Count one request in. The returned guard counts it out on drop.
    pub fn enter(&self) -> InFlightGuard {
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(now);
        InFlightGuard {
            in_flight: self.clone(),
        }
    }

    fn publish(&self, value: i64) {
        if let Err(e) = self.registry.set(ACTIVE_CONNECTIONS, value as f64) {
            tracing::warn!(error = %e, code = e.code(), "gauge update rejected");
        }
    }
}

/// Decrements the in-flight count on every exit path, including cancellation.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.in_flight.count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.in_flight.publish(now);
    }
}

/// The wrapper every instrumented request passes through.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    registry: Arc<Registry>,
    logger: StructuredLogger,
    in_flight: InFlight,
}

impl Instrumentation {
    pub fn new(registry: Arc<Registry>, logger: StructuredLogger) -> Self {
        let in_flight = InFlight::new(Arc::clone(&registry));
        Self {
            registry,
            logger,
            in_flight,
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub async fn run(&self, handler: &dyn Handler, req: Request) -> Response {
        let mut ctx = RequestContext::from_request(&req);
        let guard = self.in_flight.enter();

        self.logger.info(
            "incoming_request",
            json!({
                "method": ctx.method.as_str(),
                "path": ctx.path,
                "remote_addr": ctx.remote_addr,
            }),
        );

        let mut recorder = ResponseRecorder::new(BufferedResponse::new());
        let outcome = AssertUnwindSafe(handler.serve(req, &mut recorder))
            .catch_unwind()
            .await;
        let elapsed = ctx.start.elapsed();

        let (status, response) = match outcome {
            Ok(()) => (recorder.status(), recorder.into_inner().into_response()),
            Err(panic) => {
                self.logger.error(
                    "handler_panicked",
                    json!({
                        "method": ctx.method.as_str(),
                        "path": ctx.path,
                        "error": panic_message(&*panic),
                    }),
                );
                let err = ApiError::Internal;
                (err.status(), err.into_response())
            }
        };
        ctx.status = status;

        self.record(&ctx, elapsed);

        self.logger.info(
            "request_completed",
            json!({
                "method": ctx.method.as_str(),
                "path": ctx.path,
                "status": ctx.status.as_u16(),
                "duration_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        );

        drop(guard);
        response
    }

    fn record(&self, ctx: &RequestContext, elapsed: Duration) {
        let method = ctx.method.as_str();
        let status = ctx.status.as_u16().to_string();
        if let Err(e) = self
            .registry
            .increment(HTTP_REQUESTS_TOTAL, &[method, &ctx.path, &status])
        {
            tracing::warn!(error = %e, code = e.code(), "request counter update rejected");
        }
        if let Err(e) = self.registry.observe(
            HTTP_REQUEST_DURATION_SECONDS,
            &[method, &ctx.path],
            elapsed.as_secs_f64(),
        ) {
            tracing::warn!(error = %e, code = e.code(), "latency histogram update rejected");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Route `handler` for every method, wrapped by `mw`.
pub fn instrumented<S, H>(mw: Instrumentation, handler: H) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
    H: Handler,
{
    let handler: Arc<dyn Handler> = Arc::new(handler);
    any(move |req: Request| {
        let mw = mw.clone();
        let handler = Arc::clone(&handler);
        async move { mw.run(handler.as_ref(), req).await }
    })
}
