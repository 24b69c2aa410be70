//! Server lifecycle.
//!
//! ```text
//! Starting  : build router, bind listener
//! Listening : accept loop on a background task, foreground waits for a signal
//! Draining  : stop accepting, let in-flight requests finish (bounded)
//! Stopped   : clean, or after the drain deadline abandoned what was left
//! ```
//!
//! States only ever move forward. Bind/serve failures and an expired drain
//! deadline are returned as errors; the binary turns them into a non-zero exit.

mod listener;
pub mod signals;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use beacon_core::error::{BeaconError, Result};
use beacon_core::StructuredLogger;

pub use signals::{shutdown_signal, Signal};

pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Request header read. Handlers that read a body apply it there too.
    pub read: Duration,
    /// Longest a response write may stall before the connection is dropped.
    /// Handlers always run to completion.
    pub write: Duration,
    /// Keep-alive connection with nothing in flight.
    pub idle: Duration,
    /// Graceful drain deadline.
    pub drain: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: READ_TIMEOUT,
            write: WRITE_TIMEOUT,
            idle: IDLE_TIMEOUT,
            drain: DRAIN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        })
    }
}

/// Forward-only state holder. Observers subscribe through a watch channel.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next`, which must be strictly later than the current state.
    pub fn advance(&self, next: LifecycleState) -> Result<()> {
        let mut from = None;
        self.tx.send_if_modified(|cur| {
            if next > *cur {
                *cur = next;
                true
            } else {
                from = Some(*cur);
                false
            }
        });
        match from {
            None => {
                tracing::debug!(state = %next, "lifecycle transition");
                Ok(())
            }
            Some(cur) => Err(BeaconError::InvalidTransition(format!("{cur} -> {next}"))),
        }
    }
}

/// Owns the router, the fixed timeouts and the state machine for one run.
pub struct ServerLifecycle {
    router: Router,
    logger: StructuredLogger,
    timeouts: Timeouts,
    lifecycle: Lifecycle,
}

impl ServerLifecycle {
    pub fn new(router: Router, logger: StructuredLogger) -> Self {
        Self {
            router,
            logger,
            timeouts: Timeouts::default(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Bind the listener. A failure is fatal and stops the lifecycle.
    pub async fn bind(&self, addr: SocketAddr) -> Result<TcpListener> {
        match TcpListener::bind(addr).await {
            Ok(listener) => Ok(listener),
            Err(e) => {
                let err = BeaconError::Bind(e);
                self.logger.error(
                    "server_error",
                    json!({ "error": err.to_string(), "address": addr.to_string() }),
                );
                self.lifecycle.advance(LifecycleState::Stopped)?;
                Err(err)
            }
        }
    }

    /// Serve on `listener` until `signal` resolves, then drain.
    ///
    /// `Ok` means every in-flight request finished before the drain deadline.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = Signal>,
    {
        let port = listener.local_addr().map_err(BeaconError::Bind)?.port();
        let (drain_tx, drain_rx) = watch::channel(false);
        let mut server = tokio::spawn(listener::accept_loop(
            listener,
            self.router.clone(),
            self.timeouts,
            drain_rx,
        ));
        self.lifecycle.advance(LifecycleState::Listening)?;
        self.logger.info("server_listening", json!({ "port": port }));

        tokio::pin!(signal);
        let signal = tokio::select! {
            sig = &mut signal => sig,
            res = &mut server => {
                let err = match res {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => BeaconError::Serve("listener stopped unexpectedly".into()),
                    Err(join) => BeaconError::Serve(format!("listener task failed: {join}")),
                };
                self.logger.error("server_error", json!({ "error": err.to_string() }));
                self.lifecycle.advance(LifecycleState::Stopped)?;
                return Err(err);
            }
        };

        self.lifecycle.advance(LifecycleState::Draining)?;
        self.logger.info(
            "shutting_down_server",
            json!({ "signal": signal.to_string() }),
        );
        let _ = drain_tx.send(true);

        let outcome = match tokio::time::timeout(self.timeouts.drain, &mut server).await {
            Ok(Ok(res)) => res,
            Ok(Err(join)) => Err(BeaconError::Serve(format!("listener task failed: {join}"))),
            Err(_) => {
                server.abort();
                let _ = server.await;
                Err(BeaconError::DrainTimeout(self.timeouts.drain))
            }
        };

        self.lifecycle.advance(LifecycleState::Stopped)?;
        match &outcome {
            Ok(()) => self.logger.info("server_stopped", json!({})),
            Err(e) => self.logger.error(
                "server_shutdown_error",
                json!({ "error": e.to_string(), "code": e.code() }),
            ),
        }
        outcome
    }
}
