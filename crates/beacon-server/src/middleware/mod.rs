//! Request middleware.
//!
//! - `recorder`   : status-capturing decorator around the response sink
//! - `instrument` : metrics + structured logs around every wrapped handler

pub mod instrument;
pub mod recorder;

pub use instrument::{instrumented, InFlight, InFlightGuard, Instrumentation, RequestContext};
pub use recorder::ResponseRecorder;
