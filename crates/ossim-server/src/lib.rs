//! OS Simulator HTTP Server
//!
//! JSON over HTTP in front of an [`ossim_runtime::Controller`]. Handlers are
//! thin: parse the body, call the controller, map [`ossim_core::SimError`]
//! onto a status code.
//!
//! ```text
//! /api/processes           POST GET DELETE
//! /api/simulation/*        start pause resume stop reset step
//!                          state timeline gantt algorithm io-settings mode
//! /api/interruptions       POST
//! /api/memory/*            initialize allocate deallocate/{pid} state algorithm
//! ```

pub mod dto;
pub mod error;
mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::router;
