//! Vidforge orchestrator API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! scheduler, dispatcher) so integration tests and the binary
//! entrypoint can both access them.

pub mod background;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod state;
