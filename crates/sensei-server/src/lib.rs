//! HTTP + WebSocket server for the sensei backend.
//!
//! Exposes the learning-insights REST API and the `/ws/stream` endpoint
//! that file watchers push save events to. See [`server::start`].

pub mod hub;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod stream;
pub mod upload;

pub use hub::ConnectionHub;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
