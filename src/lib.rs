//! Library crate for derby-bout-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Bout storage backends.
pub mod dao;
/// Wire types of the REST and SSE APIs.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Operations behind the routes and background tasks.
pub mod services;
/// Bout domain and shared application state.
pub mod state;
