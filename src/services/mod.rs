/// Bout commands, fresh bouts and read-only projections.
pub mod bout_service;
/// Background ticker driving the bout clocks.
pub mod clock_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Bout persistence writer and startup recovery.
pub mod persistence_service;
/// Roster loading and lookups.
pub mod roster_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with backoff.
pub mod storage_supervisor;
