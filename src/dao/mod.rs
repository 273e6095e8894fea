/// Bout snapshot storage backends.
pub mod bout_store;
/// Persisted model definitions.
pub mod models;
/// Storage abstraction layer shared by all backends.
pub mod storage;
