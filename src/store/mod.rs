//! Persistence layer — libSQL-backed trip storage.

pub mod libsql_backend;
mod schema;
pub mod traits;

pub use libsql_backend::LibSqlTripStore;
pub use traits::TripStore;
