//! Backend implementations for the audit collections
//!
//! - `memory`: process-local maps, always available
//! - `sqlite`: SQLite with WAL mode (default, requires `sqlite` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;
