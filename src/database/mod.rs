//! Database connectivity: pool creation, migrations and the shared handle.

pub mod pool;

pub use pool::{create_pool, run_migrations, Database, DatabaseError};
