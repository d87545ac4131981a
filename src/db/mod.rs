pub mod executor;
pub mod pool;
pub mod schema;
