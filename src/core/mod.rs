pub mod config;
pub mod error;
pub mod execution;
pub mod ingest;
pub mod lifecycle;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod terminal;
