//! Postgres-backed storage for the task execution core.
//!
//! This crate owns the schema, typed models, and query functions. It has
//! no opinions about scheduling, retries, or liveness -- those live in
//! `taskcore-core` and are built on top of the primitives exposed here.

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod queries;

pub use config::DbConfig;
pub use error::{Result, StoreError};
