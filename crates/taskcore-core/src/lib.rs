//! Business logic for the durable background-task execution core.
//!
//! Built on top of `taskcore-db`'s storage primitives: a state machine
//! (`state`), dispatcher (`dispatch`), liveness monitor (`liveness`),
//! retry/dead-letter engine (`retry`), execution journal (`journal`),
//! and retention reaper (`retention`).

pub mod config;
pub mod dispatch;
pub mod error;
pub mod journal;
pub mod liveness;
pub mod retention;
pub mod retry;
pub mod state;

pub use error::{CoreError, Result};
