//! Route handlers for the rpiped listeners.
//!
//! `pipe` carries the four protocol endpoints on the job listener; the
//! rest live on the metrics listener.

pub mod debug;
pub mod health;
pub mod metrics;
pub mod pipe;
