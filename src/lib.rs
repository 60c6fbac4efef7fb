//! Queue distribution core for contact centers.
//!
//! Picks which agent(s) receive a waiting call according to the queue's
//! strategy, keeps per-member call statistics, maintains realtime queue and
//! agent metrics from lifecycle events, and evaluates failover thresholds.
//!
//! Modules in dependency order:
//!
//! - [`registry`] - queues and members
//! - [`stats`] - per-member counters and round-robin cursors
//! - [`routing`] - the six selection strategies
//! - [`distribution`] - orchestration, decision log and sequential connect
//! - [`events`] - event recording, realtime metrics and the subscriber feed
//! - [`failover`] - threshold evaluation and the failover scheduler

pub mod api;
pub mod call_control;
pub mod cli;
pub mod config;
pub mod distribution;
pub mod error;
pub mod events;
pub mod failover;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod stats;

pub use error::ErrorKind;
