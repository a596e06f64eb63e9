//! Activity Broker - follower-aware notification broker
//!
//! A single-threaded, readiness-driven broker. One event source publishes
//! numbered activity events (follows, unfollows, status updates, private
//! messages, broadcasts); the broker restores their order and forwards each
//! one to the connected subscribers it concerns.
//!
//! Everything runs inside [`reactor::Reactor`] ticks on one thread.
//! [`runner::Broker`] wires the pipeline together.

pub mod config;
pub mod error;
pub mod notification;
pub mod observer;
pub mod ordering;
pub mod reactor;
pub mod routing;
pub mod runner;
pub mod subscription;
pub mod transport;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{BrokerError, Result};
pub use runner::{ApplicationRunner, Broker};
