//! Remote issue tracker access

pub mod client;
pub mod error;
mod impl_tracker;
pub mod models;
pub mod traits;

pub use client::GitLabClient;
pub use error::{TrackerError, TrackerResult};
pub use traits::TrackerClient;

#[cfg(test)]
pub(crate) mod mock;
