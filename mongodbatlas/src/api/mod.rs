//! MongoDB Atlas Admin API client

pub mod client;
pub mod clusters;
pub mod common;
pub mod error;
pub mod pool;
pub mod projects;

#[cfg(test)]
mod test_helpers;

pub use client::{Client, RetryConfig};
pub use error::ApiError;
