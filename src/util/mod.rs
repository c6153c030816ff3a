//! Utility types shared across the crate.
//!
//! - [`Error`] / [`Result`] - Error handling

mod error;

pub use error::*;
