//! `edugate-core`: shared identifiers and the domain error model.
//!
//! Nothing in here performs IO.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
