//! Core business logic modules
//!
//! This module contains pure business logic with no I/O dependencies.
//! Randomness is always taken from a caller-supplied `Rng`.

pub mod customers;
pub mod request_builder;
pub mod sampling;

pub use customers::{parse_registration, SyntheticCustomer};
pub use request_builder::RequestBuilder;
pub use sampling::{resolve_size, sample, Sample};
