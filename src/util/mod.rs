//! Utility types and functions for Unisens.
//!
//! This module contains fundamental types used throughout the library:
//! - [`DataType`] / [`ByteOrder`] - on-disk signal element encoding
//! - [`NativeType`] / [`Sample`] - in-memory numeric element types
//! - [`Matrix`] - channel-major sample storage
//! - [`Error`] / [`Result`] - Error handling
//! - identifier and filename helpers

mod data_type;
mod error;
mod matrix;
mod names;
mod sample;

pub use data_type::*;
pub use error::*;
pub use matrix::*;
pub use names::*;
pub use sample::*;
