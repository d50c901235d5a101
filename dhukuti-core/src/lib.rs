//! Dhukuti Core Library
//!
//! Core functionality for Dhukuti - rotating savings circles run by
//! unanimous member consent. This crate owns the data model, the `SQLite`
//! store and the two consensus engines; transport and authentication live
//! in `dhukuti-api`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod circle;

pub use circle::{CircleError, CircleManager};
