//! PRU Common Library
//!
//! This crate provides the pieces of the PRU generic driver that are shared
//! between the host-side scheduler and its tooling: the binary layout of the
//! PRU data RAM, the BeagleBone header pin map and the configuration types.
//!
//! # Module Structure
//!
//! - [`consts`] - Memory sizes, default paths and limits
//! - [`unit`] - PRU core selection
//! - [`layout`] - Statics block, task header and per-mode record offsets
//! - [`pins`] - Logical pin parsing and the pin resolver
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pru_common::pins::{resolve, LogicalPin, PinTarget};
//!
//! let target = resolve(LogicalPin::Raw(37));
//! assert_eq!(target, PinTarget::Bank { bank: 1, bit: 5 });
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod consts;
pub mod layout;
pub mod pins;
pub mod prelude;
pub mod unit;
