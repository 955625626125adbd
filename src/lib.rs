//! This library crate contains everything needed to bridge synchronous callers onto an append-only message bus.
//!
//! Submodules have been introduced to split responsibilities. Each module has a specific focus
//! and they together form a chain of dependencies from the low-level [`library`], over the
//! message formats of the [`domain`], through the executable [`harness`], up to the high-level
//! [`modules`](module) and contained service implementations.

#![deny(missing_docs)]

pub mod constants;
pub mod domain;
pub mod harness;
pub mod library;
pub mod module;
