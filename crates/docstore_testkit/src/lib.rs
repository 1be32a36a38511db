//! # Docstore Testkit
//!
//! Test utilities for docstore.
//!
//! This crate provides:
//! - Sample entities (`Note`, `Package`) and a directory parser
//! - Temporary collection and store fixtures
//! - An archive builder for import tests
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docstore_testkit::prelude::*;
//!
//! #[test]
//! fn writes_are_visible() {
//!     let collection = TestCollection::new();
//!     collection.write(&[Note::new("a", 1)]);
//!     assert_eq!(collection.all().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
