//! Dart-level topology storage
//!
//! This module holds the one piece of the crate that [`crate::cmap1`], [`crate::cmap2`] and
//! [`crate::cmap3`] all share: [`DartStore`], the φ-permutation columns and per-dart
//! embedding indices. The CMap types themselves (orbit walks, `add_face`, sew/unsew) build on
//! top of it but are not part of this module, since they differ by dimension.

mod dart_store;

pub use dart_store::DartStore;
