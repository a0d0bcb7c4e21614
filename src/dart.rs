//! Basic dart structure
//!
//! Useful definitions of this module being re-exported, the user should most likely not
//! interact directly with it.
//!
//! This module contains all code used to model darts as the atomic element of the
//! combinatorial map. This does not include any form of geometric or attribute embedding,
//! which is handled separately by the container and embedding layers.

// ------ IMPORTS

use crate::key::{Key, NULL_KEY};

// ------ CONTENT

/// Type definition for dart identifiers.
///
/// This is used for better control over memory usage and ID encoding; see [`Key`] for the
/// underlying representation (`u32` by default, `u64` with the `wide-keys` feature).
pub type DartId = Key;

/// Null dart identifier value.
pub const NULL_DART_ID: DartId = NULL_KEY;

/// Dart object
///
/// Structure used to represent darts. This does not include any geometric or attribute
/// embedding; embeddings are resolved separately through a map's orbit machinery (see
/// [`Cell`](crate::orbit::Cell)).
///
/// # Example
///
/// ```
/// use cmap_core::Dart;
///
/// let mut darts = vec![Dart::NULL];
/// darts.extend((1..11).map(Dart::from));
///
/// (0..11).for_each(|i| assert_eq!(i as u32, darts[i].id()));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dart {
    id: DartId,
}

impl Dart {
    /// Null dart value. Used as the [`Default`] value for the structure, and as the
    /// fixed point every φ permutation maps an unsewn dart to.
    pub const NULL: Dart = Dart { id: NULL_DART_ID };

    /// Getter for the dart's identifier. Exposed as a method rather than a public field
    /// since there is no good reason to allow outside code to overwrite it.
    #[must_use = "unused identifier"]
    pub fn id(&self) -> DartId {
        self.id
    }

    /// Return whether this dart is the null dart.
    #[must_use = "unused boolean"]
    pub fn is_null(&self) -> bool {
        self.id == NULL_DART_ID
    }
}

impl From<DartId> for Dart {
    fn from(id: DartId) -> Self {
        Self { id }
    }
}

impl Default for Dart {
    fn default() -> Self {
        Self::NULL
    }
}

// ------ TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_dart_is_null() {
        assert!(Dart::NULL.is_null());
        assert_eq!(Dart::default(), Dart::NULL);
    }

    #[test]
    fn nonnull_dart_is_not_null() {
        assert!(!Dart::from(1).is_null());
    }

    #[test]
    fn equality_is_by_id() {
        assert_eq!(Dart::from(5), Dart::from(5));
        assert_ne!(Dart::from(5), Dart::from(6));
    }
}
