//! Slot / dart identifier width
//!
//! This module contains the single type alias used throughout the crate to identify a
//! row in a [`ChunkArrayContainer`](crate::container::ChunkArrayContainer): a dart slot, a
//! vertex slot, an edge slot, etc. all share this representation.

// ------ CONTENT

cfg_if::cfg_if! {
    if #[cfg(feature = "wide-keys")] {
        /// Slot / dart identifier representation type.
        ///
        /// Widened to `u64` by the `wide-keys` feature for maps that outgrow 4 billion
        /// darts or cells.
        pub type Key = u64;
    } else {
        /// Slot / dart identifier representation type.
        pub type Key = u32;
    }
}

/// Sentinel value used for "no slot" / "unembedded" / "null dart".
pub const NULL_KEY: Key = Key::MAX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_key_is_max() {
        assert_eq!(NULL_KEY, Key::MAX);
    }
}
