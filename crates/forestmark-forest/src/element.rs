//! Elements as refinement paths inside a coarse tree

/// Deepest refinement level; a path stores three bits per level in a `u64`
pub const MAX_LEVEL: u8 = 21;

/// Bytes used by [`Element::encode`]
pub const ENCODED_LEN: usize = 13;

/// A leaf of the forest
///
/// `path` holds one child index (0..8) per level, the first refinement in
/// the most significant position. Ordering elements of one tree by
/// `(path << 3 * (MAX_LEVEL - level))` gives the depth-first order the forest
/// is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    tree: u32,
    level: u8,
    path: u64,
}

impl Element {
    /// The level-0 element covering a whole tree
    #[inline]
    #[must_use]
    pub const fn root(tree: u32) -> Self {
        Self {
            tree,
            level: 0,
            path: 0,
        }
    }

    pub(crate) const fn from_parts(tree: u32, level: u8, path: u64) -> Self {
        Self { tree, level, path }
    }

    /// Index of the coarse tree this element refines
    #[inline]
    #[must_use]
    pub const fn tree(&self) -> u32 {
        self.tree
    }

    /// Refinement level (0 = the tree itself)
    #[inline]
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Packed child indices
    #[inline]
    #[must_use]
    pub const fn path(&self) -> u64 {
        self.path
    }

    /// Child index taken at `depth` (0-based, `depth < level`)
    #[inline]
    #[must_use]
    pub fn child_index_at(&self, depth: u8) -> usize {
        debug_assert!(depth < self.level);
        let shift = 3 * u32::from(self.level - 1 - depth);
        ((self.path >> shift) & 7) as usize
    }

    /// Child `index` (0..8), `None` at [`MAX_LEVEL`]
    #[inline]
    #[must_use]
    pub fn child(&self, index: u8) -> Option<Self> {
        debug_assert!(index < 8);
        (self.level < MAX_LEVEL).then(|| Self {
            tree: self.tree,
            level: self.level + 1,
            path: self.path << 3 | u64::from(index & 7),
        })
    }

    /// All eight children in storage order, `None` at [`MAX_LEVEL`]
    #[must_use]
    pub fn children(&self) -> Option<[Self; 8]> {
        (self.level < MAX_LEVEL).then(|| {
            std::array::from_fn(|i| Self {
                tree: self.tree,
                level: self.level + 1,
                path: self.path << 3 | i as u64,
            })
        })
    }

    /// Append the fixed-size wire form
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tree.to_le_bytes());
        out.push(self.level);
        out.extend_from_slice(&self.path.to_le_bytes());
    }

    /// Parse the wire form written by [`Element::encode`]
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ENCODED_LEN {
            return None;
        }
        let tree = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let level = bytes[4];
        let path = u64::from_le_bytes(bytes[5..13].try_into().ok()?);
        if level > MAX_LEVEL || (level < MAX_LEVEL && path >> (3 * u32::from(level)) != 0) {
            return None;
        }
        Some(Self { tree, level, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn child_indices_read_back() {
        let e = Element::root(3)
            .child(5)
            .and_then(|c| c.child(2))
            .and_then(|c| c.child(7))
            .unwrap();
        assert_eq!(e.tree(), 3);
        assert_eq!(e.level(), 3);
        assert_eq!(e.child_index_at(0), 5);
        assert_eq!(e.child_index_at(1), 2);
        assert_eq!(e.child_index_at(2), 7);
    }

    #[test]
    fn no_children_past_max_level() {
        let deepest = Element::from_parts(0, MAX_LEVEL, 0);
        assert!(deepest.child(0).is_none());
        assert!(deepest.children().is_none());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Element::decode(&[0; 12]).is_none());
        let mut bytes = Vec::new();
        Element::from_parts(1, 1, 0o77).encode(&mut bytes);
        assert!(Element::decode(&bytes).is_none());
    }

    proptest! {
        #[test]
        fn prop_path_digits_read_back(tree in 0u32..1000, digits in proptest::collection::vec(0u8..8, 0..21)) {
            let element = digits
                .iter()
                .try_fold(Element::root(tree), |e, d| e.child(*d))
                .unwrap();
            prop_assert_eq!(usize::from(element.level()), digits.len());
            for (depth, digit) in digits.iter().enumerate() {
                prop_assert_eq!(element.child_index_at(depth as u8), usize::from(*digit));
            }
        }
    }
}
