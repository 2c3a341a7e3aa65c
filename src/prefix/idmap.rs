//! Ownership bitmap index
//!
//! A prefix record stores its files positionally. Instead of repeating a
//! uid/gid per file, each owner that differs from the directory's own owner
//! gets a bitmap over file positions. When at least one such bitmap exists,
//! a companion bitmap filed under the directory owner's id marks the
//! positions it owns, so every position is covered by exactly one bitmap.
//! When every file matches the directory owner there are no bitmaps at all
//! and ownership is implicit.

use crate::error::{CodecError, CodecResult};
use std::collections::HashMap;
use std::ops::Range;

const WORD_BITS: usize = 64;

/// Bitmap of file positions owned by a single id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap {
    id: u32,
    words: Vec<u64>,
}

impl IdMap {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            words: Vec::new(),
        }
    }

    pub fn from_words(id: u32, words: Vec<u64>) -> Self {
        Self { id, words }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn set(&mut self, pos: usize) {
        let word = pos / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (pos % WORD_BITS);
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.words
            .get(pos / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (pos % WORD_BITS)) != 0)
    }

    /// Number of positions set
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> BitScan<'_> {
        BitScan::new(&self.words)
    }
}

/// Select the next set bit at or after `from`
///
/// Only the words between `from` and the returned bit are touched.
pub fn next_set_bit(words: &[u64], from: usize) -> Option<usize> {
    let mut index = from / WORD_BITS;
    if index >= words.len() {
        return None;
    }

    // Mask off the bits below `from` in the first word
    let mut word = words[index] & (u64::MAX << (from % WORD_BITS));
    loop {
        if word != 0 {
            return Some(index * WORD_BITS + word.trailing_zeros() as usize);
        }
        index += 1;
        if index >= words.len() {
            return None;
        }
        word = words[index];
    }
}

/// Iterator over set positions of a bitmap
#[derive(Debug, Clone)]
pub struct BitScan<'a> {
    words: &'a [u64],
    next: usize,
}

impl<'a> BitScan<'a> {
    pub fn new(words: &'a [u64]) -> Self {
        Self { words, next: 0 }
    }
}

impl Iterator for BitScan<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let pos = next_set_bit(self.words, self.next)?;
        self.next = pos + 1;
        Some(pos)
    }
}

/// Positions owned by one id
#[derive(Debug, Clone)]
pub enum OwnedPositions<'a> {
    /// Explicit bitmap
    Bits(BitScan<'a>),
    /// Implicit ownership of every position
    Range(Range<usize>),
    Empty,
}

impl Iterator for OwnedPositions<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            OwnedPositions::Bits(scan) => scan.next(),
            OwnedPositions::Range(range) => range.next(),
            OwnedPositions::Empty => None,
        }
    }
}

/// Ownership index for one owner kind (users or groups) of a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipIndex {
    owner: u32,
    len: usize,
    /// Empty when nothing diverges; otherwise the owner's own bitmap first,
    /// followed by divergent ids in order of first appearance
    maps: Vec<IdMap>,
}

impl OwnershipIndex {
    /// Build from the owner id of each file position
    pub fn build<I>(ids: I, owner: u32) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut divergent: Vec<IdMap> = Vec::new();
        let mut slots: HashMap<u32, usize> = HashMap::new();
        let mut own = IdMap::new(owner);
        let mut len = 0;

        for (pos, id) in ids.into_iter().enumerate() {
            len = pos + 1;
            if id == owner {
                own.set(pos);
                continue;
            }
            let slot = *slots.entry(id).or_insert_with(|| {
                divergent.push(IdMap::new(id));
                divergent.len() - 1
            });
            divergent[slot].set(pos);
        }

        let maps = if divergent.is_empty() {
            Vec::new()
        } else {
            let mut maps = Vec::with_capacity(divergent.len() + 1);
            maps.push(own);
            maps.extend(divergent);
            maps
        };

        Self { owner, len, maps }
    }

    /// Reassemble a decoded collection and check it partitions `len` positions
    pub fn from_parts(owner: u32, mut maps: Vec<IdMap>, len: usize) -> CodecResult<Self> {
        if let Some(idx) = maps.iter().position(|m| m.id == owner) {
            if idx != 0 {
                let own = maps.remove(idx);
                maps.insert(0, own);
            }
        }
        let index = Self { owner, len, maps };
        index.validate()?;
        Ok(index)
    }

    /// Check the partition invariant
    pub fn validate(&self) -> CodecResult<()> {
        if self.maps.is_empty() {
            return Ok(());
        }

        if self.maps[0].id != self.owner {
            return Err(CodecError::InvalidOwnershipIndex(format!(
                "divergent bitmaps present but no bitmap for owner {}",
                self.owner
            )));
        }
        if self.maps.len() == 1 {
            return Err(CodecError::InvalidOwnershipIndex(format!(
                "only the owner's own bitmap ({}) is present",
                self.owner
            )));
        }

        let total_words = self.len.div_ceil(WORD_BITS);
        let mut covered = vec![0u64; total_words];
        let mut seen = HashMap::with_capacity(self.maps.len());

        for map in &self.maps {
            if seen.insert(map.id, ()).is_some() {
                return Err(CodecError::InvalidOwnershipIndex(format!(
                    "duplicate bitmap for id {}",
                    map.id
                )));
            }
            for (i, &word) in map.words.iter().enumerate() {
                if word == 0 {
                    continue;
                }
                let Some(acc) = covered.get_mut(i) else {
                    return Err(CodecError::InvalidOwnershipIndex(format!(
                        "id {} owns positions beyond {} files",
                        map.id, self.len
                    )));
                };
                if *acc & word != 0 {
                    return Err(CodecError::InvalidOwnershipIndex(format!(
                        "id {} overlaps another owner",
                        map.id
                    )));
                }
                *acc |= word;
            }
        }

        for (i, &acc) in covered.iter().enumerate() {
            let bits_here = (self.len - i * WORD_BITS).min(WORD_BITS);
            let full = if bits_here == WORD_BITS {
                u64::MAX
            } else {
                (1u64 << bits_here) - 1
            };
            if acc & !full != 0 {
                return Err(CodecError::InvalidOwnershipIndex(format!(
                    "positions set beyond {} files",
                    self.len
                )));
            }
            if acc != full {
                let missing = next_set_bit(&[!acc & full], 0).unwrap_or(0) + i * WORD_BITS;
                return Err(CodecError::InvalidOwnershipIndex(format!(
                    "position {} has no owner",
                    missing
                )));
            }
        }

        Ok(())
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether any position belongs to someone other than the owner
    pub fn is_divergent(&self) -> bool {
        !self.maps.is_empty()
    }

    /// Bitmaps in encoded order
    pub fn maps(&self) -> &[IdMap] {
        &self.maps
    }

    /// Index of the bitmap for `id` in the collection
    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.maps.iter().position(|m| m.id == id)
    }

    /// Owner of the file at `pos`; `found` is false when the position is
    /// out of range
    pub fn owner_for_position(&self, pos: usize) -> (u32, bool) {
        if pos >= self.len {
            return (self.owner, false);
        }
        if self.maps.is_empty() {
            return (self.owner, true);
        }
        match self.maps.iter().find(|m| m.contains(pos)) {
            Some(map) => (map.id, true),
            None => (self.owner, false),
        }
    }

    /// Positions owned by `id`
    pub fn scan(&self, id: u32) -> OwnedPositions<'_> {
        if self.maps.is_empty() {
            return if id == self.owner {
                OwnedPositions::Range(0..self.len)
            } else {
                OwnedPositions::Empty
            };
        }
        match self.maps.iter().find(|m| m.id == id) {
            Some(map) => OwnedPositions::Bits(map.iter()),
            None => OwnedPositions::Empty,
        }
    }

    /// Every id with at least one position, paired with its positions
    pub fn owners(&self) -> Vec<(u32, OwnedPositions<'_>)> {
        if self.maps.is_empty() {
            if self.len == 0 {
                return Vec::new();
            }
            return vec![(self.owner, OwnedPositions::Range(0..self.len))];
        }
        self.maps
            .iter()
            .map(|m| (m.id, OwnedPositions::Bits(m.iter())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_set_bit_masks_visited_bits() {
        let words = [0b1011u64, 0, 1u64 << 63];
        assert_eq!(next_set_bit(&words, 0), Some(0));
        assert_eq!(next_set_bit(&words, 1), Some(1));
        assert_eq!(next_set_bit(&words, 2), Some(3));
        assert_eq!(next_set_bit(&words, 4), Some(191));
        assert_eq!(next_set_bit(&words, 192), None);
        assert_eq!(next_set_bit(&[], 0), None);
    }

    #[test]
    fn test_bitscan_collects_all() {
        let mut map = IdMap::new(7);
        for pos in [0, 5, 63, 64, 200] {
            map.set(pos);
        }
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![0, 5, 63, 64, 200]);
        assert_eq!(map.count(), 5);
        assert!(map.contains(64));
        assert!(!map.contains(65));
    }

    #[test]
    fn test_build_no_divergence() {
        let index = OwnershipIndex::build([1, 1, 1], 1);
        assert!(!index.is_divergent());
        assert!(index.maps().is_empty());
        assert_eq!(index.owner_for_position(2), (1, true));
        assert_eq!(index.owner_for_position(3), (1, false));
        assert_eq!(index.scan(1).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(index.scan(9).count(), 0);
        index.validate().unwrap();
    }

    #[test]
    fn test_build_divergent() {
        let index = OwnershipIndex::build([3, 2, 3, 4], 2);
        assert!(index.is_divergent());
        assert_eq!(index.position_of(2), Some(0));
        assert_eq!(index.position_of(3), Some(1));
        assert_eq!(index.position_of(4), Some(2));
        assert_eq!(index.position_of(5), None);

        assert_eq!(index.scan(3).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(index.scan(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(index.owner_for_position(3), (4, true));
        index.validate().unwrap();
    }

    #[test]
    fn test_build_all_divergent_keeps_empty_owner_map() {
        let index = OwnershipIndex::build([5, 5], 1);
        assert_eq!(index.maps().len(), 2);
        assert_eq!(index.maps()[0].count(), 0);
        index.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut a = IdMap::new(1);
        a.set(0);
        a.set(1);
        let mut b = IdMap::new(2);
        b.set(1);
        let err = OwnershipIndex::from_parts(1, vec![a, b], 2).unwrap_err();
        assert!(matches!(err, CodecError::InvalidOwnershipIndex(_)));
    }

    #[test]
    fn test_validate_rejects_gap_and_overflow() {
        let mut a = IdMap::new(1);
        a.set(0);
        let mut b = IdMap::new(2);
        b.set(2);
        assert!(OwnershipIndex::from_parts(1, vec![a.clone(), b.clone()], 3).is_err());
        assert!(OwnershipIndex::from_parts(1, vec![a, b], 2).is_err());
    }

    #[test]
    fn test_validate_rejects_owner_only() {
        let mut a = IdMap::new(1);
        a.set(0);
        assert!(OwnershipIndex::from_parts(1, vec![a], 1).is_err());
    }

    #[test]
    fn test_from_parts_reorders_owner_first() {
        let mut other = IdMap::new(9);
        other.set(0);
        let mut own = IdMap::new(1);
        own.set(1);
        let index = OwnershipIndex::from_parts(1, vec![other, own], 2).unwrap();
        assert_eq!(index.maps()[0].id(), 1);
        assert_eq!(index, OwnershipIndex::build([9, 1], 1));
    }

    #[test]
    fn test_partition_across_word_boundary() {
        let ids: Vec<u32> = (0..130).map(|i| if i % 3 == 0 { 7 } else { 1 }).collect();
        let index = OwnershipIndex::build(ids.iter().copied(), 1);
        index.validate().unwrap();
        let mut seen: Vec<usize> = index.owners().into_iter().flat_map(|(_, p)| p).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..130).collect::<Vec<_>>());
    }
}
