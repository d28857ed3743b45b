use std::sync::atomic::{AtomicU64, Ordering};

/// The smallest table the default sizing will pick.
pub const MIN_DEFAULT_BITS: u32 = 25;
/// The largest table the default sizing will pick.
pub const MAX_DEFAULT_BITS: u32 = 30;
/// The largest table that can be asked for.
pub const MAX_BITS: u32 = 40;

/// A lossy set of 64-bit state fingerprints shared by every worker. Each
/// slot remembers the last fingerprint that landed on it, so a state is only
/// reported as seen if nothing else overwrote its slot in between. Two
/// distinct states that share a fingerprint, or that race on the same slot,
/// can make a state look like a duplicate; the search accepts that.
pub struct FingerprintTable {
    slots: Box<[AtomicU64]>,
    mask: u64,
}

impl FingerprintTable {
    /// A table of `2^bits` slots, all holding `fill`.
    ///
    /// # Panics
    ///
    /// If `bits` exceeds [`MAX_BITS`].
    #[must_use]
    pub fn new(bits: u32, fill: u64) -> Self {
        assert!(bits <= MAX_BITS, "A table of 2^{bits} slots is too large");
        let len = 1usize << bits;
        Self {
            slots: (0..len).map(|_| AtomicU64::new(fill)).collect(),
            mask: len as u64 - 1,
        }
    }

    /// Table size scaled to the number of cells of the puzzle: `2^25` slots
    /// up to 128 cells, doubling with the cell count up to `2^30`.
    #[must_use]
    pub fn default_bits(num_cells: usize) -> u32 {
        let scale = (num_cells / 128).max(1).ilog2();
        (MIN_DEFAULT_BITS + scale).min(MAX_DEFAULT_BITS)
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.slots.len().trailing_zeros()
    }

    /// Overwrite every slot with `fill`. A fresh random fill keeps a stale
    /// table from matching fingerprints of a new search.
    pub fn reset(&mut self, fill: u64) {
        for slot in &mut self.slots {
            *slot.get_mut() = fill;
        }
    }

    /// Record `fingerprint` and report whether its slot held something else.
    #[inline(always)]
    pub fn insert_if_new(&self, fingerprint: u64) -> bool {
        let slot = &self.slots[(fingerprint & self.mask) as usize];
        slot.swap(fingerprint, Ordering::Relaxed) != fingerprint
    }
}
