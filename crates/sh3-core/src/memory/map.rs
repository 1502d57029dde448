//! Page lookup table and the fixed attribute windows of the SH-3 address space.

use crate::CoreError;

/// Pages are 1 KiB; the table is keyed by `address >> LOOKUP_SHIFT`.
pub const LOOKUP_SHIFT: u32 = 10;
/// Bytes covered by one lookup entry.
pub const PAGE_BYTES: u32 = 1 << LOOKUP_SHIFT;
/// Number of lookup entries covering the 32-bit address space.
pub const LOOKUP_ENTRIES: usize = 1 << (32 - LOOKUP_SHIFT);
/// Entry value for a page with no handler.
pub const UNMAPPED: u8 = 0xFF;
/// Entry bits holding the handler index.
pub const HANDLER_INDEX_MASK: u8 = 0x3F;
/// Maximum number of handlers; index 63 would collide with [`UNMAPPED`].
pub const MAX_HANDLERS: usize = HANDLER_INDEX_MASK as usize;
/// Ranges based below this address are mirrored across the upper windows.
pub const MIRROR_THRESHOLD: u32 = 0x1000_0000;
/// Distance between two mirrors of a low range.
pub const MIRROR_STRIDE: u32 = 0x2000_0000;
/// Mirrors are placed below this address only.
pub const MIRROR_LIMIT: u32 = 0xE000_0000;

/// Cached/MMU tags stored in the top bits of a lookup entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionAttributes(u8);

impl RegionAttributes {
    /// No attribute bits.
    pub const NONE: Self = Self(0);
    /// Access goes through the cache.
    pub const CACHED: Self = Self(0x40);
    /// Access is translated by the MMU.
    pub const MMU: Self = Self(0x80);
    /// Cached and translated.
    pub const CACHED_MMU: Self = Self(0xC0);

    /// Returns the raw entry bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Extracts the attribute bits from a lookup entry.
    #[must_use]
    pub const fn from_entry(entry: u8) -> Self {
        Self(entry & !HANDLER_INDEX_MASK)
    }

    /// Returns `true` when the cached bit is set.
    #[must_use]
    pub const fn cached(self) -> bool {
        self.0 & Self::CACHED.0 != 0
    }

    /// Returns `true` when the MMU bit is set.
    #[must_use]
    pub const fn mmu(self) -> bool {
        self.0 & Self::MMU.0 != 0
    }
}

/// One of the four fixed windows a mirrored page can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeWindow {
    /// Inclusive start address.
    pub start: u32,
    /// Inclusive end address.
    pub end: u32,
    /// Tags applied to pages mirrored into this window.
    pub attributes: RegionAttributes,
}

/// Windows covering `0x0000_0000..MIRROR_LIMIT`, in address order.
pub const ATTRIBUTE_WINDOWS: [AttributeWindow; 4] = [
    AttributeWindow {
        start: 0x0000_0000,
        end: 0x7FFF_FFFF,
        attributes: RegionAttributes::CACHED_MMU,
    },
    AttributeWindow {
        start: 0x8000_0000,
        end: 0x9FFF_FFFF,
        attributes: RegionAttributes::CACHED,
    },
    AttributeWindow {
        start: 0xA000_0000,
        end: 0xBFFF_FFFF,
        attributes: RegionAttributes::NONE,
    },
    AttributeWindow {
        start: 0xC000_0000,
        end: 0xDFFF_FFFF,
        attributes: RegionAttributes::CACHED_MMU,
    },
];

const fn assert_window_layout() {
    assert!(ATTRIBUTE_WINDOWS[0].start == 0);
    let mut i = 1;
    while i < ATTRIBUTE_WINDOWS.len() {
        assert!(ATTRIBUTE_WINDOWS[i - 1].end + 1 == ATTRIBUTE_WINDOWS[i].start);
        i += 1;
    }
    assert!(ATTRIBUTE_WINDOWS[ATTRIBUTE_WINDOWS.len() - 1].end + 1 == MIRROR_LIMIT);
    assert!(MIRROR_LIMIT % MIRROR_STRIDE == 0);
}

const _: () = assert_window_layout();

/// Returns the tags for a mirrored page at `addr`.
///
/// Addresses at or above [`MIRROR_LIMIT`] never receive mirrors and map to
/// [`RegionAttributes::NONE`].
#[must_use]
pub const fn window_attributes(addr: u32) -> RegionAttributes {
    let mut i = 0;
    while i < ATTRIBUTE_WINDOWS.len() {
        let window = ATTRIBUTE_WINDOWS[i];
        if addr >= window.start && addr <= window.end {
            return window.attributes;
        }
        i += 1;
    }
    RegionAttributes::NONE
}

/// Returns the lookup index of the page containing `addr`.
#[must_use]
pub const fn page_index(addr: u32) -> usize {
    (addr >> LOOKUP_SHIFT) as usize
}

/// Flat page table mapping every 1 KiB page to a handler entry.
#[derive(Clone)]
pub struct LookupTable {
    entries: Box<[u8]>,
}

impl std::fmt::Debug for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapped = self.entries.iter().filter(|&&e| e != UNMAPPED).count();
        f.debug_struct("LookupTable")
            .field("mapped_pages", &mapped)
            .finish()
    }
}

impl Default for LookupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTable {
    /// Creates a table with every page unmapped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![UNMAPPED; LOOKUP_ENTRIES].into_boxed_slice(),
        }
    }

    /// Returns the raw entry for the page containing `addr`.
    #[must_use]
    pub fn entry(&self, addr: u32) -> u8 {
        self.entries[page_index(addr)]
    }

    /// Returns the handler index for `addr`, or `None` when unmapped.
    #[must_use]
    pub fn handler_index(&self, addr: u32) -> Option<usize> {
        match self.entry(addr) {
            UNMAPPED => None,
            entry => Some(usize::from(entry & HANDLER_INDEX_MASK)),
        }
    }

    /// Returns the tags for `addr`, or `None` when unmapped.
    #[must_use]
    pub fn attributes(&self, addr: u32) -> Option<RegionAttributes> {
        match self.entry(addr) {
            UNMAPPED => None,
            entry => Some(RegionAttributes::from_entry(entry)),
        }
    }

    /// Points every page of `[base, base + size)` at `index`.
    ///
    /// Ranges below [`MIRROR_THRESHOLD`] are written once per mirror stride and
    /// tagged by [`window_attributes`], dropping pages at or above
    /// [`MIRROR_LIMIT`]; other ranges are written untagged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyRegion`] for a zero size and
    /// [`CoreError::RegionOverflow`] when the range passes `2^32`.
    pub fn map(&mut self, base: u32, size: u32, index: u8) -> Result<(), CoreError> {
        if size == 0 {
            return Err(CoreError::EmptyRegion { base });
        }
        let end = u64::from(base) + u64::from(size);
        if end > 1 << 32 {
            return Err(CoreError::RegionOverflow { base, size });
        }
        let first = u64::from(base) >> LOOKUP_SHIFT;
        let last = (end - 1) >> LOOKUP_SHIFT;
        let index = index & HANDLER_INDEX_MASK;

        if base < MIRROR_THRESHOLD {
            let limit = u64::from(MIRROR_LIMIT) >> LOOKUP_SHIFT;
            for mirror in (0..MIRROR_LIMIT).step_by(MIRROR_STRIDE as usize) {
                let offset = u64::from(mirror) >> LOOKUP_SHIFT;
                // Mirrored pages never reach the P4 area.
                for page in (first + offset..=last + offset).take_while(|&page| page < limit) {
                    let addr = (page << LOOKUP_SHIFT) as u32;
                    self.entries[page as usize] = index | window_attributes(addr).bits();
                }
            }
        } else {
            for page in first..=last {
                self.entries[page as usize] = index;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        window_attributes, LookupTable, RegionAttributes, LOOKUP_ENTRIES, MIRROR_LIMIT, UNMAPPED,
    };
    use crate::CoreError;
    use rstest::rstest;

    #[rstest]
    #[case(0x0000_1000, RegionAttributes::CACHED_MMU)]
    #[case(0x6000_1000, RegionAttributes::CACHED_MMU)]
    #[case(0x8000_1000, RegionAttributes::CACHED)]
    #[case(0xA000_1000, RegionAttributes::NONE)]
    #[case(0xC000_1000, RegionAttributes::CACHED_MMU)]
    fn low_ranges_mirror_with_window_tags(#[case] addr: u32, #[case] tags: RegionAttributes) {
        let mut table = LookupTable::new();
        table.map(0x0000_1000, 0x10, 3).expect("map");
        assert_eq!(table.handler_index(addr), Some(3));
        assert_eq!(table.attributes(addr), Some(tags));
    }

    #[test]
    fn mirrors_stop_below_limit() {
        let mut table = LookupTable::new();
        table.map(0x0C00_0000, 0x400, 1).expect("map");
        assert_eq!(table.handler_index(MIRROR_LIMIT + 0x0C00_0000), None);
        assert_eq!(table.handler_index(0xAC00_0000), Some(1));
    }

    #[test]
    fn oversized_low_range_is_clipped_at_mirror_limit() {
        let mut table = LookupTable::new();
        table.map(0, 0x5000_0000, 4).expect("map");
        assert_eq!(table.handler_index(0x4FFF_FC00), Some(4));
        assert_eq!(table.attributes(0xDFFF_FC00), Some(RegionAttributes::CACHED_MMU));
        assert_eq!(table.entry(MIRROR_LIMIT), UNMAPPED);
        assert_eq!(table.entry(0xFFFF_FC00), UNMAPPED);
    }

    #[test]
    fn mirror_tail_above_limit_is_not_written() {
        let mut table = LookupTable::new();
        table.map(0, 0x2000_0400, 6).expect("map");
        assert_eq!(table.handler_index(0x2000_0000), Some(6));
        assert_eq!(table.handler_index(0xDFFF_FC00), Some(6));
        assert_eq!(table.entry(MIRROR_LIMIT), UNMAPPED);
    }

    #[test]
    fn high_ranges_are_not_mirrored_or_tagged() {
        let mut table = LookupTable::new();
        table.map(0xB800_0000, 0x1_0000, 5).expect("map");
        assert_eq!(table.attributes(0xB800_0000), Some(RegionAttributes::NONE));
        assert_eq!(table.handler_index(0x1800_0000), None);
        assert_eq!(table.handler_index(0xB801_0000), None);
    }

    #[test]
    fn range_ending_at_top_of_address_space_is_accepted() {
        let mut table = LookupTable::new();
        table.map(0xFF00_0000, 0x00FF_FFFF, 2).expect("map");
        assert_eq!(table.handler_index(0xFFFF_FFFC), Some(2));
        assert_eq!(table.entry(0xFEFF_FFFF), UNMAPPED);
    }

    #[test]
    fn rejects_empty_and_wrapping_ranges() {
        let mut table = LookupTable::new();
        assert_eq!(
            table.map(0x1000, 0, 0),
            Err(CoreError::EmptyRegion { base: 0x1000 })
        );
        assert_eq!(
            table.map(0xFFFF_F000, 0x2000, 0),
            Err(CoreError::RegionOverflow {
                base: 0xFFFF_F000,
                size: 0x2000
            })
        );
    }

    #[test]
    fn window_lookup_covers_every_mirror_base() {
        assert_eq!(window_attributes(0x7FFF_FFFF), RegionAttributes::CACHED_MMU);
        assert_eq!(window_attributes(0x9FFF_FFFF), RegionAttributes::CACHED);
        assert_eq!(window_attributes(0xE000_0000), RegionAttributes::NONE);
        assert_eq!(LookupTable::new().entries.len(), LOOKUP_ENTRIES);
    }
}
