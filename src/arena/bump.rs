//! Bump pointer arithmetic shared by the arenas
//!
//! Design: pure address math, no state. Each arena keeps its own cursor and
//! asks `bump` whether the next aligned region fits.

/// Result of a successful bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bumped {
    /// Aligned start address of the new region
    pub address: usize,
    /// Offset from `base` just past the region
    pub end_offset: usize,
}

/// Fit `size` bytes at the first `align`-aligned address at or after
/// `base + offset`, within `base + capacity`.
///
/// Returns `None` if the region does not fit (or the math overflows).
#[inline(always)]
pub fn bump(base: usize, offset: usize, capacity: usize, size: usize, align: usize) -> Option<Bumped> {
    debug_assert!(align.is_power_of_two(), "alignment must be power of 2");
    debug_assert!(offset <= capacity, "offset past end of region");

    let address = align_up(base.checked_add(offset)?, align);
    let end = address.checked_add(size)?;
    let limit = base.checked_add(capacity)?;

    if end <= limit {
        Some(Bumped { address, end_offset: end - base })
    } else {
        None
    }
}

/// Align address upward to next multiple of alignment
#[inline(always)]
pub const fn align_up(addr: usize, align: usize) -> usize {
    (addr.wrapping_add(align).wrapping_sub(1)) & !align.wrapping_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 16), 16);
        assert_eq!(align_up(4097, 4096), 8192);
    }

    #[test]
    fn bump_aligns_from_offset() {
        let bumped = bump(1024, 40, 64, 8, 16).unwrap();
        assert_eq!(bumped.address, 1024 + 48);
        assert_eq!(bumped.end_offset, 56);
    }

    #[test]
    fn bump_rejects_region_past_capacity() {
        // 40 bytes used, next aligned address is +48, 48 + 40 > 64
        assert!(bump(1024, 40, 64, 40, 16).is_none());
    }

    #[test]
    fn bump_exact_fit() {
        let bumped = bump(0, 0, 64, 64, 16).unwrap();
        assert_eq!(bumped.end_offset, 64);
    }

    #[test]
    fn bump_overflow_is_none() {
        assert!(bump(usize::MAX - 4, 0, 4, 16, 16).is_none());
    }
}
