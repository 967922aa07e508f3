//! Hot-tier payload scanning.
//!
//! The hot tier keeps payloads in one contiguous column, so 32-bit integer
//! payloads can be compared eight (AVX2) or four (SSE2) lanes at a time.
//! Whether a payload type gets the vector path is decided by its
//! [`HotScan`] impl; everything else falls back to a linear scan.

/// Equality scan over a hot-tier payload column.
pub trait HotScan: PartialEq + Sized {
    /// Index of the first element equal to `needle`.
    #[inline]
    fn scan(haystack: &[Self], needle: &Self) -> Option<usize> {
        haystack.iter().position(|value| value == needle)
    }
}

macro_rules! linear_scan {
    ($($ty:ty),* $(,)?) => {
        $(impl HotScan for $ty {})*
    };
}

linear_scan!(u8, u16, u64, u128, usize, i8, i16, i64, i128, isize, char, bool, String, &str);

impl HotScan for u32 {
    #[inline]
    fn scan(haystack: &[Self], needle: &Self) -> Option<usize> {
        find_exact_u32(haystack, *needle)
    }
}

impl HotScan for i32 {
    #[inline]
    fn scan(haystack: &[Self], needle: &Self) -> Option<usize> {
        // SAFETY: i32 and u32 have identical size and alignment, and equality
        // on the bit patterns matches equality on the values.
        let lanes = unsafe { std::slice::from_raw_parts(haystack.as_ptr().cast::<u32>(), haystack.len()) };
        find_exact_u32(lanes, *needle as u32)
    }
}

// =============================================================================
// 32-bit lane compare
// =============================================================================

/// Find the first index where `lanes[i] == target`.
#[inline]
#[must_use]
pub fn find_exact_u32(lanes: &[u32], target: u32) -> Option<usize> {
    #[cfg(target_arch = "x86_64")]
    {
        if std::is_x86_feature_detected!("avx2") {
            // SAFETY: feature detected at runtime.
            return unsafe { find_exact_u32_avx2(lanes, target) };
        }
        // SAFETY: SSE2 is part of the x86_64 baseline.
        return unsafe { find_exact_u32_sse2(lanes, target) };
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        find_exact_u32_scalar(lanes, target)
    }
}

/// Portable fallback, also used for the tail of the vector paths.
#[inline]
#[must_use]
pub fn find_exact_u32_scalar(lanes: &[u32], target: u32) -> Option<usize> {
    lanes.iter().position(|&lane| lane == target)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn find_exact_u32_sse2(lanes: &[u32], target: u32) -> Option<usize> {
    use std::arch::x86_64::{_mm_cmpeq_epi32, _mm_loadu_si128, _mm_movemask_ps, _mm_castsi128_ps, _mm_set1_epi32};

    let len = lanes.len();
    let mut i = 0;
    // SAFETY: every load reads 4 lanes starting at `i` with `i + 4 <= len`.
    unsafe {
        let needle = _mm_set1_epi32(target as i32);
        while i + 4 <= len {
            let chunk = _mm_loadu_si128(lanes.as_ptr().add(i).cast());
            let mask = _mm_movemask_ps(_mm_castsi128_ps(_mm_cmpeq_epi32(chunk, needle)));
            if mask != 0 {
                return Some(i + mask.trailing_zeros() as usize);
            }
            i += 4;
        }
    }
    find_exact_u32_scalar(&lanes[i..], target).map(|j| i + j)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn find_exact_u32_avx2(lanes: &[u32], target: u32) -> Option<usize> {
    use std::arch::x86_64::{_mm256_castsi256_ps, _mm256_cmpeq_epi32, _mm256_loadu_si256, _mm256_movemask_ps, _mm256_set1_epi32};

    let len = lanes.len();
    let mut i = 0;
    // SAFETY: every load reads 8 lanes starting at `i` with `i + 8 <= len`.
    unsafe {
        let needle = _mm256_set1_epi32(target as i32);
        while i + 8 <= len {
            let chunk = _mm256_loadu_si256(lanes.as_ptr().add(i).cast());
            let mask = _mm256_movemask_ps(_mm256_castsi256_ps(_mm256_cmpeq_epi32(chunk, needle)));
            if mask != 0 {
                return Some(i + mask.trailing_zeros() as usize);
            }
            i += 8;
        }
    }
    find_exact_u32_scalar(&lanes[i..], target).map(|j| i + j)
}
