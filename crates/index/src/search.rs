//! Binary search primitives over sorted slices.
//!
//! Every function takes a comparer closure reporting the ordering of an
//! element *relative to the probe key* (`Less` = element sorts before the
//! probe). The same primitives therefore serve key-only probes and full
//! `(key, primary_key)` pair probes, and duplicate runs are handled
//! explicitly: `lower_bound`/`upper_bound` land on the edges of the run of
//! equal elements, while the closest finders pick a neighbor when the probe
//! itself is absent.

use core::cmp::Ordering;

/// Finds any index whose element compares equal to the probe.
///
/// With duplicate runs the returned index is an arbitrary member of the run.
pub fn find_first<T, F>(slice: &[T], mut cmp: F) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + ((hi - lo) >> 1);
        match cmp(&slice[mid]) {
            Ordering::Equal => return Some(mid),
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
        }
    }
    None
}

/// Finds the first index of the run of elements equal to the probe.
pub fn lower_bound<T, F>(slice: &[T], mut cmp: F) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + ((hi - lo) >> 1);
        if cmp(&slice[mid]) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo < slice.len() && cmp(&slice[lo]) == Ordering::Equal {
        Some(lo)
    } else {
        None
    }
}

/// Finds the last index of the run of elements equal to the probe.
pub fn upper_bound<T, F>(slice: &[T], mut cmp: F) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + ((hi - lo) >> 1);
        if cmp(&slice[mid]) == Ordering::Greater {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    let index = lo.checked_sub(1)?;
    if cmp(&slice[index]) == Ordering::Equal {
        Some(index)
    } else {
        None
    }
}

/// Finds an exact match, or the nearest neighbor on the requested side.
///
/// An exact match returns its index (an arbitrary member of a duplicate
/// run). Otherwise `select_lower` picks the greatest index comparing
/// `Less`, else the least index comparing `Greater`. `None` when no such
/// neighbor exists on the requested side.
pub fn find_closest<T, F>(slice: &[T], mut cmp: F, select_lower: bool) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    if slice.is_empty() {
        return None;
    }
    let mut lo: isize = -1;
    let mut hi: isize = slice.len() as isize;
    while hi - lo > 1 {
        let mid = lo + ((hi - lo) >> 1);
        match cmp(&slice[mid as usize]) {
            Ordering::Equal => return Some(mid as usize),
            Ordering::Less => lo = mid,
            Ordering::Greater => hi = mid,
        }
    }
    let index = if select_lower { lo } else { hi };
    if index < 0 || index >= slice.len() as isize {
        None
    } else {
        Some(index as usize)
    }
}

/// Finds the smallest index whose element compares greater or equal to the
/// probe; returns `slice.len()` when every element compares less.
pub fn lower_bound_closest<T, F>(slice: &[T], mut cmp: F) -> usize
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + ((hi - lo) >> 1);
        if cmp(&slice[mid]) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Finds the largest index whose element compares less or equal to the
/// probe; `None` when every element compares greater.
pub fn upper_bound_closest<T, F>(slice: &[T], mut cmp: F) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + ((hi - lo) >> 1);
        if cmp(&slice[mid]) == Ordering::Greater {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo.checked_sub(1)
}
