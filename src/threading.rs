//! Splitting the kept-axis space of a reduction into independent ranges.
//!
//! Every range builds its own cursors with `Cursor::seek`, so ranges can be
//! processed in any order or concurrently. With the `parallel` feature the
//! ranges are handed to rayon by recursive halving with `rayon::join`.

use std::ops::Range;

use smallvec::SmallVec;

/// Stack-allocated Vec for multi-indices. 8 covers most ranks.
pub(crate) type SVec<T> = SmallVec<[T; 8]>;

/// Minimum number of input elements before a reduction is split across threads.
pub const MIN_PARALLEL_LEN: usize = 1 << 15;

// ---- parallel enabled: alias to real Send/Sync ----

#[cfg(feature = "parallel")]
pub trait MaybeSend: Send {}
#[cfg(feature = "parallel")]
impl<T: Send> MaybeSend for T {}

#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync> MaybeSync for T {}

#[cfg(feature = "parallel")]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(feature = "parallel")]
impl<T: Send + Sync> MaybeSendSync for T {}

// ---- parallel disabled: blanket impl for all types ----

#[cfg(not(feature = "parallel"))]
pub trait MaybeSend {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSend for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSync for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSendSync {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSendSync for T {}

/// Split `0..len` into at most `parts` contiguous, disjoint, non-empty ranges.
///
/// Range sizes differ by at most one, larger ranges first.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1).min(len);
    if parts == 0 {
        return Vec::new();
    }
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|p| {
            let size = base + usize::from(p < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Run `f` over `0..len` and concatenate the per-range outputs in order.
///
/// `work` is the total number of input elements behind the `len` outputs; the
/// split only happens above [`MIN_PARALLEL_LEN`].
#[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
pub(crate) fn map_ranges<R, F>(len: usize, work: usize, f: F) -> Vec<R>
where
    R: MaybeSend,
    F: Fn(Range<usize>) -> Vec<R> + MaybeSync,
{
    #[cfg(feature = "parallel")]
    {
        let nthreads = rayon::current_num_threads();
        if nthreads > 1 && len > 1 && work > MIN_PARALLEL_LEN {
            tracing::trace!(len, work, nthreads, "splitting reduction across threads");
            return split_join(0..len, nthreads, &f);
        }
    }
    f(0..len)
}

#[cfg(feature = "parallel")]
fn split_join<R, F>(range: Range<usize>, nthreads: usize, f: &F) -> Vec<R>
where
    R: Send,
    F: Fn(Range<usize>) -> Vec<R> + Sync,
{
    if nthreads <= 1 || range.len() <= 1 {
        return f(range);
    }
    let mid = range.start + range.len() / 2;
    let nt_left = nthreads / 2;
    let nt_right = nthreads - nt_left;
    let (mut left, right) = rayon::join(
        || split_join(range.start..mid, nt_left, f),
        || split_join(mid..range.end, nt_right, f),
    );
    left.extend(right);
    left
}
