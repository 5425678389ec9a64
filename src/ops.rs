//! Named reductions built on [`reduce`], [`fold`] and [`scan`].

use std::ops::{Add, Mul};

use num_traits::{Float, One, Zero};

use crate::array::StridedArray;
use crate::map::map;
use crate::reduce::{fold, reduce, scan, Axes};
use crate::threading::{MaybeSendSync, MaybeSync};
use crate::Result;

/// What a NaN-skipping reduction yields for a window that held only NaNs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NanPolicy {
    /// The window reduces to NaN.
    Nan,
    /// The window reduces to the operation's identity.
    Identity,
}

pub fn sum<T>(src: &StridedArray<T>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<T>>
where
    T: Clone + Zero + Add<Output = T> + MaybeSendSync,
{
    fold(src, axes, keep_dims, T::zero(), |acc, x| acc + x.clone())
}

pub fn prod<T>(src: &StridedArray<T>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<T>>
where
    T: Clone + One + Mul<Output = T> + MaybeSendSync,
{
    fold(src, axes, keep_dims, T::one(), |acc, x| acc * x.clone())
}

/// Unordered values (NaN) win over everything else.
#[inline]
fn is_unordered<T: PartialOrd>(x: &T) -> bool {
    x.partial_cmp(x).is_none()
}

/// Smallest element per window; a NaN anywhere in a window propagates.
///
/// # Errors
/// [`StridedError::EmptyReduce`](crate::StridedError::EmptyReduce) for an empty window.
pub fn min<T>(src: &StridedArray<T>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<T>>
where
    T: Clone + PartialOrd + MaybeSendSync,
{
    reduce(src, axes, keep_dims, None, |acc, x| {
        if is_unordered(&acc) || (!is_unordered(x) && acc <= *x) {
            acc
        } else {
            x.clone()
        }
    })
}

/// Largest element per window; a NaN anywhere in a window propagates.
///
/// # Errors
/// [`StridedError::EmptyReduce`](crate::StridedError::EmptyReduce) for an empty window.
pub fn max<T>(src: &StridedArray<T>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<T>>
where
    T: Clone + PartialOrd + MaybeSendSync,
{
    reduce(src, axes, keep_dims, None, |acc, x| {
        if is_unordered(&acc) || (!is_unordered(x) && acc >= *x) {
            acc
        } else {
            x.clone()
        }
    })
}

/// `true` where every element of the window is `true`; empty windows are `true`.
pub fn all(src: &StridedArray<bool>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<bool>> {
    fold(src, axes, keep_dims, true, |acc, &x| acc && x)
}

/// `true` where some element of the window is `true`; empty windows are `false`.
pub fn any(src: &StridedArray<bool>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<bool>> {
    fold(src, axes, keep_dims, false, |acc, &x| acc || x)
}

pub fn count_nonzero<T>(src: &StridedArray<T>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<usize>>
where
    T: Zero + MaybeSync,
{
    fold(src, axes, keep_dims, 0usize, |n, x| n + usize::from(!x.is_zero()))
}

pub fn cumsum<T>(src: &StridedArray<T>, axis: usize) -> Result<StridedArray<T>>
where
    T: Clone + Add<Output = T> + MaybeSendSync,
{
    scan(src, axis, None, |acc, x| acc + x.clone())
}

pub fn cumprod<T>(src: &StridedArray<T>, axis: usize) -> Result<StridedArray<T>>
where
    T: Clone + Mul<Output = T> + MaybeSendSync,
{
    scan(src, axis, None, |acc, x| acc * x.clone())
}

// ============================================================================
// NaN-skipping reductions
// ============================================================================

/// Fold `op` over the non-NaN elements of each window.
///
/// Windows with no non-NaN element (including empty windows) become NaN or
/// `identity` according to `policy`.
pub fn nan_fold<F, Op>(
    src: &StridedArray<F>,
    axes: &Axes,
    keep_dims: bool,
    policy: NanPolicy,
    identity: F,
    op: Op,
) -> Result<StridedArray<F>>
where
    F: Float + MaybeSendSync,
    Op: Fn(F, F) -> F + MaybeSync,
{
    let partial = fold(src, axes, keep_dims, None, |acc: Option<F>, &x: &F| {
        if x.is_nan() {
            acc
        } else {
            Some(acc.map_or(x, |a| op(a, x)))
        }
    })?;
    let fill = match policy {
        NanPolicy::Nan => F::nan(),
        NanPolicy::Identity => identity,
    };
    Ok(map(&partial, |v| v.unwrap_or(fill)))
}

/// Sum ignoring NaNs; an all-NaN window sums to zero.
pub fn nansum<F>(src: &StridedArray<F>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<F>>
where
    F: Float + MaybeSendSync,
{
    nan_fold(src, axes, keep_dims, NanPolicy::Identity, F::zero(), |a, b| a + b)
}

/// Maximum ignoring NaNs; an all-NaN window stays NaN.
pub fn nanmax<F>(src: &StridedArray<F>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<F>>
where
    F: Float + MaybeSendSync,
{
    nan_fold(src, axes, keep_dims, NanPolicy::Nan, F::neg_infinity(), F::max)
}

/// Minimum ignoring NaNs; an all-NaN window stays NaN.
pub fn nanmin<F>(src: &StridedArray<F>, axes: &Axes, keep_dims: bool) -> Result<StridedArray<F>>
where
    F: Float + MaybeSendSync,
{
    nan_fold(src, axes, keep_dims, NanPolicy::Nan, F::infinity(), F::min)
}
