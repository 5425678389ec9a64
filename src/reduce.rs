//! Axis reductions: `reduce`, `fold` and `scan`.
//!
//! The input's axes are split into *kept* and *reduced* sets. Kept
//! coordinates are enumerated in row-major order; for each one a *window*
//! cursor walks the reduced axes in the input's natural order and the combine
//! callable is folded over every element it reaches. Windows whose reduced
//! axes form one run of storage skip the cursor and use flat arithmetic.

use std::ops::Range;

use crate::array::StridedArray;
use crate::compose::invert_permutation;
use crate::cursor::Cursor;
use crate::descriptor::Descriptor;
use crate::layout::{natural_order, Block, Order};
use crate::threading::{map_ranges, MaybeSend, MaybeSync};
use crate::view::View;
use crate::{Result, StridedError};

/// Which axes a reduction folds away.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Axes {
    #[default]
    All,
    /// Explicit axes; an empty list means every axis.
    List(Vec<usize>),
}

impl Axes {
    pub fn single(axis: usize) -> Self {
        Axes::List(vec![axis])
    }

    /// Per-axis flags, `true` for reduced axes.
    ///
    /// # Errors
    /// [`StridedError::InvalidAxis`] or [`StridedError::DuplicateAxis`].
    pub fn resolve(&self, ndim: usize) -> Result<Vec<bool>> {
        match self {
            Axes::List(axes) if !axes.is_empty() => {
                let mut reduced = vec![false; ndim];
                for &axis in axes {
                    if axis >= ndim {
                        return Err(StridedError::InvalidAxis { axis, rank: ndim });
                    }
                    if reduced[axis] {
                        return Err(StridedError::DuplicateAxis { axis });
                    }
                    reduced[axis] = true;
                }
                Ok(reduced)
            }
            _ => Ok(vec![true; ndim]),
        }
    }
}

impl From<usize> for Axes {
    fn from(axis: usize) -> Self {
        Axes::single(axis)
    }
}

impl From<Vec<usize>> for Axes {
    fn from(axes: Vec<usize>) -> Self {
        Axes::List(axes)
    }
}

impl From<&[usize]> for Axes {
    fn from(axes: &[usize]) -> Self {
        Axes::List(axes.to_vec())
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Kept/reduced split of a view's outermost descriptor.
struct Plan<'a> {
    view: &'a View,
    /// Kept axes; positions include the descriptor offset.
    outer: View,
    /// Reduced axes, offset 0.
    window: View,
    window_order: Order,
    /// Set when a window is one run of storage.
    flat: Option<Block>,
    reduced_mask: Vec<bool>,
}

impl<'a> Plan<'a> {
    fn new(view: &'a View, reduced_mask: Vec<bool>) -> Self {
        let desc = view.descriptor();
        let split = |keep: bool| {
            let mut dims = Vec::new();
            let mut strides = Vec::new();
            for (k, (&d, &s)) in desc.dims().iter().zip(desc.strides()).enumerate() {
                if reduced_mask[k] != keep {
                    dims.push(d);
                    strides.push(s);
                }
            }
            (dims, strides)
        };
        let (kept_dims, kept_strides) = split(true);
        let (red_dims, red_strides) = split(false);

        let window_order = natural_order(&red_dims, &red_strides);
        let window = Descriptor::from_parts_unchecked(red_dims, red_strides, 0);
        let flat = if view.depth() == 0 { window.block() } else { None };
        tracing::debug!(
            kept = ?reduced_mask.iter().filter(|&&r| !r).count(),
            reduced = window.len(),
            ?window_order,
            flat = flat.is_some(),
            "reduction plan"
        );
        Self {
            view,
            outer: View::new(Descriptor::from_parts_unchecked(
                kept_dims,
                kept_strides,
                desc.offset(),
            )),
            window: View::new(window),
            window_order,
            flat,
            reduced_mask,
        }
    }

    fn windows(&self) -> usize {
        self.outer.len()
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }

    /// The first reduced axis of extent 0, if any.
    fn empty_axis(&self) -> Option<usize> {
        let dims = self.view.dims();
        (0..dims.len()).find(|&k| self.reduced_mask[k] && dims[k] == 0)
    }

    fn out_dims(&self, keep_dims: bool) -> Vec<usize> {
        self.view
            .dims()
            .iter()
            .zip(&self.reduced_mask)
            .filter_map(|(&d, &reduced)| match (reduced, keep_dims) {
                (false, _) => Some(d),
                (true, true) => Some(1),
                (true, false) => None,
            })
            .collect()
    }

    /// Fold `op` over the window whose origin sits at outer position `base`.
    #[inline]
    fn fold_window<T, U>(&self, data: &[T], base: isize, init: U, mut op: impl FnMut(U, &T) -> U) -> U {
        let mut acc = init;
        if let Some(block) = self.flat {
            for j in 0..self.window_len() as isize {
                acc = op(acc, &data[(base + j * block.sign) as usize]);
            }
            return acc;
        }
        let mut cursor = Cursor::new(&self.window, self.window_order);
        while !cursor.is_exhausted() {
            let pos = self.view.resolve(base + cursor.offset());
            acc = op(acc, &data[pos as usize]);
            cursor.advance(1);
        }
        acc
    }

    /// Evaluate `window` for every kept coordinate in `range` (row-major ranks).
    fn run<R>(&self, range: Range<usize>, window: impl Fn(isize) -> R) -> Vec<R> {
        let mut outer = Cursor::new(&self.outer, Order::RowMajor);
        outer.seek(range.start as isize);
        let mut out = Vec::with_capacity(range.len());
        for _ in range {
            out.push(window(outer.offset()));
            outer.advance(1);
        }
        out
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Reduce `src` over `axes` with an associative `op`.
///
/// Each window is seeded with `initial` if given, otherwise with its first
/// element. With `keep_dims` the reduced axes stay as extent 1.
///
/// # Errors
/// - [`StridedError::InvalidAxis`] / [`StridedError::DuplicateAxis`] for bad axes
/// - [`StridedError::EmptyReduce`] if a reduced axis has extent 0 and `initial` is `None`
///
/// # Example
/// ```rust
/// use strided_traverse::{reduce, Axes, Order, StridedArray};
///
/// let a = StridedArray::from_vec(vec![1, 2, 3, 4, 5, 6], &[2, 3], Order::RowMajor).unwrap();
/// let rows = reduce(&a, &Axes::single(1), true, None, |x, y| x + y).unwrap();
/// assert_eq!(rows.dims(), &[2, 1]);
/// assert_eq!(rows.to_vec(Order::RowMajor), vec![6, 15]);
/// ```
pub fn reduce<T, F>(
    src: &StridedArray<T>,
    axes: &Axes,
    keep_dims: bool,
    initial: Option<T>,
    op: F,
) -> Result<StridedArray<T>>
where
    T: Clone + MaybeSend + MaybeSync,
    F: Fn(T, &T) -> T + MaybeSync,
{
    let reduced = axes.resolve(src.ndim())?;
    let plan = Plan::new(src.view(), reduced);
    let out_dims = plan.out_dims(keep_dims);

    if let Some(axis) = plan.empty_axis() {
        return match initial {
            Some(init) => StridedArray::full(&out_dims, init),
            None => Err(StridedError::EmptyReduce { axis }),
        };
    }

    let data = src.storage();
    let values = map_ranges(plan.windows(), src.len(), |range| {
        plan.run(range, |base| {
            plan.fold_window(data, base, initial.clone(), |acc, x| {
                Some(match acc {
                    Some(a) => op(a, x),
                    None => x.clone(),
                })
            })
        })
    });
    // Every window holds at least one element here.
    let values: Vec<T> = values
        .into_iter()
        .collect::<Option<_>>()
        .ok_or(StridedError::EmptyReduce { axis: 0 })?;
    StridedArray::from_vec(values, &out_dims, Order::RowMajor)
}

/// Seeded reduction whose accumulator type may differ from the element type.
///
/// Windows over an extent-0 axis produce `init`.
pub fn fold<T, U, F>(
    src: &StridedArray<T>,
    axes: &Axes,
    keep_dims: bool,
    init: U,
    op: F,
) -> Result<StridedArray<U>>
where
    T: MaybeSync,
    U: Clone + MaybeSend + MaybeSync,
    F: Fn(U, &T) -> U + MaybeSync,
{
    let reduced = axes.resolve(src.ndim())?;
    let plan = Plan::new(src.view(), reduced);
    let out_dims = plan.out_dims(keep_dims);

    let data = src.storage();
    let values = map_ranges(plan.windows(), src.len(), |range| {
        plan.run(range, |base| plan.fold_window(data, base, init.clone(), &op))
    });
    StridedArray::from_vec(values, &out_dims, Order::RowMajor)
}

/// Cumulative reduction along `axis`; the result has the shape of `src`.
///
/// Each lane starts from `initial` combined with its first element, or from
/// the first element alone.
///
/// # Errors
/// [`StridedError::InvalidAxis`] if `axis` is out of range.
pub fn scan<T, F>(src: &StridedArray<T>, axis: usize, initial: Option<T>, op: F) -> Result<StridedArray<T>>
where
    T: Clone + MaybeSend + MaybeSync,
    F: Fn(T, &T) -> T + MaybeSync,
{
    let ndim = src.ndim();
    if axis >= ndim {
        return Err(StridedError::InvalidAxis { axis, rank: ndim });
    }
    let mut reduced = vec![false; ndim];
    reduced[axis] = true;
    let plan = Plan::new(src.view(), reduced);

    // Lanes come out with the scanned axis fastest; permute back afterwards.
    let mut perm: Vec<usize> = (0..ndim).filter(|&k| k != axis).collect();
    perm.push(axis);
    let lane_dims: Vec<usize> = perm.iter().map(|&k| src.dims()[k]).collect();

    let data = src.storage();
    let lanes = map_ranges(plan.windows(), src.len(), |range| {
        plan.run(range, |base| {
            let mut lane = Vec::with_capacity(plan.window_len());
            plan.fold_window(data, base, initial.clone(), |acc, x| {
                let next = match acc {
                    Some(a) => op(a, x),
                    None => x.clone(),
                };
                lane.push(next.clone());
                Some(next)
            });
            lane
        })
    });
    let values: Vec<T> = lanes.into_iter().flatten().collect();
    let permuted = StridedArray::from_vec(values, &lane_dims, Order::RowMajor)?;
    Ok(permuted
        .permute(&invert_permutation(&perm))?
        .to_contiguous(Order::RowMajor))
}
