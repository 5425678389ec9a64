//! Affine view composition.
//!
//! Each function maps a parent [`Descriptor`] and the view parameters to the
//! child descriptor. These never touch element data.

use crate::descriptor::{checked_len, Descriptor};
use crate::layout::{contiguous_strides, Order};
use crate::{Result, StridedError};

// ============================================================================
// Transpose
// ============================================================================

/// Check that `perm` is a permutation of `0..rank`.
pub(crate) fn validate_permutation(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(StridedError::InvalidPermutation(perm.to_vec()));
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank {
            return Err(StridedError::InvalidAxis { axis: p, rank });
        }
        if seen[p] {
            return Err(StridedError::DuplicateAxis { axis: p });
        }
        seen[p] = true;
    }
    Ok(())
}

/// The inverse permutation: `invert_permutation(p)[p[k]] == k`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (k, &p) in perm.iter().enumerate() {
        inverse[p] = k;
    }
    inverse
}

/// Child axis `k` is parent axis `perm[k]`.
pub(crate) fn permute(parent: &Descriptor, perm: &[usize]) -> Result<Descriptor> {
    validate_permutation(perm, parent.ndim())?;
    let dims = perm.iter().map(|&p| parent.dims()[p]).collect();
    let strides = perm.iter().map(|&p| parent.strides()[p]).collect();
    Ok(Descriptor::from_parts_unchecked(
        dims,
        strides,
        parent.offset(),
    ))
}

// ============================================================================
// Reshape
// ============================================================================

/// Reinterpret `parent` with `new_dims`, linearizing both in `order`.
///
/// # Errors
/// - [`StridedError::ShapeMismatch`] if element counts differ
/// - [`StridedError::ReshapeRequiresCopy`] if `parent` is not a single run in `order`
pub(crate) fn reshape(parent: &Descriptor, new_dims: &[usize], order: Order) -> Result<Descriptor> {
    let new_len = checked_len(new_dims)?;
    if new_len != parent.len() {
        return Err(StridedError::ShapeMismatch(
            parent.dims().to_vec(),
            new_dims.to_vec(),
        ));
    }
    let sign = if parent.is_empty() {
        1
    } else {
        match parent.block() {
            Some(block) if block.supports(order) => block.sign,
            _ => {
                tracing::debug!(
                    from = ?parent.dims(),
                    to = ?new_dims,
                    ?order,
                    "reshape needs a copy"
                );
                return Err(StridedError::ReshapeRequiresCopy {
                    from: parent.dims().to_vec(),
                    to: new_dims.to_vec(),
                });
            }
        }
    };
    let strides = contiguous_strides(new_dims, order)
        .into_iter()
        .map(|s| s * sign)
        .collect();
    Ok(Descriptor::from_parts_unchecked(
        new_dims.to_vec(),
        strides,
        parent.offset(),
    ))
}

// ============================================================================
// Slice
// ============================================================================

/// One axis of a slice request, with Python slice semantics.
///
/// `None` bounds default to the full range in the direction of `step`;
/// negative bounds count from the end of the axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl SliceSpec {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    /// The whole axis (`::`).
    pub fn full() -> Self {
        Self::new(None, None, 1)
    }

    /// `start..stop` with step 1.
    pub fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), 1)
    }

    /// The whole axis reversed (`::-1`).
    pub fn reversed() -> Self {
        Self::new(None, None, -1)
    }

    /// Builder-style step override.
    pub fn step_by(mut self, step: isize) -> Self {
        self.step = step;
        self
    }

    /// Resolve against an axis of `extent` elements.
    pub fn resolve(&self, axis: usize, extent: usize) -> Result<AxisRange> {
        let step = self.step;
        if step == 0 {
            return Err(StridedError::ZeroStep { axis });
        }
        let n = extent as isize;
        let clamp = |bound: Option<isize>, default: isize| -> isize {
            match bound {
                None => default,
                Some(b) if b < 0 => {
                    let b = b + n;
                    if b < 0 {
                        if step < 0 {
                            -1
                        } else {
                            0
                        }
                    } else {
                        b
                    }
                }
                Some(b) if b >= n => {
                    if step < 0 {
                        n - 1
                    } else {
                        n
                    }
                }
                Some(b) => b,
            }
        };
        let (start, stop) = if step > 0 {
            (clamp(self.start, 0), clamp(self.stop, n))
        } else {
            (clamp(self.start, n - 1), clamp(self.stop, -1))
        };
        // `unsigned_abs` keeps `isize::MIN` from overflowing on negation.
        let len = if step > 0 && start < stop {
            (stop - start - 1) as usize / step.unsigned_abs() + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) as usize / step.unsigned_abs() + 1
        } else {
            0
        };
        if len == 0 {
            return Ok(AxisRange {
                start: 0,
                step,
                len: 0,
            });
        }
        Ok(AxisRange {
            start: start as usize,
            step,
            len,
        })
    }
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self::full()
    }
}

/// A resolved slice on one axis: `len` positions `start, start + step, ...`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AxisRange {
    pub start: usize,
    pub step: isize,
    pub len: usize,
}

impl AxisRange {
    /// Every position of an axis of `extent` elements.
    pub fn full(extent: usize) -> Self {
        Self {
            start: 0,
            step: 1,
            len: extent,
        }
    }

    /// Parent coordinate of child coordinate `i`.
    #[inline]
    pub fn parent_coord(&self, i: usize) -> usize {
        (self.start as isize + i as isize * self.step) as usize
    }

    /// Slicing this range again with `inner` (resolved against `self.len`).
    ///
    /// A range of at most one position keeps only the sign of its step.
    pub fn then(&self, inner: &AxisRange) -> Result<AxisRange> {
        let step = if inner.len <= 1 {
            self.step.signum() * inner.step.signum()
        } else {
            self.step
                .checked_mul(inner.step)
                .ok_or(StridedError::OffsetOverflow)?
        };
        if inner.len == 0 {
            return Ok(AxisRange {
                start: 0,
                step,
                len: 0,
            });
        }
        Ok(AxisRange {
            start: self.parent_coord(inner.start),
            step,
            len: inner.len,
        })
    }

    /// Parent coordinate of the last position, or `None` when empty or unrepresentable.
    pub(crate) fn last(&self) -> Option<isize> {
        if self.len == 0 {
            return None;
        }
        (self.len as isize - 1)
            .checked_mul(self.step)?
            .checked_add(self.start as isize)
    }

    pub fn is_full(&self, extent: usize) -> bool {
        self.start == 0 && self.step == 1 && self.len == extent
    }
}

/// Resolve one `SliceSpec` per leading axis; missing trailing axes are taken whole.
pub(crate) fn resolve_slice(dims: &[usize], specs: &[SliceSpec]) -> Result<Vec<AxisRange>> {
    if specs.len() > dims.len() {
        return Err(StridedError::RankMismatch(specs.len(), dims.len()));
    }
    dims.iter()
        .enumerate()
        .map(|(axis, &extent)| match specs.get(axis) {
            Some(spec) => spec.resolve(axis, extent),
            None => Ok(AxisRange::full(extent)),
        })
        .collect()
}

/// Apply resolved ranges, one per axis.
pub(crate) fn slice(parent: &Descriptor, ranges: &[AxisRange]) -> Result<Descriptor> {
    debug_assert_eq!(ranges.len(), parent.ndim());
    let mut offset = parent.offset();
    let mut dims = Vec::with_capacity(ranges.len());
    let mut strides = Vec::with_capacity(ranges.len());
    for (range, &stride) in ranges.iter().zip(parent.strides()) {
        if range.len > 0 {
            offset = (range.start as isize)
                .checked_mul(stride)
                .and_then(|shift| offset.checked_add(shift))
                .ok_or(StridedError::OffsetOverflow)?;
        }
        dims.push(range.len);
        // The step never moves a position on an axis of extent <= 1.
        strides.push(if range.len <= 1 {
            stride
        } else {
            stride
                .checked_mul(range.step)
                .ok_or(StridedError::OffsetOverflow)?
        });
    }
    Ok(Descriptor::from_parts_unchecked(dims, strides, offset))
}

// ============================================================================
// Broadcast
// ============================================================================

/// Expand `parent` to `target`, aligning trailing axes.
///
/// Extent-1 axes and missing leading axes get stride 0.
pub(crate) fn broadcast_to(parent: &Descriptor, target: &[usize]) -> Result<Descriptor> {
    let mismatch = || StridedError::BroadcastMismatch {
        from: parent.dims().to_vec(),
        to: target.to_vec(),
    };
    if target.len() < parent.ndim() {
        return Err(mismatch());
    }
    checked_len(target)?;
    let lead = target.len() - parent.ndim();
    let mut strides = vec![0isize; target.len()];
    for (k, (&dim, &stride)) in parent.dims().iter().zip(parent.strides()).enumerate() {
        let want = target[lead + k];
        if dim == want {
            strides[lead + k] = if dim == 1 { 0 } else { stride };
        } else if dim == 1 {
            strides[lead + k] = 0;
        } else {
            return Err(mismatch());
        }
    }
    Ok(Descriptor::from_parts_unchecked(
        target.to_vec(),
        strides,
        parent.offset(),
    ))
}

/// Common broadcast shape of several operand shapes.
pub fn broadcast_shape(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; rank];
    for shape in shapes {
        let lead = rank - shape.len();
        for (k, &dim) in shape.iter().enumerate() {
            let slot = &mut out[lead + k];
            if *slot == 1 {
                *slot = dim;
            } else if dim != 1 && dim != *slot {
                return Err(StridedError::BroadcastMismatch {
                    from: shape.to_vec(),
                    to: out.clone(),
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dims: &[usize]) -> Descriptor {
        Descriptor::contiguous(dims, Order::RowMajor).unwrap()
    }

    #[test]
    fn test_permute() {
        let d = permute(&row(&[2, 3, 4]), &[2, 0, 1]).unwrap();
        assert_eq!(d.dims(), &[4, 2, 3]);
        assert_eq!(d.strides(), &[1, 12, 4]);
    }

    #[test]
    fn test_permute_rejects_non_permutation() {
        let d = row(&[2, 3]);
        assert!(matches!(
            permute(&d, &[0]),
            Err(StridedError::InvalidPermutation(_))
        ));
        assert_eq!(
            permute(&d, &[0, 0]).unwrap_err(),
            StridedError::DuplicateAxis { axis: 0 }
        );
        assert_eq!(
            permute(&d, &[0, 2]).unwrap_err(),
            StridedError::InvalidAxis { axis: 2, rank: 2 }
        );
    }

    #[test]
    fn test_invert_permutation() {
        let p = [2, 0, 1];
        let inv = invert_permutation(&p);
        assert_eq!(inv, vec![1, 2, 0]);
        for k in 0..3 {
            assert_eq!(inv[p[k]], k);
        }
    }

    #[test]
    fn test_reshape_contiguous() {
        let d = reshape(&row(&[2, 3, 4]), &[6, 4], Order::RowMajor).unwrap();
        assert_eq!(d.dims(), &[6, 4]);
        assert_eq!(d.strides(), &[4, 1]);
    }

    #[test]
    fn test_reshape_size_mismatch() {
        assert!(matches!(
            reshape(&row(&[2, 3]), &[4, 2], Order::RowMajor),
            Err(StridedError::ShapeMismatch(_, _))
        ));
    }

    #[test]
    fn test_reshape_requires_copy() {
        let t = permute(&row(&[2, 3]), &[1, 0]).unwrap();
        let err = reshape(&t, &[6], Order::RowMajor).unwrap_err();
        assert!(matches!(err, StridedError::ReshapeRequiresCopy { .. }));
        // Column-major linearization of the transpose is the original run.
        let flat = reshape(&t, &[6], Order::ColMajor).unwrap();
        assert_eq!(flat.strides(), &[1]);
    }

    #[test]
    fn test_reshape_reversed_run() {
        let r = slice(&row(&[4]), &[SliceSpec::reversed().resolve(0, 4).unwrap()]).unwrap();
        let d = reshape(&r, &[2, 2], Order::RowMajor).unwrap();
        assert_eq!(d.strides(), &[-2, -1]);
        assert_eq!(d.offset(), 3);
        assert_eq!(d.position(&[1, 1]), 0);
    }

    #[test]
    fn test_slice_resolution_python_semantics() {
        assert_eq!(
            SliceSpec::range(1, 3).resolve(0, 5).unwrap(),
            AxisRange { start: 1, step: 1, len: 2 }
        );
        assert_eq!(
            SliceSpec::new(Some(-2), None, 1).resolve(0, 5).unwrap(),
            AxisRange { start: 3, step: 1, len: 2 }
        );
        assert_eq!(
            SliceSpec::reversed().resolve(0, 5).unwrap(),
            AxisRange { start: 4, step: -1, len: 5 }
        );
        assert_eq!(
            SliceSpec::new(None, None, 2).resolve(0, 5).unwrap(),
            AxisRange { start: 0, step: 2, len: 3 }
        );
        assert_eq!(
            SliceSpec::new(Some(10), Some(20), 1).resolve(0, 5).unwrap().len,
            0
        );
        assert_eq!(
            SliceSpec::new(Some(-10), Some(2), 1).resolve(0, 5).unwrap(),
            AxisRange { start: 0, step: 1, len: 2 }
        );
        assert_eq!(
            SliceSpec::new(Some(3), Some(1), 1).resolve(0, 5).unwrap().len,
            0
        );
        assert_eq!(
            SliceSpec::new(Some(3), Some(-10), -1).resolve(0, 5).unwrap(),
            AxisRange { start: 3, step: -1, len: 4 }
        );
    }

    #[test]
    fn test_slice_extreme_steps() {
        assert_eq!(
            SliceSpec::new(None, None, isize::MAX).resolve(0, 2).unwrap(),
            AxisRange { start: 0, step: isize::MAX, len: 1 }
        );
        assert_eq!(
            SliceSpec::new(None, None, isize::MIN).resolve(0, 3).unwrap(),
            AxisRange { start: 2, step: isize::MIN, len: 1 }
        );

        let ranges =
            resolve_slice(&[2, 3], &[SliceSpec::new(None, None, isize::MAX)]).unwrap();
        let d = slice(&row(&[2, 3]), &ranges).unwrap();
        assert_eq!(d.dims(), &[1, 3]);
        assert_eq!(d.strides(), &[3, 1]);
        assert_eq!(d.offset(), 0);

        let ranges = resolve_slice(&[3], &[SliceSpec::new(None, None, isize::MIN)]).unwrap();
        let d = slice(&row(&[3]), &ranges).unwrap();
        assert_eq!(d.dims(), &[1]);
        assert_eq!(d.position(&[0]), 2);
    }

    #[test]
    fn test_slice_stride_overflow() {
        let wide = Descriptor::from_parts_unchecked(vec![4], vec![isize::MAX / 2], 0);
        let ranges = [AxisRange { start: 0, step: 3, len: 2 }];
        assert_eq!(slice(&wide, &ranges), Err(StridedError::OffsetOverflow));
    }

    #[test]
    fn test_range_then_single_position() {
        let outer = SliceSpec::new(None, None, isize::MAX).resolve(0, 5).unwrap();
        let inner = SliceSpec::new(None, None, isize::MIN).resolve(0, outer.len).unwrap();
        assert_eq!(
            outer.then(&inner).unwrap(),
            AxisRange { start: 0, step: -1, len: 1 }
        );
        let wide = AxisRange { start: 0, step: isize::MAX, len: 2 };
        assert_eq!(wide.then(&wide), Err(StridedError::OffsetOverflow));
    }

    #[test]
    fn test_slice_zero_step() {
        assert_eq!(
            SliceSpec::full().step_by(0).resolve(1, 3).unwrap_err(),
            StridedError::ZeroStep { axis: 1 }
        );
    }

    #[test]
    fn test_slice_scenario() {
        let ranges = resolve_slice(&[2, 3], &[SliceSpec::full(), SliceSpec::range(1, 3)]).unwrap();
        let d = slice(&row(&[2, 3]), &ranges).unwrap();
        assert_eq!(d.dims(), &[2, 2]);
        assert_eq!(d.strides(), &[3, 1]);
        assert_eq!(d.offset(), 1);
    }

    #[test]
    fn test_slice_too_many_specs() {
        assert!(matches!(
            resolve_slice(&[2], &[SliceSpec::full(), SliceSpec::full()]),
            Err(StridedError::RankMismatch(2, 1))
        ));
    }

    #[test]
    fn test_range_then() {
        let outer = SliceSpec::new(None, None, 2).resolve(0, 10).unwrap(); // 0,2,4,6,8
        let inner = SliceSpec::reversed().resolve(0, outer.len).unwrap(); // 8,6,4,2,0
        let combined = outer.then(&inner).unwrap();
        assert_eq!(combined, AxisRange { start: 8, step: -2, len: 5 });
    }

    #[test]
    fn test_broadcast_scenario() {
        let d = broadcast_to(&row(&[3]), &[2, 3]).unwrap();
        assert_eq!(d.dims(), &[2, 3]);
        assert_eq!(d.strides(), &[0, 1]);
    }

    #[test]
    fn test_broadcast_unit_axis() {
        let d = broadcast_to(&row(&[4, 1]), &[4, 5]).unwrap();
        assert_eq!(d.strides(), &[1, 0]);
    }

    #[test]
    fn test_broadcast_mismatch() {
        let err = broadcast_to(&row(&[2, 3]), &[2, 4]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Broadcast);
        assert!(broadcast_to(&row(&[2, 3]), &[3]).is_err());
    }

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(
            broadcast_shape(&[&[4, 1], &[3], &[1, 1]]).unwrap(),
            vec![4, 3]
        );
        assert!(broadcast_shape(&[&[2], &[3]]).is_err());
        assert_eq!(broadcast_shape(&[]).unwrap(), Vec::<usize>::new());
    }
}
