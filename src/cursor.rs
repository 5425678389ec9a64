//! Traversal cursor over a [`View`].
//!
//! A cursor holds a multi-index into the view, the matching position in the
//! view's outermost descriptor (updated incrementally on every step), and an
//! overflow counter. Stepping ripple-carries from the stepped axis towards the
//! slowest axis of the cursor's [`Order`]; carry out of the slowest axis lands
//! in the overflow counter, so the cursor wraps to the origin when it runs
//! past the end and back to the last position when stepped back.

use crate::layout::Order;
use crate::threading::SVec;
use crate::view::View;

/// Division table for an enumeration order over a shape.
///
/// `weights[k]` is the product of the extents of the axes faster than `k`,
/// so `linear = sum(index[k] * weights[k])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enumeration {
    dims: SVec<usize>,
    weights: SVec<usize>,
    order: Order,
    len: usize,
}

impl Enumeration {
    pub fn new(dims: &[usize], order: Order) -> Self {
        let mut weights: SVec<usize> = SVec::from_elem(0, dims.len());
        let mut acc = 1usize;
        for axis in order.fastest_first(dims.len()) {
            weights[axis] = acc;
            acc = acc.saturating_mul(dims[axis]);
        }
        Self {
            dims: SVec::from_slice(dims),
            weights,
            order,
            len: dims.iter().product(),
        }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    /// Linear rank of `index`.
    #[inline]
    pub fn ravel(&self, index: &[usize]) -> usize {
        index.iter().zip(&self.weights).map(|(&i, &w)| i * w).sum()
    }

    /// Multi-index of `linear`, which must be below `len()`.
    #[inline]
    pub fn unravel_into(&self, linear: usize, out: &mut [usize]) {
        debug_assert!(linear < self.len.max(1));
        for ((o, &w), &d) in out.iter_mut().zip(&self.weights).zip(&self.dims) {
            *o = if w == 0 || d == 0 { 0 } else { (linear / w) % d };
        }
    }

    pub fn unravel(&self, linear: usize) -> SVec<usize> {
        let mut out = SVec::from_elem(0, self.dims.len());
        self.unravel_into(linear, &mut out);
        out
    }
}

/// A movable position over a [`View`].
///
/// Borrowing the view ties the cursor's lifetime to the descriptors it reads.
#[derive(Clone, Debug)]
pub struct Cursor<'v> {
    view: &'v View,
    enumeration: Enumeration,
    index: SVec<usize>,
    offset: isize,
    overflow: isize,
}

impl<'v> Cursor<'v> {
    /// A cursor at the origin. Over an empty view it starts exhausted.
    pub fn new(view: &'v View, order: Order) -> Self {
        let enumeration = Enumeration::new(view.dims(), order);
        Self {
            view,
            index: SVec::from_elem(0, view.ndim()),
            offset: view.descriptor().offset(),
            overflow: isize::from(enumeration.is_empty()),
            enumeration,
        }
    }

    #[inline]
    pub fn view(&self) -> &'v View {
        self.view
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.enumeration.order()
    }

    /// Current multi-index.
    #[inline]
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Position in the view's outermost descriptor.
    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// Signed count of wraps past the end (> 0) or before the start (< 0).
    #[inline]
    pub fn overflow(&self) -> isize {
        self.overflow
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.overflow != 0
    }

    /// Back to the origin.
    pub fn reset(&mut self) {
        self.index.iter_mut().for_each(|i| *i = 0);
        self.offset = self.view.descriptor().offset();
        self.overflow = isize::from(self.enumeration.is_empty());
    }

    /// Add `delta` to the coordinate of `axis`, carrying into slower axes.
    pub fn step(&mut self, axis: usize, delta: isize) {
        debug_assert!(axis < self.index.len(), "axis {axis} out of range");
        if self.enumeration.is_empty() || delta == 0 {
            return;
        }
        let desc = self.view.descriptor();
        let dims = desc.dims();
        let strides = desc.strides();
        let ndim = dims.len();
        let order = self.enumeration.order();

        let mut axis = axis;
        let mut carry = delta;
        loop {
            let extent = dims[axis] as isize;
            let current = self.index[axis] as isize;
            let target = current + carry;
            let wrapped = target.rem_euclid(extent);
            carry = target.div_euclid(extent);
            self.offset += (wrapped - current) * strides[axis];
            self.index[axis] = wrapped as usize;
            if carry == 0 {
                return;
            }
            match order.slower_axis(axis, ndim) {
                Some(next) => axis = next,
                None => {
                    self.overflow += carry;
                    return;
                }
            }
        }
    }

    /// Step along the fastest axis of the cursor's order.
    pub fn advance(&mut self, delta: isize) {
        if self.enumeration.is_empty() {
            return;
        }
        match self.enumeration.order().fastest_axis(self.index.len()) {
            Some(axis) => self.step(axis, delta),
            None => self.overflow += delta,
        }
    }

    /// Jump to linear rank `linear`; ranks outside `[0, len)` set the overflow counter.
    pub fn seek(&mut self, linear: isize) {
        let len = self.enumeration.len() as isize;
        if len == 0 {
            return;
        }
        self.overflow = linear.div_euclid(len);
        let rem = linear.rem_euclid(len) as usize;
        self.enumeration.unravel_into(rem, &mut self.index);
        self.offset = self.view.descriptor().position(&self.index);
    }

    /// Linear rank of the current position, counting overflow wraps.
    pub fn linear(&self) -> isize {
        let len = self.enumeration.len() as isize;
        self.overflow * len + self.enumeration.ravel(&self.index) as isize
    }

    /// Storage position of the current multi-index through the full chain.
    #[inline]
    pub fn translate(&self) -> isize {
        self.view.resolve(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SliceSpec;

    fn row(dims: &[usize]) -> View {
        View::contiguous(dims, Order::RowMajor).unwrap()
    }

    #[test]
    fn test_enumeration_weights() {
        let e = Enumeration::new(&[2, 3, 4], Order::RowMajor);
        assert_eq!(e.weights(), &[12, 4, 1]);
        let f = Enumeration::new(&[2, 3, 4], Order::ColMajor);
        assert_eq!(f.weights(), &[1, 2, 6]);
        assert_eq!(f.unravel(7).as_slice(), &[1, 0, 1]);
        assert_eq!(f.ravel(&[1, 0, 1]), 7);
    }

    #[test]
    fn test_forward_walk_row_major() {
        let v = row(&[2, 3]);
        let mut c = v.cursor(Order::RowMajor);
        let mut seen = Vec::new();
        while !c.is_exhausted() {
            seen.push(c.translate());
            c.advance(1);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        // Past the end wraps to the origin with overflow 1
        assert_eq!(c.index(), &[0, 0]);
        assert_eq!(c.overflow(), 1);
    }

    #[test]
    fn test_col_major_walk_of_row_major_storage() {
        let v = row(&[2, 3]);
        let mut c = v.cursor(Order::ColMajor);
        let mut seen = Vec::new();
        while !c.is_exhausted() {
            seen.push(c.translate());
            c.advance(1);
        }
        assert_eq!(seen, vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_step_back_from_past_end() {
        let v = row(&[2, 3]);
        let mut c = v.cursor(Order::RowMajor);
        c.seek(6);
        assert!(c.is_exhausted());
        c.advance(-1);
        assert!(!c.is_exhausted());
        assert_eq!(c.index(), &[1, 2]);
        assert_eq!(c.translate(), 5);
    }

    #[test]
    fn test_step_before_start() {
        let v = row(&[3]);
        let mut c = v.cursor(Order::RowMajor);
        c.advance(-1);
        assert_eq!(c.overflow(), -1);
        assert_eq!(c.linear(), -1);
        c.advance(1);
        assert_eq!(c.linear(), 0);
        assert!(!c.is_exhausted());
    }

    #[test]
    fn test_step_on_slow_axis() {
        let v = row(&[3, 4]);
        let mut c = v.cursor(Order::RowMajor);
        c.step(0, 2);
        assert_eq!(c.index(), &[2, 0]);
        assert_eq!(c.offset(), 8);
        c.step(1, 5);
        // 5 columns from (2, 0) carries once into axis 0 and overflows
        assert_eq!(c.index(), &[0, 1]);
        assert_eq!(c.overflow(), 1);
    }

    #[test]
    fn test_large_delta_carries() {
        let v = row(&[2, 3, 4]);
        let mut c = v.cursor(Order::RowMajor);
        c.advance(17);
        assert_eq!(c.index(), &[1, 1, 1]);
        assert_eq!(c.linear(), 17);
        c.advance(-17);
        assert_eq!(c.linear(), 0);
        assert_eq!(c.offset(), 0);
    }

    #[test]
    fn test_seek_matches_stepping() {
        let v = row(&[3, 4, 5])
            .slice(&[SliceSpec::reversed(), SliceSpec::full(), SliceSpec::new(None, None, 2)])
            .unwrap();
        for order in [Order::RowMajor, Order::ColMajor] {
            let mut walker = v.cursor(order);
            let mut jumper = v.cursor(order);
            for k in 0..v.len() as isize {
                jumper.seek(k);
                assert_eq!(walker.index(), jumper.index());
                assert_eq!(walker.offset(), jumper.offset());
                walker.advance(1);
            }
        }
    }

    #[test]
    fn test_reset() {
        let v = row(&[2, 2]);
        let mut c = v.cursor(Order::RowMajor);
        c.advance(3);
        c.reset();
        assert_eq!(c.index(), &[0, 0]);
        assert_eq!(c.linear(), 0);
    }

    #[test]
    fn test_empty_view_is_exhausted() {
        let v = row(&[2, 0]);
        let mut c = v.cursor(Order::RowMajor);
        assert!(c.is_exhausted());
        c.advance(1);
        c.reset();
        assert!(c.is_exhausted());
    }

    #[test]
    fn test_scalar_cursor() {
        let v = View::new(crate::Descriptor::scalar(4));
        let mut c = v.cursor(Order::RowMajor);
        assert!(!c.is_exhausted());
        assert_eq!(c.translate(), 4);
        c.advance(1);
        assert!(c.is_exhausted());
        c.advance(-1);
        assert_eq!(c.translate(), 4);
    }
}
