//! Trivial layout detection and the flat fast path.
//!
//! A view is trivial when walking it reduces to `offset + k * step` over a
//! single run of storage. The block classification lives on the
//! [`Descriptor`](crate::Descriptor), so detection here is a chain scan plus
//! a field read.

use crate::descriptor::Descriptor;
use crate::layout::Order;
use crate::view::{View, ViewNode};

/// Whether `view` can be walked with flat position arithmetic.
///
/// Broadcast and gather nodes always make a view non-trivial.
pub fn is_trivial(view: &View) -> bool {
    view.depth() == 0
        && view.nodes().iter().all(|node| match node {
            ViewNode::Identity
            | ViewNode::Transpose(_)
            | ViewNode::Reshape { .. }
            | ViewNode::Slice(_) => true,
            ViewNode::Broadcast(_) | ViewNode::IndexMap(_) | ViewNode::BooleanMap(_) => false,
        })
        && view.descriptor().block().is_some()
}

/// A trivial view reduced to a start position and a unit step.
///
/// The `k`-th element in [`FlatLayout::order`] sits at `offset + k * step`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatLayout {
    descriptor: Descriptor,
    order: Order,
    step: isize,
}

impl FlatLayout {
    #[inline]
    pub fn offset(&self) -> isize {
        self.descriptor.offset()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptor.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// +1 or -1.
    #[inline]
    pub fn step(&self) -> isize {
        self.step
    }

    /// Enumeration order in which positions are consecutive.
    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    pub fn dims(&self) -> &[usize] {
        self.descriptor.dims()
    }

    pub fn strides(&self) -> &[isize] {
        self.descriptor.strides()
    }

    /// The flat descriptor.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Storage position of the `k`-th element.
    #[inline]
    pub fn position(&self, k: usize) -> isize {
        self.offset() + k as isize * self.step
    }

    /// All storage positions, in order.
    pub fn positions(&self) -> impl DoubleEndedIterator<Item = isize> + ExactSizeIterator + '_ {
        (0..self.len()).map(move |k| self.position(k))
    }
}

/// Flat layout of `view` in its preferred order, `None` if not trivial.
pub fn degenerate(view: &View) -> Option<FlatLayout> {
    let order = view.descriptor().layout()?;
    degenerate_in(view, order)
}

/// Flat layout of `view` enumerated in `order`.
pub fn degenerate_in(view: &View, order: Order) -> Option<FlatLayout> {
    if !is_trivial(view) {
        return None;
    }
    let descriptor = view.descriptor();
    let block = descriptor.block()?;
    if !block.supports(order) {
        return None;
    }
    Some(FlatLayout {
        descriptor: descriptor.clone(),
        order,
        step: block.sign,
    })
}

/// The order in which every view in `views` is flat, if there is one.
///
/// All views must be trivial and share one shape; row-major wins when both
/// orders work.
pub fn common_flat_order(views: &[&View]) -> Option<Order> {
    let first = views.first()?;
    let mut row_major = true;
    let mut col_major = true;
    for view in views {
        if view.dims() != first.dims() || !is_trivial(view) {
            tracing::trace!(operands = views.len(), "flat path refused");
            return None;
        }
        let desc = view.descriptor();
        row_major &= desc.is_contiguous_in(Order::RowMajor);
        col_major &= desc.is_contiguous_in(Order::ColMajor);
    }
    match (row_major, col_major) {
        (true, _) => Some(Order::RowMajor),
        (false, true) => Some(Order::ColMajor),
        (false, false) => {
            tracing::trace!(operands = views.len(), "operands are flat in different orders");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SliceSpec;
    use crate::gather::IndexArray;

    fn row(dims: &[usize]) -> View {
        View::contiguous(dims, Order::RowMajor).unwrap()
    }

    #[test]
    fn test_fresh_array_is_trivial() {
        let v = row(&[2, 3, 4]);
        assert!(is_trivial(&v));
        let flat = degenerate(&v).unwrap();
        assert_eq!(flat.offset(), 0);
        assert_eq!(flat.step(), 1);
        assert_eq!(flat.len(), 24);
        assert_eq!(flat.order(), Order::RowMajor);
    }

    #[test]
    fn test_transpose_reshape_identity_scenario() {
        let base = row(&[2, 3, 4]);
        let chained = base
            .apply(ViewNode::Identity)
            .unwrap()
            .reshape(&[2, 3, 4], Order::RowMajor)
            .unwrap();
        let mixed = chained.permute(&[0, 2, 1]).unwrap();
        assert!(!is_trivial(&mixed));
        assert!(degenerate(&mixed).is_none());

        let same = chained.permute(&[0, 1, 2]).unwrap();
        assert!(is_trivial(&same));
    }

    #[test]
    fn test_full_transpose_is_trivial_in_col_major() {
        let v = row(&[2, 3, 4]).transpose().unwrap();
        assert!(is_trivial(&v));
        let flat = degenerate(&v).unwrap();
        assert_eq!(flat.order(), Order::ColMajor);
        assert!(degenerate_in(&v, Order::RowMajor).is_none());
    }

    #[test]
    fn test_reversed_slice_has_negative_step() {
        let v = row(&[5]).slice(&[SliceSpec::reversed()]).unwrap();
        let flat = degenerate(&v).unwrap();
        assert_eq!(flat.step(), -1);
        let positions: Vec<isize> = flat.positions().collect();
        assert_eq!(positions, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_strided_slice_not_trivial() {
        let v = row(&[6]).slice(&[SliceSpec::new(None, None, 2)]).unwrap();
        assert!(!is_trivial(&v));
    }

    #[test]
    fn test_broadcast_and_gather_never_trivial() {
        // Broadcasting [3] to [1, 3] adds no real axis but is still refused.
        let b = row(&[3]).broadcast_to(&[1, 3]).unwrap();
        assert!(!is_trivial(&b));
        let g = row(&[3]).index_map(&[IndexArray::from_vec(vec![0, 1, 2])]).unwrap();
        assert!(!is_trivial(&g));
    }

    #[test]
    fn test_degenerate_idempotent() {
        let v = row(&[4, 6])
            .slice(&[SliceSpec::range(1, 3), SliceSpec::full()])
            .unwrap();
        let flat = degenerate(&v).unwrap();
        let again = degenerate(&View::new(flat.descriptor().clone())).unwrap();
        assert_eq!(again.descriptor(), flat.descriptor());
        assert_eq!(again, flat);
    }

    #[test]
    fn test_common_flat_order() {
        let a = row(&[2, 3]);
        let b = View::contiguous(&[2, 3], Order::ColMajor).unwrap();
        assert_eq!(common_flat_order(&[&a, &a]), Some(Order::RowMajor));
        assert_eq!(common_flat_order(&[&b, &b]), Some(Order::ColMajor));
        assert_eq!(common_flat_order(&[&a, &b]), None);
        let c = row(&[3, 2]);
        assert_eq!(common_flat_order(&[&a, &c]), None);
        assert_eq!(common_flat_order(&[]), None);
    }
}
