//! Elementwise evaluation over one to three operands.
//!
//! Operands are broadcast to their common shape. When every operand is flat
//! in the same order the loop runs over direct positions; otherwise one cursor
//! per operand is walked in lock-step in row-major order.

use crate::array::StridedArray;
use crate::compose::broadcast_shape;
use crate::layout::Order;
use crate::trivial::{common_flat_order, degenerate, degenerate_in};
use crate::Result;

/// Apply `f` to every element of `src`.
///
/// A flat `src` keeps its layout order; anything else comes out row-major.
pub fn map<T, U, F>(src: &StridedArray<T>, f: F) -> StridedArray<U>
where
    F: Fn(&T) -> U,
{
    let (data, order) = match degenerate(src.view()) {
        Some(flat) => {
            let storage = src.storage();
            let data = flat.positions().map(|p| f(&storage[p as usize])).collect();
            (data, flat.order())
        }
        None => (src.iter(Order::RowMajor).map(f).collect(), Order::RowMajor),
    };
    StridedArray::from_vec_unchecked(data, src.dims(), order)
}

/// Combine two operands elementwise after broadcasting them to a common shape.
///
/// # Errors
/// [`StridedError::BroadcastMismatch`](crate::StridedError::BroadcastMismatch)
/// if the shapes do not broadcast.
pub fn zip_map2<A, B, U, F>(a: &StridedArray<A>, b: &StridedArray<B>, f: F) -> Result<StridedArray<U>>
where
    F: Fn(&A, &B) -> U,
{
    let dims = broadcast_shape(&[a.dims(), b.dims()])?;
    let a = expand(a, &dims)?;
    let b = expand(b, &dims)?;

    if let Some(order) = common_flat_order(&[a.view(), b.view()]) {
        if let (Some(fa), Some(fb)) = (degenerate_in(a.view(), order), degenerate_in(b.view(), order)) {
            tracing::trace!(?dims, ?order, "zip_map2 flat path");
            let (sa, sb) = (a.storage(), b.storage());
            let data = fa
                .positions()
                .zip(fb.positions())
                .map(|(pa, pb)| f(&sa[pa as usize], &sb[pb as usize]))
                .collect();
            return Ok(StridedArray::from_vec_unchecked(data, &dims, order));
        }
    }

    let data = a
        .iter(Order::RowMajor)
        .zip(b.iter(Order::RowMajor))
        .map(|(x, y)| f(x, y))
        .collect();
    Ok(StridedArray::from_vec_unchecked(data, &dims, Order::RowMajor))
}

/// Three-operand version of [`zip_map2`].
pub fn zip_map3<A, B, C, U, F>(
    a: &StridedArray<A>,
    b: &StridedArray<B>,
    c: &StridedArray<C>,
    f: F,
) -> Result<StridedArray<U>>
where
    F: Fn(&A, &B, &C) -> U,
{
    let dims = broadcast_shape(&[a.dims(), b.dims(), c.dims()])?;
    let a = expand(a, &dims)?;
    let b = expand(b, &dims)?;
    let c = expand(c, &dims)?;

    if let Some(order) = common_flat_order(&[a.view(), b.view(), c.view()]) {
        if let (Some(fa), Some(fb), Some(fc)) = (
            degenerate_in(a.view(), order),
            degenerate_in(b.view(), order),
            degenerate_in(c.view(), order),
        ) {
            tracing::trace!(?dims, ?order, "zip_map3 flat path");
            let (sa, sb, sc) = (a.storage(), b.storage(), c.storage());
            let data = fa
                .positions()
                .zip(fb.positions())
                .zip(fc.positions())
                .map(|((pa, pb), pc)| f(&sa[pa as usize], &sb[pb as usize], &sc[pc as usize]))
                .collect();
            return Ok(StridedArray::from_vec_unchecked(data, &dims, order));
        }
    }

    let data = a
        .iter(Order::RowMajor)
        .zip(b.iter(Order::RowMajor))
        .zip(c.iter(Order::RowMajor))
        .map(|((x, y), z)| f(x, y, z))
        .collect();
    Ok(StridedArray::from_vec_unchecked(data, &dims, Order::RowMajor))
}

/// Broadcast only when the shape actually changes, so flat operands stay flat.
fn expand<T>(src: &StridedArray<T>, dims: &[usize]) -> Result<StridedArray<T>> {
    if src.dims() == dims {
        Ok(src.clone())
    } else {
        src.broadcast_to(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SliceSpec;
    use approx::assert_relative_eq;

    #[test]
    fn test_map_keeps_flat_order() {
        let a = StridedArray::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], Order::ColMajor).unwrap();
        let b = map(&a, |x| x * 2.0);
        assert_eq!(b.view().descriptor().layout(), Some(Order::ColMajor));
        assert_eq!(b.to_vec(Order::ColMajor), vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_map_strided_source() {
        let a = StridedArray::from_vec((0..10).collect(), &[10], Order::RowMajor).unwrap();
        let evens = a.slice(&[SliceSpec::new(None, None, 2)]).unwrap();
        let out = map(&evens, |&x| x + 1);
        assert_eq!(out.to_vec(Order::RowMajor), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_zip_map2_broadcast() {
        let a = StridedArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::RowMajor).unwrap();
        let b = StridedArray::from_vec(vec![10.0, 20.0, 30.0], &[3], Order::RowMajor).unwrap();
        let c = zip_map2(&a, &b, |x, y| x + y).unwrap();
        assert_eq!(c.dims(), &[2, 3]);
        let v = c.to_vec(Order::RowMajor);
        for (got, want) in v.iter().zip([11.0, 22.0, 33.0, 14.0, 25.0, 36.0]) {
            assert_relative_eq!(*got, want);
        }
    }

    #[test]
    fn test_zip_map2_mixed_orders() {
        let a = StridedArray::from_vec(vec![1, 2, 3, 4], &[2, 2], Order::RowMajor).unwrap();
        let b = StridedArray::from_vec(vec![1, 3, 2, 4], &[2, 2], Order::ColMajor).unwrap();
        let c = zip_map2(&a, &b, |x, y| x * 10 + y).unwrap();
        assert_eq!(c.to_vec(Order::RowMajor), vec![11, 22, 33, 44]);
    }

    #[test]
    fn test_zip_map2_shape_error() {
        let a = StridedArray::from_vec(vec![1, 2], &[2], Order::RowMajor).unwrap();
        let b = StridedArray::from_vec(vec![1, 2, 3], &[3], Order::RowMajor).unwrap();
        assert!(zip_map2(&a, &b, |x, y| x + y).is_err());
    }

    #[test]
    fn test_zip_map3() {
        let a = StridedArray::from_vec(vec![1, 2], &[2, 1], Order::RowMajor).unwrap();
        let b = StridedArray::from_vec(vec![10, 20, 30], &[3], Order::RowMajor).unwrap();
        let c = StridedArray::scalar(100);
        let out = zip_map3(&a, &b, &c, |x, y, z| x + y + z).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.to_vec(Order::RowMajor), vec![111, 121, 131, 112, 122, 132]);
    }
}
