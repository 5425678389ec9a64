//! Shared storage plus a view.

use std::sync::Arc;

use crate::compose::SliceSpec;
use crate::cursor::{Cursor, Enumeration};
use crate::descriptor::{checked_len, Descriptor};
use crate::gather::{IndexArray, Mask};
use crate::iter::{Elements, Indexed, Positions};
use crate::layout::Order;
use crate::trivial::{self, FlatLayout};
use crate::view::{View, ViewNode};
use crate::{Result, StridedError};

/// An N-dimensional array: reference-counted storage and a [`View`] over it.
///
/// View operations return a new array sharing the same storage; the storage
/// lives as long as its longest-lived holder.
#[derive(Debug)]
pub struct StridedArray<T> {
    storage: Arc<[T]>,
    view: View,
}

// Cloning shares the storage, so no `T: Clone` bound.
impl<T> Clone for StridedArray<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            view: self.view.clone(),
        }
    }
}

impl<T> StridedArray<T> {
    /// Wrap `data` as a contiguous array of shape `dims` laid out in `order`.
    ///
    /// # Errors
    /// [`StridedError::ShapeMismatch`] if `data.len()` is not the product of `dims`.
    pub fn from_vec(data: Vec<T>, dims: &[usize], order: Order) -> Result<Self> {
        if checked_len(dims)? != data.len() {
            return Err(StridedError::ShapeMismatch(
                dims.to_vec(),
                vec![data.len()],
            ));
        }
        Ok(Self {
            storage: Arc::from(data),
            view: View::contiguous(dims, order)?,
        })
    }

    /// `data.len()` must already match `dims`.
    pub(crate) fn from_vec_unchecked(data: Vec<T>, dims: &[usize], order: Order) -> Self {
        debug_assert_eq!(data.len(), dims.iter().product::<usize>());
        Self {
            storage: Arc::from(data),
            view: View::new(contiguous_descriptor(dims, order)),
        }
    }

    /// Combine existing storage with a view over it.
    ///
    /// # Errors
    /// [`StridedError::OffsetOverflow`] if the view reaches outside `storage`.
    pub fn from_parts(storage: Arc<[T]>, view: View) -> Result<Self> {
        view.check_storage(storage.len())?;
        Ok(Self { storage, view })
    }

    /// Build a contiguous array by calling `f` with every multi-index.
    pub fn from_fn(dims: &[usize], order: Order, mut f: impl FnMut(&[usize]) -> T) -> Result<Self> {
        let walk = Enumeration::new(dims, order);
        let mut index = vec![0usize; dims.len()];
        let len = checked_len(dims)?;
        let mut data = Vec::with_capacity(len);
        for linear in 0..len {
            walk.unravel_into(linear, &mut index);
            data.push(f(&index));
        }
        Self::from_vec(data, dims, order)
    }

    /// A zero-dimensional array.
    pub fn scalar(value: T) -> Self {
        Self {
            storage: Arc::from(vec![value]),
            view: View::new(Descriptor::scalar(0)),
        }
    }

    /// A contiguous row-major array with every element equal to `value`.
    pub fn full(dims: &[usize], value: T) -> Result<Self>
    where
        T: Clone,
    {
        let len = checked_len(dims)?;
        Self::from_vec(vec![value; len], dims, Order::RowMajor)
    }

    #[inline]
    pub fn view(&self) -> &View {
        &self.view
    }

    /// The whole backing storage, including elements outside the view.
    #[inline]
    pub fn storage(&self) -> &[T] {
        &self.storage
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.view.dims()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.view.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Whether both arrays read the same allocation.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Bounds-checked element access.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.ndim() || index.iter().zip(self.dims()).any(|(&i, &d)| i >= d) {
            return None;
        }
        Some(&self.storage[self.view.position(index) as usize])
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// Element references in `order`.
    pub fn iter(&self, order: Order) -> Elements<'_, T> {
        Elements::new(&self.view, &self.storage, order)
    }

    pub fn positions(&self, order: Order) -> Positions<'_> {
        self.view.positions(order)
    }

    /// `(multi-index, element)` pairs in `order`.
    pub fn indexed_iter(&self, order: Order) -> impl Iterator<Item = (Vec<usize>, &T)> + '_ {
        let storage = &self.storage;
        Indexed::new(&self.view, order).map(move |(index, pos)| (index, &storage[pos as usize]))
    }

    pub fn cursor(&self, order: Order) -> Cursor<'_> {
        self.view.cursor(order)
    }

    /// Copy the elements out in `order`.
    pub fn to_vec(&self, order: Order) -> Vec<T>
    where
        T: Clone,
    {
        if let Some(flat) = trivial::degenerate_in(&self.view, order) {
            return flat
                .positions()
                .map(|pos| self.storage[pos as usize].clone())
                .collect();
        }
        self.iter(order).cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    fn with_view(&self, view: View) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            view,
        }
    }

    pub fn apply(&self, node: ViewNode) -> Result<Self> {
        Ok(self.with_view(self.view.apply(node)?))
    }

    pub fn permute(&self, perm: &[usize]) -> Result<Self> {
        Ok(self.with_view(self.view.permute(perm)?))
    }

    pub fn transpose(&self) -> Result<Self> {
        Ok(self.with_view(self.view.transpose()?))
    }

    /// Zero-copy reshape; fails with [`StridedError::ReshapeRequiresCopy`]
    /// when the elements are not one run in `order`.
    pub fn reshape(&self, dims: &[usize], order: Order) -> Result<Self> {
        Ok(self.with_view(self.view.reshape(dims, order)?))
    }

    pub fn slice(&self, specs: &[SliceSpec]) -> Result<Self> {
        Ok(self.with_view(self.view.slice(specs)?))
    }

    pub fn broadcast_to(&self, target: &[usize]) -> Result<Self> {
        Ok(self.with_view(self.view.broadcast_to(target)?))
    }

    pub fn index_map(&self, arrays: &[IndexArray]) -> Result<Self> {
        Ok(self.with_view(self.view.index_map(arrays)?))
    }

    pub fn boolean_map(&self, mask: &Mask, order: Order) -> Result<Self> {
        Ok(self.with_view(self.view.boolean_map(mask, order)?))
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    pub fn is_trivial(&self) -> bool {
        trivial::is_trivial(&self.view)
    }

    pub fn degenerate(&self) -> Option<FlatLayout> {
        trivial::degenerate(&self.view)
    }

    /// The viewed elements as one storage slice, with the order they are laid out in.
    ///
    /// `None` unless the view is trivial with a forward step.
    pub fn as_flat_slice(&self) -> Option<(&[T], Order)> {
        let flat = self.degenerate()?;
        if flat.step() != 1 {
            return None;
        }
        // An empty view may carry any offset.
        if flat.is_empty() {
            return Some((&[], flat.order()));
        }
        let start = flat.offset() as usize;
        Some((&self.storage[start..start + flat.len()], flat.order()))
    }

    /// Materialize into fresh contiguous storage laid out in `order`.
    pub fn to_contiguous(&self, order: Order) -> Self
    where
        T: Clone,
    {
        Self::from_vec_unchecked(self.to_vec(order), self.dims(), order)
    }

    /// Reshape, copying into `order` first when a view is impossible.
    pub fn reshape_or_copy(&self, dims: &[usize], order: Order) -> Result<Self>
    where
        T: Clone,
    {
        match self.reshape(dims, order) {
            Err(StridedError::ReshapeRequiresCopy { from, to }) => {
                tracing::debug!(?from, ?to, ?order, "materializing for reshape");
                self.to_contiguous(order).reshape(dims, order)
            }
            other => other,
        }
    }
}

/// Canonical descriptor for dims that already passed validation.
fn contiguous_descriptor(dims: &[usize], order: Order) -> Descriptor {
    Descriptor::from_parts_unchecked(
        dims.to_vec(),
        crate::layout::contiguous_strides(dims, order),
        0,
    )
}
