//! Shape/strides descriptor.

use std::sync::Arc;

use crate::layout::{contiguous_block, contiguous_strides, Block, Order};
use crate::{Result, StridedError};

/// Immutable record mapping multi-indices to linear storage positions.
///
/// `position(index) = offset + sum(index[k] * strides[k])`.
///
/// Dims and strides are shared (`Arc<[_]>`), so cloning is cheap. The
/// contiguity classification is computed once here and travels with the
/// descriptor.
#[derive(Clone)]
pub struct Descriptor {
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    len: usize,
    block: Option<Block>,
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Two descriptors are equal iff they visit memory identically.
impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.strides == other.strides && self.offset == other.offset
    }
}

impl Eq for Descriptor {}

/// Canonical descriptor for a fresh contiguous array given signed extents.
///
/// # Errors
/// [`StridedError::NegativeExtent`] if any extent is negative.
pub fn make_descriptor(extents: &[isize], order: Order) -> Result<Descriptor> {
    let mut dims = Vec::with_capacity(extents.len());
    for (axis, &extent) in extents.iter().enumerate() {
        if extent < 0 {
            return Err(StridedError::NegativeExtent { axis, extent });
        }
        dims.push(extent as usize);
    }
    Descriptor::contiguous(&dims, order)
}

pub(crate) fn checked_len(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= isize::MAX as usize)
        .ok_or(StridedError::OffsetOverflow)
}

impl Descriptor {
    /// Canonical strides for a fresh contiguous array in `order`.
    pub fn contiguous(dims: &[usize], order: Order) -> Result<Self> {
        checked_len(dims)?;
        Ok(Self::from_parts_unchecked(
            dims.to_vec(),
            contiguous_strides(dims, order),
            0,
        ))
    }

    /// A zero-dimensional descriptor pointing at `offset`.
    pub fn scalar(offset: isize) -> Self {
        Self::from_parts_unchecked(Vec::new(), Vec::new(), offset)
    }

    /// Create from explicit parts.
    ///
    /// # Errors
    /// - [`StridedError::StrideLengthMismatch`] if `dims` and `strides` differ in length
    /// - [`StridedError::OffsetOverflow`] if a reachable position overflows `isize`
    pub fn from_parts(dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        if dims.len() != strides.len() {
            return Err(StridedError::StrideLengthMismatch);
        }
        checked_len(dims)?;
        let desc = Self::from_parts_unchecked(dims.to_vec(), strides.to_vec(), offset);
        desc.checked_span()?;
        Ok(desc)
    }

    /// Composers call this after they have established the invariants themselves.
    pub(crate) fn from_parts_unchecked(dims: Vec<usize>, strides: Vec<isize>, offset: isize) -> Self {
        debug_assert_eq!(dims.len(), strides.len());
        let len = dims.iter().product();
        let block = contiguous_block(&dims, &strides);
        Self {
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            len,
            block,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements: 0 if any extent is 0, 1 for scalars.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Storage position of `index`.
    ///
    /// No bounds checking: the caller supplies one in-range coordinate per axis.
    #[inline]
    pub fn position(&self, index: &[usize]) -> isize {
        debug_assert_eq!(index.len(), self.dims.len(), "wrong number of indices");
        let mut pos = self.offset;
        for ((&i, &s), &d) in index.iter().zip(self.strides.iter()).zip(self.dims.iter()) {
            debug_assert!(i < d, "index {i} out of bounds for extent {d}");
            pos += i as isize * s;
        }
        pos
    }

    /// Contiguous order of this descriptor, preferring row-major.
    #[inline]
    pub fn layout(&self) -> Option<Order> {
        self.block.map(|b| b.order())
    }

    /// Whether the reachable positions form one run walked in `order`.
    #[inline]
    pub fn is_contiguous_in(&self, order: Order) -> bool {
        self.block.is_some_and(|b| b.supports(order))
    }

    #[inline]
    pub(crate) fn block(&self) -> Option<Block> {
        self.block
    }

    /// Lowest and highest reachable positions, `None` when empty.
    pub fn span(&self) -> Option<(isize, isize)> {
        self.checked_span().ok().flatten()
    }

    fn checked_span(&self) -> Result<Option<(isize, isize)>> {
        if self.len == 0 {
            return Ok(None);
        }
        let mut lo = self.offset;
        let mut hi = self.offset;
        for (&dim, &stride) in self.dims.iter().zip(self.strides.iter()) {
            if dim <= 1 {
                continue;
            }
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(StridedError::OffsetOverflow)?;
            if end >= 0 {
                hi = hi.checked_add(end).ok_or(StridedError::OffsetOverflow)?;
            } else {
                lo = lo.checked_add(end).ok_or(StridedError::OffsetOverflow)?;
            }
        }
        Ok(Some((lo, hi)))
    }

    /// Validate that every reachable position lies in `[0, storage_len)`.
    pub fn check_storage(&self, storage_len: usize) -> Result<()> {
        match self.checked_span()? {
            None => Ok(()),
            Some((lo, hi)) if lo >= 0 && (hi as usize) < storage_len => Ok(()),
            Some(_) => Err(StridedError::OffsetOverflow),
        }
    }
}
