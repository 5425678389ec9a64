//! Gather view kinds: integer index maps and boolean masks.
//!
//! Unlike the affine kinds these cannot be folded into strides. Each one
//! owns a translation table from child multi-index to parent multi-index.

use crate::compose::{broadcast_shape, broadcast_to};
use crate::cursor::Enumeration;
use crate::descriptor::{checked_len, Descriptor};
use crate::layout::Order;
use crate::{Result, StridedError};

// ============================================================================
// Index arrays
// ============================================================================

/// A row-major integer array used for fancy indexing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexArray {
    dims: Vec<usize>,
    values: Vec<isize>,
}

impl IndexArray {
    /// # Errors
    /// [`StridedError::ShapeMismatch`] if `values.len()` is not the product of `dims`.
    pub fn new(dims: &[usize], values: Vec<isize>) -> Result<Self> {
        if checked_len(dims)? != values.len() {
            return Err(StridedError::ShapeMismatch(
                dims.to_vec(),
                vec![values.len()],
            ));
        }
        Ok(Self {
            dims: dims.to_vec(),
            values,
        })
    }

    /// A 1-D index array.
    pub fn from_vec(values: Vec<isize>) -> Self {
        Self {
            dims: vec![values.len()],
            values,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values(&self) -> &[isize] {
        &self.values
    }
}

impl From<Vec<isize>> for IndexArray {
    fn from(values: Vec<isize>) -> Self {
        Self::from_vec(values)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AxisTable {
    /// Parent coordinates after negative wraparound.
    coords: Vec<usize>,
    /// Maps an index-space multi-index to a slot in `coords`.
    desc: Descriptor,
}

/// Fancy indexing on the leading parent axes.
///
/// With `k` index arrays broadcasting to shape `S`, the child shape is
/// `S ++ parent_dims[k..]` and
/// `parent[a] = arrays[a][child[..S.len()]]` for `a < k`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMap {
    parent_dims: Vec<usize>,
    index_dims: Vec<usize>,
    tables: Vec<AxisTable>,
    dims: Vec<usize>,
}

impl IndexMap {
    /// Validate `arrays` against `parent_dims` and build the translation tables.
    ///
    /// # Errors
    /// - [`StridedError::RankMismatch`] if there are more arrays than parent axes
    /// - [`StridedError::BroadcastMismatch`] if the array shapes do not broadcast
    /// - [`StridedError::IndexOutOfBounds`] for a value outside `[-extent, extent)`
    pub fn new(parent_dims: &[usize], arrays: &[IndexArray]) -> Result<Self> {
        if arrays.len() > parent_dims.len() {
            return Err(StridedError::RankMismatch(arrays.len(), parent_dims.len()));
        }
        let shapes: Vec<&[usize]> = arrays.iter().map(|a| a.dims()).collect();
        let index_dims = broadcast_shape(&shapes)?;

        let mut tables = Vec::with_capacity(arrays.len());
        for (axis, array) in arrays.iter().enumerate() {
            let extent = parent_dims[axis];
            let coords = array
                .values()
                .iter()
                .map(|&v| wrap_index(axis, v, extent))
                .collect::<Result<Vec<_>>>()?;
            let own = Descriptor::contiguous(array.dims(), Order::RowMajor)?;
            let desc = broadcast_to(&own, &index_dims)?;
            tables.push(AxisTable { coords, desc });
        }

        let mut dims = index_dims.clone();
        dims.extend_from_slice(&parent_dims[arrays.len()..]);
        checked_len(&dims)?;
        Ok(Self {
            parent_dims: parent_dims.to_vec(),
            index_dims,
            tables,
            dims,
        })
    }

    /// Shape of the parent this map was built against.
    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    /// Child shape.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of parent axes consumed by index arrays.
    pub fn mapped_axes(&self) -> usize {
        self.tables.len()
    }

    /// Write the parent multi-index of `child` into `parent`.
    pub fn parent_index(&self, child: &[usize], parent: &mut [usize]) {
        debug_assert_eq!(child.len(), self.dims.len());
        debug_assert_eq!(parent.len(), self.parent_dims.len());
        let m = self.index_dims.len();
        let k = self.tables.len();
        let (head, tail) = child.split_at(m);
        for (axis, table) in self.tables.iter().enumerate() {
            parent[axis] = table.coords[table.desc.position(head) as usize];
        }
        parent[k..].copy_from_slice(tail);
    }
}

fn wrap_index(axis: usize, value: isize, extent: usize) -> Result<usize> {
    let n = extent as isize;
    let wrapped = if value < 0 { value + n } else { value };
    if wrapped < 0 || wrapped >= n {
        return Err(StridedError::IndexOutOfBounds {
            axis,
            index: value,
            extent,
        });
    }
    Ok(wrapped as usize)
}

// ============================================================================
// Boolean masks
// ============================================================================

/// A row-major boolean predicate array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    dims: Vec<usize>,
    values: Vec<bool>,
}

impl Mask {
    /// # Errors
    /// [`StridedError::ShapeMismatch`] if `values.len()` is not the product of `dims`.
    pub fn new(dims: &[usize], values: Vec<bool>) -> Result<Self> {
        if checked_len(dims)? != values.len() {
            return Err(StridedError::ShapeMismatch(
                dims.to_vec(),
                vec![values.len()],
            ));
        }
        Ok(Self {
            dims: dims.to_vec(),
            values,
        })
    }

    /// A 1-D mask.
    pub fn from_vec(values: Vec<bool>) -> Self {
        Self {
            dims: vec![values.len()],
            values,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn count(&self) -> usize {
        self.values.iter().filter(|&&b| b).count()
    }
}

/// Boolean selection on the leading parent axes.
///
/// The child has shape `[count] ++ parent_dims[mask.ndim()..]`; its first
/// axis runs over the selected mask coordinates in the requested order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BooleanMap {
    parent_dims: Vec<usize>,
    /// Selected mask coordinates, `mask_ndim` entries each.
    selected: Vec<usize>,
    mask_ndim: usize,
    order: Order,
    dims: Vec<usize>,
}

impl BooleanMap {
    /// # Errors
    /// [`StridedError::ShapeMismatch`] if the mask shape is not a prefix of `parent_dims`.
    pub fn new(parent_dims: &[usize], mask: &Mask, order: Order) -> Result<Self> {
        let m = mask.dims().len();
        if m > parent_dims.len() || parent_dims[..m] != *mask.dims() {
            return Err(StridedError::ShapeMismatch(
                mask.dims().to_vec(),
                parent_dims.to_vec(),
            ));
        }

        let storage = Descriptor::contiguous(mask.dims(), Order::RowMajor)?;
        let walk = Enumeration::new(mask.dims(), order);
        let mut coords = vec![0usize; m];
        let mut selected = Vec::with_capacity(mask.count() * m);
        let mut count = 0;
        for linear in 0..walk.len() {
            walk.unravel_into(linear, &mut coords);
            if mask.values()[storage.position(&coords) as usize] {
                selected.extend_from_slice(&coords);
                count += 1;
            }
        }

        let mut dims = Vec::with_capacity(1 + parent_dims.len() - m);
        dims.push(count);
        dims.extend_from_slice(&parent_dims[m..]);
        Ok(Self {
            parent_dims: parent_dims.to_vec(),
            selected,
            mask_ndim: m,
            order,
            dims,
        })
    }

    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of selected mask positions.
    pub fn count(&self) -> usize {
        self.dims[0]
    }

    /// Order the mask was enumerated in.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Write the parent multi-index of `child` into `parent`.
    pub fn parent_index(&self, child: &[usize], parent: &mut [usize]) {
        debug_assert_eq!(child.len(), self.dims.len());
        debug_assert_eq!(parent.len(), self.parent_dims.len());
        let m = self.mask_ndim;
        let start = child[0] * m;
        parent[..m].copy_from_slice(&self.selected[start..start + m]);
        parent[m..].copy_from_slice(&child[1..]);
    }
}
