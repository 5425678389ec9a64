//! View chains.
//!
//! A [`View`] records the chain of [`ViewNode`]s applied on top of a base
//! descriptor and keeps the flattened translation state next to it:
//!
//! - affine nodes (transpose, reshape, slice, broadcast) are folded into the
//!   outermost descriptor as they are applied;
//! - each gather node (index map, boolean map) starts a new *level*: the
//!   descriptor composed so far is frozen as the level's parent, and a fresh
//!   row-major descriptor over the gather output becomes the outermost one.
//!
//! Translating a position therefore costs one stride dot product plus one
//! table lookup per gather node, independent of how many affine nodes were
//! applied.

use std::sync::Arc;

use crate::compose::{self, AxisRange, SliceSpec};
use crate::cursor::{Cursor, Enumeration};
use crate::descriptor::Descriptor;
use crate::gather::{BooleanMap, IndexArray, IndexMap, Mask};
use crate::iter::{Elements, Indexed, Positions};
use crate::layout::Order;
use crate::threading::SVec;
use crate::{Result, StridedError};

/// One step of a view chain.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewNode {
    Identity,
    /// Child axis `k` is parent axis `perm[k]`.
    Transpose(Vec<usize>),
    /// Same elements linearized in `order`, regrouped into `dims`.
    Reshape { dims: Vec<usize>, order: Order },
    /// One resolved range per parent axis.
    Slice(Vec<AxisRange>),
    /// Right-aligned expansion to the target shape.
    Broadcast(Vec<usize>),
    IndexMap(Arc<IndexMap>),
    BooleanMap(Arc<BooleanMap>),
}

impl ViewNode {
    /// Whether this node folds into strides.
    pub fn is_affine(&self) -> bool {
        !self.is_gather()
    }

    pub fn is_gather(&self) -> bool {
        matches!(self, ViewNode::IndexMap(_) | ViewNode::BooleanMap(_))
    }

    /// Child shape produced from a parent of shape `parent_dims`.
    ///
    /// # Errors
    /// Any validation error of the corresponding composer.
    pub fn output_dims(&self, parent_dims: &[usize]) -> Result<Vec<usize>> {
        let parent = Descriptor::contiguous(parent_dims, Order::RowMajor)?;
        match self {
            ViewNode::IndexMap(map) => Ok(map.dims().to_vec()),
            ViewNode::BooleanMap(map) => Ok(map.dims().to_vec()),
            affine => Ok(compose_affine(&parent, affine)?.dims().to_vec()),
        }
    }

    /// Translate a child multi-index into the parent's multi-index.
    ///
    /// `parent_dims` is the shape the node was applied to.
    pub fn parent_index(&self, parent_dims: &[usize], child: &[usize]) -> Vec<usize> {
        let mut parent = vec![0usize; parent_dims.len()];
        match self {
            ViewNode::Identity => parent.copy_from_slice(child),
            ViewNode::Transpose(perm) => {
                for (k, &p) in perm.iter().enumerate() {
                    parent[p] = child[k];
                }
            }
            ViewNode::Reshape { dims, order } => {
                let linear = Enumeration::new(dims, *order).ravel(child);
                Enumeration::new(parent_dims, *order).unravel_into(linear, &mut parent);
            }
            ViewNode::Slice(ranges) => {
                for (k, range) in ranges.iter().enumerate() {
                    parent[k] = range.parent_coord(child[k]);
                }
            }
            ViewNode::Broadcast(target) => {
                let lead = target.len() - parent_dims.len();
                for (k, &d) in parent_dims.iter().enumerate() {
                    parent[k] = if d == 1 { 0 } else { child[lead + k] };
                }
            }
            ViewNode::IndexMap(map) => map.parent_index(child, &mut parent),
            ViewNode::BooleanMap(map) => map.parent_index(child, &mut parent),
        }
        parent
    }
}

fn compose_affine(parent: &Descriptor, node: &ViewNode) -> Result<Descriptor> {
    match node {
        ViewNode::Identity => Ok(parent.clone()),
        ViewNode::Transpose(perm) => compose::permute(parent, perm),
        ViewNode::Reshape { dims, order } => compose::reshape(parent, dims, *order),
        ViewNode::Slice(ranges) => {
            if ranges.len() != parent.ndim() {
                return Err(StridedError::RankMismatch(ranges.len(), parent.ndim()));
            }
            for (axis, (range, &extent)) in ranges.iter().zip(parent.dims()).enumerate() {
                if range.step == 0 {
                    return Err(StridedError::ZeroStep { axis });
                }
                if range.len == 0 {
                    continue;
                }
                let last = range.last().unwrap_or(isize::MAX);
                if range.start >= extent || last < 0 || last >= extent as isize {
                    return Err(StridedError::IndexOutOfBounds {
                        axis,
                        index: last.max(range.start as isize),
                        extent,
                    });
                }
            }
            compose::slice(parent, ranges)
        }
        ViewNode::Broadcast(target) => compose::broadcast_to(parent, target),
        ViewNode::IndexMap(_) | ViewNode::BooleanMap(_) => {
            unreachable!("gather nodes are not affine")
        }
    }
}

#[derive(Clone, Debug)]
enum Gather {
    Index(Arc<IndexMap>),
    Boolean(Arc<BooleanMap>),
}

impl Gather {
    fn parent_index(&self, child: &[usize], parent: &mut [usize]) {
        match self {
            Gather::Index(map) => map.parent_index(child, parent),
            Gather::Boolean(map) => map.parent_index(child, parent),
        }
    }
}

/// One gather node plus the descriptor composed underneath it.
#[derive(Clone, Debug)]
struct Level {
    gather: Gather,
    /// Maps the gather's parent multi-index into the previous space.
    parent: Descriptor,
    /// Row-major division table over the gather output.
    output: Enumeration,
}

/// A composed view over storage.
#[derive(Clone, Debug)]
pub struct View {
    base: Descriptor,
    levels: Vec<Level>,
    outer: Descriptor,
    nodes: Vec<ViewNode>,
    /// Parent shape of each node in `nodes`.
    inputs: Vec<Arc<[usize]>>,
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.outer == other.outer && self.nodes == other.nodes
    }
}

impl View {
    /// A view with an empty chain over `base`.
    pub fn new(base: Descriptor) -> Self {
        Self {
            outer: base.clone(),
            base,
            levels: Vec::new(),
            nodes: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// A fresh contiguous view.
    pub fn contiguous(dims: &[usize], order: Order) -> Result<Self> {
        Ok(Self::new(Descriptor::contiguous(dims, order)?))
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.outer.dims()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.outer.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.outer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outer.is_empty()
    }

    /// The descriptor storage positions start from.
    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    /// The outermost composed descriptor.
    ///
    /// Without gather nodes its positions are storage positions.
    pub fn descriptor(&self) -> &Descriptor {
        &self.outer
    }

    /// The collapsed node chain.
    pub fn nodes(&self) -> &[ViewNode] {
        &self.nodes
    }

    /// Number of gather levels between the outer descriptor and storage.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    // ------------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------------

    /// Apply one node on top of this view.
    ///
    /// Gather nodes must have been built against this view's shape.
    pub fn apply(&self, node: ViewNode) -> Result<View> {
        let mut out = self.clone();
        let input: Arc<[usize]> = Arc::from(self.dims());
        match &node {
            ViewNode::IndexMap(map) => {
                check_gather_parent(map.parent_dims(), self.dims())?;
                out.push_level(Gather::Index(map.clone()), map.dims())?;
            }
            ViewNode::BooleanMap(map) => {
                check_gather_parent(map.parent_dims(), self.dims())?;
                out.push_level(Gather::Boolean(map.clone()), map.dims())?;
            }
            affine => out.outer = compose_affine(&self.outer, affine)?,
        }
        out.record(node, input);
        Ok(out)
    }

    /// Reorder axes: child axis `k` is this view's axis `perm[k]`.
    pub fn permute(&self, perm: &[usize]) -> Result<View> {
        self.apply(ViewNode::Transpose(perm.to_vec()))
    }

    /// Reverse the axis order.
    pub fn transpose(&self) -> Result<View> {
        let perm: Vec<usize> = (0..self.ndim()).rev().collect();
        self.permute(&perm)
    }

    pub fn reshape(&self, dims: &[usize], order: Order) -> Result<View> {
        self.apply(ViewNode::Reshape {
            dims: dims.to_vec(),
            order,
        })
    }

    /// Python-style slicing on the leading axes.
    pub fn slice(&self, specs: &[SliceSpec]) -> Result<View> {
        let ranges = compose::resolve_slice(self.dims(), specs)?;
        self.apply(ViewNode::Slice(ranges))
    }

    pub fn broadcast_to(&self, target: &[usize]) -> Result<View> {
        self.apply(ViewNode::Broadcast(target.to_vec()))
    }

    /// Fancy indexing on the leading axes.
    pub fn index_map(&self, arrays: &[IndexArray]) -> Result<View> {
        let map = IndexMap::new(self.dims(), arrays)?;
        self.apply(ViewNode::IndexMap(Arc::new(map)))
    }

    /// Boolean selection on the leading axes, enumerating the mask in `order`.
    pub fn boolean_map(&self, mask: &Mask, order: Order) -> Result<View> {
        let map = BooleanMap::new(self.dims(), mask, order)?;
        self.apply(ViewNode::BooleanMap(Arc::new(map)))
    }

    fn push_level(&mut self, gather: Gather, dims: &[usize]) -> Result<()> {
        let parent = std::mem::replace(&mut self.outer, Descriptor::contiguous(dims, Order::RowMajor)?);
        self.levels.push(Level {
            gather,
            parent,
            output: Enumeration::new(dims, Order::RowMajor),
        });
        Ok(())
    }

    /// Append `node` to the chain, merging it with the previous node when exact.
    fn record(&mut self, node: ViewNode, input: Arc<[usize]>) {
        let merged = match (self.nodes.last(), &node) {
            (Some(ViewNode::Transpose(first)), ViewNode::Transpose(second)) => Some(
                ViewNode::Transpose(second.iter().map(|&k| first[k]).collect()),
            ),
            (Some(ViewNode::Slice(first)), ViewNode::Slice(second)) => first
                .iter()
                .zip(second)
                .map(|(a, b)| a.then(b))
                .collect::<Result<Vec<_>>>()
                .ok()
                .map(ViewNode::Slice),
            (Some(ViewNode::Reshape { order: first, .. }), ViewNode::Reshape { dims, order })
                if first == order =>
            {
                Some(ViewNode::Reshape {
                    dims: dims.clone(),
                    order: *order,
                })
            }
            _ => None,
        };
        let (node, input) = match merged {
            Some(merged) => {
                self.nodes.pop();
                (merged, self.inputs.pop().unwrap_or(input))
            }
            None => (node, input),
        };
        if !is_noop(&node, &input) {
            self.nodes.push(node);
            self.inputs.push(input);
        }
    }

    // ------------------------------------------------------------------------
    // Translation
    // ------------------------------------------------------------------------

    /// Map an outer-descriptor position down to a storage position.
    #[inline]
    pub(crate) fn resolve(&self, outer_pos: isize) -> isize {
        if self.levels.is_empty() {
            return outer_pos;
        }
        let mut pos = outer_pos;
        let mut child: SVec<usize> = SVec::new();
        let mut parent: SVec<usize> = SVec::new();
        for level in self.levels.iter().rev() {
            child.clear();
            child.resize(level.output.ndim(), 0);
            level.output.unravel_into(pos as usize, &mut child);
            parent.clear();
            parent.resize(level.parent.ndim(), 0);
            level.gather.parent_index(&child, &mut parent);
            pos = level.parent.position(&parent);
        }
        pos
    }

    /// Storage position of `index`. No bounds checking.
    #[inline]
    pub fn position(&self, index: &[usize]) -> isize {
        self.resolve(self.outer.position(index))
    }

    /// Storage position of `index`, walking the recorded nodes one by one.
    ///
    /// Agrees with [`View::position`] but costs O(chain length * ndim).
    pub fn position_through_chain(&self, index: &[usize]) -> isize {
        let mut current: SVec<usize> = SVec::from_slice(index);
        for (node, input) in self.nodes.iter().zip(&self.inputs).rev() {
            let parent = node.parent_index(input, &current);
            current.clear();
            current.extend_from_slice(&parent);
        }
        self.base.position(&current)
    }

    /// Validate every reachable position against a storage length.
    pub fn check_storage(&self, storage_len: usize) -> Result<()> {
        self.base.check_storage(storage_len)
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// A cursor at the origin, enumerating in `order`.
    pub fn cursor(&self, order: Order) -> Cursor<'_> {
        Cursor::new(self, order)
    }

    /// Storage positions in `order`.
    pub fn positions(&self, order: Order) -> Positions<'_> {
        Positions::new(self, order)
    }

    /// `(multi-index, storage position)` pairs in `order`.
    pub fn indexed(&self, order: Order) -> Indexed<'_> {
        Indexed::new(self, order)
    }

    /// Element references into `data` in `order`.
    ///
    /// # Errors
    /// [`StridedError::OffsetOverflow`] if the view reaches outside `data`.
    pub fn elements<'a, T>(&'a self, data: &'a [T], order: Order) -> Result<Elements<'a, T>> {
        self.check_storage(data.len())?;
        Ok(Elements::new(self, data, order))
    }
}

/// Nodes that leave their parent unchanged.
fn is_noop(node: &ViewNode, input: &[usize]) -> bool {
    match node {
        ViewNode::Identity => true,
        ViewNode::Transpose(perm) => perm.iter().enumerate().all(|(k, &p)| k == p),
        ViewNode::Reshape { dims, .. } => dims[..] == *input,
        ViewNode::Slice(ranges) => ranges.iter().zip(input).all(|(r, &d)| r.is_full(d)),
        ViewNode::Broadcast(target) => target[..] == *input,
        ViewNode::IndexMap(_) | ViewNode::BooleanMap(_) => false,
    }
}

fn check_gather_parent(parent_dims: &[usize], dims: &[usize]) -> Result<()> {
    if parent_dims != dims {
        return Err(StridedError::ShapeMismatch(
            parent_dims.to_vec(),
            dims.to_vec(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dims: &[usize]) -> View {
        View::contiguous(dims, Order::RowMajor).unwrap()
    }

    fn all_indices(dims: &[usize]) -> Vec<Vec<usize>> {
        let e = Enumeration::new(dims, Order::RowMajor);
        (0..e.len()).map(|i| e.unravel(i).to_vec()).collect()
    }

    fn assert_chain_agrees(v: &View) {
        for idx in all_indices(v.dims()) {
            assert_eq!(v.position(&idx), v.position_through_chain(&idx), "at {idx:?}");
        }
    }

    #[test]
    fn test_identity_dropped() {
        let v = row(&[2, 3]).apply(ViewNode::Identity).unwrap();
        assert!(v.nodes().is_empty());
    }

    #[test]
    fn test_transpose_collapse() {
        let v = row(&[2, 3, 4]).permute(&[1, 2, 0]).unwrap();
        let w = v.permute(&[2, 0, 1]).unwrap();
        // [1,2,0] then [2,0,1] is the identity
        assert!(w.nodes().is_empty());
        assert_eq!(w.descriptor(), row(&[2, 3, 4]).descriptor());

        let u = v.permute(&[1, 0, 2]).unwrap();
        assert_eq!(u.nodes(), &[ViewNode::Transpose(vec![2, 1, 0])]);
        assert_chain_agrees(&u);
    }

    #[test]
    fn test_slice_collapse() {
        let v = row(&[10])
            .slice(&[SliceSpec::new(None, None, 2)])
            .unwrap()
            .slice(&[SliceSpec::reversed()])
            .unwrap();
        assert_eq!(v.nodes().len(), 1);
        let positions: Vec<isize> = (0..5).map(|i| v.position(&[i])).collect();
        assert_eq!(positions, vec![8, 6, 4, 2, 0]);
        assert_chain_agrees(&v);
    }

    #[test]
    fn test_reshape_collapse() {
        let v = row(&[2, 3, 4])
            .reshape(&[6, 4], Order::RowMajor)
            .unwrap()
            .reshape(&[24], Order::RowMajor)
            .unwrap();
        assert_eq!(v.nodes().len(), 1);
        let back = v.reshape(&[2, 3, 4], Order::RowMajor).unwrap();
        assert!(back.nodes().is_empty());
    }

    #[test]
    fn test_mixed_chain_translation() {
        let v = row(&[4, 6])
            .slice(&[SliceSpec::range(1, 4), SliceSpec::new(None, None, -2)])
            .unwrap()
            .transpose()
            .unwrap()
            .broadcast_to(&[2, 3, 3])
            .unwrap();
        assert_eq!(v.dims(), &[2, 3, 3]);
        assert_chain_agrees(&v);
    }

    #[test]
    fn test_index_map_level() {
        let v = row(&[3, 4])
            .transpose()
            .unwrap()
            .index_map(&[IndexArray::from_vec(vec![3, 0])])
            .unwrap();
        assert_eq!(v.dims(), &[2, 3]);
        assert_eq!(v.depth(), 1);
        // child (0, j) is transposed (3, j) = storage (j, 3)
        assert_eq!(v.position(&[0, 2]), 2 * 4 + 3);
        assert_eq!(v.position(&[1, 1]), 4);
        assert_chain_agrees(&v);
    }

    #[test]
    fn test_affine_after_gather() {
        let v = row(&[2, 3])
            .boolean_map(&Mask::new(&[2, 3], vec![true, false, true, false, true, true]).unwrap(), Order::RowMajor)
            .unwrap()
            .slice(&[SliceSpec::reversed()])
            .unwrap();
        let pos: Vec<isize> = (0..4).map(|i| v.position(&[i])).collect();
        assert_eq!(pos, vec![5, 4, 2, 0]);
        assert_chain_agrees(&v);
    }

    #[test]
    fn test_nested_gathers() {
        let v = row(&[5])
            .index_map(&[IndexArray::from_vec(vec![4, 3, 2, 1])])
            .unwrap()
            .index_map(&[IndexArray::from_vec(vec![0, -1])])
            .unwrap();
        assert_eq!(v.depth(), 2);
        assert_eq!(v.position(&[0]), 4);
        assert_eq!(v.position(&[1]), 1);
    }

    #[test]
    fn test_gather_parent_shape_checked() {
        let map = IndexMap::new(&[3], &[IndexArray::from_vec(vec![0])]).unwrap();
        let err = row(&[4]).apply(ViewNode::IndexMap(Arc::new(map))).unwrap_err();
        assert!(matches!(err, StridedError::ShapeMismatch(_, _)));
    }

    #[test]
    fn test_slice_node_validated() {
        let bad = ViewNode::Slice(vec![AxisRange { start: 2, step: 1, len: 3 }]);
        assert!(row(&[3]).apply(bad).is_err());
    }

    #[test]
    fn test_output_dims() {
        let node = ViewNode::Broadcast(vec![4, 2, 3]);
        assert_eq!(node.output_dims(&[2, 1]).unwrap_err().kind(), crate::ErrorKind::Broadcast);
        assert_eq!(node.output_dims(&[1, 3]).unwrap(), vec![4, 2, 3]);
    }

    #[test]
    fn test_elements_checks_storage() {
        let v = row(&[2, 3]);
        let data = [0; 5];
        assert!(v.elements(&data, Order::RowMajor).is_err());
    }
}
