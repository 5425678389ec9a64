//! Traversal core for strided N-dimensional array views.
//!
//! This crate provides the machinery that lets arbitrarily composed views
//! (transpose, reshape, slicing, broadcasting, index and boolean mapping) be
//! walked element-by-element or reduced along axes without materializing
//! intermediate arrays.
//!
//! # Core Types
//!
//! - [`Descriptor`]: immutable shape + strides + offset record
//! - [`View`]: a chain of [`ViewNode`]s flattened into descriptors and gather levels
//! - [`Cursor`]: a movable multi-index position with ripple-carry stepping
//! - [`StridedArray`]: shared storage (`Arc<[T]>`) plus a view
//!
//! # Traversal
//!
//! - [`Positions`], [`Indexed`], [`Elements`]: forward, reverse and random-access
//!   iteration in either [`Order`], independent of the storage order
//! - [`is_trivial`] / [`degenerate`]: detect views that reduce to flat
//!   pointer arithmetic and take the fast path
//!
//! # Reductions
//!
//! - [`reduce`]: associative reduction over an axis set, optional seed
//! - [`fold`]: seeded reduction with a different accumulator type
//! - [`scan`]: cumulative reduction along one axis
//! - [`ops`]: `sum`, `prod`, `min`, `max`, `all`, `any`, `cumsum`, `nansum`, ...
//!
//! # Example
//!
//! ```rust
//! use strided_traverse::{reduce, Axes, Order, SliceSpec, StridedArray};
//!
//! let a = StridedArray::from_vec(vec![1, 2, 3, 4, 5, 6], &[2, 3], Order::RowMajor).unwrap();
//!
//! // Zero-copy slice of the last two columns
//! let tail = a.slice(&[SliceSpec::full(), SliceSpec::range(1, 3)]).unwrap();
//! assert_eq!(tail.dims(), &[2, 2]);
//! assert_eq!(tail.to_vec(Order::RowMajor), vec![2, 3, 5, 6]);
//!
//! // Column sums
//! let sums = reduce(&a, &Axes::single(0), false, None, |x, y| x + y).unwrap();
//! assert_eq!(sums.to_vec(Order::RowMajor), vec![5, 7, 9]);
//! ```

mod array;
pub mod compose;
mod cursor;
mod descriptor;
pub mod gather;
mod iter;
mod layout;
mod map;
pub mod ops;
mod reduce;
mod threading;
mod trivial;
mod view;

pub use array::StridedArray;
pub use compose::{broadcast_shape, invert_permutation, AxisRange, SliceSpec};
pub use cursor::{Cursor, Enumeration};
pub use descriptor::{make_descriptor, Descriptor};
pub use gather::{BooleanMap, IndexArray, IndexMap, Mask};
pub use iter::{Elements, Indexed, Positions};
pub use layout::{col_major_strides, contiguous_layout, row_major_strides, Order};
pub use map::{map, zip_map2, zip_map3};
pub use ops::NanPolicy;
pub use reduce::{fold, reduce, scan, Axes};
pub use threading::{partition, MaybeSend, MaybeSendSync, MaybeSync, MIN_PARALLEL_LEN};
pub use trivial::{common_flat_order, degenerate, degenerate_in, is_trivial, FlatLayout};
pub use view::{View, ViewNode};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while building views or setting up reductions.
///
/// Every variant is detected before any element is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StridedError {
    /// An extent passed as a signed integer was negative.
    #[error("negative extent {extent} on axis {axis}")]
    NegativeExtent { axis: usize, extent: isize },

    /// Shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Stride array length doesn't match dims.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// The parent is not contiguous in the requested order; the caller must copy.
    #[error("reshape from {from:?} to {to:?} requires a copy")]
    ReshapeRequiresCopy { from: Vec<usize>, to: Vec<usize> },

    /// Integer overflow while computing a position, or a position outside storage.
    #[error("offset overflow while computing position")]
    OffsetOverflow,

    /// Axis index out of range for the given rank.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// The same axis was named twice.
    #[error("duplicate axis {axis}")]
    DuplicateAxis { axis: usize },

    /// The permutation does not cover `0..rank` exactly once.
    #[error("invalid permutation {0:?}")]
    InvalidPermutation(Vec<usize>),

    /// A non-1 extent cannot be aligned with the target extent.
    #[error("cannot broadcast {from:?} to {to:?}")]
    BroadcastMismatch { from: Vec<usize>, to: Vec<usize> },

    /// Fancy-index value out of range after negative wraparound.
    #[error("index {index} out of bounds for axis {axis} with extent {extent}")]
    IndexOutOfBounds {
        axis: usize,
        index: isize,
        extent: usize,
    },

    /// A slice step of zero.
    #[error("slice step cannot be zero (axis {axis})")]
    ZeroStep { axis: usize },

    /// Reducing an extent-0 axis without an initial value.
    #[error("reduction over empty axis {axis} without an initial value")]
    EmptyReduce { axis: usize },
}

/// Taxonomy class of a [`StridedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Shape,
    Axis,
    Broadcast,
    Index,
    EmptyReduce,
}

impl StridedError {
    /// The taxonomy class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StridedError::NegativeExtent { .. }
            | StridedError::ShapeMismatch(..)
            | StridedError::RankMismatch(..)
            | StridedError::StrideLengthMismatch
            | StridedError::ReshapeRequiresCopy { .. }
            | StridedError::OffsetOverflow => ErrorKind::Shape,
            StridedError::InvalidAxis { .. }
            | StridedError::DuplicateAxis { .. }
            | StridedError::InvalidPermutation(_) => ErrorKind::Axis,
            StridedError::BroadcastMismatch { .. } => ErrorKind::Broadcast,
            StridedError::IndexOutOfBounds { .. } | StridedError::ZeroStep { .. } => {
                ErrorKind::Index
            }
            StridedError::EmptyReduce { .. } => ErrorKind::EmptyReduce,
        }
    }
}

/// Result type for view construction and reductions.
pub type Result<T> = std::result::Result<T, StridedError>;
