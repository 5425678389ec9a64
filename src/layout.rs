//! Traversal orders and contiguity checks.
//!
//! A stride set is a *block* when the axes with extent > 1 tile a single
//! run of memory in row-major or column-major axis order, all walking in the
//! same direction.

/// Enumeration order of a multi-index space.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Order {
    /// C-like: last axis varies fastest.
    #[default]
    RowMajor,
    /// Fortran/Julia-like: first axis varies fastest.
    ColMajor,
}

impl Order {
    /// The fastest-varying axis, `None` for scalars.
    #[inline]
    pub fn fastest_axis(self, ndim: usize) -> Option<usize> {
        if ndim == 0 {
            return None;
        }
        match self {
            Order::RowMajor => Some(ndim - 1),
            Order::ColMajor => Some(0),
        }
    }

    /// The next slower axis after `axis`, `None` when `axis` is the slowest.
    #[inline]
    pub fn slower_axis(self, axis: usize, ndim: usize) -> Option<usize> {
        match self {
            Order::RowMajor => axis.checked_sub(1),
            Order::ColMajor => (axis + 1 < ndim).then_some(axis + 1),
        }
    }

    /// Axes listed from fastest to slowest.
    pub fn fastest_first(self, ndim: usize) -> impl Iterator<Item = usize> {
        (0..ndim).map(move |k| match self {
            Order::RowMajor => ndim - 1 - k,
            Order::ColMajor => k,
        })
    }
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1].max(1) as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].max(1) as isize;
    }
    strides
}

pub(crate) fn contiguous_strides(dims: &[usize], order: Order) -> Vec<isize> {
    match order {
        Order::RowMajor => row_major_strides(dims),
        Order::ColMajor => col_major_strides(dims),
    }
}

/// Contiguity classification of a (dims, strides) pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Block {
    pub(crate) row_major: bool,
    pub(crate) col_major: bool,
    /// +1 for forward blocks, -1 for fully reversed ones.
    pub(crate) sign: isize,
}

impl Block {
    #[inline]
    pub(crate) fn supports(&self, order: Order) -> bool {
        match order {
            Order::RowMajor => self.row_major,
            Order::ColMajor => self.col_major,
        }
    }

    /// Preferred order, row-major when both hold.
    #[inline]
    pub(crate) fn order(&self) -> Order {
        if self.row_major {
            Order::RowMajor
        } else {
            Order::ColMajor
        }
    }
}

/// Classify `(dims, strides)`.
///
/// Axes with extent <= 1 are ignored since they never move the position.
/// Zero strides on a real axis (broadcast) and mixed stride signs are never a block.
pub(crate) fn contiguous_block(dims: &[usize], strides: &[isize]) -> Option<Block> {
    if dims.len() != strides.len() {
        return None;
    }
    let mut sign = 0isize;
    for (&dim, &stride) in dims.iter().zip(strides) {
        if dim <= 1 {
            continue;
        }
        let s = stride.signum();
        if s == 0 || (sign != 0 && s != sign) {
            return None;
        }
        sign = s;
    }
    if sign == 0 {
        // At most one reachable position.
        return Some(Block {
            row_major: true,
            col_major: true,
            sign: 1,
        });
    }

    let row_major = is_run(dims.iter().rev().zip(strides.iter().rev()), sign);
    let col_major = is_run(dims.iter().zip(strides.iter()), sign);
    (row_major || col_major).then_some(Block {
        row_major,
        col_major,
        sign,
    })
}

fn is_run<'a>(axes: impl Iterator<Item = (&'a usize, &'a isize)>, sign: isize) -> bool {
    let mut expected = 1isize;
    for (&dim, &stride) in axes {
        if dim <= 1 {
            continue;
        }
        if stride * sign != expected {
            return false;
        }
        expected = match expected.checked_mul(dim as isize) {
            Some(e) => e,
            None => return false,
        };
    }
    true
}

/// Returns the contiguous order of `(dims, strides)`, preferring row-major.
pub fn contiguous_layout(dims: &[usize], strides: &[isize]) -> Option<Order> {
    contiguous_block(dims, strides).map(|b| b.order())
}

/// Compute the relative order of strides.
///
/// `result[i]` is the rank of `|strides[i]|` among all non-zero strides;
/// zero strides rank 1.
pub(crate) fn index_order(strides: &[isize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&si| {
            let si = si.unsigned_abs();
            if si == 0 {
                return 1;
            }
            1 + strides
                .iter()
                .filter(|&&s| s != 0 && s.unsigned_abs() < si)
                .count()
        })
        .collect()
}

/// The enumeration order that walks `(dims, strides)` closest to memory order.
///
/// Blocks use their own order. Otherwise the first and last real axes are
/// compared by stride rank; ties go to row-major.
pub(crate) fn natural_order(dims: &[usize], strides: &[isize]) -> Order {
    if let Some(block) = contiguous_block(dims, strides) {
        return block.order();
    }
    let ranks = index_order(strides);
    let real: Vec<usize> = (0..dims.len()).filter(|&k| dims[k] > 1).collect();
    match (real.first(), real.last()) {
        (Some(&first), Some(&last)) if ranks[first] < ranks[last] => Order::ColMajor,
        _ => Order::RowMajor,
    }
}
