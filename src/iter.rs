//! Iterator adapters over [`Cursor`].
//!
//! Each adapter owns two cursors, one for each end, plus the count of
//! positions left between them. `nth` and `nth_back` jump with
//! [`Cursor::seek`], so random access costs O(ndim) regardless of distance.

use std::iter::FusedIterator;

use crate::cursor::Cursor;
use crate::layout::Order;
use crate::view::View;

#[derive(Clone, Debug)]
struct Walk<'v> {
    front: Cursor<'v>,
    /// One past the last position still to be yielded from the back.
    back: Cursor<'v>,
    remaining: usize,
}

impl<'v> Walk<'v> {
    fn new(view: &'v View, order: Order) -> Self {
        let front = Cursor::new(view, order);
        let mut back = front.clone();
        back.seek(view.len() as isize);
        Self {
            front,
            back,
            remaining: view.len(),
        }
    }

    #[inline]
    fn next_with<R>(&mut self, f: impl FnOnce(&Cursor<'v>) -> R) -> Option<R> {
        if self.remaining == 0 {
            return None;
        }
        let out = f(&self.front);
        self.front.advance(1);
        self.remaining -= 1;
        Some(out)
    }

    #[inline]
    fn next_back_with<R>(&mut self, f: impl FnOnce(&Cursor<'v>) -> R) -> Option<R> {
        if self.remaining == 0 {
            return None;
        }
        self.back.advance(-1);
        self.remaining -= 1;
        Some(f(&self.back))
    }

    /// Drop `n` positions from the front; false if that empties the walk.
    fn skip_front(&mut self, n: usize) -> bool {
        if n >= self.remaining {
            self.remaining = 0;
            return false;
        }
        if n > 0 {
            let target = self.front.linear() + n as isize;
            self.front.seek(target);
            self.remaining -= n;
        }
        true
    }

    fn skip_back(&mut self, n: usize) -> bool {
        if n >= self.remaining {
            self.remaining = 0;
            return false;
        }
        if n > 0 {
            let target = self.back.linear() - n as isize;
            self.back.seek(target);
            self.remaining -= n;
        }
        true
    }
}

macro_rules! walk_iterator {
    ($name:ident<$($lt:lifetime),* $(, $t:ident)?>, $item:ty) => {
        impl<$($lt,)* $($t)?> Iterator for $name<$($lt,)* $($t)?> {
            type Item = $item;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                let project = self.projector();
                self.walk.next_with(project)
            }

            #[inline]
            fn size_hint(&self) -> (usize, Option<usize>) {
                (self.walk.remaining, Some(self.walk.remaining))
            }

            fn nth(&mut self, n: usize) -> Option<Self::Item> {
                if !self.walk.skip_front(n) {
                    return None;
                }
                self.next()
            }

            fn count(self) -> usize {
                self.walk.remaining
            }
        }

        impl<$($lt,)* $($t)?> DoubleEndedIterator for $name<$($lt,)* $($t)?> {
            #[inline]
            fn next_back(&mut self) -> Option<Self::Item> {
                let project = self.projector();
                self.walk.next_back_with(project)
            }

            fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
                if !self.walk.skip_back(n) {
                    return None;
                }
                self.next_back()
            }
        }

        impl<$($lt,)* $($t)?> ExactSizeIterator for $name<$($lt,)* $($t)?> {}

        impl<$($lt,)* $($t)?> FusedIterator for $name<$($lt,)* $($t)?> {}
    };
}

// ============================================================================
// Positions
// ============================================================================

/// Storage positions of a view in a chosen order.
#[derive(Clone, Debug)]
pub struct Positions<'v> {
    walk: Walk<'v>,
}

impl<'v> Positions<'v> {
    pub(crate) fn new(view: &'v View, order: Order) -> Self {
        Self {
            walk: Walk::new(view, order),
        }
    }

    #[inline]
    fn projector(&self) -> impl Fn(&Cursor<'v>) -> isize {
        |c| c.translate()
    }
}

walk_iterator!(Positions<'v>, isize);

// ============================================================================
// Indexed
// ============================================================================

/// `(multi-index, storage position)` pairs of a view in a chosen order.
#[derive(Clone, Debug)]
pub struct Indexed<'v> {
    walk: Walk<'v>,
}

impl<'v> Indexed<'v> {
    pub(crate) fn new(view: &'v View, order: Order) -> Self {
        Self {
            walk: Walk::new(view, order),
        }
    }

    #[inline]
    fn projector(&self) -> impl Fn(&Cursor<'v>) -> (Vec<usize>, isize) {
        |c| (c.index().to_vec(), c.translate())
    }
}

walk_iterator!(Indexed<'v>, (Vec<usize>, isize));

// ============================================================================
// Elements
// ============================================================================

/// References to the elements of a view in a chosen order.
#[derive(Clone, Debug)]
pub struct Elements<'a, T> {
    walk: Walk<'a>,
    data: &'a [T],
}

impl<'a, T> Elements<'a, T> {
    /// `data` must already have been checked against the view's span.
    pub(crate) fn new(view: &'a View, data: &'a [T], order: Order) -> Self {
        Self {
            walk: Walk::new(view, order),
            data,
        }
    }

    #[inline]
    fn projector(&self) -> impl Fn(&Cursor<'a>) -> &'a T {
        let data = self.data;
        move |c| &data[c.translate() as usize]
    }
}

walk_iterator!(Elements<'a, T>, &'a T);
