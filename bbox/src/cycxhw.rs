use crate::{common::*, Rect, HW, TLBR};

/// A box given by its center and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CyCxHW<T> {
    pub(crate) cy: T,
    pub(crate) cx: T,
    pub(crate) size: HW<T>,
}

impl<T> CyCxHW<T>
where
    T: Num + PartialOrd + Copy,
{
    /// Place a box of `size` centered at `(cy, cx)`.
    pub fn new(cy: T, cx: T, size: HW<T>) -> Self {
        Self { cy, cx, size }
    }

    /// Move the center, keeping the size.
    pub fn with_center(&self, cy: T, cx: T) -> Self {
        Self { cy, cx, ..*self }
    }
}

impl<T> Rect for CyCxHW<T>
where
    T: Num + PartialOrd + Copy,
{
    type Type = T;

    fn tlbr(&self) -> [T; 4] {
        let two = T::one() + T::one();
        let half_h = self.size.h / two;
        let half_w = self.size.w / two;
        [
            self.cy - half_h,
            self.cx - half_w,
            self.cy + half_h,
            self.cx + half_w,
        ]
    }

    fn center(&self) -> [T; 2] {
        [self.cy, self.cx]
    }

    fn size(&self) -> HW<T> {
        self.size
    }
}

impl<T> From<&TLBR<T>> for CyCxHW<T>
where
    T: Num + PartialOrd + Copy,
{
    fn from(from: &TLBR<T>) -> Self {
        from.to_cycxhw()
    }
}

impl<T> From<TLBR<T>> for CyCxHW<T>
where
    T: Num + PartialOrd + Copy,
{
    fn from(from: TLBR<T>) -> Self {
        from.to_cycxhw()
    }
}
