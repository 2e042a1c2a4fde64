use crate::{common::*, CyCxHW, HW, TLBR};

/// Read access shared by every box representation.
///
/// Implementors provide the edges, the center and the size. The remaining
/// accessors are derived from them.
pub trait Rect {
    type Type: Num + PartialOrd + Copy;

    /// Edges in `[top, left, bottom, right]` order.
    fn tlbr(&self) -> [Self::Type; 4];

    /// Center in `[cy, cx]` order.
    fn center(&self) -> [Self::Type; 2];

    fn size(&self) -> HW<Self::Type>;

    fn t(&self) -> Self::Type {
        self.tlbr()[0]
    }

    fn l(&self) -> Self::Type {
        self.tlbr()[1]
    }

    fn b(&self) -> Self::Type {
        self.tlbr()[2]
    }

    fn r(&self) -> Self::Type {
        self.tlbr()[3]
    }

    fn cy(&self) -> Self::Type {
        self.center()[0]
    }

    fn cx(&self) -> Self::Type {
        self.center()[1]
    }

    fn h(&self) -> Self::Type {
        self.size().h()
    }

    fn w(&self) -> Self::Type {
        self.size().w()
    }

    /// Center and size in `[cy, cx, h, w]` order.
    fn cycxhw(&self) -> [Self::Type; 4] {
        let [cy, cx] = self.center();
        let size = self.size();
        [cy, cx, size.h(), size.w()]
    }

    /// Corners in `[xmin, ymin, xmax, ymax]` order.
    fn xyxy(&self) -> [Self::Type; 4] {
        let [t, l, b, r] = self.tlbr();
        [l, t, r, b]
    }

    fn area(&self) -> Self::Type {
        self.size().area()
    }

    fn to_tlbr(&self) -> TLBR<Self::Type> {
        let [t, l, b, r] = self.tlbr();
        TLBR { t, l, b, r }
    }

    fn to_cycxhw(&self) -> CyCxHW<Self::Type> {
        let [cy, cx] = self.center();
        CyCxHW::new(cy, cx, self.size())
    }

    /// Clamp every edge into `[lower, upper]`.
    ///
    /// A box lying entirely outside the range collapses onto the border.
    fn clamp(&self, lower: Self::Type, upper: Self::Type) -> TLBR<Self::Type>
    where
        Self::Type: Float,
    {
        let [t, l, b, r] = self.tlbr().map(|edge| edge.max(lower).min(upper));
        TLBR { t, l, b, r }
    }

    fn is_within(&self, lower: Self::Type, upper: Self::Type) -> bool {
        self.tlbr()
            .iter()
            .all(|&edge| edge >= lower && edge <= upper)
    }
}
