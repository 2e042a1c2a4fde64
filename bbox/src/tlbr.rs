use crate::{common::*, CyCxHW, Rect, HW};

/// A box given by its edges. The bottom edge is never above the top edge
/// and the right edge is never left of the left edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_new(t: T, l: T, b: T, r: T) -> Result<Self> {
        ensure!(
            b >= t && r >= l,
            "box edges are inverted, b >= t and r >= l must hold"
        );
        Ok(Self { t, l, b, r })
    }

    /// Build from corners in `[xmin, ymin, xmax, ymax]` order.
    pub fn try_from_xyxy(xyxy: [T; 4]) -> Result<Self> {
        let [xmin, ymin, xmax, ymax] = xyxy;
        Self::try_new(ymin, xmin, ymax, xmax)
    }
}

impl<T> Rect for TLBR<T>
where
    T: Num + PartialOrd + Copy,
{
    type Type = T;

    fn tlbr(&self) -> [T; 4] {
        [self.t, self.l, self.b, self.r]
    }

    fn center(&self) -> [T; 2] {
        let two = T::one() + T::one();
        [(self.t + self.b) / two, (self.l + self.r) / two]
    }

    fn size(&self) -> HW<T> {
        HW {
            h: self.b - self.t,
            w: self.r - self.l,
        }
    }
}

impl<T> From<&CyCxHW<T>> for TLBR<T>
where
    T: Num + PartialOrd + Copy,
{
    fn from(from: &CyCxHW<T>) -> Self {
        from.to_tlbr()
    }
}

impl<T> From<CyCxHW<T>> for TLBR<T>
where
    T: Num + PartialOrd + Copy,
{
    fn from(from: CyCxHW<T>) -> Self {
        from.to_tlbr()
    }
}
