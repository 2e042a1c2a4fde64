use crate::common::*;

/// A non-negative box size in height/width form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HW<T> {
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_new(h: T, w: T) -> Result<Self> {
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );
        Ok(Self { h, w })
    }

    /// A square with edge length `edge`.
    pub fn square(edge: T) -> Result<Self> {
        Self::try_new(edge, edge)
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn area(&self) -> T {
        self.h * self.w
    }

    /// Swap height and width.
    pub fn transpose(&self) -> Self {
        Self {
            h: self.w,
            w: self.h,
        }
    }

    /// Scale each side by its own factor.
    pub fn scale(&self, scale_h: T, scale_w: T) -> Result<Self> {
        Self::try_new(self.h * scale_h, self.w * scale_w)
    }
}

impl<T> HW<T>
where
    T: Float,
{
    /// A box of area `base * base` whose width to height ratio is `ratio`.
    pub fn from_aspect_ratio(base: T, ratio: T) -> Result<Self> {
        ensure!(
            ratio > T::zero() && ratio.is_finite(),
            "aspect ratio must be positive and finite"
        );
        let sqrt_ratio = ratio.sqrt();
        Self::try_new(base / sqrt_ratio, base * sqrt_ratio)
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> T {
        self.w / self.h
    }
}
