use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

/// Four coordinates tagged with their layout. Serializes as a plain `[f32; 4]`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline]
    pub fn as_vector(&self) -> na::Vector4<f32> {
        na::Vector4::new(self.0[0], self.0[1], self.0[2], self.0[3])
    }

    #[inline]
    pub fn from_vector(v: &na::Vector4<f32>) -> Self {
        BBox([v[0], v[1], v[2], v[3]], PhantomData)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox([x1, y1, x2, y2], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        (self.0[2] - self.0[0]).max(0.0)
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        (self.0[3] - self.0[1]).max(0.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.0[0] + self.0[2]) * 0.5,
            (self.0[1] + self.0[3]) * 0.5,
        )
    }

    pub fn intersection(&self, other: &Self) -> f32 {
        let w = self.right().min(other.right()) - self.left().max(other.left());
        let h = self.bottom().min(other.bottom()) - self.top().max(other.top());

        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    pub fn iou(&self, other: &Self) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;

        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    #[inline]
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::ltrb(self.0[0] + dx, self.0[1] + dy, self.0[2] + dx, self.0[3] + dy)
    }

    #[inline]
    pub fn scale(&self, factor: f32) -> Self {
        Self::ltrb(
            self.0[0] * factor,
            self.0[1] * factor,
            self.0[2] * factor,
            self.0[3] * factor,
        )
    }

    /// Clamps the box into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> Self {
        Self::ltrb(
            self.0[0].clamp(0.0, width),
            self.0[1].clamp(0.0, height),
            self.0[2].clamp(0.0, width),
            self.0[3].clamp(0.0, height),
        )
    }

    /// Sub-box expressed as fractions of this box's width and height.
    pub fn fraction(&self, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        let (w, h) = (self.width(), self.height());

        Self::ltrb(
            self.0[0] + left * w,
            self.0[1] + top * h,
            self.0[0] + right * w,
            self.0[1] + bottom * h,
        )
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline]
    pub fn as_xywh(&self) -> BBox<Xywh> {
        self.into()
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x: f32, y: f32, w: f32, h: f32) -> Self {
        BBox([x, y, w, h], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        BBox([cx, cy, w, h], PhantomData)
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Xywh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [
                (v.0[0] + v.0[2]) / 2.0,
                (v.0[1] + v.0[3]) / 2.0,
                v.0[2] - v.0[0],
                v.0[3] - v.0[1],
            ],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        let (w2, h2) = (v.0[2] / 2.0, v.0[3] / 2.0);

        Self(
            [v.0[0] - w2, v.0[1] - h2, v.0[0] + w2, v.0[1] + h2],
            PhantomData,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BBox::ltrb(10.0, 10.0, 110.0, 210.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(5.0, 0.0, 15.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn format_conversions_agree() {
        let b = BBox::ltrb(10.0, 20.0, 50.0, 100.0);
        assert_eq!(b.as_ltwh().as_slice(), &[10.0, 20.0, 40.0, 80.0]);
        assert_eq!(b.as_xywh().as_slice(), &[30.0, 60.0, 40.0, 80.0]);
        assert_eq!(b.as_xywh().as_ltrb(), b);
        assert_eq!(b.as_ltwh().as_ltrb(), b);
    }

    #[test]
    fn fraction_and_clip() {
        let b = BBox::ltrb(0.0, 0.0, 100.0, 200.0);
        let torso = b.fraction(0.15, 0.30, 0.85, 0.88);
        for (got, want) in torso.as_slice().iter().zip([15.0, 60.0, 85.0, 176.0]) {
            assert!((got - want).abs() < 1e-3);
        }

        let clipped = BBox::ltrb(-5.0, -5.0, 700.0, 50.0).clip(640.0, 480.0);
        assert_eq!(clipped.as_slice(), &[0.0, 0.0, 640.0, 50.0]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let b = BBox::ltwh(1.0, 2.0, 3.0, 4.0);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.0,4.0]");

        let back: BBox<Ltwh> = serde_json::from_str("[1.0,2.0,3.0,4.0]").unwrap();
        assert_eq!(back, b);
    }
}
