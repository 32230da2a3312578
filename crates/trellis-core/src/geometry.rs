//! Pure geometry helpers in model space.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        Vec2::new(lerp(self.x, other.x, t), lerp(self.y, other.y, t))
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

/// Axis-aligned rectangle stored as origin plus extent, the way shapes store themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Build the rectangle spanned by two corners in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self {
            x: min_x,
            y: min_y,
            w: a.x.max(b.x) - min_x,
            h: a.y.max(b.y) - min_y,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.y >= self.y && p.x <= self.right() && p.y <= self.bottom()
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow the rectangle by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> Rect {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            w: self.w + amount * 2.0,
            h: self.h + amount * 2.0,
        }
    }

    /// Smallest rectangle containing all of `rects`; the zero rect when empty.
    pub fn bounding<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Rect {
        let mut iter = rects.into_iter();
        let Some(first) = iter.next() else {
            return Rect::default();
        };
        let (mut min_x, mut min_y) = (first.x, first.y);
        let (mut max_x, mut max_y) = (first.right(), first.bottom());
        for r in iter {
            min_x = min_x.min(r.x);
            min_y = min_y.min(r.y);
            max_x = max_x.max(r.right());
            max_y = max_y.max(r.bottom());
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Round `value` to the nearest multiple of `grid`.
pub fn snap(value: f64, grid: f64) -> f64 {
    (value / grid).round() * grid
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Distance from `p` to the closed segment `a..b`.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    p.distance(project_on_segment(p, a, b))
}

/// Closest point to `p` on the segment `a..b`.
pub fn project_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let d = b - a;
    let len_sq = d.dot(d);
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(d) / len_sq).clamp(0.0, 1.0);
    a + d * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_snap_rounds_to_nearest_multiple() {
        assert_eq!(snap(14.0, 10.0), 10.0);
        assert_eq!(snap(15.0, 10.0), 20.0);
        assert_eq!(snap(-4.0, 10.0), 0.0);
        assert_eq!(snap(37.0, 1.0), 37.0);
    }

    #[test]
    fn test_rect_edges_are_inclusive() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Vec2::new(10.0, 10.0)));
        assert!(r.contains(Vec2::new(0.0, 5.0)));
        assert!(!r.contains(Vec2::new(10.1, 5.0)));
    }

    #[test]
    fn test_bounding_of_nothing_is_zero() {
        assert_eq!(Rect::bounding(std::iter::empty()), Rect::default());
        let rects = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(20.0, -5.0, 5.0, 5.0)];
        assert_eq!(Rect::bounding(&rects), Rect::new(0.0, -5.0, 25.0, 15.0));
    }

    #[test]
    fn test_point_segment_distance_handles_degenerate_segment() {
        let a = Vec2::new(1.0, 1.0);
        assert_eq!(point_segment_distance(Vec2::new(4.0, 5.0), a, a), 5.0);
        let b = Vec2::new(11.0, 1.0);
        assert_eq!(point_segment_distance(Vec2::new(5.0, 4.0), a, b), 3.0);
        assert_eq!(point_segment_distance(Vec2::new(14.0, 5.0), a, b), 5.0);
    }

    proptest! {
        #[test]
        fn prop_inflated_rect_contains_original(
            x in -500.0f64..500.0,
            y in -500.0f64..500.0,
            w in 10.0f64..300.0,
            h in 10.0f64..300.0,
            pad in 0.0f64..50.0,
        ) {
            let r = Rect::new(x, y, w, h);
            prop_assert!(r.inflate(pad).contains_rect(&r));
            prop_assert!(r.inflate(pad).contains(r.center()));
        }
    }
}
