//! Alignment and even spacing of shape sets. Pure position math; the diagram
//! applies the resulting patches as one undoable batch.

use serde::{Deserialize, Serialize};
use trellis_core::{Shape, ShapeId, ShapePatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
    HCenter,
    Top,
    Bottom,
    VCenter,
}

impl Alignment {
    pub fn label(self) -> &'static str {
        match self {
            Alignment::Left => "Align Left",
            Alignment::Right => "Align Right",
            Alignment::HCenter => "Align Center",
            Alignment::Top => "Align Top",
            Alignment::Bottom => "Align Bottom",
            Alignment::VCenter => "Align Middle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn label(self) -> &'static str {
        match self {
            Axis::Horizontal => "Distribute Horizontally",
            Axis::Vertical => "Distribute Vertically",
        }
    }
}

fn min_by(shapes: &[&Shape], f: impl Fn(&Shape) -> f64) -> f64 {
    shapes.iter().map(|&s| f(s)).fold(f64::INFINITY, f64::min)
}

fn max_by(shapes: &[&Shape], f: impl Fn(&Shape) -> f64) -> f64 {
    shapes.iter().map(|&s| f(s)).fold(f64::NEG_INFINITY, f64::max)
}

/// Position patches lining every shape up with the set's extreme or middle edge.
/// Empty for fewer than two shapes.
pub fn align(shapes: &[&Shape], alignment: Alignment) -> Vec<(ShapeId, ShapePatch)> {
    if shapes.len() < 2 {
        return Vec::new();
    }
    let x_patch = |s: &Shape, x: f64| {
        (
            s.id,
            ShapePatch {
                x: Some(x),
                ..ShapePatch::default()
            },
        )
    };
    let y_patch = |s: &Shape, y: f64| {
        (
            s.id,
            ShapePatch {
                y: Some(y),
                ..ShapePatch::default()
            },
        )
    };

    match alignment {
        Alignment::Left => {
            let left = min_by(shapes, |s| s.x);
            shapes.iter().map(|&s| x_patch(s, left)).collect()
        }
        Alignment::Right => {
            let right = max_by(shapes, |s| s.x + s.w);
            shapes.iter().map(|&s| x_patch(s, right - s.w)).collect()
        }
        Alignment::HCenter => {
            let mid = (min_by(shapes, |s| s.x) + max_by(shapes, |s| s.x + s.w)) / 2.0;
            shapes.iter().map(|&s| x_patch(s, mid - s.w / 2.0)).collect()
        }
        Alignment::Top => {
            let top = min_by(shapes, |s| s.y);
            shapes.iter().map(|&s| y_patch(s, top)).collect()
        }
        Alignment::Bottom => {
            let bottom = max_by(shapes, |s| s.y + s.h);
            shapes.iter().map(|&s| y_patch(s, bottom - s.h)).collect()
        }
        Alignment::VCenter => {
            let mid = (min_by(shapes, |s| s.y) + max_by(shapes, |s| s.y + s.h)) / 2.0;
            shapes.iter().map(|&s| y_patch(s, mid - s.h / 2.0)).collect()
        }
    }
}

/// Equal gaps between consecutive shapes along `axis`, keeping the outermost two
/// in place. Only the interior shapes get patches, so fewer than three yields none.
pub fn distribute(shapes: &[&Shape], axis: Axis) -> Vec<(ShapeId, ShapePatch)> {
    if shapes.len() < 3 {
        return Vec::new();
    }
    let span_of = |s: &Shape| match axis {
        Axis::Horizontal => (s.x, s.w),
        Axis::Vertical => (s.y, s.h),
    };

    let mut sorted = shapes.to_vec();
    sorted.sort_by(|a, b| span_of(*a).0.total_cmp(&span_of(*b).0));
    let (first_pos, first_extent) = span_of(sorted[0]);
    let (last_pos, last_extent) = span_of(sorted[sorted.len() - 1]);
    let total: f64 = sorted.iter().map(|&s| span_of(s).1).sum();
    let span = last_pos + last_extent - first_pos;
    let gap = (span - total) / (sorted.len() - 1) as f64;

    let mut cursor = first_pos + first_extent;
    let mut patches = Vec::with_capacity(sorted.len() - 2);
    for &s in &sorted[1..sorted.len() - 1] {
        let at = cursor + gap;
        let patch = match axis {
            Axis::Horizontal => ShapePatch {
                x: Some(at),
                ..ShapePatch::default()
            },
            Axis::Vertical => ShapePatch {
                y: Some(at),
                ..ShapePatch::default()
            },
        };
        patches.push((s.id, patch));
        cursor = at + span_of(s).1;
    }
    patches
}
