//! Connector routing strategies.
//!
//! A [`Router`] only computes geometry. Writing routes back is the diagram's job
//! (see [`crate::Diagram::route`]), so every strategy is undoable the same way.

mod basic;
mod grid;
mod obstacle;

pub use basic::BasicRouter;
pub use grid::{BendPreference, GridRouter};
pub use obstacle::{ObstacleRouter, find_path};

use crate::document::Document;
use trellis_core::{Connector, ConnectorKind, Vec2};

/// Computed geometry for one connector: its kind plus interior waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub kind: ConnectorKind,
    pub points: Vec<Vec2>,
}

impl Route {
    pub fn straight() -> Self {
        Self {
            kind: ConnectorKind::Straight,
            points: Vec::new(),
        }
    }

    pub fn orth(points: Vec<Vec2>) -> Self {
        Self {
            kind: ConnectorKind::Orth,
            points,
        }
    }

    /// True when `connector` already has this geometry.
    pub fn matches(&self, connector: &Connector) -> bool {
        connector.kind == self.kind && connector.points == self.points
    }
}

pub trait Router {
    /// Short strategy name, used in change reasons as `route:<name>`.
    fn name(&self) -> &'static str;

    /// History label for a routing pass, e.g. "Route Grid".
    fn label(&self) -> &'static str;

    /// `None` leaves the connector untouched.
    fn route(&self, doc: &Document, connector: &Connector) -> Option<Route>;
}

/// Drop every point that sits on a horizontal or vertical line through both
/// neighbours. The first and last points always survive.
pub fn compress_colinear(points: &[Vec2]) -> Vec<Vec2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in points {
        while out.len() >= 2 && axis_colinear(out[out.len() - 2], out[out.len() - 1], p) {
            out.pop();
        }
        out.push(p);
    }
    out
}

fn axis_colinear(a: Vec2, b: Vec2, c: Vec2) -> bool {
    (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y)
}

/// Center-to-center interior of a path, what gets stored on the connector.
pub(crate) fn interior(path: &[Vec2]) -> Vec<Vec2> {
    if path.len() <= 2 {
        return Vec::new();
    }
    path[1..path.len() - 1].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compress_removes_straight_runs() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(20.0, 10.0),
            Vec2::new(20.0, 30.0),
        ];
        assert_eq!(
            compress_colinear(&pts),
            vec![Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0), Vec2::new(20.0, 30.0)]
        );
    }

    #[test]
    fn test_compress_keeps_diagonal_points() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0), Vec2::new(10.0, 10.0)];
        assert_eq!(compress_colinear(&pts), pts.to_vec());
    }

    #[test]
    fn test_interior() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        assert_eq!(interior(&pts), vec![Vec2::new(1.0, 0.0)]);
        assert!(interior(&pts[..2]).is_empty());
    }

    fn lattice_path() -> impl Strategy<Value = Vec<Vec2>> {
        prop::collection::vec((0..4u8, 1..5i32), 1..20).prop_map(|steps| {
            let mut p = Vec2::ZERO;
            let mut out = vec![p];
            for (dir, len) in steps {
                for _ in 0..len {
                    p = match dir {
                        0 => Vec2::new(p.x + 1.0, p.y),
                        1 => Vec2::new(p.x - 1.0, p.y),
                        2 => Vec2::new(p.x, p.y + 1.0),
                        _ => Vec2::new(p.x, p.y - 1.0),
                    };
                    out.push(p);
                }
            }
            out
        })
    }

    proptest! {
        #[test]
        fn prop_compress_is_idempotent_and_keeps_ends(path in lattice_path()) {
            let once = compress_colinear(&path);
            prop_assert_eq!(once.first(), path.first());
            prop_assert_eq!(once.last(), path.last());
            prop_assert_eq!(compress_colinear(&once), once.clone());
            for window in once.windows(3) {
                prop_assert!(!axis_colinear(window[0], window[1], window[2]));
            }
        }
    }
}
