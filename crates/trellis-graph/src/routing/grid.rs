use super::{Route, Router, compress_colinear, interior};
use crate::document::Document;
use serde::{Deserialize, Serialize};
use trellis_core::{Connector, Vec2};

/// Which leg of an L-shaped route comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BendPreference {
    #[default]
    HorizontalFirst,
    VerticalFirst,
}

/// Single-bend Manhattan route between shape centers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridRouter {
    pub prefer: BendPreference,
}

impl GridRouter {
    pub fn new(prefer: BendPreference) -> Self {
        Self { prefer }
    }

    pub fn path(&self, start: Vec2, end: Vec2) -> Vec<Vec2> {
        if start.x == end.x || start.y == end.y {
            return vec![start, end];
        }
        let bend = match self.prefer {
            BendPreference::HorizontalFirst => Vec2::new(end.x, start.y),
            BendPreference::VerticalFirst => Vec2::new(start.x, end.y),
        };
        compress_colinear(&[start, bend, end])
    }
}

impl Router for GridRouter {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn label(&self) -> &'static str {
        "Route Grid"
    }

    fn route(&self, doc: &Document, connector: &Connector) -> Option<Route> {
        let from = doc.shape(connector.from)?;
        let to = doc.shape(connector.to)?;
        let path = self.path(from.center(), to.center());
        Some(Route::orth(interior(&path)))
    }
}
