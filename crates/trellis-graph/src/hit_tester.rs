use crate::document::Document;
use crate::settings::HitTestSettings;
use trellis_core::geometry::point_segment_distance;
use trellis_core::{Connector, ConnectorId, ShapeId, Vec2};

/// Picks the shape or connector under a model-space point.
#[derive(Debug, Clone, Copy)]
pub struct HitTester {
    /// Max distance from a connector's center line that still counts as a hit.
    pub tolerance: f64,
}

impl Default for HitTester {
    fn default() -> Self {
        Self { tolerance: 6.0 }
    }
}

impl From<&HitTestSettings> for HitTester {
    fn from(settings: &HitTestSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
        }
    }
}

impl HitTester {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Topmost shape containing `point`.
    pub fn shape_at(&self, doc: &Document, point: Vec2) -> Option<ShapeId> {
        doc.shapes()
            .rev()
            .find(|s| s.bounds().contains(point))
            .map(|s| s.id)
    }

    /// First connector, in document order, passing within tolerance of `point`.
    pub fn connector_at(&self, doc: &Document, point: Vec2) -> Option<ConnectorId> {
        doc.connectors()
            .find(|c| {
                center_line(doc, c).is_some_and(|line| {
                    line.windows(2)
                        .any(|seg| point_segment_distance(point, seg[0], seg[1]) <= self.tolerance)
                })
            })
            .map(|c| c.id)
    }
}

/// Center-to-center polyline through the waypoints.
pub(crate) fn center_line(doc: &Document, connector: &Connector) -> Option<Vec<Vec2>> {
    let from = doc.shape(connector.from)?;
    let to = doc.shape(connector.to)?;
    let mut line = Vec::with_capacity(connector.points.len() + 2);
    line.push(from.center());
    line.extend_from_slice(&connector.points);
    line.push(to.center());
    Some(line)
}
