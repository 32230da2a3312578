//! Drawable geometry of a connector: the docked polyline, trimmed ends and arrowheads.

use crate::docking::{dock_with, port_position};
use crate::document::Document;
use crate::settings::DockingSettings;
use trellis_core::{ArrowKind, Connector, ConnectorStyle, Vec2};

const ARROW_FACTOR: f64 = 0.55;

/// Start dock, interior waypoints, end dock. `None` when an endpoint shape is missing.
///
/// A port-tagged end is pinned to that port; an untagged end docks toward the
/// center of the shape at the other end.
pub fn connector_path(
    doc: &Document,
    connector: &Connector,
    docking: &DockingSettings,
) -> Option<Vec<Vec2>> {
    let from = doc.shape(connector.from)?;
    let to = doc.shape(connector.to)?;

    let start = match connector.style.from_port {
        Some(side) => port_position(from, side),
        None => dock_with(from, to.center(), docking),
    };
    let end = match connector.style.to_port {
        Some(side) => port_position(to, side),
        None => dock_with(to, from.center(), docking),
    };

    let mut points = Vec::with_capacity(connector.points.len() + 2);
    points.push(start);
    points.extend_from_slice(&connector.points);
    points.push(end);
    Some(points)
}

/// Pull each end inward by its pad plus room for its arrowhead, when the end
/// segment is long enough to give that up.
pub fn trim_endpoints(points: &[Vec2], style: &ConnectorStyle) -> Vec<Vec2> {
    let mut out = points.to_vec();
    if out.len() < 2 {
        return out;
    }
    let need = |pad: f64, arrow: ArrowKind| {
        pad + if arrow.is_visible() {
            style.arrow_size * ARROW_FACTOR
        } else {
            0.0
        }
    };
    let need_start = need(style.pad_start, style.arrow_start);
    let need_end = need(style.pad_end, style.arrow_end);

    if need_start > 0.0 {
        let (p0, p1) = (out[0], out[1]);
        let d = p0.distance(p1);
        if d > need_start + 0.1 {
            out[0] = p0.lerp(p1, need_start / d);
        }
    }
    if need_end > 0.0 {
        let last = out.len() - 1;
        let (prev, tip) = (out[last - 1], out[last]);
        let d = prev.distance(tip);
        if d > need_end + 0.1 {
            out[last] = tip.lerp(prev, need_end / d);
        }
    }
    out
}

/// Arrowhead outline in model space.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowHead {
    /// Closed and filled.
    Polygon(Vec<Vec2>),
    /// Stroked, not closed.
    Polyline(Vec<Vec2>),
    Circle { center: Vec2, radius: f64 },
    Bar(Vec2, Vec2),
}

/// Arrowhead of `kind` sitting on `tip`, pointing away from `from`.
pub fn arrow_head(kind: ArrowKind, from: Vec2, tip: Vec2, size: f64) -> Option<ArrowHead> {
    let delta = tip - from;
    let angle = delta.y.atan2(delta.x);
    let dir = Vec2::new(angle.cos(), angle.sin());
    let perp = Vec2::new(-dir.y, dir.x);
    let local = |x: f64, y: f64| tip + dir * x + perp * y;

    let s = size;
    let head = match kind {
        ArrowKind::None => return None,
        ArrowKind::Triangle => {
            ArrowHead::Polygon(vec![local(0.0, 0.0), local(-s, s * 0.5), local(-s, -s * 0.5)])
        }
        ArrowKind::Open => ArrowHead::Polyline(vec![
            local(-s, s * 0.6),
            local(0.0, 0.0),
            local(-s, -s * 0.6),
        ]),
        ArrowKind::Diamond => {
            let (w, h) = (s, s * 0.7);
            ArrowHead::Polygon(vec![
                local(0.0, 0.0),
                local(-w * 0.55, h * 0.5),
                local(-w, 0.0),
                local(-w * 0.55, -h * 0.5),
            ])
        }
        ArrowKind::Circle => ArrowHead::Circle {
            center: local(-s * 0.6, 0.0),
            radius: s * 0.4,
        },
        ArrowKind::Bar => ArrowHead::Bar(local(-s * 0.6, s * 0.6), local(-s * 0.6, -s * 0.6)),
    };
    Some(head)
}
