//! Where a connector meets a shape.
//!
//! Docking prefers one of the four edge-midpoint ports when it points roughly the
//! right way, and otherwise falls back to the analytic perimeter of the shape kind.

use crate::settings::DockingSettings;
use trellis_core::{PortSide, Shape, ShapeKind, Vec2};

/// Ports are tried in this order; the first of two equally aligned ports wins.
const PORT_ORDER: [PortSide; 4] = [
    PortSide::North,
    PortSide::South,
    PortSide::West,
    PortSide::East,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    pub side: PortSide,
    pub position: Vec2,
}

pub fn port_position(shape: &Shape, side: PortSide) -> Vec2 {
    let c = shape.center();
    match side {
        PortSide::North => Vec2::new(c.x, shape.y),
        PortSide::East => Vec2::new(shape.x + shape.w, c.y),
        PortSide::South => Vec2::new(c.x, shape.y + shape.h),
        PortSide::West => Vec2::new(shape.x, c.y),
    }
}

pub fn ports(shape: &Shape) -> [Port; 4] {
    PortSide::ALL.map(|side| Port {
        side,
        position: port_position(shape, side),
    })
}

/// Dock with the default threshold and epsilon.
pub fn dock(shape: &Shape, toward: Vec2) -> Vec2 {
    dock_with(shape, toward, &DockingSettings::default())
}

pub fn dock_with(shape: &Shape, toward: Vec2, settings: &DockingSettings) -> Vec2 {
    let center = shape.center();
    let mut d = toward - center;
    if d.x == 0.0 && d.y == 0.0 {
        d.y = 1e-6;
    }

    if let Some(port) = best_port(shape, d, center, settings.port_threshold) {
        return port;
    }

    let shrink = 1.0 - settings.perimeter_epsilon;
    match shape.kind {
        ShapeKind::Ellipse => {
            let rx = shape.w / 2.0;
            let ry = shape.h / 2.0;
            let k = 1.0 / ((d.x * d.x) / (rx * rx) + (d.y * d.y) / (ry * ry)).sqrt();
            center + d * (k * shrink)
        }
        ShapeKind::Diamond => {
            let denom = d.x.abs() / (shape.w / 2.0) + d.y.abs() / (shape.h / 2.0);
            let k = if denom == 0.0 { 0.0 } else { (1.0 / denom).min(1.0) };
            center + d * (k * shrink)
        }
        ShapeKind::Rect | ShapeKind::Pill | ShapeKind::Note => rect_perimeter(shape, d, center, shrink),
    }
}

fn best_port(shape: &Shape, d: Vec2, center: Vec2, threshold: f64) -> Option<Vec2> {
    let mag_d = d.length();
    let mut best: Option<(Vec2, f64)> = None;
    for side in PORT_ORDER {
        let p = port_position(shape, side);
        let v = p - center;
        let len = v.length();
        let mag_v = if len > 0.0 { len } else { 1.0 };
        let cos = v.dot(d) / (mag_v * mag_d);
        if cos <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, best_cos)| cos > best_cos) {
            best = Some((p, cos));
        }
    }
    best.filter(|(_, cos)| *cos >= threshold).map(|(p, _)| p)
}

/// Exit through whichever pair of edges the direction reaches first.
fn rect_perimeter(shape: &Shape, d: Vec2, center: Vec2, shrink: f64) -> Vec2 {
    let w2 = shape.w / 2.0;
    let h2 = shape.h / 2.0;
    if d.x.abs() * h2 > d.y.abs() * w2 {
        let sign = if d.x > 0.0 { 1.0 } else { -1.0 };
        let scale = w2 / d.x.abs();
        Vec2::new(
            center.x + sign * w2 * shrink,
            center.y + d.y * scale * shrink,
        )
    } else {
        let sign = if d.y > 0.0 { 1.0 } else { -1.0 };
        let scale = h2 / d.y.abs();
        Vec2::new(
            center.x + d.x * scale * shrink,
            center.y + sign * h2 * shrink,
        )
    }
}
