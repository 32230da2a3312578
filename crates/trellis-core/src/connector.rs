use crate::geometry::Vec2;
use crate::shape::normalize_hex;
use crate::{ConnectorId, ShapeId};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    #[default]
    Straight,
    Orth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArrowKind {
    #[default]
    None,
    Triangle,
    Open,
    Diamond,
    Circle,
    Bar,
}

impl ArrowKind {
    pub fn is_visible(self) -> bool {
        self != ArrowKind::None
    }
}

/// One of the four fixed attachment points at a shape's edge midpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortSide {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "w")]
    West,
}

impl PortSide {
    pub const ALL: [PortSide; 4] = [
        PortSide::North,
        PortSide::East,
        PortSide::South,
        PortSide::West,
    ];
}

/// Which end of a connector an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorEnd {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub arrow_start: ArrowKind,
    pub arrow_end: ArrowKind,
    pub arrow_size: f64,
    pub pad_start: f64,
    pub pad_end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_port: Option<PortSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_port: Option<PortSide>,
}

impl Default for ConnectorStyle {
    fn default() -> Self {
        Self {
            stroke: "#444444".to_string(),
            stroke_width: 2.0,
            arrow_start: ArrowKind::None,
            arrow_end: ArrowKind::Triangle,
            arrow_size: 12.0,
            pad_start: 4.0,
            pad_end: 4.0,
            from_port: None,
            to_port: None,
        }
    }
}

impl ConnectorStyle {
    pub fn merge(&mut self, patch: &ConnectorStylePatch) {
        if let Some(stroke) = &patch.stroke {
            self.stroke = normalize_hex(stroke);
        }
        if let Some(width) = patch.stroke_width {
            self.stroke_width = width;
        }
        if let Some(arrow) = patch.arrow_start {
            self.arrow_start = arrow;
        }
        if let Some(arrow) = patch.arrow_end {
            self.arrow_end = arrow;
        }
        if let Some(size) = patch.arrow_size {
            self.arrow_size = size;
        }
        if let Some(pad) = patch.pad_start {
            self.pad_start = pad;
        }
        if let Some(pad) = patch.pad_end {
            self.pad_end = pad;
        }
        if let Some(port) = patch.from_port {
            self.from_port = port;
        }
        if let Some(port) = patch.to_port {
            self.to_port = port;
        }
    }

    pub fn port(&self, end: ConnectorEnd) -> Option<PortSide> {
        match end {
            ConnectorEnd::Start => self.from_port,
            ConnectorEnd::End => self.to_port,
        }
    }
}

/// Shallow style update. The port tags are doubly optional: `Some(None)` clears one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectorStylePatch {
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub arrow_start: Option<ArrowKind>,
    pub arrow_end: Option<ArrowKind>,
    pub arrow_size: Option<f64>,
    pub pad_start: Option<f64>,
    pub pad_end: Option<f64>,
    pub from_port: Option<Option<PortSide>>,
    pub to_port: Option<Option<PortSide>>,
}

impl From<&ConnectorStyle> for ConnectorStylePatch {
    fn from(style: &ConnectorStyle) -> Self {
        Self {
            stroke: Some(style.stroke.clone()),
            stroke_width: Some(style.stroke_width),
            arrow_start: Some(style.arrow_start),
            arrow_end: Some(style.arrow_end),
            arrow_size: Some(style.arrow_size),
            pad_start: Some(style.pad_start),
            pad_end: Some(style.pad_end),
            from_port: Some(style.from_port),
            to_port: Some(style.to_port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub from: ShapeId,
    pub to: ShapeId,
    #[serde(rename = "type", default)]
    pub kind: ConnectorKind,
    /// Interior waypoints only; the docked endpoints are derived at draw time.
    #[serde(default, deserialize_with = "nullable_points")]
    pub points: Vec<Vec2>,
    #[serde(default)]
    pub style: ConnectorStyle,
}

fn nullable_points<'de, D>(deserializer: D) -> Result<Vec<Vec2>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Vec2>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Connector {
    pub fn endpoint(&self, end: ConnectorEnd) -> ShapeId {
        match end {
            ConnectorEnd::Start => self.from,
            ConnectorEnd::End => self.to,
        }
    }

    pub fn touches(&self, shape: ShapeId) -> bool {
        self.from == shape || self.to == shape
    }

    pub fn apply(&mut self, patch: &ConnectorPatch) {
        if let Some(from) = patch.from {
            self.from = from;
        }
        if let Some(to) = patch.to {
            self.to = to;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(points) = &patch.points {
            self.points = points.clone();
        }
        if let Some(style) = &patch.style {
            self.style.merge(style);
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewConnector {
    pub from: ShapeId,
    pub to: ShapeId,
    pub kind: ConnectorKind,
    pub points: Vec<Vec2>,
    pub style: ConnectorStylePatch,
}

impl NewConnector {
    pub fn new(from: ShapeId, to: ShapeId) -> Self {
        Self {
            from,
            to,
            kind: ConnectorKind::Straight,
            points: Vec::new(),
            style: ConnectorStylePatch::default(),
        }
    }

    pub fn build(self) -> Connector {
        let mut style = ConnectorStyle::default();
        style.merge(&self.style);
        Connector {
            id: ConnectorId::new(),
            from: self.from,
            to: self.to,
            kind: self.kind,
            points: self.points,
            style,
        }
    }
}

/// Partial connector update. `points` and `kind` replace wholesale; `style` merges.
/// `from`/`to` are only written by endpoint reattachment, which checks the target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectorPatch {
    pub from: Option<ShapeId>,
    pub to: Option<ShapeId>,
    pub kind: Option<ConnectorKind>,
    pub points: Option<Vec<Vec2>>,
    pub style: Option<ConnectorStylePatch>,
}

impl From<&Connector> for ConnectorPatch {
    fn from(connector: &Connector) -> Self {
        Self {
            from: Some(connector.from),
            to: Some(connector.to),
            kind: Some(connector.kind),
            points: Some(connector.points.clone()),
            style: Some(ConnectorStylePatch::from(&connector.style)),
        }
    }
}

impl ConnectorPatch {
    pub fn route(kind: ConnectorKind, points: Vec<Vec2>) -> Self {
        Self {
            kind: Some(kind),
            points: Some(points),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn capture(&self, connector: &Connector) -> ConnectorPatch {
        ConnectorPatch {
            from: self.from.map(|_| connector.from),
            to: self.to.map(|_| connector.to),
            kind: self.kind.map(|_| connector.kind),
            points: self.points.as_ref().map(|_| connector.points.clone()),
            style: self
                .style
                .as_ref()
                .map(|_| ConnectorStylePatch::from(&connector.style)),
        }
    }

    pub fn retain_changed(&mut self, other: &mut ConnectorPatch) {
        fn keep<T: PartialEq>(a: &mut Option<T>, b: &mut Option<T>) {
            if a == b {
                *a = None;
                *b = None;
            }
        }
        keep(&mut self.from, &mut other.from);
        keep(&mut self.to, &mut other.to);
        keep(&mut self.kind, &mut other.kind);
        keep(&mut self.points, &mut other.points);
        keep(&mut self.style, &mut other.style);
    }
}
