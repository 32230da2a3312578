use crate::ShapeId;
use crate::geometry::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Width and height never drop below this.
pub const MIN_SHAPE_SIZE: f64 = 10.0;

/// Opaque caller-owned payload attached to a shape.
pub type ShapeData = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rect,
    Ellipse,
    Diamond,
    Pill,
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeStyle {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub text_color: String,
    pub radius: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: "#ffffff".to_string(),
            stroke: "#333333".to_string(),
            stroke_width: 1.5,
            text_color: "#222222".to_string(),
            radius: 8.0,
        }
    }
}

impl ShapeStyle {
    /// Expand shorthand colors in place.
    pub fn normalize(&mut self) {
        self.fill = normalize_hex(&self.fill);
        self.stroke = normalize_hex(&self.stroke);
        self.text_color = normalize_hex(&self.text_color);
    }

    /// Shallow-merge: every field present in `patch` replaces ours.
    pub fn merge(&mut self, patch: &ShapeStylePatch) {
        if let Some(fill) = &patch.fill {
            self.fill = fill.clone();
        }
        if let Some(stroke) = &patch.stroke {
            self.stroke = stroke.clone();
        }
        if let Some(width) = patch.stroke_width {
            self.stroke_width = width;
        }
        if let Some(color) = &patch.text_color {
            self.text_color = color.clone();
        }
        if let Some(radius) = patch.radius {
            self.radius = radius;
        }
        self.normalize();
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeStylePatch {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub text_color: Option<String>,
    pub radius: Option<f64>,
}

impl From<&ShapeStyle> for ShapeStylePatch {
    /// A patch carrying every field, so applying it replaces the whole style.
    fn from(style: &ShapeStyle) -> Self {
        Self {
            fill: Some(style.fill.clone()),
            stroke: Some(style.stroke.clone()),
            stroke_width: Some(style.stroke_width),
            text_color: Some(style.text_color.clone()),
            radius: Some(style.radius),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(rename = "type", default)]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: ShapeStyle,
    #[serde(default)]
    pub data: ShapeData,
}

impl Shape {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn center(&self) -> Vec2 {
        self.bounds().center()
    }

    /// Write every field present in `patch`. Style merges, sizes clamp.
    pub fn apply(&mut self, patch: &ShapePatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.w {
            self.w = w.max(MIN_SHAPE_SIZE);
        }
        if let Some(h) = patch.h {
            self.h = h.max(MIN_SHAPE_SIZE);
        }
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(style) = &patch.style {
            self.style.merge(style);
        }
        if let Some(data) = &patch.data {
            self.data = data.clone();
        }
    }
}

/// Construction parameters; anything left `None` takes the editor default.
#[derive(Debug, Clone, Default)]
pub struct NewShape {
    pub id: Option<ShapeId>,
    pub kind: Option<ShapeKind>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub text: Option<String>,
    pub style: ShapeStylePatch,
    pub data: ShapeData,
}

impl NewShape {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: ShapeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn size(mut self, w: f64, h: f64) -> Self {
        self.w = Some(w);
        self.h = Some(h);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn build(self) -> Shape {
        let mut style = ShapeStyle::default();
        style.merge(&self.style);
        Shape {
            id: self.id.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            x: self.x.unwrap_or(100.0),
            y: self.y.unwrap_or(100.0),
            w: self.w.unwrap_or(140.0).max(MIN_SHAPE_SIZE),
            h: self.h.unwrap_or(70.0).max(MIN_SHAPE_SIZE),
            text: self.text.unwrap_or_else(|| "Shape".to_string()),
            style,
            data: self.data,
        }
    }
}

/// Partial update of a shape. Also the payload of recorded history ops, where it
/// holds only the fields that changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapePatch {
    pub kind: Option<ShapeKind>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub text: Option<String>,
    pub style: Option<ShapeStylePatch>,
    pub data: Option<ShapeData>,
}

impl ShapePatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(w: f64, h: f64) -> Self {
        Self {
            w: Some(w),
            h: Some(h),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Read the current values of `shape` for every key set in `self`.
    /// Style is captured whole, so replaying it restores the style exactly.
    pub fn capture(&self, shape: &Shape) -> ShapePatch {
        ShapePatch {
            kind: self.kind.map(|_| shape.kind),
            x: self.x.map(|_| shape.x),
            y: self.y.map(|_| shape.y),
            w: self.w.map(|_| shape.w),
            h: self.h.map(|_| shape.h),
            text: self.text.as_ref().map(|_| shape.text.clone()),
            style: self.style.as_ref().map(|_| ShapeStylePatch::from(&shape.style)),
            data: self.data.as_ref().map(|_| shape.data.clone()),
        }
    }

    /// Drop keys whose value is the same in `self` and `other`, from both.
    pub fn retain_changed(&mut self, other: &mut ShapePatch) {
        fn keep<T: PartialEq>(a: &mut Option<T>, b: &mut Option<T>) {
            if a == b {
                *a = None;
                *b = None;
            }
        }
        keep(&mut self.kind, &mut other.kind);
        keep(&mut self.x, &mut other.x);
        keep(&mut self.y, &mut other.y);
        keep(&mut self.w, &mut other.w);
        keep(&mut self.h, &mut other.h);
        keep(&mut self.text, &mut other.text);
        keep(&mut self.style, &mut other.style);
        keep(&mut self.data, &mut other.data);
    }
}

impl From<&Shape> for ShapePatch {
    /// Every field of `shape`, so applying the patch makes a shape identical to it.
    fn from(shape: &Shape) -> Self {
        Self {
            kind: Some(shape.kind),
            x: Some(shape.x),
            y: Some(shape.y),
            w: Some(shape.w),
            h: Some(shape.h),
            text: Some(shape.text.clone()),
            style: Some(ShapeStylePatch::from(&shape.style)),
            data: Some(shape.data.clone()),
        }
    }
}

/// Expand `#abc` to `#aabbcc`; any other string comes back unchanged.
pub fn normalize_hex(color: &str) -> String {
    let Some(digits) = color.strip_prefix('#') else {
        return color.to_string();
    };
    if digits.len() == 3 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut out = String::with_capacity(7);
        out.push('#');
        for c in digits.chars() {
            out.push(c);
            out.push(c);
        }
        out
    } else {
        color.to_string()
    }
}
