use crate::geometry::{Size, Vec2};
use crate::{Connector, GroupId, Shape, ShapeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 6.0;

/// Document-wide settings and the mutation counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    pub grid_size: f64,
    pub zoom: f64,
    pub pan: Vec2,
    /// Bumped on every mutation. Cheap "did anything change" check for consumers.
    pub version: u64,

    // Presentation only; the core never reads these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            grid_size: 10.0,
            zoom: 1.0,
            pan: Vec2::ZERO,
            version: 0,
            background: None,
            workspace: None,
            legend: None,
            notes: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Meta {
    pub fn clamp_zoom(zoom: f64) -> f64 {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

/// Full-state snapshot; the persisted document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub connectors: Vec<Connector>,
    #[serde(default)]
    pub groups: Vec<(GroupId, Vec<ShapeId>)>,
    #[serde(default)]
    pub meta: Meta,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewShape;

    #[test]
    fn test_unknown_meta_keys_survive_round_trip() {
        let json = r##"{"gridSize":20,"zoom":2,"pan":{"x":1,"y":2},"version":7,
            "background":"#fff","legend":{"items":[]},"theme":"dark"}"##;
        let meta: Meta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.grid_size, 20.0);
        assert_eq!(meta.background.as_deref(), Some("#fff"));
        assert_eq!(meta.extra["theme"], "dark");

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["theme"], "dark");
        assert_eq!(back["gridSize"], 20.0);
    }

    #[test]
    fn test_snapshot_groups_serialize_as_pairs() {
        let shape = NewShape::default().build();
        let gid = GroupId::new();
        let snapshot = DiagramSnapshot {
            schema_version: SCHEMA_VERSION,
            shapes: vec![shape.clone()],
            connectors: vec![],
            groups: vec![(gid, vec![shape.id])],
            meta: Meta::default(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["groups"][0][0], gid.to_string());
        assert_eq!(value["groups"][0][1][0], shape.id.to_string());
    }

    #[test]
    fn test_zoom_clamp() {
        assert_eq!(Meta::clamp_zoom(0.01), MIN_ZOOM);
        assert_eq!(Meta::clamp_zoom(9.0), MAX_ZOOM);
        assert_eq!(Meta::clamp_zoom(1.5), 1.5);
    }
}
