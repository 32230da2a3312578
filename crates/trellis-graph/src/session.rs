//! An editing session: one diagram, its selection and the bus they talk over.
//!
//! Mutations made through the session are followed by a pump of the selection's
//! model subscription, so selected ids that stopped existing are dropped before
//! the call returns.

use crate::arrange::{Alignment, Axis};
use crate::diagram::{Diagram, MoveOptions, Removed};
use crate::hit_tester::HitTester;
use crate::routing::{BasicRouter, BendPreference, GridRouter, ObstacleRouter, Router};
use crate::selection::{Selection, SelectionPruner};
use crate::settings::EditorSettings;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use trellis_core::{
    ConnectorId, ConnectorStylePatch, DiagramSnapshot, GroupId, NewConnector, NewShape, Rect,
    ShapeId, ShapePatch, ShapeStyle, ShapeStylePatch, Vec2,
};
use trellis_events::{Event, EventBus, Subscription};

/// Manual snapshots kept per session before the oldest is dropped.
pub const SNAPSHOT_LIMIT: usize = 100;

/// A labelled copy of the diagram, separate from undo history.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub label: String,
    pub taken_at: DateTime<Utc>,
    pub snapshot: DiagramSnapshot,
}

pub struct Session {
    diagram: Diagram,
    selection: Selection,
    bus: EventBus,
    model_events: Subscription,
    settings: EditorSettings,
    hit_tester: HitTester,
    style_clipboard: Option<ShapeStyle>,
    archive: VecDeque<SnapshotEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Session {
    pub fn new(settings: EditorSettings) -> Self {
        let bus = EventBus::new();
        let model_events = bus.subscribe(Event::MODEL_CHANGED);
        Self {
            diagram: Diagram::with_settings(bus.clone(), &settings),
            selection: Selection::new(bus.clone()),
            bus,
            model_events,
            hit_tester: HitTester::from(&settings.hit_test),
            settings,
            style_clipboard: None,
            archive: VecDeque::new(),
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Run model edits, then let the selection catch up.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Diagram) -> R) -> R {
        let out = f(&mut self.diagram);
        self.pump();
        out
    }

    fn pump(&mut self) {
        let mut pruner = SelectionPruner {
            selection: &mut self.selection,
            doc: self.diagram.document(),
        };
        self.model_events.dispatch_to(&mut pruner);
    }

    // ---- common edits ----

    pub fn create_shape(&mut self, new: NewShape) -> ShapeId {
        self.edit(|d| d.create_shape(new).id)
    }

    pub fn create_connector(&mut self, new: NewConnector) -> Option<ConnectorId> {
        self.edit(|d| d.create_connector(new).map(|c| c.id))
    }

    pub fn move_selection(&mut self, dx: f64, dy: f64) -> Vec<ShapeId> {
        let ids = self.selection.shapes();
        let options = MoveOptions {
            snap: self.settings.snap_to_grid,
        };
        self.edit(|d| d.move_shapes(&ids, dx, dy, options))
    }

    /// Delete the selected shapes (with their connectors) and selected connectors.
    pub fn delete_selection(&mut self) -> Removed {
        let shapes = self.selection.shapes();
        let connectors = self.selection.connectors();
        if shapes.is_empty() && connectors.is_empty() {
            return Removed::default();
        }
        self.edit(|d| {
            let opened = d.begin_batch("Delete Selection");
            let mut removed = d.delete_shapes(&shapes);
            removed.connectors.extend(d.delete_connectors(&connectors));
            if opened {
                d.commit_batch();
            }
            removed
        })
    }

    pub fn undo(&mut self) -> bool {
        self.edit(Diagram::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.edit(Diagram::redo)
    }

    // ---- selection ----

    pub fn select_shape(&mut self, id: ShapeId, append: bool) {
        self.selection.select_shape(self.diagram.document(), id, append);
    }

    pub fn toggle_shape(&mut self, id: ShapeId) {
        self.selection.toggle_shape(self.diagram.document(), id);
    }

    pub fn set_selection(&mut self, ids: &[ShapeId]) {
        self.selection.set_selection(self.diagram.document(), ids);
    }

    pub fn select_connector(&mut self, id: ConnectorId, append: bool) {
        self.selection
            .select_connector(self.diagram.document(), id, append);
    }

    pub fn toggle_connector(&mut self, id: ConnectorId) {
        self.selection.toggle_connector(self.diagram.document(), id);
    }

    pub fn set_connector_selection(&mut self, ids: &[ConnectorId]) {
        self.selection
            .set_connector_selection(self.diagram.document(), ids);
    }

    pub fn select_marquee(&mut self, rect: Rect, append: bool) {
        self.selection
            .select_marquee(self.diagram.document(), rect, append);
    }

    /// Marquee from a pointer drag; the corners may come in any order.
    pub fn select_drag(&mut self, start: Vec2, end: Vec2, append: bool) {
        self.select_marquee(Rect::from_corners(start, end), append);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    /// Click selection: the topmost shape under `point`, else a connector near it,
    /// else nothing. Returns whether anything was hit.
    pub fn select_at(&mut self, point: Vec2, append: bool) -> bool {
        let doc = self.diagram.document();
        if let Some(id) = self.hit_tester.shape_at(doc, point) {
            self.selection.select_shape(doc, id, append);
            return true;
        }
        if let Some(id) = self.hit_tester.connector_at(doc, point) {
            self.selection.select_connector(doc, id, append);
            return true;
        }
        if !append {
            self.selection.clear_selection();
        }
        false
    }

    // ---- tools spanning model and selection ----

    /// Clone the selected shapes, and the connectors running between two of them,
    /// shifted by `offset` (the configured offset when `None`). The clones become
    /// the selection.
    pub fn duplicate_selection(&mut self, offset: Option<Vec2>) -> Vec<ShapeId> {
        let offset = offset.unwrap_or(self.settings.duplicate_offset);
        let doc = self.diagram.document();
        // Clones keep the originals' paint order.
        let originals: Vec<NewShape> = doc
            .shapes()
            .filter(|s| self.selection.is_shape_selected(s.id))
            .map(|s| NewShape {
                id: None,
                kind: Some(s.kind),
                x: Some(s.x + offset.x),
                y: Some(s.y + offset.y),
                w: Some(s.w),
                h: Some(s.h),
                text: Some(s.text.clone()),
                style: ShapeStylePatch::from(&s.style),
                data: s.data.clone(),
            })
            .collect();
        if originals.is_empty() {
            return Vec::new();
        }
        let source_ids: Vec<ShapeId> = doc
            .shapes()
            .filter(|s| self.selection.is_shape_selected(s.id))
            .map(|s| s.id)
            .collect();
        let inner: Vec<_> = doc
            .connectors()
            .filter(|c| {
                self.selection.is_shape_selected(c.from) && self.selection.is_shape_selected(c.to)
            })
            .cloned()
            .collect();

        let clones = self.edit(|d| {
            let opened = d.begin_batch("Duplicate");
            let mut id_map = HashMap::new();
            let mut clones = Vec::with_capacity(originals.len());
            for (source, new) in source_ids.into_iter().zip(originals) {
                let id = d.create_shape(new).id;
                id_map.insert(source, id);
                clones.push(id);
            }
            for c in inner {
                let (Some(&from), Some(&to)) = (id_map.get(&c.from), id_map.get(&c.to)) else {
                    continue;
                };
                d.create_connector(NewConnector {
                    from,
                    to,
                    kind: c.kind,
                    points: c.points.iter().map(|&p| p + offset).collect(),
                    style: ConnectorStylePatch::from(&c.style),
                });
            }
            if opened {
                d.commit_batch();
            }
            clones
        });
        self.selection
            .set_selection(self.diagram.document(), &clones);
        clones
    }

    /// Remember the style of the bottom-most selected shape.
    pub fn copy_style(&mut self) -> bool {
        let doc = self.diagram.document();
        match doc
            .shapes()
            .find(|s| self.selection.is_shape_selected(s.id))
        {
            Some(shape) => {
                self.style_clipboard = Some(shape.style.clone());
                true
            }
            None => false,
        }
    }

    pub fn paste_style(&mut self) -> Vec<ShapeId> {
        let Some(style) = &self.style_clipboard else {
            return Vec::new();
        };
        let patches: Vec<(ShapeId, ShapePatch)> = self
            .selection
            .shapes()
            .into_iter()
            .map(|id| {
                (
                    id,
                    ShapePatch {
                        style: Some(ShapeStylePatch::from(style)),
                        ..ShapePatch::default()
                    },
                )
            })
            .collect();
        self.edit(|d| d.apply_shape_patches("Paste Style", "stylePaste", patches))
    }

    pub fn group_selection(&mut self) -> Option<GroupId> {
        let ids = self.selection.shapes();
        self.edit(|d| d.group_shapes(&ids))
    }

    pub fn select_group(&mut self, gid: GroupId) -> bool {
        let Some(members) = self.diagram.group(gid) else {
            return false;
        };
        let ids: Vec<ShapeId> = members.iter().copied().collect();
        self.selection.set_selection(self.diagram.document(), &ids);
        true
    }

    pub fn align_selection(&mut self, alignment: Alignment) -> Vec<ShapeId> {
        let ids = self.selection.shapes();
        self.edit(|d| d.align(&ids, alignment))
    }

    pub fn distribute_selection(&mut self, axis: Axis) -> Vec<ShapeId> {
        let ids = self.selection.shapes();
        self.edit(|d| d.distribute(&ids, axis))
    }

    // ---- snapshot archive ----

    pub fn take_snapshot(&mut self, label: impl Into<String>) {
        self.archive.push_back(SnapshotEntry {
            label: label.into(),
            taken_at: Utc::now(),
            snapshot: self.diagram.serialize(),
        });
        if self.archive.len() > SNAPSHOT_LIMIT {
            self.archive.pop_front();
        }
    }

    /// Oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &SnapshotEntry> + '_ {
        self.archive.iter()
    }

    pub fn snapshot(&self, index: usize) -> Option<&SnapshotEntry> {
        self.archive.get(index)
    }

    // ---- routing ----

    fn route_with(&mut self, router: &dyn Router, ids: Vec<ConnectorId>) -> Vec<ConnectorId> {
        self.edit(|d| d.route(router, &ids))
    }

    /// Straighten every connector.
    pub fn route_basic(&mut self) -> Vec<ConnectorId> {
        let ids = self.diagram.document().connector_ids();
        self.route_with(&BasicRouter, ids)
    }

    /// Single-bend orthogonal routes for every connector.
    pub fn route_grid(&mut self, prefer: BendPreference) -> Vec<ConnectorId> {
        let ids = self.diagram.document().connector_ids();
        self.route_with(&GridRouter::new(prefer), ids)
    }

    /// Obstacle-avoiding routes for the selected connectors only.
    pub fn route_selected_obstacle(&mut self) -> Vec<ConnectorId> {
        let ids = self.selection.connectors();
        if ids.is_empty() {
            return Vec::new();
        }
        let router = ObstacleRouter::from(&self.settings.routing);
        self.route_with(&router, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ConnectorKind;

    fn three_shapes(session: &mut Session) -> Vec<ShapeId> {
        (0..3)
            .map(|i| session.create_shape(NewShape::at(i as f64 * 200.0, 0.0).size(100.0, 50.0)))
            .collect()
    }

    #[test]
    fn test_deleting_selected_shape_prunes_selection() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        session.set_selection(&ids[..2]);

        session.edit(|d| d.delete_shapes(&[ids[0]]));
        assert_eq!(session.selection().shapes(), vec![ids[1]]);
    }

    #[test]
    fn test_delete_selection_is_one_step() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        let c = session
            .create_connector(NewConnector::new(ids[1], ids[2]))
            .unwrap();
        session.set_selection(&[ids[0]]);
        session.select_connector(c, true);

        let removed = session.delete_selection();
        assert_eq!(removed.shapes, vec![ids[0]]);
        assert_eq!(removed.connectors, vec![c]);
        assert!(session.selection().is_empty());
        assert_eq!(
            session.diagram().history().undo_label(),
            Some("Delete Selection")
        );

        assert!(session.undo());
        assert!(session.diagram().shape(ids[0]).is_some());
        assert!(session.diagram().connector(c).is_some());
    }

    #[test]
    fn test_duplicate_clones_inner_connectors() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        let inner = session
            .create_connector(NewConnector {
                points: vec![Vec2::new(150.0, 100.0)],
                ..NewConnector::new(ids[0], ids[1])
            })
            .unwrap();
        session.create_connector(NewConnector::new(ids[1], ids[2]));
        session.set_selection(&ids[..2]);

        let clones = session.duplicate_selection(Some(Vec2::new(10.0, 20.0)));
        assert_eq!(clones.len(), 2);
        assert_eq!(session.selection().shapes().len(), 2);
        assert!(clones.iter().all(|id| session.selection().is_shape_selected(*id)));

        let doc = session.diagram().document();
        assert_eq!(doc.connector_count(), 3);
        let copy = doc.connectors().find(|c| c.from == clones[0]).unwrap();
        assert_eq!(copy.to, clones[1]);
        assert_eq!(copy.points, vec![Vec2::new(160.0, 120.0)]);
        assert_ne!(copy.id, inner);
        assert_eq!(doc.shape(clones[0]).map(|s| (s.x, s.y)), Some((10.0, 20.0)));

        assert_eq!(session.diagram().history().undo_label(), Some("Duplicate"));
        session.undo();
        assert_eq!(session.diagram().document().shape_count(), 3);
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_style_clipboard() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        session.edit(|d| {
            d.update_shape(
                ids[0],
                ShapePatch {
                    style: Some(ShapeStylePatch {
                        fill: Some("#f00".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            );
        });
        session.select_shape(ids[0], false);
        assert!(session.copy_style());

        session.set_selection(&ids[1..]);
        let changed = session.paste_style();
        assert_eq!(changed.len(), 2);
        for id in &ids[1..] {
            let fill = session.diagram().shape(*id).map(|s| s.style.fill.clone());
            assert_eq!(fill.as_deref(), Some("#ff0000"));
        }
        assert_eq!(session.diagram().history().undo_label(), Some("Paste Style"));
    }

    #[test]
    fn test_group_and_select_group() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        session.set_selection(&ids[..2]);
        let gid = session.group_selection().unwrap();

        session.clear_selection();
        assert!(session.select_group(gid));
        assert_eq!(session.selection().shapes().len(), 2);
        assert!(!session.select_group(GroupId::new()));
    }

    #[test]
    fn test_select_at_uses_hit_testing() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        let c = session
            .create_connector(NewConnector::new(ids[0], ids[1]))
            .unwrap();

        assert!(session.select_at(Vec2::new(10.0, 10.0), false));
        assert_eq!(session.selection().shapes(), vec![ids[0]]);

        // Midway between the first two shapes, on their center line.
        assert!(session.select_at(Vec2::new(150.0, 26.0), false));
        assert_eq!(session.selection().connectors(), vec![c]);

        assert!(!session.select_at(Vec2::new(150.0, 400.0), false));
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_route_selected_obstacle_only_touches_selection() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        let a = session
            .create_connector(NewConnector::new(ids[0], ids[2]))
            .unwrap();
        let b = session
            .create_connector(NewConnector::new(ids[0], ids[1]))
            .unwrap();
        session.select_connector(a, false);

        let routed = session.route_selected_obstacle();
        assert_eq!(routed, vec![a]);
        let doc = session.diagram().document();
        assert_eq!(doc.connector(a).map(|c| c.kind), Some(ConnectorKind::Orth));
        assert_eq!(doc.connector(b).map(|c| c.kind), Some(ConnectorKind::Straight));
    }

    #[test]
    fn test_select_drag_any_direction() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        session.select_drag(Vec2::new(320.0, 60.0), Vec2::new(-10.0, -10.0), false);
        assert_eq!(session.selection().shapes().len(), 2);
        assert!(!session.selection().is_shape_selected(ids[2]));
    }

    #[test]
    fn test_snapshot_archive_is_capped() {
        let mut session = Session::default();
        session.take_snapshot("empty");
        let id = session.create_shape(NewShape::default());
        for i in 0..SNAPSHOT_LIMIT {
            session.take_snapshot(format!("manual {i}"));
        }
        assert_eq!(session.snapshots().count(), SNAPSHOT_LIMIT);
        let oldest = session.snapshot(0).unwrap();
        assert_eq!(oldest.label, "manual 0");
        assert_eq!(oldest.snapshot.shapes[0].id, id);
        assert!(session.snapshot(SNAPSHOT_LIMIT).is_none());
        // Snapshots are not undo steps.
        assert_eq!(session.diagram().history().undo_len(), 1);
    }

    #[test]
    fn test_obstacle_route_far_shape_leaves_connector() {
        let mut session = Session::default();
        let a = session.create_shape(NewShape::at(0.0, 0.0));
        let far = session.create_shape(NewShape::at(1e30, 0.0));
        let c = session.create_connector(NewConnector::new(a, far)).unwrap();
        session.select_connector(c, false);
        assert!(session.route_selected_obstacle().is_empty());
        let connector = session.diagram().connector(c).unwrap();
        assert_eq!(connector.kind, ConnectorKind::Straight);
    }

    #[test]
    fn test_route_basic_after_grid() {
        let mut session = Session::default();
        let ids = three_shapes(&mut session);
        session.edit(|d| d.move_shapes(&[ids[1]], 0.0, 200.0, MoveOptions::default()));
        session.create_connector(NewConnector::new(ids[0], ids[1]));

        assert_eq!(session.route_grid(BendPreference::VerticalFirst).len(), 1);
        assert_eq!(session.route_basic().len(), 1);
        assert!(session.route_basic().is_empty());
    }
}
