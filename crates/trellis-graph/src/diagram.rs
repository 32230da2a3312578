//! The editable diagram: a [`Document`] plus its undo [`History`].
//!
//! Every mutating call records what it changed, bumps `meta.version` and publishes
//! `Event::ModelChanged` on the bus. Unknown ids are ignored and logged at debug.

use crate::arrange::{self, Alignment, Axis};
use crate::docking::{dock_with, port_position};
use crate::document::Document;
use crate::history::{History, Op};
use crate::hit_tester::center_line;
use crate::routing::{Route, Router, compress_colinear};
use crate::settings::{DockingSettings, EditorSettings};
use indexmap::IndexSet;
use trellis_core::geometry::{project_on_segment, snap};
use trellis_core::{
    Connector, ConnectorEnd, ConnectorId, ConnectorPatch, ConnectorStylePatch, DiagramSnapshot,
    GroupId, MIN_SHAPE_SIZE, Meta, NewConnector, NewShape, PortSide, Result, Shape, ShapeId,
    ShapePatch, Vec2, normalize_hex,
};
use trellis_events::{ChangedIds, Event, EventBus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOptions {
    /// Round the final position to the document grid.
    pub snap: bool,
}

/// Everything a delete took out, cascaded connectors included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    pub shapes: Vec<ShapeId>,
    pub connectors: Vec<ConnectorId>,
}

impl Removed {
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.connectors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct HistoryStatus {
    can_undo: bool,
    can_redo: bool,
    undo_label: Option<String>,
    redo_label: Option<String>,
}

impl HistoryStatus {
    fn of(history: &History) -> Self {
        Self {
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
            undo_label: history.undo_label().map(str::to_string),
            redo_label: history.redo_label().map(str::to_string),
        }
    }
}

fn unique<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> IndexSet<T> {
    ids.iter().copied().collect()
}

fn opposite(end: ConnectorEnd) -> ConnectorEnd {
    match end {
        ConnectorEnd::Start => ConnectorEnd::End,
        ConnectorEnd::End => ConnectorEnd::Start,
    }
}

#[derive(Debug)]
pub struct Diagram {
    doc: Document,
    history: History,
    bus: EventBus,
    docking: DockingSettings,
    published: HistoryStatus,
}

impl Diagram {
    pub fn new(bus: EventBus) -> Self {
        Self::with_settings(bus, &EditorSettings::default())
    }

    pub fn with_settings(bus: EventBus, settings: &EditorSettings) -> Self {
        Self {
            doc: Document::new(),
            history: History::new(settings.history.capacity),
            bus,
            docking: settings.docking.clone(),
            published: HistoryStatus::default(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn meta(&self) -> &Meta {
        &self.doc.meta
    }

    pub fn docking(&self) -> &DockingSettings {
        &self.docking
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.doc.shape(id)
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.doc.connector(id)
    }

    // ---- notification plumbing ----

    fn touch(&mut self, reason: &str, changed: ChangedIds) {
        self.doc.meta.version += 1;
        let version = self.doc.meta.version;
        tracing::trace!(reason, version, "model changed");
        self.bus.publish(Event::ModelChanged {
            reason: reason.to_string(),
            changed,
            version,
        });
        self.sync_history();
    }

    fn sync_history(&mut self) {
        let status = HistoryStatus::of(&self.history);
        if status == self.published {
            return;
        }
        self.bus.publish(Event::HistoryChanged {
            can_undo: status.can_undo,
            can_redo: status.can_redo,
            undo_label: status.undo_label.clone(),
            redo_label: status.redo_label.clone(),
        });
        self.published = status;
    }

    /// Run `f` inside a batch labelled `label`, unless the caller already opened one,
    /// in which case everything `f` records folds into the caller's batch.
    fn batched<R>(&mut self, label: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let opened = self.history.begin_batch(label);
        let out = f(self);
        if opened {
            self.history.commit_batch();
        }
        out
    }

    /// Apply and record a shape patch. False when nothing changed.
    fn patch_shape(&mut self, id: ShapeId, patch: &ShapePatch) -> bool {
        let Some(shape) = self.doc.shapes.get_mut(&id) else {
            return false;
        };
        let mut before = patch.capture(shape);
        shape.apply(patch);
        let mut after = patch.capture(shape);
        before.retain_changed(&mut after);
        if after.is_empty() {
            return false;
        }
        self.history.record(Op::ShapeUpdate { id, before, after });
        true
    }

    fn patch_connector(&mut self, id: ConnectorId, patch: &ConnectorPatch) -> bool {
        let endpoints_live = [patch.from, patch.to]
            .into_iter()
            .flatten()
            .all(|shape| self.doc.has_shape(shape));
        if !endpoints_live {
            tracing::debug!(%id, "connector patch names a missing shape");
            return false;
        }
        let Some(connector) = self.doc.connectors.get_mut(&id) else {
            return false;
        };
        let mut before = patch.capture(connector);
        connector.apply(patch);
        let mut after = patch.capture(connector);
        before.retain_changed(&mut after);
        if after.is_empty() {
            return false;
        }
        self.history.record(Op::ConnectorUpdate { id, before, after });
        true
    }

    fn remove_connector_recorded(&mut self, id: ConnectorId) -> bool {
        match self.doc.remove_connector(id) {
            Some((index, snapshot)) => {
                self.history.record(Op::ConnectorDelete { snapshot, index });
                true
            }
            None => false,
        }
    }

    // ---- shapes ----

    pub fn create_shape(&mut self, new: NewShape) -> &Shape {
        let mut shape = new.build();
        if self.doc.has_shape(shape.id) {
            tracing::debug!(id = %shape.id, "shape id already taken, assigning a fresh one");
            shape.id = ShapeId::new();
        }
        let id = shape.id;
        let index = self.doc.shape_count();
        self.history.record(Op::ShapeCreate {
            snapshot: shape.clone(),
            index,
        });
        self.doc.insert_shape(index, shape);
        self.touch("createShape", ChangedIds::shapes(vec![id]));
        &self.doc.shapes[&id]
    }

    pub fn update_shape(&mut self, id: ShapeId, patch: ShapePatch) -> Option<&Shape> {
        if !self.doc.has_shape(id) {
            tracing::debug!(%id, "update_shape: unknown shape");
            return None;
        }
        if self.patch_shape(id, &patch) {
            self.touch("updateShape", ChangedIds::shapes(vec![id]));
        }
        self.doc.shape(id)
    }

    /// Translate shapes by `(dx, dy)` as one "Move Shapes" step. Returns the ids
    /// that actually moved.
    pub fn move_shapes(
        &mut self,
        ids: &[ShapeId],
        dx: f64,
        dy: f64,
        options: MoveOptions,
    ) -> Vec<ShapeId> {
        let grid = self.doc.meta.grid_size;
        let moved = self.batched("Move Shapes", |d| {
            let mut moved = Vec::new();
            for id in unique(ids) {
                let Some(shape) = d.doc.shape(id) else {
                    tracing::debug!(%id, "move_shapes: unknown shape");
                    continue;
                };
                let (mut x, mut y) = (shape.x + dx, shape.y + dy);
                if options.snap && grid > 0.0 {
                    x = snap(x, grid);
                    y = snap(y, grid);
                }
                if d.patch_shape(id, &ShapePatch::position(x, y)) {
                    moved.push(id);
                }
            }
            moved
        });
        if !moved.is_empty() {
            self.touch("moveShapes", ChangedIds::shapes(moved.clone()));
        }
        moved
    }

    pub fn resize_shape(&mut self, id: ShapeId, w: f64, h: f64) -> Option<&Shape> {
        if !self.doc.has_shape(id) {
            tracing::debug!(%id, "resize_shape: unknown shape");
            return None;
        }
        let patch = ShapePatch::size(w.max(MIN_SHAPE_SIZE), h.max(MIN_SHAPE_SIZE));
        if self.patch_shape(id, &patch) {
            self.touch("resizeShape", ChangedIds::shapes(vec![id]));
        }
        self.doc.shape(id)
    }

    /// Delete shapes with every connector attached to them, as one step.
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> Removed {
        let removed = self.batched("Delete Shapes", |d| {
            let mut removed = Removed::default();
            for id in unique(ids) {
                if !d.doc.has_shape(id) {
                    continue;
                }
                for cid in d.doc.connectors_touching(id) {
                    if d.remove_connector_recorded(cid) {
                        removed.connectors.push(cid);
                    }
                }
                if let Some((index, snapshot)) = d.doc.remove_shape(id) {
                    d.history.record(Op::ShapeDelete { snapshot, index });
                    removed.shapes.push(id);
                }
                d.doc.forget_group_member(id);
            }
            removed
        });
        if !removed.is_empty() {
            self.touch(
                "deleteShapes",
                ChangedIds {
                    shapes: removed.shapes.clone(),
                    connectors: removed.connectors.clone(),
                    all: false,
                },
            );
        }
        removed
    }

    // ---- connectors ----

    pub fn create_connector(&mut self, new: NewConnector) -> Option<&Connector> {
        if !self.doc.has_shape(new.from) || !self.doc.has_shape(new.to) {
            tracing::debug!(from = %new.from, to = %new.to, "create_connector: missing endpoint");
            return None;
        }
        let connector = new.build();
        let id = connector.id;
        let index = self.doc.connector_count();
        self.history.record(Op::ConnectorCreate {
            snapshot: connector.clone(),
            index,
        });
        self.doc.insert_connector(index, connector);
        self.touch("createConnector", ChangedIds::connectors(vec![id]));
        self.doc.connector(id)
    }

    pub fn update_connector(&mut self, id: ConnectorId, patch: ConnectorPatch) -> Option<&Connector> {
        if !self.doc.has_connector(id) {
            tracing::debug!(%id, "update_connector: unknown connector");
            return None;
        }
        if self.patch_connector(id, &patch) {
            self.touch("updateConnector", ChangedIds::connectors(vec![id]));
        }
        self.doc.connector(id)
    }

    /// Move one end of a connector onto `target`. Waypoints shift by how far that
    /// end's dock point moved, and the end's port tag becomes `port`.
    pub fn reattach_connector(
        &mut self,
        id: ConnectorId,
        end: ConnectorEnd,
        target: ShapeId,
        port: Option<PortSide>,
    ) -> Option<&Connector> {
        let Some(connector) = self.doc.connector(id) else {
            tracing::debug!(%id, "reattach_connector: unknown connector");
            return None;
        };
        let Some(target_shape) = self.doc.shape(target) else {
            tracing::debug!(%id, %target, "reattach_connector: unknown target");
            return None;
        };
        let current = self.doc.shape(connector.endpoint(end))?;
        let fixed = self.doc.shape(connector.endpoint(opposite(end)))?;

        let toward = fixed.center();
        let old_dock = match connector.style.port(end) {
            Some(side) => port_position(current, side),
            None => dock_with(current, toward, &self.docking),
        };
        let new_dock = match port {
            Some(side) => port_position(target_shape, side),
            None => dock_with(target_shape, toward, &self.docking),
        };
        let delta = new_dock - old_dock;
        let points: Vec<Vec2> = connector.points.iter().map(|&p| p + delta).collect();

        let style = match end {
            ConnectorEnd::Start => ConnectorStylePatch {
                from_port: Some(port),
                ..ConnectorStylePatch::default()
            },
            ConnectorEnd::End => ConnectorStylePatch {
                to_port: Some(port),
                ..ConnectorStylePatch::default()
            },
        };
        let patch = ConnectorPatch {
            from: (end == ConnectorEnd::Start).then_some(target),
            to: (end == ConnectorEnd::End).then_some(target),
            points: Some(points),
            style: Some(style),
            ..ConnectorPatch::default()
        };

        let changed = self.batched("Reattach Endpoint", |d| d.patch_connector(id, &patch));
        if changed {
            self.touch("reattachConnector", ChangedIds::connectors(vec![id]));
        }
        self.doc.connector(id)
    }

    pub fn delete_connectors(&mut self, ids: &[ConnectorId]) -> Vec<ConnectorId> {
        let removed = self.batched("Delete Connectors", |d| {
            unique(ids)
                .into_iter()
                .filter(|&id| d.remove_connector_recorded(id))
                .collect::<Vec<_>>()
        });
        if !removed.is_empty() {
            self.touch("deleteConnectors", ChangedIds::connectors(removed.clone()));
        }
        removed
    }

    // ---- waypoints ----

    /// Insert a waypoint where `near` projects onto the closest segment of the
    /// connector's center line. Returns the index of the new waypoint.
    pub fn insert_waypoint(&mut self, id: ConnectorId, near: Vec2) -> Option<usize> {
        let Some(connector) = self.doc.connector(id) else {
            tracing::debug!(%id, "insert_waypoint: unknown connector");
            return None;
        };
        let line = center_line(&self.doc, connector)?;
        let (index, point) = line
            .windows(2)
            .map(|seg| project_on_segment(near, seg[0], seg[1]))
            .enumerate()
            .min_by(|a, b| a.1.distance(near).total_cmp(&b.1.distance(near)))?;
        let mut points = connector.points.clone();
        points.insert(index, point);
        // Not compressed: the new point lies on its segment and would be dropped.
        self.set_waypoints(id, "Insert Waypoint", "insertWaypoint", points)
            .then_some(index)
    }

    /// Drop the waypoint at `index`, then compress what is left.
    pub fn remove_waypoint(&mut self, id: ConnectorId, index: usize) -> bool {
        let Some(mut points) = self.waypoints_at(id, index) else {
            return false;
        };
        points.remove(index);
        let points = compress_colinear(&points);
        self.set_waypoints(id, "Delete Waypoint", "removeWaypoint", points)
    }

    /// Place the waypoint at `index` on `to`, then compress.
    pub fn move_waypoint(&mut self, id: ConnectorId, index: usize, to: Vec2) -> bool {
        let Some(mut points) = self.waypoints_at(id, index) else {
            return false;
        };
        points[index] = to;
        let points = compress_colinear(&points);
        self.set_waypoints(id, "Move Waypoint", "moveWaypoint", points)
    }

    /// The connector's waypoints, if it exists and has one at `index`.
    fn waypoints_at(&self, id: ConnectorId, index: usize) -> Option<Vec<Vec2>> {
        let points = &self.doc.connector(id)?.points;
        if index >= points.len() {
            tracing::debug!(%id, index, "no waypoint at index");
            return None;
        }
        Some(points.clone())
    }

    fn set_waypoints(
        &mut self,
        id: ConnectorId,
        label: &str,
        reason: &str,
        points: Vec<Vec2>,
    ) -> bool {
        let patch = ConnectorPatch {
            points: Some(points),
            ..ConnectorPatch::default()
        };
        let changed = self.batched(label, |d| d.patch_connector(id, &patch));
        if changed {
            self.touch(reason, ChangedIds::connectors(vec![id]));
        }
        changed
    }

    // ---- routing ----

    /// Route `ids` with `router` as one undoable step. Connectors the router gives
    /// up on, or whose route is unchanged, are left alone and not returned.
    pub fn route(&mut self, router: &dyn Router, ids: &[ConnectorId]) -> Vec<ConnectorId> {
        let routes: Vec<(ConnectorId, Route)> = unique(ids)
            .into_iter()
            .filter_map(|id| {
                let connector = self.doc.connector(id)?;
                let route = router.route(&self.doc, connector)?;
                (!route.matches(connector)).then_some((id, route))
            })
            .collect();
        let routed = self.apply_routes(router.label(), &format!("route:{}", router.name()), routes);
        tracing::debug!(
            strategy = router.name(),
            requested = ids.len(),
            routed = routed.len(),
            "routing pass"
        );
        routed
    }

    pub fn apply_routes(
        &mut self,
        label: &str,
        reason: &str,
        routes: Vec<(ConnectorId, Route)>,
    ) -> Vec<ConnectorId> {
        let changed = self.batched(label, |d| {
            routes
                .into_iter()
                .filter(|(id, route)| {
                    d.patch_connector(*id, &ConnectorPatch::route(route.kind, route.points.clone()))
                })
                .map(|(id, _)| id)
                .collect::<Vec<_>>()
        });
        if !changed.is_empty() {
            self.touch(reason, ChangedIds::connectors(changed.clone()));
        }
        changed
    }

    // ---- arrangement ----

    pub fn align(&mut self, ids: &[ShapeId], alignment: Alignment) -> Vec<ShapeId> {
        let patches = {
            let shapes = self.live_shapes(ids);
            arrange::align(&shapes, alignment)
        };
        self.apply_shape_patches(alignment.label(), "align", patches)
    }

    pub fn distribute(&mut self, ids: &[ShapeId], axis: Axis) -> Vec<ShapeId> {
        let patches = {
            let shapes = self.live_shapes(ids);
            arrange::distribute(&shapes, axis)
        };
        self.apply_shape_patches(axis.label(), "distribute", patches)
    }

    fn live_shapes(&self, ids: &[ShapeId]) -> Vec<&Shape> {
        unique(ids)
            .into_iter()
            .filter_map(|id| self.doc.shape(id))
            .collect()
    }

    /// Apply a set of shape patches as one step. Returns the shapes that changed.
    pub fn apply_shape_patches(
        &mut self,
        label: &str,
        reason: &str,
        patches: Vec<(ShapeId, ShapePatch)>,
    ) -> Vec<ShapeId> {
        let changed = self.batched(label, |d| {
            patches
                .into_iter()
                .filter(|(id, patch)| d.patch_shape(*id, patch))
                .map(|(id, _)| id)
                .collect::<Vec<_>>()
        });
        if !changed.is_empty() {
            self.touch(reason, ChangedIds::shapes(changed.clone()));
        }
        changed
    }

    // ---- z-order (not recorded) ----

    fn reorder(
        &mut self,
        ids: &[ShapeId],
        reason: &str,
        f: impl FnOnce(&mut Vec<ShapeId>, &IndexSet<ShapeId>),
    ) -> bool {
        let set: IndexSet<ShapeId> = unique(ids)
            .into_iter()
            .filter(|&id| self.doc.has_shape(id))
            .collect();
        if set.is_empty() {
            return false;
        }
        let before = self.doc.shape_ids();
        let mut order = before.clone();
        f(&mut order, &set);
        if order == before {
            return false;
        }
        self.doc.reorder_shapes(&order);
        self.touch(reason, ChangedIds::shapes(set.into_iter().collect()));
        true
    }

    pub fn bring_to_front(&mut self, ids: &[ShapeId]) -> bool {
        self.reorder(ids, "zOrderFront", |order, set| {
            let (mut rest, front): (Vec<ShapeId>, Vec<ShapeId>) =
                order.iter().copied().partition(|id| !set.contains(id));
            rest.extend(front);
            *order = rest;
        })
    }

    pub fn send_to_back(&mut self, ids: &[ShapeId]) -> bool {
        self.reorder(ids, "zOrderBack", |order, set| {
            let (mut back, rest): (Vec<ShapeId>, Vec<ShapeId>) =
                order.iter().copied().partition(|id| set.contains(id));
            back.extend(rest);
            *order = back;
        })
    }

    /// Swap every listed shape one step up past an unlisted neighbour.
    pub fn bring_forward(&mut self, ids: &[ShapeId]) -> bool {
        self.reorder(ids, "zOrderForward", |order, set| {
            for i in (0..order.len().saturating_sub(1)).rev() {
                if set.contains(&order[i]) && !set.contains(&order[i + 1]) {
                    order.swap(i, i + 1);
                }
            }
        })
    }

    pub fn send_backward(&mut self, ids: &[ShapeId]) -> bool {
        self.reorder(ids, "zOrderBackward", |order, set| {
            for i in 1..order.len() {
                if set.contains(&order[i]) && !set.contains(&order[i - 1]) {
                    order.swap(i, i - 1);
                }
            }
        })
    }

    // ---- groups (not recorded) ----

    /// Group at least two live shapes. Returns the new group's id.
    pub fn group_shapes(&mut self, ids: &[ShapeId]) -> Option<GroupId> {
        let members: IndexSet<ShapeId> = unique(ids)
            .into_iter()
            .filter(|&id| self.doc.has_shape(id))
            .collect();
        if members.len() < 2 {
            tracing::debug!(count = members.len(), "group_shapes: need at least two shapes");
            return None;
        }
        let gid = GroupId::new();
        let changed = members.iter().copied().collect();
        self.doc.groups.insert(gid, members);
        self.touch("group", ChangedIds::shapes(changed));
        Some(gid)
    }

    pub fn ungroup(&mut self, gid: GroupId) -> bool {
        match self.doc.groups.shift_remove(&gid) {
            Some(members) => {
                self.touch("ungroup", ChangedIds::shapes(members.into_iter().collect()));
                true
            }
            None => false,
        }
    }

    /// Remove every group. Returns how many there were.
    pub fn ungroup_all(&mut self) -> usize {
        let count = self.doc.groups.len();
        if count > 0 {
            self.doc.groups.clear();
            self.touch("ungroup", ChangedIds::default());
        }
        count
    }

    pub fn group(&self, gid: GroupId) -> Option<&IndexSet<ShapeId>> {
        self.doc.group(gid)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &IndexSet<ShapeId>)> + '_ {
        self.doc.groups()
    }

    // ---- meta (not recorded) ----

    pub fn set_zoom(&mut self, zoom: f64) {
        self.doc.meta.zoom = Meta::clamp_zoom(zoom);
        self.touch("setZoom", ChangedIds::default());
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.doc.meta.pan = Vec2::new(x, y);
        self.touch("setPan", ChangedIds::default());
    }

    pub fn set_grid_size(&mut self, size: f64) {
        self.doc.meta.grid_size = size.max(1.0);
        self.touch("setGrid", ChangedIds::default());
    }

    /// Empty the canvas, reset the view and clear history.
    pub fn reset(&mut self) {
        self.doc.shapes.clear();
        self.doc.connectors.clear();
        self.doc.groups.clear();
        self.doc.meta.pan = Vec2::ZERO;
        self.doc.meta.zoom = 1.0;
        self.history.clear();
        self.touch("resetModel", ChangedIds::everything());
    }

    // ---- persistence ----

    pub fn serialize(&self) -> DiagramSnapshot {
        self.doc.to_snapshot()
    }

    /// Load a snapshot. With `replace` the current state and history are dropped
    /// first. Otherwise records overlay existing ones by id as one undoable
    /// "Load Diagram" step. Connectors whose endpoints are not present after
    /// loading are skipped.
    pub fn deserialize(&mut self, snapshot: DiagramSnapshot, replace: bool) {
        if replace {
            self.doc.shapes.clear();
            self.doc.connectors.clear();
            self.doc.groups.clear();
            self.history.clear();
        }

        let shape_count = snapshot.shapes.len();
        let connectors = snapshot.connectors;
        let skipped = self.batched("Load Diagram", |d| {
            for shape in snapshot.shapes {
                d.load_shape(shape, !replace);
            }
            let mut skipped = 0usize;
            for connector in connectors {
                if !d.doc.has_shape(connector.from) || !d.doc.has_shape(connector.to) {
                    skipped += 1;
                    continue;
                }
                d.load_connector(connector, !replace);
            }
            skipped
        });
        if skipped > 0 {
            tracing::debug!(skipped, "deserialize: dropped connectors with missing endpoints");
        }

        for (gid, members) in snapshot.groups {
            let members: IndexSet<ShapeId> = members
                .into_iter()
                .filter(|&id| self.doc.has_shape(id))
                .collect();
            if members.len() >= 2 {
                self.doc.groups.insert(gid, members);
            }
        }

        let version = self.doc.meta.version.max(snapshot.meta.version);
        self.doc.meta = snapshot.meta;
        self.doc.meta.version = version;
        self.doc.meta.zoom = Meta::clamp_zoom(self.doc.meta.zoom);
        self.doc.meta.grid_size = self.doc.meta.grid_size.max(1.0);

        tracing::info!(
            shapes = shape_count,
            connectors = self.doc.connector_count(),
            replace,
            "diagram loaded"
        );
        self.touch("deserialize", ChangedIds::everything());
    }

    /// Overwrite a shape with the same id, or append it.
    fn load_shape(&mut self, mut shape: Shape, record: bool) {
        shape.style.normalize();
        shape.w = shape.w.max(MIN_SHAPE_SIZE);
        shape.h = shape.h.max(MIN_SHAPE_SIZE);
        if !record {
            self.doc.shapes.insert(shape.id, shape);
            return;
        }
        if self.doc.has_shape(shape.id) {
            self.patch_shape(shape.id, &ShapePatch::from(&shape));
            return;
        }
        let index = self.doc.shape_count();
        self.history.record(Op::ShapeCreate {
            snapshot: shape.clone(),
            index,
        });
        self.doc.insert_shape(index, shape);
    }

    fn load_connector(&mut self, mut connector: Connector, record: bool) {
        connector.style.stroke = normalize_hex(&connector.style.stroke);
        if !record {
            self.doc.connectors.insert(connector.id, connector);
            return;
        }
        if self.doc.has_connector(connector.id) {
            self.patch_connector(connector.id, &ConnectorPatch::from(&connector));
            return;
        }
        let index = self.doc.connector_count();
        self.history.record(Op::ConnectorCreate {
            snapshot: connector.clone(),
            index,
        });
        self.doc.insert_connector(index, connector);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.serialize())?)
    }

    pub fn from_json(&mut self, json: &str, replace: bool) -> Result<()> {
        let snapshot: DiagramSnapshot = serde_json::from_str(json)?;
        self.deserialize(snapshot, replace);
        Ok(())
    }

    // ---- history ----

    pub fn begin_batch(&mut self, label: &str) -> bool {
        self.history.begin_batch(label)
    }

    pub fn commit_batch(&mut self) {
        self.history.commit_batch();
        self.sync_history();
    }

    /// Close the open batch without recording it. Edits already applied stay.
    pub fn cancel_batch(&mut self) {
        self.history.cancel_batch();
    }

    /// Undo the newest step. An open batch is committed first so it is the step undone.
    pub fn undo(&mut self) -> bool {
        self.history.commit_batch();
        match self.history.undo(&mut self.doc) {
            Some(replay) => {
                tracing::debug!(label = %replay.label, "undo");
                self.touch("history:undo", replay.changed);
                true
            }
            None => {
                self.sync_history();
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        self.history.commit_batch();
        match self.history.redo(&mut self.doc) {
            Some(replay) => {
                tracing::debug!(label = %replay.label, "redo");
                self.touch("history:redo", replay.changed);
                true
            }
            None => {
                self.sync_history();
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{ConnectorKind, ShapeKind};
    use trellis_events::Subscription;

    fn diagram() -> (Diagram, Subscription) {
        let bus = EventBus::new();
        let sub = bus.subscribe("*");
        (Diagram::new(bus), sub)
    }

    fn model_reasons(sub: &Subscription) -> Vec<String> {
        sub.drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::ModelChanged { reason, .. } => Some(reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_shape_applies_defaults() {
        let (mut d, sub) = diagram();
        let shape = d.create_shape(NewShape::default()).clone();
        assert_eq!((shape.x, shape.y, shape.w, shape.h), (100.0, 100.0, 140.0, 70.0));
        assert_eq!(shape.text, "Shape");
        assert_eq!(shape.kind, ShapeKind::Rect);
        assert_eq!(d.meta().version, 1);
        assert_eq!(model_reasons(&sub), vec!["createShape"]);
    }

    #[test]
    fn test_update_shape_merges_style_and_clamps() {
        let (mut d, _sub) = diagram();
        let id = d.create_shape(NewShape::default()).id;
        let patch = ShapePatch {
            w: Some(2.0),
            style: Some(trellis_core::ShapeStylePatch {
                fill: Some("#abc".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let shape = d.update_shape(id, patch).unwrap();
        assert_eq!(shape.w, MIN_SHAPE_SIZE);
        assert_eq!(shape.style.fill, "#aabbcc");
        assert_eq!(shape.style.stroke, trellis_core::ShapeStyle::default().stroke);
    }

    #[test]
    fn test_noop_update_records_nothing() {
        let (mut d, sub) = diagram();
        let id = d.create_shape(NewShape::at(5.0, 5.0)).id;
        sub.drain();
        let version = d.meta().version;

        d.update_shape(id, ShapePatch::position(5.0, 5.0));
        assert_eq!(d.meta().version, version);
        assert_eq!(d.history().undo_len(), 1);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let (mut d, _sub) = diagram();
        assert!(d.update_shape(ShapeId::new(), ShapePatch::position(1.0, 1.0)).is_none());
        assert!(d.resize_shape(ShapeId::new(), 50.0, 50.0).is_none());
        assert!(d.delete_shapes(&[ShapeId::new()]).is_empty());
        assert!(
            d.create_connector(NewConnector::new(ShapeId::new(), ShapeId::new()))
                .is_none()
        );
        assert!(!d.can_undo());
        assert_eq!(d.meta().version, 0);
    }

    #[test]
    fn test_move_with_snap_is_one_step() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0)).id;
        let b = d.create_shape(NewShape::at(100.0, 0.0)).id;
        let moved = d.move_shapes(&[a, b], 12.0, 27.0, MoveOptions { snap: true });
        assert_eq!(moved, vec![a, b]);
        assert_eq!(d.shape(a).map(|s| (s.x, s.y)), Some((10.0, 30.0)));
        assert_eq!(d.shape(b).map(|s| (s.x, s.y)), Some((110.0, 30.0)));
        assert_eq!(d.history().undo_label(), Some("Move Shapes"));

        assert!(d.undo());
        assert_eq!(d.shape(a).map(|s| (s.x, s.y)), Some((0.0, 0.0)));
        assert_eq!(d.shape(b).map(|s| (s.x, s.y)), Some((100.0, 0.0)));
    }

    #[test]
    fn test_internal_batch_folds_into_open_batch() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0)).id;
        let undo_before = d.history().undo_len();

        assert!(d.begin_batch("Drag"));
        d.move_shapes(&[a], 5.0, 0.0, MoveOptions::default());
        d.move_shapes(&[a], 5.0, 0.0, MoveOptions::default());
        assert!(d.history().is_batch_open());
        d.commit_batch();

        assert_eq!(d.history().undo_len(), undo_before + 1);
        assert_eq!(d.history().undo_label(), Some("Drag"));
        d.undo();
        assert_eq!(d.shape(a).map(|s| s.x), Some(0.0));
    }

    #[test]
    fn test_delete_cascades_and_undo_restores() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0)).id;
        let b = d.create_shape(NewShape::at(300.0, 0.0)).id;
        let c = d.create_connector(NewConnector::new(a, b)).unwrap().id;
        let before = d.serialize();

        let removed = d.delete_shapes(&[a]);
        assert_eq!(removed.shapes, vec![a]);
        assert_eq!(removed.connectors, vec![c]);
        assert!(d.connector(c).is_none());

        assert!(d.undo());
        let after = d.serialize();
        assert_eq!(after.shapes, before.shapes);
        assert_eq!(after.connectors, before.connectors);
    }

    #[test]
    fn test_reattach_translates_waypoints() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0).size(100.0, 50.0)).id;
        let b = d.create_shape(NewShape::at(300.0, 0.0).size(100.0, 50.0)).id;
        let c = d.create_shape(NewShape::at(300.0, 200.0).size(100.0, 50.0)).id;
        let mut new = NewConnector::new(a, b);
        new.points = vec![Vec2::new(200.0, 25.0)];
        let id = d.create_connector(new).unwrap().id;

        let conn = d
            .reattach_connector(id, ConnectorEnd::End, c, Some(PortSide::West))
            .unwrap()
            .clone();
        assert_eq!(conn.to, c);
        assert_eq!(conn.style.to_port, Some(PortSide::West));
        // Old end docked at b's west port (300, 25), new at c's west port (300, 225).
        assert_eq!(conn.points, vec![Vec2::new(200.0, 225.0)]);
        assert_eq!(d.history().undo_label(), Some("Reattach Endpoint"));

        d.undo();
        let conn = d.connector(id).unwrap();
        assert_eq!(conn.to, b);
        assert_eq!(conn.style.to_port, None);
        assert_eq!(conn.points, vec![Vec2::new(200.0, 25.0)]);
    }

    #[test]
    fn test_reattach_to_missing_shape_fails() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0)).id;
        let b = d.create_shape(NewShape::at(300.0, 0.0)).id;
        let id = d.create_connector(NewConnector::new(a, b)).unwrap().id;
        assert!(
            d.reattach_connector(id, ConnectorEnd::Start, ShapeId::new(), None)
                .is_none()
        );
        assert_eq!(d.connector(id).map(|c| c.from), Some(a));
    }

    #[test]
    fn test_z_order_operations() {
        let (mut d, _sub) = diagram();
        let ids: Vec<ShapeId> = (0..4)
            .map(|i| d.create_shape(NewShape::at(i as f64, 0.0)).id)
            .collect();
        let undo_len = d.history().undo_len();

        assert!(d.bring_to_front(&[ids[0], ids[1]]));
        assert_eq!(d.document().shape_ids(), vec![ids[2], ids[3], ids[0], ids[1]]);

        assert!(d.send_to_back(&[ids[1]]));
        assert_eq!(d.document().shape_ids(), vec![ids[1], ids[2], ids[3], ids[0]]);

        assert!(d.bring_forward(&[ids[2]]));
        assert_eq!(d.document().shape_ids(), vec![ids[1], ids[3], ids[2], ids[0]]);

        assert!(d.send_backward(&[ids[0]]));
        assert_eq!(d.document().shape_ids(), vec![ids[1], ids[3], ids[0], ids[2]]);

        assert!(!d.bring_to_front(&[ids[2]]));
        assert_eq!(d.history().undo_len(), undo_len);
    }

    #[test]
    fn test_groups_strip_deleted_members() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::default()).id;
        let b = d.create_shape(NewShape::default()).id;
        assert!(d.group_shapes(&[a]).is_none());
        let gid = d.group_shapes(&[a, b]).unwrap();
        assert_eq!(d.group(gid).map(|g| g.len()), Some(2));

        d.delete_shapes(&[a]);
        assert!(d.group(gid).is_none());
    }

    #[test]
    fn test_align_is_undoable() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(10.0, 0.0)).id;
        let b = d.create_shape(NewShape::at(50.0, 80.0)).id;
        let changed = d.align(&[a, b], Alignment::Left);
        assert_eq!(changed, vec![b]);
        assert_eq!(d.shape(b).map(|s| s.x), Some(10.0));
        assert_eq!(d.history().undo_label(), Some("Align Left"));

        d.undo();
        assert_eq!(d.shape(b).map(|s| s.x), Some(50.0));
    }

    #[test]
    fn test_route_skips_unchanged_connectors() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0)).id;
        let b = d.create_shape(NewShape::at(300.0, 300.0)).id;
        let id = d.create_connector(NewConnector::new(a, b)).unwrap().id;

        let routed = d.route(&crate::GridRouter::default(), &[id]);
        assert_eq!(routed, vec![id]);
        assert_eq!(d.connector(id).map(|c| c.kind), Some(ConnectorKind::Orth));
        assert_eq!(d.history().undo_label(), Some("Route Grid"));

        let undo_len = d.history().undo_len();
        assert!(d.route(&crate::GridRouter::default(), &[id]).is_empty());
        assert_eq!(d.history().undo_len(), undo_len);
    }

    #[test]
    fn test_json_round_trip_and_version() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0).text("A")).id;
        let b = d.create_shape(NewShape::at(300.0, 0.0).text("B")).id;
        d.create_connector(NewConnector::new(a, b));
        d.group_shapes(&[a, b]);
        let json = d.to_json().unwrap();

        let (mut other, _sub2) = diagram();
        other.create_shape(NewShape::default());
        let version = other.meta().version;
        other.from_json(&json, true).unwrap();

        assert_eq!(other.document().shape_ids(), vec![a, b]);
        assert_eq!(other.document().connector_count(), 1);
        assert_eq!(other.groups().count(), 1);
        assert!(!other.can_undo());
        assert!(other.meta().version > version);
        assert!(other.meta().version > d.meta().version);
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        let (mut d, _sub) = diagram();
        assert!(d.from_json("{\"shapes\": 3}", true).is_err());
        assert_eq!(d.meta().version, 0);
    }

    #[test]
    fn test_deserialize_drops_dangling_connectors() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::default()).id;
        let b = d.create_shape(NewShape::default()).id;
        d.create_connector(NewConnector::new(a, b));
        let mut snapshot = d.serialize();
        snapshot.shapes.retain(|s| s.id == a);

        d.deserialize(snapshot, true);
        assert_eq!(d.document().connector_count(), 0);
    }

    #[test]
    fn test_insert_waypoint_on_nearest_segment() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 0.0).size(100.0, 100.0)).id;
        let b = d.create_shape(NewShape::at(400.0, 0.0).size(100.0, 100.0)).id;
        let c = d.create_connector(NewConnector::new(a, b)).unwrap().id;

        assert_eq!(d.insert_waypoint(c, Vec2::new(200.0, 80.0)), Some(0));
        assert_eq!(d.insert_waypoint(c, Vec2::new(300.0, 60.0)), Some(1));
        assert_eq!(
            d.connector(c).unwrap().points,
            vec![Vec2::new(200.0, 50.0), Vec2::new(300.0, 50.0)]
        );
        assert_eq!(d.history().undo_label(), Some("Insert Waypoint"));

        d.undo();
        assert_eq!(d.connector(c).unwrap().points, vec![Vec2::new(200.0, 50.0)]);
        assert_eq!(d.insert_waypoint(ConnectorId::new(), Vec2::ZERO), None);
    }

    #[test]
    fn test_move_and_remove_waypoint_compress() {
        let (mut d, _sub) = diagram();
        let a = d.create_shape(NewShape::at(0.0, 150.0).size(100.0, 100.0)).id;
        let b = d.create_shape(NewShape::at(500.0, 150.0).size(100.0, 100.0)).id;
        let bent = vec![
            Vec2::new(100.0, 200.0),
            Vec2::new(200.0, 150.0),
            Vec2::new(300.0, 200.0),
        ];
        let c = d
            .create_connector(NewConnector {
                points: bent.clone(),
                ..NewConnector::new(a, b)
            })
            .unwrap()
            .id;

        assert!(d.move_waypoint(c, 1, Vec2::new(200.0, 200.0)));
        assert_eq!(
            d.connector(c).unwrap().points,
            vec![Vec2::new(100.0, 200.0), Vec2::new(300.0, 200.0)]
        );
        assert_eq!(d.history().undo_label(), Some("Move Waypoint"));
        d.undo();
        assert_eq!(d.connector(c).unwrap().points, bent);

        assert!(d.remove_waypoint(c, 0));
        assert_eq!(
            d.connector(c).unwrap().points,
            vec![Vec2::new(200.0, 150.0), Vec2::new(300.0, 200.0)]
        );
        assert_eq!(d.history().undo_label(), Some("Delete Waypoint"));

        assert!(!d.remove_waypoint(c, 5));
        assert!(!d.move_waypoint(c, 2, Vec2::ZERO));
    }

    #[test]
    fn test_deserialize_clamps_view_meta() {
        let (mut d, _sub) = diagram();
        let mut snapshot = d.serialize();
        snapshot.meta.zoom = 40.0;
        snapshot.meta.grid_size = 0.0;
        d.deserialize(snapshot.clone(), true);
        assert_eq!(d.meta().zoom, Meta::clamp_zoom(40.0));
        assert_eq!(d.meta().grid_size, 1.0);

        snapshot.meta.zoom = 0.0;
        d.deserialize(snapshot, false);
        assert_eq!(d.meta().zoom, Meta::clamp_zoom(0.0));
    }

    #[test]
    fn test_history_events_follow_model_events() {
        let (mut d, sub) = diagram();
        d.create_shape(NewShape::default());
        let events = sub.drain();
        assert!(matches!(events[0], Event::ModelChanged { .. }));
        match &events[1] {
            Event::HistoryChanged {
                can_undo,
                undo_label,
                ..
            } => {
                assert!(*can_undo);
                assert_eq!(undo_label.as_deref(), Some("shape:create"));
            }
            other => panic!("Expected HistoryChanged, got {:?}", other),
        }

        d.undo();
        let reasons = model_reasons(&sub);
        assert_eq!(reasons, vec!["history:undo"]);
    }

    #[test]
    fn test_meta_helpers_clamp() {
        let (mut d, _sub) = diagram();
        d.set_zoom(100.0);
        d.set_grid_size(0.0);
        d.set_pan(3.0, 4.0);
        assert_eq!(d.meta().zoom, 6.0);
        assert_eq!(d.meta().grid_size, 1.0);
        assert_eq!(d.meta().pan, Vec2::new(3.0, 4.0));
        assert!(!d.can_undo());

        d.create_shape(NewShape::default());
        d.reset();
        assert!(d.document().is_empty());
        assert_eq!(d.meta().zoom, 1.0);
        assert!(!d.can_undo());
    }
}
