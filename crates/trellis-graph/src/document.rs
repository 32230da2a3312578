//! The diagram document: shapes in z-order, connectors, groups and meta.
//!
//! Everything here is readable from outside the crate. Writes are `pub(crate)` so
//! edits go through [`crate::Diagram`], which records them for undo.

use indexmap::{IndexMap, IndexSet};
use trellis_core::{
    Connector, ConnectorId, DiagramSnapshot, GroupId, Meta, Rect, SCHEMA_VERSION, Shape, ShapeId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Insertion order is paint order; the last shape is on top.
    pub(crate) shapes: IndexMap<ShapeId, Shape>,
    pub(crate) connectors: IndexMap<ConnectorId, Connector>,
    pub(crate) groups: IndexMap<GroupId, IndexSet<ShapeId>>,
    pub(crate) meta: Meta,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Shapes bottom to top.
    pub fn shapes(&self) -> impl DoubleEndedIterator<Item = &Shape> + '_ {
        self.shapes.values()
    }

    pub fn shape_ids(&self) -> Vec<ShapeId> {
        self.shapes.keys().copied().collect()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn has_shape(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    /// Paint position of a shape, 0 being the bottom.
    pub fn z_index(&self, id: ShapeId) -> Option<usize> {
        self.shapes.get_index_of(&id)
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> + '_ {
        self.connectors.values()
    }

    pub fn connector_ids(&self) -> Vec<ConnectorId> {
        self.connectors.keys().copied().collect()
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    pub fn has_connector(&self, id: ConnectorId) -> bool {
        self.connectors.contains_key(&id)
    }

    /// Connectors with either end on `shape`.
    pub fn connectors_touching(&self, shape: ShapeId) -> Vec<ConnectorId> {
        self.connectors
            .values()
            .filter(|c| c.touches(shape))
            .map(|c| c.id)
            .collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&IndexSet<ShapeId>> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &IndexSet<ShapeId>)> + '_ {
        self.groups.iter().map(|(id, members)| (*id, members))
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn version(&self) -> u64 {
        self.meta.version
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.connectors.is_empty()
    }

    /// Bounding box of every shape, `None` for an empty canvas.
    pub fn bounds(&self) -> Option<Rect> {
        if self.shapes.is_empty() {
            return None;
        }
        let rects: Vec<Rect> = self.shapes.values().map(Shape::bounds).collect();
        Some(Rect::bounding(&rects))
    }

    pub fn to_snapshot(&self) -> DiagramSnapshot {
        DiagramSnapshot {
            schema_version: SCHEMA_VERSION,
            shapes: self.shapes.values().cloned().collect(),
            connectors: self.connectors.values().cloned().collect(),
            groups: self
                .groups
                .iter()
                .map(|(id, members)| (*id, members.iter().copied().collect()))
                .collect(),
            meta: self.meta.clone(),
        }
    }

    // Raw writes used by the diagram and by history replay. None of these record
    // anything or bump the version.

    /// Insert at paint position `index`, clamped to the end.
    pub(crate) fn insert_shape(&mut self, index: usize, shape: Shape) {
        let index = index.min(self.shapes.len());
        self.shapes.shift_insert(index, shape.id, shape);
    }

    /// Remove keeping the paint order of the rest. Returns the old index.
    pub(crate) fn remove_shape(&mut self, id: ShapeId) -> Option<(usize, Shape)> {
        self.shapes
            .shift_remove_full(&id)
            .map(|(index, _, shape)| (index, shape))
    }

    pub(crate) fn insert_connector(&mut self, index: usize, connector: Connector) {
        let index = index.min(self.connectors.len());
        self.connectors.shift_insert(index, connector.id, connector);
    }

    pub(crate) fn remove_connector(&mut self, id: ConnectorId) -> Option<(usize, Connector)> {
        self.connectors
            .shift_remove_full(&id)
            .map(|(index, _, connector)| (index, connector))
    }

    /// Replace the paint order. Ids not in `order` keep their relative order
    /// after the listed ones.
    pub(crate) fn reorder_shapes(&mut self, order: &[ShapeId]) {
        let mut old = std::mem::take(&mut self.shapes);
        let mut shapes = IndexMap::with_capacity(old.len());
        for id in order {
            if let Some(shape) = old.shift_remove(id) {
                shapes.insert(*id, shape);
            }
        }
        shapes.extend(old);
        self.shapes = shapes;
    }

    /// Drop `shape` from every group, and any group left with fewer than two members.
    pub(crate) fn forget_group_member(&mut self, shape: ShapeId) {
        for members in self.groups.values_mut() {
            members.shift_remove(&shape);
        }
        self.groups.retain(|_, members| members.len() >= 2);
    }
}
