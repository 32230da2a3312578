//! Batched undo/redo over recorded document edits.

use crate::document::Document;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use trellis_core::{Connector, ConnectorId, ConnectorPatch, Shape, ShapeId, ShapePatch};
use trellis_events::ChangedIds;

pub const DEFAULT_CAPACITY: usize = 500;

/// One recorded edit. Create/delete ops own a deep copy of the entity plus the
/// position it occupied, update ops own the changed fields before and after.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ShapeCreate {
        snapshot: Shape,
        index: usize,
    },
    ShapeUpdate {
        id: ShapeId,
        before: ShapePatch,
        after: ShapePatch,
    },
    ShapeDelete {
        snapshot: Shape,
        index: usize,
    },
    ConnectorCreate {
        snapshot: Connector,
        index: usize,
    },
    ConnectorUpdate {
        id: ConnectorId,
        before: ConnectorPatch,
        after: ConnectorPatch,
    },
    ConnectorDelete {
        snapshot: Connector,
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Op::ShapeCreate { .. } => "shape:create",
            Op::ShapeUpdate { .. } => "shape:update",
            Op::ShapeDelete { .. } => "shape:delete",
            Op::ConnectorCreate { .. } => "connector:create",
            Op::ConnectorUpdate { .. } => "connector:update",
            Op::ConnectorDelete { .. } => "connector:delete",
        }
    }

    fn replay(&self, doc: &mut Document, direction: Direction) {
        use Direction::{Redo, Undo};
        match (self, direction) {
            (Op::ShapeCreate { snapshot, .. }, Undo) | (Op::ShapeDelete { snapshot, .. }, Redo) => {
                doc.remove_shape(snapshot.id);
            }
            (Op::ShapeCreate { snapshot, index }, Redo)
            | (Op::ShapeDelete { snapshot, index }, Undo) => {
                doc.insert_shape(*index, snapshot.clone());
            }
            (Op::ShapeUpdate { id, before, after }, _) => {
                let patch = if direction == Undo { before } else { after };
                if let Some(shape) = doc.shapes.get_mut(id) {
                    shape.apply(patch);
                }
            }
            (Op::ConnectorCreate { snapshot, .. }, Undo)
            | (Op::ConnectorDelete { snapshot, .. }, Redo) => {
                doc.remove_connector(snapshot.id);
            }
            (Op::ConnectorCreate { snapshot, index }, Redo)
            | (Op::ConnectorDelete { snapshot, index }, Undo) => {
                doc.insert_connector(*index, snapshot.clone());
            }
            (Op::ConnectorUpdate { id, before, after }, _) => {
                let patch = if direction == Undo { before } else { after };
                if let Some(connector) = doc.connectors.get_mut(id) {
                    connector.apply(patch);
                }
            }
        }
    }

    fn collect_ids(&self, changed: &mut ChangedIds) {
        match self {
            Op::ShapeCreate { snapshot, .. } | Op::ShapeDelete { snapshot, .. } => {
                push_unique(&mut changed.shapes, snapshot.id);
            }
            Op::ShapeUpdate { id, .. } => push_unique(&mut changed.shapes, *id),
            Op::ConnectorCreate { snapshot, .. } | Op::ConnectorDelete { snapshot, .. } => {
                push_unique(&mut changed.connectors, snapshot.id);
            }
            Op::ConnectorUpdate { id, .. } => push_unique(&mut changed.connectors, *id),
        }
    }
}

fn push_unique<T: PartialEq>(ids: &mut Vec<T>, id: T) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// A labelled group of ops undone and redone as one step.
#[derive(Debug, Clone)]
pub struct Batch {
    pub label: String,
    pub ops: Vec<Op>,
    pub timestamp: DateTime<Utc>,
}

impl Batch {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn changed(&self) -> ChangedIds {
        let mut changed = ChangedIds::default();
        for op in &self.ops {
            op.collect_ids(&mut changed);
        }
        changed
    }
}

/// What an undo or redo touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub label: String,
    pub changed: ChangedIds,
}

#[derive(Debug)]
pub struct History {
    past: VecDeque<Batch>,
    future: Vec<Batch>,
    current: Option<Batch>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            current: None,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a batch. Returns false, changing nothing, when one is already open.
    pub fn begin_batch(&mut self, label: impl Into<String>) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.current = Some(Batch::new(label));
        true
    }

    pub fn is_batch_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn record(&mut self, op: Op) {
        if let Some(batch) = &mut self.current {
            batch.ops.push(op);
            return;
        }
        let mut batch = Batch::new(op.kind());
        batch.ops.push(op);
        self.push(batch);
    }

    /// Close the open batch, keeping it only if it recorded anything.
    pub fn commit_batch(&mut self) {
        if let Some(batch) = self.current.take() {
            if !batch.ops.is_empty() {
                self.push(batch);
            }
        }
    }

    pub fn cancel_batch(&mut self) {
        if let Some(batch) = self.current.take() {
            tracing::debug!(label = %batch.label, ops = batch.ops.len(), "batch cancelled");
        }
    }

    fn push(&mut self, batch: Batch) {
        self.past.push_back(batch);
        if self.past.len() > self.capacity {
            self.past.pop_front();
        }
        self.future.clear();
    }

    pub fn undo(&mut self, doc: &mut Document) -> Option<Replay> {
        let batch = self.past.pop_back()?;
        for op in batch.ops.iter().rev() {
            op.replay(doc, Direction::Undo);
        }
        let replay = Replay {
            label: batch.label.clone(),
            changed: batch.changed(),
        };
        self.future.push(batch);
        Some(replay)
    }

    pub fn redo(&mut self, doc: &mut Document) -> Option<Replay> {
        let batch = self.future.pop()?;
        for op in &batch.ops {
            op.replay(doc, Direction::Redo);
        }
        let replay = Replay {
            label: batch.label.clone(),
            changed: batch.changed(),
        };
        self.past.push_back(batch);
        Some(replay)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.past.back().map(|b| b.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.future.last().map(|b| b.label.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    /// Drop both stacks and any open batch.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.current = None;
    }
}
