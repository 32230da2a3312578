//! Shape and connector selection with change-only notification.

use crate::document::Document;
use std::collections::BTreeSet;
use trellis_core::{ConnectorId, Rect, ShapeId};
use trellis_events::{ChangedIds, Event, EventBus, EventListener};

#[derive(Debug)]
pub struct Selection {
    shapes: BTreeSet<ShapeId>,
    connectors: BTreeSet<ConnectorId>,
    /// What the last `SelectionChanged` reported.
    last: (Vec<ShapeId>, Vec<ConnectorId>),
    bus: EventBus,
}

impl Selection {
    pub fn new(bus: EventBus) -> Self {
        Self {
            shapes: BTreeSet::new(),
            connectors: BTreeSet::new(),
            last: (Vec::new(), Vec::new()),
            bus,
        }
    }

    /// Selected shape ids in sorted order.
    pub fn shapes(&self) -> Vec<ShapeId> {
        self.shapes.iter().copied().collect()
    }

    pub fn connectors(&self) -> Vec<ConnectorId> {
        self.connectors.iter().copied().collect()
    }

    pub fn is_shape_selected(&self, id: ShapeId) -> bool {
        self.shapes.contains(&id)
    }

    pub fn is_connector_selected(&self, id: ConnectorId) -> bool {
        self.connectors.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.connectors.is_empty()
    }

    /// Publish `SelectionChanged` if the sorted id lists differ from the last report.
    fn commit(&mut self, reason: &str) {
        let now = (self.shapes(), self.connectors());
        if now == self.last {
            return;
        }
        self.bus.publish(Event::SelectionChanged {
            reason: reason.to_string(),
            shapes: now.0.clone(),
            connectors: now.1.clone(),
        });
        self.last = now;
    }

    pub fn clear_selection(&mut self) {
        self.shapes.clear();
        self.connectors.clear();
        self.commit("clear");
    }

    pub fn select_shape(&mut self, doc: &Document, id: ShapeId, append: bool) {
        if !doc.has_shape(id) {
            return;
        }
        if !append {
            self.shapes.clear();
            self.connectors.clear();
        }
        self.shapes.insert(id);
        self.commit("shape");
    }

    /// Flip one shape. Adding a shape drops any selected connectors.
    pub fn toggle_shape(&mut self, doc: &Document, id: ShapeId) {
        if !doc.has_shape(id) {
            return;
        }
        if !self.shapes.remove(&id) {
            self.connectors.clear();
            self.shapes.insert(id);
        }
        self.commit("toggle-shape");
    }

    pub fn set_selection(&mut self, doc: &Document, ids: &[ShapeId]) {
        self.shapes.clear();
        self.connectors.clear();
        self.shapes
            .extend(ids.iter().copied().filter(|&id| doc.has_shape(id)));
        self.commit("set-shapes");
    }

    pub fn select_connector(&mut self, doc: &Document, id: ConnectorId, append: bool) {
        if !doc.has_connector(id) {
            return;
        }
        if !append {
            self.shapes.clear();
            self.connectors.clear();
        }
        self.connectors.insert(id);
        self.commit("connector");
    }

    pub fn toggle_connector(&mut self, doc: &Document, id: ConnectorId) {
        if !doc.has_connector(id) {
            return;
        }
        if !self.connectors.remove(&id) {
            self.shapes.clear();
            self.connectors.insert(id);
        }
        self.commit("toggle-connector");
    }

    pub fn set_connector_selection(&mut self, doc: &Document, ids: &[ConnectorId]) {
        self.shapes.clear();
        self.connectors.clear();
        self.connectors
            .extend(ids.iter().copied().filter(|&id| doc.has_connector(id)));
        self.commit("set-connectors");
    }

    /// Select every shape lying wholly inside `rect`.
    pub fn select_marquee(&mut self, doc: &Document, rect: Rect, append: bool) {
        if !append {
            self.shapes.clear();
            self.connectors.clear();
        }
        self.shapes.extend(
            doc.shapes()
                .filter(|s| rect.contains_rect(&s.bounds()))
                .map(|s| s.id),
        );
        self.commit("marquee");
    }

    /// Drop selected ids that `changed` mentions and `doc` no longer has.
    pub fn prune(&mut self, changed: &ChangedIds, doc: &Document) {
        let before = (self.shapes.len(), self.connectors.len());
        if changed.all {
            self.shapes.retain(|&id| doc.has_shape(id));
            self.connectors.retain(|&id| doc.has_connector(id));
        } else {
            for id in &changed.shapes {
                if !doc.has_shape(*id) {
                    self.shapes.remove(id);
                }
            }
            for id in &changed.connectors {
                if !doc.has_connector(*id) {
                    self.connectors.remove(id);
                }
            }
        }
        if before != (self.shapes.len(), self.connectors.len()) {
            self.commit("prune");
        }
    }
}

/// Feeds `ModelChanged` events into [`Selection::prune`].
pub(crate) struct SelectionPruner<'a> {
    pub selection: &'a mut Selection,
    pub doc: &'a Document,
}

impl EventListener for SelectionPruner<'_> {
    fn handle_event(&mut self, event: &Event) {
        if let Event::ModelChanged { changed, .. } = event {
            self.selection.prune(changed, self.doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{NewConnector, NewShape};
    use trellis_events::Subscription;

    struct Fixture {
        doc: Document,
        shapes: Vec<ShapeId>,
        connector: ConnectorId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let mut shapes = Vec::new();
        for i in 0..3 {
            let s = NewShape::at(i as f64 * 200.0, 0.0).size(100.0, 50.0).build();
            shapes.push(s.id);
            doc.insert_shape(i, s);
        }
        let c = NewConnector::new(shapes[0], shapes[1]).build();
        let connector = c.id;
        doc.insert_connector(0, c);
        Fixture {
            doc,
            shapes,
            connector,
        }
    }

    fn selection() -> (Selection, Subscription) {
        let bus = EventBus::new();
        let sub = bus.subscribe(Event::SELECTION_CHANGED);
        (Selection::new(bus), sub)
    }

    #[test]
    fn test_select_replaces_and_append_extends() {
        let f = fixture();
        let (mut sel, _sub) = selection();
        sel.select_shape(&f.doc, f.shapes[0], false);
        sel.select_shape(&f.doc, f.shapes[1], true);
        assert_eq!(sel.shapes().len(), 2);

        sel.select_connector(&f.doc, f.connector, false);
        assert!(sel.shapes().is_empty());
        assert_eq!(sel.connectors(), vec![f.connector]);
    }

    #[test]
    fn test_toggle_is_exclusive_across_kinds() {
        let f = fixture();
        let (mut sel, _sub) = selection();
        sel.select_connector(&f.doc, f.connector, false);
        sel.toggle_shape(&f.doc, f.shapes[2]);
        assert!(sel.connectors().is_empty());
        assert!(sel.is_shape_selected(f.shapes[2]));

        sel.toggle_shape(&f.doc, f.shapes[2]);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_only_real_changes_are_published() {
        let f = fixture();
        let (mut sel, sub) = selection();
        sel.select_shape(&f.doc, f.shapes[0], false);
        sel.select_shape(&f.doc, f.shapes[0], false);
        sel.select_shape(&f.doc, ShapeId::new(), false);
        sel.clear_selection();
        sel.clear_selection();

        let reasons: Vec<String> = sub
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::SelectionChanged { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec!["shape", "clear"]);
    }

    #[test]
    fn test_marquee_takes_fully_contained_shapes() {
        let f = fixture();
        let (mut sel, _sub) = selection();
        sel.select_marquee(&f.doc, Rect::new(-10.0, -10.0, 320.0, 100.0), false);
        assert_eq!(sel.shapes().len(), 2);
        assert!(!sel.is_shape_selected(f.shapes[2]));
        assert!(sel.is_shape_selected(f.shapes[0]));
    }

    #[test]
    fn test_prune_drops_missing_ids() {
        let mut f = fixture();
        let (mut sel, sub) = selection();
        sel.set_selection(&f.doc, &f.shapes);
        sub.drain();

        f.doc.remove_shape(f.shapes[1]);
        sel.prune(&ChangedIds::shapes(vec![f.shapes[1]]), &f.doc);
        assert_eq!(sel.shapes().len(), 2);
        assert!(!sel.is_shape_selected(f.shapes[1]));
        assert_eq!(sub.drain().len(), 1);

        // Ids not mentioned are left alone unless the whole document changed.
        f.doc.remove_shape(f.shapes[0]);
        sel.prune(&ChangedIds::default(), &f.doc);
        assert!(sel.is_shape_selected(f.shapes[0]));
        sel.prune(&ChangedIds::everything(), &f.doc);
        assert!(!sel.is_shape_selected(f.shapes[0]));
    }
}
