//! Synthetic diagrams shared by the benches.

use trellis_core::{NewConnector, NewShape, ShapeId};
use trellis_graph::Session;

/// A `side` x `side` grid of shapes with every shape connected to its right and
/// lower neighbour.
pub fn lattice_session(side: usize) -> Session {
    let mut session = Session::default();
    let mut ids: Vec<ShapeId> = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let shape =
                NewShape::at(col as f64 * 260.0, row as f64 * 180.0).text(format!("{row}:{col}"));
            ids.push(session.create_shape(shape));
        }
    }
    for row in 0..side {
        for col in 0..side {
            let here = ids[row * side + col];
            if col + 1 < side {
                session.create_connector(NewConnector::new(here, ids[row * side + col + 1]));
            }
            if row + 1 < side {
                session.create_connector(NewConnector::new(here, ids[(row + 1) * side + col]));
            }
        }
    }
    session
}

/// Corner-to-corner connectors across a lattice, so every route has to thread
/// between the shapes in the middle.
pub fn crossing_session(side: usize) -> Session {
    let mut session = lattice_session(side);
    let ids = session.diagram().document().shape_ids();
    if let (Some(&first), Some(&last)) = (ids.first(), ids.last()) {
        session.create_connector(NewConnector::new(first, last));
        session.create_connector(NewConnector::new(ids[side - 1], ids[ids.len() - side]));
    }
    session
}
