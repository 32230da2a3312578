use super::{Route, Router, compress_colinear, interior};
use crate::document::Document;
use crate::settings::RoutingSettings;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use trellis_core::{Connector, Rect, Vec2};

/// Orthogonal routing around shapes with A* on a coarse lattice.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleRouter {
    /// Lattice spacing in model units.
    pub cell: f64,
    /// Inflation applied to every obstacle.
    pub margin: f64,
    /// Search gives up after this many node expansions.
    pub max_expansions: usize,
}

impl Default for ObstacleRouter {
    fn default() -> Self {
        Self {
            cell: 40.0,
            margin: 8.0,
            max_expansions: 7000,
        }
    }
}

impl From<&RoutingSettings> for ObstacleRouter {
    fn from(settings: &RoutingSettings) -> Self {
        Self {
            cell: settings.cell,
            margin: settings.margin,
            max_expansions: settings.max_expansions,
        }
    }
}

impl Router for ObstacleRouter {
    fn name(&self) -> &'static str {
        "obstacle"
    }

    fn label(&self) -> &'static str {
        "Route Obstacle"
    }

    fn route(&self, doc: &Document, connector: &Connector) -> Option<Route> {
        let from = doc.shape(connector.from)?;
        let to = doc.shape(connector.to)?;

        // The connector's own shapes are not obstacles, or no route could leave them.
        let obstacles: Vec<Rect> = doc
            .shapes()
            .filter(|s| s.id != from.id && s.id != to.id)
            .map(|s| s.bounds().inflate(self.margin))
            .collect();

        let path = find_path(
            from.center(),
            to.center(),
            &obstacles,
            self.cell,
            self.max_expansions,
        );
        match path {
            Some(path) => Some(Route::orth(interior(&compress_colinear(&path)))),
            None => {
                tracing::debug!(connector = %connector.id, "no obstacle route within budget");
                None
            }
        }
    }
}

/// Largest lattice coordinate the search accepts, in cells. Far enough from
/// `i64::MAX` that neighbour steps and Manhattan sums cannot overflow.
const LATTICE_LIMIT: f64 = (1u64 << 40) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Node {
    x: i64,
    y: i64,
}

impl Node {
    /// `None` when `p` is not finite or lies outside the lattice.
    fn snap(p: Vec2, cell: f64) -> Option<Self> {
        let x = (p.x / cell).round();
        let y = (p.y / cell).round();
        let in_range = |v: f64| v.is_finite() && v.abs() <= LATTICE_LIMIT;
        if !in_range(x) || !in_range(y) {
            return None;
        }
        Some(Self {
            x: x as i64,
            y: y as i64,
        })
    }

    fn position(self, cell: f64) -> Vec2 {
        Vec2::new(self.x as f64 * cell, self.y as f64 * cell)
    }

    fn manhattan(self, other: Node) -> u64 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    fn neighbours(self) -> [Node; 4] {
        [
            Node { x: self.x + 1, ..self },
            Node { x: self.x - 1, ..self },
            Node { y: self.y + 1, ..self },
            Node { y: self.y - 1, ..self },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    est: u64,
    heuristic: u64,
    cost: u64,
    node: Node,
}

// Reversed so `BinaryHeap` pops the lowest estimate first; ties go to the entry
// closer to the goal, then to lattice position.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.heuristic.cmp(&self.heuristic))
            .then_with(|| other.node.y.cmp(&self.node.y))
            .then_with(|| other.node.x.cmp(&self.node.x))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 4-neighbour A* from `start` to `goal` on a lattice of spacing `cell`.
///
/// Lattice points inside any of `obstacles` are impassable. The returned path runs
/// over lattice points except for its first and last points, which are `start` and
/// `goal` themselves. `None` when the goal was not reached within `max_expansions`.
pub fn find_path(
    start: Vec2,
    goal: Vec2,
    obstacles: &[Rect],
    cell: f64,
    max_expansions: usize,
) -> Option<Vec<Vec2>> {
    if !cell.is_finite() || cell <= 0.0 {
        return None;
    }
    let (Some(s), Some(g)) = (Node::snap(start, cell), Node::snap(goal, cell)) else {
        tracing::debug!(?start, ?goal, "obstacle search endpoints outside the lattice");
        return None;
    };
    let blocked = |n: Node| {
        let p = n.position(cell);
        obstacles.iter().any(|o| o.contains(p))
    };

    let mut open = BinaryHeap::new();
    let mut best_cost: HashMap<Node, u64> = HashMap::new();
    let mut came_from: HashMap<Node, Node> = HashMap::new();
    best_cost.insert(s, 0);
    open.push(OpenEntry {
        est: s.manhattan(g),
        heuristic: s.manhattan(g),
        cost: 0,
        node: s,
    });

    let mut expansions = 0usize;
    while let Some(entry) = open.pop() {
        if best_cost.get(&entry.node).is_some_and(|&c| entry.cost > c) {
            continue;
        }
        if expansions >= max_expansions {
            tracing::debug!(expansions, "obstacle search budget exhausted");
            return None;
        }
        expansions += 1;

        if entry.node == g {
            return Some(reconstruct(&came_from, g, start, goal, cell));
        }

        for next in entry.node.neighbours() {
            if blocked(next) {
                continue;
            }
            let cost = entry.cost + 1;
            if best_cost.get(&next).is_none_or(|&c| cost < c) {
                best_cost.insert(next, cost);
                came_from.insert(next, entry.node);
                let heuristic = next.manhattan(g);
                open.push(OpenEntry {
                    est: cost + heuristic,
                    heuristic,
                    cost,
                    node: next,
                });
            }
        }
    }
    None
}

fn reconstruct(
    came_from: &HashMap<Node, Node>,
    end: Node,
    start: Vec2,
    goal: Vec2,
    cell: f64,
) -> Vec<Vec2> {
    let mut nodes = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        nodes.push(prev);
        current = prev;
    }
    nodes.reverse();

    let mut path: Vec<Vec2> = nodes.into_iter().map(|n| n.position(cell)).collect();
    if path.len() == 1 {
        return vec![start, goal];
    }
    let last = path.len() - 1;
    path[0] = start;
    path[last] = goal;
    path
}
