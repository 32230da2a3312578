use super::{Route, Router};
use crate::document::Document;
use trellis_core::Connector;

/// Straight connectors with no waypoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicRouter;

impl Router for BasicRouter {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn label(&self) -> &'static str {
        "Route Basic"
    }

    fn route(&self, _doc: &Document, _connector: &Connector) -> Option<Route> {
        Some(Route::straight())
    }
}
