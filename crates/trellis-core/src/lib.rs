use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod connector;
pub mod error;
pub mod geometry;
pub mod meta;
pub mod shape;

pub use connector::{
    ArrowKind, Connector, ConnectorEnd, ConnectorKind, ConnectorPatch, ConnectorStyle,
    ConnectorStylePatch, NewConnector, PortSide,
};
pub use error::{Result, TrellisError};
pub use geometry::{Rect, Size, Vec2};
pub use meta::{DiagramSnapshot, Meta, SCHEMA_VERSION};
pub use shape::{
    MIN_SHAPE_SIZE, NewShape, Shape, ShapeData, ShapeKind, ShapePatch, ShapeStyle,
    ShapeStylePatch, normalize_hex,
};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a shape, stable for the shape's lifetime.
    ShapeId
);
uuid_id!(ConnectorId);
uuid_id!(GroupId);
