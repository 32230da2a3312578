pub mod arrange;
pub mod diagram;
pub mod docking;
pub mod document;
pub mod history;
pub mod hit_tester;
pub mod path;
pub mod routing;
pub mod selection;
pub mod session;
pub mod settings;

pub use arrange::{Alignment, Axis};
pub use diagram::{Diagram, MoveOptions, Removed};
pub use docking::{Port, dock, dock_with, port_position, ports};
pub use document::Document;
pub use history::{Batch, History, Op, Replay};
pub use hit_tester::HitTester;
pub use path::{ArrowHead, arrow_head, connector_path, trim_endpoints};
pub use routing::{
    BasicRouter, BendPreference, GridRouter, ObstacleRouter, Route, Router, compress_colinear,
};
pub use selection::Selection;
pub use session::{SNAPSHOT_LIMIT, Session, SnapshotEntry};
pub use settings::{
    DockingSettings, EditorSettings, HistorySettings, HitTestSettings, RoutingSettings,
};
