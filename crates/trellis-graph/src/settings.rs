use crate::routing::BendPreference;
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_core::{Result, TrellisError, Vec2};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub history: HistorySettings,
    pub docking: DockingSettings,
    pub routing: RoutingSettings,
    pub hit_test: HitTestSettings,
    /// Snap moved shapes to the document grid.
    pub snap_to_grid: bool,
    pub duplicate_offset: Vec2,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history: HistorySettings::default(),
            docking: DockingSettings::default(),
            routing: RoutingSettings::default(),
            hit_test: HitTestSettings::default(),
            snap_to_grid: false,
            duplicate_offset: Vec2::new(30.0, 30.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Undo batches kept before the oldest is evicted.
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockingSettings {
    /// Minimum cosine between the dock direction and a port for the port to win.
    /// Anything above 1.0 turns port docking off.
    pub port_threshold: f64,
    /// Fraction the perimeter point is pulled toward the center.
    pub perimeter_epsilon: f64,
}

impl Default for DockingSettings {
    fn default() -> Self {
        Self {
            port_threshold: 0.65,
            perimeter_epsilon: 0.0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Lattice spacing for obstacle routing.
    pub cell: f64,
    /// Inflation applied to every shape before it becomes an obstacle.
    pub margin: f64,
    pub max_expansions: usize,
    pub prefer: BendPreference,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            cell: 40.0,
            margin: 8.0,
            max_expansions: 7000,
            prefer: BendPreference::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitTestSettings {
    pub tolerance: f64,
}

impl Default for HitTestSettings {
    fn default() -> Self {
        Self { tolerance: 6.0 }
    }
}

impl EditorSettings {
    /// Load from the per-user config directory, falling back to defaults.
    pub fn load() -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("trellis").join("settings.json");
            tracing::info!("Loading settings from {:?}", path);
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("Failed to load settings: {}", e),
                }
            } else {
                tracing::info!("Settings file not found, using defaults");
            }
        }
        Self::default()
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: EditorSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.capacity == 0 {
            return Err(TrellisError::Settings(
                "history.capacity must be at least 1".to_string(),
            ));
        }
        if !(self.routing.cell > 0.0) {
            return Err(TrellisError::Settings(
                "routing.cell must be positive".to_string(),
            ));
        }
        if self.routing.max_expansions == 0 {
            return Err(TrellisError::Settings(
                "routing.max_expansions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
