//! Engine settings and presets
//!
//! Persisted in LocalStorage on the web; native builds always use defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Behaviour presets matching the two bubble field styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FieldPreset {
    /// Independent drift with brownian jitter, capped concurrency
    #[default]
    Pop,
    /// Pairwise attraction/repulsion, uncapped
    Cluster,
}

impl FieldPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldPreset::Pop => "Pop",
            FieldPreset::Cluster => "Cluster",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pop" | "bubble" => Some(FieldPreset::Pop),
            "cluster" | "clustering" => Some(FieldPreset::Cluster),
            _ => None,
        }
    }
}

/// What happens to a bubble dragged into the edge zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AbandonPolicy {
    /// Resolve as not selected and report it
    #[default]
    Resolve,
    /// Remove from screen and return the label to the backlog, unreported
    Requeue,
}

/// Pairwise clustering forces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub enabled: bool,
    /// Only attract bubbles carrying the same group tag
    pub same_group_only: bool,
    /// Attraction range (px)
    pub max_radius: f32,
    /// Attraction numerator (force = strength / d², capped)
    pub strength: f32,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            same_group_only: true,
            max_radius: INTERACTION_RADIUS,
            strength: ATTRACTION_STRENGTH,
        }
    }
}

/// Centered vertical lane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneSettings {
    /// Lane width as a percentage of the viewport width (10-100)
    pub width_percent: f32,
    /// Inner margin on both sides of the lane (px)
    pub margin: f32,
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self {
            width_percent: LANE_WIDTH_PERCENT,
            margin: LANE_MARGIN,
        }
    }
}

/// Invalid configuration
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{name} must be a positive period, got {value}")]
    InvalidPeriod { name: &'static str, value: f64 },
    #[error("concurrency cap must be at least 1")]
    ZeroCap,
    #[error("lane width must be within 10-100%, got {0}")]
    LaneWidth(f32),
    #[error("lane margin must not be negative, got {0}")]
    LaneMargin(f32),
    #[error("{name} must not be negative, got {value}")]
    NegativeThreshold { name: &'static str, value: f32 },
}

/// Bubble engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub preset: FieldPreset,

    // === Timers ===
    pub spawn_interval_ms: f64,
    pub physics_interval_ms: f64,
    /// Cleanup sweep period; None disables the sweep
    pub cleanup_interval_ms: Option<f64>,

    // === Lifecycle ===
    /// Max non-fading bubbles; None = uncapped
    pub max_concurrent: Option<usize>,
    pub lifetime_ms: f64,
    pub fade_duration_ms: f64,

    // === Forces ===
    /// Random velocity jitter every tick
    pub brownian: bool,
    pub cluster: ClusterSettings,

    // === Bounds ===
    /// Constrain bubbles to a centered lane instead of the full viewport
    pub lane: Option<LaneSettings>,

    // === Pointer ===
    pub edge_threshold: f32,
    pub click_threshold: f32,
    /// Give a released bubble a fresh random velocity
    pub randomize_on_release: bool,
    pub abandon: AbandonPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preset: FieldPreset::Pop,

            spawn_interval_ms: SPAWN_INTERVAL_MS,
            physics_interval_ms: PHYSICS_INTERVAL_MS,
            cleanup_interval_ms: Some(CLEANUP_INTERVAL_MS),

            max_concurrent: Some(MAX_CONCURRENT),
            lifetime_ms: LIFETIME_MS,
            fade_duration_ms: FADE_DURATION_MS,

            brownian: true,
            cluster: ClusterSettings::default(),

            lane: None,

            edge_threshold: EDGE_THRESHOLD,
            click_threshold: CLICK_THRESHOLD,
            randomize_on_release: true,
            abandon: AbandonPolicy::Resolve,
        }
    }
}

impl EngineSettings {
    /// Create settings from a preset (applies preset defaults)
    pub fn from_preset(preset: FieldPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a preset (updates force and cap settings)
    pub fn apply_preset(&mut self, preset: FieldPreset) {
        self.preset = preset;
        match preset {
            FieldPreset::Pop => {
                self.brownian = true;
                self.cluster.enabled = false;
                self.max_concurrent = Some(MAX_CONCURRENT);
            }
            FieldPreset::Cluster => {
                self.brownian = false;
                self.cluster.enabled = true;
                self.max_concurrent = None;
            }
        }
    }

    /// Check periods, caps and thresholds
    pub fn validate(&self) -> Result<(), SettingsError> {
        let periods = [
            ("spawn_interval_ms", Some(self.spawn_interval_ms)),
            ("physics_interval_ms", Some(self.physics_interval_ms)),
            ("cleanup_interval_ms", self.cleanup_interval_ms),
            ("lifetime_ms", Some(self.lifetime_ms)),
            ("fade_duration_ms", Some(self.fade_duration_ms)),
        ];
        for (name, value) in periods {
            if let Some(value) = value
                && !(value.is_finite() && value > 0.0)
            {
                return Err(SettingsError::InvalidPeriod { name, value });
            }
        }
        if self.max_concurrent == Some(0) {
            return Err(SettingsError::ZeroCap);
        }
        if let Some(lane) = self.lane {
            if !(10.0..=100.0).contains(&lane.width_percent) {
                return Err(SettingsError::LaneWidth(lane.width_percent));
            }
            if lane.margin < 0.0 {
                return Err(SettingsError::LaneMargin(lane.margin));
            }
        }
        if self.edge_threshold < 0.0 {
            return Err(SettingsError::NegativeThreshold {
                name: "edge_threshold",
                value: self.edge_threshold,
            });
        }
        if self.click_threshold < 0.0 {
            return Err(SettingsError::NegativeThreshold {
                name: "click_threshold",
                value: self.click_threshold,
            });
        }
        Ok(())
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "mood_bubbles_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match serde_json::from_str::<Self>(&json) {
                Ok(settings) if settings.validate().is_ok() => {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
                Ok(_) => log::warn!("Stored settings are invalid, using defaults"),
                Err(e) => log::warn!("Could not parse stored settings: {}", e),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Settings saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(EngineSettings::default().validate(), Ok(()));
        assert_eq!(EngineSettings::from_preset(FieldPreset::Cluster).validate(), Ok(()));
    }

    #[test]
    fn test_presets() {
        let pop = EngineSettings::from_preset(FieldPreset::Pop);
        assert!(pop.brownian);
        assert!(!pop.cluster.enabled);
        assert_eq!(pop.max_concurrent, Some(5));

        let cluster = EngineSettings::from_preset(FieldPreset::Cluster);
        assert!(!cluster.brownian);
        assert!(cluster.cluster.enabled);
        assert_eq!(cluster.max_concurrent, None);
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!(FieldPreset::from_str("CLUSTER"), Some(FieldPreset::Cluster));
        assert_eq!(FieldPreset::from_str("pop"), Some(FieldPreset::Pop));
        assert_eq!(FieldPreset::from_str("swarm"), None);
        assert_eq!(FieldPreset::Cluster.as_str(), "Cluster");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = EngineSettings::default();
        settings.physics_interval_ms = 0.0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidPeriod { name: "physics_interval_ms", .. })
        ));

        let mut settings = EngineSettings::default();
        settings.max_concurrent = Some(0);
        assert_eq!(settings.validate(), Err(SettingsError::ZeroCap));

        let mut settings = EngineSettings::default();
        settings.lane = Some(LaneSettings {
            width_percent: 5.0,
            margin: 100.0,
        });
        assert_eq!(settings.validate(), Err(SettingsError::LaneWidth(5.0)));

        let mut settings = EngineSettings::default();
        settings.cleanup_interval_ms = Some(f64::NAN);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_json_roundtrip_keeps_lane() {
        let mut settings = EngineSettings::from_preset(FieldPreset::Cluster);
        settings.lane = Some(LaneSettings::default());
        let json = serde_json::to_string(&settings).unwrap();
        let back: EngineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.preset, FieldPreset::Cluster);
        assert_eq!(back.lane, Some(LaneSettings::default()));
    }
}
