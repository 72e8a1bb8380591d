use std::env;

use foundation::SpatialReference;
use serde::{Deserialize, Serialize};

/// Tuning for one synchronization engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Map scale at or above which only the local boundary is queried.
    pub scale_threshold: f64,
    /// Opacity of the surrounding mask while shown.
    pub visible_opacity: f64,
    /// Spatial reference viewport queries are expressed in.
    pub query_wkid: u32,
    /// Spatial reference features are requested in.
    pub out_wkid: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scale_threshold: 577_791.0,
            visible_opacity: 0.8,
            query_wkid: SpatialReference::WEB_MERCATOR.wkid,
            out_wkid: SpatialReference::WEB_MERCATOR.wkid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ScaleThreshold(f64),
    VisibleOpacity(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ScaleThreshold(v) => {
                write!(f, "scale threshold must be positive and finite, got {v}")
            }
            ConfigError::VisibleOpacity(v) => {
                write!(f, "visible opacity must be in (0, 1], got {v}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    /// Defaults overridden by `BOUNDARY_SYNC_*` environment variables.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            scale_threshold: env_var_f64("BOUNDARY_SYNC_SCALE_THRESHOLD", d.scale_threshold),
            visible_opacity: env_var_f64("BOUNDARY_SYNC_VISIBLE_OPACITY", d.visible_opacity),
            query_wkid: env_var_u32("BOUNDARY_SYNC_QUERY_WKID", d.query_wkid),
            out_wkid: env_var_u32("BOUNDARY_SYNC_OUT_WKID", d.out_wkid),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale_threshold.is_finite() && self.scale_threshold > 0.0) {
            return Err(ConfigError::ScaleThreshold(self.scale_threshold));
        }
        if !(self.visible_opacity > 0.0 && self.visible_opacity <= 1.0) {
            return Err(ConfigError::VisibleOpacity(self.visible_opacity));
        }
        Ok(())
    }

    pub fn query_sr(&self) -> SpatialReference {
        SpatialReference::new(self.query_wkid)
    }

    pub fn out_sr(&self) -> SpatialReference {
        SpatialReference::new(self.out_wkid)
    }
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
