use std::sync::Arc;
use std::time::Duration;

use boundaries::{CyanWaterbodyMapper, SyncConfig, SyncEngine, SyncEvent, SyncSnapshot};
use foundation::{Extent, Polygon, SpatialReference};
use layers::LayerId;
use runtime::ViewportState;
use serde::{Deserialize, Serialize};
use streaming::{FetchError, FetchPipeline, FieldMapper, MemoryFeatureSource, RecordMapper};

/// A recorded map session: what the service holds and what the user did.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: Option<SyncConfig>,
    /// Identity field for the generic mapper. Ignored with `"mapper": "cyan"`.
    #[serde(default = "default_key_field")]
    pub key_field: String,
    #[serde(default)]
    pub mapper: MapperKind,
    #[serde(default = "default_layer_id")]
    pub layer_id: String,
    pub source: SourceSpec,
    /// Drive all fetches to completion after every step.
    #[serde(default = "default_true")]
    pub settle_each_step: bool,
    pub steps: Vec<Step>,
}

fn default_key_field() -> String {
    "id".to_string()
}

fn default_layer_id() -> String {
    "replay".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperKind {
    #[default]
    Fields,
    Cyan,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    #[serde(default, rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
    pub features: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportStep {
    pub extent: Extent,
    pub scale: f64,
    #[serde(default = "default_true")]
    pub stationary: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Boundary(Option<Polygon>),
    /// Publish the previous boundary allocation again.
    RepeatBoundary,
    Viewport(ViewportStep),
    /// Publish the previous viewport allocation again (a no-op pan).
    RepeatViewport,
    Toggle,
    Reset,
    Unmount,
    FailNext {
        message: String,
        #[serde(default)]
        status: Option<u16>,
    },
    DelayNextMs(u64),
    Settle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub snapshot: SyncSnapshot,
    pub requests: usize,
    pub completed: usize,
    pub events: Vec<String>,
}

#[derive(Debug)]
pub enum ScriptError {
    Parse(serde_json::Error),
    Config(boundaries::ConfigError),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Parse(e) => write!(f, "invalid session script: {e}"),
            ScriptError::Config(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Parse(e) => Some(e),
            ScriptError::Config(e) => Some(e),
        }
    }
}

impl Script {
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(text).map_err(ScriptError::Parse)
    }

    /// The script's own configuration, or `fallback` when it has none.
    pub fn config_or(&self, fallback: impl FnOnce() -> SyncConfig) -> SyncConfig {
        self.config.clone().unwrap_or_else(fallback)
    }
}

/// Replay `script` against an in-memory source and report the final state.
///
/// `config` is used as given; see [`Script::config_or`].
pub async fn replay(script: Script, config: SyncConfig) -> Result<Report, ScriptError> {
    config.validate().map_err(ScriptError::Config)?;

    let source = Arc::new(
        MemoryFeatureSource::new("replay", script.source.spatial_reference)
            .with_features(script.source.features.clone()),
    );
    let mapper: Arc<dyn RecordMapper> = match script.mapper {
        MapperKind::Fields => Arc::new(FieldMapper::new(script.key_field.clone())),
        MapperKind::Cyan => Arc::new(CyanWaterbodyMapper::new()),
    };
    let pipeline = FetchPipeline::new(Arc::clone(&source), mapper);
    let mut engine = SyncEngine::new(LayerId::new(script.layer_id.clone()), config, pipeline);

    let mut boundary: Option<Arc<Polygon>> = None;
    let mut viewport: Option<ViewportState> = None;

    for (i, step) in script.steps.into_iter().enumerate() {
        tracing::debug!(step = i, ?step, "replaying");
        match step {
            Step::Boundary(polygon) => {
                boundary = polygon.map(Arc::new);
                engine.handle(SyncEvent::Boundary(boundary.clone()));
            }
            Step::RepeatBoundary => engine.handle(SyncEvent::Boundary(boundary.clone())),
            Step::Viewport(v) => {
                let state = ViewportState::new(v.extent, v.scale, v.stationary);
                viewport = Some(state.clone());
                engine.handle(SyncEvent::Viewport(state));
            }
            Step::RepeatViewport => match &viewport {
                Some(state) => engine.handle(SyncEvent::Viewport(state.clone())),
                None => tracing::warn!(step = i, "no viewport to repeat"),
            },
            Step::Toggle => engine.handle(SyncEvent::ToggleSurrounding),
            Step::Reset => engine.handle(SyncEvent::Reset),
            Step::Unmount => engine.handle(SyncEvent::Unmount),
            Step::FailNext { message, status } => source.push_failure(match status {
                Some(status) => FetchError::with_status(message, status),
                None => FetchError::new(message),
            }),
            Step::DelayNextMs(ms) => source.push_delay(Duration::from_millis(ms)),
            Step::Settle => engine.settle().await,
        }
        if script.settle_each_step {
            engine.settle().await;
        }
    }
    engine.settle().await;

    Ok(Report {
        snapshot: engine.snapshot(),
        requests: source.request_count(),
        completed: source.completed_count(),
        events: engine
            .core()
            .events()
            .events()
            .iter()
            .map(|e| format!("{} {} {}", e.seq, e.kind, e.message).trim_end().to_string())
            .collect(),
    })
}
