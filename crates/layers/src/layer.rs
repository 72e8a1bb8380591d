use serde::{Deserialize, Serialize};

use crate::mask::BlendMode;

/// Stable, human-readable layer identifier (`cyanWaterbodies-features`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Child id `<self>-<suffix>`.
    pub fn child(&self, suffix: &str) -> LayerId {
        LayerId(format!("{}-{suffix}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait Layer {
    fn id(&self) -> &LayerId;

    fn opacity(&self) -> f64 {
        1.0
    }
}

/// Renderable description of a layer tree, handed to the map component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerNode {
    Group {
        id: LayerId,
        blend_mode: BlendMode,
        children: Vec<LayerNode>,
    },
    Features {
        id: LayerId,
        feature_count: usize,
        revision: u64,
    },
    Graphics {
        id: LayerId,
        opacity: f64,
        graphic_count: usize,
    },
}

impl LayerNode {
    pub fn id(&self) -> &LayerId {
        match self {
            LayerNode::Group { id, .. }
            | LayerNode::Features { id, .. }
            | LayerNode::Graphics { id, .. } => id,
        }
    }

    /// Depth-first lookup by id.
    pub fn find(&self, id: &str) -> Option<&LayerNode> {
        if self.id().as_str() == id {
            return Some(self);
        }
        match self {
            LayerNode::Group { children, .. } => children.iter().find_map(|c| c.find(id)),
            _ => None,
        }
    }
}
