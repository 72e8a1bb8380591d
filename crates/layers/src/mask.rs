//! Mask compositing for the surrounding/boundary split.
//!
//! The mask group is drawn over the feature layer with `DestinationIn`: a
//! feature pixel survives with the alpha of the mask beneath it. The
//! always-visible graphic covers the boundary at full opacity; the toggleable
//! graphic covers the whole world at the surrounding opacity.

use foundation::{Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::layer::{Layer, LayerId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    /// Keep the destination only where the source is drawn.
    DestinationIn,
}

/// Toggle state of the surrounding features.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurroundingVisibility {
    #[default]
    Hidden,
    Shown,
}

impl SurroundingVisibility {
    pub fn toggled(self) -> Self {
        match self {
            SurroundingVisibility::Hidden => SurroundingVisibility::Shown,
            SurroundingVisibility::Shown => SurroundingVisibility::Hidden,
        }
    }

    pub fn opacity(self, visible_opacity: f64) -> f64 {
        match self {
            SurroundingVisibility::Hidden => 0.0,
            SurroundingVisibility::Shown => visible_opacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaskGraphic {
    /// Covers every point.
    World,
    Area(Polygon),
}

impl MaskGraphic {
    pub fn covers(&self, point: &Point) -> bool {
        match self {
            MaskGraphic::World => true,
            MaskGraphic::Area(polygon) => polygon.contains(point),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsLayer {
    id: LayerId,
    opacity: f64,
    graphics: Vec<MaskGraphic>,
}

impl GraphicsLayer {
    pub fn new(id: LayerId, opacity: f64) -> Self {
        Self {
            id,
            opacity,
            graphics: Vec::new(),
        }
    }

    pub fn with_graphic(mut self, graphic: MaskGraphic) -> Self {
        self.graphics.push(graphic);
        self
    }

    pub fn graphics(&self) -> &[MaskGraphic] {
        &self.graphics
    }

    pub fn set_graphics(&mut self, graphics: Vec<MaskGraphic>) {
        self.graphics = graphics;
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Alpha this layer contributes at `point`.
    pub fn alpha_at(&self, point: &Point) -> f64 {
        if self.graphics.iter().any(|g| g.covers(point)) {
            self.opacity
        } else {
            0.0
        }
    }
}

impl Layer for GraphicsLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn opacity(&self) -> f64 {
        self.opacity
    }
}

/// The two mask layers and how they gate the feature layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskStack {
    pub id: LayerId,
    pub blend_mode: BlendMode,
    /// Drawn first: the whole world at the toggle opacity.
    pub toggleable: GraphicsLayer,
    /// Drawn on top: the local boundary, always opaque.
    pub always_visible: GraphicsLayer,
}

impl MaskStack {
    pub fn new(id: LayerId) -> Self {
        Self {
            toggleable: GraphicsLayer::new(id.child("surrounding"), 0.0)
                .with_graphic(MaskGraphic::World),
            always_visible: GraphicsLayer::new(id.child("enclosed"), 1.0),
            blend_mode: BlendMode::DestinationIn,
            id,
        }
    }

    /// Mask alpha at `point` (source-over of the two layers).
    pub fn alpha_at(&self, point: &Point) -> f64 {
        let top = self.always_visible.alpha_at(point);
        let bottom = self.toggleable.alpha_at(point);
        top + bottom * (1.0 - top)
    }

    /// Fraction of a destination pixel left after compositing at `point`.
    pub fn coverage_at(&self, point: &Point) -> f64 {
        match self.blend_mode {
            BlendMode::DestinationIn => self.alpha_at(point),
            BlendMode::Normal => 1.0,
        }
    }
}
