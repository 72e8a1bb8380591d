use foundation::{Point, Polygon};
use streaming::FeatureRecord;

use crate::feature::FeatureLayer;
use crate::layer::{Layer, LayerId, LayerNode};
use crate::mask::{BlendMode, MaskGraphic, MaskStack, SurroundingVisibility};

/// Layer tree for one feature type: features gated by a boundary mask and a
/// toggleable surrounding mask.
///
/// The surrounding opacity is derived from the [`SurroundingVisibility`]
/// state, so the only way to change it is to change the state.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundariesToggleLayer {
    id: LayerId,
    features: FeatureLayer,
    mask: MaskStack,
    visibility: SurroundingVisibility,
    visible_opacity: f64,
    boundary: Option<Polygon>,
}

impl BoundariesToggleLayer {
    pub fn new(id: LayerId, visible_opacity: f64) -> Self {
        Self {
            features: FeatureLayer::new(id.child("features")),
            mask: MaskStack::new(id.child("mask")),
            visibility: SurroundingVisibility::Hidden,
            visible_opacity,
            boundary: None,
            id,
        }
    }

    pub fn features(&self) -> &FeatureLayer {
        &self.features
    }

    pub fn mask(&self) -> &MaskStack {
        &self.mask
    }

    pub fn boundary(&self) -> Option<&Polygon> {
        self.boundary.as_ref()
    }

    pub fn visibility(&self) -> SurroundingVisibility {
        self.visibility
    }

    pub fn surrounding_opacity(&self) -> f64 {
        self.mask.toggleable.opacity()
    }

    /// Replace the drawn records; `false` when the key set is unchanged.
    pub fn apply_records(&mut self, records: Vec<FeatureRecord>) -> bool {
        self.features.apply_records(records)
    }

    pub fn set_always_visible_boundary(&mut self, boundary: Option<Polygon>) {
        let graphics = boundary
            .iter()
            .cloned()
            .map(MaskGraphic::Area)
            .collect();
        self.mask.always_visible.set_graphics(graphics);
        self.boundary = boundary;
    }

    pub fn set_surrounding_visibility(&mut self, visibility: SurroundingVisibility) {
        self.visibility = visibility;
        self.mask
            .toggleable
            .set_opacity(visibility.opacity(self.visible_opacity));
        tracing::debug!(
            layer = %self.id,
            ?visibility,
            opacity = self.surrounding_opacity(),
            "surrounding visibility set"
        );
    }

    pub fn coverage_at(&self, point: &Point) -> f64 {
        self.mask.coverage_at(point)
    }

    /// Records whose anchor is not fully masked out.
    pub fn visible_records(&self) -> Vec<&FeatureRecord> {
        self.features
            .records()
            .iter()
            .filter(|r| {
                r.geometry
                    .anchor()
                    .is_some_and(|p| self.coverage_at(&p) > 0.0)
            })
            .collect()
    }

    pub fn tree(&self) -> LayerNode {
        let graphics = |layer: &crate::mask::GraphicsLayer| LayerNode::Graphics {
            id: layer.id().clone(),
            opacity: layer.opacity(),
            graphic_count: layer.graphics().len(),
        };
        LayerNode::Group {
            id: self.id.clone(),
            blend_mode: BlendMode::Normal,
            children: vec![
                LayerNode::Features {
                    id: self.features.id().clone(),
                    feature_count: self.features.len(),
                    revision: self.features.revision(),
                },
                LayerNode::Group {
                    id: self.mask.id.clone(),
                    blend_mode: self.mask.blend_mode,
                    children: vec![
                        graphics(&self.mask.toggleable),
                        graphics(&self.mask.always_visible),
                    ],
                },
            ],
        }
    }
}

impl Layer for BoundariesToggleLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }
}
