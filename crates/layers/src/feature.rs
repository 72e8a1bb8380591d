use std::collections::BTreeSet;

use streaming::FeatureRecord;

use crate::layer::{Layer, LayerId};

/// Base layer holding the records drawn for one feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayer {
    id: LayerId,
    records: Vec<FeatureRecord>,
    keys: BTreeSet<String>,
    revision: u64,
}

impl FeatureLayer {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            records: Vec::new(),
            keys: BTreeSet::new(),
            revision: 0,
        }
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every replacement that changed the displayed key set.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains_key(&self, identity_key: &str) -> bool {
        self.keys.contains(identity_key)
    }

    /// Atomically replace the displayed records.
    ///
    /// Returns `false` without touching the layer when `records` carries the
    /// same identity-key set as what is displayed.
    pub fn apply_records(&mut self, records: Vec<FeatureRecord>) -> bool {
        let keys: BTreeSet<String> = records.iter().map(|r| r.identity_key.clone()).collect();
        if keys == self.keys && records.len() == self.records.len() {
            return false;
        }
        self.records = records;
        self.keys = keys;
        self.revision += 1;
        tracing::trace!(layer = %self.id, count = self.records.len(), revision = self.revision, "features replaced");
        true
    }
}

impl Layer for FeatureLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureLayer;
    use crate::layer::LayerId;
    use foundation::{Geometry, Point, SpatialReference};
    use streaming::FeatureRecord;

    fn rec(key: &str, x: f64) -> FeatureRecord {
        FeatureRecord::new(
            key,
            Geometry::Point(Point::new(x, 0.0, SpatialReference::WGS84)),
            Default::default(),
        )
    }

    #[test]
    fn unchanged_key_set_is_a_no_op() {
        let mut layer = FeatureLayer::new(LayerId::new("t"));
        assert!(layer.apply_records(vec![rec("a", 0.0), rec("b", 1.0)]));
        assert_eq!(layer.revision(), 1);

        // Same keys, different order and geometry: nothing to redraw.
        assert!(!layer.apply_records(vec![rec("b", 5.0), rec("a", 6.0)]));
        assert_eq!(layer.revision(), 1);
        assert_eq!(layer.records()[0].identity_key, "a");

        assert!(layer.apply_records(vec![rec("a", 0.0)]));
        assert_eq!(layer.revision(), 2);
        assert!(!layer.contains_key("b"));
    }

    #[test]
    fn clearing_is_a_change() {
        let mut layer = FeatureLayer::new(LayerId::new("t"));
        assert!(!layer.apply_records(vec![]));
        assert!(layer.apply_records(vec![rec("a", 0.0)]));
        assert!(layer.apply_records(vec![]));
        assert!(layer.is_empty());
    }
}
