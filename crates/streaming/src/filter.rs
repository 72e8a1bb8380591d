use std::collections::HashSet;

use crate::record::{CompositeKey, FeatureRecord};

/// Records of `candidates` whose projection onto `key_fields` does not occur
/// in `exclude`.
///
/// Output order follows `candidates`. A record lacking any key field has no
/// key: it is never dropped and never causes a drop.
pub fn difference<S: AsRef<str>>(
    candidates: &[FeatureRecord],
    exclude: &[FeatureRecord],
    key_fields: &[S],
) -> Vec<FeatureRecord> {
    let excluded: HashSet<CompositeKey> = exclude
        .iter()
        .filter_map(|r| r.composite_key(key_fields))
        .collect();

    if excluded.is_empty() {
        return candidates.to_vec();
    }

    candidates
        .iter()
        .filter(|r| match r.composite_key(key_fields) {
            Some(key) => !excluded.contains(&key),
            None => true,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::difference;
    use crate::record::{Attributes, FeatureRecord, Scalar};
    use foundation::{Geometry, Point, SpatialReference};

    fn rec(id: i64, name: &str) -> FeatureRecord {
        let mut attributes = Attributes::new();
        attributes.insert("id".into(), Scalar::Int(id));
        attributes.insert("name".into(), Scalar::from(name));
        FeatureRecord::new(
            id.to_string(),
            Geometry::Point(Point::new(id as f64, 0.0, SpatialReference::WGS84)),
            attributes,
        )
    }

    fn ids(records: &[FeatureRecord]) -> Vec<&str> {
        records.iter().map(|r| r.identity_key.as_str()).collect()
    }

    #[test]
    fn strips_local_records_from_surrounding() {
        let local = vec![rec(1, "a"), rec(2, "b")];
        let surrounding = vec![rec(2, "b"), rec(3, "c")];
        let out = difference(&surrounding, &local, &["id"]);
        assert_eq!(ids(&out), vec!["3"]);
    }

    #[test]
    fn preserves_candidate_order() {
        let exclude = vec![rec(4, "d")];
        let candidates = vec![rec(9, "i"), rec(4, "d"), rec(1, "a"), rec(7, "g")];
        let out = difference(&candidates, &exclude, &["id"]);
        assert_eq!(ids(&out), vec!["9", "1", "7"]);
    }

    #[test]
    fn composite_keys_need_every_field_to_match() {
        let exclude = vec![rec(1, "a")];
        let candidates = vec![rec(1, "renamed"), rec(1, "a")];
        let out = difference(&candidates, &exclude, &["id", "name"]);
        assert_eq!(ids(&out), vec!["1"]);
        assert_eq!(out[0].attribute("name"), Some(&Scalar::from("renamed")));
    }

    #[test]
    fn records_without_key_are_kept() {
        let mut keyless = rec(5, "e");
        keyless.attributes.remove("id");
        let exclude = vec![keyless.clone(), rec(6, "f")];
        let candidates = vec![keyless, rec(6, "f")];
        let out = difference(&candidates, &exclude, &["id"]);
        assert_eq!(ids(&out), vec!["5"]);
    }

    #[test]
    fn no_candidate_matching_exclusion_survives() {
        // Every pairing of a small id range: the output is exactly the
        // candidates whose id is absent from the exclusion set.
        for mask_a in 0u8..16 {
            for mask_b in 0u8..16 {
                let a: Vec<_> = (0..4).filter(|i| mask_a & (1 << i) != 0).map(|i| rec(i, "x")).collect();
                let b: Vec<_> = (0..4).filter(|i| mask_b & (1 << i) != 0).map(|i| rec(i, "x")).collect();
                let out = difference(&b, &a, &["id"]);
                let expected: Vec<_> = b
                    .iter()
                    .filter(|r| !a.iter().any(|x| x.identity_key == r.identity_key))
                    .cloned()
                    .collect();
                assert_eq!(out, expected);
            }
        }
    }
}
