use std::collections::BTreeMap;

use foundation::Geometry;
use serde::{Deserialize, Serialize};

/// Attribute value as delivered by a feature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON leaf. Arrays and objects are not scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        use serde_json::Value;
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Hashable form used for identity comparisons.
    ///
    /// Integral floats collapse onto the matching integer so `1` and `1.0`
    /// identify the same feature.
    pub fn key_part(&self) -> KeyPart {
        match self {
            Scalar::Null => KeyPart::Null,
            Scalar::Bool(b) => KeyPart::Bool(*b),
            Scalar::Int(i) => KeyPart::Int(*i),
            Scalar::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    KeyPart::Int(*f as i64)
                } else {
                    KeyPart::Float(f.to_bits())
                }
            }
            Scalar::Text(s) => KeyPart::Text(s.clone()),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

/// Projection of a record onto a list of key fields.
pub type CompositeKey = Vec<KeyPart>;

pub type Attributes = BTreeMap<String, Scalar>;

/// Canonical feature as held by a data set and drawn by a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub identity_key: String,
    pub geometry: Geometry,
    pub attributes: Attributes,
}

impl FeatureRecord {
    pub fn new(identity_key: impl Into<String>, geometry: Geometry, attributes: Attributes) -> Self {
        Self {
            identity_key: identity_key.into(),
            geometry,
            attributes,
        }
    }

    pub fn attribute(&self, field: &str) -> Option<&Scalar> {
        self.attributes.get(field)
    }

    /// `None` if any of `fields` is missing from the record.
    pub fn composite_key<S: AsRef<str>>(&self, fields: &[S]) -> Option<CompositeKey> {
        fields
            .iter()
            .map(|f| self.attributes.get(f.as_ref()).map(Scalar::key_part))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Attributes, FeatureRecord, KeyPart, Scalar};
    use foundation::{Geometry, Point, SpatialReference};
    use serde_json::json;

    fn record(attrs: &[(&str, Scalar)]) -> FeatureRecord {
        let attributes: Attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        FeatureRecord::new(
            "k",
            Geometry::Point(Point::new(0.0, 0.0, SpatialReference::WGS84)),
            attributes,
        )
    }

    #[test]
    fn integral_floats_match_integers() {
        assert_eq!(Scalar::Float(7.0).key_part(), KeyPart::Int(7));
        assert_ne!(Scalar::Float(7.5).key_part(), KeyPart::Int(7));
        assert_eq!(Scalar::from(7).key_part(), KeyPart::Int(7));
    }

    #[test]
    fn json_leaves_convert() {
        assert_eq!(Scalar::from_json(&json!(3)), Some(Scalar::Int(3)));
        assert_eq!(Scalar::from_json(&json!(0.25)), Some(Scalar::Float(0.25)));
        assert_eq!(Scalar::from_json(&json!("x")), Some(Scalar::from("x")));
        assert_eq!(Scalar::from_json(&json!(null)), Some(Scalar::Null));
        assert_eq!(Scalar::from_json(&json!([1])), None);
    }

    #[test]
    fn composite_key_requires_every_field() {
        let r = record(&[("FID", Scalar::Int(1)), ("NAME", Scalar::from("Lake"))]);
        assert_eq!(
            r.composite_key(&["FID", "NAME"]),
            Some(vec![KeyPart::Int(1), KeyPart::Text("Lake".into())])
        );
        assert_eq!(r.composite_key(&["FID", "OTHER"]), None);
    }
}
