use std::collections::BTreeSet;

use crate::protocol::RawFeature;
use crate::record::{Attributes, FeatureRecord, Scalar};

/// Converts raw service features into canonical records for one feature type.
pub trait RecordMapper: Send + Sync {
    /// Fields whose projection identifies a real-world feature across the
    /// local and surrounding sets.
    fn key_fields(&self) -> &[String];

    /// `None` drops the feature as malformed.
    fn map_feature(&self, feature: &RawFeature) -> Option<FeatureRecord>;
}

/// Render a scalar as an identity key. Integral floats print as integers so
/// the key of `1.0` matches the key of `1`.
pub fn identity_string(value: &Scalar) -> Option<String> {
    match value {
        Scalar::Null => None,
        Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Scalar::Float(f) if !f.is_finite() => None,
        other => Some(other.to_string()),
    }
}

/// Attribute-copying mapper keyed on a single identity field.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    identity_field: String,
    key_fields: Vec<String>,
    allow: Option<BTreeSet<String>>,
    constants: Attributes,
}

impl FieldMapper {
    pub fn new(identity_field: impl Into<String>) -> Self {
        let identity_field = identity_field.into();
        Self {
            key_fields: vec![identity_field.clone()],
            identity_field,
            allow: None,
            constants: Attributes::new(),
        }
    }

    /// Copy only these fields (the identity field is always copied).
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Attribute set on every record, overriding a service value of the same name.
    pub fn with_constant(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.constants.insert(field.into(), value.into());
        self
    }

    /// Override the dedup key fields (defaults to the identity field).
    pub fn with_key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl RecordMapper for FieldMapper {
    fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    fn map_feature(&self, feature: &RawFeature) -> Option<FeatureRecord> {
        let geometry = feature.geometry.clone()?;
        let identity = Scalar::from_json(feature.attribute(&self.identity_field)?)?;
        let identity_key = identity_string(&identity)?;

        let mut attributes = Attributes::new();
        for (name, value) in &feature.attributes {
            let allowed = name == &self.identity_field
                || self.allow.as_ref().is_none_or(|allow| allow.contains(name));
            if !allowed {
                continue;
            }
            if let Some(scalar) = Scalar::from_json(value) {
                attributes.insert(name.clone(), scalar);
            }
        }
        for (name, value) in &self.constants {
            attributes.insert(name.clone(), value.clone());
        }

        Some(FeatureRecord::new(identity_key, geometry, attributes))
    }
}
