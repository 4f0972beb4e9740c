//! Vector features with a layer-level field schema

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Declared type of a layer field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Integer,
    Real,
    String,
}

/// One column of a layer schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            width: None,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: BTreeMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// A layer: features plus the fields every feature carries
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub fields: Vec<FieldDef>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Add a field to the schema. Existing features get a null value for it
    /// unless they already carry the property. Returns false when a field of
    /// that name already exists.
    pub fn create_field(&mut self, field: FieldDef) -> bool {
        if self.field(&field.name).is_some() {
            return false;
        }
        for feature in &mut self.features {
            feature
                .properties
                .entry(field.name.clone())
                .or_insert(AttributeValue::Null);
        }
        self.fields.push(field);
        true
    }
}

impl From<Geometry<f64>> for FeatureCollection {
    fn from(geometry: Geometry<f64>) -> Self {
        Self {
            fields: Vec::new(),
            features: vec![Feature::new(geometry)],
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn create_field_nulls_existing_features() {
        let mut layer = FeatureCollection::new();
        layer.push(Feature::new(point!(x: 1.0, y: 2.0)));
        layer.push(Feature::new(point!(x: 3.0, y: 4.0)));

        assert!(layer.create_field(FieldDef::new("Area", FieldKind::Real).with_width(32)));
        assert!(!layer.create_field(FieldDef::new("Area", FieldKind::Real)));

        assert_eq!(layer.fields.len(), 1);
        assert_eq!(layer.field("Area").unwrap().width, Some(32));
        for feature in layer.iter() {
            assert_eq!(feature.get_property("Area"), Some(&AttributeValue::Null));
        }
    }
}
