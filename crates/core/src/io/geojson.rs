//! GeoJSON layers
//!
//! A layer is a FeatureCollection. Its field schema is kept in a `fields`
//! foreign member so that schema changes survive a write/read cycle.

use crate::error::Result;
use crate::vector::{AttributeValue, Feature, FeatureCollection, FieldDef};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const FIELDS_MEMBER: &str = "fields";

/// Read a GeoJSON file as a layer.
///
/// A bare Feature or Geometry document is read as a one-feature layer.
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_features(&text)
}

/// Parse GeoJSON text as a layer
pub fn parse_features(text: &str) -> Result<FeatureCollection> {
    let doc: GeoJson = text.parse()?;

    match doc {
        GeoJson::FeatureCollection(fc) => {
            let fields = match fc
                .foreign_members
                .as_ref()
                .and_then(|m| m.get(FIELDS_MEMBER))
            {
                Some(value) => serde_json::from_value::<Vec<FieldDef>>(value.clone())?,
                None => Vec::new(),
            };

            let features = fc
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<Result<Vec<_>>>()?;

            Ok(FeatureCollection { fields, features })
        }
        GeoJson::Feature(f) => Ok(FeatureCollection {
            fields: Vec::new(),
            features: vec![convert_feature(f)?],
        }),
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g)?;
            Ok(FeatureCollection {
                fields: Vec::new(),
                features: vec![Feature::new(geometry)],
            })
        }
    }
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = f
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;

    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = f.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        // Non-finite floats have no JSON form
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Write a layer as a GeoJSON FeatureCollection, replacing any existing file
pub fn write_features<P: AsRef<Path>>(layer: &FeatureCollection, path: P) -> Result<()> {
    let collection = to_geojson(layer)?;
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

fn to_geojson(layer: &FeatureCollection) -> Result<geojson::FeatureCollection> {
    let features = layer
        .features
        .iter()
        .map(|feature| {
            let properties: JsonObject = feature
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect();

            geojson::Feature {
                bbox: None,
                geometry: feature
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: feature.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = if layer.fields.is_empty() {
        None
    } else {
        let mut members = JsonObject::new();
        members.insert(FIELDS_MEMBER.to_string(), serde_json::to_value(&layer.fields)?);
        Some(members)
    };

    Ok(geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
}
