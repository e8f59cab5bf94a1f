//! GeoJSON feature collections via the `geojson` crate.
//!
//! Collections may carry the legacy `crs` member
//! (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32643"}}`)
//! that GDAL and geopandas write for projected data. Without it, coordinates
//! are WGS84 as RFC 7946 requires.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{GeoJson, JsonObject, JsonValue};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Read a GeoJSON file containing a FeatureCollection, a single Feature or
/// a bare Geometry.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let value: JsonValue = serde_json::from_reader(reader)?;
    from_json_value(value)
}

/// Parse GeoJSON text
pub fn feature_collection_from_str(text: &str) -> Result<FeatureCollection> {
    let value: JsonValue = serde_json::from_str(text)?;
    from_json_value(value)
}

fn from_json_value(value: JsonValue) -> Result<FeatureCollection> {
    let crs = match value.get("crs") {
        Some(member) => Some(parse_crs_member(member)?),
        None => Some(CRS::wgs84()),
    };

    let features = match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut collection = FeatureCollection::new(crs);
    for feature in features {
        collection.push(convert_feature(feature)?);
    }
    Ok(collection)
}

fn parse_crs_member(member: &JsonValue) -> Result<CRS> {
    let name = member
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| Error::Vector(format!("unreadable crs member: {}", member)))?;
    // Keep unknown identifiers so that comparisons fail loudly later
    Ok(CRS::from_identifier(name).unwrap_or_else(|| CRS::from_wkt(name)))
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = match feature.geometry {
        Some(g) => Some(geo_types::Geometry::<f64>::try_from(g)?),
        None => None,
    };

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
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
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|f| geojson::Feature {
            bbox: None,
            geometry: f
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: f.id.clone().map(geojson::feature::Id::String),
            properties: Some(
                f.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                    .collect::<JsonObject>(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = collection
        .crs
        .as_ref()
        .filter(|crs| !crs.is_geographic())
        .and_then(|crs| crs.urn())
        .map(|urn| {
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({ "type": "name", "properties": { "name": urn } }),
            );
            members
        });

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Serialize a collection to GeoJSON text
pub fn feature_collection_to_string(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string(&to_geojson(collection))?)
}

/// Write a collection as a GeoJSON FeatureCollection
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &to_geojson(collection))?;
    writer.flush()?;
    Ok(())
}
