//! GeoJSON feature collection reader and writer.
//!
//! Geometry goes through geozero in both directions; the collection envelope
//! (properties, legacy `crs` member, `name`) is handled with serde_json.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use geozero::geojson::GeoJson;
use geozero::{ToGeo, ToJson};
use serde_json::{json, Map, Value};

use crate::error::DatasetError;
use crate::models::{Feature, FeatureCollection, Surface};
use crate::projection::Crs;

// Identifier columns the downstream tools reserve for themselves
const RESERVED_ID_KEYS: [&str; 2] = ["fid", "FID"];
const RENAMED_ID_KEY: &str = "fidSrc";

pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, DatasetError> {
    let text = fs::read_to_string(path)?;
    parse_feature_collection(&text)
}

pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection, DatasetError> {
    let root: Value = serde_json::from_str(text)?;
    let kind = root.get("type").and_then(Value::as_str).unwrap_or_default();
    if kind != "FeatureCollection" {
        return Err(DatasetError::NotFeatureCollection(kind.to_string()));
    }

    let crs = match root.pointer("/crs/properties/name").and_then(Value::as_str) {
        Some(name) => Some(name.parse::<Crs>()?),
        None => None,
    };

    let entries: &[Value] = match root.get("features") {
        Some(Value::Array(entries)) => entries.as_slice(),
        None | Some(Value::Null) => &[],
        Some(_) => {
            return Err(DatasetError::NotFeatureCollection(
                "FeatureCollection without a feature array".to_string(),
            ))
        }
    };

    let features = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_feature(index, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureCollection::new(features, crs))
}

fn parse_feature(index: usize, entry: &Value) -> Result<Feature, DatasetError> {
    let attributes = match entry.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(DatasetError::MalformedFeature {
                index,
                reason: format!("properties must be an object, found {other}"),
            })
        }
    };
    let geometry = match entry.get("geometry") {
        None | Some(Value::Null) => None,
        Some(geometry) => Some(parse_surface(index, geometry)?),
    };
    Ok(Feature::new(geometry, attributes))
}

fn parse_surface(index: usize, geometry: &Value) -> Result<Surface, DatasetError> {
    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("<missing>");
    if kind != "Polygon" && kind != "MultiPolygon" {
        return Err(DatasetError::UnsupportedGeometry {
            index,
            kind: kind.to_string(),
        });
    }
    match GeoJson(&geometry.to_string()).to_geo()? {
        geo_types::Geometry::Polygon(polygon) => Ok(Surface::Polygon(polygon)),
        geo_types::Geometry::MultiPolygon(multi) => Ok(Surface::MultiPolygon(multi)),
        other => Err(DatasetError::UnsupportedGeometry {
            index,
            kind: format!("{other:?}"),
        }),
    }
}

/// Attributes as written on export: reserved identifier keys are renamed to
/// `fidSrc` (`fid` wins when both are present).
pub fn export_attributes(attributes: &Map<String, Value>) -> Map<String, Value> {
    let mut exported = Map::new();
    for (key, value) in attributes {
        if !RESERVED_ID_KEYS.contains(&key.as_str()) {
            exported.insert(key.clone(), value.clone());
        }
    }
    for key in RESERVED_ID_KEYS {
        if let Some(value) = attributes.get(key) {
            exported.entry(RENAMED_ID_KEY).or_insert_with(|| value.clone());
        }
    }
    exported
}

fn feature_to_value(feature: &Feature) -> Result<Value, DatasetError> {
    let mut properties = export_attributes(&feature.attributes);
    properties.insert("issues".to_string(), Value::from(feature.issues.to_string()));
    properties.insert("area".to_string(), Value::from(feature.area));
    properties.insert("overlap".to_string(), Value::from(feature.overlap));

    let geometry = match &feature.geometry {
        Some(surface) => serde_json::from_str(&surface.to_geometry().to_json()?)?,
        None => Value::Null,
    };
    Ok(json!({
        "type": "Feature",
        "properties": properties,
        "geometry": geometry,
    }))
}

/// Renders a collection as a GeoJSON value, including the legacy `crs`
/// member when the frame is known.
pub fn to_geojson_value(collection: &FeatureCollection, name: &str) -> Result<Value, DatasetError> {
    let features = collection
        .features
        .iter()
        .map(feature_to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let mut root = Map::new();
    root.insert("type".to_string(), Value::from("FeatureCollection"));
    root.insert("name".to_string(), Value::from(name));
    if let Some(crs) = collection.crs {
        root.insert(
            "crs".to_string(),
            json!({ "type": "name", "properties": { "name": crs.urn() } }),
        );
    }
    root.insert("features".to_string(), Value::Array(features));
    Ok(Value::Object(root))
}

pub fn write_feature_collection(
    path: &Path,
    collection: &FeatureCollection,
    name: &str,
) -> Result<(), DatasetError> {
    let value = to_geojson_value(collection, name)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueCode, Issues};
    use geo::polygon;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32748" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "fid": 7, "use": "residential" },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]] }
            },
            { "type": "Feature", "properties": null, "geometry": null },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0,0],[1,0],[1,1],[0,0]]], [[[5,5],[6,5],[6,6],[5,5]]]]
                }
            }
        ]
    }"#;

    #[test]
    fn reads_crs_properties_and_geometry_kinds() {
        let collection = parse_feature_collection(SAMPLE).unwrap();
        assert_eq!(collection.crs, Some(Crs::epsg(32748)));
        assert_eq!(collection.len(), 3);

        let first = &collection.features[0];
        assert_eq!(first.attributes["use"], "residential");
        let Some(Surface::Polygon(polygon)) = &first.geometry else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.exterior().0.len(), 5);

        assert!(collection.features[1].geometry.is_none());
        assert!(collection.features[1].attributes.is_empty());
        assert!(matches!(
            collection.features[2].geometry,
            Some(Surface::MultiPolygon(ref multi)) if multi.0.len() == 2
        ));
    }

    #[test]
    fn missing_crs_member_means_unknown_frame() {
        let collection = parse_feature_collection(r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert_eq!(collection.crs, None);
        assert!(collection.is_empty());
    }

    #[test]
    fn rejects_non_areal_geometry() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}
        ]}"#;
        let err = parse_feature_collection(text).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnsupportedGeometry { index: 1, ref kind } if kind == "LineString"
        ));
    }

    #[test]
    fn rejects_other_documents() {
        let err = parse_feature_collection(r#"{"type":"Feature","properties":{},"geometry":null}"#).unwrap_err();
        assert!(matches!(err, DatasetError::NotFeatureCollection(ref kind) if kind == "Feature"));
        assert!(matches!(parse_feature_collection("[1, 2"), Err(DatasetError::Json(_))));
    }

    #[test]
    fn reserved_ids_are_renamed() {
        let mut attributes = Map::new();
        attributes.insert("FID".to_string(), Value::from(2));
        attributes.insert("fid".to_string(), Value::from(1));
        attributes.insert("height".to_string(), Value::from(9.5));
        let exported = export_attributes(&attributes);
        assert_eq!(exported.get("fidSrc"), Some(&Value::from(1)));
        assert!(!exported.contains_key("fid") && !exported.contains_key("FID"));
        assert_eq!(exported.get("height"), Some(&Value::from(9.5)));
    }

    #[test]
    fn writer_adds_derived_properties_and_frame() {
        let mut feature = Feature::new(
            Some(Surface::Polygon(polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)])),
            Map::new(),
        );
        feature.issues = [IssueCode::Overlap, IssueCode::SmallArea].into_iter().collect::<Issues>();
        feature.area = 4.0;
        feature.overlap = true;
        let collection = FeatureCollection::new(vec![feature], Some(Crs::WGS84));

        let value = to_geojson_value(&collection, "AB_01_C_Geoflow").unwrap();
        assert_eq!(value["name"], "AB_01_C_Geoflow");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
        let properties = &value["features"][0]["properties"];
        assert_eq!(properties["issues"], "SMALL_AREA;OVERLAP;");
        assert_eq!(properties["area"], 4.0);
        assert_eq!(properties["overlap"], true);
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
    }
}
