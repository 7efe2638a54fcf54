use crate::core::errors::{NavError, Result};
use crate::core::types::Point;
use serde_json::Value;

const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_KEYS: [&str; 3] = ["longitude", "lng", "lon"];

/// Canonicalizes a loosely shaped coordinate object (`lat/lng`, `lat/lon` or
/// `latitude/longitude`) into a validated [`Point`].
pub fn normalize(raw: &Value) -> Result<Point> {
    let object = raw.as_object().ok_or_else(|| {
        NavError::InvalidCoordinate(format!("expected an object, got {}", raw))
    })?;

    let latitude = read_component(object, &LATITUDE_KEYS)?;
    let longitude = read_component(object, &LONGITUDE_KEYS)?;

    Point::new(latitude, longitude)
}

pub fn normalize_json(json: &str) -> Result<Point> {
    let value: Value = serde_json::from_str(json)?;
    normalize(&value)
}

fn read_component(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Result<f64> {
    let (key, value) = keys
        .iter()
        .find_map(|key| object.get(*key).map(|value| (*key, value)))
        .ok_or_else(|| NavError::InvalidCoordinate(format!("missing field, expected one of {:?}", keys)))?;

    value
        .as_f64()
        .ok_or_else(|| NavError::InvalidCoordinate(format!("field '{}' is not numeric: {}", key, value)))
}

/// Decodes a polyline in Google's encoded polyline format with the given
/// precision (5 for most directions APIs).
pub fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<Point>> {
    let factor = 10f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += read_varint(bytes, &mut index)?;
        lon += read_varint(bytes, &mut index)?;
        points.push(Point::new(lat as f64 / factor, lon as f64 / factor)?);
    }

    Ok(points)
}

fn read_varint(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut shift = 0;
    let mut result: i64 = 0;

    loop {
        let byte = *bytes.get(*index).ok_or_else(|| {
            NavError::InvalidCoordinate("truncated encoded polyline".to_string())
        })?;
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(NavError::InvalidCoordinate(format!(
                "invalid polyline character at {}",
                index
            )));
        }
        let chunk = (byte - 63) as i64;
        *index += 1;
        result |= (chunk & 0x1F) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}
