//! Wire records for persisted graphics
//!
//! The network protocol and the offline cache both carry graphics as JSON
//! records. Encoding is total; decoding is total but fallible: any malformed
//! or unknown record yields `None` so the caller can skip it and keep loading
//! the rest of the batch.
//!
//! Record shapes:
//!
//! - Stroke: `{id, timestamp, color: [r,g,b], width, zIndex, points: [x0,y0,p0,t0, x1,...]}`
//! - Tombstone: `{id, timestamp, tag: "tombstone"}`
//!
//! One legacy shape is accepted and upgraded: a stroke record with no
//! `zIndex` field decodes onto the pen layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Color, Graphic, Layer, Stroke, StrokePoint, Tombstone};

#[derive(Serialize, Deserialize)]
struct StrokeRecord {
    id: String,
    timestamp: u64,
    color: [f32; 3],
    width: f32,
    #[serde(rename = "zIndex", default, skip_serializing_if = "Option::is_none")]
    z_index: Option<u8>,
    /// Flattened (x, y, pressure, timestamp) quadruples
    points: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct TombstoneRecord {
    id: String,
    timestamp: u64,
    tag: String,
}

const TOMBSTONE_TAG: &str = "tombstone";

/// Encode a graphic as its wire record
pub fn encode(graphic: &Graphic) -> Value {
    match graphic {
        Graphic::Stroke(stroke) => {
            let mut points = Vec::with_capacity(stroke.points().len() * 4);
            for p in stroke.points() {
                points.push(p.x as f64);
                points.push(p.y as f64);
                points.push(p.pressure as f64);
                points.push(p.timestamp as f64);
            }
            let record = StrokeRecord {
                id: stroke.id().to_string(),
                timestamp: stroke.timestamp(),
                color: stroke.color().to_array(),
                width: stroke.width(),
                z_index: Some(stroke.layer().z_index()),
                points,
            };
            serde_json::to_value(record).unwrap_or(Value::Null)
        }
        Graphic::Tombstone(t) => serde_json::to_value(TombstoneRecord {
            id: t.id.clone(),
            timestamp: t.timestamp,
            tag: TOMBSTONE_TAG.to_string(),
        })
        .unwrap_or(Value::Null),
    }
}

/// Decode a wire record; malformed or unknown records yield `None`
pub fn decode(value: &Value) -> Option<Graphic> {
    if let Some(tag) = value.get("tag").and_then(Value::as_str) {
        if tag != TOMBSTONE_TAG {
            tracing::warn!(tag, "dropping record with unknown tag");
            return None;
        }
        let record: TombstoneRecord = serde_json::from_value(value.clone()).ok()?;
        return Some(Graphic::Tombstone(Tombstone::new(
            record.id,
            record.timestamp,
        )));
    }

    let record: StrokeRecord = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(%err, "dropping malformed stroke record");
            return None;
        }
    };
    // Legacy untagged records predate the layer field: upgrade to pen.
    let layer = match record.z_index {
        None => Layer::Pen,
        Some(z) => Layer::from_z_index(z)?,
    };
    if record.points.is_empty() || record.points.len() % 4 != 0 {
        tracing::warn!(id = %record.id, "dropping stroke record with invalid point data");
        return None;
    }
    let mut points = Vec::with_capacity(record.points.len() / 4);
    for quad in record.points.chunks_exact(4) {
        let (x, y, pressure, timestamp) = (quad[0], quad[1], quad[2], quad[3]);
        if !x.is_finite() || !y.is_finite() || !pressure.is_finite() || timestamp < 0.0 {
            tracing::warn!(id = %record.id, "dropping stroke record with non-finite point");
            return None;
        }
        points.push(StrokePoint::new(
            x as f32,
            y as f32,
            (pressure as f32).clamp(0.0, 1.0),
            timestamp as u64,
        ));
    }
    Some(Graphic::Stroke(Stroke::new(
        record.id,
        Color::from_array(record.color),
        record.width,
        layer,
        points,
        record.timestamp,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stroke() -> Stroke {
        Stroke::new(
            "abc-1",
            Color::new(0.2, 0.4, 0.8),
            3.0,
            Layer::Highlighter,
            vec![
                StrokePoint::new(0.0, 0.0, 0.25, 0),
                StrokePoint::new(4.5, -2.0, 0.75, 16),
                StrokePoint::new(9.0, 1.5, 0.5, 32),
            ],
            1234,
        )
    }

    #[test]
    fn test_stroke_round_trip() {
        let original = stroke();
        let decoded = decode(&encode(&Graphic::Stroke(original.clone()))).unwrap();
        let Graphic::Stroke(s) = decoded else {
            panic!("stroke decoded as tombstone");
        };
        assert_eq!(s.id(), original.id());
        assert_eq!(s.timestamp(), original.timestamp());
        assert_eq!(s.color(), original.color());
        assert_eq!(s.width(), original.width());
        assert_eq!(s.layer(), original.layer());
        assert_eq!(s.points(), original.points());
    }

    #[test]
    fn test_tombstone_round_trip() {
        let t = Graphic::Tombstone(Tombstone::new("gone", 99));
        let decoded = decode(&encode(&t)).unwrap();
        let Graphic::Tombstone(d) = decoded else {
            panic!("tombstone decoded as stroke");
        };
        assert_eq!(d.id, "gone");
        assert_eq!(d.timestamp, 99);
    }

    #[test]
    fn test_legacy_record_without_z_index_upgrades_to_pen() {
        let legacy = json!({
            "id": "old-1",
            "timestamp": 50,
            "color": [0.0, 0.0, 0.0],
            "width": 2.0,
            "points": [1.0, 2.0, 0.5, 0.0]
        });
        let Some(Graphic::Stroke(s)) = decode(&legacy) else {
            panic!("legacy record rejected");
        };
        assert_eq!(s.layer(), Layer::Pen);
    }

    #[test]
    fn test_malformed_records_yield_none() {
        assert!(decode(&json!(null)).is_none());
        assert!(decode(&json!({"tag": "polygon", "id": "x", "timestamp": 1})).is_none());
        assert!(decode(&json!({"id": "x"})).is_none());
        // Truncated point quadruples
        assert!(decode(&json!({
            "id": "x", "timestamp": 1, "color": [0,0,0], "width": 1.0,
            "zIndex": 1, "points": [1.0, 2.0, 0.5]
        }))
        .is_none());
        // Empty point list
        assert!(decode(&json!({
            "id": "x", "timestamp": 1, "color": [0,0,0], "width": 1.0,
            "zIndex": 1, "points": []
        }))
        .is_none());
        // Unknown layer index
        assert!(decode(&json!({
            "id": "x", "timestamp": 1, "color": [0,0,0], "width": 1.0,
            "zIndex": 7, "points": [1.0, 2.0, 0.5, 0.0]
        }))
        .is_none());
    }

    #[test]
    fn test_decode_never_panics_on_wrong_types() {
        for v in [
            json!(42),
            json!("stroke"),
            json!({"id": 7, "timestamp": "later"}),
            json!({"tag": "tombstone", "id": "x"}),
            json!({"id": "x", "timestamp": 1, "color": "red", "width": 1.0, "points": [0,0,0,0]}),
        ] {
            assert!(decode(&v).is_none());
        }
    }
}
