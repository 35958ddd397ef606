//! Minimal ESRI shapefile reader for vantage polylines.
//!
//! Only the `.shp` main file is read. The first PolyLine, PolyLineZ or
//! PolyLineM record is returned with all its parts concatenated in order.

use std::path::Path;

use glam::DVec3;

use crate::error::{Error, Result};

const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;

const SHAPE_NULL: i32 = 0;
const SHAPE_POLYLINE: i32 = 3;
const SHAPE_POLYLINE_Z: i32 = 13;
const SHAPE_POLYLINE_M: i32 = 23;

/// Read the vertices of the first polyline in a shapefile.
pub(super) fn read_polyline(path: &Path) -> Result<Vec<DVec3>> {
    let data = std::fs::read(path).map_err(|e| Error::io("read", path, e))?;
    parse_polyline(&data).map_err(|detail| Error::import(path, detail))
}

fn parse_polyline(data: &[u8]) -> std::result::Result<Vec<DVec3>, String> {
    if data.len() < HEADER_LEN {
        return Err(format!("header needs {HEADER_LEN} bytes, got {}", data.len()));
    }
    let code = be_i32(data, 0)?;
    if code != FILE_CODE {
        return Err(format!("bad file code {code}"));
    }

    let mut offset = HEADER_LEN;
    while offset + RECORD_HEADER_LEN <= data.len() {
        // Content length is counted in 16-bit words.
        let words = usize::try_from(be_i32(data, offset + 4)?)
            .map_err(|_| "negative record length".to_owned())?;
        let start = offset + RECORD_HEADER_LEN;
        let end = start + words * 2;
        let record = data
            .get(start..end)
            .ok_or_else(|| format!("record at {offset} runs past end of file"))?;
        offset = end;

        match le_i32(record, 0)? {
            SHAPE_NULL => continue,
            SHAPE_POLYLINE | SHAPE_POLYLINE_M => return polyline_points(record, false),
            SHAPE_POLYLINE_Z => return polyline_points(record, true),
            other => return Err(format!("unsupported shape type {other}")),
        }
    }
    Err("no polyline records".to_owned())
}

/// Points of a polyline record, starting at its shape type.
fn polyline_points(record: &[u8], has_z: bool) -> std::result::Result<Vec<DVec3>, String> {
    // Shape type (4) + bounding box (32).
    let num_parts = count(le_i32(record, 36)?)?;
    let num_points = count(le_i32(record, 40)?)?;
    let points_start = num_parts
        .checked_mul(4)
        .and_then(|parts| parts.checked_add(44))
        .ok_or_else(|| format!("part count {num_parts} out of range"))?;
    // XY pairs, then the Z range and Z values.
    let needed = num_points
        .checked_mul(if has_z { 24 } else { 16 })
        .and_then(|len| len.checked_add(if has_z { 16 } else { 0 }))
        .and_then(|len| len.checked_add(points_start))
        .ok_or_else(|| format!("point count {num_points} out of range"))?;
    if needed > record.len() {
        return Err(format!(
            "{num_points} points need {needed} bytes, record holds {}",
            record.len()
        ));
    }

    let mut points = Vec::with_capacity(num_points);
    for i in 0..num_points {
        let at = points_start + i * 16;
        points.push(DVec3::new(le_f64(record, at)?, le_f64(record, at + 8)?, 0.0));
    }

    if has_z {
        // Z range (16) precedes the Z values.
        let z_start = points_start + num_points * 16 + 16;
        for (i, point) in points.iter_mut().enumerate() {
            point.z = le_f64(record, z_start + i * 8)?;
        }
    }
    Ok(points)
}

fn count(value: i32) -> std::result::Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("negative count {value}"))
}

fn bytes<const N: usize>(data: &[u8], at: usize) -> std::result::Result<[u8; N], String> {
    at.checked_add(N)
        .and_then(|end| data.get(at..end))
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| format!("unexpected end of record at byte {at}"))
}

fn be_i32(data: &[u8], at: usize) -> std::result::Result<i32, String> {
    bytes(data, at).map(i32::from_be_bytes)
}

fn le_i32(data: &[u8], at: usize) -> std::result::Result<i32, String> {
    bytes(data, at).map(i32::from_le_bytes)
}

fn le_f64(data: &[u8], at: usize) -> std::result::Result<f64, String> {
    bytes(data, at).map(f64::from_le_bytes)
}

/// Encode a single-record polyline shapefile.
#[cfg(test)]
pub(crate) fn encode_polyline(points: &[DVec3], with_z: bool) -> Vec<u8> {
    let mut content = Vec::new();
    let shape = if with_z { SHAPE_POLYLINE_Z } else { SHAPE_POLYLINE };
    content.extend_from_slice(&shape.to_le_bytes());
    content.extend_from_slice(&[0u8; 32]);
    content.extend_from_slice(&1i32.to_le_bytes());
    content.extend_from_slice(&i32::try_from(points.len()).unwrap().to_le_bytes());
    content.extend_from_slice(&0i32.to_le_bytes());
    for p in points {
        content.extend_from_slice(&p.x.to_le_bytes());
        content.extend_from_slice(&p.y.to_le_bytes());
    }
    if with_z {
        content.extend_from_slice(&[0u8; 16]);
        for p in points {
            content.extend_from_slice(&p.z.to_le_bytes());
        }
    }

    let mut data = vec![0u8; HEADER_LEN];
    data[0..4].copy_from_slice(&FILE_CODE.to_be_bytes());
    data[32..36].copy_from_slice(&shape.to_le_bytes());
    data.extend_from_slice(&1i32.to_be_bytes());
    data.extend_from_slice(&i32::try_from(content.len() / 2).unwrap().to_be_bytes());
    data.extend_from_slice(&content);
    let words = i32::try_from(data.len() / 2).unwrap();
    data[24..28].copy_from_slice(&words.to_be_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polyline_2d() {
        let line = [DVec3::new(1.0, 2.0, 0.0), DVec3::new(3.0, 4.0, 0.0)];
        let data = encode_polyline(&line, false);
        assert_eq!(parse_polyline(&data).unwrap(), line);
    }

    #[test]
    fn test_parse_polyline_z() {
        let line = [
            DVec3::new(10.0, 20.0, 30.0),
            DVec3::new(11.0, 21.0, 31.0),
            DVec3::new(12.0, 22.0, 32.0),
        ];
        let data = encode_polyline(&line, true);
        assert_eq!(parse_polyline(&data).unwrap(), line);
    }

    #[test]
    fn test_parse_single_vertex() {
        let data = encode_polyline(&[DVec3::ONE], true);
        assert_eq!(parse_polyline(&data).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_polyline(&[0u8; 10]).is_err());
        assert!(parse_polyline(&[0u8; 100]).is_err());

        let mut data = encode_polyline(&[DVec3::ZERO, DVec3::ONE], false);
        data.truncate(data.len() - 4);
        assert!(parse_polyline(&data).is_err());
    }

    // File header (100) + record header (8) + count offsets within the record.
    const NUM_PARTS_AT: usize = HEADER_LEN + RECORD_HEADER_LEN + 36;
    const NUM_POINTS_AT: usize = HEADER_LEN + RECORD_HEADER_LEN + 40;

    #[test]
    fn test_parse_rejects_oversized_point_count() {
        for with_z in [false, true] {
            let mut data = encode_polyline(&[DVec3::ZERO, DVec3::ONE], with_z);
            data[NUM_POINTS_AT..NUM_POINTS_AT + 4].copy_from_slice(&i32::MAX.to_le_bytes());
            assert!(parse_polyline(&data).is_err());
        }
    }

    #[test]
    fn test_parse_rejects_point_count_one_past_record() {
        let mut data = encode_polyline(&[DVec3::ZERO, DVec3::ONE], true);
        data[NUM_POINTS_AT..NUM_POINTS_AT + 4].copy_from_slice(&3i32.to_le_bytes());
        assert!(parse_polyline(&data).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_part_count() {
        let mut data = encode_polyline(&[DVec3::ZERO, DVec3::ONE], false);
        data[NUM_PARTS_AT..NUM_PARTS_AT + 4].copy_from_slice(&i32::MAX.to_le_bytes());
        assert!(parse_polyline(&data).is_err());
    }
}
