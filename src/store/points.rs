//! Point file reader: one `"<x>,<y>"` per line, no header

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use super::lines::decoded_lines;
use crate::error::{KmError, Result};
use crate::types::Point;

pub(crate) fn parse_coord(field: &str, line: &str) -> Result<f64> {
  let value: f64 = field
    .trim()
    .parse()
    .map_err(|e| KmError::parse(line, format!("invalid coordinate {field:?}: {e}")))?;
  if !value.is_finite() {
    return Err(KmError::parse(line, "non-finite coordinate"));
  }
  Ok(value)
}

/// Parse `"<x>,<y>"` (exactly two fields)
pub fn parse_point_line(line: &str) -> Result<Point> {
  let trimmed = line.trim();
  let mut fields = trimmed.split(',');
  match (fields.next(), fields.next(), fields.next()) {
    (Some(x), Some(y), None) => Ok(Point::new(
      parse_coord(x, trimmed)?,
      parse_coord(y, trimmed)?,
    )),
    _ => Err(KmError::parse(trimmed, "expected \"<x>,<y>\"")),
  }
}

/// Read points from any buffered reader, skipping blank and malformed lines
pub fn read_points<R: BufRead>(reader: R) -> Result<Vec<Point>> {
  let mut points = Vec::new();
  for (idx, line) in decoded_lines(reader).enumerate() {
    let parsed = match line? {
      Ok(line) if line.trim().is_empty() => continue,
      Ok(line) => parse_point_line(&line),
      Err(e) => Err(e),
    };
    match parsed {
      Ok(p) => points.push(p),
      Err(e) => warn!(line_no = idx + 1, error = %e, "skipping malformed point line"),
    }
  }
  Ok(points)
}

/// Load the fixed point set
pub fn load_points(path: &Path) -> Result<Vec<Point>> {
  if !path.exists() {
    return Err(KmError::NotFound {
      tried: path.display().to_string(),
    });
  }
  let points = read_points(BufReader::new(File::open(path)?))?;
  debug!(path = %path.display(), count = points.len(), "loaded points");
  Ok(points)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn test_parse_point_line() {
    assert_eq!(parse_point_line("1.5,2").unwrap(), Point::new(1.5, 2.0));
    assert_eq!(parse_point_line("  -3, 4.25 ").unwrap(), Point::new(-3.0, 4.25));
  }

  #[test]
  fn test_parse_point_line_rejects_bad_shapes() {
    assert!(parse_point_line("1,2,3").is_err());
    assert!(parse_point_line("1").is_err());
    assert!(parse_point_line("a,b").is_err());
    assert!(parse_point_line("nan,1").is_err());
  }

  #[test]
  fn test_read_points_skips_garbage() {
    let input = "0,0\n\nnot a point\n10,11\n1,2,3\n";
    let points = read_points(Cursor::new(input)).unwrap();
    assert_eq!(points, vec![Point::new(0.0, 0.0), Point::new(10.0, 11.0)]);
  }

  #[test]
  fn test_read_points_skips_undecodable_line() {
    let input: &[u8] = b"0,0\n0,1\n\xff\xfe,1\n10,10\n10,11\n";
    let points = read_points(Cursor::new(input)).unwrap();
    assert_eq!(points.len(), 4);
    assert_eq!(points[2], Point::new(10.0, 10.0));
  }

  #[test]
  fn test_load_points_missing_file() {
    let result = load_points(Path::new("/definitely/not/here.txt"));
    assert!(matches!(result, Err(KmError::NotFound { .. })));
  }
}
