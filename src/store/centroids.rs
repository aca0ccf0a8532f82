//! Centroid file store.
//!
//! Three line encodings are accepted on read:
//!
//! - `"<id>\t<x>,<y>"` (aggregation stage output)
//! - `"<id>,<x>,<y>"` (store output, extra trailing fields ignored)
//! - `"<x>,<y>"`
//!
//! Centroids are returned in line order; the position in the returned sequence
//! is the centroid id. Writes always use `"<id>,<x>,<y>"` with six decimals and
//! are published atomically.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::fs::write_atomic;
use super::lines::decoded_lines;
use super::points::parse_coord;
use crate::constants::COORD_PRECISION;
use crate::error::{KmError, Result};
use crate::types::Point;

fn parse_id(field: &str, line: &str) -> Result<usize> {
  field
    .trim()
    .parse()
    .map_err(|e| KmError::parse(line, format!("invalid centroid id {field:?}: {e}")))
}

/// Parse one centroid line. Blank lines yield `Ok(None)`.
pub fn parse_centroid_line(line: &str) -> Result<Option<Point>> {
  let trimmed = line.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }

  if trimmed.contains('\t') {
    let mut parts = trimmed.split('\t');
    let (id, coords) = match (parts.next(), parts.next(), parts.next()) {
      (Some(id), Some(coords), None) => (id, coords),
      _ => return Err(KmError::parse(trimmed, "expected \"<id>\\t<x>,<y>\"")),
    };
    parse_id(id, trimmed)?;
    let fields: Vec<&str> = coords.split(',').collect();
    if fields.len() != 2 {
      return Err(KmError::parse(trimmed, "expected \"<x>,<y>\" after tab"));
    }
    return Ok(Some(Point::new(
      parse_coord(fields[0], trimmed)?,
      parse_coord(fields[1], trimmed)?,
    )));
  }

  let fields: Vec<&str> = trimmed.split(',').collect();
  match fields.len() {
    n if n >= 3 => {
      parse_id(fields[0], trimmed)?;
      Ok(Some(Point::new(
        parse_coord(fields[1], trimmed)?,
        parse_coord(fields[2], trimmed)?,
      )))
    }
    2 => Ok(Some(Point::new(
      parse_coord(fields[0], trimmed)?,
      parse_coord(fields[1], trimmed)?,
    ))),
    _ => Err(KmError::parse(trimmed, "unrecognized centroid encoding")),
  }
}

/// Read centroids from a buffered reader, skipping malformed lines
pub fn read_centroids<R: BufRead>(reader: R) -> Result<Vec<Point>> {
  let mut centroids = Vec::new();
  for (idx, line) in decoded_lines(reader).enumerate() {
    match line?.and_then(|line| parse_centroid_line(&line)) {
      Ok(Some(c)) => centroids.push(c),
      Ok(None) => {}
      Err(e) => warn!(line_no = idx + 1, error = %e, "skipping malformed centroid line"),
    }
  }
  Ok(centroids)
}

/// Load centroids from `path`
pub fn load(path: &Path) -> Result<Vec<Point>> {
  if !path.exists() {
    return Err(KmError::NotFound {
      tried: path.display().to_string(),
    });
  }
  let centroids = read_centroids(BufReader::new(File::open(path)?))?;
  debug!(path = %path.display(), count = centroids.len(), "loaded centroids");
  Ok(centroids)
}

/// Load from the first existing path of an explicit, ordered candidate list
pub fn load_first<P: AsRef<Path>>(candidates: &[P]) -> Result<(PathBuf, Vec<Point>)> {
  for candidate in candidates {
    let path = candidate.as_ref();
    if path.exists() {
      return Ok((path.to_path_buf(), load(path)?));
    }
  }
  let tried = candidates
    .iter()
    .map(|p| p.as_ref().display().to_string())
    .collect::<Vec<_>>()
    .join(", ");
  Err(KmError::NotFound { tried })
}

/// Render centroids as `"<id>,<x>,<y>"` lines
pub fn format_centroids(centroids: &[Point]) -> String {
  let mut out = String::with_capacity(centroids.len() * 32);
  for (id, c) in centroids.iter().enumerate() {
    let _ = writeln!(
      out,
      "{id},{:.prec$},{:.prec$}",
      c.x,
      c.y,
      prec = COORD_PRECISION
    );
  }
  out
}

/// Atomically replace the centroid file at `path`
pub fn save(centroids: &[Point], path: &Path) -> Result<()> {
  write_atomic(path, format_centroids(centroids).as_bytes())?;
  debug!(path = %path.display(), count = centroids.len(), "saved centroids");
  Ok(())
}
