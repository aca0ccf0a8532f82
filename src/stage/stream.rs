//! Line protocols of the two stages, for running them as pipeline filters.
//!
//! Assignment: point lines in, `"<id>\t<x>,<y>"` out, one per point.
//! Aggregation: assignment lines grouped contiguously by id in,
//! `"<id>\t<x>,<y>"` (six decimals) out, one per distinct id.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use tracing::warn;

use super::assign::nearest_centroid;
use crate::error::{KmError, Result, Stage};
use crate::geometry::mean;
use crate::store::{decoded_lines, parse_point_line};
use crate::types::{Assignment, ClusterId, Point};

/// Counters reported by a stream stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
  pub records_in: usize,
  pub records_out: usize,
  pub skipped: usize,
}

/// `"<id>\t<x>,<y>"` with coordinates printed as-is
pub fn format_assignment(pair: &Assignment) -> String {
  format!("{}\t{},{}", pair.cluster, pair.point.x, pair.point.y)
}

/// `"<id>\t<x>,<y>"` with six-decimal coordinates
pub fn format_reduced(cluster: ClusterId, centroid: &Point) -> String {
  format!("{cluster}\t{}", centroid.to_fixed())
}

/// Parse one assignment-stage output line
pub fn parse_assignment_line(line: &str) -> Result<Assignment> {
  let trimmed = line.trim();
  let (key, value) = trimmed
    .split_once('\t')
    .ok_or_else(|| KmError::parse(trimmed, "missing tab separator"))?;
  let cluster: ClusterId = key
    .trim()
    .parse()
    .map_err(|e| KmError::parse(trimmed, format!("invalid cluster id: {e}")))?;
  let point = parse_point_line(value)?;
  Ok(Assignment::new(cluster, point))
}

/// Assignment stage over a text stream
pub fn map_stream<R: BufRead, W: Write>(
  input: R,
  mut output: W,
  centroids: &[Point],
) -> Result<StreamStats> {
  if centroids.is_empty() {
    return Err(KmError::stage(Stage::Assignment, "no centroids to assign to"));
  }

  let mut stats = StreamStats::default();
  for (idx, line) in decoded_lines(input).enumerate() {
    let line = line?;
    if matches!(&line, Ok(text) if text.trim().is_empty()) {
      continue;
    }
    stats.records_in += 1;
    let point = match line.and_then(|text| parse_point_line(&text)) {
      Ok(p) => p,
      Err(e) => {
        warn!(line_no = idx + 1, error = %e, "map: skipping malformed point");
        stats.skipped += 1;
        continue;
      }
    };
    let cluster = nearest_centroid(&point, centroids).unwrap_or(0);
    writeln!(output, "{}", format_assignment(&Assignment::new(cluster, point)))?;
    stats.records_out += 1;
  }
  output.flush()?;
  Ok(stats)
}

fn emit_group<W: Write>(cluster: ClusterId, group: &mut Vec<Point>, out: &mut W) -> Result<()> {
  let centroid = mean(group)?;
  writeln!(out, "{}", format_reduced(cluster, &centroid))?;
  group.clear();
  Ok(())
}

/// Aggregation stage over a text stream.
///
/// Input must be grouped by key; a key that reappears after its group closed
/// fails the stage, since its mean would otherwise be split in two.
pub fn reduce_stream<R: BufRead, W: Write>(input: R, mut output: W) -> Result<StreamStats> {
  let mut stats = StreamStats::default();
  let mut current: Option<ClusterId> = None;
  let mut group: Vec<Point> = Vec::new();
  let mut closed: HashSet<ClusterId> = HashSet::new();

  for (idx, line) in decoded_lines(input).enumerate() {
    let line = line?;
    if matches!(&line, Ok(text) if text.trim().is_empty()) {
      continue;
    }
    stats.records_in += 1;
    let pair = match line.and_then(|text| parse_assignment_line(&text)) {
      Ok(p) => p,
      Err(e) => {
        warn!(line_no = idx + 1, error = %e, "reduce: skipping malformed record");
        stats.skipped += 1;
        continue;
      }
    };

    if current != Some(pair.cluster) {
      if closed.contains(&pair.cluster) {
        return Err(KmError::stage(
          Stage::Aggregation,
          format!("input not grouped by key: id {} seen again", pair.cluster),
        ));
      }
      if let Some(prev) = current {
        emit_group(prev, &mut group, &mut output)?;
        closed.insert(prev);
        stats.records_out += 1;
      }
      current = Some(pair.cluster);
    }
    group.push(pair.point);
  }

  if let Some(prev) = current {
    emit_group(prev, &mut group, &mut output)?;
    stats.records_out += 1;
  }
  output.flush()?;
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn test_map_stream() {
    let centroids = [Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
    let input = "0,0\n0,1\nbad\n10,10\n10.5,11\n";
    let mut out = Vec::new();

    let stats = map_stream(Cursor::new(input), &mut out, &centroids).unwrap();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "0\t0,0\n0\t0,1\n1\t10,10\n1\t10.5,11\n"
    );
    assert_eq!(
      stats,
      StreamStats {
        records_in: 5,
        records_out: 4,
        skipped: 1
      }
    );
  }

  #[test]
  fn test_map_stream_skips_undecodable_line() {
    let centroids = [Point::new(0.0, 0.0)];
    let input: &[u8] = b"0,0\n\xff\xfe,1\n0,1\n";
    let mut out = Vec::new();

    let stats = map_stream(Cursor::new(input), &mut out, &centroids).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "0\t0,0\n0\t0,1\n");
    assert_eq!(stats.skipped, 1);
  }

  #[test]
  fn test_reduce_stream_skips_undecodable_line() {
    let input: &[u8] = b"0\t0,0\n0\t\xff,1\n0\t0,1\n";
    let mut out = Vec::new();

    let stats = reduce_stream(Cursor::new(input), &mut out).unwrap();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "0\t0.000000,0.500000\n"
    );
    assert_eq!(stats.skipped, 1);
  }

  #[test]
  fn test_reduce_stream() {
    let input = "0\t0,0\n0\t0,1\n1\t10,10\n1\t10,11\n";
    let mut out = Vec::new();

    let stats = reduce_stream(Cursor::new(input), &mut out).unwrap();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "0\t0.000000,0.500000\n1\t10.000000,10.500000\n"
    );
    assert_eq!(stats.records_out, 2);
  }

  #[test]
  fn test_reduce_stream_skips_missing_ids() {
    // id 1 has no points; nothing is emitted for it
    let input = "0\t1,1\n2\t5,5\n2\t7,7\n";
    let mut out = Vec::new();
    reduce_stream(Cursor::new(input), &mut out).unwrap();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "0\t1.000000,1.000000\n2\t6.000000,6.000000\n"
    );
  }

  #[test]
  fn test_reduce_stream_rejects_ungrouped_input() {
    let input = "0\t1,1\n1\t2,2\n0\t3,3\n";
    let mut out = Vec::new();
    let err = reduce_stream(Cursor::new(input), &mut out).unwrap_err();
    assert!(matches!(
      err,
      KmError::StageFailure {
        stage: Stage::Aggregation,
        ..
      }
    ));
  }

  #[test]
  fn test_parse_assignment_line() {
    let pair = parse_assignment_line("3\t1.5,-2").unwrap();
    assert_eq!(pair, Assignment::new(3, Point::new(1.5, -2.0)));
    assert!(parse_assignment_line("3 1.5,-2").is_err());
    assert!(parse_assignment_line("-1\t1,2").is_err());
  }
}
