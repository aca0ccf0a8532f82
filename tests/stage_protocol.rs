use std::io::Cursor;

use kmeans_mr::stage::shuffle::sort_lines;
use kmeans_mr::stage::stream::{map_stream, parse_assignment_line, reduce_stream};
use kmeans_mr::stage::{aggregate, assign, map_all};
use kmeans_mr::{seed, KmError, MeanReducer, NearestCentroid, Parallelism, Point, Stage};

fn run_map(input: &str, centroids: &[Point]) -> Vec<String> {
  let mut out = Vec::new();
  map_stream(Cursor::new(input), &mut out, centroids).unwrap();
  String::from_utf8(out)
    .unwrap()
    .lines()
    .map(str::to_string)
    .collect()
}

fn run_reduce(input: &str) -> Vec<(usize, Point)> {
  let mut out = Vec::new();
  reduce_stream(Cursor::new(input), &mut out).unwrap();
  String::from_utf8(out)
    .unwrap()
    .lines()
    .map(|line| {
      let pair = parse_assignment_line(line).unwrap();
      (pair.cluster, pair.point)
    })
    .collect()
}

#[test]
fn streamed_pipeline_matches_in_process_round() {
  let points = seed::generate_points(300, 100, 1000, Some(42)).unwrap();
  let centroids = seed::random_centroids(4, 100, 1000, Some(123)).unwrap();
  let input = seed::format_points(&points);

  let mut lines = run_map(&input, &centroids);
  assert_eq!(lines.len(), points.len());
  sort_lines(&mut lines);
  let reduced = run_reduce(&(lines.join("\n") + "\n"));

  let partitions = assign(&NearestCentroid::default(), &points, &centroids).unwrap();
  let expected = aggregate(&MeanReducer, &partitions, &centroids).unwrap();

  let non_empty: Vec<usize> = partitions
    .iter()
    .filter(|(_, pts)| !pts.is_empty())
    .map(|(id, _)| id)
    .collect();
  assert_eq!(
    reduced.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
    non_empty
  );
  for (id, centroid) in reduced {
    assert!((centroid.x - expected[id].x).abs() <= 1e-6);
    assert!((centroid.y - expected[id].y).abs() <= 1e-6);
  }
}

#[test]
fn map_stream_uses_smaller_id_on_ties() {
  let centroids = [Point::new(0.0, 0.0), Point::new(2.0, 0.0)];
  let lines = run_map("1,0\n1.5,0\n", &centroids);
  assert_eq!(lines, vec!["0\t1,0", "1\t1.5,0"]);
}

#[test]
fn reduce_stream_rejects_ungrouped_input() {
  let mut out = Vec::new();
  let err = reduce_stream(Cursor::new("0\t1,1\n1\t2,2\n0\t3,3\n"), &mut out).unwrap_err();
  assert!(matches!(
    err,
    KmError::StageFailure {
      stage: Stage::Aggregation,
      ..
    }
  ));
}

#[test]
fn every_parallelism_mode_assigns_identically() {
  let points = seed::generate_points(2000, 100, 1000, Some(5)).unwrap();
  let centroids = seed::random_centroids(6, 100, 1000, Some(6)).unwrap();

  let sequential = map_all(
    &NearestCentroid::new(Parallelism::Sequential),
    &points,
    &centroids,
  )
  .unwrap();
  for parallelism in [
    Parallelism::Rayon,
    Parallelism::Workers(1),
    Parallelism::Workers(4),
  ] {
    let pairs = map_all(&NearestCentroid::new(parallelism), &points, &centroids).unwrap();
    assert_eq!(pairs, sequential, "{parallelism:?}");
  }
}
