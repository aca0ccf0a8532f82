//! kmeans-mr CLI
//!
//! Without a subcommand, runs the iteration controller. The `map` and `reduce`
//! subcommands expose the two stages as stdin/stdout filters, `generate`
//! writes a synthetic point file and initial centroids.
//!
//! Exit codes: 0 when the run converged or hit the iteration cap, 1 on any
//! failure.

use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use kmeans_mr::constants::{
  DEFAULT_CENTROID_SEED, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_COORD_MAX, DEFAULT_COORD_MIN,
  DEFAULT_K, DEFAULT_MAX_ITERATIONS, DEFAULT_POINT_COUNT, DEFAULT_POINT_SEED,
};
use kmeans_mr::stage::stream::{map_stream, reduce_stream};
use kmeans_mr::{
  seed, store, EngineConfig, IterationController, Parallelism, Result, RunPaths, RunReport,
};

/// Iterative k-means clustering on a simulated map/reduce pipeline
#[derive(Parser)]
#[command(name = "kmeans-mr")]
#[command(version)]
#[command(about = "Iterative k-means clustering on a simulated map/reduce pipeline")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
  /// Verbosity: -v echoes the iteration history and logs at debug, -vv at trace
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(flatten)]
  run: RunArgs,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Args)]
struct RunArgs {
  /// Number of clusters
  #[arg(short = 'k', long = "clusters", default_value_t = DEFAULT_K)]
  clusters: usize,

  /// Maximum iterations
  #[arg(short = 'i', long = "iterations", default_value_t = DEFAULT_MAX_ITERATIONS)]
  iterations: usize,

  /// Convergence threshold (max centroid movement)
  #[arg(short = 't', long = "threshold", default_value_t = DEFAULT_CONVERGENCE_THRESHOLD)]
  threshold: f64,

  /// Point file
  #[arg(long, default_value = "data/data_points_1000.txt")]
  points: PathBuf,

  /// Initial centroid file
  #[arg(long, default_value = "data/initial_centroids.txt")]
  initial_centroids: PathBuf,

  /// Directory for the current and final centroid files
  #[arg(long, default_value = "data")]
  work_dir: PathBuf,

  /// Directory for the results artifact and iteration traces
  #[arg(long, default_value = "output")]
  output_dir: PathBuf,

  /// Assignment workers: 0 uses the rayon pool, N > 0 uses N channel workers
  #[arg(long, default_value_t = 0)]
  workers: usize,

  /// Keep each round's stage outputs under <output-dir>/iteration_<n>/
  #[arg(long)]
  trace: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Assignment stage filter: points on stdin, "<id>\t<x>,<y>" on stdout
  Map {
    /// Centroid file; repeat to give fallbacks, the first existing one wins
    #[arg(long = "centroids", required = true)]
    centroids: Vec<PathBuf>,
  },
  /// Aggregation stage filter: key-grouped assignment lines on stdin
  Reduce,
  /// Write a synthetic point file and initial centroids
  Generate(GenerateArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum InitMethod {
  /// Uniform random coordinates in the same range as the points
  Random,
  /// k-means++ selection from the generated points
  KmeansPlusPlus,
}

#[derive(Args)]
struct GenerateArgs {
  /// Number of points
  #[arg(short = 'n', long, default_value_t = DEFAULT_POINT_COUNT)]
  count: usize,

  /// Number of initial centroids
  #[arg(short = 'k', long = "clusters", default_value_t = DEFAULT_K)]
  clusters: usize,

  /// Smallest coordinate
  #[arg(long, default_value_t = DEFAULT_COORD_MIN)]
  min: i64,

  /// Largest coordinate
  #[arg(long, default_value_t = DEFAULT_COORD_MAX)]
  max: i64,

  /// Seed for the points
  #[arg(long, default_value_t = DEFAULT_POINT_SEED)]
  seed: u64,

  /// Seed for the centroids
  #[arg(long, default_value_t = DEFAULT_CENTROID_SEED)]
  centroid_seed: u64,

  /// Centroid initialization
  #[arg(long, value_enum, default_value_t = InitMethod::Random)]
  init: InitMethod,

  /// Point file to write
  #[arg(long, default_value = "data/data_points_1000.txt")]
  points: PathBuf,

  /// Centroid file to write
  #[arg(long, default_value = "data/initial_centroids.txt")]
  initial_centroids: PathBuf,
}

fn init_logging(verbose: u8) {
  let filter = match verbose {
    0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    1 => EnvFilter::new("debug"),
    _ => EnvFilter::new("trace"),
  };

  fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_level(true)
    .with_writer(io::stderr)
    .init();
}

fn print_summary(report: &RunReport, verbose: bool) {
  println!(
    "Converged: {}",
    if report.converged { "yes" } else { "no" }
  );
  println!("Total iterations: {}", report.total_iterations);
  println!("Final WCSS: {:.2}", report.final_wcss);
  for (id, c) in report.final_centroids.iter().enumerate() {
    let size = report.final_cluster_sizes.get(id).copied().unwrap_or(0);
    println!("Cluster {id}: ({:.2}, {:.2}) - {size} points", c.x, c.y);
  }

  if verbose {
    println!("Iteration history:");
    for snapshot in &report.history {
      println!(
        "  Iteration {}: WCSS={:.2}, Sizes={:?}, Movement={:.6}",
        snapshot.iteration, snapshot.wcss, snapshot.cluster_sizes, snapshot.max_movement
      );
    }
  }
}

fn run(args: RunArgs, verbose: u8) -> Result<()> {
  let parallelism = match args.workers {
    0 => Parallelism::Rayon,
    n => Parallelism::Workers(n),
  };
  let config = EngineConfig::new(args.clusters)
    .with_max_iterations(args.iterations)
    .with_convergence_threshold(args.threshold)
    .with_parallelism(parallelism)
    .with_trace_iterations(args.trace);
  let paths = RunPaths::new(
    args.points,
    args.initial_centroids,
    args.work_dir,
    args.output_dir,
  );

  let mut controller = IterationController::new(config, paths)?;
  let report = controller.run()?;
  print_summary(&report, verbose > 0);
  Ok(())
}

fn map(centroids: &[PathBuf]) -> Result<()> {
  let (_, centroids) = store::load_first(centroids)?;
  let stdin = io::stdin();
  let stdout = io::stdout();
  map_stream(stdin.lock(), BufWriter::new(stdout.lock()), &centroids)?;
  Ok(())
}

fn reduce() -> Result<()> {
  let stdin = io::stdin();
  let stdout = io::stdout();
  reduce_stream(BufReader::new(stdin.lock()), BufWriter::new(stdout.lock()))?;
  Ok(())
}

fn generate(args: GenerateArgs) -> Result<()> {
  let points = seed::generate_points(args.count, args.min, args.max, Some(args.seed))?;
  let centroids = match args.init {
    InitMethod::Random => {
      seed::random_centroids(args.clusters, args.min, args.max, Some(args.centroid_seed))?
    }
    InitMethod::KmeansPlusPlus => {
      seed::kmeans_plus_plus(&points, args.clusters, Some(args.centroid_seed))?
    }
  };
  seed::write_dataset(&args.points, &args.initial_centroids, &points, &centroids)?;
  println!(
    "Generated {} points and {} centroids",
    points.len(),
    centroids.len()
  );
  Ok(())
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match cli.command {
    None => run(cli.run, cli.verbose),
    Some(Commands::Map { centroids }) => map(&centroids),
    Some(Commands::Reduce) => reduce(),
    Some(Commands::Generate(args)) => generate(args),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!(error = %e, "kmeans-mr failed");
      ExitCode::from(1)
    }
  }
}
