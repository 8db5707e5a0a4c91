//! syna-match Command-Line Interface
//!
//! Match descriptor files and measure matcher performance.
//!
//! # Commands
//!
//! - `match` - Match a query descriptor file against a database file
//! - `generate` - Write a synthetic descriptor file
//! - `bench` - Compare cascade hashing with exhaustive matching
//!
//! Descriptor files are JSON:
//!
//! ```json
//! { "element_type": "f32", "rows": [[0.1, 0.2, ...], ...] }
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use std::fs;
use std::io::Write;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use syna_match::{
    match_with_fallback, BruteForceMatcher, CascadeHashingMatcher, Correspondence,
    DescriptorMatrix, Descriptors, DistanceMetric, MatchStats, MatcherType, MatchingParams,
};

/// syna-match CLI - feature descriptor matching
#[derive(Parser, Debug)]
#[command(name = "syna-match")]
#[command(author, version, about = "Descriptor matching CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match query descriptors against database descriptors
    Match {
        /// Query descriptor file
        query: String,
        /// Database descriptor file
        database: String,
        /// JSON parameter file (command-line flags override it)
        #[arg(short, long)]
        config: Option<String>,
        /// Matcher: FASTCASCADEHASHINGL2, BF, BF_NORM_L1, BF_HAMMING
        #[arg(short, long)]
        matcher: Option<String>,
        /// Ratio test threshold in (0, 1)
        #[arg(short, long)]
        ratio: Option<f32>,
        /// Keep only mutual matches
        #[arg(long)]
        cross_check: bool,
        /// Keep only the N closest matches
        #[arg(long)]
        max_matches: Option<usize>,
        /// Output format: json, csv
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Write a synthetic descriptor file
    Generate {
        /// Output file
        output: String,
        /// Number of descriptors
        #[arg(short, long, default_value = "1000")]
        rows: usize,
        /// Descriptor width
        #[arg(short, long, default_value = "128")]
        dims: usize,
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Write binary (u8) descriptors instead of floats
        #[arg(long)]
        binary: bool,
    },
    /// Compare cascade hashing with exhaustive L2 matching on synthetic data
    Bench {
        /// Database descriptors
        #[arg(short, long, default_value = "5000")]
        rows: usize,
        /// Query descriptors (perturbed copies of database rows)
        #[arg(short, long, default_value = "1000")]
        queries: usize,
        /// Descriptor width
        #[arg(short, long, default_value = "128")]
        dims: usize,
        /// Perturbation amplitude relative to the value range
        #[arg(short, long, default_value = "0.05")]
        noise: f32,
        /// Random seed for the data
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// JSON parameter file for the cascade layout
        #[arg(short, long)]
        config: Option<String>,
    },
}

/// On-disk descriptor set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "element_type", content = "rows", rename_all = "lowercase")]
enum DescriptorFile {
    F32(Vec<Vec<f32>>),
    U8(Vec<Vec<u8>>),
}

impl DescriptorFile {
    fn into_descriptors(self) -> syna_match::Result<Descriptors> {
        Ok(match self {
            DescriptorFile::F32(rows) => Descriptors::F32(DescriptorMatrix::from_rows(rows)?),
            DescriptorFile::U8(rows) => Descriptors::U8(DescriptorMatrix::from_rows(rows)?),
        })
    }
}

#[derive(Serialize)]
struct MatchReport<'a> {
    matcher: &'a str,
    stats: MatchStats,
    matches: &'a [Correspondence],
}

fn main() {
    init_subscriber();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match {
            query,
            database,
            config,
            matcher,
            ratio,
            cross_check,
            max_matches,
            format,
            output,
        } => {
            let overrides = Overrides {
                matcher,
                ratio,
                cross_check,
                max_matches,
            };
            cmd_match(
                &query,
                &database,
                config.as_deref(),
                overrides,
                &format,
                output.as_deref(),
            )
        }
        Commands::Generate {
            output,
            rows,
            dims,
            seed,
            binary,
        } => cmd_generate(&output, rows, dims, seed, binary),
        Commands::Bench {
            rows,
            queries,
            dims,
            noise,
            seed,
            config,
        } => cmd_bench(rows, queries, dims, noise, seed, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr, respecting `RUST_LOG`; `info` when unset.
fn init_subscriber() {
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn load_params(config: Option<&str>) -> Result<MatchingParams, Box<dyn std::error::Error>> {
    Ok(match config {
        Some(path) => MatchingParams::from_json_file(path)?,
        None => MatchingParams::default(),
    })
}

fn load_descriptors(path: &str) -> Result<Descriptors, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read descriptor file {}: {}", path, e))?;
    let file: DescriptorFile = serde_json::from_str(&text)?;
    Ok(file.into_descriptors()?)
}

struct Overrides {
    matcher: Option<String>,
    ratio: Option<f32>,
    cross_check: bool,
    max_matches: Option<usize>,
}

/// Match two descriptor files
fn cmd_match(
    query_path: &str,
    database_path: &str,
    config: Option<&str>,
    overrides: Overrides,
    format: &str,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut params = load_params(config)?;
    if let Some(name) = overrides.matcher {
        params.matcher_type = name.parse::<MatcherType>()?;
    }
    if let Some(ratio) = overrides.ratio {
        params.ratio_thresh = ratio;
    }
    if overrides.cross_check {
        params.cross_check = true;
    }
    if let Some(max) = overrides.max_matches {
        params.max_matches = max;
    }

    let query = load_descriptors(query_path)?;
    let database = load_descriptors(database_path)?;
    info!(
        query_rows = query.rows(),
        database_rows = database.rows(),
        dims = database.cols(),
        matcher = %params.matcher_type,
        "matching"
    );

    let start = Instant::now();
    let result = match_with_fallback(&query, &database, &params)?;
    info!(
        matches = result.len(),
        dropped = result.stats.dropped_queries,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "done"
    );

    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(std::io::BufWriter::new(fs::File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    match format.to_lowercase().as_str() {
        "json" => {
            let report = MatchReport {
                matcher: params.matcher_type.as_str(),
                stats: result.stats,
                matches: &result.matches,
            };
            serde_json::to_writer_pretty(&mut sink, &report)?;
            writeln!(sink)?;
        }
        "csv" => {
            writeln!(sink, "query_index,database_index,distance")?;
            for m in &result.matches {
                writeln!(sink, "{},{},{}", m.query_index, m.database_index, m.distance)?;
            }
        }
        _ => {
            return Err(format!("Unsupported format: {}. Use: json, csv", format).into());
        }
    }
    sink.flush()?;

    Ok(())
}

/// Write a synthetic descriptor file
fn cmd_generate(
    output: &str,
    rows: usize,
    dims: usize,
    seed: u64,
    binary: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let file = if binary {
        DescriptorFile::U8(
            (0..rows)
                .map(|_| (0..dims).map(|_| rng.gen::<u8>()).collect())
                .collect(),
        )
    } else {
        DescriptorFile::F32(
            (0..rows)
                .map(|_| (0..dims).map(|_| rng.gen::<f32>()).collect())
                .collect(),
        )
    };

    let writer = std::io::BufWriter::new(fs::File::create(output)?);
    serde_json::to_writer(writer, &file)?;
    println!("Wrote {} descriptors of width {} to {}", rows, dims, output);
    Ok(())
}

/// Time cascade hashing against exhaustive matching
fn cmd_bench(
    rows: usize,
    queries: usize,
    dims: usize,
    noise: f32,
    seed: u64,
    config: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if queries > rows {
        return Err(format!("queries ({}) cannot exceed rows ({})", queries, rows).into());
    }
    if !noise.is_finite() || noise < 0.0 {
        return Err(format!("noise must be a non-negative finite number, got {}", noise).into());
    }
    let params = load_params(config)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let db_data: Vec<f32> = (0..rows * dims).map(|_| rng.gen::<f32>()).collect();
    let query_data: Vec<f32> = db_data[..queries * dims]
        .iter()
        .map(|&x| x + rng.gen_range(-noise..=noise))
        .collect();
    let database = Descriptors::F32(DescriptorMatrix::from_flat(db_data, dims)?);
    let query = Descriptors::F32(DescriptorMatrix::from_flat(query_data, dims)?);

    let start = Instant::now();
    let mut cascade = CascadeHashingMatcher::new(params.cascade.clone());
    cascade.build_index(&database)?;
    let build_time = start.elapsed();

    let start = Instant::now();
    let approx = cascade.match_descriptors(&query, params.ratio_thresh, params.cross_check)?;
    let cascade_time = start.elapsed();

    let start = Instant::now();
    let exact = BruteForceMatcher::match_pair(
        &query,
        &database,
        params.ratio_thresh,
        params.cross_check,
        DistanceMetric::L2,
    )?;
    let exact_time = start.elapsed();

    let mut expected = vec![None; queries];
    for m in &exact.matches {
        expected[m.query_index] = Some(m.database_index);
    }
    let agreeing = approx
        .matches
        .iter()
        .filter(|m| expected[m.query_index] == Some(m.database_index))
        .count();
    let correct = approx
        .matches
        .iter()
        .filter(|m| m.database_index == m.query_index)
        .count();

    println!(
        "Database: {} x {}, queries: {}, noise: {}",
        rows, dims, queries, noise
    );
    println!(
        "Cascade layout: {} groups x {} bits, top {}",
        params.cascade.bucket_groups, params.cascade.bits_per_bucket, params.cascade.top_candidates
    );
    println!("{}", "-".repeat(60));
    println!("{:<22} {:>12} {:>10} {:>10}", "Matcher", "Time (ms)", "Matches", "Dropped");
    println!(
        "{:<22} {:>12.2} {:>10} {:>10}",
        "cascade (build)",
        build_time.as_secs_f64() * 1000.0,
        "-",
        "-"
    );
    println!(
        "{:<22} {:>12.2} {:>10} {:>10}",
        "cascade (match)",
        cascade_time.as_secs_f64() * 1000.0,
        approx.len(),
        approx.stats.dropped_queries
    );
    println!(
        "{:<22} {:>12.2} {:>10} {:>10}",
        "brute force",
        exact_time.as_secs_f64() * 1000.0,
        exact.len(),
        0
    );
    println!("{}", "-".repeat(60));
    println!(
        "Agreement with brute force: {}/{} ({:.1}%)",
        agreeing,
        approx.len(),
        percent(agreeing, approx.len())
    );
    println!(
        "Ground-truth hits: {}/{} ({:.1}%)",
        correct,
        queries,
        percent(correct, queries)
    );

    Ok(())
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
