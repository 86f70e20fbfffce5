//! CLI interface for pawmatch

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pawmatch::advice::{AdviceGenerator, CommandAdvice, NoAdvice};
use pawmatch::extractor::{extract_or_zero, UnavailableExtractor};
use pawmatch::server::{self, AppState};
use pawmatch::split::{rng_from_seed, tail_split, write_holdout_listing};
use pawmatch::{
    CommandExtractor, Config, EvaluationReport, Evaluator, FeatureCacheStore, FeatureExtractor,
    ReferenceSet, SplitPolicy, Vector,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pawmatch")]
#[command(about = "Nearest-neighbor breed matching over a feature cache", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Feature cache file (overrides the config)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Feature dimension (overrides the config)
    #[arg(long)]
    dimension: Option<usize>,

    /// External feature extractor command (overrides the config)
    #[arg(long)]
    extractor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features for every image in a directory into the cache
    Build {
        /// Image directory
        #[arg(long)]
        images: PathBuf,
    },
    /// Match one image or vector against the cache
    Match {
        /// Image file to extract and match
        #[arg(long, conflicts_with = "vector", required_unless_present = "vector")]
        image: Option<PathBuf>,
        /// Feature vector as comma-separated values (e.g., "0.1,0.2,...")
        #[arg(long)]
        vector: Option<String>,
        /// Match against a random sample of this many references
        #[arg(long)]
        sample: Option<usize>,
    },
    /// Measure held-out accuracy
    Evaluate {
        /// Print accuracy per label
        #[arg(long)]
        per_label: bool,
        #[command(subcommand)]
        split: EvalSplit,
    },
    /// Write the list of files held out by the tail split
    Holdout {
        /// Image directory
        #[arg(long)]
        images: PathBuf,
        /// Files held out per label
        #[arg(long)]
        k: Option<usize>,
        /// Output file
        #[arg(long, default_value = "TEST_LIST.txt")]
        out: PathBuf,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:5000")]
        addr: String,
        /// Build the cache from this directory if no cache file exists
        #[arg(long)]
        images: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum EvalSplit {
    /// Random split over the cached identifiers
    Ratio {
        #[arg(long)]
        test_fraction: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Hold out the last k files of every label
    Tail {
        #[arg(long)]
        k: Option<usize>,
        /// Take identifiers from this directory instead of the cache
        #[arg(long)]
        images: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(cache) = &cli.cache {
        config.cache_path = cache.clone();
    }
    if let Some(dimension) = cli.dimension {
        config.feature_dimension = dimension;
    }
    if let Some(command) = &cli.extractor {
        config.extractor_command = Some(command.clone());
    }
    config.validate()?;
    Ok(config)
}

fn feature_extractor(config: &Config) -> Result<Arc<dyn FeatureExtractor + Send + Sync>> {
    match &config.extractor_command {
        Some(command) => Ok(Arc::new(CommandExtractor::from_command_line(command)?)),
        None => {
            tracing::warn!("No extractor command configured; new items get zero vectors");
            Ok(Arc::new(UnavailableExtractor))
        }
    }
}

fn advice_generator(config: &Config) -> Result<Arc<dyn AdviceGenerator>> {
    match &config.advice_command {
        Some(command) => Ok(Arc::new(CommandAdvice::from_command_line(command)?)),
        None => Ok(Arc::new(NoAdvice)),
    }
}

/// Sorted paths of every `*.<extension>` file directly inside `dir`.
fn scan_images(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        bail!("Image directory not found: {}", dir.display());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path.display().to_string());
        }
    }
    if files.is_empty() {
        bail!("No .{} files in {}", extension, dir.display());
    }
    files.sort();
    tracing::info!("Found {} images in {}", files.len(), dir.display());
    Ok(files)
}

fn print_report(report: &EvaluationReport, per_label: bool) {
    for label in &report.excluded_labels {
        println!("Excluded (not enough samples): {}", label);
    }
    println!("{}", "-".repeat(40));
    println!("Reference set: {} | Tested: {}", report.train_size, report.total);
    println!("Accuracy: {:.2}%", report.accuracy());
    println!("Correct: {}", report.correct);
    println!("Wrong: {}", report.wrong());
    println!("{}", "-".repeat(40));

    if per_label {
        for (label, stats) in report.per_label() {
            println!(
                "{:<30} {:>4}/{:<4} {:6.2}%",
                label,
                stats.correct,
                stats.total,
                stats.accuracy()
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = FeatureCacheStore::new(&config.cache_path, config.feature_dimension)
        .with_progress_interval(config.progress_interval);

    match cli.command {
        Commands::Build { images } => {
            let items = scan_images(&images, &config.image_extension)?;
            let extractor = feature_extractor(&config)?;
            let cache = store.load_or_empty()?;
            let (cache, stats) = store.build_or_update(&cache, &items, extractor.as_ref())?;
            println!(
                "Cache {}: {} entries ({} extracted, {} already cached)",
                store.path().display(),
                cache.len(),
                stats.extracted,
                stats.skipped
            );
        }
        Commands::Match { image, vector, sample } => {
            let cache = store.load_required()?;
            let query = match (vector, image) {
                (Some(csv), _) => {
                    let v = Vector::from_str(&csv)?;
                    if v.dimension() != config.feature_dimension {
                        bail!(
                            "Query has {} components, cache expects {}",
                            v.dimension(),
                            config.feature_dimension
                        );
                    }
                    v
                }
                (None, Some(path)) => {
                    let extractor = feature_extractor(&config)?;
                    extract_or_zero(extractor.as_ref(), &path, config.feature_dimension)
                }
                (None, None) => bail!("Provide --image or --vector"),
            };

            let full = ReferenceSet::full(&cache);
            let reference = match sample.or(config.sample_size) {
                Some(size) => full.sample(size, &mut rng_from_seed(config.seed)),
                None => full,
            };
            let result = config.matcher().match_or_unknown(&query, &reference)?;

            println!("Label: {}", result.label);
            if let Some(id) = &result.identifier {
                println!("Nearest: {} (distance: {:.4})", id, result.distance);
            }
            println!("Confidence: {:.3}", result.confidence);
            println!(
                "Category: {}",
                if config.is_special(&result.label) { "cat" } else { "dog" }
            );
        }
        Commands::Evaluate { per_label, split } => {
            let report = match split {
                EvalSplit::Ratio { test_fraction, seed } => {
                    let policy = SplitPolicy::Ratio {
                        test_fraction: test_fraction.unwrap_or(config.test_fraction),
                        seed: seed.or(config.seed),
                    };
                    Evaluator::new(config.matcher(), policy)
                        .with_progress_interval(config.progress_interval)
                        .run_from_store(&store)?
                }
                EvalSplit::Tail { k, images } => {
                    let policy = SplitPolicy::Tail {
                        k: k.unwrap_or(config.holdout_per_label),
                    };
                    let mut evaluator = Evaluator::new(config.matcher(), policy)
                        .with_progress_interval(config.progress_interval);
                    match images {
                        Some(dir) => {
                            let items = scan_images(&dir, &config.image_extension)?;
                            let extractor = feature_extractor(&config)?;
                            evaluator.run_on_items(&store, &items, extractor.as_ref())?
                        }
                        None => evaluator.run_from_store(&store)?,
                    }
                }
            };
            print_report(&report, per_label);
        }
        Commands::Holdout { images, k, out } => {
            let items = scan_images(&images, &config.image_extension)?;
            let k = k.unwrap_or(config.holdout_per_label);
            let split = tail_split(items, &config.labels(), k);
            for label in split.excluded_labels() {
                println!("Excluded (not enough samples): {}", label);
            }
            write_holdout_listing(&out, &split.test)?;
            println!("Held-out listing written: {} files -> {}", split.test.len(), out.display());
        }
        Commands::Serve { addr, images } => {
            let extractor = feature_extractor(&config)?;
            let cache = match images {
                Some(dir) if !store.path().exists() => {
                    let items = scan_images(&dir, &config.image_extension)?;
                    store.load_or_build(&items, extractor.as_ref())?
                }
                _ => store.load_or_empty()?,
            };
            if cache.is_empty() {
                tracing::warn!(
                    "Feature cache {} is empty; every request will match as unknown",
                    store.path().display()
                );
            }
            let advice = advice_generator(&config)?;
            let state = Arc::new(AppState::new(config, cache, extractor, advice));
            server::start(&addr, state).await?;
        }
    }
    Ok(())
}
