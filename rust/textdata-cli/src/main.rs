//! Text Dataset Reader Inspector
//!
//! This binary reads a text dataset through the batching pipeline and logs
//! the shape of every batch, which is handy for checking bucket settings
//! and sharding before a training run.
//!
//! # Usage
//!
//! ```bash
//! # Read the dataset described by a configuration file
//! textdata-inspect --config reader.toml
//!
//! # Look at the first 10 batches rank 1 of 4 would see on the valid split
//! textdata-inspect --config reader.toml --split valid --rank 1 --world-size 4 --max-batches 10
//! ```

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textdata_core::{
    ByteEncoder, GenericTextDataset, LocalGang, ReaderConfig, TextDataset, TextEncoder,
};

/// Text Dataset Reader Inspector
#[derive(Parser, Debug)]
#[command(name = "textdata-inspect")]
#[command(about = "Inspect batches produced by the text dataset reader")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Dataset path (overrides the configuration)
    #[arg(short, long)]
    path: Option<String>,

    /// Split to read (overrides the configuration)
    #[arg(short, long)]
    split: Option<String>,

    /// Rank of this reader
    #[arg(long, default_value = "0")]
    rank: u32,

    /// Number of ranks sharing the dataset
    #[arg(long, default_value = "1")]
    world_size: u32,

    /// Stop after this many batches
    #[arg(long)]
    max_batches: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => ReaderConfig::from_file(path)?,
        None => ReaderConfig::default(),
    }
    .with_env_overrides();

    if let Some(path) = args.path {
        config.dataset.path = path.into();
    }
    if let Some(split) = args.split {
        config.dataset.split = Some(split);
    }
    if args.max_batches.is_some() {
        config.read.max_num_batches = args.max_batches;
    }
    config.validate()?;

    let options = config.read.to_options()?;
    let gang = LocalGang::new(args.rank, args.world_size)?;

    tracing::info!("Starting textdata inspector");
    tracing::info!("  Dataset: {} ({})", config.dataset.name, config.dataset.path.display());
    tracing::info!("  Split: {}", config.dataset.split.as_deref().unwrap_or("<all>"));
    tracing::info!("  Rank: {}/{}", args.rank, args.world_size);
    tracing::info!("  Batching: {:?}", options.batching);

    let dataset = GenericTextDataset::from_path(&config.dataset.path, config.dataset.name.clone())?;

    let encoder: Arc<dyn TextEncoder> = Arc::new(ByteEncoder::default());

    let reader = dataset.create_reader(
        encoder,
        config.sequence.pad_idx,
        &gang,
        config.sequence.min_seq_len,
        config.sequence.max_seq_len,
        Some(options),
        config.dataset.split.as_deref(),
    )?;

    let start = Instant::now();

    let mut num_batches = 0usize;
    let mut num_examples = 0usize;
    let mut num_elements = 0usize;
    let mut num_padded = 0usize;

    for batch in reader {
        let batch = batch?;
        let (rows, cols) = batch.seqs.shape();

        tracing::info!(
            "Batch {}: {} x {} ({} tokens, {} padding)",
            num_batches,
            rows,
            cols,
            batch.num_elements(),
            rows * cols - batch.num_elements()
        );

        num_batches += 1;
        num_examples += batch.batch_size();
        num_elements += batch.num_elements();
        num_padded += rows * cols;
    }

    let padding_ratio = if num_padded == 0 {
        0.0
    } else {
        1.0 - num_elements as f64 / num_padded as f64
    };

    tracing::info!(
        "Read {} batches, {} examples, {} tokens in {:.2?} (padding {:.1}%)",
        num_batches,
        num_examples,
        num_elements,
        start.elapsed(),
        padding_ratio * 100.0
    );

    Ok(())
}
