/*
cargo run --bin make_batch_jsonl -- \
    --csv-path  dataset/preprocessed/filtered_news.csv \
    --save-path dataset/batch
*/

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::info;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use authorship_bench::corpus::read_articles;
use authorship_bench::pairs::{contingency_table, create_pairs, PairConfig};
use authorship_bench::prompts::{build_requests, DEFAULT_MODEL};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Build balanced article pairs and the batch-request JSONL")]
struct Cli {
    #[arg(long, default_value = "dataset/preprocessed/filtered_news.csv")]
    csv_path: PathBuf,

    // Directory the batch JSONL is written into
    #[arg(long, default_value = "dataset/batch")]
    save_path: PathBuf,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value_t = authorship_bench::pairs::SAME_PAIR_SEED)]
    same_seed: u64,
    #[arg(long, default_value_t = authorship_bench::pairs::DIFF_PAIR_SEED)]
    diff_seed: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("make_batch_jsonl_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path)?,
    )?;

    let articles = read_articles(&cli.csv_path)?;
    info!("Loaded {} articles from {:?}", articles.len(), cli.csv_path);

    let cfg = PairConfig {
        same_seed: cli.same_seed,
        diff_seed: cli.diff_seed,
    };
    let (same_pairs, diff_pairs) =
        create_pairs(&articles, &cfg).context("pair construction failed")?;
    info!(
        "Built {} same-pairs and {} diff-pairs",
        same_pairs.len(),
        diff_pairs.len()
    );
    println!("same_pairs: {}", same_pairs.len());
    println!("diff_pairs: {}", diff_pairs.len());

    // read-only validation pass
    let table = contingency_table(&same_pairs, &diff_pairs);
    println!("\nSource x source pair counts:");
    println!("{table}");
    println!("Total pairs: {}", table.total());

    let requests = build_requests(&same_pairs, &diff_pairs, &cli.model);

    create_dir_all(&cli.save_path)?;
    let out_path = cli.save_path.join("batch.jsonl");
    let mut writer = BufWriter::new(
        File::create(&out_path).with_context(|| format!("cannot create {}", out_path.display()))?,
    );
    for request in &requests {
        serde_json::to_writer(&mut writer, request)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    info!("Wrote {} requests to {:?}", requests.len(), out_path);

    println!("\n=== Batch-build summary ===");
    println!("Articles loaded    : {}", articles.len());
    println!("Same-source pairs  : {}", same_pairs.len());
    println!("Cross-source pairs : {}", diff_pairs.len());
    println!("Requests written   : {}", requests.len());
    println!("Output JSONL       : {:?}", out_path);
    println!("Log file           : {:?}", log_path);

    Ok(())
}
