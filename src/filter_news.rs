/*
cargo run --bin filter_news -- \
    --in-file  dataset/preprocessed/parsed_news.csv \
    --out-file dataset/preprocessed/filtered_news.csv
*/

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use authorship_bench::corpus::{read_rows, write_rows, NewsRow};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Length-filter the parsed corpus and sample N articles per top source")]
struct Cli {
    #[arg(long, default_value = "dataset/preprocessed/parsed_news.csv")]
    in_file: PathBuf,

    #[arg(long, default_value = "dataset/preprocessed/filtered_news.csv")]
    out_file: PathBuf,

    // Article length bounds, in characters (inclusive)
    #[arg(long, default_value_t = 501)]
    min_length: usize,
    #[arg(long, default_value_t = 1000)]
    max_length: usize,

    // Keep this many sources, ranked by article count
    #[arg(long, default_value_t = 10)]
    top_sources: usize,

    // Sample this many articles from each kept source
    #[arg(long, default_value_t = 100)]
    per_source: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("filter_news_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path)?,
    )?;

    let rows = read_rows(&cli.in_file)?;
    info!("Loaded {} rows from {:?}", rows.len(), cli.in_file);

    // length filter; char count, not bytes, the corpus is not ASCII
    let filtered: Vec<&NewsRow> = rows
        .iter()
        .filter(|row| {
            let len = row.text.chars().count();
            cli.min_length <= len && len <= cli.max_length
        })
        .collect();
    info!(
        "{} rows within {}..={} chars",
        filtered.len(),
        cli.min_length,
        cli.max_length
    );

    // rank sources by article count, ties broken by name for determinism
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in &filtered {
        *counts.entry(row.source.as_str()).or_default() += 1;
    }
    let mut ranking: Vec<(&str, usize)> = counts.into_iter().collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranking.truncate(cli.top_sources);

    println!("Top {} sources by article count", ranking.len());
    for (rank, (source, count)) in ranking.iter().enumerate() {
        println!("{}. {} ({} articles)", rank + 1, source, count);
    }
    println!("{}", "-".repeat(50));

    // sample per_source articles from each kept source
    let mut sampled: Vec<NewsRow> = Vec::with_capacity(ranking.len() * cli.per_source);
    let mut kept_sources: Vec<&str> = ranking.iter().map(|(s, _)| *s).collect();
    kept_sources.sort();

    for source in kept_sources {
        let mut members: Vec<&NewsRow> = filtered
            .iter()
            .copied()
            .filter(|row| row.source == source)
            .collect();
        if members.len() < cli.per_source {
            bail!(
                "source `{}` has only {} articles after filtering, need {}",
                source,
                members.len(),
                cli.per_source
            );
        }
        let mut rng = StdRng::seed_from_u64(cli.seed);
        members.shuffle(&mut rng);
        members.truncate(cli.per_source);
        sampled.extend(members.into_iter().cloned());
    }

    // reassign ids from zero so downstream indices are contiguous
    for (idx, row) in sampled.iter_mut().enumerate() {
        row.id = idx as u32;
    }

    write_rows(&cli.out_file, &sampled)
        .with_context(|| format!("cannot write {}", cli.out_file.display()))?;
    info!("Wrote {} sampled rows to {:?}", sampled.len(), cli.out_file);

    println!("\n=== Filter summary ===");
    println!("Input rows         : {}", rows.len());
    println!("After length filter: {}", filtered.len());
    println!("Sources kept       : {}", ranking.len());
    println!("Rows sampled       : {}", sampled.len());
    println!("Output CSV         : {:?}", cli.out_file);
    println!("Log file           : {:?}", log_path);

    Ok(())
}
