/*
cargo run --bin parse_news -- \
    --dataset-dir dataset \
    --out-file    dataset/preprocessed/parsed_news.csv
*/

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::fs::{create_dir_all, File};
use std::io::BufReader;
use std::path::PathBuf;

use authorship_bench::corpus::{write_rows, NewsRow};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Extract (source, title, text) rows from raw news JSON dumps")]
struct Cli {
    // Directory holding the raw corpus JSON files
    #[arg(long, default_value = "dataset")]
    dataset_dir: PathBuf,

    #[arg(long, default_value = "dataset/preprocessed/parsed_news.csv")]
    out_file: PathBuf,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

// Raw corpus layout: { "data": [ { doc_source, doc_title, paragraphs: [{context}] } ] }
#[derive(Debug, Deserialize)]
struct RawDump {
    data: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    doc_source: String,
    doc_title: String,
    #[serde(default)]
    paragraphs: Vec<RawParagraph>,
}

#[derive(Debug, Deserialize)]
struct RawParagraph {
    #[serde(default)]
    context: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("parse_news_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path)?,
    )?;
    info!("Parsing raw dumps from {:?}", cli.dataset_dir);

    let mut rows: Vec<NewsRow> = Vec::new();
    let mut skipped_files = 0usize;
    let mut multi_paragraph = 0usize;

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&cli.dataset_dir)
        .with_context(|| format!("cannot read {}", cli.dataset_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in &entries {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                warn!("Skipping {:?}: {err}", path);
                skipped_files += 1;
                continue;
            }
        };
        let dump: RawDump = match serde_json::from_reader(BufReader::new(file)) {
            Ok(d) => d,
            Err(err) => {
                warn!("Skipping {:?}: {err}", path);
                skipped_files += 1;
                continue;
            }
        };

        for instance in dump.data {
            if instance.paragraphs.len() > 1 {
                warn!(
                    "Article `{}` has {} paragraphs, keeping the first",
                    instance.doc_title,
                    instance.paragraphs.len()
                );
                multi_paragraph += 1;
            }
            let text = instance
                .paragraphs
                .into_iter()
                .next()
                .map(|p| p.context)
                .unwrap_or_default();
            rows.push(NewsRow {
                id: rows.len() as u32,
                source: instance.doc_source,
                title: instance.doc_title,
                text,
            });
        }
    }

    write_rows(&cli.out_file, &rows)?;
    info!("Wrote {} rows to {:?}", rows.len(), cli.out_file);

    println!("\n=== Parse summary ===");
    println!("Dump files read    : {}", entries.len() - skipped_files);
    println!("Dump files skipped : {}", skipped_files);
    println!("Multi-paragraph    : {}", multi_paragraph);
    println!("Rows written       : {}", rows.len());
    println!("Output CSV         : {:?}", cli.out_file);
    println!("Log file           : {:?}", log_path);

    Ok(())
}
