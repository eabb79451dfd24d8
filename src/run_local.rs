/*
Replay the batch requests against a local OpenAI-compatible server
(e.g. llama.cpp `llama-server`):

cargo run --bin run_local -- \
    --jsonl-path dataset/batch/batch.jsonl \
    --endpoint   http://localhost:8080/v1/chat/completions
*/

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::Value;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};

use authorship_bench::prompts::BatchRequest;
use authorship_bench::scoring::{PredRecord, Verdict};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Run the pair batch against a local chat-completions endpoint")]
struct Cli {
    #[arg(long, default_value = "dataset/batch/batch.jsonl")]
    jsonl_path: PathBuf,

    #[arg(long, default_value = "dataset/batch/predictions.jsonl")]
    out_file: PathBuf,

    #[arg(long, default_value = "http://localhost:8080/v1/chat/completions")]
    endpoint: String,

    // Override the model name baked into the batch file (local servers
    // usually ignore it, some insist on their own)
    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value_t = 3)]
    max_attempts: u8,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("run_local_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path)?,
    )?;

    // load requests
    let file = File::open(&cli.jsonl_path)
        .with_context(|| format!("cannot open {}", cli.jsonl_path.display()))?;
    let mut requests: Vec<BatchRequest> = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        requests.push(serde_json::from_str(&line)?);
    }
    info!("Loaded {} requests from {:?}", requests.len(), cli.jsonl_path);
    println!("Found {} entries to process", requests.len());

    let client = reqwest::Client::new();

    if let Some(parent) = cli.out_file.parent() {
        create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&cli.out_file)?);

    let bar = ProgressBar::new(requests.len() as u64);
    bar.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap());

    let mut parse_errors = 0usize;
    for mut request in requests {
        if let Some(model) = &cli.model {
            request.body.model = model.clone();
        }

        let mut verdict: Option<Verdict> = None;
        for attempt in 1..=cli.max_attempts {
            match query_endpoint(&client, &cli.endpoint, &request).await {
                Ok(v) => {
                    verdict = Some(v);
                    break;
                }
                Err(err) if attempt < cli.max_attempts => {
                    warn!(
                        "{} attempt {}/{} failed: {err}",
                        request.custom_id, attempt, cli.max_attempts
                    );
                    sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(err) => {
                    warn!("{} gave up: {err}", request.custom_id);
                    verdict = Some(Verdict {
                        parse_error: Some(err.to_string()),
                        ..Verdict::default()
                    });
                }
            }
        }

        let response = verdict.unwrap_or_default();
        if response.parse_error.is_some() {
            parse_errors += 1;
        }

        let record = PredRecord {
            custom_id: request.custom_id,
            response,
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        writer.flush()?; // keep partial progress on disk

        bar.inc(1);
    }
    bar.finish_with_message("done");

    println!("\n=== Local run summary ===");
    println!("Failed entries     : {}", parse_errors);
    println!("Predictions JSONL  : {:?}", cli.out_file);
    println!("Log file           : {:?}", log_path);

    Ok(())
}

async fn query_endpoint(
    client: &reqwest::Client,
    endpoint: &str,
    request: &BatchRequest,
) -> Result<Verdict> {
    let resp = client.post(endpoint).json(&request.body).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let msg = resp.text().await.unwrap_or_default();
        return Err(anyhow!("{status} - {msg}"));
    }

    let resp_json: Value = resp.json().await?;
    let content = resp_json
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("unexpected response structure"))?;

    // local models wrap JSON in code fences more often than not
    let content = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let verdict: Verdict = serde_json::from_str(content)
        .map_err(|err| anyhow!("model output is not valid JSON: {err}"))?;
    Ok(verdict)
}
