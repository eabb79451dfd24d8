/*
Submit a new batch job (requires OPENAI_API_KEY):
cargo run --bin call_batch_api -- --jsonl-path dataset/batch/batch.jsonl

Resume polling an existing job:
cargo run --bin call_batch_api -- --batch-id batch_abc123
*/

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::env;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};

use authorship_bench::prompts::gold_label_of;
use authorship_bench::scoring::{PredRecord, Verdict};

const API_BASE: &str = "https://api.openai.com/v1";
const POLL_INTERVAL_SECS: u64 = 15;

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Submit the pair batch to the OpenAI batch API and collect the output")]
struct Cli {
    #[arg(long, default_value = "dataset/batch/batch.jsonl")]
    jsonl_path: PathBuf,

    // Poll this job instead of submitting a new one
    #[arg(long)]
    batch_id: Option<String>,

    #[arg(long, default_value = "dataset/batch/output.jsonl")]
    output_jsonl: PathBuf,

    #[arg(long, default_value = "dataset/batch/predictions.jsonl")]
    predictions_jsonl: PathBuf,

    #[arg(long, default_value = "dataset/batch/predictions.csv")]
    predictions_csv: PathBuf,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    output_file_id: Option<String>,
    error_file_id: Option<String>,
}

// One row of predictions.csv
#[derive(Debug, Serialize)]
struct PredictionRow {
    custom_id: String,
    gold_label: String,
    pred_label: String,
    is_success: bool,
    is_error: bool,
    analysis: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("call_batch_api_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path)?,
    )?;

    let key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
    let client = reqwest::Client::new();

    let batch_id = match &cli.batch_id {
        Some(id) => id.clone(),
        None => submit_batch(&client, &key, &cli.jsonl_path).await?,
    };
    println!("Polling batch {batch_id} every {POLL_INTERVAL_SECS}s...");

    let batch = poll_until_done(&client, &key, &batch_id).await?;

    let output_file_id = batch
        .output_file_id
        .ok_or_else(|| anyhow!("batch {} completed without an output file", batch.id))?;
    info!("output_file_id: {output_file_id}");

    let content = download_file(&client, &key, &output_file_id).await?;
    if let Some(parent) = cli.output_jsonl.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(&cli.output_jsonl, &content)?;
    info!("Raw output saved to {:?}", cli.output_jsonl);

    // flatten raw responses into prediction records
    let records = flatten_output(&content);
    write_predictions(&cli.predictions_jsonl, &records)?;
    write_csv(&cli.predictions_csv, &records)?;

    // preview the first few verdicts
    for (idx, rec) in records.iter().take(10).enumerate() {
        println!("{}", "-".repeat(50));
        println!("[PREVIEW {idx}] {}", rec.custom_id);
        match (&rec.response.answer, &rec.response.parse_error) {
            (Some(answer), _) => println!("answer: {answer}"),
            (None, Some(err)) => println!("parse error: {err}"),
            _ => println!("answer: <missing>"),
        }
    }

    if let Some(error_file_id) = batch.error_file_id {
        warn!("Batch reported an error file: {error_file_id}");
        let errors = download_file(&client, &key, &error_file_id).await?;
        println!("{}", "-".repeat(50));
        println!("ERROR FILE:\n{errors}");
    }

    println!("\n=== Batch summary ===");
    println!("Batch id           : {}", batch.id);
    println!("Responses          : {}", records.len());
    println!("Raw output JSONL   : {:?}", cli.output_jsonl);
    println!("Predictions JSONL  : {:?}", cli.predictions_jsonl);
    println!("Predictions CSV    : {:?}", cli.predictions_csv);
    println!("Log file           : {:?}", log_path);

    Ok(())
}

async fn submit_batch(client: &reqwest::Client, key: &str, jsonl_path: &PathBuf) -> Result<String> {
    let bytes = std::fs::read(jsonl_path)
        .with_context(|| format!("cannot read {}", jsonl_path.display()))?;

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name("batch.jsonl")
        .mime_str("application/jsonl")?;
    let form = reqwest::multipart::Form::new()
        .text("purpose", "batch")
        .part("file", part);

    let resp = client
        .post(format!("{API_BASE}/files"))
        .bearer_auth(key)
        .multipart(form)
        .send()
        .await?;
    let file: FileObject = expect_json(resp, "file upload").await?;
    println!("Input file uploaded (file id: {})", file.id);
    info!("Uploaded {:?} as {}", jsonl_path, file.id);

    let resp = client
        .post(format!("{API_BASE}/batches"))
        .bearer_auth(key)
        .json(&serde_json::json!({
            "input_file_id": file.id,
            "endpoint": "/v1/chat/completions",
            "completion_window": "24h",
        }))
        .send()
        .await?;
    let batch: BatchObject = expect_json(resp, "batch creation").await?;
    println!("Batch created (batch id: {})", batch.id);
    info!("Created batch {}", batch.id);
    Ok(batch.id)
}

async fn poll_until_done(
    client: &reqwest::Client,
    key: &str,
    batch_id: &str,
) -> Result<BatchObject> {
    loop {
        let resp = client
            .get(format!("{API_BASE}/batches/{batch_id}"))
            .bearer_auth(key)
            .send()
            .await?;
        let batch: BatchObject = expect_json(resp, "batch status").await?;
        println!("status: {}", batch.status);

        match batch.status.as_str() {
            "completed" => {
                info!("Batch {batch_id} completed");
                return Ok(batch);
            }
            "failed" | "cancelled" | "expired" => {
                bail!("batch {batch_id} ended in state `{}`", batch.status);
            }
            _ => sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await,
        }
    }
}

async fn download_file(client: &reqwest::Client, key: &str, file_id: &str) -> Result<String> {
    let resp = client
        .get(format!("{API_BASE}/files/{file_id}/content"))
        .bearer_auth(key)
        .send()
        .await?;
    if !resp.status().is_success() {
        bail!("file download failed: {}", resp.status());
    }
    Ok(resp.text().await?)
}

async fn expect_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T> {
    if !resp.status().is_success() {
        let status = resp.status();
        let msg = resp.text().await.unwrap_or_default();
        bail!("{what} failed: {status} - {msg}");
    }
    Ok(resp.json().await?)
}

/// Pull the model verdict out of each raw batch-output line. Lines missing
/// the response body, choices, or a parseable content object turn into
/// parse-error records rather than being dropped.
fn flatten_output(content: &str) -> Vec<PredRecord> {
    let mut records = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(err) => {
                // keep the row so prediction totals still match the batch
                warn!("Line {}: unparseable output line: {err}", line_num + 1);
                records.push(PredRecord {
                    custom_id: String::new(),
                    response: Verdict {
                        parse_error: Some(format!(
                            "unparseable output line {}: {err}",
                            line_num + 1
                        )),
                        ..Verdict::default()
                    },
                });
                continue;
            }
        };
        let custom_id = entry
            .get("custom_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();

        let content_str = entry
            .pointer("/response/body/choices/0/message/content")
            .and_then(|v| v.as_str());

        let response = match content_str {
            Some(text) => match serde_json::from_str::<Verdict>(text) {
                Ok(verdict) => verdict,
                Err(err) => {
                    warn!("{custom_id}: model output is not valid JSON: {err}");
                    Verdict {
                        parse_error: Some(format!("invalid verdict JSON: {err}")),
                        ..Verdict::default()
                    }
                }
            },
            None => {
                warn!("{custom_id}: response body missing choices");
                Verdict {
                    parse_error: Some("response body missing choices".into()),
                    ..Verdict::default()
                }
            }
        };

        records.push(PredRecord {
            custom_id,
            response,
        });
    }
    records
}

fn write_predictions(path: &PathBuf, records: &[PredRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for rec in records {
        serde_json::to_writer(&mut writer, rec)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    info!("Wrote {} prediction records to {:?}", records.len(), path);
    Ok(())
}

fn write_csv(path: &PathBuf, records: &[PredRecord]) -> Result<()> {
    // build all rows first, then materialize the file in one pass
    let rows: Vec<PredictionRow> = records
        .iter()
        .map(|rec| {
            let gold_label = gold_label_of(&rec.custom_id)
                .map(|l| l.as_str().to_owned())
                .unwrap_or_default();
            let pred_label = match rec.response.answer {
                Some(true) => "same".to_owned(),
                Some(false) => "diff".to_owned(),
                None => String::new(),
            };
            let is_error = rec.response.parse_error.is_some() || rec.response.answer.is_none();
            PredictionRow {
                is_success: !is_error && gold_label == pred_label,
                custom_id: rec.custom_id.clone(),
                gold_label,
                pred_label,
                is_error,
                analysis: rec.response.analysis.clone().unwrap_or_default(),
            }
        })
        .collect();

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} CSV rows to {:?}", rows.len(), path);
    Ok(())
}
