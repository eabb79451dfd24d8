/*
cargo run --bin check_output -- \
    --file-path dataset/batch/predictions.jsonl
*/

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use authorship_bench::scoring::{PredRecord, Scoreboard};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Score a predictions JSONL against the gold labels in its custom ids")]
struct Cli {
    #[arg(long, default_value = "dataset/batch/predictions.jsonl")]
    file_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = File::open(&cli.file_path)
        .with_context(|| format!("cannot open {}", cli.file_path.display()))?;

    let mut board = Scoreboard::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PredRecord = serde_json::from_str(&line)
            .with_context(|| format!("malformed prediction on line {}", line_num + 1))?;
        board.record(&record);
    }

    for id in &board.duplicates {
        println!("Duplicate ID found: {id}");
    }

    println!("Total entries processed: {}", board.total);
    println!("Successful entries     : {}", board.success);
    println!("Entries with errors    : {}", board.errors);
    if board.unlabeled > 0 {
        println!("Entries without label  : {}", board.unlabeled);
    }

    println!("\nConfusion Matrix:");
    println!("{}", "-".repeat(40));
    println!("Predicted Same (True Same): {}", board.pred_same_true_same);
    println!("Predicted Same (True Diff): {}", board.pred_same_true_diff);
    println!("Predicted Diff (True Same): {}", board.pred_diff_true_same);
    println!("Predicted Diff (True Diff): {}", board.pred_diff_true_diff);
    println!("{}", "-".repeat(40));

    println!("Accuracy:  {:.4}", board.accuracy());
    println!("Precision: {:.4}", board.precision());
    println!("Recall:    {:.4}", board.recall());
    println!("F1 Score:  {:.4}", board.f1());
    println!("MCC:       {:.4}", board.mcc());

    Ok(())
}
