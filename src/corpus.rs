//! CSV row model shared by the pipeline stages.

use std::fs::{create_dir_all, File};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pairs::Article;

/// One row of `parsed_news.csv` / `filtered_news.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsRow {
    pub id: u32,
    pub source: String,
    pub title: String,
    pub text: String,
}

pub fn read_rows(path: &Path) -> Result<Vec<NewsRow>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: NewsRow =
            record.with_context(|| format!("malformed CSV row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_rows(path: &Path, rows: &[NewsRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a CSV as balancer input, dropping the row ids.
pub fn read_articles(path: &Path) -> Result<Vec<Article>> {
    Ok(read_rows(path)?
        .into_iter()
        .map(|row| Article {
            source: row.source,
            title: row.title,
            text: row.text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_round_trip_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.csv");

        let rows = vec![
            NewsRow {
                id: 0,
                source: "outlet_a".into(),
                title: "headline, with a comma".into(),
                text: "body line one\nbody line two".into(),
            },
            NewsRow {
                id: 1,
                source: "outlet_b".into(),
                title: "plain headline".into(),
                text: "short body".into(),
            },
        ];
        write_rows(&path, &rows).unwrap();

        let back = read_rows(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].title, rows[0].title);
        assert_eq!(back[0].text, rows[0].text);

        let articles = read_articles(&path).unwrap();
        assert_eq!(articles[1].source, "outlet_b");
    }
}
