//! Flattened dataset output for the model-training scripts.
//!
//! Columns: `link`, `date`, `teamA`, `teamB`, `winner`, then for every
//! window `teamA_recent{N}_{stat}` and `teamB_recent{N}_{stat}`, then
//! `diff_recent{N}_{stat}` (team A minus team B).

use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::models::{DatasetRow, FeatureSnapshot, WindowFeatures};
use crate::utils::format_timestamp;

const TEAM_STATS: [&str; 5] = [
    "winrate",
    "avg_round_diff",
    "winstreak",
    "matches_used",
    "scored_matches",
];
const DIFF_STATS: [&str; 3] = ["winrate", "avg_round_diff", "winstreak"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

pub fn columns(windows: &[usize]) -> Vec<String> {
    let mut cols: Vec<String> = ["link", "date", "teamA", "teamB", "winner"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    for window in windows {
        for team in ["teamA", "teamB"] {
            for stat in TEAM_STATS {
                cols.push(format!("{}_recent{}_{}", team, window, stat));
            }
        }
    }
    for window in windows {
        for stat in DIFF_STATS {
            cols.push(format!("diff_recent{}_{}", window, stat));
        }
    }
    cols
}

fn team_values(s: &FeatureSnapshot) -> [Value; 5] {
    [
        Value::from(s.winrate),
        Value::from(s.avg_round_diff),
        Value::from(s.winstreak),
        Value::from(s.matches_used),
        Value::from(s.scored_matches),
    ]
}

fn diff_values(wf: &WindowFeatures) -> [Value; 3] {
    [
        Value::from(wf.team_a.winrate - wf.team_b.winrate),
        Value::from(wf.team_a.avg_round_diff - wf.team_b.avg_round_diff),
        Value::from(wf.team_a.winstreak as i64 - wf.team_b.winstreak as i64),
    ]
}

/// One row's values in `columns(windows)` order. Windows missing from the
/// row are written as neutral empty snapshots.
pub fn values(row: &DatasetRow, windows: &[usize]) -> Vec<Value> {
    let features: Vec<WindowFeatures> = windows
        .iter()
        .map(|&window| {
            row.features
                .iter()
                .find(|f| f.window == window)
                .copied()
                .unwrap_or(WindowFeatures {
                    window,
                    team_a: FeatureSnapshot::empty(window),
                    team_b: FeatureSnapshot::empty(window),
                })
        })
        .collect();

    let mut out = vec![
        Value::from(row.link.as_str()),
        Value::from(format_timestamp(&row.date)),
        Value::from(row.team_a.as_str()),
        Value::from(row.team_b.as_str()),
        Value::from(row.winner),
    ];
    for wf in &features {
        out.extend(team_values(&wf.team_a));
        out.extend(team_values(&wf.team_b));
    }
    for wf in &features {
        out.extend(diff_values(wf));
    }
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_csv_to<W: std::io::Write>(writer: W, rows: &[DatasetRow], windows: &[usize]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(columns(windows))?;
    for row in rows {
        writer.write_record(values(row, windows).iter().map(cell))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[DatasetRow], windows: &[usize]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv_to(&mut buf, rows, windows)?;
    Ok(String::from_utf8(buf)?)
}

pub fn to_json_value(rows: &[DatasetRow], windows: &[usize]) -> Value {
    let cols = columns(windows);
    let records = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = cols.iter().cloned().zip(values(row, windows)).collect();
            Value::Object(object)
        })
        .collect();
    Value::Array(records)
}

/// Write the dataset to `path`, creating parent directories as needed.
pub async fn write_dataset(
    path: &Path,
    rows: &[DatasetRow],
    windows: &[usize],
    format: ExportFormat,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let body = match format {
        ExportFormat::Csv => to_csv_string(rows, windows)?,
        ExportFormat::Json => serde_json::to_string_pretty(&to_json_value(rows, windows))?,
    };
    tokio::fs::write(path, body).await?;

    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
