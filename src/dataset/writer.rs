//! Result and stats writers.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{BatchStats, ResultRecord};
use crate::Result;

/// `data/prompts.jsonl` -> `data/prompts_stats.json`. Only the last extension
/// is stripped.
pub fn stats_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_stats.json", stem))
}

/// One JSON object per line, in the order given.
pub fn write_results(path: impl AsRef<Path>, results: &[ResultRecord]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    for result in results {
        serde_json::to_writer(&mut out, result)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Pretty-printed with a 4-space indent.
pub fn write_stats(path: impl AsRef<Path>, stats: &BatchStats) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    stats.serialize(&mut ser)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
