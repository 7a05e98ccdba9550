use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use graph_lens::{EngineSettings, GraphDataset};
use tracing::info;

pub fn read_dataset(path: &Path) -> Result<GraphDataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    let dataset = GraphDataset::from_json(&raw)
        .with_context(|| format!("failed to parse dataset {}", path.display()))?;

    info!(
        nodes = dataset.node_count(),
        links = dataset.link_count(),
        path = %path.display(),
        "dataset loaded"
    );
    Ok(dataset)
}

pub fn read_settings(path: Option<&Path>) -> Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    EngineSettings::from_json(&raw)
        .with_context(|| format!("failed to parse settings {}", path.display()))
}

/// Writes `text` to `path`, or to stdout without one.
pub fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write to stdout")
        }
    }
}
