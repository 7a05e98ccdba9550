//! Text exports of the full dataset.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::GraphDataset;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Cypher,
}

impl ExportFormat {
    pub const ALL: [Self; 3] = [Self::Json, Self::Csv, Self::Cypher];

    /// Parses a format name. Anything unrecognized means JSON.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Self::Csv,
            "cypher" | "cql" => Self::Cypher,
            "json" => Self::Json,
            other => {
                warn!(format = other, "unknown export format, using json");
                Self::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Cypher => "cypher",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serializes every node and link of `dataset`, regardless of what is
/// currently drawn.
pub fn serialize(dataset: &GraphDataset, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => to_json(dataset),
        ExportFormat::Csv => to_csv(dataset).unwrap_or_else(|error| {
            warn!(%error, "csv export failed, falling back to json");
            to_json(dataset)
        }),
        ExportFormat::Cypher => to_cypher(dataset),
    }
}

pub fn serialize_named(dataset: &GraphDataset, format_name: &str) -> String {
    serialize(dataset, ExportFormat::from_name(format_name))
}

fn to_json(dataset: &GraphDataset) -> String {
    serde_json::to_string_pretty(dataset).unwrap_or_else(|error| {
        warn!(%error, "json export failed");
        String::from("{\"nodes\":[],\"links\":[]}")
    })
}

fn csv_section<I, R>(header: [&str; 3], rows: I) -> Result<Vec<u8>, Box<dyn std::error::Error>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(writer.into_inner()?)
}

/// Node section, blank line, link section. Each section has its own header.
fn to_csv(dataset: &GraphDataset) -> Result<String, Box<dyn std::error::Error>> {
    let mut bytes = csv_section(
        ["id", "displayName", "typeTag"],
        dataset
            .nodes()
            .iter()
            .map(|node| [&node.id, &node.display_name, &node.type_tag]),
    )?;
    bytes.push(b'\n');
    bytes.extend(csv_section(
        ["sourceId", "targetId", "relationType"],
        dataset
            .links()
            .iter()
            .map(|link| [&link.source_id, &link.target_id, &link.relation_type]),
    )?);

    Ok(String::from_utf8(bytes)?)
}

fn cypher_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

fn cypher_name(value: &str) -> String {
    let trimmed = value.trim();
    let name = if trimmed.is_empty() { "Entity" } else { trimmed };
    format!("`{}`", name.replace('`', "``"))
}

fn to_cypher(dataset: &GraphDataset) -> String {
    let mut out = String::new();

    for node in dataset.nodes() {
        let _ = writeln!(
            out,
            "CREATE (:{} {{id: {}, displayName: {}}});",
            cypher_name(&node.type_tag),
            cypher_string(&node.id),
            cypher_string(&node.display_name)
        );
    }

    for link in dataset.links() {
        let _ = writeln!(
            out,
            "MATCH (a {{id: {}}}), (b {{id: {}}}) CREATE (a)-[:{}]->(b);",
            cypher_string(&link.source_id),
            cypher_string(&link.target_id),
            cypher_name(&link.relation_type)
        );
    }

    out
}
