mod load;
#[cfg(feature = "viewer")]
mod viewer;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use graph_lens::layout::SimulationState;
use graph_lens::{EngineSettings, ExportFormat, GraphMetrics, GraphSession, serialize};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Lays out and explores a node-link dataset.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Dataset JSON with `nodes` and `links`.
    dataset: PathBuf,
    /// Engine settings JSON. Missing fields keep their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Node id to center the sample on.
    #[arg(long, conflicts_with = "query")]
    focus: Option<String>,
    /// Fuzzy search for the node to center the sample on.
    #[arg(long)]
    query: Option<String>,
    /// Visible node budget; zero or negative disables sampling.
    #[arg(long, allow_negative_numbers = true)]
    max_nodes: Option<i64>,
    /// Export the full dataset as json, csv or cypher and exit.
    #[arg(long, value_name = "FORMAT")]
    export: Option<String>,
    /// Where exports and reports go. Defaults to stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Settle the layout headlessly and print a JSON report.
    #[arg(long)]
    report: bool,
    /// Run the layout on a worker thread.
    #[arg(long)]
    offload: bool,
}

impl Args {
    fn engine_settings(&self) -> Result<EngineSettings> {
        let mut settings = load::read_settings(self.settings.as_deref())?;
        if let Some(focus) = &self.focus {
            settings.filter.focus_id = Some(focus.clone());
        }
        if let Some(max_nodes) = self.max_nodes {
            settings.filter.max_visible_nodes = max_nodes;
        }
        settings.layout.offload |= self.offload;
        Ok(settings)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionRow {
    id: String,
    x: f32,
    y: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsRow {
    node_count: usize,
    link_count: usize,
    density: f64,
    average_degree: f64,
    most_connected: Option<String>,
}

impl From<&GraphMetrics> for MetricsRow {
    fn from(metrics: &GraphMetrics) -> Self {
        Self {
            node_count: metrics.node_count,
            link_count: metrics.link_count,
            density: metrics.density,
            average_degree: metrics.average_degree,
            most_connected: metrics.most_connected.as_ref().map(|(id, _)| id.clone()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutReport {
    focus_id: Option<String>,
    dataset: MetricsRow,
    visible: MetricsRow,
    settled: bool,
    partial_layout: bool,
    positions: Vec<PositionRow>,
}

fn layout_report(session: &GraphSession) -> LayoutReport {
    let metrics = session.metrics();
    LayoutReport {
        focus_id: session.focus_id().map(str::to_owned),
        dataset: MetricsRow::from(&metrics.full),
        visible: MetricsRow::from(&metrics.visible),
        settled: session.layout_state() == SimulationState::Settled,
        partial_layout: session.is_partial_layout(),
        positions: session
            .positions()
            .into_iter()
            .map(|(id, position)| PositionRow {
                id,
                x: position.x,
                y: position.y,
            })
            .collect(),
    }
}

fn run_headless(args: &Args, settings: EngineSettings) -> Result<()> {
    let dataset = load::read_dataset(&args.dataset)?;

    if let Some(format_name) = &args.export {
        let format = ExportFormat::from_name(format_name);
        let text = serialize(&dataset, format);
        load::write_output(args.output.as_deref(), &text)?;
        info!(%format, "export written");
        return Ok(());
    }

    let mut session = GraphSession::new(dataset, settings);
    if let Some(query) = &args.query
        && session.focus_on_query(query).is_none()
    {
        warn!(query = %query, "no node matched the query");
    }

    session.settle_now();
    let report = layout_report(&session);
    let text = serde_json::to_string_pretty(&report)?;
    load::write_output(args.output.as_deref(), &format!("{text}\n"))
}

#[cfg(feature = "viewer")]
fn run_viewer(args: &Args, settings: EngineSettings) -> Result<()> {
    viewer::run(viewer::ViewerOptions {
        dataset_path: args.dataset.clone(),
        settings,
        query: args.query.clone(),
    })
}

#[cfg(not(feature = "viewer"))]
fn run_viewer(args: &Args, _settings: EngineSettings) -> Result<()> {
    anyhow::bail!(
        "viewing {} needs the `viewer` feature; use --report or --export for headless runs",
        args.dataset.display()
    )
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graph_lens=info")))
        .init();

    let args = Args::parse();
    let settings = args.engine_settings()?;

    if args.export.is_some() || args.report {
        run_headless(&args, settings)
    } else {
        run_viewer(&args, settings)
    }
}
