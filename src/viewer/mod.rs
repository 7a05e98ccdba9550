//! Desktop front end: one window around a [`GraphSession`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use anyhow::anyhow;
use eframe::egui::{self, Context};
use graph_lens::session::FrameTicket;
use graph_lens::{AnnouncementSink, EngineSettings, GraphDataset, GraphSession};
use tracing::info;

use crate::load::read_dataset;

mod interaction;
mod panels;
mod view;

const ANNOUNCEMENT_HISTORY: usize = 40;

pub struct ViewerOptions {
    pub dataset_path: PathBuf,
    pub settings: EngineSettings,
    pub query: Option<String>,
}

pub fn run(options: ViewerOptions) -> anyhow::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1440.0, 920.0])
            .with_title("graph-lens"),
        ..Default::default()
    };

    eframe::run_native(
        "graph-lens",
        native_options,
        Box::new(move |cc| Ok(Box::new(GraphLensApp::new(cc, options)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}

type LoadResult = Result<GraphDataset, String>;

struct GraphLensApp {
    options: ViewerOptions,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

/// Screen-reader stand-in: the newest announcements, oldest dropped first.
#[derive(Default)]
struct AnnouncementLog {
    entries: VecDeque<String>,
}

impl AnnouncementSink for AnnouncementLog {
    fn announce(&mut self, message: &str) {
        if self.entries.len() == ANNOUNCEMENT_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(message.to_owned());
    }
}

struct ViewModel {
    session: GraphSession,
    dataset_path: PathBuf,
    search: String,
    announcements: AnnouncementLog,
    export_status: Option<String>,
    pending_frame: Option<FrameTicket>,
    dragging: Option<String>,
}

impl ViewModel {
    fn new(dataset: GraphDataset, options: &ViewerOptions) -> Self {
        let mut session = GraphSession::new(dataset, options.settings.clone());
        let search = options.query.clone().unwrap_or_default();
        if !search.trim().is_empty() {
            session.focus_on_query(&search);
        }

        Self {
            session,
            dataset_path: options.dataset_path.clone(),
            search,
            announcements: AnnouncementLog::default(),
            export_status: None,
            pending_frame: None,
            dragging: None,
        }
    }

    /// Honors the outstanding frame ticket and books the next one while the
    /// layout or the reveal schedule still has work to do.
    fn drive_frames(&mut self, ctx: &Context) {
        if let Some(ticket) = self.pending_frame.take() {
            self.session.on_frame(ticket, Instant::now());
        }

        if self.session.needs_frame() {
            self.pending_frame = Some(self.session.request_frame());
            ctx.request_repaint();
        }
    }

    fn dataset_name(&self) -> String {
        self.dataset_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dataset_path.display().to_string())
    }
}

impl GraphLensApp {
    fn new(_cc: &eframe::CreationContext<'_>, options: ViewerOptions) -> Self {
        let state = Self::start_load(&options.dataset_path);
        Self {
            options,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(path: &Path) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();
        let path = path.to_path_buf();

        thread::spawn(move || {
            let result = read_dataset(&path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(path: &Path) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(path),
        }
    }
}

fn loading_screen(ctx: &Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(120.0);
            ui.heading("Loading dataset...");
            ui.add_space(8.0);
            ui.spinner();
        });
    });
}

impl eframe::App for GraphLensApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(dataset) => AppState::Ready(Box::new(ViewModel::new(dataset, &self.options))),
                        Err(error) => AppState::Error(error),
                    });
                }
                loading_screen(ctx);
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the dataset");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.options.dataset_path));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(&self.options.dataset_path));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(dataset)) => {
                            info!("dataset reloaded");
                            model.session.replace_dataset(dataset);
                            model.pending_frame = None;
                            model.dragging = None;
                        }
                        Ok(Err(error)) => transition = Some(AppState::Error(error)),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(AppState::Error("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
            ctx.request_repaint();
        }
    }
}
