use std::fs;
use std::path::PathBuf;

use eframe::egui::{self, Align, Context, Layout, RichText, Ui};
use graph_lens::layout::SimulationState;
use graph_lens::{AnnouncementSink, ExportFormat, GraphMetrics};
use tracing::{info, warn};

use super::ViewModel;

fn state_label(state: SimulationState) -> &'static str {
    match state {
        SimulationState::Idle => "idle",
        SimulationState::Running => "running",
        SimulationState::Settling => "settling",
        SimulationState::Settled => "settled",
    }
}

fn metrics_block(ui: &mut Ui, title: &str, metrics: &GraphMetrics) {
    ui.label(RichText::new(title).strong());
    ui.label(metrics.summary());
    if let Some((id, count)) = &metrics.most_connected {
        ui.label(format!("Most connected: {id} ({count})"));
    }
}

impl ViewModel {
    pub(super) fn show(&mut self, ctx: &Context, reload_requested: &mut bool, is_loading: bool) {
        self.drive_frames(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("graph-lens");
                    ui.separator();
                    ui.label(self.dataset_name());
                    ui.label(format!("nodes: {}", self.session.dataset().node_count()));
                    ui.label(format!("links: {}", self.session.dataset().link_count()));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload dataset"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let reveal = self.session.reveal_state();
                        ui.label(format!(
                            "layout: {}{}",
                            state_label(self.session.layout_state()),
                            if self.session.is_partial_layout() {
                                " (partial)"
                            } else {
                                ""
                            }
                        ));
                        ui.label(format!(
                            "showing {} of {} sampled",
                            reveal.revealed_count(),
                            reveal.total()
                        ));
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if is_loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("Reloading dataset...");
                    ui.add_space(8.0);
                    ui.spinner();
                });
            } else {
                self.draw_graph(ui);
            }
        });
    }

    fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Focus");
        ui.horizontal(|ui| {
            let field = ui.text_edit_singleline(&mut self.search);
            let submitted =
                field.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if (ui.button("Focus").clicked() || submitted)
                && !self.search.trim().is_empty()
                && self.session.focus_on_query(&self.search).is_none()
            {
                let message = format!("No match for \"{}\"", self.search.trim());
                self.announcements.announce(&message);
            }
        });
        ui.label(match self.session.focus_id() {
            Some(id) => format!("Centered on {id}"),
            None => "Centered on the best connected nodes".to_owned(),
        });
        if ui.button("Clear focus").clicked() {
            self.session.set_focus(None);
        }

        ui.separator();
        ui.heading("Sampling");
        let mut filter = self.session.settings().filter.clone();
        let node_limit = i64::try_from(self.session.dataset().node_count())
            .unwrap_or(i64::MAX)
            .max(1);
        let mut changed = false;
        changed |= ui
            .add(
                egui::Slider::new(&mut filter.max_visible_nodes, 0..=node_limit)
                    .text("Max visible nodes"),
            )
            .on_hover_text("Zero shows everything.")
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut filter.importance_threshold, 0.0..=1.0)
                    .text("Importance threshold"),
            )
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut filter.max_relationship_depth, 0..=4)
                    .text("Neighbor rings"),
            )
            .changed();
        if changed {
            self.session.set_filter(filter);
        }

        ui.separator();
        ui.heading("Display");
        let mut visual = self.session.settings().visual.clone();
        let mut changed = false;
        changed |= ui.checkbox(&mut visual.show_labels, "Labels").changed();
        changed |= ui
            .checkbox(&mut visual.show_relationship_labels, "Relationship labels")
            .changed();
        changed |= ui.checkbox(&mut visual.cluster_by_type, "Cluster by type").changed();
        changed |= ui.checkbox(&mut visual.dark_mode, "Dark mode").changed();
        changed |= ui
            .add(egui::Slider::new(&mut visual.node_size_base, 1.0..=20.0).text("Node size"))
            .changed();
        if changed {
            ctx_visuals(ui, visual.dark_mode);
            self.session.set_visual_settings(visual);
        }

        ui.separator();
        ui.heading("Layout");
        ui.horizontal(|ui| {
            let reveal = self.session.reveal_state();
            if ui
                .add_enabled(!reveal.is_complete(), egui::Button::new("Reveal all"))
                .clicked()
            {
                while self.session.reveal_more() {}
            }
            if ui.button("Settle now").clicked() {
                self.session.settle_now();
            }
        });

        ui.separator();
        ui.heading("Export");
        ui.horizontal(|ui| {
            for format in ExportFormat::ALL {
                if ui.button(format.extension().to_ascii_uppercase()).clicked() {
                    self.export_to_file(format);
                }
            }
        });
        if let Some(status) = &self.export_status {
            ui.small(status.as_str());
        }
    }

    fn export_path(&self, format: ExportFormat) -> PathBuf {
        let stem = self
            .dataset_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "graph".to_owned());
        self.dataset_path
            .with_file_name(format!("{stem}.export.{}", format.extension()))
    }

    fn export_to_file(&mut self, format: ExportFormat) {
        let path = self.export_path(format);
        let text = self.session.export(format);
        self.export_status = Some(match fs::write(&path, text) {
            Ok(()) => {
                info!(path = %path.display(), %format, "export written");
                format!("Wrote {}", path.display())
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "export failed");
                format!("Export failed: {error}")
            }
        });
    }

    fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Details");
        ui.add_space(6.0);

        let focused = self
            .session
            .focused()
            .and_then(|id| self.session.dataset().node(id))
            .cloned();
        match focused {
            Some(node) => {
                ui.label(RichText::new(node.display_name.as_str()).strong());
                ui.small(node.id.as_str());
                ui.label(format!("Type: {}", node.type_tag));
                if ui.button("Center sample here").clicked() {
                    self.session.set_focus(Some(&node.id));
                }
            }
            None => {
                ui.label("Click a node or press Tab to move focus.");
            }
        }

        ui.separator();
        let metrics = self.session.metrics();
        metrics_block(ui, "Dataset", &metrics.full);
        ui.add_space(4.0);
        metrics_block(ui, "Visible", &metrics.visible);
        ui.add_space(4.0);
        for (type_tag, count) in &metrics.visible.type_counts {
            ui.label(format!("{type_tag}: {count}"));
        }

        ui.separator();
        ui.label(RichText::new("Announcements").strong());
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in &self.announcements.entries {
                    ui.small(message.as_str());
                }
            });
    }
}

fn ctx_visuals(ui: &Ui, dark_mode: bool) {
    ui.ctx().set_visuals(if dark_mode {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    });
}
