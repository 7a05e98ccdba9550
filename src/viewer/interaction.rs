use eframe::egui::{self, Key, Rect, Ui, Vec2};
use graph_lens::NavigationCommand;

use super::ViewModel;

impl ViewModel {
    pub(super) fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);

        let mut viewport = self.session.viewport();
        viewport.zoom_around(rect.center().to_vec2(), pointer.to_vec2(), zoom_factor);
        self.session.set_viewport(viewport);
    }

    pub(super) fn handle_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            let mut viewport = self.session.viewport();
            viewport.pan += response.drag_delta();
            self.session.set_viewport(viewport);
        }
    }

    fn pointer_world(&self, ui: &Ui, origin: Vec2) -> Option<Vec2> {
        let pointer = ui.input(|input| input.pointer.interact_pos())?;
        Some(self.session.viewport().screen_to_world(origin, pointer.to_vec2()))
    }

    /// Primary-button drags pin the node under the pointer until release.
    pub(super) fn handle_node_drag(&mut self, ui: &Ui, origin: Vec2, response: &egui::Response) {
        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(world) = self.pointer_world(ui, origin)
            && let Some(id) = self.session.pick(world).map(str::to_owned)
            && self.session.begin_drag(&id, world)
        {
            self.dragging = Some(id);
        }

        let Some(id) = self.dragging.clone() else {
            return;
        };

        if response.drag_stopped() {
            self.session.end_drag(&id);
            self.dragging = None;
        } else if response.dragged_by(egui::PointerButton::Primary)
            && let Some(world) = self.pointer_world(ui, origin)
        {
            self.session.drag_to(&id, world);
            ui.ctx().request_repaint();
        }
    }

    pub(super) fn handle_click(&mut self, ui: &Ui, origin: Vec2, response: &egui::Response) {
        if !response.clicked_by(egui::PointerButton::Primary) {
            return;
        }

        let hit = self
            .pointer_world(ui, origin)
            .and_then(|world| self.session.pick(world))
            .map(str::to_owned);
        self.session
            .select(hit.as_deref(), &mut self.announcements, &mut ());
    }

    pub(super) fn handle_keyboard(&mut self, ui: &Ui) {
        if ui.ctx().wants_keyboard_input() {
            return;
        }

        let command = ui.input(|input| {
            let backwards = input.modifiers.shift;
            if input.key_pressed(Key::Tab) {
                Some(if backwards {
                    NavigationCommand::Previous
                } else {
                    NavigationCommand::Next
                })
            } else if input.key_pressed(Key::ArrowRight) || input.key_pressed(Key::ArrowDown) {
                Some(NavigationCommand::Next)
            } else if input.key_pressed(Key::ArrowLeft) || input.key_pressed(Key::ArrowUp) {
                Some(NavigationCommand::Previous)
            } else if input.key_pressed(Key::Home) {
                Some(NavigationCommand::First)
            } else if input.key_pressed(Key::End) {
                Some(NavigationCommand::Last)
            } else if input.key_pressed(Key::N) {
                Some(NavigationCommand::NextRelated)
            } else if input.key_pressed(Key::Escape) {
                Some(NavigationCommand::Clear)
            } else {
                None
            }
        });

        if let Some(command) = command {
            self.session
                .navigate(command, &mut self.announcements, &mut ());
        }
    }
}
