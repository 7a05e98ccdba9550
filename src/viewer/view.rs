use eframe::egui::{self, Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Stroke, Ui, vec2};
use graph_lens::RenderFrame;
use graph_lens::theme::Rgb;

use super::ViewModel;

fn color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

fn translucent(rgb: Rgb, opacity: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(rgb[0], rgb[1], rgb[2], (opacity.clamp(0.0, 1.0) * 255.0) as u8)
}

fn draw_background(painter: &Painter, rect: Rect, frame: &RenderFrame, pan: egui::Vec2) {
    painter.rect_filled(rect, 0.0, color(frame.theme.background));

    let step = (56.0 * frame.lod.zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, translucent(frame.theme.grid, 0.27));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

impl ViewModel {
    pub(super) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let origin = rect.center().to_vec2();

        self.handle_zoom(ui, rect, &response);
        self.handle_pan(&response);
        self.handle_node_drag(ui, origin, &response);
        self.handle_click(ui, origin, &response);
        self.handle_keyboard(ui);

        let frame = self.session.frame();
        let viewport = self.session.viewport();
        let zoom = frame.lod.zoom;
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, &frame, viewport.pan);

        if !frame.layout_ready {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                format!("Laying out {} nodes...", frame.revealed),
                FontId::proportional(16.0),
                color(frame.theme.label),
            );
            return;
        }

        if frame.nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Nothing to show for the current filter.",
                FontId::proportional(14.0),
                color(frame.theme.label),
            );
            return;
        }

        let to_screen = |world| viewport.world_to_screen(origin, world).to_pos2();

        let link_stroke = Stroke::new(1.0, translucent(frame.theme.link, frame.lod.link_opacity));
        for link in &frame.links {
            let start = to_screen(link.source);
            let end = to_screen(link.target);
            if !rect.intersects(Rect::from_two_pos(start, end).expand(2.0)) {
                continue;
            }
            painter.line_segment([start, end], link_stroke);

            if let Some(label) = &link.label {
                painter.text(
                    start + (end - start) * 0.5,
                    Align2::CENTER_CENTER,
                    label,
                    FontId::proportional(frame.lod.label_font_size * zoom * 0.85),
                    translucent(frame.theme.label, 0.75),
                );
            }
        }

        let pointer = ui.input(|input| input.pointer.hover_pos());
        let mut hovered = None;

        for node in &frame.nodes {
            let position = to_screen(node.position);
            let radius = node.radius * zoom;
            if !circle_visible(rect, position, radius) {
                continue;
            }

            painter.circle_filled(position, radius, color(node.fill));
            painter.circle_stroke(
                position,
                radius,
                Stroke::new(node.stroke_width * zoom, color(node.stroke)),
            );
            if node.focused {
                painter.circle_stroke(
                    position,
                    radius + 4.0,
                    Stroke::new(1.5, translucent(frame.theme.emphasis, 0.6)),
                );
            }

            if let Some(label) = &node.label {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    label,
                    FontId::proportional(frame.lod.label_font_size * zoom),
                    color(frame.theme.label),
                );
            }

            if pointer.is_some_and(|pointer| pointer.distance(position) <= radius.max(4.0)) {
                hovered = Some(node);
            }
        }

        if let Some(node) = hovered {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
            let name = self
                .session
                .dataset()
                .node(&node.id)
                .map_or(node.id.as_str(), |full| full.display_name.as_str());
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{name}  |  {}  |  {}", node.type_tag, node.id),
                FontId::proportional(13.0),
                color(frame.theme.label),
            );
        }
    }
}
