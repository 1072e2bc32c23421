use std::path::PathBuf;
use std::sync::Arc;

use egui::{self, Color32, Layout, Rounding, Stroke};

use wavescope::render::Frame;
use wavescope::settings::ScopeSettings;
use wavescope::{RenderLoop, Waveform, WaveformGenerator};

const ACCENT: Color32 = Color32::from_rgb(240, 255, 255);
const GRID_STEPS: usize = 10;
const SCOPE_HEIGHT: f32 = 320.0;

pub struct ScopeApp {
    generator: Arc<WaveformGenerator>,
    scope: RenderLoop,
    settings_path: PathBuf,
    settings: ScopeSettings,
    running: bool,
    paused: bool,
    config_error: Option<String>,
}

impl ScopeApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        generator: Arc<WaveformGenerator>,
        scope: RenderLoop,
        settings_path: PathBuf,
        settings: ScopeSettings,
    ) -> Self {
        apply_theme(&cc.egui_ctx);
        Self {
            generator,
            scope,
            settings_path,
            settings,
            running: false,
            paused: false,
            config_error: None,
        }
    }

    fn set_running(&mut self, running: bool) {
        if running {
            if let Err(err) = self.generator.start() {
                self.running = false;
                self.config_error = Some(err.to_string());
            }
        } else {
            self.generator.stop();
        }
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(self.settings.frame_interval());
        let frame = self.scope.tick();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.strong("Oscilloscope");
                ui.separator();
                ui.label(format!(
                    "{} Hz · {} samples/block",
                    self.settings.sample_rate, self.settings.block_size
                ));
                ui.with_layout(Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(status_line(&self.generator, &frame));
                });
            });
            ui.add_space(6.0);

            card(ui, "Scope", |ui| draw_scope(ui, &frame));
            ui.add_space(8.0);

            let mut changed = false;
            ui.columns(2, |columns| {
                columns[0].vertical(|ui| {
                    card(ui, "Waveform", |ui| {
                        changed |= waveform_selector(ui, &self.generator, &mut self.settings)
                    })
                });
                columns[1].vertical(|ui| {
                    card(ui, "Signal", |ui| {
                        changed |= signal_controls(
                            ui,
                            &self.generator,
                            &mut self.settings,
                            &mut self.config_error,
                        )
                    })
                });
            });
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                if ui.toggle_value(&mut self.running, "Run").changed() {
                    let running = self.running;
                    self.set_running(running);
                }
                if ui.toggle_value(&mut self.paused, "Pause").changed() {
                    self.generator.pause(self.paused);
                }
            });

            if changed {
                if let Err(err) = self.settings.save(&self.settings_path) {
                    log::warn!("could not save settings: {err}");
                }
            }

            if let Some(err) = &self.config_error {
                ui.colored_label(Color32::RED, err.as_str());
            }
        });
    }
}

fn status_line(generator: &WaveformGenerator, frame: &Frame) -> String {
    let state = match (generator.is_running(), generator.is_paused()) {
        (false, _) => "stopped",
        (true, true) => "paused",
        (true, false) => "running",
    };
    let dropped = generator.queue().dropped();
    match frame.backlog {
        Some(backlog) => format!("{state} · backlog {backlog} · dropped {dropped}"),
        None => format!("{state} · dropped {dropped}"),
    }
}

fn waveform_selector(
    ui: &mut egui::Ui,
    generator: &WaveformGenerator,
    settings: &mut ScopeSettings,
) -> bool {
    let before = settings.waveform;
    ui.horizontal_wrapped(|ui| {
        for waveform in Waveform::ALL {
            ui.selectable_value(&mut settings.waveform, waveform, waveform.label());
        }
    });
    if settings.waveform != before {
        generator.set_waveform(settings.waveform);
        true
    } else {
        false
    }
}

fn signal_controls(
    ui: &mut egui::Ui,
    generator: &WaveformGenerator,
    settings: &mut ScopeSettings,
    config_error: &mut Option<String>,
) -> bool {
    let mut changed = false;

    let mut frequency = settings.frequency;
    let response = ui.add(
        egui::Slider::new(&mut frequency, 1.0..=500.0)
            .logarithmic(true)
            .text("Frequency (Hz)"),
    );
    if response.changed() {
        match generator.set_frequency(frequency) {
            Ok(()) => {
                settings.frequency = frequency;
                *config_error = None;
                changed = true;
            }
            Err(err) => *config_error = Some(err.to_string()),
        }
    }

    let mut amplitude = settings.amplitude;
    let response = ui.add(egui::Slider::new(&mut amplitude, 0.0..=1.0).text("Amplitude"));
    if response.changed() {
        match generator.set_amplitude(amplitude) {
            Ok(()) => {
                settings.amplitude = amplitude;
                *config_error = None;
                changed = true;
            }
            Err(err) => *config_error = Some(err.to_string()),
        }
    }

    changed
}

fn draw_scope(ui: &mut egui::Ui, frame: &Frame) {
    let desired = egui::vec2(ui.available_width().max(200.0), SCOPE_HEIGHT);
    let (rect, _) = ui.allocate_exact_size(desired, egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect(
        rect,
        Rounding::same(6.0),
        Color32::from_rgb(26, 26, 26),
        Stroke::new(1.0, ui.visuals().weak_text_color()),
    );

    let grid = Stroke::new(0.5, Color32::from_rgba_unmultiplied(255, 255, 240, 76));
    for i in 0..=GRID_STEPS {
        let t = i as f32 / GRID_STEPS as f32;
        let x = egui::lerp(rect.x_range(), t);
        let y = egui::lerp(rect.y_range(), t);
        painter.line_segment([egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)], grid);
        painter.line_segment([egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())], grid);
    }

    let Some(first) = frame.segments.first() else {
        return;
    };
    let to_screen = |p: wavescope::Point| {
        egui::pos2(
            egui::lerp(rect.x_range(), p.x),
            egui::lerp(rect.y_range(), 1.0 - p.y),
        )
    };
    let mut points = Vec::with_capacity(frame.segments.len() + 1);
    points.push(to_screen(first.from));
    points.extend(frame.segments.iter().map(|segment| to_screen(segment.to)));
    painter.add(egui::Shape::line(points, Stroke::new(2.0, ACCENT)));
}

fn card(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::none()
        .fill(Color32::from_rgb(35, 35, 37))
        .stroke(Stroke::new(1.0, Color32::from_rgb(55, 55, 58)))
        .rounding(Rounding::same(8.0))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(Color32::from_rgb(240, 128, 128), title);
                ui.add_space(6.0);
                ui.separator();
            });
            ui.add_space(6.0);
            add_contents(ui);
        });
}

fn apply_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::dark();
    style.visuals.override_text_color = Some(Color32::from_rgb(255, 255, 240));
    style.visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(35, 35, 37);
    style.visuals.widgets.inactive.bg_fill = Color32::from_rgb(48, 48, 50);
    style.visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, Color32::from_rgb(70, 70, 72));
    style.visuals.widgets.hovered.bg_fill = Color32::from_rgb(240, 128, 128);
    style.visuals.selection.bg_fill = Color32::from_rgb(255, 160, 122);
    style.visuals.selection.stroke = Stroke::new(1.0, Color32::from_rgb(20, 20, 20));
    style.visuals.window_fill = Color32::from_rgb(35, 35, 37);
    ctx.set_style(style);
}
