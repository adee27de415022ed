//! Dashboard application entry point

use eframe::egui::{self, Color32, ColorImage, RichText, TextureOptions};
use image::DynamicImage;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::OcrController;
use crate::config::DisplaySettings;
use crate::dashboard::state::{ControlValues, DashboardState, PanelTexture};
use crate::dashboard::theme::{self, ThemeColors};
use crate::error::WorkbenchError;
use crate::shared::{AppPhase, RecognitionResult};
use crate::vision::{fit_for_display, ConfigUpdate, OcrLanguage, PreprocessMethod};

/// User intent collected while drawing a frame, applied afterwards
#[derive(Debug, Clone)]
enum UiAction {
    Load(String),
    Configure(ConfigUpdate),
    SetLanguage(OcrLanguage),
    Recognize,
    Unload,
    DismissError,
}

/// The main dashboard application
pub struct DashboardApp {
    controller: OcrController,
    dashboard_state: DashboardState,
    display: DisplaySettings,
    theme_applied: bool,
}

impl DashboardApp {
    /// Create a new dashboard around a controller
    pub fn new(controller: OcrController, display: DisplaySettings) -> Self {
        let dashboard_state = DashboardState::new(controller.config(), controller.language());
        Self {
            controller,
            dashboard_state,
            display,
            theme_applied: false,
        }
    }

    /// Create eframe options for the dashboard window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1200.0, 800.0])
                .with_min_inner_size([1000.0, 700.0])
                .with_title("OCR Workbench"),
            ..Default::default()
        }
    }

    /// Apply one action to the controller
    fn apply(&mut self, action: UiAction) {
        debug!("UI action: {:?}", action);
        let outcome: Result<(), WorkbenchError> = match action {
            UiAction::Load(path) => self.controller.load_image(path.trim()),
            UiAction::Configure(update) => {
                self.controller.set_config(update);
                Ok(())
            }
            UiAction::SetLanguage(language) => {
                self.controller.set_language(language);
                Ok(())
            }
            UiAction::Recognize => {
                let language = self.controller.language();
                self.controller.request_recognition(language).map(|_| ())
            }
            UiAction::Unload => {
                self.controller.unload();
                Ok(())
            }
            UiAction::DismissError => {
                self.dashboard_state.error_popup = None;
                self.controller.clear_error();
                Ok(())
            }
        };

        match outcome {
            // Busy is an expected signal, shown on the status line only
            Err(WorkbenchError::Busy) => {}
            Err(e) => self.dashboard_state.error_popup = Some(e.to_string()),
            Ok(()) => {}
        }

        // Sliders always show the normalised values (even sizes snap to odd)
        self.dashboard_state.controls =
            ControlValues::from_config(self.controller.config(), self.controller.language());
    }

    /// Re-upload image textures whose store revision changed
    fn sync_textures(&mut self, ctx: &egui::Context) {
        let store = self.controller.store();
        let max_w = self.display.max_width;
        let max_h = self.display.max_height;

        let source_stale = self
            .dashboard_state
            .source_texture
            .as_ref()
            .map(|t| t.revision != store.source_revision())
            .unwrap_or(true);
        if source_stale {
            self.dashboard_state.source_texture = store.source().map(|image| PanelTexture {
                handle: ctx.load_texture(
                    "source",
                    to_color_image(&fit_for_display(image, max_w, max_h)),
                    TextureOptions::LINEAR,
                ),
                revision: store.source_revision(),
            });
        }

        let preview_stale = self
            .dashboard_state
            .preview_texture
            .as_ref()
            .map(|t| t.revision != store.preview_revision())
            .unwrap_or(true);
        if preview_stale {
            self.dashboard_state.preview_texture = store.preprocessed().map(|gray| {
                let fitted = fit_for_display(&DynamicImage::ImageLuma8((**gray).clone()), max_w, max_h);
                PanelTexture {
                    handle: ctx.load_texture("preview", to_color_image(&fitted), TextureOptions::LINEAR),
                    revision: store.preview_revision(),
                }
            });
        }
    }
}

/// Convert an image into an egui texture source
fn to_color_image(image: &DynamicImage) -> ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    match image {
        DynamicImage::ImageLuma8(gray) => ColorImage::from_gray(size, gray.as_raw()),
        other => ColorImage::from_rgba_unmultiplied(size, other.to_rgba8().as_raw()),
    }
}

fn render_controls(ui: &mut egui::Ui, state: &mut DashboardState, phase: AppPhase, actions: &mut Vec<UiAction>) {
    ui.horizontal(|ui| {
        ui.label("Image:");
        let field = ui.add(egui::TextEdit::singleline(&mut state.path_input).desired_width(320.0));
        let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if (ui.button("Load").clicked() || submitted) && !state.path_input.trim().is_empty() {
            actions.push(UiAction::Load(state.path_input.clone()));
        }

        ui.separator();

        let mut method = state.controls.method;
        egui::ComboBox::from_label("Method")
            .selected_text(method.name())
            .show_ui(ui, |ui| {
                for candidate in PreprocessMethod::ALL {
                    ui.selectable_value(&mut method, candidate, candidate.name());
                }
            });
        if method != state.controls.method {
            actions.push(UiAction::Configure(ConfigUpdate::method(method)));
        }

        let mut language = state.controls.language;
        egui::ComboBox::from_label("Language")
            .selected_text(language.tag())
            .show_ui(ui, |ui| {
                for candidate in OcrLanguage::ALL {
                    ui.selectable_value(&mut language, candidate, candidate.tag());
                }
            });
        if language != state.controls.language {
            actions.push(UiAction::SetLanguage(language));
        }

        ui.separator();

        let can_recognize = phase == AppPhase::Loaded;
        if ui.add_enabled(can_recognize, egui::Button::new("Recognize")).clicked() {
            actions.push(UiAction::Recognize);
        }
        if ui.add_enabled(phase != AppPhase::Idle, egui::Button::new("Unload")).clicked() {
            actions.push(UiAction::Unload);
        }
        if phase == AppPhase::Recognizing {
            ui.spinner();
        }
    });

    ui.horizontal(|ui| {
        let method = state.controls.method;
        let controls = &mut state.controls;

        let threshold = ui.add_enabled(
            method.uses_threshold(),
            egui::Slider::new(&mut controls.threshold, 0..=255).text("Threshold"),
        );
        if threshold.changed() {
            actions.push(UiAction::Configure(ConfigUpdate::threshold(controls.threshold)));
        }

        let blur = ui.add_enabled(
            method.uses_blur_size(),
            egui::Slider::new(&mut controls.blur_size, 1..=21).text("Blur size"),
        );
        if blur.changed() {
            actions.push(UiAction::Configure(ConfigUpdate::blur_size(controls.blur_size)));
        }

        let morph = ui.add_enabled(
            method.uses_morph_size(),
            egui::Slider::new(&mut controls.morph_size, 1..=21).text("Morph size"),
        );
        if morph.changed() {
            actions.push(UiAction::Configure(ConfigUpdate::morph_size(controls.morph_size)));
        }
    });
}

fn render_image_panel(ui: &mut egui::Ui, title: &str, texture: Option<&PanelTexture>) {
    ui.heading(title);
    egui::Frame::none()
        .fill(ThemeColors::BG_CANVAS)
        .inner_margin(6.0)
        .show(ui, |ui| match texture {
            Some(texture) => {
                let available = ui.available_size();
                ui.add(egui::Image::from_texture(&texture.handle).max_size(available));
            }
            None => {
                ui.label(RichText::new("No image").italics().color(ThemeColors::TEXT_MUTED));
            }
        });
}

fn render_result(ui: &mut egui::Ui, result: Option<&RecognitionResult>) {
    ui.horizontal(|ui| {
        ui.heading("OCR Result");
        if let Some(text) = result.and_then(RecognitionResult::text) {
            if ui.add_enabled(!text.is_empty(), egui::Button::new("Copy")).clicked() {
                ui.ctx().copy_text(text.to_string());
            }
        }
    });
    ui.separator();
    match result {
        Some(RecognitionResult::Text { text, elapsed }) => {
            ui.label(
                RichText::new(format!("{} characters in {:.2} s", text.chars().count(), elapsed.as_secs_f64()))
                    .color(ThemeColors::SUCCESS),
            );
            egui::ScrollArea::vertical().show(ui, |ui| {
                let mut view: &str = text;
                ui.add(
                    egui::TextEdit::multiline(&mut view)
                        .font(egui::TextStyle::Heading)
                        .desired_width(f32::INFINITY),
                );
            });
        }
        Some(RecognitionResult::Error { description }) => {
            ui.label(RichText::new(description).color(ThemeColors::ERROR));
        }
        None => {
            ui.label(RichText::new("Run OCR to see text here").italics().color(ThemeColors::TEXT_MUTED));
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        // Worker results are only ever applied here, on the UI thread
        if self.controller.poll_results() {
            if let Some(RecognitionResult::Error { description }) =
                self.controller.last_result().filter(|r| r.is_error())
            {
                self.dashboard_state.error_popup = Some(format!("OCR failed: {}", description));
            }
        }

        self.sync_textures(ctx);

        let phase = self.controller.phase();
        let mut actions = Vec::new();

        let dropped: Vec<_> = ctx.input(|i| i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect());
        if let Some(path) = dropped.into_iter().next() {
            self.dashboard_state.path_input = path.display().to_string();
            actions.push(UiAction::Load(self.dashboard_state.path_input.clone()));
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            render_controls(ui, &mut self.dashboard_state, phase, &mut actions);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let runtime = self.controller.runtime();
                let color = if runtime.last_error.is_some() {
                    ThemeColors::ERROR
                } else if phase == AppPhase::Recognizing {
                    ThemeColors::WARNING
                } else {
                    ThemeColors::TEXT
                };
                ui.label(RichText::new(&runtime.status).color(color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let phase_text = match self.controller.current_job() {
                        Some(job) => format!("{} ({})", phase.label(), job),
                        None => phase.label().to_string(),
                    };
                    ui.label(
                        RichText::new(format!("{} | {}", phase_text, self.controller.backend_name()))
                            .color(ThemeColors::TEXT_MUTED),
                    );
                    if let Some(path) = self.controller.store().source_path() {
                        ui.separator();
                        ui.label(RichText::new(path.display().to_string()).color(ThemeColors::TEXT_MUTED));
                    }
                });
            });
        });

        egui::SidePanel::right("result")
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| {
                let title = match self.controller.last_preview() {
                    Some(stats) => format!(
                        "Preprocessed: {} ({:.1} ms)",
                        stats.config.method().name(),
                        stats.duration.as_secs_f64() * 1000.0
                    ),
                    None => "Preprocessed".to_string(),
                };
                render_image_panel(ui, &title, self.dashboard_state.preview_texture.as_ref());
                ui.add_space(8.0);
                render_result(ui, self.controller.last_result());
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.controller.store().has_image() {
                render_image_panel(ui, "Original", self.dashboard_state.source_texture.as_ref());
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        RichText::new("Enter an image path above or drop a file here")
                            .color(ThemeColors::TEXT_MUTED),
                    );
                });
            }
        });

        if let Some(message) = self.dashboard_state.error_popup.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(RichText::new(message).color(Color32::WHITE));
                    if ui.button("OK").clicked() {
                        actions.push(UiAction::DismissError);
                    }
                });
        }

        for action in actions {
            self.apply(action);
        }

        // Keep polling the worker while a job is out
        if self.controller.phase() == AppPhase::Recognizing {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Run the dashboard application
pub fn run_dashboard(controller: OcrController, display: DisplaySettings) -> Result<(), eframe::Error> {
    info!("Starting dashboard");
    let app = DashboardApp::new(controller, display);
    eframe::run_native(
        "OCR Workbench",
        DashboardApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
