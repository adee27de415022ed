//! Dashboard styling
//!
//! Neutral dark palette so the black/white preprocessing previews stand out.

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Workbench color palette
pub struct ThemeColors;

impl ThemeColors {
    pub const BG_PANEL: Color32 = Color32::from_rgb(24, 25, 28);
    pub const BG_WIDGET: Color32 = Color32::from_rgb(40, 42, 47);
    pub const BG_HOVER: Color32 = Color32::from_rgb(54, 57, 64);
    /// Backdrop behind image panels
    pub const BG_CANVAS: Color32 = Color32::from_rgb(60, 60, 60);

    pub const ACCENT: Color32 = Color32::from_rgb(90, 160, 250);
    pub const SUCCESS: Color32 = Color32::from_rgb(80, 200, 120);
    pub const WARNING: Color32 = Color32::from_rgb(240, 190, 60);
    pub const ERROR: Color32 = Color32::from_rgb(230, 80, 70);

    pub const TEXT: Color32 = Color32::from_rgb(235, 235, 240);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(150, 150, 160);
}

/// Install the workbench style on the egui context
pub fn apply_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = Visuals::dark();

    visuals.panel_fill = ThemeColors::BG_PANEL;
    visuals.window_fill = ThemeColors::BG_PANEL;
    visuals.extreme_bg_color = ThemeColors::BG_CANVAS;

    for widget in [
        &mut visuals.widgets.inactive,
        &mut visuals.widgets.hovered,
        &mut visuals.widgets.active,
        &mut visuals.widgets.open,
    ] {
        widget.rounding = Rounding::same(4.0);
        widget.fg_stroke = Stroke::new(1.0, ThemeColors::TEXT);
    }
    visuals.widgets.inactive.bg_fill = ThemeColors::BG_WIDGET;
    visuals.widgets.hovered.bg_fill = ThemeColors::BG_HOVER;
    visuals.widgets.active.bg_fill = ThemeColors::ACCENT;

    visuals.selection.stroke = Stroke::new(1.0, ThemeColors::ACCENT);
    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.text_styles = [
        (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(15.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
    ]
    .into();

    ctx.set_style(style);
}
