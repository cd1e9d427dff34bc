//! egui chrome: menu bar, settings, page counter, jump dialog, import progress and
//! error messages.

use crate::preferences::{Preferences, MAX_TURN_SPEED, MIN_TURN_SPEED};
use egui::{Align, Align2, Color32, Layout, RichText};
use std::path::PathBuf;

/// Requests from the chrome, handled by the app after the frame's UI pass.
#[derive(Clone, Debug, PartialEq)]
pub enum UiAction {
    OpenBook(PathBuf),
    /// 1-based display page number.
    JumpToPage(i32),
    SavePreferences,
    LoadPreferences,
}

/// What the chrome shows about the current book.
#[derive(Clone, Debug, Default)]
pub struct BookStatus {
    pub loaded: bool,
    /// 1-based number of the leading page.
    pub leading_page: i32,
    pub display_count: i32,
    /// `Some(fraction)` while a book is being opened.
    pub loading: Option<f32>,
    /// The book is being decoded into the cache, not just read back from it.
    pub importing: bool,
}

/// Widget state that lives across frames.
#[derive(Default)]
pub struct UiState {
    pub open_path: String,
    jump_open: bool,
    jump_number: i32,
    pub error: Option<String>,
}

impl UiState {
    pub fn with_path(path: Option<&std::path::Path>) -> Self {
        Self {
            open_path: path.map(|p| p.display().to_string()).unwrap_or_default(),
            ..Self::default()
        }
    }
}

pub fn draw_ui(
    ctx: &egui::Context,
    state: &mut UiState,
    prefs: &mut Preferences,
    pad_after_first: &mut bool,
    status: &BookStatus,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.add(
                egui::TextEdit::singleline(&mut state.open_path)
                    .hint_text("image folder or .cbz")
                    .desired_width(280.0),
            );
            let can_open = status.loading.is_none() && !state.open_path.trim().is_empty();
            if ui
                .add_enabled(can_open, egui::Button::new("Open"))
                .on_hover_text("Import the book into the page cache and open it")
                .clicked()
            {
                actions.push(UiAction::OpenBook(PathBuf::from(state.open_path.trim())));
            }

            ui.menu_button("Settings", |ui| {
                settings_menu(ui, prefs, pad_after_first, &mut actions);
            });

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let counter = RichText::new(format!(
                    " {:3} / {:3} ",
                    status.leading_page, status.display_count
                ))
                .color(Color32::YELLOW);
                if ui.button(counter).clicked() && status.loaded {
                    state.jump_open = true;
                    state.jump_number = status.leading_page.max(1);
                }
            });
        });
    });

    if status.loaded && state.jump_open {
        jump_dialog(ctx, state, status.display_count, &mut actions);
    } else {
        state.jump_open = false;
    }

    if let Some(fraction) = status.loading {
        egui::Window::new("Opening book")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                if status.importing {
                    ui.label("Importing...");
                    ui.add(egui::ProgressBar::new(fraction).show_percentage());
                } else {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Reading cache...");
                    });
                }
            });
    }

    let mut dismissed = false;
    if let Some(message) = &state.error {
        egui::Window::new("Could not open book")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message.as_str());
                dismissed = ui.button("OK").clicked();
            });
    }
    if dismissed {
        state.error = None;
    }

    actions
}

fn settings_menu(
    ui: &mut egui::Ui,
    prefs: &mut Preferences,
    pad_after_first: &mut bool,
    actions: &mut Vec<UiAction>,
) {
    ui.label(RichText::new("Turning").strong());
    ui.checkbox(&mut prefs.page_flow_rtl, "Right-to-left page flow")
        .on_hover_text("Off for books read right to left, such as most manga.");
    ui.checkbox(pad_after_first, "Pad after first page")
        .on_hover_text("Insert a blank page after the cover to realign two-page spreads.");
    ui.add(
        egui::Slider::new(&mut prefs.auto_turn_page_speed, MIN_TURN_SPEED..=MAX_TURN_SPEED)
            .text("Turn speed"),
    );

    ui.separator();
    ui.label(RichText::new("Rendering").strong());
    ui.horizontal(|ui| {
        ui.color_edit_button_rgb(&mut prefs.background_color);
        ui.label("Background");
    });
    ui.checkbox(&mut prefs.eye_protection, "Eye protection");
    ui.add_enabled_ui(prefs.eye_protection, |ui| {
        ui.horizontal(|ui| {
            ui.color_edit_button_rgb(&mut prefs.eye_protection_color);
            ui.label("Tint");
        });
    });

    ui.separator();
    if ui.button("Save settings").clicked() {
        actions.push(UiAction::SavePreferences);
        ui.close_menu();
    }
    if ui.button("Load settings").clicked() {
        actions.push(UiAction::LoadPreferences);
        ui.close_menu();
    }
}

fn jump_dialog(ctx: &egui::Context, state: &mut UiState, display_count: i32, actions: &mut Vec<UiAction>) {
    let mut open = true;
    let mut done = false;
    egui::Window::new("Jump to page")
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .open(&mut open)
        .show(ctx, |ui| {
            ui.add(egui::DragValue::new(&mut state.jump_number).speed(1.0));
            state.jump_number = state.jump_number.clamp(1, display_count.max(1));
            ui.horizontal(|ui| {
                if ui.button("Go").clicked() {
                    actions.push(UiAction::JumpToPage(state.jump_number));
                    done = true;
                }
                if ui.button("Cancel").clicked() {
                    done = true;
                }
            });
        });
    state.jump_open = open && !done;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn frame(state: &mut UiState, prefs: &mut Preferences, status: &BookStatus) -> Vec<UiAction> {
        let ctx = egui::Context::default();
        let mut pad = false;
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = draw_ui(ctx, state, prefs, &mut pad, status);
        });
        actions
    }

    #[test]
    fn idle_frame_requests_nothing() {
        let mut state = UiState::with_path(Some(Path::new("books/vol1.cbz")));
        let mut prefs = Preferences::default();
        let status = BookStatus {
            loading: Some(0.5),
            ..BookStatus::default()
        };
        assert!(frame(&mut state, &mut prefs, &status).is_empty());
        assert_eq!(state.open_path, "books/vol1.cbz");
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn jump_dialog_needs_a_book() {
        let mut state = UiState::default();
        state.jump_open = true;
        let mut prefs = Preferences::default();
        frame(&mut state, &mut prefs, &BookStatus::default());
        assert!(!state.jump_open);
    }

    #[test]
    fn error_stays_until_dismissed() {
        let mut state = UiState {
            error: Some("document contains no pages".into()),
            ..UiState::default()
        };
        let mut prefs = Preferences::default();
        frame(&mut state, &mut prefs, &BookStatus::default());
        assert!(state.error.is_some());
    }
}
