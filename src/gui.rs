// src/gui.rs
use anyhow::Result;
use eframe::egui;
use egui::{Color32, Pos2, RichText, ScrollArea, Sense, Stroke, Ui};
use log::{error, info};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

#[cfg(feature = "clipboard")]
use arboard::Clipboard;

use crate::ai::connector::{display_text, Solver};
use crate::sketch::canvas::{Point, SketchCanvas, BACKGROUND, INK};

const ANSWER_PANEL_WIDTH: f32 = 380.0;
const ACCENT: Color32 = Color32::from_rgb(0xa6, 0x7a, 0x16);

struct Answer {
    text: String,
    failed: bool,
    produced_at: chrono::DateTime<chrono::Local>,
}

struct ThreadSafeState {
    processing: bool,
    answer: Option<Answer>,
}

pub struct CalcSketchApp {
    was_style_initialized: bool,
    canvas: SketchCanvas,
    solver: Arc<dyn Solver>,
    prompt: String,
    canvas_path: PathBuf,
    state: Arc<Mutex<ThreadSafeState>>,
}

impl CalcSketchApp {
    pub fn new(solver: Arc<dyn Solver>, prompt: String, canvas_path: PathBuf) -> Self {
        Self {
            was_style_initialized: false,
            canvas: SketchCanvas::default(),
            solver,
            prompt,
            canvas_path,
            state: Arc::new(Mutex::new(ThreadSafeState { processing: false, answer: None })),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ThreadSafeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl eframe::App for CalcSketchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.was_style_initialized {
            let mut style = (*ctx.style()).clone();
            style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
            style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);
            style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
            style.text_styles.insert(
                egui::TextStyle::Body,
                egui::FontId::new(15.0, egui::FontFamily::Proportional)
            );
            style.text_styles.insert(
                egui::TextStyle::Heading,
                egui::FontId::new(26.0, egui::FontFamily::Proportional)
            );
            ctx.set_style(style);
            self.was_style_initialized = true;
        }

        let processing = self.lock_state().processing;
        if processing {
            // keep polling until the worker thread has stored the answer
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::SidePanel::right("answer_panel")
            .exact_width(ANSWER_PANEL_WIDTH)
            .show(ctx, |ui| self.draw_answer_panel(ui, processing));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(RichText::new("⚛ CalcSketch").color(ACCENT).strong());
            ui.add_space(6.0);
            self.draw_canvas(ui);
            ui.add_space(8.0);
            self.draw_toolbar(ui, processing);
        });
    }
}

impl CalcSketchApp {
    fn draw_canvas(&mut self, ui: &mut Ui) {
        let (width, height) = self.canvas.size();
        let available = ui.available_width().max(1.0);
        let scale = (available / width as f32).min(1.0);
        let size = egui::vec2(width as f32 * scale, height as f32 * scale);

        let (response, painter) = ui.allocate_painter(size, Sense::drag());
        let rect = response.rect;
        let to_canvas = |pos: Pos2| Point::new((pos.x - rect.min.x) / scale, (pos.y - rect.min.y) / scale);
        let to_screen = |point: &Point| egui::pos2(rect.min.x + point.x * scale, rect.min.y + point.y * scale);

        if response.drag_started() {
            self.canvas.begin_stroke();
        }
        if let Some(pos) = response.interact_pointer_pos() {
            self.canvas.extend_stroke(to_canvas(pos));
        }
        if response.drag_released() {
            self.canvas.end_stroke();
        }

        let [r, g, b] = BACKGROUND;
        painter.rect_filled(rect, 4.0, Color32::from_rgb(r, g, b));

        let [r, g, b] = INK;
        let ink = Stroke::new((self.canvas.stroke_width() * scale).max(1.0), Color32::from_rgb(r, g, b));
        for stroke in self.canvas.strokes() {
            match stroke.as_slice() {
                [] => {}
                [only] => {
                    painter.circle_filled(to_screen(only), ink.width / 2.0, ink.color);
                }
                points => {
                    painter.add(egui::Shape::line(points.iter().map(to_screen).collect(), ink));
                }
            }
        }

        if self.canvas.is_empty() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Draw a math problem here",
                egui::FontId::proportional(18.0),
                Color32::from_rgb(r, g, b).linear_multiply(0.4),
            );
        }
    }

    fn draw_toolbar(&mut self, ui: &mut Ui, processing: bool) {
        ui.horizontal(|ui| {
            let can_solve = !processing && !self.canvas.is_empty();
            if ui.add_enabled(can_solve, egui::Button::new(
                RichText::new("Solve").size(18.0).color(Color32::WHITE))
                .fill(Color32::from_rgb(0xd0, 0x30, 0x30))
                .min_size(egui::vec2(110.0, 36.0))
            ).clicked() {
                self.solve();
            }
            if ui.add_enabled(!self.canvas.is_empty(), egui::Button::new("↶ Undo")
                .min_size(egui::vec2(80.0, 36.0))
            ).clicked() {
                self.canvas.undo();
            }
            if ui.add_sized([80.0, 36.0], egui::Button::new("🗑 Clear")).clicked() {
                self.canvas.clear();
                info!("Canvas cleared.");
            }
            if ui.add_enabled(!self.canvas.is_empty(), egui::Button::new("💾 Save Sketch")
                .min_size(egui::vec2(120.0, 36.0))
            ).clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("PNG", &["png"]).set_file_name("sketch.png").save_file() {
                    if let Err(e) = self.canvas.save(&path) {
                        error!("Failed to save sketch: {}", e);
                    }
                }
            }
        });
        ui.add_space(4.0);
        ui.label(RichText::new(format!("Model: {}", self.solver.name())).small().weak());
    }

    fn draw_answer_panel(&mut self, ui: &mut Ui, processing: bool) {
        ui.add_space(10.0);
        ui.heading(RichText::new("Result").size(22.0));
        ui.separator();

        if processing {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Solving...");
            });
            return;
        }

        let latest = self.lock_state().answer.as_ref().map(|answer| {
            (answer.text.clone(), answer.failed, answer.produced_at.format("%H:%M").to_string())
        });
        let Some((text, failed, time_str)) = latest else {
            ui.label(RichText::new("Draw a problem and press Solve.").weak());
            return;
        };

        ui.label(RichText::new(time_str).small().color(Color32::from_rgb(130, 130, 130)));
        ScrollArea::vertical()
            .auto_shrink([false; 2])
            .max_height(ui.available_height() - 44.0)
            .show(ui, |ui| {
                let color = if failed { Color32::from_rgb(220, 90, 90) } else { ui.visuals().text_color() };
                ui.label(RichText::new(&text).color(color));
            });
        ui.add_space(6.0);
        if ui.add_sized([ui.available_width(), 32.0], egui::Button::new("📋 Copy Answer")).clicked() {
            self.copy_answer_to_clipboard(&text);
        }
    }

    fn solve(&mut self) {
        if self.canvas.is_empty() {
            info!("Nothing drawn, skipping solve.");
            return;
        }
        if let Err(e) = self.canvas.save(&self.canvas_path) {
            error!("Failed to write {}: {}", self.canvas_path.display(), e);
            self.lock_state().answer = Some(Answer {
                text: format!("Could not save the sketch: {}", e),
                failed: true,
                produced_at: chrono::Local::now(),
            });
            return;
        }

        self.lock_state().processing = true;
        let solver = Arc::clone(&self.solver);
        let state_clone = Arc::clone(&self.state);
        let prompt = self.prompt.clone();
        let image_path = self.canvas_path.clone();
        info!("Starting solve with {}", solver.name());

        thread::spawn(move || {
            // a panicking provider must still clear `processing`
            let (text, failed) = match panic::catch_unwind(AssertUnwindSafe(|| solver.solve(&image_path, &prompt))) {
                Ok(result) => {
                    match &result {
                        Ok(_) => info!("Solve complete."),
                        Err(e) => error!("Solve failed: {}", e),
                    }
                    (display_text(&result), result.is_err())
                }
                Err(_) => {
                    error!("Solver panicked");
                    ("The solver stopped unexpectedly. Please try again.".to_string(), true)
                }
            };
            let mut state_guard = state_clone.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state_guard.answer = Some(Answer {
                text,
                failed,
                produced_at: chrono::Local::now(),
            });
            state_guard.processing = false;
        });
    }

    fn copy_answer_to_clipboard(&self, text: &str) {
        #[cfg(feature = "clipboard")]
        {
            match Clipboard::new() {
                Ok(mut clipboard) => {
                    if let Err(e) = clipboard.set_text(text.to_string()) {
                        error!("Failed to copy answer to clipboard: {}", e);
                    } else {
                        info!("Answer copied to clipboard");
                    }
                }
                Err(e) => {
                    error!("Failed to access clipboard: {}", e);
                }
            }
        }
        #[cfg(not(feature = "clipboard"))]
        {
            let _ = text;
            error!("Clipboard feature not enabled. Enable the 'clipboard' feature in Cargo.toml");
        }
    }
}

pub fn run_gui(solver: Arc<dyn Solver>, prompt: String, canvas_path: PathBuf) -> Result<()> {
    info!("CalcSketch GUI starting up...");

    let native_options = eframe::NativeOptions {
        initial_window_size: Some(egui::vec2(800.0 + ANSWER_PANEL_WIDTH + 40.0, 640.0)),
        min_window_size: Some(egui::vec2(640.0, 480.0)),
        ..eframe::NativeOptions::default()
    };

    eframe::run_native(
        "CalcSketch",
        native_options,
        Box::new(move |_cc| {
            Box::new(CalcSketchApp::new(solver, prompt, canvas_path))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start GUI: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::connector::{SolveError, SolveResult};
    use std::path::Path;
    use std::time::{Duration, Instant};

    struct FixedSolver(SolveResult);

    impl Solver for FixedSolver {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn solve(&self, image_path: &Path, _prompt: &str) -> SolveResult {
            assert!(image_path.exists());
            self.0.clone()
        }
    }

    fn app_with(result: SolveResult, dir: &tempfile::TempDir) -> CalcSketchApp {
        let mut app = CalcSketchApp::new(Arc::new(FixedSolver(result)), "solve".to_string(), dir.path().join("canvas.png"));
        app.canvas.begin_stroke();
        app.canvas.extend_stroke(Point::new(10.0, 10.0));
        app.canvas.extend_stroke(Point::new(40.0, 40.0));
        app.canvas.end_stroke();
        app
    }

    fn wait_for_answer(app: &CalcSketchApp) -> (String, bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let state = app.lock_state();
                if let (false, Some(answer)) = (state.processing, &state.answer) {
                    return (answer.text.clone(), answer.failed);
                }
            }
            assert!(Instant::now() < deadline, "solve did not finish");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn solve_saves_canvas_and_stores_answer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Ok("$$x = 2$$".to_string()), &dir);

        app.solve();

        assert!(dir.path().join("canvas.png").exists());
        assert_eq!(wait_for_answer(&app), ("$$x = 2$$".to_string(), false));
    }

    #[test]
    fn failures_are_shown_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(
            Err(SolveError::Api { status: 429, message: "rate limited".to_string() }),
            &dir,
        );

        app.solve();

        let (text, failed) = wait_for_answer(&app);
        assert!(failed);
        assert!(text.contains("429") && text.contains("rate limited"));
    }

    struct PanickingSolver;

    impl Solver for PanickingSolver {
        fn name(&self) -> String {
            "panicking".to_string()
        }

        fn solve(&self, _image_path: &Path, _prompt: &str) -> SolveResult {
            panic!("provider blew up");
        }
    }

    #[test]
    fn panicking_solver_clears_processing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Ok("unused".to_string()), &dir);
        app.solver = Arc::new(PanickingSolver);

        app.solve();

        let (text, failed) = wait_for_answer(&app);
        assert!(failed);
        assert!(!text.is_empty());
        assert!(!app.lock_state().processing);
    }

    #[test]
    fn empty_canvas_does_not_solve() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Ok("unused".to_string()), &dir);
        app.canvas.clear();

        app.solve();

        assert!(!dir.path().join("canvas.png").exists());
        let state = app.lock_state();
        assert!(!state.processing);
        assert!(state.answer.is_none());
    }
}
