use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc;

use postcreator::assets::{AppSettings, OverlayEntry};
use postcreator::canvas::CanvasFrame;
use postcreator::compositor::Compositor;
use postcreator::editor::{
    EditorState, ImageSlot, LoadTicket, LoadTracker, RasterImage, SelectedOverlay, TextStyle,
    parse_font_size, parse_line_height, parse_padding_ratio,
};
use postcreator::io::{IMAGE_EXTENSIONS, LoadError, export_png, load_image_sync, render_export};
use postcreator::ops::text::{load_font_file, resolve_font};
use postcreator::viewport::ViewportScale;
use postcreator::{log_err, log_info, log_warn};

// ============================================================================
// ASYNC DECODE PIPELINE: photos and overlays decode on the rayon pool
// ============================================================================

/// Result delivered from a background decode.
pub struct LoadResult {
    pub ticket: LoadTicket,
    /// Overlay catalog name, or the photo's file name.
    pub label: String,
    pub outcome: Result<RasterImage, LoadError>,
}

/// Identifies what the current preview texture was painted from.
#[derive(Clone, Copy, PartialEq, Eq)]
struct PreviewKey {
    frame: CanvasFrame,
    generation: u64,
}

pub struct PostCreatorApp {
    settings: AppSettings,
    /// Replaced wholesale on every edit; see [`Self::update_state`].
    state: EditorState,
    /// Bumped with every state replacement so the preview knows to repaint.
    generation: u64,
    compositor: Compositor,

    loads: LoadTracker,
    load_sender: mpsc::Sender<LoadResult>,
    load_receiver: mpsc::Receiver<LoadResult>,

    // Raw form inputs; only validated values reach `state`
    font_size_input: String,
    padding_input: String,
    line_height_input: String,
    input_error: Option<String>,

    photo_name: Option<String>,
    /// Overlay the user picked last (may still be decoding).
    overlay_choice: Option<String>,

    preview: Option<egui::TextureHandle>,
    preview_key: Option<PreviewKey>,

    status: Option<String>,
}

impl PostCreatorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let style = settings.text_style();
        let font = resolve_font(settings.font_path.as_deref(), Some(settings.font_family.as_str()));
        let status = font.is_none().then(|| "No usable font found; text is hidden.".to_string());
        let (load_sender, load_receiver) = mpsc::channel();

        log_info!(
            "Editor ready: {} overlay(s) configured, font size {}",
            settings.overlays.len(),
            style.font_size
        );

        Self {
            font_size_input: style.font_size.to_string(),
            padding_input: style.padding_ratio.to_string(),
            line_height_input: style.line_height.to_string(),
            input_error: None,
            state: EditorState::new(style),
            generation: 0,
            compositor: Compositor::new(font),
            loads: LoadTracker::new(),
            load_sender,
            load_receiver,
            photo_name: None,
            overlay_choice: None,
            preview: None,
            preview_key: None,
            status,
            settings,
        }
    }

    /// Replace the editor state with a new value derived from the old one.
    fn update_state(&mut self, f: impl FnOnce(EditorState) -> EditorState) {
        self.state = f(std::mem::take(&mut self.state));
        self.generation += 1;
    }

    fn update_style(&mut self, f: impl FnOnce(&mut TextStyle)) {
        let mut style = self.state.style;
        f(&mut style);
        if style != self.state.style {
            self.update_state(|s| s.with_style(style));
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    fn start_load(&mut self, ctx: &egui::Context, slot: ImageSlot, path: PathBuf, label: String) {
        let ticket = self.loads.begin(slot);
        let sender = self.load_sender.clone();
        let ctx = ctx.clone();
        rayon::spawn(move || {
            let outcome = load_image_sync(&path);
            let _ = sender.send(LoadResult { ticket, label, outcome });
            ctx.request_repaint();
        });
    }

    fn poll_loads(&mut self) {
        while let Ok(result) = self.load_receiver.try_recv() {
            // Only the newest request per slot may land
            if !self.loads.accept(result.ticket) {
                log_info!("Discarding stale {:?} load \"{}\"", result.ticket.slot, result.label);
                continue;
            }
            match (result.ticket.slot, result.outcome) {
                (ImageSlot::Photo, Ok(image)) => {
                    log_info!("Photo loaded: {} ({}×{})", result.label, image.width(), image.height());
                    self.photo_name = Some(result.label);
                    self.update_state(|s| s.with_photo(Some(image)));
                    self.status = None;
                }
                (ImageSlot::Overlay, Ok(image)) => {
                    log_info!("Overlay loaded: {}", result.label);
                    let overlay = SelectedOverlay { name: result.label, image };
                    self.update_state(|s| s.with_overlay(Some(overlay)));
                    self.status = None;
                }
                (slot, Err(e)) => {
                    log_err!("Failed to load {:?} \"{}\": {}", slot, result.label, e);
                    self.status = Some(format!("Could not open {}: {}", result.label, e));
                    if slot == ImageSlot::Overlay {
                        // Dropdown goes back to what is actually shown
                        self.overlay_choice = self.state.overlay_name().map(str::to_string);
                    }
                }
            }
        }
    }

    fn pick_photo(&mut self, ctx: &egui::Context) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file()
        else {
            return;
        };
        let label = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "photo".to_string());
        self.start_load(ctx, ImageSlot::Photo, path, label);
    }

    fn remove_photo(&mut self) {
        self.loads.cancel(ImageSlot::Photo);
        self.photo_name = None;
        self.update_state(|s| s.with_photo(None));
    }

    fn select_overlay(&mut self, ctx: &egui::Context, entry: Option<OverlayEntry>) {
        match entry {
            None => {
                self.loads.cancel(ImageSlot::Overlay);
                self.overlay_choice = None;
                self.update_state(|s| s.with_overlay(None));
            }
            Some(entry) => {
                self.overlay_choice = Some(entry.name.clone());
                self.start_load(ctx, ImageSlot::Overlay, entry.path, entry.name);
            }
        }
    }

    fn pick_font(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Fonts", &["ttf", "otf"])
            .pick_file()
        else {
            return;
        };
        match load_font_file(&path) {
            Some(font) => {
                log_info!("Font loaded from {}", path.display());
                self.compositor.set_font(Some(font));
                self.generation += 1;
                self.status = None;
            }
            None => {
                log_warn!("Not a usable font: {}", path.display());
                self.status = Some(format!("{} is not a usable font.", path.display()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    fn save_image(&mut self) {
        let file_name = self.settings.export_name.file_name();
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .set_file_name(&file_name)
            .save_file()
        else {
            return;
        };
        self.status = Some(match export_png(&mut self.compositor, &self.state, &path) {
            Ok(_) => format!("Saved {}", path.display()),
            Err(e) => {
                log_err!("Export to {} failed: {}", path.display(), e);
                format!("Save failed: {}", e)
            }
        });
    }

    fn copy_to_clipboard(&mut self) {
        let image = render_export(&mut self.compositor, &self.state);
        let data = arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: std::borrow::Cow::Owned(image.into_raw()),
        };
        let result = arboard::Clipboard::new().and_then(|mut cb| cb.set_image(data));
        self.status = Some(match result {
            Ok(()) => "Copied to clipboard".to_string(),
            Err(e) => {
                log_err!("Clipboard copy failed: {}", e);
                format!("Copy failed: {}", e)
            }
        });
    }

    // ------------------------------------------------------------------
    // UI
    // ------------------------------------------------------------------

    fn controls_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Post Creator");
        ui.add_space(8.0);

        // -- Photo --------------------------------------------------------
        ui.horizontal(|ui| {
            if ui.button("Choose photo…").clicked() {
                self.pick_photo(ctx);
            }
            if self.state.photo.is_some() && ui.button("Remove").clicked() {
                self.remove_photo();
            }
        });
        if self.loads.is_pending(ImageSlot::Photo) {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Decoding photo…");
            });
        } else if let Some(name) = &self.photo_name {
            ui.weak(name);
        }

        // -- Overlay ------------------------------------------------------
        ui.add_space(6.0);
        let selected = self.overlay_choice.clone().unwrap_or_else(|| "None".to_string());
        let mut picked: Option<Option<OverlayEntry>> = None;
        egui::ComboBox::from_label("Overlay")
            .selected_text(selected)
            .show_ui(ui, |ui| {
                if ui.selectable_label(self.overlay_choice.is_none(), "None").clicked() {
                    picked = Some(None);
                }
                for entry in self.settings.overlays.entries() {
                    let is_selected = self.overlay_choice.as_deref() == Some(entry.name.as_str());
                    if ui.selectable_label(is_selected, &entry.name).clicked() {
                        picked = Some(Some(entry.clone()));
                    }
                }
            });
        if let Some(choice) = picked {
            self.select_overlay(ctx, choice);
        }

        // -- Text ---------------------------------------------------------
        ui.add_space(6.0);
        ui.label("Text");
        let mut text = self.state.text.clone();
        let response = ui.add(
            egui::TextEdit::multiline(&mut text)
                .desired_rows(5)
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            self.update_state(|s| s.with_text(text));
        }

        // -- Numeric style inputs ----------------------------------------
        ui.add_space(6.0);
        egui::Grid::new("style_grid").num_columns(2).show(ui, |ui| {
            ui.label("Font size");
            if ui.text_edit_singleline(&mut self.font_size_input).changed() {
                match parse_font_size(&self.font_size_input) {
                    Ok(v) => {
                        self.input_error = None;
                        self.update_style(|s| s.font_size = v);
                    }
                    Err(e) => self.input_error = Some(format!("Font size: {}", e)),
                }
            }
            ui.end_row();

            ui.label("Padding");
            if ui.text_edit_singleline(&mut self.padding_input).changed() {
                match parse_padding_ratio(&self.padding_input) {
                    Ok(v) => {
                        self.input_error = None;
                        self.update_style(|s| s.padding_ratio = v);
                    }
                    Err(e) => self.input_error = Some(format!("Padding: {}", e)),
                }
            }
            ui.end_row();

            ui.label("Line height");
            if ui.text_edit_singleline(&mut self.line_height_input).changed() {
                match parse_line_height(&self.line_height_input) {
                    Ok(v) => {
                        self.input_error = None;
                        self.update_style(|s| s.line_height = v);
                    }
                    Err(e) => self.input_error = Some(format!("Line height: {}", e)),
                }
            }
            ui.end_row();

            let mut style = self.state.style;
            ui.label("Text color");
            ui.color_edit_button_srgba_unmultiplied(&mut style.color.0);
            ui.end_row();

            ui.label("Background");
            ui.color_edit_button_srgba_unmultiplied(&mut style.background.0);
            ui.end_row();
            self.update_style(|s| *s = style);
        });
        if let Some(err) = &self.input_error {
            ui.colored_label(egui::Color32::from_rgb(200, 60, 60), err);
        }

        // -- Shadow -------------------------------------------------------
        ui.add_space(6.0);
        let mut enabled = self.state.style.shadow.is_some();
        if ui.checkbox(&mut enabled, "Drop shadow").changed() {
            let remembered = self.settings.shadow;
            self.update_style(|s| s.shadow = enabled.then_some(remembered));
        }
        if let Some(mut shadow) = self.state.style.shadow {
            ui.indent("shadow", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Color");
                    ui.color_edit_button_srgba_unmultiplied(&mut shadow.color.0);
                });
                ui.add(egui::Slider::new(&mut shadow.blur, 0.0..=60.0).text("Blur"));
                ui.add(egui::Slider::new(&mut shadow.offset_x, -40.0..=40.0).text("Offset X"));
                ui.add(egui::Slider::new(&mut shadow.offset_y, -40.0..=40.0).text("Offset Y"));
            });
            self.settings.shadow = shadow;
            self.update_style(|s| s.shadow = Some(shadow));
        }

        // -- Font ---------------------------------------------------------
        ui.add_space(6.0);
        if ui.button("Font file…").clicked() {
            self.pick_font();
        }

        // -- Output -------------------------------------------------------
        ui.separator();
        if ui.button("Save as Image").clicked() {
            self.save_image();
        }
        if ui.button("Copy to clipboard").clicked() {
            self.copy_to_clipboard();
        }

        if let Some(status) = &self.status {
            ui.add_space(6.0);
            ui.label(status);
        }
    }

    fn preview_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let area = ui.available_rect_before_wrap();
        let frame = CanvasFrame::default();
        let scale = ViewportScale::fit(frame, area.width(), area.height(), ctx.pixels_per_point());
        if scale.scale <= 0.0 {
            return;
        }

        // Repaint only when the inputs or the surface size changed
        let key = PreviewKey {
            frame: scale.backing_frame(frame),
            generation: self.generation,
        };
        if self.preview_key != Some(key) {
            let style = scale.preview_style(&self.state.style);
            let image = self.compositor.paint(
                key.frame,
                &self.state.text,
                &style,
                self.state.photo.as_ref(),
                self.state.overlay_image(),
            );
            let color_image = egui::ColorImage::from_rgba_unmultiplied(
                [image.width() as usize, image.height() as usize],
                image.as_raw(),
            );
            match &mut self.preview {
                Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.preview = Some(ctx.load_texture(
                        "post_preview",
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ))
                }
            }
            self.preview_key = Some(key);
        }

        if let Some(texture) = &self.preview {
            let (w, h) = scale.display_size(frame);
            let rect = egui::Rect::from_center_size(area.center(), egui::vec2(w, h));
            ui.painter().image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
    }
}

impl eframe::App for PostCreatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll async decode results ---
        self.poll_loads();

        egui::SidePanel::right("controls")
            .resizable(false)
            .min_width(300.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.controls_ui(ui, ctx);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.preview_ui(ui, ctx);
        });
    }
}
