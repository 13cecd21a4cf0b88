// ============================================================================
// COMPOSITOR: background, overlay and text, painted into one RGBA buffer
// ============================================================================
//
// Paint order is fixed; later steps occlude earlier ones:
//   1. clear   2. photo (cover-fit) or flat background   3. overlay (cover-fit)
//   4. text (shadow first, then fill)   5. reset scratch state
//
// Painting is deterministic: the same inputs always produce the same pixels.

use ab_glyph::FontArc;
use image::RgbaImage;

use crate::canvas::{self, CanvasFrame};
use crate::editor::{EditorState, RasterImage, TextStyle};
use crate::ops::filters::{blur_coverage, shadow_sigma};
use crate::ops::text::{FontMeasure, GlyphPixelCache, layout_block, rasterize_lines};

/// Owns the font and the scratch buffers reused between paints.
pub struct Compositor {
    font: Option<FontArc>,
    glyph_cache: GlyphPixelCache,
    coverage: Vec<f32>,
}

impl Compositor {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            glyph_cache: GlyphPixelCache::new(),
            coverage: Vec::new(),
        }
    }

    /// Swap the font. Cached glyphs belong to the old one and are dropped.
    pub fn set_font(&mut self, font: Option<FontArc>) {
        self.font = font;
        self.glyph_cache.clear();
    }

    /// Paint into a freshly allocated buffer of `frame` size.
    pub fn paint(
        &mut self,
        frame: CanvasFrame,
        text: &str,
        style: &TextStyle,
        photo: Option<&RasterImage>,
        overlay: Option<&RasterImage>,
    ) -> RgbaImage {
        let mut target = frame.new_buffer();
        self.paint_into(&mut target, text, style, photo, overlay);
        target
    }

    /// Paint the whole editor state at `frame` size.
    pub fn paint_state(&mut self, frame: CanvasFrame, state: &EditorState) -> RgbaImage {
        self.paint(
            frame,
            &state.text,
            &state.style,
            state.photo.as_ref(),
            state.overlay_image(),
        )
    }

    /// Paint into an existing buffer; its dimensions are the frame.
    /// A zero-sized buffer is left untouched.
    pub fn paint_into(
        &mut self,
        target: &mut RgbaImage,
        text: &str,
        style: &TextStyle,
        photo: Option<&RasterImage>,
        overlay: Option<&RasterImage>,
    ) {
        let frame = CanvasFrame::new(target.width(), target.height());
        if frame.is_empty() {
            return;
        }

        canvas::clear(target);

        match photo {
            Some(photo) => canvas::draw_cover(target, photo.pixels()),
            None => canvas::fill(target, style.background),
        }

        if let Some(overlay) = overlay {
            canvas::draw_cover(target, overlay.pixels());
        }

        self.paint_text(target, frame, text, style);
        self.reset_transient();
    }

    fn paint_text(&mut self, target: &mut RgbaImage, frame: CanvasFrame, text: &str, style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        let Some(font) = self.font.as_ref() else {
            crate::log_warn!("No font loaded; skipping text");
            return;
        };

        let layout = layout_block(text, frame, style, &FontMeasure::new(font, style.font_size));
        if layout.is_empty() {
            return;
        }

        rasterize_lines(
            font,
            style.font_size,
            &layout,
            frame,
            &mut self.coverage,
            &mut self.glyph_cache,
        );

        if let Some(shadow) = style.shadow
            && shadow.color[3] > 0
        {
            let sigma = shadow_sigma(shadow.blur);
            let blurred;
            let mask: &[f32] = if sigma > 0.0 {
                blurred = blur_coverage(
                    &self.coverage,
                    frame.width as usize,
                    frame.height as usize,
                    sigma,
                );
                &blurred
            } else {
                &self.coverage
            };
            canvas::composite_coverage(
                target,
                mask,
                shadow.color,
                shadow.offset_x.round() as i32,
                shadow.offset_y.round() as i32,
            );
        }

        canvas::composite_coverage(target, &self.coverage, style.color, 0, 0);
    }

    /// Drop per-paint state so nothing carries over into the next call.
    fn reset_transient(&mut self) {
        self.coverage.clear();
    }
}

/// One-shot paint with a throwaway compositor.
pub fn paint(
    frame: CanvasFrame,
    text: &str,
    style: &TextStyle,
    photo: Option<&RasterImage>,
    overlay: Option<&RasterImage>,
    font: Option<&FontArc>,
) -> RgbaImage {
    Compositor::new(font.cloned()).paint(frame, text, style, photo, overlay)
}
