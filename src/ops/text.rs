use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use std::collections::HashMap;
use std::path::Path;

use crate::canvas::CanvasFrame;
use crate::editor::{normalize_line_breaks, TextStyle};

/// Cache for rasterized glyph pixel data. Key: (GlyphId, scale_bits).
/// Value: (pixels as (u32, u32, f32), bounds_min_x_at_origin_zero, bounds_min_y_at_origin_zero).
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// Families tried, in order, when the configured one is unavailable.
pub const FALLBACK_FAMILIES: &[&str] = &[
    "Inter",
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
];

// ============================================================================
// MEASUREMENT
// ============================================================================

/// Width of a run of text in pixels, with the active font and size.
pub trait MeasureText {
    fn text_width(&self, text: &str) -> f32;
}

/// Font size (em, CSS px) → ab_glyph scale. ab_glyph scales by the
/// ascent-descent height, not the em square.
pub fn em_scale(font: &FontArc, font_size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(font_size * font.height_unscaled() / upem),
        _ => PxScale::from(font_size),
    }
}

/// Measures with a real font.
pub struct FontMeasure<'a> {
    font: &'a FontArc,
    scale: PxScale,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font: &'a FontArc, font_size: f32) -> Self {
        Self {
            font,
            scale: em_scale(font, font_size),
        }
    }
}

impl MeasureText for FontMeasure<'_> {
    fn text_width(&self, text: &str) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        let mut width = 0.0f32;
        let mut last: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            if let Some(prev) = last {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            last = Some(id);
        }
        width
    }
}

// ============================================================================
// WRAPPING & LAYOUT
// ============================================================================

/// Horizontal room for text: frame width minus padding on both sides.
pub fn available_width(frame_width: f32, padding_ratio: f32) -> f32 {
    frame_width - 2.0 * frame_width * padding_ratio
}

/// Greedy word wrap. Paragraphs (split on `\n`, `\r\n` or `\r`) wrap independently; words are
/// split on single spaces so re-joining reproduces the input exactly. A word
/// wider than `max_width` sits on its own line, unbroken. Empty text yields
/// no lines.
pub fn wrap_text(text: &str, max_width: f32, measure: &impl MeasureText) -> Vec<String> {
    let mut lines = Vec::new();
    if text.is_empty() {
        return lines;
    }
    let normalized;
    let text = if text.contains('\r') {
        normalized = normalize_line_breaks(text);
        normalized.as_str()
    } else {
        text
    };

    for paragraph in text.split('\n') {
        let mut words = paragraph.split(' ');
        let mut line = words.next().unwrap_or_default().to_string();

        for word in words {
            let candidate = format!("{} {}", line, word);
            if measure.text_width(&candidate) > max_width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }

    lines
}

/// Wrapped lines plus where to draw them. Derived on every paint.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutResult {
    pub lines: Vec<String>,
    /// Vertical middle of the first line.
    pub first_line_y: f32,
    pub line_height: f32,
    /// Horizontal centre shared by all lines.
    pub center_x: f32,
}

impl LayoutResult {
    /// Vertical middle of line `i`.
    pub fn line_y(&self, i: usize) -> f32 {
        self.first_line_y + i as f32 * self.line_height
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Wrap `text` for `frame` and center the block on the frame's middle:
/// line i sits at `h/2 − ((N−1)·lh)/2 + i·lh`.
pub fn layout_block(
    text: &str,
    frame: CanvasFrame,
    style: &TextStyle,
    measure: &impl MeasureText,
) -> LayoutResult {
    let max_width = available_width(frame.width as f32, style.padding_ratio);
    let lines = wrap_text(text, max_width, measure);
    let line_height = style.line_advance();
    let (center_x, center_y) = frame.center();
    let n = lines.len();
    let first_line_y = if n == 0 {
        center_y
    } else {
        center_y - ((n - 1) as f32 * line_height) * 0.5
    };

    LayoutResult {
        lines,
        first_line_y,
        line_height,
        center_x,
    }
}

// ============================================================================
// RASTERIZATION
// ============================================================================

/// Lay out one line centred on x = 0, returning glyph positions and total width.
fn layout_line(font: &FontArc, scale: PxScale, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(scale);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let offset = -cursor_x * 0.5;
    for glyph in &mut glyphs {
        glyph.1 += offset;
    }
    (glyphs, cursor_x)
}

/// Rasterize every line of `layout` into a single-channel coverage mask of
/// `frame` size. Each line is centred on `layout.center_x`; the middle of the
/// font's ascent/descent box sits on `layout.line_y(i)`.
pub fn rasterize_lines(
    font: &FontArc,
    font_size: f32,
    layout: &LayoutResult,
    frame: CanvasFrame,
    coverage: &mut Vec<f32>,
    glyph_cache: &mut GlyphPixelCache,
) {
    let (w, h) = (frame.width as usize, frame.height as usize);
    coverage.clear();
    coverage.resize(w * h, 0.0);
    if w == 0 || h == 0 || !(font_size > 0.0) {
        return;
    }

    let scale = em_scale(font, font_size);
    let scaled = font.as_scaled(scale);
    // descent is negative: the box spans [baseline - ascent, baseline - descent]
    let baseline_shift = (scaled.ascent() + scaled.descent()) * 0.5;
    let scale_key = scale.y.to_bits();
    // Keep only glyphs at the current size; previews repaint at every window size
    glyph_cache.retain(|&(_, key), _| key == scale_key);

    for (i, line) in layout.lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let origin_x = layout.center_x;
        let origin_y = layout.line_y(i) + baseline_shift;
        let (glyphs, _) = layout_line(font, scale, line);

        for (glyph_id, gx) in glyphs {
            let cache_key = (glyph_id, scale_key);

            // Glyphs are cached at position (0,0) and shifted on replay.
            let (pixels, base_bx, base_by) = glyph_cache.entry(cache_key).or_insert_with(|| {
                let base_glyph = glyph_id.with_scale_and_position(scale, point(0.0, 0.0));
                let mut px_list = Vec::new();
                let (bx, by) = if let Some(outlined) = font.outline_glyph(base_glyph) {
                    let b = outlined.px_bounds();
                    outlined.draw(|px, py, cov| {
                        px_list.push((px, py, cov));
                    });
                    (b.min.x, b.min.y)
                } else {
                    (0.0, 0.0)
                };
                (px_list, bx, by)
            });

            let draw_x = (origin_x + gx).round();
            let draw_y = origin_y.round();
            for &(px, py, cov) in pixels.iter() {
                let cx = (px as f32 + draw_x + *base_bx).round() as i64;
                let cy = (py as f32 + draw_y + *base_by).round() as i64;
                if cx < 0 || cy < 0 || cx as usize >= w || cy as usize >= h {
                    continue;
                }
                let idx = cy as usize * w + cx as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        }
    }
}

// ============================================================================
// FONT LOADING
// ============================================================================

/// Load a TrueType/OpenType file from disk.
pub fn load_font_file(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    FontArc::try_from_vec(bytes).ok()
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
/// Returns None if the font cannot be found.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::Title(family.to_string())], &props)
        .ok()?;

    let font_data = handle.load().ok()?;
    let font_data_copy = font_data.copy_font_data()?;
    let bytes: Vec<u8> = (*font_data_copy).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Resolve the font to paint with: explicit file first, then the named family,
/// then [`FALLBACK_FAMILIES`], then whatever sans-serif the system offers.
pub fn resolve_font(font_path: Option<&Path>, family: Option<&str>) -> Option<FontArc> {
    if let Some(path) = font_path {
        match load_font_file(path) {
            Some(font) => return Some(font),
            None => {
                crate::log_warn!("Could not load font file {}", path.display());
            }
        }
    }

    let families = family
        .filter(|f| !f.trim().is_empty())
        .into_iter()
        .chain(FALLBACK_FAMILIES.iter().copied());
    for name in families {
        if let Some(font) = load_system_font(name, 400, false) {
            crate::log_info!("Using font family \"{}\"", name);
            return Some(font);
        }
    }

    let font = load_sans_serif();
    if font.is_none() {
        crate::log_err!("No usable font found; text will not be drawn");
    }
    font
}

fn load_sans_serif() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let data = handle.load().ok()?.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Every char advances `advance` px; deterministic and font-free.
    pub(crate) struct FixedAdvance(pub f32);

    impl MeasureText for FixedAdvance {
        fn text_width(&self, text: &str) -> f32 {
            text.chars().count() as f32 * self.0
        }
    }

    /// Rebuild the original text from wrapped lines. Only valid when no
    /// paragraph produced zero lines (wrap_text always emits one per paragraph).
    fn rejoin(lines: &[String], text: &str) -> String {
        let mut out = Vec::new();
        let mut iter = lines.iter();
        for paragraph in text.split('\n') {
            let mut built = iter.next().cloned().unwrap_or_default();
            while built.len() < paragraph.len() {
                built.push(' ');
                built.push_str(iter.next().map(String::as_str).unwrap_or_default());
            }
            out.push(built);
        }
        assert!(iter.next().is_none(), "left-over lines");
        out.join("\n")
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_text("", 100.0, &FixedAdvance(10.0)).is_empty());
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap_text("hello world", 950.4, &FixedAdvance(25.0));
        assert_eq!(lines, vec!["hello world".to_string()]);
    }

    #[test]
    fn breaks_before_overflowing_word() {
        // 10px per char, 55px wide: "aa bb" (50) fits, "aa bb cc" (80) doesn't
        let lines = wrap_text("aa bb cc dd", 55.0, &FixedAdvance(10.0));
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn exact_fit_does_not_break() {
        let lines = wrap_text("ab cd", 50.0, &FixedAdvance(10.0));
        assert_eq!(lines, vec!["ab cd"]);
    }

    #[test]
    fn long_word_is_not_split() {
        let lines = wrap_text("hi supercalifragilistic yo", 50.0, &FixedAdvance(10.0));
        assert_eq!(lines, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn newlines_start_new_paragraphs() {
        let lines = wrap_text("one\n\ntwo three", 1000.0, &FixedAdvance(10.0));
        assert_eq!(lines, vec!["one", "", "two three"]);
    }

    #[test]
    fn lines_respect_width_and_rejoin_exactly() {
        let measure = FixedAdvance(9.0);
        let samples = [
            "a very long sentence that definitely exceeds the available line width given the current font size",
            "  leading spaces and  double  spaces ",
            "first paragraph here\nsecond one is a little longer than the first\n\nlast",
            "x",
            "\n",
            "antidisestablishmentarianism is long",
        ];
        for max_width in [40.0f32, 95.0, 200.0, 1000.0] {
            for text in samples {
                let lines = wrap_text(text, max_width, &measure);
                for line in &lines {
                    let fits = measure.text_width(line) <= max_width;
                    let lone_word = !line.contains(' ');
                    assert!(fits || lone_word, "{line:?} overflows {max_width}");
                }
                assert_eq!(rejoin(&lines, text), text);
            }
        }
    }

    #[test]
    fn block_is_vertically_centred() {
        let frame = CanvasFrame::default();
        let style = TextStyle::default();
        let text = "a very long sentence that definitely exceeds the available line width given the current font size";
        let layout = layout_block(text, frame, &style, &FixedAdvance(25.0));
        assert!(layout.lines.len() > 1);

        let center = frame.height as f32 / 2.0;
        let sum: f32 = (0..layout.lines.len())
            .map(|i| layout.line_y(i) - center)
            .sum();
        assert!(sum.abs() < 1e-2, "offset sum {sum}");
        assert_eq!(layout.center_x, 540.0);
    }

    #[test]
    fn hello_world_scenario() {
        let frame = CanvasFrame::default();
        let style = TextStyle {
            font_size: 50.0,
            padding_ratio: 0.06,
            ..TextStyle::default()
        };
        assert!((available_width(1080.0, 0.06) - 950.4).abs() < 1e-3);
        // ~0.55em average glyph width
        let layout = layout_block("hello world", frame, &style, &FixedAdvance(27.5));
        assert_eq!(layout.lines, vec!["hello world".to_string()]);
        assert_eq!(layout.line_y(0), 675.0);
        assert_eq!(layout.center_x, 540.0);
    }

    #[test]
    fn line_spacing_follows_multiplier() {
        let style = TextStyle {
            font_size: 40.0,
            line_height: 1.5,
            ..TextStyle::default()
        };
        let layout = layout_block("a\nb\nc", CanvasFrame::default(), &style, &FixedAdvance(1.0));
        assert_eq!(layout.line_height, 60.0);
        assert_eq!(layout.line_y(0), 675.0 - 60.0);
        assert_eq!(layout.line_y(1), 675.0);
        assert_eq!(layout.line_y(2), 675.0 + 60.0);
    }

    #[test]
    fn rasterize_with_system_font_stays_centred() {
        // Skipped on machines without any installed font.
        let Some(font) = resolve_font(None, None) else { return };
        let frame = CanvasFrame::new(400, 300);
        let style = TextStyle {
            font_size: 40.0,
            ..TextStyle::default()
        };
        let measure = FontMeasure::new(&font, style.font_size);
        let layout = layout_block("HH", frame, &style, &measure);
        let mut coverage = Vec::new();
        let mut cache = GlyphPixelCache::new();
        rasterize_lines(&font, style.font_size, &layout, frame, &mut coverage, &mut cache);

        let (mut min_x, mut max_x) = (usize::MAX, 0);
        for (i, &c) in coverage.iter().enumerate() {
            if c > 0.5 {
                min_x = min_x.min(i % 400);
                max_x = max_x.max(i % 400);
            }
        }
        assert!(min_x < max_x, "nothing rasterized");
        let mid = (min_x + max_x) as f32 / 2.0;
        assert!((mid - 200.0).abs() < 6.0, "ink centred at {mid}");
        assert!(!cache.is_empty());
    }

    #[test]
    fn carriage_returns_break_lines_instead_of_drawing() {
        let lines = wrap_text("line one\r\nline two\r", 1000.0, &FixedAdvance(10.0));
        assert_eq!(lines, vec!["line one", "line two", ""]);
        assert!(lines.iter().all(|l| !l.contains('\r')));
    }

    #[test]
    fn glyph_cache_only_holds_current_size() {
        let Some(font) = resolve_font(None, None) else { return };
        let frame = CanvasFrame::new(300, 200);
        let mut coverage = Vec::new();
        let mut cache = GlyphPixelCache::new();
        for font_size in [20.0f32, 24.0, 28.0, 32.0] {
            let style = TextStyle {
                font_size,
                ..TextStyle::default()
            };
            let layout = layout_block("abc", frame, &style, &FontMeasure::new(&font, font_size));
            rasterize_lines(&font, font_size, &layout, frame, &mut coverage, &mut cache);
        }
        let current = em_scale(&font, 32.0).y.to_bits();
        assert!(!cache.is_empty());
        assert!(cache.len() <= 3);
        assert!(cache.keys().all(|&(_, key)| key == current));
    }
}
