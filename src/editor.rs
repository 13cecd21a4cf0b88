use image::{Rgba, RgbaImage};
use std::sync::Arc;

// ============================================================================
// STYLE
// ============================================================================

/// Largest accepted font size in logical pixels.
pub const MAX_FONT_SIZE: f32 = 1000.0;
/// Largest accepted line-height multiplier.
pub const MAX_LINE_HEIGHT: f32 = 10.0;
/// Largest accepted shadow blur radius in logical pixels.
pub const MAX_SHADOW_BLUR: f32 = 100.0;
/// Shadow offsets beyond the frame's longest side only move the shadow out of view.
pub const MAX_SHADOW_OFFSET: f32 = crate::canvas::FRAME_HEIGHT as f32;

/// Drop shadow painted beneath the text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowStyle {
    pub color: Rgba<u8>,
    /// Blur radius in logical pixels (0 = hard shadow).
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 160]),
            blur: 8.0,
            offset_x: 2.0,
            offset_y: 2.0,
        }
    }
}

/// How the text block is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Em size in logical pixels.
    pub font_size: f32,
    /// Fraction of the frame width kept empty on each side.
    pub padding_ratio: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub color: Rgba<u8>,
    /// Flat fill used when no photo is present.
    pub background: Rgba<u8>,
    pub shadow: Option<ShadowStyle>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 50.0,
            padding_ratio: 0.06,
            line_height: 1.2,
            color: Rgba([255, 255, 255, 255]),
            background: Rgba([240, 240, 240, 255]),
            shadow: Some(ShadowStyle::default()),
        }
    }
}

impl TextStyle {
    /// Copy with every length multiplied by `factor` (preview rendering).
    /// The padding ratio is relative to the frame and stays unchanged.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            font_size: self.font_size * factor,
            shadow: self.shadow.map(|s| ShadowStyle {
                blur: s.blur * factor,
                offset_x: s.offset_x * factor,
                offset_y: s.offset_y * factor,
                ..s
            }),
            ..*self
        }
    }

    /// Distance between consecutive line middles.
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }
}

// ============================================================================
// IMAGES
// ============================================================================

/// A decoded bitmap. Cloning shares the pixel storage; a new selection always
/// produces a new value.
#[derive(Clone, Debug)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    /// `None` for a zero-sized bitmap.
    pub fn new(pixels: RgbaImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self {
            pixels: Arc::new(pixels),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both values share the same decoded buffer.
    pub fn same_as(&self, other: &RasterImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// The overlay currently applied, with the catalog name it was picked under.
#[derive(Clone, Debug)]
pub struct SelectedOverlay {
    pub name: String,
    pub image: RasterImage,
}

// ============================================================================
// EDITOR STATE
// ============================================================================

/// Everything the compositor needs for one paint. Each user action builds a new
/// value with one of the `with_*` methods instead of mutating fields in place.
#[derive(Clone, Debug, Default)]
pub struct EditorState {
    pub text: String,
    pub style: TextStyle,
    pub photo: Option<RasterImage>,
    pub overlay: Option<SelectedOverlay>,
}

impl EditorState {
    pub fn new(style: TextStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Replace the text; `\r\n` and lone `\r` become `\n`.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let text: String = text.into();
        let text = if text.contains('\r') {
            normalize_line_breaks(&text)
        } else {
            text
        };
        Self { text, ..self }
    }

    pub fn with_style(self, style: TextStyle) -> Self {
        Self { style, ..self }
    }

    pub fn with_photo(self, photo: Option<RasterImage>) -> Self {
        Self { photo, ..self }
    }

    pub fn with_overlay(self, overlay: Option<SelectedOverlay>) -> Self {
        Self { overlay, ..self }
    }

    pub fn overlay_name(&self) -> Option<&str> {
        self.overlay.as_ref().map(|o| o.name.as_str())
    }

    pub fn overlay_image(&self) -> Option<&RasterImage> {
        self.overlay.as_ref().map(|o| &o.image)
    }
}

// ============================================================================
// LOAD TOKENS: last request wins, regardless of completion order
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Photo,
    Overlay,
}

/// Issued when a decode starts; presented again when it finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub slot: ImageSlot,
    pub token: u64,
}

/// Tracks the newest request per slot. A completion whose token is not the
/// newest for its slot is stale and must be dropped.
#[derive(Debug, Default)]
pub struct LoadTracker {
    next_token: u64,
    photo: Option<u64>,
    overlay: Option<u64>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending_mut(&mut self, slot: ImageSlot) -> &mut Option<u64> {
        match slot {
            ImageSlot::Photo => &mut self.photo,
            ImageSlot::Overlay => &mut self.overlay,
        }
    }

    /// Start a new request for `slot`, superseding any in flight.
    pub fn begin(&mut self, slot: ImageSlot) -> LoadTicket {
        self.next_token += 1;
        let token = self.next_token;
        *self.pending_mut(slot) = Some(token);
        LoadTicket { slot, token }
    }

    /// The user cleared the slot; anything still decoding for it is stale.
    pub fn cancel(&mut self, slot: ImageSlot) {
        *self.pending_mut(slot) = None;
    }

    pub fn is_pending(&self, slot: ImageSlot) -> bool {
        match slot {
            ImageSlot::Photo => self.photo.is_some(),
            ImageSlot::Overlay => self.overlay.is_some(),
        }
    }

    /// Returns `true` (and retires the request) only for the newest ticket.
    pub fn accept(&mut self, ticket: LoadTicket) -> bool {
        let pending = self.pending_mut(ticket.slot);
        if *pending == Some(ticket.token) {
            *pending = None;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// INPUT VALIDATION
// ============================================================================

/// Error type for rejected style input
#[derive(Debug, Clone, PartialEq)]
pub enum StyleError {
    NotANumber(String),
    NotPositive(f32),
    InvalidColor(String),
    InvalidShadow(String),
}

impl std::fmt::Display for StyleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleError::NotANumber(s) => write!(f, "'{}' is not a number", s),
            StyleError::NotPositive(v) => write!(f, "{} must be greater than zero", v),
            StyleError::InvalidColor(s) => write!(f, "'{}' is not a color (expected #rgb, #rrggbb or #rrggbbaa)", s),
            StyleError::InvalidShadow(s) => write!(f, "'{}' is not a shadow (expected COLOR,BLUR,DX,DY)", s),
        }
    }
}

impl std::error::Error for StyleError {}

fn parse_finite(input: &str) -> Result<f32, StyleError> {
    let trimmed = input.trim();
    match trimmed.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(StyleError::NotANumber(trimmed.to_string())),
    }
}

/// Font size in logical px: must be positive, capped at [`MAX_FONT_SIZE`].
pub fn parse_font_size(input: &str) -> Result<f32, StyleError> {
    let v = parse_finite(input)?;
    if v <= 0.0 {
        return Err(StyleError::NotPositive(v));
    }
    Ok(v.min(MAX_FONT_SIZE))
}

/// Padding ratio: any number, clamped into `[0, 1]`.
pub fn parse_padding_ratio(input: &str) -> Result<f32, StyleError> {
    Ok(parse_finite(input)?.clamp(0.0, 1.0))
}

/// Line-height multiplier: must be positive, capped at [`MAX_LINE_HEIGHT`].
pub fn parse_line_height(input: &str) -> Result<f32, StyleError> {
    let v = parse_finite(input)?;
    if v <= 0.0 {
        return Err(StyleError::NotPositive(v));
    }
    Ok(v.min(MAX_LINE_HEIGHT))
}

/// `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(input: &str) -> Result<Rgba<u8>, StyleError> {
    let err = || StyleError::InvalidColor(input.trim().to_string());
    let hex = input.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());

    match hex.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(err)? as u8;
                out[i] = v * 17;
            }
            out[3] = 255;
            Ok(Rgba(out))
        }
        6 => Ok(Rgba([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255])),
        8 => Ok(Rgba([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        ])),
        _ => Err(err()),
    }
}

/// Shadow blur radius, clamped into `[0, MAX_SHADOW_BLUR]`.
pub fn parse_shadow_blur(input: &str) -> Result<f32, StyleError> {
    Ok(parse_finite(input)?.clamp(0.0, MAX_SHADOW_BLUR))
}

/// Shadow offset along one axis, clamped to `±MAX_SHADOW_OFFSET`.
pub fn parse_shadow_offset(input: &str) -> Result<f32, StyleError> {
    Ok(parse_finite(input)?.clamp(-MAX_SHADOW_OFFSET, MAX_SHADOW_OFFSET))
}

/// `COLOR,BLUR,DX,DY`, e.g. `#00000099,8,2,2`. Blur and offsets are clamped
/// like their single-value parsers.
pub fn parse_shadow(input: &str) -> Result<ShadowStyle, StyleError> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [color, blur, dx, dy] = parts.as_slice() else {
        return Err(StyleError::InvalidShadow(input.trim().to_string()));
    };
    Ok(ShadowStyle {
        color: parse_hex_color(color)?,
        blur: parse_shadow_blur(blur)?,
        offset_x: parse_shadow_offset(dx)?,
        offset_y: parse_shadow_offset(dy)?,
    })
}

/// Normalise `\r\n` and lone `\r` line breaks to `\n`.
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
