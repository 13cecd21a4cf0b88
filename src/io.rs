use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

use crate::canvas::CanvasFrame;
use crate::compositor::Compositor;
use crate::editor::{EditorState, RasterImage};

/// Extensions offered by the photo / overlay pickers.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "tga", "ico", "tiff", "tif",
];

/// Filename used by [`ExportName::Fixed`].
pub const FIXED_EXPORT_NAME: &str = "canvas.png";

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for decoding a photo or overlay
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Decode(String),
    EmptyImage,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Decode(e) => write!(f, "Decode error: {}", e),
            LoadError::EmptyImage => write!(f, "Image has no pixels"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<ImageError> for LoadError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => LoadError::Io(io),
            other => LoadError::Decode(other.to_string()),
        }
    }
}

/// Error type for PNG export
#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Encode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Encode(e) => write!(f, "Encode error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => ExportError::Io(io),
            other => ExportError::Encode(other.to_string()),
        }
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode an in-memory image (any format the `image` crate recognises).
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RasterImage, LoadError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    RasterImage::new(img).ok_or(LoadError::EmptyImage)
}

/// Synchronously decode an image file into a [`RasterImage`].
pub fn load_image_sync(path: &Path) -> Result<RasterImage, LoadError> {
    let bytes = std::fs::read(path)?;
    decode_image_bytes(&bytes)
}

// ============================================================================
// EXPORT
// ============================================================================

/// How exported files are named.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportName {
    /// Always [`FIXED_EXPORT_NAME`].
    Fixed,
    /// A fresh UUID per export, e.g. `3f2a…9c.png`.
    Unique,
}

impl ExportName {
    pub fn file_name(&self) -> String {
        match self {
            ExportName::Fixed => FIXED_EXPORT_NAME.to_string(),
            ExportName::Unique => format!("{}.png", Uuid::new_v4().simple()),
        }
    }

    pub fn from_config_str(s: &str) -> Self {
        match s.trim() {
            "unique" => ExportName::Unique,
            _ => ExportName::Fixed,
        }
    }
}

/// Render the post at the fixed logical frame, whatever the preview scale is.
pub fn render_export(compositor: &mut Compositor, state: &EditorState) -> RgbaImage {
    compositor.paint_state(CanvasFrame::default(), state)
}

/// Encode RGBA pixels as PNG into `writer`.
pub fn write_png<W: Write>(image: &RgbaImage, writer: W) -> Result<(), ExportError> {
    let encoder = PngEncoder::new(writer);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

/// Encode RGBA pixels as an in-memory PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    write_png(image, &mut bytes)?;
    Ok(bytes)
}

/// Encode and write a PNG file.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Render the post at export resolution and write it to `path`.
pub fn export_png(
    compositor: &mut Compositor,
    state: &EditorState,
    path: &Path,
) -> Result<RgbaImage, ExportError> {
    let image = render_export(compositor, state);
    save_png(&image, path)?;
    crate::log_info!(
        "Exported {}×{} post → {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(image)
}
