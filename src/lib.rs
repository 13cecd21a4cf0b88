//! Post Creator: composite a photo, an optional overlay and word-wrapped text
//! onto a fixed 1080×1350 frame and export it as PNG.

pub mod logger;

pub mod assets;
pub mod canvas;
pub mod compositor;
pub mod editor;
pub mod io;
pub mod ops;
pub mod viewport;

pub use canvas::{CanvasFrame, FRAME_HEIGHT, FRAME_WIDTH};
pub use compositor::Compositor;
pub use editor::{EditorState, RasterImage, ShadowStyle, TextStyle};
