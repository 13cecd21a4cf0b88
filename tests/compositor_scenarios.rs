use image::{Rgba, RgbaImage};
use postcreator::canvas::cover_fit;
use postcreator::editor::{ImageSlot, LoadTracker, SelectedOverlay};
use postcreator::io::{decode_image_bytes, encode_png, render_export};
use postcreator::viewport::ViewportScale;
use postcreator::{CanvasFrame, Compositor, EditorState, RasterImage, TextStyle};

fn solid(w: u32, h: u32, color: [u8; 4]) -> RasterImage {
    RasterImage::new(RgbaImage::from_pixel(w, h, Rgba(color))).unwrap()
}

#[test]
fn blank_post_exports_flat_background() {
    let state = EditorState::new(TextStyle::default());
    let mut compositor = Compositor::new(None);
    let image = render_export(&mut compositor, &state);
    assert_eq!(image.dimensions(), (1080, 1350));
    assert!(image.pixels().all(|p| *p == state.style.background));
}

#[test]
fn wide_photo_is_cover_fitted_and_centred() {
    let rect = cover_fit(2000.0, 1000.0, 1080.0, 1350.0);
    assert_eq!((rect.width, rect.height), (2700.0, 1350.0));
    assert_eq!((rect.x, rect.y), (-810.0, 0.0));
    assert!(rect.covers(1080.0, 1350.0, 1e-3));

    // Left half red, right half blue: the centre crop straddles the seam
    let mut pixels = RgbaImage::from_pixel(2000, 1000, Rgba([255, 0, 0, 255]));
    for (x, _, p) in pixels.enumerate_pixels_mut() {
        if x >= 1000 {
            *p = Rgba([0, 0, 255, 255]);
        }
    }
    let state = EditorState::new(TextStyle::default()).with_photo(RasterImage::new(pixels));
    let image = render_export(&mut Compositor::new(None), &state);
    assert_eq!(*image.get_pixel(10, 675), Rgba([255, 0, 0, 255]));
    assert_eq!(*image.get_pixel(1070, 675), Rgba([0, 0, 255, 255]));
}

#[test]
fn export_ignores_preview_scale() {
    let state = EditorState::new(TextStyle::default())
        .with_text("hello world")
        .with_photo(Some(solid(640, 480, [30, 60, 90, 255])));
    let mut compositor = Compositor::new(postcreator::ops::text::resolve_font(None, None));

    let before = render_export(&mut compositor, &state);

    // A preview paint at an unrelated size must not leak into export
    let frame = CanvasFrame::default();
    let scale = ViewportScale::fit(frame, 300.0, 300.0, 2.0);
    let preview = compositor.paint(
        scale.backing_frame(frame),
        &state.text,
        &scale.preview_style(&state.style),
        state.photo.as_ref(),
        None,
    );
    assert_ne!(preview.dimensions(), before.dimensions());

    let after = render_export(&mut compositor, &state);
    assert_eq!(before, after);
}

#[test]
fn overlay_switch_replaces_previous_overlay() {
    let first = SelectedOverlay {
        name: "Red".into(),
        image: solid(4, 5, [255, 0, 0, 255]),
    };
    let second = SelectedOverlay {
        name: "Green".into(),
        image: solid(4, 5, [0, 255, 0, 255]),
    };
    let state = EditorState::new(TextStyle::default())
        .with_overlay(Some(first))
        .with_overlay(Some(second));
    assert_eq!(state.overlay_name(), Some("Green"));

    let image = render_export(&mut Compositor::new(None), &state);
    assert!(image.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
}

#[test]
fn stale_photo_load_never_lands() {
    let mut tracker = LoadTracker::new();
    let slow = tracker.begin(ImageSlot::Photo);
    let fast = tracker.begin(ImageSlot::Photo);

    assert!(tracker.accept(fast));
    assert!(!tracker.accept(slow));
    assert!(!tracker.is_pending(ImageSlot::Photo));
}

#[test]
fn exported_png_decodes_to_same_pixels() {
    let state = EditorState::new(TextStyle {
        background: Rgba([12, 34, 56, 255]),
        ..TextStyle::default()
    });
    let image = render_export(&mut Compositor::new(None), &state);
    let bytes = encode_png(&image).unwrap();
    let decoded = decode_image_bytes(&bytes).unwrap();
    assert_eq!(decoded.pixels(), &image);
}
