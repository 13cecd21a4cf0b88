use crate::canvas::CanvasFrame;
use crate::editor::TextStyle;

/// How the logical frame is shown in the available viewport area.
/// Only affects the live preview; export always uses the true frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportScale {
    /// Logical points per frame pixel.
    pub scale: f32,
    /// Physical pixels per logical point.
    pub device_pixel_ratio: f32,
}

impl Default for ViewportScale {
    fn default() -> Self {
        Self {
            scale: 1.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl ViewportScale {
    /// Largest scale at which `frame` still fits inside `available_w × available_h`.
    pub fn fit(frame: CanvasFrame, available_w: f32, available_h: f32, device_pixel_ratio: f32) -> Self {
        let fw = frame.width.max(1) as f32;
        let fh = frame.height.max(1) as f32;
        let scale = (available_w / fw).min(available_h / fh);
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 0.0 };
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            scale,
            device_pixel_ratio: dpr,
        }
    }

    /// Frame pixels → physical pixels.
    pub fn render_factor(&self) -> f32 {
        self.scale * self.device_pixel_ratio
    }

    /// Size the preview occupies on screen, in logical points.
    pub fn display_size(&self, frame: CanvasFrame) -> (f32, f32) {
        (frame.width as f32 * self.scale, frame.height as f32 * self.scale)
    }

    /// Backing resolution of the preview surface (display size × dpr), at least 1×1.
    pub fn backing_frame(&self, frame: CanvasFrame) -> CanvasFrame {
        let f = self.render_factor();
        CanvasFrame::new(
            ((frame.width as f32 * f).round() as u32).max(1),
            ((frame.height as f32 * f).round() as u32).max(1),
        )
    }

    /// Style for painting the preview: lengths follow the backing resolution.
    pub fn preview_style(&self, style: &TextStyle) -> TextStyle {
        style.scaled(self.render_factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_viewport_is_height_limited() {
        let v = ViewportScale::fit(CanvasFrame::default(), 2000.0, 675.0, 1.0);
        assert_eq!(v.scale, 0.5);
        assert_eq!(v.display_size(CanvasFrame::default()), (540.0, 675.0));
    }

    #[test]
    fn tall_viewport_is_width_limited() {
        let v = ViewportScale::fit(CanvasFrame::default(), 540.0, 5000.0, 1.0);
        assert_eq!(v.scale, 0.5);
    }

    #[test]
    fn backing_frame_includes_dpr_and_keeps_aspect() {
        let frame = CanvasFrame::default();
        let v = ViewportScale::fit(frame, 540.0, 675.0, 2.0);
        assert_eq!(v.backing_frame(frame), CanvasFrame::new(1080, 1350));
        let v = ViewportScale::fit(frame, 432.0, 540.0, 1.5);
        let b = v.backing_frame(frame);
        assert_eq!((b.width, b.height), (648, 810));
        assert!((b.aspect_ratio() - frame.aspect_ratio()).abs() < 1e-3);
    }

    #[test]
    fn degenerate_viewport_still_has_a_surface() {
        let frame = CanvasFrame::default();
        let v = ViewportScale::fit(frame, 0.0, 0.0, f32::NAN);
        assert_eq!(v.scale, 0.0);
        assert_eq!(v.device_pixel_ratio, 1.0);
        assert_eq!(v.backing_frame(frame), CanvasFrame::new(1, 1));
    }

    #[test]
    fn preview_font_follows_scale() {
        let style = TextStyle::default();
        let v = ViewportScale::fit(CanvasFrame::default(), 270.0, 10_000.0, 2.0);
        let preview = v.preview_style(&style);
        assert_eq!(preview.font_size, style.font_size * 0.5);
        assert_eq!(preview.padding_ratio, style.padding_ratio);
    }
}
