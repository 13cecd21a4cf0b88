// ============================================================================
// CANVAS: fixed logical frame, cover-fit placement and pixel blending
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Logical export width (4:5 portrait post).
pub const FRAME_WIDTH: u32 = 1080;
/// Logical export height.
pub const FRAME_HEIGHT: u32 = 1350;

/// Logical canvas dimensions. The export frame is always
/// [`CanvasFrame::default`]; previews use a scaled copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasFrame {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasFrame {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
        }
    }
}

impl CanvasFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    /// A zero-sized frame has no surface to paint on.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Allocate a transparent buffer of this size.
    pub fn new_buffer(&self) -> RgbaImage {
        RgbaImage::new(self.width, self.height)
    }
}

/// Destination rectangle of a placed image, in frame pixels.
/// Offsets are negative when the image overflows the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DrawRect {
    /// True when the rect contains the whole `fw × fh` frame (within `eps`).
    pub fn covers(&self, fw: f32, fh: f32, eps: f32) -> bool {
        self.x <= eps
            && self.y <= eps
            && self.x + self.width >= fw - eps
            && self.y + self.height >= fh - eps
    }
}

/// Scale `(iw, ih)` so it covers `(fw, fh)` completely, preserving aspect ratio,
/// and center the overflow. Never letterboxes.
pub fn cover_fit(iw: f32, ih: f32, fw: f32, fh: f32) -> DrawRect {
    if !(iw > 0.0 && ih > 0.0) {
        return DrawRect { x: 0.0, y: 0.0, width: fw, height: fh };
    }

    let mut width = fw;
    let mut height = fw * ih / iw;
    if height < fh {
        height = fh;
        width = fh * iw / ih;
    }

    DrawRect {
        x: (fw - width) * 0.5,
        y: (fh - height) * 0.5,
        width,
        height,
    }
}

/// Reset every pixel to fully transparent.
pub fn clear(target: &mut RgbaImage) {
    target.fill(0);
}

/// Flat fill with a single color.
pub fn fill(target: &mut RgbaImage, color: Rgba<u8>) {
    for px in target.pixels_mut() {
        *px = color;
    }
}

/// Source-over blend of `top` onto `base` with extra `opacity` (0..=1).
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Cover-fit `src` into `target` and composite it over what is already there.
/// The overflow is cropped; every target pixel receives a sample.
pub fn draw_cover(target: &mut RgbaImage, src: &RgbaImage) {
    let (tw, th) = target.dimensions();
    let (sw, sh) = src.dimensions();
    if tw == 0 || th == 0 || sw == 0 || sh == 0 {
        return;
    }

    let rect = cover_fit(sw as f32, sh as f32, tw as f32, th as f32);
    let sx_scale = sw as f32 / rect.width;
    let sy_scale = sh as f32 / rect.height;
    let row_len = tw as usize * 4;

    target
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            // Map output pixel centre → source coordinate
            let v = (y as f32 + 0.5 - rect.y) * sy_scale - 0.5;
            for x in 0..tw as usize {
                let u = (x as f32 + 0.5 - rect.x) * sx_scale - 0.5;
                let sample = sample_bilinear(src, u, v);
                let idx = x * 4;
                let base = Rgba([row[idx], row[idx + 1], row[idx + 2], row[idx + 3]]);
                let out = blend_over(base, sample, 1.0);
                row[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

/// Bilinear sample with edge clamping, interpolated in premultiplied space so
/// transparent neighbours don't bleed their color.
fn sample_bilinear(src: &RgbaImage, u: f32, v: f32) -> Rgba<u8> {
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;
    let u = u.clamp(0.0, max_x);
    let v = v.clamp(0.0, max_y);

    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let taps = [
        (src.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (src.get_pixel(x1, y0), fx * (1.0 - fy)),
        (src.get_pixel(x0, y1), (1.0 - fx) * fy),
        (src.get_pixel(x1, y1), fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (p, w) in taps {
        let a = p[3] as f32 * w;
        acc[0] += p[0] as f32 * a;
        acc[1] += p[1] as f32 * a;
        acc[2] += p[2] as f32 * a;
        acc[3] += a;
    }

    if acc[3] <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let inv = 1.0 / acc[3];
    Rgba([
        (acc[0] * inv).round().clamp(0.0, 255.0) as u8,
        (acc[1] * inv).round().clamp(0.0, 255.0) as u8,
        (acc[2] * inv).round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ])
}

/// Tint a single-channel coverage mask (same size as `target`) with `color`
/// and composite it over `target`, shifted by `(dx, dy)` pixels.
pub fn composite_coverage(
    target: &mut RgbaImage,
    coverage: &[f32],
    color: Rgba<u8>,
    dx: i32,
    dy: i32,
) {
    let (w, h) = target.dimensions();
    let (w, h) = (w as i64, h as i64);
    let (dx, dy) = (dx as i64, dy as i64);
    if coverage.len() < (w * h) as usize || color[3] == 0 || dx.abs() >= w || dy.abs() >= h {
        return;
    }

    target
        .par_chunks_mut(w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = y as i64 - dy;
            if sy < 0 || sy >= h {
                return;
            }
            let src_row = &coverage[(sy * w) as usize..((sy + 1) * w) as usize];
            for x in 0..w {
                let sx = x - dx;
                if sx < 0 || sx >= w {
                    continue;
                }
                let cov = src_row[sx as usize];
                if cov <= 0.001 {
                    continue;
                }
                let idx = x as usize * 4;
                let base = Rgba([row[idx], row[idx + 1], row[idx + 2], row[idx + 3]]);
                let out = blend_over(base, color, cov.min(1.0));
                row[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_photo_crops_sides() {
        let rect = cover_fit(2000.0, 1000.0, 1080.0, 1350.0);
        assert_eq!(rect.width, 2700.0);
        assert_eq!(rect.height, 1350.0);
        assert_eq!(rect.x, -810.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn tall_photo_crops_top_and_bottom() {
        let rect = cover_fit(1000.0, 3000.0, 1080.0, 1350.0);
        assert_eq!(rect.width, 1080.0);
        assert_eq!(rect.height, 3240.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, (1350.0 - 3240.0) / 2.0);
    }

    #[test]
    fn cover_fit_always_covers_and_keeps_aspect() {
        let sizes = [1.0f32, 3.0, 17.0, 640.0, 1080.0, 1350.0, 4032.0, 9999.0];
        let frames = [(1080.0f32, 1350.0f32), (1.0, 1.0), (300.0, 100.0), (7.0, 900.0)];
        for &iw in &sizes {
            for &ih in &sizes {
                for &(fw, fh) in &frames {
                    let r = cover_fit(iw, ih, fw, fh);
                    assert!(r.covers(fw, fh, 1e-3 * fw.max(fh)), "{iw}x{ih} in {fw}x{fh}: {r:?}");
                    let src_ratio = iw / ih;
                    let dst_ratio = r.width / r.height;
                    assert!((src_ratio - dst_ratio).abs() / src_ratio < 1e-4);
                    // Centered: overflow split evenly
                    assert!((r.x * 2.0 + r.width - fw).abs() < 1e-2 * fw.max(1.0));
                    assert!((r.y * 2.0 + r.height - fh).abs() < 1e-2 * fh.max(1.0));
                }
            }
        }
    }

    #[test]
    fn blend_over_opaque_top_replaces() {
        let base = Rgba([10, 20, 30, 255]);
        let top = Rgba([200, 100, 50, 255]);
        assert_eq!(blend_over(base, top, 1.0), top);
        assert_eq!(blend_over(base, Rgba([1, 2, 3, 0]), 1.0), base);
    }

    #[test]
    fn blend_over_half_alpha_mixes() {
        let out = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(out[3], 255);
        assert!((out[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn draw_cover_fills_every_pixel() {
        let src = RgbaImage::from_pixel(4, 2, Rgba([9, 99, 199, 255]));
        let mut target = RgbaImage::new(5, 7);
        draw_cover(&mut target, &src);
        assert!(target.pixels().all(|p| *p == Rgba([9, 99, 199, 255])));
    }

    #[test]
    fn draw_cover_keeps_center_of_wide_source() {
        // Left third red, middle third green, right third blue: a 1:1 frame
        // should only see green after center cropping.
        let mut src = RgbaImage::new(30, 10);
        for (x, _, p) in src.enumerate_pixels_mut() {
            *p = match x {
                0..=9 => Rgba([255, 0, 0, 255]),
                10..=19 => Rgba([0, 255, 0, 255]),
                _ => Rgba([0, 0, 255, 255]),
            };
        }
        let mut target = RgbaImage::new(8, 8);
        draw_cover(&mut target, &src);
        assert_eq!(*target.get_pixel(4, 4), Rgba([0, 255, 0, 255]));
        assert_eq!(*target.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(*target.get_pixel(7, 7), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn coverage_is_shifted_by_offset() {
        let mut target = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let mut cov = vec![0.0f32; 16];
        cov[0] = 1.0;
        composite_coverage(&mut target, &cov, Rgba([0, 0, 0, 255]), 2, 1);
        assert_eq!(*target.get_pixel(2, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*target.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn offsets_past_the_frame_leave_target_untouched() {
        let before = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let cov = vec![1.0; 16];
        for (dx, dy) in [(i32::MIN, 0), (0, i32::MAX), (4, 0), (-4, -4)] {
            let mut target = before.clone();
            composite_coverage(&mut target, &cov, Rgba([0, 0, 0, 255]), dx, dy);
            assert_eq!(target, before, "offset ({dx}, {dy})");
        }
    }

    #[test]
    fn fill_and_clear() {
        let mut img = RgbaImage::new(3, 3);
        fill(&mut img, Rgba([240, 240, 240, 255]));
        assert!(img.pixels().all(|p| *p == Rgba([240, 240, 240, 255])));
        clear(&mut img);
        assert!(img.pixels().all(|p| p[3] == 0));
    }
}
