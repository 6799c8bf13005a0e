//! CPU drawing surface.
//!
//! Pixels are premultiplied RGBA8. Sources are sampled nearest-neighbour
//! into their destination rectangle; rounded corners, borders, and
//! shadows are rasterized from a signed distance to the rounded rectangle
//! so edges are anti-aliased by one pixel.

use std::sync::Arc;

use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_model::geometry::{Rect, Rgba};
use lessoncast_model::layout::SourceLayout;

use crate::capability::VideoFrame;
use crate::output::OutputFrame;

pub type PremulRgba8 = [u8; 4];

/// Source-over with an extra opacity factor.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;

    let mut out = [0u8; 4];
    out[3] = add_sat(sa, mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat(sc, dc);
    }
    out
}

/// Convert straight alpha to premultiplied.
pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a) as u8,
        mul_div255(u16::from(px[1]), a) as u8,
        mul_div255(u16::from(px[2]), a) as u8,
        px[3],
    ]
}

fn mul_div255(a: u16, b: u16) -> u16 {
    let x = u32::from(a) * u32::from(b);
    ((x + 127) / 255) as u16
}

fn add_sat(a: u16, b: u16) -> u8 {
    (a + b).min(255) as u8
}

/// Signed distance from `(px, py)` to a rounded rectangle; negative inside.
fn rounded_rect_sdf(rect: &Rect, radius: f64, px: f64, py: f64) -> f64 {
    let hx = rect.width / 2.0;
    let hy = rect.height / 2.0;
    let r = radius.clamp(0.0, hx.min(hy));
    let qx = (px - (rect.x + hx)).abs() - hx + r;
    let qy = (py - (rect.y + hy)).abs() - hy + r;
    let outside = qx.max(0.0).hypot(qy.max(0.0));
    let inside = qx.max(qy).min(0.0);
    outside + inside - r
}

/// Fraction of a pixel covered at signed distance `d`.
fn coverage(d: f64) -> f32 {
    (0.5 - d).clamp(0.0, 1.0) as f32
}

/// Owned output surface, reused across ticks.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocate for a new size; contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
    }

    pub fn clear(&mut self, color: Rgba) {
        let px = premultiply(color.to_array());
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> PremulRgba8 {
        let i = self.index(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn blend(&mut self, x: u32, y: u32, src: PremulRgba8, opacity: f32) {
        let i = self.index(x, y);
        let dst = [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ];
        self.pixels[i..i + 4].copy_from_slice(&over(dst, src, opacity));
    }

    /// Pixel rows and columns touched by `rect` grown by `pad`, clipped.
    fn span(&self, rect: &Rect, pad: f64) -> Option<(u32, u32, u32, u32)> {
        let x0 = (rect.x - pad).floor().max(0.0);
        let y0 = (rect.y - pad).floor().max(0.0);
        let x1 = (rect.right() + pad).ceil().min(self.width as f64);
        let y1 = (rect.bottom() + pad).ceil().min(self.height as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Composite `frame` at `layout`, scaled by `scale` from full-quality
    /// canvas coordinates, with shadow, rounded clip, and border.
    pub fn draw(
        &mut self,
        frame: &VideoFrame,
        layout: &SourceLayout,
        scale: f64,
        opacity: f64,
    ) -> CompositorResult<()> {
        frame.validate()?;
        let rect = layout.rect().scaled(scale);
        if !rect.is_finite() {
            return Err(CompositorError::render("source rectangle is not finite"));
        }
        let opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
        if rect.width <= 0.0 || rect.height <= 0.0 || opacity <= 0.0 {
            return Ok(());
        }
        let radius = layout.border_radius.unwrap_or(0.0).max(0.0) * scale;

        if let Some(shadow) = layout.shadow {
            let offset = Rect::new(
                rect.x + shadow.offset_x * scale,
                rect.y + shadow.offset_y * scale,
                rect.width,
                rect.height,
            );
            self.fill_shadow(&offset, radius, shadow.blur * scale, shadow.color, opacity);
        }

        self.fill_frame(frame, &rect, radius, opacity as f32);

        if let Some(border) = layout.border {
            let width = border.width.max(0.0) * scale;
            if width > 0.0 {
                self.stroke_inner(&rect, radius, width, border.color, opacity as f32);
            }
        }
        Ok(())
    }

    fn fill_frame(&mut self, frame: &VideoFrame, rect: &Rect, radius: f64, opacity: f32) {
        let Some((x0, y0, x1, y1)) = self.span(rect, 0.0) else {
            return;
        };
        let sx = frame.width as f64 / rect.width;
        let sy = frame.height as f64 / rect.height;
        for y in y0..y1 {
            let py = y as f64 + 0.5;
            let v = (((py - rect.y) * sy).floor().max(0.0) as u32).min(frame.height - 1);
            for x in x0..x1 {
                let px = x as f64 + 0.5;
                let cov = coverage(rounded_rect_sdf(rect, radius, px, py));
                if cov <= 0.0 {
                    continue;
                }
                let u = (((px - rect.x) * sx).floor().max(0.0) as u32).min(frame.width - 1);
                let src = premultiply(frame.pixel(u, v));
                self.blend(x, y, src, opacity * cov);
            }
        }
    }

    fn fill_shadow(&mut self, rect: &Rect, radius: f64, blur: f64, color: Rgba, opacity: f64) {
        let blur = blur.max(0.0);
        let Some((x0, y0, x1, y1)) = self.span(rect, blur) else {
            return;
        };
        let src = premultiply(color.to_array());
        for y in y0..y1 {
            let py = y as f64 + 0.5;
            for x in x0..x1 {
                let px = x as f64 + 0.5;
                let d = rounded_rect_sdf(rect, radius, px, py);
                let falloff = if blur > 0.0 {
                    (1.0 - (d + 0.5) / blur).clamp(0.0, 1.0) as f32
                } else {
                    coverage(d)
                };
                if falloff > 0.0 {
                    self.blend(x, y, src, falloff * opacity as f32);
                }
            }
        }
    }

    fn stroke_inner(&mut self, rect: &Rect, radius: f64, width: f64, color: Rgba, opacity: f32) {
        let Some((x0, y0, x1, y1)) = self.span(rect, 0.0) else {
            return;
        };
        let src = premultiply(color.to_array());
        for y in y0..y1 {
            let py = y as f64 + 0.5;
            for x in x0..x1 {
                let px = x as f64 + 0.5;
                let d = rounded_rect_sdf(rect, radius, px, py);
                // Inside the outer edge and outside the inner edge.
                let ring = coverage(d) * (0.5 + d + width).clamp(0.0, 1.0) as f32;
                if ring > 0.0 {
                    self.blend(x, y, src, ring * opacity);
                }
            }
        }
    }

    /// Copy the surface into an output frame.
    pub fn snapshot(&self, sequence: u64, timestamp_ns: u64) -> OutputFrame {
        OutputFrame {
            sequence,
            timestamp_ns,
            width: self.width,
            height: self.height,
            pixels: Arc::from(self.pixels.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_model::geometry::Border;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);

    #[test]
    fn test_over_opacity_zero_is_noop() {
        let dst = [10, 20, 30, 255];
        assert_eq!(over(dst, [255, 0, 0, 255], 0.0), dst);
    }

    #[test]
    fn test_opaque_src_replaces_dst() {
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 1.0), [255, 0, 0, 255]);
    }

    #[test]
    fn test_clear_fills_background() {
        let mut canvas = Canvas::new(4, 4);
        canvas.clear(Rgba::new(0, 0, 255, 255));
        assert_eq!(canvas.pixel(3, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn test_draw_fills_only_its_rectangle() {
        let mut canvas = Canvas::new(20, 10);
        canvas.clear(Rgba::BLACK);
        let frame = VideoFrame::solid(2, 2, RED);
        let layout = SourceLayout::from_rect(Rect::new(10.0, 0.0, 10.0, 10.0), 0);
        canvas.draw(&frame, &layout, 1.0, 1.0).unwrap();
        assert_eq!(canvas.pixel(15, 5), [255, 0, 0, 255]);
        assert_eq!(canvas.pixel(5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_half_opacity_blends() {
        let mut canvas = Canvas::new(4, 4);
        canvas.clear(Rgba::BLACK);
        let frame = VideoFrame::solid(1, 1, RED);
        canvas
            .draw(&frame, &SourceLayout::from_rect(Rect::new(0.0, 0.0, 4.0, 4.0), 0), 1.0, 0.5)
            .unwrap();
        let px = canvas.pixel(1, 1);
        assert!((127..=129).contains(&px[0]), "{px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_rounded_corners_clip() {
        let mut canvas = Canvas::new(40, 40);
        canvas.clear(Rgba::BLACK);
        let frame = VideoFrame::solid(1, 1, RED);
        let layout = SourceLayout {
            border_radius: Some(15.0),
            ..SourceLayout::from_rect(Rect::new(0.0, 0.0, 40.0, 40.0), 0)
        };
        canvas.draw(&frame, &layout, 1.0, 1.0).unwrap();
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(20, 20), [255, 0, 0, 255]);
    }

    #[test]
    fn test_border_paints_edge_not_centre() {
        let mut canvas = Canvas::new(20, 20);
        canvas.clear(Rgba::BLACK);
        let frame = VideoFrame::solid(1, 1, RED);
        let layout = SourceLayout {
            border: Some(Border {
                width: 3.0,
                color: Rgba::WHITE,
            }),
            ..SourceLayout::from_rect(Rect::new(0.0, 0.0, 20.0, 20.0), 0)
        };
        canvas.draw(&frame, &layout, 1.0, 1.0).unwrap();
        assert_eq!(canvas.pixel(1, 10), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(10, 10), [255, 0, 0, 255]);
    }

    #[test]
    fn test_scale_maps_full_quality_coordinates() {
        let mut canvas = Canvas::new(10, 10);
        canvas.clear(Rgba::BLACK);
        let frame = VideoFrame::solid(1, 1, RED);
        let layout = SourceLayout::from_rect(Rect::new(10.0, 10.0, 10.0, 10.0), 0);
        canvas.draw(&frame, &layout, 0.5, 1.0).unwrap();
        assert_eq!(canvas.pixel(7, 7), [255, 0, 0, 255]);
        assert_eq!(canvas.pixel(2, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn test_malformed_frame_is_a_render_error() {
        let mut canvas = Canvas::new(4, 4);
        let frame = VideoFrame::new(4, 4, vec![0u8; 3]);
        let layout = SourceLayout::from_rect(Rect::new(0.0, 0.0, 4.0, 4.0), 0);
        assert!(matches!(
            canvas.draw(&frame, &layout, 1.0, 1.0),
            Err(CompositorError::Render { .. })
        ));
    }

    #[test]
    fn test_resize_reallocates() {
        let mut canvas = Canvas::new(8, 8);
        canvas.resize(4, 2);
        assert_eq!(canvas.pixels().len(), 4 * 2 * 4);
        let frame = canvas.snapshot(7, 100);
        assert_eq!((frame.width, frame.height, frame.sequence), (4, 2, 7));
    }
}
