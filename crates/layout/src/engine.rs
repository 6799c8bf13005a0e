//! Layout computation.
//!
//! Maps a [`LayoutType`] and canvas size to concrete rectangles for the
//! screen and camera sources. Every rectangle stays inside the canvas and
//! the two-source layouts tile without overlap, except picture-in-picture
//! where the camera is drawn on top of the screen.

use lessoncast_model::geometry::{Border, Rect, Rgba, Shadow};
use lessoncast_model::layout::{
    CanvasConfig, CompositorLayout, LayoutSources, LayoutType, PipPosition, SourceLayout,
};
use serde::{Deserialize, Serialize};

/// Tunable proportions used when computing layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutEngine {
    /// Picture-in-picture camera width as a fraction of canvas width.
    pub pip_width_fraction: f64,

    /// Camera aspect ratio (width / height).
    pub camera_aspect: f64,

    /// Inset of the picture-in-picture camera from the canvas edges, in pixels.
    pub pip_margin: f64,

    /// Share of the canvas given to the screen in presentation layout.
    pub presentation_primary_fraction: f64,

    pub pip_border_radius: f64,
    pub pip_border: Border,
    pub pip_shadow: Shadow,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            pip_width_fraction: 0.25,
            camera_aspect: 16.0 / 9.0,
            pip_margin: 20.0,
            presentation_primary_fraction: 0.8,
            pip_border_radius: 12.0,
            pip_border: Border {
                width: 3.0,
                color: Rgba::WHITE,
            },
            pip_shadow: Shadow {
                offset_x: 0.0,
                offset_y: 4.0,
                blur: 12.0,
                color: Rgba::new(0, 0, 0, 128),
            },
        }
    }
}

/// Compute a layout with the default proportions.
pub fn compute_layout(
    layout_type: LayoutType,
    canvas: CanvasConfig,
    pip_position: Option<PipPosition>,
) -> CompositorLayout {
    LayoutEngine::default().compute(layout_type, canvas, pip_position)
}

impl LayoutEngine {
    /// Compute per-source rectangles for `layout_type` on `canvas`.
    pub fn compute(
        &self,
        layout_type: LayoutType,
        canvas: CanvasConfig,
        pip_position: Option<PipPosition>,
    ) -> CompositorLayout {
        let full = SourceLayout::full_canvas(&canvas);
        let sources = match layout_type {
            LayoutType::ScreenOnly => LayoutSources {
                screen: Some(full),
                camera: None,
            },
            LayoutType::CameraOnly => LayoutSources {
                screen: None,
                camera: Some(full),
            },
            LayoutType::SideBySide => {
                let (screen, camera) = self.side_by_side(&canvas);
                LayoutSources {
                    screen: Some(SourceLayout::from_rect(screen, 0)),
                    camera: Some(SourceLayout::from_rect(camera, 0)),
                }
            }
            LayoutType::Presentation => {
                let (screen, camera) = self.presentation(&canvas);
                LayoutSources {
                    screen: Some(SourceLayout::from_rect(screen, 0)),
                    camera: Some(SourceLayout::from_rect(camera, 0)),
                }
            }
            LayoutType::PictureInPicture => LayoutSources {
                screen: Some(full),
                camera: Some(self.pip_camera(&canvas, pip_position.unwrap_or_default())),
            },
        };

        CompositorLayout {
            layout_type,
            canvas,
            sources,
        }
    }

    /// Effective margin: shrinks on canvases too small for the nominal inset.
    pub fn effective_pip_margin(&self, canvas: &CanvasConfig) -> f64 {
        let short_side = canvas.width.min(canvas.height) as f64;
        self.pip_margin.max(0.0).min(short_side * 0.05)
    }

    /// Equal halves along the wider axis, screen first.
    fn side_by_side(&self, canvas: &CanvasConfig) -> (Rect, Rect) {
        let w = canvas.width as f64;
        let h = canvas.height as f64;
        if canvas.is_landscape() {
            let half = w / 2.0;
            (Rect::new(0.0, 0.0, half, h), Rect::new(half, 0.0, w - half, h))
        } else {
            let half = h / 2.0;
            (Rect::new(0.0, 0.0, w, half), Rect::new(0.0, half, w, h - half))
        }
    }

    /// Screen takes the primary share; the camera is centred in the remainder.
    fn presentation(&self, canvas: &CanvasConfig) -> (Rect, Rect) {
        let w = canvas.width as f64;
        let h = canvas.height as f64;
        let primary = self.presentation_primary_fraction.clamp(0.0, 1.0);
        if canvas.is_landscape() {
            let screen_w = w * primary;
            let column_w = w - screen_w;
            let cam_h = (column_w / self.camera_aspect).min(h);
            (
                Rect::new(0.0, 0.0, screen_w, h),
                Rect::new(screen_w, (h - cam_h) / 2.0, column_w, cam_h),
            )
        } else {
            let screen_h = h * primary;
            let row_h = h - screen_h;
            let cam_w = (row_h * self.camera_aspect).min(w);
            (
                Rect::new(0.0, 0.0, w, screen_h),
                Rect::new((w - cam_w) / 2.0, screen_h, cam_w, row_h),
            )
        }
    }

    fn pip_camera(&self, canvas: &CanvasConfig, position: PipPosition) -> SourceLayout {
        let w = canvas.width as f64;
        let h = canvas.height as f64;
        let margin = self.effective_pip_margin(canvas);

        let mut cam_w = w * self.pip_width_fraction.clamp(0.0, 0.5);
        let mut cam_h = cam_w / self.camera_aspect;
        // Keep the camera to at most half the usable height on tall canvases.
        let max_h = (h - 2.0 * margin).max(0.0) * 0.5;
        if cam_h > max_h {
            cam_h = max_h;
            cam_w = cam_h * self.camera_aspect;
        }

        let x = match position {
            PipPosition::TopLeft | PipPosition::BottomLeft => margin,
            PipPosition::TopRight | PipPosition::BottomRight => w - margin - cam_w,
        };
        let y = match position {
            PipPosition::TopLeft | PipPosition::TopRight => margin,
            PipPosition::BottomLeft | PipPosition::BottomRight => h - margin - cam_h,
        };

        let half_short = cam_w.min(cam_h) / 2.0;
        SourceLayout {
            border_radius: Some(self.pip_border_radius.min(half_short)),
            border: Some(Border {
                width: self.pip_border.width.min(half_short),
                ..self.pip_border
            }),
            shadow: Some(self.pip_shadow),
            ..SourceLayout::from_rect(Rect::new(x, y, cam_w, cam_h), 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_model::layout::SourceKind;

    const HD: CanvasConfig = CanvasConfig::new(1280, 720);

    #[test]
    fn test_single_source_layouts_fill_canvas() {
        let layout = compute_layout(LayoutType::ScreenOnly, HD, None);
        let screen = layout.source(SourceKind::Screen).unwrap();
        assert_eq!(screen.rect(), HD.bounds());
        assert_eq!(screen.z_index, 0);
        assert!(layout.source(SourceKind::Camera).is_none());

        let layout = compute_layout(LayoutType::CameraOnly, HD, None);
        assert_eq!(
            layout.source(SourceKind::Camera).unwrap().rect(),
            HD.bounds()
        );
        assert!(layout.source(SourceKind::Screen).is_none());
    }

    #[test]
    fn test_side_by_side_splits_wider_axis() {
        let layout = compute_layout(LayoutType::SideBySide, HD, None);
        let screen = layout.source(SourceKind::Screen).unwrap().rect();
        let camera = layout.source(SourceKind::Camera).unwrap().rect();
        assert_eq!(screen, Rect::new(0.0, 0.0, 640.0, 720.0));
        assert_eq!(camera, Rect::new(640.0, 0.0, 640.0, 720.0));

        let portrait = CanvasConfig::new(720, 1280);
        let layout = compute_layout(LayoutType::SideBySide, portrait, None);
        let camera = layout.source(SourceKind::Camera).unwrap().rect();
        assert_eq!(camera, Rect::new(0.0, 640.0, 720.0, 640.0));
    }

    #[test]
    fn test_presentation_gives_screen_eighty_percent() {
        let layout = compute_layout(LayoutType::Presentation, HD, None);
        let screen = layout.source(SourceKind::Screen).unwrap().rect();
        let camera = layout.source(SourceKind::Camera).unwrap().rect();
        assert!((screen.width - 1024.0).abs() < 1e-9);
        assert!((camera.x - 1024.0).abs() < 1e-9);
        assert!((camera.width - 256.0).abs() < 1e-9);
        assert!((camera.height - 144.0).abs() < 1e-9);
        assert_eq!(screen.intersection_area(&camera), 0.0);
    }

    #[test]
    fn test_pip_bottom_right_is_inset_by_margin() {
        let engine = LayoutEngine::default();
        let layout = engine.compute(
            LayoutType::PictureInPicture,
            HD,
            Some(PipPosition::BottomRight),
        );
        let camera = layout.source(SourceKind::Camera).unwrap();
        let screen = layout.source(SourceKind::Screen).unwrap();
        let margin = engine.effective_pip_margin(&HD);
        assert_eq!(margin, 20.0);
        assert!((camera.x + camera.width - (1280.0 - margin)).abs() < 1e-9);
        assert!((camera.y + camera.height - (720.0 - margin)).abs() < 1e-9);
        assert!(camera.z_index > screen.z_index);
        assert!(camera.border.is_some());
        assert!(camera.shadow.is_some());
        assert_eq!(camera.border_radius, Some(12.0));
    }

    #[test]
    fn test_pip_corners() {
        let engine = LayoutEngine::default();
        let at = |pos| {
            engine
                .compute(LayoutType::PictureInPicture, HD, Some(pos))
                .sources
                .camera
                .unwrap()
        };
        assert_eq!(at(PipPosition::TopLeft).x, 20.0);
        assert_eq!(at(PipPosition::TopLeft).y, 20.0);
        assert!((at(PipPosition::TopRight).x - (1280.0 - 20.0 - 320.0)).abs() < 1e-9);
        assert_eq!(at(PipPosition::TopRight).y, 20.0);
        assert_eq!(at(PipPosition::BottomLeft).x, 20.0);
        assert!((at(PipPosition::BottomLeft).y - (720.0 - 20.0 - 180.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pip_defaults_to_bottom_right() {
        let a = compute_layout(LayoutType::PictureInPicture, HD, None);
        let b = compute_layout(
            LayoutType::PictureInPicture,
            HD,
            Some(PipPosition::BottomRight),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_pip_on_tiny_canvas_stays_inside() {
        let canvas = CanvasConfig::new(40, 10);
        let layout = compute_layout(LayoutType::PictureInPicture, canvas, None);
        let camera = layout.source(SourceKind::Camera).unwrap().rect();
        assert!(camera.fits_within(40.0, 10.0));
    }

    #[test]
    fn test_partial_engine_json_keeps_defaults() {
        let engine: LayoutEngine =
            serde_json::from_str(r#"{"pip_width_fraction": 0.3, "pip_margin": 8.0}"#).unwrap();
        assert_eq!(engine.pip_width_fraction, 0.3);
        assert_eq!(engine.pip_margin, 8.0);
        assert_eq!(engine.camera_aspect, LayoutEngine::default().camera_aspect);

        let layout = engine.compute(LayoutType::PictureInPicture, HD, Some(PipPosition::TopLeft));
        let camera = layout.source(SourceKind::Camera).unwrap();
        assert_eq!(camera.x, 8.0);
        assert!((camera.width - 384.0).abs() < 1e-9);
    }
}
