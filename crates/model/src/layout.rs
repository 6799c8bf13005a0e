//! Layout types and per-source placement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{lerp, Border, Rect, Shadow};

/// Named arrangement strategy for the camera and screen sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutType {
    ScreenOnly,
    CameraOnly,
    SideBySide,
    Presentation,
    PictureInPicture,
}

impl LayoutType {
    pub const ALL: [LayoutType; 5] = [
        LayoutType::ScreenOnly,
        LayoutType::CameraOnly,
        LayoutType::SideBySide,
        LayoutType::Presentation,
        LayoutType::PictureInPicture,
    ];

    /// Source kinds this layout places on the canvas.
    pub fn required_sources(self) -> &'static [SourceKind] {
        match self {
            LayoutType::ScreenOnly => &[SourceKind::Screen],
            LayoutType::CameraOnly => &[SourceKind::Camera],
            LayoutType::SideBySide | LayoutType::Presentation | LayoutType::PictureInPicture => {
                &[SourceKind::Screen, SourceKind::Camera]
            }
        }
    }

    /// Whether the layout places both sources.
    pub fn is_composite(self) -> bool {
        self.required_sources().len() == 2
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutType::ScreenOnly => "screen-only",
            LayoutType::CameraOnly => "camera-only",
            LayoutType::SideBySide => "side-by-side",
            LayoutType::Presentation => "presentation",
            LayoutType::PictureInPicture => "picture-in-picture",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown layout type: {s}"))
    }
}

/// Corner the picture-in-picture camera is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl FromStr for PipPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(PipPosition::TopLeft),
            "top-right" => Ok(PipPosition::TopRight),
            "bottom-left" => Ok(PipPosition::BottomLeft),
            "bottom-right" => Ok(PipPosition::BottomRight),
            other => Err(format!("unknown pip position: {other}")),
        }
    }
}

/// Kind tag of a video source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Screen,
    Camera,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Screen, SourceKind::Camera];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Screen => "screen",
            SourceKind::Camera => "camera",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screen" => Ok(SourceKind::Screen),
            "camera" => Ok(SourceKind::Camera),
            other => Err(format!("unsupported source kind: {other}")),
        }
    }
}

/// Output surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl CanvasConfig {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The whole canvas as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    /// Canvas scaled by a quality factor, never below 1x1.
    pub fn scaled(&self, factor: f64) -> CanvasConfig {
        CanvasConfig {
            width: ((self.width as f64 * factor).round() as u32).max(1),
            height: ((self.height as f64 * factor).round() as u32).max(1),
        }
    }
}

/// Placement and paint styling of one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

impl SourceLayout {
    /// Unstyled placement.
    pub fn from_rect(rect: Rect, z_index: i32) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            z_index,
            border_radius: None,
            border: None,
            shadow: None,
        }
    }

    /// Placement filling the whole canvas at z-index 0.
    pub fn full_canvas(canvas: &CanvasConfig) -> Self {
        Self::from_rect(canvas.bounds(), 0)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Replace geometry, keeping z-index and styling.
    pub fn with_rect(self, rect: Rect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            ..self
        }
    }

    /// Interpolate geometry between two placements.
    ///
    /// Z-index and styling switch to `b` at the halfway point; the corner
    /// radius is blended when both ends have one.
    pub fn lerp(a: &SourceLayout, b: &SourceLayout, t: f64) -> SourceLayout {
        let t = t.clamp(0.0, 1.0);
        let styled = if t < 0.5 { a } else { b };
        let border_radius = match (a.border_radius, b.border_radius) {
            (Some(ra), Some(rb)) => Some(lerp(ra, rb, t)),
            _ => styled.border_radius,
        };
        SourceLayout {
            border_radius,
            ..styled.with_rect(Rect::lerp(&a.rect(), &b.rect(), t))
        }
    }
}

/// Per-kind slots of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutSources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<SourceLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<SourceLayout>,
}

impl LayoutSources {
    pub fn get(&self, kind: SourceKind) -> Option<&SourceLayout> {
        match kind {
            SourceKind::Camera => self.camera.as_ref(),
            SourceKind::Screen => self.screen.as_ref(),
        }
    }

    pub fn set(&mut self, kind: SourceKind, layout: Option<SourceLayout>) {
        match kind {
            SourceKind::Camera => self.camera = layout,
            SourceKind::Screen => self.screen = layout,
        }
    }

    /// Present placements, screen first.
    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &SourceLayout)> {
        SourceKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|layout| (kind, layout)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.screen.is_none()
    }
}

/// The desired arrangement of the camera and screen sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositorLayout {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    pub canvas: CanvasConfig,
    pub sources: LayoutSources,
}

impl CompositorLayout {
    pub fn source(&self, kind: SourceKind) -> Option<&SourceLayout> {
        self.sources.get(kind)
    }
}
