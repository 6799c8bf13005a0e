//! Layout validation.

use lessoncast_common::{CompositorError, CompositorResult};
use lessoncast_model::layout::{CompositorLayout, LayoutType, SourceKind};
use serde::{Deserialize, Serialize};

/// Rectangles narrower or shorter than this draw as slivers.
pub const MIN_VISIBLE_SIZE: f64 = 2.0;

/// Outcome of [`validate_layout`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutValidationResult {
    pub is_valid: bool,
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Non-blocking problems.
    pub warnings: Vec<String>,
}

impl LayoutValidationResult {
    /// Convert to a `LayoutValidation` error when any blocking problem exists.
    pub fn into_result(self) -> CompositorResult<Vec<String>> {
        if self.is_valid {
            Ok(self.warnings)
        } else {
            Err(CompositorError::layout(self.errors))
        }
    }
}

/// Check required sources, bounds, and z-order of a layout.
///
/// Sources may share a z-index as long as their rectangles do not overlap;
/// overlapping sources need distinct z-indices so the draw order is defined.
pub fn validate_layout(layout: &CompositorLayout) -> LayoutValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let canvas = layout.canvas;
    let required = layout.layout_type.required_sources();

    if !canvas.is_valid() {
        errors.push(format!(
            "canvas must be larger than zero, got {}x{}",
            canvas.width, canvas.height
        ));
    }

    for kind in required {
        if layout.source(*kind).is_none() {
            errors.push(format!(
                "{} layout requires a {} source",
                layout.layout_type, kind
            ));
        }
    }
    for kind in SourceKind::ALL {
        if !required.contains(&kind) && layout.source(kind).is_some() {
            errors.push(format!(
                "{} layout must not place a {} source",
                layout.layout_type, kind
            ));
        }
    }

    let (cw, ch) = (canvas.width as f64, canvas.height as f64);
    let mut placed = Vec::with_capacity(layout.sources.len());
    for (kind, source) in layout.sources.iter() {
        let rect = source.rect();
        if !rect.is_finite() {
            errors.push(format!("{kind} rectangle has non-finite coordinates"));
            continue;
        }
        if rect.width < 0.0 || rect.height < 0.0 {
            errors.push(format!(
                "{kind} rectangle has negative size {}x{}",
                rect.width, rect.height
            ));
        } else if !rect.fits_within(cw, ch) {
            errors.push(format!(
                "{kind} rectangle ({}, {}, {}x{}) exceeds the {}x{} canvas",
                rect.x, rect.y, rect.width, rect.height, canvas.width, canvas.height
            ));
        }
        if rect.width < MIN_VISIBLE_SIZE || rect.height < MIN_VISIBLE_SIZE {
            warnings.push(format!(
                "{kind} rectangle is nearly invisible ({}x{})",
                rect.width, rect.height
            ));
        }
        placed.push((kind, rect, source.z_index));

        let half_short = rect.width.min(rect.height).max(0.0) / 2.0;
        if let Some(radius) = source.border_radius {
            if radius < 0.0 {
                errors.push(format!("{kind} border radius is negative"));
            } else if radius > half_short + 1e-9 {
                warnings.push(format!(
                    "{kind} border radius {radius} exceeds half the short side"
                ));
            }
        }
        if let Some(border) = source.border {
            if border.width < 0.0 {
                errors.push(format!("{kind} border width is negative"));
            } else if border.width > half_short + 1e-9 {
                warnings.push(format!("{kind} border covers the whole source"));
            }
        }
    }

    for (i, (a_kind, a_rect, a_z)) in placed.iter().enumerate() {
        for (b_kind, b_rect, b_z) in &placed[i + 1..] {
            if a_z == b_z && a_rect.intersection_area(b_rect) > 0.0 {
                errors.push(format!(
                    "{a_kind} and {b_kind} overlap at the same z-index {a_z}"
                ));
            }
        }
    }

    if let (Some(screen), Some(camera)) = (
        layout.source(SourceKind::Screen),
        layout.source(SourceKind::Camera),
    ) {
        let overlap = screen.rect().intersection_area(&camera.rect());
        if overlap > 0.0 && layout.layout_type != LayoutType::PictureInPicture {
            warnings.push(format!(
                "screen and camera overlap by {overlap:.1} square pixels"
            ));
        }
    }

    LayoutValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}
