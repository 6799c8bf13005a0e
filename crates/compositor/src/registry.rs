//! Source registry.
//!
//! Tracks every registered video source by id, at most one per kind,
//! along with its visibility, opacity, and current placement. Device
//! handles of removed sources are parked until `dispose` releases them.

use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_model::layout::{SourceKind, SourceLayout};
use lessoncast_model::state::{SourceConfig, SourceSummary};

use crate::capability::{DeviceRelease, FrameSource, VideoFrame};

/// Clamp an opacity request into `[0, 1]`; NaN means fully transparent.
pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        0.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

struct RegisteredSource {
    id: String,
    kind: SourceKind,
    label: String,
    config: SourceConfig,
    video: Box<dyn FrameSource>,
    has_audio: bool,
    last_frame: Option<VideoFrame>,
}

/// Registered video sources, in registration order.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
    devices: Vec<(String, Box<dyn DeviceRelease>)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn has_kind(&self, kind: SourceKind) -> bool {
        self.sources.iter().any(|s| s.kind == kind)
    }

    fn find(&self, id: &str) -> Option<&RegisteredSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn find_mut(&mut self, id: &str) -> CompositorResult<&mut RegisteredSource> {
        self.sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CompositorError::source(format!("unknown source '{id}'")))
    }

    /// Register a video source. Fails on a duplicate id or a second
    /// source of the same kind.
    pub fn add(
        &mut self,
        id: &str,
        kind: SourceKind,
        label: String,
        video: Box<dyn FrameSource>,
        has_audio: bool,
        layout: SourceLayout,
    ) -> CompositorResult<()> {
        if id.is_empty() {
            return Err(CompositorError::source("source id must not be empty"));
        }
        if self.contains(id) {
            return Err(CompositorError::source(format!(
                "source '{id}' is already registered"
            )));
        }
        if let Some(existing) = self.sources.iter().find(|s| s.kind == kind) {
            return Err(CompositorError::source(format!(
                "a {kind} source is already registered as '{}'",
                existing.id
            )));
        }

        self.sources.push(RegisteredSource {
            id: id.to_string(),
            kind,
            label,
            config: SourceConfig {
                layout,
                visible: true,
                opacity: 1.0,
            },
            video,
            has_audio,
            last_frame: None,
        });
        Ok(())
    }

    /// Keep a device handle for release at dispose time.
    pub fn adopt_device(&mut self, id: &str, device: Box<dyn DeviceRelease>) {
        self.devices.push((id.to_string(), device));
    }

    /// Unregister a source, returning its kind. Its device stays parked.
    pub fn remove(&mut self, id: &str) -> Option<SourceKind> {
        let index = self.sources.iter().position(|s| s.id == id)?;
        Some(self.sources.remove(index).kind)
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> CompositorResult<SourceConfig> {
        let source = self.find_mut(id)?;
        source.config.visible = visible;
        Ok(source.config)
    }

    pub fn set_opacity(&mut self, id: &str, opacity: f64) -> CompositorResult<SourceConfig> {
        let source = self.find_mut(id)?;
        source.config.opacity = clamp_opacity(opacity);
        Ok(source.config)
    }

    /// Update the placement of whichever source has `kind`.
    pub fn set_layout(&mut self, kind: SourceKind, layout: SourceLayout) {
        if let Some(source) = self.sources.iter_mut().find(|s| s.kind == kind) {
            source.config.layout = layout;
        }
    }

    pub fn config(&self, kind: SourceKind) -> Option<SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.config)
    }

    /// Pull the newest frame for `kind`, falling back to the previous one.
    pub fn frame(&mut self, kind: SourceKind) -> CompositorResult<Option<VideoFrame>> {
        let Some(source) = self.sources.iter_mut().find(|s| s.kind == kind) else {
            return Ok(None);
        };
        match source.video.read_frame() {
            Ok(Some(frame)) => {
                source.last_frame = Some(frame.clone());
                Ok(Some(frame))
            }
            Ok(None) => Ok(source.last_frame.clone()),
            Err(e) => Err(CompositorError::render(format!(
                "source '{}' failed to deliver a frame: {e}",
                source.id
            ))),
        }
    }

    pub fn summaries(&self) -> Vec<SourceSummary> {
        self.sources
            .iter()
            .map(|s| SourceSummary {
                id: s.id.clone(),
                kind: s.kind,
                label: s.label.clone(),
                config: s.config,
                has_audio: s.has_audio,
            })
            .collect()
    }

    /// Drop every source and hand back all device handles.
    pub fn drain_devices(&mut self) -> Vec<(String, Box<dyn DeviceRelease>)> {
        self.sources.clear();
        std::mem::take(&mut self.devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{FailingSource, SolidColor};
    use lessoncast_model::geometry::{Rect, Rgba};

    fn layout() -> SourceLayout {
        SourceLayout::from_rect(Rect::new(0.0, 0.0, 16.0, 9.0), 0)
    }

    fn add(registry: &mut SourceRegistry, id: &str, kind: SourceKind) -> CompositorResult<()> {
        registry.add(
            id,
            kind,
            id.to_string(),
            Box::new(SolidColor::new(4, 4, Rgba::WHITE)),
            false,
            layout(),
        )
    }

    #[test]
    fn test_duplicate_id_and_kind_are_rejected() {
        let mut registry = SourceRegistry::new();
        add(&mut registry, "screen1", SourceKind::Screen).unwrap();
        assert!(matches!(
            add(&mut registry, "screen1", SourceKind::Camera),
            Err(CompositorError::Source { .. })
        ));
        assert!(add(&mut registry, "screen2", SourceKind::Screen).is_err());
        add(&mut registry, "cam1", SourceKind::Camera).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_opacity_is_clamped() {
        let mut registry = SourceRegistry::new();
        add(&mut registry, "cam1", SourceKind::Camera).unwrap();
        assert_eq!(registry.set_opacity("cam1", 1.5).unwrap().opacity, 1.0);
        assert_eq!(registry.set_opacity("cam1", -0.3).unwrap().opacity, 0.0);
        assert_eq!(registry.set_opacity("cam1", f64::NAN).unwrap().opacity, 0.0);
        assert!(registry.set_opacity("nope", 0.5).is_err());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SourceRegistry::new();
        add(&mut registry, "cam1", SourceKind::Camera).unwrap();
        assert_eq!(registry.remove("cam1"), Some(SourceKind::Camera));
        assert_eq!(registry.remove("cam1"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_source_failure_becomes_render_error() {
        let mut registry = SourceRegistry::new();
        registry
            .add(
                "cam1",
                SourceKind::Camera,
                "Camera".into(),
                Box::new(FailingSource),
                false,
                layout(),
            )
            .unwrap();
        assert!(matches!(
            registry.frame(SourceKind::Camera),
            Err(CompositorError::Render { .. })
        ));
        assert!(registry.frame(SourceKind::Screen).unwrap().is_none());
    }
}
