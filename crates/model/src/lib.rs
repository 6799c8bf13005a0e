//! Lessoncast Model
//!
//! Defines the data contracts shared by the compositor and its
//! collaborators (studio UI, recorder, telemetry):
//! - **Geometry:** Rectangles, colours, and paint styling
//! - **Layout:** Layout types, per-source rectangles, canvas size
//! - **Config:** Compositor configuration and quality tuning
//! - **Events / State:** The event stream and the read-only state snapshot
//! - **Metrics:** Performance samples and quality levels
//!
//! All rectangle coordinates are in output-canvas pixels at full quality.

pub mod config;
pub mod event;
pub mod geometry;
pub mod layout;
pub mod metrics;
pub mod recording;
pub mod state;
pub mod transition;

pub use config::*;
pub use event::*;
pub use geometry::*;
pub use layout::*;
pub use metrics::*;
pub use recording::*;
pub use state::*;
pub use transition::*;
