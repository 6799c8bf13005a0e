//! Lessoncast Layout: geometry for the compositor
//!
//! - **Layout Engine:** Per-source rectangles for a layout type and canvas
//! - **Validation:** Blocking errors and non-blocking warnings for a layout
//! - **Transitions:** Eased interpolation between two layouts over time
//!
//! This crate is pure computation with no I/O and no clock of its own.
//! Time enters as nanosecond timestamps supplied by the render loop.

pub mod engine;
pub mod transition;
pub mod validate;

pub use engine::{compute_layout, LayoutEngine};
pub use transition::{Placement, TransitionAnimator, TransitionStart};
pub use validate::{validate_layout, LayoutValidationResult};
