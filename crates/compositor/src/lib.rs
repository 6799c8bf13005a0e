//! Lessoncast Compositor
//!
//! Merges a screen capture and a camera into one output video stream,
//! mixes every attached audio track into one output audio track, and
//! degrades output quality under load.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      Compositor                       │
//! │  ┌──────────┐  ┌────────────┐  ┌──────────────────┐   │
//! │  │ Source   │  │ Transition │  │ Performance      │   │
//! │  │ Registry │  │ Animator   │  │ Monitor/Quality  │   │
//! │  └────┬─────┘  └─────┬──────┘  └────────┬─────────┘   │
//! │       │ frames       │ placements       │ level       │
//! │       ▼              ▼                  ▼             │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │        Canvas (owned, one composite/tick)       │  │
//! │  └────────────────────────┬────────────────────────┘  │
//! │  ┌──────────────┐         │                           │
//! │  │ Audio Mixer  ├─────────┤                           │
//! │  └──────────────┘         ▼                           │
//! │                    FrameSink / OutputStream ──► recorder
//! │  EventBus (broadcast) ──────────────────────► UI, recorder
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! The render loop is single-threaded and cooperative: the host calls
//! [`Compositor::tick`] once per refresh, or runs [`RenderLoop`] on a
//! tokio interval. Every public operation is a synchronous state change
//! that becomes visible on the next tick.

pub mod canvas;
pub mod capability;
pub mod compositor;
pub mod events;
pub mod mixer;
pub mod output;
pub mod performance;
pub mod quality;
pub mod registry;
pub mod render_loop;
pub mod synthetic;

pub use capability::*;
pub use compositor::*;
pub use output::{AudioBlock, OutputFrame, OutputStream};
pub use render_loop::{LoopStats, RenderLoop};
