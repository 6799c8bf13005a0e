//! Transition animation between layouts.
//!
//! A transition captures where every affected source is *now* and where
//! the new layout puts it, then interpolates geometry and opacity over
//! the configured duration. Sources that only exist on one side fade:
//! arriving sources fade in at their target rectangle, departing sources
//! fade out where they are.
//!
//! Retargeting while a transition is in flight re-anchors from the
//! current interpolated placement, so the picture never snaps.

use lessoncast_common::clock::SessionClock;
use lessoncast_model::layout::{CompositorLayout, LayoutSources, SourceKind, SourceLayout};
use lessoncast_model::transition::{Easing, TransitionConfig};

/// Geometry plus transition opacity of one source at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub layout: SourceLayout,
    /// Multiplies the source's own opacity; 1.0 outside transitions.
    pub opacity: f64,
}

impl Placement {
    pub fn settled(layout: SourceLayout) -> Self {
        Self {
            layout,
            opacity: 1.0,
        }
    }

    fn lerp(a: &Placement, b: &Placement, t: f64) -> Placement {
        Placement {
            layout: SourceLayout::lerp(&a.layout, &b.layout, t),
            opacity: a.opacity + (b.opacity - a.opacity) * t,
        }
    }
}

/// What `transition_to` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStart {
    /// Target applied immediately; nothing to animate.
    Instant,
    /// A new transition started from settled placements.
    Started,
    /// An in-flight transition was replaced, anchored at its current position.
    Retargeted,
}

#[derive(Debug, Clone, Copy)]
struct Track {
    kind: SourceKind,
    from: Placement,
    to: Placement,
}

#[derive(Debug, Clone)]
struct ActiveTransition {
    target: CompositorLayout,
    tracks: Vec<Track>,
    started_ns: u64,
    duration_ns: u64,
    easing: Easing,
}

impl ActiveTransition {
    fn progress(&self, now_ns: u64) -> f64 {
        if self.duration_ns == 0 {
            return 1.0;
        }
        let elapsed = now_ns.saturating_sub(self.started_ns);
        (elapsed as f64 / self.duration_ns as f64).clamp(0.0, 1.0)
    }

    fn sample(&self, kind: SourceKind, now_ns: u64) -> Option<Placement> {
        let eased = self.easing.apply(self.progress(now_ns));
        self.tracks
            .iter()
            .find(|track| track.kind == kind)
            .map(|track| Placement::lerp(&track.from, &track.to, eased))
    }
}

/// Interpolates between layouts; at most one transition is ever in flight.
#[derive(Debug, Default)]
pub struct TransitionAnimator {
    active: Option<ActiveTransition>,
}

impl TransitionAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Layout the in-flight transition is heading to.
    pub fn target(&self) -> Option<&CompositorLayout> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Linear progress of the in-flight transition in `[0, 1]`.
    pub fn progress(&self, now_ns: u64) -> Option<f64> {
        self.active.as_ref().map(|a| a.progress(now_ns))
    }

    /// Begin animating towards `target`.
    ///
    /// `settled` is what is on screen when no transition is running; while
    /// one is running, the start state is its interpolated placement at
    /// `now_ns` instead.
    pub fn transition_to(
        &mut self,
        settled: &LayoutSources,
        target: CompositorLayout,
        config: TransitionConfig,
        now_ns: u64,
    ) -> TransitionStart {
        let in_flight = self.active.is_some();
        if config.is_instant() {
            self.active = None;
            return TransitionStart::Instant;
        }

        let mut tracks = Vec::with_capacity(SourceKind::ALL.len());
        for kind in SourceKind::ALL {
            let from = match &self.active {
                Some(active) => active.sample(kind, now_ns),
                None => settled.get(kind).copied().map(Placement::settled),
            };
            let to = target.source(kind).copied().map(Placement::settled);

            let track = match (from, to) {
                (Some(from), Some(to)) => Track { kind, from, to },
                (None, Some(to)) => Track {
                    kind,
                    from: Placement {
                        opacity: 0.0,
                        ..to
                    },
                    to,
                },
                (Some(from), None) => Track {
                    kind,
                    from,
                    to: Placement {
                        opacity: 0.0,
                        ..from
                    },
                },
                (None, None) => continue,
            };
            tracks.push(track);
        }

        tracing::debug!(
            layout = %target.layout_type,
            duration_ms = config.duration_ms,
            retarget = in_flight,
            "Transition started"
        );

        self.active = Some(ActiveTransition {
            target,
            tracks,
            started_ns: now_ns,
            duration_ns: SessionClock::ms_to_ns(config.duration_ms as f64),
            easing: config.easing,
        });

        if in_flight {
            TransitionStart::Retargeted
        } else {
            TransitionStart::Started
        }
    }

    /// Placement of `kind` at `now_ns`, or `None` when no transition
    /// involves that source.
    pub fn sample(&self, kind: SourceKind, now_ns: u64) -> Option<Placement> {
        self.active.as_ref()?.sample(kind, now_ns)
    }

    /// Finish the transition if its duration has elapsed, yielding the
    /// target layout. Returns `None` while still animating or when idle.
    pub fn advance(&mut self, now_ns: u64) -> Option<CompositorLayout> {
        let done = self
            .active
            .as_ref()
            .is_some_and(|active| active.progress(now_ns) >= 1.0);
        if done {
            self.active.take().map(|active| active.target)
        } else {
            None
        }
    }

    /// Abandon any in-flight transition.
    pub fn cancel(&mut self) -> Option<CompositorLayout> {
        self.active.take().map(|active| active.target)
    }
}
