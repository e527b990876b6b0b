//! Hover / selection / comparison state machine.
//!
//! The machine is pure: it owns no timers and performs no I/O. Each
//! [`InteractionMachine::dispatch`] returns the [`Directive`]s the host must
//! carry out (debounced or immediate detail fetches, debounce cancellation,
//! produced hover/select events).

use foundation::ids::{FeatureRef, GeoLevel};
use tracing::debug;

use crate::selection::Selection;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractionState {
    None,
    Hovered,
    Selected,
    Locked,
    Comparison,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    /// Feature under the pointer, already resolved on the routed level.
    PointerMove(Option<FeatureRef>),
    /// `additive` is the multi-select modifier.
    Click {
        feature: Option<FeatureRef>,
        additive: bool,
    },
    Shift(bool),
    Escape,
    LevelChanged(GeoLevel),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Urgency {
    /// Pointer-driven; wait for the hover debounce.
    Debounced,
    /// Explicit user intent; fetch now.
    Immediate,
}

/// What a fetched detail series is displayed as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetailSlot {
    /// Hovered feature, or the primary selected one.
    Focus,
    Comparison,
    /// Non-primary selection member, needed for aggregates.
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Fetch {
        feature: FeatureRef,
        urgency: Urgency,
        slot: DetailSlot,
    },
    CancelDebounce,
    HoverChanged(Option<FeatureRef>),
    /// Carries the primary selected feature.
    SelectionChanged(Option<FeatureRef>),
    ComparisonChanged(Option<FeatureRef>),
}

#[derive(Debug, Clone, Default)]
pub struct InteractionMachine {
    hovered: Option<FeatureRef>,
    selection: Selection,
    locked: bool,
    comparison: Option<FeatureRef>,
    shift_held: bool,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<&FeatureRef> {
        self.hovered.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn comparison(&self) -> Option<&FeatureRef> {
        self.comparison.as_ref()
    }

    /// A selection exists and its tooltip is pinned.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn shift_held(&self) -> bool {
        self.shift_held
    }

    /// Feature whose detail the main chart shows.
    pub fn focus(&self) -> Option<&FeatureRef> {
        self.selection.primary().or(self.hovered.as_ref())
    }

    /// Candidate for the preview aggregate: only while shift is held, never a
    /// feature that is already selected.
    pub fn preview_candidate(&self) -> Option<&FeatureRef> {
        if !self.shift_held || self.selection.is_empty() {
            return None;
        }
        self.comparison
            .as_ref()
            .or(self.hovered.as_ref())
            .filter(|f| !self.selection.contains(f))
    }

    pub fn state_of(&self, feature: &FeatureRef) -> InteractionState {
        if self.selection.contains(feature) {
            if self.locked {
                InteractionState::Locked
            } else {
                InteractionState::Selected
            }
        } else if self.comparison.as_ref() == Some(feature) {
            InteractionState::Comparison
        } else if self.hovered.as_ref() == Some(feature) {
            InteractionState::Hovered
        } else {
            InteractionState::None
        }
    }

    pub fn dispatch(&mut self, event: InteractionEvent) -> Vec<Directive> {
        let mut out = Vec::new();
        match event {
            InteractionEvent::PointerMove(feature) => self.pointer_move(feature, &mut out),
            InteractionEvent::Click {
                feature: None, ..
            } => self.clear_all(&mut out),
            InteractionEvent::Click {
                feature: Some(feature),
                additive: false,
            } => self.click(feature, &mut out),
            InteractionEvent::Click {
                feature: Some(feature),
                additive: true,
            } => self.toggle_member(feature, &mut out),
            InteractionEvent::Shift(held) => self.shift_held = held,
            InteractionEvent::Escape => self.clear_all(&mut out),
            InteractionEvent::LevelChanged(level) => {
                debug!(%level, "geography level changed; resetting interaction");
                self.clear_all(&mut out);
            }
        }
        out
    }

    fn pointer_move(&mut self, feature: Option<FeatureRef>, out: &mut Vec<Directive>) {
        if self.locked {
            self.compare_with(feature, out);
            return;
        }
        // Same feature under a jittering pointer: no change, no refetch.
        if self.hovered == feature {
            return;
        }
        self.hovered = feature.clone();
        out.push(Directive::HoverChanged(feature.clone()));
        match feature {
            Some(feature) => out.push(Directive::Fetch {
                feature,
                urgency: Urgency::Debounced,
                slot: DetailSlot::Focus,
            }),
            None => out.push(Directive::CancelDebounce),
        }
    }

    fn compare_with(&mut self, feature: Option<FeatureRef>, out: &mut Vec<Directive>) {
        if self.shift_held {
            return;
        }
        match feature {
            None => {
                if self.comparison.take().is_some() {
                    out.push(Directive::CancelDebounce);
                    out.push(Directive::ComparisonChanged(None));
                }
            }
            Some(f) if self.selection.contains(&f) => {}
            Some(f) if self.comparison.as_ref() == Some(&f) => {}
            Some(f) => {
                self.comparison = Some(f.clone());
                out.push(Directive::ComparisonChanged(Some(f.clone())));
                out.push(Directive::Fetch {
                    feature: f,
                    urgency: Urgency::Debounced,
                    slot: DetailSlot::Comparison,
                });
            }
        }
    }

    fn click(&mut self, feature: FeatureRef, out: &mut Vec<Directive>) {
        // Clicking the sole member again deselects, locked or not.
        if self.selection.is_only(&feature) {
            self.clear_all(out);
            return;
        }
        out.push(Directive::CancelDebounce);
        if self.hovered.take().is_some() {
            out.push(Directive::HoverChanged(None));
        }
        if self.comparison.take().is_some() {
            out.push(Directive::ComparisonChanged(None));
        }
        self.selection.replace_with(feature.clone());
        self.locked = true;
        out.push(Directive::SelectionChanged(Some(feature.clone())));
        out.push(Directive::Fetch {
            feature,
            urgency: Urgency::Immediate,
            slot: DetailSlot::Focus,
        });
    }

    fn toggle_member(&mut self, feature: FeatureRef, out: &mut Vec<Directive>) {
        if self.selection.remove(&feature) {
            if self.selection.is_empty() {
                self.locked = false;
            }
            out.push(Directive::SelectionChanged(self.selection.primary().cloned()));
            return;
        }

        if self.comparison.as_ref() == Some(&feature) {
            self.comparison = None;
            out.push(Directive::ComparisonChanged(None));
        }
        if self.hovered.as_ref() == Some(&feature) {
            self.hovered = None;
            out.push(Directive::HoverChanged(None));
        }
        let slot = if self.selection.is_empty() {
            DetailSlot::Focus
        } else {
            DetailSlot::Member
        };
        self.selection.insert(feature.clone());
        out.push(Directive::SelectionChanged(self.selection.primary().cloned()));
        out.push(Directive::Fetch {
            feature,
            urgency: Urgency::Immediate,
            slot,
        });
    }

    fn clear_all(&mut self, out: &mut Vec<Directive>) {
        out.push(Directive::CancelDebounce);
        if self.hovered.take().is_some() {
            out.push(Directive::HoverChanged(None));
        }
        if self.comparison.take().is_some() {
            out.push(Directive::ComparisonChanged(None));
        }
        if !self.selection.is_empty() {
            self.selection.clear();
            out.push(Directive::SelectionChanged(None));
        }
        self.locked = false;
    }
}
