//! Timeline planning and per-frame animation state.
//!
//! The planner classifies layers and builds a [`timeline::Timeline`]; the motion engine and
//! state generator then turn `(timeline, t)` into [`state::LayerAnimState`] values without
//! any hidden state, so frames can be evaluated in any order.

/// Easing curves.
pub mod ease;
/// Drag paths, brush cursor paths, camera evaluation.
pub mod motion;
/// Layer classification and start-time assignment.
pub mod planner;
/// Per-layer, per-instant render state.
pub mod state;
/// Actions, camera moves and the timeline container.
pub mod timeline;
