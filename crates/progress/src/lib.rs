//! Progress gating and mission resolution.
//!
//! Unlock gate, lazy day reconciliation, countdowns and the mission
//! precedence rules.

#![warn(missing_docs)]

pub mod gate;
pub mod countdown;
pub mod reconcile;
pub mod calendar;
pub mod resolver;

pub use gate::{evaluate, GateStatus, UnlockGate, UnlockSchedule};
pub use countdown::{Countdown, CountdownPoller};
pub use reconcile::reconcile;
pub use calendar::{SpecialDayCalendar, SpecialDayRule};
pub use resolver::{confirm_retirement, resolve_mission, MissionResolver, MissionSource, ResolvedMission};
