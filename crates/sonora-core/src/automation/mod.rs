//! Time-keyed automation curves
//!
//! A [`AutomationLane`] is a sorted list of control points with curve-shaped
//! interpolation between them. [`AutomationManager`] is the registry of
//! lanes by parameter id: the control thread edits it under a lock and
//! republishes an immutable [`AutomationSnapshot`] after every edit, which the
//! audio thread reads through an [`AutomationReader`] without ever blocking.

mod lane;
mod manager;

pub use lane::{AutomationLane, AutomationPoint};
pub use manager::{
    AutomationData, AutomationManager, AutomationReader, AutomationSnapshot, ParameterId,
};
