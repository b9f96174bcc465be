//! Domain logic that spans several tables or has no storage of its own

pub mod readiness;
pub mod scheduling;
pub mod workflow;
