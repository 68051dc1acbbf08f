pub mod planner;
pub mod recurrence;
