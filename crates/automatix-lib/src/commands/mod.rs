pub mod schedule;
pub mod update;
