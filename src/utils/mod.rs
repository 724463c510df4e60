pub mod precision;
pub mod schedule;
