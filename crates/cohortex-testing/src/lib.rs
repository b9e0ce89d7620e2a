// Test support - reference datasets and assertion helpers shared by the
// engine and CLI integration tests. Not published.

mod assertions;
mod fixtures;

pub use assertions::naive_interval_sums;
pub use fixtures::{event_bound_frame, mortality_frame, mortality_task, parse_ts, temporal_frame, MORTALITY_TASK_YAML};
