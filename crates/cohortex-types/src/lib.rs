mod bounds;
mod error;
mod frame;
mod result;

pub use bounds::{BoundDirection, Closed, EndpointExpr, EventBounds, TemporalBounds};
pub use error::{Error, Result};
pub use frame::{Column, PredicateFrame};
pub use result::{CohortRow, QueryResult, WindowSummary};

/// Reserved column counting any real-timestamp event.
pub const ANY_EVENT_COLUMN: &str = "_ANY_EVENT";

/// Reserved marker for each subject's earliest real-timestamp row.
pub const RECORD_START_COLUMN: &str = "_RECORD_START";

/// Reserved marker for each subject's latest real-timestamp row.
pub const RECORD_END_COLUMN: &str = "_RECORD_END";
