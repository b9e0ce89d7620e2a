// Task layer - parses and validates declarative task documents
// (predicates, trigger, windows) and derives the window tree the
// engine evaluates.

mod config;
mod duration;
mod error;
mod predicate;
mod tree;
mod window;

pub use config::TaskConfig;
pub use duration::parse_duration;
pub use error::{Error, Result};
pub use predicate::{Combinator, DerivedPredicate, PlainPredicate, PredicateDef};
pub use tree::{TreeNode, WindowTree, TRIGGER_NODE};
pub use window::{CountBounds, Endpoint, WindowRef, WindowSpec};
