//! Grammar loading and compilation (spec §3, §4.5).

mod compile;
mod raw;

pub use compile::{Error, Grammar};
pub(crate) use compile::{ContainerRule, MatchRule, RangeRule, RuleId, RuleNode};
