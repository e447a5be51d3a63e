//! Shared selection and filter state.
//!
//! Both are owned by a [`LinkGroup`](crate::group::LinkGroup) and mutated
//! only through it, so every change gets a sequence number and is fanned out
//! to the other consumers of the group.

mod filter;
mod selection;

pub use filter::FilterState;
pub use selection::{SelectionMark, SelectionState};
