//! The concrete, per-transaction evaluation state machine that implements
//! `predicate_ir::EvalContext` (spec §4.6 "Evaluation driver").
//!
//! Evaluation state is created fresh for each transaction, indexed once
//! over every node reachable from the shared (`Arc`-wrapped) `MergeGraph`,
//! initialised by a `pre_eval` pass, driven phase by phase, and discarded
//! when the transaction ends. The `MergeGraph` itself is never mutated
//! here — only this crate's own dense per-node slot tables are.

mod indexer;
mod state;

pub use indexer::Indexer;
pub use state::{GraphEvalState, SlotState};
