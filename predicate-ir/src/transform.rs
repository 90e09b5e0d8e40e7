//! The transform-to-fixed-point driver (spec §4.5 "Transformation
//! pipeline"). Runs `pre_transform` once, then repeats `transform` passes
//! over the whole graph until none report a change, then runs
//! `post_transform` once.

use crate::call_factory::CallFactory;
use crate::error::Result;
use crate::eval_context::Reporter;
use crate::merge_graph::MergeGraph;

/// A hard ceiling on transform passes, guarding against a buggy
/// `transform` implementation that oscillates instead of converging. Any
/// real rewrite set in this workspace converges in a handful of passes;
/// this is a backstop, not a tuning knob.
const MAX_PASSES: usize = 10_000;

/// Runs `graph`'s rewrite pipeline to a fixed point (spec §4.5), returning
/// the number of passes taken. Fails with [`crate::error::Error`] if a
/// node's `pre_transform`, `transform`, or `post_transform` does, or if
/// the pass count exceeds [`MAX_PASSES`] without converging.
pub fn transform_graph(
    graph: &mut MergeGraph,
    factory: &CallFactory,
    reporter: &mut Reporter,
) -> Result<usize> {
    graph.pre_transform_all(reporter)?;
    if reporter.has_errors() {
        return Ok(0);
    }

    let mut passes = 0;
    loop {
        let changed = graph.transform_pass(factory, reporter)?;
        passes += 1;
        if !changed {
            break;
        }
        if passes >= MAX_PASSES {
            return Err(crate::error::Error::InvalidState(format!(
                "transform pipeline did not converge after {MAX_PASSES} passes"
            )));
        }
    }

    graph.post_transform_all(reporter)?;
    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LiteralNode;
    use crate::value::Value;

    #[test]
    fn fixed_point_on_already_stable_graph_takes_one_pass() {
        let mut g = MergeGraph::new();
        g.add_root(Box::new(LiteralNode::new(Some(Value::number(1)))));
        let factory = CallFactory::new();
        let mut reporter = Reporter::new();
        let passes = transform_graph(&mut g, &factory, &mut reporter).unwrap();
        assert_eq!(passes, 1);
        assert!(!reporter.has_errors());
    }
}
