//! `ref`, and the per-template call node synthesized for each
//! `(define NAME arg-names… body)` registration (spec §4.7 "Template").
//!
//! Unlike the rest of the standard library, a template's call node isn't
//! registered once under a fixed name: `make_template_call` builds one
//! `Constructor` per `NAME` at configuration-load time, after the template's
//! body has been parsed and its definition stored in the `CallFactory` via
//! `register_template`. The node itself only ever reads that definition back
//! (`transform` never mutates the factory), so it fits the existing
//! `Node::transform(&self, _, _, factory: &CallFactory, _)` contract without
//! any change to it.

use predicate_ir::{
    CallFactory, EvalContext, LiteralNode, MergeGraph, Node, NodeKind, NodeRef, Reporter, Result,
    TemplateDef, TransformOutcome, TxnContext, Value,
};

/// `(ref 'argName')`: a placeholder inside a template body, substituted by
/// the enclosing template call's `transform` for the matching actual
/// argument. A `ref` that survives outside of template expansion (never
/// reached by `deep_copy`) is a configuration error, flagged every pass
/// until its surrounding template is fixed.
#[derive(Debug, Clone)]
pub struct RefNode {
    children: Vec<NodeRef>,
}

impl RefNode {
    /// Builds a `ref argName` node over its single literal-name child.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for RefNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "ref",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(ref {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 1 {
            reporter.error(None, "`ref` expects 1 argument".to_string());
        }
        Ok(())
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        _graph: &mut MergeGraph,
        _factory: &CallFactory,
        reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        reporter.error(
            Some(self_ref),
            "`ref` used outside of a template body".to_string(),
        );
        Ok(TransformOutcome::Unchanged)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        // Reachable only if a stray `ref` made it past transform; absent is
        // the safest answer.
        state.finish(self_ref);
        Ok(())
    }
}

/// Reads `node`'s argument name out of a `(ref 'name')` node, if `node` is
/// shaped that way.
fn ref_argument_name(node: NodeRef, graph: &MergeGraph) -> Result<Option<Vec<u8>>> {
    let concrete = graph.get(node)?;
    let is_ref = matches!(concrete.kind(), NodeKind::Call { name: "ref", .. });
    if !is_ref {
        return Ok(None);
    }
    let children = concrete.children().to_vec();
    let Some(&name_arg) = children.first() else {
        return Ok(None);
    };
    let name_node = graph.get(name_arg)?;
    let NodeKind::Literal(Some(v)) = name_node.kind() else {
        return Ok(None);
    };
    Ok(v.as_string().map(|b| b.to_vec()))
}

/// Deep-copies `node`'s subtree into `graph`, substituting `(ref 'name')`
/// placeholders for the corresponding `actual_args` entry, preserving
/// self-referential refs (an argument name equal to the template's own
/// `template_name`) unexpanded so templates can recurse through their own
/// call name, and reporting unknown argument names as transform errors.
fn deep_copy(
    node: NodeRef,
    graph: &mut MergeGraph,
    factory: &CallFactory,
    reporter: &mut Reporter,
    template_name: &str,
    arg_names: &[Vec<u8>],
    actual_args: &[NodeRef],
) -> Result<NodeRef> {
    if let Some(arg_name) = ref_argument_name(node, graph)? {
        if arg_name.as_slice() == template_name.as_bytes() {
            return copy_verbatim(node, graph, factory, reporter, template_name, arg_names, actual_args);
        }
        if let Some(pos) = arg_names.iter().position(|n| n == &arg_name) {
            return Ok(actual_args[pos]);
        }
        reporter.error(
            Some(node),
            format!(
                "`ref` names unknown argument `{}` in template `{}`",
                String::from_utf8_lossy(&arg_name),
                template_name
            ),
        );
        let absent = graph.insert(Box::new(LiteralNode::new(None)));
        return Ok(absent);
    }
    copy_verbatim(node, graph, factory, reporter, template_name, arg_names, actual_args)
}

fn copy_verbatim(
    node: NodeRef,
    graph: &mut MergeGraph,
    factory: &CallFactory,
    reporter: &mut Reporter,
    template_name: &str,
    arg_names: &[Vec<u8>],
    actual_args: &[NodeRef],
) -> Result<NodeRef> {
    enum Shape {
        Literal(Option<Value>),
        Call(String),
    }
    let (shape, children) = {
        let concrete = graph.get(node)?;
        let shape = match concrete.kind() {
            NodeKind::Literal(v) => Shape::Literal(v.cloned()),
            NodeKind::Call { name, .. } => Shape::Call(name.to_string()),
        };
        (shape, concrete.children().to_vec())
    };
    match shape {
        Shape::Literal(value) => Ok(graph.insert(Box::new(LiteralNode::new(value)))),
        Shape::Call(name) => {
            let mut new_children = Vec::with_capacity(children.len());
            for c in children {
                new_children.push(deep_copy(
                    c,
                    graph,
                    factory,
                    reporter,
                    template_name,
                    arg_names,
                    actual_args,
                )?);
            }
            let new_node = factory.construct(&name, new_children)?;
            Ok(graph.insert(new_node))
        }
    }
}

/// The call node produced at every `(NAME a1…an)` call site for a
/// `(define NAME arg-names… body)` template. Expands itself into a fresh
/// copy of the template body on its first `transform`.
#[derive(Debug, Clone)]
pub struct TemplateCallNode {
    name: String,
    children: Vec<NodeRef>,
}

impl TemplateCallNode {
    /// Builds a call node for the template named `name` over `children`
    /// (the actual arguments at this call site).
    pub fn new(name: String, children: Vec<NodeRef>) -> Self {
        Self { name, children }
    }
}

/// Builds a `Constructor` for the template named `name`, to be registered
/// into a `CallFactory` alongside its `TemplateDef` (see
/// `CallFactory::register_template`).
pub fn make_template_call(
    name: impl Into<String>,
) -> impl Fn(Vec<NodeRef>) -> Result<Box<dyn Node>> + Send + Sync {
    let name = name.into();
    move |children| Ok(Box::new(TemplateCallNode::new(name.clone(), children)) as Box<dyn Node>)
}

impl Node for TemplateCallNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: &self.name,
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("({} {})", self.name, child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        factory: &CallFactory,
        reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let Some(def) = factory.lookup_template(&self.name).cloned() else {
            reporter.error(
                Some(self_ref),
                format!("`{}` has no registered template definition", self.name),
            );
            return Ok(TransformOutcome::Unchanged);
        };
        let TemplateDef { arg_names, body } = def;
        if self.children.len() != arg_names.len() {
            reporter.error(
                Some(self_ref),
                format!(
                    "`{}` expects {} arguments, got {}",
                    self.name,
                    arg_names.len(),
                    self.children.len()
                ),
            );
            return Ok(TransformOutcome::Unchanged);
        }
        let expanded = deep_copy(
            body,
            graph,
            factory,
            reporter,
            &self.name,
            &arg_names,
            &self.children,
        )?;
        graph.replace(self_ref, expanded)?;
        Ok(TransformOutcome::Changed)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        _ctx: &dyn TxnContext,
    ) -> Result<()> {
        // Unreachable in a validated graph: every template call expands
        // during transform. Absent is the defensive fallback.
        state.finish(self_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::Phase;
    use std::sync::Arc;

    struct Ctx;
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            Phase::Request
        }
    }

    /// A trivial unary pass-through call used as a stand-in for a
    /// host-integration call inside a template body.
    #[derive(Debug, Clone)]
    struct WrapNode {
        children: Vec<NodeRef>,
    }
    impl Node for WrapNode {
        fn children(&self) -> &[NodeRef] {
            &self.children
        }
        fn kind(&self) -> NodeKind<'_> {
            NodeKind::Call {
                name: "wrap",
                ordered: true,
            }
        }
        fn render(&self, child_strs: &[String]) -> String {
            format!("(wrap {})", child_strs.join(" "))
        }
        fn replace_children(&mut self, children: Vec<NodeRef>) {
            self.children = children;
        }
        fn eval_calculate(
            &self,
            self_ref: NodeRef,
            state: &mut dyn EvalContext,
            ctx: &dyn TxnContext,
        ) -> Result<()> {
            let Some(&x) = self.children.first() else {
                state.finish(self_ref);
                return Ok(());
            };
            state.forward(self_ref, x)?;
            let _ = state.eval(x, ctx)?;
            Ok(())
        }
    }

    fn factory_with_wrap_and_ref() -> CallFactory {
        let mut factory = CallFactory::new();
        factory.register(
            "wrap",
            Box::new(|children| Ok(Box::new(WrapNode { children }) as Box<dyn Node>)),
        );
        factory.register(
            "ref",
            Box::new(|children| Ok(Box::new(RefNode::new(children)) as Box<dyn Node>)),
        );
        factory
    }

    #[test]
    fn template_call_expands_to_a_copy_of_its_body_with_ref_substituted() {
        let mut g = MergeGraph::new();
        // Template body: (wrap (ref 'name'))
        let arg_name_lit = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"name")))));
        let ref_node = g.insert(Box::new(RefNode::new(vec![arg_name_lit])));
        let body = g.insert(Box::new(WrapNode {
            children: vec![ref_node],
        }));

        let mut factory = factory_with_wrap_and_ref();
        factory.register(
            "foo",
            Box::new(make_template_call("foo")),
        );
        factory.register_template(
            "foo",
            TemplateDef {
                arg_names: vec![b"name".to_vec()],
                body,
            },
        );

        let actual = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"REQUEST_URI",
        )))));
        let call_ref = g.add_root(Box::new(TemplateCallNode::new("foo".to_string(), vec![actual])));

        let mut reporter = Reporter::new();
        g.transform_pass(&factory, &mut reporter).unwrap();
        assert!(!reporter.has_errors());

        let root = g.roots()[0];
        assert_eq!(g.node_to_s(root).unwrap(), "(wrap 'REQUEST_URI')");
        let _ = call_ref;

        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(root, &Ctx).unwrap().unwrap();
        assert_eq!(v.as_string(), Some(&b"REQUEST_URI"[..]));
    }

    #[test]
    fn unknown_ref_argument_is_reported_and_folds_to_absent() {
        let mut g = MergeGraph::new();
        let bad_name = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"nope")))));
        let ref_node = g.insert(Box::new(RefNode::new(vec![bad_name])));
        let body = g.insert(Box::new(WrapNode {
            children: vec![ref_node],
        }));

        let mut factory = factory_with_wrap_and_ref();
        factory.register("bar", Box::new(make_template_call("bar")));
        factory.register_template(
            "bar",
            TemplateDef {
                arg_names: vec![b"name".to_vec()],
                body,
            },
        );

        let actual = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"x")))));
        g.add_root(Box::new(TemplateCallNode::new("bar".to_string(), vec![actual])));

        let mut reporter = Reporter::new();
        g.transform_pass(&factory, &mut reporter).unwrap();
        assert!(reporter.has_errors());
    }
}
