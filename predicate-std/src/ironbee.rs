//! `var`, `operator`, `foperator`, `transformation`, `waitPhase`,
//! `finishPhase`, `ask` (spec §4.7 "IronBee integration"): the only call
//! family that reaches outside the graph, through the host surfaces
//! `predicate_ir::host` declares (`VariableStore`, `Operator`,
//! `Transformation`) and `TxnContext` exposes per transaction.

use predicate_ir::{
    CallFactory, EvalContext, MergeGraph, Node, NodeKind, NodeRef, OperatorInstance, Phase,
    Reporter, Result, TransformOutcome, TxnContext, Value,
};
use std::any::Any;

fn to_elements(v: &Value) -> Vec<Value> {
    match v.as_list() {
        Some(items) => items.to_vec(),
        None => vec![v.clone()],
    }
}

fn parse_phase_name(name: &[u8]) -> Option<Phase> {
    match name {
        b"NONE" => Some(Phase::None),
        b"REQUEST_HEADER" => Some(Phase::RequestHeader),
        b"REQUEST" => Some(Phase::Request),
        b"RESPONSE_HEADER" => Some(Phase::ResponseHeader),
        b"RESPONSE" => Some(Phase::Response),
        _ => None,
    }
}

/// `var key [phase-start [phase-end]]`: looks up `key` in the host's
/// variable store. Suspends (stays unset) until `phase-start`, if given,
/// is reached; re-queries on each phase until a value is found or
/// `phase-end` (if given) has passed, at which point it finishes
/// (possibly absent).
#[derive(Debug, Clone)]
pub struct VarNode {
    children: Vec<NodeRef>,
}

impl VarNode {
    /// Builds a `var key [phase-start [phase-end]]` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for VarNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "var",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(var {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.is_empty() || self.children.len() > 3 {
            reporter.error(
                None,
                format!("`var` expects 1-3 arguments, got {}", self.children.len()),
            );
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let Some(&key_arg) = self.children.first() else {
            state.finish(self_ref);
            return Ok(());
        };
        let key = state.eval(key_arg, ctx)?;
        if !state.is_finished(key_arg) {
            return Ok(());
        }

        let mut bound_phases = Vec::with_capacity(self.children.len().saturating_sub(1));
        for &c in &self.children[1..] {
            let v = state.eval(c, ctx)?;
            if !state.is_finished(c) {
                return Ok(());
            }
            bound_phases.push(v);
        }
        let phase_start = bound_phases
            .first()
            .and_then(|v| v.as_ref())
            .and_then(Value::as_string)
            .and_then(parse_phase_name);
        let phase_end = bound_phases
            .get(1)
            .and_then(|v| v.as_ref())
            .and_then(Value::as_string)
            .and_then(parse_phase_name);

        if let Some(start) = phase_start {
            if !start.at_or_before(ctx.phase()) {
                return Ok(());
            }
        }

        if state.value(self_ref).is_none() {
            if let Some(key_bytes) = key.as_ref().and_then(Value::as_string) {
                if let Some(store) = ctx.variables() {
                    if let Some(v) = store.lookup(key_bytes) {
                        state.alias(self_ref, v)?;
                    }
                }
            }
        }

        let window_closed = match phase_end {
            Some(end) => end.at_or_before(ctx.phase()),
            None => true,
        };
        if window_closed || state.value(self_ref).is_some() {
            state.finish(self_ref);
        }
        Ok(())
    }
}

/// Cached, per-slot, constructed-once host operator instance, shared by
/// `OperatorNode` and `FOperatorNode`.
struct CachedOperator(Box<dyn OperatorInstance>);

fn ensure_operator(
    self_ref: NodeRef,
    state: &mut dyn EvalContext,
    ctx: &dyn TxnContext,
    name: &str,
    params: &Value,
) -> Result<bool> {
    if state.scratch(self_ref).is_none() {
        let Some(operator) = ctx.operator(name) else {
            tracing::warn!(name, "no host operator registered");
            return Ok(false);
        };
        match operator.create(name, params) {
            Ok(instance) => {
                *state.scratch(self_ref) = Some(Box::new(CachedOperator(instance)) as Box<dyn Any>);
            }
            Err(e) => {
                tracing::warn!(name, error = ?e, "operator creation failed");
                return Ok(false);
            }
        }
    }
    Ok(state.scratch(self_ref).is_some())
}

/// `operator name params subject`: the capture list (truthy, possibly the
/// canonical truthy literal if there were no captures) if `subject`
/// matched, else absent.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    children: Vec<NodeRef>,
}

impl OperatorNode {
    /// Builds an `operator name params subject` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for OperatorNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "operator",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(operator {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 3 {
            reporter.error(None, "`operator` expects 3 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [name_arg, params_arg, subject_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let name = state.eval(name_arg, ctx)?;
        if !state.is_finished(name_arg) {
            return Ok(());
        }
        let params = state.eval(params_arg, ctx)?;
        if !state.is_finished(params_arg) {
            return Ok(());
        }
        let subject = state.eval(subject_arg, ctx)?;
        if !state.is_finished(subject_arg) {
            return Ok(());
        }
        let Some(name_bytes) = name.as_ref().and_then(Value::as_string) else {
            state.finish(self_ref);
            return Ok(());
        };
        let name_str = String::from_utf8_lossy(name_bytes).into_owned();
        let params = params.unwrap_or_else(Value::truthy_literal);

        if !ensure_operator(self_ref, state, ctx, &name_str, &params)? {
            state.finish(self_ref);
            return Ok(());
        }

        let mut captures = Vec::new();
        let matched = {
            let scratch = state.scratch(self_ref);
            let cached = scratch
                .as_ref()
                .and_then(|b| b.downcast_ref::<CachedOperator>())
                .expect("scratch holds CachedOperator");
            match cached
                .0
                .execute(ctx.phase(), &subject.unwrap_or_else(Value::truthy_literal), &mut captures)
            {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(name = name_str.as_str(), error = ?e, "operator execution failed");
                    false
                }
            }
        };

        if matched {
            let result = if captures.is_empty() {
                Value::truthy_literal()
            } else {
                Value::list(captures)
            };
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `foperator name params subject`: filter-style sibling of `operator`:
/// keeps the elements of `subject`'s stream the operator matches, rather
/// than reporting captures.
#[derive(Debug, Clone)]
pub struct FOperatorNode {
    children: Vec<NodeRef>,
}

impl FOperatorNode {
    /// Builds an `foperator name params subject` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for FOperatorNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "foperator",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(foperator {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 3 {
            reporter.error(None, "`foperator` expects 3 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [name_arg, params_arg, subject_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let name = state.eval(name_arg, ctx)?;
        if !state.is_finished(name_arg) {
            return Ok(());
        }
        let params = state.eval(params_arg, ctx)?;
        if !state.is_finished(params_arg) {
            return Ok(());
        }
        let subject = state.eval(subject_arg, ctx)?;
        if !state.is_finished(subject_arg) {
            return Ok(());
        }
        let Some(name_bytes) = name.as_ref().and_then(Value::as_string) else {
            state.setup_local_list(self_ref)?;
            state.finish(self_ref);
            return Ok(());
        };
        let name_str = String::from_utf8_lossy(name_bytes).into_owned();
        let params = params.unwrap_or_else(Value::truthy_literal);

        if !ensure_operator(self_ref, state, ctx, &name_str, &params)? {
            state.setup_local_list(self_ref)?;
            state.finish(self_ref);
            return Ok(());
        }

        let mut kept = Vec::new();
        for elem in subject.as_ref().map(to_elements).unwrap_or_default() {
            let mut ignored = Vec::new();
            let matched = {
                let scratch = state.scratch(self_ref);
                let cached = scratch
                    .as_ref()
                    .and_then(|b| b.downcast_ref::<CachedOperator>())
                    .expect("scratch holds CachedOperator");
                cached.0.execute(ctx.phase(), &elem, &mut ignored).unwrap_or(false)
            };
            if matched {
                kept.push(elem);
            }
        }
        state.setup_local_list(self_ref)?;
        for elem in kept {
            state.append_to_list(self_ref, elem)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `transformation name params subject`: applies a host transformation
/// element-wise; an element a failing transformation is left unchanged.
#[derive(Debug, Clone)]
pub struct TransformationNode {
    children: Vec<NodeRef>,
}

impl TransformationNode {
    /// Builds a `transformation name params subject` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for TransformationNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "transformation",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(transformation {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 3 {
            reporter.error(None, "`transformation` expects 3 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [name_arg, _params_arg, subject_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let name = state.eval(name_arg, ctx)?;
        if !state.is_finished(name_arg) {
            return Ok(());
        }
        let subject = state.eval(subject_arg, ctx)?;
        if !state.is_finished(subject_arg) {
            return Ok(());
        }
        let Some(name_bytes) = name.as_ref().and_then(Value::as_string) else {
            state.finish(self_ref);
            return Ok(());
        };
        let name_str = String::from_utf8_lossy(name_bytes).into_owned();

        if let Some(subject) = subject {
            let transform_one = |v: &Value, memory: &bumpalo::Bump| -> Value {
                match ctx.transformation(&name_str) {
                    Some(t) => match t.execute(&name_str, memory, v) {
                        Ok(out) => out,
                        Err(e) => {
                            tracing::warn!(name = name_str.as_str(), error = ?e, "transformation failed");
                            v.clone()
                        }
                    },
                    None => v.clone(),
                }
            };
            let memory = bumpalo::Bump::new();
            let result = match subject.as_list() {
                Some(items) => Value::list(items.iter().map(|v| transform_one(v, &memory)).collect::<Vec<_>>()),
                None => transform_one(&subject, &memory),
            };
            state.alias(self_ref, result)?;
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// `waitPhase phase x`: keeps `x` absent until `phase` is reached, then
/// forwards to it.
#[derive(Debug, Clone)]
pub struct WaitPhaseNode {
    children: Vec<NodeRef>,
}

impl WaitPhaseNode {
    /// Builds a `waitPhase phase x` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for WaitPhaseNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "waitPhase",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(waitPhase {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`waitPhase` expects 2 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [phase_arg, x_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let phase = state.eval(phase_arg, ctx)?;
        if !state.is_finished(phase_arg) {
            return Ok(());
        }
        let target = phase.as_ref().and_then(Value::as_string).and_then(parse_phase_name);
        let ready = match target {
            Some(target) => target.at_or_before(ctx.phase()),
            None => true,
        };
        if !ready {
            return Ok(());
        }
        state.forward(self_ref, x_arg)?;
        let _ = state.eval(x_arg, ctx)?;
        Ok(())
    }
}

/// `finishPhase phase x`: forwards to `x` immediately, but force-finishes
/// once `phase` has passed even if `x` hasn't naturally finished yet.
#[derive(Debug, Clone)]
pub struct FinishPhaseNode {
    children: Vec<NodeRef>,
}

impl FinishPhaseNode {
    /// Builds a `finishPhase phase x` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for FinishPhaseNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "finishPhase",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(finishPhase {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`finishPhase` expects 2 arguments".to_string());
        }
        Ok(())
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        let [phase_arg, x_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let phase = state.eval(phase_arg, ctx)?;
        if !state.is_finished(phase_arg) {
            return Ok(());
        }
        if state.scratch(self_ref).is_none() {
            state.forward(self_ref, x_arg)?;
            *state.scratch(self_ref) = Some(Box::new(()) as Box<dyn Any>);
        }
        let _ = state.eval(x_arg, ctx)?;
        let target = phase.as_ref().and_then(Value::as_string).and_then(parse_phase_name);
        let past_due = match target {
            Some(target) => target.at_or_before(ctx.phase()),
            None => true,
        };
        if past_due && !state.is_finished(self_ref) {
            state.finish(self_ref);
        }
        Ok(())
    }
}

/// `ask key v`: if `v` is itself a `var` call (a host-dynamic field), the
/// `key` is used as a sub-key against the same host variable store using a
/// compound `hostKey:key` lookup; otherwise behaves exactly like
/// `named key v`.
#[derive(Debug, Clone)]
pub struct AskNode {
    children: Vec<NodeRef>,
}

impl AskNode {
    /// Builds an `ask key v` node.
    pub fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for AskNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "ask",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(ask {})", child_strs.join(" "))
    }
    fn replace_children(&mut self, children: Vec<NodeRef>) {
        self.children = children;
    }
    fn pre_transform(&self, reporter: &mut Reporter) -> Result<()> {
        if self.children.len() != 2 {
            reporter.error(None, "`ask` expects 2 arguments".to_string());
        }
        Ok(())
    }
    fn transform(
        &self,
        self_ref: NodeRef,
        graph: &mut MergeGraph,
        _factory: &CallFactory,
        _reporter: &mut Reporter,
    ) -> Result<TransformOutcome> {
        let [key_arg, v_arg] = self.children[..] else {
            return Ok(TransformOutcome::Unchanged);
        };
        let is_dynamic_var = matches!(
            graph.get(v_arg)?.kind(),
            NodeKind::Call { name: "var", .. }
        );
        if !is_dynamic_var {
            return Ok(TransformOutcome::Unchanged);
        }
        let Some(&host_key_arg) = graph.children_of(v_arg).first() else {
            return Ok(TransformOutcome::Unchanged);
        };
        let dynamic = graph.insert(Box::new(AskDynamicNode::new(vec![host_key_arg, key_arg])));
        graph.replace(self_ref, dynamic)?;
        Ok(TransformOutcome::Changed)
    }
    fn eval_calculate(
        &self,
        self_ref: NodeRef,
        state: &mut dyn EvalContext,
        ctx: &dyn TxnContext,
    ) -> Result<()> {
        // `v` wasn't a dynamic `var`: behave like `named key v`.
        let [key_arg, v_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let key = state.eval(key_arg, ctx)?;
        if !state.is_finished(key_arg) {
            return Ok(());
        }
        let v = state.eval(v_arg, ctx)?;
        if !state.is_finished(v_arg) {
            return Ok(());
        }
        state.setup_local_list(self_ref)?;
        if let Some(key) = key.as_ref().and_then(Value::as_string) {
            for elem in v.as_ref().map(to_elements).unwrap_or_default() {
                if elem.name().unwrap_or(&[]) == key {
                    state.append_to_list(self_ref, elem)?;
                }
            }
        }
        state.finish(self_ref);
        Ok(())
    }
}

/// Synthesized by `AskNode::transform` when `v` is a dynamic `var`: looks
/// up `hostKey:key` directly in the host's variable store.
#[derive(Debug, Clone)]
struct AskDynamicNode {
    children: Vec<NodeRef>,
}

impl AskDynamicNode {
    fn new(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl Node for AskDynamicNode {
    fn children(&self) -> &[NodeRef] {
        &self.children
    }
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Call {
            name: "ask",
            ordered: true,
        }
    }
    fn render(&self, child_strs: &[String]) -> String {
        format!("(ask {})", child_strs.join(" "))
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
        let [host_key_arg, key_arg] = self.children[..] else {
            state.finish(self_ref);
            return Ok(());
        };
        let host_key = state.eval(host_key_arg, ctx)?;
        if !state.is_finished(host_key_arg) {
            return Ok(());
        }
        let key = state.eval(key_arg, ctx)?;
        if !state.is_finished(key_arg) {
            return Ok(());
        }
        if let (Some(host_key), Some(key)) = (
            host_key.as_ref().and_then(Value::as_string),
            key.as_ref().and_then(Value::as_string),
        ) {
            let mut compound = Vec::with_capacity(host_key.len() + 1 + key.len());
            compound.extend_from_slice(host_key);
            compound.push(b':');
            compound.extend_from_slice(key);
            if let Some(store) = ctx.variables() {
                if let Some(v) = store.lookup(&compound) {
                    state.alias(self_ref, v)?;
                }
            }
        }
        state.finish(self_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::{LiteralNode, OperatorInstance, VariableStore};
    use std::sync::Arc;

    struct Ctx {
        phase: Phase,
        store: TestStore,
    }
    impl TxnContext for Ctx {
        fn phase(&self) -> Phase {
            self.phase
        }
        fn variables(&self) -> Option<&dyn VariableStore> {
            Some(&self.store)
        }
    }

    struct TestStore;
    impl VariableStore for TestStore {
        fn lookup(&self, key: &[u8]) -> Option<Value> {
            if key == b"REQUEST_URI" {
                Some(Value::string(*b"/index"))
            } else {
                None
            }
        }
    }

    #[test]
    fn var_looks_up_the_host_store() {
        let mut g = MergeGraph::new();
        let key = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"REQUEST_URI",
        )))));
        let var_ref = g.add_root(Box::new(VarNode::new(vec![key])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let ctx = Ctx {
            phase: Phase::Request,
            store: TestStore,
        };
        let v = state.eval(var_ref, &ctx).unwrap().unwrap();
        assert_eq!(v.as_string(), Some(&b"/index"[..]));
        assert!(state.is_finished(var_ref));
    }

    #[test]
    fn var_suspends_until_its_phase_start() {
        let mut g = MergeGraph::new();
        let key = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"REQUEST_URI",
        )))));
        let start = g.insert(Box::new(LiteralNode::new(Some(Value::string(
            *b"RESPONSE",
        )))));
        let var_ref = g.add_root(Box::new(VarNode::new(vec![key, start])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let ctx = Ctx {
            phase: Phase::Request,
            store: TestStore,
        };
        state.eval(var_ref, &ctx).unwrap();
        assert!(!state.is_finished(var_ref));
    }

    #[derive(Debug, Clone, Copy)]
    struct AlwaysMatch;
    impl OperatorInstance for AlwaysMatch {
        fn execute(&self, _phase: Phase, _input: &Value, _captures: &mut Vec<Value>) -> Result<bool> {
            Ok(true)
        }
    }
    struct AlwaysMatchOperator;
    impl predicate_ir::Operator for AlwaysMatchOperator {
        fn create(&self, _name: &str, _params: &Value) -> Result<Box<dyn OperatorInstance>> {
            Ok(Box::new(AlwaysMatch))
        }
    }
    struct OperatorCtx;
    impl TxnContext for OperatorCtx {
        fn phase(&self) -> Phase {
            Phase::Request
        }
        fn operator(&self, _name: &str) -> Option<&dyn predicate_ir::Operator> {
            Some(&AlwaysMatchOperator)
        }
    }

    #[test]
    fn operator_truthy_literal_when_matched_with_no_captures() {
        let mut g = MergeGraph::new();
        let name = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"rx")))));
        let params = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"a")))));
        let subject = g.insert(Box::new(LiteralNode::new(Some(Value::string(*b"x")))));
        let op_ref = g.add_root(Box::new(OperatorNode::new(vec![name, params, subject])));
        let graph = Arc::new(g);
        let mut state = predicate_eval::GraphEvalState::new(graph);
        let v = state.eval(op_ref, &OperatorCtx).unwrap().unwrap();
        assert_eq!(v, Value::truthy_literal());
    }
}
