//! The call registry (spec §4.2 "Call factory", §9 "Polymorphism across
//! call nodes"). Maps a call name to a constructor that builds the concrete
//! [`Node`] implementation for that name; `predicate-std::registry` is the
//! only place that populates one of these for the standard call library.

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, NodeRef};
use std::collections::HashMap;

/// Builds a concrete [`Node`] for one call name from its already-resolved
/// children. Returns a boxed trait object so the factory can hold a
/// heterogeneous table of constructors.
pub type Constructor = Box<dyn Fn(Vec<NodeRef>) -> Result<Box<dyn Node>> + Send + Sync>;

/// A registered `(define NAME arg-names… body)` template: the argument
/// names in declaration order and the (already-parsed, already-inserted)
/// body subtree they parameterise.
#[derive(Clone, Debug)]
pub struct TemplateDef {
    /// Argument names, in declaration order; `arg_names.len()` is the
    /// template's arity.
    pub arg_names: Vec<Vec<u8>>,
    /// The template body, as inserted into the same `MergeGraph` its call
    /// sites live in.
    pub body: NodeRef,
}

/// The name-to-constructor table consulted by the parser and by
/// `transform` implementations that synthesize new call nodes (e.g.
/// template expansion). Also holds the `(define …)` template definitions
/// registered alongside the call names that invoke them, since both are
/// populated at configuration-load time and both are read from inside
/// `transform` (which only ever sees a shared `&CallFactory`).
#[derive(Default)]
pub struct CallFactory {
    constructors: HashMap<String, Constructor>,
    templates: HashMap<String, TemplateDef>,
}

impl CallFactory {
    /// An empty factory with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`'s constructor. A later registration for the same
    /// name replaces the earlier one, matching how the standard library's
    /// own registration pass is free to shadow host-supplied calls.
    pub fn register(&mut self, name: impl Into<String>, ctor: Constructor) {
        self.constructors.insert(name.into(), ctor);
    }

    /// Whether `name` has a registered constructor.
    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Register a `(define NAME arg-names… body)` template definition
    /// alongside `name`'s constructor. A later registration for the same
    /// name replaces the earlier one.
    pub fn register_template(&mut self, name: impl Into<String>, def: TemplateDef) {
        self.templates.insert(name.into(), def);
    }

    /// Look up `name`'s template definition, if one was registered.
    pub fn lookup_template(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.get(name)
    }

    /// Construct a call node named `name` with the given already-resolved
    /// `children`. Fails with [`Error::UnknownCall`] if nothing is
    /// registered for `name`, or [`Error::InvalidRegistration`] if the
    /// constructed node reports a different name than it was asked for
    /// (a bug in the registered constructor, not in caller input).
    pub fn construct(&self, name: &str, children: Vec<NodeRef>) -> Result<Box<dyn Node>> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::UnknownCall(name.to_string()))?;
        let node = ctor(children)?;
        if let NodeKind::Call { name: produced, .. } = node.kind() {
            if produced != name {
                return Err(Error::InvalidRegistration {
                    requested: name.to_string(),
                    produced: produced.to_string(),
                });
            }
        }
        Ok(node)
    }
}

impl std::fmt::Debug for CallFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFactory")
            .field("registered", &self.constructors.len())
            .field("templates", &self.templates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval_context::{EvalContext, EvalEnvironment, Reporter, TxnContext};
    use crate::value::Value;

    #[derive(Debug)]
    struct Stub {
        children: Vec<NodeRef>,
    }

    impl Node for Stub {
        fn children(&self) -> &[NodeRef] {
            &self.children
        }
        fn kind(&self) -> NodeKind<'_> {
            NodeKind::Call {
                name: "stub",
                ordered: true,
            }
        }
        fn render(&self, _child_strs: &[String]) -> String {
            "(stub)".to_string()
        }
        fn replace_children(&mut self, children: Vec<NodeRef>) {
            self.children = children;
        }
        fn eval_calculate(
            &self,
            self_ref: NodeRef,
            state: &mut dyn EvalContext,
            _ctx: &dyn TxnContext,
        ) -> Result<()> {
            state.alias(self_ref, Value::truthy_literal())?;
            state.finish(self_ref);
            Ok(())
        }
    }

    #[allow(dead_code)]
    fn silence_unused(_: &dyn EvalEnvironment, _: &mut Reporter) {}

    #[test]
    fn unknown_call_errors() {
        let factory = CallFactory::new();
        let err = factory.construct("nope", Vec::new()).unwrap_err();
        assert_eq!(err, Error::UnknownCall("nope".to_string()));
    }

    #[test]
    fn mismatched_name_errors() {
        let mut factory = CallFactory::new();
        factory.register(
            "requested",
            Box::new(|children| Ok(Box::new(Stub { children }) as Box<dyn Node>)),
        );
        let err = factory.construct("requested", Vec::new()).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidRegistration {
                requested: "requested".to_string(),
                produced: "stub".to_string(),
            }
        );
    }

    #[test]
    fn registered_constructor_runs() {
        let mut factory = CallFactory::new();
        factory.register(
            "stub",
            Box::new(|children| Ok(Box::new(Stub { children }) as Box<dyn Node>)),
        );
        let node = factory.construct("stub", vec![NodeRef(0)]).unwrap();
        assert_eq!(node.children(), &[NodeRef(0)]);
    }
}
