//! The S-expression reader (spec §4.1 "Parser").
//!
//! Hand-rolled recursive-descent, no combinator or generated-parser
//! dependency — the grammar is small and entirely described below. `regex`
//! is reserved for `predicate-std`'s own calls (e.g. `stringReplaceRx`);
//! the core reader never uses it.
//!
//! Literal surface syntax: `'text'` strings (`\\` and `\'` the only
//! escapes), signed decimal integers, signed decimal floats (exactly one
//! `.`), `:` for the singular/absent value, `[]`/`[elem elem …]` lists,
//! and `name:value` named literals. Call surface syntax: `(fname arg …)`
//! with `fname` matching `[A-Za-z_][A-Za-z0-9_-]*`.
//!
//! Unlike a literal reading of spec §4.1's `parse_call(text, &cursor,
//! factory)` signature, this reader does not hand back `NodeRef`s directly
//! while parsing: Rust ownership makes a "build a tree of boxed children,
//! then rewrite it into graph indices later" representation awkward, so
//! children are inserted into the [`MergeGraph`] bottom-up as each call
//! form closes, and a call's own [`NodeRef`] is only materialised once its
//! argument list is fully parsed. The hash-consing behaviour — identical
//! subtrees collapse to one node — is unchanged; only the point at which
//! insertion happens moves earlier.

use crate::call_factory::CallFactory;
use crate::error::{Error, Result};
use crate::merge_graph::MergeGraph;
use crate::node::{LiteralNode, NodeRef};
use crate::value::Value;

/// A byte offset into the input being parsed, advanced in place by every
/// `parse_*` function as it consumes text (spec §4.1's `cursor`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor(pub usize);

impl Cursor {
    /// A cursor positioned at the start of `text`.
    pub fn start() -> Self {
        Cursor(0)
    }
}

/// Parses one root form (a literal or a call) starting at `cursor`,
/// inserting every node it creates into `graph`. Leading whitespace is
/// skipped; leading garbage before the literal/call's first character is
/// *not* — spec §4.1 requires a syntax error in that case. An unparsed
/// trailing portion of `text` is left alone; `cursor` indicates exactly
/// how much was consumed.
pub fn parse_root(
    text: &str,
    cursor: &mut Cursor,
    factory: &CallFactory,
    graph: &mut MergeGraph,
) -> Result<NodeRef> {
    skip_whitespace(text, cursor);
    match peek(text, cursor.0) {
        Some(b'(') => parse_call(text, cursor, factory, graph),
        Some(_) => {
            let value = parse_literal(text, cursor)?;
            Ok(graph.insert(Box::new(LiteralNode::new(value))))
        }
        None => Err(Error::Syntax {
            pointer: cursor.0,
            message: "unexpected end of input".to_string(),
        }),
    }
}

/// Consumes one literal starting at `cursor`, advancing it past the last
/// consumed byte. Returns `None` for the singular `:` literal.
pub fn parse_literal(text: &str, cursor: &mut Cursor) -> Result<Option<Value>> {
    skip_whitespace(text, cursor);
    match peek(text, cursor.0) {
        Some(b'\'') => {
            let s = parse_string(text, cursor)?;
            if peek(text, cursor.0) == Some(b':') {
                let name = String::from_utf8_lossy(s.as_string().unwrap_or(&[])).into_owned();
                cursor.0 += 1;
                let value = parse_literal(text, cursor)?.ok_or_else(|| Error::Syntax {
                    pointer: cursor.0,
                    message: "named literal cannot name the singular `:`".to_string(),
                })?;
                Ok(Some(value.with_name(name)))
            } else {
                Ok(Some(s))
            }
        }
        Some(b'[') => Ok(Some(parse_list(text, cursor)?)),
        Some(b':') => {
            cursor.0 += 1;
            Ok(None)
        }
        Some(b) if b == b'-' || b.is_ascii_digit() => Ok(Some(parse_number(text, cursor)?)),
        Some(b) if is_ident_start(b) => Ok(Some(parse_named_literal(text, cursor)?)),
        Some(b) => Err(Error::Syntax {
            pointer: cursor.0,
            message: format!("unexpected character `{}`", b as char),
        }),
        None => Err(Error::Syntax {
            pointer: cursor.0,
            message: "unexpected end of input while reading a literal".to_string(),
        }),
    }
}

/// Consumes one `(fname arg …)` call form, recursively parsing each
/// argument as a literal or a nested call, then asking `factory` to build
/// the concrete node and inserting it (and its already-inserted children)
/// into `graph`.
pub fn parse_call(
    text: &str,
    cursor: &mut Cursor,
    factory: &CallFactory,
    graph: &mut MergeGraph,
) -> Result<NodeRef> {
    skip_whitespace(text, cursor);
    expect_byte(text, cursor, b'(')?;
    skip_whitespace(text, cursor);
    let name_start = cursor.0;
    while matches!(peek(text, cursor.0), Some(b) if is_ident_continue(b)) {
        cursor.0 += 1;
    }
    if cursor.0 == name_start {
        return Err(Error::Syntax {
            pointer: name_start,
            message: "missing function name".to_string(),
        });
    }
    let name = &text[name_start..cursor.0];

    let mut children = Vec::new();
    loop {
        skip_whitespace(text, cursor);
        match peek(text, cursor.0) {
            Some(b')') => {
                cursor.0 += 1;
                break;
            }
            Some(b'(') => children.push(parse_call(text, cursor, factory, graph)?),
            Some(_) => {
                let value = parse_literal(text, cursor)?;
                children.push(graph.insert(Box::new(LiteralNode::new(value))));
            }
            None => {
                return Err(Error::Syntax {
                    pointer: cursor.0,
                    message: "unclosed call form".to_string(),
                })
            }
        }
    }

    let node = factory.construct(name, children)?;
    Ok(graph.insert(node))
}

fn parse_string(text: &str, cursor: &mut Cursor) -> Result<Value> {
    let start = cursor.0;
    expect_byte(text, cursor, b'\'')?;
    let mut bytes = Vec::new();
    loop {
        match peek(text, cursor.0) {
            Some(b'\'') => {
                cursor.0 += 1;
                break;
            }
            Some(b'\\') => {
                cursor.0 += 1;
                match peek(text, cursor.0) {
                    Some(b'\\') => {
                        bytes.push(b'\\');
                        cursor.0 += 1;
                    }
                    Some(b'\'') => {
                        bytes.push(b'\'');
                        cursor.0 += 1;
                    }
                    _ => {
                        return Err(Error::Syntax {
                            pointer: cursor.0,
                            message: "invalid escape in string literal".to_string(),
                        })
                    }
                }
            }
            Some(b) => {
                bytes.push(b);
                cursor.0 += 1;
            }
            None => {
                return Err(Error::Syntax {
                    pointer: start,
                    message: "unterminated string literal".to_string(),
                })
            }
        }
    }
    Ok(Value::string(bytes))
}

fn parse_number(text: &str, cursor: &mut Cursor) -> Result<Value> {
    let start = cursor.0;
    if peek(text, cursor.0) == Some(b'-') {
        cursor.0 += 1;
    }
    let digits_start = cursor.0;
    while matches!(peek(text, cursor.0), Some(b) if b.is_ascii_digit()) {
        cursor.0 += 1;
    }
    if cursor.0 == digits_start {
        return Err(Error::Syntax {
            pointer: start,
            message: "lone `-` is not a valid number".to_string(),
        });
    }
    if peek(text, cursor.0) == Some(b'.') {
        cursor.0 += 1;
        let frac_start = cursor.0;
        while matches!(peek(text, cursor.0), Some(b) if b.is_ascii_digit()) {
            cursor.0 += 1;
        }
        if cursor.0 == frac_start {
            return Err(Error::Syntax {
                pointer: start,
                message: "float literal must have digits after `.`".to_string(),
            });
        }
        if peek(text, cursor.0) == Some(b'.') {
            return Err(Error::Syntax {
                pointer: cursor.0,
                message: "float literal may have at most one `.`".to_string(),
            });
        }
        let s = &text[start..cursor.0];
        let f: f64 = s.parse().map_err(|_| Error::Syntax {
            pointer: start,
            message: format!("invalid float literal `{s}`"),
        })?;
        Ok(Value::float(f))
    } else {
        let s = &text[start..cursor.0];
        let n: i64 = s.parse().map_err(|_| Error::Syntax {
            pointer: start,
            message: format!("invalid integer literal `{s}`"),
        })?;
        Ok(Value::number(n))
    }
}

fn parse_list(text: &str, cursor: &mut Cursor) -> Result<Value> {
    expect_byte(text, cursor, b'[')?;
    let mut items = Vec::new();
    loop {
        skip_whitespace(text, cursor);
        match peek(text, cursor.0) {
            Some(b']') => {
                cursor.0 += 1;
                break;
            }
            Some(_) => items.push(parse_literal(text, cursor)?.unwrap_or_else(|| {
                // A bare `:` inside a list has no literal representation
                // of its own; the grammar only allows literals as list
                // elements, so this can't currently be produced by
                // `parse_literal`'s dispatch, but guard defensively.
                Value::empty_list()
            })),
            None => {
                return Err(Error::Syntax {
                    pointer: cursor.0,
                    message: "unclosed list literal".to_string(),
                })
            }
        }
    }
    Ok(Value::list(items))
}

fn parse_named_literal(text: &str, cursor: &mut Cursor) -> Result<Value> {
    let start = cursor.0;
    while matches!(peek(text, cursor.0), Some(b) if is_ident_continue(b)) {
        cursor.0 += 1;
    }
    let name = text[start..cursor.0].to_string();
    if peek(text, cursor.0) != Some(b':') {
        return Err(Error::Syntax {
            pointer: start,
            message: format!("malformed named literal near `{name}`"),
        });
    }
    cursor.0 += 1;
    let value = parse_literal(text, cursor)?.ok_or_else(|| Error::Syntax {
        pointer: cursor.0,
        message: "named literal cannot name the singular `:`".to_string(),
    })?;
    Ok(value.with_name(name))
}

fn expect_byte(text: &str, cursor: &mut Cursor, b: u8) -> Result<()> {
    if peek(text, cursor.0) == Some(b) {
        cursor.0 += 1;
        Ok(())
    } else {
        Err(Error::Syntax {
            pointer: cursor.0,
            message: format!("expected `{}`", b as char),
        })
    }
}

fn skip_whitespace(text: &str, cursor: &mut Cursor) {
    while matches!(peek(text, cursor.0), Some(b) if b.is_ascii_whitespace()) {
        cursor.0 += 1;
    }
}

fn peek(text: &str, pos: usize) -> Option<u8> {
    text.as_bytes().get(pos).copied()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_literal() {
        let mut c = Cursor::start();
        let v = parse_literal("'hi\\'there'", &mut c).unwrap().unwrap();
        assert_eq!(v.as_string(), Some(b"hi'there".as_slice()));
    }

    #[test]
    fn parses_integer_and_float() {
        let mut c = Cursor::start();
        assert_eq!(parse_literal("-42", &mut c).unwrap().unwrap().as_number(), Some(-42));
        let mut c = Cursor::start();
        assert_eq!(
            parse_literal("3.5", &mut c).unwrap().unwrap().as_float(),
            Some(3.5)
        );
    }

    #[test]
    fn rejects_multi_dot_float() {
        let mut c = Cursor::start();
        assert!(parse_literal("1.2.3", &mut c).is_err());
    }

    #[test]
    fn parses_singular() {
        let mut c = Cursor::start();
        assert_eq!(parse_literal(":", &mut c).unwrap(), None);
    }

    #[test]
    fn parses_named_literal() {
        let mut c = Cursor::start();
        let v = parse_literal("foo:42", &mut c).unwrap().unwrap();
        assert_eq!(v.name(), Some(b"foo".as_slice()));
        assert_eq!(v.as_number(), Some(42));
    }

    #[test]
    fn parses_empty_and_nonempty_list() {
        let mut c = Cursor::start();
        let v = parse_literal("[]", &mut c).unwrap().unwrap();
        assert!(v.is_empty_list());

        let mut c = Cursor::start();
        let v = parse_literal("[1 2 3]", &mut c).unwrap().unwrap();
        assert_eq!(v.as_list().unwrap().len(), 3);
    }

    #[derive(Debug)]
    struct StubCall {
        name: &'static str,
        children: Vec<NodeRef>,
    }

    impl crate::node::Node for StubCall {
        fn children(&self) -> &[NodeRef] {
            &self.children
        }
        fn kind(&self) -> crate::node::NodeKind<'_> {
            crate::node::NodeKind::Call {
                name: self.name,
                ordered: true,
            }
        }
        fn render(&self, child_strs: &[String]) -> String {
            format!("({} {})", self.name, child_strs.join(" "))
        }
        fn replace_children(&mut self, children: Vec<NodeRef>) {
            self.children = children;
        }
        fn eval_calculate(
            &self,
            self_ref: NodeRef,
            state: &mut dyn crate::eval_context::EvalContext,
            _ctx: &dyn crate::eval_context::TxnContext,
        ) -> Result<()> {
            state.finish(self_ref);
            Ok(())
        }
    }

    #[test]
    fn call_form_shares_identical_literal_children() {
        let mut graph = MergeGraph::new();
        let mut factory = CallFactory::new();
        factory.register(
            "and",
            Box::new(|children| {
                Ok(Box::new(StubCall {
                    name: "and",
                    children,
                }) as Box<dyn crate::node::Node>)
            }),
        );
        let mut cursor = Cursor::start();
        let result = parse_call("(and 1 1)", &mut cursor, &factory, &mut graph);
        assert!(result.is_ok());
        assert_eq!(graph.len(), 2); // one literal `1`, one call node
    }

    #[test]
    fn unclosed_call_is_syntax_error() {
        let mut graph = MergeGraph::new();
        let factory = CallFactory::new();
        let mut cursor = Cursor::start();
        let err = parse_call("(foo 1", &mut cursor, &factory, &mut graph).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn unknown_call_name_errors() {
        let mut graph = MergeGraph::new();
        let factory = CallFactory::new();
        let mut cursor = Cursor::start();
        let err = parse_call("(nope 1)", &mut cursor, &factory, &mut graph).unwrap_err();
        assert!(matches!(err, Error::UnknownCall(_)));
    }
}
