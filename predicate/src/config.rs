//! The line-oriented configuration directive language (spec §6):
//! `PredicateDefine NAME ARG… BODY`, `PredicateDebugReport path`,
//! `PredicateAssertValid path`, `PredicateTrace path [id…]`, consumed the
//! way Apache-style host configuration is — one directive per line, `#` for
//! comments. Rule-condition text itself (and the `set_predicate_vars` rule
//! action) is out of scope here: a production host's rule language is a
//! Non-goal, so rules are registered directly through
//! [`crate::EngineConfig::add_rule`] rather than parsed from this grammar.

use crate::error::{Error, Result};
use crate::EngineConfig;
use predicate_ir::TemplateDef;
use predicate_std::template::make_template_call;
use std::path::{Path, PathBuf};

/// An observable effect of processing one directive line, surfaced back to
/// whoever drove [`load_str`]/[`load_file`] so it can act on it (render and
/// write a debug report, enable tracing for specific rule ids, …) — this
/// crate never touches the filesystem on a directive's behalf beyond
/// reading the configuration text itself.
#[derive(Debug, Clone)]
pub enum DirectiveEffect {
    /// `PredicateDefine` registered a template under this name.
    DefinedTemplate(String),
    /// `PredicateDebugReport path` — the path the post-transform DAG
    /// should be rendered to once configuration loading finishes.
    DebugReportRequested(PathBuf),
    /// `PredicateAssertValid path` — the path validation failures should be
    /// reported to. `EngineConfig::finish` is what actually makes
    /// validation errors fatal (via `EngineConfig::set_strict`); this
    /// effect only carries the path a host would write a failure report
    /// to.
    AssertValidRequested(PathBuf),
    /// `PredicateTrace path [id…]` — enable tracing for the named rule ids
    /// (or every rule, if none are named), writing trace output to `path`.
    TraceRequested {
        /// Where trace output should be written.
        path: PathBuf,
        /// Rule ids to trace; empty means "every rule".
        rule_ids: Vec<String>,
    },
}

/// Parses and applies every non-blank, non-comment line of `text` against
/// `config`, returning the effects directives requested, in the order they
/// appeared. `path` is used only to annotate error messages.
pub fn load_str(config: &mut EngineConfig, path: &Path, text: &str) -> Result<Vec<DirectiveEffect>> {
    let mut effects = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(effect) = apply_line(config, path, i + 1, line)? {
            effects.push(effect);
        }
    }
    Ok(effects)
}

/// Reads `path` from disk and applies it via [`load_str`].
pub fn load_file(config: &mut EngineConfig, path: &Path) -> Result<Vec<DirectiveEffect>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    load_str(config, path, &text)
}

fn apply_line(
    config: &mut EngineConfig,
    path: &Path,
    lineno: usize,
    line: &str,
) -> Result<Option<DirectiveEffect>> {
    let (keyword, rest) = split_first_word(line);
    match keyword {
        "PredicateDefine" => {
            let (name, arg_names, body_text) = parse_define(rest).ok_or_else(|| {
                Error::MalformedDirective(format!(
                    "{}:{lineno}: malformed PredicateDefine",
                    path.display()
                ))
            })?;
            let body = config.parse_root(&body_text).map_err(|e| match e {
                Error::Core(inner) => Error::directive(path, line, inner),
                other => other,
            })?;
            config.factory_mut().register_template(
                name.clone(),
                TemplateDef {
                    arg_names: arg_names.iter().map(|n| n.as_bytes().to_vec()).collect(),
                    body,
                },
            );
            config
                .factory_mut()
                .register(name.clone(), Box::new(make_template_call(name.clone())));
            Ok(Some(DirectiveEffect::DefinedTemplate(name)))
        }
        "PredicateDebugReport" => {
            let p = require_path(rest, "PredicateDebugReport", path, lineno)?;
            Ok(Some(DirectiveEffect::DebugReportRequested(p)))
        }
        "PredicateAssertValid" => {
            let p = require_path(rest, "PredicateAssertValid", path, lineno)?;
            config.set_strict(true);
            Ok(Some(DirectiveEffect::AssertValidRequested(p)))
        }
        "PredicateTrace" => {
            let mut tokens = rest.split_whitespace();
            let p = tokens.next().ok_or_else(|| {
                Error::MalformedDirective(format!(
                    "{}:{lineno}: PredicateTrace requires a path",
                    path.display()
                ))
            })?;
            let rule_ids = tokens.map(str::to_string).collect();
            Ok(Some(DirectiveEffect::TraceRequested {
                path: PathBuf::from(p),
                rule_ids,
            }))
        }
        other => Err(Error::MalformedDirective(format!(
            "{}:{lineno}: unknown directive `{other}`",
            path.display()
        ))),
    }
}

fn require_path(rest: &str, directive: &str, path: &Path, lineno: usize) -> Result<PathBuf> {
    let p = rest.trim();
    if p.is_empty() {
        return Err(Error::MalformedDirective(format!(
            "{}:{lineno}: {directive} requires a path",
            path.display()
        )));
    }
    Ok(PathBuf::from(p))
}

/// Splits `line` at its first run of whitespace, returning the leading
/// word and the (untrimmed) remainder.
fn split_first_word(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], &line[i..]),
        None => (line, ""),
    }
}

/// Parses a `PredicateDefine` body: `NAME arg… BODY`. `NAME` and each `arg`
/// are bare identifiers (`[A-Za-z_][A-Za-z0-9_-]*`, the same grammar
/// `predicate_ir::parser` uses for call names); the first token that isn't
/// a bare identifier — the start of a literal or call form — begins `BODY`,
/// which runs verbatim to the end of the line (it may itself contain
/// spaces inside string literals, so it is *not* re-tokenized here).
fn parse_define(rest: &str) -> Option<(String, Vec<String>, String)> {
    let mut cursor = rest;
    let name = take_bare_ident(&mut cursor)?;
    let mut args = Vec::new();
    loop {
        let trimmed = cursor.trim_start();
        match trimmed.chars().next() {
            None => return None, // a define with no body is malformed
            Some(c) if is_ident_start(c) => {
                cursor = trimmed;
                args.push(take_bare_ident(&mut cursor)?);
            }
            Some(_) => {
                return Some((name, args, trimmed.to_string()));
            }
        }
    }
}

fn take_bare_ident(cursor: &mut &str) -> Option<String> {
    let s = cursor.trim_start();
    let end = s
        .char_indices()
        .find(|(_, c)| !is_ident_continue(*c))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    *cursor = &s[end..];
    Some(s[..end].to_string())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_ir::Phase;

    #[test]
    fn define_then_call_expands_through_finish() {
        let mut cfg = EngineConfig::new();
        let path = Path::new("inline");
        let effects = load_str(
            &mut cfg,
            path,
            "# a comment\nPredicateDefine firstOf a b (if (ref 'a') (ref 'a') (ref 'b'))\n",
        )
        .unwrap();
        assert!(matches!(effects[0], DirectiveEffect::DefinedTemplate(ref n) if n == "firstOf"));
        cfg.add_rule("r", "(firstOf : 'fallback')", Phase::None, false)
            .unwrap();
        let engine = cfg.finish().unwrap();
        assert_eq!(engine.rules().len(), 1);
    }

    #[test]
    fn debug_report_and_assert_valid_directives_are_recognised() {
        let mut cfg = EngineConfig::new();
        let path = Path::new("inline");
        let effects = load_str(
            &mut cfg,
            path,
            "PredicateDebugReport /tmp/report.txt\nPredicateAssertValid /tmp/assert.txt\nPredicateTrace /tmp/trace.txt ruleA ruleB\n",
        )
        .unwrap();
        assert!(matches!(effects[0], DirectiveEffect::DebugReportRequested(_)));
        assert!(matches!(effects[1], DirectiveEffect::AssertValidRequested(_)));
        match &effects[2] {
            DirectiveEffect::TraceRequested { rule_ids, .. } => {
                assert_eq!(rule_ids, &["ruleA".to_string(), "ruleB".to_string()]);
            }
            _ => panic!("expected TraceRequested"),
        }
    }

    #[test]
    fn unknown_directive_is_malformed() {
        let mut cfg = EngineConfig::new();
        let err = load_str(&mut cfg, Path::new("inline"), "NotADirective foo\n").unwrap_err();
        assert!(matches!(err, Error::MalformedDirective(_)));
    }
}
