//! A small operator binary for exercising `PredicateDefine`,
//! `PredicateDebugReport`, and `PredicateAssertValid` outside of a host
//! (spec §1 "Host collaborators... no concrete host integration is in
//! scope"; this binary is the in-workspace stand-in for exactly that kind
//! of tooling).
//!
//! There is no production rule-definition language in this workspace (a
//! Non-goal), so a one-off predicate is supplied directly on the command
//! line; a `--config` file may additionally define templates it calls via
//! `PredicateDefine` lines.

use clap::{Parser, Subcommand};
use predicate::config::{self, DirectiveEffect};
use predicate::{Engine, EngineConfig, Error};
use predicate_ir::Phase;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "predicate", about = "Load, validate, and inspect Predicate configurations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a configuration and report whether it's valid.
    Validate(RuleArgs),
    /// Load a configuration and print the transformed rule's canonical
    /// textual form (`PredicateDebugReport`, directed to stdout instead of
    /// a file).
    Report(RuleArgs),
}

#[derive(clap::Args)]
struct RuleArgs {
    /// An optional config file of `PredicateDefine`/`PredicateDebugReport`/
    /// `PredicateAssertValid`/`PredicateTrace` directives, applied before
    /// `--rule` is parsed.
    #[arg(long)]
    config: Option<PathBuf>,

    /// The rule-condition s-expression to load (there being no production
    /// rule language in scope, this stands in for one rule's `@predicate`
    /// body).
    #[arg(long)]
    rule: String,

    /// Abort on any validation error instead of disabling the offending
    /// rule (equivalent to a `PredicateAssertValid` directive).
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Report(args) => run_report(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Builds an `Engine` from `args`, applying `--config`'s directives first
/// and reporting each `DirectiveEffect` a plain CLI run can actually honor
/// (a debug report gets printed; a trace request is just echoed, since
/// there's no live transaction to trace outside a host).
fn load(args: &RuleArgs) -> Result<Engine, Error> {
    let mut cfg = EngineConfig::new();
    if args.strict {
        cfg.set_strict(true);
    }
    if let Some(path) = &args.config {
        for effect in config::load_file(&mut cfg, path)? {
            report_effect(&effect);
        }
    }
    cfg.add_rule("cli", &args.rule, Phase::None, false)?;
    cfg.finish()
}

fn report_effect(effect: &DirectiveEffect) {
    match effect {
        DirectiveEffect::DefinedTemplate(name) => eprintln!("defined template `{name}`"),
        DirectiveEffect::DebugReportRequested(path) => {
            eprintln!("note: PredicateDebugReport {} requested; use `report` to print it", path.display())
        }
        DirectiveEffect::AssertValidRequested(path) => {
            eprintln!("note: PredicateAssertValid {} requested; validation is now strict", path.display())
        }
        DirectiveEffect::TraceRequested { path, rule_ids } => {
            if rule_ids.is_empty() {
                eprintln!("note: PredicateTrace {} requested for every rule", path.display());
            } else {
                eprintln!("note: PredicateTrace {} requested for {}", path.display(), rule_ids.join(", "));
            }
        }
    }
}

fn run_validate(args: RuleArgs) -> Result<(), Error> {
    let engine = load(&args)?;
    if engine.rules().is_empty() {
        eprintln!("rule `cli` was disabled during validation");
        return Err(Error::Invalid {
            error_count: 1,
            first: "rule predicate failed validation".to_string(),
        });
    }
    println!("valid");
    Ok(())
}

fn run_report(args: RuleArgs) -> Result<(), Error> {
    let engine = load(&args)?;
    let rule = engine
        .rules()
        .iter()
        .find(|r| r.id == "cli")
        .expect("the `cli` rule is always registered by `load`");
    println!("{}", engine.debug_report(rule.root)?);
    Ok(())
}
