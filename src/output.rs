//! Rendering of command results.
//!
//! With `--json` every command prints one envelope on stdout:
//! `{schema_version, command, status, data | error, warnings?, next_steps?}`.
//! Otherwise a short text report is printed unless `--quiet` is set.

use serde::Serialize;

use crate::error::{exit_codes, EntityKind, Error, Result};

pub const SCHEMA_VERSION: &str = "agency-store.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Text report for a command: a header line followed by optional sections.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    pub fn push_warning(&mut self, line: impl Into<String>) {
        self.warnings.push(line.into());
    }

    pub fn push_next_step(&mut self, line: impl Into<String>) {
        self.next_steps.push(line.into());
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Success,
    Error,
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: Status,
    #[serde(flatten)]
    body: B,
    #[serde(skip_serializing_if = "is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct Data<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Serialize)]
struct Failure {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn is_empty(items: &&[String]) -> bool {
    items.is_empty()
}

fn print_envelope<B: Serialize>(envelope: &Envelope<'_, B>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = match human {
            Some(h) => (h.warnings.as_slice(), h.next_steps.as_slice()),
            None => (&[][..], &[][..]),
        };
        return print_envelope(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: Status::Success,
            body: Data { data },
            warnings,
            next_steps,
        });
    }

    if let Some(human) = human.filter(|_| !options.quiet) {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);

    if json {
        return print_envelope(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: Status::Error,
            body: Failure {
                error: ErrorBody {
                    message: err.to_string(),
                    code: err.exit_code(),
                    kind: error_kind(err),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut out = output.header.clone();

    let summary: Vec<String> = output
        .summary
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}: {value}")
            }
        })
        .collect();

    for (title, lines) in [
        ("Summary", summary.as_slice()),
        ("Details", output.details.as_slice()),
        ("Warnings", output.warnings.as_slice()),
        ("Next steps", output.next_steps.as_slice()),
    ] {
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("\n\n{title}:"));
        for line in lines {
            out.push_str(&format!("\n- {line}"));
        }
    }
    out
}

pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

/// First positional word, plus the second for commands that take a subcommand.
fn command_name(args: impl Iterator<Item = String>) -> String {
    let mut positional = args.filter(|arg| !arg.starts_with('-'));

    let Some(command) = positional.next() else {
        return "agency-store".to_string();
    };

    let nested = matches!(
        command.as_str(),
        "client" | "project" | "task" | "charge" | "timer" | "equipment"
    );
    match positional.next() {
        Some(sub) if nested => format!("{command} {sub}"),
        _ => command,
    }
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::CONFLICT => "conflict",
        _ => "storage_unavailable",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::SessionConflict { user_id, .. } => vec![
            format!("agency-store timer stop --user {user_id}"),
            format!("agency-store timer cancel --user {user_id}"),
        ],
        Error::NotFound {
            kind: EntityKind::ActiveSession,
            ..
        } => vec!["agency-store timer start --user <id>".to_string()],
        Error::NotFound {
            kind: EntityKind::Client,
            ..
        } => vec!["agency-store client list".to_string()],
        Error::NotFound { .. } => vec!["agency-store client show <client-id>".to_string()],
        Error::InvalidConfig(_) => vec!["fix agency.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["retry once the other writer finishes".to_string()],
        _ => Vec::new(),
    }
}
