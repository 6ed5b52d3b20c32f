//! Hierarchical number allocation
//!
//! Numbers are never stored as counters. Each allocation scans the siblings in
//! scope (live and archived), takes the highest parseable sequence and adds one.
//! A stored value with no successor (the integer maximum) is treated as
//! malformed and skipped.
//!
//! Layout:
//! - client:  integer, max + 1, first is 1
//! - project: 3-digit client code + 4-digit sequence (`0070002`)
//! - task:    project number + 3-digit sequence (`0070002003`)
//! - charge:  3-digit client code + 4-digit sequence, scoped to charges
//!
//! A sequence past its width (project 10000) widens the string; the prefix
//! match below keeps reading it correctly so numbers are still not reused.

use crate::model::{Client, Project};

pub const CLIENT_CODE_WIDTH: usize = 3;
pub const PROJECT_SEQUENCE_WIDTH: usize = 4;
pub const TASK_SEQUENCE_WIDTH: usize = 3;
pub const CHARGE_SEQUENCE_WIDTH: usize = 4;

/// Client number used when a client has none yet.
const FALLBACK_CLIENT_NUMBER: u64 = 1;

/// Why a stored number contributed nothing to the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MalformedNumber {
    TooShort,
    NonDigit,
    OutOfRange,
}

/// Next client number across every client, archived ones included.
pub fn next_client_number(clients: &[Client]) -> u64 {
    clients
        .iter()
        .filter_map(|c| c.client_number?.checked_add(1))
        .max()
        .unwrap_or(1)
}

/// Zero-padded client code used as the prefix of project and charge numbers.
pub fn client_code(client: &Client) -> String {
    format!(
        "{:0width$}",
        client.client_number.unwrap_or(FALLBACK_CLIENT_NUMBER),
        width = CLIENT_CODE_WIDTH
    )
}

pub fn next_project_number(client: &Client) -> String {
    let prefix = client_code(client);
    let next = next_sequence(
        client.all_projects().map(|p| p.project_number.as_deref()),
        &prefix,
        PROJECT_SEQUENCE_WIDTH,
    );
    encode(&prefix, next, PROJECT_SEQUENCE_WIDTH)
}

/// Next task number under `project`. A project without a number contributes
/// the number it would be given now; callers that persist the task should
/// assign that number to the project first so the prefix stays stable.
pub fn next_task_number(client: &Client, project: &Project) -> String {
    let prefix = project
        .project_number
        .clone()
        .unwrap_or_else(|| next_project_number(client));
    let next = next_sequence(
        project.all_tasks().map(|t| t.task_number.as_deref()),
        &prefix,
        TASK_SEQUENCE_WIDTH,
    );
    encode(&prefix, next, TASK_SEQUENCE_WIDTH)
}

pub fn next_charge_number(client: &Client) -> String {
    let prefix = client_code(client);
    let next = next_sequence(
        client.all_charges().map(|c| c.charge_number.as_deref()),
        &prefix,
        CHARGE_SEQUENCE_WIDTH,
    );
    encode(&prefix, next, CHARGE_SEQUENCE_WIDTH)
}

fn encode(prefix: &str, sequence: u32, width: usize) -> String {
    format!("{prefix}{sequence:0width$}")
}

fn next_sequence<'a>(
    numbers: impl Iterator<Item = Option<&'a str>>,
    prefix: &str,
    width: usize,
) -> u32 {
    numbers
        .flatten()
        .filter_map(|raw| parse_sequence(raw, prefix, width).ok()?.checked_add(1))
        .max()
        .unwrap_or(1)
}

/// Extract the sequence part of a stored number.
///
/// Numbers carrying the current prefix are read from the end of the prefix,
/// which also covers widened sequences. Anything else (numbers minted under an
/// earlier client code) contributes its last `width` characters.
fn parse_sequence(raw: &str, prefix: &str, width: usize) -> Result<u32, MalformedNumber> {
    let raw = raw.trim();
    if raw.len() < prefix.len() + width {
        return Err(MalformedNumber::TooShort);
    }

    let suffix = match raw.strip_prefix(prefix) {
        Some(rest) => rest,
        None => raw
            .get(raw.len() - width..)
            .ok_or(MalformedNumber::NonDigit)?,
    };

    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedNumber::NonDigit);
    }

    suffix.parse().map_err(|_| MalformedNumber::OutOfRange)
}
