//! Name grammar for task addresses and group queries.
//!
//! Task names (current schema):
//!
//! ```text
//! <endpoint>.task-<slot>-<task_id>.<service>.<node>.<network>.<base_domain>.
//! ```
//!
//! The legacy schema drops the `<network>` label. Every label is drawn from
//! `[A-Za-z0-9_-]+`; `<slot>` is decimal.
//!
//! Group names are anything under the base domain: `web.kallax.local.` names
//! the group `web`.

use std::fmt;

use crate::config::SchemaVersion;
use crate::error::ResolveError;

const TASK_PREFIX: &str = "task-";

/// Structural components of a task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskName {
    /// Logical endpoint name from the discovery label.
    pub endpoint: String,
    /// Task slot within its service.
    pub slot: u64,
    /// Orchestrator task id.
    pub task_id: String,
    /// Service name.
    pub service: String,
    /// Node display name (hostname, or raw node id).
    pub node: String,
    /// Network id; absent under the legacy schema.
    pub network: Option<String>,
}

/// Renders the name relative to the base domain, without a trailing dot.
impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}-{}.{}.{}",
            self.endpoint, TASK_PREFIX, self.slot, self.task_id, self.service, self.node
        )?;
        if let Some(network) = &self.network {
            write!(f, ".{network}")?;
        }
        Ok(())
    }
}

impl TaskName {
    /// Decode a question name into its components.
    pub fn parse(
        qname: &str,
        base_domain: &str,
        schema: SchemaVersion,
    ) -> Result<Self, ResolveError> {
        let not_matched = || ResolveError::NameNotMatched(qname.to_string());

        let relative = strip_zone(qname, base_domain).ok_or_else(not_matched)?;
        let labels: Vec<&str> = relative.split('.').collect();

        let expected = match schema {
            SchemaVersion::Current => 5,
            SchemaVersion::Legacy => 4,
        };
        if labels.len() != expected || !labels.iter().all(|label| is_token(label)) {
            return Err(not_matched());
        }

        let (slot, task_id) = parse_task_label(labels[1]).ok_or_else(not_matched)?;

        Ok(Self {
            endpoint: labels[0].to_string(),
            slot,
            task_id: task_id.to_string(),
            service: labels[2].to_string(),
            node: labels[3].to_string(),
            network: labels.get(4).map(|network| network.to_string()),
        })
    }
}

/// Extract the group from an SRV question name by stripping the base domain.
pub fn group_name<'a>(qname: &'a str, base_domain: &str) -> Result<&'a str, ResolveError> {
    strip_zone(qname, base_domain)
        .filter(|group| !group.is_empty())
        .ok_or_else(|| ResolveError::NameNotMatched(qname.to_string()))
}

/// Whether `qname` is the base domain or a name below it.
pub fn in_zone(qname: &str, base_domain: &str) -> bool {
    let name = qname.strip_suffix('.').unwrap_or(qname);
    name.eq_ignore_ascii_case(base_domain.trim_matches('.'))
        || strip_zone(qname, base_domain).is_some()
}

/// Strip the trailing root dot and `.<base_domain>`, ASCII case-insensitively.
fn strip_zone<'a>(qname: &'a str, base_domain: &str) -> Option<&'a str> {
    let name = qname.strip_suffix('.').unwrap_or(qname);
    let zone = base_domain.trim_matches('.');

    let split = name.len().checked_sub(zone.len() + 1)?;
    let (relative, suffix) = (name.get(..split)?, name.get(split..)?);
    if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(zone) {
        Some(relative)
    } else {
        None
    }
}

/// `task-<slot>-<task_id>` -> (slot, task_id)
fn parse_task_label(label: &str) -> Option<(u64, &str)> {
    let prefix = label.get(..TASK_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(TASK_PREFIX) {
        return None;
    }
    let (slot, task_id) = label[TASK_PREFIX.len()..].split_once('-')?;
    if slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) || task_id.is_empty() {
        return None;
    }
    Some((slot.parse().ok()?, task_id))
}

fn is_token(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
