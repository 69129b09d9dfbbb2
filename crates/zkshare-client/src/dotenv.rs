//! Bulk sharing of `.env` files.
//!
//! Sealing turns every `KEY=value` line into `KEY_ENC=<link query>`, issuing
//! one token per variable under a single PIN. Comments, blank lines and lines
//! without `=` pass through untouched:
//!
//! ```text
//! # database                    # database
//! DB_PASSWORD=hunter2     ──►   DB_PASSWORD_ENC=token=...&data=...
//! ```
//!
//! Opening redeems each `*_ENC` line once. Every variable is independent: a
//! failure on one (expired, already opened, wrong PIN) is reported and the
//! rest still open.

use std::{collections::BTreeMap, fmt::Write as _, time::Duration};

use zeroize::Zeroizing;
use zkshare_core::{BrokerClient, Environment, Pin, ShareError, ShareLinkProtocol};

use crate::error::ClientError;

/// Suffix marking a sealed variable.
pub const ENC_SUFFIX: &str = "_ENC";

/// Output of [`seal_env`].
#[derive(Debug)]
pub struct SealedEnv {
    /// The sealed file contents
    pub text: String,
    /// Number of variables sealed
    pub sealed: usize,
    /// Variables that could not be sealed, with the reason
    pub failures: Vec<(String, ShareError)>,
}

/// Output of [`open_env`].
#[derive(Debug, Default)]
pub struct OpenedEnv {
    /// Recovered values by variable name
    pub values: BTreeMap<String, Zeroizing<String>>,
    /// Variables that could not be opened, with the reason
    pub failures: Vec<(String, ShareError)>,
}

impl OpenedEnv {
    /// Render the recovered values as `KEY=value` lines.
    pub fn to_env_text(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::new());
        for (key, value) in &self.values {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{key}={}", value.as_str());
        }
        out
    }
}

/// A `KEY=value` assignment, or `None` for lines that pass through.
fn parse_assignment(line: &str, number: usize) -> Result<Option<(&str, &str)>, ClientError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return Ok(None);
    };

    let key = key.trim();
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(ClientError::DotEnv { line: number, reason: format!("invalid key {key:?}") });
    }
    Ok(Some((key, value)))
}

/// Seal every assignment in `input`.
///
/// A malformed PIN or key aborts before any token is issued. Failures while
/// sealing a single variable are recorded in [`SealedEnv::failures`] and leave
/// a `# ERROR` comment in its place.
pub async fn seal_env<B: BrokerClient, E: Environment>(
    protocol: &ShareLinkProtocol<B, E>,
    input: &str,
    pin: &str,
    ttl: Option<Duration>,
) -> Result<SealedEnv, ClientError> {
    Pin::parse(pin).map_err(ShareError::from)?;

    let mut assignments = Vec::new();
    for (index, line) in input.lines().enumerate() {
        assignments.push((line, parse_assignment(line, index + 1)?));
    }

    let mut sealed = SealedEnv { text: String::new(), sealed: 0, failures: Vec::new() };
    for (line, assignment) in assignments {
        let Some((key, value)) = assignment else {
            sealed.text.push_str(line);
            sealed.text.push('\n');
            continue;
        };

        match protocol.create(value.as_bytes(), pin, ttl).await {
            Ok(created) => {
                let _ = writeln!(sealed.text, "{key}{ENC_SUFFIX}={}", created.link.query());
                sealed.sealed += 1;
            },
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to seal variable");
                let _ = writeln!(sealed.text, "# ERROR sealing {key}");
                sealed.failures.push((key.to_string(), err));
            },
        }
    }

    Ok(sealed)
}

/// Open every `*_ENC` assignment in `input`, consuming each token.
///
/// Other lines are ignored. Malformed keys abort before any token is
/// redeemed.
pub async fn open_env<B: BrokerClient, E: Environment>(
    protocol: &ShareLinkProtocol<B, E>,
    input: &str,
    pin: &str,
) -> Result<OpenedEnv, ClientError> {
    let mut sealed = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let Some((key, link)) = parse_assignment(line, index + 1)? else {
            continue;
        };
        if let Some(name) = key.strip_suffix(ENC_SUFFIX).filter(|name| !name.is_empty()) {
            sealed.push((name, link));
        }
    }

    let mut opened = OpenedEnv::default();
    for (name, link) in sealed {
        match protocol.access_text(link.trim(), pin).await {
            Ok(value) => {
                opened.values.insert(name.to_string(), value);
            },
            Err(err) => {
                tracing::warn!(key = name, error = %err, "failed to open variable");
                opened.failures.push((name.to_string(), err));
            },
        }
    }

    Ok(opened)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_and_passthrough() {
        assert_eq!(parse_assignment("A=1", 1).unwrap(), Some(("A", "1")));
        assert_eq!(parse_assignment("  DB_URL=x=y  ", 1).unwrap(), Some(("DB_URL", "x=y")));
        assert_eq!(parse_assignment("# A=1", 1).unwrap(), None);
        assert_eq!(parse_assignment("   ", 1).unwrap(), None);
        assert_eq!(parse_assignment("no equals sign", 1).unwrap(), None);
    }

    #[test]
    fn invalid_key_reports_line() {
        let err = parse_assignment("BAD KEY=1", 7).unwrap_err();
        assert!(matches!(err, ClientError::DotEnv { line: 7, .. }));
    }

    #[test]
    fn opened_env_renders_sorted_lines() {
        let mut opened = OpenedEnv::default();
        opened.values.insert("B".into(), Zeroizing::new("2".into()));
        opened.values.insert("A".into(), Zeroizing::new("1".into()));

        assert_eq!(opened.to_env_text().as_str(), "A=1\nB=2\n");
    }
}
