use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ClientError, ClientResult};
use crate::types::{OutputFormat, StartScanBody};

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^([a-z0-9]+(-[a-z0-9]+)*\.)+[a-z]{2,}$").expect("domain pattern compiles")
    })
}

/// Check the shape of a single target domain.
///
/// Labels are alphanumerics with inner hyphens, separated by dots; the final
/// label is at least two letters. No DNS lookup happens here.
pub fn is_valid_domain(domain: &str) -> bool {
    domain_pattern().is_match(domain)
}

/// What the scan runs against: one domain, or the raw content of a target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetInput {
    Single(String),
    List(String),
}

impl TargetInput {
    /// Trim and validate a single target domain.
    pub fn single(raw: &str) -> ClientResult<Self> {
        let target = raw.trim();
        if target.is_empty() {
            return Err(ClientError::Validation("Please enter a target domain".into()));
        }
        if !is_valid_domain(target) {
            return Err(ClientError::Validation("Please enter a valid domain".into()));
        }
        Ok(TargetInput::Single(target.to_string()))
    }

    /// Accept raw target-list text as uploaded. Blank content is rejected.
    pub fn list(content: impl Into<String>) -> ClientResult<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ClientError::Validation("Please select a domain list file".into()));
        }
        Ok(TargetInput::List(content))
    }

    /// Read a target list from disk.
    pub fn list_from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::Validation(format!("failed to read target list {}: {e}", path.display()))
        })?;
        Self::list(content)
    }

    /// Pick the active input mode. Exactly one of the two must be given.
    pub fn from_choice(target: Option<&str>, list: Option<&Path>) -> ClientResult<Self> {
        match (target, list) {
            (Some(t), None) => Self::single(t),
            (None, Some(p)) => Self::list_from_path(p),
            (Some(_), Some(_)) => Err(ClientError::Validation(
                "Choose either a single target or a target list, not both".into(),
            )),
            (None, None) => Err(ClientError::Validation("Please enter a target domain".into())),
        }
    }

    /// Re-check invariants on a value that may have been built directly.
    pub fn validate(&self) -> ClientResult<()> {
        match self {
            TargetInput::Single(t) => Self::single(t).map(|_| ()),
            TargetInput::List(c) => Self::list(c.as_str()).map(|_| ()),
        }
    }

    /// Number of non-blank, non-comment lines; 1 for a single target.
    pub fn target_count(&self) -> usize {
        match self {
            TargetInput::Single(_) => 1,
            TargetInput::List(c) => c
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .count(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            TargetInput::Single(t) => t.clone(),
            TargetInput::List(_) => format!("{} targets from list", self.target_count()),
        }
    }
}

/// A complete scan submission: input, output format and optional artifact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub input: TargetInput,
    pub format: OutputFormat,
    pub filename: Option<String>,
}

impl ScanRequest {
    pub fn new(input: TargetInput, format: OutputFormat, filename: Option<String>) -> Self {
        let filename = filename
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        Self {
            input,
            format,
            filename,
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.input.validate()
    }

    pub fn to_body(&self) -> StartScanBody {
        let (target, target_list) = match &self.input {
            TargetInput::Single(t) => (Some(t.clone()), None),
            TargetInput::List(c) => (None, Some(c.clone())),
        };
        StartScanBody {
            target,
            target_list,
            output_format: self.format,
            filename: self.filename.clone(),
        }
    }
}
