//! Public types for the datasplit API: identifiers, selection policies, options and per-file
//! outcomes.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Unique numeric target id (`TARGETID`).
pub type TargetId = i64;

/// Immutable set of target ids defining a data-split subsample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetIds(HashSet<TargetId>);

impl TargetIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.0.iter().copied()
    }

    /// Parse whitespace/comma separated ids. `#` starts a comment; blank lines are ignored.
    /// Integral float spellings (`39627640566453451.0`) are accepted.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut ids = HashSet::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("");
            for token in line.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
                ids.insert(parse_target_id(token).with_context(|| {
                    format!("line {}: invalid target id {token:?}", lineno + 1)
                })?);
            }
        }
        Ok(TargetIds(ids))
    }

    /// Load ids from `path`: a JSON array (`.json`), the `TARGETID` column of a FITS catalog
    /// (`.fits`, `.fits.gz`), or plain text otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name.ends_with(".fits") || name.ends_with(".fits.gz") {
            return crate::catalog::read_catalog(path)?.target_ids();
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read target ids from {}", path.display()))?;
        if name.ends_with(".json") {
            let ids: Vec<serde_json::Number> = serde_json::from_str(&text)
                .with_context(|| format!("parse JSON target ids in {}", path.display()))?;
            return ids
                .iter()
                .map(|n| parse_target_id(&n.to_string()))
                .collect();
        }
        Self::from_text(&text)
    }
}

fn parse_target_id(token: &str) -> Result<TargetId> {
    if let Ok(id) = token.parse::<TargetId>() {
        return Ok(id);
    }
    let f: f64 = token.parse().context("not a number")?;
    match crate::fits::Value::Float(f).as_i64() {
        Some(id) => Ok(id),
        None => bail!("not an integral id in the signed 64-bit range: {token}"),
    }
}

impl FromIterator<TargetId> for TargetIds {
    fn from_iter<I: IntoIterator<Item = TargetId>>(iter: I) -> Self {
        TargetIds(iter.into_iter().collect())
    }
}

/// Comparison of a header field against a threshold.
///
/// `Below` is strict (`<`) while `Above` is inclusive (`>=`): a value equal to the threshold is
/// kept by `Above` and dropped by `Below`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Equal,
    Below,
    Above,
}

impl FromStr for Comparison {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(Comparison::Equal),
            "below" => Ok(Comparison::Below),
            "above" => Ok(Comparison::Above),
            other => bail!("unknown selection criterion {other:?} (expected equal, below or above)"),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparison::Equal => "equal",
            Comparison::Below => "below",
            Comparison::Above => "above",
        };
        f.write_str(s)
    }
}

/// Which part of a policy was left out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingPolicyPart {
    /// Identifier filtering requested without an identifier set.
    Identifiers,
    /// Threshold filtering requested without all of field, value and comparison.
    ThresholdParameters,
}

impl fmt::Display for MissingPolicyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPolicyPart::Identifiers => {
                f.write_str("identifier filtering requested but no target ids were given")
            }
            MissingPolicyPart::ThresholdParameters => f.write_str(
                "one of field name, threshold value or selection criterion is missing",
            ),
        }
    }
}

/// Keep/discard rule applied to each section.
#[derive(Clone, Debug)]
pub enum SelectionPolicy {
    /// Keep sections whose `TARGETID` is in the set.
    ByIdentifier(Arc<TargetIds>),
    /// Keep sections whose header `field` compares true against `value`.
    ByThreshold {
        field: String,
        value: f64,
        comparison: Comparison,
    },
    /// Misconfigured request: keeps nothing and the output holds no sections.
    Incomplete(MissingPolicyPart),
}

impl SelectionPolicy {
    pub fn by_identifier(ids: TargetIds) -> Self {
        SelectionPolicy::ByIdentifier(Arc::new(ids))
    }

    pub fn by_threshold(field: impl Into<String>, value: f64, comparison: Comparison) -> Self {
        SelectionPolicy::ByThreshold {
            field: field.into(),
            value,
            comparison,
        }
    }

    /// Build a policy from loose arguments: identifier mode when `filter_with_ids`, threshold
    /// mode otherwise. Missing arguments give [`SelectionPolicy::Incomplete`].
    pub fn from_parts(
        filter_with_ids: bool,
        ids: Option<TargetIds>,
        field: Option<String>,
        value: Option<f64>,
        comparison: Option<Comparison>,
    ) -> Self {
        if filter_with_ids {
            return match ids {
                Some(ids) => SelectionPolicy::by_identifier(ids),
                None => SelectionPolicy::Incomplete(MissingPolicyPart::Identifiers),
            };
        }
        match (field, value, comparison) {
            (Some(field), Some(value), Some(comparison)) => {
                SelectionPolicy::by_threshold(field, value, comparison)
            }
            _ => SelectionPolicy::Incomplete(MissingPolicyPart::ThresholdParameters),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::ByIdentifier(ids) => write!(f, "TARGETID in {} ids", ids.len()),
            SelectionPolicy::ByThreshold {
                field,
                value,
                comparison,
            } => write!(f, "{field} {comparison} {value}"),
            SelectionPolicy::Incomplete(missing) => write!(f, "incomplete ({missing})"),
        }
    }
}

/// Lib options for [`filter_directory`](crate::filter_directory) and
/// [`filter_catalog`](crate::filter_catalog).
#[derive(Clone, Debug, Default)]
pub struct SplitOpts {
    /// Worker count. When None, all available processing units.
    pub num_threads: Option<usize>,
    /// Show a progress bar over files.
    pub progress: bool,
}

/// Result class of one file.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    /// Output written but empty because the policy was incomplete.
    EmptyByPolicy { reason: String },
    Failed { reason: String },
}

impl FileStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, FileStatus::Failed { .. })
    }
}

/// What happened to one input file.
#[derive(Clone, Debug, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    /// Final output path; None when nothing was written.
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Data sections examined (the preamble section is not counted).
    pub sections_scanned: usize,
    pub sections_kept: usize,
}

impl FileOutcome {
    pub fn failed(input: &Path, reason: impl Into<String>) -> Self {
        FileOutcome {
            input: input.to_path_buf(),
            output: None,
            status: FileStatus::Failed {
                reason: reason.into(),
            },
            sections_scanned: 0,
            sections_kept: 0,
        }
    }
}

/// Per-file outcomes of a directory run, sorted by input path.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FanOutReport {
    pub outcomes: Vec<FileOutcome>,
}

impl FanOutReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Success))
    }

    pub fn empty_by_policy(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::EmptyByPolicy { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failed())
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Full options (CLI). Use [`SplitOpts`] for lib.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Worker count override. When None, all available processing units.
    pub num_threads: Option<usize>,
    /// Debug logging and progress bar.
    pub verbose: bool,
    /// Target id list (text, JSON or FITS catalog). Selects identifier filtering.
    pub ids_path: Option<PathBuf>,
    /// Header field for threshold filtering (e.g. `MEANSNR`).
    pub field: Option<String>,
    /// Threshold value.
    pub value: Option<f64>,
    /// equal / below / above.
    pub criterion: Option<Comparison>,
    /// Write the per-file JSON report here.
    pub report_path: Option<PathBuf>,
}

impl From<&Opts> for SplitOpts {
    fn from(o: &Opts) -> Self {
        SplitOpts {
            num_threads: o.num_threads,
            progress: o.verbose,
        }
    }
}

impl Opts {
    /// Build the selection policy: identifier filtering when an id list is configured,
    /// threshold filtering otherwise.
    pub fn selection_policy(&self) -> Result<SelectionPolicy> {
        let ids = self.ids_path.as_deref().map(TargetIds::load).transpose()?;
        Ok(SelectionPolicy::from_parts(
            self.ids_path.is_some(),
            ids,
            self.field.clone(),
            self.value,
            self.criterion,
        ))
    }
}
