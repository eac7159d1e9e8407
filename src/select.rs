//! Record selection: pure keep/discard decisions for one section header.

use anyhow::{Context, Result};

use crate::fits::Header;
use crate::types::{Comparison, SelectionPolicy, TargetId, TargetIds};
use crate::utils::config::TARGETID_KEY;

/// Keep iff `id` is in `ids`.
pub fn keep_by_identifier(id: TargetId, ids: &TargetIds) -> bool {
    ids.contains(id)
}

/// Keep iff `field_value` satisfies `comparison` against `threshold`.
pub fn keep_by_threshold(field_value: f64, threshold: f64, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Equal => field_value == threshold,
        Comparison::Below => field_value < threshold,
        // Inclusive on purpose; not the mirror image of Below.
        Comparison::Above => field_value >= threshold,
    }
}

/// Mandatory `TARGETID` of a section header.
pub fn target_id(header: &Header) -> Result<TargetId> {
    header
        .get_i64(TARGETID_KEY)
        .context("section header has no usable TARGETID")
}

impl SelectionPolicy {
    /// Decide for one section whose identifier is `id`. An incomplete policy keeps nothing.
    /// Errors only when the threshold field is absent or not numeric.
    pub fn keeps(&self, id: TargetId, header: &Header) -> Result<bool> {
        match self {
            SelectionPolicy::ByIdentifier(ids) => Ok(keep_by_identifier(id, ids)),
            SelectionPolicy::ByThreshold {
                field,
                value,
                comparison,
            } => {
                let field_value = header
                    .get_f64(field)
                    .with_context(|| format!("TARGETID {id}: field {field}"))?;
                Ok(keep_by_threshold(field_value, *value, *comparison))
            }
            SelectionPolicy::Incomplete(_) => Ok(false),
        }
    }
}
