//! Load `.datasplit.toml` from the working directory (CLI only). Lib does not use this; the
//! consuming program passes a `SelectionPolicy` and `SplitOpts` directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Deserialize)]
pub(crate) struct DatasplitToml {
    #[serde(default)]
    settings: SplitSection,
}

#[derive(Debug, Default, Deserialize)]
struct SplitSection {
    threads: Option<usize>,
    verbose: Option<bool>,
    ids: Option<String>,
    field: Option<String>,
    value: Option<f64>,
    criterion: Option<String>,
    report: Option<String>,
}

/// Load the config file from `dir` if present. Missing file gives `Ok(None)`; a file that exists
/// but does not parse is an error.
pub(crate) fn load_datasplit_toml(dir: &Path) -> Result<Option<DatasplitToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    if !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let file = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(file))
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only set fields present in the file). Call before applying CLI.
pub(crate) fn apply_file_to_opts(file: &DatasplitToml, opts: &mut Opts) -> Result<()> {
    let sec = &file.settings;
    if let Some(n) = sec.threads {
        opts.num_threads = Some(n);
    }
    apply_file_opt!(sec, opts, verbose => verbose);
    if let Some(ref p) = sec.ids {
        opts.ids_path = Some(PathBuf::from(p));
    }
    if let Some(ref f) = sec.field {
        opts.field = Some(f.clone());
    }
    if let Some(v) = sec.value {
        opts.value = Some(v);
    }
    if let Some(ref c) = sec.criterion {
        opts.criterion = Some(c.parse()?);
    }
    if let Some(ref p) = sec.report {
        opts.report_path = Some(PathBuf::from(p));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Comparison;

    #[test]
    fn test_apply_file_to_opts() {
        let file: DatasplitToml = toml::from_str(
            r#"
            [settings]
            threads = 4
            field = "MEANSNR"
            value = 2.0
            criterion = "above"
            "#,
        )
        .unwrap();
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts).unwrap();
        assert_eq!(opts.num_threads, Some(4));
        assert_eq!(opts.field.as_deref(), Some("MEANSNR"));
        assert_eq!(opts.value, Some(2.0));
        assert_eq!(opts.criterion, Some(Comparison::Above));
        assert!(!opts.verbose);
    }

    #[test]
    fn test_bad_criterion_rejected() {
        let file: DatasplitToml = toml::from_str("[settings]\ncriterion = \"over\"\n").unwrap();
        assert!(apply_file_to_opts(&file, &mut Opts::default()).is_err());
    }
}
