//! Delta file filtering: single file and directory fan-out over synthetic gzip FITS files.

use datasplit::fits::{FitsFile, Header, Value};
use datasplit::{
    Comparison, FileStatus, SelectionPolicy, SplitOpts, TargetIds, filter_directory, filter_file,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

const BLOCK: usize = 2880;

fn primary(extra: &[(&str, Value)]) -> Header {
    let mut h = Header::empty_primary();
    for (k, v) in extra {
        h.set(k, v.clone());
    }
    h
}

/// One delta section: a 3-row (LOGLAM, DELTA) table with TARGETID and MEANSNR in the header.
fn delta_section(id: i64, meansnr: f64) -> (Header, Vec<u8>) {
    let mut h = Header::default();
    h.set("XTENSION", Value::Str("BINTABLE".into()));
    h.set("BITPIX", Value::Integer(8));
    h.set("NAXIS", Value::Integer(2));
    h.set("NAXIS1", Value::Integer(16));
    h.set("NAXIS2", Value::Integer(3));
    h.set("PCOUNT", Value::Integer(0));
    h.set("GCOUNT", Value::Integer(1));
    h.set("TFIELDS", Value::Integer(2));
    h.set("TTYPE1", Value::Str("LOGLAM".into()));
    h.set("TFORM1", Value::Str("D".into()));
    h.set("TTYPE2", Value::Str("DELTA".into()));
    h.set("TFORM2", Value::Str("D".into()));
    h.set("TARGETID", Value::Integer(id));
    h.set("MEANSNR", Value::Float(meansnr));
    h.set("EXTNAME", Value::Str("DELTA".into()));

    let mut data = Vec::new();
    for row in 0..3 {
        data.extend_from_slice(&(3.56 + 0.0001 * row as f64).to_be_bytes());
        data.extend_from_slice(&(id as f64 * 0.01 + row as f64).to_be_bytes());
    }
    (h, data)
}

fn fits_bytes(primary: &Header, sections: &[(Header, Vec<u8>)]) -> Vec<u8> {
    let mut out = primary.to_bytes();
    for (h, data) in sections {
        out.extend_from_slice(&h.to_bytes());
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(BLOCK) * BLOCK, 0);
    }
    out
}

fn write_gz(path: &Path, bytes: &[u8]) {
    let file = std::fs::File::create(path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap();
}

fn write_delta(path: &Path, sections: &[(i64, f64)]) -> Vec<(Header, Vec<u8>)> {
    let sections: Vec<_> = sections
        .iter()
        .map(|(id, snr)| delta_section(*id, *snr))
        .collect();
    write_gz(path, &fits_bytes(&primary(&[]), &sections));
    sections
}

fn extnames(file: &FitsFile) -> Vec<String> {
    file.sections()
        .skip(1)
        .map(|s| s.header().get_str("EXTNAME").unwrap())
        .collect()
}

fn cards_without_extname(h: &Header) -> Vec<Vec<u8>> {
    h.cards()
        .iter()
        .filter(|c| c.keyword() != "EXTNAME")
        .map(|c| c.as_bytes().to_vec())
        .collect()
}

fn ids(list: &[i64]) -> TargetIds {
    list.iter().copied().collect()
}

#[test]
fn test_identifier_policy_keeps_listed_sections_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-100.fits.gz");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let source = write_delta(&input, &[(10, 1.0), (20, 2.0), (30, 3.0)]);

    let policy = SelectionPolicy::by_identifier(ids(&[20, 30]));
    let outcome = filter_file(&input, &out_dir, &policy).unwrap();

    assert_eq!(outcome.status, FileStatus::Success);
    assert_eq!(outcome.sections_scanned, 3);
    assert_eq!(outcome.sections_kept, 2);
    let out_path = out_dir.join("delta-100.fits.gz");
    assert_eq!(outcome.output.as_deref(), Some(out_path.as_path()));

    let out = FitsFile::open(&out_path).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(extnames(&out), vec!["20", "30"]);
    for (kept, (src_header, src_data)) in out.sections().skip(1).zip(&source[1..]) {
        assert_eq!(kept.data(), src_data.as_slice());
        assert_eq!(
            cards_without_extname(kept.header()),
            cards_without_extname(src_header)
        );
    }
}

#[test]
fn test_threshold_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-1.fits.gz");
    write_delta(&input, &[(1, 1.999), (2, 2.0), (3, 2.5)]);

    let cases = [
        (Comparison::Above, vec!["2", "3"]),
        (Comparison::Below, vec!["1"]),
        (Comparison::Equal, vec!["2"]),
    ];
    for (comparison, expected) in cases {
        let out_dir = dir.path().join(format!("out-{comparison}"));
        std::fs::create_dir(&out_dir).unwrap();
        let policy = SelectionPolicy::by_threshold("MEANSNR", 2.0, comparison);
        filter_file(&input, &out_dir, &policy).unwrap();
        let out = FitsFile::open(&out_dir.join("delta-1.fits.gz")).unwrap();
        assert_eq!(extnames(&out), expected, "{comparison}");
    }
}

#[test]
fn test_preamble_is_never_copied() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-2.fits.gz");
    let preamble = primary(&[("TARGETID", Value::Integer(99)), ("MEANSNR", Value::Float(9.0))]);
    write_gz(&input, &fits_bytes(&preamble, &[delta_section(20, 1.0)]));

    let policy = SelectionPolicy::by_identifier(ids(&[20, 99]));
    let outcome = filter_file(&input, dir.path().join("o").as_path(), &policy);
    // Output directory must exist for a single-file run.
    assert!(outcome.is_err());

    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let outcome = filter_file(&input, &out_dir, &policy).unwrap();
    assert_eq!(outcome.sections_scanned, 1);
    let out = FitsFile::open(&out_dir.join("delta-2.fits.gz")).unwrap();
    assert_eq!(extnames(&out), vec!["20"]);
    assert!(!out.section(0).unwrap().header().contains("TARGETID"));
}

#[test]
fn test_incomplete_policies_write_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-3.fits.gz");
    write_delta(&input, &[(10, 1.0), (20, 2.0)]);

    let policies = [
        SelectionPolicy::from_parts(true, None, None, None, None),
        SelectionPolicy::from_parts(false, None, Some("MEANSNR".into()), Some(2.0), None),
        SelectionPolicy::from_parts(false, None, None, Some(2.0), Some(Comparison::Above)),
    ];
    for policy in policies {
        let out_dir = tempfile::tempdir().unwrap();
        let outcome = filter_file(&input, out_dir.path(), &policy).unwrap();
        assert!(matches!(outcome.status, FileStatus::EmptyByPolicy { .. }));
        assert_eq!(outcome.sections_kept, 0);
        let out = FitsFile::open(&out_dir.path().join("delta-3.fits.gz")).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.section(0).unwrap().header().is_primary());
    }
}

#[test]
fn test_missing_targetid_fails_without_leaving_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-4.fits.gz");
    let (mut header, data) = delta_section(10, 1.0);
    header.set("TARGETID", Value::Str("unknown".into()));
    write_gz(&input, &fits_bytes(&primary(&[]), &[delta_section(5, 1.0), (header, data)]));

    let out_dir = tempfile::tempdir().unwrap();
    let policy = SelectionPolicy::by_identifier(ids(&[5]));
    let err = filter_file(&input, out_dir.path(), &policy).unwrap_err();
    assert!(format!("{err:#}").contains("TARGETID"));
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_oversized_section_fails_without_leaving_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-huge.fits.gz");
    let mut header = Header::default();
    header.set("XTENSION", Value::Str("IMAGE".into()));
    header.set("BITPIX", Value::Integer(64));
    header.set("NAXIS", Value::Integer(1));
    header.set("NAXIS1", Value::Integer(1 << 62));
    header.set("TARGETID", Value::Integer(20));
    write_gz(&input, &fits_bytes(&primary(&[]), &[(header, Vec::new())]));

    let out_dir = tempfile::tempdir().unwrap();
    let policy = SelectionPolicy::by_identifier(ids(&[20]));
    let err = filter_file(&input, out_dir.path(), &policy).unwrap_err();
    assert!(format!("{err:#}").contains("NAXIS"));
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_threshold_field_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-5.fits.gz");
    write_delta(&input, &[(10, 1.0)]);
    let out_dir = tempfile::tempdir().unwrap();
    let policy = SelectionPolicy::by_threshold("Z", 2.0, Comparison::Below);
    assert!(filter_file(&input, out_dir.path(), &policy).is_err());
}

#[test]
fn test_existing_output_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("delta-6.fits.gz");
    write_delta(&input, &[(10, 1.0), (20, 2.0)]);
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    std::fs::write(out_dir.join("delta-6.fits.gz"), b"stale").unwrap();

    filter_file(&input, &out_dir, &SelectionPolicy::by_identifier(ids(&[10]))).unwrap();
    let out = FitsFile::open(&out_dir.join("delta-6.fits.gz")).unwrap();
    assert_eq!(extnames(&out), vec!["10"]);
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn populate_deltas_dir(dir: &Path) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for n in 0..5_i64 {
        let path = dir.join(format!("delta-{n}.fits.gz"));
        write_delta(&path, &[(n * 10 + 1, 1.0), (n * 10 + 2, 2.0), (n * 10 + 3, 3.0)]);
        inputs.push(path);
    }
    write_delta(&dir.join("delta-9.fits"), &[(91, 1.0)]);
    write_delta(&dir.join("qso_cat.fits.gz"), &[(92, 1.0)]);
    inputs
}

#[test]
fn test_directory_fan_out_matches_pattern_and_worker_count() {
    let dir = tempfile::tempdir().unwrap();
    let deltas = dir.path().join("deltas");
    std::fs::create_dir(&deltas).unwrap();
    populate_deltas_dir(&deltas);

    let policy = SelectionPolicy::by_threshold("MEANSNR", 2.0, Comparison::Above);
    let serial = dir.path().join("serial");
    let parallel = dir.path().join("parallel");
    let opts = |n| SplitOpts {
        num_threads: Some(n),
        progress: false,
    };
    let report_serial = filter_directory(&deltas, &serial, &policy, &opts(1)).unwrap();
    let report_parallel = filter_directory(&deltas, &parallel, &policy, &opts(4)).unwrap();

    assert_eq!(report_serial.outcomes.len(), 5);
    assert_eq!(report_serial.succeeded(), 5);
    assert_eq!(report_parallel.succeeded(), 5);

    let expected: Vec<String> = (0..5).map(|n| format!("delta-{n}.fits.gz")).collect();
    assert_eq!(sorted_names(&serial), expected);
    assert_eq!(sorted_names(&parallel), expected);

    for name in &expected {
        let a = FitsFile::open(&serial.join(name)).unwrap();
        let b = FitsFile::open(&parallel.join(name)).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(extnames(&a), extnames(&b));
        for (x, y) in a.sections().zip(b.sections()) {
            assert_eq!(x.header(), y.header());
            assert_eq!(x.data(), y.data());
        }
    }
}

#[test]
fn test_directory_fan_out_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let deltas = dir.path().join("deltas");
    std::fs::create_dir(&deltas).unwrap();
    populate_deltas_dir(&deltas);
    write_gz(&deltas.join("delta-bad.fits.gz"), b"not a fits file");

    let out = dir.path().join("out");
    let policy = SelectionPolicy::by_identifier(ids(&[1, 21, 43]));
    let report = filter_directory(&deltas, &out, &policy, &SplitOpts::default()).unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 1);
    let failed: Vec<_> = report.failures().collect();
    assert!(failed[0].input.ends_with("delta-bad.fits.gz"));
    assert!(!out.join("delta-bad.fits.gz").exists());

    let kept: usize = report.outcomes.iter().map(|o| o.sections_kept).sum();
    assert_eq!(kept, 3);
}

#[test]
fn test_directory_fan_out_missing_input_dir() {
    let dir = tempfile::tempdir().unwrap();
    let policy = SelectionPolicy::by_identifier(ids(&[1]));
    assert!(
        filter_directory(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            &policy,
            &SplitOpts::default()
        )
        .is_err()
    );
}
