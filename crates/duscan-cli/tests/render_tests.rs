/// End-to-end rendering tests: run the real scanner over a temp fixture and
/// assert on the produced human and JSON output.
use duscan_cli::render;
use duscan_core::{start_scan, Report, ScanOptions, ScanResult, SizeMode};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

fn make_temp_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("a.txt"), 100);
    // Comfortably larger than any directory's own metadata size, so sort
    // order is stable across filesystems.
    write_bytes(&tmp.path().join("big.bin"), 50_000);
    let sub = tmp.path().join("sub");
    fs::create_dir_all(&sub).unwrap();
    write_bytes(&sub.join("c.rs"), 300);
    tmp
}

fn scan(root: &Path) -> ScanResult {
    start_scan(ScanOptions::new(vec![root.to_path_buf()]))
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn human_output_lists_children_and_summary() {
    let tmp = make_temp_tree();
    let result = scan(tmp.path());

    let out = render::human(&result, SizeMode::Apparent, 0);

    assert!(out.contains("big.bin"));
    assert!(out.contains("a.txt"));
    assert!(out.contains("sub/"), "directories carry a trailing slash");
    assert!(out.contains("3 files, 2 directories"));
    assert!(!out.contains("Largest files:"));
}

#[test]
fn top_listing_leads_with_the_biggest_file() {
    let tmp = make_temp_tree();
    let result = scan(tmp.path());

    let out = render::human(&result, SizeMode::Apparent, 2);

    let section = out
        .split("Largest files:")
        .nth(1)
        .expect("largest-files section");
    let first = section.lines().find(|line| !line.trim().is_empty()).unwrap();
    assert!(first.contains("big.bin"), "expected big.bin first: {first}");
}

#[test]
fn json_report_nests_the_tree_under_each_root() {
    let tmp = make_temp_tree();
    let result = scan(tmp.path());

    let json = Report::new(&result).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["summary"]["files"], 3);
    assert_eq!(value["summary"]["directories"], 2);

    let roots = value["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["kind"], "directory");

    let children = roots[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 3);

    // Children are ordered by apparent size, so big.bin comes first.
    assert_eq!(children[0]["name"], "big.bin");
    assert_eq!(children[0]["apparent_size"], 50_000);
}
