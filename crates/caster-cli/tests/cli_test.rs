use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn caster_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_caster"))
}

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(caster_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("caster should execute")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn assert_exit_code(output: &Output, expected: i32) {
    let actual = output.status.code().unwrap_or(-1);
    assert_eq!(
        actual,
        expected,
        "unexpected exit code; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn shop_args(command: &str) -> Vec<String> {
    vec![
        command.to_string(),
        "--types".to_string(),
        path_arg(&testdata("shop_types.json")),
        "--mapping".to_string(),
        path_arg(&testdata("shop_mapping.yaml")),
    ]
}

fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

#[test]
fn test_generate_writes_caster_files() {
    let out = tempfile::tempdir().expect("temp dir");
    let mut args = shop_args("generate");
    args.extend(["--out".to_string(), path_arg(out.path())]);

    let output = run(&as_strs(&args));
    assert_exit_code(&output, 0);

    let caster = fs::read_to_string(out.path().join("store_order_to_wire_order.go"))
        .expect("caster file");
    assert!(caster.contains("func StoreOrderToWireOrder(in store.Order) wire.Order {"));
    assert!(out.path().join("store_item_to_wire_item.go").exists());
    assert!(out.path().join("missing_transforms.go").exists());
    assert!(out.path().join("dto").join("missing_types.go").exists());

    // missing ConcatNames is a warning, reported on stderr
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ConcatNames"), "stderr: {stderr}");
}

#[test]
fn test_generate_respects_package_flag_and_config() {
    let out = tempfile::tempdir().expect("temp dir");
    let config = out.path().join("caster.yaml");
    fs::write(&config, "package_name: fromconfig\nheader: // generated\n").expect("config");

    let mut args = shop_args("generate");
    args.extend([
        "--out".to_string(),
        path_arg(out.path()),
        "--config".to_string(),
        path_arg(&config),
        "--package".to_string(),
        "mappers".to_string(),
        "--per-pair-stubs".to_string(),
        "--jobs".to_string(),
        "3".to_string(),
    ]);

    let output = run(&as_strs(&args));
    assert_exit_code(&output, 0);

    let caster = fs::read_to_string(out.path().join("store_order_to_wire_order.go"))
        .expect("caster file");
    assert!(caster.starts_with("// generated\n\npackage mappers\n"));
    assert!(caster.contains("func ConcatNames("));
    assert!(!out.path().join("missing_transforms.go").exists());
}

#[test]
fn test_check_reports_cardinality_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mapping = dir.path().join("mapping.yaml");
    fs::write(
        &mapping,
        "mappings:\n  - source: store.Order\n    target: wire.Order\n    fields:\n      - source: [FirstName, LastName]\n        target: FullName\n",
    )
    .expect("mapping");
    let report = dir.path().join("report.csv");

    let output = run(&[
        "check",
        "--types",
        &path_arg(&testdata("shop_types.json")),
        "--mapping",
        &path_arg(&mapping),
        "--report",
        &path_arg(&report),
    ]);
    assert_exit_code(&output, 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("N:1"), "stderr: {stderr}");
    assert!(stderr.contains("transform"), "stderr: {stderr}");

    let csv = fs::read_to_string(&report).expect("report");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("severity,kind,type_pair,field_path,message")
    );
    assert!(csv.contains("error,cardinality,store.Order -> wire.Order,FullName,"));
}

#[test]
fn test_plan_prints_yaml() {
    let output = run(&as_strs(&shop_args("plan")));
    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("caster_name: StoreOrderToWireOrder"));
    assert!(stdout.contains("caster_name: StoreItemToWireItem"));
}

#[test]
fn test_missing_input_exits_with_two() {
    let out = tempfile::tempdir().expect("temp dir");
    let output = run(&[
        "generate",
        "--types",
        "does-not-exist.json",
        "--mapping",
        &path_arg(&testdata("shop_mapping.yaml")),
        "--out",
        &path_arg(out.path()),
    ]);
    assert_exit_code(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn test_malformed_mapping_exits_with_two() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mapping = dir.path().join("mapping.yaml");
    fs::write(&mapping, "mappings: [\n").expect("mapping");

    let output = run(&[
        "check",
        "--types",
        &path_arg(&testdata("shop_types.json")),
        "--mapping",
        &path_arg(&mapping),
    ]);
    assert_exit_code(&output, 2);
}
