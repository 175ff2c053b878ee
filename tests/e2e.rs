use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn run(fixture: &str, store_dir: &Path) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_cart-eng"))
        .arg(&path)
        .env("RUST_LOG", "warn")
        .env("CART_STORE_DIR", store_dir)
        .env("CART_DELIVERY_FEE", "40")
        .env("CART_FREE_DELIVERY_MIN", "1000")
        .env_remove("CART_API_URL")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn tables(stdout: &str) -> (Vec<&str>, Vec<&str>) {
    let (items, summary) = stdout.split_once("\n\n").expect("two tables");
    (items.lines().collect(), summary.lines().collect())
}

#[test]
fn valid_actions() {
    let store = TempDir::new().unwrap();
    let (stdout, stderr, success) = run("valid.csv", store.path());

    assert!(success);
    assert!(stderr.is_empty(), "unexpected stderr: {stderr}");

    let (items, summary) = tables(&stdout);
    assert_eq!(items[0], "product,name,color,quantity,unit_price,line_total");
    assert_eq!(items[1], "p1,Kurta,Red,2,200.00,400.00");
    assert_eq!(items[2], "p2,Scarf,,1,150.00,150.00");
    assert_eq!(summary[0], "subtotal,discount,delivery_fee,grand_total,coupon");
    assert_eq!(summary[1], "550.00,50.00,40.00,540.00,FLAT50");
}

#[test]
fn cart_survives_between_runs() {
    let store = TempDir::new().unwrap();
    let (_, _, success) = run("valid.csv", store.path());
    assert!(success);

    let (stdout, _, success) = run("follow_up.csv", store.path());
    assert!(success);

    let (items, summary) = tables(&stdout);
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], "p1,Kurta,Blue,2,200.00,400.00");
    // below the coupon minimum: attached but worth nothing
    assert_eq!(summary[1], "400.00,0.00,40.00,440.00,FLAT50");
}

#[test]
fn percentage_coupon() {
    let store = TempDir::new().unwrap();
    let (stdout, _, success) = run("percentage.csv", store.path());
    assert!(success);

    let (_, summary) = tables(&stdout);
    // free delivery from 1000 does not apply to 999
    assert_eq!(summary[1], "999.00,99.90,40.00,939.10,TEN");
}

#[test]
fn errors_warn_but_do_not_block() {
    let store = TempDir::new().unwrap();
    let (stdout, stderr, success) = run("with_errors.csv", store.path());

    assert!(success);
    assert!(stderr.contains("unrecognized action type"));
    assert!(stderr.contains("missing price"));

    let (items, _) = tables(&stdout);
    assert_eq!(items.len(), 3);
    assert_eq!(items[1], "p1,Kurta,Red,1,200.00,200.00");
    assert_eq!(items[2], "p2,Scarf,,1,150.00,150.00");
}

#[test]
fn corrupted_store_starts_empty() {
    let store = TempDir::new().unwrap();
    fs::write(store.path().join("cart.json"), "{{{ not a cart").unwrap();

    let (stdout, stderr, success) = run("valid.csv", store.path());

    assert!(success);
    assert!(stderr.contains("malformed"));
    let (_, summary) = tables(&stdout);
    assert_eq!(summary[1], "550.00,50.00,40.00,540.00,FLAT50");
}

#[test]
fn pending_reorder_is_merged_once() {
    let store = TempDir::new().unwrap();
    fs::write(
        store.path().join("reorder_items.json"),
        r#"{"items":[{"product":{"id":"p7","name":"Tote","price":300},"quantity":2}]}"#,
    )
    .unwrap();

    let (stdout, _, success) = run("empty.csv", store.path());
    assert!(success);
    let (items, summary) = tables(&stdout);
    assert_eq!(items[1], "p7,Tote,,2,300.00,600.00");
    assert_eq!(summary[1], "600.00,0.00,40.00,640.00,");
    assert!(!store.path().join("reorder_items.json").exists());

    let (stdout, _, _) = run("empty.csv", store.path());
    let (items, _) = tables(&stdout);
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], "p7,Tote,,2,300.00,600.00");
}

#[test]
fn missing_argument_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_cart-eng"))
        .output()
        .expect("failed to run binary");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}
