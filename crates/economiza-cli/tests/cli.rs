use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use economiza_core::models::EconomizaConfig;
use economiza_core::UserId;

const BOLETO_TEXT: &str = "Beneficiário: ENERGIA ELETRICA SA CNPJ 12.345.678/0001-90\nValor do documento: R$ 150,50\nVencimento: 15/12/2024\n34191090080123456789012345678901234567890123";

/// A config with AI disabled and storage inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let mut config = EconomizaConfig::default();
    config.ai.enabled = false;
    config.user_id = UserId::new();
    config.storage.store_file = dir.join("bills.json");
    config.storage.data_dir = dir.join("documents");

    let path = dir.join("config.json");
    config.save(&path).unwrap();
    path
}

fn economiza(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("economiza").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn setup() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    (dir, config)
}

#[test]
fn test_extract_text_file() {
    let (dir, config) = setup();
    let input = dir.path().join("boleto.txt");
    fs::write(&input, BOLETO_TEXT).unwrap();

    let value = json_output(economiza(&config).arg("extract").arg(&input).arg("--no-ai"));

    assert_eq!(value["bill_status"], "confirmed");
    assert_eq!(value["fields"]["issuer"], "ENERGIA ELETRICA SA");
    assert_eq!(value["fields"]["due_date"], "2024-12-15");
    assert_eq!(value["fields"]["currency"], "BRL");
}

#[test]
fn test_extract_csv_from_stdin() {
    let (_dir, config) = setup();

    economiza(&config)
        .args(["extract", "-", "--no-ai", "--format", "csv"])
        .write_stdin("Total a pagar R$ 99,90")
        .assert()
        .success()
        .stdout(predicate::str::contains("issuer,amount,currency"))
        .stdout(predicate::str::contains(",99.90,BRL,"))
        .stdout(predicate::str::contains("pending"));
}

#[test]
fn test_extract_missing_file() {
    let (dir, config) = setup();

    economiza(&config)
        .arg("extract")
        .arg(dir.path().join("nope.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_with_summary() {
    let (dir, config) = setup();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("a.txt"), BOLETO_TEXT).unwrap();
    fs::write(inputs.join("b.txt"), "algum texto aleatorio sem campos").unwrap();
    let out = dir.path().join("out");

    economiza(&config)
        .arg("batch")
        .arg(format!("{}/*.txt", inputs.display()))
        .arg("--output-dir")
        .arg(&out)
        .args(["--summary", "--no-ai", "-j", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful"));

    assert!(out.join("a.json").exists());
    assert!(out.join("b.json").exists());
    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("a.txt,success,ENERGIA ELETRICA SA,150.50,2024-12-15,"));
    assert!(lines[2].starts_with("b.txt,success,,,,,0.30,pending,"));
}

#[test]
fn test_manual_bill_lifecycle() {
    let (_dir, config) = setup();

    let created = json_output(economiza(&config).args([
        "bill", "create", "--amount", "89,90", "--due", "10/01/2025", "--issuer", "Internet SA",
        "--json",
    ]));
    let bill_id = created[0]["id"].as_str().unwrap().to_string();
    assert_eq!(created[0]["status"], "confirmed");
    assert_eq!(created[0]["amount"], "89.90");

    let payment = json_output(economiza(&config).args([
        "bill", "schedule", bill_id.as_str(), "--date", "2025-01-08", "--notify", "7,3",
        "--today", "2025-01-05", "--json",
    ]));
    assert_eq!(payment["status"], "scheduled");
    assert_eq!(payment["reminders"].as_array().unwrap().len(), 1);
    let payment_id = payment["id"].as_str().unwrap().to_string();

    economiza(&config)
        .args(["bill", "pay", bill_id.as_str(), "--date", "2025-01-09"])
        .assert()
        .success()
        .stdout(predicate::str::contains("paid"));

    let listed = json_output(economiza(&config).args(["bill", "list", "--status", "paid", "--json"]));
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let reconciled = json_output(economiza(&config).args(["bill", "reconcile", payment_id.as_str(), "--json"]));
    assert_eq!(reconciled["matched"], true);

    economiza(&config)
        .args(["bill", "reject", bill_id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot reject a bill that is paid"));

    economiza(&config)
        .args(["bill", "delete", bill_id.as_str()])
        .assert()
        .success();
    economiza(&config)
        .args(["bill", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No bills found"));
}

#[test]
fn test_installments_and_overdue() {
    let (_dir, config) = setup();

    let created = json_output(economiza(&config).args([
        "bill", "create", "--amount", "100", "--due", "2025-01-31", "--installments", "3",
        "--json",
    ]));
    let amounts: Vec<&str> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["amount"].as_str().unwrap())
        .collect();
    assert_eq!(amounts, vec!["33.33", "33.33", "33.34"]);

    let overdue = json_output(economiza(&config).args(["bill", "overdue", "--today", "2025-03-01", "--json"]));
    assert_eq!(overdue["overdue"], 2);
}

#[test]
fn test_upload_rejects_text_documents() {
    let (dir, config) = setup();
    let input = dir.path().join("boleto.txt");
    fs::write(&input, BOLETO_TEXT).unwrap();

    economiza(&config)
        .args(["bill", "upload"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an image or PDF"));
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("economiza.json");

    economiza(&config)
        .args(["config", "init"])
        .assert()
        .success();
    economiza(&config)
        .args(["config", "set", "ai.timeout_secs", "40"])
        .assert()
        .success();
    economiza(&config)
        .args(["config", "get", "ai.timeout_secs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("40"));
    economiza(&config)
        .args(["config", "get", "extraction.nope"])
        .assert()
        .failure();
}
