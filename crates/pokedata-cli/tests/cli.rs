use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `pokedata` isolated from the user's config, API key and OCR models.
fn pokedata(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pokedata").unwrap();
    cmd.current_dir(home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home)
        .env("CLICOLOR", "0")
        .env_remove("POKEDATA_OPENAI_API_KEY")
        .env_remove("POKEDATA_OPENAI_MODEL")
        .env_remove("POKEDATA_REMOTE_OCR");
    cmd
}

fn write_card(path: &Path) {
    image::RgbImage::from_pixel(120, 168, image::Rgb([250, 250, 250]))
        .save(path)
        .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    pokedata(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_process_missing_file() {
    let home = TempDir::new().unwrap();
    pokedata(home.path())
        .args(["process", "nope.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_process_undecodable_image() {
    let home = TempDir::new().unwrap();
    let card = home.path().join("card.png");
    std::fs::write(&card, b"definitely not a png").unwrap();

    pokedata(home.path())
        .args(["process", "--no-remote", "--model-dir", "missing-models"])
        .arg(&card)
        .assert()
        .failure()
        .stderr(predicate::str::contains("undecodable image"));
}

#[test]
fn test_process_without_any_extractor_still_emits_record() {
    let home = TempDir::new().unwrap();
    let card = home.path().join("card.png");
    write_card(&card);

    pokedata(home.path())
        .args(["process", "--no-remote", "--model-dir", "missing-models"])
        .arg(&card)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"classification\": \"unknown\""))
        .stdout(predicate::str::contains("remote_unavailable:disabled"))
        .stdout(predicate::str::contains("local_ocr_unavailable"))
        .stdout(predicate::str::contains("missing_required:card_number"));
}

#[test]
fn test_missing_api_key_falls_back() {
    let home = TempDir::new().unwrap();
    let card = home.path().join("card.png");
    write_card(&card);

    pokedata(home.path())
        .args(["process", "--format", "csv", "--model-dir", "missing-models"])
        .arg(&card)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("name,stage,evolves_from,hp"))
        .stdout(predicate::str::contains("remote_unavailable:service_error"));
}

#[test]
fn test_remote_env_switch() {
    let home = TempDir::new().unwrap();
    let card = home.path().join("card.png");
    write_card(&card);

    pokedata(home.path())
        .env("POKEDATA_REMOTE_OCR", "0")
        .args(["process", "--format", "text", "--model-dir", "missing-models"])
        .arg(&card)
        .assert()
        .success()
        .stdout(predicate::str::contains("remote_unavailable:disabled"));
}

#[test]
fn test_batch_continues_past_bad_cards() {
    let home = TempDir::new().unwrap();
    let cards = home.path().join("cards");
    std::fs::create_dir(&cards).unwrap();
    write_card(&cards.join("a_good.png"));
    std::fs::write(cards.join("b_bad.png"), b"garbage").unwrap();
    let out = home.path().join("out");

    pokedata(home.path())
        .args(["batch", "--summary", "--no-remote", "--model-dir", "missing-models"])
        .arg(cards.join("*.png").to_str().unwrap())
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful, 1 failed"));

    assert!(out.join("a_good.json").exists());
    assert!(!out.join("b_bad.json").exists());

    let summary = std::fs::read_to_string(out.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("filename,status,processed_at"));
    assert!(lines[1].starts_with("a_good.png,success"));
    assert!(lines[2].starts_with("b_bad.png,error"));
}

#[test]
fn test_batch_keeps_same_named_cards_apart() {
    let home = TempDir::new().unwrap();
    let cards = home.path().join("cards");
    for set in ["base", "jungle"] {
        std::fs::create_dir_all(cards.join(set)).unwrap();
        write_card(&cards.join(set).join("card.png"));
    }
    let out = home.path().join("out");

    pokedata(home.path())
        .args(["batch", "--no-remote", "--model-dir", "missing-models"])
        .arg(cards.join("*").join("*.png").to_str().unwrap())
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful, 0 failed"));

    assert!(out.join("card.json").exists());
    assert!(out.join("card_2.json").exists());
}

#[test]
fn test_config_round_trip() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("pokedata.json");

    pokedata(home.path())
        .args(["--config"])
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    pokedata(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "remote.confidence_threshold", "0.85"])
        .assert()
        .success();

    pokedata(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "remote.confidence_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.85"));

    pokedata(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "remote.confidence_threshold", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 1"));

    pokedata(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "remote.nonexistent"])
        .assert()
        .failure();
}

#[test]
fn test_config_path_uses_platform_dir() {
    let home = TempDir::new().unwrap();
    pokedata(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pokedata"))
        .stdout(predicate::str::contains("not created"));
}
