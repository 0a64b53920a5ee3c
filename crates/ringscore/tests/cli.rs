use assert_cmd::Command;
use predicates::prelude::*;
use ringscore::RingscoreConfig;

fn ringscore() -> Command {
    Command::cargo_bin("ringscore").expect("binary")
}

#[test]
fn score_prints_ring_and_angle() {
    ringscore()
        .args(["score", "--x", "300", "--y", "250", "--calibration", "uniform"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ring 8 angle 0"));

    ringscore()
        .args(["score", "--x", "0", "--y", "0", "--calibration", "uniform"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ring 0"));
}

#[test]
fn unknown_preset_is_rejected() {
    ringscore()
        .args(["score", "--x", "1", "--y", "1", "--calibration", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn print_marker_writes_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("m0.png");
    ringscore()
        .args(["print-marker", "--id", "0", "--cell-px", "12", "--out"])
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).expect("png").to_luma8();
    // 4x4 payload, black border and one quiet cell on each side.
    assert_eq!(img.dimensions(), (96, 96));
    assert_eq!(img.get_pixel(0, 0)[0], 255);
    assert_eq!(img.get_pixel(12, 12)[0], 0);
}

#[test]
fn print_marker_rejects_unknown_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    ringscore()
        .args(["print-marker", "--id", "50", "--out"])
        .arg(dir.path().join("m.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("marker 50"));
}

#[test]
fn write_config_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("ringscore.json");
    ringscore()
        .args(["write-config", "--out"])
        .arg(&out)
        .assert()
        .success();

    let loaded = RingscoreConfig::load_json(&out).expect("config");
    assert_eq!(loaded, RingscoreConfig::default());
}

#[test]
fn offline_run_without_report_writes_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("frames dir");
    for k in 0..3 {
        image::RgbImage::from_pixel(64, 48, image::Rgb([90, 90, 90]))
            .save(frames.join(format!("{k:03}.png")))
            .expect("frame");
    }
    let config = dir.path().join("config.json");
    // Point the service at a closed port so seeding fails fast.
    std::fs::write(
        &config,
        r#"{"service": {"base_url": "http://127.0.0.1:9", "timeout_ms": 500}}"#,
    )
    .expect("config");
    let summary = dir.path().join("summary.json");

    ringscore()
        .args(["run", "--no-report", "--interval-ms", "0", "--config"])
        .arg(&config)
        .arg("--frames")
        .arg(&frames)
        .arg("--summary")
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::contains("total 0"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).expect("summary")).expect("json");
    assert_eq!(json["frames_read"], 3);
    assert_eq!(json["cycles_processed"], 3);
    assert_eq!(json["cycles_rectified"], 0);
    assert_eq!(json["stop_reason"], "source_exhausted");
}
