use std::path::Path;

use arcalib::session::CalibrationResult;
use arcalib::vision::synthetic::{synthetic_views, SyntheticCamera};
use arcalib::vision::{dictionary, MarkerSidecar};
use assert_cmd::Command;
use image::RgbImage;
use nalgebra::Point2;
use predicates::prelude::*;
use tempfile::tempdir;

fn arcalib() -> Command {
    Command::cargo_bin("arcalib").expect("binary")
}

/// Blank frames, each with a sidecar of one synthetic 9x6 view rounded to
/// 0.01 px.
fn write_marker_frames(dir: &Path, count: usize) {
    let camera = SyntheticCamera::default();
    let input = synthetic_views(&camera, 9, 6, 25.0, count);
    let ids: Vec<u32> = (0..54).collect();
    for (i, view) in input.image_points.iter().enumerate() {
        let frame = dir.join(format!("frame_{i:03}.png"));
        RgbImage::new(camera.frame_size.width, camera.frame_size.height)
            .save(&frame)
            .expect("save frame");
        let rounded: Vec<Point2<f64>> = view
            .iter()
            .map(|p| Point2::new((p.x * 100.0).round() / 100.0, (p.y * 100.0).round() / 100.0))
            .collect();
        MarkerSidecar::from_points(&ids, &rounded)
            .write(frame.with_extension("json"))
            .expect("write sidecar");
    }
}

#[test]
fn unknown_subcommand_fails_with_usage() {
    arcalib()
        .arg("calibrate-everything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn generate_writes_a_png() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("boards/board.png");
    arcalib()
        .args(["generate", "chessboard", "--square-px", "20", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("9x6 inner corners"));

    let img = image::open(&out).expect("png").to_luma8();
    // 10x7 squares of 20 px plus a 40 px margin on each side.
    assert_eq!(img.dimensions(), (280, 220));
}

#[test]
fn video_accumulates_calibrates_and_persists() {
    let dir = tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    write_marker_frames(&frames, 8);
    let output = dir.path().join("calib.json");

    arcalib()
        .args(["video", "--sidecars", "--blocking", "--keys", "ssssscq", "--frames"])
        .arg(&frames)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("5 samples"))
        .stdout(predicate::str::contains("Quit"));

    let result = CalibrationResult::load_json(&output).expect("calibration file");
    assert_eq!(result.sample_count(), 5);
    assert!(result.reprojection_error() > 0.0 && result.reprojection_error() < 0.1);
    let k = result.intrinsics();
    assert!((k.fx - 800.0).abs() < 4.0, "fx {}", k.fx);
    assert!((k.fy - 800.0).abs() < 4.0, "fy {}", k.fy);

    // A later run starts calibrated from the file.
    arcalib()
        .args(["video", "--sidecars", "--keys", "q", "--frames"])
        .arg(&frames)
        .arg("--load")
        .arg(&output)
        .arg("--output")
        .arg(dir.path().join("unused.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("fx"))
        .stdout(predicate::str::contains("1 pose overlays"));
}

#[test]
fn too_few_samples_leave_no_file() {
    let dir = tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    write_marker_frames(&frames, 4);
    let output = dir.path().join("calib.json");

    arcalib()
        .args(["video", "--sidecars", "--keys", "sssc", "--frames"])
        .arg(&frames)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 samples"));
    assert!(!output.exists());
}

#[test]
fn missing_frames_directory_exits_with_status_1() {
    let dir = tempdir().expect("tempdir");
    arcalib()
        .args(["chessboard", "--keys", "q", "--frames"])
        .arg(dir.path().join("no-such-dir"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: frame source unavailable"));
}

#[test]
fn corners_runs_over_frames() {
    let dir = tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    arcalib()
        .args(["generate", "chessboard", "--cols", "4", "--rows", "3", "--square-px", "20", "--output"])
        .arg(frames.join("board.png"))
        .assert()
        .success();
    let marked = dir.path().join("marked");

    arcalib()
        .args(["corners", "--keys", ".", "--frames"])
        .arg(&frames)
        .arg("--save-dir")
        .arg(&marked)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 frames"));
    assert!(marked.join("frame_00000.png").exists());
}

#[test]
fn generate_marker_writes_the_default_marker() {
    let dir = tempdir().expect("tempdir");
    arcalib()
        .current_dir(dir.path())
        .args(["generate", "marker"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DICT_6X6_250 marker 23"));

    let img = image::open(dir.path().join("aruco_marker_23.png"))
        .expect("png")
        .to_luma8();
    assert_eq!(img.dimensions(), (200, 200));
    // 6x6 bits inside a one-cell border: 8 cells of 25 px.
    let dict = dictionary("DICT_6X6_250").expect("dict");
    let mut code = 0u64;
    for cy in 0..8u32 {
        for cx in 0..8u32 {
            let black = img.get_pixel(cx * 25 + 12, cy * 25 + 12)[0] < 128;
            if cx == 0 || cy == 0 || cx == 7 || cy == 7 {
                assert!(black, "border cell ({cx}, {cy})");
            } else if black {
                code |= 1 << ((cy - 1) * 6 + (cx - 1));
            }
        }
    }
    assert_eq!(code, dict.codes[23]);
}

#[test]
fn video_decodes_a_charuco_board() {
    let dir = tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    arcalib()
        .args(["generate", "charuco", "--square-px", "60", "--output"])
        .arg(frames.join("board.png"))
        .assert()
        .success()
        .stdout(predicate::str::contains("9x6 inner corners"));
    let samples = dir.path().join("samples");

    arcalib()
        .args(["video", "--keys", "sq", "--frames"])
        .arg(&frames)
        .arg("--sample-dir")
        .arg(&samples)
        .arg("--output")
        .arg(dir.path().join("calib.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 samples, 0 rejected"));
    assert!(samples.join("sample_001.png").exists());
}

#[test]
fn unknown_dictionary_is_reported() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("live.json");
    std::fs::write(&config, r#"{ "charuco": { "dictionary": "DICT_NOPE" } }"#).expect("write");
    arcalib()
        .args(["video", "--keys", "q", "--frames"])
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown marker dictionary DICT_NOPE"));
}
