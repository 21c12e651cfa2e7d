#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::Command;

use mmwave::frame::{FrameHeader, FrameWriter, SphericalPoint, TlvRecord};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/mmwave-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_capture(path: &PathBuf) {
    let mut writer = FrameWriter::new(Vec::new());
    writer.write_raw(b"\x00\xffboot noise").unwrap();
    for frame_number in 1..=3u32 {
        let header = FrameHeader {
            frame_number,
            ..FrameHeader::default()
        };
        let points = TlvRecord::DynamicPoints(vec![SphericalPoint {
            range: frame_number as f32,
            angle: 0.0,
            elev: 0.0,
            doppler: 0.5,
        }]);
        writer.write_frame(&header, &[points]).unwrap();
    }
    std::fs::write(path, writer.into_inner()).expect("capture should be writable");
}

fn mmwave() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mmwave"));
    cmd.args(["--log-level", "error"]);
    cmd
}

#[test]
fn decode_prints_one_json_line_per_frame() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("run.bin");
    write_capture(&capture);

    let output = mmwave()
        .args(["--format", "json", "decode"])
        .arg(&capture)
        .output()
        .expect("mmwave should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let frames: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();

    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame["header"]["frame_number"], (i + 1) as u64);
        assert_eq!(frame["dynamic_points"][0]["target_id"], 255);
        assert!(frame.get("freq_hz").is_none());
    }

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn decode_honours_count() {
    let dir = unique_temp_dir("decode-count");
    let capture = dir.join("run.bin");
    write_capture(&capture);

    let output = mmwave()
        .args(["--format", "pretty", "decode", "--count", "2"])
        .arg(&capture)
        .output()
        .expect("mmwave should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.starts_with("frame=1 "));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn decode_missing_capture_fails() {
    let output = mmwave()
        .args(["decode", "/tmp/mmwave-no-such-capture.bin"])
        .output()
        .expect("mmwave should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"));
}

#[test]
fn version_prints_package_version() {
    let output = mmwave().arg("version").output().expect("mmwave should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), format!("mmwave {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn stream_rejects_non_cfg_script() {
    let dir = unique_temp_dir("stream-cfg");
    let script = dir.join("profile.txt");
    std::fs::write(&script, "sensorStart\n").unwrap();

    let output = mmwave()
        .args([
            "stream",
            "--config-port",
            "/dev/null-config",
            "--data-port",
            "/dev/null-data",
            "--cfg",
        ])
        .arg(&script)
        .output()
        .expect("mmwave should run");

    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(dir);
}
