use std::fs;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn gradeview(dir: &TempDir) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gradeview"));
    command
        .env("GRADEVIEW_CONFIG_DIR", dir.path().join("config"))
        .env_remove("GRADEVIEW_CONFIG")
        .env("RUST_LOG", "warn");
    command
}

fn write_input(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("input.png");
    RgbaImage::from_fn(8, 4, |x, y| Rgba([(x * 30) as u8, (y * 60) as u8, 90, 255]))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn software_render_without_config_is_identity() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir);
    let output = dir.path().join("out/graded.png");

    let status = gradeview(&dir)
        .args(["render", "--software", "-o"])
        .arg(&output)
        .arg(&input)
        .status()
        .expect("failed to run gradeview render");
    assert!(status.success());

    let original = image::open(&input).unwrap().into_rgba8();
    let graded = image::open(&output).unwrap().into_rgba8();
    assert_eq!(graded, original);
}

#[test]
fn software_render_applies_configured_look() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir);
    let output = dir.path().join("mono.png");
    let config = dir.path().join("looks.toml");
    fs::write(
        &config,
        r#"
version = 1
[looks.mono]
saturation = 0.0
"#,
    )
    .unwrap();

    let status = gradeview(&dir)
        .arg("--config")
        .arg(&config)
        .args(["render", "--software", "--look", "mono", "--size", "4x2", "-o"])
        .arg(&output)
        .arg(&input)
        .status()
        .expect("failed to run gradeview render");
    assert!(status.success());

    let graded = image::open(&output).unwrap().into_rgba8();
    assert_eq!(graded.dimensions(), (4, 2));
    for pixel in graded.pixels() {
        let [r, g, b, a] = pixel.0;
        assert!(r == g && g == b, "expected gray, got {:?}", pixel.0);
        assert_eq!(a, 255);
    }
}

#[test]
fn unknown_look_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir);
    let output = dir.path().join("never.png");

    let result = gradeview(&dir)
        .args(["render", "--software", "--look", "missing", "-o"])
        .arg(&output)
        .arg(&input)
        .output()
        .expect("failed to run gradeview render");
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn looks_json_lists_configured_looks() {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("gradeview.toml"),
        r#"
version = 1
[defaults]
look = "warm"
[looks.warm]
temperature = 30
"#,
    )
    .unwrap();

    let result = gradeview(&dir)
        .args(["looks", "--json"])
        .output()
        .expect("failed to run gradeview looks");
    assert!(result.status.success());
    let looks: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(looks[0]["name"], "warm");
    assert_eq!(looks[0]["temperature"], 30.0);
}
