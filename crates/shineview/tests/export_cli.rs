use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn write_card(path: &Path, rgba: [u8; 4]) {
    image::RgbaImage::from_pixel(8, 6, image::Rgba(rgba))
        .save(path)
        .unwrap();
}

fn write_scene(dir: &Path, body: &str) -> std::path::PathBuf {
    write_card(&dir.join("card.png"), [40, 90, 160, 255]);
    write_card(&dir.join("mask.png"), [255, 255, 255, 255]);
    let config = dir.join("scene.toml");
    fs::write(
        &config,
        format!("version = 1\nimage = \"card.png\"\nmask = \"mask.png\"\n{body}"),
    )
    .unwrap();
    config
}

#[test]
fn export_writes_png_at_image_size() {
    let dir = TempDir::new().unwrap();
    let config = write_scene(
        dir.path(),
        r#"
[[effects]]
name = "holo"

[[effects]]
name = "reverseHolo"

[effects.options]
glowPower = 0.8
"#,
    );
    let output = dir.path().join("out.png");

    let status = Command::new(env!("CARGO_BIN_EXE_shineview"))
        .arg("export")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .args(["--light", "0.2,-0.4"])
        .status()
        .expect("failed to run shineview export");
    assert!(status.success());

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (8, 6));
}

#[test]
fn export_honours_size_override() {
    let dir = TempDir::new().unwrap();
    let config = write_scene(dir.path(), "size = [20, 10]\n");
    let output = dir.path().join("sized.png");

    let status = Command::new(env!("CARGO_BIN_EXE_shineview"))
        .arg("export")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .args(["--size", "12x4"])
        .status()
        .unwrap();
    assert!(status.success());

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (12, 4));
    // No effects: the base image comes back unchanged.
    assert!(image.pixels().all(|pixel| pixel.0 == [40, 90, 160, 255]));
}

#[test]
fn export_rejects_unknown_effects() {
    let dir = TempDir::new().unwrap();
    let config = write_scene(dir.path(), "[[effects]]\nname = \"sparkle\"\n");
    let output = dir.path().join("never.png");

    let result = Command::new(env!("CARGO_BIN_EXE_shineview"))
        .arg("export")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("sparkle"));
    assert!(!output.exists());
}

#[test]
fn effects_catalog_is_json() {
    let result = Command::new(env!("CARGO_BIN_EXE_shineview"))
        .args(["effects", "--json"])
        .output()
        .unwrap();
    assert!(result.status.success());

    let catalog: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    let names: Vec<_> = catalog
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["glare", "reverseHolo", "holo", "doubleHolo", "glareFlare"]);
}
