mod common;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use image::{Rgba, RgbaImage};
use mathcanvas::cli::{CliArgs, run_with_service};
use mathcanvas::io::{load_image_sync, write_png};
use mathcanvas::service::RecognitionResult;

use common::FakeService;

/// Fresh scratch directory under the system temp dir.
fn scratch() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mathcanvas-cli-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 30x20 transparent drawing with a white 5x3 block at (10, 4).
fn drawing(dir: &Path, name: &str) -> PathBuf {
    let mut img = RgbaImage::from_pixel(30, 20, Rgba([0, 0, 0, 0]));
    for y in 4..7 {
        for x in 10..15 {
            img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    let path = dir.join(name);
    write_png(&img, &path).unwrap();
    path
}

fn args(extra: &[&str]) -> CliArgs {
    CliArgs::parse_from(std::iter::once("MathCanvas").chain(extra.iter().copied()))
}

#[test]
fn assignments_carry_into_the_next_file() {
    let dir = scratch();
    let a = drawing(&dir, "a.png");
    let b = drawing(&dir, "b.png");
    let service = FakeService::answering(vec![RecognitionResult::new("x", "4", true)]);

    let cli = args(&["-i", a.to_str().unwrap(), b.to_str().unwrap(), "--var", "k=1"]);
    assert_eq!(run_with_service(&cli, &service), ExitCode::SUCCESS);

    let sent = service.requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].symbol_values.get("k").map(String::as_str), Some("1"));
    assert!(!sent[0].symbol_values.contains_key("x"));
    assert_eq!(sent[1].symbol_values.get("x").map(String::as_str), Some("4"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn generate_writes_next_to_the_input() {
    let dir = scratch();
    let input = drawing(&dir, "sketch.png");
    let service = FakeService::answering(Vec::new());

    let cli = args(&["-i", input.to_str().unwrap(), "--generate"]);
    assert_eq!(run_with_service(&cli, &service), ExitCode::SUCCESS);

    let written = load_image_sync(&dir.join("sketch_generated.png")).unwrap();
    assert_eq!(written.dimensions(), (4, 4));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn crop_is_saved_while_the_full_image_is_sent() {
    let dir = scratch();
    let input = drawing(&dir, "sum.png");
    let crop = dir.join("crop.png");
    let service = FakeService::answering(vec![RecognitionResult::new("1+1", "2", false)]);

    let cli = args(&["-i", input.to_str().unwrap(), "--save-crop", crop.to_str().unwrap()]);
    assert_eq!(run_with_service(&cli, &service), ExitCode::SUCCESS);

    assert_eq!(load_image_sync(&crop).unwrap().dimensions(), (5, 3));
    let sent = mathcanvas::io::decode_image_payload(&service.requests()[0].image).unwrap();
    assert_eq!(sent.dimensions(), (30, 20));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn service_failure_is_a_failing_exit() {
    let dir = scratch();
    let input = drawing(&dir, "a.png");

    let cli = args(&["-i", input.to_str().unwrap()]);
    assert_eq!(run_with_service(&cli, &FakeService::failing()), ExitCode::FAILURE);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unmatched_pattern_is_a_failing_exit() {
    let dir = scratch();
    let pattern = dir.join("*.png");

    let cli = args(&["-i", pattern.to_str().unwrap()]);
    assert_eq!(run_with_service(&cli, &FakeService::default()), ExitCode::FAILURE);

    std::fs::remove_dir_all(&dir).ok();
}
