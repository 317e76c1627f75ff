use std::process::ExitCode;

use clap::Parser;
use rasterfe::cli::{run, CliArgs};

fn args(list: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("rasterfe").chain(list.iter().copied())).unwrap()
}

#[test]
fn two_layer_script_exports_png() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("scene.txt");
    let out = dir.path().join("scene.png");
    let cfg = dir.path().join("settings.cfg");
    std::fs::write(&cfg, "canvas_width=40\ncanvas_height=20\nbackground=#0000ff\n").unwrap();
    std::fs::write(
        &script,
        "# blue background, half-transparent red layer on top\n\
         layer red\n\
         color #ff0000\n\
         fill 0 0\n\
         opacity 1 0.5\n",
    )
    .unwrap();

    let code = run(args(&[
        "--script",
        script.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--settings",
        cfg.to_str().unwrap(),
    ]));
    assert_eq!(code, ExitCode::SUCCESS);

    let img = image::open(&out).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), (40, 20));
    assert_eq!(img.get_pixel(10, 10).0, [128, 0, 128, 255]);
}

#[test]
fn scaled_jpeg_export() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("s.txt");
    let out = dir.path().join("s.jpg");
    let cfg = dir.path().join("missing.cfg");
    std::fs::write(&script, "size 3\nline 0 0 40 40\n").unwrap();

    let code = run(args(&[
        "-s",
        script.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--width",
        "40",
        "--height",
        "30",
        "--scale",
        "50",
        "-q",
        "75",
        "--settings",
        cfg.to_str().unwrap(),
    ]));
    assert_eq!(code, ExitCode::SUCCESS);
    let img = image::open(&out).unwrap();
    assert_eq!((img.width(), img.height()), (20, 15));
}

#[test]
fn bad_script_line_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.txt");
    let out = dir.path().join("bad.png");
    let cfg = dir.path().join("missing.cfg");
    std::fs::write(&script, "clear\nrect 1 2 3\n").unwrap();

    let code = run(args(&[
        "-s",
        script.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--settings",
        cfg.to_str().unwrap(),
    ]));
    assert_eq!(code, ExitCode::FAILURE);
    assert!(!out.exists());
}

#[test]
fn missing_script_fails() {
    let dir = tempfile::tempdir().unwrap();
    let code = run(args(&["-s", dir.path().join("nope.txt").to_str().unwrap()]));
    assert_eq!(code, ExitCode::FAILURE);
}
