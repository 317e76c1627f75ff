// ============================================================================
// RasterFE CLI — replay an edit script and export the composite
// ============================================================================
//
// Usage examples:
//   rasterfe --script scene.txt --output scene.png
//   rasterfe -s scene.txt -o thumb.jpg --scale 25 --quality 80
//   rasterfe -s scene.txt --width 1024 --height 768 --settings my.cfg -v

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::colors::BLACK;
use crate::document::Document;
use crate::io::{export_to_file, ExportFormat, ExportOptions};
use crate::ops::scripting::{parse_script, run_script, Pen};
use crate::settings::Settings;
use crate::{log_err, log_info};

/// RasterFE headless editor.
///
/// Builds an image from a line-oriented edit script and writes the flattened
/// result as PNG or JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "rasterfe",
    about = "RasterFE headless raster editor",
    long_about = "Replay an edit script (layers, strokes, shapes, fills, undo/redo)\n\
                  against a fresh document and export the composite.\n\n\
                  Example:\n  \
                  rasterfe --script scene.txt --output scene.png"
)]
pub struct CliArgs {
    /// Edit script to replay, one command per line.
    #[arg(short, long, value_name = "FILE")]
    pub script: PathBuf,

    /// Output image (.png, .jpg, .jpeg).  Defaults to the script name with .png.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Canvas width, overriding the settings file.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: Option<u32>,

    /// Canvas height, overriding the settings file.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: Option<u32>,

    /// Export scale in percent (10–200).
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(10..=200))]
    pub scale: u32,

    /// JPEG quality (10–100).  Defaults to the settings value.
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(10..=100))]
    pub quality: Option<u8>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Echo log output to stderr and print timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(p) => p.clone(),
            None => self.script.with_extension(ExportFormat::Png.extension()),
        }
    }
}

/// Run the script and export.  `0` on success, `1` on any failure.
pub fn run(args: CliArgs) -> ExitCode {
    if args.verbose {
        crate::logger::set_echo(true);
    }
    match run_inner(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<(), String> {
    let start = Instant::now();

    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    if let Some(w) = args.width {
        settings.canvas_width = w;
    }
    if let Some(h) = args.height {
        settings.canvas_height = h;
    }

    // Resolve the output format before doing any work
    let output = args.output_path();
    let format = ExportFormat::from_path(&output).map_err(|e| e.to_string())?;

    let source = std::fs::read_to_string(&args.script)
        .map_err(|e| format!("could not read script '{}': {}", args.script.display(), e))?;
    let lines = parse_script(&source).map_err(|e| format!("{}: {}", args.script.display(), e))?;

    let mut doc = Document::with_settings(&settings).map_err(|e| e.to_string())?;
    let mut pen = Pen::new(settings.brush_style(BLACK));
    let report = run_script(&mut doc, &lines, &mut pen)
        .map_err(|e| format!("{}: {}", args.script.display(), e))?;

    let options = ExportOptions {
        quality: args.quality.unwrap_or(settings.export_quality),
        scale_percent: args.scale,
        matte: settings.background,
        ..ExportOptions::new(format)
    };
    export_to_file(&doc.export_composite(), &output, &options)
        .map_err(|e| format!("could not write '{}': {}", output.display(), e))?;

    log_info!(
        "Wrote {} ({} command(s), {} layer(s)) in {:.1?}",
        output.display(),
        report.executed,
        doc.layer_count(),
        start.elapsed()
    );
    if args.verbose {
        println!(
            "{} -> {} in {:.1?}",
            args.script.display(),
            output.display(),
            start.elapsed()
        );
    }
    Ok(())
}
