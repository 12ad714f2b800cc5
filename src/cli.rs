// ============================================================================
// MathCanvas CLI: headless recognition via command-line arguments
// ============================================================================
//
// Usage examples:
//   MathCanvas --input sum.png                           (print solved expressions)
//   MathCanvas -i a.png b.png --var x=3                  (assignments carry across files)
//   MathCanvas -i sketch.png --generate -o result.png
//   MathCanvas -i "drawings/*.png" --generate --output-dir out/
//
// No GUI is opened in CLI mode. Each file is loaded onto its own surface and
// exported through the same session path the GUI uses.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;

use crate::canvas::PixelSurface;
use crate::components::overlays::MonotonicClock;
use crate::config::AppConfig;
use crate::io::{load_image_sync, write_png};
use crate::ops::bounds::painted_bounds;
use crate::service::{HttpRecognitionService, RecognitionService, SymbolValues};
use crate::session::CanvasSession;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MathCanvas headless solver.
///
/// Send hand-drawn expressions to the recognition service without the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "MathCanvas",
    about = "MathCanvas headless recognition client",
    long_about = "Send drawings to the recognition service and print the solved\n\
                  expressions, or request a generated image, without opening the GUI.\n\n\
                  Example:\n  \
                  MathCanvas --input sum.png --var x=3\n  \
                  MathCanvas -i sketch.png --generate --output result.png"
)]
pub struct CliArgs {
    /// Input drawing(s). Glob patterns accepted (e.g. "*.png", "shots/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Ask the generate endpoint for an image instead of solving.
    #[arg(short, long)]
    pub generate: bool,

    /// Output file for the generated image. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for generated images in batch mode.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Initial variable assignment, repeatable (NAME=VALUE).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, String)>,

    /// Recognition service base URL (overrides config and environment).
    #[arg(long, value_name = "URL")]
    pub service_url: Option<String>,

    /// Alternate config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also save the painted region of the (last) input, cropped, as PNG.
    #[arg(long, value_name = "FILE")]
    pub save_crop: Option<PathBuf>,

    /// Debug logging and per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = match HttpRecognitionService::new(&config.service_url, config.request_timeout()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    run_with_service(&args, &service)
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load_or_default(),
    };
    config.apply_overrides(AppConfig::env_service_url(), args.service_url.clone());
    Ok(config)
}

/// Process every input against `service`. Split from [`run`] so the batch
/// logic can be driven without a network.
pub fn run_with_service(args: &CliArgs, service: &dyn RecognitionService) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let mut symbols: SymbolValues = args.vars.iter().cloned().collect();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        match run_one(input_path, args, service, &mut symbols) {
            Ok(()) => {
                if args.verbose {
                    println!(
                        "  done ({:.0}ms)",
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {:#}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    args: &CliArgs,
    service: &dyn RecognitionService,
    symbols: &mut SymbolValues,
) -> Result<()> {
    // -- Step 1: Load ----------------------------------------------------
    let image = load_image_sync(input).with_context(|| format!("load failed: {}", input.display()))?;
    let surface = PixelSurface::from_rgba_image(image);

    if let Some(crop_path) = &args.save_crop {
        let bbox = painted_bounds(&surface)
            .ok_or_else(|| anyhow!("nothing painted in {}", input.display()))?;
        write_png(&surface.extract_region(&bbox), crop_path)
            .with_context(|| format!("saving crop to {}", crop_path.display()))?;
    }

    let mut session = CanvasSession::with_surface(surface, MonotonicClock::default());
    for (name, value) in symbols.iter() {
        session.set_symbol_value(name.clone(), value.clone());
    }

    // -- Step 2: Export --------------------------------------------------
    if args.generate {
        session
            .export_for_generation(service)
            .map_err(|e| anyhow!(e.user_message()))?;
        let generated = session
            .generated_image()
            .ok_or_else(|| anyhow!("service returned no image"))?;
        let output = build_output_path(input, args.output.as_deref(), args.output_dir.as_deref())
            .ok_or_else(|| anyhow!("cannot determine output path for '{}'", input.display()))?;
        write_png(&generated.image, &output)
            .with_context(|| format!("save failed: {}", output.display()))?;
        println!("  → {}", output.display());
        return Ok(());
    }

    let results = session
        .export_for_recognition(service)
        .map_err(|e| anyhow!(e.user_message()))?;
    if results.is_empty() {
        bail!("no expressions recognised");
    }
    let (ax, ay) = session.anchor();
    for r in &results {
        let marker = if r.is_assignment { " (assigned)" } else { "" };
        println!("  {} = {}{}", r.expression, r.result, marker);
    }
    if args.verbose {
        println!("  anchor: ({:.1}, {:.1})", ax, ay);
    }

    // -- Step 3: Carry assignments into the next file ---------------------
    symbols.extend(
        session
            .symbol_values()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into an ordered list, keeping the
/// first occurrence of any file named twice.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    patterns
        .iter()
        .flat_map(|pattern| expand_pattern(pattern))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// A path that exists is taken literally; anything else goes through `glob`.
fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let literal = PathBuf::from(pattern);
    if literal.exists() {
        return vec![literal];
    }
    let matched: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.flatten().collect(),
        Err(e) => {
            tracing::warn!("invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    if matched.is_empty() {
        tracing::warn!("pattern '{}' matched no files", pattern);
    }
    matched
}

/// Compute where a generated image is written.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` (derives filename from input stem)
/// 3. Next to the input as `<stem>_generated.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_generated.png", stem)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_flag_parses_name_and_value() {
        assert_eq!(parse_assignment("x=5"), Ok(("x".to_string(), "5".to_string())));
        assert_eq!(parse_assignment(" y = 2+3 "), Ok(("y".to_string(), "2+3".to_string())));
        assert!(parse_assignment("=5").is_err());
        assert!(parse_assignment("novalue").is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("drawings/sum.png");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/sum.png"))
        );
        assert_eq!(
            build_output_path(input, None, None),
            Some(PathBuf::from("drawings/sum_generated.png"))
        );
    }

    #[test]
    fn inputs_named_twice_are_kept_once_in_order() {
        let dir = std::env::temp_dir().join(format!("mathcanvas-inputs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["a.png", "b.png"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let a = dir.join("a.png");
        let b = dir.join("b.png");
        let pattern = dir.join("*.png");

        let resolved = resolve_inputs(&[
            b.to_string_lossy().into_owned(),
            pattern.to_string_lossy().into_owned(),
            a.to_string_lossy().into_owned(),
        ]);
        assert_eq!(resolved, [b, a]);
        assert!(resolve_inputs(&[dir.join("*.bmp").to_string_lossy().into_owned()]).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cli_mode_args_parse() {
        let args = CliArgs::parse_from([
            "MathCanvas", "-i", "a.png", "b.png", "--var", "x=1", "--generate", "--output-dir", "out",
        ]);
        assert_eq!(args.input, ["a.png", "b.png"]);
        assert_eq!(args.vars, [("x".to_string(), "1".to_string())]);
        assert!(args.generate);
    }
}
