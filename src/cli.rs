// ============================================================================
// PostCreator CLI: headless post rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   postcreator --text "hello world" --output post.png
//   postcreator -t "Sale today" -p beach.jpg --overlay-name Gradient -o sale.png
//   postcreator --text-file quote.txt -p shots/*.jpg --output-dir posts/ --unique-name
//   postcreator -t "big" --font-size 96 --padding 0.1 --shadow "#000000aa,12,0,4"
//
// No window is opened in CLI mode. Defaults come from the saved settings file;
// every flag overrides the matching setting for this run only.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgba;

use postcreator::assets::AppSettings;
use postcreator::compositor::Compositor;
use postcreator::editor::{
    EditorState, RasterImage, SelectedOverlay, ShadowStyle, TextStyle, normalize_line_breaks,
    parse_font_size, parse_hex_color, parse_line_height, parse_padding_ratio, parse_shadow,
};
use postcreator::io::{ExportName, export_png, load_image_sync};
use postcreator::ops::text::resolve_font;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PostCreator headless renderer.
///
/// Composite a photo, an optional overlay and wrapped text into a 1080×1350 PNG.
#[derive(Parser, Debug)]
#[command(
    name = "postcreator",
    about = "PostCreator headless post renderer",
    long_about = "Render 1080x1350 posts without opening the GUI: a cover-fitted\n\
                  photo (or flat background), an optional overlay, and centred,\n\
                  word-wrapped text.\n\n\
                  Example:\n  \
                  postcreator --text \"hello world\" --photo beach.jpg --output post.png\n  \
                  postcreator -t \"quote\" -p shots/*.jpg --output-dir posts/"
)]
pub struct CliArgs {
    /// Text to draw. Use "\n" inside a quoted argument for explicit line breaks.
    #[arg(short, long, conflicts_with = "text_file")]
    pub text: Option<String>,

    /// Read the text from a UTF-8 file instead of --text.
    #[arg(long, value_name = "FILE")]
    pub text_file: Option<PathBuf>,

    /// Background photo(s). Glob patterns accepted; one post is rendered per photo.
    #[arg(short, long, num_args = 1..)]
    pub photo: Vec<String>,

    /// Overlay image file drawn above the photo.
    #[arg(long, value_name = "FILE", conflicts_with = "overlay_name")]
    pub overlay: Option<PathBuf>,

    /// Overlay picked by name from the configured overlay catalog.
    #[arg(long, value_name = "NAME")]
    pub overlay_name: Option<String>,

    /// Font size in pixels (> 0).
    #[arg(long, value_name = "PX", value_parser = parse_font_size)]
    pub font_size: Option<f32>,

    /// Side padding as a fraction of the frame width (clamped to 0–1).
    #[arg(long, value_name = "RATIO", value_parser = parse_padding_ratio)]
    pub padding: Option<f32>,

    /// Line height as a multiple of the font size.
    #[arg(long, value_name = "MULT", value_parser = parse_line_height)]
    pub line_height: Option<f32>,

    /// Text color, e.g. #ffffff.
    #[arg(long, value_name = "HEX", value_parser = parse_hex_color)]
    pub color: Option<Rgba<u8>>,

    /// Background color used when no photo is given.
    #[arg(long, value_name = "HEX", value_parser = parse_hex_color)]
    pub background: Option<Rgba<u8>>,

    /// Drop shadow as COLOR,BLUR,DX,DY (e.g. "#00000099,8,2,2").
    #[arg(long, value_name = "SHADOW", value_parser = parse_shadow, conflicts_with = "no_shadow")]
    pub shadow: Option<ShadowStyle>,

    /// Disable the drop shadow.
    #[arg(long)]
    pub no_shadow: bool,

    /// TrueType/OpenType font file.
    #[arg(long, value_name = "FONT.ttf")]
    pub font: Option<PathBuf>,

    /// System font family (used when --font is absent or fails to load).
    #[arg(long, value_name = "FAMILY")]
    pub font_family: Option<String>,

    /// Output file path. Only valid for a single post.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch rendering.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Name outputs with a fresh unique token instead of the photo name / canvas.png.
    #[arg(long)]
    pub unique_name: bool,

    /// Print per-post timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().skip(1).any(|a| is_cli_flag(&a))
    }

    /// Session style: saved defaults with command-line overrides applied.
    fn text_style(&self, settings: &AppSettings) -> TextStyle {
        let mut style = settings.text_style();
        if let Some(v) = self.font_size {
            style.font_size = v;
        }
        if let Some(v) = self.padding {
            style.padding_ratio = v;
        }
        if let Some(v) = self.line_height {
            style.line_height = v;
        }
        if let Some(c) = self.color {
            style.color = c;
        }
        if let Some(c) = self.background {
            style.background = c;
        }
        if self.shadow.is_some() {
            style.shadow = self.shadow;
        }
        if self.no_shadow {
            style.shadow = None;
        }
        style
    }

    fn export_name(&self, settings: &AppSettings) -> ExportName {
        if self.unique_name {
            ExportName::Unique
        } else {
            settings.export_name
        }
    }
}

fn is_cli_flag(arg: &str) -> bool {
    matches!(
        arg,
        "-t" | "--text" | "--text-file" | "-p" | "--photo" | "-h" | "--help" | "-V" | "--version"
    ) || arg.starts_with("--text=")
        || arg.starts_with("--text-file=")
        || arg.starts_with("--photo=")
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every post was written, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = AppSettings::load();
    let style = args.text_style(&settings);
    let naming = args.export_name(&settings);

    let text = match read_text(&args) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let overlay = match load_overlay(&args, &settings) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Resolve glob patterns / literal paths → concrete PathBufs
    let photos = resolve_inputs(&args.photo);
    if !args.photo.is_empty() && photos.is_empty() {
        eprintln!("error: no photo files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if photos.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} photos given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch rendering.",
            photos.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let font = resolve_font(
        args.font.as_deref().or(settings.font_path.as_deref()),
        args.font_family.as_deref().or(Some(settings.font_family.as_str())),
    );
    if font.is_none() && !text.is_empty() {
        eprintln!("warning: no usable font found; text will not be drawn.");
    }
    let mut compositor = Compositor::new(font);

    let base = EditorState::new(style).with_text(text).with_overlay(overlay);

    // No photo: a single post on the flat background.
    let jobs: Vec<Option<&Path>> = if photos.is_empty() {
        vec![None]
    } else {
        photos.iter().map(|p| Some(p.as_path())).collect()
    };

    let total = jobs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut written: HashSet<PathBuf> = HashSet::new();

    for (idx, photo_path) in jobs.into_iter().enumerate() {
        if multi || args.verbose {
            match photo_path {
                Some(p) => println!("[{}/{}] {}", idx + 1, total, p.display()),
                None => println!("[{}/{}] (no photo)", idx + 1, total),
            }
        }

        let start = Instant::now();
        let output_path = dedupe_output_path(
            build_output_path(
                photo_path,
                args.output.as_deref(),
                args.output_dir.as_deref(),
                naming,
            ),
            &mut written,
        );

        match run_one(&mut compositor, &base, photo_path, &output_path) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-post pipeline
// ============================================================================

fn run_one(
    compositor: &mut Compositor,
    base: &EditorState,
    photo: Option<&Path>,
    output: &Path,
) -> Result<(), String> {
    // -- Step 1: Decode the photo (optional) -----------------------------
    let photo: Option<RasterImage> = match photo {
        Some(path) => Some(
            load_image_sync(path)
                .map_err(|e| format!("load failed for '{}': {}", path.display(), e))?,
        ),
        None => None,
    };

    // -- Step 2: Composite + encode + write ------------------------------
    let state = base.clone().with_photo(photo);
    export_png(compositor, &state, output).map_err(|e| format!("save failed: {}", e))?;
    Ok(())
}

/// Post text from `--text` (with `\\n` escapes) or `--text-file`, with line
/// breaks normalised to `\n`.
fn read_text(args: &CliArgs) -> Result<String, String> {
    match (&args.text, &args.text_file) {
        (Some(t), _) => Ok(normalize_line_breaks(&t.replace("\\n", "\n"))),
        (None, Some(path)) => {
            let t = std::fs::read_to_string(path).map_err(|e| {
                format!("could not read text file '{}': {}", path.display(), e)
            })?;
            Ok(normalize_line_breaks(&t).trim_end_matches('\n').to_string())
        }
        (None, None) => Ok(String::new()),
    }
}

fn load_overlay(args: &CliArgs, settings: &AppSettings) -> Result<Option<SelectedOverlay>, String> {
    let (name, path) = match (&args.overlay, &args.overlay_name) {
        (Some(path), _) => (
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Overlay".to_string()),
            path.clone(),
        ),
        (None, Some(name)) => {
            let entry = settings.overlays.find(name).ok_or_else(|| {
                let known: Vec<&str> = settings
                    .overlays
                    .entries()
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect();
                let known = if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                };
                format!("unknown overlay '{}' (configured: {})", name, known)
            })?;
            (entry.name.clone(), entry.path.clone())
        }
        (None, None) => return Ok(None),
    };

    let image = load_image_sync(&path)
        .map_err(|e| format!("could not load overlay '{}': {}", path.display(), e))?;
    Ok(Some(SelectedOverlay { name, image }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for one post.
///
/// Priority:
/// 1. `--output` (explicit path, single post)
/// 2. `--output-dir`, else the photo's directory, else the current directory
///
/// The file name is a unique token with `--unique-name`, otherwise
/// `<photo stem>_post.png`, or `canvas.png` when there is no photo.
fn build_output_path(
    photo: Option<&Path>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    naming: ExportName,
) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }

    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| photo.and_then(|p| p.parent()).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let stem = photo.and_then(|p| p.file_stem()).map(|s| s.to_string_lossy().into_owned());
    let name = match (naming, stem) {
        (ExportName::Unique, _) | (_, None) => naming.file_name(),
        (ExportName::Fixed, Some(stem)) => format!("{}_post.png", stem),
    };
    dir.join(name)
}

/// Give `path` a `_2`, `_3`, ... suffix if an earlier post in this run already
/// claimed it, e.g. `a/x.jpg` and `b/x.jpg` rendered into one output directory.
fn dedupe_output_path(path: PathBuf, written: &mut HashSet<PathBuf>) -> PathBuf {
    if written.insert(path.clone()) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    let mut n = 2;
    loop {
        let candidate = path.with_file_name(format!("{}_{}.{}", stem, n, ext));
        if written.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cli_flags() {
        assert!(is_cli_flag("--text"));
        assert!(is_cli_flag("--text=hi"));
        assert!(is_cli_flag("-p"));
        assert!(!is_cli_flag("--font-size"));
        assert!(!is_cli_flag("photo.png"));
    }

    #[test]
    fn parses_and_validates_arguments() {
        let args = CliArgs::try_parse_from([
            "postcreator", "-t", "hello", "--font-size", "64", "--padding", "2", "--color", "#000",
            "--no-shadow",
        ])
        .unwrap();
        let style = args.text_style(&AppSettings::default());
        assert_eq!(style.font_size, 64.0);
        assert_eq!(style.padding_ratio, 1.0);
        assert_eq!(style.color, Rgba([0, 0, 0, 255]));
        assert!(style.shadow.is_none());

        assert!(CliArgs::try_parse_from(["postcreator", "-t", "x", "--font-size", "abc"]).is_err());
        assert!(CliArgs::try_parse_from(["postcreator", "-t", "x", "--font-size", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["postcreator", "-t", "x", "--text-file", "a.txt"]).is_err());
    }

    #[test]
    fn shadow_override() {
        let args =
            CliArgs::try_parse_from(["postcreator", "-t", "x", "--shadow", "#ff000080,4,1,1"])
                .unwrap();
        let style = args.text_style(&AppSettings::default());
        let shadow = style.shadow.unwrap();
        assert_eq!(shadow.color, Rgba([255, 0, 0, 128]));
        assert_eq!(shadow.blur, 4.0);
    }

    #[test]
    fn output_paths() {
        let fixed = ExportName::Fixed;
        assert_eq!(
            build_output_path(None, Some(Path::new("x.png")), None, fixed),
            PathBuf::from("x.png")
        );
        assert_eq!(build_output_path(None, None, None, fixed), PathBuf::from("./canvas.png"));
        assert_eq!(
            build_output_path(Some(Path::new("shots/beach.jpg")), None, None, fixed),
            PathBuf::from("shots/beach_post.png")
        );
        assert_eq!(
            build_output_path(Some(Path::new("shots/beach.jpg")), None, Some(Path::new("out")), fixed),
            PathBuf::from("out/beach_post.png")
        );
        let unique = build_output_path(
            Some(Path::new("beach.jpg")),
            None,
            Some(Path::new("out")),
            ExportName::Unique,
        );
        assert_eq!(unique.parent(), Some(Path::new("out")));
        assert_ne!(unique.file_name().unwrap(), "beach_post.png");
    }

    #[test]
    fn same_stem_in_one_output_dir_gets_a_suffix() {
        let out = Some(Path::new("out"));
        let mut written = HashSet::new();
        let first = build_output_path(Some(Path::new("a/x.jpg")), None, out, ExportName::Fixed);
        let second = build_output_path(Some(Path::new("b/x.jpg")), None, out, ExportName::Fixed);
        assert_eq!(first, second);

        let first = dedupe_output_path(first, &mut written);
        let second = dedupe_output_path(second.clone(), &mut written);
        let third = dedupe_output_path(PathBuf::from("out/x_post.png"), &mut written);
        assert_eq!(first, PathBuf::from("out/x_post.png"));
        assert_eq!(second, PathBuf::from("out/x_post_2.png"));
        assert_eq!(third, PathBuf::from("out/x_post_3.png"));
    }

    #[test]
    fn crlf_text_file_reads_as_plain_lines() {
        let path = std::env::temp_dir().join(format!(
            "postcreator-text-{}.txt",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::write(&path, "line one\r\nline two\r\n").unwrap();
        let args = CliArgs::try_parse_from([
            std::ffi::OsStr::new("postcreator"),
            std::ffi::OsStr::new("--text-file"),
            path.as_os_str(),
        ])
        .unwrap();
        assert_eq!(read_text(&args).unwrap(), "line one\nline two");
        let _ = std::fs::remove_file(&path);

        let args = CliArgs::try_parse_from(["postcreator", "-t", "a\\nb\rc"]).unwrap();
        assert_eq!(read_text(&args).unwrap(), "a\nb\nc");
    }
}
