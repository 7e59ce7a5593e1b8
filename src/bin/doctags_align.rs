//! CLI binary for doctags-align.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CorrectionConfig` and writes artifacts to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doctags_align::{
    correct_page, process_page_to_dir, render_overlay, suggest_parameters, sweep_candidates,
    Convention, CorrectionConfig, FactorComposition, PageRasterInfo,
};
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rewrite boxes into pixel space (stdout)
  doctags-align fix page_1.doctags.txt --image page_1.png --factors 0.7,0.7

  # Draw the corrected boxes on the page render
  doctags-align overlay page_1.doctags.txt --image page_1.png \
      --factors 0.7,0.7 --out out/

  # Crop picture regions plus a JSON index
  doctags-align extract page_1.doctags.txt --image page_1.png \
      --convention 500x500 --margin 8 --out out/

  # Unknown factors? Render the whole candidate grid and eyeball it
  doctags-align sweep page_1.doctags.txt --image page_1.png \
      --min 0.5 --max 1.2 --steps 7 --out sweep/

COORDINATE CONVENTIONS (--convention):
  normalized   coordinates in [0, 1], scaled by page size
  500x500      grid cells (any WxH), scaled by page/grid
  pixels       already pixel coordinates, used as-is

  Without --convention the document's own space="..." attribute decides;
  documents lacking both are rejected (or pass --replace-base to treat
  the factors as the entire mapping).

ENVIRONMENT VARIABLES:
  RUST_LOG                tracing filter (e.g. debug, doctags_align=trace)
  DOCTAGS_ALIGN_OUT       default output directory
"#;

/// Correct, visualize, and crop DocTags bounding boxes.
#[derive(Parser, Debug)]
#[command(
    name = "doctags-align",
    version,
    about = "Correct, visualize, and crop DocTags bounding boxes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite every bounding box into page-pixel space.
    Fix {
        #[command(flatten)]
        common: CommonArgs,

        /// Write corrected DocTags here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Draw color-coded corrected boxes on the page render.
    Overlay {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for page_{id}.overlay.png.
        #[arg(short, long, env = "DOCTAGS_ALIGN_OUT", default_value = ".")]
        out: PathBuf,
    },

    /// Crop picture regions out of the page render, with a JSON index.
    Extract {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for page_{id}.regions/.
        #[arg(short, long, env = "DOCTAGS_ALIGN_OUT", default_value = ".")]
        out: PathBuf,
    },

    /// Render one overlay per candidate factor pair for visual comparison.
    Sweep {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for the candidate overlays.
        #[arg(short, long, env = "DOCTAGS_ALIGN_OUT", default_value = ".")]
        out: PathBuf,

        /// Smallest candidate factor on both axes.
        #[arg(long, default_value_t = 0.5)]
        min: f64,

        /// Largest candidate factor on both axes.
        #[arg(long, default_value_t = 1.5)]
        max: f64,

        /// Subdivisions per axis; (steps+1)^2 overlays are rendered.
        #[arg(long, default_value_t = 5)]
        steps: u32,
    },
}

/// Flags shared by every subcommand.
#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// DocTags text file.
    input: PathBuf,

    /// Page render the coordinates should land on.
    #[arg(long)]
    image: PathBuf,

    /// Per-axis correction factors, e.g. `0.7,0.7` or a single `0.7`.
    #[arg(long, default_value = "1.0")]
    factors: String,

    /// Per-axis origin offsets in the source space, e.g. `0,12`.
    #[arg(long, default_value = "0.0")]
    offsets: String,

    /// Source coordinate convention: normalized, pixels, or WxH.
    /// Overrides the document's own space="..." attribute.
    #[arg(long)]
    convention: Option<String>,

    /// Treat the factors as the entire mapping, ignoring any convention.
    #[arg(long)]
    replace_base: bool,

    /// DPI the page render was produced at (recorded in the region index).
    #[arg(long, default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(1..))]
    dpi: u32,

    /// Box outline thickness in pixels.
    #[arg(long, default_value_t = 2)]
    thickness: u32,

    /// Skip the element-kind labels, draw outlines only.
    #[arg(long)]
    no_labels: bool,

    /// TTF/OTF font for labels (system fonts are probed otherwise).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Padding in pixels added around each extracted region.
    #[arg(long, default_value_t = 0)]
    margin: u32,

    /// Downscale extracted regions wider than this, preserving aspect.
    #[arg(long)]
    max_width: Option<u32>,

    /// Page identifier used in artifact filenames (default: input stem).
    #[arg(long)]
    page_id: Option<String>,
}

impl CommonArgs {
    fn load(&self) -> Result<(String, DynamicImage, PageRasterInfo)> {
        let text = std::fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let image = image::open(&self.image)
            .with_context(|| format!("Failed to open {}", self.image.display()))?;
        let raster = PageRasterInfo::for_image(&image, self.dpi);
        Ok((text, image, raster))
    }

    fn config(&self) -> Result<CorrectionConfig> {
        let (x_factor, y_factor) = parse_pair(&self.factors).context("Invalid --factors")?;
        let (x_offset, y_offset) = parse_pair(&self.offsets).context("Invalid --offsets")?;

        let mut builder = CorrectionConfig::builder()
            .factors(x_factor, y_factor)
            .offsets(x_offset, y_offset)
            .dpi(self.dpi)
            .line_thickness(self.thickness)
            .draw_labels(!self.no_labels)
            .crop_margin(self.margin);

        if let Some(ref raw) = self.convention {
            let convention = Convention::from_str(raw)
                .with_context(|| format!("Invalid --convention '{raw}'"))?;
            builder = builder.convention(convention);
        }
        if self.replace_base {
            builder = builder.composition(FactorComposition::ReplaceBase);
        }
        if let Some(ref font) = self.font {
            builder = builder.font_path(font.clone());
        }
        if let Some(w) = self.max_width {
            builder = builder.max_crop_width(w);
        }

        builder.build().context("Invalid configuration")
    }

    fn page_id(&self) -> String {
        match &self.page_id {
            Some(id) => id.clone(),
            None => self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "page".to_string()),
        }
    }
}

/// Parse `"0.7,0.8"` or a single `"0.7"` into an (x, y) pair.
fn parse_pair(s: &str) -> Result<(f64, f64)> {
    match s.split_once(',') {
        Some((x, y)) => Ok((
            x.trim().parse().context("bad x value")?,
            y.trim().parse().context("bad y value")?,
        )),
        None => {
            let v: f64 = s.trim().parse().context("bad value")?;
            Ok((v, v))
        }
    }
}

fn sweep_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} overlays  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("Sweeping");
    bar
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Fix { common, output } => {
            let (text, _, raster) = common.load()?;
            let config = common.config()?;
            let page =
                correct_page(&text, &raster, &config).context("Correction failed")?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &page.corrected_text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.quiet {
                        eprintln!(
                            "{} {} elements → {}",
                            green("✔"),
                            page.document.element_count(),
                            bold(&path.display().to_string()),
                        );
                    }
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    handle.write_all(page.corrected_text.as_bytes())?;
                    handle.write_all(b"\n").ok();
                }
            }
        }

        Command::Overlay { common, out } => {
            let (text, image, raster) = common.load()?;
            let config = common.config()?;
            let page = correct_page(&text, &raster, &config).context("Correction failed")?;
            let (overlay, errors) = render_overlay(&page.document, &image, &config);

            std::fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            let path = out.join(format!("page_{}.overlay.png", common.page_id()));
            overlay
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            if !cli.quiet {
                let total = page.document.element_count();
                eprintln!(
                    "{} {}/{} elements drawn  →  {}",
                    green("✔"),
                    total - errors.len(),
                    total,
                    bold(&path.display().to_string()),
                );
                for err in &errors {
                    eprintln!("   {} {err}", dim("skipped:"));
                }
            }
        }

        Command::Extract { common, out } => {
            let (text, image, raster) = common.load()?;
            let config = common.config()?;
            let page_id = common.page_id();
            let (output, artifacts) =
                process_page_to_dir(&text, &image, &raster, &config, &out, &page_id)
                    .context("Processing failed")?;

            if !cli.quiet {
                eprintln!(
                    "{} {}/{} elements drawn, {} regions  {}  →  {}",
                    green("✔"),
                    output.stats.elements_rendered,
                    output.stats.elements_total,
                    output.stats.regions_extracted,
                    dim(&format!("{}ms", output.stats.duration_ms)),
                    bold(&artifacts.regions_dir.display().to_string()),
                );
                for err in &output.element_errors {
                    eprintln!("   {} {err}", dim("skipped:"));
                }
            }
        }

        Command::Sweep {
            common,
            out,
            min,
            max,
            steps,
        } => {
            let (text, image, raster) = common.load()?;
            let base_config = common.config()?;
            let page_id = common.page_id();
            std::fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;

            // The raw extents yield a data-driven first guess.
            if let Ok(doc) = doctags_align::parse(&text) {
                if let Some(suggested) = suggest_parameters(&doc, &raster) {
                    eprintln!("{} suggested starting point: {suggested}", dim("hint:"));
                }
            }

            let total = u64::from(steps + 1) * u64::from(steps + 1);
            let bar = if cli.quiet {
                ProgressBar::hidden()
            } else {
                sweep_bar(total)
            };

            for params in sweep_candidates(min, max, min, max, steps) {
                let config = CorrectionConfig {
                    x_factor: params.x_factor,
                    y_factor: params.y_factor,
                    x_offset: params.x_offset,
                    y_offset: params.y_offset,
                    ..base_config.clone()
                };
                let page = correct_page(&text, &raster, &config)
                    .with_context(|| format!("Correction failed for {params}"))?;
                let (overlay, _) = render_overlay(&page.document, &image, &config);

                let path = out.join(format!("page_{page_id}.sweep_{}.png", params.label()));
                overlay
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                bar.inc(1);
            }
            bar.finish_and_clear();

            if !cli.quiet {
                eprintln!(
                    "{} {} candidate overlays in {}",
                    green("✔"),
                    bold(&total.to_string()),
                    bold(&out.display().to_string()),
                );
            }
        }
    }

    Ok(())
}
