use std::io::{BufWriter, Stdout, Write};

use clap::{Args, Parser, Subcommand};
use log::info;
use tin_extract::{
    callback::FeatureSink,
    error::SinkError,
    io::{load_surface, write_landxml_surface, SurfaceFile},
    lattice::Lattice,
    Extractor, ExtractConfig, FeatureKind, Fence, FenceOption, FenceType, Point3, ScanContext,
    SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG,
};

#[derive(Parser)]
#[command(author, version, about = "Feature extraction from TIN surface models")]
struct Cli {
    /// JSON extraction settings
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FenceArgs {
    /// JSON fence file
    #[arg(long)]
    fence: Option<String>,
    /// Override the fence shape (1 block, 2 shape)
    #[arg(long)]
    fence_type: Option<i32>,
    /// Override the fence option (1 inside, 2 overlap, 3 outside)
    #[arg(long)]
    fence_option: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every occurrence of a feature kind from a surface.
    Extract {
        surface: String,
        #[arg(value_parser = parse_kind)]
        kind: FeatureKind,
        #[arg(long)]
        max_spots: Option<usize>,
        /// Triangulate raw JSON surfaces before extracting
        #[arg(long)]
        triangulate: bool,
        #[command(flatten)]
        fence: FenceArgs,
    },
    /// Step through the occurrences of a feature kind one at a time.
    Scan {
        surface: String,
        #[arg(value_parser = parse_kind)]
        kind: FeatureKind,
        #[arg(long)]
        max_spots: Option<usize>,
        /// Stop after this many occurrences
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        triangulate: bool,
        #[command(flatten)]
        fence: FenceArgs,
    },
    /// Sample a surface onto a grid and extract a lattice kind.
    Lattice {
        surface: String,
        #[arg(value_parser = parse_kind)]
        kind: FeatureKind,
        #[arg(long, default_value_t = 1.0)]
        spacing: f64,
        /// Read the grid from a JSON lattice file instead of sampling
        #[arg(long)]
        grid: bool,
        #[command(flatten)]
        fence: FenceArgs,
    },
    /// Slope indicator lines from the hull of one surface to another.
    SlopeLines {
        from: String,
        to: String,
        #[arg(long)]
        major: f64,
        #[arg(long, default_value_t = 0.0)]
        minor: f64,
    },
    /// List features that could not be linked into the triangulation.
    TinErrors { surface: String },
    /// Extract every feature carrying a user tag.
    ByTag {
        surface: String,
        tag: u64,
        #[arg(long)]
        max_spots: Option<usize>,
        #[command(flatten)]
        fence: FenceArgs,
    },
    /// Extract the feature(s) carrying a feature id.
    ById {
        surface: String,
        id: u64,
        #[command(flatten)]
        fence: FenceArgs,
    },
    /// Convert a surface between LandXML (.xml) and JSON.
    Convert {
        input: String,
        output: String,
        #[arg(long)]
        triangulate: bool,
    },
}

fn parse_kind(s: &str) -> Result<FeatureKind, String> {
    FeatureKind::from_name(s).ok_or_else(|| format!("unknown feature kind '{s}'"))
}

/// Writes each batch as a header line followed by its points.
struct PrintSink {
    out: BufWriter<Stdout>,
}

impl PrintSink {
    fn new() -> Self {
        Self {
            out: BufWriter::new(std::io::stdout()),
        }
    }
}

fn id_text(v: u64, null: u64) -> String {
    if v == null {
        "-".to_string()
    } else {
        v.to_string()
    }
}

impl FeatureSink for PrintSink {
    fn deliver(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> Result<(), SinkError> {
        if kind == FeatureKind::CheckStop {
            return Ok(());
        }
        writeln!(
            self.out,
            "{:?} {} {} {}",
            kind,
            id_text(user_tag, NULL_USER_TAG),
            id_text(feature_id, NULL_FEATURE_ID),
            points.len()
        )?;
        for p in points {
            writeln!(self.out, "{:.3},{:.3},{:.3}", p.x, p.y, p.z)?;
        }
        Ok(())
    }
}

fn load_config(path: Option<&str>) -> Result<ExtractConfig, String> {
    match path {
        Some(p) => ExtractConfig::load(p).map_err(|e| format!("Error reading {p}: {e}")),
        None => Ok(ExtractConfig::default()),
    }
}

fn load_fence(args: &FenceArgs) -> Result<Option<Fence>, String> {
    let Some(path) = &args.fence else {
        return Ok(None);
    };
    let mut fence = Fence::load(path).map_err(|e| format!("Error reading {path}: {e}"))?;
    if let Some(code) = args.fence_type {
        fence.fence_type = FenceType::from_code(code);
    }
    if let Some(code) = args.fence_option {
        fence.option = FenceOption::from_code(code);
    }
    Ok(Some(fence))
}

fn surface(path: &str, triangulate: bool) -> Result<SurfaceModel, String> {
    let model = load_surface(path, triangulate).map_err(|e| format!("Error reading {path}: {e}"))?;
    info!("loaded {path}: {} points", model.num_points());
    Ok(model)
}

fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(cli.config.as_deref())?;
    let mut sink = PrintSink::new();
    match cli.command {
        Commands::Extract {
            surface: path,
            kind,
            max_spots,
            triangulate,
            fence,
        } => {
            let model = surface(&path, triangulate)?;
            let fence = load_fence(&fence)?;
            Extractor::with_config(&model, config)
                .extract(
                    kind,
                    max_spots.unwrap_or(config.max_spots),
                    fence.as_ref(),
                    &mut sink,
                )
                .map_err(|e| e.to_string())
        }
        Commands::Scan {
            surface: path,
            kind,
            max_spots,
            limit,
            triangulate,
            fence,
        } => {
            let model = surface(&path, triangulate)?;
            let fence = load_fence(&fence)?;
            let scan = ScanContext::with_config(
                &model,
                kind,
                max_spots.unwrap_or(0),
                fence.as_ref(),
                &config,
            )
            .map_err(|e| e.to_string())?;
            for o in scan.take(limit.unwrap_or(usize::MAX)) {
                sink.deliver(o.kind, o.user_tag, o.feature_id, &o.points)
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        }
        Commands::Lattice {
            surface: path,
            kind,
            spacing,
            grid,
            fence,
        } => {
            let lattice = if grid {
                Lattice::load(&path)
            } else {
                let model = surface(&path, true)?;
                Lattice::from_surface(&model, spacing, spacing)
            }
            .map_err(|e| e.to_string())?;
            let fence = load_fence(&fence)?;
            tin_extract::extract_lattice(&lattice, kind, fence.as_ref(), &mut sink)
                .map_err(|e| e.to_string())
        }
        Commands::SlopeLines {
            from,
            to,
            major,
            minor,
        } => {
            let a = surface(&from, true)?;
            let b = surface(&to, true)?;
            tin_extract::extract_slope_lines(&a, &b, major, minor, &config, &mut sink)
                .map_err(|e| e.to_string())
        }
        Commands::TinErrors { surface: path } => {
            let model = surface(&path, false)?;
            Extractor::with_config(&model, config)
                .extract_tin_errors(&mut sink)
                .map_err(|e| e.to_string())
        }
        Commands::ByTag {
            surface: path,
            tag,
            max_spots,
            fence,
        } => {
            let model = surface(&path, false)?;
            let fence = load_fence(&fence)?;
            Extractor::with_config(&model, config)
                .extract_by_user_tag(
                    tag,
                    max_spots.unwrap_or(config.max_spots),
                    fence.as_ref(),
                    &mut sink,
                )
                .map_err(|e| e.to_string())
        }
        Commands::ById {
            surface: path,
            id,
            fence,
        } => {
            let model = surface(&path, false)?;
            let fence = load_fence(&fence)?;
            Extractor::with_config(&model, config)
                .extract_by_feature_id(id, fence.as_ref(), &mut sink)
                .map_err(|e| e.to_string())
        }
        Commands::Convert {
            input,
            output,
            triangulate,
        } => {
            let model = surface(&input, triangulate)?;
            let written = if output.to_ascii_lowercase().ends_with(".xml") {
                write_landxml_surface(&output, &model)
            } else {
                SurfaceFile::from_model(&model).save(&output)
            };
            written.map_err(|e| format!("Error writing {output}: {e}"))?;
            println!("Wrote {output}");
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env().init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
