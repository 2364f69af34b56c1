use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use surfmatch::io::{load_rgb_image, save_rgb_image};
use surfmatch::{
    draw_regions_with_config, DrawConfig, MatchConfig, ModelRegion, ModelReport, RansacConfig,
    SurfConfig, VoteConfig,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "SurfMatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SurfConfigJson {
    hessian_threshold: f32,
    octaves: usize,
    octave_layers: usize,
    upright: bool,
}

impl Default for SurfConfigJson {
    fn default() -> Self {
        let cfg = SurfConfig::default();
        Self {
            hessian_threshold: cfg.hessian_threshold,
            octaves: cfg.octaves,
            octave_layers: cfg.octave_layers,
            upright: cfg.upright,
        }
    }
}

impl From<SurfConfigJson> for SurfConfig {
    fn from(value: SurfConfigJson) -> Self {
        Self {
            hessian_threshold: value.hessian_threshold,
            octaves: value.octaves,
            octave_layers: value.octave_layers,
            upright: value.upright,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct VoteConfigJson {
    uniqueness_threshold: f32,
    scale_increment: f32,
    rotation_bins: usize,
}

impl Default for VoteConfigJson {
    fn default() -> Self {
        let cfg = VoteConfig::default();
        Self {
            uniqueness_threshold: cfg.uniqueness_threshold,
            scale_increment: cfg.scale_increment,
            rotation_bins: cfg.rotation_bins,
        }
    }
}

impl From<VoteConfigJson> for VoteConfig {
    fn from(value: VoteConfigJson) -> Self {
        Self {
            uniqueness_threshold: value.uniqueness_threshold,
            scale_increment: value.scale_increment,
            rotation_bins: value.rotation_bins,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RansacConfigJson {
    reproj_threshold: f64,
    max_iters: usize,
    confidence: f64,
    seed: u64,
}

impl Default for RansacConfigJson {
    fn default() -> Self {
        let cfg = RansacConfig::default();
        Self {
            reproj_threshold: cfg.reproj_threshold,
            max_iters: cfg.max_iters,
            confidence: cfg.confidence,
            seed: cfg.seed,
        }
    }
}

impl From<RansacConfigJson> for RansacConfig {
    fn from(value: RansacConfigJson) -> Self {
        Self {
            reproj_threshold: value.reproj_threshold,
            max_iters: value.max_iters,
            confidence: value.confidence,
            seed: value.seed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    model_paths: Vec<String>,
    /// Optional `[x, y, width, height]` per model; missing entries use the
    /// whole image.
    model_rois: Vec<Option<[u32; 4]>>,
    observed_path: String,
    output_image: Option<String>,
    output_path: Option<String>,
    surf: SurfConfigJson,
    vote: VoteConfigJson,
    ransac: RansacConfigJson,
    min_matches: usize,
    parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            model_paths: Vec::new(),
            model_rois: Vec::new(),
            observed_path: String::new(),
            output_image: None,
            output_path: None,
            surf: SurfConfigJson::default(),
            vote: VoteConfigJson::default(),
            ransac: RansacConfigJson::default(),
            min_matches: cfg.min_matches,
            parallel: cfg.parallel,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelRecord {
    path: String,
    model_keypoints: usize,
    observed_keypoints: usize,
    accepted: usize,
    found: bool,
    corners: Option<[[f32; 2]; 4]>,
}

impl ModelRecord {
    fn new(path: &str, report: &ModelReport) -> Self {
        Self {
            path: path.to_string(),
            model_keypoints: report.model_keypoints,
            observed_keypoints: report.observed_keypoints,
            accepted: report.accepted,
            found: report.corners.is_some(),
            corners: report.corners.map(|c| c.map(|(x, y)| [x, y])),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    match_time_ms: f64,
    models: Vec<ModelRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("surfmatch=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.observed_path.is_empty() {
        return Err("observed_path must be set in the config".into());
    }

    let observed = load_rgb_image(&config.observed_path)?;
    let models = config
        .model_paths
        .iter()
        .map(load_rgb_image)
        .collect::<Result<Vec<_>, _>>()?;

    let match_cfg = MatchConfig {
        surf: config.surf.into(),
        vote: config.vote.into(),
        ransac: config.ransac.into(),
        min_matches: config.min_matches,
        parallel: config.parallel,
    };
    match_cfg.validate()?;

    let regions: Vec<(&_, ModelRegion)> = models
        .iter()
        .enumerate()
        .map(|(i, model)| {
            let region = match config.model_rois.get(i).copied().flatten() {
                Some([x, y, width, height]) => ModelRegion {
                    x,
                    y,
                    width,
                    height,
                },
                None => ModelRegion::full(model),
            };
            (model, region)
        })
        .collect();
    let drawing =
        draw_regions_with_config(&regions, &observed, &match_cfg, &DrawConfig::default())?;
    if let Some(path) = &config.output_image {
        save_rgb_image(&drawing.image, path)?;
    }

    let output = Output {
        match_time_ms: drawing.match_time.as_secs_f64() * 1e3,
        models: config
            .model_paths
            .iter()
            .zip(drawing.models.iter())
            .map(|(path, report)| ModelRecord::new(path, report))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
