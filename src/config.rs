use std::path::{Path, PathBuf};

use clap::Parser;

use crate::collect::CollectOptions;

/// Projected origin of the scene coordinates.
#[derive(Debug, Clone, Default)]
pub struct Georeference {
    pub epsg: u32,
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
}

/// Texture processing parameters.
#[derive(Debug, Clone)]
pub struct TextureConfig {
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Tag materials with `KHR_materials_unlit`.
    pub unlit: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            unlit: true,
        }
    }
}

/// Fully resolved conversion configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub inputs: Vec<PathBuf>,
    /// Target `.glb` file for a single input, otherwise a directory.
    pub output: PathBuf,
    pub collect: CollectOptions,
    pub texture: TextureConfig,
    pub georeference: Option<Georeference>,
    pub task_id: Option<String>,
    pub verbose: bool,
    pub threads: Option<usize>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: PathBuf::new(),
            collect: CollectOptions::default(),
            texture: TextureConfig::default(),
            georeference: None,
            task_id: None,
            verbose: false,
            threads: None,
        }
    }
}

impl ConvertConfig {
    /// Where the GLB for `input` goes: the output path itself when it names
    /// a `.glb` file and there is a single input, else `<output>/<stem>.glb`.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let names_file = self
            .output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"));
        if names_file && self.inputs.len() <= 1 {
            return self.output.clone();
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "model".into());
        let mut name = stem;
        name.push(".glb");
        self.output.join(name)
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "mesh2glb",
    about = "Paged-LOD scene and triangle soup to GLB converter",
    version
)]
pub struct CliArgs {
    /// Input files (glTF, GLB, PLY)
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output .glb file (single input) or directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Collect geometry from every LOD tier, not just the paged one
    #[arg(long)]
    pub all_tiers: bool,

    /// Do not generate normals for geometry that lacks them
    #[arg(long)]
    pub no_smooth_normals: bool,

    /// JPEG quality for embedded textures (1-100)
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Emit lit PBR materials instead of KHR_materials_unlit
    #[arg(long)]
    pub lit: bool,

    /// EPSG code of the scene coordinates (enables geodetic correction)
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Origin easting in metres
    #[arg(long, default_value_t = 0.0)]
    pub origin_x: f64,

    /// Origin northing in metres
    #[arg(long, default_value_t = 0.0)]
    pub origin_y: f64,

    /// Origin elevation in metres
    #[arg(long, default_value_t = 0.0)]
    pub origin_z: f64,

    /// Task id attached to progress reports
    #[arg(long)]
    pub task_id: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for ConvertConfig {
    fn from(args: CliArgs) -> Self {
        let georeference = args.epsg.map(|epsg| Georeference {
            epsg,
            easting: args.origin_x,
            northing: args.origin_y,
            elevation: args.origin_z,
        });

        ConvertConfig {
            inputs: args.inputs,
            output: args.output,
            collect: CollectOptions {
                all_tiers: args.all_tiers,
                smooth_normals: !args.no_smooth_normals,
            },
            texture: TextureConfig {
                quality: args.jpeg_quality,
                unlit: !args.lit,
            },
            georeference,
            task_id: args.task_id,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}
