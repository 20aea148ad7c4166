use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{error, info};

use crate::collect::{self, CollectOptions, CoordinateTransform};
use crate::config::{ConvertConfig, TextureConfig};
use crate::error::{ConvertError, Result};
use crate::glb::{self, AssemblyStats, Model, PrimitiveAssembler, TexturePacker};
use crate::ingestion;
use crate::progress::{ProgressSink, TracingProgress};
use crate::transform::GeoCorrection;
use crate::types::{BoundingBox, SceneNode};

/// What one conversion produced, besides the bytes.
#[derive(Debug, Clone, Default)]
pub struct ConversionStats {
    pub drawables: usize,
    pub skipped: usize,
    pub textures: usize,
    pub tier_files: Vec<String>,
    pub assembly: AssemblyStats,
    pub bounds: BoundingBox,
}

/// Result of converting one scene graph in memory.
#[derive(Debug)]
pub struct Conversion {
    /// `None` when the scene held no drawable geometry.
    pub glb: Option<Vec<u8>>,
    pub stats: ConversionStats,
}

/// Per-input outcome of a batch run.
#[derive(Debug)]
pub enum ConversionOutcome {
    Written {
        input: PathBuf,
        output: PathBuf,
        bytes: usize,
        stats: ConversionStats,
    },
    NothingToConvert {
        input: PathBuf,
    },
}

/// Summary of a completed batch run.
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<ConversionOutcome>,
    pub duration: Duration,
}

impl BatchResult {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ConversionOutcome::Written { .. }))
            .count()
    }
}

/// Convert a scene graph into GLB bytes.
///
/// Collects drawables, writes their primitives, then packs one material per
/// distinct texture. Any error aborts the whole conversion.
pub fn convert_scene(
    root: SceneNode,
    options: &CollectOptions,
    texture: &TextureConfig,
    correction: Option<&dyn CoordinateTransform>,
    progress: &dyn ProgressSink,
) -> Result<Conversion> {
    progress.report(0.0, "collecting geometry");
    let scene = collect::collect(root, options, correction)?;

    let mut stats = ConversionStats {
        drawables: scene.drawables.len(),
        skipped: scene.skipped,
        textures: scene.textures.len(),
        tier_files: scene.tier_files.clone(),
        ..Default::default()
    };

    if scene.is_empty() {
        progress.report(100.0, "nothing to convert");
        return Ok(Conversion { glb: None, stats });
    }
    progress.report(20.0, "assembling primitives");

    let mut model = Model::new();
    let mut assembler = PrimitiveAssembler::new(&scene);
    assembler.assemble_all(&mut model)?;
    progress.report(50.0, "packing textures");

    let mut packer = TexturePacker::new(texture);
    let texture_count = scene.textures.len();
    for (i, image) in scene.textures.iter().enumerate() {
        let material = packer.pack(&mut model, image)?;
        if material.value() != i {
            return Err(ConvertError::Serialize(format!(
                "texture {} packed as material {}, primitives expect {i}",
                image.name,
                material.value()
            )));
        }
        let done = 50.0 + 40.0 * (i + 1) as f32 / texture_count as f32;
        progress.report(done, &format!("packed texture {}/{texture_count}", i + 1));
    }

    stats.assembly = assembler.stats();
    stats.bounds = assembler.bounds();
    let primitives = assembler.into_primitives();

    progress.report(90.0, "writing container");
    let glb = glb::build_glb(model, primitives, packer.unlit())?;
    progress.report(100.0, "done");

    Ok(Conversion { glb, stats })
}

/// Pipeline orchestrator: one conversion per input file.
pub struct Pipeline;

impl Pipeline {
    /// Convert every input in parallel on the global rayon pool.
    pub fn run(config: &ConvertConfig) -> Result<BatchResult> {
        let start = Instant::now();
        info!(
            inputs = config.inputs.len(),
            output = %config.output.display(),
            "Starting conversion"
        );
        check_distinct_outputs(config)?;

        let outcomes = config
            .inputs
            .par_iter()
            .map(|input| {
                let progress = TracingProgress::new(task_id_for(config, input));
                Self::convert_file(config, input, &progress).inspect_err(|e| {
                    error!(input = %input.display(), %e, "Conversion failed");
                    progress.report(-1.0, &e.to_string());
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let result = BatchResult {
            outcomes,
            duration: start.elapsed(),
        };
        info!(
            written = result.written(),
            elapsed = ?result.duration,
            "Conversion complete"
        );

        Ok(result)
    }

    /// Ingest, convert and write a single input file.
    pub fn convert_file(
        config: &ConvertConfig,
        input: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<ConversionOutcome> {
        let scene = ingestion::ingest(input)?;

        let correction = config
            .georeference
            .as_ref()
            .map(GeoCorrection::new)
            .transpose()?;

        let conversion = convert_scene(
            scene,
            &config.collect,
            &config.texture,
            correction.as_ref().map(|c| c as &dyn CoordinateTransform),
            progress,
        )?;

        let Some(bytes) = conversion.glb else {
            info!(input = %input.display(), "No drawable geometry, nothing written");
            return Ok(ConversionOutcome::NothingToConvert {
                input: input.to_path_buf(),
            });
        };

        let output = config.output_path_for(input);
        glb::write_glb(&output, &bytes)?;

        let stats = conversion.stats;
        info!(
            input = %input.display(),
            output = %output.display(),
            bytes = bytes.len(),
            primitives = stats.assembly.primitives,
            textures = stats.textures,
            "Wrote GLB"
        );

        Ok(ConversionOutcome::Written {
            input: input.to_path_buf(),
            output,
            bytes: bytes.len(),
            stats,
        })
    }
}

/// Two inputs may not resolve to the same GLB path.
fn check_distinct_outputs(config: &ConvertConfig) -> Result<()> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    for input in &config.inputs {
        let output = config.output_path_for(input);
        if let Some(previous) = seen.insert(output.clone(), input) {
            return Err(ConvertError::Input(format!(
                "{} and {} would both write {}",
                previous.display(),
                input.display(),
                output.display()
            )));
        }
    }
    Ok(())
}

/// Progress task id: the configured id, qualified by the input stem in
/// batch runs.
fn task_id_for(config: &ConvertConfig, input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match &config.task_id {
        Some(id) if config.inputs.len() > 1 => format!("{id}:{stem}"),
        Some(id) => id.clone(),
        None => stem,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::progress::tests::RecordingProgress;
    use crate::progress::NoProgress;
    use crate::types::{Geometry, PixelFormat, TextureImage};

    fn textured_quad(texture: Arc<TextureImage>) -> Geometry {
        Geometry {
            texcoords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            texture: Some(texture),
            ..Geometry::triangle_soup(
                "quad",
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
                vec![0, 1, 2, 0, 2, 3],
            )
        }
    }

    #[test]
    fn convert_scene_reports_progress() {
        let tex = Arc::new(TextureImage::new("t", 2, 2, PixelFormat::Rgb, vec![255; 12]));
        let sink = RecordingProgress::default();
        let conversion = convert_scene(
            SceneNode::Geometry(textured_quad(tex)),
            &CollectOptions::default(),
            &TextureConfig::default(),
            None,
            &sink,
        )
        .unwrap();

        assert!(conversion.glb.is_some());
        assert_eq!(conversion.stats.drawables, 1);
        assert_eq!(conversion.stats.textures, 1);
        assert_eq!(conversion.stats.assembly.primitives, 1);

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.first().unwrap().0, 0.0);
        assert_eq!(updates.last().unwrap().0, 100.0);
        assert!(updates.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn materials_follow_texture_order() {
        let red = Arc::new(TextureImage::new("red", 1, 1, PixelFormat::Rgb, vec![255, 0, 0]));
        let blue = Arc::new(TextureImage::new("blue", 1, 1, PixelFormat::Rgb, vec![0, 0, 255]));
        let root = SceneNode::Group(vec![
            SceneNode::Geometry(textured_quad(Arc::clone(&blue))),
            SceneNode::Geometry(textured_quad(red)),
            SceneNode::Geometry(textured_quad(blue)),
        ]);
        let conversion = convert_scene(
            root,
            &CollectOptions::default(),
            &TextureConfig::default(),
            None,
            &NoProgress,
        )
        .unwrap();

        let bytes = conversion.glb.unwrap();
        let (doc, _, _) = gltf::import_slice(&bytes).unwrap();
        assert_eq!(doc.materials().count(), 2);
        let slots: Vec<Option<usize>> = doc
            .meshes()
            .flat_map(|m| m.primitives())
            .map(|p| p.material().index())
            .collect();
        assert_eq!(slots, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn empty_scene_converts_to_nothing() {
        let conversion = convert_scene(
            SceneNode::Group(vec![SceneNode::Geometry(Geometry::default())]),
            &CollectOptions::default(),
            &TextureConfig::default(),
            None,
            &NoProgress,
        )
        .unwrap();
        assert!(conversion.glb.is_none());
        assert_eq!(conversion.stats.skipped, 1);
    }

    #[test]
    fn correction_is_applied() {
        let shift = |p: glam::DVec3| -> Result<glam::DVec3> { Ok(p + glam::DVec3::new(100.0, 0.0, 0.0)) };
        let conversion = convert_scene(
            SceneNode::Geometry(Geometry::triangle_soup(
                "tri",
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                vec![0, 1, 2],
            )),
            &CollectOptions::default(),
            &TextureConfig::default(),
            Some(&shift),
            &NoProgress,
        )
        .unwrap();
        let bounds = conversion.stats.bounds;
        assert!((bounds.min[0] - 100.0).abs() < 1e-4);
        assert!((bounds.max[0] - 101.0).abs() < 1e-4);
    }

    #[test]
    fn task_ids() {
        let mut config = ConvertConfig {
            inputs: vec![PathBuf::from("a.ply")],
            ..Default::default()
        };
        assert_eq!(task_id_for(&config, Path::new("dir/a.ply")), "a");
        config.task_id = Some("job".into());
        assert_eq!(task_id_for(&config, Path::new("dir/a.ply")), "job");
        config.inputs.push(PathBuf::from("b.ply"));
        assert_eq!(task_id_for(&config, Path::new("dir/b.ply")), "job:b");
    }

    #[test]
    fn run_rejects_inputs_sharing_a_stem() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig {
            inputs: vec![dir.path().join("a/tile.ply"), dir.path().join("b/tile.ply")],
            output: dir.path().join("out"),
            ..Default::default()
        };
        let err = Pipeline::run(&config).unwrap_err();
        assert!(matches!(err, ConvertError::Input(_)));
        assert!(err.to_string().contains("tile.glb"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn run_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig {
            inputs: vec![dir.path().join("missing.ply")],
            output: dir.path().join("out"),
            ..Default::default()
        };
        assert!(Pipeline::run(&config).is_err());
        assert!(!dir.path().join("out").exists());
    }
}
