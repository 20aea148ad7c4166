pub mod gltf_loader;
pub mod ply_loader;

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::types::SceneNode;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Gltf,
    Glb,
    Ply,
}

impl InputFormat {
    /// Detect format from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "gltf" => Ok(InputFormat::Gltf),
            "glb" => Ok(InputFormat::Glb),
            "ply" => Ok(InputFormat::Ply),
            _ => Err(ConvertError::Input(format!(
                "Unsupported file format: .{ext}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Gltf => "glTF",
            InputFormat::Glb => "GLB",
            InputFormat::Ply => "PLY",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load an input file as a scene graph.
pub fn ingest(path: &Path) -> Result<SceneNode> {
    if !path.exists() {
        return Err(ConvertError::Input(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let format = InputFormat::from_path(path)?;
    info!(format = %format, path = %path.display(), "Detected input format");

    let scene = match format {
        InputFormat::Gltf | InputFormat::Glb => gltf_loader::load_gltf(path)?,
        InputFormat::Ply => ply_loader::load_ply(path)?,
    };

    debug!(geometries = count_geometries(&scene), "Ingested scene graph");
    Ok(scene)
}

fn count_geometries(node: &SceneNode) -> usize {
    match node {
        SceneNode::Group(children) | SceneNode::PagedLod { children, .. } => {
            children.iter().map(count_geometries).sum()
        }
        SceneNode::Geometry(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Geometry;

    #[test]
    fn format_detection() {
        assert_eq!(
            InputFormat::from_path(Path::new("scene.gltf")).unwrap(),
            InputFormat::Gltf
        );
        assert_eq!(
            InputFormat::from_path(Path::new("scene.glb")).unwrap(),
            InputFormat::Glb
        );
        assert_eq!(
            InputFormat::from_path(Path::new("soup.ply")).unwrap(),
            InputFormat::Ply
        );
    }

    #[test]
    fn format_detection_case_insensitive() {
        assert_eq!(
            InputFormat::from_path(Path::new("Tile.PLY")).unwrap(),
            InputFormat::Ply
        );
        assert_eq!(
            InputFormat::from_path(Path::new("Scene.GLTF")).unwrap(),
            InputFormat::Gltf
        );
    }

    #[test]
    fn format_detection_unsupported() {
        assert!(InputFormat::from_path(Path::new("model.obj")).is_err());
        assert!(InputFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn geometry_count_walks_tiers() {
        let leaf = || SceneNode::Geometry(Geometry::default());
        let scene = SceneNode::Group(vec![
            leaf(),
            SceneNode::PagedLod {
                children: vec![leaf(), SceneNode::Group(vec![leaf()])],
                tier_files: vec!["tile_L1.osgb".into()],
            },
        ]);
        assert_eq!(count_geometries(&scene), 3);
    }

    #[test]
    fn ingest_missing_file() {
        let err = ingest(Path::new("/nonexistent/file.ply")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
