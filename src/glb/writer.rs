use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

use gltf::binary::Glb;
use gltf_json::mesh::Primitive;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ConvertError, Result};

use super::Model;

pub const UNLIT_EXTENSION: &str = "KHR_materials_unlit";

/// Attach the mesh/node/scene graph to `model` and frame it as GLB.
///
/// Returns `None` when there are no primitives to write.
pub fn build_glb(mut model: Model, primitives: Vec<Primitive>, unlit: bool) -> Result<Option<Vec<u8>>> {
    if primitives.is_empty() {
        return Ok(None);
    }

    let material_count = model.root.materials.len();
    if let Some(bad) = primitives
        .iter()
        .filter_map(|p| p.material)
        .find(|m| m.value() >= material_count)
    {
        return Err(ConvertError::Serialize(format!(
            "primitive references material {} but only {material_count} exist",
            bad.value()
        )));
    }

    let mesh = model.root.push(gltf_json::Mesh {
        primitives,
        weights: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    let node = model.root.push(gltf_json::Node {
        mesh: Some(mesh),
        ..Default::default()
    });
    let scene = model.root.push(gltf_json::Scene {
        nodes: vec![node],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    model.root.scene = Some(scene);

    if unlit && material_count > 0 {
        model.root.extensions_used.push(UNLIT_EXTENSION.to_string());
    }

    let Model { mut root, buffer } = model;
    let bin = buffer.finish(&mut root);

    let json_string = gltf_json::serialize::to_string(&root)
        .map_err(|e| ConvertError::Serialize(format!("glTF JSON: {e}")))?;
    let mut json_bytes = json_string.into_bytes();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }

    let length = u32::try_from(12 + 8 + json_bytes.len() + 8 + bin.len())
        .map_err(|_| ConvertError::Serialize("GLB exceeds 4 GiB".into()))?;

    let glb = Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length,
        },
        json: Cow::Owned(json_bytes),
        bin: Some(Cow::Owned(bin)),
    };

    glb.to_vec()
        .map(Some)
        .map_err(|e| ConvertError::Serialize(format!("GLB framing: {e}")))
}

/// Write `bytes` to `path` through a uniquely named sibling temporary file,
/// so a failed write leaves any previous file in place.
pub fn write_glb(path: &Path, bytes: &[u8]) -> Result<()> {
    let output_err = |source| ConvertError::Output {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(output_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(output_err)?;
    tmp.write_all(bytes).map_err(output_err)?;
    tmp.persist(path).map_err(|e| output_err(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote GLB");
    Ok(())
}
