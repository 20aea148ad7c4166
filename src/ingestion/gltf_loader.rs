use std::path::Path;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};
use gltf::mesh::util::ReadIndices;
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::types::{
    DrawMode, Geometry, IndexList, PixelFormat, PrimitiveSet, SceneNode, TextureImage, TextureRef,
};

/// Load a glTF or GLB file as a scene graph.
pub fn load_gltf(path: &Path) -> Result<SceneNode> {
    let (document, buffers, images) = gltf::import(path)
        .map_err(|e| ConvertError::Input(format!("Failed to load glTF: {e}")))?;

    debug!(
        meshes = document.meshes().len(),
        images = images.len(),
        "Loaded glTF document"
    );

    scene_from_document(&document, &buffers, &images)
}

/// Build the scene graph of an imported document.
///
/// Each node becomes a group holding one geometry per primitive, with world
/// transforms baked into the vertices. Images are shared by index.
pub fn scene_from_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Result<SceneNode> {
    let textures: Vec<TextureRef> = images
        .iter()
        .enumerate()
        .map(|(i, data)| Arc::new(convert_gltf_image(data, format!("image_{i}"))))
        .collect();

    let roots: Vec<gltf::Node<'_>> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().filter(|n| n.mesh().is_some()).collect(),
    };

    let mut children = Vec::with_capacity(roots.len());
    for node in roots {
        children.push(convert_node(&node, Mat4::IDENTITY, buffers, &textures)?);
    }
    Ok(SceneNode::Group(children))
}

fn convert_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    textures: &[TextureRef],
) -> Result<SceneNode> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let mut children = Vec::new();

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let name = match mesh.name() {
                Some(n) => format!("{n}_{}", primitive.index()),
                None => format!("mesh{}_{}", mesh.index(), primitive.index()),
            };
            match extract_primitive(&primitive, buffers, world, textures, name) {
                Ok(geometry) => children.push(SceneNode::Geometry(geometry)),
                Err(e) => warn!(mesh = ?mesh.name(), "Skipping primitive: {e}"),
            }
        }
    }

    for child in node.children() {
        children.push(convert_node(&child, world, buffers, textures)?);
    }

    Ok(SceneNode::Group(children))
}

/// Extract geometry from a single glTF primitive, transformed by `world`.
fn extract_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    world: Mat4,
    textures: &[TextureRef],
    name: String,
) -> Result<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b[..]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| ConvertError::Input("Primitive missing positions".into()))?
        .map(|p| world.transform_point3(Vec3::from_array(p)).to_array())
        .collect();

    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|iter| {
            iter.map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or_zero().to_array())
                .collect()
        })
        .unwrap_or_default();

    let texcoords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_default();

    let mode = convert_mode(primitive.mode());
    let primitive_set = match reader.read_indices() {
        Some(ReadIndices::U8(iter)) => PrimitiveSet::DrawElements {
            mode,
            indices: IndexList::U8(iter.collect()),
        },
        Some(ReadIndices::U16(iter)) => PrimitiveSet::DrawElements {
            mode,
            indices: IndexList::U16(iter.collect()),
        },
        Some(ReadIndices::U32(iter)) => PrimitiveSet::DrawElements {
            mode,
            indices: IndexList::U32(iter.collect()),
        },
        None => PrimitiveSet::DrawArrays {
            mode,
            first: 0,
            count: u32::try_from(positions.len())
                .map_err(|_| ConvertError::Input("Primitive has too many vertices".into()))?,
        },
    };

    let texture = primitive
        .material()
        .pbr_metallic_roughness()
        .base_color_texture()
        .and_then(|info| textures.get(info.texture().source().index()))
        .cloned();

    Ok(Geometry {
        name,
        positions,
        normals,
        texcoords,
        primitive_sets: vec![primitive_set],
        texture,
    })
}

fn convert_mode(mode: gltf::mesh::Mode) -> DrawMode {
    match mode {
        gltf::mesh::Mode::Points => DrawMode::Points,
        gltf::mesh::Mode::Lines => DrawMode::Lines,
        gltf::mesh::Mode::LineLoop => DrawMode::LineLoop,
        gltf::mesh::Mode::LineStrip => DrawMode::LineStrip,
        gltf::mesh::Mode::Triangles => DrawMode::Triangles,
        gltf::mesh::Mode::TriangleStrip => DrawMode::TriangleStrip,
        gltf::mesh::Mode::TriangleFan => DrawMode::TriangleFan,
    }
}

/// Wrap decoded glTF pixels; layouts other than 8-bit L/RGB/RGBA are
/// passed through as unreadable.
fn convert_gltf_image(image_data: &gltf::image::Data, name: String) -> TextureImage {
    use gltf::image::Format;

    let format = match image_data.format {
        Format::R8 => PixelFormat::Luminance,
        Format::R8G8B8 => PixelFormat::Rgb,
        Format::R8G8B8A8 => PixelFormat::Rgba,
        Format::R8G8 => PixelFormat::Other(2),
        Format::R16 => PixelFormat::Other(16),
        Format::R16G16 => PixelFormat::Other(32),
        Format::R16G16B16 => PixelFormat::Other(48),
        Format::R16G16B16A16 => PixelFormat::Other(64),
        Format::R32G32B32FLOAT => PixelFormat::Other(96),
        Format::R32G32B32A32FLOAT => PixelFormat::Other(128),
    };

    TextureImage::new(
        name,
        image_data.width,
        image_data.height,
        format,
        image_data.pixels.clone(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use gltf_json::mesh::{Mode, Primitive, Semantic};
    use gltf_json::validation::Checked;

    use super::*;
    use crate::glb::{build_glb, Model};

    fn gltf_image_data(format: gltf::image::Format, pixels: Vec<u8>) -> gltf::image::Data {
        gltf::image::Data {
            pixels,
            format,
            width: 2,
            height: 1,
        }
    }

    /// A GLB with one indexed triangle under a translated node.
    fn translated_triangle_glb() -> Vec<u8> {
        let mut model = Model::new();
        let (indices, _) = model.buffer.push_indices(&mut model.root, &[0, 1, 2]);
        let pos = model
            .buffer
            .push_attribute(&mut model.root, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), pos.accessor);
        let prim = Primitive {
            attributes,
            indices: Some(indices),
            material: None,
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        };
        let bytes = build_glb(model, vec![prim], false).unwrap().unwrap();

        // Re-frame with the single node moved along +X.
        let glb = gltf::binary::Glb::from_slice(&bytes).unwrap();
        let mut root: gltf_json::Root = gltf_json::deserialize::from_slice(&glb.json).unwrap();
        root.nodes[0].translation = Some([10.0, 0.0, 0.0]);
        let mut json = gltf_json::serialize::to_vec(&root).unwrap();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let bin = glb.bin.unwrap().into_owned();
        gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: (12 + 8 + json.len() + 8 + bin.len()) as u32,
            },
            json: std::borrow::Cow::Owned(json),
            bin: Some(std::borrow::Cow::Owned(bin)),
        }
        .to_vec()
        .unwrap()
    }

    fn geometries(node: &SceneNode, out: &mut Vec<Geometry>) {
        match node {
            SceneNode::Group(children) | SceneNode::PagedLod { children, .. } => {
                for c in children {
                    geometries(c, out);
                }
            }
            SceneNode::Geometry(g) => out.push(g.clone()),
        }
    }

    #[test]
    fn gltf_image_conversion() {
        let tex = convert_gltf_image(
            &gltf_image_data(gltf::image::Format::R8G8B8A8, vec![255, 0, 0, 255, 0, 255, 0, 255]),
            "img".into(),
        );
        assert_eq!(tex.width, 2);
        assert_eq!(tex.height, 1);
        assert_eq!(tex.format, PixelFormat::Rgba);
        assert_eq!(tex.row_stride, 8);
        assert_eq!(tex.data.len(), 8);
    }

    #[test]
    fn wide_images_are_unreadable() {
        let tex = convert_gltf_image(&gltf_image_data(gltf::image::Format::R16, vec![0; 4]), "img".into());
        assert!(tex.format.channels().is_none());
    }

    #[test]
    fn node_transform_is_baked() {
        let bytes = translated_triangle_glb();
        let (doc, buffers, images) = gltf::import_slice(&bytes).unwrap();
        let scene = scene_from_document(&doc, &buffers, &images).unwrap();

        let mut found = Vec::new();
        geometries(&scene, &mut found);
        assert_eq!(found.len(), 1);
        let g = &found[0];
        assert_eq!(g.positions[1], [11.0, 0.0, 0.0]);
        assert!(matches!(
            &g.primitive_sets[0],
            PrimitiveSet::DrawElements {
                mode: DrawMode::Triangles,
                indices: IndexList::U8(_)
            }
        ));
        assert!(g.texture.is_none());
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_gltf(Path::new("/nonexistent/model.glb")).unwrap_err();
        assert!(matches!(err, ConvertError::Input(_)));
    }
}
