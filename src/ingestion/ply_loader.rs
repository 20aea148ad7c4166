use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::types::{Geometry, PixelFormat, SceneNode, TextureImage, TextureRef};

/// Two UVs closer than this on both axes address the same texel.
const UV_EPSILON: f32 = 1e-4;

const FLIP_MARKER: &str = "modified by flipply";
const TEXTURE_FILE: &str = "TextureFile";

/// Load a PLY triangle soup as a flat scene, one geometry per texture.
pub fn load_ply(path: &Path) -> Result<SceneNode> {
    let file = File::open(path)
        .map_err(|e| ConvertError::Input(format!("Failed to open PLY: {e}")))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| ConvertError::Input(format!("Failed to parse PLY: {e}")))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let header = HeaderComments::parse(&ply.header.comments, base_dir);
    let textures: Vec<TextureRef> = header
        .texture_files
        .iter()
        .map(|p| Arc::new(load_texture(p)))
        .collect();

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| ConvertError::Input("PLY file missing 'vertex' element".into()))?;

    debug!(
        vertex_count = vertices.len(),
        textures = textures.len(),
        flipped = header.flipped,
        "Parsing PLY vertices"
    );

    let mut pool = VertexPool::read(vertices)?;
    let source_count = pool.positions.len() as u32;

    let mut groups: BTreeMap<usize, FaceGroup> = BTreeMap::new();
    if let Some(faces) = ply.payload.get("face") {
        debug!(face_count = faces.len(), "Parsing PLY faces");
        for face in faces {
            let mut corners = face_corners(face, &pool, source_count)?;
            if corners.len() < 3 {
                continue;
            }
            if header.flipped {
                corners.reverse();
            }
            let texnumber = match face.get("texnumber") {
                Some(prop) => int_value(prop, "texnumber")?,
                None => 0,
            };

            let group = groups.entry(texnumber).or_default();
            let resolved: Vec<u32> = corners
                .into_iter()
                .map(|(vertex, uv)| group.resolve(vertex, uv, &mut pool))
                .collect();

            // Fan-triangulate polygons with >3 vertices
            for i in 1..resolved.len() - 1 {
                group.indices.extend_from_slice(&[resolved[0], resolved[i], resolved[i + 1]]);
            }
        }
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ply".into());

    let mut children = Vec::with_capacity(groups.len());
    for (texnumber, group) in groups {
        if group.indices.is_empty() {
            continue;
        }
        let texture = textures.get(texnumber).cloned();
        if texture.is_none() && !textures.is_empty() {
            warn!(texnumber, "Face group references a missing TextureFile");
        }
        let geometry = group.into_geometry(format!("{stem}_{texnumber}"), &pool, texture);
        children.push(SceneNode::Geometry(geometry));
    }

    Ok(SceneNode::Group(children))
}

/// Directives carried in PLY header comments.
#[derive(Debug, Default)]
struct HeaderComments {
    /// Faces were written with inverted winding.
    flipped: bool,
    /// Texture paths in `texnumber` order.
    texture_files: Vec<PathBuf>,
}

impl HeaderComments {
    fn parse(comments: &[String], base_dir: &Path) -> Self {
        let mut header = HeaderComments::default();
        for comment in comments {
            let comment = comment.trim();
            if comment.contains(FLIP_MARKER) {
                header.flipped = true;
            } else if let Some(name) = comment.strip_prefix(TEXTURE_FILE) {
                let name = Path::new(name.trim());
                let resolved = if name.is_absolute() {
                    name.to_path_buf()
                } else {
                    base_dir.join(name)
                };
                header.texture_files.push(resolved);
            }
        }
        header
    }
}

/// Source vertices plus the seam duplicates appended behind them.
#[derive(Debug)]
struct VertexPool {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    /// Per-vertex UVs, already V-flipped. Used for faces without `texcoord`.
    texcoords: Vec<[f32; 2]>,
}

impl VertexPool {
    fn read(vertices: &[DefaultElement]) -> Result<Self> {
        let first = vertices.first();
        let has_normals = first.is_some_and(|v| v.contains_key("nx"));
        let uv_keys = first.and_then(|el| {
            [("texture_u", "texture_v"), ("s", "t"), ("u", "v")]
                .into_iter()
                .find(|(u, v)| el.contains_key(*u) && el.contains_key(*v))
        });

        let mut pool = VertexPool {
            positions: Vec::with_capacity(vertices.len()),
            normals: Vec::new(),
            texcoords: Vec::new(),
        };

        for vertex in vertices {
            pool.positions.push([
                get_float_property(vertex, "x")?,
                get_float_property(vertex, "y")?,
                get_float_property(vertex, "z")?,
            ]);
            if has_normals {
                pool.normals.push([
                    get_float_property(vertex, "nx")?,
                    get_float_property(vertex, "ny")?,
                    get_float_property(vertex, "nz")?,
                ]);
            }
            if let Some((u, v)) = uv_keys {
                pool.texcoords.push([
                    get_float_property(vertex, u)?,
                    1.0 - get_float_property(vertex, v)?,
                ]);
            }
        }
        Ok(pool)
    }

    /// Append a copy of `vertex` and return its index.
    fn duplicate(&mut self, vertex: u32) -> u32 {
        let i = vertex as usize;
        let index = self.positions.len() as u32;
        self.positions.push(self.positions[i]);
        if !self.normals.is_empty() {
            self.normals.push(self.normals[i]);
        }
        index
    }
}

/// Faces sharing one `texnumber`, with their own UV per vertex.
#[derive(Debug, Default)]
struct FaceGroup {
    /// Source vertex → (emitted index, UV) variants seen in this group.
    variants: HashMap<u32, Vec<(u32, [f32; 2])>>,
    uvs: HashMap<u32, [f32; 2]>,
    indices: Vec<u32>,
}

impl FaceGroup {
    /// Map a face corner to a vertex index, splitting the vertex when this
    /// group already gave it a different UV.
    fn resolve(&mut self, vertex: u32, uv: Option<[f32; 2]>, pool: &mut VertexPool) -> u32 {
        let Some(uv) = uv else {
            return vertex;
        };
        let variants = self.variants.entry(vertex).or_default();
        if let Some(&(index, _)) = variants.iter().find(|(_, seen)| uv_matches(*seen, uv)) {
            return index;
        }
        let index = if variants.is_empty() {
            vertex
        } else {
            pool.duplicate(vertex)
        };
        variants.push((index, uv));
        self.uvs.insert(index, uv);
        index
    }

    /// Compact the group to the vertices it references.
    fn into_geometry(self, name: String, pool: &VertexPool, texture: Option<TextureRef>) -> Geometry {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut order: Vec<u32> = Vec::new();
        let indices: Vec<u32> = self
            .indices
            .iter()
            .map(|&old| {
                *remap.entry(old).or_insert_with(|| {
                    order.push(old);
                    (order.len() - 1) as u32
                })
            })
            .collect();

        let positions = order.iter().map(|&i| pool.positions[i as usize]).collect();
        let normals = if pool.normals.is_empty() {
            Vec::new()
        } else {
            order.iter().map(|&i| pool.normals[i as usize]).collect()
        };
        let texcoords = if self.uvs.is_empty() {
            Vec::new()
        } else {
            order
                .iter()
                .map(|i| self.uvs.get(i).copied().unwrap_or([0.0, 0.0]))
                .collect()
        };

        Geometry {
            texcoords,
            normals,
            texture,
            ..Geometry::triangle_soup(name, positions, indices)
        }
    }
}

fn uv_matches(a: [f32; 2], b: [f32; 2]) -> bool {
    (a[0] - b[0]).abs() <= UV_EPSILON && (a[1] - b[1]).abs() <= UV_EPSILON
}

/// Vertex indices of a face paired with the UV each corner uses.
fn face_corners(
    face: &DefaultElement,
    pool: &VertexPool,
    vertex_count: u32,
) -> Result<Vec<(u32, Option<[f32; 2]>)>> {
    let indices = get_index_list(face)?;
    if let Some(&bad) = indices.iter().find(|&&i| i >= vertex_count) {
        return Err(ConvertError::Input(format!(
            "PLY face references vertex {bad} of {vertex_count}"
        )));
    }

    let face_uvs = match face.get("texcoord") {
        Some(prop) => float_list(prop, "texcoord")?,
        None => Vec::new(),
    };

    let corners = if !face_uvs.is_empty() && face_uvs.len() == indices.len() * 2 {
        indices
            .iter()
            .zip(face_uvs.chunks_exact(2))
            .map(|(&i, uv)| (i, Some([uv[0], 1.0 - uv[1]])))
            .collect()
    } else {
        if !face_uvs.is_empty() {
            warn!(
                corners = indices.len(),
                values = face_uvs.len(),
                "Ignoring mismatched face texcoord list"
            );
        }
        indices
            .iter()
            .map(|&i| (i, pool.texcoords.get(i as usize).copied()))
            .collect()
    };
    Ok(corners)
}

/// Extract a float property, handling Float/Double/Int/Short types.
fn get_float_property(element: &DefaultElement, key: &str) -> Result<f32> {
    let prop = element
        .get(key)
        .ok_or_else(|| ConvertError::Input(format!("PLY vertex missing property '{key}'")))?;

    match prop {
        Property::Float(v) => Ok(*v),
        Property::Double(v) => Ok(*v as f32),
        Property::Int(v) => Ok(*v as f32),
        Property::Short(v) => Ok(*v as f32),
        Property::UInt(v) => Ok(*v as f32),
        Property::UShort(v) => Ok(*v as f32),
        Property::Char(v) => Ok(*v as f32),
        Property::UChar(v) => Ok(*v as f32),
        _ => Err(ConvertError::Input(format!(
            "PLY property '{key}' has unsupported type"
        ))),
    }
}

fn int_value(prop: &Property, key: &str) -> Result<usize> {
    let value = match prop {
        Property::Char(v) => i64::from(*v),
        Property::UChar(v) => i64::from(*v),
        Property::Short(v) => i64::from(*v),
        Property::UShort(v) => i64::from(*v),
        Property::Int(v) => i64::from(*v),
        Property::UInt(v) => i64::from(*v),
        _ => {
            return Err(ConvertError::Input(format!(
                "PLY property '{key}' is not an integer"
            )));
        }
    };
    usize::try_from(value)
        .map_err(|_| ConvertError::Input(format!("PLY property '{key}' is negative: {value}")))
}

fn float_list(prop: &Property, key: &str) -> Result<Vec<f32>> {
    match prop {
        Property::ListFloat(v) => Ok(v.clone()),
        Property::ListDouble(v) => Ok(v.iter().map(|&x| x as f32).collect()),
        _ => Err(ConvertError::Input(format!(
            "PLY property '{key}' is not a float list"
        ))),
    }
}

/// Extract the index list from a face element.
fn get_index_list(face: &DefaultElement) -> Result<Vec<u32>> {
    let key = if face.contains_key("vertex_indices") {
        "vertex_indices"
    } else {
        "vertex_index"
    };

    let prop = face
        .get(key)
        .ok_or_else(|| ConvertError::Input("PLY face missing vertex_indices property".into()))?;

    match prop {
        Property::ListInt(v) => Ok(v.iter().map(|&i| i as u32).collect()),
        Property::ListUInt(v) => Ok(v.clone()),
        Property::ListUChar(v) => Ok(v.iter().map(|&i| u32::from(i)).collect()),
        Property::ListShort(v) => Ok(v.iter().map(|&i| i as u32).collect()),
        Property::ListUShort(v) => Ok(v.iter().map(|&i| u32::from(i)).collect()),
        _ => Err(ConvertError::Input(
            "PLY face vertex_indices has unsupported type".into(),
        )),
    }
}

/// Decode a texture file into its native 8-bit layout. An unreadable file
/// yields an image the packer replaces with its placeholder.
fn load_texture(path: &Path) -> TextureImage {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match image::open(path) {
        Ok(img) => {
            let (width, height) = (img.width(), img.height());
            let (format, data) = match img {
                DynamicImage::ImageLuma8(buf) => (PixelFormat::Luminance, buf.into_raw()),
                DynamicImage::ImageRgb8(buf) => (PixelFormat::Rgb, buf.into_raw()),
                DynamicImage::ImageRgba8(buf) => (PixelFormat::Rgba, buf.into_raw()),
                other => (PixelFormat::Rgb, other.to_rgb8().into_raw()),
            };
            debug!(path = %path.display(), width, height, "Loaded texture");
            TextureImage::new(name, width, height, format, data)
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to load texture: {e}");
            TextureImage::new(name, 0, 0, PixelFormat::Other(0), Vec::new())
        }
    }
}
