use std::collections::BTreeMap;

use gltf_json::mesh::{Mode, Primitive, Semantic};
use gltf_json::validation::Checked;
use gltf_json::Index;
use tracing::{debug, warn};

use crate::collect::{CollectedScene, Drawable};
use crate::error::{ConvertError, Result};
use crate::types::{BoundingBox, DrawMode, PrimitiveSet};

use super::buffer::AttributeAccessor;
use super::Model;

/// Counters reported after assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub primitives: usize,
    pub indexed: usize,
    pub ranged: usize,
    /// Attribute streams reused instead of written again.
    pub shared_streams: usize,
}

/// Accessors written once per drawable and reused by its indexed primitives.
#[derive(Default)]
struct SharedStreams {
    position: Option<Index<gltf_json::Accessor>>,
    normal: Option<Index<gltf_json::Accessor>>,
    texcoord: Option<Index<gltf_json::Accessor>>,
}

/// Turns drawables into glTF primitives over one model buffer.
pub struct PrimitiveAssembler<'a> {
    scene: &'a CollectedScene,
    primitives: Vec<Primitive>,
    bounds: BoundingBox,
    stats: AssemblyStats,
}

impl<'a> PrimitiveAssembler<'a> {
    pub fn new(scene: &'a CollectedScene) -> Self {
        Self {
            scene,
            primitives: Vec::new(),
            bounds: BoundingBox::empty(),
            stats: AssemblyStats::default(),
        }
    }

    /// Assemble every drawable of the scene in order.
    pub fn assemble_all(&mut self, model: &mut Model) -> Result<()> {
        let scene = self.scene;
        for drawable in &scene.drawables {
            self.assemble(model, drawable)?;
        }
        Ok(())
    }

    /// Emit one primitive per non-empty primitive set of `drawable`.
    pub fn assemble(&mut self, model: &mut Model, drawable: &Drawable) -> Result<()> {
        let mut shared = SharedStreams::default();
        let material = self.material_slot(drawable);
        let vertex_count = drawable.vertex_count();

        for set in &drawable.primitive_sets {
            let mode = gltf_mode(set.mode()).ok_or_else(|| ConvertError::UnsupportedTopology {
                drawable: drawable.name.clone(),
                mode: set.mode(),
            })?;

            let mut attributes = BTreeMap::new();
            let indices = match set {
                PrimitiveSet::DrawElements { indices, .. } => {
                    if indices.is_empty() {
                        debug!(drawable = %drawable.name, "Skipping empty index list");
                        continue;
                    }
                    let list: Vec<u32> = indices.iter().collect();
                    if let Some(&bad) = list.iter().find(|&&i| i as usize >= vertex_count) {
                        return Err(ConvertError::InvalidGeometry(format!(
                            "index {bad} exceeds {vertex_count} vertices in drawable '{}'",
                            drawable.name
                        )));
                    }
                    let (accessor, _) = model.buffer.push_indices(&mut model.root, &list);

                    let position = match shared.position {
                        Some(a) => {
                            self.stats.shared_streams += 1;
                            a
                        }
                        None => {
                            let a = self.write_positions(model, &drawable.positions);
                            shared.position = Some(a);
                            a
                        }
                    };
                    attributes.insert(Checked::Valid(Semantic::Positions), position);

                    if let Some(normals) = &drawable.normals {
                        let a = match shared.normal {
                            Some(a) => {
                                self.stats.shared_streams += 1;
                                a
                            }
                            None => *shared
                                .normal
                                .insert(model.buffer.push_attribute(&mut model.root, normals).accessor),
                        };
                        attributes.insert(Checked::Valid(Semantic::Normals), a);
                    }
                    if let Some(texcoords) = &drawable.texcoords {
                        let a = match shared.texcoord {
                            Some(a) => {
                                self.stats.shared_streams += 1;
                                a
                            }
                            None => *shared
                                .texcoord
                                .insert(model.buffer.push_attribute(&mut model.root, texcoords).accessor),
                        };
                        attributes.insert(Checked::Valid(Semantic::TexCoords(0)), a);
                    }

                    self.stats.indexed += 1;
                    Some(accessor)
                }
                PrimitiveSet::DrawArrays { first, count, .. } => {
                    if *count == 0 {
                        debug!(drawable = %drawable.name, "Skipping empty draw range");
                        continue;
                    }
                    let start = *first as usize;
                    let end = start + *count as usize;
                    if end > vertex_count {
                        return Err(ConvertError::InvalidGeometry(format!(
                            "range {start}..{end} exceeds {vertex_count} vertices in drawable '{}'",
                            drawable.name
                        )));
                    }

                    let position = self.write_positions(model, &drawable.positions[start..end]);
                    attributes.insert(Checked::Valid(Semantic::Positions), position);
                    if let Some(normals) = &drawable.normals {
                        let a = model.buffer.push_attribute(&mut model.root, &normals[start..end]);
                        attributes.insert(Checked::Valid(Semantic::Normals), a.accessor);
                    }
                    if let Some(texcoords) = &drawable.texcoords {
                        let a = model.buffer.push_attribute(&mut model.root, &texcoords[start..end]);
                        attributes.insert(Checked::Valid(Semantic::TexCoords(0)), a.accessor);
                    }

                    self.stats.ranged += 1;
                    None
                }
            };

            self.primitives.push(Primitive {
                attributes,
                indices,
                material,
                mode: Checked::Valid(mode),
                targets: None,
                extensions: Default::default(),
                extras: Default::default(),
            });
            self.stats.primitives += 1;
        }

        Ok(())
    }

    /// Material index of the drawable: the position of its texture among the
    /// scene's distinct textures.
    pub fn material_slot(&self, drawable: &Drawable) -> Option<Index<gltf_json::Material>> {
        let texture = drawable.texture.as_ref()?;
        match self.scene.texture_slot(texture) {
            Some(slot) => Some(Index::new(slot as u32)),
            None => {
                warn!(drawable = %drawable.name, "Texture missing from scene list, leaving primitive untextured");
                None
            }
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn stats(&self) -> AssemblyStats {
        self.stats
    }

    pub fn into_primitives(self) -> Vec<Primitive> {
        self.primitives
    }

    fn write_positions(&mut self, model: &mut Model, positions: &[[f32; 3]]) -> Index<gltf_json::Accessor> {
        let attr: AttributeAccessor<3> = model.buffer.push_attribute(&mut model.root, positions);
        self.bounds = self.bounds.merge(&attr.bounds());
        attr.accessor
    }
}

/// glTF mode for the triangle topologies; everything else is rejected.
pub fn gltf_mode(mode: DrawMode) -> Option<Mode> {
    match mode {
        DrawMode::Triangles => Some(Mode::Triangles),
        DrawMode::TriangleStrip => Some(Mode::TriangleStrip),
        DrawMode::TriangleFan => Some(Mode::TriangleFan),
        _ => None,
    }
}
