pub mod correction;
pub mod normals;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::{Geometry, PrimitiveSet, SceneNode, TextureRef};

pub use correction::{CoordinateTransform, correct_drawable, fit_affine};

/// Traversal switches.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Collect geometry from every tier instead of only the paged tier.
    pub all_tiers: bool,
    /// Generate smooth normals for drawables that have none.
    pub smooth_normals: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            all_tiers: false,
            smooth_normals: true,
        }
    }
}

/// A validated leaf geometry ready for assembly.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub primitive_sets: Vec<PrimitiveSet>,
    pub texture: Option<TextureRef>,
}

impl Drawable {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Everything the assembler needs, in traversal order.
#[derive(Debug, Default)]
pub struct CollectedScene {
    pub drawables: Vec<Drawable>,
    /// Distinct textures in order of first use.
    pub textures: Vec<TextureRef>,
    /// File names of deeper tiers referenced by paged nodes.
    pub tier_files: Vec<String>,
    /// Geometries skipped for having no vertices or no draw calls.
    pub skipped: usize,
}

impl CollectedScene {
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Position of `texture` in the distinct list, by identity.
    pub fn texture_slot(&self, texture: &TextureRef) -> Option<usize> {
        self.textures.iter().position(|t| Arc::ptr_eq(t, texture))
    }
}

/// Walk the scene graph depth-first and gather its drawables.
///
/// Geometry beneath a paged node forms the current tier. Unless
/// `all_tiers` is set only that tier is kept, falling back to the
/// remaining geometry when the tier is empty.
pub fn collect(
    root: SceneNode,
    options: &CollectOptions,
    correction: Option<&dyn CoordinateTransform>,
) -> Result<CollectedScene> {
    let mut scene = CollectedScene::default();
    let mut found: Vec<(bool, Drawable)> = Vec::new();
    let mut stack = vec![(root, false)];

    while let Some((node, paged)) = stack.pop() {
        match node {
            SceneNode::Group(children) => {
                stack.extend(children.into_iter().rev().map(|c| (c, paged)));
            }
            SceneNode::PagedLod {
                children,
                tier_files,
            } => {
                scene.tier_files.extend(tier_files);
                stack.extend(children.into_iter().rev().map(|c| (c, true)));
            }
            SceneNode::Geometry(geometry) => match into_drawable(geometry) {
                Some(drawable) => found.push((paged, drawable)),
                None => scene.skipped += 1,
            },
        }
    }

    let has_paged = found.iter().any(|(paged, _)| *paged);
    let keep_paged = !options.all_tiers && has_paged;
    if !options.all_tiers && !has_paged && !found.is_empty() {
        debug!("no paged geometry, falling back to remaining tier");
    }

    for (paged, mut drawable) in found {
        if keep_paged && !paged {
            continue;
        }
        if let Some(transform) = correction {
            correct_drawable(&mut drawable, transform)?;
        }
        if options.smooth_normals && drawable.normals.is_none() {
            drawable.normals = Some(normals::smooth_normals(
                &drawable.positions,
                &drawable.primitive_sets,
            ));
        }
        if let Some(texture) = &drawable.texture {
            if scene.texture_slot(texture).is_none() {
                scene.textures.push(Arc::clone(texture));
            }
        }
        scene.drawables.push(drawable);
    }

    info!(
        drawables = scene.drawables.len(),
        textures = scene.textures.len(),
        tiers = scene.tier_files.len(),
        skipped = scene.skipped,
        "Collected scene"
    );

    Ok(scene)
}

/// Validate a geometry, dropping attribute arrays that do not match its
/// vertex count. `None` when there is nothing to draw.
fn into_drawable(geometry: Geometry) -> Option<Drawable> {
    let Geometry {
        name,
        positions,
        normals,
        texcoords,
        primitive_sets,
        texture,
    } = geometry;

    if positions.is_empty() || primitive_sets.is_empty() {
        debug!(
            drawable = %name,
            vertices = positions.len(),
            sets = primitive_sets.len(),
            "Skipping empty geometry"
        );
        return None;
    }

    let vertex_count = positions.len();
    let normals = match normals.len() {
        0 => None,
        n if n == vertex_count => Some(normals),
        n => {
            warn!(drawable = %name, normals = n, vertices = vertex_count, "Dropping mismatched normals");
            None
        }
    };
    let texcoords = match texcoords.len() {
        0 => None,
        n if n == vertex_count => Some(texcoords),
        n => {
            warn!(drawable = %name, texcoords = n, vertices = vertex_count, "Dropping mismatched texcoords");
            None
        }
    };

    Some(Drawable {
        name,
        positions,
        normals,
        texcoords,
        primitive_sets,
        texture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::types::{PixelFormat, TextureImage};
    use glam::DVec3;

    fn tri(name: &str) -> Geometry {
        Geometry::triangle_soup(
            name,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        )
    }

    fn texture() -> TextureRef {
        Arc::new(TextureImage::new("tex", 1, 1, PixelFormat::Rgb, vec![1, 2, 3]))
    }

    fn names(scene: &CollectedScene) -> Vec<&str> {
        scene.drawables.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn preorder_traversal_order() {
        let root = SceneNode::Group(vec![
            SceneNode::Geometry(tri("a")),
            SceneNode::Group(vec![SceneNode::Geometry(tri("b")), SceneNode::Geometry(tri("c"))]),
            SceneNode::Geometry(tri("d")),
        ]);
        let scene = collect(root, &CollectOptions::default(), None).unwrap();
        assert_eq!(names(&scene), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn paged_tier_wins_over_other_geometry() {
        let root = SceneNode::Group(vec![
            SceneNode::Geometry(tri("coarse")),
            SceneNode::PagedLod {
                children: vec![SceneNode::Geometry(tri("fine"))],
                tier_files: vec!["tile_L17_0.osgb".into()],
            },
        ]);
        let scene = collect(root.clone(), &CollectOptions::default(), None).unwrap();
        assert_eq!(names(&scene), vec!["fine"]);
        assert_eq!(scene.tier_files, vec!["tile_L17_0.osgb".to_string()]);

        let options = CollectOptions {
            all_tiers: true,
            ..Default::default()
        };
        let scene = collect(root, &options, None).unwrap();
        assert_eq!(names(&scene), vec!["coarse", "fine"]);
    }

    #[test]
    fn falls_back_when_no_paged_geometry() {
        let root = SceneNode::Group(vec![
            SceneNode::PagedLod {
                children: vec![],
                tier_files: vec!["child.osgb".into()],
            },
            SceneNode::Geometry(tri("plain")),
        ]);
        let scene = collect(root, &CollectOptions::default(), None).unwrap();
        assert_eq!(names(&scene), vec!["plain"]);
    }

    #[test]
    fn empty_geometry_is_skipped() {
        let empty = Geometry {
            name: "empty".into(),
            ..Default::default()
        };
        let mut no_sets = tri("no_sets");
        no_sets.primitive_sets.clear();
        let root = SceneNode::Group(vec![SceneNode::Geometry(empty), SceneNode::Geometry(no_sets)]);

        let scene = collect(root, &CollectOptions::default(), None).unwrap();
        assert!(scene.is_empty());
        assert_eq!(scene.skipped, 2);
    }

    #[test]
    fn mismatched_attributes_are_dropped() {
        let mut g = tri("bad_attrs");
        g.normals = vec![[0.0, 0.0, 1.0]];
        g.texcoords = vec![[0.0, 0.0]; 3];
        let options = CollectOptions {
            smooth_normals: false,
            ..Default::default()
        };
        let scene = collect(SceneNode::Geometry(g), &options, None).unwrap();
        let d = &scene.drawables[0];
        assert!(d.normals.is_none());
        assert_eq!(d.texcoords.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn smooth_normals_fill_missing() {
        let scene = collect(SceneNode::Geometry(tri("n")), &CollectOptions::default(), None).unwrap();
        let normals = scene.drawables[0].normals.as_ref().unwrap();
        assert_eq!(normals.len(), 3);
        assert_eq!(normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn shared_texture_collected_once() {
        let tex = texture();
        let mut a = tri("a");
        a.texture = Some(Arc::clone(&tex));
        let mut b = tri("b");
        b.texture = Some(Arc::clone(&tex));
        let mut c = tri("c");
        c.texture = Some(texture());

        let root = SceneNode::Group(vec![
            SceneNode::Geometry(a),
            SceneNode::Geometry(b),
            SceneNode::Geometry(c),
        ]);
        let scene = collect(root, &CollectOptions::default(), None).unwrap();
        assert_eq!(scene.textures.len(), 2);
        assert_eq!(scene.texture_slot(&tex), Some(0));
    }

    #[test]
    fn correction_is_applied() {
        let lift = |p: DVec3| -> Result<DVec3> { Ok(p + DVec3::new(0.0, 0.0, 10.0)) };
        let scene = collect(SceneNode::Geometry(tri("t")), &CollectOptions::default(), Some(&lift)).unwrap();
        let z = scene.drawables[0].positions[1][2];
        assert!((z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn smooth_normals_follow_corrected_positions() {
        let tilt = |p: DVec3| -> Result<DVec3> { Ok(DVec3::new(p.x, -p.z, p.y)) };
        let scene = collect(SceneNode::Geometry(tri("t")), &CollectOptions::default(), Some(&tilt)).unwrap();
        let d = &scene.drawables[0];
        let expected = normals::smooth_normals(&d.positions, &d.primitive_sets);
        assert_eq!(d.normals.as_ref(), Some(&expected));
        let n = d.normals.as_ref().unwrap()[0];
        assert!(n[2].abs() < 1e-4);
        assert!((n[1].abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn correction_failure_aborts() {
        let fail = |_: DVec3| -> Result<DVec3> { Err(ConvertError::Correction("out of area".into())) };
        let err = collect(SceneNode::Geometry(tri("t")), &CollectOptions::default(), Some(&fail)).unwrap_err();
        assert!(matches!(err, ConvertError::Correction(_)));
    }
}
