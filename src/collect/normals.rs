use glam::Vec3;

use crate::types::{DrawMode, PrimitiveSet};

/// Expand a primitive set into triangles, dropping degenerate and
/// out-of-range ones. Non-triangular topologies yield nothing.
pub fn triangles(set: &PrimitiveSet, vertex_count: usize) -> Vec<[u32; 3]> {
    let sequence: Vec<u32> = match set {
        PrimitiveSet::DrawArrays { first, count, .. } => (*first..first.saturating_add(*count)).collect(),
        PrimitiveSet::DrawElements { indices, .. } => indices.iter().collect(),
    };

    let raw: Vec<[u32; 3]> = match set.mode() {
        DrawMode::Triangles => sequence
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        DrawMode::TriangleStrip => sequence
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[1], w[0], w[2]]
                }
            })
            .collect(),
        DrawMode::TriangleFan => match sequence.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|w| [hub, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    raw.into_iter()
        .filter(|t| t.iter().all(|&i| (i as usize) < vertex_count))
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .collect()
}

/// Area-weighted smooth vertex normals over every triangle of every set.
pub fn smooth_normals(positions: &[[f32; 3]], sets: &[PrimitiveSet]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];

    for set in sets {
        for [a, b, c] in triangles(set, positions.len()) {
            let pa = Vec3::from_array(positions[a as usize]);
            let pb = Vec3::from_array(positions[b as usize]);
            let pc = Vec3::from_array(positions[c as usize]);
            // Unnormalized cross product weights by twice the triangle area.
            let face = (pb - pa).cross(pc - pa);
            accum[a as usize] += face;
            accum[b as usize] += face;
            accum[c as usize] += face;
        }
    }

    accum
        .into_iter()
        .map(|n| {
            let unit = n.normalize_or_zero();
            if unit == Vec3::ZERO {
                Vec3::Z.to_array()
            } else {
                unit.to_array()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexList;
    use approx::assert_relative_eq;

    #[test]
    fn strip_alternates_winding() {
        let set = PrimitiveSet::DrawArrays {
            mode: DrawMode::TriangleStrip,
            first: 0,
            count: 4,
        };
        assert_eq!(triangles(&set, 4), vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn fan_shares_first_vertex() {
        let set = PrimitiveSet::DrawElements {
            mode: DrawMode::TriangleFan,
            indices: IndexList::U16(vec![5, 6, 7, 8]),
        };
        assert_eq!(triangles(&set, 9), vec![[5, 6, 7], [5, 7, 8]]);
    }

    #[test]
    fn out_of_range_and_unsupported_are_dropped() {
        let set = PrimitiveSet::DrawElements {
            mode: DrawMode::Triangles,
            indices: IndexList::U32(vec![0, 1, 9]),
        };
        assert!(triangles(&set, 3).is_empty());

        let lines = PrimitiveSet::DrawArrays {
            mode: DrawMode::Lines,
            first: 0,
            count: 4,
        };
        assert!(triangles(&lines, 4).is_empty());
    }

    #[test]
    fn flat_quad_normals_point_up() {
        let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let sets = vec![PrimitiveSet::DrawElements {
            mode: DrawMode::Triangles,
            indices: IndexList::U8(vec![0, 1, 2, 0, 2, 3]),
        }];
        let normals = smooth_normals(&positions, &sets);
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert_relative_eq!(n[2], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn unreferenced_vertex_gets_default_normal() {
        let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [5.0, 5.0, 5.0]];
        let sets = vec![PrimitiveSet::DrawArrays {
            mode: DrawMode::Triangles,
            first: 0,
            count: 3,
        }];
        let normals = smooth_normals(&positions, &sets);
        assert_eq!(normals[3], [0.0, 0.0, 1.0]);
        assert_relative_eq!(normals[0][1], -1.0, epsilon = 1e-6);
    }
}
