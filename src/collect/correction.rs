use glam::{DMat4, DVec3};

use crate::error::{ConvertError, Result};
use crate::types::BoundingBox;

use super::Drawable;

/// Maps a point from the scene's local frame into the corrected frame.
pub trait CoordinateTransform {
    fn transform_point(&self, point: DVec3) -> Result<DVec3>;
}

impl<F> CoordinateTransform for F
where
    F: Fn(DVec3) -> Result<DVec3>,
{
    fn transform_point(&self, point: DVec3) -> Result<DVec3> {
        self(point)
    }
}

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-12;
const MAX_SWEEPS: usize = 60;

/// Warp every vertex of `drawable` by the affine map that best carries its
/// bounding-box corners onto their transformed positions.
pub fn correct_drawable(drawable: &mut Drawable, transform: &dyn CoordinateTransform) -> Result<()> {
    let bounds = BoundingBox::from_points(drawable.positions.iter().map(|p| p.map(f64::from)));
    if bounds.is_empty() {
        return Ok(());
    }

    let corners = bounds.corners().map(DVec3::from_array);
    let mut corrected = [DVec3::ZERO; 8];
    for (out, corner) in corrected.iter_mut().zip(corners.iter()) {
        *out = transform.transform_point(*corner).map_err(|e| match e {
            ConvertError::Correction(_) => e,
            other => ConvertError::Correction(format!(
                "transform failed for drawable '{}': {other}",
                drawable.name
            )),
        })?;
    }

    let matrix = fit_affine(&corners, &corrected)?;
    for p in &mut drawable.positions {
        let v = DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2]));
        let out = (matrix * v.extend(1.0)).truncate();
        *p = out.as_vec3().to_array();
    }
    Ok(())
}

/// Least-squares affine fit of `source` onto `target`.
///
/// Solves `A X ≈ B` with `A` rows `[x, y, z, 1]` of the source points and
/// `B` rows of the targets, through a thin SVD pseudo-inverse so that flat or
/// collapsed boxes still yield the minimum-norm solution. The returned matrix
/// maps column vectors: `M * [x, y, z, 1]`.
pub fn fit_affine(source: &[DVec3; 8], target: &[DVec3; 8]) -> Result<DMat4> {
    let a: [[f64; 4]; 8] = source.map(|p| [p.x, p.y, p.z, 1.0]);
    let b: [[f64; 4]; 8] = target.map(|p| [p.x, p.y, p.z, 1.0]);

    let (w, v) = thin_svd(a);

    let sigma: [f64; 4] = std::array::from_fn(|j| column_norm(&w, j));
    let sigma_max = sigma.iter().copied().fold(0.0_f64, f64::max);
    if sigma_max == 0.0 || !sigma_max.is_finite() {
        return Err(ConvertError::Correction(
            "bounding box is not finite".into(),
        ));
    }

    // X = V Σ⁺ Uᵀ B, with U[:, j] = W[:, j] / σ_j
    let mut x = [[0.0_f64; 4]; 4];
    for j in 0..4 {
        if sigma[j] <= RANK_TOLERANCE * sigma_max {
            continue;
        }
        let inv = 1.0 / (sigma[j] * sigma[j]);
        let mut wtb = [0.0_f64; 4];
        for (c, slot) in wtb.iter_mut().enumerate() {
            *slot = (0..8).map(|k| w[k][j] * b[k][c]).sum::<f64>() * inv;
        }
        for r in 0..4 {
            for c in 0..4 {
                x[r][c] += v[r][j] * wtb[c];
            }
        }
    }

    if x.iter().flatten().any(|e| !e.is_finite()) {
        return Err(ConvertError::Correction(
            "affine fit produced non-finite coefficients".into(),
        ));
    }

    // Row r of X multiplies component r of the row vector, so it becomes column r.
    Ok(DMat4::from_cols_array_2d(&x))
}

/// One-sided Jacobi SVD of an 8×4 matrix.
///
/// Returns `(W, V)` with `W = A V` having mutually orthogonal columns; the
/// singular values are the column norms of `W`.
fn thin_svd(mut w: [[f64; 4]; 8]) -> ([[f64; 4]; 8], [[f64; 4]; 4]) {
    let mut v = [[0.0_f64; 4]; 4];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for p in 0..3 {
            for q in (p + 1)..4 {
                let mut alpha = 0.0;
                let mut beta = 0.0;
                let mut gamma = 0.0;
                for row in &w {
                    alpha += row[p] * row[p];
                    beta += row[q] * row[q];
                    gamma += row[p] * row[q];
                }
                if gamma == 0.0 || gamma.abs() <= f64::EPSILON * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                for row in w.iter_mut() {
                    let (wp, wq) = (row[p], row[q]);
                    row[p] = c * wp - s * wq;
                    row[q] = s * wp + c * wq;
                }
                for row in v.iter_mut() {
                    let (vp, vq) = (row[p], row[q]);
                    row[p] = c * vp - s * vq;
                    row[q] = s * vp + c * vq;
                }
            }
        }
        if !rotated {
            break;
        }
    }

    (w, v)
}

fn column_norm(w: &[[f64; 4]; 8], j: usize) -> f64 {
    w.iter().map(|row| row[j] * row[j]).sum::<f64>().sqrt()
}
