//! Synthetic sky cubes for exercising the pipeline without image files.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cube_common::{ArrayCube, AxisRole, PipelineResult};

/// Shape and content parameters of a synthetic cube.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub polarizations: usize,
    pub sources: usize,
    pub noise: f32,
    /// Pixels farther than this fraction of the half-diagonal from the
    /// centre are blanked to NaN, like a primary-beam cut.
    pub mask_radius: f32,
    pub seed: u64,
}

struct Source {
    x: f32,
    y: f32,
    sigma: f32,
    peak: f32,
    /// Channel of peak emission.
    line_centre: f32,
    line_width: f32,
}

/// Build a `(polarization, spectral, y, x)` cube of Gaussian sources with
/// Gaussian line profiles on a noise floor.
///
/// Stokes I carries the full flux; the other polarizations carry a fixed
/// fraction of it.
pub fn build_cube(source_id: &str, spec: &SyntheticSpec) -> PipelineResult<ArrayCube> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let channels = spec.channels.max(1);
    let pols = spec.polarizations.max(1);

    let sources: Vec<Source> = (0..spec.sources)
        .map(|_| Source {
            x: rng.gen_range(0.0..spec.width as f32),
            y: rng.gen_range(0.0..spec.height as f32),
            sigma: rng.gen_range(1.0..(spec.width.min(spec.height) as f32 / 8.0).max(1.5)),
            peak: rng.gen_range(0.5..5.0),
            line_centre: rng.gen_range(0.0..channels as f32),
            line_width: rng.gen_range(1.0..(channels as f32 / 3.0).max(1.5)),
        })
        .collect();

    let cx = spec.width as f32 / 2.0;
    let cy = spec.height as f32 / 2.0;
    let cut = spec.mask_radius * (cx * cx + cy * cy).sqrt();

    let mut values = Vec::with_capacity(pols * channels * spec.height * spec.width);
    for pol in 0..pols {
        let fraction = if pol == 0 { 1.0 } else { 0.1 / pol as f32 };
        for channel in 0..channels {
            for y in 0..spec.height {
                for x in 0..spec.width {
                    let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                    if spec.mask_radius > 0.0 && (dx * dx + dy * dy).sqrt() > cut {
                        values.push(f32::NAN);
                        continue;
                    }
                    let flux: f32 = sources
                        .iter()
                        .map(|s| {
                            let r2 = ((x as f32 - s.x).powi(2) + (y as f32 - s.y).powi(2))
                                / (2.0 * s.sigma * s.sigma);
                            let l2 = (channel as f32 - s.line_centre).powi(2)
                                / (2.0 * s.line_width * s.line_width);
                            s.peak * (-(r2 + l2)).exp()
                        })
                        .sum();
                    let noise = if spec.noise > 0.0 {
                        rng.gen_range(-spec.noise..spec.noise)
                    } else {
                        0.0
                    };
                    values.push(fraction * flux + noise);
                }
            }
        }
    }

    ArrayCube::from_vec(
        source_id,
        &[pols, channels, spec.height, spec.width],
        values,
        vec![
            AxisRole::Polarization,
            AxisRole::Spectral,
            AxisRole::SpatialY,
            AxisRole::SpatialX,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::DataCube;

    fn spec() -> SyntheticSpec {
        SyntheticSpec {
            width: 24,
            height: 16,
            channels: 3,
            polarizations: 2,
            sources: 4,
            noise: 0.01,
            mask_radius: 0.9,
            seed: 11,
        }
    }

    #[test]
    fn test_shape_and_roles() {
        let cube = build_cube("synthetic", &spec()).unwrap();
        assert_eq!(cube.shape(), &[2, 3, 16, 24]);
        assert_eq!(cube.axis_roles()[1], AxisRole::Spectral);
    }

    #[test]
    fn test_same_seed_same_cube() {
        use cube_common::{AxisSlice, Hyperslab};
        let slab = Hyperslab::new(
            vec![
                AxisSlice::full(2),
                AxisSlice::full(3),
                AxisSlice::full(16),
                AxisSlice::full(24),
            ],
            (3, 2),
        );
        let a: Vec<u32> = build_cube("a", &spec()).unwrap().read(&slab).unwrap().iter().map(f32::to_bits).collect();
        let b: Vec<u32> = build_cube("b", &spec()).unwrap().read(&slab).unwrap().iter().map(f32::to_bits).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_corners_masked() {
        let cube = build_cube("m", &spec()).unwrap();
        use cube_common::{AxisSlice, Hyperslab};
        let slab = Hyperslab::new(
            vec![AxisSlice::new(0, 1), AxisSlice::new(0, 1), AxisSlice::full(16), AxisSlice::full(24)],
            (3, 2),
        );
        let view = cube.read(&slab).unwrap();
        assert!(view.get(&[0, 0, 0, 0]).unwrap().is_nan());
        assert!(view.get(&[0, 0, 8, 12]).unwrap().is_finite());
    }
}
