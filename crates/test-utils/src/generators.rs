//! Test data generators for creating synthetic cube data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cube_common::{ArrayCube, AxisRole};

/// Creates a test plane with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Returns
///
/// A `Vec<f32>` in row-major order (row 0 first, then row 1, etc.)
///
/// # Example
///
/// ```
/// use test_utils::create_test_plane;
///
/// let plane = create_test_plane(10, 5);
/// assert_eq!(plane.len(), 50);
/// assert_eq!(plane[1], 1000.0); // col=1, row=0
/// assert_eq!(plane[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_plane(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a plane of flux-like values: a Gaussian source on a flat
/// background, peaking at `peak` in the centre.
pub fn create_source_plane(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let sigma = (width.min(height) as f32 / 6.0).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let r2 = (dx * dx + dy * dy) / (2.0 * sigma * sigma);
            data.push(1e-3 + peak * (-r2).exp());
        }
    }
    data
}

/// Creates a plane of uniform noise in `[low, high)` from a fixed seed.
pub fn create_noise_plane(width: usize, height: usize, low: f32, high: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..width * height).map(|_| rng.gen_range(low..high)).collect()
}

/// Creates a plane with NaN values at specified positions.
///
/// # Arguments
///
/// * `nan_positions` - List of (col, row) positions that should be NaN
///
/// Other cells hold `create_test_plane` values.
pub fn create_plane_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = create_test_plane(width, height);
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Creates a constant plane.
pub fn create_constant_plane(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Value stored at `(pol, channel, row, col)` by [`create_test_cube`].
pub fn test_cube_value(pol: usize, channel: usize, row: usize, col: usize) -> f32 {
    (pol * 100_000 + channel * 1000 + row * 10 + col) as f32
}

/// Creates a 4-d cube with axes `(polarization, spectral, y, x)` holding
/// [`test_cube_value`] at every position.
pub fn create_test_cube(
    source_id: &str,
    width: usize,
    height: usize,
    channels: usize,
    polarizations: usize,
) -> ArrayCube {
    let mut values = Vec::with_capacity(width * height * channels * polarizations);
    for pol in 0..polarizations {
        for channel in 0..channels {
            for row in 0..height {
                for col in 0..width {
                    values.push(test_cube_value(pol, channel, row, col));
                }
            }
        }
    }
    // shape and roles are consistent by construction
    ArrayCube::from_vec(
        source_id,
        &[polarizations, channels, height, width],
        values,
        vec![
            AxisRole::Polarization,
            AxisRole::Spectral,
            AxisRole::SpatialY,
            AxisRole::SpatialX,
        ],
    )
    .expect("valid test cube")
}

/// Wraps a single row-major plane as a 2-d `(y, x)` cube.
pub fn plane_cube(source_id: &str, width: usize, height: usize, values: Vec<f32>) -> ArrayCube {
    ArrayCube::from_vec(
        source_id,
        &[height, width],
        values,
        vec![AxisRole::SpatialY, AxisRole::SpatialX],
    )
    .expect("plane length matches width * height")
}

/// Creates a 3-d `(spectral, y, x)` cube of Gaussian sources whose peak
/// grows with the channel index.
pub fn create_spectral_cube(source_id: &str, width: usize, height: usize, channels: usize) -> ArrayCube {
    let values: Vec<f32> = (0..channels)
        .flat_map(|c| create_source_plane(width, height, 1.0 + c as f32))
        .collect();
    ArrayCube::from_vec(
        source_id,
        &[channels, height, width],
        values,
        vec![AxisRole::Spectral, AxisRole::SpatialY, AxisRole::SpatialX],
    )
    .expect("valid spectral cube")
}

/// Mean of the finite values of `data`, NaN if none.
pub fn finite_mean(data: &[f32]) -> f32 {
    let (sum, count) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0usize), |(s, n), &v| (s + f64::from(v), n + 1));
    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}
