//! Block-mean down-sampling for raster tiles.
//!
//! A region of `(x_max - x_min) x (y_max - y_min)` pixels is reduced by an
//! integer `mip` factor: each output pixel is the mean of the finite values
//! of one `mip x mip` source block. Trailing partial blocks are dropped.

use tracing::debug;

use cube_common::{AxisSlice, DataCube, Hyperslab, ImageBounds, PipelineResult};

use crate::stats::engine::read_view;

/// Down-sample an in-memory row-major `width x height` plane.
///
/// # Returns
/// Tuple of (downsampled_data, new_width, new_height)
pub fn downsample(data: &[f32], width: usize, height: usize, mip: usize) -> (Vec<f32>, usize, usize) {
    if mip == 0 {
        return (vec![], 0, 0);
    }
    let new_width = width / mip;
    let new_height = height / mip;
    let mut output = Vec::with_capacity(new_width * new_height);

    for out_y in 0..new_height {
        let band = &data[out_y * mip * width..(out_y + 1) * mip * width];
        for out_x in 0..new_width {
            output.push(mean_of_block(band, width, out_x * mip, mip));
        }
    }

    (output, new_width, new_height)
}

/// Mean of the finite values in the `mip x mip` block whose left column is
/// `x0` inside a band of `mip` rows of `row_width` values.
///
/// If every value is non-finite, returns NaN.
#[inline]
fn mean_of_block(band: &[f32], row_width: usize, x0: usize, mip: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for row in band.chunks_exact(row_width).take(mip) {
        for &v in &row[x0..x0 + mip] {
            if v.is_finite() {
                sum += f64::from(v);
                count += 1;
            }
        }
    }

    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}

/// Down-sample `bounds` of the display plane selected by `plane_slab`,
/// reading `mip` full-width source rows at a time.
///
/// `plane_slab` must select the full extent of both display axes and a
/// single frame on every other axis. Bounds and mip are assumed validated.
pub fn downsample_streaming(
    cube: &dyn DataCube,
    plane_slab: &Hyperslab,
    bounds: &ImageBounds,
    mip: usize,
) -> PipelineResult<(Vec<f32>, usize, usize)> {
    let (x_axis, y_axis) = plane_slab.display_axes;
    let (new_width, new_height) = bounds.downsampled_size(mip);
    let x_min = bounds.x_min.max(0) as usize;
    let y_min = bounds.y_min.max(0) as usize;

    let mut output = Vec::with_capacity(new_width * new_height);
    for out_y in 0..new_height {
        let row = y_min + out_y * mip;
        let view = read_view(cube, &plane_slab.with_axis(y_axis, AxisSlice::new(row, mip)))?;
        let (band, _rows, row_width) = view.plane(x_axis, y_axis)?;

        for out_x in 0..new_width {
            output.push(mean_of_block(&band, row_width, x_min + out_x * mip, mip));
        }
    }

    debug!(
        source = cube.source_id(),
        mip,
        width = new_width,
        height = new_height,
        reads = new_height,
        "Down-sampled region"
    );
    Ok((output, new_width, new_height))
}
