//! Spatial and spectral profiles through a cursor position.

use tracing::debug;

use cube_common::{
    find_axis, AxisRole, AxisSlice, DataCube, PipelineError, PipelineResult, Profile,
    SpatialProfileMessage, SpectralProfileMessage, IMAGE_REGION_ID,
};

use crate::slice::{resolve_hyperslab, FrameRequest};
use crate::stats::engine::read_view;

/// Identity fields of a profile request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub file_id: i32,
    pub x: i64,
    pub y: i64,
}

fn sanitize(values: Vec<f32>) -> Vec<f32> {
    values
        .into_iter()
        .map(|v| if v.is_finite() { v } else { f32::NAN })
        .collect()
}

fn check_cursor(cursor: &Cursor, width: usize, height: usize) -> PipelineResult<(usize, usize)> {
    if cursor.x < 0 || cursor.y < 0 || cursor.x >= width as i64 || cursor.y >= height as i64 {
        return Err(PipelineError::invalid_request(format!(
            "cursor ({}, {}) outside {width}x{height} image",
            cursor.x, cursor.y
        )));
    }
    Ok((cursor.x as usize, cursor.y as usize))
}

/// The "x" and "y" profiles through the cursor on the current display plane.
pub fn spatial_profiles(
    cube: &dyn DataCube,
    display_axes: (usize, usize),
    frames: &FrameRequest,
    cursor: &Cursor,
) -> PipelineResult<SpatialProfileMessage> {
    let plane = resolve_hyperslab(
        cube.shape(),
        display_axes,
        &frames.plane_selections(cube.axis_roles()),
    )?;
    let (x_axis, y_axis) = display_axes;
    let shape = cube.shape();
    let (x, y) = check_cursor(cursor, shape[x_axis], shape[y_axis])?;

    let row = read_view(cube, &plane.with_axis(y_axis, AxisSlice::new(y, 1)))?.line(x_axis)?;
    let column = read_view(cube, &plane.with_axis(x_axis, AxisSlice::new(x, 1)))?.line(y_axis)?;

    let x_profile = Profile::full("x", sanitize(row));
    let y_profile = Profile::full("y", sanitize(column));
    let value = x_profile.values[x];

    debug!(file_id = cursor.file_id, x, y, "Extracted spatial profiles");
    Ok(SpatialProfileMessage {
        file_id: cursor.file_id,
        x,
        y,
        channel: frames.channel_low as i32,
        polarization: frames.polarization as i32,
        value,
        profiles: vec![x_profile, y_profile],
    })
}

/// The "z" profile along the spectral axis at the cursor.
///
/// Returns `None` when the cube has no spectral axis or a single channel.
pub fn spectral_profile(
    cube: &dyn DataCube,
    display_axes: (usize, usize),
    frames: &FrameRequest,
    cursor: &Cursor,
) -> PipelineResult<Option<SpectralProfileMessage>> {
    let Some(spectral) = find_axis(cube.axis_roles(), AxisRole::Spectral) else {
        return Ok(None);
    };
    let shape = cube.shape();
    if shape[spectral] <= 1 || spectral == display_axes.0 || spectral == display_axes.1 {
        return Ok(None);
    }

    let (x_axis, y_axis) = display_axes;
    let plane = resolve_hyperslab(
        shape,
        display_axes,
        &frames.plane_selections(cube.axis_roles()),
    )?;
    let (x, y) = check_cursor(cursor, shape[x_axis], shape[y_axis])?;

    let slab = plane
        .with_axis(x_axis, AxisSlice::new(x, 1))
        .with_axis(y_axis, AxisSlice::new(y, 1))
        .with_axis(spectral, AxisSlice::full(shape[spectral]));
    let values = read_view(cube, &slab)?.line(spectral)?;

    debug!(file_id = cursor.file_id, x, y, channels = values.len(), "Extracted spectral profile");
    Ok(Some(SpectralProfileMessage {
        file_id: cursor.file_id,
        region_id: IMAGE_REGION_ID,
        polarization: frames.polarization as i32,
        profiles: vec![Profile::full("z", sanitize(values))],
    }))
}
