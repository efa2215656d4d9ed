//! Axis-to-hyperslab resolution.
//!
//! Turns display-axis choices and per-axis frame requests into the concrete
//! `(start, count, step)` list a [`DataCube`](cube_common::DataCube) reads.
//!
//! Out-of-range handling differs between the two request shapes:
//!
//! - a single index is **clamped** into `[0, size - 1]`
//! - an invalid range (negative bound, bound past the end, `low > high`)
//!   falls back to the **whole axis**, which is how statistics and histogram
//!   requests ask for "everything along this axis"

use cube_common::{AxisRole, AxisSlice, FrameSelection, Hyperslab, PipelineError, PipelineResult};

/// Resolve a hyperslab.
///
/// `selections` has one entry per axis; entries at the display positions are
/// ignored and those axes get their full extent.
pub fn resolve_hyperslab(
    shape: &[usize],
    display_axes: (usize, usize),
    selections: &[FrameSelection],
) -> PipelineResult<Hyperslab> {
    validate_display_axes(shape.len(), display_axes)?;
    if selections.len() != shape.len() {
        return Err(PipelineError::invalid_request(format!(
            "{} frame selections for a {}-d cube",
            selections.len(),
            shape.len()
        )));
    }

    let slices = shape
        .iter()
        .zip(selections)
        .enumerate()
        .map(|(axis, (&size, selection))| {
            if axis == display_axes.0 || axis == display_axes.1 {
                AxisSlice::full(size)
            } else {
                resolve_axis(size, *selection)
            }
        })
        .collect();

    Ok(Hyperslab::new(slices, display_axes))
}

/// Resolve a single non-display axis.
pub fn resolve_axis(size: usize, selection: FrameSelection) -> AxisSlice {
    if size == 0 {
        return AxisSlice::new(0, 0);
    }
    let last = size as i64 - 1;
    match selection {
        FrameSelection::Index(index) => AxisSlice::new(index.clamp(0, last) as usize, 1),
        FrameSelection::Range { low, high } => {
            if 0 <= low && low <= high && high <= last {
                AxisSlice::new(low as usize, (high - low + 1) as usize)
            } else {
                AxisSlice::full(size)
            }
        }
    }
}

/// Display axes must be two distinct, in-range positions.
pub fn validate_display_axes(ndim: usize, display_axes: (usize, usize)) -> PipelineResult<()> {
    let (x, y) = display_axes;
    if x >= ndim || y >= ndim || x == y {
        return Err(PipelineError::invalid_request(format!(
            "display axes ({x}, {y}) invalid for a {ndim}-d cube"
        )));
    }
    Ok(())
}

/// Default display plane: the SpatialX/SpatialY axes if tagged, else the
/// first two axes.
pub fn default_display_axes(roles: &[AxisRole]) -> (usize, usize) {
    let x = roles.iter().position(|r| *r == AxisRole::SpatialX);
    let y = roles.iter().position(|r| *r == AxisRole::SpatialY);
    match (x, y) {
        (Some(x), Some(y)) if x != y => (x, y),
        _ => (0, 1),
    }
}

/// Channel/polarization request in the session's terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub channel_low: i64,
    pub channel_high: i64,
    pub polarization: i64,
}

impl FrameRequest {
    /// A single channel at one polarization.
    pub fn channel(channel: i64, polarization: i64) -> Self {
        Self {
            channel_low: channel,
            channel_high: channel,
            polarization,
        }
    }

    /// Selections for statistics and histograms.
    ///
    /// The spectral axis takes the channel range, the polarization axis takes
    /// the single polarization frame, and any other hidden axis is treated
    /// like a spectral one. All are ranges, so an invalid request widens to
    /// the whole axis.
    pub fn range_selections(&self, roles: &[AxisRole]) -> Vec<FrameSelection> {
        roles
            .iter()
            .map(|role| match role {
                AxisRole::Polarization => FrameSelection::Range {
                    low: self.polarization,
                    high: self.polarization,
                },
                _ => FrameSelection::Range {
                    low: self.channel_low,
                    high: self.channel_high,
                },
            })
            .collect()
    }

    /// Selections for a single display plane: every hidden axis is a single
    /// (clamped) index.
    pub fn plane_selections(&self, roles: &[AxisRole]) -> Vec<FrameSelection> {
        roles
            .iter()
            .map(|role| match role {
                AxisRole::Polarization => FrameSelection::Index(self.polarization),
                _ => FrameSelection::Index(self.channel_low),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: [usize; 4] = [64, 48, 4, 20];
    const ROLES: [AxisRole; 4] = [
        AxisRole::SpatialX,
        AxisRole::SpatialY,
        AxisRole::Polarization,
        AxisRole::Spectral,
    ];

    #[test]
    fn test_display_axes_get_full_extent() {
        let sel = FrameRequest::channel(3, 1).plane_selections(&ROLES);
        let slab = resolve_hyperslab(&SHAPE, (0, 1), &sel).unwrap();
        assert_eq!(slab.slices[0], AxisSlice::full(64));
        assert_eq!(slab.slices[1], AxisSlice::full(48));
        assert_eq!(slab.slices[2], AxisSlice::new(1, 1));
        assert_eq!(slab.slices[3], AxisSlice::new(3, 1));
        assert!(slab.slices.iter().all(|s| s.step == 1));
    }

    #[test]
    fn test_single_index_clamps() {
        assert_eq!(resolve_axis(20, FrameSelection::Index(-5)), AxisSlice::new(0, 1));
        assert_eq!(resolve_axis(20, FrameSelection::Index(25)), AxisSlice::new(19, 1));
        assert_eq!(resolve_axis(20, FrameSelection::Index(7)), AxisSlice::new(7, 1));
    }

    #[test]
    fn test_invalid_range_falls_back_to_full_axis() {
        let full = AxisSlice::full(20);
        assert_eq!(resolve_axis(20, FrameSelection::Range { low: -1, high: 3 }), full);
        assert_eq!(resolve_axis(20, FrameSelection::Range { low: 0, high: 20 }), full);
        assert_eq!(resolve_axis(20, FrameSelection::Range { low: 5, high: 2 }), full);
        assert_eq!(
            resolve_axis(20, FrameSelection::Range { low: 2, high: 5 }),
            AxisSlice::new(2, 4)
        );
    }

    #[test]
    fn test_range_selection_polarization_out_of_range_is_whole_axis() {
        let request = FrameRequest {
            channel_low: 0,
            channel_high: 19,
            polarization: 7,
        };
        let slab = resolve_hyperslab(&SHAPE, (0, 1), &request.range_selections(&ROLES)).unwrap();
        assert_eq!(slab.slices[2], AxisSlice::full(4));
        assert_eq!(slab.slices[3], AxisSlice::full(20));
    }

    #[test]
    fn test_invalid_display_axes() {
        let sel = FrameRequest::channel(0, 0).plane_selections(&ROLES);
        assert!(resolve_hyperslab(&SHAPE, (1, 1), &sel).is_err());
        assert!(resolve_hyperslab(&SHAPE, (0, 4), &sel).is_err());
        assert!(resolve_hyperslab(&SHAPE, (0, 1), &sel[..3]).is_err());
    }

    #[test]
    fn test_display_axes_may_be_any_pair() {
        // spectral x spatial-y "position-velocity" plane
        let sel = FrameRequest::channel(0, 0).plane_selections(&ROLES);
        let slab = resolve_hyperslab(&SHAPE, (3, 1), &sel).unwrap();
        assert_eq!(slab.slices[3], AxisSlice::full(20));
        assert_eq!(slab.slices[0], AxisSlice::new(0, 1));
    }

    #[test]
    fn test_default_display_axes() {
        assert_eq!(default_display_axes(&ROLES), (0, 1));
        let swapped = [AxisRole::Spectral, AxisRole::SpatialY, AxisRole::SpatialX];
        assert_eq!(default_display_axes(&swapped), (2, 1));
        let untagged = [AxisRole::Other, AxisRole::Other];
        assert_eq!(default_display_axes(&untagged), (0, 1));
    }
}
