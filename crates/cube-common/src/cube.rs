//! Read-only access to an N-dimensional data cube.
//!
//! The pipeline never owns image data. A [`DataCube`] is supplied by the
//! loader collaborator and is immutable for as long as the pipeline holds it;
//! every request reads the hyperslab it needs through [`DataCube::read`].

use ndarray::{ArrayD, IxDyn, Slice};

use crate::axis::{AxisRole, Hyperslab};
use crate::error::{PipelineError, PipelineResult};

/// Read-only N-d float array with per-axis semantic roles.
///
/// Implementations may be lazy or I/O-backed; `read` is allowed to block.
pub trait DataCube: Send + Sync {
    /// Stable identifier of the backing source (file name, URI, ...).
    /// Used as part of the intensity cache key.
    fn source_id(&self) -> &str;

    /// Size of each axis.
    fn shape(&self) -> &[usize];

    /// Semantic role of each axis, same length as `shape`.
    fn axis_roles(&self) -> &[AxisRole];

    /// Materialize a hyperslab.
    ///
    /// Returns `DataUnavailable` if the backing data cannot be read.
    fn read(&self, slab: &Hyperslab) -> PipelineResult<RawView>;

    fn ndim(&self) -> usize {
        self.shape().len()
    }
}

/// Materialized hyperslab, in cube axis order.
#[derive(Debug, Clone)]
pub struct RawView {
    data: ArrayD<f32>,
    display_axes: (usize, usize),
}

impl RawView {
    pub fn new(data: ArrayD<f32>, display_axes: (usize, usize)) -> Self {
        Self { data, display_axes }
    }

    /// Element counts per axis.
    pub fn dims(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn display_axes(&self) -> (usize, usize) {
        self.display_axes
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Point lookup in view-local coordinates.
    pub fn get(&self, index: &[usize]) -> Option<f32> {
        self.data.get(IxDyn(index)).copied()
    }

    /// In-order iteration (last axis fastest).
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied()
    }

    /// Flatten the view into a row-major `(rows, cols)` plane where rows run
    /// along `row_axis` and columns along `col_axis`.
    ///
    /// Every other axis must have a single element.
    pub fn plane(&self, col_axis: usize, row_axis: usize) -> PipelineResult<(Vec<f32>, usize, usize)> {
        let ndim = self.data.ndim();
        if col_axis >= ndim || row_axis >= ndim || col_axis == row_axis {
            return Err(PipelineError::invalid_request(format!(
                "plane axes ({col_axis}, {row_axis}) invalid for {ndim}-d view"
            )));
        }

        let shape = self.data.shape();
        let extra: usize = (0..ndim)
            .filter(|&a| a != col_axis && a != row_axis)
            .map(|a| shape[a])
            .product();
        if extra != 1 {
            return Err(PipelineError::invalid_request(format!(
                "view {:?} is not a single plane over axes ({col_axis}, {row_axis})",
                shape
            )));
        }

        let mut order = vec![row_axis, col_axis];
        order.extend((0..ndim).filter(|&a| a != col_axis && a != row_axis));

        let rows = shape[row_axis];
        let cols = shape[col_axis];
        let values: Vec<f32> = self.data.view().permuted_axes(order).iter().copied().collect();
        Ok((values, rows, cols))
    }

    /// Values along a single axis; every other axis must have one element.
    pub fn line(&self, axis: usize) -> PipelineResult<Vec<f32>> {
        let shape = self.data.shape();
        if axis >= shape.len() {
            return Err(PipelineError::invalid_request(format!(
                "axis {axis} out of range for {}-d view",
                shape.len()
            )));
        }
        let other: usize = shape
            .iter()
            .enumerate()
            .filter(|(a, _)| *a != axis)
            .map(|(_, n)| *n)
            .product();
        if other != 1 {
            return Err(PipelineError::invalid_request(format!(
                "view {:?} is not a line along axis {axis}",
                shape
            )));
        }
        Ok(self.data.iter().copied().collect())
    }
}

/// In-memory cube backed by an `ndarray::ArrayD<f32>`.
#[derive(Debug, Clone)]
pub struct ArrayCube {
    source_id: String,
    data: ArrayD<f32>,
    roles: Vec<AxisRole>,
}

impl ArrayCube {
    /// Wrap an array. `roles` must have one entry per axis.
    pub fn new(
        source_id: impl Into<String>,
        data: ArrayD<f32>,
        roles: Vec<AxisRole>,
    ) -> PipelineResult<Self> {
        if roles.len() != data.ndim() {
            return Err(PipelineError::invalid_request(format!(
                "{} axis roles for a {}-d array",
                roles.len(),
                data.ndim()
            )));
        }
        if data.ndim() < 2 {
            return Err(PipelineError::invalid_request(
                "a cube needs at least two axes",
            ));
        }
        Ok(Self {
            source_id: source_id.into(),
            data,
            roles,
        })
    }

    /// Build from a flat buffer laid out in C order over `shape`.
    pub fn from_vec(
        source_id: impl Into<String>,
        shape: &[usize],
        values: Vec<f32>,
        roles: Vec<AxisRole>,
    ) -> PipelineResult<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| PipelineError::invalid_request(format!("bad cube shape: {e}")))?;
        Self::new(source_id, data, roles)
    }
}

impl DataCube for ArrayCube {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn axis_roles(&self) -> &[AxisRole] {
        &self.roles
    }

    fn read(&self, slab: &Hyperslab) -> PipelineResult<RawView> {
        let shape = self.data.shape();
        if slab.ndim() != shape.len() {
            return Err(PipelineError::invalid_request(format!(
                "{}-d hyperslab for a {}-d cube",
                slab.ndim(),
                shape.len()
            )));
        }
        for (axis, (slice, size)) in slab.slices.iter().zip(shape).enumerate() {
            if !slice.fits(*size) {
                return Err(PipelineError::invalid_request(format!(
                    "axis {axis}: slice {slice:?} exceeds size {size}"
                )));
            }
        }

        let view = self.data.slice_each_axis(|desc| {
            let s = slab.slices[desc.axis.index()];
            Slice::new(s.start as isize, Some(s.end() as isize), s.step as isize)
        });
        Ok(RawView::new(view.to_owned(), slab.display_axes))
    }
}
