//! NaN run-length encoding and pre-compression NaN fill.
//!
//! The lossy codec cannot carry NaN, so NaN positions travel separately as
//! alternating run lengths (finite run first, possibly zero) and the NaNs in
//! the buffer are replaced by something the codec compresses well: the mean
//! of the finite values of the surrounding 4x4 block.

/// Edge of the square blocks used for NaN fill.
pub const FILL_BLOCK: usize = 4;

/// Alternating finite/NaN run lengths over `data`, starting with a finite
/// run. The runs sum to `data.len()`. Only NaN counts as missing.
pub fn nan_runs(data: &[f32]) -> Vec<u32> {
    let mut runs = Vec::new();
    let mut in_nan = false;
    let mut start = 0usize;

    for (i, v) in data.iter().enumerate() {
        if v.is_nan() != in_nan {
            runs.push((i - start) as u32);
            start = i;
            in_nan = !in_nan;
        }
    }
    runs.push((data.len() - start) as u32);
    runs
}

/// Encode NaN runs of a row-major `width x height` buffer, then replace the
/// NaNs of every mixed 4x4 block by that block's finite mean.
///
/// Blocks that are entirely NaN or entirely finite are left untouched, as
/// is the whole buffer when the run list shows no NaN at all.
pub fn encode_and_fill(data: &mut [f32], width: usize, height: usize) -> Vec<u32> {
    let area = (width * height).min(data.len());
    let runs = nan_runs(&data[..area]);
    if runs.len() <= 1 {
        return runs;
    }

    // only whole rows inside the buffer are filled
    let height = height.min(data.len() / width);
    for y0 in (0..height).step_by(FILL_BLOCK) {
        let y1 = (y0 + FILL_BLOCK).min(height);
        for x0 in (0..width).step_by(FILL_BLOCK) {
            let x1 = (x0 + FILL_BLOCK).min(width);
            fill_block(data, width, x0..x1, y0..y1);
        }
    }
    runs
}

fn fill_block(
    data: &mut [f32],
    width: usize,
    cols: std::ops::Range<usize>,
    rows: std::ops::Range<usize>,
) {
    let mut sum = 0.0f64;
    let mut finite = 0usize;
    let mut missing = 0usize;

    for y in rows.clone() {
        for &v in &data[y * width + cols.start..y * width + cols.end] {
            if v.is_nan() {
                missing += 1;
            } else {
                sum += f64::from(v);
                finite += 1;
            }
        }
    }

    if missing == 0 || finite == 0 {
        return;
    }
    let mean = (sum / finite as f64) as f32;
    for y in rows {
        for v in &mut data[y * width + cols.start..y * width + cols.end] {
            if v.is_nan() {
                *v = mean;
            }
        }
    }
}

/// Expand a run list into a per-sample mask, `true` where the sample is NaN.
pub fn decode_mask(runs: &[u32]) -> Vec<bool> {
    let total: usize = runs.iter().map(|&r| r as usize).sum();
    let mut mask = Vec::with_capacity(total);
    for (i, &run) in runs.iter().enumerate() {
        mask.extend(std::iter::repeat(i % 2 == 1).take(run as usize));
    }
    mask
}

/// Restore NaN at the masked positions of a decoded buffer.
pub fn apply_mask(data: &mut [f32], runs: &[u32]) {
    for (v, is_nan) in data.iter_mut().zip(decode_mask(runs)) {
        if is_nan {
            *v = f32::NAN;
        }
    }
}
