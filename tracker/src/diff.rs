use crate::sample::Sample;

/// Difference scalars for one compared sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Differences {
    /// Current sample against the one captured just before it.
    pub vs_previous: u64,
    /// Current sample against the window's reference sample.
    pub vs_reference: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("sample dimensions differ: {left_w}x{left_h} vs {right_w}x{right_h}")]
    DimensionMismatch {
        left_w: u32,
        left_h: u32,
        right_w: u32,
        right_h: u32,
    },
}

/// Sum of absolute per-pixel intensity differences between two samples of
/// the same size. Symmetric, and zero for identical grids.
pub fn abs_diff_sum(a: &Sample, b: &Sample) -> Result<u64, DiffError> {
    let (left_w, left_h) = a.dimensions();
    let (right_w, right_h) = b.dimensions();
    if (left_w, left_h) != (right_w, right_h) {
        return Err(DiffError::DimensionMismatch {
            left_w,
            left_h,
            right_w,
            right_h,
        });
    }

    let sum = a
        .pixels()
        .as_raw()
        .iter()
        .zip(b.pixels().as_raw().iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    Ok(sum)
}

/// Compare `current` against both its predecessor and the reference sample.
pub fn compute_differences(
    previous: &Sample,
    current: &Sample,
    reference: &Sample,
) -> Result<Differences, DiffError> {
    Ok(Differences {
        vs_previous: abs_diff_sum(previous, current)?,
        vs_reference: abs_diff_sum(reference, current)?,
    })
}
