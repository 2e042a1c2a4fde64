use crate::common::*;

/// Apply softmax to every row in place.
///
/// The row maximum is subtracted before exponentiation, so large logits do
/// not overflow.
pub fn softmax_rows_inplace(mut array: ArrayViewMut2<'_, f32>) {
    array
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(softmax_inplace);
}

pub fn softmax_inplace(mut row: ArrayViewMut1<'_, f32>) {
    let max = row.fold(f32::NEG_INFINITY, |max, &value| max.max(value));
    row.mapv_inplace(|value| (value - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|value| value / sum);
}
