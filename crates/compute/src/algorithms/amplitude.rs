use dendro_core::Observation;

/// Full observed range (`max - min`) of a value sequence.
///
/// Returns 0 for fewer than two values. Inputs are expected to be finite.
pub fn amplitude(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut count = 0usize;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
        count += 1;
    }
    if count < 2 {
        return 0.0;
    }
    hi - lo
}

/// Amplitude of an entity's daily series.
pub fn series_amplitude(series: &[Observation]) -> f64 {
    amplitude(series.iter().map(|o| o.value))
}
