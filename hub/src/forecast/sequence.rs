//! Sliding-window inference for the LSTM.
//!
//! Each step re-slices the full normalised history one position
//! further back; predictions are never fed back in as inputs.

use ndarray::Array3;

use crate::market::PriceRecord;
use crate::models::{ModelError, ModelRegistry, SequenceHandle};

use super::{naive, DegradeReason, Forecast, ForecastVector, HORIZON};

/// Min-max scaling fitted on the whole close history.
#[derive(Debug, Clone, Copy)]
struct MinMax {
    min: f32,
    max: f32,
}

impl MinMax {
    /// `None` for a constant (or empty) series, where scaling would divide by zero.
    fn fit(xs: &[f32]) -> Option<Self> {
        let min = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (max > min).then_some(Self { min, max })
    }

    fn scale(self, x: f32) -> f32 {
        (x - self.min) / (self.max - self.min)
    }

    fn unscale(self, x: f32) -> f32 {
        x * (self.max - self.min) + self.min
    }
}

/// Window of `timesteps` values ending `offset` positions before the end.
///
/// Short histories are left-padded with their first value. Slicing
/// follows negative-index semantics: bounds clamp at the start, so a
/// large offset on a short history can yield an empty window, which is
/// an error.
fn window_at(normalized: &[f32], timesteps: usize, offset: usize) -> Result<Vec<f32>, ModelError> {
    let n = normalized.len();
    let mut seq: Vec<f32> = if n >= timesteps {
        let end = n.saturating_sub(offset);
        let start = n.saturating_sub(timesteps + offset);
        normalized[start..end].to_vec()
    } else {
        left_pad(normalized, timesteps)?
    };

    if seq.len() > timesteps {
        seq.drain(..seq.len() - timesteps);
    } else if seq.len() < timesteps {
        seq = left_pad(&seq, timesteps)?;
    }
    Ok(seq)
}

fn left_pad(xs: &[f32], len: usize) -> Result<Vec<f32>, ModelError> {
    let first = *xs
        .first()
        .ok_or_else(|| ModelError::Inference("cannot pad an empty window".into()))?;
    let mut out = vec![first; len.saturating_sub(xs.len())];
    out.extend_from_slice(xs);
    Ok(out)
}

fn run_windows(handle: &SequenceHandle, closes: &[f32]) -> Result<ForecastVector, ModelError> {
    let (timesteps, features) = handle.window().resolve(closes.len()).ok_or_else(|| {
        ModelError::Inference("declared input shape has an unknown or zero window dimension".into())
    })?;
    let scaler = MinMax::fit(closes);
    let normalized: Vec<f32> = match scaler {
        Some(s) => closes.iter().map(|x| s.scale(*x)).collect(),
        None => closes.to_vec(),
    };

    let mut out = [0.0f64; HORIZON];
    for (i, slot) in out.iter_mut().enumerate() {
        let window = window_at(&normalized, timesteps, i)?;
        let x = Array3::from_shape_vec((1, timesteps, features), window)
            .map_err(|e| {
                ModelError::Inference(format!("reshape to (1, {timesteps}, {features}): {e}"))
            })?;

        let raw = handle.model().predict(&x)?;
        let pred = *raw
            .first()
            .ok_or_else(|| ModelError::Inference("model returned no output".into()))?;
        let value = match scaler {
            Some(s) => s.unscale(pred),
            None => pred,
        };
        if !value.is_finite() {
            return Err(ModelError::Inference(format!("non-finite prediction at step {}", i + 1)));
        }
        tracing::debug!(step = i + 1, raw = pred, value, "LSTM step");
        *slot = f64::from(value);
    }
    Ok(ForecastVector::new(out))
}

/// Five single-step LSTM predictions over successively earlier windows.
pub fn forecast_sequence(models: &ModelRegistry, series: &[PriceRecord]) -> Forecast {
    let Some(handle) = models.sequence() else {
        tracing::warn!("LSTM model not loaded, using fallback prediction");
        return naive(series, DegradeReason::ModelMissing);
    };
    if series.is_empty() {
        tracing::warn!("LSTM: no close values found in data");
        return naive(series, DegradeReason::EmptySeries);
    }

    let closes: Vec<f32> = series.iter().map(|r| r.close as f32).collect();
    match run_windows(handle, &closes) {
        Ok(v) => Forecast::Model(v),
        Err(e) => {
            tracing::warn!("LSTM prediction error: {e}");
            naive(series, DegradeReason::ModelFailed(e.to_string()))
        }
    }
}
