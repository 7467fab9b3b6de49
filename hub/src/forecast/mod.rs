//! Five-step forecasts from three strategies, each with an explicit
//! degraded branch instead of a swallowed error.
//!
//! Every strategy returns a [`Forecast`]; the fallback vector for a missing
//! model or a failed inference repeats the last observed close (or `0.0`
//! for an empty series), so callers always get exactly [`HORIZON`] values.

pub mod blended;
pub mod sequence;
pub mod statistical;

use serde::Serialize;

use crate::market::PriceRecord;
use crate::models::ModelRegistry;

pub use blended::forecast_blended;
pub use sequence::forecast_sequence;
pub use statistical::forecast_statistical;

/// Number of forecast steps.
pub const HORIZON: usize = 5;

/// Exactly [`HORIZON`] forecast values, step 1 first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ForecastVector([f64; HORIZON]);

impl ForecastVector {
    pub fn new(values: [f64; HORIZON]) -> Self {
        Self(values)
    }

    pub fn repeat(value: f64) -> Self {
        Self([value; HORIZON])
    }

    /// `None` unless `values` holds exactly [`HORIZON`] entries.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        <[f64; HORIZON]>::try_from(values).ok().map(Self)
    }

    pub fn values(&self) -> &[f64; HORIZON] {
        &self.0
    }

    /// `(step, value)` pairs with 1-based steps.
    pub fn steps(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.0.iter().enumerate().map(|(i, v)| (i as u32 + 1, *v))
    }
}

/// Why a strategy fell back.
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    ModelMissing,
    EmptySeries,
    ModelFailed(String),
    BlendFailed(String),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelMissing => write!(f, "model not loaded"),
            Self::EmptySeries => write!(f, "no close prices"),
            Self::ModelFailed(msg) => write!(f, "model failed: {msg}"),
            Self::BlendFailed(msg) => write!(f, "blend failed: {msg}"),
        }
    }
}

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Forecast {
    Model(ForecastVector),
    Degraded {
        vector: ForecastVector,
        reason: DegradeReason,
    },
}

impl Forecast {
    pub fn vector(&self) -> ForecastVector {
        match self {
            Self::Model(v) => *v,
            Self::Degraded { vector, .. } => *vector,
        }
    }

    pub fn degraded_reason(&self) -> Option<&DegradeReason> {
        match self {
            Self::Model(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Last close, or `0.0` for an empty series.
pub fn last_close(series: &[PriceRecord]) -> f64 {
    series.last().map_or(0.0, |r| r.close)
}

/// The "repeat last value" fallback.
pub fn naive(series: &[PriceRecord], reason: DegradeReason) -> Forecast {
    Forecast::Degraded {
        vector: ForecastVector::repeat(last_close(series)),
        reason,
    }
}

/// Strategy names as persisted and as used in response keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    #[serde(rename = "arima")]
    Statistical,
    #[serde(rename = "lstm")]
    Sequence,
    #[serde(rename = "hybrid")]
    Blended,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Statistical, Self::Sequence, Self::Blended];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statistical => "arima",
            Self::Sequence => "lstm",
            Self::Blended => "hybrid",
        }
    }

    /// Run this strategy on its own.
    pub fn forecast(self, models: &ModelRegistry, series: &[PriceRecord]) -> Forecast {
        match self {
            Self::Statistical => forecast_statistical(models, series),
            Self::Sequence => forecast_sequence(models, series),
            Self::Blended => forecast_blended(models, series),
        }
    }
}

/// All three strategies for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSet {
    pub statistical: Forecast,
    pub sequence: Forecast,
    pub blended: Forecast,
}

impl ForecastSet {
    pub fn get(&self, strategy: Strategy) -> &Forecast {
        match strategy {
            Strategy::Statistical => &self.statistical,
            Strategy::Sequence => &self.sequence,
            Strategy::Blended => &self.blended,
        }
    }
}

/// Every strategy for one series. The blend reruns both models, which is
/// consistent with the standalone outputs because inference is deterministic.
pub fn forecast_all(models: &ModelRegistry, series: &[PriceRecord]) -> ForecastSet {
    ForecastSet {
        statistical: Strategy::Statistical.forecast(models, series),
        sequence: Strategy::Sequence.forecast(models, series),
        blended: Strategy::Blended.forecast(models, series),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ModelError, SequenceModel, StatisticalModel};
    use ndarray::Array3;

    pub(crate) fn series(closes: &[f64]) -> Vec<PriceRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceRecord {
                date: format!("2024-01-{:02}", i + 1),
                close: *c,
            })
            .collect()
    }

    /// Statistical model returning a fixed vector, or failing.
    pub(crate) struct FixedStatistical(pub Result<Vec<f64>, String>);

    impl StatisticalModel for FixedStatistical {
        fn forecast(&self, _steps: usize) -> Result<Vec<f64>, ModelError> {
            self.0.clone().map_err(ModelError::Inference)
        }
    }

    /// Sequence model that returns the mean of its window.
    pub(crate) struct MeanOfWindow {
        pub shape: Vec<Option<usize>>,
    }

    impl SequenceModel for MeanOfWindow {
        fn input_shape(&self) -> &[Option<usize>] {
            &self.shape
        }

        fn predict(&self, x: &Array3<f32>) -> Result<Vec<f32>, ModelError> {
            Ok(vec![x.mean().unwrap_or(0.0)])
        }
    }

    #[test]
    fn vector_from_slice_requires_exact_horizon() {
        assert!(ForecastVector::from_slice(&[1.0; 5]).is_some());
        assert!(ForecastVector::from_slice(&[1.0; 4]).is_none());
        assert!(ForecastVector::from_slice(&[1.0; 6]).is_none());
    }

    #[test]
    fn vector_serialises_as_plain_array() {
        let v = ForecastVector::new([1.0, 2.0, 3.0, 4.0, 5.5]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.0,2.0,3.0,4.0,5.5]");
        let steps: Vec<(u32, f64)> = v.steps().collect();
        assert_eq!(steps[0], (1, 1.0));
        assert_eq!(steps[4], (5, 5.5));
    }

    #[test]
    fn no_models_repeat_last_close_everywhere() {
        let s = series(&[100.0, 102.0, 101.0, 105.0, 103.0]);
        let set = forecast_all(&ModelRegistry::empty(), &s);
        assert_eq!(set.statistical.vector(), ForecastVector::repeat(103.0));
        assert_eq!(set.sequence.vector(), ForecastVector::repeat(103.0));
        assert_eq!(set.blended.vector(), ForecastVector::repeat(103.0));
        assert_eq!(set.statistical.degraded_reason(), Some(&DegradeReason::ModelMissing));
        assert_eq!(set.sequence.degraded_reason(), Some(&DegradeReason::ModelMissing));
        assert!(set.blended.degraded_reason().is_none());
    }

    #[test]
    fn empty_series_gives_zero_vectors() {
        let registry = ModelRegistry::empty()
            .with_sequence(Box::new(MeanOfWindow { shape: vec![None, Some(10), Some(1)] }));
        let set = forecast_all(&registry, &[]);
        for strategy in Strategy::ALL {
            assert_eq!(set.get(strategy).vector(), ForecastVector::repeat(0.0));
        }
    }

    #[test]
    fn forecasts_are_idempotent() {
        let registry = ModelRegistry::empty()
            .with_statistical(Box::new(FixedStatistical(Ok(vec![1.0, 2.0, 3.0, 4.0, 5.0]))))
            .with_sequence(Box::new(MeanOfWindow { shape: vec![None, Some(3), Some(1)] }));
        let s = series(&[10.0, 11.0, 12.5, 11.0, 13.0, 12.0]);
        assert_eq!(forecast_all(&registry, &s), forecast_all(&registry, &s));
    }

    #[test]
    fn each_strategy_matches_the_full_set() {
        let registry = ModelRegistry::empty()
            .with_statistical(Box::new(FixedStatistical(Ok(vec![1.0, 2.0, 3.0, 4.0, 5.0]))))
            .with_sequence(Box::new(MeanOfWindow { shape: vec![None, Some(3), Some(1)] }));
        let s = series(&[10.0, 11.0, 12.5, 11.0, 13.0, 12.0]);
        let set = forecast_all(&registry, &s);
        for strategy in Strategy::ALL {
            assert_eq!(&strategy.forecast(&registry, &s), set.get(strategy));
        }
        assert_eq!(
            set.blended,
            blended::blend(&set.statistical, &set.sequence)
        );
    }

    #[test]
    fn strategy_names_match_persisted_values() {
        let names: Vec<&str> = Strategy::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["arima", "lstm", "hybrid"]);
        assert_eq!(serde_json::to_string(&Strategy::Blended).unwrap(), "\"hybrid\"");
    }
}
