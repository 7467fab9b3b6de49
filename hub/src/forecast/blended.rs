use crate::market::PriceRecord;
use crate::models::ModelRegistry;

use super::{
    forecast_sequence, forecast_statistical, DegradeReason, Forecast, ForecastVector, HORIZON,
};

pub const STATISTICAL_WEIGHT: f64 = 0.6;
pub const SEQUENCE_WEIGHT: f64 = 0.4;

/// Two decimal places, decided on the exact binary value of `x`.
///
/// Scaling by 100 first can turn a value just below a half-cent into an
/// exact tie; precision formatting works on the exact expansion instead.
fn round2(x: f64) -> f64 {
    format!("{x:.2}").parse().unwrap_or(x)
}

/// Step-wise weighted blend of two forecasts.
///
/// Inputs are blended whether or not they are themselves degraded. If the
/// blend produces a non-finite value the statistical vector is returned
/// unchanged.
pub fn blend(statistical: &Forecast, sequence: &Forecast) -> Forecast {
    let s = statistical.vector();
    let q = sequence.vector();

    let mut out = [0.0; HORIZON];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = round2(STATISTICAL_WEIGHT * s.values()[i] + SEQUENCE_WEIGHT * q.values()[i]);
    }

    match out.iter().position(|v| !v.is_finite()) {
        None => Forecast::Model(ForecastVector::new(out)),
        Some(i) => {
            tracing::warn!(step = i + 1, "Hybrid prediction error, using ARIMA output");
            Forecast::Degraded {
                vector: s,
                reason: DegradeReason::BlendFailed(format!("non-finite value at step {}", i + 1)),
            }
        }
    }
}

/// Run both models and blend them.
pub fn forecast_blended(models: &ModelRegistry, series: &[PriceRecord]) -> Forecast {
    let statistical = forecast_statistical(models, series);
    let sequence = forecast_sequence(models, series);
    blend(&statistical, &sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::tests::{series, FixedStatistical, MeanOfWindow};

    #[test]
    fn rounding_matches_two_decimal_round_half_even() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.236), 1.24);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(-2.5), -2.5);
    }

    #[test]
    fn rounding_does_not_create_false_ties() {
        // 0.6 * 100 + 0.4 * 100.0625 lands just above 100.025 in binary.
        assert_eq!(round2(0.6 * 100.0 + 0.4 * 100.0625), 100.03);

        let s = Forecast::Model(ForecastVector::repeat(100.0));
        let q = Forecast::Model(ForecastVector::repeat(100.0625));
        assert_eq!(blend(&s, &q).vector(), ForecastVector::repeat(100.03));
    }

    #[test]
    fn blend_is_weighted_and_rounded() {
        let s = Forecast::Model(ForecastVector::new([100.0, 101.0, 102.0, 103.0, 104.0]));
        let q = Forecast::Model(ForecastVector::new([110.0, 90.0, 102.0, 99.99, 0.0]));
        let b = blend(&s, &q);
        for i in 0..HORIZON {
            let expected = round2(0.6 * s.vector().values()[i] + 0.4 * q.vector().values()[i]);
            assert_eq!(b.vector().values()[i], expected);
        }
        assert_eq!(b.vector().values()[0], 104.0);
        assert_eq!(b.vector().values()[1], 96.6);
        assert_eq!(b.vector().values()[4], 62.4);
    }

    #[test]
    fn degraded_inputs_still_blend() {
        let s = Forecast::Degraded {
            vector: ForecastVector::repeat(10.0),
            reason: DegradeReason::ModelMissing,
        };
        let q = Forecast::Model(ForecastVector::repeat(20.0));
        assert_eq!(blend(&s, &q), Forecast::Model(ForecastVector::repeat(14.0)));
    }

    #[test]
    fn non_finite_blend_returns_statistical_vector() {
        let s = Forecast::Model(ForecastVector::repeat(1.0));
        let q = Forecast::Model(ForecastVector::new([f64::INFINITY, 2.0, 2.0, 2.0, 2.0]));
        let b = blend(&s, &q);
        assert_eq!(b.vector(), s.vector());
        assert!(matches!(b.degraded_reason(), Some(DegradeReason::BlendFailed(_))));
    }

    #[test]
    fn forecast_blended_combines_both_models() {
        let registry = ModelRegistry::empty()
            .with_statistical(Box::new(FixedStatistical(Ok(vec![10.0; 5]))))
            .with_sequence(Box::new(MeanOfWindow { shape: vec![None, Some(3), Some(1)] }));
        // Constant closes skip scaling, so the window mean is the close itself.
        let f = forecast_blended(&registry, &series(&[20.0; 8]));
        assert_eq!(f, Forecast::Model(ForecastVector::repeat(14.0)));
    }
}
