use crate::market::PriceRecord;
use crate::models::ModelRegistry;

use super::{naive, DegradeReason, Forecast, ForecastVector, HORIZON};

/// Forecast from the fitted ARIMA state.
///
/// The series is only consulted for the fallback value.
pub fn forecast_statistical(models: &ModelRegistry, series: &[PriceRecord]) -> Forecast {
    let Some(model) = models.statistical() else {
        tracing::warn!("ARIMA model not loaded, using fallback prediction");
        return naive(series, DegradeReason::ModelMissing);
    };

    match model.forecast(HORIZON) {
        Ok(values) => match ForecastVector::from_slice(&values) {
            Some(v) if v.values().iter().all(|x| x.is_finite()) => Forecast::Model(v),
            Some(_) => {
                tracing::warn!("ARIMA forecast contains non-finite values");
                naive(series, DegradeReason::ModelFailed("non-finite forecast".into()))
            }
            None => {
                tracing::warn!(len = values.len(), "ARIMA returned wrong number of steps");
                let msg = format!("expected {HORIZON} steps, got {}", values.len());
                naive(series, DegradeReason::ModelFailed(msg))
            }
        },
        Err(e) => {
            tracing::warn!("ARIMA prediction error: {e}");
            naive(series, DegradeReason::ModelFailed(e.to_string()))
        }
    }
}
