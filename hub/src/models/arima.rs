use serde::Deserialize;
use std::path::Path;

use super::{ModelError, StatisticalModel};

/// On-disk form written by the training job.
#[derive(Debug, Deserialize)]
struct ArimaArtifact {
    /// `(p, d, q)`.
    order: [usize; 3],
    #[serde(default, rename = "const")]
    constant: f64,
    #[serde(default)]
    ar: Vec<f64>,
    #[serde(default)]
    ma: Vec<f64>,
    /// Tail of the fitted series, oldest first.
    history: Vec<f64>,
    /// Tail of the in-sample residuals, oldest first.
    #[serde(default)]
    residuals: Vec<f64>,
}

/// ARIMA(p, d, q) forecaster over a fitted state.
///
/// The difference equation is `w_t = c + Σ φ_i w_{t-i} + Σ θ_j e_{t-j} + e_t`
/// on the `d`-times differenced history; future shocks are zero.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    d: usize,
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    history: Vec<f64>,
    residuals: Vec<f64>,
}

impl ArimaModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let art: ArimaArtifact = serde_json::from_str(raw)?;
        let [p, d, q] = art.order;

        if art.ar.len() != p {
            return Err(ModelError::Invalid(format!(
                "order p={p} but {} AR coefficients",
                art.ar.len()
            )));
        }
        if art.ma.len() != q {
            return Err(ModelError::Invalid(format!(
                "order q={q} but {} MA coefficients",
                art.ma.len()
            )));
        }
        if art.history.len() < (p + d).max(1) {
            return Err(ModelError::Invalid(format!(
                "history of {} values is too short for p={p}, d={d}",
                art.history.len()
            )));
        }
        if art.residuals.len() < q {
            return Err(ModelError::Invalid(format!(
                "{} residuals but q={q}",
                art.residuals.len()
            )));
        }
        let all_finite = std::iter::once(art.constant)
            .chain(art.ar.iter().copied())
            .chain(art.ma.iter().copied())
            .chain(art.history.iter().copied())
            .chain(art.residuals.iter().copied())
            .all(f64::is_finite);
        if !all_finite {
            return Err(ModelError::Invalid("non-finite parameter or state".into()));
        }

        Ok(Self {
            d,
            constant: art.constant,
            ar: art.ar,
            ma: art.ma,
            history: art.history,
            residuals: art.residuals,
        })
    }
}

fn difference(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

impl StatisticalModel for ArimaModel {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError> {
        // levels[k] is the history differenced k times.
        let mut levels: Vec<Vec<f64>> = vec![self.history.clone()];
        for k in 0..self.d {
            let next = difference(&levels[k]);
            levels.push(next);
        }

        let mut w = levels[self.d].clone();
        let mut e = self.residuals.clone();
        for _ in 0..steps {
            let ar_term: f64 = self
                .ar
                .iter()
                .enumerate()
                .map(|(i, phi)| phi * w[w.len() - 1 - i])
                .sum();
            let ma_term: f64 = self
                .ma
                .iter()
                .enumerate()
                .map(|(j, theta)| theta * e[e.len() - 1 - j])
                .sum();
            w.push(self.constant + ar_term + ma_term);
            e.push(0.0);
        }

        let mut out = w.split_off(w.len() - steps);
        for level in levels[..self.d].iter().rev() {
            let mut acc = level.last().copied().unwrap_or(0.0);
            for v in out.iter_mut() {
                acc += *v;
                *v = acc;
            }
        }

        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Inference("forecast diverged".into()));
        }
        Ok(out)
    }
}
