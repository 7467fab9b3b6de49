//! Pre-fit model handles, loaded once at startup and shared read-only.

pub mod arima;
pub mod lstm;

use ndarray::Array3;
use std::path::Path;

pub use arima::ArimaModel;
pub use lstm::LstmNetwork;

/// Window length used when the sequence model does not declare one.
pub const DEFAULT_MAX_TIMESTEPS: usize = 60;

#[derive(Debug)]
pub enum ModelError {
    Io(String),
    Parse(String),
    Invalid(String),
    Inference(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid model: {msg}"),
            Self::Inference(msg) => write!(f, "inference: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// A fitted autoregressive model that forecasts from its own state.
pub trait StatisticalModel: Send + Sync {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError>;
}

/// A fitted network mapping a `(batch, timesteps, features)` window to
/// one prediction per batch item.
pub trait SequenceModel: Send + Sync {
    /// Declared input shape; `None` marks an unbounded dimension.
    fn input_shape(&self) -> &[Option<usize>];

    fn predict(&self, x: &Array3<f32>) -> Result<Vec<f32>, ModelError>;
}

/// Window geometry for the sequence model, resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Fixed { timesteps: usize, features: usize },
    /// No `(batch, timesteps, features)` shape was declared.
    Default,
    /// A three-dimensional shape with an unknown or zero window dimension.
    Unusable,
}

impl WindowSpec {
    pub fn from_shape(shape: &[Option<usize>]) -> Self {
        match shape {
            [_, Some(t), Some(f)] if *t > 0 && *f > 0 => Self::Fixed {
                timesteps: *t,
                features: *f,
            },
            [_, _, _] => Self::Unusable,
            _ => Self::Default,
        }
    }

    /// `(timesteps, features)` for a history of `len` closes, `None` if the
    /// declared shape cannot be filled.
    pub fn resolve(self, len: usize) -> Option<(usize, usize)> {
        match self {
            Self::Fixed { timesteps, features } => Some((timesteps, features)),
            Self::Default => Some((len.min(DEFAULT_MAX_TIMESTEPS).max(1), 1)),
            Self::Unusable => None,
        }
    }
}

/// A sequence model plus its cached window geometry.
pub struct SequenceHandle {
    model: Box<dyn SequenceModel>,
    window: WindowSpec,
}

impl SequenceHandle {
    pub fn new(model: Box<dyn SequenceModel>) -> Self {
        let window = WindowSpec::from_shape(model.input_shape());
        Self { model, window }
    }

    pub fn model(&self) -> &dyn SequenceModel {
        self.model.as_ref()
    }

    pub fn window(&self) -> WindowSpec {
        self.window
    }
}

/// Process-wide, immutable set of optional model handles.
#[derive(Default)]
pub struct ModelRegistry {
    statistical: Option<Box<dyn StatisticalModel>>,
    sequence: Option<SequenceHandle>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_statistical(mut self, model: Box<dyn StatisticalModel>) -> Self {
        self.statistical = Some(model);
        self
    }

    pub fn with_sequence(mut self, model: Box<dyn SequenceModel>) -> Self {
        self.sequence = Some(SequenceHandle::new(model));
        self
    }

    /// Load both artifacts. A missing or broken file leaves that handle empty.
    pub fn load(arima_path: &Path, lstm_path: &Path) -> Self {
        let mut registry = Self::empty();

        if !arima_path.exists() {
            tracing::warn!("ARIMA model not found: {}", arima_path.display());
        } else {
            match ArimaModel::load(arima_path) {
                Ok(model) => {
                    tracing::info!("ARIMA model loaded from {}", arima_path.display());
                    registry = registry.with_statistical(Box::new(model));
                }
                Err(e) => {
                    tracing::error!("Failed to load ARIMA model {}: {e}", arima_path.display())
                }
            }
        }

        if !lstm_path.exists() {
            tracing::warn!("LSTM model not found: {}", lstm_path.display());
        } else {
            match LstmNetwork::load(lstm_path) {
                Ok(model) => {
                    registry = registry.with_sequence(Box::new(model));
                    if let Some(handle) = registry.sequence() {
                        tracing::info!(
                            window = ?handle.window(),
                            "LSTM model loaded from {}",
                            lstm_path.display()
                        );
                    }
                }
                Err(e) => tracing::error!("Failed to load LSTM model {}: {e}", lstm_path.display()),
            }
        }

        registry
    }

    pub fn statistical(&self) -> Option<&dyn StatisticalModel> {
        self.statistical.as_deref()
    }

    pub fn sequence(&self) -> Option<&SequenceHandle> {
        self.sequence.as_ref()
    }
}
