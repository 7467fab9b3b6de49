use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2};
use serde::Deserialize;
use std::path::Path;

use super::{ModelError, SequenceModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Tanh,
    Relu,
    Sigmoid,
    Linear,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Tanh => x.tanh(),
            Self::Relu => x.max(0.0),
            Self::Sigmoid => sigmoid(x),
            Self::Linear => x,
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn default_cell_activation() -> Activation {
    Activation::Tanh
}

fn default_dense_activation() -> Activation {
    Activation::Linear
}

/// Weight export in Keras layout (gate order i, f, c, o).
#[derive(Debug, Deserialize)]
struct NetworkArtifact {
    input_shape: Vec<Option<usize>>,
    layers: Vec<LayerArtifact>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LayerArtifact {
    Lstm {
        units: usize,
        #[serde(default = "default_cell_activation")]
        activation: Activation,
        #[serde(default)]
        return_sequences: bool,
        kernel: Vec<Vec<f32>>,
        recurrent_kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
    },
    Dense {
        #[serde(default = "default_dense_activation")]
        activation: Activation,
        kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
    },
}

#[derive(Debug)]
struct LstmLayer {
    units: usize,
    activation: Activation,
    return_sequences: bool,
    /// `[input_dim, 4 * units]`
    kernel: Array2<f32>,
    /// `[units, 4 * units]`
    recurrent: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Debug)]
struct DenseLayer {
    activation: Activation,
    /// `[input_dim, output_dim]`
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Debug)]
enum Layer {
    Lstm(LstmLayer),
    Dense(DenseLayer),
}

/// Activations flowing between layers for one batch item.
enum Signal {
    Sequence(Array2<f32>),
    Vector(Array1<f32>),
}

/// Stacked LSTM layers followed by dense layers; forward pass only.
#[derive(Debug)]
pub struct LstmNetwork {
    input_shape: Vec<Option<usize>>,
    input_dim: usize,
    layers: Vec<Layer>,
}

fn matrix(
    name: &str,
    rows: Vec<Vec<f32>>,
    expect: (usize, usize),
) -> Result<Array2<f32>, ModelError> {
    let (r, c) = expect;
    if rows.len() != r || rows.iter().any(|row| row.len() != c) {
        return Err(ModelError::Invalid(format!(
            "{name}: expected {r}x{c}, got {}x{}",
            rows.len(),
            rows.first().map_or(0, Vec::len)
        )));
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((r, c), flat).map_err(|e| ModelError::Invalid(format!("{name}: {e}")))
}

fn vector(name: &str, values: Vec<f32>, expect: usize) -> Result<Array1<f32>, ModelError> {
    if values.len() != expect {
        return Err(ModelError::Invalid(format!(
            "{name}: expected {expect} values, got {}",
            values.len()
        )));
    }
    Ok(Array1::from(values))
}

impl LstmNetwork {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let art: NetworkArtifact = serde_json::from_str(raw)?;
        if art.layers.is_empty() {
            return Err(ModelError::Invalid("network has no layers".into()));
        }

        let input_dim = match art.layers.first() {
            Some(LayerArtifact::Lstm { kernel, .. } | LayerArtifact::Dense { kernel, .. }) => {
                kernel.len()
            }
            None => 0,
        };
        if let [_, _, Some(features)] = art.input_shape.as_slice() {
            if *features != input_dim {
                return Err(ModelError::Invalid(format!(
                    "input_shape declares {features} features but first layer takes {input_dim}"
                )));
            }
        }

        let mut width = input_dim;
        let mut layers = Vec::with_capacity(art.layers.len());
        for (idx, layer) in art.layers.into_iter().enumerate() {
            match layer {
                LayerArtifact::Lstm {
                    units,
                    activation,
                    return_sequences,
                    kernel,
                    recurrent_kernel,
                    bias,
                } => {
                    if units == 0 {
                        return Err(ModelError::Invalid(format!("layer {idx}: zero units")));
                    }
                    let gates = 4 * units;
                    layers.push(Layer::Lstm(LstmLayer {
                        units,
                        activation,
                        return_sequences,
                        kernel: matrix(&format!("layer {idx} kernel"), kernel, (width, gates))?,
                        recurrent: matrix(
                            &format!("layer {idx} recurrent_kernel"),
                            recurrent_kernel,
                            (units, gates),
                        )?,
                        bias: vector(&format!("layer {idx} bias"), bias, gates)?,
                    }));
                    width = units;
                }
                LayerArtifact::Dense {
                    activation,
                    kernel,
                    bias,
                } => {
                    let out = bias.len();
                    layers.push(Layer::Dense(DenseLayer {
                        activation,
                        kernel: matrix(&format!("layer {idx} kernel"), kernel, (width, out))?,
                        bias: vector(&format!("layer {idx} bias"), bias, out)?,
                    }));
                    width = out;
                }
            }
        }

        Ok(Self {
            input_shape: art.input_shape,
            input_dim,
            layers,
        })
    }

    fn forward_one(&self, window: ArrayView2<f32>) -> Result<Vec<f32>, ModelError> {
        let mut signal = Signal::Sequence(window.to_owned());
        for layer in &self.layers {
            signal = match (layer, signal) {
                (Layer::Lstm(l), Signal::Sequence(seq)) => l.forward(seq.view()),
                (Layer::Lstm(_), Signal::Vector(_)) => {
                    return Err(ModelError::Inference(
                        "LSTM layer after a layer without return_sequences".into(),
                    ))
                }
                (Layer::Dense(d), Signal::Vector(v)) => Signal::Vector(d.forward(v.view())),
                (Layer::Dense(d), Signal::Sequence(seq)) => {
                    let rows: Vec<Array1<f32>> =
                        seq.rows().into_iter().map(|r| d.forward(r)).collect();
                    let width = d.bias.len();
                    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
                    let steps = flat.len() / width.max(1);
                    Signal::Sequence(
                        Array2::from_shape_vec((steps, width), flat)
                            .map_err(|e| ModelError::Inference(e.to_string()))?,
                    )
                }
            };
        }
        Ok(match signal {
            Signal::Sequence(seq) => seq.iter().copied().collect(),
            Signal::Vector(v) => v.to_vec(),
        })
    }
}

impl LstmLayer {
    fn forward(&self, seq: ArrayView2<f32>) -> Signal {
        let u = self.units;
        let mut h = Array1::<f32>::zeros(u);
        let mut c = Array1::<f32>::zeros(u);
        let mut outputs = Array2::<f32>::zeros((seq.nrows(), u));

        for (t, x_t) in seq.rows().into_iter().enumerate() {
            let z = x_t.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;
            let i = z.slice(s![0..u]).mapv(sigmoid);
            let f = z.slice(s![u..2 * u]).mapv(sigmoid);
            let g = z.slice(s![2 * u..3 * u]).mapv(|v| self.activation.apply(v));
            let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);
            c = &f * &c + &i * &g;
            h = &o * &c.mapv(|v| self.activation.apply(v));
            outputs.row_mut(t).assign(&h);
        }

        if self.return_sequences {
            Signal::Sequence(outputs)
        } else {
            Signal::Vector(h)
        }
    }
}

impl DenseLayer {
    fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        (x.dot(&self.kernel) + &self.bias).mapv(|v| self.activation.apply(v))
    }
}

impl SequenceModel for LstmNetwork {
    fn input_shape(&self) -> &[Option<usize>] {
        &self.input_shape
    }

    fn predict(&self, x: &Array3<f32>) -> Result<Vec<f32>, ModelError> {
        let (batch, _, features) = x.dim();
        if features != self.input_dim {
            return Err(ModelError::Inference(format!(
                "expected {} features, got {features}",
                self.input_dim
            )));
        }
        let mut out = Vec::with_capacity(batch);
        for b in 0..batch {
            out.extend(self.forward_one(x.slice(s![b, .., ..]))?);
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Inference("non-finite network output".into()));
        }
        Ok(out)
    }
}
