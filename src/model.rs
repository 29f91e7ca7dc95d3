use ndarray::{s, Array1, Array2, ArrayView1};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AnalysisError, Result};

/// The three interchangeable recurrent checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
  #[serde(rename = "LSTM")]
  Lstm,
  #[serde(rename = "BI-LSTM")]
  BiLstm,
  #[serde(rename = "GRU")]
  Gru,
}

impl ModelVariant {
  pub const ALL: [ModelVariant; 3] = [ModelVariant::Lstm, ModelVariant::BiLstm, ModelVariant::Gru];

  pub fn name(&self) -> &'static str {
    match self {
      Self::Lstm => "LSTM",
      Self::BiLstm => "BI-LSTM",
      Self::Gru => "GRU",
    }
  }
}

impl Default for ModelVariant {
  fn default() -> Self {
    Self::BiLstm
  }
}

impl fmt::Display for ModelVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ModelVariant {
  type Err = AnalysisError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_uppercase().replace('_', "-").as_str() {
      "LSTM" => Ok(Self::Lstm),
      "BI-LSTM" | "BILSTM" => Ok(Self::BiLstm),
      "GRU" => Ok(Self::Gru),
      _ => Err(AnalysisError::UnknownModel(s.to_string())),
    }
  }
}

/// Predictor
/// Maps a padded id sequence to a positive-class probability in [0, 1]
pub trait Predictor: Send + Sync {
  fn predict(&self, sequence: &[u32]) -> Result<f32>;
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

fn shape_error(what: &str, expected: String, found: &[usize]) -> AnalysisError {
  AnalysisError::ShapeMismatch(format!("{}: expected {}, found {:?}", what, expected, found))
}

/// LSTM Cell
/// Fused gate weights in i, f, c, o order
#[derive(Debug, Clone)]
pub struct LstmCell {
  kernel: Array2<f32>,
  recurrent_kernel: Array2<f32>,
  bias: Array1<f32>,
  units: usize,
}

impl LstmCell {
  pub fn new(kernel: Array2<f32>, recurrent_kernel: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
    let units: usize = recurrent_kernel.nrows();
    if units == 0 || recurrent_kernel.ncols() != 4 * units {
      return Err(shape_error("lstm recurrent_kernel", "[units, 4 * units]".into(), recurrent_kernel.shape()));
    }
    if kernel.ncols() != 4 * units {
      return Err(shape_error("lstm kernel", format!("[input, {}]", 4 * units), kernel.shape()));
    }
    if bias.len() != 4 * units {
      return Err(shape_error("lstm bias", format!("[{}]", 4 * units), bias.shape()));
    }
    Ok(Self { kernel, recurrent_kernel, bias, units })
  }

  fn input_dim(&self) -> usize {
    self.kernel.nrows()
  }

  fn step(&self, x: ArrayView1<f32>, h: &Array1<f32>, c: &Array1<f32>) -> (Array1<f32>, Array1<f32>) {
    let u: usize = self.units;
    let z: Array1<f32> = x.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;

    let i: Array1<f32> = z.slice(s![0..u]).mapv(sigmoid);
    let f: Array1<f32> = z.slice(s![u..2 * u]).mapv(sigmoid);
    let g: Array1<f32> = z.slice(s![2 * u..3 * u]).mapv(f32::tanh);
    let o: Array1<f32> = z.slice(s![3 * u..4 * u]).mapv(sigmoid);

    let c_next: Array1<f32> = &f * c + &i * &g;
    let h_next: Array1<f32> = &o * &c_next.mapv(f32::tanh);
    (h_next, c_next)
  }

  /// Final hidden state after reading `inputs` rows in the given order
  fn run<'a, I: Iterator<Item = ArrayView1<'a, f32>>>(&self, inputs: I) -> Array1<f32> {
    let mut h: Array1<f32> = Array1::zeros(self.units);
    let mut c: Array1<f32> = Array1::zeros(self.units);
    for x in inputs {
      let (h_next, c_next) = self.step(x, &h, &c);
      h = h_next;
      c = c_next;
    }
    h
  }
}

/// GRU Cell
/// Gates in z, r, h order. A `[2, 3 * units]` bias selects reset-after
/// gating (separate input and recurrent biases), a `[3 * units]` bias the
/// classic form.
#[derive(Debug, Clone)]
pub struct GruCell {
  kernel: Array2<f32>,
  recurrent_kernel: Array2<f32>,
  bias: Array2<f32>,
  reset_after: bool,
  units: usize,
}

impl GruCell {
  pub fn new(kernel: Array2<f32>, recurrent_kernel: Array2<f32>, bias: Array2<f32>) -> Result<Self> {
    let units: usize = recurrent_kernel.nrows();
    if units == 0 || recurrent_kernel.ncols() != 3 * units {
      return Err(shape_error("gru recurrent_kernel", "[units, 3 * units]".into(), recurrent_kernel.shape()));
    }
    if kernel.ncols() != 3 * units {
      return Err(shape_error("gru kernel", format!("[input, {}]", 3 * units), kernel.shape()));
    }
    let reset_after: bool = match bias.shape() {
      [2, n] if *n == 3 * units => true,
      [1, n] if *n == 3 * units => false,
      other => return Err(shape_error("gru bias", format!("[2, {}] or [{}]", 3 * units, 3 * units), other)),
    };
    Ok(Self { kernel, recurrent_kernel, bias, reset_after, units })
  }

  fn input_dim(&self) -> usize {
    self.kernel.nrows()
  }

  fn step(&self, x: ArrayView1<f32>, h: &Array1<f32>) -> Array1<f32> {
    let u: usize = self.units;
    let xw: Array1<f32> = x.dot(&self.kernel) + &self.bias.row(0);

    let candidate: Array1<f32>;
    let z: Array1<f32>;
    if self.reset_after {
      let hu: Array1<f32> = h.dot(&self.recurrent_kernel) + &self.bias.row(1);
      z = (&xw.slice(s![0..u]) + &hu.slice(s![0..u])).mapv(sigmoid);
      let r: Array1<f32> = (&xw.slice(s![u..2 * u]) + &hu.slice(s![u..2 * u])).mapv(sigmoid);
      candidate = (&xw.slice(s![2 * u..3 * u]) + &(&r * &hu.slice(s![2 * u..3 * u]))).mapv(f32::tanh);
    } else {
      let hu: Array1<f32> = h.dot(&self.recurrent_kernel.slice(s![.., 0..2 * u]));
      z = (&xw.slice(s![0..u]) + &hu.slice(s![0..u])).mapv(sigmoid);
      let r: Array1<f32> = (&xw.slice(s![u..2 * u]) + &hu.slice(s![u..2 * u])).mapv(sigmoid);
      let rh: Array1<f32> = (&r * h).dot(&self.recurrent_kernel.slice(s![.., 2 * u..3 * u]));
      candidate = (&xw.slice(s![2 * u..3 * u]) + &rh).mapv(f32::tanh);
    }

    &z * h + &(z.mapv(|v| 1.0 - v) * &candidate)
  }

  fn run<'a, I: Iterator<Item = ArrayView1<'a, f32>>>(&self, inputs: I) -> Array1<f32> {
    let mut h: Array1<f32> = Array1::zeros(self.units);
    for x in inputs {
      h = self.step(x, &h);
    }
    h
  }
}

#[derive(Debug, Clone)]
pub enum RecurrentLayer {
  Lstm(LstmCell),
  /// Forward and backward passes, final states concatenated
  BiLstm { forward: LstmCell, backward: LstmCell },
  Gru(GruCell),
}

impl RecurrentLayer {
  fn variant(&self) -> ModelVariant {
    match self {
      Self::Lstm(_) => ModelVariant::Lstm,
      Self::BiLstm { .. } => ModelVariant::BiLstm,
      Self::Gru(_) => ModelVariant::Gru,
    }
  }

  fn input_dim(&self) -> usize {
    match self {
      Self::Lstm(cell) => cell.input_dim(),
      Self::BiLstm { forward, .. } => forward.input_dim(),
      Self::Gru(cell) => cell.input_dim(),
    }
  }

  fn output_dim(&self) -> usize {
    match self {
      Self::Lstm(cell) => cell.units,
      Self::BiLstm { forward, backward } => forward.units + backward.units,
      Self::Gru(cell) => cell.units,
    }
  }

  fn forward(&self, embedded: &Array2<f32>) -> Array1<f32> {
    match self {
      Self::Lstm(cell) => cell.run(embedded.rows().into_iter()),
      Self::Gru(cell) => cell.run(embedded.rows().into_iter()),
      Self::BiLstm { forward, backward } => {
        let steps: usize = embedded.nrows();
        let h_forward: Array1<f32> = forward.run(embedded.rows().into_iter());
        let h_backward: Array1<f32> = backward.run((0..steps).rev().map(|t| embedded.row(t)));
        h_forward.iter().chain(h_backward.iter()).copied().collect()
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
  Relu,
  Sigmoid,
}

#[derive(Debug, Clone)]
pub struct DenseLayer {
  kernel: Array2<f32>,
  bias: Array1<f32>,
  activation: Activation,
}

impl DenseLayer {
  pub fn new(kernel: Array2<f32>, bias: Array1<f32>, activation: Activation) -> Result<Self> {
    if bias.len() != kernel.ncols() {
      return Err(shape_error("dense bias", format!("[{}]", kernel.ncols()), bias.shape()));
    }
    Ok(Self { kernel, bias, activation })
  }

  fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
    let y: Array1<f32> = x.dot(&self.kernel) + &self.bias;
    match self.activation {
      Activation::Relu => y.mapv(|v| v.max(0.0)),
      Activation::Sigmoid => y.mapv(sigmoid),
    }
  }
}

/// Recurrent Network
/// Embedding, one recurrent layer, then a dense stack ending in a single
/// sigmoid unit
#[derive(Debug, Clone)]
pub struct RecurrentNetwork {
  embedding: Array2<f32>,
  recurrent: RecurrentLayer,
  dense: Vec<DenseLayer>,
}

impl RecurrentNetwork {
  pub fn from_parts(embedding: Array2<f32>, recurrent: RecurrentLayer, dense: Vec<DenseLayer>) -> Result<Self> {
    if embedding.ncols() != recurrent.input_dim() {
      return Err(shape_error("embedding", format!("[vocab, {}]", recurrent.input_dim()), embedding.shape()));
    }
    if let RecurrentLayer::BiLstm { forward, backward } = &recurrent {
      if forward.input_dim() != backward.input_dim() {
        return Err(shape_error("backward kernel", format!("[{}, _]", forward.input_dim()), backward.kernel.shape()));
      }
    }

    let mut width: usize = recurrent.output_dim();
    for (i, layer) in dense.iter().enumerate() {
      if layer.kernel.nrows() != width {
        return Err(shape_error(&format!("dense.{}.kernel", i), format!("[{}, _]", width), layer.kernel.shape()));
      }
      width = layer.kernel.ncols();
    }
    match dense.last() {
      Some(last) if width == 1 && last.activation == Activation::Sigmoid => {}
      _ => return Err(AnalysisError::ShapeMismatch("network must end in one sigmoid unit".into())),
    }

    Ok(Self { embedding, recurrent, dense })
  }

  pub fn variant(&self) -> ModelVariant {
    self.recurrent.variant()
  }

  /// Load
  /// Reads a safetensors checkpoint laid out as `embedding.weight`,
  /// `recurrent[.forward|.backward].{kernel,recurrent_kernel,bias}` and
  /// `dense.{i}.{kernel,bias}`
  pub fn load(path: &Path, variant: ModelVariant) -> Result<Self> {
    let bytes: Vec<u8> = std::fs::read(path).map_err(|e| AnalysisError::io(path, e))?;
    let weights_error = |message: String| AnalysisError::Weights { path: path.to_path_buf(), message };
    let tensors: SafeTensors = SafeTensors::deserialize(&bytes).map_err(|e| weights_error(e.to_string()))?;
    let reader: TensorReader = TensorReader { tensors: &tensors, path };

    let embedding: Array2<f32> = reader.matrix("embedding.weight")?;
    let recurrent: RecurrentLayer = match variant {
      ModelVariant::Lstm => RecurrentLayer::Lstm(reader.lstm("recurrent")?),
      ModelVariant::BiLstm => RecurrentLayer::BiLstm {
        forward: reader.lstm("recurrent.forward")?,
        backward: reader.lstm("recurrent.backward")?,
      },
      ModelVariant::Gru => RecurrentLayer::Gru(reader.gru("recurrent")?),
    };

    let mut dense: Vec<DenseLayer> = vec!();
    while reader.contains(&format!("dense.{}.kernel", dense.len())) {
      let i: usize = dense.len();
      let kernel: Array2<f32> = reader.matrix(&format!("dense.{}.kernel", i))?;
      let bias: Array1<f32> = reader.vector(&format!("dense.{}.bias", i))?;
      dense.push(DenseLayer::new(kernel, bias, Activation::Relu)?);
    }
    if let Some(last) = dense.last_mut() {
      last.activation = Activation::Sigmoid;
    }

    let network: RecurrentNetwork = Self::from_parts(embedding, recurrent, dense)?;
    tracing::info!(path = %path.display(), %variant, vocab = network.embedding.nrows(), "loaded model weights");
    Ok(network)
  }

  /// Writes the network in the layout `load` reads
  pub fn save(&self, path: &Path) -> Result<()> {
    let mut writer: TensorWriter = TensorWriter::default();
    writer.push("embedding.weight", self.embedding.shape(), self.embedding.iter());
    match &self.recurrent {
      RecurrentLayer::Lstm(cell) => writer.lstm("recurrent", cell),
      RecurrentLayer::BiLstm { forward, backward } => {
        writer.lstm("recurrent.forward", forward);
        writer.lstm("recurrent.backward", backward);
      }
      RecurrentLayer::Gru(cell) => {
        writer.push("recurrent.kernel", cell.kernel.shape(), cell.kernel.iter());
        writer.push("recurrent.recurrent_kernel", cell.recurrent_kernel.shape(), cell.recurrent_kernel.iter());
        if cell.reset_after {
          writer.push("recurrent.bias", cell.bias.shape(), cell.bias.iter());
        } else {
          writer.push("recurrent.bias", &[cell.bias.ncols()], cell.bias.iter());
        }
      }
    }
    for (i, layer) in self.dense.iter().enumerate() {
      writer.push(&format!("dense.{}.kernel", i), layer.kernel.shape(), layer.kernel.iter());
      writer.push(&format!("dense.{}.bias", i), layer.bias.shape(), layer.bias.iter());
    }

    let weights_error = |message: String| AnalysisError::Weights { path: path.to_path_buf(), message };
    let views: Vec<(String, TensorView<'_>)> = writer
      .tensors
      .iter()
      .map(|(name, shape, bytes)| {
        TensorView::new(Dtype::F32, shape.clone(), bytes)
          .map(|view| (name.clone(), view))
          .map_err(|e| weights_error(e.to_string()))
      })
      .collect::<Result<_>>()?;
    safetensors::tensor::serialize_to_file(views, &None, path).map_err(|e| weights_error(e.to_string()))
  }

  fn embed(&self, sequence: &[u32]) -> Result<Array2<f32>> {
    let vocab: usize = self.embedding.nrows();
    let mut embedded: Array2<f32> = Array2::zeros((sequence.len(), self.embedding.ncols()));
    for (t, &id) in sequence.iter().enumerate() {
      let id: usize = id as usize;
      if id >= vocab {
        return Err(AnalysisError::ShapeMismatch(format!("token id {} outside embedding of {} rows", id, vocab)));
      }
      embedded.row_mut(t).assign(&self.embedding.row(id));
    }
    Ok(embedded)
  }
}

impl Predictor for RecurrentNetwork {
  fn predict(&self, sequence: &[u32]) -> Result<f32> {
    if sequence.is_empty() {
      return Err(AnalysisError::ShapeMismatch("empty input sequence".into()));
    }
    let embedded: Array2<f32> = self.embed(sequence)?;
    let mut x: Array1<f32> = self.recurrent.forward(&embedded);
    for layer in &self.dense {
      x = layer.forward(&x);
    }
    let y_hat: f32 = x[0];
    if !y_hat.is_finite() {
      return Err(AnalysisError::ShapeMismatch(format!("non-finite prediction {}", y_hat)));
    }
    Ok(y_hat.clamp(0.0, 1.0))
  }
}

#[derive(Default)]
struct TensorWriter {
  tensors: Vec<(String, Vec<usize>, Vec<u8>)>,
}

impl TensorWriter {
  fn push<'a, I: Iterator<Item = &'a f32>>(&mut self, name: &str, shape: &[usize], values: I) {
    let bytes: Vec<u8> = values.flat_map(|v| v.to_le_bytes()).collect();
    self.tensors.push((name.to_string(), shape.to_vec(), bytes));
  }

  fn lstm(&mut self, prefix: &str, cell: &LstmCell) {
    self.push(&format!("{}.kernel", prefix), cell.kernel.shape(), cell.kernel.iter());
    self.push(&format!("{}.recurrent_kernel", prefix), cell.recurrent_kernel.shape(), cell.recurrent_kernel.iter());
    self.push(&format!("{}.bias", prefix), cell.bias.shape(), cell.bias.iter());
  }
}

struct TensorReader<'a> {
  tensors: &'a SafeTensors<'a>,
  path: &'a Path,
}

impl<'a> TensorReader<'a> {
  fn error(&self, message: String) -> AnalysisError {
    AnalysisError::Weights { path: PathBuf::from(self.path), message }
  }

  fn contains(&self, name: &str) -> bool {
    self.tensors.tensor(name).is_ok()
  }

  fn read(&self, name: &str) -> Result<(Vec<usize>, Vec<f32>)> {
    let view: TensorView<'_> = self.tensors.tensor(name).map_err(|e| self.error(format!("{}: {}", name, e)))?;
    if view.dtype() != Dtype::F32 {
      return Err(self.error(format!("{}: expected F32, found {:?}", name, view.dtype())));
    }
    let values: Vec<f32> = view
      .data()
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect();
    Ok((view.shape().to_vec(), values))
  }

  fn matrix(&self, name: &str) -> Result<Array2<f32>> {
    let (shape, values) = self.read(name)?;
    match shape.as_slice() {
      [rows, cols] => Array2::from_shape_vec((*rows, *cols), values).map_err(|e| self.error(format!("{}: {}", name, e))),
      other => Err(self.error(format!("{}: expected a matrix, found shape {:?}", name, other))),
    }
  }

  fn vector(&self, name: &str) -> Result<Array1<f32>> {
    let (shape, values) = self.read(name)?;
    match shape.as_slice() {
      [_] => Ok(Array1::from_vec(values)),
      other => Err(self.error(format!("{}: expected a vector, found shape {:?}", name, other))),
    }
  }

  fn lstm(&self, prefix: &str) -> Result<LstmCell> {
    LstmCell::new(
      self.matrix(&format!("{}.kernel", prefix))?,
      self.matrix(&format!("{}.recurrent_kernel", prefix))?,
      self.vector(&format!("{}.bias", prefix))?,
    )
  }

  fn gru(&self, prefix: &str) -> Result<GruCell> {
    let name: String = format!("{}.bias", prefix);
    let (shape, values) = self.read(&name)?;
    let bias: Array2<f32> = match shape.as_slice() {
      [n] => Array2::from_shape_vec((1, *n), values),
      [rows, cols] => Array2::from_shape_vec((*rows, *cols), values),
      other => return Err(self.error(format!("{}: unexpected shape {:?}", name, other))),
    }
    .map_err(|e| self.error(format!("{}: {}", name, e)))?;

    GruCell::new(
      self.matrix(&format!("{}.kernel", prefix))?,
      self.matrix(&format!("{}.recurrent_kernel", prefix))?,
      bias,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use ndarray::array;

  fn head() -> Vec<DenseLayer> {
    vec![DenseLayer::new(array![[1.0], [1.0]], array![0.0], Activation::Sigmoid).unwrap()]
  }

  fn lstm_cell(scale: f32) -> LstmCell {
    LstmCell::new(
      Array2::from_elem((1, 8), scale),
      Array2::from_elem((2, 8), 0.1),
      Array1::zeros(8),
    )
    .unwrap()
  }

  #[test]
  fn it_parses_variant_names() {
    assert_eq!("lstm".parse::<ModelVariant>().unwrap(), ModelVariant::Lstm);
    assert_eq!("BI-LSTM".parse::<ModelVariant>().unwrap(), ModelVariant::BiLstm);
    assert_eq!("bi_lstm".parse::<ModelVariant>().unwrap(), ModelVariant::BiLstm);
    assert_eq!("Gru".parse::<ModelVariant>().unwrap(), ModelVariant::Gru);
    assert!("cnn".parse::<ModelVariant>().is_err());
    assert_eq!(ModelVariant::BiLstm.to_string(), "BI-LSTM");
  }

  #[test]
  fn it_runs_one_lstm_step() {
    let cell: LstmCell = LstmCell::new(array![[1.0, 1.0, 1.0, 1.0]], array![[0.0, 0.0, 0.0, 0.0]], array![0.0, 0.0, 0.0, 0.0]).unwrap();
    let embedding: Array2<f32> = array![[0.0], [1.0]];
    let dense: Vec<DenseLayer> = vec![DenseLayer::new(array![[1.0]], array![0.0], Activation::Sigmoid).unwrap()];
    let network: RecurrentNetwork = RecurrentNetwork::from_parts(embedding, RecurrentLayer::Lstm(cell), dense).unwrap();

    let gate: f32 = sigmoid(1.0);
    let c: f32 = gate * 1.0_f32.tanh();
    let h: f32 = gate * c.tanh();
    assert_relative_eq!(network.predict(&[1]).unwrap(), sigmoid(h), epsilon = 1e-6);
  }

  #[test]
  fn zero_weights_predict_one_half() {
    let cell: LstmCell = LstmCell::new(Array2::zeros((3, 8)), Array2::zeros((2, 8)), Array1::zeros(8)).unwrap();
    let network: RecurrentNetwork =
      RecurrentNetwork::from_parts(Array2::ones((10, 3)), RecurrentLayer::Lstm(cell), head()).unwrap();
    assert_relative_eq!(network.predict(&[1, 2, 3, 0, 0]).unwrap(), 0.5, epsilon = 1e-6);
  }

  #[test]
  fn bidirectional_reads_both_directions() {
    let embedding: Array2<f32> = array![[0.0], [1.0], [-1.0]];
    let bi = RecurrentLayer::BiLstm { forward: lstm_cell(1.0), backward: lstm_cell(1.0) };
    let dense: Vec<DenseLayer> = vec![DenseLayer::new(array![[1.0], [1.0], [-1.0], [-1.0]], array![0.0], Activation::Sigmoid).unwrap()];
    let network: RecurrentNetwork = RecurrentNetwork::from_parts(embedding, bi, dense).unwrap();

    // identical directions cancel on a palindrome only
    assert_relative_eq!(network.predict(&[1, 2, 1]).unwrap(), 0.5, epsilon = 1e-6);
    assert!((network.predict(&[1, 2, 2]).unwrap() - 0.5).abs() > 1e-4);
  }

  #[test]
  fn gru_bias_layouts_are_checked() {
    let ok = GruCell::new(Array2::zeros((3, 6)), Array2::zeros((2, 6)), Array2::zeros((2, 6)));
    assert!(ok.is_ok());
    let bad = GruCell::new(Array2::zeros((3, 6)), Array2::zeros((2, 6)), Array2::zeros((3, 6)));
    assert!(matches!(bad, Err(AnalysisError::ShapeMismatch(_))));
  }

  #[test]
  fn gru_keeps_state_when_update_gate_saturates() {
    // z = sigmoid(large) ~ 1 keeps h at its initial zero
    let mut bias: Array2<f32> = Array2::zeros((2, 3));
    bias[[0, 0]] = 50.0;
    let cell: GruCell = GruCell::new(Array2::ones((1, 3)), Array2::zeros((1, 3)), bias).unwrap();
    let dense: Vec<DenseLayer> = vec![DenseLayer::new(array![[1.0]], array![0.0], Activation::Sigmoid).unwrap()];
    let network: RecurrentNetwork =
      RecurrentNetwork::from_parts(array![[0.0], [2.0]], RecurrentLayer::Gru(cell), dense).unwrap();
    assert_relative_eq!(network.predict(&[1, 1, 1]).unwrap(), 0.5, epsilon = 1e-5);
  }

  #[test]
  fn it_rejects_out_of_range_ids_and_bad_heads() {
    let network: RecurrentNetwork =
      RecurrentNetwork::from_parts(Array2::zeros((4, 1)), RecurrentLayer::Lstm(lstm_cell(0.5)), vec![
        DenseLayer::new(array![[1.0], [1.0]], array![0.0], Activation::Sigmoid).unwrap(),
      ])
      .unwrap();
    assert!(network.predict(&[7]).is_err());
    assert!(network.predict(&[]).is_err());

    let relu_head = vec![DenseLayer::new(array![[1.0], [1.0]], array![0.0], Activation::Relu).unwrap()];
    assert!(RecurrentNetwork::from_parts(Array2::zeros((4, 1)), RecurrentLayer::Lstm(lstm_cell(0.5)), relu_head).is_err());
  }

  #[test]
  fn it_saves_and_loads_weights() {
    let dir = tempfile::tempdir().unwrap();
    let cases: [(ModelVariant, RecurrentLayer, Vec<DenseLayer>); 3] = [
      (ModelVariant::Lstm, RecurrentLayer::Lstm(lstm_cell(0.3)), head()),
      (
        ModelVariant::BiLstm,
        RecurrentLayer::BiLstm { forward: lstm_cell(0.3), backward: lstm_cell(-0.2) },
        vec![
          DenseLayer::new(Array2::from_elem((4, 3), 0.5), Array1::from_elem(3, 0.1), Activation::Relu).unwrap(),
          DenseLayer::new(array![[1.0], [-1.0], [0.5]], array![0.2], Activation::Sigmoid).unwrap(),
        ],
      ),
      (
        ModelVariant::Gru,
        RecurrentLayer::Gru(GruCell::new(Array2::from_elem((1, 6), 0.4), Array2::from_elem((2, 6), 0.1), Array2::from_elem((2, 6), 0.05)).unwrap()),
        head(),
      ),
    ];

    for (variant, recurrent, dense) in cases {
      let embedding: Array2<f32> = array![[0.0], [0.7], [-0.4], [1.2]];
      let network: RecurrentNetwork = RecurrentNetwork::from_parts(embedding, recurrent, dense).unwrap();
      assert_eq!(network.variant(), variant);

      let path = dir.path().join(format!("model_{}.safetensors", variant));
      network.save(&path).unwrap();
      let loaded: RecurrentNetwork = RecurrentNetwork::load(&path, variant).unwrap();

      let sequence: [u32; 6] = [1, 3, 2, 0, 0, 0];
      let expected: f32 = network.predict(&sequence).unwrap();
      assert_relative_eq!(loaded.predict(&sequence).unwrap(), expected, epsilon = 1e-6);
      assert!((0.0..=1.0).contains(&expected));
    }
  }

  #[test]
  fn loading_the_wrong_layout_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_LSTM.safetensors");
    let network: RecurrentNetwork =
      RecurrentNetwork::from_parts(Array2::zeros((4, 1)), RecurrentLayer::Lstm(lstm_cell(0.5)), head()).unwrap();
    network.save(&path).unwrap();

    assert!(matches!(RecurrentNetwork::load(&path, ModelVariant::BiLstm), Err(AnalysisError::Weights { .. })));
    std::fs::write(&path, b"junk").unwrap();
    assert!(matches!(RecurrentNetwork::load(&path, ModelVariant::Lstm), Err(AnalysisError::Weights { .. })));
  }
}
