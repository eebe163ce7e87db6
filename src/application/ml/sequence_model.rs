//! Stacked LSTM regressor over feature windows.
//!
//! `LSTM(h1, sequences) -> Dropout -> LSTM(h2, last state) -> Dropout ->
//! Dense(d) -> Dense(outputs)`, trained on mean squared error with Adam and
//! full backpropagation through time. Gate order inside the fused weight
//! matrices is input, forget, candidate, output.

use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::ml::feature_registry::{HORIZONS, LOOK_BACK, NUM_FEATURES};
use ndarray::{
    Array, Array1, Array2, Array3, ArrayD, ArrayView2, ArrayView3, ArrayViewMutD, Axis, Dimension,
    Zip, s,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Hyperparameters of the forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub look_back: usize,
    pub lstm1_units: usize,
    pub lstm2_units: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Stop after this many epochs without validation improvement.
    pub patience: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            look_back: LOOK_BACK,
            lstm1_units: 100,
            lstm2_units: 50,
            dense_units: 25,
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            seed: 42,
            patience: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        let reason = if self.look_back == 0 {
            Some("look_back must be positive".to_string())
        } else if self.lstm1_units == 0 || self.lstm2_units == 0 || self.dense_units == 0 {
            Some("layer sizes must be positive".to_string())
        } else if !(0.0..1.0).contains(&self.dropout) {
            Some(format!("dropout must be in [0, 1), got {}", self.dropout))
        } else if self.epochs == 0 || self.batch_size == 0 {
            Some("epochs and batch_size must be positive".to_string())
        } else if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            Some(format!("invalid learning rate {}", self.learning_rate))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(AnalysisError::Training { reason }),
            None => Ok(()),
        }
    }
}

/// Losses recorded while fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    pub train_samples: usize,
    pub val_samples: usize,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.random_range(-limit..limit))
}

fn mse(pred: &Array2<f64>, target: &ArrayView2<f64>) -> f64 {
    let n = pred.len().max(1) as f64;
    Zip::from(pred)
        .and(target)
        .fold(0.0, |acc, &p, &t| acc + (p - t).powi(2))
        / n
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LstmLayer {
    /// `(input, 4 * units)`
    w: Array2<f64>,
    /// `(units, 4 * units)`
    u: Array2<f64>,
    b: Array1<f64>,
    units: usize,
}

struct LstmStep {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

struct LstmGrads {
    w: Array2<f64>,
    u: Array2<f64>,
    b: Array1<f64>,
}

impl LstmLayer {
    fn new(rng: &mut StdRng, input: usize, units: usize) -> Self {
        let mut b = Array1::zeros(4 * units);
        b.slice_mut(s![units..2 * units]).fill(1.0);
        Self {
            w: glorot(rng, input, 4 * units),
            u: glorot(rng, units, 4 * units),
            b,
            units,
        }
    }

    /// Runs the layer over `(batch, time, input)` and returns every hidden
    /// state, `(batch, time, units)`, with the per-step cache for BPTT.
    fn forward(&self, x: ArrayView3<f64>) -> (Array3<f64>, Vec<LstmStep>) {
        let (batch, steps, _) = x.dim();
        let n = self.units;
        let mut h = Array2::<f64>::zeros((batch, n));
        let mut c = Array2::<f64>::zeros((batch, n));
        let mut hs = Array3::<f64>::zeros((batch, steps, n));
        let mut cache = Vec::with_capacity(steps);

        for t in 0..steps {
            let x_t = x.slice(s![.., t, ..]).to_owned();
            let z = x_t.dot(&self.w) + h.dot(&self.u) + &self.b;
            let i = z.slice(s![.., 0..n]).mapv(sigmoid);
            let f = z.slice(s![.., n..2 * n]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * n..3 * n]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * n..4 * n]).mapv(sigmoid);
            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            hs.slice_mut(s![.., t, ..]).assign(&h_next);
            cache.push(LstmStep {
                x: x_t,
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h = h_next;
            c = c_next;
        }
        (hs, cache)
    }

    /// Backpropagates `dh` (gradient w.r.t. every emitted hidden state)
    /// through time. Returns parameter gradients and the input gradient.
    fn backward(&self, cache: &[LstmStep], dh: &Array3<f64>) -> (LstmGrads, Array3<f64>) {
        let (batch, steps, _) = dh.dim();
        let n = self.units;
        let mut grads = LstmGrads {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        };
        let mut dx = Array3::<f64>::zeros((batch, steps, self.w.nrows()));
        let mut dh_next = Array2::<f64>::zeros((batch, n));
        let mut dc_next = Array2::<f64>::zeros((batch, n));
        let mut dz = Array2::<f64>::zeros((batch, 4 * n));

        for t in (0..steps).rev() {
            let step = &cache[t];
            let dh_t = &dh.slice(s![.., t, ..]) + &dh_next;

            let d_o = &dh_t * &step.tanh_c;
            let dc = &dh_t * &step.o * &step.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            dc_next = &dc * &step.f;

            dz.slice_mut(s![.., 0..n])
                .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., n..2 * n])
                .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * n..3 * n])
                .assign(&(&d_g * &step.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * n..4 * n])
                .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.w += &step.x.t().dot(&dz);
            grads.u += &step.h_prev.t().dot(&dz);
            grads.b += &dz.sum_axis(Axis(0));

            dx.slice_mut(s![.., t, ..]).assign(&dz.dot(&self.w.t()));
            dh_next = dz.dot(&self.u.t());
        }
        (grads, dx)
    }

    fn params_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![
            self.w.view_mut().into_dyn(),
            self.u.view_mut().into_dyn(),
            self.b.view_mut().into_dyn(),
        ]
    }
}

impl LstmGrads {
    fn into_dyn(self) -> Vec<ArrayD<f64>> {
        vec![self.w.into_dyn(), self.u.into_dyn(), self.b.into_dyn()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// `(input, output)`
    w: Array2<f64>,
    b: Array1<f64>,
}

impl DenseLayer {
    fn new(rng: &mut StdRng, input: usize, output: usize) -> Self {
        Self {
            w: glorot(rng, input, output),
            b: Array1::zeros(output),
        }
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.w) + &self.b
    }

    /// Returns `[dw, db]` and the input gradient.
    fn backward(&self, x: &Array2<f64>, dy: &Array2<f64>) -> (Vec<ArrayD<f64>>, Array2<f64>) {
        let dw = x.t().dot(dy);
        let db = dy.sum_axis(Axis(0));
        let dx = dy.dot(&self.w.t());
        (vec![dw.into_dyn(), db.into_dyn()], dx)
    }

    fn params_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![self.w.view_mut().into_dyn(), self.b.view_mut().into_dyn()]
    }
}

/// Adam with bias-corrected moments.
#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
}

impl Adam {
    fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f64>>, grads: &[ArrayD<f64>]) {
        if self.m.is_empty() {
            self.m = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.v = self.m.clone();
        }
        self.t += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let lr_t = self.learning_rate * (1.0 - b2.powi(self.t)).sqrt() / (1.0 - b1.powi(self.t));

        for ((mut p, g), (m, v)) in params
            .into_iter()
            .zip(grads)
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            Zip::from(&mut p)
                .and(g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    *p -= lr_t * *m / (v.sqrt() + eps);
                });
        }
    }
}

fn dropout_mask<D: Dimension>(rng: &mut StdRng, shape: D, rate: f64) -> Array<f64, D> {
    let keep = 1.0 / (1.0 - rate);
    Array::from_shape_fn(shape, |_| {
        if rate > 0.0 && rng.random::<f64>() < rate {
            0.0
        } else {
            keep
        }
    })
}

/// Trainable multi-horizon forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmForecaster {
    config: ModelConfig,
    n_features: usize,
    n_outputs: usize,
    lstm1: LstmLayer,
    lstm2: LstmLayer,
    dense1: DenseLayer,
    dense2: DenseLayer,
}

impl LstmForecaster {
    /// Builds a network with seeded Glorot-uniform weights (forget bias 1).
    pub fn new(config: ModelConfig, n_features: usize, n_outputs: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let lstm1 = LstmLayer::new(&mut rng, n_features, config.lstm1_units);
        let lstm2 = LstmLayer::new(&mut rng, config.lstm1_units, config.lstm2_units);
        let dense1 = DenseLayer::new(&mut rng, config.lstm2_units, config.dense_units);
        let dense2 = DenseLayer::new(&mut rng, config.dense_units, n_outputs);
        Self {
            config,
            n_features,
            n_outputs,
            lstm1,
            lstm2,
            dense1,
            dense2,
        }
    }

    /// The default shape: 20 features in, one output per horizon.
    pub fn with_defaults(config: ModelConfig) -> Self {
        Self::new(config, NUM_FEATURES, HORIZONS.len())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn num_parameters(&self) -> usize {
        [
            self.lstm1.w.len() + self.lstm1.u.len() + self.lstm1.b.len(),
            self.lstm2.w.len() + self.lstm2.u.len() + self.lstm2.b.len(),
            self.dense1.w.len() + self.dense1.b.len(),
            self.dense2.w.len() + self.dense2.b.len(),
        ]
        .iter()
        .sum()
    }

    fn check_input(&self, x: &ArrayView3<f64>) -> AnalysisResult<()> {
        let (_, steps, features) = x.dim();
        if features != self.n_features {
            return Err(AnalysisError::ModelNotReady {
                reason: format!(
                    "window has {} features, model expects {}",
                    features, self.n_features
                ),
            });
        }
        if steps == 0 {
            return Err(AnalysisError::insufficient("forward pass", 1, 0));
        }
        Ok(())
    }

    /// Inference forward pass: `(batch, look_back, features)` to
    /// `(batch, outputs)`. Dropout is inactive.
    pub fn predict(&self, x: ArrayView3<f64>) -> AnalysisResult<Array2<f64>> {
        self.check_input(&x)?;
        let (h1, _) = self.lstm1.forward(x);
        let (h2, _) = self.lstm2.forward(h1.view());
        let last = h2.index_axis(Axis(1), h2.dim().1 - 1).to_owned();
        let hidden = self.dense1.forward(&last);
        Ok(self.dense2.forward(&hidden))
    }

    /// Mean squared error of `predict(x)` against `y`.
    pub fn evaluate(&self, x: ArrayView3<f64>, y: ArrayView2<f64>) -> AnalysisResult<f64> {
        let pred = self.predict(x)?;
        Ok(mse(&pred, &y))
    }

    /// One forward/backward pass over a batch; returns the batch loss and
    /// gradients in `params_mut` order.
    fn train_batch(
        &self,
        rng: &mut StdRng,
        x: ArrayView3<f64>,
        y: ArrayView2<f64>,
    ) -> (f64, Vec<ArrayD<f64>>) {
        let rate = self.config.dropout;
        let (batch, steps, _) = x.dim();

        let (h1, cache1) = self.lstm1.forward(x);
        let mask1 = dropout_mask(rng, h1.raw_dim(), rate);
        let d1 = &h1 * &mask1;

        let (h2, cache2) = self.lstm2.forward(d1.view());
        let last = h2.index_axis(Axis(1), steps - 1).to_owned();
        let mask2 = dropout_mask(rng, last.raw_dim(), rate);
        let d2 = &last * &mask2;

        let hidden = self.dense1.forward(&d2);
        let pred = self.dense2.forward(&hidden);
        let loss = mse(&pred, &y);

        let scale = 2.0 / (batch * self.n_outputs) as f64;
        let dpred = (&pred - &y) * scale;
        let (g_dense2, d_hidden) = self.dense2.backward(&hidden, &dpred);
        let (g_dense1, d_d2) = self.dense1.backward(&d2, &d_hidden);

        let mut dh2 = Array3::<f64>::zeros(h2.raw_dim());
        dh2.slice_mut(s![.., steps - 1, ..]).assign(&(&d_d2 * &mask2));
        let (g_lstm2, d_d1) = self.lstm2.backward(&cache2, &dh2);

        let dh1 = &d_d1 * &mask1;
        let (g_lstm1, _) = self.lstm1.backward(&cache1, &dh1);

        let mut grads = g_lstm1.into_dyn();
        grads.extend(g_lstm2.into_dyn());
        grads.extend(g_dense1);
        grads.extend(g_dense2);
        (loss, grads)
    }

    fn params_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut params = self.lstm1.params_mut();
        params.extend(self.lstm2.params_mut());
        params.extend(self.dense1.params_mut());
        params.extend(self.dense2.params_mut());
        params
    }

    /// Trains on shuffled mini-batches, evaluating the validation split after
    /// each epoch when it is non-empty.
    pub fn fit(
        &mut self,
        train_x: ArrayView3<f64>,
        train_y: ArrayView2<f64>,
        val_x: ArrayView3<f64>,
        val_y: ArrayView2<f64>,
    ) -> AnalysisResult<TrainingReport> {
        self.config.validate()?;
        self.check_input(&train_x)?;
        let samples = train_x.dim().0;
        if samples == 0 {
            error!("Cannot fit on an empty training set");
            return Err(AnalysisError::insufficient("model fitting", 1, 0));
        }
        if train_y.dim() != (samples, self.n_outputs) {
            return Err(AnalysisError::Training {
                reason: format!(
                    "labels have shape {:?}, expected ({}, {})",
                    train_y.dim(),
                    samples,
                    self.n_outputs
                ),
            });
        }
        let has_validation = val_x.dim().0 > 0;
        if has_validation {
            self.check_input(&val_x)?;
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let mut adam = Adam::new(self.config.learning_rate);
        let mut order: Vec<usize> = (0..samples).collect();
        let mut best_val = f64::INFINITY;
        let mut stale_epochs = 0;
        let mut report = TrainingReport {
            epochs_run: 0,
            train_loss: f64::NAN,
            val_loss: None,
            train_samples: samples,
            val_samples: val_x.dim().0,
        };

        for epoch in 1..=self.config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for chunk in order.chunks(self.config.batch_size) {
                let xb = train_x.select(Axis(0), chunk);
                let yb = train_y.select(Axis(0), chunk);
                let (loss, grads) = self.train_batch(&mut rng, xb.view(), yb.view());
                if !loss.is_finite() {
                    error!("Training diverged at epoch {}", epoch);
                    return Err(AnalysisError::Training {
                        reason: format!("non-finite loss at epoch {}", epoch),
                    });
                }
                epoch_loss += loss * chunk.len() as f64;
                adam.step(self.params_mut(), &grads);
            }

            report.epochs_run = epoch;
            report.train_loss = epoch_loss / samples as f64;
            if has_validation {
                let val_loss = self.evaluate(val_x, val_y)?;
                report.val_loss = Some(val_loss);
                debug!(
                    "Epoch {}/{} - loss: {:.6} - val_loss: {:.6}",
                    epoch, self.config.epochs, report.train_loss, val_loss
                );

                if let Some(patience) = self.config.patience {
                    if val_loss < best_val {
                        best_val = val_loss;
                        stale_epochs = 0;
                    } else {
                        stale_epochs += 1;
                        if stale_epochs >= patience {
                            info!("Early stopping after {} epochs", epoch);
                            break;
                        }
                    }
                }
            } else {
                debug!(
                    "Epoch {}/{} - loss: {:.6}",
                    epoch, self.config.epochs, report.train_loss
                );
            }
        }

        info!(
            "Model training completed: {} epochs, loss {:.6}, val_loss {:?}",
            report.epochs_run, report.train_loss, report.val_loss
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            look_back: 5,
            lstm1_units: 6,
            lstm2_units: 4,
            dense_units: 3,
            dropout: 0.0,
            epochs: 3,
            batch_size: 4,
            learning_rate: 0.01,
            seed: 7,
            patience: None,
        }
    }

    fn toy_data(samples: usize, steps: usize, features: usize) -> (Array3<f64>, Array2<f64>) {
        let x = Array3::from_shape_fn((samples, steps, features), |(i, t, f)| {
            ((i + t) as f64 * 0.3 + f as f64 * 0.1).sin() * 0.5 + 0.5
        });
        let y = Array2::from_shape_fn((samples, 3), |(i, h)| {
            ((i as f64) * 0.2).cos() * 0.01 * (h + 1) as f64
        });
        (x, y)
    }

    /// Loss of the same batch as `train_batch` sees it, without dropout.
    fn batch_loss(model: &LstmForecaster, x: &Array3<f64>, y: &Array2<f64>) -> f64 {
        model.evaluate(x.view(), y.view()).unwrap()
    }

    #[test]
    fn test_default_config_matches_architecture() {
        let config = ModelConfig::default();
        assert_eq!(config.look_back, 60);
        assert_eq!(
            (config.lstm1_units, config.lstm2_units, config.dense_units),
            (100, 50, 25)
        );
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 32);
        assert!(config.validate().is_ok());

        let model = LstmForecaster::with_defaults(config);
        // 4*100*(20+100+1) + 4*50*(100+50+1) + (50*25+25) + (25*3+3)
        assert_eq!(model.num_parameters(), 48_400 + 30_200 + 1_275 + 78);
    }

    #[test]
    fn test_predict_shape_and_determinism() {
        let (x, _) = toy_data(6, 5, 4);
        let a = LstmForecaster::new(tiny_config(), 4, 3);
        let b = LstmForecaster::new(tiny_config(), 4, 3);
        let pa = a.predict(x.view()).unwrap();
        assert_eq!(pa.dim(), (6, 3));
        assert!(pa.iter().all(|v| v.is_finite()));
        assert_eq!(pa, b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_predict_rejects_wrong_feature_count() {
        let (x, _) = toy_data(2, 5, 3);
        let model = LstmForecaster::new(tiny_config(), 4, 3);
        assert!(matches!(
            model.predict(x.view()),
            Err(AnalysisError::ModelNotReady { .. })
        ));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut config = tiny_config();
        config.lstm1_units = 3;
        config.lstm2_units = 2;
        config.dense_units = 2;
        let (x, y) = toy_data(2, 3, 2);
        let mut model = LstmForecaster::new(config, 2, 3);
        let mut rng = StdRng::seed_from_u64(0);
        let (_, grads) = model.train_batch(&mut rng, x.view(), y.view());

        let eps = 1e-6;
        let probes: [(usize, usize); 6] = [(0, 1), (1, 4), (2, 0), (3, 5), (7, 1), (9, 2)];
        for (param, flat) in probes {
            let analytic = grads[param].iter().nth(flat).copied().unwrap();

            let saved = model.params_mut()[param].iter().nth(flat).copied().unwrap();
            *model.params_mut()[param].iter_mut().nth(flat).unwrap() = saved + eps;
            let plus = batch_loss(&model, &x, &y);
            *model.params_mut()[param].iter_mut().nth(flat).unwrap() = saved - eps;
            let minus = batch_loss(&model, &x, &y);
            *model.params_mut()[param].iter_mut().nth(flat).unwrap() = saved;

            let numeric = (plus - minus) / (2.0 * eps);
            assert!(
                (analytic - numeric).abs() < 1e-6 + 1e-4 * numeric.abs(),
                "param {} index {}: analytic {} numeric {}",
                param,
                flat,
                analytic,
                numeric
            );
        }
    }

    #[test]
    fn test_fit_reduces_training_loss() {
        let mut config = tiny_config();
        config.epochs = 40;
        let (x, y) = toy_data(16, 5, 4);
        let mut model = LstmForecaster::new(config, 4, 3);
        let before = batch_loss(&model, &x, &y);
        let empty_x = Array3::<f64>::zeros((0, 5, 4));
        let empty_y = Array2::<f64>::zeros((0, 3));
        let report = model
            .fit(x.view(), y.view(), empty_x.view(), empty_y.view())
            .unwrap();
        assert_eq!(report.epochs_run, 40);
        assert!(report.val_loss.is_none());
        assert!(batch_loss(&model, &x, &y) < before);
    }

    #[test]
    fn test_fit_is_reproducible_with_seed() {
        let (x, y) = toy_data(10, 5, 4);
        let (vx, vy) = toy_data(3, 5, 4);
        let mut config = tiny_config();
        config.dropout = 0.2;
        let mut a = LstmForecaster::new(config.clone(), 4, 3);
        let mut b = LstmForecaster::new(config, 4, 3);
        let ra = a.fit(x.view(), y.view(), vx.view(), vy.view()).unwrap();
        let rb = b.fit(x.view(), y.view(), vx.view(), vy.view()).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(a, b);
        assert!(ra.val_loss.is_some());
    }

    #[test]
    fn test_early_stopping_stops_on_stale_validation() {
        // Same inputs, opposite targets: every step toward the training
        // targets moves away from the validation targets.
        let (x, _) = toy_data(8, 5, 4);
        let train_y = Array2::<f64>::ones((8, 3));
        let val_y = Array2::<f64>::from_elem((8, 3), -1.0);
        let mut config = tiny_config();
        config.epochs = 30;
        config.patience = Some(1);
        let mut model = LstmForecaster::new(config, 4, 3);
        let report = model
            .fit(x.view(), train_y.view(), x.view(), val_y.view())
            .unwrap();
        assert!(report.epochs_run < 30, "ran all {} epochs", report.epochs_run);
        assert!(report.epochs_run >= 2);

        let mut config = tiny_config();
        config.epochs = 30;
        let mut model = LstmForecaster::new(config, 4, 3);
        let report = model
            .fit(x.view(), train_y.view(), x.view(), val_y.view())
            .unwrap();
        assert_eq!(report.epochs_run, 30);
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let (x, _) = toy_data(3, 5, 4);
        let model = LstmForecaster::new(tiny_config(), 4, 3);
        let json = serde_json::to_string(&model).unwrap();
        let restored: LstmForecaster = serde_json::from_str(&json).unwrap();
        assert_eq!(
            model.predict(x.view()).unwrap(),
            restored.predict(x.view()).unwrap()
        );
    }

    #[test]
    fn test_invalid_config_is_a_training_error() {
        let mut config = tiny_config();
        config.dropout = 1.0;
        assert!(matches!(config.validate(), Err(AnalysisError::Training { .. })));
    }
}
