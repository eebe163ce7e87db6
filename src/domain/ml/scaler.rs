use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Per-feature min-max transform onto [0, 1].
///
/// Zero-range features get a scale of 1, so they map to 0 and still invert
/// exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    data_min: Array1<f64>,
    data_max: Array1<f64>,
    scale: Array1<f64>,
}

impl MinMaxScaler {
    /// Fits on a `(rows, features)` matrix. Returns `None` for an empty matrix.
    pub fn fit(data: ArrayView2<f64>) -> Option<Self> {
        if data.nrows() == 0 {
            return None;
        }

        let data_min = data.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
        let data_max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let scale = Zip::from(&data_min)
            .and(&data_max)
            .map_collect(|&lo, &hi| {
                let range = hi - lo;
                if range == 0.0 || !range.is_finite() {
                    1.0
                } else {
                    1.0 / range
                }
            });

        Some(Self {
            data_min,
            data_max,
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    pub fn data_min(&self) -> &Array1<f64> {
        &self.data_min
    }

    pub fn data_max(&self) -> &Array1<f64> {
        &self.data_max
    }

    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            Zip::from(&mut row)
                .and(&self.data_min)
                .and(&self.scale)
                .for_each(|v, &lo, &s| *v = (*v - lo) * s);
        }
        out
    }

    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            Zip::from(&mut row)
                .and(&self.data_min)
                .and(&self.scale)
                .for_each(|v, &lo, &s| *v = *v / s + lo);
        }
        out
    }
}
