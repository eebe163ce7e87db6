//! Column-wise helpers over `f64` series.
//!
//! Gaps are represented as `NaN`, matching how warm-up periods and
//! forward-looking labels are left undefined before filling or dropping.

use statrs::statistics::{Data, Distribution};

/// Relative change versus `periods` rows earlier. The first `periods` values
/// are undefined.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i < periods || periods == 0 {
                return f64::NAN;
            }
            let prev = values[i - periods];
            if prev == 0.0 { f64::NAN } else { v / prev - 1.0 }
        })
        .collect()
}

/// Relative change from each row to the row `horizon` ahead. The last
/// `horizon` values are undefined.
pub fn forward_pct_change(values: &[f64], horizon: usize) -> Vec<f64> {
    let len = values.len();
    (0..len)
        .map(|i| {
            if horizon == 0 || i + horizon >= len {
                return f64::NAN;
            }
            let base = values[i];
            if base == 0.0 {
                f64::NAN
            } else {
                values[i + horizon] / base - 1.0
            }
        })
        .collect()
}

/// Sample standard deviation over a trailing window. A window containing any
/// gap, or not yet full, yields a gap.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        if w.len() < 2 {
            return None;
        }
        Data::new(w.to_vec()).std_dev()
    })
}

/// Mean over a trailing window, same gap rules as `rolling_std`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| Data::new(w.to_vec()).mean())
}

fn rolling<F>(values: &[f64], window: usize, stat: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return f64::NAN;
            }
            let w = &values[i + 1 - window..=i];
            if w.iter().any(|v| !v.is_finite()) {
                return f64::NAN;
            }
            stat(w).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Propagates the last defined value forward over gaps.
pub fn forward_fill(values: &mut [f64]) {
    let mut last: Option<f64> = None;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = Some(*v);
        } else if let Some(prev) = last {
            *v = prev;
        }
    }
}

/// Propagates the next defined value backward over gaps.
pub fn backward_fill(values: &mut [f64]) {
    let mut next: Option<f64> = None;
    for v in values.iter_mut().rev() {
        if v.is_finite() {
            next = Some(*v);
        } else if let Some(following) = next {
            *v = following;
        }
    }
}

/// Forward fill, then backward fill.
pub fn fill_gaps(values: &mut [f64]) {
    forward_fill(values);
    backward_fill(values);
}

/// The nominal lookback of a windowed computation, capped for short series.
pub fn effective_period(nominal: usize, rows: usize) -> usize {
    nominal.min(rows.saturating_sub(1))
}

/// Last finite value, if any.
pub fn last_finite(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

/// Mean of the finite values, ignoring gaps.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Data::new(finite).mean()
    }
}
