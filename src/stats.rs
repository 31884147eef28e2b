use serde::{Deserialize, Serialize};

/// Running mean and variance of a stream of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Fold a new series into the running average of `n_merged` previous series.
///
/// Each entry becomes `(n * avg + x) / (n + 1)`. Series of different lengths are
/// reconciled asymmetrically:
/// - where the average is longer, the new series is extended with its last value;
/// - where the new series is longer, the average is extended with its last
///   (already updated) value as the prior.
///
/// Note that the result depends on the order in which series are merged.
pub fn merge_into_average(avg: &mut Vec<f64>, series: &[f64], n_merged: usize) {
    let Some(&series_last) = series.last() else {
        return;
    };
    let n = n_merged as f64;
    let update = |old: f64, new: f64| (n * old + new) / (n + 1.0);

    let avg_len = avg.len();
    for (i_val, old) in avg.iter_mut().enumerate() {
        let new = series.get(i_val).copied().unwrap_or(series_last);
        *old = update(*old, new);
    }

    if series.len() > avg_len {
        // Prior for the new entries is the already updated last average.
        let prior = avg.last().copied().unwrap_or(0.0);
        avg.extend(series[avg_len..].iter().map(|&new| update(prior, new)));
    }
}

/// Running averages of the per-language series of many runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageSeries {
    n_merged: usize,
    lang_series_vec: Vec<Vec<f64>>,
}

impl AverageSeries {
    pub fn new(n_langs: usize) -> Self {
        Self {
            n_merged: 0,
            lang_series_vec: vec![Vec::new(); n_langs],
        }
    }

    /// Average series of language `i_lang`, indexed by iteration.
    pub fn language(&self, i_lang: usize) -> &[f64] {
        &self.lang_series_vec[i_lang]
    }

    /// Merge one run, given as one series per language.
    pub fn merge(&mut self, run_series_vec: &[Vec<f64>]) {
        for (avg, series) in self.lang_series_vec.iter_mut().zip(run_series_vec) {
            merge_into_average(avg, series, self.n_merged);
        }
        self.n_merged += 1;
    }
}
