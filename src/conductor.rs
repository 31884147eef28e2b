use crate::simulation::{LanguageStats, Simulation};
use crate::stats::{Accumulator, AccumulatorReport, AverageSeries};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-language statistic series of one run, indexed by iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSeries {
    pub weight_sums: Vec<Vec<f64>>,
    pub n_users: Vec<Vec<f64>>,
    pub n_recognized_things: Vec<Vec<f64>>,
}

impl RunSeries {
    fn new(n_langs: usize) -> Self {
        Self {
            weight_sums: vec![Vec::new(); n_langs],
            n_users: vec![Vec::new(); n_langs],
            n_recognized_things: vec![Vec::new(); n_langs],
        }
    }

    fn push(&mut self, stats: &LanguageStats) {
        push_values(&mut self.weight_sums, stats.weight_sums.iter().copied());
        push_values(&mut self.n_users, stats.n_users.iter().map(|&n| n as f64));
        push_values(
            &mut self.n_recognized_things,
            stats.n_recognized_things.iter().map(|&n| n as f64),
        );
    }
}

fn push_values(series_vec: &mut [Vec<f64>], vals: impl Iterator<Item = f64>) {
    for (series, val) in series_vec.iter_mut().zip(vals) {
        series.push(val);
    }
}

/// Outcome of one complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub series: RunSeries,
    pub n_iterations: usize,
    pub n_interactions: usize,
    /// The run converged before reaching the iteration cap.
    pub finished: bool,
}

/// Run a fresh copy of `pattern` until it converges or reaches `stop_iteration` steps,
/// recording its statistics before the first step and after every step.
pub fn perform_run(
    pattern: &Simulation,
    rng: ChaCha12Rng,
    stop_iteration: usize,
) -> Result<RunRecord> {
    let mut sim = pattern.fork(rng);
    let mut series = RunSeries::new(sim.languages().len());
    series.push(&sim.stats().context("failed to compute initial stats")?);

    while !sim.is_done() && sim.n_iterations() < stop_iteration {
        sim.simulate_one_step()
            .with_context(|| format!("failed to perform step {}", sim.n_iterations()))?;
        series.push(&sim.stats().context("failed to compute stats")?);
    }

    Ok(RunRecord {
        series,
        n_iterations: sim.n_iterations(),
        n_interactions: sim.n_interactions(),
        finished: sim.is_done(),
    })
}

/// Conductor of repeated independent runs of a pattern simulation.
///
/// Keeps the running averages of the per-language statistics of all runs, together
/// with counters describing the runs. Each run gets its own random number generator
/// derived from the conductor's, so a seeded conductor is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConductor {
    pattern: Simulation,
    rng: ChaCha12Rng,

    avg_weight_sums: AverageSeries,
    avg_n_users: AverageSeries,
    avg_n_recognized_things: AverageSeries,

    n_conducted: usize,
    n_unfinished: usize,
    n_failed: usize,
    n_iterations: usize,
    n_interactions: usize,
    max_length: usize,
    length_acc: Accumulator,
}

impl SimulationConductor {
    pub fn new(pattern: Simulation, rng: ChaCha12Rng) -> Self {
        let n_langs = pattern.languages().len();
        Self {
            pattern,
            rng,
            avg_weight_sums: AverageSeries::new(n_langs),
            avg_n_users: AverageSeries::new(n_langs),
            avg_n_recognized_things: AverageSeries::new(n_langs),
            n_conducted: 0,
            n_unfinished: 0,
            n_failed: 0,
            n_iterations: 0,
            n_interactions: 0,
            max_length: 0,
            length_acc: Accumulator::new(),
        }
    }

    /// Conduct one run and merge its statistics into the averages.
    ///
    /// # Errors
    /// Returns an error if the run fails. The failure is counted and nothing is
    /// merged in that case.
    pub fn conduct(&mut self, stop_iteration: usize) -> Result<()> {
        let rng = self.next_rng();
        match perform_run(&self.pattern, rng, stop_iteration) {
            Ok(record) => {
                self.merge(record);
                Ok(())
            }
            Err(error) => {
                self.n_failed += 1;
                Err(error)
            }
        }
    }

    /// Conduct `n_runs` runs one after the other.
    ///
    /// Failed runs are logged and counted, and do not stop the batch.
    pub fn conduct_many(&mut self, n_runs: usize, stop_iteration: usize) {
        for i_run in 0..n_runs {
            if let Err(error) = self.conduct(stop_iteration) {
                log::warn!("run {i_run} failed: {error:#}");
            }
            log_progress(i_run, n_runs);
        }
    }

    /// Conduct `n_runs` runs concurrently.
    ///
    /// Runs are merged in the order they were issued, which gives the same
    /// averages as [`SimulationConductor::conduct_many`] with the same generator.
    pub fn conduct_parallel(&mut self, n_runs: usize, stop_iteration: usize) {
        let rng_vec: Vec<_> = (0..n_runs).map(|_| self.next_rng()).collect();

        let pattern = &self.pattern;
        let result_vec: Vec<_> = rng_vec
            .into_par_iter()
            .map(|rng| perform_run(pattern, rng, stop_iteration))
            .collect();

        for (i_run, result) in result_vec.into_iter().enumerate() {
            match result {
                Ok(record) => self.merge(record),
                Err(error) => {
                    self.n_failed += 1;
                    log::warn!("run {i_run} failed: {error:#}");
                }
            }
        }
        log::info!("completed {n_runs} runs");
    }

    fn next_rng(&mut self) -> ChaCha12Rng {
        ChaCha12Rng::from_rng(&mut self.rng)
    }

    fn merge(&mut self, record: RunRecord) {
        self.avg_weight_sums.merge(&record.series.weight_sums);
        self.avg_n_users.merge(&record.series.n_users);
        self.avg_n_recognized_things
            .merge(&record.series.n_recognized_things);

        self.n_iterations += record.n_iterations;
        self.n_interactions += record.n_interactions;
        self.max_length = self.max_length.max(record.n_iterations);
        self.length_acc.add(record.n_iterations as f64);
        if !record.finished {
            self.n_unfinished += 1;
        }
        self.n_conducted += 1;
    }

    pub fn pattern(&self) -> &Simulation {
        &self.pattern
    }

    pub fn n_conducted(&self) -> usize {
        self.n_conducted
    }

    pub fn n_unfinished(&self) -> usize {
        self.n_unfinished
    }

    pub fn n_failed(&self) -> usize {
        self.n_failed
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    pub fn n_interactions(&self) -> usize {
        self.n_interactions
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Mean and standard deviation of the run lengths.
    pub fn length_report(&self) -> AccumulatorReport {
        self.length_acc.report()
    }

    pub fn avg_weight_sums(&self, i_lang: usize) -> &[f64] {
        self.avg_weight_sums.language(i_lang)
    }

    pub fn avg_n_users(&self, i_lang: usize) -> &[f64] {
        self.avg_n_users.language(i_lang)
    }

    pub fn avg_n_recognized_things(&self, i_lang: usize) -> &[f64] {
        self.avg_n_recognized_things.language(i_lang)
    }
}

fn log_progress(i_run: usize, n_runs: usize) {
    let log_every = (n_runs / 10).max(1);
    if (i_run + 1) % log_every == 0 || i_run + 1 == n_runs {
        let progress = 100.0 * (i_run + 1) as f64 / n_runs as f64;
        log::info!("completed {progress:06.2}%");
    }
}
