use crate::conductor::SimulationConductor;
use crate::config::Config;
use crate::report::Report;
use crate::simulation::Simulation;
use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Saved state of a batch, enough to conduct further runs.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    cfg: Config,
    conductor: SimulationConductor,
}

impl Checkpoint {
    fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize checkpoint")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let checkpoint =
            decode::from_read(&mut reader).context("failed to deserialize checkpoint")?;
        Ok(checkpoint)
    }
}

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Conduct a new batch of runs, replacing any previous results.
    pub fn run_batch(&self) -> Result<()> {
        let mut rng = match self.cfg.conductor.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng().context("failed to seed rng")?,
        };
        let pattern_rng = ChaCha12Rng::from_rng(&mut rng);
        let pattern = Simulation::generate_initial_condition(&self.cfg, pattern_rng)
            .context("failed to generate initial condition")?;
        log::info!("generated initial condition");

        let mut conductor = SimulationConductor::new(pattern, rng);
        self.conduct(&mut conductor, self.cfg.conductor.n_runs)?;

        self.save(conductor)
    }

    /// Conduct `n_runs` more runs of a saved batch.
    pub fn resume_batch(&self, n_runs: usize) -> Result<()> {
        let checkpoint_file = self.checkpoint_file();
        let Checkpoint { cfg, mut conductor } = Checkpoint::load(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if cfg != self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        log::info!("loaded {checkpoint_file:?}");

        self.conduct(&mut conductor, n_runs)?;

        self.save(conductor)
    }

    /// Rewrite the report of a saved batch.
    pub fn write_report(&self) -> Result<()> {
        let checkpoint_file = self.checkpoint_file();
        let checkpoint = Checkpoint::load(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;

        self.save_report(&checkpoint.conductor)
    }

    pub fn clean(&self) -> Result<()> {
        for file in [self.checkpoint_file(), self.results_file()] {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }
        Ok(())
    }

    fn conduct(&self, conductor: &mut SimulationConductor, n_runs: usize) -> Result<()> {
        let n_failed = conductor.n_failed();
        let stop_iteration = self.cfg.conductor.stop_iteration;
        if self.cfg.conductor.parallel {
            conductor.conduct_parallel(n_runs, stop_iteration);
        } else {
            conductor.conduct_many(n_runs, stop_iteration);
        }

        if conductor.n_conducted() == 0 {
            bail!("every run failed");
        }
        let n_failed = conductor.n_failed() - n_failed;
        if n_failed > 0 {
            log::warn!("{n_failed} of {n_runs} runs failed");
        }
        Ok(())
    }

    fn save(&self, conductor: SimulationConductor) -> Result<()> {
        self.save_report(&conductor)?;

        let checkpoint_file = self.checkpoint_file();
        let checkpoint = Checkpoint {
            cfg: self.cfg.clone(),
            conductor,
        };
        checkpoint
            .save(&checkpoint_file)
            .context("failed to save checkpoint")?;
        log::info!("saved {checkpoint_file:?}");

        Ok(())
    }

    fn save_report(&self, conductor: &SimulationConductor) -> Result<()> {
        let results_file = self.results_file();
        Report::new(conductor)
            .context("failed to construct report")?
            .save(&results_file)
            .context("failed to save report")?;
        log::info!("saved {results_file:?}");
        Ok(())
    }

    fn checkpoint_file(&self) -> PathBuf {
        self.sim_dir.join("checkpoint.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}
