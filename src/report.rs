use crate::conductor::SimulationConductor;
use crate::config::VariantKind;
use crate::stats::AccumulatorReport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs::File, io::BufWriter, io::Write, path::Path};

/// Summary of a batch of runs, written as JSON.
#[derive(Debug, Serialize)]
pub struct Report {
    pub n_runs: usize,
    pub n_unfinished: usize,
    pub n_failed: usize,
    pub run_length: AccumulatorReport,
    pub max_length: usize,
    /// Steps summed over all runs.
    pub n_iterations: usize,
    /// Games summed over all runs, variant games included.
    pub n_interactions: usize,
    pub n_things: usize,
    pub population: PopulationReport,
    pub variant: VariantReport,
    pub agents: Vec<AgentReport>,
    pub languages: Vec<LanguageReport>,
}

#[derive(Debug, Serialize)]
pub struct PopulationReport {
    pub kind: &'static str,
    pub n_rows: usize,
    pub n_cols: usize,
    pub epsilon: f64,
}

#[derive(Debug, Serialize)]
pub struct VariantReport {
    pub kind: VariantKind,
    pub influence: usize,
    pub language: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AgentReport {
    pub id: usize,
    pub initial_language: usize,
}

/// Language description and its averaged series, indexed by iteration.
#[derive(Debug, Serialize)]
pub struct LanguageReport {
    pub id: usize,
    pub modulus: u32,
    pub residue: u32,
    pub avg_weight_sums: Vec<f64>,
    pub avg_n_users: Vec<f64>,
    pub avg_n_recognized_things: Vec<f64>,
}

impl Report {
    pub fn new(conductor: &SimulationConductor) -> Result<Self> {
        let pattern = conductor.pattern();
        let languages = pattern.languages();
        let population = pattern.population();

        let variant = match pattern.variant() {
            None => VariantReport {
                kind: VariantKind::None,
                influence: 0,
                language: None,
            },
            Some(variant) => VariantReport {
                kind: variant.kind(),
                influence: pattern.variant_influence(),
                language: variant.dominant_language(languages),
            },
        };

        let agents = pattern
            .dominant_languages()
            .context("failed to find initial languages")?
            .into_iter()
            .enumerate()
            .map(|(id, initial_language)| AgentReport {
                id,
                initial_language,
            })
            .collect();

        let languages = languages
            .iter()
            .enumerate()
            .map(|(id, lang)| LanguageReport {
                id,
                modulus: lang.modulus(),
                residue: lang.residue(),
                avg_weight_sums: conductor.avg_weight_sums(id).to_vec(),
                avg_n_users: conductor.avg_n_users(id).to_vec(),
                avg_n_recognized_things: conductor.avg_n_recognized_things(id).to_vec(),
            })
            .collect();

        Ok(Self {
            n_runs: conductor.n_conducted(),
            n_unfinished: conductor.n_unfinished(),
            n_failed: conductor.n_failed(),
            run_length: conductor.length_report(),
            max_length: conductor.max_length(),
            n_iterations: conductor.n_iterations(),
            n_interactions: conductor.n_interactions(),
            n_things: pattern.environment().n_things(),
            population: PopulationReport {
                kind: "square-lattice",
                n_rows: population.n_rows(),
                n_cols: population.n_cols(),
                epsilon: population.epsilon(),
            },
            variant,
            agents,
            languages,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
