use crate::agent::{Agent, CountingAgent, TotalListener, TotalSpeaker, VariantAgent};
use crate::config::{Config, VariantKind};
use crate::interaction::InteractionRunner;
use crate::lexicon::WeightedLexicon;
use crate::model::{Environment, Language};
use crate::population::SquareLatticePopulation;
use anyhow::{Context, Result, bail};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-language statistics of a population at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    /// Sum of the weights of the language's words over all lexicons.
    pub weight_sums: Vec<f64>,
    /// Number of agents for which the language is dominant.
    pub n_users: Vec<usize>,
    /// Number of distinct things named in the language by any agent.
    pub n_recognized_things: Vec<usize>,
}

/// Single run of the naming-game model.
///
/// Holds the environment, languages, population, optional variant agent and
/// random number generator, and advances them one step at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    env: Environment,
    language_vec: Vec<Language>,
    population: SquareLatticePopulation<CountingAgent>,
    runner: InteractionRunner,
    variant: Option<VariantAgent>,
    variant_influence: usize,
    n_iterations: usize,
    rng: ChaCha12Rng,
}

impl Simulation {
    pub fn new(
        env: Environment,
        language_vec: Vec<Language>,
        population: SquareLatticePopulation<CountingAgent>,
        variant: Option<VariantAgent>,
        variant_influence: usize,
        rng: ChaCha12Rng,
    ) -> Self {
        Self {
            env,
            language_vec,
            population,
            runner: InteractionRunner::new(),
            variant,
            variant_influence,
            n_iterations: 0,
            rng,
        }
    }

    /// Build the two-language model described by `cfg`.
    ///
    /// Each language gets one generated lexicon naming its first `dev_degree`
    /// things. The first `n_users[0]` agents start with a copy of the first
    /// lexicon, the others with a copy of the second.
    pub fn generate_initial_condition(cfg: &Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let model = &cfg.model;
        let env = Environment::new(model.n_things).context("failed to create environment")?;
        let language_vec = vec![Language::new(2, 0)?, Language::new(2, 1)?];

        let mut lexicon_vec = Vec::with_capacity(language_vec.len());
        for (&lang, dev_degree) in language_vec.iter().zip(cfg.dev_degrees()) {
            let lexicon = WeightedLexicon::generate(
                lang,
                &env,
                dev_degree,
                model.initial_weight,
                (model.min_weight, model.max_weight),
                &mut rng,
            )
            .with_context(|| format!("failed to generate lexicon of language {lang}"))?;
            lexicon_vec.push(lexicon);
        }

        let n_agents = cfg.n_agents();
        let n_users_first = cfg.n_users()[0];
        let agt_vec = (0..n_agents)
            .map(|i_agt| {
                let i_lang = if i_agt < n_users_first { 0 } else { 1 };
                CountingAgent::new(
                    language_vec.clone(),
                    lexicon_vec[i_lang].clone(),
                    model.acquire_weight,
                    model.learning_rate,
                )
            })
            .collect();
        let population =
            SquareLatticePopulation::new(agt_vec, cfg.lattice.side, cfg.lattice.epsilon)
                .context("failed to create population")?;

        let variant = match cfg.variant.kind {
            VariantKind::None => None,
            VariantKind::AlwaysListener => Some(VariantAgent::Listener(TotalListener)),
            VariantKind::AlwaysSpeaker => {
                let lexicon = lexicon_vec
                    .get(cfg.variant.language)
                    .context("variant language does not exist")?;
                Some(VariantAgent::Speaker(TotalSpeaker::new(lexicon.clone())))
            }
        };
        let variant_influence = if variant.is_some() {
            cfg.variant.influence
        } else {
            0
        };

        Ok(Self::new(
            env,
            language_vec,
            population,
            variant,
            variant_influence,
            rng,
        ))
    }

    /// Independent copy of this simulation driven by `rng`.
    pub fn fork(&self, rng: ChaCha12Rng) -> Self {
        Self {
            rng,
            ..self.clone()
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn languages(&self) -> &[Language] {
        &self.language_vec
    }

    pub fn population(&self) -> &SquareLatticePopulation<CountingAgent> {
        &self.population
    }

    pub fn agents(&self) -> &[CountingAgent] {
        self.population.agents()
    }

    pub fn variant(&self) -> Option<&VariantAgent> {
        self.variant.as_ref()
    }

    pub fn variant_influence(&self) -> usize {
        self.variant_influence
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    pub fn n_interactions(&self) -> usize {
        self.runner.n_interactions()
    }

    /// Perform one step.
    ///
    /// The variant agent, if any, first plays `variant_influence` games with random
    /// agents. Then `N` games are played, each between a random speaker and one of
    /// its sampled neighbours, about a random thing of the environment.
    pub fn simulate_one_step(&mut self) -> Result<()> {
        self.n_iterations += 1;

        if let Some(variant) = &mut self.variant {
            for _ in 0..self.variant_influence {
                let i_agt = self.population.random_agent(&mut self.rng);
                variant
                    .interact(
                        self.population.agent_mut(i_agt),
                        &mut self.runner,
                        &mut self.rng,
                    )
                    .with_context(|| format!("failed variant game with agent {i_agt}"))?;
            }
        }

        for _ in 0..self.population.size() {
            self.random_interaction()?;
        }

        Ok(())
    }

    fn random_interaction(&mut self) -> Result<()> {
        let i_spk = self.population.random_agent(&mut self.rng);
        let i_lis = self
            .population
            .random_neighbour(i_spk, &mut self.rng)
            .context("failed to sample listener")?;
        let thing = self.env.random_thing(&mut self.rng);

        let (speaker, listener) = self.population.pair_mut(i_spk, i_lis)?;
        self.runner
            .run(speaker, listener, thing, &mut self.rng)
            .with_context(|| format!("failed game between agents {i_spk} and {i_lis}"))?;
        Ok(())
    }

    /// Every agent names every thing of the environment, and all with the same word.
    pub fn agents_lexically_synchronized(&self) -> bool {
        let Some((first, rest)) = self.agents().split_first() else {
            return true;
        };
        // Agreement is transitive, so comparing with the first agent suffices.
        self.env.things().iter().all(|&thing| {
            let word = first.dominant_word(thing);
            word.is_some() && rest.iter().all(|agt| agt.dominant_word(thing) == word)
        })
    }

    pub fn one_to_one_lexicons(&self) -> bool {
        self.agents().iter().all(CountingAgent::one_to_one_lexicon)
    }

    /// The population has converged to a single unambiguous vocabulary.
    pub fn is_done(&self) -> bool {
        self.agents_lexically_synchronized() && self.one_to_one_lexicons()
    }

    pub fn weight_sums(&self) -> Vec<f64> {
        let mut sum_vec = vec![0.0; self.language_vec.len()];
        for agt in self.agents() {
            let agt_sum_vec = agt.lexicon().count_weights(&self.language_vec);
            for (sum, agt_sum) in sum_vec.iter_mut().zip(agt_sum_vec) {
                *sum += agt_sum;
            }
        }
        sum_vec
    }

    pub fn n_users(&self) -> Result<Vec<usize>> {
        let mut count_vec = vec![0; self.language_vec.len()];
        for i_lang in self.dominant_languages()? {
            count_vec[i_lang] += 1;
        }
        Ok(count_vec)
    }

    pub fn n_recognized_things(&self) -> Vec<usize> {
        let mut set_vec = vec![BTreeSet::new(); self.language_vec.len()];
        for agt in self.agents() {
            let agt_set_vec = agt.lexicon().recognized_things(&self.language_vec);
            for (set, agt_set) in set_vec.iter_mut().zip(agt_set_vec) {
                set.extend(agt_set);
            }
        }
        set_vec.iter().map(BTreeSet::len).collect()
    }

    /// Dominant language of every agent, in population order.
    pub fn dominant_languages(&self) -> Result<Vec<usize>> {
        self.agents()
            .iter()
            .enumerate()
            .map(|(i_agt, agt)| match agt.dominant_language(&self.language_vec) {
                Some(i_lang) => Ok(i_lang),
                None => bail!("agent {i_agt} has no dominant language"),
            })
            .collect()
    }

    pub fn stats(&self) -> Result<LanguageStats> {
        Ok(LanguageStats {
            weight_sums: self.weight_sums(),
            n_users: self.n_users().context("failed to count users")?,
            n_recognized_things: self.n_recognized_things(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn small_config() -> Config {
        toml::from_str(
            r#"
            [lattice]
            side = 2
            epsilon = 0.0

            [model]
            n_things = 2
            "#,
        )
        .unwrap()
    }

    fn simulation(cfg: &Config, seed: u64) -> Simulation {
        cfg.validate().unwrap();
        Simulation::generate_initial_condition(cfg, ChaCha12Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn initial_condition_follows_config() {
        let cfg = small_config();
        let sim = simulation(&cfg, 1);

        assert_eq!(sim.population().size(), 4);
        assert_eq!(sim.dominant_languages().unwrap(), vec![0, 0, 1, 1]);
        assert_eq!(sim.n_users().unwrap(), vec![2, 2]);
        assert_eq!(sim.n_recognized_things(), vec![2, 2]);
        assert_eq!(sim.weight_sums(), vec![12.0, 12.0]);
        assert!(sim.one_to_one_lexicons());
        assert!(!sim.agents_lexically_synchronized());
        assert!(sim.variant().is_none());
    }

    #[test]
    fn step_plays_one_game_per_agent() {
        let cfg = small_config();
        let mut sim = simulation(&cfg, 2);
        sim.simulate_one_step().unwrap();
        sim.simulate_one_step().unwrap();
        assert_eq!(sim.n_iterations(), 2);
        assert_eq!(sim.n_interactions(), 8);
    }

    #[test]
    fn variant_games_are_played_first() {
        let mut cfg = small_config();
        cfg.variant.kind = VariantKind::AlwaysListener;
        cfg.variant.influence = 3;
        let mut sim = simulation(&cfg, 3);
        sim.simulate_one_step().unwrap();
        assert_eq!(sim.n_interactions(), 7);
        assert_eq!(
            sim.variant().map(VariantAgent::kind),
            Some(VariantKind::AlwaysListener)
        );
    }

    #[test]
    fn always_speaker_uses_chosen_language() {
        let mut cfg = small_config();
        cfg.variant.kind = VariantKind::AlwaysSpeaker;
        cfg.variant.influence = 1;
        cfg.variant.language = 1;
        let sim = simulation(&cfg, 4);
        let variant = sim.variant().unwrap();
        assert_eq!(variant.dominant_language(sim.languages()), Some(1));
    }

    #[test]
    fn small_population_converges() {
        let cfg = small_config();
        let mut n_converged = 0;
        for seed in 0..20 {
            let mut sim = simulation(&cfg, seed);
            while !sim.is_done() && sim.n_iterations() < 10_000 {
                sim.simulate_one_step().unwrap();
            }
            if sim.is_done() {
                n_converged += 1;
                assert!(sim.one_to_one_lexicons());
                assert!(sim.agents_lexically_synchronized());
                let n_users = sim.n_users().unwrap();
                assert!(n_users == vec![4, 0] || n_users == vec![0, 4]);
            }
        }
        assert!(n_converged >= 18, "only {n_converged} of 20 runs converged");
    }

    #[test]
    fn forks_are_independent() {
        let cfg = small_config();
        let pattern = simulation(&cfg, 5);

        let mut fork = pattern.fork(ChaCha12Rng::seed_from_u64(6));
        for _ in 0..5 {
            fork.simulate_one_step().unwrap();
        }
        assert_eq!(pattern.n_iterations(), 0);
        assert_eq!(pattern.n_interactions(), 0);
        assert!(pattern.one_to_one_lexicons());

        let mut twin = pattern.fork(ChaCha12Rng::seed_from_u64(6));
        for _ in 0..5 {
            twin.simulate_one_step().unwrap();
        }
        assert_eq!(fork.stats().unwrap(), twin.stats().unwrap());
    }
}
