//! Agents taking part in naming games.
//!
//! Every agent implements the [`Agent`] contract used by the interaction protocol.
//! Population members are [`CountingAgent`]s; the [`VariantAgent`] variants are
//! external sources of influence that never learn.

use crate::config::VariantKind;
use crate::interaction::{InteractionRunner, Outcome};
use crate::lexicon::WeightedLexicon;
use crate::model::{Language, Thing, Word, word_languages};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Capabilities required from both sides of a naming game.
pub trait Agent {
    /// Word the agent uses for `thing` when speaking.
    fn signal<R: Rng + ?Sized>(&mut self, thing: Thing, rng: &mut R) -> Result<Word>;

    /// Topic chosen by the agent when it speaks on its own initiative.
    fn random_recognized_thing<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Thing>;

    /// Whether the agent, as a listener, associates `word` with `thing`.
    fn recognizes(&self, thing: Thing, word: Word) -> bool;

    fn success(&mut self, thing: Thing, word: Word) -> Result<()>;

    fn loss(&mut self, thing: Thing, word: Word) -> Result<()>;

    fn acquire(&mut self, thing: Thing, word: Word) -> Result<()>;

    /// Index of the dominant language among `languages`, if any.
    fn dominant_language(&self, languages: &[Language]) -> Option<usize>;
}

/// Learning agent whose adaptation speed follows its success ratio per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingAgent {
    lexicon: WeightedLexicon,
    language_vec: Vec<Language>,
    n_successes: Vec<u64>,
    n_losses: Vec<u64>,
    acquire_weight: f64,
    learning_rate: f64,
}

impl CountingAgent {
    pub fn new(
        language_vec: Vec<Language>,
        lexicon: WeightedLexicon,
        acquire_weight: f64,
        learning_rate: f64,
    ) -> Self {
        let n_langs = language_vec.len();
        Self {
            lexicon,
            language_vec,
            n_successes: vec![0; n_langs],
            n_losses: vec![0; n_langs],
            acquire_weight,
            learning_rate,
        }
    }

    pub fn lexicon(&self) -> &WeightedLexicon {
        &self.lexicon
    }

    /// Word the agent would signal for `thing`, without learning anything.
    pub fn dominant_word(&self, thing: Thing) -> Option<Word> {
        self.lexicon.dominant_word(thing)
    }

    pub fn one_to_one_lexicon(&self) -> bool {
        self.lexicon.one_to_one()
    }

    /// Fraction of successful games in language `i_lang`, zero without any history.
    pub fn success_ratio(&self, i_lang: usize) -> f64 {
        let n_games = self.n_successes[i_lang] + self.n_losses[i_lang];
        if n_games == 0 {
            return 0.0;
        }
        self.n_successes[i_lang] as f64 / n_games as f64
    }
}

impl Agent for CountingAgent {
    fn signal<R: Rng + ?Sized>(&mut self, thing: Thing, rng: &mut R) -> Result<Word> {
        if !self.lexicon.contains_thing(thing) {
            let i_lang = self
                .dominant_language(&self.language_vec)
                .context("agent has no dominant language")?;
            let word = self.language_vec[i_lang].generate_word(rng);
            self.lexicon.add(thing, word, self.acquire_weight);
        }
        self.lexicon
            .dominant_word(thing)
            .with_context(|| format!("failed to name {thing:?}"))
    }

    fn random_recognized_thing<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Thing> {
        self.lexicon.things().choose(rng)
    }

    fn recognizes(&self, thing: Thing, word: Word) -> bool {
        self.lexicon.contains(thing, word)
    }

    fn success(&mut self, thing: Thing, word: Word) -> Result<()> {
        let i_lang_vec = word_languages(word, &self.language_vec);
        let n_owners = i_lang_vec.len() as f64;
        for i_lang in i_lang_vec {
            self.n_successes[i_lang] += 1;
            let rate = self.learning_rate * self.success_ratio(i_lang) / n_owners;
            self.lexicon.increase_weight(thing, word, rate)?;
            self.lexicon.decrease_other_weights(thing, word, rate)?;
        }
        Ok(())
    }

    fn loss(&mut self, thing: Thing, word: Word) -> Result<()> {
        self.lexicon
            .decrease_weight(thing, word, self.learning_rate)?;
        for i_lang in word_languages(word, &self.language_vec) {
            self.n_losses[i_lang] += 1;
        }
        Ok(())
    }

    fn acquire(&mut self, thing: Thing, word: Word) -> Result<()> {
        self.lexicon.add(thing, word, self.acquire_weight);
        // Acquisition counts against the language, as a loss would.
        for i_lang in word_languages(word, &self.language_vec) {
            self.n_losses[i_lang] += 1;
        }
        Ok(())
    }

    fn dominant_language(&self, languages: &[Language]) -> Option<usize> {
        let count_vec = self.lexicon.count_dominating_words(languages);
        let sum_vec = self.lexicon.count_weights(languages);

        let mut dom = None;
        let mut dom_count = 0;
        let mut dom_sum = 0.0;
        for (i_lang, (&count, &sum)) in count_vec.iter().zip(&sum_vec).enumerate() {
            if count > dom_count || (count == dom_count && sum > dom_sum) {
                dom = Some(i_lang);
                dom_count = count;
                dom_sum = sum;
            }
        }
        dom
    }
}

/// Speaker that always uses its frozen lexicon and never learns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalSpeaker {
    lexicon: WeightedLexicon,
}

impl TotalSpeaker {
    pub fn new(lexicon: WeightedLexicon) -> Self {
        Self { lexicon }
    }
}

impl Agent for TotalSpeaker {
    fn signal<R: Rng + ?Sized>(&mut self, thing: Thing, _rng: &mut R) -> Result<Word> {
        self.lexicon
            .dominant_word(thing)
            .with_context(|| format!("always-speaker has no word for {thing:?}"))
    }

    fn random_recognized_thing<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Thing> {
        self.lexicon.things().choose(rng)
    }

    fn recognizes(&self, _thing: Thing, _word: Word) -> bool {
        false
    }

    fn success(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn loss(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn acquire(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn dominant_language(&self, languages: &[Language]) -> Option<usize> {
        let count_vec = self.lexicon.count_dominating_words(languages);
        let mut dom = None;
        let mut dom_count = 0;
        for (i_lang, &count) in count_vec.iter().enumerate() {
            if count > dom_count {
                dom = Some(i_lang);
                dom_count = count;
            }
        }
        dom
    }
}

/// Listener that accepts every word and never learns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TotalListener;

impl Agent for TotalListener {
    fn signal<R: Rng + ?Sized>(&mut self, thing: Thing, _rng: &mut R) -> Result<Word> {
        bail!("always-listener cannot signal {thing:?}")
    }

    fn random_recognized_thing<R: Rng + ?Sized>(&self, _rng: &mut R) -> Option<Thing> {
        None
    }

    fn recognizes(&self, _thing: Thing, _word: Word) -> bool {
        true
    }

    fn success(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn loss(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn acquire(&mut self, _thing: Thing, _word: Word) -> Result<()> {
        Ok(())
    }

    fn dominant_language(&self, _languages: &[Language]) -> Option<usize> {
        None
    }
}

/// External agent biasing the population from a fixed role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantAgent {
    Speaker(TotalSpeaker),
    Listener(TotalListener),
}

impl VariantAgent {
    pub fn kind(&self) -> VariantKind {
        match self {
            VariantAgent::Speaker(_) => VariantKind::AlwaysSpeaker,
            VariantAgent::Listener(_) => VariantKind::AlwaysListener,
        }
    }

    /// Play one game against `agent` in the role fixed by the variant.
    pub fn interact<R: Rng + ?Sized>(
        &mut self,
        agent: &mut CountingAgent,
        runner: &mut InteractionRunner,
        rng: &mut R,
    ) -> Result<Outcome> {
        match self {
            VariantAgent::Speaker(speaker) => runner.run_random(speaker, agent, rng),
            VariantAgent::Listener(listener) => runner.run_random(agent, listener, rng),
        }
    }

    pub fn dominant_language(&self, languages: &[Language]) -> Option<usize> {
        match self {
            VariantAgent::Speaker(speaker) => speaker.dominant_language(languages),
            VariantAgent::Listener(listener) => listener.dominant_language(languages),
        }
    }
}
