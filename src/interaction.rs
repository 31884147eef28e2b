use crate::agent::Agent;
use crate::model::Thing;
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result of a single naming game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Loss,
}

/// Naming-game protocol with a running count of the games played.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRunner {
    n_interactions: usize,
}

impl InteractionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_interactions(&self) -> usize {
        self.n_interactions
    }

    /// Play a game about `thing`.
    ///
    /// The speaker signals a word. If the listener recognizes it both succeed,
    /// otherwise the speaker loses and the listener acquires the word.
    pub fn run<S, L, R>(
        &mut self,
        speaker: &mut S,
        listener: &mut L,
        thing: Thing,
        rng: &mut R,
    ) -> Result<Outcome>
    where
        S: Agent + ?Sized,
        L: Agent + ?Sized,
        R: Rng + ?Sized,
    {
        self.n_interactions += 1;

        let word = speaker.signal(thing, rng).context("failed to signal")?;
        if listener.recognizes(thing, word) {
            speaker
                .success(thing, word)
                .context("failed to reward speaker")?;
            listener
                .success(thing, word)
                .context("failed to reward listener")?;
            Ok(Outcome::Success)
        } else {
            speaker
                .loss(thing, word)
                .context("failed to penalize speaker")?;
            listener
                .acquire(thing, word)
                .context("failed to teach listener")?;
            Ok(Outcome::Loss)
        }
    }

    /// Play a game about a random thing recognized by the speaker.
    pub fn run_random<S, L, R>(
        &mut self,
        speaker: &mut S,
        listener: &mut L,
        rng: &mut R,
    ) -> Result<Outcome>
    where
        S: Agent + ?Sized,
        L: Agent + ?Sized,
        R: Rng + ?Sized,
    {
        let thing = speaker
            .random_recognized_thing(rng)
            .context("speaker recognizes no thing")?;
        self.run(speaker, listener, thing, rng)
    }
}
