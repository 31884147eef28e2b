//! Leaf value types of the naming game.

use anyhow::{Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol used by agents to denote things.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Word(pub u64);

impl Word {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Object of the environment that agents develop vocabulary for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Thing(pub u32);

/// Congruence class of the word space.
///
/// A word belongs to the language if its id is congruent to `residue` modulo `modulus`.
/// Languages are ordered by modulus first and residue second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Language {
    modulus: u32,
    residue: u32,
}

impl Language {
    /// Create a language; the residue is stored reduced modulo `modulus`.
    pub fn new(modulus: u32, residue: u32) -> Result<Self> {
        if modulus == 0 {
            bail!("language modulus must be positive");
        }
        Ok(Self {
            modulus,
            residue: residue % modulus,
        })
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    pub fn residue(&self) -> u32 {
        self.residue
    }

    pub fn contains(&self, word: Word) -> bool {
        word.id() % self.modulus as u64 == self.residue as u64
    }

    /// Sample a word of this language uniformly from `k * modulus + residue`, `k < 2^32`.
    pub fn generate_word<R: Rng + ?Sized>(&self, rng: &mut R) -> Word {
        let k: u32 = rng.random();
        Word(k as u64 * self.modulus as u64 + self.residue as u64)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mod {})", self.residue, self.modulus)
    }
}

/// Indices of the languages (of the given ordered slice) that contain `word`.
pub fn word_languages(word: Word, languages: &[Language]) -> Vec<usize> {
    languages
        .iter()
        .enumerate()
        .filter(|(_, lang)| lang.contains(word))
        .map(|(i_lang, _)| i_lang)
        .collect()
}

/// Fixed, ordered set of things.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    thing_vec: Vec<Thing>,
}

impl Environment {
    /// Create an environment holding `Thing(0)` to `Thing(n_things - 1)`.
    pub fn new(n_things: usize) -> Result<Self> {
        if n_things == 0 {
            bail!("environment must contain at least one thing");
        }
        let n_things = u32::try_from(n_things)?;
        Ok(Self {
            thing_vec: (0..n_things).map(Thing).collect(),
        })
    }

    pub fn things(&self) -> &[Thing] {
        &self.thing_vec
    }

    pub fn n_things(&self) -> usize {
        self.thing_vec.len()
    }

    pub fn random_thing<R: Rng + ?Sized>(&self, rng: &mut R) -> Thing {
        // Never empty by construction.
        self.thing_vec[rng.random_range(0..self.thing_vec.len())]
    }
}
