use crate::model::{Environment, Language, Thing, Word, word_languages};
use crate::queue::WeightQueue;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weight a lone surviving word is floored at, relative to the minimum weight.
const SURVIVOR_MARGIN: f64 = 0.1;

/// Lexicon associating things with weighted candidate words.
///
/// Weights stay within `[min_weight, max_weight]`. A known thing never loses its last
/// word: when that word would drop to the minimum weight it is kept at
/// `min_weight + 0.1` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedLexicon {
    min_weight: f64,
    max_weight: f64,
    thing_map: BTreeMap<Thing, WeightQueue<Word>>,
}

impl WeightedLexicon {
    /// Create an empty lexicon with the given weight bounds.
    pub fn new(min_weight: f64, max_weight: f64) -> Result<Self> {
        if !(min_weight.is_finite() && max_weight.is_finite()) {
            bail!("weight bounds must be finite");
        }
        if min_weight + SURVIVOR_MARGIN > max_weight {
            bail!("weight bounds [{min_weight}, {max_weight}] are too narrow");
        }
        Ok(Self {
            min_weight,
            max_weight,
            thing_map: BTreeMap::new(),
        })
    }

    /// Create a lexicon associating the first `n_associations` things of `env`
    /// with fresh words of `lang`, all with the given weight.
    pub fn generate<R: Rng + ?Sized>(
        lang: Language,
        env: &Environment,
        n_associations: usize,
        weight: f64,
        (min_weight, max_weight): (f64, f64),
        rng: &mut R,
    ) -> Result<Self> {
        let mut lexicon = Self::new(min_weight, max_weight)?;
        for &thing in env.things().iter().take(n_associations) {
            lexicon.add(thing, lang.generate_word(rng), weight);
        }
        Ok(lexicon)
    }

    /// Associate `word` with `thing`. Weights not above the minimum are ignored,
    /// weights above the maximum are clamped.
    pub fn add(&mut self, thing: Thing, word: Word, weight: f64) {
        if weight <= self.min_weight {
            return;
        }
        self.thing_map
            .entry(thing)
            .or_default()
            .insert(word, weight.min(self.max_weight));
    }

    pub fn increase_weight(&mut self, thing: Thing, word: Word, by: f64) -> Result<()> {
        let weight = (self.known_weight(thing, word)? + by).min(self.max_weight);
        self.queue_mut(thing)?.set_weight(word, weight);
        Ok(())
    }

    pub fn decrease_weight(&mut self, thing: Thing, word: Word, by: f64) -> Result<()> {
        let weight = self.known_weight(thing, word)? - by;
        let min_weight = self.min_weight;
        let queue = self.queue_mut(thing)?;
        if weight > min_weight {
            queue.set_weight(word, weight);
        } else if queue.len() == 1 {
            queue.set_weight(word, min_weight + SURVIVOR_MARGIN);
        } else {
            queue.remove(word);
        }
        Ok(())
    }

    /// Decrease the weight of every word associated with `thing` except `word`.
    pub fn decrease_other_weights(&mut self, thing: Thing, word: Word, by: f64) -> Result<()> {
        let other_vec: Vec<_> = self
            .queue(thing)?
            .values()
            .filter(|&other| other != word)
            .collect();
        for other in other_vec {
            self.decrease_weight(thing, other, by)?;
        }
        Ok(())
    }

    pub fn weight(&self, thing: Thing, word: Word) -> Option<f64> {
        self.thing_map.get(&thing)?.weight(word)
    }

    /// Known things in increasing order.
    pub fn things(&self) -> impl ExactSizeIterator<Item = Thing> + '_ {
        self.thing_map.keys().copied()
    }

    pub fn contains_thing(&self, thing: Thing) -> bool {
        self.thing_map.contains_key(&thing)
    }

    pub fn contains(&self, thing: Thing, word: Word) -> bool {
        self.thing_map
            .get(&thing)
            .is_some_and(|queue| queue.contains(word))
    }

    /// Heaviest word associated with `thing`, lowest id on ties.
    pub fn dominant_word(&self, thing: Thing) -> Option<Word> {
        self.thing_map.get(&thing)?.peek()
    }

    /// Per language, the number of things whose dominant word it contains.
    pub fn count_dominating_words(&self, languages: &[Language]) -> Vec<usize> {
        let mut count_vec = vec![0; languages.len()];
        for word in self.thing_map.values().filter_map(WeightQueue::peek) {
            for i_lang in word_languages(word, languages) {
                count_vec[i_lang] += 1;
            }
        }
        count_vec
    }

    /// Per language, the sum of the weights of all the words it contains.
    pub fn count_weights(&self, languages: &[Language]) -> Vec<f64> {
        let mut sum_vec = vec![0.0; languages.len()];
        for entry in self.thing_map.values().flat_map(WeightQueue::iter) {
            for i_lang in word_languages(entry.value, languages) {
                sum_vec[i_lang] += entry.weight;
            }
        }
        sum_vec
    }

    /// Per language, the things associated with at least one of its words.
    pub fn recognized_things(&self, languages: &[Language]) -> Vec<BTreeSet<Thing>> {
        let mut set_vec = vec![BTreeSet::new(); languages.len()];
        for (&thing, queue) in &self.thing_map {
            for word in queue.values() {
                for i_lang in word_languages(word, languages) {
                    set_vec[i_lang].insert(thing);
                }
            }
        }
        set_vec
    }

    /// Every known thing has a single word, at the maximum weight.
    pub fn one_to_one(&self) -> bool {
        self.thing_map.values().all(|queue| {
            queue.len() == 1 && queue.iter().all(|entry| entry.weight >= self.max_weight)
        })
    }

    fn known_weight(&self, thing: Thing, word: Word) -> Result<f64> {
        self.weight(thing, word)
            .with_context(|| format!("{word:?} is not associated with {thing:?}"))
    }

    fn queue(&self, thing: Thing) -> Result<&WeightQueue<Word>> {
        self.thing_map
            .get(&thing)
            .with_context(|| format!("{thing:?} is not in the lexicon"))
    }

    fn queue_mut(&mut self, thing: Thing) -> Result<&mut WeightQueue<Word>> {
        self.thing_map
            .get_mut(&thing)
            .with_context(|| format!("{thing:?} is not in the lexicon"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    fn lexicon() -> WeightedLexicon {
        WeightedLexicon::new(0.0, 3.0).unwrap()
    }

    fn words(lex: &WeightedLexicon, thing: Thing) -> Vec<Word> {
        lex.thing_map
            .get(&thing)
            .map(|queue| queue.values().collect())
            .unwrap_or_default()
    }

    fn languages() -> [Language; 2] {
        [Language::new(2, 0).unwrap(), Language::new(2, 1).unwrap()]
    }

    #[test]
    fn add_ignores_low_weights_and_clamps_high_ones() {
        let mut lex = lexicon();
        lex.add(Thing(0), Word(2), 0.0);
        assert!(!lex.contains_thing(Thing(0)));

        lex.add(Thing(0), Word(2), 7.0);
        assert_eq!(lex.weight(Thing(0), Word(2)), Some(3.0));

        lex.add(Thing(0), Word(2), 1.5);
        assert_eq!(words(&lex, Thing(0)), vec![Word(2)]);
        assert_eq!(lex.weight(Thing(0), Word(2)), Some(1.5));
    }

    #[test]
    fn weights_stay_within_bounds() {
        let mut lex = lexicon();
        lex.add(Thing(0), Word(2), 1.0);
        lex.add(Thing(0), Word(3), 1.0);

        let mut rng = ChaCha12Rng::seed_from_u64(3);
        for _ in 0..500 {
            let word = *[Word(2), Word(3)].choose(&mut rng).unwrap();
            if !lex.contains(Thing(0), word) {
                lex.add(Thing(0), word, 1.0);
            }
            let by = rng.random_range(0.0..2.0);
            if rng.random_bool(0.5) {
                lex.increase_weight(Thing(0), word, by).unwrap();
                lex.decrease_other_weights(Thing(0), word, by).unwrap();
            } else {
                lex.decrease_weight(Thing(0), word, by).unwrap();
            }

            assert!(!words(&lex, Thing(0)).is_empty());
            for word in words(&lex, Thing(0)) {
                let weight = lex.weight(Thing(0), word).unwrap();
                assert!(
                    (0.0..=3.0).contains(&weight),
                    "weight {weight} out of bounds"
                );
            }
        }
    }

    #[test]
    fn last_word_is_floored_instead_of_removed() {
        let mut lex = lexicon();
        lex.add(Thing(1), Word(4), 0.5);
        lex.decrease_weight(Thing(1), Word(4), 2.0).unwrap();
        assert_eq!(words(&lex, Thing(1)), vec![Word(4)]);
        assert!((lex.weight(Thing(1), Word(4)).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn competing_word_is_removed_at_minimum() {
        let mut lex = lexicon();
        lex.add(Thing(1), Word(4), 3.0);
        lex.add(Thing(1), Word(5), 0.3);
        lex.decrease_other_weights(Thing(1), Word(4), 0.3).unwrap();
        assert_eq!(words(&lex, Thing(1)), vec![Word(4)]);
        assert_eq!(lex.weight(Thing(1), Word(4)), Some(3.0));
    }

    #[test]
    fn dominant_word_is_heaviest_and_known() {
        let mut lex = lexicon();
        assert_eq!(lex.dominant_word(Thing(0)), None);

        lex.add(Thing(0), Word(8), 1.0);
        lex.add(Thing(0), Word(3), 2.0);
        assert_eq!(lex.dominant_word(Thing(0)), Some(Word(3)));

        lex.increase_weight(Thing(0), Word(8), 1.0).unwrap();
        assert_eq!(lex.dominant_word(Thing(0)), Some(Word(3)));
        lex.increase_weight(Thing(0), Word(8), 0.5).unwrap();
        assert_eq!(lex.dominant_word(Thing(0)), Some(Word(8)));
        assert!(words(&lex, Thing(0)).contains(&Word(8)));
    }

    #[test]
    fn unknown_associations_are_errors() {
        let mut lex = lexicon();
        assert!(lex.increase_weight(Thing(0), Word(1), 0.1).is_err());
        lex.add(Thing(0), Word(2), 1.0);
        assert!(lex.decrease_weight(Thing(0), Word(1), 0.1).is_err());
        assert!(lex.decrease_other_weights(Thing(3), Word(2), 0.1).is_err());
    }

    #[test]
    fn per_language_aggregates() {
        let langs = languages();
        let mut lex = lexicon();
        lex.add(Thing(0), Word(2), 3.0);
        lex.add(Thing(0), Word(3), 1.0);
        lex.add(Thing(1), Word(5), 2.0);
        lex.add(Thing(2), Word(6), 0.5);

        assert_eq!(lex.count_dominating_words(&langs), vec![2, 1]);
        assert_eq!(lex.count_weights(&langs), vec![3.5, 3.0]);

        let recognized = lex.recognized_things(&langs);
        assert_eq!(recognized[0], BTreeSet::from([Thing(0), Thing(2)]));
        assert_eq!(recognized[1], BTreeSet::from([Thing(0), Thing(1)]));
    }

    #[test]
    fn one_to_one_requires_single_words_at_max_weight() {
        let mut lex = lexicon();
        assert!(lex.one_to_one());

        lex.add(Thing(0), Word(2), 3.0);
        assert!(lex.one_to_one());

        lex.add(Thing(1), Word(4), 2.9);
        assert!(!lex.one_to_one());
        lex.increase_weight(Thing(1), Word(4), 0.5).unwrap();
        assert!(lex.one_to_one());

        lex.add(Thing(1), Word(6), 3.0);
        assert!(!lex.one_to_one());
    }

    #[test]
    fn generated_lexicon_covers_first_things() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let env = Environment::new(5).unwrap();
        let lang = Language::new(2, 1).unwrap();
        let lex = WeightedLexicon::generate(lang, &env, 3, 3.0, (0.0, 3.0), &mut rng).unwrap();

        assert_eq!(
            lex.things().collect::<Vec<_>>(),
            vec![Thing(0), Thing(1), Thing(2)]
        );
        for thing in lex.things() {
            assert!(lang.contains(lex.dominant_word(thing).unwrap()));
        }
        assert!(lex.one_to_one());
    }

    #[test]
    fn narrow_bounds_are_rejected() {
        assert!(WeightedLexicon::new(1.0, 1.05).is_err());
        assert!(WeightedLexicon::new(f64::NAN, 3.0).is_err());
    }
}
