use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};

/// Agents arranged row-major on a square lattice with long-range rewiring.
///
/// A listener is a lattice neighbour of the speaker, except that with probability
/// `(N - 1) * epsilon / (k + (N - 1) * epsilon)` it is any other agent, where `N`
/// is the population size and `k` the number of lattice neighbours of the speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareLatticePopulation<A> {
    agt_vec: Vec<A>,
    n_rows: usize,
    n_cols: usize,
    epsilon: f64,
}

impl<A> SquareLatticePopulation<A> {
    /// Lay out `agt_vec` in `n_rows` rows.
    ///
    /// # Errors
    /// Returns an error if the agents do not fill a grid of at least 2 x 2 cells
    /// or if `epsilon` is negative or not finite.
    pub fn new(agt_vec: Vec<A>, n_rows: usize, epsilon: f64) -> Result<Self> {
        let n_agts = agt_vec.len();
        if n_rows < 2 {
            bail!("lattice must have at least 2 rows, but has {n_rows}");
        }
        if n_agts % n_rows != 0 {
            bail!("{n_agts} agents do not fill a lattice with {n_rows} rows");
        }
        let n_cols = n_agts / n_rows;
        if n_cols < 2 {
            bail!("lattice must have at least 2 columns, but has {n_cols}");
        }
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            bail!("epsilon must be finite and non-negative, but is {epsilon}");
        }
        Ok(Self {
            agt_vec,
            n_rows,
            n_cols,
            epsilon,
        })
    }

    pub fn size(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn agents(&self) -> &[A] {
        &self.agt_vec
    }

    pub fn agent_mut(&mut self, i_agt: usize) -> &mut A {
        &mut self.agt_vec[i_agt]
    }

    /// Mutable access to two distinct agents.
    pub fn pair_mut(&mut self, i_agt_a: usize, i_agt_b: usize) -> Result<(&mut A, &mut A)> {
        if i_agt_a == i_agt_b {
            bail!("agent {i_agt_a} cannot interact with itself");
        }
        if i_agt_a < i_agt_b {
            let (head, tail) = self.agt_vec.split_at_mut(i_agt_b);
            Ok((&mut head[i_agt_a], &mut tail[0]))
        } else {
            let (head, tail) = self.agt_vec.split_at_mut(i_agt_a);
            Ok((&mut tail[0], &mut head[i_agt_b]))
        }
    }

    /// Row and column of agent `i_agt`.
    pub fn position(&self, i_agt: usize) -> (usize, usize) {
        (i_agt / self.n_cols, i_agt % self.n_cols)
    }

    /// Lattice neighbours of agent `i_agt`: 4 inside, 3 on an edge, 2 in a corner.
    pub fn neighbours(&self, i_agt: usize) -> Vec<usize> {
        let (row, col) = self.position(i_agt);
        let mut nbr_vec = Vec::with_capacity(4);
        if row + 1 < self.n_rows {
            nbr_vec.push(i_agt + self.n_cols);
        }
        if col + 1 < self.n_cols {
            nbr_vec.push(i_agt + 1);
        }
        if row > 0 {
            nbr_vec.push(i_agt - self.n_cols);
        }
        if col > 0 {
            nbr_vec.push(i_agt - 1);
        }
        nbr_vec
    }

    /// Probability that a listener chosen for agent `i_agt` is a long-range one.
    pub fn rewiring_probability(&self, i_agt: usize) -> f64 {
        let n_nbrs = self.neighbours(i_agt).len() as f64;
        let long_range = (self.size() - 1) as f64 * self.epsilon;
        long_range / (n_nbrs + long_range)
    }

    pub fn random_agent<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.size())
    }

    /// Uniformly random agent other than `i_agt`, or `i_agt` itself if it is alone.
    pub fn random_other<R: Rng + ?Sized>(&self, i_agt: usize, rng: &mut R) -> usize {
        if self.size() < 2 {
            return i_agt;
        }
        let i_other = rng.random_range(0..self.size() - 1);
        if i_other >= i_agt {
            i_other + 1
        } else {
            i_other
        }
    }

    pub fn random_neighbour<R: Rng + ?Sized>(&self, i_agt: usize, rng: &mut R) -> Result<usize> {
        let rewire_dist = Bernoulli::new(self.rewiring_probability(i_agt))?;
        if rewire_dist.sample(rng) {
            return Ok(self.random_other(i_agt, rng));
        }
        let nbr_vec = self.neighbours(i_agt);
        match nbr_vec.choose(rng) {
            Some(&i_nbr) => Ok(i_nbr),
            None => bail!("agent {i_agt} has no lattice neighbours"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    fn lattice(n_rows: usize, n_cols: usize, epsilon: f64) -> SquareLatticePopulation<usize> {
        SquareLatticePopulation::new((0..n_rows * n_cols).collect(), n_rows, epsilon).unwrap()
    }

    #[test]
    fn degenerate_lattices_are_rejected() {
        assert!(SquareLatticePopulation::new(vec![0], 1, 0.0).is_err());
        assert!(SquareLatticePopulation::new(vec![0; 6], 4, 0.0).is_err());
        assert!(SquareLatticePopulation::new(vec![0; 4], 4, 0.0).is_err());
        assert!(SquareLatticePopulation::new(vec![0; 4], 2, -0.1).is_err());
        assert!(SquareLatticePopulation::new(vec![0; 4], 2, f64::NAN).is_err());
        assert!(SquareLatticePopulation::new(vec![0; 6], 2, 0.0).is_ok());
    }

    #[test]
    fn neighbour_counts_follow_position() {
        let pop = lattice(3, 4, 0.0);
        assert_eq!(pop.neighbours(0).len(), 2);
        assert_eq!(pop.neighbours(3).len(), 2);
        assert_eq!(pop.neighbours(11).len(), 2);
        assert_eq!(pop.neighbours(1).len(), 3);
        assert_eq!(pop.neighbours(4).len(), 3);
        assert_eq!(pop.neighbours(5).len(), 4);

        let mut nbr_vec = pop.neighbours(6);
        nbr_vec.sort();
        assert_eq!(nbr_vec, vec![2, 5, 7, 10]);
    }

    #[test]
    fn without_rewiring_interior_neighbours_are_uniform() {
        let mut rng = ChaCha12Rng::seed_from_u64(17);
        let pop = lattice(4, 4, 0.0);
        let i_agt = 5;

        let n_samples = 40_000;
        let mut hits = [0usize; 16];
        for _ in 0..n_samples {
            hits[pop.random_neighbour(i_agt, &mut rng).unwrap()] += 1;
        }

        for (i_other, &n_hits) in hits.iter().enumerate() {
            if [1, 4, 6, 9].contains(&i_other) {
                let frac = n_hits as f64 / n_samples as f64;
                assert!((frac - 0.25).abs() < 0.015, "neighbour {i_other}: {frac}");
            } else {
                assert_eq!(n_hits, 0, "agent {i_other} is not a neighbour");
            }
        }
    }

    #[test]
    fn rewiring_fraction_matches_formula() {
        let mut rng = ChaCha12Rng::seed_from_u64(23);
        let pop = lattice(4, 4, 0.1);

        for i_agt in [0, 1, 5] {
            let n_nbrs = pop.neighbours(i_agt);
            let expected = 15.0 * 0.1 / (n_nbrs.len() as f64 + 15.0 * 0.1);
            assert!((pop.rewiring_probability(i_agt) - expected).abs() < 1e-12);

            let n_samples = 40_000;
            let mut n_far = 0;
            for _ in 0..n_samples {
                let i_other = pop.random_neighbour(i_agt, &mut rng).unwrap();
                assert_ne!(i_other, i_agt);
                if !n_nbrs.contains(&i_other) {
                    n_far += 1;
                }
            }
            // Rewired picks landing on a lattice neighbour are not counted as far.
            let far_share = (15 - n_nbrs.len()) as f64 / 15.0;
            let frac = n_far as f64 / n_samples as f64;
            assert!(
                (frac - expected * far_share).abs() < 0.015,
                "agent {i_agt}: {frac}"
            );
        }
    }

    #[test]
    fn random_other_excludes_given_agent() {
        let mut rng = ChaCha12Rng::seed_from_u64(29);
        let pop = lattice(2, 2, 0.0);
        for _ in 0..1000 {
            assert_ne!(pop.random_other(2, &mut rng), 2);
        }
    }

    #[test]
    fn pair_mut_returns_distinct_agents_in_order() {
        let mut pop = lattice(2, 3, 0.0);
        let (a, b) = pop.pair_mut(4, 1).unwrap();
        assert_eq!((*a, *b), (4, 1));
        let (a, b) = pop.pair_mut(0, 5).unwrap();
        assert_eq!((*a, *b), (0, 5));
        assert!(pop.pair_mut(3, 3).is_err());
        assert_eq!(pop.position(4), (1, 1));
    }
}
