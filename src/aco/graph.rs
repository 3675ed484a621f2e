use std::collections::BTreeMap;

use anyhow::Result;
use tracing::trace;

use super::{
    config::{Config, Strategy},
    problem::{check_city_ids, CityId, Matrix, Point, DEPOT},
    solution::Solution,
};

/// Pheromone values never decay below this, so selection weights stay positive.
pub const PHEROMONE_FLOOR: f64 = 1e-10;

/// Static distances and demands plus the evolving pheromone trail.
///
/// Cities are addressed by id; `Matrix` rows and columns are `id - 1`.
#[derive(Debug, Clone)]
pub struct Graph {
    adjacency_matrix: Matrix,
    pheromones: Matrix,
    demands: Vec<usize>,
    initial_pheromone: f64,
    rho: f64,
}

impl Graph {
    pub fn build(
        coordinates: &BTreeMap<CityId, Point>,
        demands: &BTreeMap<CityId, usize>,
        config: &Config,
    ) -> Result<Self> {
        let n = check_city_ids(coordinates, demands)?;
        let points: Vec<Point> = coordinates.values().copied().collect();

        Ok(Self {
            adjacency_matrix: Matrix::symmetric(n, |i, j| points[i].distance_from(&points[j])),
            pheromones: Matrix::symmetric(n, |_, _| config.initial_pheromone),
            demands: demands.values().copied().collect(),
            initial_pheromone: config.initial_pheromone,
            rho: config.rho,
        })
    }

    pub fn num_cities(&self) -> usize {
        self.demands.len()
    }

    /// Every city except the depot, ascending.
    pub fn customers(&self) -> impl Iterator<Item = CityId> {
        DEPOT + 1..=self.num_cities()
    }

    pub fn contains(&self, city: CityId) -> bool {
        (1..=self.num_cities()).contains(&city)
    }

    pub fn distance(&self, from: CityId, to: CityId) -> f64 {
        self.adjacency_matrix[from - 1][to - 1]
    }

    pub fn pheromone(&self, from: CityId, to: CityId) -> f64 {
        self.pheromones[from - 1][to - 1]
    }

    pub fn demand(&self, city: CityId) -> usize {
        self.demands[city - 1]
    }

    /// Decays every trail by `1 - rho`, never below [`PHEROMONE_FLOOR`].
    pub fn evaporate(&mut self) {
        let factor = 1.0 - self.rho;
        let pairs: Vec<(usize, usize)> = self.pheromones.pairs().collect();
        for (i, j) in pairs {
            self.pheromones
                .update_symmetric(i, j, |v| (v * factor).max(PHEROMONE_FLOOR));
        }
    }

    /// Reinforces trails from this round's solutions and the best solution so far.
    pub fn deposit(
        &mut self,
        solutions: &[Solution],
        best_ever: &Solution,
        strategy: Strategy,
        sigma: usize,
    ) {
        match strategy {
            Strategy::Standard | Strategy::Elitist => {
                for solution in solutions {
                    self.reinforce(solution, self.initial_pheromone / solution.cost());
                }
            }
            Strategy::Rank => {
                let mut ranked: Vec<&Solution> = solutions.iter().collect();
                ranked.sort_by(|a, b| a.cost().total_cmp(&b.cost()));

                let depositing = sigma.saturating_sub(1);
                for (rank, solution) in ranked.into_iter().take(depositing).enumerate() {
                    let weight = (sigma - rank - 1) as f64;
                    self.reinforce(solution, weight * self.initial_pheromone / solution.cost());
                }
            }
        }

        if strategy != Strategy::Standard {
            let amount = sigma as f64 * self.initial_pheromone / best_ever.cost();
            trace!(amount, "elitist deposit");
            self.reinforce(best_ever, amount);
        }
    }

    /// One full pheromone update: evaporation, then deposit.
    pub fn update_pheromones(
        &mut self,
        solutions: &[Solution],
        best_ever: &Solution,
        strategy: Strategy,
        sigma: usize,
    ) {
        self.evaporate();
        self.deposit(solutions, best_ever, strategy, sigma);
    }

    fn reinforce(&mut self, solution: &Solution, amount: f64) {
        for (from, to) in solution.edges() {
            self.pheromones
                .update_symmetric(from - 1, to - 1, |v| v + amount);
        }
    }
}
