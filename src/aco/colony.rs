use anyhow::{anyhow, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace};

use super::{
    ant::Ant,
    config::Config,
    graph::Graph,
    problem::Problem,
    solution::Solution,
};

/// Progress is logged on the first iteration and then every this many.
const LOG_EVERY: usize = 10;

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct Report {
    pub best: Solution,
    /// Cheapest solution of each round, in iteration order.
    pub iteration_bests: Vec<Solution>,
}

impl Report {
    pub fn iteration_best_costs(&self) -> Vec<f64> {
        self.iteration_bests.iter().map(Solution::cost).collect()
    }

    /// Best-ever cost after each iteration.
    pub fn best_ever_costs(&self) -> Vec<f64> {
        self.iteration_bests
            .iter()
            .scan(f64::INFINITY, |best, solution| {
                *best = best.min(solution.cost());
                Some(*best)
            })
            .collect()
    }
}

/// Owns the graph and the ant population and runs the iteration loop.
///
/// Each round is split into a read phase, where every ant borrows the graph
/// immutably on the worker pool, and a write phase, where the pheromones are
/// updated once all solutions are in.
pub struct Colony {
    graph: Graph,
    ants: Vec<Ant>,
    config: Config,
    sigma: usize,
    rng: ChaCha8Rng,
    pool: ThreadPool,
}

impl Colony {
    pub fn new(problem: &Problem, config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        problem.validate().context("invalid problem instance")?;

        let graph = Graph::build(&problem.coordinates, &problem.demands, &config)?;
        let num_cities = graph.num_cities();

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.unwrap_or(0))
            .build()
            .context("failed to start worker pool")?;

        Ok(Self {
            ants: Self::init_ants(num_cities, problem.capacity),
            sigma: config.sigma_for(num_cities),
            graph,
            config,
            rng,
            pool,
        })
    }

    fn init_ants(num_ants: usize, capacity: usize) -> Vec<Ant> {
        vec![Ant::new(capacity); num_ants]
    }

    #[cfg(test)]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn run(&mut self) -> Result<Report> {
        let strategy = self.config.strategy();
        info!(
            %strategy,
            ants = self.ants.len(),
            iterations = self.config.iterations,
            sigma = self.sigma,
            threads = self.pool.current_num_threads(),
            "starting colony"
        );

        let mut best: Option<Solution> = None;
        let mut iteration_bests = Vec::with_capacity(self.config.iterations);

        for iteration in 1..=self.config.iterations {
            let solutions = self
                .run_round()
                .with_context(|| format!("iteration {} failed", iteration))?;

            let round_best = Self::round_best(&solutions)?.clone();
            trace!(iteration, cost = round_best.cost(), "round finished");
            debug_assert!((round_best.cost() - round_best.path_length(&self.graph)).abs() < 1e-6);

            if best.as_ref().map_or(true, |b| round_best.cost() < b.cost()) {
                debug!(iteration, cost = round_best.cost(), "new best solution");
                best = Some(round_best.clone());
            }
            let best_ever = best
                .as_ref()
                .ok_or_else(|| anyhow!("no best solution after iteration {}", iteration))?;

            if iteration == 1 || iteration % LOG_EVERY == 0 {
                info!(iteration, best = best_ever.cost(), "progress");
            }

            self.graph
                .update_pheromones(&solutions, best_ever, strategy, self.sigma);
            iteration_bests.push(round_best);
        }

        let best = best.ok_or_else(|| anyhow!("colony ran no iterations"))?;
        Ok(Report {
            best,
            iteration_bests,
        })
    }

    /// Resets and runs every ant on the pool and collects their solutions in ant order.
    fn run_round(&mut self) -> Result<Vec<Solution>> {
        let seeds: Vec<u64> = (0..self.ants.len()).map(|_| self.rng.gen()).collect();

        let graph = &self.graph;
        let config = &self.config;
        let ants = &mut self.ants;

        self.pool.install(|| {
            ants.par_iter_mut()
                .zip(seeds)
                .map(|(ant, seed)| {
                    ant.reset_state(graph, seed);
                    ant.find_solution(graph, config)
                })
                .collect()
        })
    }

    /// First cheapest solution in collection order.
    fn round_best(solutions: &[Solution]) -> Result<&Solution> {
        solutions
            .iter()
            .min_by(|a, b| a.cost().total_cmp(&b.cost()))
            .ok_or_else(|| anyhow!("round produced no solutions"))
    }
}
