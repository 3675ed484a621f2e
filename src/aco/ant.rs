use anyhow::{anyhow, ensure, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use super::{
    config::Config,
    graph::Graph,
    problem::{CityId, DEPOT},
    solution::{Route, Solution},
    utils::CumulativeDistribution,
};

/// Builds one complete set of routes per iteration.
///
/// All state here is private to the ant and thrown away by [`Ant::reset_state`];
/// the graph is only ever read.
#[derive(Clone, Debug)]
pub struct Ant {
    capacity: usize,
    cur_capacity: usize,
    cities_left: Vec<CityId>,
    routes: Vec<Route>,
    path_cost: f64,
    rng: ChaCha8Rng,
}

impl Ant {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cur_capacity: capacity,
            cities_left: Vec::new(),
            routes: Vec::new(),
            path_cost: 0.0,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    pub fn reset_state(&mut self, graph: &Graph, seed: u64) {
        self.cur_capacity = self.capacity;
        self.cities_left.clear();
        self.cities_left.extend(graph.customers());
        self.routes.clear();
        self.path_cost = 0.0;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn done(&self) -> bool {
        self.cities_left.is_empty()
    }

    fn cur_city(&self) -> Result<CityId> {
        self.routes
            .last()
            .and_then(|route| route.last())
            .copied()
            .ok_or_else(|| anyhow!("ant has no open route"))
    }

    /// Unvisited cities whose demand still fits in the vehicle.
    fn available_cities(&self, graph: &Graph) -> Vec<CityId> {
        self.cities_left
            .iter()
            .copied()
            .filter(|&city| graph.demand(city) <= self.cur_capacity)
            .collect()
    }

    fn start_new_route(&mut self, graph: &Graph) -> Result<()> {
        self.cur_capacity = self.capacity;
        self.routes.push(vec![DEPOT]);

        let available = self.available_cities(graph);
        ensure!(
            !available.is_empty(),
            "none of the {} remaining cities fits an empty vehicle of capacity {}",
            self.cities_left.len(),
            self.capacity
        );

        let first = available[self.rng.gen_range(0..available.len())];
        self.move_to_city(graph, DEPOT, first)
    }

    /// `None` means nothing fits any more and the vehicle has to return to the depot.
    fn select_next_city(
        &mut self,
        graph: &Graph,
        config: &Config,
        current: CityId,
    ) -> Result<Option<CityId>> {
        let available = self.available_cities(graph);
        if available.is_empty() {
            return Ok(None);
        }

        let mut weights = Vec::with_capacity(available.len());
        for &city in &available {
            ensure!(city != current, "city {} was offered as its own successor", current);

            let weight = graph.pheromone(current, city).powf(config.alpha)
                * (1.0 / graph.distance(current, city)).powf(config.beta);

            // Zero distance
            if weight == f64::INFINITY {
                return Ok(Some(city));
            }
            weights.push(weight);
        }

        let idx = match CumulativeDistribution::new(&weights) {
            Some(distribution) => distribution.sample(&mut self.rng),
            None => {
                trace!(current, "degenerate selection weights, choosing uniformly");
                self.rng.gen_range(0..available.len())
            }
        };

        Ok(Some(available[idx]))
    }

    fn move_to_city(&mut self, graph: &Graph, current: CityId, next: CityId) -> Result<()> {
        ensure!(graph.contains(next), "route references unknown city {}", next);

        self.routes
            .last_mut()
            .ok_or_else(|| anyhow!("ant has no open route"))?
            .push(next);

        if next != DEPOT {
            let idx = self
                .cities_left
                .iter()
                .position(|&city| city == next)
                .ok_or_else(|| anyhow!("city {} visited twice", next))?;
            self.cities_left.remove(idx);
        }

        self.cur_capacity = self
            .cur_capacity
            .checked_sub(graph.demand(next))
            .ok_or_else(|| anyhow!("city {} overloads the vehicle", next))?;
        self.path_cost += graph.distance(current, next);

        Ok(())
    }

    pub fn find_solution(&mut self, graph: &Graph, config: &Config) -> Result<Solution> {
        self.start_new_route(graph)?;

        while !self.done() {
            let current = self.cur_city()?;
            match self.select_next_city(graph, config, current)? {
                Some(next) => self.move_to_city(graph, current, next)?,
                None => {
                    self.move_to_city(graph, current, DEPOT)?;
                    self.start_new_route(graph)?;
                }
            }
        }

        let last = self.cur_city()?;
        self.move_to_city(graph, last, DEPOT)?;

        Ok(Solution::new(std::mem::take(&mut self.routes), self.path_cost))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::Ant;
    use crate::aco::{
        config::Config,
        graph::Graph,
        problem::{Problem, DEPOT},
        solution::Solution,
    };

    fn graph_for(problem: &Problem, config: &Config) -> Graph {
        Graph::build(&problem.coordinates, &problem.demands, config).unwrap()
    }

    fn solve(problem: &Problem, config: &Config, seed: u64) -> (Graph, Solution) {
        let graph = graph_for(problem, config);
        let mut ant = Ant::new(problem.capacity);
        ant.reset_state(&graph, seed);
        let solution = ant.find_solution(&graph, config).unwrap();
        (graph, solution)
    }

    /// Coverage, framing, capacity at every prefix and cost consistency.
    fn check_solution(graph: &Graph, capacity: usize, solution: &Solution) {
        let mut seen = BTreeSet::new();

        for route in solution.routes() {
            assert!(route.len() >= 3, "empty route {:?}", route);
            assert_eq!(route.first(), Some(&DEPOT));
            assert_eq!(route.last(), Some(&DEPOT));

            let mut load = 0;
            for &city in &route[1..route.len() - 1] {
                assert_ne!(city, DEPOT, "depot inside route {:?}", route);
                assert!(seen.insert(city), "city {} served twice", city);
                load += graph.demand(city);
                assert!(load <= capacity, "route {:?} overloaded", route);
            }
        }

        assert!(seen.iter().copied().eq(graph.customers()));
        assert!((solution.cost() - solution.path_length(graph)).abs() < 1e-9);
    }

    fn ten_cities() -> Problem {
        Problem::from_cities(
            15,
            &[
                ((50.0, 50.0), 0),
                ((10.0, 20.0), 4),
                ((80.0, 15.0), 7),
                ((33.0, 90.0), 3),
                ((61.0, 61.0), 9),
                ((5.0, 75.0), 2),
                ((95.0, 95.0), 6),
                ((45.0, 5.0), 5),
                ((70.0, 40.0), 8),
                ((20.0, 50.0), 1),
            ],
        )
    }

    #[test]
    fn builds_feasible_solutions() {
        let problem = ten_cities();
        let config = Config::default();

        for seed in 0..50 {
            let (graph, solution) = solve(&problem, &config, seed);
            check_solution(&graph, problem.capacity, &solution);
        }
    }

    #[test]
    fn reset_allows_reuse() {
        let problem = ten_cities();
        let config = Config::default();
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        ant.reset_state(&graph, 3);
        let first = ant.find_solution(&graph, &config).unwrap();
        ant.reset_state(&graph, 3);
        let second = ant.find_solution(&graph, &config).unwrap();

        assert_eq!(first, second);
        check_solution(&graph, problem.capacity, &second);
    }

    #[test]
    fn full_demand_city_travels_alone() {
        let problem = Problem::from_cities(
            10,
            &[
                ((0.0, 0.0), 0),
                ((1.0, 1.0), 10),
                ((2.0, 1.0), 3),
                ((1.0, 2.0), 4),
            ],
        );
        let config = Config::default();

        for seed in 0..50 {
            let (graph, solution) = solve(&problem, &config, seed);
            check_solution(&graph, problem.capacity, &solution);

            let route = solution
                .routes()
                .iter()
                .find(|route| route.contains(&2))
                .unwrap();
            assert_eq!(route, &vec![1, 2, 1]);
        }
    }

    #[test]
    fn distance_dominates_without_pheromone() {
        let problem = Problem::from_cities(
            100,
            &[((0.0, 0.0), 0), ((10.0, 0.0), 1), ((0.0, 1.0), 1)],
        );
        let config = Config {
            alpha: 0.0,
            beta: 50.0,
            ..Config::default()
        };
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        for seed in 0..100 {
            ant.reset_state(&graph, seed);
            ant.routes.push(vec![DEPOT]);
            let next = ant.select_next_city(&graph, &config, DEPOT).unwrap();
            assert_eq!(next, Some(3));
        }
    }

    #[test]
    fn zero_distance_is_chosen_immediately() {
        let problem = Problem::from_cities(
            100,
            &[
                ((0.0, 0.0), 0),
                ((1.0, 0.0), 1),
                ((0.0, 0.0), 1),
                ((0.0, 1.0), 1),
            ],
        );
        let config = Config::default();
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        for seed in 0..20 {
            ant.reset_state(&graph, seed);
            ant.routes.push(vec![DEPOT]);
            let next = ant.select_next_city(&graph, &config, DEPOT).unwrap();
            assert_eq!(next, Some(3));
        }
    }

    #[test]
    fn underflowing_weights_fall_back_to_uniform() {
        let problem = Problem::from_cities(
            100,
            &[((0.0, 0.0), 0), ((10.0, 0.0), 1), ((0.0, 1.0), 1)],
        );
        let config = Config {
            initial_pheromone: 0.5,
            alpha: 5000.0,
            ..Config::default()
        };
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        let mut picked = BTreeSet::new();
        for seed in 0..100 {
            ant.reset_state(&graph, seed);
            ant.routes.push(vec![DEPOT]);
            picked.insert(ant.select_next_city(&graph, &config, DEPOT).unwrap());
        }

        assert_eq!(picked, BTreeSet::from([Some(2), Some(3)]));
    }

    #[test]
    fn no_feasible_city_returns_none() {
        let problem = Problem::from_cities(5, &[((0.0, 0.0), 0), ((1.0, 0.0), 5)]);
        let config = Config::default();
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        ant.reset_state(&graph, 0);
        ant.routes.push(vec![DEPOT]);
        ant.cur_capacity = 4;

        assert_eq!(ant.select_next_city(&graph, &config, DEPOT).unwrap(), None);
    }

    #[test]
    fn self_transition_is_an_error() {
        let problem = ten_cities();
        let config = Config::default();
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        ant.reset_state(&graph, 0);
        ant.routes.push(vec![DEPOT, 2]);

        assert!(ant.select_next_city(&graph, &config, 2).is_err());
    }

    #[test]
    fn revisiting_a_city_is_an_error() {
        let problem = ten_cities();
        let config = Config::default();
        let graph = graph_for(&problem, &config);
        let mut ant = Ant::new(problem.capacity);

        ant.reset_state(&graph, 0);
        ant.routes.push(vec![DEPOT]);
        ant.move_to_city(&graph, DEPOT, 2).unwrap();

        assert!(ant.move_to_city(&graph, 2, 2).is_err());
    }

    fn arb_problem() -> impl Strategy<Value = Problem> {
        (1usize..30).prop_flat_map(|capacity| {
            (
                Just(capacity),
                prop::collection::vec(((0.0..100.0f64, 0.0..100.0f64), 0..=capacity), 1..15),
            )
                .prop_map(|(capacity, customers)| {
                    let mut cities = vec![((50.0, 50.0), 0)];
                    cities.extend(customers);
                    Problem::from_cities(capacity, &cities)
                })
        })
    }

    proptest! {
        #[test]
        fn any_valid_instance_yields_feasible_solution(problem in arb_problem(), seed in any::<u64>()) {
            prop_assert!(problem.validate().is_ok());

            let (graph, solution) = solve(&problem, &Config::default(), seed);
            check_solution(&graph, problem.capacity, &solution);
        }
    }
}
