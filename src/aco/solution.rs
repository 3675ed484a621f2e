use std::fmt;

use super::{graph::Graph, problem::CityId};

/// Cities in visiting order, starting and ending at the depot.
pub type Route = Vec<CityId>;

/// One ant's full answer for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    routes: Vec<Route>,
    cost: f64,
}

impl Solution {
    pub fn new(routes: Vec<Route>, cost: f64) -> Self {
        Self { routes, cost }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Every traversed edge, route after route.
    pub fn edges(&self) -> impl Iterator<Item = (CityId, CityId)> + '_ {
        self.routes
            .iter()
            .flat_map(|route| route.windows(2).map(|w| (w[0], w[1])))
    }

    /// Sums the edge distances from scratch, independent of the recorded cost.
    pub fn path_length(&self, graph: &Graph) -> f64 {
        self.edges()
            .fold(0.0, |total, (from, to)| total + graph.distance(from, to))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .routes
            .iter()
            .enumerate()
            .map(|(i, route)| {
                let cities: Vec<String> = route.iter().map(ToString::to_string).collect();
                format!("Route #{}: {}", i + 1, cities.join(" "))
            })
            .collect();

        write!(f, "{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::Solution;

    #[test]
    fn edges_follow_routes() {
        let solution = Solution::new(vec![vec![1, 3, 1], vec![1, 2, 4, 1]], 0.0);
        let edges: Vec<_> = solution.edges().collect();

        assert_eq!(edges, [(1, 3), (3, 1), (1, 2), (2, 4), (4, 1)]);
    }

    #[test]
    fn display() {
        let solution = Solution::new(vec![vec![1, 3, 1], vec![1, 2, 1]], 12.5);

        assert_eq!(solution.to_string(), "Route #1: 1 3 1\nRoute #2: 1 2 1");
    }
}
