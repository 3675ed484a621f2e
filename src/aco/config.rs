use anyhow::{ensure, Result};
use strum::Display;

/// Rank cutoff used by the rank-based strategy when no explicit sigma is given.
pub const RANK_SIGMA: usize = 6;

/// How the pheromone matrix is reinforced after each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    /// Every solution of the round deposits in proportion to its quality.
    Standard,
    /// Standard deposit plus an extra deposit on the best-ever solution.
    Elitist,
    /// Only the top ranked solutions deposit, weighted by rank, plus the elitist deposit.
    Rank,
}

/// Parameters of one solver run.
#[derive(Debug, Clone)]
pub struct Config {
    pub iterations: usize,
    pub elite: bool,
    pub rank: bool,
    pub initial_pheromone: f64,
    /// Pheromone influence exponent.
    pub alpha: f64,
    /// Distance influence exponent.
    pub beta: f64,
    /// Evaporation rate.
    pub rho: f64,
    /// Rank cutoff and elitist deposit scale, see [`Config::sigma_for`].
    pub sigma: Option<usize>,
    /// Fixes every random draw of the run when set.
    pub seed: Option<u64>,
    /// Worker threads for ant construction, `None` lets rayon decide.
    pub threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: 3000,
            elite: false,
            rank: false,
            initial_pheromone: 80.0,
            alpha: 2.0,
            beta: 5.0,
            rho: 0.2,
            sigma: None,
            seed: None,
            threads: None,
        }
    }
}

impl Config {
    pub fn strategy(&self) -> Strategy {
        if self.rank {
            Strategy::Rank
        } else if self.elite {
            Strategy::Elitist
        } else {
            Strategy::Standard
        }
    }

    /// An explicit sigma wins; otherwise the rank cutoff in rank mode and the
    /// city count in every other mode.
    pub fn sigma_for(&self, num_cities: usize) -> usize {
        match self.sigma {
            Some(sigma) => sigma,
            None if self.rank => RANK_SIGMA,
            None => num_cities,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.iterations > 0, "iterations must be positive");
        ensure!(
            self.initial_pheromone.is_finite() && self.initial_pheromone > 0.0,
            "initial pheromone must be a positive number, got {}",
            self.initial_pheromone
        );
        ensure!(
            (0.0..=1.0).contains(&self.rho),
            "evaporation rate rho must lie in [0, 1], got {}",
            self.rho
        );
        ensure!(self.alpha.is_finite(), "alpha must be finite");
        ensure!(self.beta.is_finite(), "beta must be finite");
        ensure!(self.sigma != Some(0), "sigma must be at least 1");
        ensure!(self.threads != Some(0), "thread count must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Strategy, RANK_SIGMA};

    #[test]
    fn strategy_from_flags() {
        let mut config = Config::default();
        assert_eq!(config.strategy(), Strategy::Standard);

        config.elite = true;
        assert_eq!(config.strategy(), Strategy::Elitist);

        config.rank = true;
        assert_eq!(config.strategy(), Strategy::Rank);
        assert_eq!(config.strategy().to_string(), "rank");
    }

    #[test]
    fn sigma_defaults() {
        let mut config = Config::default();
        assert_eq!(config.sigma_for(32), 32);

        config.rank = true;
        assert_eq!(config.sigma_for(32), RANK_SIGMA);

        config.sigma = Some(3);
        assert_eq!(config.sigma_for(32), 3);
    }

    #[test]
    fn validation() {
        assert!(Config::default().validate().is_ok());

        let bad = [
            Config {
                iterations: 0,
                ..Config::default()
            },
            Config {
                initial_pheromone: 0.0,
                ..Config::default()
            },
            Config {
                rho: 1.5,
                ..Config::default()
            },
            Config {
                beta: f64::NAN,
                ..Config::default()
            },
            Config {
                sigma: Some(0),
                ..Config::default()
            },
            Config {
                threads: Some(0),
                ..Config::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }
}
