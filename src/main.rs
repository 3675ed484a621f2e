use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use aco::{Colony, Config, Problem, Report};

mod aco;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
    /// CVRP instance in TSPLIB format
    #[clap(short, long)]
    vrp: PathBuf,

    #[clap(short, long, default_value_t = 3000)]
    iterations: usize,

    /// Pheromone influence exponent
    #[clap(long, default_value_t = 2.0)]
    alpha: f64,

    /// Distance influence exponent
    #[clap(long, default_value_t = 5.0)]
    beta: f64,

    /// Evaporation rate in [0, 1]
    #[clap(long, default_value_t = 0.2)]
    rho: f64,

    #[clap(long, default_value_t = 80.0)]
    initial_pheromone: f64,

    /// Extra deposit on the best solution found so far
    #[clap(long)]
    elite: bool,

    /// Only the best ranked solutions of a round deposit (implies --elite)
    #[clap(long)]
    rank: bool,

    /// Rank cutoff and elitist weight, defaults to 6 with --rank and the city count otherwise
    #[clap(long)]
    sigma: Option<usize>,

    #[clap(long)]
    seed: Option<u64>,

    /// Worker threads for the ants, defaults to one per core
    #[clap(long)]
    threads: Option<usize>,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            iterations: self.iterations,
            elite: self.elite,
            rank: self.rank,
            initial_pheromone: self.initial_pheromone,
            alpha: self.alpha,
            beta: self.beta,
            rho: self.rho,
            sigma: self.sigma,
            seed: self.seed,
            threads: self.threads,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let vrp = File::open(&args.vrp)
        .with_context(|| format!("cannot open {}", args.vrp.display()))?;
    let problem = Problem::try_from_vrp(vrp)
        .with_context(|| format!("cannot read {}", args.vrp.display()))?;
    info!(
        name = %problem.name,
        comment = %problem.comment,
        cities = problem.num_cities(),
        capacity = problem.capacity,
        "loaded instance"
    );

    let now = Instant::now();
    let report = Colony::new(&problem, args.config())?.run()?;
    let time = now.elapsed();

    print_report(&problem, &report);
    println!("Took {:?}", time);

    Ok(())
}

fn print_report(problem: &Problem, report: &Report) {
    debug!(
        round = ?report.iteration_best_costs(),
        best_ever = ?report.best_ever_costs(),
        "costs per iteration"
    );

    println!(
        "Best found VRP solution of cost {:.2} using {} vehicles:",
        report.best.cost(),
        report.best.routes().len()
    );
    println!("{}", report.best);

    if let Some(optimal) = problem.optimal {
        let gap = (report.best.cost() - optimal) / optimal * 100.0;
        println!("Known optimum {} (gap {:.2}%)", optimal, gap);
    }
}
