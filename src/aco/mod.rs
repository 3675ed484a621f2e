pub use colony::{Colony, Report};
pub use config::Config;
pub use problem::Problem;

mod ant;
mod colony;
mod config;
mod graph;
mod problem;
mod solution;
mod utils;
