pub mod common;
pub mod config;
pub mod heuristic;
pub mod problem;
pub mod solver;
pub mod stat;
pub mod termination;
pub mod translator;
