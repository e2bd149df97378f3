use planner_rust::config::{Cli, Config};
use planner_rust::problem::Declaration;
use planner_rust::solver::{build_solver, SearchOutcome};
use planner_rust::termination::CancelToken;
use planner_rust::translator::translate;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let cancel = CancelToken::with_time_limit(config.time_limit());
    let declaration = Declaration::from_file(&config.problem_path)?;
    let context = translate(&declaration, cancel.remaining(), config.seed)
        .with_context(|| format!("error translating {}", config.problem_path))?;

    let mut solver = build_solver(&config)?;
    let outcome = solver.solve(&context, &cancel);
    solver.stats().print();

    match outcome {
        SearchOutcome::Solved(plan) => {
            assert!(plan.verify(&context.task, &context.fact_hashes));
            info!("plan found:\n{plan}");
            if let Some(output) = &config.output_path {
                let json = serde_json::to_string_pretty(&plan)?;
                std::fs::write(output, json)
                    .with_context(|| format!("cannot write plan to {output}"))?;
                info!("plan written to {output}");
            }
        }
        SearchOutcome::Unsolvable => error!("no plan exists"),
        SearchOutcome::Aborted(reason) => warn!("search aborted: {reason}"),
    }

    Ok(())
}
