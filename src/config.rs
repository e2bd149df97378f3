use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "Rust Planner",
    about = "Satisficing best-first planners over grounded STRIPS tasks.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the YAML problem declaration")]
    pub problem: Option<String>,

    #[arg(long, value_enum, help = "Search strategy to use")]
    pub strategy: Option<Strategy>,

    #[arg(
        long,
        help = "Heuristic: goal, depth, path, add, hmax, ff, effect or constant:N"
    )]
    pub heuristic: Option<HeuristicConfig>,

    #[arg(long, help = "Beam width for beam search")]
    pub beam_width: Option<usize>,

    #[arg(long, help = "Seed for the per-fact hash table")]
    pub seed: Option<u64>,

    #[arg(long, help = "Wall-clock limit for translation plus search")]
    pub time_limit_ms: Option<u64>,

    #[arg(long, help = "Write the plan as JSON to this path")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Greedy,
    Lazy,
    Deferred,
    Preferred,
    Beam,
    Refinement,
    Focused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeuristicConfig {
    Goal,
    Constant { value: usize },
    Depth,
    Path,
    Weighted { inner: Box<HeuristicConfig>, weight: f64 },
    Sum { parts: Vec<HeuristicConfig> },
    Max { parts: Vec<HeuristicConfig> },
    Add,
    Hmax,
    Ff,
    Effect,
}

impl FromStr for HeuristicConfig {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        if let Some(value) = name.strip_prefix("constant:") {
            return Ok(HeuristicConfig::Constant {
                value: value.parse()?,
            });
        }
        Ok(match name {
            "goal" => HeuristicConfig::Goal,
            "depth" => HeuristicConfig::Depth,
            "path" => HeuristicConfig::Path,
            "add" => HeuristicConfig::Add,
            "hmax" => HeuristicConfig::Hmax,
            "ff" => HeuristicConfig::Ff,
            "effect" => HeuristicConfig::Effect,
            _ => bail!("unknown heuristic {name:?}, composite heuristics need a config file"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    pub exploration_expansions: usize,
    pub macro_count: usize,
    pub max_parameters: usize,
    pub max_length: usize,
    pub translate_time_limit_ms: u64,
}

impl Default for MacroConfig {
    fn default() -> Self {
        MacroConfig {
            exploration_expansions: 200,
            macro_count: 5,
            max_parameters: 6,
            max_length: 3,
            translate_time_limit_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub problem_path: String,
    pub strategy: Strategy,
    pub heuristic: HeuristicConfig,
    pub beam_width: usize,
    pub seed: u64,
    pub time_limit_ms: Option<u64>,
    pub output_path: Option<String>,
    pub macros: MacroConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            problem_path: "problems/gripper.yaml".to_string(),
            strategy: Strategy::Greedy,
            heuristic: HeuristicConfig::Ff,
            beam_width: 4,
            seed: 0,
            time_limit_ms: None,
            output_path: None,
            macros: MacroConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Command line flags win over the config file when given.
    pub fn override_from_command_line(mut self, cli: &Cli) -> Result<Self> {
        if let Some(problem) = &cli.problem {
            self.problem_path = problem.clone();
        }
        if let Some(strategy) = cli.strategy {
            self.strategy = strategy;
        }
        if let Some(heuristic) = &cli.heuristic {
            self.heuristic = heuristic.clone();
        }
        if let Some(beam_width) = cli.beam_width {
            self.beam_width = beam_width;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if cli.time_limit_ms.is_some() {
            self.time_limit_ms = cli.time_limit_ms;
        }
        if cli.output.is_some() {
            self.output_path = cli.output.clone();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        validate_heuristic(&self.heuristic)?;

        if self.strategy == Strategy::Beam && self.beam_width == 0 {
            return Err(anyhow!("Beam width must be positive"));
        }

        if self.strategy == Strategy::Focused {
            let macros = &self.macros;
            if macros.macro_count == 0 {
                return Err(anyhow!("Macro count must be positive"));
            }
            if macros.max_length < 2 {
                return Err(anyhow!(
                    "Macro max length must be at least 2, got {}",
                    macros.max_length
                ));
            }
            if macros.max_parameters == 0 {
                return Err(anyhow!("Macro parameter limit must be positive"));
            }
        }
        Ok(())
    }
}

fn validate_heuristic(heuristic: &HeuristicConfig) -> Result<()> {
    match heuristic {
        HeuristicConfig::Weighted { inner, weight } => {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(anyhow!(
                    "Heuristic weight must be finite and non-negative, got {weight}"
                ));
            }
            validate_heuristic(inner)
        }
        HeuristicConfig::Sum { parts } | HeuristicConfig::Max { parts } => {
            if parts.is_empty() {
                return Err(anyhow!("Combined heuristic needs at least one part"));
            }
            parts.iter().try_for_each(validate_heuristic)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_yaml() {
        let text = r#"
problem_path: problems/blocks.yaml
strategy: beam
beam_width: 2
heuristic:
  kind: sum
  parts:
    - kind: path
    - kind: weighted
      weight: 2.0
      inner:
        kind: ff
"#;
        let config = Config::from_yaml_str(text).unwrap();
        assert_eq!(config.strategy, Strategy::Beam);
        assert_eq!(config.beam_width, 2);
        assert_eq!(config.macros.macro_count, 5);
        assert!(matches!(config.heuristic, HeuristicConfig::Sum { ref parts } if parts.len() == 2));
        config.validate().unwrap();
    }

    #[test]
    fn test_command_line_overrides() {
        let cli = Cli::parse_from([
            "planner",
            "--strategy",
            "lazy",
            "--heuristic",
            "constant:3",
            "--seed",
            "9",
        ]);
        let config = Config::default().override_from_command_line(&cli).unwrap();
        assert_eq!(config.strategy, Strategy::Lazy);
        assert_eq!(config.heuristic, HeuristicConfig::Constant { value: 3 });
        assert_eq!(config.seed, 9);
        assert_eq!(config.problem_path, "problems/gripper.yaml");
    }

    #[test]
    fn test_rejects_bad_compositions() {
        let config = Config {
            heuristic: HeuristicConfig::Weighted {
                inner: Box::new(HeuristicConfig::Goal),
                weight: -1.0,
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            heuristic: HeuristicConfig::Max { parts: vec![] },
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            strategy: Strategy::Beam,
            beam_width: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            strategy: Strategy::Focused,
            ..Config::default()
        };
        config.macros.max_length = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_heuristic_name() {
        assert!("sum".parse::<HeuristicConfig>().is_err());
        assert!("constant:x".parse::<HeuristicConfig>().is_err());
        assert_eq!("hmax".parse::<HeuristicConfig>().unwrap(), HeuristicConfig::Hmax);
    }
}
