use aeirl::envs::{PointMass, TwoStateEnv};
use aeirl::{run_repetitions, Action, AgentConfig, FnExpert, TrainConfig, TrainSummary};
use chrono::Local;
use clap::{ArgEnum, Parser};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ArgEnum)]
enum EnvType {
    TwoState,
    PointMass,
}

impl EnvType {
    const fn name(self) -> &'static str {
        match self {
            Self::TwoState => "two-state",
            Self::PointMass => "point-mass",
        }
    }
}

/// Contents of a JSON configuration file. Missing fields take their default values.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    train: TrainConfig,
    agent: AgentConfig,
}

#[derive(Parser, Debug)]
#[clap(version, author, about)]
struct Options {
    #[clap(long, arg_enum, default_value = "two-state")]
    /// Environment type
    env: EnvType,

    #[clap(long)]
    /// JSON file with `train` and `agent` configuration sections
    config: Option<PathBuf>,

    #[clap(long, default_value_t = 10)]
    /// Number of independent training runs
    nb_run: usize,

    #[clap(long, default_value = "experiment")]
    /// Directory in which the experiment folder is created
    experiment_root: PathBuf,

    #[clap(long)]
    /// Maximum number of runs training at the same time. Defaults to the number of CPUs.
    threads: Option<usize>,

    #[clap(long, help_heading = "TRAINING OVERRIDES")]
    /// Seed of the first run
    seed: Option<u64>,

    #[clap(long, help_heading = "TRAINING OVERRIDES")]
    /// Number of training iterations
    num_iters: Option<u64>,

    #[clap(long, help_heading = "TRAINING OVERRIDES")]
    /// Standard deviation of the noise added to expert demonstrations
    expert_noise: Option<f64>,
}

fn load_config(opts: &Options) -> Result<ConfigFile, Box<dyn Error>> {
    let mut config: ConfigFile = match &opts.config {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => ConfigFile::default(),
    };
    if let Some(seed) = opts.seed {
        config.train.seed = seed;
    }
    if let Some(num_iters) = opts.num_iters {
        config.train.num_iters = num_iters;
    }
    if let Some(expert_noise) = opts.expert_noise {
        config.train.expert_noise = expert_noise;
    }
    config.train.validate()?;
    config.agent.validate()?;
    Ok(config)
}

fn print_summary(index: usize, summary: &TrainSummary) {
    let fmt = |x: Option<f64>| x.map_or_else(|| "-".to_string(), |x| format!("{:.3}", x));
    println!(
        "run {}: expert reward {}, final policy reward {}, final evaluation {}",
        index,
        fmt(summary.expert_reward_mean),
        fmt(summary.iteration_reward_means.last().copied().flatten()),
        fmt(summary.evaluations.last().map(|(_, r)| *r)),
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let opts = Options::parse();
    let config = load_config(&opts)?;

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let experiment_dir = opts
        .experiment_root
        .join(format!("{}-{}", opts.env.name(), timestamp));
    if experiment_dir.exists() {
        return Err(format!(
            "experiment folder {} already exists; wait a second or clean {}",
            experiment_dir.display(),
            opts.experiment_root.display()
        )
        .into());
    }
    let log_dir = experiment_dir.join("log");
    fs::create_dir_all(&log_dir)?;
    serde_json::to_writer_pretty(File::create(experiment_dir.join("config.json"))?, &config)?;
    info!("experiment folder {}", experiment_dir.display());

    let threads = opts.threads.unwrap_or_else(num_cpus::get);
    let summaries = match opts.env {
        EnvType::TwoState => run_repetitions(
            |i| TwoStateEnv::new(10, i as u64),
            |_| FnExpert(TwoStateEnv::optimal_action),
            &config.train,
            &config.agent,
            &log_dir,
            "aeirl",
            opts.nb_run,
            threads,
        )?,
        EnvType::PointMass => run_repetitions(
            |i| PointMass::new(0.5, 20, i as u64),
            |_| {
                let reference = PointMass::new(0.5, 20, 0);
                FnExpert(move |observation: &[f64]| -> Action { reference.expert_action(observation) })
            },
            &config.train,
            &config.agent,
            &log_dir,
            "aeirl",
            opts.nb_run,
            threads,
        )?,
    };
    for (i, summary) in summaries.iter().enumerate() {
        print_summary(i, summary);
    }
    Ok(())
}
