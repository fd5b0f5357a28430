//! Adversarial imitation training loop
use super::eval::evaluate;
use super::rollout;
use crate::agents::{Actor, ActorMode, ExpertBuffer};
use crate::config::{AgentConfig, TrainConfig};
use crate::envs::{EnvStructure, Environment};
use crate::error::TrainError;
use crate::logging::RunLog;
use crate::torch::critic::{estimate_targets, normalize_advantages};
use crate::torch::updaters::{update_policy, update_value, PolicyStats, ValueStepOutcome};
use crate::torch::utils::to_f64_vec;
use crate::torch::{observation_tensor, Discriminator, PolicyNetwork, ValueNetwork};
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Result of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// Mean episode reward of the expert demonstrations.
    pub expert_reward_mean: Option<f64>,
    /// Mean episode reward of the policy rollouts of each iteration.
    pub iteration_reward_means: Vec<Option<f64>>,
    /// `(iteration, mean return)` of each evaluation.
    pub evaluations: Vec<(u64, f64)>,
}

/// Statistics of one training iteration.
#[derive(Debug)]
pub struct IterationStats {
    pub num_steps: usize,
    pub num_episodes: usize,
    /// Mean environment reward of the iteration's episodes.
    pub reward_mean: Option<f64>,
    /// Mean per-step score of the policy's own rollouts.
    pub score_mean: f64,
    /// Discriminator loss before its update.
    pub discriminator_loss: f64,
    /// Statistics of the advantages given to the policy update.
    pub advantages: OnlineMeanVariance<f64>,
    pub value_step: ValueStepOutcome,
    pub policy: PolicyStats,
}

/// Policy, value function and discriminator trained together.
pub struct AeirlAgent {
    structure: EnvStructure,
    policy: PolicyNetwork,
    value_fn: ValueNetwork,
    discriminator: Discriminator,
}

impl AeirlAgent {
    pub fn new(
        structure: &EnvStructure,
        config: &AgentConfig,
        rng: &mut Prng,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        let policy = PolicyNetwork::new(structure, &config.policy, rng);
        let value_fn = ValueNetwork::new(structure.observation_dim, &config.value, rng);
        let discriminator = Discriminator::new(structure, &config.discriminator, rng)?;
        Ok(Self {
            structure: *structure,
            policy,
            value_fn,
            discriminator,
        })
    }

    pub const fn policy(&self) -> &PolicyNetwork {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PolicyNetwork {
        &mut self.policy
    }

    pub const fn value_fn(&self) -> &ValueNetwork {
        &self.value_fn
    }

    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    /// Run one collect-and-update iteration.
    ///
    /// Rollouts come from the current policy. The per-step costs are the scores of the
    /// discriminator before its update. Then the discriminator, the value function and the
    /// policy are updated in that order, each from this iteration's data.
    pub fn train_iteration<E>(
        &mut self,
        env: &mut E,
        expert: &ExpertBuffer,
        config: &TrainConfig,
        rng: &mut Prng,
    ) -> Result<IterationStats, TrainError>
    where
        E: Environment + ?Sized,
    {
        let batch = rollout::collect(
            env,
            &mut self.policy,
            ActorMode::Training,
            config.num_steps_per_iter,
            config.horizon,
            rng,
        );
        let action_space = self.structure.action_space;
        let observations = observation_tensor(batch.observations(), self.structure.observation_dim);
        let action_features = action_space.batch_features(batch.actions());
        let actions = action_space.batch_repr(batch.actions());

        let costs = {
            let _no_grad = tch::no_grad_guard();
            to_f64_vec(&self.discriminator.score(&observations, &action_features))
        };
        let score_mean = costs.iter().copied().collect::<OnlineMeanVariance<f64>>().mean();

        let discriminator_loss = self.discriminator.update(
            &expert.observation_tensor(),
            &expert.action_features(),
            &observations,
            &action_features,
        )?;

        let mut targets = estimate_targets(
            &self.value_fn,
            &observations,
            &batch.episode_lengths(),
            &costs,
            config.gae_gamma,
            config.gae_lambda,
        );
        let value_step = update_value(&mut self.value_fn, &observations, &targets.returns, config)?;
        if config.normalize_advantage {
            normalize_advantages(&mut targets.advantages)?;
        }
        let advantages = targets.advantages.iter().copied().collect();
        let policy = update_policy(
            &mut self.policy,
            &observations,
            &actions,
            &targets.advantages,
            config,
        )?;

        Ok(IterationStats {
            num_steps: batch.num_steps(),
            num_episodes: batch.num_episodes(),
            reward_mean: batch.completed_reward_mean(),
            score_mean,
            discriminator_loss,
            advantages,
            value_step,
            policy,
        })
    }

    /// Train for `config.num_iters` iterations, logging every iteration and evaluation.
    pub fn train<E>(
        &mut self,
        env: &mut E,
        expert: &ExpertBuffer,
        config: &TrainConfig,
        run_log: &mut RunLog,
        rng: &mut Prng,
    ) -> Result<TrainSummary, TrainError>
    where
        E: Environment + ?Sized,
    {
        config.validate()?;
        let mut summary = TrainSummary {
            expert_reward_mean: expert.reward_mean(),
            iteration_reward_means: Vec::new(),
            evaluations: Vec::new(),
        };
        for i in 0..config.num_iters {
            let stats = self.train_iteration(env, expert, config, rng)?;
            log_iteration_stats(i, &stats);
            run_log.log_iteration(
                i,
                summary.expert_reward_mean,
                stats.policy.surrogate_after,
                stats.discriminator_loss,
            )?;
            summary.iteration_reward_means.push(stats.reward_mean);

            if config.is_eval_iteration(i) {
                let mean_return =
                    evaluate(&mut self.policy, env, config.nb_eval, config.nb_step_eval, rng);
                // Evaluation reseeds the environment; give training a fresh stream
                env.seed(rng.gen());
                info!("iteration {}: evaluation return {:.3}", i, mean_return);
                run_log.log_eval(i, mean_return)?;
                summary.evaluations.push((i, mean_return));
            }
        }
        Ok(summary)
    }
}

fn log_iteration_stats(iteration: u64, stats: &IterationStats) {
    info!(
        "iteration {}: {} steps in {} episodes, reward mean {}, disc loss {:.4}, surrogate {:.4}",
        iteration,
        stats.num_steps,
        stats.num_episodes,
        stats
            .reward_mean
            .map_or_else(|| "-".to_string(), |r| format!("{:.3}", r)),
        stats.discriminator_loss,
        stats.policy.surrogate_after,
    );
    debug!(
        "iteration {}: score mean {:.4}, advantage mean {:.4}, kl {:.3e}, entropy {:.4}, value step {:?}",
        iteration,
        stats.score_mean,
        stats.advantages.mean(),
        stats.policy.kl,
        stats.policy.entropy,
        stats.value_step
    );
    if !stats.policy.line_search.is_accepted() {
        warn!("iteration {}: policy parameters unchanged", iteration);
    }
}

/// Train an imitation policy for `env` from the demonstrations of `expert`.
///
/// The run's random state is seeded from `config.seed`. Expert data is collected once before
/// training with `config.num_steps_per_iter` steps and `config.expert_noise` noise.
pub fn train<E, X>(
    env: &mut E,
    expert: &mut X,
    config: &TrainConfig,
    agent_config: &AgentConfig,
    run_log: &mut RunLog,
) -> Result<TrainSummary, TrainError>
where
    E: Environment + ?Sized,
    X: Actor + ?Sized,
{
    config.validate()?;
    agent_config.validate()?;
    let mut rng = Prng::seed_from_u64(config.seed);
    env.seed(rng.gen());

    let expert_buffer = ExpertBuffer::collect(
        env,
        expert,
        config.num_steps_per_iter,
        config.horizon,
        config.expert_noise,
        &mut rng,
    )?;
    info!(
        "collected {} expert steps, reward mean {:?}",
        expert_buffer.len(),
        expert_buffer.reward_mean()
    );

    let mut agent = AeirlAgent::new(&env.structure(), agent_config, &mut rng)?;
    agent.train(env, &expert_buffer, config, run_log, &mut rng)
}

/// Run `num_runs` independent training runs in parallel threads.
///
/// Run `i` uses seed `config.seed + i`, its own environment `make_env(i)`,
/// its own expert `make_expert(i)` and logs to `<log_dir>/<run_prefix>_<i>[_eval].txt`.
/// All log files are created before any run starts.
/// At most `max_threads` runs execute at the same time.
#[allow(clippy::too_many_arguments)]
pub fn run_repetitions<E, X, FE, FX>(
    make_env: FE,
    make_expert: FX,
    config: &TrainConfig,
    agent_config: &AgentConfig,
    log_dir: &Path,
    run_prefix: &str,
    num_runs: usize,
    max_threads: usize,
) -> Result<Vec<TrainSummary>, TrainError>
where
    E: Environment,
    X: Actor,
    FE: Fn(usize) -> E + Sync,
    FX: Fn(usize) -> X + Sync,
{
    config.validate()?;
    agent_config.validate()?;
    let run_logs = (0..num_runs)
        .map(|i| RunLog::create(log_dir, &format!("{}_{}", run_prefix, i)))
        .collect::<Result<Vec<_>, _>>()?;
    for (i, run_log) in run_logs.iter().enumerate() {
        debug!(
            "run {} logs to {} and {}",
            i,
            run_log.iterations_path().display(),
            run_log.evaluations_path().display()
        );
    }

    let make_env = &make_env;
    let make_expert = &make_expert;
    let mut pending = run_logs.into_iter().enumerate();
    let mut results = Vec::with_capacity(num_runs);
    loop {
        let wave: Vec<_> = pending.by_ref().take(max_threads.max(1)).collect();
        let first_index = match wave.first() {
            Some((i, _)) => *i,
            None => break,
        };
        let wave_results = crossbeam::scope(|scope| {
            let threads: Vec<_> = wave
                .into_iter()
                .map(|(i, mut run_log)| {
                    let run_config = TrainConfig {
                        seed: config.seed.wrapping_add(i as u64),
                        ..config.clone()
                    };
                    let handle = scope.spawn(move |_| {
                        let mut env = make_env(i);
                        let mut expert = make_expert(i);
                        info!("starting run {} with seed {}", i, run_config.seed);
                        train(&mut env, &mut expert, &run_config, agent_config, &mut run_log)
                    });
                    (i, handle)
                })
                .collect();
            threads
                .into_iter()
                .map(|(index, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(TrainError::RepetitionPanicked { index }))
                })
                .collect::<Vec<_>>()
        })
        .map_err(|_| TrainError::RepetitionPanicked { index: first_index })?;
        results.extend(wave_results);
    }
    results.into_iter().collect()
}
