//! Training driver: iteration loop, linear discounting, periodic dumps and
//! resume.
//!
//! Every iteration draws its own RNG from `(seed, t)`, so which worker runs an
//! iteration never changes the cards it deals or the actions it samples.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::agent::{Agent, AgentSnapshot, Ledger, SharedAgent, DEFAULT_SHARDS};
use crate::cfr::{cfr, cfrp, lcfr_discount, update_strategy};
use crate::error::{PokerError, PokerResult};
use crate::state::PokerState;

/// Probability of running the pruned traversal once pruning is enabled.
const PRUNE_PROBABILITY: f64 = 0.95;

pub const AGENT_FILE: &str = "agent.json";
pub const SERVER_FILE: &str = "server.json";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Args, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Update the preflop strategy whenever iteration % strategy_interval == 0.
    #[arg(long, default_value_t = 20)]
    pub strategy_interval: u64,

    /// Total number of iterations.
    #[arg(long, default_value_t = 1500)]
    pub n_iterations: u64,

    /// Discounting only happens before this iteration.
    #[arg(long, default_value_t = 400)]
    pub lcfr_threshold: u64,

    /// Discount regret and strategy whenever iteration % discount_interval == 0.
    #[arg(long, default_value_t = 400)]
    pub discount_interval: u64,

    /// Pruned traversals are used after this iteration.
    #[arg(long, default_value_t = 400)]
    pub prune_threshold: u64,

    /// Regret floor below which pruned traversals skip an action.
    #[arg(long, default_value_t = -20000.0, allow_hyphen_values = true)]
    pub c: f64,

    #[arg(long, default_value_t = 2)]
    pub n_players: usize,

    /// Dump the current strategy whenever iteration % dump_iteration == 0.
    #[arg(long, default_value_t = 20)]
    pub dump_iteration: u64,

    /// Strategy updates and dumps start after this iteration.
    #[arg(long, default_value_t = 400)]
    pub update_threshold: u64,

    /// Starting stack of each player, in big blinds.
    #[arg(long, default_value_t = 300.0)]
    pub stack: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Worker threads sharing one agent.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Name of the run directory; a timestamp is used when omitted.
    #[arg(long)]
    pub nickname: Option<String>,

    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            strategy_interval: 20,
            n_iterations: 1500,
            lcfr_threshold: 400,
            discount_interval: 400,
            prune_threshold: 400,
            c: -20000.0,
            n_players: 2,
            dump_iteration: 20,
            update_threshold: 400,
            stack: 300.0,
            seed: 42,
            workers: 1,
            nickname: None,
            results_dir: PathBuf::from("results"),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> PokerResult<()> {
        if self.n_players != 2 {
            return Err(PokerError::UnsupportedPlayerCount(self.n_players));
        }
        for (name, value) in [
            ("strategy_interval", self.strategy_interval),
            ("discount_interval", self.discount_interval),
            ("dump_iteration", self.dump_iteration),
        ] {
            if value == 0 {
                return Err(PokerError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.stack < 1.0 {
            return Err(PokerError::InvalidConfig(format!(
                "stack of {} cannot cover the big blind",
                self.stack
            )));
        }
        Ok(())
    }

    fn is_dump(&self, t: u64) -> bool {
        t > self.update_threshold && t % self.dump_iteration == 0
    }

    fn is_discount(&self, t: u64) -> bool {
        t < self.lcfr_threshold && t % self.discount_interval == 0
    }
}

/// Everything needed to pick a run back up (`server.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    pub start_iteration: u64,
    pub agent_path: PathBuf,
    #[serde(flatten)]
    pub config: TrainConfig,
}

impl ServerState {
    pub fn load(path: &Path) -> PokerResult<Self> {
        if !path.is_file() {
            return Err(PokerError::SnapshotMissing(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> PokerResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Creates `results_dir/<nickname>` (or a timestamped name) and records the
/// configuration in it.
pub fn create_dir(config: &TrainConfig) -> PokerResult<PathBuf> {
    let name = match &config.nickname {
        Some(nickname) => nickname.clone(),
        None => {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            format!("run-{}", secs)
        }
    };
    let dir = config.results_dir.join(name);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(config)?)?;
    Ok(dir)
}

/// Folds the agent into the snapshot in `save_path` and records where to
/// resume from.
pub fn serialise(
    agent: &Agent<Action>,
    save_path: &Path,
    t: u64,
    config: &TrainConfig,
) -> PokerResult<()> {
    let agent_path = save_path.join(AGENT_FILE);
    let mut snapshot = AgentSnapshot::load_or_default(&agent_path, t)?;
    snapshot.accumulate(agent, t);
    snapshot.save(&agent_path)?;

    let server = ServerState {
        start_iteration: t + 1,
        agent_path: agent_path.clone(),
        config: config.clone(),
    };
    server.save(&save_path.join(SERVER_FILE))?;
    log::info!("{:<32}{:<32}", "saving      snapshot", agent_path.display());
    log::debug!("t={} {} info sets dumped", t, agent.n_info_sets());
    Ok(())
}

fn iteration_rng(seed: u64, t: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ t.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// One iteration `t`: for each seat, an optional strategy update followed by
/// a regret traversal on a freshly dealt hand.
pub fn run_iteration<L: Ledger<Action>>(
    ledger: &mut L,
    config: &TrainConfig,
    t: u64,
) -> PokerResult<()> {
    let mut rng = iteration_rng(config.seed, t);
    for i in 0..2 {
        let state = PokerState::new(config.stack, &mut rng)?;
        if t > config.update_threshold && t % config.strategy_interval == 0 {
            update_strategy(ledger, &state, i, t, &mut rng)?;
        }
        if t > config.prune_threshold && rng.gen::<f64>() < PRUNE_PROBABILITY {
            cfrp(ledger, &state, i, t, config.c, &mut rng)?;
        } else {
            cfr(ledger, &state, i, t, &mut rng)?;
        }
    }
    Ok(())
}

/// Runs iterations `start..=config.n_iterations` against `agent`, writing
/// snapshots into `save_path`.
pub fn train(
    config: &TrainConfig,
    save_path: &Path,
    agent: Agent<Action>,
    start: u64,
) -> PokerResult<Agent<Action>> {
    config.validate()?;
    log::info!(
        "{:<32}{:<32}",
        "training    iterations",
        format!("{}..={} on {} worker(s)", start, config.n_iterations, config.workers)
    );
    let agent = if config.workers > 1 {
        train_parallel(config, save_path, agent, start)?
    } else {
        train_serial(config, save_path, agent, start)?
    };
    log::info!(
        "{:<32}{:<32}",
        "finished    training",
        format!("{} info sets", agent.n_info_sets())
    );
    Ok(agent)
}

fn end_of_iteration<L: Ledger<Action>>(
    ledger: &mut L,
    config: &TrainConfig,
    save_path: &Path,
    t: u64,
) -> PokerResult<()> {
    lcfr_discount(ledger, t, config.lcfr_threshold, config.discount_interval);
    if config.is_dump(t) {
        serialise(&ledger.snapshot(), save_path, t, config)?;
    }
    Ok(())
}

fn train_serial(
    config: &TrainConfig,
    save_path: &Path,
    mut agent: Agent<Action>,
    start: u64,
) -> PokerResult<Agent<Action>> {
    for t in start..=config.n_iterations {
        run_iteration(&mut agent, config, t)?;
        end_of_iteration(&mut agent, config, save_path, t)?;
        if t % 100 == 0 {
            log::info!("{:<32}{:<32}", "iteration", t);
        }
    }
    Ok(agent)
}

/// Workers run whole iterations in parallel between the iterations that
/// discount or dump, which run once every earlier iteration has finished.
fn train_parallel(
    config: &TrainConfig,
    save_path: &Path,
    agent: Agent<Action>,
    start: u64,
) -> PokerResult<Agent<Action>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()?;
    let shared = SharedAgent::from_agent(agent, DEFAULT_SHARDS);

    let mut lo = start;
    while lo <= config.n_iterations {
        let hi = (lo..=config.n_iterations)
            .find(|&t| config.is_dump(t) || config.is_discount(t))
            .unwrap_or(config.n_iterations);
        pool.install(|| {
            (lo..=hi).into_par_iter().try_for_each(|t| {
                let mut handle = &shared;
                run_iteration(&mut handle, config, t)
            })
        })?;
        let mut handle = &shared;
        end_of_iteration(&mut handle, config, save_path, hi)?;
        log::debug!("iterations {}..={} done", lo, hi);
        lo = hi + 1;
    }
    Ok(shared.into_agent())
}

/// Starts a new run in its own directory.
pub fn start(config: &TrainConfig) -> PokerResult<Agent<Action>> {
    config.validate()?;
    let save_path = create_dir(config)?;
    log::info!("{:<32}{:<32}", "created     run directory", save_path.display());
    train(config, &save_path, Agent::new(), 1)
}

/// Continues the run described by a `server.json` written by `serialise`.
pub fn resume(server_path: &Path) -> PokerResult<Agent<Action>> {
    let server = ServerState::load(server_path)?;
    log::info!("{:<32}{:<32}", "loading     snapshot", server.agent_path.display());
    let snapshot = AgentSnapshot::load(&server.agent_path)?;
    let save_path = server
        .agent_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    train(
        &server.config,
        &save_path,
        snapshot.to_agent(),
        server.start_iteration,
    )
}
