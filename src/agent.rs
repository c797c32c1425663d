//! Regret and strategy tables, keyed by information set.
//!
//! `Agent` is the single-threaded store. `SharedAgent` splits the same tables
//! across mutex-guarded stripes so several workers can train against it; a
//! table-wide gate is held shared for per-key work and exclusively while the
//! whole table is discounted or copied out.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::cfr::calculate_strategy;
use crate::error::{PokerError, PokerResult};

/// Per-action values at every information set seen so far.
pub type Table<A> = HashMap<String, BTreeMap<A, f64>>;

/// Store API used by the CFR traversals. Each call is atomic with respect to
/// the info set it touches.
pub trait Ledger<A: Ord> {
    /// Regrets at `info_set`, creating zero entries for any of `actions` not
    /// seen before.
    fn regrets(&mut self, info_set: &str, actions: &[A]) -> BTreeMap<A, f64>;

    /// Adds `deltas` to the regrets at `info_set`.
    fn accumulate_regrets(&mut self, info_set: &str, deltas: &BTreeMap<A, f64>);

    /// Counts one more visit of `action` at `info_set`.
    fn increment_strategy(&mut self, info_set: &str, actions: &[A], action: A);

    /// Multiplies every stored regret and strategy count by `factor`.
    fn discount(&mut self, factor: f64);

    /// A consistent copy of both tables.
    fn snapshot(&mut self) -> Agent<A>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent<A: Ord> {
    pub regret: Table<A>,
    /// Cumulative counts of sampled opening-round actions.
    pub strategy: Table<A>,
}

impl<A: Ord> Default for Agent<A> {
    fn default() -> Self {
        Agent {
            regret: HashMap::new(),
            strategy: HashMap::new(),
        }
    }
}

impl<A: Ord + Copy> Agent<A> {
    pub fn new() -> Self {
        Agent::default()
    }

    pub fn n_info_sets(&self) -> usize {
        self.regret.len()
    }

    /// Each info set's cumulative strategy normalized to probabilities.
    pub fn average_strategy(&self) -> BTreeMap<String, BTreeMap<A, f64>> {
        normalize_table(&self.strategy)
    }

    fn absorb(&mut self, other: Agent<A>) {
        self.regret.extend(other.regret);
        self.strategy.extend(other.strategy);
    }
}

fn entry_with_defaults<'a, A: Ord + Copy>(
    table: &'a mut Table<A>,
    info_set: &str,
    actions: &[A],
) -> &'a mut BTreeMap<A, f64> {
    let row = table.entry(info_set.to_string()).or_default();
    for &action in actions {
        row.entry(action).or_insert(0.0);
    }
    row
}

impl<A: Ord + Copy> Ledger<A> for Agent<A> {
    fn regrets(&mut self, info_set: &str, actions: &[A]) -> BTreeMap<A, f64> {
        let row = entry_with_defaults(&mut self.regret, info_set, actions);
        actions
            .iter()
            .map(|a| (*a, row.get(a).copied().unwrap_or(0.0)))
            .collect()
    }

    fn accumulate_regrets(&mut self, info_set: &str, deltas: &BTreeMap<A, f64>) {
        let row = self.regret.entry(info_set.to_string()).or_default();
        for (&action, &delta) in deltas {
            *row.entry(action).or_insert(0.0) += delta;
        }
    }

    fn increment_strategy(&mut self, info_set: &str, actions: &[A], action: A) {
        let row = entry_with_defaults(&mut self.strategy, info_set, actions);
        *row.entry(action).or_insert(0.0) += 1.0;
    }

    fn discount(&mut self, factor: f64) {
        for row in self.regret.values_mut().chain(self.strategy.values_mut()) {
            for value in row.values_mut() {
                *value *= factor;
            }
        }
    }

    fn snapshot(&mut self) -> Agent<A> {
        self.clone()
    }
}

/// Lock-striped agent shared by training workers. Use it through `&SharedAgent`,
/// which implements `Ledger`.
#[derive(Debug)]
pub struct SharedAgent<A: Ord> {
    shards: Vec<Mutex<Agent<A>>>,
    gate: RwLock<()>,
}

pub const DEFAULT_SHARDS: usize = 64;

fn shard_of(info_set: &str, n_shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    info_set.hash(&mut hasher);
    (hasher.finish() % n_shards as u64) as usize
}

impl<A: Ord + Copy> SharedAgent<A> {
    pub fn new(n_shards: usize) -> Self {
        SharedAgent::from_agent(Agent::new(), n_shards)
    }

    /// Spreads an existing agent's tables over `n_shards` stripes.
    pub fn from_agent(agent: Agent<A>, n_shards: usize) -> Self {
        let n_shards = n_shards.max(1);
        let mut parts: Vec<Agent<A>> = (0..n_shards).map(|_| Agent::new()).collect();
        for (info_set, row) in agent.regret {
            parts[shard_of(&info_set, n_shards)].regret.insert(info_set, row);
        }
        for (info_set, row) in agent.strategy {
            parts[shard_of(&info_set, n_shards)].strategy.insert(info_set, row);
        }
        SharedAgent {
            shards: parts.into_iter().map(Mutex::new).collect(),
            gate: RwLock::new(()),
        }
    }

    pub fn into_agent(self) -> Agent<A> {
        let mut agent = Agent::new();
        for shard in self.shards {
            agent.absorb(shard.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
        agent
    }

    pub fn n_shards(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, info_set: &str) -> MutexGuard<'_, Agent<A>> {
        self.shards[shard_of(info_set, self.shards.len())]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_shard<T>(&self, info_set: &str, f: impl FnOnce(&mut Agent<A>) -> T) -> T {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let mut shard = self.shard(info_set);
        f(&mut *shard)
    }
}

impl<A: Ord + Copy> Ledger<A> for &SharedAgent<A> {
    fn regrets(&mut self, info_set: &str, actions: &[A]) -> BTreeMap<A, f64> {
        self.with_shard(info_set, |agent| agent.regrets(info_set, actions))
    }

    fn accumulate_regrets(&mut self, info_set: &str, deltas: &BTreeMap<A, f64>) {
        self.with_shard(info_set, |agent| agent.accumulate_regrets(info_set, deltas))
    }

    fn increment_strategy(&mut self, info_set: &str, actions: &[A], action: A) {
        self.with_shard(info_set, |agent| {
            agent.increment_strategy(info_set, actions, action)
        })
    }

    fn discount(&mut self, factor: f64) {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        for shard in &self.shards {
            shard
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .discount(factor);
        }
    }

    fn snapshot(&mut self) -> Agent<A> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let mut agent = Agent::new();
        for shard in &self.shards {
            agent.absorb(shard.lock().unwrap_or_else(PoisonError::into_inner).clone());
        }
        agent
    }
}

/// Rows scaled to sum to one; an all-zero row becomes uniform.
pub fn normalize_table<'a, A, I>(table: I) -> BTreeMap<String, BTreeMap<A, f64>>
where
    A: Ord + Copy + 'a,
    I: IntoIterator<Item = (&'a String, &'a BTreeMap<A, f64>)>,
{
    table
        .into_iter()
        .map(|(info_set, row)| {
            let total: f64 = row.values().sum();
            let probs = row
                .iter()
                .map(|(&a, &v)| {
                    let p = if total > 0.0 {
                        v / total
                    } else {
                        1.0 / row.len() as f64
                    };
                    (a, p)
                })
                .collect();
            (info_set.clone(), probs)
        })
        .collect()
}

/// On-disk form of a training run's agent (`agent.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub regret: BTreeMap<String, BTreeMap<Action, f64>>,
    /// Running sum of the regret-matched strategy at every dump.
    pub strategy: BTreeMap<String, BTreeMap<Action, f64>>,
    /// Cumulative opening-round action counts.
    pub preflop_strategy: BTreeMap<String, BTreeMap<Action, f64>>,
    pub timestep: u64,
}

impl AgentSnapshot {
    pub fn load(path: &Path) -> PokerResult<Self> {
        if !path.is_file() {
            return Err(PokerError::SnapshotMissing(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// The snapshot at `path`, or an empty one stamped `timestep` if nothing
    /// has been written yet.
    pub fn load_or_default(path: &Path, timestep: u64) -> PokerResult<Self> {
        match AgentSnapshot::load(path) {
            Err(PokerError::SnapshotMissing(_)) => Ok(AgentSnapshot {
                timestep,
                ..AgentSnapshot::default()
            }),
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> PokerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Folds the agent's current regret-matched strategy into the running
    /// total and replaces the stored regret and preflop counts.
    pub fn accumulate(&mut self, agent: &Agent<Action>, t: u64) {
        let mut info_sets: Vec<&String> = agent.regret.keys().collect();
        info_sets.sort();
        for info_set in info_sets {
            let sigma = calculate_strategy(&agent.regret[info_set]);
            let running = self.strategy.entry(info_set.clone()).or_default();
            for (action, p) in sigma {
                *running.entry(action).or_insert(0.0) += p;
            }
        }
        self.regret = agent.regret.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.preflop_strategy = agent
            .strategy
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.timestep = t;
    }

    /// A training agent restored from the stored regret and preflop counts.
    pub fn to_agent(&self) -> Agent<Action> {
        Agent {
            regret: self.regret.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            strategy: self
                .preflop_strategy
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regrets_default_to_zero_over_actions() {
        let mut agent: Agent<Action> = Agent::new();
        let r = agent.regrets("", &[Action::Fold, Action::Call]);
        assert_eq!(r.len(), 2);
        assert!(r.values().all(|&v| v == 0.0));
        assert_eq!(agent.n_info_sets(), 1);
    }

    #[test]
    fn accumulate_and_discount() {
        let mut agent: Agent<Action> = Agent::new();
        let mut deltas = BTreeMap::new();
        deltas.insert(Action::Call, 4.0);
        agent.accumulate_regrets("x", &deltas);
        agent.accumulate_regrets("x", &deltas);
        agent.increment_strategy("x", &[Action::Call, Action::Fold], Action::Call);
        agent.discount(0.5);
        assert_eq!(agent.regret["x"][&Action::Call], 4.0);
        assert_eq!(agent.strategy["x"][&Action::Call], 0.5);
        assert_eq!(agent.strategy["x"][&Action::Fold], 0.0);
    }

    #[test]
    fn shared_agent_round_trips_through_shards() {
        let mut agent: Agent<Action> = Agent::new();
        for key in ["a", "b", "c", "preflop:call"] {
            agent.increment_strategy(key, &[Action::Check], Action::Check);
            agent.regrets(key, &[Action::Check]);
        }
        let shared = SharedAgent::from_agent(agent.clone(), 3);
        assert_eq!(shared.n_shards(), 3);
        let mut handle = &shared;
        assert_eq!(handle.snapshot(), agent);
        assert_eq!(shared.into_agent(), agent);
    }

    #[test]
    fn shared_agent_is_usable_from_threads() {
        let shared: SharedAgent<Action> = SharedAgent::new(8);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut handle = &shared;
                    for _ in 0..100 {
                        handle.increment_strategy("k", &[Action::Call], Action::Call);
                    }
                });
            }
        });
        let agent = shared.into_agent();
        assert_eq!(agent.strategy["k"][&Action::Call], 400.0);
    }

    #[test]
    fn normalize_handles_empty_counts() {
        let mut agent: Agent<Action> = Agent::new();
        agent.increment_strategy("k", &[Action::Fold, Action::Call], Action::Call);
        agent.increment_strategy("z", &[Action::Fold, Action::Call], Action::Call);
        if let Some(row) = agent.strategy.get_mut("z") {
            row.insert(Action::Call, 0.0);
        }
        let avg = agent.average_strategy();
        assert_eq!(avg["k"][&Action::Call], 1.0);
        assert_eq!(avg["z"][&Action::Fold], 0.5);
    }
}
