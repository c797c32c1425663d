//! Monte Carlo CFR with outcome sampling on the opponent's decisions.
//!
//! The traverser enumerates every one of its own actions; the opponent's
//! action is sampled from its current regret-matched strategy. Regrets are
//! written only after every child has returned successfully, so an error in a
//! subtree leaves the info set untouched.

use std::collections::BTreeMap;
use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::agent::Ledger;
use crate::error::{PokerError, PokerResult};

/// A two-player, perfect-recall game the engine can traverse.
pub trait Game: Sized {
    type Action: Copy + Ord + fmt::Debug;

    fn is_terminal(&self) -> bool;
    /// False once `player` has folded.
    fn is_active(&self, player: usize) -> bool;
    fn player_to_act(&self) -> usize;
    /// Whether strategy counting still applies (preflop in hold'em).
    fn is_opening_round(&self) -> bool;
    fn legal_actions(&self) -> Vec<Self::Action>;
    fn apply_action(&self, action: Self::Action) -> PokerResult<Self>;
    /// Key identifying what the player to act knows.
    fn info_set(&self) -> String;
    fn payout(&self, player: usize) -> f64;
}

/// Regret matching: positive regrets normalized, uniform if none are positive.
pub fn calculate_strategy<A: Ord + Copy>(regrets: &BTreeMap<A, f64>) -> BTreeMap<A, f64> {
    let positive_sum: f64 = regrets.values().map(|&r| r.max(0.0)).sum();
    if positive_sum > 0.0 {
        regrets
            .iter()
            .map(|(&a, &r)| (a, r.max(0.0) / positive_sum))
            .collect()
    } else {
        let p = 1.0 / regrets.len() as f64;
        regrets.keys().map(|&a| (a, p)).collect()
    }
}

/// A validated probability distribution over actions.
pub struct ActionDistribution<A> {
    actions: Vec<A>,
    index: WeightedIndex<f64>,
}

impl<A: Copy> ActionDistribution<A> {
    pub fn new(strategy: &BTreeMap<A, f64>) -> PokerResult<Self> {
        let sum: f64 = strategy.values().sum();
        if strategy.values().any(|&p| p < 0.0 || !p.is_finite()) || (sum - 1.0).abs() > 1e-6 {
            return Err(PokerError::InvalidDistribution(sum));
        }
        let index = WeightedIndex::new(strategy.values().copied())
            .map_err(|_| PokerError::InvalidDistribution(sum))?;
        Ok(ActionDistribution {
            actions: strategy.keys().copied().collect(),
            index,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> A {
        self.actions[self.index.sample(rng)]
    }
}

fn sample_action<G, L, R>(ledger: &mut L, state: &G, rng: &mut R) -> PokerResult<G::Action>
where
    G: Game,
    L: Ledger<G::Action>,
    R: Rng + ?Sized,
{
    let actions = state.legal_actions();
    let sigma = calculate_strategy(&ledger.regrets(&state.info_set(), &actions));
    Ok(ActionDistribution::new(&sigma)?.sample(rng))
}

/// Expected value of `state` for player `i`, updating `i`'s regrets along
/// the way.
pub fn cfr<G, L, R>(ledger: &mut L, state: &G, i: usize, t: u64, rng: &mut R) -> PokerResult<f64>
where
    G: Game,
    L: Ledger<G::Action>,
    R: Rng + ?Sized,
{
    if state.is_terminal() || !state.is_active(i) {
        return Ok(state.payout(i));
    }
    if state.player_to_act() != i {
        let action = sample_action(ledger, state, rng)?;
        return cfr(ledger, &state.apply_action(action)?, i, t, rng);
    }

    let info_set = state.info_set();
    let actions = state.legal_actions();
    let sigma = calculate_strategy(&ledger.regrets(&info_set, &actions));

    let mut vo = 0.0;
    let mut voa = BTreeMap::new();
    for &action in &actions {
        let value = cfr(ledger, &state.apply_action(action)?, i, t, rng)?;
        vo += sigma.get(&action).copied().unwrap_or(0.0) * value;
        voa.insert(action, value);
    }
    let deltas: BTreeMap<_, _> = voa.into_iter().map(|(a, v)| (a, v - vo)).collect();
    ledger.accumulate_regrets(&info_set, &deltas);
    log::trace!("t={} {:?} vo={:.3}", t, info_set, vo);
    Ok(vo)
}

/// `cfr` that does not descend into the traverser's actions whose regret has
/// fallen below `c`.
pub fn cfrp<G, L, R>(
    ledger: &mut L,
    state: &G,
    i: usize,
    t: u64,
    c: f64,
    rng: &mut R,
) -> PokerResult<f64>
where
    G: Game,
    L: Ledger<G::Action>,
    R: Rng + ?Sized,
{
    if state.is_terminal() || !state.is_active(i) {
        return Ok(state.payout(i));
    }
    if state.player_to_act() != i {
        let action = sample_action(ledger, state, rng)?;
        return cfrp(ledger, &state.apply_action(action)?, i, t, c, rng);
    }

    let info_set = state.info_set();
    let actions = state.legal_actions();
    let regrets = ledger.regrets(&info_set, &actions);
    let sigma = calculate_strategy(&regrets);

    let mut vo = 0.0;
    let mut explored = BTreeMap::new();
    for &action in &actions {
        if regrets.get(&action).copied().unwrap_or(0.0) < c {
            continue;
        }
        let value = cfrp(ledger, &state.apply_action(action)?, i, t, c, rng)?;
        vo += sigma.get(&action).copied().unwrap_or(0.0) * value;
        explored.insert(action, value);
    }
    let deltas: BTreeMap<_, _> = explored.into_iter().map(|(a, v)| (a, v - vo)).collect();
    ledger.accumulate_regrets(&info_set, &deltas);
    Ok(vo)
}

/// Adds sampled opening-round actions of player `i` to the cumulative
/// strategy, exploring every opponent reply.
pub fn update_strategy<G, L, R>(
    ledger: &mut L,
    state: &G,
    i: usize,
    t: u64,
    rng: &mut R,
) -> PokerResult<()>
where
    G: Game,
    L: Ledger<G::Action>,
    R: Rng + ?Sized,
{
    if state.is_terminal() || !state.is_active(i) || !state.is_opening_round() {
        return Ok(());
    }
    if state.player_to_act() == i {
        let info_set = state.info_set();
        let actions = state.legal_actions();
        let sigma = calculate_strategy(&ledger.regrets(&info_set, &actions));
        let action = ActionDistribution::new(&sigma)?.sample(rng);
        let next = state.apply_action(action)?;
        ledger.increment_strategy(&info_set, &actions, action);
        update_strategy(ledger, &next, i, t, rng)
    } else {
        for action in state.legal_actions() {
            update_strategy(ledger, &state.apply_action(action)?, i, t, rng)?;
        }
        Ok(())
    }
}

/// Linear CFR weight `(t/interval) / (t/interval + 1)`.
pub fn discount_factor(t: u64, interval: u64) -> f64 {
    let x = t as f64 / interval as f64;
    x / (x + 1.0)
}

/// Discounts the ledger when `t` is inside the linear-CFR window and on the
/// interval; returns the factor applied.
pub fn lcfr_discount<A: Ord, L: Ledger<A>>(
    ledger: &mut L,
    t: u64,
    lcfr_threshold: u64,
    discount_interval: u64,
) -> Option<f64> {
    if discount_interval == 0 || t >= lcfr_threshold || t % discount_interval != 0 {
        return None;
    }
    let d = discount_factor(t, discount_interval);
    ledger.discount(d);
    log::debug!("t={} discounted regrets and strategy by {:.4}", t, d);
    Some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn regrets(values: &[f64]) -> BTreeMap<usize, f64> {
        values.iter().copied().enumerate().collect()
    }

    #[test]
    fn strategy_is_proportional_to_positive_regret() {
        let s = calculate_strategy(&regrets(&[3.0, 1.0, -4.0]));
        assert_relative_eq!(s[&0], 0.75);
        assert_relative_eq!(s[&1], 0.25);
        assert_relative_eq!(s[&2], 0.0);
    }

    #[test]
    fn non_positive_regret_is_uniform() {
        let s = calculate_strategy(&regrets(&[0.0, -1.0, -2.0, -3.0]));
        assert!(s.values().all(|&p| p == 0.25));
    }

    #[test]
    fn distribution_rejects_bad_weights() {
        assert!(ActionDistribution::new(&regrets(&[0.5, 0.6])).is_err());
        assert!(ActionDistribution::new(&regrets(&[1.5, -0.5])).is_err());
        assert!(ActionDistribution::<usize>::new(&BTreeMap::new()).is_err());
    }

    #[test]
    fn distribution_samples_only_supported_actions() {
        let dist = ActionDistribution::new(&regrets(&[0.0, 1.0, 0.0])).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(dist.sample(&mut rng), 1);
        }
    }

    #[test]
    fn discount_factor_values() {
        assert_relative_eq!(discount_factor(400, 400), 0.5);
        assert_relative_eq!(discount_factor(800, 400), 2.0 / 3.0);
    }
}
