//! Immutable heads-up betting state.
//!
//! A `PokerState` is a snapshot between two decisions. `apply_action` never
//! touches `self`; it returns the next snapshot. The deck and the action
//! history are shared between a state and all of its descendants, so
//! branching during tree search only copies a handful of scalars.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use rand::Rng;

use crate::actions::Action;
use crate::betting::{BettingEngine, Player, BIG_BLIND, SMALL_BLIND};
use crate::cards::{Card, Deck};
use crate::cfr::Game;
use crate::error::{PokerError, PokerResult};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Terminal,
}

impl Stage {
    /// The street that follows a closed betting round.
    pub fn next(self) -> Stage {
        match self {
            Stage::Preflop => Stage::Flop,
            Stage::Flop => Stage::Turn,
            Stage::Turn => Stage::River,
            Stage::River | Stage::Showdown => Stage::Showdown,
            Stage::Terminal => Stage::Terminal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preflop => "preflop",
            Stage::Flop => "flop",
            Stage::Turn => "turn",
            Stage::River => "river",
            Stage::Showdown => "showdown",
            Stage::Terminal => "terminal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct HistoryNode {
    stage: Stage,
    action: Action,
    prev: History,
}

/// Persistent list of `(stage, action)` pairs, newest first. Pushing shares
/// the tail with the parent.
#[derive(Debug, Clone, Default)]
pub struct History(Option<Arc<HistoryNode>>);

impl History {
    pub fn push(&self, stage: Stage, action: Action) -> History {
        History(Some(Arc::new(HistoryNode {
            stage,
            action,
            prev: self.clone(),
        })))
    }

    pub fn len(&self) -> usize {
        self.iter_rev().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    fn iter_rev(&self) -> impl Iterator<Item = (Stage, Action)> + '_ {
        std::iter::successors(self.0.as_deref(), |node| node.prev.0.as_deref())
            .map(|node| (node.stage, node.action))
    }

    /// Actions oldest first.
    pub fn to_vec(&self) -> Vec<(Stage, Action)> {
        let mut items: Vec<_> = self.iter_rev().collect();
        items.reverse();
        items
    }

    /// Actions grouped by the street they were taken on, streets in order.
    pub fn by_stage(&self) -> Vec<(Stage, Vec<Action>)> {
        let items = self.to_vec();
        let streets = items.into_iter().chunk_by(|&(stage, _)| stage);
        let grouped = streets
            .into_iter()
            .map(|(stage, group)| (stage, group.map(|(_, a)| a).collect()))
            .collect();
        grouped
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        self.iter_rev().eq(other.iter_rev())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PokerState {
    engine: BettingEngine,
    /// Chips each seat has put in during the current street.
    current_bets: [f64; 2],
    history: History,
    stage: Stage,
    player_i: usize,
    n_actions: usize,
    initial_stack: f64,
}

impl PokerState {
    /// A new hand with a freshly shuffled deck; both seats start with
    /// `n_bigblinds`.
    pub fn new<R: Rng + ?Sized>(n_bigblinds: f64, rng: &mut R) -> PokerResult<PokerState> {
        PokerState::from_deck(n_bigblinds, Deck::shuffled(rng))
    }

    /// A new hand dealt from `deck` in order.
    pub fn from_deck(n_bigblinds: f64, deck: Deck) -> PokerResult<PokerState> {
        let engine = BettingEngine::new([n_bigblinds; 2], deck)?;
        Ok(PokerState {
            engine,
            current_bets: [SMALL_BLIND, BIG_BLIND],
            history: History::default(),
            stage: Stage::Preflop,
            player_i: 0,
            n_actions: 0,
            initial_stack: n_bigblinds,
        })
    }

    pub fn players(&self) -> &[Player; 2] {
        self.engine.players()
    }

    pub fn pot(&self) -> f64 {
        self.engine.pot()
    }

    pub fn board(&self) -> &[Card] {
        self.engine.board()
    }

    pub fn current_bets(&self) -> [f64; 2] {
        self.current_bets
    }

    pub fn betting_stage(&self) -> Stage {
        self.stage
    }

    pub fn player_i(&self) -> usize {
        self.player_i
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, Stage::Showdown | Stage::Terminal)
    }

    /// Chips won (positive) or lost (negative) by `player` relative to the
    /// start of the hand.
    pub fn payout(&self, player: usize) -> f64 {
        self.engine.players()[player].stack - self.initial_stack
    }

    /// Betting history as `stage:action,action|stage:action`; empty at the
    /// root.
    pub fn info_set(&self) -> String {
        self.history
            .by_stage()
            .iter()
            .map(|(stage, actions)| format!("{}:{}", stage, actions.iter().join(",")))
            .join("|")
    }

    pub fn legal_actions(&self) -> Vec<Action> {
        let me = self.player_i;
        let actor = &self.engine.players()[me];
        if !actor.is_active {
            return vec![Action::Pass];
        }
        if self.is_terminal() {
            return Vec::new();
        }

        let pot = self.engine.pot();
        let opponent = &self.engine.players()[1 - me];
        let affordable = |m: f64| m * pot <= actor.stack + EPSILON;
        let lifts_above = |m: f64| {
            self.current_bets[me] + m * pot > self.current_bets[1 - me] + EPSILON
                && opponent.stack > EPSILON
        };
        let raises = Action::all_raises().filter(|a| {
            a.multiplier()
                .map_or(false, |m| affordable(m) && lifts_above(m))
        });

        let mut actions = Vec::with_capacity(8);
        if self.stage == Stage::Preflop && self.current_bets == [BIG_BLIND, BIG_BLIND] {
            actions.push(Action::Check);
            actions.extend(raises);
        } else if self.current_bets == [0.0, 0.0] {
            actions.push(Action::Check);
            actions.extend(
                Action::all_bets().filter(|a| a.multiplier().map_or(false, affordable)),
            );
        } else {
            actions.push(Action::Fold);
            actions.push(Action::Call);
            actions.extend(raises);
        }
        actions
    }

    pub fn apply_action(&self, action: Action) -> PokerResult<PokerState> {
        let legal = self.legal_actions();
        if !legal.contains(&action) {
            return Err(PokerError::IllegalAction {
                action: action.to_string(),
                stage: self.stage.to_string(),
                legal: legal.iter().join(", "),
            });
        }

        let me = self.player_i;
        let other = 1 - me;
        let mut next = self.clone();
        match action {
            Action::Fold => next.engine.fold(me),
            Action::Check | Action::Pass => {}
            Action::Call => {
                let owed = self.current_bets[other] - self.current_bets[me];
                next.current_bets[me] += next.engine.commit(me, owed);
            }
            Action::Bet(_) | Action::Raise(_) => {
                let amount = action.multiplier().unwrap_or(0.0) * self.engine.pot();
                next.current_bets[me] += next.engine.commit(me, amount);
            }
        }
        next.history = self.history.push(self.stage, action);
        next.n_actions += 1;

        if next.engine.n_active_players() == 1 {
            next.stage = Stage::Terminal;
            next.player_i = other;
            next.engine.run_out_board()?;
            next.engine.compute_winners()?;
            return Ok(next);
        }

        let bets_equal = (next.current_bets[0] - next.current_bets[1]).abs() < EPSILON;
        let round_closed = next.n_actions >= 2 && (action == Action::Call || bets_equal);
        if !round_closed {
            next.player_i = other;
            return Ok(next);
        }

        if next.engine.players().iter().any(Player::is_all_in) {
            next.engine.run_out_board()?;
            next.stage = Stage::Showdown;
        } else {
            next.stage = self.stage.next();
            match next.stage {
                Stage::Flop => next.engine.deal_flop()?,
                Stage::Turn => next.engine.deal_turn()?,
                Stage::River => next.engine.deal_river()?,
                _ => {}
            }
        }
        next.current_bets = [0.0, 0.0];
        next.n_actions = 0;
        next.player_i = 1;
        if next.stage == Stage::Showdown {
            next.engine.compute_winners()?;
        }
        log::trace!("{} -> {} after {}", self.stage, next.stage, action);
        Ok(next)
    }
}

impl Game for PokerState {
    type Action = Action;

    fn is_terminal(&self) -> bool {
        PokerState::is_terminal(self)
    }

    fn is_active(&self, player: usize) -> bool {
        self.engine.players()[player].is_active
    }

    fn player_to_act(&self) -> usize {
        self.player_i
    }

    fn is_opening_round(&self) -> bool {
        self.stage == Stage::Preflop
    }

    fn legal_actions(&self) -> Vec<Action> {
        PokerState::legal_actions(self)
    }

    fn apply_action(&self, action: Action) -> PokerResult<Self> {
        PokerState::apply_action(self, action)
    }

    fn info_set(&self) -> String {
        PokerState::info_set(self)
    }

    fn payout(&self, player: usize) -> f64 {
        PokerState::payout(self, player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{BetSize, RaiseSize};

    fn fresh() -> PokerState {
        PokerState::from_deck(100.0, Deck::new()).unwrap()
    }

    #[test]
    fn root_info_set_is_empty() {
        assert_eq!(fresh().info_set(), "");
    }

    #[test]
    fn info_set_groups_by_street() {
        let s = fresh()
            .apply_action(Action::Call)
            .unwrap()
            .apply_action(Action::Check)
            .unwrap()
            .apply_action(Action::Check)
            .unwrap()
            .apply_action(Action::Bet(BetSize::Pot))
            .unwrap();
        assert_eq!(s.info_set(), "preflop:call,check|flop:check,bet_100");
    }

    #[test]
    fn history_is_shared_not_copied() {
        let parent = fresh().apply_action(Action::Call).unwrap();
        let a = parent.apply_action(Action::Check).unwrap();
        let b = parent.apply_action(Action::Raise(RaiseSize::Double)).unwrap();
        assert_eq!(parent.history().len(), 1);
        assert_eq!(a.history().len(), 2);
        assert_ne!(a.history(), b.history());
        assert_eq!(parent.info_set(), "preflop:call");
    }

    #[test]
    fn raise_must_exceed_opponent_commitment() {
        let s = fresh()
            .apply_action(Action::Call)
            .unwrap()
            .apply_action(Action::Raise(RaiseSize::Double))
            .unwrap();
        // 1 + 2/3 * 6 only matches the 5 already committed.
        assert!(!s.legal_actions().contains(&Action::Raise(RaiseSize::TwoThirds)));
        assert!(s.legal_actions().contains(&Action::Raise(RaiseSize::OneAndHalf)));
    }

    #[test]
    fn unaffordable_sizes_are_not_offered() {
        let s = PokerState::from_deck(3.0, Deck::new()).unwrap();
        // Pot 1.5, small blind has 2.5 behind.
        let legal = s.legal_actions();
        assert!(legal.contains(&Action::Raise(RaiseSize::OneAndHalf)));
        assert!(!legal.contains(&Action::Raise(RaiseSize::Double)));
    }

    #[test]
    fn stage_order() {
        assert_eq!(Stage::Preflop.next(), Stage::Flop);
        assert_eq!(Stage::River.next(), Stage::Showdown);
        assert_eq!(Stage::Terminal.next(), Stage::Terminal);
    }
}
