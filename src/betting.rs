//! Chips and cards for a single heads-up hand.
//!
//! Seat 0 posts the small blind and seat 1 the big blind. The engine owns the
//! deck for the lifetime of the hand; it is shared behind an `Arc` so copying
//! the engine into a new snapshot never copies the cards.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cards::{Card, Deck};
use crate::error::PokerResult;
use crate::hand_evaluator::compare_hands;

pub const SMALL_BLIND: f64 = 0.5;
pub const BIG_BLIND: f64 = 1.0;
pub const BOARD_SIZE: usize = 5;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    /// Chips behind, in big blinds.
    pub stack: f64,
    pub cards: [Card; 2],
    pub is_active: bool,
}

impl Player {
    pub fn is_all_in(&self) -> bool {
        self.is_active && self.stack <= EPSILON
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BettingEngine {
    players: [Player; 2],
    pot: f64,
    /// Chips each seat has put in over the whole hand.
    contributed: [f64; 2],
    deck: Arc<Deck>,
    next_card: usize,
    board: Vec<Card>,
}

impl BettingEngine {
    /// Deals two private cards to each seat, alternating starting with seat 0,
    /// and posts the blinds.
    pub fn new(stacks: [f64; 2], deck: Deck) -> PokerResult<Self> {
        let deck = Arc::new(deck);
        let cards = [
            [deck.card(0)?, deck.card(2)?],
            [deck.card(1)?, deck.card(3)?],
        ];
        let players = [0, 1].map(|i| Player {
            stack: stacks[i],
            cards: cards[i],
            is_active: true,
        });
        let mut engine = BettingEngine {
            players,
            pot: 0.0,
            contributed: [0.0; 2],
            deck,
            next_card: 4,
            board: Vec::with_capacity(BOARD_SIZE),
        };
        engine.commit(0, SMALL_BLIND);
        engine.commit(1, BIG_BLIND);
        Ok(engine)
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn pot(&self) -> f64 {
        self.pot
    }

    pub fn board(&self) -> &[Card] {
        &self.board
    }

    pub fn n_active_players(&self) -> usize {
        self.players.iter().filter(|p| p.is_active).count()
    }

    /// Players that are still in the hand and have chips left to bet.
    pub fn n_players_with_moves(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.is_active && !p.is_all_in())
            .count()
    }

    /// Moves up to `amount` from the player's stack into the pot and returns
    /// what was actually paid.
    pub fn commit(&mut self, player: usize, amount: f64) -> f64 {
        let paid = amount.min(self.players[player].stack).max(0.0);
        self.players[player].stack -= paid;
        self.contributed[player] += paid;
        self.pot += paid;
        paid
    }

    pub fn fold(&mut self, player: usize) {
        self.players[player].is_active = false;
    }

    fn deal_card(&mut self) -> PokerResult<Card> {
        let card = self.deck.card(self.next_card)?;
        self.next_card += 1;
        Ok(card)
    }

    fn burn_and_deal(&mut self, n: usize) -> PokerResult<()> {
        self.deal_card()?;
        for _ in 0..n {
            let card = self.deal_card()?;
            self.board.push(card);
        }
        Ok(())
    }

    pub fn deal_flop(&mut self) -> PokerResult<()> {
        self.burn_and_deal(3)
    }

    pub fn deal_turn(&mut self) -> PokerResult<()> {
        self.burn_and_deal(1)
    }

    pub fn deal_river(&mut self) -> PokerResult<()> {
        self.burn_and_deal(1)
    }

    /// Deals whatever streets are still missing.
    pub fn run_out_board(&mut self) -> PokerResult<()> {
        if self.board.is_empty() {
            self.deal_flop()?;
        }
        while self.board.len() < BOARD_SIZE {
            self.burn_and_deal(1)?;
        }
        Ok(())
    }

    /// Returns chips that the opponent never matched to the seat that put
    /// them in.
    fn return_uncalled(&mut self) {
        let matched = self.contributed[0].min(self.contributed[1]);
        for seat in 0..2 {
            let excess = self.contributed[seat] - matched;
            if excess > EPSILON {
                self.contributed[seat] = matched;
                self.players[seat].stack += excess;
                self.pot -= excess;
            }
        }
    }

    /// Awards the pot: to the only active player if the other folded,
    /// otherwise by comparing hands on the full board (split on a tie).
    pub fn compute_winners(&mut self) -> PokerResult<()> {
        match (self.players[0].is_active, self.players[1].is_active) {
            (true, false) => self.players[0].stack += self.pot,
            (false, true) => self.players[1].stack += self.pot,
            _ => {
                self.return_uncalled();
                let order = compare_hands(
                    &self.players[0].cards,
                    &self.players[1].cards,
                    &self.board,
                )?;
                match order {
                    Ordering::Greater => self.players[0].stack += self.pot,
                    Ordering::Less => self.players[1].stack += self.pot,
                    Ordering::Equal => {
                        self.players[0].stack += self.pot / 2.0;
                        self.players[1].stack += self.pot / 2.0;
                    }
                }
            }
        }
        log::trace!(
            "pot {:.2} settled, stacks {:.2} / {:.2}",
            self.pot,
            self.players[0].stack,
            self.players[1].stack
        );
        Ok(())
    }
}
