//! Prime-product hand evaluator.
//!
//! Every 5-card hand maps to a rank in `1..=7462`, lower is stronger. A hand's
//! rank multiset is identified by the product of its rank primes; whether it
//! is a flush is decided by ANDing the suit flags. Two tables built once on
//! first use map prime products to ranks, one for suited hands and one for the
//! rest. Six and seven card hands take the best of their 5-card subsets.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::cards::{Card, RANK_PRIMES};
use crate::error::{PokerError, PokerResult};

pub type HandRank = u16;

pub const BEST_RANK: HandRank = 1;
pub const WORST_RANK: HandRank = 7462;

const MAX_CARDS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
    RoyalFlush = 9,
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandCategory::HighCard => write!(f, "High Card"),
            HandCategory::OnePair => write!(f, "One Pair"),
            HandCategory::TwoPair => write!(f, "Two Pair"),
            HandCategory::ThreeOfAKind => write!(f, "Three of a Kind"),
            HandCategory::Straight => write!(f, "Straight"),
            HandCategory::Flush => write!(f, "Flush"),
            HandCategory::FullHouse => write!(f, "Full House"),
            HandCategory::FourOfAKind => write!(f, "Four of a Kind"),
            HandCategory::StraightFlush => write!(f, "Straight Flush"),
            HandCategory::RoyalFlush => write!(f, "Royal Flush"),
        }
    }
}

/// Category of a rank, by inclusive upper thresholds.
pub fn rank_class(rank: HandRank) -> PokerResult<HandCategory> {
    match rank {
        1 => Ok(HandCategory::RoyalFlush),
        2..=10 => Ok(HandCategory::StraightFlush),
        11..=166 => Ok(HandCategory::FourOfAKind),
        167..=322 => Ok(HandCategory::FullHouse),
        323..=1599 => Ok(HandCategory::Flush),
        1600..=1609 => Ok(HandCategory::Straight),
        1610..=2467 => Ok(HandCategory::ThreeOfAKind),
        2468..=3325 => Ok(HandCategory::TwoPair),
        3326..=6185 => Ok(HandCategory::OnePair),
        6186..=7462 => Ok(HandCategory::HighCard),
        _ => Err(PokerError::InvalidHandRank(rank as u32)),
    }
}

struct LookupTables {
    flush: HashMap<u32, HandRank>,
    non_flush: HashMap<u32, HandRank>,
}

static TABLES: Lazy<LookupTables> = Lazy::new(LookupTables::build);

impl LookupTables {
    fn build() -> Self {
        let straights = straight_masks();
        let mut distinct: Vec<u16> = (0u16..(1 << 13))
            .filter(|m| m.count_ones() == 5 && !straights.contains(m))
            .collect();
        // With five bits set, numeric order is the same as comparing ranks
        // from the top card down.
        distinct.sort_unstable_by(|a, b| b.cmp(a));

        let mut flush = HashMap::with_capacity(straights.len() + distinct.len());
        let mut non_flush = HashMap::with_capacity(6175);

        for (i, &mask) in straights.iter().enumerate() {
            flush.insert(mask_product(mask), 1 + i as HandRank);
            non_flush.insert(mask_product(mask), 1600 + i as HandRank);
        }
        for (i, &mask) in distinct.iter().enumerate() {
            flush.insert(mask_product(mask), 323 + i as HandRank);
            non_flush.insert(mask_product(mask), 6186 + i as HandRank);
        }

        let mut insert = |counts: &[(usize, u32)], rank: &mut HandRank| {
            let product = counts
                .iter()
                .map(|&(r, n)| RANK_PRIMES[r].pow(n))
                .product::<u32>();
            non_flush.insert(product, *rank);
            *rank += 1;
        };

        let mut rank: HandRank = 11;
        for quad in (0..13).rev() {
            for kicker in (0..13).rev().filter(|&k| k != quad) {
                insert(&[(quad, 4), (kicker, 1)], &mut rank);
            }
        }
        for trips in (0..13).rev() {
            for pair in (0..13).rev().filter(|&p| p != trips) {
                insert(&[(trips, 3), (pair, 2)], &mut rank);
            }
        }

        let mut rank: HandRank = 1610;
        for trips in (0..13).rev() {
            for k1 in (0..13).rev().filter(|&k| k != trips) {
                for k2 in (0..k1).rev().filter(|&k| k != trips) {
                    insert(&[(trips, 3), (k1, 1), (k2, 1)], &mut rank);
                }
            }
        }
        for high in (0..13).rev() {
            for low in (0..high).rev() {
                for kicker in (0..13).rev().filter(|&k| k != high && k != low) {
                    insert(&[(high, 2), (low, 2), (kicker, 1)], &mut rank);
                }
            }
        }
        for pair in (0..13).rev() {
            for k1 in (0..13).rev().filter(|&k| k != pair) {
                for k2 in (0..k1).rev().filter(|&k| k != pair) {
                    for k3 in (0..k2).rev().filter(|&k| k != pair) {
                        insert(&[(pair, 2), (k1, 1), (k2, 1), (k3, 1)], &mut rank);
                    }
                }
            }
        }
        debug_assert_eq!(rank, 6186);

        LookupTables { flush, non_flush }
    }
}

/// Straights from broadway down to the wheel.
fn straight_masks() -> [u16; 10] {
    let mut masks = [0u16; 10];
    for (i, top) in (4..13).rev().enumerate() {
        masks[i] = 0b1_1111 << (top - 4);
    }
    masks[9] = 0b1_0000_0000_1111;
    masks
}

fn mask_product(mask: u16) -> u32 {
    (0..13)
        .filter(|r| mask & (1 << r) != 0)
        .map(|r| RANK_PRIMES[r])
        .product()
}

pub fn prime_product(cards: &[Card]) -> u32 {
    cards.iter().map(|c| c.prime()).product()
}

/// Five distinct cards always hit a table; a miss means a repeated card.
fn evaluate_five(cards: &[Card; 5]) -> PokerResult<HandRank> {
    let product = prime_product(cards);
    let suits = cards.iter().fold(0xF, |acc, c| acc & c.suit_bit());
    let table = if suits != 0 {
        &TABLES.flush
    } else {
        &TABLES.non_flush
    };
    table
        .get(&product)
        .copied()
        .ok_or_else(|| PokerError::DuplicateCard(cards.iter().join("")))
}

/// Rank of the best five cards out of `hand` and `board` combined.
pub fn evaluate_rank(hand: &[Card], board: &[Card]) -> PokerResult<HandRank> {
    let mut all_cards: Vec<Card> = Vec::with_capacity(hand.len() + board.len());
    all_cards.extend_from_slice(hand);
    all_cards.extend_from_slice(board);

    if all_cards.len() < 5 {
        return Err(PokerError::NotEnoughCards {
            need: 5,
            got: all_cards.len(),
        });
    }
    if all_cards.len() > MAX_CARDS {
        return Err(PokerError::TooManyCards {
            max: MAX_CARDS,
            got: all_cards.len(),
        });
    }
    if let Some((a, _)) = all_cards.iter().tuple_combinations().find(|(a, b)| a == b) {
        return Err(PokerError::DuplicateCard(a.to_string()));
    }

    let mut best = WORST_RANK;
    for combo in all_cards.iter().combinations(5) {
        let rank = evaluate_five(&[*combo[0], *combo[1], *combo[2], *combo[3], *combo[4]])?;
        best = best.min(rank);
    }
    Ok(best)
}

/// `Greater` when `hand1` is the stronger holding.
pub fn compare_hands(hand1: &[Card], hand2: &[Card], board: &[Card]) -> PokerResult<Ordering> {
    let r1 = evaluate_rank(hand1, board)?;
    let r2 = evaluate_rank(hand2, board)?;
    Ok(r2.cmp(&r1))
}
