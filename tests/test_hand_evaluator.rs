use std::cmp::Ordering;

use holdem_cfr::cards::*;
use holdem_cfr::error::PokerError;
use holdem_cfr::hand_evaluator::*;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn c(notation: &str) -> Card {
    parse_card(notation).unwrap()
}

fn rank(hole: &str, board: &str) -> HandRank {
    evaluate_rank(&parse_board(hole).unwrap(), &parse_board(board).unwrap()).unwrap()
}

fn category(hole: &str, board: &str) -> HandCategory {
    rank_class(rank(hole, board)).unwrap()
}

#[test]
fn test_royal_flush_every_suit() {
    for suit in ALL_SUITS {
        let cards: Vec<Card> = [Rank::Ace, Rank::King, Rank::Queen, Rank::Jack, Rank::Ten]
            .iter()
            .map(|&r| Card::new(r, suit))
            .collect();
        assert_eq!(evaluate_rank(&cards[..2], &cards[2..]).unwrap(), BEST_RANK);
    }
}

#[test]
fn test_straight_flush() {
    assert_eq!(category("9h8h", "7h6h5hAcKd"), HandCategory::StraightFlush);
}

#[test]
fn test_four_of_a_kind() {
    assert_eq!(category("KsKh", "KdKc5s2h3d"), HandCategory::FourOfAKind);
}

#[test]
fn test_full_house() {
    assert_eq!(category("AsAh", "AdKsKh2c3d"), HandCategory::FullHouse);
}

#[test]
fn test_flush() {
    assert_eq!(category("AsTs", "8s5s2sKdQh"), HandCategory::Flush);
}

#[test]
fn test_wheel_is_lowest_straight() {
    assert_eq!(rank("As2d", "3c4h5s"), 1609);
    assert_eq!(category("6d2d", "3c4h5s"), HandCategory::Straight);
    assert!(rank("6d2d", "3c4h5s") < rank("As2d", "3c4h5s"));
}

#[test]
fn test_trips_two_pair_pair_high_card() {
    assert_eq!(category("7s7h", "7d2c9h"), HandCategory::ThreeOfAKind);
    assert_eq!(category("7s2h", "7d2c9h"), HandCategory::TwoPair);
    assert_eq!(category("7s3h", "7d2c9h"), HandCategory::OnePair);
    assert_eq!(category("As3h", "7d2c9h"), HandCategory::HighCard);
}

#[test]
fn test_category_display() {
    assert_eq!(HandCategory::RoyalFlush.to_string(), "Royal Flush");
    assert_eq!(HandCategory::ThreeOfAKind.to_string(), "Three of a Kind");
}

#[test]
fn test_permutation_invariance() {
    let cards = parse_board("Ah7c7d2s9h").unwrap();
    let expected = evaluate_rank(&cards, &[]).unwrap();
    for perm in cards.iter().copied().permutations(5) {
        assert_eq!(evaluate_rank(&perm[..2], &perm[2..]).unwrap(), expected);
    }
}

#[test]
fn test_seven_cards_take_best_subset() {
    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..200 {
        let deck = Deck::shuffled(&mut rng);
        let seven = &deck.cards()[..7];
        let best = seven
            .iter()
            .copied()
            .combinations(5)
            .map(|five| evaluate_rank(&five, &[]).unwrap())
            .min()
            .unwrap();
        assert_eq!(evaluate_rank(&seven[..2], &seven[2..]).unwrap(), best);
    }
}

#[test]
fn test_six_cards() {
    // The sixth card completes a straight.
    assert_eq!(category("9c8d", "7h6s5dKc"), HandCategory::Straight);
    assert_eq!(category("9c8d", "7h6s2dKc"), HandCategory::HighCard);
}

#[test]
fn test_compare_hands() {
    let board = parse_board("Ks7d2c9h3s").unwrap();
    let aces = vec![c("As"), c("Ad")];
    let kings = vec![c("Kh"), c("Kd")];
    assert_eq!(compare_hands(&aces, &kings, &board).unwrap(), Ordering::Less);
    assert_eq!(compare_hands(&kings, &aces, &board).unwrap(), Ordering::Greater);

    let board = parse_board("AhKhQhJhTh").unwrap();
    let x = vec![c("2c"), c("3c")];
    let y = vec![c("4d"), c("5d")];
    assert_eq!(compare_hands(&x, &y, &board).unwrap(), Ordering::Equal);
}

#[test]
fn test_card_count_limits() {
    let four = parse_board("AsKsQsJs").unwrap();
    assert!(matches!(
        evaluate_rank(&four, &[]),
        Err(PokerError::NotEnoughCards { need: 5, got: 4 })
    ));
    let eight = parse_board("AsKsQsJsTs9s8s7s").unwrap();
    assert!(matches!(
        evaluate_rank(&eight[..2], &eight[2..]),
        Err(PokerError::TooManyCards { max: 7, got: 8 })
    ));
}

#[test]
fn test_duplicate_cards_rejected() {
    let hole = vec![c("As"), c("Kd")];
    let board = parse_board("As7c2h").unwrap();
    assert!(matches!(
        evaluate_rank(&hole, &board),
        Err(PokerError::DuplicateCard(_))
    ));
}

#[test]
fn test_rank_class_thresholds() {
    let expected = [
        (1, HandCategory::RoyalFlush),
        (10, HandCategory::StraightFlush),
        (166, HandCategory::FourOfAKind),
        (322, HandCategory::FullHouse),
        (1599, HandCategory::Flush),
        (1609, HandCategory::Straight),
        (2467, HandCategory::ThreeOfAKind),
        (3325, HandCategory::TwoPair),
        (6185, HandCategory::OnePair),
        (7462, HandCategory::HighCard),
    ];
    for (rank, cat) in expected {
        assert_eq!(rank_class(rank).unwrap(), cat);
    }
    assert!(matches!(rank_class(0), Err(PokerError::InvalidHandRank(0))));
    assert!(rank_class(WORST_RANK + 1).is_err());
}
