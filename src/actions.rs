use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PokerError;

/// Bet sizes available when nobody has put chips in this round, as a
/// fraction of the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BetSize {
    Third,
    Half,
    TwoThirds,
    Pot,
    PotAndHalf,
    DoublePot,
}

impl BetSize {
    pub const ALL: [BetSize; 6] = [
        BetSize::Third,
        BetSize::Half,
        BetSize::TwoThirds,
        BetSize::Pot,
        BetSize::PotAndHalf,
        BetSize::DoublePot,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            BetSize::Third => 1.0 / 3.0,
            BetSize::Half => 0.5,
            BetSize::TwoThirds => 2.0 / 3.0,
            BetSize::Pot => 1.0,
            BetSize::PotAndHalf => 1.5,
            BetSize::DoublePot => 2.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            BetSize::Third => "bet_33",
            BetSize::Half => "bet_50",
            BetSize::TwoThirds => "bet_67",
            BetSize::Pot => "bet_100",
            BetSize::PotAndHalf => "bet_150",
            BetSize::DoublePot => "bet_200",
        }
    }
}

/// Raise sizes, as a multiple of the pot at the moment of raising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RaiseSize {
    TwoThirds,
    OneAndHalf,
    Double,
    TwoAndHalf,
    Quadruple,
}

impl RaiseSize {
    pub const ALL: [RaiseSize; 5] = [
        RaiseSize::TwoThirds,
        RaiseSize::OneAndHalf,
        RaiseSize::Double,
        RaiseSize::TwoAndHalf,
        RaiseSize::Quadruple,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            RaiseSize::TwoThirds => 2.0 / 3.0,
            RaiseSize::OneAndHalf => 1.5,
            RaiseSize::Double => 2.0,
            RaiseSize::TwoAndHalf => 2.5,
            RaiseSize::Quadruple => 4.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RaiseSize::TwoThirds => "raise_67",
            RaiseSize::OneAndHalf => "raise_150",
            RaiseSize::Double => "raise_200",
            RaiseSize::TwoAndHalf => "raise_250",
            RaiseSize::Quadruple => "raise_400",
        }
    }
}

/// Everything a player can do at a decision point. `Pass` is the only action
/// of a player who has already folded.
///
/// Serialized as its name (`"call"`, `"bet_50"`, ...) so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(BetSize),
    Raise(RaiseSize),
    Pass,
}

impl Action {
    pub fn all_bets() -> impl Iterator<Item = Action> {
        BetSize::ALL.into_iter().map(Action::Bet)
    }

    pub fn all_raises() -> impl Iterator<Item = Action> {
        RaiseSize::ALL.into_iter().map(Action::Raise)
    }

    /// Pot multiplier for sized actions.
    pub fn multiplier(self) -> Option<f64> {
        match self {
            Action::Bet(size) => Some(size.multiplier()),
            Action::Raise(size) => Some(size.multiplier()),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Bet(size) => size.as_str(),
            Action::Raise(size) => size.as_str(),
            Action::Pass => "pass",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fold" => return Ok(Action::Fold),
            "check" => return Ok(Action::Check),
            "call" => return Ok(Action::Call),
            "pass" => return Ok(Action::Pass),
            _ => {}
        }
        Action::all_bets()
            .chain(Action::all_raises())
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PokerError::InvalidAction(s.to_string()))
    }
}

impl From<Action> for String {
    fn from(action: Action) -> String {
        action.as_str().to_string()
    }
}

impl TryFrom<String> for Action {
    type Error = PokerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
