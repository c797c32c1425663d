use std::collections::BTreeMap;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::actions::Action;
use crate::cards::{Card, Suit};
use crate::hand_evaluator::{HandCategory, HandRank, WORST_RANK};

pub fn board_display(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|card| {
            let text = format!("{}{}", card.rank.to_char(), card.suit.symbol());
            match card.suit {
                Suit::Spades => text.white().to_string(),
                Suit::Hearts => text.red().to_string(),
                Suit::Diamonds => text.blue().to_string(),
                Suit::Clubs => text.green().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn styled_action(action: Action) -> String {
    let name = action.as_str();
    match action {
        Action::Bet(_) | Action::Raise(_) => name.red().bold().to_string(),
        Action::Call => name.green().bold().to_string(),
        Action::Fold | Action::Pass => name.dimmed().bold().to_string(),
        Action::Check => name.yellow().bold().to_string(),
    }
}

/// Bar of `width` cells for a probability in `0..=1`.
pub fn probability_bar(p: f64, width: usize) -> String {
    let filled = ((p.clamp(0.0, 1.0)) * width as f64).round() as usize;
    "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled)
}

/// One row per info set and action, probabilities already normalized.
pub fn strategy_table(strategy: &BTreeMap<String, BTreeMap<Action, f64>>) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Info set"),
        Cell::new("Action"),
        Cell::new("Probability").set_alignment(CellAlignment::Right),
        Cell::new(""),
    ]);

    for (info_set, actions) in strategy {
        let label = if info_set.is_empty() {
            "(root)".to_string()
        } else {
            info_set.clone()
        };
        for (n, (&action, &p)) in actions.iter().enumerate() {
            let key = if n == 0 {
                label.bold().to_string()
            } else {
                String::new()
            };
            table.add_row(vec![
                Cell::new(key),
                Cell::new(styled_action(action)),
                Cell::new(format!("{:.2}", p)).set_alignment(CellAlignment::Right),
                Cell::new(probability_bar(p, 20)),
            ]);
        }
    }
    table.to_string()
}

pub fn rank_table(rank: HandRank, category: HandCategory) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new(""), Cell::new("")]);
    table.add_row(vec![
        Cell::new("Rank".bold().to_string()),
        Cell::new(format!("{} / {}", rank, WORST_RANK)),
    ]);
    table.add_row(vec![
        Cell::new("Category".bold().to_string()),
        Cell::new(category.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Percentile".bold().to_string()),
        Cell::new(format!(
            "{:.1}%",
            100.0 * (WORST_RANK - rank) as f64 / (WORST_RANK - 1) as f64
        )),
    ]);
    table.to_string()
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("{}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_has_fixed_width() {
        for p in [0.0, 0.33, 0.5, 1.0] {
            assert_eq!(probability_bar(p, 10).chars().count(), 10);
        }
    }

    #[test]
    fn strategy_table_lists_every_action() {
        colored::control::set_override(false);
        let mut row = BTreeMap::new();
        row.insert(Action::Fold, 0.25);
        row.insert(Action::Call, 0.75);
        let mut strategy = BTreeMap::new();
        strategy.insert(String::new(), row);
        let out = strategy_table(&strategy);
        assert!(out.contains("(root)"));
        assert!(out.contains("fold"));
        assert!(out.contains("0.75"));
    }
}
