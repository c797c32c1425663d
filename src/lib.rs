pub mod actions;
pub mod agent;
pub mod betting;
pub mod cards;
pub mod cfr;
pub mod cli;
pub mod display;
pub mod error;
pub mod hand_evaluator;
pub mod state;
pub mod trainer;
