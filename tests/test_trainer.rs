use std::path::PathBuf;

use holdem_cfr::actions::Action;
use holdem_cfr::agent::{Agent, AgentSnapshot, Ledger};
use holdem_cfr::error::PokerError;
use holdem_cfr::trainer::{
    self, create_dir, serialise, ServerState, TrainConfig, AGENT_FILE, CONFIG_FILE, SERVER_FILE,
};

fn temp_results(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("holdem_cfr_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Small enough that each iteration walks a tree of a few hundred nodes.
fn short_stacked(name: &str) -> TrainConfig {
    TrainConfig {
        strategy_interval: 5,
        n_iterations: 30,
        lcfr_threshold: 20,
        discount_interval: 10,
        prune_threshold: 15,
        c: -50.0,
        dump_iteration: 10,
        update_threshold: 10,
        stack: 3.0,
        nickname: Some(name.to_string()),
        results_dir: temp_results(name),
        ..TrainConfig::default()
    }
}

#[test]
fn test_serialise_accumulates_strategy() {
    let dir = temp_results("serialise");
    std::fs::create_dir_all(&dir).unwrap();
    let config = TrainConfig::default();

    let mut agent: Agent<Action> = Agent::new();
    let mut deltas = std::collections::BTreeMap::new();
    deltas.insert(Action::Call, 3.0);
    deltas.insert(Action::Fold, 1.0);
    agent.accumulate_regrets("", &deltas);
    agent.increment_strategy("", &[Action::Fold, Action::Call], Action::Call);

    serialise(&agent, &dir, 401, &config).unwrap();
    serialise(&agent, &dir, 420, &config).unwrap();

    let snapshot = AgentSnapshot::load(&dir.join(AGENT_FILE)).unwrap();
    assert_eq!(snapshot.timestep, 420);
    assert_eq!(snapshot.strategy[""][&Action::Call], 1.5);
    assert_eq!(snapshot.strategy[""][&Action::Fold], 0.5);
    assert_eq!(snapshot.to_agent(), agent);

    let server = ServerState::load(&dir.join(SERVER_FILE)).unwrap();
    assert_eq!(server.start_iteration, 421);
    assert_eq!(server.agent_path, dir.join(AGENT_FILE));
    assert_eq!(server.config, config);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_server_state_json_fields() {
    let server = ServerState {
        start_iteration: 7,
        agent_path: PathBuf::from("results/x/agent.json"),
        config: TrainConfig::default(),
    };
    let value: serde_json::Value = serde_json::to_value(&server).unwrap();
    for field in [
        "start_iteration",
        "agent_path",
        "strategy_interval",
        "n_iterations",
        "lcfr_threshold",
        "discount_interval",
        "prune_threshold",
        "c",
        "n_players",
        "dump_iteration",
        "update_threshold",
    ] {
        assert!(value.get(field).is_some(), "missing {}", field);
    }
    assert_eq!(value["c"], serde_json::json!(-20000.0));
}

#[test]
fn test_create_dir_writes_config() {
    let config = TrainConfig {
        nickname: Some("dir".to_string()),
        results_dir: temp_results("create_dir"),
        ..TrainConfig::default()
    };
    let dir = create_dir(&config).unwrap();
    assert!(dir.ends_with("dir"));
    let json = std::fs::read_to_string(dir.join(CONFIG_FILE)).unwrap();
    let back: TrainConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
    std::fs::remove_dir_all(&config.results_dir).ok();
}

#[test]
fn test_start_then_resume() {
    let config = short_stacked("resume");
    let agent = trainer::start(&config).unwrap();
    assert!(agent.n_info_sets() > 1);
    assert!(!agent.strategy.is_empty());

    let run_dir = config.results_dir.join("resume");
    let server_path = run_dir.join(SERVER_FILE);
    let mut server = ServerState::load(&server_path).unwrap();
    assert_eq!(server.start_iteration, 31);

    let snapshot = AgentSnapshot::load(&server.agent_path).unwrap();
    assert_eq!(snapshot.timestep, 30);
    assert_eq!(snapshot.to_agent(), agent);

    server.config.n_iterations = 40;
    server.save(&server_path).unwrap();
    let resumed = trainer::resume(&server_path).unwrap();
    assert!(resumed.n_info_sets() >= agent.n_info_sets());

    let server = ServerState::load(&server_path).unwrap();
    assert_eq!(server.start_iteration, 41);
    assert_eq!(AgentSnapshot::load(&server.agent_path).unwrap().timestep, 40);

    std::fs::remove_dir_all(&config.results_dir).ok();
}

#[test]
fn test_parallel_workers_share_one_agent() {
    let config = TrainConfig {
        workers: 3,
        ..short_stacked("parallel")
    };
    let agent = trainer::start(&config).unwrap();
    assert!(agent.n_info_sets() > 1);
    assert!(agent.regret.contains_key(""));
    assert!(config.results_dir.join("parallel").join(AGENT_FILE).is_file());
    std::fs::remove_dir_all(&config.results_dir).ok();
}

#[test]
fn test_resume_missing_file() {
    let missing = temp_results("missing").join(SERVER_FILE);
    assert!(matches!(
        trainer::resume(&missing),
        Err(PokerError::SnapshotMissing(path)) if path == missing
    ));
}

#[test]
fn test_start_rejects_multiway() {
    let config = TrainConfig {
        n_players: 3,
        results_dir: temp_results("multiway"),
        ..TrainConfig::default()
    };
    assert!(matches!(
        trainer::start(&config),
        Err(PokerError::UnsupportedPlayerCount(3))
    ));
    assert!(!config.results_dir.exists());
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let uninterrupted = TrainConfig {
        n_iterations: 40,
        ..short_stacked("straight_through")
    };
    let full = trainer::start(&uninterrupted).unwrap();

    let split = TrainConfig {
        n_iterations: 20,
        ..short_stacked("split")
    };
    trainer::start(&split).unwrap();
    let server_path = split.results_dir.join("split").join(SERVER_FILE);
    let mut server = ServerState::load(&server_path).unwrap();
    assert_eq!(server.start_iteration, 21);
    server.config.n_iterations = 40;
    server.save(&server_path).unwrap();
    let resumed = trainer::resume(&server_path).unwrap();

    assert_eq!(resumed, full);
    let full_snapshot =
        AgentSnapshot::load(&uninterrupted.results_dir.join("straight_through").join(AGENT_FILE))
            .unwrap();
    let resumed_snapshot = AgentSnapshot::load(&server.agent_path).unwrap();
    assert_eq!(resumed_snapshot, full_snapshot);

    std::fs::remove_dir_all(&uninterrupted.results_dir).ok();
    std::fs::remove_dir_all(&split.results_dir).ok();
}
