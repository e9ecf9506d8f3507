use tracing_subscriber::EnvFilter;

use feijump_core::storage::FileStore;
use feijump_sim::{SimConfig, Simulation};
use feijump_tower::{LevelTable, TowerConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SimConfig::from_env();
    tracing::info!(
        seed = config.seed,
        mode = ?config.game_mode,
        control = ?config.control_method,
        frames = config.frames,
        "FEI Jump simulation starting"
    );

    let levels = match LevelTable::load() {
        Ok(levels) => levels,
        Err(e) => {
            tracing::error!("Invalid level config: {e}");
            std::process::exit(1);
        },
    };

    let store = FileStore::new(&config.save_dir);
    let mut sim = match Simulation::new(config, levels, TowerConfig::load(), store) {
        Ok(sim) => sim,
        Err(e) => {
            tracing::error!("Failed to start: {e}");
            std::process::exit(1);
        },
    };

    match sim.run() {
        Ok(report) => tracing::info!(
            frames = report.frames,
            started = report.levels_started,
            completed = report.levels_completed,
            deaths = report.deaths,
            power_ups = report.power_ups,
            climb = report.best_climb,
            "Simulation finished"
        ),
        Err(e) => {
            tracing::error!("Simulation aborted: {e}");
            std::process::exit(1);
        },
    }
}
