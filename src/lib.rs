pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod events;

pub use db::DbPool;

use config::Config;
use events::EventBus;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub events: EventBus,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, events: EventBus) -> Self {
        Self { config, db, events }
    }
}
