use crate::{
    config::Config,
    database::Database,
    dates::Clock,
    immersion::ImmersionLogger,
    scheduler::StreakRefreshScheduler,
    streaks::StreakManager,
};
use std::sync::Arc;

pub type SharedBotData = Arc<BotData>;

/// Services shared by every command handler.
pub struct BotData {
    pub db: Database,
    pub streaks: Arc<StreakManager>,
    pub logger: ImmersionLogger,
}

pub struct Bot {
    pub data: SharedBotData,
}

impl Bot {
    pub fn new(db: Database, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let streaks = Arc::new(StreakManager::new(db.clone(), config.day_boundary(), clock));
        let logger = ImmersionLogger::new(db.clone(), streaks.clone());

        Self {
            data: Arc::new(BotData { db, streaks, logger }),
        }
    }

    pub fn refresh_scheduler(&self, config: &Config) -> StreakRefreshScheduler {
        StreakRefreshScheduler::new(
            self.data.db.clone(),
            self.data.streaks.clone(),
            config.streak_refresh_schedule.clone(),
            config.timezone,
        )
    }
}
