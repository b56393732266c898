use serenity::{
    async_trait,
    model::{application::Interaction, gateway::Ready},
    prelude::*,
};
use tracing::{debug, error, info};
use crate::{bot::SharedBotData, commands, scheduler::StreakRefreshScheduler};

pub struct Handler {
    pub data: SharedBotData,
    /// Taken on the first `ready`; reconnects fire `ready` again and must not start a second loop.
    pub scheduler: Mutex<Option<StreakRefreshScheduler>>,
}

impl Handler {
    pub fn new(data: SharedBotData, scheduler: StreakRefreshScheduler) -> Self {
        Self {
            data,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected to {} guilds", ready.user.name, ready.guilds.len());

        if let Err(why) = commands::register_commands(&ctx).await {
            error!("Failed to register slash commands: {}", why);
        } else {
            info!("Successfully registered slash commands");
        }

        if let Some(scheduler) = self.scheduler.lock().await.take() {
            tokio::spawn(async move { scheduler.start().await });
        } else {
            debug!("Streak refresh scheduler already running");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Err(why) = commands::handle_command(&ctx, &interaction, self.data.clone()).await {
            error!("Error handling command: {}", why);
        }
    }
}
