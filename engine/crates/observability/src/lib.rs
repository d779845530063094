use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub tick_number: u64,
    pub duration_us: u128,
    pub active_entities: usize,
    pub updated: usize,
    pub suspended: usize,
    pub killed: usize,
    /// Outbound frames produced this tick (kills + deltas).
    pub messages_sent: usize,
}

impl TickMetrics {
    pub fn log(&self) {
        const TICK_BUDGET_US: u128 = 33_000;
        if self.duration_us > TICK_BUDGET_US {
            tracing::warn!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                entities = self.active_entities,
                updated = self.updated,
                suspended = self.suspended,
                killed = self.killed,
                messages = self.messages_sent,
                "tick exceeded budget ({}us > {}us)",
                self.duration_us,
                TICK_BUDGET_US
            );
        } else {
            tracing::trace!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                entities = self.active_entities,
                updated = self.updated,
                suspended = self.suspended,
                killed = self.killed,
                messages = self.messages_sent,
                "tick completed"
            );
        }
    }
}
