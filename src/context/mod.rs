//! The lifetime-scoped application container (§5, §9's redesign note): the
//! database pool, HTTP clients, settings and scheduler handle are all built
//! once in `main` and bundled here, then threaded through by reference
//! rather than reached for as globals.

use sqlx::SqlitePool;

use crate::api::{SinkClient, SourceClient};
use crate::config::Settings;
use crate::scheduler::SchedulerHandle;

pub struct AppContext {
    pub pool: SqlitePool,
    pub source: SourceClient,
    pub sink: SinkClient,
    pub settings: Settings,
    pub scheduler: SchedulerHandle,
}

impl AppContext {
    pub fn new(
        pool: SqlitePool,
        source: SourceClient,
        sink: SinkClient,
        settings: Settings,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self { pool, source, sink, settings, scheduler }
    }
}
