//! Retention sweep: permanent bulk deletion of stale events and tasks.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::store::{PlannerStore, StoreError};

/// Upper bound accepted for an on-demand threshold.
pub const MAX_THRESHOLD_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub cutoff: NaiveDate,
    pub eventos_eliminados: u64,
    pub tareas_eliminadas: u64,
}

/// Rows dated strictly before this day are stale.
pub fn cutoff_date(today: NaiveDate, threshold_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(threshold_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Deletes every event starting and every task due before
/// `today - threshold_days`, one bulk statement per table.
///
/// The two deletes are independent: when the task delete fails the events
/// already removed stay removed.
pub async fn purge_stale(
    store: &dyn PlannerStore,
    today: NaiveDate,
    threshold_days: u32,
) -> Result<PurgeReport, StoreError> {
    let cutoff = cutoff_date(today, threshold_days);

    let eventos_eliminados = store.delete_events_before(cutoff).await?;
    let tareas_eliminadas = match store.delete_tasks_before(cutoff).await {
        Ok(count) => count,
        Err(err) => {
            log::warn!(
                "Retention sweep aborted after deleting {} events (cutoff {}): {}",
                eventos_eliminados,
                cutoff,
                err
            );
            return Err(err);
        }
    };

    log::info!(
        "Retention sweep (cutoff {}): {} events, {} tasks deleted",
        cutoff,
        eventos_eliminados,
        tareas_eliminadas
    );

    Ok(PurgeReport {
        cutoff,
        eventos_eliminados,
        tareas_eliminadas,
    })
}

/// Startup variant: failures are logged, never fatal.
pub async fn startup_sweep(store: &dyn PlannerStore, today: NaiveDate, threshold_days: u32) {
    if let Err(err) = purge_stale(store, today, threshold_days).await {
        log::warn!("Startup retention sweep failed: {}", err);
    }
}
