//! Side effects run after the authoritative write. Each one is recorded
//! before delivery so a failed email or file deletion stays visible and is
//! retried instead of being dropped.

use log::{error, info, warn};
use mongodb::bson::oid::ObjectId;
use rocket::fairing::AdHoc;
use std::time::Duration;

use crate::db::StoreResult;
use crate::models::{OutboxEntry, SideEffect};
use crate::state::AppState;

const RETRY_BATCH: i64 = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetrySummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Records the effect and attempts it once. Never fails the caller.
pub async fn dispatch(state: &AppState, effect: SideEffect) -> bool {
    let entry = OutboxEntry::pending(effect.clone());
    let id = match state.store().enqueue_side_effect(&entry).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to record {} in outbox: {}", effect.describe(), e);
            None
        }
    };

    attempt(state, id, &effect).await
}

async fn attempt(state: &AppState, id: Option<ObjectId>, effect: &SideEffect) -> bool {
    match deliver(state, effect).await {
        Ok(()) => {
            if let Some(id) = id {
                if let Err(e) = state.store().complete_side_effect(id).await {
                    warn!("Delivered {} but could not mark it done: {}", effect.describe(), e);
                }
            }
            true
        }
        Err((remaining, reason)) => {
            warn!("{} failed: {}", effect.describe(), reason);
            if let Some(id) = id {
                if let Err(e) = state.store().fail_side_effect(id, &remaining, &reason).await {
                    error!("Could not record failure of {}: {}", effect.describe(), e);
                }
            }
            false
        }
    }
}

/// On failure returns what is still outstanding and why.
async fn deliver(state: &AppState, effect: &SideEffect) -> Result<(), (SideEffect, String)> {
    match effect {
        SideEffect::Email(email) => state
            .mailer
            .send(email)
            .await
            .map_err(|e| (effect.clone(), e.to_string())),
        SideEffect::DeleteFiles { urls } => {
            if urls.is_empty() {
                return Ok(());
            }

            let report = state.files.delete(urls).await;
            if report.is_complete() {
                info!("Deleted {} stored file(s)", report.deleted.len());
                return Ok(());
            }

            let reason = report
                .failed
                .iter()
                .map(|(url, why)| format!("{}: {}", url, why))
                .collect::<Vec<_>>()
                .join("; ");
            Err((SideEffect::DeleteFiles { urls: report.failed_urls() }, reason))
        }
    }
}

/// One pass over undelivered entries that failed at least once and still
/// have attempts left. Entries never attempted belong to an in-flight dispatch.
pub async fn retry_pending(state: &AppState) -> StoreResult<RetrySummary> {
    let pending = state
        .store()
        .pending_side_effects(state.settings.outbox_max_attempts, RETRY_BATCH)
        .await?;

    let mut summary = RetrySummary::default();
    for entry in pending {
        if attempt(state, entry.id, &entry.effect).await {
            summary.delivered += 1;
        } else {
            summary.failed += 1;
        }
    }
    Ok(summary)
}

/// Spawns the periodic retry loop once Rocket is live; it stops with Rocket.
pub fn retry_fairing() -> AdHoc {
    AdHoc::on_liftoff("Outbox retry", |rocket| {
        Box::pin(async move {
            let Some(state) = rocket.state::<AppState>().cloned() else {
                warn!("Outbox retry disabled: application state not managed");
                return;
            };
            let shutdown = rocket.shutdown();
            let period = Duration::from_secs(state.settings.outbox_retry_secs.max(1));

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                tokio::pin!(shutdown);

                loop {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = ticker.tick() => match retry_pending(&state).await {
                            Ok(summary) if summary.delivered + summary.failed > 0 => {
                                info!(
                                    "Outbox retry: {} delivered, {} still failing",
                                    summary.delivered, summary.failed
                                );
                            }
                            Ok(_) => {}
                            Err(e) => error!("Outbox retry pass failed: {}", e),
                        },
                    }
                }
            });
        })
    })
}
