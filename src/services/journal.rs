use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::auth::session::Session;
use crate::error::{AppError, AppResult};
use crate::models::collection::{ChildUpdate, Collection, HydratedLog};
use crate::models::daily_log::{DailyLog, LogFields, WriteMode};
use crate::services::insights::{self, InsightOptions, InsightReport, MonthSummary};
use crate::services::policy::CallPolicy;
use crate::services::window::{DateWindow, InsightPeriod};
use crate::store::LogBackend;

/// Everything a single day's save carries.
#[derive(Debug, Clone, Default)]
pub struct DaySave {
    pub mode: WriteMode,
    pub fields: LogFields,
    pub lists: ChildUpdate,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthHistory {
    pub window: DateWindow,
    pub summary: MonthSummary,
    pub logs: Vec<HydratedLog>,
}

/// Entry point for every daily-log operation.
///
/// Each call takes the caller's [`Session`]; without a principal reads come
/// back empty and writes do nothing. Store calls are bounded by the
/// [`CallPolicy`] timeout, and idempotent ones are retried with backoff.
#[derive(Clone)]
pub struct Journal {
    backend: Arc<dyn LogBackend>,
    policy: CallPolicy,
}

impl Journal {
    pub fn new(backend: Arc<dyn LogBackend>, policy: CallPolicy) -> Self {
        Self { backend, policy }
    }

    pub async fn fetch(&self, session: &Session, date: NaiveDate) -> AppResult<Option<HydratedLog>> {
        let Some(principal) = session.principal() else {
            return Ok(None);
        };
        self.policy
            .retrying("fetch", || self.backend.fetch(principal, date))
            .await
    }

    /// Write only the scalar fields of a day, leaving its child lists alone.
    pub async fn upsert(
        &self,
        session: &Session,
        date: NaiveDate,
        fields: &LogFields,
        mode: WriteMode,
    ) -> AppResult<Option<DailyLog>> {
        let Some(principal) = session.principal() else {
            return Ok(None);
        };
        fields.validate()?;
        let overlay = fields.overlay(mode);

        let log = self
            .policy
            .retrying("upsert", || self.backend.upsert(principal, date, &overlay))
            .await?;
        tracing::info!(user_id = %principal, log_date = %date, ?mode, "Daily log upserted");
        Ok(Some(log))
    }

    /// Save a whole day (fields plus child lists) as one atomic unit.
    pub async fn save(
        &self,
        session: &Session,
        date: NaiveDate,
        save: &DaySave,
    ) -> AppResult<Option<HydratedLog>> {
        let Some(principal) = session.principal() else {
            return Ok(None);
        };
        save.fields.validate()?;
        let overlay = save.fields.overlay(save.mode);
        let lists = save.lists.replacements(save.mode);

        let saved = self
            .policy
            .retrying("save_day", || {
                self.backend.save_day(principal, date, &overlay, &lists)
            })
            .await?;
        tracing::info!(
            user_id = %principal,
            log_date = %date,
            mode = ?save.mode,
            symptoms = saved.lists.symptoms.len(),
            supplements = saved.lists.supplements.len(),
            foods = saved.lists.foods.len(),
            "Daily log saved"
        );
        Ok(Some(saved))
    }

    /// Replace one child list of an existing day.
    ///
    /// This is the non-atomic delete-then-insert path, so it runs exactly
    /// once: repeating it after a half-finished attempt could drop rows.
    /// A timeout is reported as `PartialWrite`. Returns `Ok(None)` without a principal.
    pub async fn replace(
        &self,
        session: &Session,
        date: NaiveDate,
        collection: Collection,
        names: &[String],
    ) -> AppResult<Option<HydratedLog>> {
        let Some(principal) = session.principal() else {
            return Ok(None);
        };
        let day = self
            .policy
            .retrying("fetch", || self.backend.fetch(principal, date))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No daily log for {}", date)))?;

        let log_id = day.log.id;
        self.policy
            .once("replace", self.backend.replace(log_id, collection, names))
            .await
            .map_err(|e| match e {
                // The call may have been cut off after its delete, so the
                // stored list can no longer be assumed intact.
                AppError::Timeout(_) => {
                    tracing::error!(%log_id, %collection, "Child replace timed out");
                    AppError::PartialWrite {
                        collection,
                        log_id,
                        reason: "timed out".into(),
                    }
                }
                other => other,
            })?;
        tracing::info!(
            user_id = %principal,
            log_date = %date,
            %collection,
            previous = day.lists.get(collection).len(),
            current = names.len(),
            "Child list replaced"
        );

        let mut updated = day;
        updated.lists.set(collection, names.to_vec());
        Ok(Some(updated))
    }

    pub async fn fetch_range(
        &self,
        session: &Session,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<HydratedLog>> {
        let Some(principal) = session.principal() else {
            return Ok(Vec::new());
        };
        if start > end {
            return Ok(Vec::new());
        }
        self.policy
            .retrying("fetch_range", || self.backend.fetch_range(principal, start, end))
            .await
    }

    pub async fn fetch_window(
        &self,
        session: &Session,
        window: DateWindow,
    ) -> AppResult<Vec<HydratedLog>> {
        self.fetch_range(session, window.start, window.end).await
    }

    /// Logs of one calendar month plus its summary.
    pub async fn month(
        &self,
        session: &Session,
        year: i32,
        month: u32,
    ) -> AppResult<MonthHistory> {
        let window = DateWindow::month(year, month)
            .ok_or_else(|| AppError::Validation(format!("Invalid month {}-{}", year, month)))?;
        let logs = self.fetch_window(session, window).await?;
        Ok(MonthHistory {
            window,
            summary: insights::month_summary(&logs),
            logs,
        })
    }

    /// Aggregate the `period` ending on `today` against the window before it.
    ///
    /// Read-only: changing the period never writes anything.
    pub async fn insights(
        &self,
        session: &Session,
        period: InsightPeriod,
        today: NaiveDate,
        options: InsightOptions,
    ) -> AppResult<Option<InsightReport>> {
        if session.principal().is_none() {
            return Ok(None);
        }
        let window = period.window_ending(today);
        let (current, previous) = tokio::try_join!(
            self.fetch_window(session, window),
            self.fetch_window(session, window.preceding()),
        )?;

        Ok(Some(insights::build_report(
            period, window, &current, &previous, options,
        )))
    }

    /// Every log of the caller, newest first.
    pub async fn export(&self, session: &Session) -> AppResult<Vec<HydratedLog>> {
        let Some(principal) = session.principal() else {
            return Ok(Vec::new());
        };
        self.policy
            .retrying("fetch_all", || self.backend.fetch_all(principal))
            .await
    }

    pub async fn delete_day(&self, session: &Session, date: NaiveDate) -> AppResult<bool> {
        let Some(principal) = session.principal() else {
            return Ok(false);
        };
        let deleted = self
            .policy
            .retrying("delete_day", || self.backend.delete_day(principal, date))
            .await?;
        if deleted {
            tracing::info!(user_id = %principal, log_date = %date, "Daily log deleted");
        }
        Ok(deleted)
    }

    pub async fn delete_all(&self, session: &Session) -> AppResult<u64> {
        let Some(principal) = session.principal() else {
            return Ok(0);
        };
        let deleted = self
            .policy
            .retrying("delete_all", || self.backend.delete_all(principal))
            .await?;
        tracing::warn!(user_id = %principal, deleted, "All daily logs deleted");
        Ok(deleted)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.policy.once("ping", self.backend.ping()).await
    }
}
