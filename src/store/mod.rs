//! Persistence backends for daily logs and their child lists.
//!
//! Every backend upholds the same contract:
//! - one row per (principal, date), enforced by the store itself;
//! - child lists are replaced wholesale, with duplicates and order preserved;
//! - `save_day` is all-or-nothing, while a standalone `replace` is not.

mod memory;
mod postgres;

#[cfg(test)]
pub use memory::{Fault, FaultPoint};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::auth::session::Principal;
use crate::error::AppResult;
use crate::models::collection::{Collection, HydratedLog};
use crate::models::daily_log::{DailyLog, LogFields};

#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn fetch(&self, principal: Principal, date: NaiveDate)
        -> AppResult<Option<HydratedLog>>;

    /// Insert or update the row for (principal, date).
    ///
    /// `fields` is an overlay: `Some` overwrites, `None` keeps the stored value,
    /// or takes the default when the row is new. `updated_at` is always refreshed.
    async fn upsert(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
    ) -> AppResult<DailyLog>;

    /// Delete every row of `collection` for `log_id`, then insert `names`.
    ///
    /// The two steps are separate writes. When the insert fails after the
    /// delete went through, the list stays empty and `PartialWrite` is returned.
    async fn replace(&self, log_id: Uuid, collection: Collection, names: &[String])
        -> AppResult<()>;

    /// Upsert plus the given list replacements as one atomic unit.
    async fn save_day(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
        lists: &[(Collection, Vec<String>)],
    ) -> AppResult<HydratedLog>;

    /// Hydrated logs in `[start, end]`, newest first.
    async fn fetch_range(
        &self,
        principal: Principal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<HydratedLog>>;

    /// Every hydrated log of the principal, newest first.
    async fn fetch_all(&self, principal: Principal) -> AppResult<Vec<HydratedLog>>;

    /// Delete one day. Its child rows go with it.
    async fn delete_day(&self, principal: Principal, date: NaiveDate) -> AppResult<bool>;

    async fn delete_all(&self, principal: Principal) -> AppResult<u64>;

    async fn ping(&self) -> AppResult<()>;
}
