use std::collections::BTreeMap;
#[cfg(test)]
use std::sync::Mutex;
#[cfg(test)]
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
#[cfg(test)]
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::LogBackend;
use crate::auth::session::Principal;
use crate::error::{AppError, AppResult};
use crate::models::collection::{ChildLists, Collection, HydratedLog};
use crate::models::daily_log::{DailyLog, LogFields};

/// Where an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Read,
    Upsert,
    DeleteChildren,
    InsertChildren,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with a connection-level I/O error.
    Unavailable,
    /// Sleep before continuing normally.
    Stall(Duration),
}

// id and created_at only feed the checksum
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Clone)]
struct ChildRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    logs: BTreeMap<(Principal, NaiveDate), DailyLog>,
    children: BTreeMap<(Uuid, Collection), Vec<ChildRow>>,
}

impl MemoryState {
    fn hydrate(&self, log: &DailyLog) -> HydratedLog {
        let mut lists = ChildLists::default();
        for collection in Collection::ALL {
            let names = self
                .children
                .get(&(log.id, collection))
                .map(|rows| rows.iter().map(|r| r.name.clone()).collect())
                .unwrap_or_default();
            lists.set(collection, names);
        }
        HydratedLog {
            log: log.clone(),
            lists,
        }
    }

    fn upsert(&mut self, principal: Principal, date: NaiveDate, fields: &LogFields) -> DailyLog {
        let now = Utc::now();
        let log = self.logs.entry((principal, date)).or_insert_with(|| {
            let seed = fields.with_defaults();
            DailyLog {
                id: Uuid::new_v4(),
                user_id: principal.id(),
                log_date: date,
                mood: seed.mood,
                bm_count: seed.bm_count,
                bm_type: seed.bm_type,
                water_intake: seed.water_intake,
                exercise: seed.exercise,
                notes: seed.notes,
                created_at: now,
                updated_at: now,
            }
        });
        fields.apply_to(log);
        log.updated_at = now;
        log.clone()
    }

    fn delete_children(&mut self, log_id: Uuid, collection: Collection) {
        self.children.remove(&(log_id, collection));
    }

    fn insert_children(&mut self, log_id: Uuid, collection: Collection, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let now = Utc::now();
        let rows = names
            .iter()
            .map(|name| ChildRow {
                id: Uuid::new_v4(),
                name: name.clone(),
                created_at: now,
            })
            .collect();
        self.children.insert((log_id, collection), rows);
    }

    fn delete_log(&mut self, key: &(Principal, NaiveDate)) -> bool {
        match self.logs.remove(key) {
            Some(log) => {
                for collection in Collection::ALL {
                    self.children.remove(&(log.id, collection));
                }
                true
            }
            None => false,
        }
    }

    fn newest_first<'a>(&self, logs: impl Iterator<Item = &'a DailyLog>) -> Vec<HydratedLog> {
        let mut out: Vec<HydratedLog> = logs.map(|log| self.hydrate(log)).collect();
        out.sort_by(|a, b| b.log.log_date.cmp(&a.log.log_date));
        out
    }
}

/// Process-local backend. Data does not survive a restart.
///
/// Faults queued with [`MemoryStore::inject`] fire once each, in order, the
/// next time their point is reached.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    #[cfg(test)]
    faults: Mutex<Vec<(FaultPoint, Fault)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn inject(&self, point: FaultPoint, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push((point, fault));
        }
    }

    /// SHA-256 over every stored row, for before/after comparisons.
    #[cfg(test)]
    pub async fn checksum(&self) -> String {
        let state = self.state.read().await;
        let mut hasher = Sha256::new();
        for (key, log) in &state.logs {
            hasher.update(format!("{:?}|{:?}\n", key, log).as_bytes());
        }
        for ((log_id, collection), rows) in &state.children {
            for row in rows {
                hasher.update(
                    format!(
                        "{}|{}|{}|{}|{}\n",
                        log_id,
                        collection,
                        row.id,
                        row.name,
                        row.created_at.to_rfc3339()
                    )
                    .as_bytes(),
                );
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Number of stored rows in one child collection of a log.
    #[cfg(test)]
    pub async fn child_count(&self, log_id: Uuid, collection: Collection) -> usize {
        self.state
            .read()
            .await
            .children
            .get(&(log_id, collection))
            .map_or(0, Vec::len)
    }

    #[cfg(test)]
    fn take_fault(&self, point: FaultPoint) -> Option<Fault> {
        let mut faults = self.faults.lock().ok()?;
        let idx = faults.iter().position(|(p, _)| *p == point)?;
        Some(faults.remove(idx).1)
    }

    #[cfg(not(test))]
    async fn trip(&self, _point: FaultPoint) -> AppResult<()> {
        Ok(())
    }

    #[cfg(test)]
    async fn trip(&self, point: FaultPoint) -> AppResult<()> {
        match self.take_fault(point) {
            None => Ok(()),
            Some(Fault::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Some(Fault::Unavailable) => {
                tracing::debug!(?point, "Injected store fault");
                Err(AppError::Database(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    format!("injected fault at {:?}", point),
                ))))
            }
        }
    }
}

#[async_trait]
impl LogBackend for MemoryStore {
    async fn fetch(
        &self,
        principal: Principal,
        date: NaiveDate,
    ) -> AppResult<Option<HydratedLog>> {
        self.trip(FaultPoint::Read).await?;
        let state = self.state.read().await;
        Ok(state.logs.get(&(principal, date)).map(|log| state.hydrate(log)))
    }

    async fn upsert(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
    ) -> AppResult<DailyLog> {
        self.trip(FaultPoint::Upsert).await?;
        Ok(self.state.write().await.upsert(principal, date, fields))
    }

    async fn replace(
        &self,
        log_id: Uuid,
        collection: Collection,
        names: &[String],
    ) -> AppResult<()> {
        self.trip(FaultPoint::DeleteChildren).await?;
        self.state.write().await.delete_children(log_id, collection);

        if let Err(e) = self.trip(FaultPoint::InsertChildren).await {
            tracing::error!(%log_id, %collection, error = %e, "Child insert failed after delete");
            return Err(AppError::PartialWrite {
                collection,
                log_id,
                reason: e.to_string(),
            });
        }
        self.state
            .write()
            .await
            .insert_children(log_id, collection, names);
        Ok(())
    }

    async fn save_day(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
        lists: &[(Collection, Vec<String>)],
    ) -> AppResult<HydratedLog> {
        let mut state = self.state.write().await;
        // Work on a copy so any failure leaves the committed state untouched.
        let mut draft = state.clone();

        self.trip(FaultPoint::Upsert).await?;
        let log = draft.upsert(principal, date, fields);
        for (collection, names) in lists {
            self.trip(FaultPoint::DeleteChildren).await?;
            draft.delete_children(log.id, *collection);
            self.trip(FaultPoint::InsertChildren).await?;
            draft.insert_children(log.id, *collection, names);
        }

        let saved = draft.hydrate(&log);
        *state = draft;
        Ok(saved)
    }

    async fn fetch_range(
        &self,
        principal: Principal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<HydratedLog>> {
        self.trip(FaultPoint::Read).await?;
        if start > end {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        Ok(state.newest_first(
            state
                .logs
                .range((principal, start)..=(principal, end))
                .map(|(_, log)| log),
        ))
    }

    async fn fetch_all(&self, principal: Principal) -> AppResult<Vec<HydratedLog>> {
        self.trip(FaultPoint::Read).await?;
        let state = self.state.read().await;
        Ok(state.newest_first(
            state
                .logs
                .iter()
                .filter(|((owner, _), _)| *owner == principal)
                .map(|(_, log)| log),
        ))
    }

    async fn delete_day(&self, principal: Principal, date: NaiveDate) -> AppResult<bool> {
        self.trip(FaultPoint::Upsert).await?;
        Ok(self.state.write().await.delete_log(&(principal, date)))
    }

    async fn delete_all(&self, principal: Principal) -> AppResult<u64> {
        self.trip(FaultPoint::Upsert).await?;
        let mut state = self.state.write().await;
        let keys: Vec<_> = state
            .logs
            .keys()
            .filter(|(owner, _)| *owner == principal)
            .copied()
            .collect();
        let mut deleted = 0;
        for key in &keys {
            if state.delete_log(key) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> AppResult<()> {
        self.trip(FaultPoint::Read).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal::new(Uuid::new_v4())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_day() {
        let store = MemoryStore::new();
        let p = principal();

        let first = store
            .upsert(p, day(15), &LogFields { mood: Some(7), ..Default::default() })
            .await
            .unwrap();
        let second = store
            .upsert(p, day(15), &LogFields { mood: Some(3), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.mood, 3);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.fetch_all(p).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_is_full_replacement() {
        let store = MemoryStore::new();
        let p = principal();
        let log = store.upsert(p, day(15), &LogFields::default()).await.unwrap();

        store
            .replace(log.id, Collection::Symptoms, &names(&["Gas", "Bloating"]))
            .await
            .unwrap();
        assert_eq!(store.child_count(log.id, Collection::Symptoms).await, 2);

        store.replace(log.id, Collection::Symptoms, &[]).await.unwrap();
        assert_eq!(store.child_count(log.id, Collection::Symptoms).await, 0);
    }

    #[tokio::test]
    async fn test_replace_preserves_duplicates_and_order() {
        let store = MemoryStore::new();
        let p = principal();
        let log = store.upsert(p, day(15), &LogFields::default()).await.unwrap();

        store
            .replace(log.id, Collection::Foods, &names(&["Rice", "Dairy", "Rice"]))
            .await
            .unwrap();

        let hydrated = store.fetch(p, day(15)).await.unwrap().unwrap();
        assert_eq!(hydrated.lists.foods, names(&["Rice", "Dairy", "Rice"]));
        assert!(hydrated.lists.symptoms.is_empty());
    }

    #[tokio::test]
    async fn test_fault_between_delete_and_insert_leaves_list_empty() {
        let store = MemoryStore::new();
        let p = principal();
        let log = store.upsert(p, day(15), &LogFields::default()).await.unwrap();
        store
            .replace(log.id, Collection::Symptoms, &names(&["Gas"]))
            .await
            .unwrap();

        store.inject(FaultPoint::InsertChildren, Fault::Unavailable);
        let err = store
            .replace(log.id, Collection::Symptoms, &names(&["Cramping", "Nausea"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::PartialWrite { collection: Collection::Symptoms, .. }
        ));
        assert_eq!(store.child_count(log.id, Collection::Symptoms).await, 0);
    }

    #[tokio::test]
    async fn test_save_day_rolls_back_on_fault() {
        let store = MemoryStore::new();
        let p = principal();
        let lists = vec![
            (Collection::Symptoms, names(&["Gas"])),
            (Collection::Foods, names(&["Dairy"])),
        ];
        store
            .save_day(p, day(15), &LogFields { mood: Some(8), ..Default::default() }, &lists)
            .await
            .unwrap();
        let before = store.checksum().await;

        store.inject(FaultPoint::InsertChildren, Fault::Unavailable);
        let result = store
            .save_day(
                p,
                day(15),
                &LogFields { mood: Some(2), ..Default::default() },
                &[(Collection::Symptoms, names(&["Nausea"]))],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.checksum().await, before);
        let kept = store.fetch(p, day(15)).await.unwrap().unwrap();
        assert_eq!(kept.log.mood, 8);
        assert_eq!(kept.lists.symptoms, names(&["Gas"]));
    }

    #[tokio::test]
    async fn test_range_is_newest_first_and_scoped_to_principal() {
        let store = MemoryStore::new();
        let p = principal();
        let other = principal();
        for d in [13, 15, 14, 2] {
            store.upsert(p, day(d), &LogFields::default()).await.unwrap();
        }
        store.upsert(other, day(14), &LogFields::default()).await.unwrap();

        let logs = store.fetch_range(p, day(10), day(31)).await.unwrap();
        let dates: Vec<_> = logs.iter().map(|l| l.log.log_date).collect();
        assert_eq!(dates, vec![day(15), day(14), day(13)]);
        assert!(logs.iter().all(|l| l.log.user_id == p.id()));
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let store = MemoryStore::new();
        let p = principal();
        store.upsert(p, day(15), &LogFields::default()).await.unwrap();
        assert!(store.fetch_range(p, day(20), day(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_day_cascades_to_children() {
        let store = MemoryStore::new();
        let p = principal();
        let saved = store
            .save_day(
                p,
                day(15),
                &LogFields::default(),
                &[(Collection::Supplements, names(&["Fiber"]))],
            )
            .await
            .unwrap();

        assert!(store.delete_day(p, day(15)).await.unwrap());
        assert_eq!(store.child_count(saved.log.id, Collection::Supplements).await, 0);
        assert!(!store.delete_day(p, day(15)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_only_touches_owner() {
        let store = MemoryStore::new();
        let p = principal();
        let other = principal();
        store.upsert(p, day(1), &LogFields::default()).await.unwrap();
        store.upsert(p, day(2), &LogFields::default()).await.unwrap();
        store.upsert(other, day(1), &LogFields::default()).await.unwrap();

        assert_eq!(store.delete_all(p).await.unwrap(), 2);
        assert!(store.fetch_all(p).await.unwrap().is_empty());
        assert_eq!(store.fetch_all(other).await.unwrap().len(), 1);
    }
}
