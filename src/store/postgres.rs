use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::LogBackend;
use crate::auth::session::Principal;
use crate::error::{AppError, AppResult};
use crate::models::collection::{ChildLists, Collection, HydratedLog};
use crate::models::daily_log::{DailyLog, LogFields};

// $4..$9 seed a new row, $10..$15 are the overlay applied on conflict.
const UPSERT_SQL: &str = r#"
    INSERT INTO daily_logs
        (id, user_id, log_date, mood, bm_count, bm_type, water_intake, exercise, notes)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (user_id, log_date) DO UPDATE SET
        mood = COALESCE($10, daily_logs.mood),
        bm_count = COALESCE($11, daily_logs.bm_count),
        bm_type = COALESCE($12, daily_logs.bm_type),
        water_intake = COALESCE($13, daily_logs.water_intake),
        exercise = COALESCE($14, daily_logs.exercise),
        notes = COALESCE($15, daily_logs.notes),
        updated_at = NOW()
    RETURNING *
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn hydrate(&self, logs: Vec<DailyLog>) -> AppResult<Vec<HydratedLog>> {
        if logs.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = logs.iter().map(|l| l.id).collect();

        let (mut symptoms, mut supplements, mut foods) = tokio::try_join!(
            self.names_for(&ids, Collection::Symptoms),
            self.names_for(&ids, Collection::Supplements),
            self.names_for(&ids, Collection::Foods),
        )?;

        Ok(logs
            .into_iter()
            .map(|log| {
                let lists = ChildLists {
                    symptoms: symptoms.remove(&log.id).unwrap_or_default(),
                    supplements: supplements.remove(&log.id).unwrap_or_default(),
                    foods: foods.remove(&log.id).unwrap_or_default(),
                };
                HydratedLog { log, lists }
            })
            .collect())
    }

    async fn names_for(
        &self,
        ids: &[Uuid],
        collection: Collection,
    ) -> AppResult<HashMap<Uuid, Vec<String>>> {
        let sql = format!(
            "SELECT log_id, {name} FROM {table} WHERE log_id = ANY($1) ORDER BY log_id, position",
            name = collection.name_column(),
            table = collection.table(),
        );
        let rows = sqlx::query_as::<_, (Uuid, String)>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_log: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (log_id, name) in rows {
            by_log.entry(log_id).or_default().push(name);
        }
        Ok(by_log)
    }
}

async fn upsert_row(
    conn: &mut PgConnection,
    principal: Principal,
    date: NaiveDate,
    fields: &LogFields,
) -> Result<DailyLog, sqlx::Error> {
    let seed = fields.with_defaults();
    sqlx::query_as::<_, DailyLog>(UPSERT_SQL)
        .bind(Uuid::new_v4())
        .bind(principal.id())
        .bind(date)
        .bind(seed.mood)
        .bind(seed.bm_count)
        .bind(seed.bm_type)
        .bind(seed.water_intake)
        .bind(&seed.exercise)
        .bind(&seed.notes)
        .bind(fields.mood)
        .bind(fields.bm_count)
        .bind(fields.bm_type)
        .bind(fields.water_intake)
        .bind(&fields.exercise)
        .bind(&fields.notes)
        .fetch_one(conn)
        .await
}

async fn delete_names(
    conn: &mut PgConnection,
    log_id: Uuid,
    collection: Collection,
) -> Result<u64, sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE log_id = $1", collection.table());
    let done = sqlx::query(&sql).bind(log_id).execute(conn).await?;
    Ok(done.rows_affected())
}

async fn insert_names(
    conn: &mut PgConnection,
    log_id: Uuid,
    collection: Collection,
    names: &[String],
) -> Result<(), sqlx::Error> {
    if names.is_empty() {
        return Ok(());
    }
    let sql = format!(
        r#"
        INSERT INTO {table} (log_id, {name}, position)
        SELECT $1, t.name, (t.ord - 1)::int
        FROM UNNEST($2::text[]) WITH ORDINALITY AS t(name, ord)
        "#,
        table = collection.table(),
        name = collection.name_column(),
    );
    sqlx::query(&sql).bind(log_id).bind(names).execute(conn).await?;
    Ok(())
}

#[async_trait]
impl LogBackend for PgStore {
    async fn fetch(
        &self,
        principal: Principal,
        date: NaiveDate,
    ) -> AppResult<Option<HydratedLog>> {
        let log = sqlx::query_as::<_, DailyLog>(
            "SELECT * FROM daily_logs WHERE user_id = $1 AND log_date = $2",
        )
        .bind(principal.id())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        match log {
            Some(log) => Ok(self.hydrate(vec![log]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
    ) -> AppResult<DailyLog> {
        let mut conn = self.pool.acquire().await?;
        Ok(upsert_row(&mut conn, principal, date, fields).await?)
    }

    async fn replace(
        &self,
        log_id: Uuid,
        collection: Collection,
        names: &[String],
    ) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let removed = delete_names(&mut conn, log_id, collection).await?;

        insert_names(&mut conn, log_id, collection, names)
            .await
            .map_err(|e| {
                tracing::error!(
                    %log_id,
                    %collection,
                    removed,
                    error = %e,
                    "Child insert failed after delete"
                );
                AppError::PartialWrite {
                    collection,
                    log_id,
                    reason: e.to_string(),
                }
            })
    }

    async fn save_day(
        &self,
        principal: Principal,
        date: NaiveDate,
        fields: &LogFields,
        lists: &[(Collection, Vec<String>)],
    ) -> AppResult<HydratedLog> {
        let mut tx = self.pool.begin().await?;

        let log = upsert_row(&mut tx, principal, date, fields).await?;
        for (collection, names) in lists {
            delete_names(&mut tx, log.id, *collection).await?;
            insert_names(&mut tx, log.id, *collection, names).await?;
        }

        tx.commit().await?;

        self.hydrate(vec![log])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("saved log vanished")))
    }

    async fn fetch_range(
        &self,
        principal: Principal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<HydratedLog>> {
        let logs = sqlx::query_as::<_, DailyLog>(
            r#"
            SELECT * FROM daily_logs
            WHERE user_id = $1 AND log_date BETWEEN $2 AND $3
            ORDER BY log_date DESC
            "#,
        )
        .bind(principal.id())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(logs).await
    }

    async fn fetch_all(&self, principal: Principal) -> AppResult<Vec<HydratedLog>> {
        let logs = sqlx::query_as::<_, DailyLog>(
            "SELECT * FROM daily_logs WHERE user_id = $1 ORDER BY log_date DESC",
        )
        .bind(principal.id())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(logs).await
    }

    async fn delete_day(&self, principal: Principal, date: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM daily_logs WHERE user_id = $1 AND log_date = $2")
            .bind(principal.id())
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, principal: Principal) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM daily_logs WHERE user_id = $1")
            .bind(principal.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

// Needs DATABASE_URL pointing at a disposable Postgres:
// `cargo test --features postgres-tests`
#[cfg(all(test, feature = "postgres-tests"))]
mod tests {
    use super::*;
    use crate::models::daily_log::{WriteMode, DEFAULT_BM_TYPE, DEFAULT_MOOD};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn mood(m: i32) -> LogFields {
        LogFields {
            mood: Some(m),
            ..Default::default()
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_upsert_conflict_overlays_existing_row(pool: PgPool) {
        let store = PgStore::new(pool);
        let principal = Principal::new(Uuid::new_v4());

        let first = store
            .upsert(principal, date(15), &mood(8).overlay(WriteMode::Replace))
            .await
            .unwrap();
        assert_eq!(first.mood, 8);
        assert_eq!(first.bm_type, DEFAULT_BM_TYPE);

        let merged = store
            .upsert(
                principal,
                date(15),
                &LogFields {
                    water_intake: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.mood, 8);
        assert_eq!(merged.water_intake, 3);
        assert_eq!(merged.created_at, first.created_at);
        assert!(merged.updated_at >= first.updated_at);

        let reset = store
            .upsert(principal, date(15), &LogFields::default().overlay(WriteMode::Replace))
            .await
            .unwrap();
        assert_eq!(reset.mood, DEFAULT_MOOD);
        assert_eq!(reset.water_intake, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_child_lists_keep_order_and_duplicates(pool: PgPool) {
        let store = PgStore::new(pool);
        let principal = Principal::new(Uuid::new_v4());
        let lists = vec![
            (Collection::Symptoms, names(&["Gas", "Bloating"])),
            (Collection::Foods, names(&["Rice", "Dairy", "Dairy", "Apple"])),
        ];

        let saved = store
            .save_day(principal, date(15), &mood(6), &lists)
            .await
            .unwrap();
        assert_eq!(saved.lists.foods, names(&["Rice", "Dairy", "Dairy", "Apple"]));

        store
            .replace(saved.log.id, Collection::Symptoms, &[])
            .await
            .unwrap();
        let day = store.fetch(principal, date(15)).await.unwrap().unwrap();
        assert!(day.lists.symptoms.is_empty());
        assert_eq!(day.lists.foods.len(), 4);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_range_hydrates_every_log_newest_first(pool: PgPool) {
        let store = PgStore::new(pool);
        let principal = Principal::new(Uuid::new_v4());
        let stranger = Principal::new(Uuid::new_v4());

        for (d, symptom) in [(3, "Gas"), (10, "Cramps"), (20, "Nausea")] {
            store
                .save_day(
                    principal,
                    date(d),
                    &mood(5),
                    &[(Collection::Symptoms, names(&[symptom]))],
                )
                .await
                .unwrap();
        }
        store
            .save_day(stranger, date(10), &mood(5), &[])
            .await
            .unwrap();

        let range = store
            .fetch_range(principal, date(1), date(31))
            .await
            .unwrap();
        let dates: Vec<NaiveDate> = range.iter().map(|l| l.log.log_date).collect();
        assert_eq!(dates, vec![date(20), date(10), date(3)]);
        assert_eq!(range[1].lists.symptoms, names(&["Cramps"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_day_cascades_to_children(pool: PgPool) {
        let store = PgStore::new(pool.clone());
        let principal = Principal::new(Uuid::new_v4());
        let saved = store
            .save_day(
                principal,
                date(15),
                &mood(5),
                &[(Collection::Foods, names(&["Dairy"]))],
            )
            .await
            .unwrap();

        assert!(store.delete_day(principal, date(15)).await.unwrap());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM foods WHERE log_id = $1")
            .bind(saved.log.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
