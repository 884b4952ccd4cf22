//! PostgreSQL event storage.
//!
//! Event bodies live in `events_json(id text PRIMARY KEY, event jsonb)`, which belongs
//! to the event database itself; this module only creates the two thresholding tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgPool;
use tracing::debug;

use super::{EventStorage, InsertOutcome};
use crate::error::Result;
use crate::event::Event;
use crate::types::{RelapsedEvent, Severity};

const SCHEMA: &[&str] = &[
  "CREATE TABLE IF NOT EXISTS thresholds(id text PRIMARY KEY, thresholdtime timestamptz NOT NULL, relapsetime timestamptz NOT NULL, ttltime timestamptz NOT NULL)",
  "CREATE TABLE IF NOT EXISTS events_thresholded(eventid text NOT NULL, keyid text NOT NULL, groupname text NOT NULL, eventseverity text NOT NULL, createtime timestamptz NOT NULL, PRIMARY KEY(eventid, keyid))",
  "CREATE INDEX IF NOT EXISTS thresholds_thresholdtime_idx ON thresholds USING BTREE (thresholdtime)",
  "CREATE INDEX IF NOT EXISTS thresholds_relapsetime_idx ON thresholds USING BTREE (relapsetime)",
  "CREATE INDEX IF NOT EXISTS thresholds_ttltime_idx ON thresholds USING BTREE (ttltime)",
  "CREATE INDEX IF NOT EXISTS events_thresholded_combined_idx ON events_thresholded USING BTREE (groupname, eventseverity)",
  "CREATE INDEX IF NOT EXISTS events_thresholded_createtime_idx ON events_thresholded USING BTREE (createtime)",
];

/// Event storage backed by a PostgreSQL pool. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgEventStore {
  pool: PgPool,
}

impl PgEventStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPool::connect(database_url).await?;
    Ok(Self::new(pool))
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Create thresholding tables and indexes if missing.
  pub async fn create_schema(&self) -> Result<()> {
    for statement in SCHEMA {
      query(statement).execute(&self.pool).await?;
    }
    debug!("thresholding schema ready");
    Ok(())
  }
}

fn outcome(rows_affected: u64) -> InsertOutcome {
  if rows_affected == 0 {
    InsertOutcome::AlreadyExists
  } else {
    InsertOutcome::Created
  }
}

#[async_trait]
impl EventStorage for PgEventStore {
  async fn threshold_check(&self, key: &str, ttl: DateTime<Utc>) -> Result<bool> {
    let row = query("SELECT 1 FROM thresholds WHERE id = $1 AND ttltime >= $2")
      .bind(key)
      .bind(ttl)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.is_some())
  }

  async fn threshold_set(
    &self,
    key: &str,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<InsertOutcome> {
    // The conflicting row is only replaced once it has expired (same `<=` as the
    // relapse search); a live row wins.
    let result = query(
      r#"
      INSERT INTO thresholds (id, thresholdtime, relapsetime, ttltime)
      VALUES ($1, $2, $3, $4)
      ON CONFLICT (id) DO UPDATE SET
        thresholdtime = EXCLUDED.thresholdtime,
        relapsetime = EXCLUDED.relapsetime,
        ttltime = EXCLUDED.ttltime
      WHERE thresholds.ttltime <= EXCLUDED.thresholdtime
      "#,
    )
    .bind(key)
    .bind(threshold_time)
    .bind(relapse_time)
    .bind(ttl)
    .execute(&self.pool)
    .await?;
    Ok(outcome(result.rows_affected()))
  }

  async fn threshold_save(
    &self,
    event_id: &str,
    key: &str,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<InsertOutcome> {
    let result = query(
      r#"
      INSERT INTO events_thresholded (eventid, keyid, groupname, eventseverity, createtime)
      VALUES ($1, $2, $3, $4, $5)
      ON CONFLICT (eventid, keyid) DO NOTHING
      "#,
    )
    .bind(event_id)
    .bind(key)
    .bind(group_name)
    .bind(severity.as_str())
    .bind(created_time)
    .execute(&self.pool)
    .await?;
    Ok(outcome(result.rows_affected()))
  }

  async fn search_relapsed_events(
    &self,
    group_name: &str,
    severity: Severity,
    ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>> {
    let rows = query(
      r#"
      SELECT events_json.event AS event,
             ARRAY_AGG(events_thresholded.keyid ORDER BY events_thresholded.keyid) AS keyids
      FROM events_json
      INNER JOIN events_thresholded ON events_json.id = events_thresholded.eventid
      INNER JOIN thresholds ON events_thresholded.keyid = thresholds.id
      WHERE events_thresholded.groupname = $1
        AND events_thresholded.eventseverity = $2
        AND events_thresholded.createtime >= thresholds.relapsetime
        AND thresholds.ttltime <= $3
      GROUP BY events_json.id
      ORDER BY events_json.id
      "#,
    )
    .bind(group_name)
    .bind(severity.as_str())
    .bind(ttl)
    .fetch_all(&self.pool)
    .await?;

    let mut relapsed = Vec::with_capacity(rows.len());
    for row in rows {
      let event: serde_json::Value = row.try_get("event")?;
      let keys: Vec<String> = row.try_get("keyids")?;
      relapsed.push(RelapsedEvent {
        event: Event::new(event),
        keys,
      });
    }
    Ok(relapsed)
  }

  async fn thresholds_clean(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = query("DELETE FROM thresholds WHERE ttltime <= $1")
      .bind(cutoff)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }

  async fn thresholded_events_clean(&self) -> Result<u64> {
    let orphaned = query(
      "DELETE FROM events_thresholded WHERE NOT EXISTS (SELECT 1 FROM thresholds WHERE thresholds.id = events_thresholded.keyid)",
    )
    .execute(&self.pool)
    .await?
    .rows_affected();

    let stale = query(
      "DELETE FROM events_thresholded USING thresholds WHERE events_thresholded.keyid = thresholds.id AND events_thresholded.createtime < thresholds.thresholdtime",
    )
    .execute(&self.pool)
    .await?
    .rows_affected();

    debug!(orphaned, stale, "cleaned thresholded events");
    Ok(orphaned + stale)
  }

  async fn thresholds_count(&self) -> Result<u64> {
    let row = query("SELECT count(*) AS n FROM thresholds")
      .fetch_one(&self.pool)
      .await?;
    let n: i64 = row.try_get("n")?;
    Ok(n.max(0) as u64)
  }

  async fn thresholded_events_count(&self) -> Result<u64> {
    let row = query("SELECT count(*) AS n FROM events_thresholded")
      .fetch_one(&self.pool)
      .await?;
    let n: i64 = row.try_get("n")?;
    Ok(n.max(0) as u64)
  }
}
