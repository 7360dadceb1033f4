//! Durable [`SignalStore`] backed by the `signals` and `signal_history`
//! tables.
//!
//! Every write that pairs a patch with a snapshot runs in one transaction,
//! and the signal row is locked (`FOR UPDATE`) while the patch is applied,
//! so a reader never sees a half-written cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalgrid_core::store::{blank_signal, round_one_decimal};
use signalgrid_core::{SignalStore, StoreError};
use signalgrid_types::{
    Analytics, Density, HistoryId, HistorySnapshot, NewSignal, NewSnapshot, PeakReading, Signal,
    SignalId, SignalPatch, SignalRanking,
};
use signalgrid_core::config::StoreConfig;
use sqlx::{PgConnection, PgPool};

use crate::error::DbError;
use crate::pool;

/// A row from the `signals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    /// Auto-incremented signal id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Intersection description.
    pub location: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Current demand.
    pub vehicle_count: i32,
    /// Green duration in seconds.
    pub green_time: i32,
    /// Density label.
    pub density: String,
    /// Phase label.
    pub current_phase: String,
    /// Seconds left in the cycle.
    pub countdown: i32,
    /// Emergency flag.
    pub emergency: bool,
}

impl TryFrom<SignalRow> for Signal {
    type Error = DbError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SignalId::new(row.id),
            name: row.name,
            location: row.location,
            lat: row.lat,
            lng: row.lng,
            vehicle_count: from_db(row.vehicle_count, "vehicle_count")?,
            green_time: from_db(row.green_time, "green_time")?,
            density: row
                .density
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
            current_phase: row
                .current_phase
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
            countdown: from_db(row.countdown, "countdown")?,
            emergency: row.emergency,
        })
    }
}

/// A row from the `signal_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    /// Auto-incremented row id.
    pub id: i64,
    /// Owning signal.
    pub signal_id: i64,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Vehicle count at the time.
    pub vehicle_count: i32,
    /// Green duration at the time.
    pub green_time: i32,
    /// Density label at the time.
    pub density: String,
}

impl TryFrom<HistoryRow> for HistorySnapshot {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: HistoryId::new(row.id),
            signal_id: SignalId::new(row.signal_id),
            timestamp: row.timestamp,
            vehicle_count: from_db(row.vehicle_count, "vehicle_count")?,
            green_time: from_db(row.green_time, "green_time")?,
            density: parse_density(&row.density)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RankingRow {
    id: i64,
    name: String,
    total_snapshots: i64,
    avg_vehicles: f64,
    peak_vehicles: i32,
    min_vehicles: i32,
}

/// [`SignalStore`] over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    /// Connect per `config`, migrate the schema, and wrap the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if connecting or migrating fails.
    pub async fn open(config: &StoreConfig) -> Result<Self, DbError> {
        let db = pool::connect(config).await?;
        pool::migrate(&db).await?;
        Ok(Self { pool: db })
    }

    /// Wrap a pool whose schema is already migrated.
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Signal database closed");
    }

    async fn fetch_signals(&self) -> Result<Vec<Signal>, DbError> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r"SELECT id, name, location, lat, lng, vehicle_count, green_time,
                     density, current_phase, countdown, emergency
              FROM signals
              ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Signal::try_from).collect()
    }

    async fn fetch_signal(&self, id: SignalId) -> Result<Signal, DbError> {
        let row = sqlx::query_as::<_, SignalRow>(
            r"SELECT id, name, location, lat, lng, vehicle_count, green_time,
                     density, current_phase, countdown, emergency
              FROM signals
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound(id))?;

        Signal::try_from(row)
    }

    async fn insert(
        &self,
        new: &NewSignal,
        timing: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, DbError> {
        let draft = timing.applied(&blank_signal(SignalId::new(0), new));
        let mut tx = self.pool.begin().await?;

        let (raw_id,): (i64,) = sqlx::query_as(
            r"INSERT INTO signals
              (name, location, lat, lng, vehicle_count, green_time, density,
               current_phase, countdown, emergency)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
              RETURNING id",
        )
        .bind(&draft.name)
        .bind(&draft.location)
        .bind(draft.lat)
        .bind(draft.lng)
        .bind(to_db(draft.vehicle_count)?)
        .bind(to_db(draft.green_time)?)
        .bind(draft.density.as_str())
        .bind(draft.current_phase.as_str())
        .bind(to_db(draft.countdown)?)
        .bind(draft.emergency)
        .fetch_one(&mut *tx)
        .await?;

        let id = SignalId::new(raw_id);
        if let Some(snapshot) = snapshot {
            insert_history(&mut tx, id, snapshot).await?;
        }
        tx.commit().await?;

        tracing::debug!(signal_id = %id, "Inserted signal");
        Ok(Signal { id, ..draft })
    }

    async fn remove(&self, id: SignalId) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM signals WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id));
        }
        Ok(())
    }

    async fn persist(
        &self,
        id: SignalId,
        patch: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SignalRow>(
            r"SELECT id, name, location, lat, lng, vehicle_count, green_time,
                     density, current_phase, countdown, emergency
              FROM signals
              WHERE id = $1
              FOR UPDATE",
        )
        .bind(id.into_inner())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound(id))?;

        let next = patch.applied(&Signal::try_from(row)?);

        sqlx::query(
            r"UPDATE signals SET
                lat = $2, lng = $3, vehicle_count = $4, green_time = $5,
                density = $6, current_phase = $7, countdown = $8, emergency = $9
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(next.lat)
        .bind(next.lng)
        .bind(to_db(next.vehicle_count)?)
        .bind(to_db(next.green_time)?)
        .bind(next.density.as_str())
        .bind(next.current_phase.as_str())
        .bind(to_db(next.countdown)?)
        .bind(next.emergency)
        .execute(&mut *tx)
        .await?;

        if let Some(snapshot) = snapshot {
            insert_history(&mut tx, id, snapshot).await?;
        }
        tx.commit().await?;

        Ok(next)
    }

    async fn fetch_history(
        &self,
        id: SignalId,
        limit: usize,
    ) -> Result<Vec<HistorySnapshot>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, HistoryRow>(
            r"SELECT id, signal_id, timestamp, vehicle_count, green_time, density
              FROM (
                  SELECT id, signal_id, timestamp, vehicle_count, green_time, density
                  FROM signal_history
                  WHERE signal_id = $1
                  ORDER BY id DESC
                  LIMIT $2
              ) recent
              ORDER BY id ASC",
        )
        .bind(id.into_inner())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistorySnapshot::try_from).collect()
    }

    async fn summarize(&self) -> Result<Analytics, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let (total, sum): (i64, i64) = sqlx::query_as(
            r"SELECT COUNT(*), COALESCE(SUM(vehicle_count), 0)::BIGINT
              FROM signal_history",
        )
        .fetch_one(&mut *tx)
        .await?;

        let peak: Option<(i64, i32, DateTime<Utc>)> = sqlx::query_as(
            r"SELECT signal_id, vehicle_count, timestamp
              FROM signal_history
              ORDER BY vehicle_count DESC, id ASC
              LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let rankings = sqlx::query_as::<_, RankingRow>(
            r"SELECT s.id, s.name,
                     COUNT(h.id) AS total_snapshots,
                     COALESCE(AVG(h.vehicle_count), 0)::DOUBLE PRECISION AS avg_vehicles,
                     COALESCE(MAX(h.vehicle_count), 0) AS peak_vehicles,
                     COALESCE(MIN(h.vehicle_count), 0) AS min_vehicles
              FROM signals s
              LEFT JOIN signal_history h ON h.signal_id = s.id
              GROUP BY s.id, s.name
              ORDER BY avg_vehicles DESC, s.id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let densities: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT density, COUNT(*)
              FROM signal_history
              GROUP BY density",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let peak = peak
            .map(|(signal_id, vehicle_count, timestamp)| {
                Ok::<_, DbError>(PeakReading {
                    signal_id: SignalId::new(signal_id),
                    vehicle_count: from_db(vehicle_count, "vehicle_count")?,
                    timestamp,
                })
            })
            .transpose()?;

        let signal_rankings = rankings
            .into_iter()
            .map(|row| {
                Ok(SignalRanking {
                    id: SignalId::new(row.id),
                    name: row.name,
                    total_snapshots: count_from_db(row.total_snapshots),
                    avg_vehicles: row.avg_vehicles,
                    peak_vehicles: from_db(row.peak_vehicles, "peak_vehicles")?,
                    min_vehicles: from_db(row.min_vehicles, "min_vehicles")?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let density_distribution = densities
            .into_iter()
            .map(|(label, count)| Ok((parse_density(&label)?, count_from_db(count))))
            .collect::<Result<_, DbError>>()?;

        Ok(Analytics {
            total_snapshots: count_from_db(total),
            peak,
            average_vehicles: round_one_decimal(mean(sum, total)),
            signal_rankings,
            density_distribution,
        })
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self.fetch_signals().await?)
    }

    async fn get_signal(&self, id: SignalId) -> Result<Signal, StoreError> {
        Ok(self.fetch_signal(id).await?)
    }

    async fn insert_signal(
        &self,
        new: &NewSignal,
        timing: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError> {
        Ok(self.insert(new, timing, snapshot).await?)
    }

    async fn delete_signal(&self, id: SignalId) -> Result<(), StoreError> {
        Ok(self.remove(id).await?)
    }

    async fn persist_signal(
        &self,
        id: SignalId,
        patch: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError> {
        Ok(self.persist(id, patch, snapshot).await?)
    }

    async fn list_history(
        &self,
        id: SignalId,
        limit: usize,
    ) -> Result<Vec<HistorySnapshot>, StoreError> {
        Ok(self.fetch_history(id, limit).await?)
    }

    async fn analytics(&self) -> Result<Analytics, StoreError> {
        Ok(self.summarize().await?)
    }
}

async fn insert_history(
    conn: &mut PgConnection,
    id: SignalId,
    snapshot: &NewSnapshot,
) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO signal_history (signal_id, timestamp, vehicle_count, green_time, density)
          VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id.into_inner())
    .bind(snapshot.timestamp)
    .bind(to_db(snapshot.vehicle_count)?)
    .bind(to_db(snapshot.green_time)?)
    .bind(snapshot.density.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

fn to_db(value: u32) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|e| DbError::Decode(format!("{value} does not fit INTEGER: {e}")))
}

fn from_db(value: i32, column: &str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|e| DbError::Decode(format!("negative {column} {value}: {e}")))
}

fn count_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn parse_density(label: &str) -> Result<Density, DbError> {
    label.parse().map_err(|e| DbError::Decode(format!("{e}")))
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use signalgrid_types::Phase;

    use super::*;

    fn row() -> SignalRow {
        SignalRow {
            id: 3,
            name: "Signal-C".to_owned(),
            location: "Ukkadam Bus Stop".to_owned(),
            lat: 10.9925,
            lng: 76.961,
            vehicle_count: 33,
            green_time: 45,
            density: "Medium".to_owned(),
            current_phase: "yellow".to_owned(),
            countdown: 7,
            emergency: false,
        }
    }

    #[test]
    fn signal_row_decodes() {
        let signal = Signal::try_from(row()).unwrap();
        assert_eq!(signal.id, SignalId::new(3));
        assert_eq!(signal.density, Density::Medium);
        assert_eq!(signal.current_phase, Phase::Yellow);
        assert_eq!(signal.countdown, 7);
    }

    #[test]
    fn bad_labels_are_decode_errors() {
        let mut bad = row();
        bad.current_phase = "purple".to_owned();
        assert!(matches!(Signal::try_from(bad), Err(DbError::Decode(_))));

        let mut negative = row();
        negative.countdown = -1;
        assert!(matches!(Signal::try_from(negative), Err(DbError::Decode(_))));
    }

    #[test]
    fn not_found_survives_the_store_boundary() {
        let id = SignalId::new(9);
        assert_eq!(StoreError::from(DbError::NotFound(id)), StoreError::NotFound(id));
        assert!(matches!(
            StoreError::from(DbError::Config("bad".to_owned())),
            StoreError::Transient(_)
        ));
    }
}
