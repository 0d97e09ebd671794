//! SQLite implementation of OpportunityStorage.

use crate::domain::{Opportunity, Venue};
use crate::storage::{OpportunityStorage, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(300);

const SELECT_COLUMNS: &str = "SELECT id, symbol, buy_venue, sell_venue, buy_price, sell_price, \
     spread_percent, notional, quantity, gross_profit, buy_fee, sell_fee, network_fee, \
     total_fees, net_profit, net_profit_percent, timestamp FROM opportunities";

/// SqliteStorage implements OpportunityStorage using SQLite.
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
    dedup_window: Duration,
}

/// SqliteStorageConfig holds SQLite storage configuration.
#[derive(Debug, Clone)]
pub struct SqliteStorageConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Repeats of an opportunity inside one window are not stored again.
    pub dedup_window: Duration,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            path: "data/opportunities.db".to_string(),
            max_connections: 5,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

impl SqliteStorageConfig {
    /// Creates settings from the `storage` section, filling in defaults.
    pub fn from_config(config: &crate::config::StorageConfig) -> Self {
        let defaults = Self::default();
        Self {
            path: config.path.clone().unwrap_or(defaults.path),
            max_connections: defaults.max_connections,
            dedup_window: if config.dedup_window.is_zero() {
                defaults.dedup_window
            } else {
                config.dedup_window
            },
        }
    }
}

impl SqliteStorage {
    /// Creates a new SQLite storage instance, creating the parent directory if needed.
    pub async fn new(config: SqliteStorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let storage = Self {
            pool,
            dedup_window: config.dedup_window,
        };

        storage.migrate().await?;

        info!(path = %config.path, "SQLite storage initialized");
        Ok(storage)
    }

    /// Runs database migrations to create the schema.
    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS opportunities (
                id TEXT PRIMARY KEY,
                unique_hash TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                buy_venue TEXT NOT NULL,
                sell_venue TEXT NOT NULL,
                buy_price TEXT NOT NULL,
                sell_price TEXT NOT NULL,
                spread_percent TEXT NOT NULL,
                notional TEXT NOT NULL,
                quantity TEXT NOT NULL,
                gross_profit TEXT NOT NULL,
                buy_fee TEXT NOT NULL,
                sell_fee TEXT NOT NULL,
                network_fee TEXT NOT NULL,
                total_fees TEXT NOT NULL,
                net_profit TEXT NOT NULL,
                net_profit_percent TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_opportunities_symbol ON opportunities(symbol)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_opportunities_timestamp ON opportunities(timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Generates a unique hash for detecting repeated opportunities.
///
/// An opportunity is unique based on: symbol, buy venue, sell venue,
/// net profit percent (rounded to 2 decimals), and the dedup window its
/// timestamp falls into. A spread that persists is stored once per window.
fn generate_unique_hash(opp: &Opportunity, window: Duration) -> String {
    let profit_rounded = opp.net_profit_percent.round_dp(2).normalize().to_string();

    let window_secs = window.as_secs().max(1) as i64;
    let bucket = opp.timestamp.timestamp().div_euclid(window_secs);

    let data = format!(
        "{}|{}|{}|{}|{}",
        opp.symbol, opp.buy_venue, opp.sell_venue, profit_rounded, bucket
    );

    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let hash = hasher.finalize();

    // Use first 16 bytes for shorter hash
    hex::encode(&hash[..16])
}

#[async_trait]
impl OpportunityStorage for SqliteStorage {
    async fn save(&self, opp: &Opportunity) -> Result<bool, StorageError> {
        let unique_hash = generate_unique_hash(opp, self.dedup_window);

        let result = sqlx::query(
            r#"
            INSERT INTO opportunities (
                id, unique_hash, symbol, buy_venue, sell_venue, buy_price, sell_price,
                spread_percent, notional, quantity, gross_profit, buy_fee, sell_fee,
                network_fee, total_fees, net_profit, net_profit_percent, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&opp.id)
        .bind(&unique_hash)
        .bind(&opp.symbol)
        .bind(opp.buy_venue.to_string())
        .bind(opp.sell_venue.to_string())
        .bind(opp.buy_price.to_string())
        .bind(opp.sell_price.to_string())
        .bind(opp.spread_percent.to_string())
        .bind(opp.notional.to_string())
        .bind(opp.quantity.to_string())
        .bind(opp.gross_profit.to_string())
        .bind(opp.buy_fee.to_string())
        .bind(opp.sell_fee.to_string())
        .bind(opp.network_fee.to_string())
        .bind(opp.total_fees.to_string())
        .bind(opp.net_profit.to_string())
        .bind(opp.net_profit_percent.to_string())
        .bind(opp.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let rows_affected = result.rows_affected();

        if rows_affected > 0 {
            debug!(
                id = %opp.id,
                symbol = %opp.symbol,
                hash = %unique_hash,
                "Opportunity saved"
            );
        }

        Ok(rows_affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Opportunity>, StorageError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(parse_opportunity_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Opportunity>, StorageError> {
        let rows = sqlx::query(&format!("{} ORDER BY timestamp DESC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(parse_opportunity_row).collect()
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Opportunity>, StorageError> {
        let rows = sqlx::query(&format!(
            "{} WHERE symbol = ? ORDER BY timestamp DESC",
            SELECT_COLUMNS
        ))
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_opportunity_row).collect()
    }

    async fn count(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM opportunities")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, StorageError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}

fn venue_column(row: &SqliteRow, column: &str) -> Result<Venue, StorageError> {
    let raw: String = row.try_get(column)?;
    Venue::from_str(&raw).map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}

/// Parses an opportunity from a database row.
fn parse_opportunity_row(row: &SqliteRow) -> Result<Opportunity, StorageError> {
    let timestamp_str: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map_err(|e| StorageError::InvalidData(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(Opportunity {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        buy_venue: venue_column(row, "buy_venue")?,
        sell_venue: venue_column(row, "sell_venue")?,
        buy_price: decimal_column(row, "buy_price")?,
        sell_price: decimal_column(row, "sell_price")?,
        spread_percent: decimal_column(row, "spread_percent")?,
        notional: decimal_column(row, "notional")?,
        quantity: decimal_column(row, "quantity")?,
        gross_profit: decimal_column(row, "gross_profit")?,
        buy_fee: decimal_column(row, "buy_fee")?,
        sell_fee: decimal_column(row, "sell_fee")?,
        network_fee: decimal_column(row, "network_fee")?,
        total_fees: decimal_column(row, "total_fees")?,
        net_profit: decimal_column(row, "net_profit")?,
        net_profit_percent: decimal_column(row, "net_profit_percent")?,
        timestamp,
    })
}
