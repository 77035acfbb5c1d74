use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Owns the SQLite connection pool and schema migrations.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, timeframe, open_time)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create candles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                action TEXT NOT NULL,
                position_size_pct REAL NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL,
                model_used TEXT NOT NULL,
                input_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions (timestamp DESC, id DESC);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create decisions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                fee REAL NOT NULL,
                slippage REAL NOT NULL,
                pnl REAL NOT NULL,
                notes TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades (timestamp ASC, id ASC);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mind_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                changed_at INTEGER NOT NULL,
                changed_by TEXT NOT NULL,
                previous_state TEXT NOT NULL,
                new_state TEXT NOT NULL,
                change_summary TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_mind_history_changed_at ON mind_history (changed_at DESC);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create mind_history table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
