//! SQLite persistence layer.
//!
//! One connection behind a mutex. Every balance-affecting operation runs
//! inside [`SqliteStore::transaction`], so the read-modify-write on the
//! account row and the status change on the request row commit together.
//!
//! The free functions below take a `&Connection` so services can compose
//! them inside a single transaction.

use crate::error::{AppError, Result};
use crate::types::{
    Account, AccountStatus, CurrencyPair, Deposit, DepositStatus, Leverage, PairCategory, Trade,
    TradeDirection, TradeStatus, Withdrawal, WithdrawalStatus,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite store for accounts, requests, trades and the pair catalog.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::from_connection(Connection::open(path)?)?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?)?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    /// Wrap an already-open connection and bring its schema up to date.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Lock the connection. A panic inside a previous transaction poisons
    /// the mutex, but the open `Transaction` rolled back when it was dropped,
    /// so the connection is still consistent and the lock is recovered.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Recovering store lock after a panic in a previous holder");
            self.conn.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Run `f` inside an immediate transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against the connection.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock();
        f(&*conn)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                balance TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deposits (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                method TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'rejected')),
                created_at INTEGER NOT NULL,
                reviewed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_deposits_user ON deposits(user_id);
            CREATE INDEX IF NOT EXISTS idx_deposits_status ON deposits(status);

            CREATE TABLE IF NOT EXISTS withdrawals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
                created_at INTEGER NOT NULL,
                reviewed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_withdrawals_user ON withdrawals(user_id);
            CREATE INDEX IF NOT EXISTS idx_withdrawals_status ON withdrawals(status);

            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                currency_pair TEXT NOT NULL,
                direction TEXT NOT NULL CHECK (direction IN ('up', 'down')),
                leverage TEXT NOT NULL,
                amount TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                current_price TEXT,
                profit_loss TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL CHECK (status IN ('open', 'completed', 'failed')),
                duration_secs INTEGER NOT NULL,
                settle_at INTEGER NOT NULL,
                settlement_attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                closed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id);
            CREATE INDEX IF NOT EXISTS idx_trades_due ON trades(status, settle_at);

            CREATE TABLE IF NOT EXISTS currency_pairs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                price TEXT NOT NULL DEFAULT '0',
                change TEXT NOT NULL DEFAULT '0',
                icon TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                status INTEGER NOT NULL DEFAULT 1,
                updated_at INTEGER NOT NULL
            );",
        )?;

        // Older databases may hold duplicate names; the unique index can't be
        // built until they are gone.
        let removed = remove_duplicate_pairs(&conn)?;
        if removed > 0 {
            warn!("Removed {} duplicate currency pairs before indexing", removed);
        }
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_pairs_name ON currency_pairs(name COLLATE NOCASE)",
            [],
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }
}

// ========== Column Helpers ==========

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn parsed_at<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// `true` if `err` is a UNIQUE/CHECK constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ========== Account Methods ==========

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, balance, status, created_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        balance: decimal_at(row, 4)?,
        status: parsed_at(row, 5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert_account(conn: &Connection, account: &Account) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, balance, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            account.id,
            account.name,
            account.email,
            account.password_hash,
            account.balance.to_string(),
            account.status.as_str(),
            account.created_at,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Conflict(format!("email already registered: {}", account.email))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], account_from_row)
        .optional()?)
}

pub fn find_account_by_email(conn: &Connection, email: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![email.trim().to_lowercase()], account_from_row)
        .optional()?)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", ACCOUNT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], account_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Current balance, or `None` for an unknown account.
pub fn account_balance(conn: &Connection, id: &str) -> Result<Option<Decimal>> {
    Ok(conn
        .query_row(
            "SELECT balance FROM users WHERE id = ?1",
            params![id],
            |row| decimal_at(row, 0),
        )
        .optional()?)
}

pub fn write_balance(conn: &Connection, id: &str, balance: Decimal) -> Result<()> {
    conn.execute(
        "UPDATE users SET balance = ?1 WHERE id = ?2",
        params![balance.to_string(), id],
    )?;
    Ok(())
}

pub fn write_account_status(conn: &Connection, id: &str, status: AccountStatus) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE users SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?)
}

pub fn delete_account(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id])?)
}

/// (total, active) account counts.
pub fn account_counts(conn: &Connection) -> Result<(u64, u64)> {
    Ok(conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0)
         FROM users",
        [],
        |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
    )?)
}

// ========== Deposit Methods ==========

const DEPOSIT_SELECT: &str = "SELECT d.id, d.user_id, u.name, d.amount, d.method, d.status,
        d.created_at, d.reviewed_at
     FROM deposits d LEFT JOIN users u ON u.id = d.user_id";

fn deposit_from_row(row: &Row<'_>) -> rusqlite::Result<Deposit> {
    Ok(Deposit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        amount: decimal_at(row, 3)?,
        method: row.get(4)?,
        status: parsed_at(row, 5)?,
        created_at: row.get(6)?,
        reviewed_at: row.get(7)?,
    })
}

pub fn insert_deposit(conn: &Connection, deposit: &Deposit) -> Result<()> {
    conn.execute(
        "INSERT INTO deposits (id, user_id, amount, method, status, created_at, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            deposit.id,
            deposit.user_id,
            deposit.amount.to_string(),
            deposit.method,
            deposit.status.as_str(),
            deposit.created_at,
            deposit.reviewed_at,
        ],
    )?;
    Ok(())
}

pub fn get_deposit(conn: &Connection, id: &str) -> Result<Option<Deposit>> {
    let sql = format!("{} WHERE d.id = ?1", DEPOSIT_SELECT);
    Ok(conn.query_row(&sql, params![id], deposit_from_row).optional()?)
}

/// Deposits newest first, optionally filtered by status and/or owner.
pub fn list_deposits(
    conn: &Connection,
    status: Option<DepositStatus>,
    user_id: Option<&str>,
) -> Result<Vec<Deposit>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR d.status = ?1) AND (?2 IS NULL OR d.user_id = ?2)
         ORDER BY d.created_at DESC, d.rowid DESC",
        DEPOSIT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.map(|s| s.as_str()), user_id], deposit_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Move a deposit out of `from`. Returns the number of rows changed (0 or 1).
pub fn update_deposit_status(
    conn: &Connection,
    id: &str,
    from: DepositStatus,
    to: DepositStatus,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE deposits SET status = ?1, reviewed_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now_ms(), id, from.as_str()],
    )?)
}

pub fn count_deposits(conn: &Connection, status: DepositStatus) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM deposits WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Sum of all confirmed deposit amounts.
pub fn sum_confirmed_deposits(conn: &Connection) -> Result<Decimal> {
    let mut stmt = conn.prepare("SELECT amount FROM deposits WHERE status = 'confirmed'")?;
    let amounts = stmt.query_map([], |row| decimal_at(row, 0))?;
    let mut total = Decimal::ZERO;
    for amount in amounts {
        total = total.saturating_add(amount?);
    }
    Ok(total)
}

// ========== Withdrawal Methods ==========

const WITHDRAWAL_SELECT: &str = "SELECT w.id, w.user_id, u.name, w.amount, w.wallet_address,
        w.status, w.created_at, w.reviewed_at
     FROM withdrawals w LEFT JOIN users u ON u.id = w.user_id";

fn withdrawal_from_row(row: &Row<'_>) -> rusqlite::Result<Withdrawal> {
    Ok(Withdrawal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        amount: decimal_at(row, 3)?,
        wallet_address: row.get(4)?,
        status: parsed_at(row, 5)?,
        created_at: row.get(6)?,
        reviewed_at: row.get(7)?,
    })
}

pub fn insert_withdrawal(conn: &Connection, withdrawal: &Withdrawal) -> Result<()> {
    conn.execute(
        "INSERT INTO withdrawals (id, user_id, amount, wallet_address, status, created_at, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            withdrawal.id,
            withdrawal.user_id,
            withdrawal.amount.to_string(),
            withdrawal.wallet_address,
            withdrawal.status.as_str(),
            withdrawal.created_at,
            withdrawal.reviewed_at,
        ],
    )?;
    Ok(())
}

pub fn get_withdrawal(conn: &Connection, id: &str) -> Result<Option<Withdrawal>> {
    let sql = format!("{} WHERE w.id = ?1", WITHDRAWAL_SELECT);
    Ok(conn
        .query_row(&sql, params![id], withdrawal_from_row)
        .optional()?)
}

pub fn list_withdrawals(
    conn: &Connection,
    status: Option<WithdrawalStatus>,
    user_id: Option<&str>,
) -> Result<Vec<Withdrawal>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR w.status = ?1) AND (?2 IS NULL OR w.user_id = ?2)
         ORDER BY w.created_at DESC, w.rowid DESC",
        WITHDRAWAL_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), user_id],
        withdrawal_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_withdrawal_status(
    conn: &Connection,
    id: &str,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE withdrawals SET status = ?1, reviewed_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now_ms(), id, from.as_str()],
    )?)
}

pub fn count_withdrawals(conn: &Connection, status: WithdrawalStatus) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM withdrawals WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

// ========== Trade Methods ==========

const TRADE_SELECT: &str = "SELECT t.id, t.user_id, u.name, t.currency_pair, t.direction,
        t.leverage, t.amount, t.entry_price, t.current_price, t.profit_loss, t.status,
        t.duration_secs, t.settle_at, t.settlement_attempts, t.last_error, t.created_at,
        t.closed_at
     FROM trades t LEFT JOIN users u ON u.id = t.user_id";

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let direction: TradeDirection = parsed_at(row, 4)?;
    let leverage: Leverage = parsed_at(row, 5)?;
    let status: TradeStatus = parsed_at(row, 10)?;
    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        currency_pair: row.get(3)?,
        direction,
        leverage,
        amount: decimal_at(row, 6)?,
        entry_price: decimal_at(row, 7)?,
        current_price: opt_decimal_at(row, 8)?,
        profit_loss: decimal_at(row, 9)?,
        status,
        duration_secs: row.get::<_, i64>(11)? as u64,
        settle_at: row.get(12)?,
        settlement_attempts: row.get::<_, i64>(13)? as u32,
        last_error: row.get(14)?,
        created_at: row.get(15)?,
        closed_at: row.get(16)?,
    })
}

pub fn insert_trade(conn: &Connection, trade: &Trade) -> Result<()> {
    conn.execute(
        "INSERT INTO trades (id, user_id, currency_pair, direction, leverage, amount,
            entry_price, current_price, profit_loss, status, duration_secs, settle_at,
            settlement_attempts, last_error, created_at, closed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            trade.id,
            trade.user_id,
            trade.currency_pair,
            trade.direction.as_str(),
            trade.leverage.as_str(),
            trade.amount.to_string(),
            trade.entry_price.to_string(),
            trade.current_price.map(|p| p.to_string()),
            trade.profit_loss.to_string(),
            trade.status.as_str(),
            trade.duration_secs as i64,
            trade.settle_at,
            trade.settlement_attempts as i64,
            trade.last_error,
            trade.created_at,
            trade.closed_at,
        ],
    )?;
    Ok(())
}

pub fn get_trade(conn: &Connection, id: &str) -> Result<Option<Trade>> {
    let sql = format!("{} WHERE t.id = ?1", TRADE_SELECT);
    Ok(conn.query_row(&sql, params![id], trade_from_row).optional()?)
}

pub fn list_trades(conn: &Connection, user_id: Option<&str>) -> Result<Vec<Trade>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR t.user_id = ?1) ORDER BY t.created_at DESC, t.rowid DESC",
        TRADE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], trade_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Ids of open trades due at or before `now`, oldest due first.
pub fn due_trade_ids(conn: &Connection, now: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM trades WHERE status = 'open' AND settle_at <= ?1 ORDER BY settle_at",
    )?;
    let rows = stmt.query_map(params![now], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

/// Write the settled fields of `trade`, only if the row is still open.
/// Returns the number of rows changed (0 means someone else settled it).
pub fn close_trade(conn: &Connection, trade: &Trade) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE trades SET status = ?1, current_price = ?2, profit_loss = ?3, closed_at = ?4,
            last_error = NULL
         WHERE id = ?5 AND status = 'open'",
        params![
            trade.status.as_str(),
            trade.current_price.map(|p| p.to_string()),
            trade.profit_loss.to_string(),
            trade.closed_at,
            trade.id,
        ],
    )?)
}

/// Record a failed settlement attempt and push the due time to `retry_at`.
pub fn record_settlement_failure(
    conn: &Connection,
    id: &str,
    error: &str,
    retry_at: i64,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE trades SET settlement_attempts = settlement_attempts + 1, last_error = ?1,
            settle_at = ?2
         WHERE id = ?3 AND status = 'open'",
        params![error, retry_at, id],
    )?)
}

pub fn count_open_trades(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trades WHERE status = 'open'",
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

// ========== Currency Pair Methods ==========

const PAIR_COLUMNS: &str = "id, name, category, price, change, icon, description, status, updated_at";

fn pair_from_row(row: &Row<'_>) -> rusqlite::Result<CurrencyPair> {
    let category: PairCategory = parsed_at(row, 2)?;
    Ok(CurrencyPair {
        id: row.get(0)?,
        name: row.get(1)?,
        category,
        price: decimal_at(row, 3)?,
        change: decimal_at(row, 4)?,
        icon: row.get(5)?,
        description: row.get(6)?,
        status: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn pair_conflict(err: rusqlite::Error, name: &str) -> AppError {
    if is_constraint_violation(&err) {
        AppError::Conflict(format!("currency pair already exists: {}", name))
    } else {
        err.into()
    }
}

pub fn insert_pair(conn: &Connection, pair: &CurrencyPair) -> Result<()> {
    conn.execute(
        "INSERT INTO currency_pairs (id, name, category, price, change, icon, description,
            status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            pair.id,
            pair.name,
            pair.category.as_str(),
            pair.price.to_string(),
            pair.change.to_string(),
            pair.icon,
            pair.description,
            pair.status,
            pair.updated_at,
        ],
    )
    .map_err(|e| pair_conflict(e, &pair.name))?;
    Ok(())
}

/// Overwrite every column of an existing pair.
pub fn update_pair(conn: &Connection, pair: &CurrencyPair) -> Result<usize> {
    conn.execute(
        "UPDATE currency_pairs SET name = ?1, category = ?2, price = ?3, change = ?4, icon = ?5,
            description = ?6, status = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            pair.name,
            pair.category.as_str(),
            pair.price.to_string(),
            pair.change.to_string(),
            pair.icon,
            pair.description,
            pair.status,
            pair.updated_at,
            pair.id,
        ],
    )
    .map_err(|e| pair_conflict(e, &pair.name))
}

pub fn write_pair_price(conn: &Connection, id: &str, price: Decimal, change: Decimal) -> Result<()> {
    conn.execute(
        "UPDATE currency_pairs SET price = ?1, change = ?2, updated_at = ?3 WHERE id = ?4",
        params![price.to_string(), change.to_string(), now_ms(), id],
    )?;
    Ok(())
}

pub fn get_pair(conn: &Connection, id: &str) -> Result<Option<CurrencyPair>> {
    let sql = format!("SELECT {} FROM currency_pairs WHERE id = ?1", PAIR_COLUMNS);
    Ok(conn.query_row(&sql, params![id], pair_from_row).optional()?)
}

/// Case-insensitive lookup by pair name.
pub fn find_pair_by_name(conn: &Connection, name: &str) -> Result<Option<CurrencyPair>> {
    let sql = format!(
        "SELECT {} FROM currency_pairs WHERE name = ?1 COLLATE NOCASE",
        PAIR_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![name.trim()], pair_from_row)
        .optional()?)
}

/// Pairs in insertion order, optionally only the listed ones.
pub fn list_pairs(conn: &Connection, listed_only: bool) -> Result<Vec<CurrencyPair>> {
    let sql = format!(
        "SELECT {} FROM currency_pairs WHERE (?1 = 0 OR status = 1) ORDER BY rowid",
        PAIR_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![listed_only], pair_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_pair(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM currency_pairs WHERE id = ?1", params![id])?)
}

pub fn count_pairs(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM currency_pairs", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Delete every pair whose name (case-insensitively) repeats an earlier row.
/// The earliest inserted row of each name is kept.
pub fn remove_duplicate_pairs(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM currency_pairs WHERE rowid NOT IN (
            SELECT MIN(rowid) FROM currency_pairs GROUP BY UPPER(TRIM(name))
         )",
        [],
    )?)
}
