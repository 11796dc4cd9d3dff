use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, InterruptHandle, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info};

use crate::catalog::error::StoreError;
use crate::catalog::semver::version_triple;
use crate::catalog::store::{DocStore, QueryScope, VersionQuery, VersionTx, VersionWriter};
use crate::catalog::types::{
    ExactVersionRequest, Facet, MinorVersionRequest, NewPolicyVersion, PatchVersionRequest,
    PolicyDoc, PolicyFilters, PolicyVersion,
};

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: at most one latest version per policy
    &[
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_policy_version_latest_unique ON policy_version(policy_name) WHERE is_latest = 1",
    ],
    // v2: icon_path column
    &["ALTER TABLE policy_version ADD COLUMN icon_path TEXT"],
];

const VERSION_COLUMNS: &str = "id, policy_name, version, is_latest, display_name, provider, \
     description, categories, tags, logo_path, banner_path, supported_platforms, release_date, \
     definition_yaml, icon_path, source_type, source_url, created_at, updated_at";

const DOC_COLUMNS: &str = "id, policy_version_id, page, content_md, created_at, updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Bound parameters per bulk statement, kept within SQLite's historical default limit
const MAX_BIND_PARAMETERS: usize = 999;

/// SQLite-backed version store.
///
/// Holds a fixed set of connections to the same WAL database so that independent
/// queries run in parallel.
pub struct SqliteStore {
    conns: Vec<Mutex<Connection>>,
    interrupts: Vec<Arc<InterruptHandle>>,
    next: AtomicUsize,
}

impl SqliteStore {
    pub fn open(
        db_path: &Path,
        pool_size: usize,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        info!("Opening catalog database at {:?}", db_path);

        let pool_size = pool_size.max(1);
        let mut conns = Vec::with_capacity(pool_size);
        let mut interrupts = Vec::with_capacity(pool_size);

        for i in 0..pool_size {
            let conn = Self::open_connection(db_path, busy_timeout)?;
            if i == 0 {
                Self::create_schema(&conn)?;
            }
            interrupts.push(Arc::new(conn.get_interrupt_handle()));
            conns.push(Mutex::new(conn));
        }

        debug!("Opened {} database connections", pool_size);

        Ok(Self {
            conns,
            interrupts,
            next: AtomicUsize::new(0),
        })
    }

    fn open_connection(db_path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
        let conn = Connection::open(db_path)?;

        // WAL lets readers proceed while a writer holds the lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        Ok(conn)
    }

    /// Acquire an idle connection, or wait on one if all are in use
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.lock_slot().map(|(_, conn)| conn)
    }

    /// Like [`Self::lock_conn`], also returning the connection's pool slot
    fn lock_slot(&self) -> Result<(usize, MutexGuard<'_, Connection>), StoreError> {
        let len = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed);

        for offset in 0..len {
            let slot = (start + offset) % len;
            match self.conns[slot].try_lock() {
                Ok(guard) => return Ok((slot, guard)),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::LockPoisoned),
            }
        }

        let slot = start % len;
        self.conns[slot]
            .lock()
            .map(|guard| (slot, guard))
            .map_err(|_| StoreError::LockPoisoned)
    }

    /// Run `run` on a pooled connection registered with `scope`.
    ///
    /// Cancelling the scope interrupts this connection while `run` executes and no
    /// other connection.
    fn run_scoped<T>(
        &self,
        scope: &QueryScope,
        run: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let (slot, conn) = self.lock_slot()?;
        let handle = Arc::clone(&self.interrupts[slot]);
        // Unregistered before the connection goes back to the pool
        let _registration = scope.register(Box::new(move || handle.interrupt()))?;
        run(&*conn)
    }

    /// Bulk lookup over `keys`, binding `width` parameters per key and splitting the keys
    /// into as many statements as the parameter limit requires.
    fn query_chunked<'k, K, F>(
        &self,
        scope: &QueryScope,
        keys: &'k [K],
        width: usize,
        build: F,
    ) -> Result<Vec<PolicyVersion>, StoreError>
    where
        F: Fn(&'k [K]) -> (String, Vec<&'k dyn ToSql>),
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        self.run_scoped(scope, |conn| {
            let mut rows = Vec::new();
            for chunk in keys.chunks(MAX_BIND_PARAMETERS / width) {
                // SQLite clears a pending interrupt when the next statement starts
                if scope.is_cancelled() {
                    return Err(StoreError::Interrupted);
                }
                let (sql, params) = build(chunk);
                rows.extend(fetch_versions(conn, &sql, &params)?);
            }
            debug!("Bulk lookup of {} keys returned {} rows", keys.len(), rows.len());
            Ok(rows)
        })
    }

    fn current_timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn create_schema(conn: &Connection) -> Result<(), StoreError> {
        debug!("Creating database schema");

        // Base tables (without migration columns)
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS policy_version (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                policy_name TEXT NOT NULL,
                version TEXT NOT NULL,
                major INTEGER NOT NULL,
                minor INTEGER NOT NULL,
                patch INTEGER NOT NULL,
                is_latest INTEGER NOT NULL DEFAULT 0,
                display_name TEXT NOT NULL,
                provider TEXT NOT NULL,
                description TEXT,
                categories TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                logo_path TEXT,
                banner_path TEXT,
                supported_platforms TEXT NOT NULL DEFAULT '[]',
                release_date TEXT,
                definition_yaml TEXT NOT NULL,
                source_type TEXT,
                source_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(policy_name, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_policy_version_semver ON policy_version(policy_name, major, minor, patch)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_policy_version_provider ON policy_version(provider) WHERE is_latest = 1",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS policy_docs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                policy_version_id INTEGER NOT NULL,
                page TEXT NOT NULL,
                content_md TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (policy_version_id) REFERENCES policy_version(id) ON DELETE CASCADE,
                UNIQUE(policy_version_id, page)
            )
            "#,
            [],
        )?;

        Self::apply_migrations(conn)?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    // Databases created before the migration list may already have the column
                    match conn.execute(sql, []) {
                        Ok(_) => {}
                        Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                            if msg.contains("duplicate column name") =>
                        {
                            debug!("Column already exists, skipping: {}", sql);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }

    fn query_one(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<PolicyVersion>, StoreError> {
        let conn = self.lock_conn()?;
        let version = conn.query_row(sql, params, row_to_version).optional()?;
        Ok(version)
    }

    fn query_many(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        let conn = self.lock_conn()?;
        fetch_versions(&conn, sql, params)
    }
}

impl VersionQuery for SqliteStore {
    fn get_exact(
        &self,
        policy_name: &str,
        version: &str,
    ) -> Result<Option<PolicyVersion>, StoreError> {
        self.query_one(
            &format!(
                "SELECT {} FROM policy_version WHERE policy_name = ?1 AND version = ?2",
                VERSION_COLUMNS
            ),
            &[&policy_name, &version],
        )
    }

    fn get_latest(&self, policy_name: &str) -> Result<Option<PolicyVersion>, StoreError> {
        self.query_one(
            &format!(
                "SELECT {} FROM policy_version WHERE policy_name = ?1 AND is_latest = 1",
                VERSION_COLUMNS
            ),
            &[&policy_name],
        )
    }

    fn get_latest_patch(
        &self,
        policy_name: &str,
        major: u32,
        minor: u32,
    ) -> Result<Option<PolicyVersion>, StoreError> {
        self.query_one(
            &format!(
                r#"
                SELECT {} FROM policy_version
                WHERE policy_name = ?1 AND major = ?2 AND minor = ?3
                ORDER BY patch DESC
                LIMIT 1
                "#,
                VERSION_COLUMNS
            ),
            &[&policy_name, &major, &minor],
        )
    }

    fn get_latest_minor(
        &self,
        policy_name: &str,
        major: u32,
    ) -> Result<Option<PolicyVersion>, StoreError> {
        self.query_one(
            &format!(
                r#"
                SELECT {} FROM policy_version
                WHERE policy_name = ?1 AND major = ?2
                ORDER BY minor DESC, patch DESC
                LIMIT 1
                "#,
                VERSION_COLUMNS
            ),
            &[&policy_name, &major],
        )
    }

    fn get_latest_major(&self, policy_name: &str) -> Result<Option<PolicyVersion>, StoreError> {
        self.query_one(
            &format!(
                r#"
                SELECT {} FROM policy_version
                WHERE policy_name = ?1
                ORDER BY major DESC, minor DESC, patch DESC
                LIMIT 1
                "#,
                VERSION_COLUMNS
            ),
            &[&policy_name],
        )
    }

    fn bulk_get_exact(
        &self,
        requests: &[ExactVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        self.query_chunked(scope, requests, 2, |chunk| {
            let query = format!(
                r#"
                WITH req(req_name, req_version) AS (VALUES {})
                SELECT {} FROM policy_version pv
                WHERE EXISTS (
                    SELECT 1 FROM req
                    WHERE req.req_name = pv.policy_name AND req.req_version = pv.version
                )
                "#,
                values_placeholders(chunk.len(), 2),
                VERSION_COLUMNS
            );
            let params: Vec<&dyn ToSql> = chunk
                .iter()
                .flat_map(|r| [&r.name as &dyn ToSql, &r.version as &dyn ToSql])
                .collect();
            (query, params)
        })
    }

    fn bulk_get_latest_patch(
        &self,
        requests: &[PatchVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        self.query_chunked(scope, requests, 3, |chunk| {
            let query = format!(
                r#"
                WITH req(req_name, req_major, req_minor) AS (VALUES {})
                SELECT {} FROM (
                    SELECT pv.*, ROW_NUMBER() OVER (
                        PARTITION BY pv.policy_name, pv.major, pv.minor
                        ORDER BY pv.patch DESC
                    ) AS rn
                    FROM policy_version pv
                    WHERE EXISTS (
                        SELECT 1 FROM req
                        WHERE req.req_name = pv.policy_name
                          AND req.req_major = pv.major
                          AND req.req_minor = pv.minor
                    )
                )
                WHERE rn = 1
                "#,
                values_placeholders(chunk.len(), 3),
                VERSION_COLUMNS
            );
            let params: Vec<&dyn ToSql> = chunk
                .iter()
                .flat_map(|r| {
                    [
                        &r.name as &dyn ToSql,
                        &r.major as &dyn ToSql,
                        &r.minor as &dyn ToSql,
                    ]
                })
                .collect();
            (query, params)
        })
    }

    fn bulk_get_latest_minor(
        &self,
        requests: &[MinorVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        self.query_chunked(scope, requests, 2, |chunk| {
            let query = format!(
                r#"
                WITH req(req_name, req_major) AS (VALUES {})
                SELECT {} FROM (
                    SELECT pv.*, ROW_NUMBER() OVER (
                        PARTITION BY pv.policy_name, pv.major
                        ORDER BY pv.minor DESC, pv.patch DESC
                    ) AS rn
                    FROM policy_version pv
                    WHERE EXISTS (
                        SELECT 1 FROM req
                        WHERE req.req_name = pv.policy_name AND req.req_major = pv.major
                    )
                )
                WHERE rn = 1
                "#,
                values_placeholders(chunk.len(), 2),
                VERSION_COLUMNS
            );
            let params: Vec<&dyn ToSql> = chunk
                .iter()
                .flat_map(|r| [&r.name as &dyn ToSql, &r.major as &dyn ToSql])
                .collect();
            (query, params)
        })
    }

    fn bulk_get_latest_major(
        &self,
        policy_names: &[String],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        self.query_chunked(scope, policy_names, 1, |chunk| {
            let query = format!(
                r#"
                SELECT {} FROM (
                    SELECT pv.*, ROW_NUMBER() OVER (
                        PARTITION BY pv.policy_name
                        ORDER BY pv.major DESC, pv.minor DESC, pv.patch DESC
                    ) AS rn
                    FROM policy_version pv
                    WHERE pv.policy_name IN ({})
                )
                WHERE rn = 1
                "#,
                VERSION_COLUMNS,
                anonymous_placeholders(chunk.len())
            );
            let params: Vec<&dyn ToSql> = chunk.iter().map(|s| s as &dyn ToSql).collect();
            (query, params)
        })
    }

    fn list_versions(
        &self,
        policy_name: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        self.query_many(
            &format!(
                r#"
                SELECT {} FROM policy_version
                WHERE policy_name = ?1
                ORDER BY major DESC, minor DESC, patch DESC
                LIMIT ?2 OFFSET ?3
                "#,
                VERSION_COLUMNS
            ),
            &[&policy_name, &page_size, &offset],
        )
    }

    fn count_versions(&self, policy_name: &str) -> Result<u64, StoreError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM policy_version WHERE policy_name = ?1",
            [policy_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_policies(&self, filters: &PolicyFilters) -> Result<Vec<PolicyVersion>, StoreError> {
        let (where_clause, mut values) = filter_clause(filters);
        let offset = i64::from(filters.page.saturating_sub(1)) * i64::from(filters.page_size);
        values.push(Value::Integer(i64::from(filters.page_size)));
        values.push(Value::Integer(offset));

        let query = format!(
            "SELECT {} FROM policy_version pv {} ORDER BY pv.display_name, pv.policy_name LIMIT ? OFFSET ?",
            VERSION_COLUMNS, where_clause
        );

        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.query_many(&query, &params)
    }

    fn count_policies(&self, filters: &PolicyFilters) -> Result<u64, StoreError> {
        let (where_clause, values) = filter_clause(filters);
        let query = format!("SELECT COUNT(*) FROM policy_version pv {}", where_clause);

        let conn = self.lock_conn()?;
        let count: i64 =
            conn.query_row(&query, rusqlite::params_from_iter(values.iter()), |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    fn distinct_values(&self, facet: Facet) -> Result<Vec<String>, StoreError> {
        let query = match facet {
            Facet::Categories => {
                "SELECT DISTINCT j.value FROM policy_version pv, json_each(pv.categories) j \
                 WHERE pv.is_latest = 1 ORDER BY j.value"
            }
            Facet::Providers => {
                "SELECT DISTINCT provider FROM policy_version WHERE is_latest = 1 ORDER BY provider"
            }
            Facet::Platforms => {
                "SELECT DISTINCT j.value FROM policy_version pv, json_each(pv.supported_platforms) j \
                 WHERE pv.is_latest = 1 ORDER BY j.value"
            }
        };

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(query)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }
}

impl DocStore for SqliteStore {
    fn get_doc(&self, version_id: i64, page: &str) -> Result<Option<PolicyDoc>, StoreError> {
        let conn = self.lock_conn()?;
        let doc = conn
            .query_row(
                &format!(
                    "SELECT {} FROM policy_docs WHERE policy_version_id = ?1 AND page = ?2",
                    DOC_COLUMNS
                ),
                (version_id, page),
                row_to_doc,
            )
            .optional()?;
        Ok(doc)
    }

    fn list_docs(&self, version_id: i64) -> Result<Vec<PolicyDoc>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM policy_docs WHERE policy_version_id = ?1 ORDER BY page",
            DOC_COLUMNS
        ))?;
        let docs = stmt
            .query_map([version_id], row_to_doc)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    fn upsert_doc(
        &self,
        version_id: i64,
        page: &str,
        content_md: &str,
    ) -> Result<PolicyDoc, StoreError> {
        let now = Self::current_timestamp_ms();
        let conn = self.lock_conn()?;
        let doc = conn.query_row(
            &format!(
                r#"
                INSERT INTO policy_docs (policy_version_id, page, content_md, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(policy_version_id, page) DO UPDATE
                SET content_md = excluded.content_md, updated_at = excluded.updated_at
                RETURNING {}
                "#,
                DOC_COLUMNS
            ),
            (version_id, page, content_md, now),
            row_to_doc,
        )?;
        Ok(doc)
    }
}

impl VersionWriter for SqliteStore {
    fn begin(&self) -> Result<Box<dyn VersionTx + '_>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(Box::new(SqliteTx::begin(conn)?))
    }
}

/// Write transaction holding its connection for its whole lifetime
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> SqliteTx<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> Result<Self, StoreError> {
        // IMMEDIATE takes the write lock up front so the latest-holder read is not stale
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                debug!("Rollback failed: {}", e);
            }
        }
    }
}

impl VersionTx for SqliteTx<'_> {
    fn version_exists(&mut self, policy_name: &str, version: &str) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM policy_version WHERE policy_name = ?1 AND version = ?2)",
            (policy_name, version),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn current_latest(&mut self, policy_name: &str) -> Result<Option<String>, StoreError> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM policy_version WHERE policy_name = ?1 AND is_latest = 1",
                [policy_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    fn demote_others(&mut self, policy_name: &str) -> Result<(), StoreError> {
        let demoted = self.conn.execute(
            "UPDATE policy_version SET is_latest = 0, updated_at = ?2 WHERE policy_name = ?1 AND is_latest = 1",
            (policy_name, SqliteStore::current_timestamp_ms()),
        )?;
        debug!("Demoted {} latest version(s) of {}", demoted, policy_name);
        Ok(())
    }

    fn insert_version(
        &mut self,
        candidate: &NewPolicyVersion,
        is_latest: bool,
    ) -> Result<PolicyVersion, StoreError> {
        let (major, minor, patch) = version_triple(&candidate.version).ok_or_else(|| {
            StoreError::InvalidRow(format!("unparseable version: {}", candidate.version))
        })?;

        let categories = encode_list(&candidate.categories)?;
        let tags = encode_list(&candidate.tags)?;
        let platforms = encode_list(&candidate.supported_platforms)?;
        let release_date = candidate
            .release_date
            .map(|d| d.format(DATE_FORMAT).to_string());
        let now = SqliteStore::current_timestamp_ms();

        self.conn
            .query_row(
                &format!(
                    r#"
                    INSERT INTO policy_version (
                        policy_name, version, major, minor, patch, is_latest,
                        display_name, provider, description, categories, tags,
                        logo_path, banner_path, supported_platforms, release_date,
                        definition_yaml, icon_path, source_type, source_url,
                        created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                            ?15, ?16, ?17, ?18, ?19, ?20, ?20)
                    RETURNING {}
                    "#,
                    VERSION_COLUMNS
                ),
                params![
                    candidate.policy_name,
                    candidate.version,
                    major,
                    minor,
                    patch,
                    is_latest,
                    candidate.display_name,
                    candidate.provider,
                    candidate.description,
                    categories,
                    tags,
                    candidate.logo_path,
                    candidate.banner_path,
                    platforms,
                    release_date,
                    candidate.definition_yaml,
                    candidate.icon_path,
                    candidate.source_type,
                    candidate.source_url,
                    now,
                ],
                row_to_version,
            )
            .map_err(|e| classify_insert_error(e, candidate))
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

/// Tell a duplicate `(policy_name, version)` apart from a second latest row
fn classify_insert_error(err: rusqlite::Error, candidate: &NewPolicyVersion) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            if msg.contains("policy_version.version") {
                return StoreError::DuplicateVersion {
                    policy_name: candidate.policy_name.clone(),
                    version: candidate.version.clone(),
                };
            }
            if msg.contains("policy_version.policy_name") {
                return StoreError::LatestConflict {
                    policy_name: candidate.policy_name.clone(),
                };
            }
        }
    }
    err.into()
}

/// Placeholders for `rows` tuples of `width` numbered parameters: `(?1, ?2), (?3, ?4)`
fn values_placeholders(rows: usize, width: usize) -> String {
    (0..rows)
        .map(|row| {
            let cols: Vec<String> = (0..width)
                .map(|col| format!("?{}", row * width + col + 1))
                .collect();
            format!("({})", cols.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE clause over latest rows plus its positional parameters
fn filter_clause(filters: &PolicyFilters) -> (String, Vec<Value>) {
    let mut clause = String::from("WHERE pv.is_latest = 1");
    let mut values = Vec::new();

    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", escape_like(search.trim()));
        clause.push_str(
            " AND (pv.policy_name LIKE ? ESCAPE '\\' OR pv.display_name LIKE ? ESCAPE '\\' \
             OR pv.description LIKE ? ESCAPE '\\')",
        );
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }

    if !filters.categories.is_empty() {
        clause.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM json_each(pv.categories) j WHERE j.value IN ({}))",
            anonymous_placeholders(filters.categories.len())
        ));
        values.extend(filters.categories.iter().cloned().map(Value::Text));
    }

    if !filters.providers.is_empty() {
        clause.push_str(&format!(
            " AND pv.provider IN ({})",
            anonymous_placeholders(filters.providers.len())
        ));
        values.extend(filters.providers.iter().cloned().map(Value::Text));
    }

    if !filters.platforms.is_empty() {
        clause.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM json_each(pv.supported_platforms) j WHERE j.value IN ({}))",
            anonymous_placeholders(filters.platforms.len())
        ));
        values.extend(filters.platforms.iter().cloned().map(Value::Text));
    }

    (clause, values)
}

fn anonymous_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn encode_list(values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|e| StoreError::InvalidRow(e.to_string()))
}

fn fetch_versions(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<PolicyVersion>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let versions = stmt
        .query_map(params, row_to_version)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<PolicyVersion> {
    Ok(PolicyVersion {
        id: row.get(0)?,
        is_latest: row.get(3)?,
        data: NewPolicyVersion {
            policy_name: row.get(1)?,
            version: row.get(2)?,
            display_name: row.get(4)?,
            provider: row.get(5)?,
            description: row.get(6)?,
            categories: list_column(row, 7)?,
            tags: list_column(row, 8)?,
            logo_path: row.get(9)?,
            banner_path: row.get(10)?,
            supported_platforms: list_column(row, 11)?,
            release_date: date_column(row, 12)?,
            definition_yaml: row.get(13)?,
            icon_path: row.get(14)?,
            source_type: row.get(15)?,
            source_url: row.get(16)?,
        },
        created_at: timestamp_column(row, 17)?,
        updated_at: timestamp_column(row, 18)?,
    })
}

fn row_to_doc(row: &Row<'_>) -> rusqlite::Result<PolicyDoc> {
    Ok(PolicyDoc {
        id: row.get(0)?,
        policy_version_id: row.get(1)?,
        page: row.get(2)?,
        content_md: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

fn list_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            "timestamp out of range".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{candidate, create_test_store};
    use rstest::rstest;

    fn insert(store: &SqliteStore, name: &str, version: &str, is_latest: bool) -> PolicyVersion {
        let mut tx = store.begin().unwrap();
        if is_latest {
            tx.demote_others(name).unwrap();
        }
        let created = tx.insert_version(&candidate(name, version), is_latest).unwrap();
        tx.commit().unwrap();
        created
    }

    fn seed(store: &SqliteStore) {
        insert(store, "rate-limit", "v1.2.0", false);
        insert(store, "rate-limit", "v1.2.5", false);
        insert(store, "rate-limit", "v1.3.0", false);
        insert(store, "rate-limit", "v2.0.0", true);
        insert(store, "cors", "v0.1.0", true);
    }

    #[test]
    fn insert_version_round_trips_all_fields() {
        let (_temp_dir, store) = create_test_store();
        let mut new = candidate("jwt-auth", "v1.0.0");
        new.release_date = NaiveDate::from_ymd_opt(2025, 3, 14);
        new.logo_path = Some("https://cdn.example.com/logo.svg".to_string());

        let mut tx = store.begin().unwrap();
        let created = tx.insert_version(&new, true).unwrap();
        tx.commit().unwrap();

        let fetched = store.get_exact("jwt-auth", "v1.0.0").unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.data, new);
        assert!(fetched.is_latest);
    }

    #[test]
    fn insert_version_reports_duplicate_version() {
        let (_temp_dir, store) = create_test_store();
        insert(&store, "cors", "v1.0.0", true);

        let mut tx = store.begin().unwrap();
        let err = tx
            .insert_version(&candidate("cors", "v1.0.0"), false)
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateVersion { .. }), "{err:?}");
    }

    #[test]
    fn insert_version_rejects_second_latest_row() {
        let (_temp_dir, store) = create_test_store();
        insert(&store, "cors", "v1.0.0", true);

        // Skipping the demotion leaves two latest rows, which the partial index refuses
        let mut tx = store.begin().unwrap();
        let err = tx
            .insert_version(&candidate("cors", "v2.0.0"), true)
            .unwrap_err();

        assert!(matches!(err, StoreError::LatestConflict { .. }), "{err:?}");
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let (_temp_dir, store) = create_test_store();
        insert(&store, "cors", "v1.0.0", true);

        {
            let mut tx = store.begin().unwrap();
            tx.demote_others("cors").unwrap();
            tx.insert_version(&candidate("cors", "v2.0.0"), true).unwrap();
        }

        let latest = store.get_latest("cors").unwrap().unwrap();
        assert_eq!(latest.version(), "v1.0.0");
        assert!(store.get_exact("cors", "v2.0.0").unwrap().is_none());
    }

    #[test]
    fn current_latest_returns_holder_version() {
        let (_temp_dir, store) = create_test_store();
        insert(&store, "cors", "v1.0.0", true);

        let mut tx = store.begin().unwrap();
        assert_eq!(tx.current_latest("cors").unwrap(), Some("v1.0.0".to_string()));
        assert_eq!(tx.current_latest("unknown").unwrap(), None);
        assert!(tx.version_exists("cors", "v1.0.0").unwrap());
        assert!(!tx.version_exists("cors", "v1.0.1").unwrap());
    }

    #[rstest]
    #[case(1, 2, Some("v1.2.5"))]
    #[case(1, 3, Some("v1.3.0"))]
    #[case(1, 4, None)]
    #[case(3, 0, None)]
    fn get_latest_patch_returns_expected(
        #[case] major: u32,
        #[case] minor: u32,
        #[case] expected: Option<&str>,
    ) {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let found = store.get_latest_patch("rate-limit", major, minor).unwrap();
        assert_eq!(found.as_ref().map(|v| v.version()), expected);
    }

    #[rstest]
    #[case(1, Some("v1.3.0"))]
    #[case(2, Some("v2.0.0"))]
    #[case(0, None)]
    fn get_latest_minor_returns_expected(#[case] major: u32, #[case] expected: Option<&str>) {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let found = store.get_latest_minor("rate-limit", major).unwrap();
        assert_eq!(found.as_ref().map(|v| v.version()), expected);
    }

    #[test]
    fn get_latest_major_orders_numerically() {
        let (_temp_dir, store) = create_test_store();
        insert(&store, "cors", "v9.0.0", false);
        insert(&store, "cors", "v10.0.0", false);

        let found = store.get_latest_major("cors").unwrap().unwrap();
        assert_eq!(found.version(), "v10.0.0");
    }

    #[test]
    fn bulk_get_exact_skips_missing_and_deduplicates() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let requests = vec![
            ExactVersionRequest {
                name: "rate-limit".to_string(),
                version: "v1.2.0".to_string(),
            },
            ExactVersionRequest {
                name: "rate-limit".to_string(),
                version: "v1.2.0".to_string(),
            },
            ExactVersionRequest {
                name: "cors".to_string(),
                version: "v9.9.9".to_string(),
            },
        ];

        let found = store.bulk_get_exact(&requests, &QueryScope::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), "v1.2.0");
    }

    #[test]
    fn bulk_get_latest_patch_returns_one_row_per_key() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let requests = vec![
            PatchVersionRequest {
                name: "rate-limit".to_string(),
                major: 1,
                minor: 2,
            },
            PatchVersionRequest {
                name: "rate-limit".to_string(),
                major: 1,
                minor: 3,
            },
            PatchVersionRequest {
                name: "cors".to_string(),
                major: 0,
                minor: 1,
            },
        ];

        let mut found: Vec<String> = store
            .bulk_get_latest_patch(&requests, &QueryScope::new())
            .unwrap()
            .into_iter()
            .map(|v| format!("{}@{}", v.policy_name(), v.version()))
            .collect();
        found.sort();

        assert_eq!(found, vec!["cors@v0.1.0", "rate-limit@v1.2.5", "rate-limit@v1.3.0"]);
    }

    #[test]
    fn bulk_get_latest_minor_and_major() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let minor = store
            .bulk_get_latest_minor(
                &[MinorVersionRequest {
                    name: "rate-limit".to_string(),
                    major: 1,
                }],
                &QueryScope::new(),
            )
            .unwrap();
        assert_eq!(minor.len(), 1);
        assert_eq!(minor[0].version(), "v1.3.0");

        let mut major: Vec<String> = store
            .bulk_get_latest_major(
                &["rate-limit".to_string(), "cors".to_string()],
                &QueryScope::new(),
            )
            .unwrap()
            .into_iter()
            .map(|v| v.version().to_string())
            .collect();
        major.sort();
        assert_eq!(major, vec!["v0.1.0", "v2.0.0"]);
    }

    #[test]
    fn bulk_queries_return_empty_for_empty_input() {
        let (_temp_dir, store) = create_test_store();

        let scope = QueryScope::new();
        assert!(store.bulk_get_exact(&[], &scope).unwrap().is_empty());
        assert!(store.bulk_get_latest_patch(&[], &scope).unwrap().is_empty());
        assert!(store.bulk_get_latest_minor(&[], &scope).unwrap().is_empty());
        assert!(store.bulk_get_latest_major(&[], &scope).unwrap().is_empty());
    }

    #[test]
    fn bulk_queries_split_keys_beyond_parameter_limit() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let scope = QueryScope::new();

        // 1200 keys * 3 parameters needs four statements
        let mut requests: Vec<PatchVersionRequest> = (0..1199)
            .map(|i| PatchVersionRequest {
                name: format!("missing-{}", i),
                major: 1,
                minor: 0,
            })
            .collect();
        requests.push(PatchVersionRequest {
            name: "rate-limit".to_string(),
            major: 1,
            minor: 2,
        });

        let found = store.bulk_get_latest_patch(&requests, &scope).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), "v1.2.5");

        let mut names: Vec<String> = (0..2500).map(|i| format!("missing-{}", i)).collect();
        names.insert(1500, "cors".to_string());
        names.push("rate-limit".to_string());

        let mut latest: Vec<String> = store
            .bulk_get_latest_major(&names, &scope)
            .unwrap()
            .into_iter()
            .map(|v| format!("{}@{}", v.policy_name(), v.version()))
            .collect();
        latest.sort();
        assert_eq!(latest, vec!["cors@v0.1.0", "rate-limit@v2.0.0"]);
    }

    #[test]
    fn bulk_query_in_cancelled_scope_is_interrupted() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let scope = QueryScope::new();
        scope.cancel();

        let err = store
            .bulk_get_latest_major(&["cors".to_string()], &scope)
            .unwrap_err();

        assert!(matches!(err, StoreError::Interrupted), "{err:?}");
    }

    const SLOW_COUNT: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 5000000) \
         SELECT COUNT(*) FROM c";

    #[test]
    fn cancelling_a_scope_spares_other_connections() {
        let (_temp_dir, store) = create_test_store();
        let scope = Arc::new(QueryScope::new());

        let scoped = {
            let store = Arc::clone(&store);
            let scope = Arc::clone(&scope);
            std::thread::spawn(move || {
                store.run_scoped(&scope, |conn| {
                    let count: i64 = conn.query_row(SLOW_COUNT, [], |row| row.get(0))?;
                    Ok(count)
                })
            })
        };
        let unrelated = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let conn = store.lock_conn()?;
                let count: i64 = conn.query_row(SLOW_COUNT, [], |row| row.get(0))?;
                Ok::<_, StoreError>(count)
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        scope.cancel();

        let err = scoped.join().unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Interrupted), "{err:?}");
        assert_eq!(unrelated.join().unwrap().unwrap(), 5_000_000);
    }

    #[test]
    fn list_versions_pages_highest_first() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let first: Vec<String> = store
            .list_versions("rate-limit", 1, 3)
            .unwrap()
            .into_iter()
            .map(|v| v.version().to_string())
            .collect();
        let second: Vec<String> = store
            .list_versions("rate-limit", 2, 3)
            .unwrap()
            .into_iter()
            .map(|v| v.version().to_string())
            .collect();

        assert_eq!(first, vec!["v2.0.0", "v1.3.0", "v1.2.5"]);
        assert_eq!(second, vec!["v1.2.0"]);
        assert_eq!(store.count_versions("rate-limit").unwrap(), 4);
    }

    #[test]
    fn list_policies_applies_filters_to_latest_rows() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let mut other = candidate("basic-auth", "v1.0.0");
        other.provider = "community".to_string();
        other.categories = vec!["authentication".to_string()];
        let mut tx = store.begin().unwrap();
        tx.insert_version(&other, true).unwrap();
        tx.commit().unwrap();

        let all = PolicyFilters {
            page: 1,
            page_size: 20,
            ..Default::default()
        };
        assert_eq!(store.list_policies(&all).unwrap().len(), 3);
        assert_eq!(store.count_policies(&all).unwrap(), 3);

        let by_provider = PolicyFilters {
            providers: vec!["community".to_string()],
            ..all.clone()
        };
        let found = store.list_policies(&by_provider).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].policy_name(), "basic-auth");

        let by_category = PolicyFilters {
            categories: vec!["security".to_string()],
            ..all.clone()
        };
        assert_eq!(store.count_policies(&by_category).unwrap(), 2);

        let by_search = PolicyFilters {
            search: Some("rate".to_string()),
            ..all.clone()
        };
        let found = store.list_policies(&by_search).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), "v2.0.0");

        let wildcard = PolicyFilters {
            search: Some("%".to_string()),
            ..all
        };
        assert_eq!(store.count_policies(&wildcard).unwrap(), 0);
    }

    #[test]
    fn distinct_values_lists_sorted_facets() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let mut other = candidate("basic-auth", "v1.0.0");
        other.provider = "community".to_string();
        other.supported_platforms = vec!["docker".to_string(), "kubernetes".to_string()];
        let mut tx = store.begin().unwrap();
        tx.insert_version(&other, true).unwrap();
        tx.commit().unwrap();

        assert_eq!(
            store.distinct_values(Facet::Providers).unwrap(),
            vec!["community", "wso2"]
        );
        assert_eq!(
            store.distinct_values(Facet::Platforms).unwrap(),
            vec!["docker", "kubernetes"]
        );
        assert_eq!(
            store.distinct_values(Facet::Categories).unwrap(),
            vec!["security"]
        );
    }

    #[test]
    fn upsert_doc_replaces_existing_page() {
        let (_temp_dir, store) = create_test_store();
        let version = insert(&store, "cors", "v1.0.0", true);

        let first = store.upsert_doc(version.id, "overview", "# First").unwrap();
        let second = store.upsert_doc(version.id, "overview", "# Second").unwrap();
        store.upsert_doc(version.id, "faq", "# FAQ").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            store.get_doc(version.id, "overview").unwrap().unwrap().content_md,
            "# Second"
        );
        let pages: Vec<String> = store
            .list_docs(version.id)
            .unwrap()
            .into_iter()
            .map(|d| d.page)
            .collect();
        assert_eq!(pages, vec!["faq", "overview"]);
        assert!(store.get_doc(version.id, "examples").unwrap().is_none());
    }

    #[test]
    fn docs_are_deleted_with_their_version() {
        let (_temp_dir, store) = create_test_store();
        let version = insert(&store, "cors", "v1.0.0", true);
        store.upsert_doc(version.id, "overview", "# Overview").unwrap();

        {
            let conn = store.lock_conn().unwrap();
            conn.execute("DELETE FROM policy_version WHERE id = ?1", [version.id])
                .unwrap();
        }

        assert!(store.list_docs(version.id).unwrap().is_empty());
    }

    #[test]
    fn values_placeholders_numbers_parameters_row_major() {
        assert_eq!(values_placeholders(2, 2), "(?1, ?2), (?3, ?4)");
        assert_eq!(values_placeholders(1, 3), "(?1, ?2, ?3)");
    }

    mod migration_tests {
        use super::*;
        use tempfile::TempDir;

        fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info({})", table))
                .unwrap();
            stmt.query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .filter_map(|r| r.ok())
                .any(|name| name == column)
        }

        fn index_exists(conn: &Connection, index: &str) -> bool {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
                [index],
                |row| row.get(0),
            )
            .unwrap()
        }

        fn get_user_version(conn: &Connection) -> i32 {
            conn.pragma_query_value(None, "user_version", |row| row.get(0))
                .unwrap()
        }

        /// Create the pre-migration schema, optionally with icon_path already present
        fn create_initial_schema(conn: &Connection, has_icon_path: bool, user_version: i32) {
            let icon_column = if has_icon_path { "icon_path TEXT," } else { "" };
            conn.execute(
                &format!(
                    r#"
                    CREATE TABLE policy_version (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        policy_name TEXT NOT NULL,
                        version TEXT NOT NULL,
                        major INTEGER NOT NULL,
                        minor INTEGER NOT NULL,
                        patch INTEGER NOT NULL,
                        is_latest INTEGER NOT NULL DEFAULT 0,
                        display_name TEXT NOT NULL,
                        provider TEXT NOT NULL,
                        description TEXT,
                        categories TEXT NOT NULL DEFAULT '[]',
                        tags TEXT NOT NULL DEFAULT '[]',
                        logo_path TEXT,
                        banner_path TEXT,
                        supported_platforms TEXT NOT NULL DEFAULT '[]',
                        release_date TEXT,
                        definition_yaml TEXT NOT NULL,
                        {}
                        source_type TEXT,
                        source_url TEXT,
                        created_at INTEGER NOT NULL,
                        updated_at INTEGER NOT NULL,
                        UNIQUE(policy_name, version)
                    )
                    "#,
                    icon_column
                ),
                [],
            )
            .unwrap();
            conn.pragma_update(None, "user_version", user_version)
                .unwrap();
        }

        #[rstest]
        // Fresh pre-migration database
        #[case(false, 0)]
        // Column added by hand before the migration list existed
        #[case(true, 0)]
        // Already fully migrated
        #[case(true, 2)]
        fn migration_applies_correctly(#[case] has_icon_path: bool, #[case] initial_version: i32) {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join("test.db");
            {
                let conn = Connection::open(&db_path).unwrap();
                create_initial_schema(&conn, has_icon_path, initial_version);
                if initial_version == 2 {
                    conn.execute(MIGRATIONS[0][0], []).unwrap();
                }
            }

            let _store = SqliteStore::open(&db_path, 1, Duration::from_secs(1)).unwrap();

            let conn = Connection::open(&db_path).unwrap();
            assert!(column_exists(&conn, "policy_version", "icon_path"));
            assert!(index_exists(&conn, "idx_policy_version_latest_unique"));
            assert_eq!(get_user_version(&conn), 2);
        }

        #[test]
        fn migration_preserves_existing_data() {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join("test.db");
            {
                let conn = Connection::open(&db_path).unwrap();
                create_initial_schema(&conn, false, 0);
                conn.execute(
                    r#"
                    INSERT INTO policy_version (policy_name, version, major, minor, patch,
                        is_latest, display_name, provider, definition_yaml, created_at, updated_at)
                    VALUES ('cors', 'v1.0.0', 1, 0, 0, 1, 'CORS', 'wso2', 'name: cors', 0, 0)
                    "#,
                    [],
                )
                .unwrap();
            }

            let store = SqliteStore::open(&db_path, 1, Duration::from_secs(1)).unwrap();

            let latest = store.get_latest("cors").unwrap().unwrap();
            assert_eq!(latest.version(), "v1.0.0");
            assert_eq!(latest.data.icon_path, None);
        }
    }
}
