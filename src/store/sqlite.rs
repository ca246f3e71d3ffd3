use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};

use crate::compiler::{Position, Region};
use crate::error::Result;

use super::models::{DependencyEdge, FileRef, Reference, RepoMetadata, RepoTimestamps};
use super::{GraphSession, GraphStore};

/// SQLite-backed graph store with a pool of connections.
pub struct SqliteGraphStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteGraphStore {
    pub fn new(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(db_path).with_init(configure_pragmas);
        let pool = Pool::builder().max_size(max_connections.max(1)).build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Each in-memory connection is its own database, so the pool holds one.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure_pragmas);
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repos (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                stars INTEGER,
                license TEXT,
                last_updated TEXT,
                created INTEGER,
                last_commit INTEGER,
                imported INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_repos_imported ON repos(imported);

            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                repo TEXT NOT NULL,
                path TEXT NOT NULL,
                module TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_files_repo ON files(repo);

            CREATE TABLE IF NOT EXISTS symbols (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                file_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS symbol_references (
                id TEXT PRIMARY KEY,
                referer_repo TEXT NOT NULL,
                referer_file_id TEXT NOT NULL,
                referred_file_id TEXT NOT NULL,
                symbol_id TEXT NOT NULL,
                version TEXT,
                start_line INTEGER NOT NULL,
                start_column INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_column INTEGER NOT NULL,
                url TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_references_referer ON symbol_references(referer_repo);
            CREATE INDEX IF NOT EXISTS idx_references_symbol ON symbol_references(symbol_id);

            CREATE TABLE IF NOT EXISTS dependency_edges (
                owner_repo TEXT NOT NULL,
                dependency_repo TEXT NOT NULL,
                version TEXT NOT NULL,
                version_range TEXT NOT NULL,
                start_ts INTEGER NOT NULL,
                end_ts INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_edges_owner ON dependency_edges(owner_repo);
            CREATE INDEX IF NOT EXISTS idx_edges_dependency ON dependency_edges(dependency_repo, version);
            "#,
        )?;
        Ok(())
    }
}

impl GraphStore for SqliteGraphStore {
    fn session(&self) -> Result<Box<dyn GraphSession + '_>> {
        Ok(Box::new(SqliteSession {
            conn: self.pool.get()?,
        }))
    }
}

/// WAL so readers don't block the writing job.
fn configure_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
        "#,
    )
}

pub struct SqliteSession {
    conn: PooledConnection<SqliteConnectionManager>,
}

const REFERENCE_COLUMNS: &str = r#"
    r.id, s.name, r.start_line, r.start_column, r.end_line, r.end_column, r.url, r.version,
    rf.repo, rf.path, rf.module, df.repo, df.path, df.module
    FROM symbol_references r
    JOIN symbols s ON s.id = r.symbol_id
    JOIN files rf ON rf.id = r.referer_file_id
    JOIN files df ON df.id = r.referred_file_id
"#;

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<Reference> {
    Ok(Reference {
        id: row.get(0)?,
        symbol: row.get(1)?,
        region: Region {
            start: Position {
                line: row.get(2)?,
                column: row.get(3)?,
            },
            end: Position {
                line: row.get(4)?,
                column: row.get(5)?,
            },
        },
        url: row.get(6)?,
        version: row.get(7)?,
        referer: FileRef {
            repo: row.get(8)?,
            file: row.get(9)?,
            module: row.get(10)?,
        },
        referred: FileRef {
            repo: row.get(11)?,
            file: row.get(12)?,
            module: row.get(13)?,
        },
    })
}

fn upsert_file(conn: &Connection, file: &FileRef) -> rusqlite::Result<String> {
    let id = file.file_id();
    conn.execute(
        "INSERT INTO files (id, repo, path, module) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET module = COALESCE(excluded.module, files.module)",
        params![id, file.repo, file.file, file.module],
    )?;
    Ok(id)
}

impl GraphSession for SqliteSession {
    fn enqueue_repository(&mut self, meta: &RepoMetadata) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO repos (id, owner, name, stars, license, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meta.id().full_name(),
                meta.owner,
                meta.name,
                meta.stars.map(|s| s as i64),
                meta.license,
                meta.last_updated
            ],
        )?;
        Ok(inserted > 0)
    }

    fn pending_repositories(&mut self) -> Result<Vec<RepoMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner, name, stars, last_updated, license FROM repos
             WHERE imported = 0 ORDER BY stars DESC, id",
        )?;
        let repos = stmt
            .query_map([], |row| {
                Ok(RepoMetadata {
                    owner: row.get(0)?,
                    name: row.get(1)?,
                    stars: row.get::<_, Option<i64>>(2)?.map(|s| s.max(0) as u64),
                    last_updated: row.get(3)?,
                    license: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(repos)
    }

    fn upsert_repository(&mut self, meta: &RepoMetadata, timestamps: &RepoTimestamps) -> Result<()> {
        self.conn.execute(
            "INSERT INTO repos (id, owner, name, stars, license, last_updated, created, last_commit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                stars = COALESCE(excluded.stars, repos.stars),
                license = COALESCE(excluded.license, repos.license),
                last_updated = COALESCE(excluded.last_updated, repos.last_updated),
                created = COALESCE(excluded.created, repos.created),
                last_commit = COALESCE(excluded.last_commit, repos.last_commit)",
            params![
                meta.id().full_name(),
                meta.owner,
                meta.name,
                meta.stars.map(|s| s as i64),
                meta.license,
                meta.last_updated,
                timestamps.created,
                timestamps.last_commit
            ],
        )?;
        Ok(())
    }

    fn replace_references(&mut self, repo: &str, references: &[Reference]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM symbol_references WHERE referer_repo = ?1",
            params![repo],
        )?;

        for reference in references {
            let referer = upsert_file(&tx, &reference.referer)?;
            let referred = upsert_file(&tx, &reference.referred)?;
            let symbol_id = reference.symbol_id();

            tx.execute(
                "INSERT OR IGNORE INTO symbols (id, name, file_id) VALUES (?1, ?2, ?3)",
                params![symbol_id, reference.symbol, referred],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO symbol_references
                 (id, referer_repo, referer_file_id, referred_file_id, symbol_id, version,
                  start_line, start_column, end_line, end_column, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    reference.id,
                    repo,
                    referer,
                    referred,
                    symbol_id,
                    reference.version,
                    reference.region.start.line,
                    reference.region.start.column,
                    reference.region.end.line,
                    reference.region.end.column,
                    reference.url
                ],
            )?;
        }

        // Duplicate locators collapse into one row.
        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM symbol_references WHERE referer_repo = ?1",
            params![repo],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(stored as usize)
    }

    fn replace_dependency_edges(&mut self, owner_repo: &str, edges: &[DependencyEdge]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM dependency_edges WHERE owner_repo = ?1",
            params![owner_repo],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dependency_edges
                 (owner_repo, dependency_repo, version, version_range, start_ts, end_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    owner_repo,
                    edge.dependency_repo,
                    edge.version,
                    edge.version_range,
                    edge.start,
                    edge.end
                ])?;
            }
        }
        tx.commit()?;
        Ok(edges.len())
    }

    fn mark_imported(&mut self, repo: &str) -> Result<()> {
        let updated = self
            .conn
            .execute("UPDATE repos SET imported = 1 WHERE id = ?1", params![repo])?;
        if updated == 0 {
            tracing::debug!("mark_imported: {} is not a known repository", repo);
        }
        Ok(())
    }

    fn references_from(&mut self, repo: &str) -> Result<Vec<Reference>> {
        let sql = format!(
            "SELECT {} WHERE r.referer_repo = ?1
             ORDER BY rf.path, r.start_line, r.start_column, r.id",
            REFERENCE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs = stmt
            .query_map(params![repo], reference_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    fn dependency_edges(&mut self, owner_repo: &str) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner_repo, dependency_repo, version, version_range, start_ts, end_ts
             FROM dependency_edges WHERE owner_repo = ?1
             ORDER BY dependency_repo, start_ts",
        )?;
        let edges = stmt
            .query_map(params![owner_repo], |row| {
                Ok(DependencyEdge {
                    owner_repo: row.get(0)?,
                    dependency_repo: row.get(1)?,
                    version: row.get(2)?,
                    version_range: row.get(3)?,
                    start: row.get(4)?,
                    end: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn references_to(&mut self, repo: &str, version: Option<&str>) -> Result<Vec<Reference>> {
        let sql = format!(
            "SELECT {} WHERE df.repo = ?1 AND (?2 IS NULL OR r.version = ?2)
             ORDER BY rf.repo, rf.path, r.start_line, r.start_column, r.id",
            REFERENCE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs = stmt
            .query_map(params![repo, version], reference_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }
}
