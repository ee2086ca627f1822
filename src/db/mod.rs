//! Database module for performer, album and track persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Idempotent performer/album resolution and guarded track insertion
//! - Execution of parsed search filters and plain substring searches
//! - Person/group classification of performers
//!
//! All writes go through one [`Store`] write gate so the NOT EXISTS guarded
//! inserts cannot race each other inside the process.
//!
//! # Example
//!
//! ```ignore
//! use rolas::db::{Store, db_url};
//!
//! let store = Store::open(&db_url(None)).await?;
//! let performer = store.get_or_create_performer("Blur").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::model::{Album, Group, Performer, PerformerType, Person, Track};
use crate::query::{Bind, Filter};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "rolas.db";

const TRACK_COLUMNS: &str = r#"
    performers.name AS artist,
    rolas.title,
    albums.name AS album,
    rolas.track,
    rolas.year,
    rolas.genre,
    rolas.path,
    rolas.id_rola AS id
"#;

const TRACK_JOIN: &str = r#"
    FROM rolas
    INNER JOIN performers ON performers.id_performer = rolas.id_performer
    INNER JOIN albums ON albums.id_album = rolas.id_album
"#;

/// Classified database failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint fired even though the insert was guarded
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Foreign key, check or not-null violation
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The pool is closed or the database file is unreachable
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] sqlx::Error),

    /// A track was about to reference a performer or album that was never resolved
    #[error("unresolved {kind} reference (id {id})")]
    MissingReference { kind: &'static str, id: i64 },

    /// An update or lookup named a row that does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("schema bootstrap failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation() || db.is_check_violation() =>
            {
                Self::Constraint(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.message().contains("NOT NULL") => {
                Self::Constraint(db.message().to_string())
            }
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::ConnectionLost(e)
            }
            _ => Self::Query(e),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of [`Store::insert_track_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// A new row was added with this id
    Inserted(i64),
    /// A row with the same natural key or path already exists
    AlreadyPresent,
}

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Handle to the library database.
///
/// Cheap to clone; clones share the pool and the write gate.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl Store {
    /// Open (creating if needed) the database and bootstrap the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or opened, or if the
    /// schema cannot be applied.
    pub async fn open(db_url: &str) -> StoreResult<Self> {
        if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
            tracing::info!(target: "db", url = db_url, "Creating database");
            sqlx::Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Close the pool, waiting for checked-out connections to return.
    /// Later calls on any clone fail with [`StoreError::ConnectionLost`].
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Return the id of the performer called `name`, creating it with
    /// type Unknown if absent. Repeated calls return the same id.
    pub async fn get_or_create_performer(&self, name: &str) -> StoreResult<i64> {
        let name = name.trim();
        let _guard = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO performers (id_type, name)
            SELECT ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM performers WHERE name = ?)
            "#,
        )
        .bind(PerformerType::Unknown.code())
        .bind(name)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        let id: i64 =
            sqlx::query_scalar("SELECT id_performer FROM performers WHERE name = ? LIMIT 1")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Return the id of the album `name` in directory `dir`, creating it if
    /// absent. Albums with the same name in different directories are distinct.
    pub async fn get_or_create_album(&self, dir: &str, name: &str, year: i32) -> StoreResult<i64> {
        let _guard = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO albums (path, name, year)
            SELECT ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM albums WHERE path = ? AND name = ?)
            "#,
        )
        .bind(dir)
        .bind(name)
        .bind(year)
        .bind(dir)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        let id: i64 =
            sqlx::query_scalar("SELECT id_album FROM albums WHERE path = ? AND name = ? LIMIT 1")
                .bind(dir)
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Insert `track` unless a row with the same path, or the same
    /// (performer, album, genre, title), already exists.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingReference`] if either id is not a resolved
    /// identity, [`StoreError::Constraint`] if it does not exist.
    pub async fn insert_track_if_absent(
        &self,
        track: &Track,
        performer_id: i64,
        album_id: i64,
    ) -> StoreResult<Insertion> {
        if performer_id <= 0 {
            return Err(StoreError::MissingReference {
                kind: "performer",
                id: performer_id,
            });
        }
        if album_id <= 0 {
            return Err(StoreError::MissingReference {
                kind: "album",
                id: album_id,
            });
        }

        let _guard = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO rolas (id_performer, id_album, path, title, track, year, genre)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1
                FROM rolas r
                INNER JOIN performers p ON p.id_performer = r.id_performer
                INNER JOIN albums a ON a.id_album = r.id_album
                WHERE (p.name = (SELECT name FROM performers WHERE id_performer = ?)
                   AND a.name = (SELECT name FROM albums WHERE id_album = ?)
                   AND r.genre = ?
                   AND r.title = ?)
                   OR r.path = ?
            )
            "#,
        )
        .bind(performer_id)
        .bind(album_id)
        .bind(&track.path)
        .bind(&track.title)
        .bind(track.track)
        .bind(track.year)
        .bind(&track.genre)
        .bind(performer_id)
        .bind(album_id)
        .bind(&track.genre)
        .bind(&track.title)
        .bind(&track.path)
        .execute(&mut *tx)
        .await?;

        let outcome = if result.rows_affected() > 0 {
            Insertion::Inserted(result.last_insert_rowid())
        } else {
            Insertion::AlreadyPresent
        };

        tx.commit().await?;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Run a parsed filter and return the matching track ids.
    pub async fn query_filter(&self, filter: &Filter) -> StoreResult<Vec<i64>> {
        let sql = format!(
            "SELECT rolas.id_rola {TRACK_JOIN} WHERE {} ORDER BY rolas.id_rola",
            filter.clause
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in &filter.binds {
            query = match bind {
                Bind::Text(s) => query.bind(s.clone()),
                Bind::Integer(n) => query.bind(*n),
            };
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Ids of tracks whose performer, album, title or genre contains `text`.
    pub async fn query_simple(&self, text: &str) -> StoreResult<Vec<i64>> {
        let pattern = crate::query::wildcard(text.trim());
        let sql = format!(
            r#"
            SELECT rolas.id_rola {TRACK_JOIN}
            WHERE performers.name LIKE ?1 ESCAPE '\'
               OR albums.name LIKE ?1 ESCAPE '\'
               OR rolas.title LIKE ?1 ESCAPE '\'
               OR rolas.genre LIKE ?1 ESCAPE '\'
            ORDER BY rolas.id_rola
            "#
        );

        Ok(sqlx::query_scalar::<_, i64>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?)
    }

    // ------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------

    /// A stored track with its performer and album names.
    pub async fn track(&self, id: i64) -> StoreResult<Option<Track>> {
        let sql = format!("SELECT {TRACK_COLUMNS} {TRACK_JOIN} WHERE rolas.id_rola = ?");
        Ok(sqlx::query_as::<_, Track>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn all_tracks(&self) -> StoreResult<Vec<Track>> {
        let sql = format!("SELECT {TRACK_COLUMNS} {TRACK_JOIN} ORDER BY rolas.id_rola");
        Ok(sqlx::query_as::<_, Track>(&sql).fetch_all(&self.pool).await?)
    }

    /// Performer and album ids referenced by a track.
    pub async fn track_foreign_keys(&self, id: i64) -> StoreResult<Option<(i64, i64)>> {
        Ok(
            sqlx::query_as("SELECT id_performer, id_album FROM rolas WHERE id_rola = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn album(&self, id: i64) -> StoreResult<Option<Album>> {
        Ok(sqlx::query_as::<_, Album>(
            "SELECT id_album, path, name, year FROM albums WHERE id_album = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Write edited fields back.
    ///
    /// The performer and album are re-resolved from the record's artist and
    /// album names, creating them if the edit introduced new ones. Fails
    /// with [`StoreError::NotFound`] if no track has the record's id.
    pub async fn update_track(&self, track: &Track) -> StoreResult<()> {
        if self.track(track.id()).await?.is_none() {
            return Err(StoreError::NotFound {
                kind: "track",
                id: track.id(),
            });
        }
        let performer_id = self.get_or_create_performer(&track.artist).await?;
        let album_id = self
            .get_or_create_album(&track.album_dir(), &track.album, track.year)
            .await?;

        let _guard = self.writer.lock().await;
        let result = sqlx::query(
            r#"
            UPDATE rolas
            SET title = ?, track = ?, year = ?, genre = ?, id_performer = ?, id_album = ?
            WHERE id_rola = ?
            "#,
        )
        .bind(&track.title)
        .bind(track.track)
        .bind(track.year)
        .bind(&track.genre)
        .bind(performer_id)
        .bind(album_id)
        .bind(track.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "track",
                id: track.id(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Existence checks
    // ------------------------------------------------------------------

    pub async fn exists_performer(&self, name: &str) -> StoreResult<Option<i64>> {
        Ok(
            sqlx::query_scalar("SELECT id_performer FROM performers WHERE name = ? LIMIT 1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn exists_album(&self, dir: &str, name: &str) -> StoreResult<Option<i64>> {
        Ok(
            sqlx::query_scalar("SELECT id_album FROM albums WHERE path = ? AND name = ? LIMIT 1")
                .bind(dir)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn exists_person(&self, stage_name: &str) -> StoreResult<Option<i64>> {
        Ok(
            sqlx::query_scalar("SELECT id_person FROM persons WHERE stage_name = ? LIMIT 1")
                .bind(stage_name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn exists_group(&self, name: &str) -> StoreResult<Option<i64>> {
        Ok(
            sqlx::query_scalar(r#"SELECT id_group FROM "groups" WHERE name = ? LIMIT 1"#)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // ------------------------------------------------------------------
    // Performers, persons and groups
    // ------------------------------------------------------------------

    pub async fn performer(&self, id: i64) -> StoreResult<Option<Performer>> {
        let row: Option<(i64, i64, String)> = sqlx::query_as(
            "SELECT id_performer, id_type, name FROM performers WHERE id_performer = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, kind, name)| Performer {
            id,
            kind: PerformerType::from_code(kind),
            name,
        }))
    }

    pub async fn update_performer_type(&self, id: i64, kind: PerformerType) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        sqlx::query("UPDATE performers SET id_type = ? WHERE id_performer = ?")
            .bind(kind.code())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_person(
        &self,
        stage_name: &str,
        real_name: &str,
        birth_date: &str,
        death_date: &str,
    ) -> StoreResult<i64> {
        let _guard = self.writer.lock().await;
        let result = sqlx::query(
            r#"
            INSERT INTO persons (stage_name, real_name, birth_date, death_date)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(stage_name)
        .bind(real_name)
        .bind(birth_date)
        .bind(death_date)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn person(&self, id: i64) -> StoreResult<Option<Person>> {
        Ok(sqlx::query_as::<_, Person>(
            r#"
            SELECT id_person, stage_name, real_name, birth_date, death_date
            FROM persons WHERE id_person = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn update_person(&self, person: &Person) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        sqlx::query(
            r#"
            UPDATE persons
            SET stage_name = ?, real_name = ?, birth_date = ?, death_date = ?
            WHERE id_person = ?
            "#,
        )
        .bind(&person.stage_name)
        .bind(&person.real_name)
        .bind(&person.birth_date)
        .bind(&person.death_date)
        .bind(person.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_group(
        &self,
        name: &str,
        start_date: &str,
        end_date: &str,
    ) -> StoreResult<i64> {
        let _guard = self.writer.lock().await;
        let result =
            sqlx::query(r#"INSERT INTO "groups" (name, start_date, end_date) VALUES (?, ?, ?)"#)
                .bind(name)
                .bind(start_date)
                .bind(end_date)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn group(&self, id: i64) -> StoreResult<Option<Group>> {
        Ok(sqlx::query_as::<_, Group>(
            r#"SELECT id_group, name, start_date, end_date FROM "groups" WHERE id_group = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn update_group(&self, group: &Group) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        sqlx::query(
            r#"UPDATE "groups" SET name = ?, start_date = ?, end_date = ? WHERE id_group = ?"#,
        )
            .bind(&group.name)
            .bind(&group.start_date)
            .bind(&group.end_date)
            .bind(group.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record membership; adding an existing membership is a no-op.
    pub async fn add_person_to_group(&self, person_id: i64, group_id: i64) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        sqlx::query("INSERT OR IGNORE INTO in_group (id_person, id_group) VALUES (?, ?)")
            .bind(person_id)
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stage names of the members of a group.
    pub async fn group_members(&self, group_id: i64) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT persons.stage_name
            FROM persons
            INNER JOIN in_group ON in_group.id_person = persons.id_person
            WHERE in_group.id_group = ?
            ORDER BY persons.stage_name
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Names of the groups a person belongs to.
    pub async fn person_groups(&self, person_id: i64) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT "groups".name
            FROM "groups"
            INNER JOIN in_group ON in_group.id_group = "groups".id_group
            WHERE in_group.id_person = ?
            ORDER BY "groups".name
            "#,
        )
        .bind(person_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// `(stage_name, id)` for every person.
    pub async fn all_persons(&self) -> StoreResult<Vec<(String, i64)>> {
        Ok(
            sqlx::query_as("SELECT stage_name, id_person FROM persons ORDER BY stage_name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// `(name, id)` for every group.
    pub async fn all_groups(&self) -> StoreResult<Vec<(String, i64)>> {
        Ok(
            sqlx::query_as(r#"SELECT name, id_group FROM "groups" ORDER BY name"#)
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
