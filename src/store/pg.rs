use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Client, Config, NoTls, Row};
use tokio_postgres::types::ToSql;

use crate::config;
use crate::fs::node::{Content, FileNode, FileVersion, Owner};
use crate::sql;

use super::{Counts, Error, MetaStore, Result};

const NODE_COLUMNS: &str = "\
    fs_nodes.id, \
    fs_nodes.owner_id, \
    fs_nodes.parent_id, \
    fs_nodes.name, \
    fs_nodes.is_directory, \
    fs_nodes.storage_ref, \
    fs_nodes.mime_type, \
    fs_nodes.size, \
    fs_nodes.checksum, \
    fs_nodes.version, \
    fs_nodes.trashed_at, \
    fs_nodes.created_at, \
    fs_nodes.updated_at";

const LISTING_ORDER: &str = "order by fs_nodes.is_directory desc, fs_nodes.name collate \"C\" asc";

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        if sql::unique_constraint_error(&err).is_some() {
            Error::Conflict
        } else {
            Error::backend(err)
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Error::backend(err)
    }
}

fn node_from_row(row: &Row) -> FileNode {
    let is_directory: bool = row.get(4);

    let content = if is_directory {
        None
    } else {
        let mime_type: String = row.get(6);

        Some(Content {
            storage_ref: row.get(5),
            mime: sql::mime_from_sql(&mime_type),
            size: sql::u64_from_sql(row.get(7)),
            checksum: row.get(8),
            version: sql::u32_from_sql(row.get(9)),
        })
    };

    FileNode {
        id: row.get(0),
        owner_id: row.get(1),
        parent_id: row.get(2),
        name: row.get(3),
        content,
        trashed_at: row.get(10),
        created_at: row.get(11),
        updated_at: row.get(12),
    }
}

fn owner_from_row(row: &Row) -> Owner {
    Owner {
        id: row.get(0),
        quota: sql::u64_from_sql(row.get(1)),
        used_space: sql::u64_from_sql(row.get(2)),
        is_active: row.get(3),
    }
}

fn version_from_row(row: &Row) -> FileVersion {
    FileVersion {
        file_id: row.get(0),
        version: sql::u32_from_sql(row.get(1)),
        storage_ref: row.get(2),
        size: sql::u64_from_sql(row.get(3)),
        checksum: row.get(4),
        created_at: row.get(5),
    }
}

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }

    pub fn from_config(db: &config::Db) -> std::result::Result<Self, deadpool_postgres::BuildError> {
        let mut pg_config = Config::new();

        pg_config.user(db.user.as_str());

        if let Some(password) = &db.password {
            pg_config.password(password.as_str());
        }

        pg_config.host(db.host.as_str());
        pg_config.port(db.port);
        pg_config.dbname(db.dbname.as_str());

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(pg_config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(db.max_connections)
            .build()?;

        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn query_nodes(
        conn: &Client,
        query: &str,
        params: &[&(dyn ToSql + Sync)]
    ) -> Result<Vec<FileNode>> {
        let rows = conn.query(query, params).await?;

        Ok(rows.iter().map(node_from_row).collect())
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool", &self.pool.status())
            .finish()
    }
}

#[async_trait::async_trait]
impl MetaStore for PgStore {
    async fn owner(&self, id: &str) -> Result<Option<Owner>> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            "select id, quota, used_space, is_active from owners where id = $1",
            &[&id]
        ).await?;

        Ok(maybe.as_ref().map(owner_from_row))
    }

    async fn adjust_used_space(&self, id: &str, delta: i64, enforce: bool) -> Result<Owner> {
        let conn = self.pool.get().await?;

        // the guard and the write happen in one statement so concurrent
        // reservations cannot both pass the check
        let maybe = conn.query_opt(
            "\
            update owners \
            set used_space = greatest(used_space + $2, 0) \
            where id = $1 and \
                  ($3 = false or $2 <= 0 or used_space + $2 <= quota) \
            returning id, quota, used_space, is_active",
            &[&id, &delta, &enforce]
        ).await?;

        if let Some(row) = maybe {
            return Ok(owner_from_row(&row));
        }

        let exists = conn.query_opt(
            "select id from owners where id = $1",
            &[&id]
        ).await?;

        if exists.is_some() {
            Err(Error::QuotaExceeded)
        } else {
            Err(Error::OwnerNotFound)
        }
    }

    async fn node(&self, id: &str) -> Result<Option<FileNode>> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            &format!("select {NODE_COLUMNS} from fs_nodes where fs_nodes.id = $1"),
            &[&id]
        ).await?;

        Ok(maybe.as_ref().map(node_from_row))
    }

    async fn child(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str
    ) -> Result<Option<FileNode>> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            &format!(
                "\
                select {NODE_COLUMNS} \
                from fs_nodes \
                where fs_nodes.owner_id = $1 and \
                      fs_nodes.parent_id is not distinct from $2 and \
                      fs_nodes.name = $3 and \
                      fs_nodes.trashed_at is null"
            ),
            &[&owner, &parent, &name]
        ).await?;

        Ok(maybe.as_ref().map(node_from_row))
    }

    async fn children(&self, owner: &str, parent: Option<&str>) -> Result<Vec<FileNode>> {
        let conn = self.pool.get().await?;

        Self::query_nodes(
            &conn,
            &format!(
                "\
                select {NODE_COLUMNS} \
                from fs_nodes \
                where fs_nodes.owner_id = $1 and \
                      fs_nodes.parent_id is not distinct from $2 and \
                      fs_nodes.trashed_at is null \
                {LISTING_ORDER}"
            ),
            &[&owner, &parent]
        ).await
    }

    async fn all_children(&self, parent: &str) -> Result<Vec<FileNode>> {
        let conn = self.pool.get().await?;

        Self::query_nodes(
            &conn,
            &format!("select {NODE_COLUMNS} from fs_nodes where fs_nodes.parent_id = $1"),
            &[&parent]
        ).await
    }

    async fn insert_node(&self, node: &FileNode) -> Result<()> {
        let conn = self.pool.get().await?;

        let is_directory = node.is_directory();
        let storage_ref = node.content.as_ref().map(|c| c.storage_ref.as_str());
        let mime_type = node.content.as_ref().map(|c| c.mime.to_string());
        let size = node.content.as_ref().map(|c| sql::u64_to_sql(c.size));
        let checksum = node.content.as_ref().map(|c| c.checksum.as_str());
        let version = node.content.as_ref().map(|c| sql::u32_to_sql(c.version));

        conn.execute(
            "\
            insert into fs_nodes (\
                id, owner_id, parent_id, name, is_directory, \
                storage_ref, mime_type, size, checksum, version, \
                trashed_at, created_at, updated_at\
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            &[
                &node.id,
                &node.owner_id,
                &node.parent_id,
                &node.name,
                &is_directory,
                &storage_ref,
                &mime_type,
                &size,
                &checksum,
                &version,
                &node.trashed_at,
                &node.created_at,
                &node.updated_at,
            ]
        ).await?;

        Ok(())
    }

    async fn update_node(&self, node: &FileNode) -> Result<()> {
        let conn = self.pool.get().await?;

        let updated = conn.execute(
            "\
            update fs_nodes \
            set name = $2, \
                parent_id = $3, \
                trashed_at = $4, \
                updated_at = $5 \
            where id = $1",
            &[
                &node.id,
                &node.name,
                &node.parent_id,
                &node.trashed_at,
                &node.updated_at,
            ]
        ).await?;

        if updated == 0 {
            Err(Error::Stale)
        } else {
            Ok(())
        }
    }

    async fn replace_content(&self, node: &FileNode, previous: &FileVersion) -> Result<()> {
        let Some(content) = node.content.as_ref() else {
            return Err(Error::backend("attempted to replace the content of a directory"));
        };

        let mut conn = self.pool.get().await?;
        let transaction = conn.transaction().await?;

        let mime_type = content.mime.to_string();
        let size = sql::u64_to_sql(content.size);
        let version = sql::u32_to_sql(content.version);
        let prev_version = sql::u32_to_sql(previous.version);

        let updated = transaction.execute(
            "\
            update fs_nodes \
            set storage_ref = $2, \
                mime_type = $3, \
                size = $4, \
                checksum = $5, \
                version = $6, \
                updated_at = $7 \
            where id = $1 and version = $8",
            &[
                &node.id,
                &content.storage_ref,
                &mime_type,
                &size,
                &content.checksum,
                &version,
                &node.updated_at,
                &prev_version,
            ]
        ).await?;

        if updated == 0 {
            return Err(Error::Stale);
        }

        let prev_size = sql::u64_to_sql(previous.size);

        transaction.execute(
            "\
            insert into fs_versions (\
                file_id, version, storage_ref, size, checksum, created_at\
            ) values ($1, $2, $3, $4, $5, $6)",
            &[
                &previous.file_id,
                &prev_version,
                &previous.storage_ref,
                &prev_size,
                &previous.checksum,
                &previous.created_at,
            ]
        ).await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn versions(&self, file_id: &str) -> Result<Vec<FileVersion>> {
        let conn = self.pool.get().await?;

        let rows = conn.query(
            "\
            select file_id, version, storage_ref, size, checksum, created_at \
            from fs_versions \
            where file_id = $1 \
            order by version desc",
            &[&file_id]
        ).await?;

        Ok(rows.iter().map(version_from_row).collect())
    }

    async fn delete_node(&self, id: &str) -> Result<Vec<FileVersion>> {
        let mut conn = self.pool.get().await?;
        let transaction = conn.transaction().await?;

        let rows = transaction.query(
            "\
            delete from fs_versions \
            where file_id = $1 \
            returning file_id, version, storage_ref, size, checksum, created_at",
            &[&id]
        ).await?;

        let deleted = transaction.execute(
            "delete from fs_nodes where id = $1",
            &[&id]
        ).await?;

        if deleted == 0 {
            return Err(Error::Stale);
        }

        transaction.commit().await?;

        Ok(rows.iter().map(version_from_row).collect())
    }

    async fn trashed(&self, owner: &str) -> Result<Vec<FileNode>> {
        let conn = self.pool.get().await?;

        Self::query_nodes(
            &conn,
            &format!(
                "\
                select {NODE_COLUMNS} \
                from fs_nodes \
                where fs_nodes.owner_id = $1 and \
                      fs_nodes.trashed_at is not null \
                order by fs_nodes.trashed_at desc"
            ),
            &[&owner]
        ).await
    }

    async fn search(&self, owner: &str, needle: &str) -> Result<Vec<FileNode>> {
        let conn = self.pool.get().await?;

        // strpos avoids having to escape like wildcards in the needle
        Self::query_nodes(
            &conn,
            &format!(
                "\
                select {NODE_COLUMNS} \
                from fs_nodes \
                where fs_nodes.owner_id = $1 and \
                      fs_nodes.trashed_at is null and \
                      strpos(lower(fs_nodes.name), lower($2)) > 0 \
                {LISTING_ORDER}"
            ),
            &[&owner, &needle]
        ).await
    }

    async fn counts(&self, owner: &str) -> Result<Counts> {
        let conn = self.pool.get().await?;

        let row = conn.query_one(
            "\
            select count(*) filter (where not is_directory), \
                   count(*) filter (where is_directory) \
            from fs_nodes \
            where owner_id = $1 and trashed_at is null",
            &[&owner]
        ).await?;

        Ok(Counts {
            files: sql::u64_from_sql(row.get(0)),
            folders: sql::u64_from_sql(row.get(1)),
        })
    }
}
