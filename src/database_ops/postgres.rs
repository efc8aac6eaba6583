use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::{Acquire, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, instrument, warn};

use super::db::Db;
use super::dedupe::dedupe_statement;
use super::store::{CatalogStore, CredentialSource, StoreSession, Table};
use crate::error::SyncResult;
use crate::models::{
    CategoryAttributeRow, CategoryRow, Credential, DictionaryValueRow, ProductAttributeRow,
};

/// Rows per INSERT statement; keeps bind counts well under the 65535 limit.
const INSERT_BATCH: usize = 1000;

#[derive(Clone)]
pub struct PgStore {
    db: Db,
    marketplace_id: i64,
}

impl PgStore {
    pub fn new(db: Db, marketplace_id: i64) -> Self {
        Self { db, marketplace_id }
    }
}

#[async_trait]
impl CredentialSource for PgStore {
    #[instrument(skip(self))]
    async fn credentials(&self, marketplace_id: i64) -> SyncResult<Vec<Credential>> {
        let rows = sqlx::query(
            "SELECT id::bigint AS id, client_id_api::text AS client_id_api, api_key::text AS api_key \
             FROM account WHERE mp_id = $1 ORDER BY id",
        )
        .bind(marketplace_id)
        .persistent(false)
        .fetch_all(&self.db.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let tenant_id: i64 = row.try_get("id")?;
            let client_id: Option<String> = row.try_get("client_id_api")?;
            let api_key: Option<String> = row.try_get("api_key")?;
            match (client_id, api_key) {
                (Some(external_client_id), Some(api_key)) => out.push(Credential {
                    tenant_id,
                    external_client_id,
                    api_key,
                }),
                _ => warn!(tenant_id, "account row without client id or api key; skipping"),
            }
        }
        debug!(count = out.len(), "loaded credentials");
        Ok(out)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    type Session = PgSession;

    async fn begin(&self) -> SyncResult<PgSession> {
        Ok(PgSession {
            tx: self.db.pool.begin().await?,
            marketplace_id: self.marketplace_id,
        })
    }

    #[instrument(skip(self))]
    async fn dedupe(&self, table: Table) -> SyncResult<u64> {
        let sql = dedupe_statement(table.name(), table.identity_columns())?;
        let res = sqlx::raw_sql(&sql).execute(&self.db.pool).await?;
        debug!(deleted = res.rows_affected(), "dedupe done");
        Ok(res.rows_affected())
    }
}

/// One open transaction. Each insert call runs inside its own savepoint so a
/// failed call is rolled back alone.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
    marketplace_id: i64,
}

async fn insert_batched<'a, R, F>(
    tx: &mut Transaction<'static, Postgres>,
    head: &'static str,
    rows: &'a [R],
    mut bind: F,
) -> Result<u64, sqlx::Error>
where
    R: Sync,
    F: FnMut(Separated<'_, 'a, Postgres, &'static str>, &'a R) + Send,
{
    if rows.is_empty() {
        return Ok(0);
    }
    let mut sp = tx.begin().await?;
    let mut written = 0;
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut qb: QueryBuilder<'a, Postgres> = QueryBuilder::new(head);
        qb.push_values(chunk, |b, r| bind(b, r));
        written += qb
            .build()
            .persistent(false)
            .execute(&mut *sp)
            .await?
            .rows_affected();
    }
    sp.commit().await?;
    Ok(written)
}

#[async_trait]
impl StoreSession for PgSession {
    async fn insert_product_attributes(&mut self, rows: &[ProductAttributeRow]) -> SyncResult<u64> {
        let mp_id = self.marketplace_id;
        Ok(insert_batched(
            &mut self.tx,
            "INSERT INTO product_attributes \
             (product_id, attribute_id, value, dictionary_value_id, complex_id, tenant_id, mp_id, identity_key) ",
            rows,
            |mut b, r| {
                b.push_bind(r.product_id)
                    .push_bind(&r.attribute_id)
                    .push_bind(&r.value)
                    .push_bind(r.dictionary_value_id)
                    .push_bind(r.complex_id)
                    .push_bind(r.tenant_id)
                    .push_bind(mp_id)
                    .push_bind(&r.identity);
            },
        )
        .await?)
    }

    async fn insert_categories(&mut self, rows: &[CategoryRow]) -> SyncResult<u64> {
        let mp_id = self.marketplace_id;
        Ok(insert_batched(
            &mut self.tx,
            "INSERT INTO category (cat_id, name, tenant_id, mp_id) ",
            rows,
            |mut b, r| {
                b.push_bind(r.cat_id)
                    .push_bind(&r.name)
                    .push_bind(r.tenant_id)
                    .push_bind(mp_id);
            },
        )
        .await?)
    }

    async fn insert_category_attributes(&mut self, rows: &[CategoryAttributeRow]) -> SyncResult<u64> {
        Ok(insert_batched(
            &mut self.tx,
            "INSERT INTO category_attributes \
             (identity_key, chid, name, is_required, is_collection, type, description, dictionary_id, group_name, cat_id) ",
            rows,
            |mut b, r| {
                b.push_bind(&r.identity)
                    .push_bind(&r.chid)
                    .push_bind(&r.name)
                    .push_bind(r.is_required)
                    .push_bind(r.is_collection)
                    .push_bind(&r.attr_type)
                    .push_bind(&r.description)
                    .push_bind(r.dictionary_id)
                    .push_bind(r.group_name.as_deref())
                    .push_bind(r.cat_id);
            },
        )
        .await?)
    }

    async fn insert_dictionary_values(&mut self, rows: &[DictionaryValueRow]) -> SyncResult<u64> {
        Ok(insert_batched(
            &mut self.tx,
            "INSERT INTO attribute_dictionary_value \
             (identity_key, value, picture, info, attr_param_id, chid) ",
            rows,
            |mut b, r| {
                b.push_bind(&r.identity)
                    .push_bind(&r.value)
                    .push_bind(r.picture.as_deref())
                    .push_bind(r.info.as_deref())
                    .push_bind(r.attr_param_id)
                    .push_bind(&r.chid);
            },
        )
        .await?)
    }

    async fn commit(self) -> SyncResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
