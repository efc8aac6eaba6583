//! Set-based duplicate removal.
//!
//! Rows are append-only and carry an insertion-order `id`; the survivor of
//! each identity group is the row with the largest `id`.

/// Plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single DELETE keeping the newest row per `identity` group.
///
/// Names are spliced into the statement, so they are checked first.
pub fn dedupe_statement(table: &str, identity: &[&str]) -> Result<String, sqlx::Error> {
    if !is_identifier(table) {
        return Err(sqlx::Error::Configuration(
            format!("invalid table name for dedupe: {table:?}").into(),
        ));
    }
    if identity.is_empty() {
        return Err(sqlx::Error::Configuration(
            format!("dedupe on {table} needs at least one identity column").into(),
        ));
    }
    if let Some(bad) = identity.iter().find(|c| !is_identifier(c)) {
        return Err(sqlx::Error::Configuration(
            format!("invalid identity column for dedupe: {bad:?}").into(),
        ));
    }

    let partition = identity.join(", ");
    Ok(format!(
        "DELETE FROM {table} WHERE id IN (\
            SELECT id FROM (\
                SELECT id, row_number() OVER (PARTITION BY {partition} ORDER BY id DESC) AS rn \
                FROM {table}\
            ) AS ranked WHERE rn > 1\
        )"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Row, SqlitePool};

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::raw_sql(
            "CREATE TABLE product_attributes (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                identity_key TEXT NOT NULL, \
                value TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .expect("create table");
        pool
    }

    async fn insert(pool: &SqlitePool, rows: &[(&str, &str)]) {
        for (key, value) in rows {
            sqlx::query("INSERT INTO product_attributes (identity_key, value) VALUES (?, ?)")
                .bind(*key)
                .bind(*value)
                .execute(pool)
                .await
                .expect("insert");
        }
    }

    async fn run(pool: &SqlitePool) -> u64 {
        let sql = dedupe_statement("product_attributes", &["identity_key"]).expect("valid names");
        sqlx::raw_sql(&sql)
            .execute(pool)
            .await
            .expect("dedupe")
            .rows_affected()
    }

    async fn survivors(pool: &SqlitePool) -> Vec<(String, String)> {
        sqlx::query("SELECT identity_key, value FROM product_attributes ORDER BY identity_key")
            .fetch_all(pool)
            .await
            .expect("select")
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect()
    }

    #[tokio::test]
    async fn keeps_latest_row_per_identity() {
        let pool = pool().await;
        insert(&pool, &[("1:85", "old"), ("1:images", "a|b"), ("1:85", "new")]).await;
        assert_eq!(run(&pool).await, 1);
        assert_eq!(
            survivors(&pool).await,
            vec![
                ("1:85".to_string(), "new".to_string()),
                ("1:images".to_string(), "a|b".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let pool = pool().await;
        insert(&pool, &[("a", "1"), ("a", "2"), ("a", "3"), ("b", "1")]).await;
        assert_eq!(run(&pool).await, 2);
        let after_first = survivors(&pool).await;
        assert_eq!(run(&pool).await, 0);
        assert_eq!(survivors(&pool).await, after_first);
    }

    #[tokio::test]
    async fn reingesting_the_same_rows_converges() {
        let pool = pool().await;
        let batch = [("7:85:v0", "Red"), ("7:85:v1", "Blue"), ("7:description", "Mug")];
        insert(&pool, &batch).await;
        run(&pool).await;
        let once = survivors(&pool).await;
        insert(&pool, &batch).await;
        assert_eq!(run(&pool).await, 3);
        assert_eq!(survivors(&pool).await, once);
    }

    #[test]
    fn rejects_unsafe_names() {
        assert!(dedupe_statement("product_attributes; DROP TABLE x", &["identity_key"]).is_err());
        assert!(dedupe_statement("category", &["cat_id) OR (1=1"]).is_err());
        assert!(dedupe_statement("category", &[]).is_err());
        assert!(!is_identifier("1abc"));
        assert!(is_identifier("_cat_id2"));
    }

    #[test]
    fn statement_partitions_by_all_columns() {
        let sql = dedupe_statement("category", &["cat_id", "tenant_id"]).expect("valid");
        assert!(sql.contains("PARTITION BY cat_id, tenant_id ORDER BY id DESC"));
        assert!(sql.starts_with("DELETE FROM category WHERE id IN ("));
    }
}
