//! Write functions - create destination tables and bulk-load them into PostgreSQL

use crate::etl::error::{EtlError, EtlResult};
use crate::etl::schema::{infer_schema, quote_ident, SqlValue, Table, TableSchema};
use crate::etl::types::{TableBundle, WriteStats};
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

/// PostgreSQL caps a single statement at this many bind parameters
const MAX_BIND_PARAMS: usize = 65_535;

/// Parents before children, so foreign keys always resolve
pub const LOAD_ORDER: [&str; 8] = [
    "host",
    "host_verification",
    "amenity",
    "reviewer",
    "listing",
    "listing_amenity",
    "review",
    "availability",
];

/// Load all eight tables in dependency order
pub async fn load_bundle(db: &PgPool, bundle: &TableBundle) -> EtlResult<Vec<WriteStats>> {
    info!("Loading tables in order: {}", LOAD_ORDER.join(", "));

    let stats = vec![
        load_table(db, &bundle.host).await?,
        load_table(db, &bundle.host_verification).await?,
        load_table(db, &bundle.amenity).await?,
        load_table(db, &bundle.reviewer).await?,
        load_table(db, &bundle.listing).await?,
        load_table(db, &bundle.listing_amenity).await?,
        load_table(db, &bundle.review).await?,
        load_table(db, &bundle.availability).await?,
    ];

    info!("Load complete: {} tables written", stats.len());
    Ok(stats)
}

/// Infer the schema of one table, make sure it exists and is empty, then insert every row
pub async fn load_table<T: Table>(db: &PgPool, rows: &[T]) -> EtlResult<WriteStats> {
    let schema = infer_schema(rows);
    let created = ensure_table(db, &schema).await?;
    let inserted = bulk_insert(db, &schema, rows).await?;

    let stats = WriteStats {
        table: T::NAME,
        inserted,
        created,
    };
    info!("✓ {}", stats);
    Ok(stats)
}

/// Create the table when missing, otherwise truncate it
/// Returns true when the table was created
pub async fn ensure_table(db: &PgPool, schema: &TableSchema) -> EtlResult<bool> {
    let load_err = |source: sqlx::Error| EtlError::Load {
        table: schema.table,
        source,
    };

    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )
        "#,
    )
    .bind(schema.table)
    .fetch_one(db)
    .await
    .map_err(load_err)?;

    if exists {
        sqlx::query(&format!("TRUNCATE TABLE {}", quote_ident(schema.table)))
            .execute(db)
            .await
            .map_err(load_err)?;
        debug!("Table {} already exists, truncated", schema.table);
        return Ok(false);
    }

    sqlx::query(&schema.create_statement())
        .execute(db)
        .await
        .map_err(load_err)?;
    debug!("Created table {}", schema.table);
    Ok(true)
}

/// Insert all rows inside one transaction; any failure rolls the whole table back
pub async fn bulk_insert<T: Table>(
    db: &PgPool,
    schema: &TableSchema,
    rows: &[T],
) -> EtlResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let load_err = |source: sqlx::Error| EtlError::Load {
        table: schema.table,
        source,
    };

    let mut tx = db.begin().await.map_err(load_err)?;

    for chunk in rows.chunks(rows_per_statement(schema.columns.len())) {
        let mut builder = insert_statement(schema, chunk);

        // Dropping `tx` on error rolls back
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(load_err)?;
        debug!("Inserted {} rows into {}", chunk.len(), schema.table);
    }

    tx.commit().await.map_err(load_err)?;
    Ok(rows.len())
}

fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

/// Multi-row `INSERT` for one chunk of rows
fn insert_statement<T: Table>(schema: &TableSchema, chunk: &[T]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote_ident(schema.table),
        schema.column_list()
    ));
    builder.push_values(chunk, |mut b, row| {
        for value in row.values() {
            push_value(&mut b, value);
        }
    });
    builder
}

/// Bind one cell. Nulls go in as a bare `NULL` so they take the type of the
/// existing column, which may differ from this run's inferred type
fn push_value(b: &mut Separated<'_, 'static, Postgres, &'static str>, value: SqlValue) {
    match value {
        SqlValue::Null => {
            b.push("NULL");
        }
        SqlValue::Int(v) => {
            b.push_bind(v);
        }
        SqlValue::Decimal(v) => {
            b.push_bind(v);
        }
        SqlValue::Bool(v) => {
            b.push_bind(v);
        }
        SqlValue::Timestamp(v) => {
            b.push_bind(v);
        }
        SqlValue::Text(v) => {
            b.push_bind(v);
        }
    }
}
