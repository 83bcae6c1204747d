use anyhow::Result;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, EntityTrait, Schema, SqlxPostgresConnector,
    sea_query::Index,
};
use sqlx::postgres::PgPoolOptions;

use crate::entity::{
    AuditLogs, CartItems, Carts, Categories, Feedbacks, OrderItems, Orders, Payments, Profiles,
    Users, cart_items, feedbacks,
};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Create the Postgres pool used for migrations and shared with the ORM.
pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Wrap an existing Postgres pool in a SeaORM connection.
pub fn orm_from_pool(pool: DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
}

/// Build the schema straight from the entity definitions.
///
/// Production databases are migrated with the SQL files in `migrations/`;
/// this is for throwaway databases such as the in-memory SQLite used by tests.
pub async fn create_schema(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children so foreign keys resolve.
    create_table(conn, &schema, Users).await?;
    create_table(conn, &schema, Profiles).await?;
    create_table(conn, &schema, Categories).await?;
    create_table(conn, &schema, Carts).await?;
    create_table(conn, &schema, CartItems).await?;
    create_table(conn, &schema, Orders).await?;
    create_table(conn, &schema, OrderItems).await?;
    create_table(conn, &schema, Payments).await?;
    create_table(conn, &schema, Feedbacks).await?;
    create_table(conn, &schema, AuditLogs).await?;

    let cart_category = Index::create()
        .name("uq_cart_items_cart_category")
        .table(CartItems)
        .col(cart_items::Column::CartId)
        .col(cart_items::Column::CategoryId)
        .unique()
        .to_owned();
    conn.execute(backend.build(&cart_category)).await?;

    let feedback_owner = Index::create()
        .name("uq_feedbacks_order_item_user")
        .table(Feedbacks)
        .col(feedbacks::Column::OrderItemId)
        .col(feedbacks::Column::UserId)
        .unique()
        .to_owned();
    conn.execute(backend.build(&feedback_owner)).await?;

    Ok(())
}

async fn create_table<E: EntityTrait>(
    conn: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let backend = conn.get_database_backend();
    conn.execute(backend.build(&schema.create_table_from_entity(entity)))
        .await?;
    Ok(())
}
