//! # Product Repository
//!
//! Lookup and insertion of products referenced by the stock ledger.
//!
//! The engine never edits products — they belong to the catalog admin
//! screens — but every ledger write validates its product reference here,
//! scoped by business so one tenant can never touch another's stock.

use sqlx::SqliteConnection;
use tally_core::Product;

use crate::error::DbResult;

/// Product data access. Stateless; all methods take the transaction's
/// connection.
pub struct ProductRepo;

impl ProductRepo {
    /// Fetches an active product scoped by business.
    ///
    /// Returns `None` for unknown, soft-deleted or cross-business ids.
    pub async fn get_active(
        conn: &mut SqliteConnection,
        business_id: &str,
        product_id: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, business_id, name, unit, is_active, created_at, updated_at
            FROM products
            WHERE id = ? AND business_id = ? AND is_active = 1
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }

    /// Inserts a product row (seed tooling and tests).
    pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, business_id, name, unit, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.business_id)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
