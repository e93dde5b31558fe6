//! # Postgres Store
//!
//! [`PgStore`] persists recipes, orders and both ledgers in Postgres through
//! `sqlx`. Every query is scoped to the owning user.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::ledger::{LedgerEntry, LedgerKind, LedgerMutation};
use crate::order_model::{Order, OrderId, OrderLine, OrderStatus};
use crate::recipe_model::{IngredientSpec, Recipe, RecipeId, Unit};
use crate::store::KitchenStore;

/// Open a connection pool sized from the configuration
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!(max_connections = config.max_connections, "Connecting to database");
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipes (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            name VARCHAR(255) NOT NULL,
            selling_price NUMERIC(12, 2) NOT NULL CHECK (selling_price >= 0),
            image_ref TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create recipes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id BIGINT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount DOUBLE PRECISION NOT NULL,
            unit TEXT NOT NULL,
            PRIMARY KEY (recipe_id, position)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create recipe_ingredients table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            total_price NUMERIC(12, 2) NOT NULL,
            status TEXT NOT NULL DEFAULT 'ongoing',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create orders table")?;

    // Lines keep the recipe id without a foreign key: deleting a recipe must
    // not rewrite orders that still reference it.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS order_lines (
            order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            recipe_id BIGINT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            PRIMARY KEY (order_id, position)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create order_lines table")?;

    for kind in [LedgerKind::ShoppingList, LedgerKind::Inventory] {
        let table = kind.table_name();
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                ingredient TEXT NOT NULL,
                unit TEXT NOT NULL,
                quantity DOUBLE PRECISION NOT NULL
            )"
        ))
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create {table} table"))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_user_ingredient
             ON {table}(user_id, LOWER(ingredient), unit)"
        ))
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create {table} index"))?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recipes_user_id ON recipes(user_id)")
        .execute(pool)
        .await
        .context("Failed to create recipes index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders(user_id)")
        .execute(pool)
        .await
        .context("Failed to create orders index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Kitchen store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply mutations inside one transaction
    ///
    /// Unlike [`KitchenStore::apply_mutations`], a failure rolls back every
    /// write of the batch.
    pub async fn apply_mutations_atomic(
        &self,
        user_id: &str,
        mutations: &[LedgerMutation],
    ) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin ledger transaction")?;

        let mut applied = 0;
        for mutation in mutations {
            applied += execute_mutation(&mut *tx, user_id, mutation).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit ledger transaction")?;

        info!(user_id = %user_id, applied, "Applied ledger mutations atomically");
        Ok(applied)
    }

    async fn load_ingredients(&self, recipe_id: RecipeId) -> Result<Vec<IngredientSpec>> {
        let rows = sqlx::query(
            "SELECT name, amount, unit FROM recipe_ingredients
             WHERE recipe_id = $1 ORDER BY position",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read recipe ingredients")?;

        rows.iter()
            .map(|row| -> Result<IngredientSpec> {
                let unit: String = row.try_get("unit")?;
                Ok(IngredientSpec {
                    name: row.try_get("name")?,
                    amount: row.try_get("amount")?,
                    unit: unit.parse::<Unit>()?,
                })
            })
            .collect()
    }

    async fn load_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            "SELECT recipe_id, quantity FROM order_lines
             WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read order lines")?;

        rows.iter()
            .map(|row| -> Result<OrderLine> {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(OrderLine {
                    recipe_id: row.try_get("recipe_id")?,
                    quantity: u32::try_from(quantity)
                        .with_context(|| format!("Negative quantity stored: {quantity}"))?,
                })
            })
            .collect()
    }

    async fn recipe_from_row(&self, row: &PgRow) -> Result<Recipe> {
        let id: RecipeId = row.try_get("id")?;
        Ok(Recipe {
            id,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            selling_price: row.try_get::<Decimal, _>("selling_price")?,
            ingredients: self.load_ingredients(id).await?,
            image_ref: row.try_get("image_ref")?,
        })
    }

    async fn order_from_row(&self, row: &PgRow) -> Result<Order> {
        let id: OrderId = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        Ok(Order {
            id,
            user_id: row.try_get("user_id")?,
            customer_name: row.try_get("customer_name")?,
            lines: self.load_lines(id).await?,
            total_price: row.try_get::<Decimal, _>("total_price")?,
            status: OrderStatus::parse(&status)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry> {
    let unit: String = row.try_get("unit")?;
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        ingredient: row.try_get("ingredient")?,
        unit: unit.parse::<Unit>()?,
        quantity: row.try_get("quantity")?,
    })
}

async fn insert_ingredients(
    conn: &mut sqlx::PgConnection,
    recipe_id: RecipeId,
    ingredients: &[IngredientSpec],
) -> Result<()> {
    for (position, ingredient) in ingredients.iter().enumerate() {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, position, name, amount, unit)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(recipe_id)
        .bind(i32::try_from(position).context("Too many ingredients")?)
        .bind(&ingredient.name)
        .bind(ingredient.amount)
        .bind(ingredient.unit.as_str())
        .execute(&mut *conn)
        .await
        .context("Failed to insert recipe ingredient")?;
    }
    Ok(())
}

async fn insert_lines(
    conn: &mut sqlx::PgConnection,
    order_id: OrderId,
    lines: &[OrderLine],
) -> Result<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_lines (order_id, position, recipe_id, quantity)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(i32::try_from(position).context("Too many order lines")?)
        .bind(line.recipe_id)
        .bind(i32::try_from(line.quantity).context("Order quantity too large")?)
        .execute(&mut *conn)
        .await
        .context("Failed to insert order line")?;
    }
    Ok(())
}

/// Run one mutation, returning the number of rows it changed
async fn execute_mutation(
    conn: &mut sqlx::PgConnection,
    user_id: &str,
    mutation: &LedgerMutation,
) -> Result<usize> {
    let table = mutation.target().table_name();

    let affected = match mutation {
        LedgerMutation::Create { entry, .. } => {
            let id: i64 = sqlx::query_scalar(&format!(
                "INSERT INTO {table} (user_id, ingredient, unit, quantity)
                 VALUES ($1, $2, $3, $4) RETURNING id"
            ))
            .bind(user_id)
            .bind(&entry.ingredient)
            .bind(entry.unit.as_str())
            .bind(entry.quantity)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert {table} entry"))?;
            debug!(entry_id = id, table, ingredient = %entry.ingredient, "Created ledger entry");
            1
        }
        LedgerMutation::Update { entry, .. } => sqlx::query(&format!(
            "UPDATE {table} SET ingredient = $1, unit = $2, quantity = $3
             WHERE id = $4 AND user_id = $5"
        ))
        .bind(&entry.ingredient)
        .bind(entry.unit.as_str())
        .bind(entry.quantity)
        .bind(entry.id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to update {table} entry {}", entry.id))?
        .rows_affected(),
        LedgerMutation::Delete { entry, .. } => {
            sqlx::query(&format!("DELETE FROM {table} WHERE id = $1 AND user_id = $2"))
                .bind(entry.id)
                .bind(user_id)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to delete {table} entry {}", entry.id))?
                .rows_affected()
        }
    };

    if affected == 0 {
        warn!(table, mutation = %mutation, "Ledger entry no longer exists, write skipped");
    }
    Ok(affected as usize)
}

impl KitchenStore for PgStore {
    async fn list_recipes(&self, user_id: &str) -> Result<Vec<Recipe>> {
        debug!(user_id = %user_id, "Listing recipes");

        let rows = sqlx::query(
            "SELECT id, user_id, name, selling_price, image_ref FROM recipes
             WHERE user_id = $1 ORDER BY LOWER(name), id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list recipes")?;

        let mut recipes = Vec::with_capacity(rows.len());
        for row in &rows {
            recipes.push(self.recipe_from_row(row).await?);
        }
        Ok(recipes)
    }

    async fn get_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<Option<Recipe>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, selling_price, image_ref FROM recipes
             WHERE id = $1 AND user_id = $2",
        )
        .bind(recipe_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read recipe")?;

        match row {
            Some(row) => Ok(Some(self.recipe_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn create_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<RecipeId> {
        info!(user_id = %user_id, name = %recipe.name, "Creating recipe");

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let recipe_id: RecipeId = sqlx::query_scalar(
            "INSERT INTO recipes (user_id, name, selling_price, image_ref)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(&recipe.name)
        .bind(recipe.selling_price)
        .bind(&recipe.image_ref)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert recipe")?;

        insert_ingredients(&mut *tx, recipe_id, &recipe.ingredients).await?;
        tx.commit().await.context("Failed to commit recipe")?;

        info!(recipe_id, "Recipe created");
        Ok(recipe_id)
    }

    async fn update_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<bool> {
        info!(user_id = %user_id, recipe_id = recipe.id, "Updating recipe");

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let rows_affected = sqlx::query(
            "UPDATE recipes SET name = $1, selling_price = $2, image_ref = $3
             WHERE id = $4 AND user_id = $5",
        )
        .bind(&recipe.name)
        .bind(recipe.selling_price)
        .bind(&recipe.image_ref)
        .bind(recipe.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update recipe")?
        .rows_affected();

        if rows_affected == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipe ingredients")?;
        insert_ingredients(&mut *tx, recipe.id, &recipe.ingredients).await?;

        tx.commit().await.context("Failed to commit recipe update")?;
        Ok(true)
    }

    async fn delete_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<bool> {
        info!(user_id = %user_id, recipe_id, "Deleting recipe");

        let rows_affected = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(recipe_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete recipe")?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, customer_name, total_price, status, created_at FROM orders
             WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list orders")?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.order_from_row(row).await?);
        }
        Ok(orders)
    }

    async fn get_order(&self, user_id: &str, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, customer_name, total_price, status, created_at FROM orders
             WHERE id = $1 AND user_id = $2",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read order")?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn create_order(&self, user_id: &str, order: &Order) -> Result<OrderId> {
        info!(user_id = %user_id, customer = %order.customer_name, "Creating order");

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let order_id: OrderId = sqlx::query_scalar(
            "INSERT INTO orders (user_id, customer_name, total_price, status, created_at)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(user_id)
        .bind(&order.customer_name)
        .bind(order.total_price)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert order")?;

        insert_lines(&mut *tx, order_id, &order.lines).await?;
        tx.commit().await.context("Failed to commit order")?;

        info!(order_id, "Order created");
        Ok(order_id)
    }

    async fn update_order(&self, user_id: &str, order: &Order) -> Result<bool> {
        info!(user_id = %user_id, order_id = order.id, status = %order.status, "Updating order");

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let rows_affected = sqlx::query(
            "UPDATE orders SET customer_name = $1, total_price = $2, status = $3
             WHERE id = $4 AND user_id = $5",
        )
        .bind(&order.customer_name)
        .bind(order.total_price)
        .bind(order.status.as_str())
        .bind(order.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update order")?
        .rows_affected();

        if rows_affected == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear order lines")?;
        insert_lines(&mut *tx, order.id, &order.lines).await?;

        tx.commit().await.context("Failed to commit order update")?;
        Ok(true)
    }

    async fn delete_order(&self, user_id: &str, order_id: OrderId) -> Result<bool> {
        info!(user_id = %user_id, order_id, "Deleting order");

        let rows_affected = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete order")?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_entries(&self, user_id: &str, kind: LedgerKind) -> Result<Vec<LedgerEntry>> {
        let table = kind.table_name();
        let rows = sqlx::query(&format!(
            "SELECT id, user_id, ingredient, unit, quantity FROM {table}
             WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list {table} entries"))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn apply_mutations(&self, user_id: &str, mutations: &[LedgerMutation]) -> Result<usize> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire database connection")?;

        let mut applied = 0;
        for mutation in mutations {
            applied += execute_mutation(&mut *conn, user_id, mutation).await?;
        }

        info!(user_id = %user_id, applied, total = mutations.len(), "Applied ledger mutations");
        Ok(applied)
    }
}
