//! # Kitchen Store
//!
//! The storage interface the service drives: recipes, orders and both ledgers,
//! every call scoped to one user. [`crate::db::PgStore`] is the Postgres
//! implementation; [`MemoryStore`] keeps everything in process.

#![allow(async_fn_in_trait)]

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ledger::{EntryId, LedgerEntry, LedgerKind, LedgerMutation, LedgerSnapshot};
use crate::order_model::{Order, OrderId};
use crate::recipe_model::{Recipe, RecipeCatalog, RecipeId};

/// Storage operations used by the kitchen service
pub trait KitchenStore {
    async fn list_recipes(&self, user_id: &str) -> Result<Vec<Recipe>>;
    async fn get_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<Option<Recipe>>;
    async fn create_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<RecipeId>;
    async fn update_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<bool>;
    async fn delete_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<bool>;

    async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>>;
    async fn get_order(&self, user_id: &str, order_id: OrderId) -> Result<Option<Order>>;
    async fn create_order(&self, user_id: &str, order: &Order) -> Result<OrderId>;
    /// Overwrite customer, lines, total and status of a stored order
    async fn update_order(&self, user_id: &str, order: &Order) -> Result<bool>;
    async fn delete_order(&self, user_id: &str, order_id: OrderId) -> Result<bool>;

    async fn list_entries(&self, user_id: &str, kind: LedgerKind) -> Result<Vec<LedgerEntry>>;

    /// Execute mutations one by one; returns how many rows changed
    ///
    /// Each mutation is an independent write. Updates and deletes of entries
    /// that no longer exist are skipped, the first store error stops the run.
    async fn apply_mutations(&self, user_id: &str, mutations: &[LedgerMutation]) -> Result<usize>;

    /// Both ledgers of a user
    async fn snapshot(&self, user_id: &str) -> Result<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            shopping_list: self.list_entries(user_id, LedgerKind::ShoppingList).await?,
            inventory: self.list_entries(user_id, LedgerKind::Inventory).await?,
        })
    }

    /// The user's recipes as a catalog
    async fn catalog(&self, user_id: &str) -> Result<RecipeCatalog> {
        Ok(RecipeCatalog::from_recipes(self.list_recipes(user_id).await?))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    recipes: Vec<Recipe>,
    orders: Vec<Order>,
    shopping_list: Vec<LedgerEntry>,
    inventory: Vec<LedgerEntry>,
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn ledger_mut(&mut self, kind: LedgerKind) -> &mut Vec<LedgerEntry> {
        match kind {
            LedgerKind::ShoppingList => &mut self.shopping_list,
            LedgerKind::Inventory => &mut self.inventory,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ledger entry directly, bypassing the mutation path
    pub async fn seed_entry(
        &self,
        kind: LedgerKind,
        user_id: &str,
        ingredient: &str,
        unit: crate::recipe_model::Unit,
        quantity: f64,
    ) -> EntryId {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.ledger_mut(kind).push(LedgerEntry {
            id,
            user_id: user_id.to_string(),
            ingredient: ingredient.to_string(),
            unit,
            quantity,
        });
        id
    }
}

impl KitchenStore for MemoryStore {
    async fn list_recipes(&self, user_id: &str) -> Result<Vec<Recipe>> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<Option<Recipe>> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .iter()
            .find(|r| r.id == recipe_id && r.user_id == user_id)
            .cloned())
    }

    async fn create_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<RecipeId> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let mut stored = recipe.clone();
        stored.id = id;
        stored.user_id = user_id.to_string();
        state.recipes.push(stored);
        Ok(id)
    }

    async fn update_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .recipes
            .iter_mut()
            .find(|r| r.id == recipe.id && r.user_id == user_id)
        {
            Some(stored) => {
                *stored = Recipe {
                    user_id: user_id.to_string(),
                    ..recipe.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_recipe(&self, user_id: &str, recipe_id: RecipeId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.recipes.len();
        state
            .recipes
            .retain(|r| !(r.id == recipe_id && r.user_id == user_id));
        Ok(state.recipes.len() < before)
    }

    async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_order(&self, user_id: &str, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .cloned())
    }

    async fn create_order(&self, user_id: &str, order: &Order) -> Result<OrderId> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let mut stored = order.clone();
        stored.id = id;
        stored.user_id = user_id.to_string();
        state.orders.push(stored);
        Ok(id)
    }

    async fn update_order(&self, user_id: &str, order: &Order) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id && o.user_id == user_id)
        {
            Some(stored) => {
                stored.customer_name = order.customer_name.clone();
                stored.lines = order.lines.clone();
                stored.total_price = order.total_price;
                stored.status = order.status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&self, user_id: &str, order_id: OrderId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.orders.len();
        state
            .orders
            .retain(|o| !(o.id == order_id && o.user_id == user_id));
        Ok(state.orders.len() < before)
    }

    async fn list_entries(&self, user_id: &str, kind: LedgerKind) -> Result<Vec<LedgerEntry>> {
        let mut state = self.state.lock().await;
        Ok(state
            .ledger_mut(kind)
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_mutations(&self, user_id: &str, mutations: &[LedgerMutation]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut applied = 0;

        for mutation in mutations {
            match mutation {
                LedgerMutation::Create { target, entry } => {
                    let id = state.allocate_id();
                    let mut stored = entry.clone().into_entry(id);
                    stored.user_id = user_id.to_string();
                    state.ledger_mut(*target).push(stored);
                    applied += 1;
                }
                LedgerMutation::Update { target, entry } => {
                    match state
                        .ledger_mut(*target)
                        .iter_mut()
                        .find(|e| e.id == entry.id && e.user_id == user_id)
                    {
                        Some(stored) => {
                            stored.ingredient = entry.ingredient.clone();
                            stored.unit = entry.unit;
                            stored.quantity = entry.quantity;
                            applied += 1;
                        }
                        None => warn!(entry_id = entry.id, ledger = %target, "Update skipped, entry no longer exists"),
                    }
                }
                LedgerMutation::Delete { target, entry } => {
                    let ledger = state.ledger_mut(*target);
                    let before = ledger.len();
                    ledger.retain(|e| !(e.id == entry.id && e.user_id == user_id));
                    if ledger.len() < before {
                        applied += 1;
                    } else {
                        warn!(entry_id = entry.id, ledger = %target, "Delete skipped, entry no longer exists");
                    }
                }
            }
        }

        debug!(user_id = %user_id, applied, total = mutations.len(), "Applied ledger mutations");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewLedgerEntry;
    use crate::recipe_model::Unit;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_entries_are_scoped_by_user() -> Result<()> {
        let store = MemoryStore::new();
        store.seed_entry(LedgerKind::Inventory, "u1", "Flour", Unit::Grams, 100.0).await;
        store.seed_entry(LedgerKind::Inventory, "u2", "Flour", Unit::Grams, 900.0).await;

        let entries = store.list_entries("u1", LedgerKind::Inventory).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, 100.0);
        assert!(store.list_entries("u1", LedgerKind::ShoppingList).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_mutations_counts_rows() -> Result<()> {
        let store = MemoryStore::new();
        let id = store.seed_entry(LedgerKind::ShoppingList, "u1", "Eggs", Unit::Count, 6.0).await;
        let eggs = store.list_entries("u1", LedgerKind::ShoppingList).await?.remove(0);

        let applied = store
            .apply_mutations(
                "u1",
                &[
                    LedgerMutation::Update {
                        target: LedgerKind::ShoppingList,
                        entry: eggs.with_quantity(12.0),
                    },
                    LedgerMutation::Create {
                        target: LedgerKind::ShoppingList,
                        entry: NewLedgerEntry::new("u1", "Milk", Unit::Milliliters, 250.0),
                    },
                    LedgerMutation::Delete {
                        target: LedgerKind::Inventory,
                        entry: eggs.clone(),
                    },
                ],
            )
            .await?;

        assert_eq!(applied, 2);
        let snapshot = store.snapshot("u1").await?;
        assert_eq!(snapshot.shopping_list.len(), 2);
        assert_eq!(snapshot.shopping_list[0].id, id);
        assert_eq!(snapshot.shopping_list[0].quantity, 12.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_and_order_crud() -> Result<()> {
        let store = MemoryStore::new();
        let recipe_id = store
            .create_recipe("u1", &Recipe::new(0, "Scones", Decimal::new(350, 2)))
            .await?;

        assert!(store.get_recipe("u1", recipe_id).await?.is_some());
        assert!(store.get_recipe("u2", recipe_id).await?.is_none());
        assert_eq!(store.catalog("u1").await?.len(), 1);

        let catalog = store.catalog("u1").await?;
        let order = Order::new(0, "Ada", vec![crate::order_model::OrderLine::new(recipe_id, 2)], &catalog);
        let order_id = store.create_order("u1", &order).await?;

        let mut stored = store.get_order("u1", order_id).await?.expect("order stored");
        assert_eq!(stored.total_price, Decimal::new(700, 2));
        stored.mark_completed()?;
        assert!(store.update_order("u1", &stored).await?);
        assert!(store.get_order("u1", order_id).await?.unwrap().is_completed());

        assert!(store.delete_order("u1", order_id).await?);
        assert!(!store.delete_order("u1", order_id).await?);
        assert!(store.delete_recipe("u1", recipe_id).await?);

        Ok(())
    }
}
