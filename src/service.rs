//! # Kitchen Service
//!
//! Drives the order lifecycle for the signed-in user: reads the catalog and
//! ledger snapshots from the store, asks the reconciliation engine what to
//! change, then writes the order and executes the returned mutations.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{KitchenError, KitchenResult};
use crate::ledger::{EntryId, LedgerEntry, LedgerKind, LedgerSnapshot};
use crate::order_model::{Order, OrderError, OrderId, OrderLine, OrderStatus};
use crate::reconcile::{reconcile, touched_entries, ReconcileOutcome, ReconcileWarning, Trigger};
use crate::recipe_model::{validate_recipe_name, Recipe, RecipeId, Unit};
use crate::session::{SessionProvider, UserId};
use crate::shopping::{self, ShoppingStatus};
use crate::store::KitchenStore;

/// Result of an order operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderChange {
    /// The order as stored after the operation
    pub order: Order,
    /// Ledger rows written
    pub mutations_applied: usize,
    /// Non-fatal problems met while reconciling
    pub warnings: Vec<ReconcileWarning>,
}

pub struct KitchenService<S, P> {
    store: S,
    session: P,
}

impl<S: KitchenStore, P: SessionProvider> KitchenService<S, P> {
    pub fn new(store: S, session: P) -> Self {
        Self { store, session }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &P {
        &self.session
    }

    fn user(&self) -> KitchenResult<UserId> {
        self.session.current_user().ok_or(KitchenError::NotSignedIn)
    }

    async fn load_order(&self, user_id: &str, order_id: OrderId) -> KitchenResult<Order> {
        self.store
            .get_order(user_id, order_id)
            .await?
            .ok_or(KitchenError::OrderNotFound(order_id))
    }

    /// Execute the outcome's mutations and report its warnings
    async fn apply_outcome(&self, user_id: &str, outcome: &ReconcileOutcome) -> KitchenResult<usize> {
        for warning in &outcome.warnings {
            warn!(user_id = %user_id, %warning, "Reconciliation warning");
        }
        debug!(
            user_id = %user_id,
            touched = ?touched_entries(&outcome.mutations),
            "Applying ledger mutations"
        );
        Ok(self.store.apply_mutations(user_id, &outcome.mutations).await?)
    }

    // Orders

    /// Store a new ongoing order and add its needs to the shopping list
    pub async fn place_order(&self, customer_name: &str, lines: Vec<OrderLine>) -> KitchenResult<OrderChange> {
        let user_id = self.user()?;
        Order::validate_lines(&lines)?;

        let catalog = self.store.catalog(&user_id).await?;
        let mut order = Order::new(0, customer_name, lines, &catalog).with_user(&user_id);
        order.id = self.store.create_order(&user_id, &order).await?;

        let snapshot = self.store.snapshot(&user_id).await?;
        let outcome = reconcile(&order, &catalog, &snapshot, Trigger::Created);
        let mutations_applied = self.apply_outcome(&user_id, &outcome).await?;

        info!(
            user_id = %user_id,
            order_id = order.id,
            total = %order.total_price,
            mutations_applied,
            "Order placed"
        );

        Ok(OrderChange {
            order,
            mutations_applied,
            warnings: outcome.warnings,
        })
    }

    /// Replace the customer and lines of an ongoing order
    ///
    /// The stored order's contribution is retracted from the shopping list and
    /// the new lines are added in the same pass.
    pub async fn edit_order(
        &self,
        order_id: OrderId,
        customer_name: &str,
        lines: Vec<OrderLine>,
    ) -> KitchenResult<OrderChange> {
        let user_id = self.user()?;
        let previous = self.load_order(&user_id, order_id).await?;
        if previous.is_completed() {
            return Err(OrderError::AlreadyCompleted(order_id).into());
        }
        Order::validate_lines(&lines)?;

        let catalog = self.store.catalog(&user_id).await?;
        let order = Order {
            customer_name: customer_name.trim().to_string(),
            total_price: Order::compute_total(&lines, &catalog),
            lines,
            ..previous.clone()
        };

        let snapshot = self.store.snapshot(&user_id).await?;
        let outcome = reconcile(
            &order,
            &catalog,
            &snapshot,
            Trigger::Edited {
                previous: &previous,
            },
        );

        if !self.store.update_order(&user_id, &order).await? {
            return Err(KitchenError::OrderNotFound(order_id));
        }
        let mutations_applied = self.apply_outcome(&user_id, &outcome).await?;

        info!(user_id = %user_id, order_id, mutations_applied, "Order edited");

        Ok(OrderChange {
            order,
            mutations_applied,
            warnings: outcome.warnings,
        })
    }

    /// Consume the order's ingredients from the inventory and close it
    ///
    /// Refused with [`KitchenError::InsufficientInventory`] when any
    /// ingredient is short; in that case nothing is written.
    pub async fn complete_order(&self, order_id: OrderId) -> KitchenResult<OrderChange> {
        let user_id = self.user()?;
        let mut order = self.load_order(&user_id, order_id).await?;
        if order.is_completed() {
            return Err(OrderError::AlreadyCompleted(order_id).into());
        }

        let catalog = self.store.catalog(&user_id).await?;
        let snapshot = self.store.snapshot(&user_id).await?;
        let outcome = reconcile(&order, &catalog, &snapshot, Trigger::Completed);

        if let Some(report) = &outcome.shortfall {
            info!(user_id = %user_id, order_id, missing = report.items.len(), "Order completion refused");
            return Err(KitchenError::InsufficientInventory(report.clone()));
        }

        let mutations_applied = self.apply_outcome(&user_id, &outcome).await?;
        order.mark_completed()?;
        self.store.update_order(&user_id, &order).await?;

        info!(user_id = %user_id, order_id, mutations_applied, "Order completed");

        Ok(OrderChange {
            order,
            mutations_applied,
            warnings: outcome.warnings,
        })
    }

    /// Remove an order, retracting its shopping-list needs while it is ongoing
    pub async fn delete_order(&self, order_id: OrderId) -> KitchenResult<OrderChange> {
        let user_id = self.user()?;
        let order = self.load_order(&user_id, order_id).await?;

        let (mutations_applied, warnings) = if order.is_completed() {
            (0, Vec::new())
        } else {
            let catalog = self.store.catalog(&user_id).await?;
            let snapshot = self.store.snapshot(&user_id).await?;
            let outcome = reconcile(&order, &catalog, &snapshot, Trigger::Deleted);
            (self.apply_outcome(&user_id, &outcome).await?, outcome.warnings)
        };

        self.store.delete_order(&user_id, order_id).await?;
        info!(user_id = %user_id, order_id, mutations_applied, "Order deleted");

        Ok(OrderChange {
            order,
            mutations_applied,
            warnings,
        })
    }

    pub async fn get_order(&self, order_id: OrderId) -> KitchenResult<Order> {
        let user_id = self.user()?;
        self.load_order(&user_id, order_id).await
    }

    async fn orders_with_status(&self, status: OrderStatus) -> KitchenResult<Vec<Order>> {
        let user_id = self.user()?;
        let orders = self.store.list_orders(&user_id).await?;
        Ok(orders.into_iter().filter(|o| o.status == status).collect())
    }

    pub async fn ongoing_orders(&self) -> KitchenResult<Vec<Order>> {
        self.orders_with_status(OrderStatus::Ongoing).await
    }

    pub async fn completed_orders(&self) -> KitchenResult<Vec<Order>> {
        self.orders_with_status(OrderStatus::Completed).await
    }

    // Ledgers

    pub async fn snapshot(&self) -> KitchenResult<LedgerSnapshot> {
        let user_id = self.user()?;
        Ok(self.store.snapshot(&user_id).await?)
    }

    pub async fn shopping_list(&self) -> KitchenResult<Vec<LedgerEntry>> {
        let user_id = self.user()?;
        Ok(self.store.list_entries(&user_id, LedgerKind::ShoppingList).await?)
    }

    pub async fn inventory(&self) -> KitchenResult<Vec<LedgerEntry>> {
        let user_id = self.user()?;
        Ok(self.store.list_entries(&user_id, LedgerKind::Inventory).await?)
    }

    pub async fn shopping_status(&self) -> KitchenResult<Vec<ShoppingStatus>> {
        let snapshot = self.snapshot().await?;
        Ok(shopping::shopping_status(&snapshot))
    }

    /// Record a purchase into the inventory; returns the rows written
    pub async fn restock(&self, ingredient: &str, amount: f64, unit: Unit) -> KitchenResult<usize> {
        let user_id = self.user()?;
        let snapshot = self.store.snapshot(&user_id).await?;
        let mutations = shopping::restock(&user_id, ingredient, unit, amount, &snapshot);
        Ok(self.store.apply_mutations(&user_id, &mutations).await?)
    }

    /// Overwrite the count of one inventory entry
    pub async fn adjust_inventory(&self, entry_id: EntryId, new_count: f64) -> KitchenResult<()> {
        let user_id = self.user()?;
        let inventory = self.store.list_entries(&user_id, LedgerKind::Inventory).await?;
        let entry = inventory
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or(KitchenError::EntryNotFound(entry_id))?;

        let mutation = shopping::adjust_inventory(entry, new_count);
        info!(user_id = %user_id, %mutation, "Adjusting inventory");
        self.store.apply_mutations(&user_id, &[mutation]).await?;
        Ok(())
    }

    // Recipes

    pub async fn list_recipes(&self) -> KitchenResult<Vec<Recipe>> {
        let user_id = self.user()?;
        Ok(self.store.list_recipes(&user_id).await?)
    }

    pub async fn get_recipe(&self, recipe_id: RecipeId) -> KitchenResult<Recipe> {
        let user_id = self.user()?;
        self.store
            .get_recipe(&user_id, recipe_id)
            .await?
            .ok_or(KitchenError::RecipeNotFound(recipe_id))
    }

    pub async fn create_recipe(&self, recipe: Recipe) -> KitchenResult<Recipe> {
        let user_id = self.user()?;
        let mut recipe = normalize_recipe(recipe, &user_id)?;
        recipe.id = self.store.create_recipe(&user_id, &recipe).await?;
        Ok(recipe)
    }

    pub async fn update_recipe(&self, recipe: Recipe) -> KitchenResult<Recipe> {
        let user_id = self.user()?;
        let recipe = normalize_recipe(recipe, &user_id)?;
        if !self.store.update_recipe(&user_id, &recipe).await? {
            return Err(KitchenError::RecipeNotFound(recipe.id));
        }
        Ok(recipe)
    }

    /// Orders that still reference the recipe keep their lines; those lines
    /// are skipped with a warning on later reconciliations.
    pub async fn delete_recipe(&self, recipe_id: RecipeId) -> KitchenResult<()> {
        let user_id = self.user()?;
        if !self.store.delete_recipe(&user_id, recipe_id).await? {
            return Err(KitchenError::RecipeNotFound(recipe_id));
        }
        Ok(())
    }
}

fn normalize_recipe(mut recipe: Recipe, user_id: &str) -> KitchenResult<Recipe> {
    recipe.validate()?;
    recipe.name = validate_recipe_name(&recipe.name)?;
    for ingredient in &mut recipe.ingredients {
        ingredient.name = ingredient.name.trim().to_string();
    }
    recipe.user_id = user_id.to_string();
    Ok(recipe)
}
