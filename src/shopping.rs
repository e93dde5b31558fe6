//! # Shopping and Stock Keeping
//!
//! Helpers for the shopping-list and inventory screens: how much of each
//! shopping-list item still has to be bought, recording a purchase into the
//! inventory, and manual inventory corrections.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ledger::{LedgerEntry, LedgerKind, LedgerMutation, LedgerSnapshot};
use crate::reconcile::{WorkingLedger, QUANTITY_EPSILON};
use crate::recipe_model::Unit;

/// Shopping-list entry annotated with what the inventory already covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingStatus {
    pub entry: LedgerEntry,
    /// Sum of every matching inventory entry
    pub in_inventory: f64,
    /// `needed - in_inventory`; zero or negative when covered
    pub needed_more: f64,
    pub is_sufficient: bool,
}

/// Annotate every shopping-list entry with the matching inventory total
pub fn shopping_status(snapshot: &LedgerSnapshot) -> Vec<ShoppingStatus> {
    snapshot
        .shopping_list
        .iter()
        .map(|entry| {
            let in_inventory = snapshot.total_quantity(LedgerKind::Inventory, &entry.key());
            let needed_more = entry.quantity - in_inventory;
            ShoppingStatus {
                entry: entry.clone(),
                in_inventory,
                needed_more,
                is_sufficient: needed_more <= QUANTITY_EPSILON,
            }
        })
        .collect()
}

/// Record a purchase: add `amount` to the matching inventory entry or create one
///
/// The shopping list is left alone; its entries drop as orders are completed.
/// Non-positive amounts produce no mutation.
pub fn restock(
    user_id: &str,
    ingredient: &str,
    unit: Unit,
    amount: f64,
    snapshot: &LedgerSnapshot,
) -> Vec<LedgerMutation> {
    let ingredient = ingredient.trim();
    if ingredient.is_empty() || !amount.is_finite() || amount <= QUANTITY_EPSILON {
        debug!(%ingredient, amount, "Ignoring empty restock");
        return Vec::new();
    }

    let mut inventory = WorkingLedger::new(LedgerKind::Inventory, user_id, &snapshot.inventory);
    inventory.add_quantity(ingredient, unit, amount);
    let mutations = inventory.finish();

    info!(user_id = %user_id, %ingredient, %unit, amount, "Restocked inventory");
    mutations
}

/// Set an inventory entry's count by hand; a count at or below zero deletes it
pub fn adjust_inventory(entry: &LedgerEntry, new_count: f64) -> LedgerMutation {
    if !new_count.is_finite() || new_count <= QUANTITY_EPSILON {
        LedgerMutation::Delete {
            target: LedgerKind::Inventory,
            entry: entry.clone(),
        }
    } else {
        LedgerMutation::Update {
            target: LedgerKind::Inventory,
            entry: entry.with_quantity(new_count),
        }
    }
}
