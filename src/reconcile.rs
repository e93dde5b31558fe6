//! # Order Reconciliation Engine
//!
//! Decides how placing, editing, completing and deleting an order moves
//! quantities on the shopping list and inventory ledgers.
//!
//! The engine is pure: it takes the order, a recipe catalog snapshot and a
//! ledger snapshot, and returns the ledger mutations the caller should execute.
//! It never reads or writes a store itself.
//!
//! ## Algorithm
//!
//! 1. Resolve every order line's recipe; unresolved lines contribute nothing
//! 2. Scale each ingredient amount by the line quantity
//! 3. Group by lower-cased ingredient name and unit, summing the amounts
//! 4. Stage the grouped deltas against a working copy of the target ledger
//! 5. Diff the working copy against the snapshot to produce create, update
//!    and delete mutations
//!
//! | Trigger   | Ledger        | Direction | Missing entry          |
//! |-----------|---------------|-----------|------------------------|
//! | Created   | shopping list | add       | create one             |
//! | Completed | inventory     | subtract  | counts as 0 available  |
//! | Completed | shopping list | subtract  | skipped with a warning |
//! | Deleted   | shopping list | subtract  | skipped with a warning |
//! | Edited    | shopping list | retract previous, then add current |
//!
//! A subtraction that leaves a quantity at or below zero deletes the entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::ledger::{
    EntryId, IngredientKey, LedgerEntry, LedgerKind, LedgerMutation, LedgerSnapshot,
    NewLedgerEntry,
};
use crate::order_model::{Order, OrderLine};
use crate::recipe_model::{RecipeCatalog, RecipeId, Unit};

/// Quantities at or below this are treated as zero
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// What happened to the order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger<'a> {
    /// A new ongoing order was saved
    Created,
    /// An ongoing order is being marked completed
    Completed,
    /// An ongoing order is being deleted
    Deleted,
    /// An ongoing order's lines were replaced; `previous` is the stored version
    Edited { previous: &'a Order },
}

/// Summed ingredient quantity across all lines of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedIngredientDelta {
    /// Name as first seen in the order's recipes
    pub ingredient: String,
    pub unit: Unit,
    pub quantity: f64,
}

/// Result of aggregating an order's lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// One delta per ingredient group, in first-seen order
    pub deltas: Vec<AggregatedIngredientDelta>,
    /// Recipe references that did not resolve in the catalog
    pub missing_recipes: Vec<RecipeId>,
}

/// One ingredient that blocks order completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub ingredient: String,
    pub needed: f64,
    pub available: f64,
    pub unit: Unit,
}

/// Every ingredient whose inventory is below what the order needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortfallReport {
    pub items: Vec<Shortfall>,
}

/// Non-fatal conditions met while reconciling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileWarning {
    /// An order line references a recipe that is not in the catalog
    MissingRecipe { recipe_id: RecipeId },
    /// A subtraction found no ledger entry to subtract from
    MissingLedgerEntry {
        target: LedgerKind,
        ingredient: String,
        unit: Unit,
    },
}

/// Mutations to execute, or the reason completion was refused
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub mutations: Vec<LedgerMutation>,
    pub shortfall: Option<ShortfallReport>,
    pub warnings: Vec<ReconcileWarning>,
}

impl AggregatedIngredientDelta {
    pub fn key(&self) -> IngredientKey {
        IngredientKey::new(&self.ingredient, self.unit)
    }
}

impl ShortfallReport {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for ShortfallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{}: need {} {}, only have {} {}",
                item.ingredient, item.needed, item.unit, item.available, item.unit
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileWarning::MissingRecipe { recipe_id } => {
                write!(f, "recipe {recipe_id} not found, line skipped")
            }
            ReconcileWarning::MissingLedgerEntry {
                target,
                ingredient,
                unit,
            } => write!(f, "{ingredient} ({unit}) not found on the {target}"),
        }
    }
}

impl ReconcileOutcome {
    /// True when the completion pre-check refused the order
    pub fn is_blocked(&self) -> bool {
        self.shortfall.is_some()
    }

    pub fn mutations_for(&self, target: LedgerKind) -> Vec<LedgerMutation> {
        self.mutations
            .iter()
            .filter(|m| m.target() == target)
            .cloned()
            .collect()
    }
}

/// Sum the ingredient needs of a set of order lines
///
/// Groups are keyed by lower-cased name and unit. Groups whose total is not
/// positive are dropped so they never produce a mutation.
pub fn aggregate_order(lines: &[OrderLine], catalog: &RecipeCatalog) -> Aggregation {
    let mut aggregation = Aggregation::default();
    let mut index: HashMap<IngredientKey, usize> = HashMap::new();

    for line in lines {
        let Some(recipe) = catalog.get_recipe(line.recipe_id) else {
            warn!(recipe_id = line.recipe_id, "Recipe not found, skipping order line");
            aggregation.missing_recipes.push(line.recipe_id);
            continue;
        };

        let multiplier = f64::from(line.quantity);
        for ingredient in &recipe.ingredients {
            let amount = ingredient.amount * multiplier;
            let key = IngredientKey::new(&ingredient.name, ingredient.unit);

            match index.get(&key) {
                Some(&position) => aggregation.deltas[position].quantity += amount,
                None => {
                    index.insert(key, aggregation.deltas.len());
                    aggregation.deltas.push(AggregatedIngredientDelta {
                        ingredient: ingredient.name.clone(),
                        unit: ingredient.unit,
                        quantity: amount,
                    });
                }
            }
        }
    }

    aggregation
        .deltas
        .retain(|delta| delta.quantity.is_finite() && delta.quantity > QUANTITY_EPSILON);
    aggregation
}

/// Compare what the order needs with the inventory on hand
///
/// A missing inventory entry counts as zero available.
pub fn check_inventory(
    deltas: &[AggregatedIngredientDelta],
    snapshot: &LedgerSnapshot,
) -> Option<ShortfallReport> {
    let items: Vec<Shortfall> = deltas
        .iter()
        .filter_map(|delta| {
            let available = snapshot
                .find(LedgerKind::Inventory, &delta.key())
                .map_or(0.0, |entry| entry.quantity);

            (delta.quantity - available > QUANTITY_EPSILON).then(|| Shortfall {
                ingredient: delta.ingredient.clone(),
                needed: delta.quantity,
                available,
                unit: delta.unit,
            })
        })
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(ShortfallReport { items })
    }
}

/// Compute the ledger mutations for one order event
pub fn reconcile(
    order: &Order,
    catalog: &RecipeCatalog,
    snapshot: &LedgerSnapshot,
    trigger: Trigger<'_>,
) -> ReconcileOutcome {
    let aggregation = aggregate_order(&order.lines, catalog);
    let mut warnings: Vec<ReconcileWarning> = aggregation
        .missing_recipes
        .iter()
        .map(|&recipe_id| ReconcileWarning::MissingRecipe { recipe_id })
        .collect();

    debug!(
        order_id = order.id,
        groups = aggregation.deltas.len(),
        ?trigger,
        "Aggregated order ingredients"
    );

    let mut shopping = WorkingLedger::new(
        LedgerKind::ShoppingList,
        &order.user_id,
        &snapshot.shopping_list,
    );

    let mutations = match trigger {
        Trigger::Created => {
            for delta in &aggregation.deltas {
                shopping.add(delta);
            }
            shopping.finish()
        }
        Trigger::Deleted => {
            shopping.subtract_all(&aggregation.deltas, &mut warnings);
            shopping.finish()
        }
        Trigger::Edited { previous } => {
            let retracted = aggregate_order(&previous.lines, catalog);
            for &recipe_id in &retracted.missing_recipes {
                let warning = ReconcileWarning::MissingRecipe { recipe_id };
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
            shopping.subtract_all(&retracted.deltas, &mut warnings);
            for delta in &aggregation.deltas {
                shopping.add(delta);
            }
            shopping.finish()
        }
        Trigger::Completed => {
            if let Some(report) = check_inventory(&aggregation.deltas, snapshot) {
                info!(
                    order_id = order.id,
                    short = report.items.len(),
                    "Order cannot be completed, inventory is insufficient"
                );
                return ReconcileOutcome {
                    mutations: Vec::new(),
                    shortfall: Some(report),
                    warnings,
                };
            }

            let mut inventory =
                WorkingLedger::new(LedgerKind::Inventory, &order.user_id, &snapshot.inventory);
            inventory.subtract_all(&aggregation.deltas, &mut warnings);
            shopping.subtract_all(&aggregation.deltas, &mut warnings);

            let mut mutations = inventory.finish();
            mutations.extend(shopping.finish());
            mutations
        }
    };

    info!(
        order_id = order.id,
        mutations = mutations.len(),
        warnings = warnings.len(),
        "Reconciled order"
    );

    ReconcileOutcome {
        mutations,
        shortfall: None,
        warnings,
    }
}

/// Staged copy of one ledger
///
/// Quantities are changed in place and the result is diffed against the
/// original entries once all deltas are applied, so one entry yields at most
/// one mutation however many deltas touched it.
pub(crate) struct WorkingLedger<'a> {
    target: LedgerKind,
    user_id: &'a str,
    rows: Vec<WorkingRow<'a>>,
}

struct WorkingRow<'a> {
    original: Option<&'a LedgerEntry>,
    ingredient: String,
    unit: Unit,
    key: IngredientKey,
    quantity: f64,
    removed: bool,
}

impl<'a> WorkingLedger<'a> {
    pub(crate) fn new(target: LedgerKind, user_id: &'a str, entries: &'a [LedgerEntry]) -> Self {
        let rows = entries
            .iter()
            .map(|entry| WorkingRow {
                original: Some(entry),
                ingredient: entry.ingredient.clone(),
                unit: entry.unit,
                key: entry.key(),
                quantity: entry.quantity,
                removed: false,
            })
            .collect();

        Self {
            target,
            user_id,
            rows,
        }
    }

    fn find_mut(&mut self, key: &IngredientKey) -> Option<&mut WorkingRow<'a>> {
        self.rows
            .iter_mut()
            .find(|row| !row.removed && row.key == *key)
    }

    /// Add to the matching entry, creating one when none exists
    ///
    /// An entry deleted earlier in the same run is revived with the added
    /// amount instead of being deleted and created again.
    pub(crate) fn add_quantity(&mut self, ingredient: &str, unit: Unit, amount: f64) {
        let key = IngredientKey::new(ingredient, unit);
        if let Some(row) = self.find_mut(&key) {
            row.quantity += amount;
            return;
        }

        let revived = self.rows.iter_mut().find(|row| row.removed && row.key == key);
        match revived {
            Some(row) => {
                row.removed = false;
                row.quantity = amount;
            }
            None => self.rows.push(WorkingRow {
                original: None,
                ingredient: ingredient.to_string(),
                unit,
                key,
                quantity: amount,
                removed: false,
            }),
        }
    }

    fn add(&mut self, delta: &AggregatedIngredientDelta) {
        self.add_quantity(&delta.ingredient, delta.unit, delta.quantity);
    }

    /// Subtract from the matching entry; returns false when there is none
    fn subtract(&mut self, delta: &AggregatedIngredientDelta) -> bool {
        match self.find_mut(&delta.key()) {
            Some(row) => {
                row.quantity -= delta.quantity;
                if row.quantity <= QUANTITY_EPSILON {
                    row.removed = true;
                }
                true
            }
            None => false,
        }
    }

    fn subtract_all(
        &mut self,
        deltas: &[AggregatedIngredientDelta],
        warnings: &mut Vec<ReconcileWarning>,
    ) {
        for delta in deltas {
            if !self.subtract(delta) {
                warn!(
                    ledger = %self.target,
                    ingredient = %delta.ingredient,
                    unit = %delta.unit,
                    "Ledger entry not found, skipping deduction"
                );
                warnings.push(ReconcileWarning::MissingLedgerEntry {
                    target: self.target,
                    ingredient: delta.ingredient.clone(),
                    unit: delta.unit,
                });
            }
        }
    }

    /// Diff the staged rows against the original entries
    pub(crate) fn finish(self) -> Vec<LedgerMutation> {
        let target = self.target;
        let mut mutations = Vec::new();

        for row in self.rows {
            match (row.original, row.removed) {
                (Some(original), true) => mutations.push(LedgerMutation::Delete {
                    target,
                    entry: original.clone(),
                }),
                (Some(original), false) => {
                    if (row.quantity - original.quantity).abs() > QUANTITY_EPSILON {
                        mutations.push(LedgerMutation::Update {
                            target,
                            entry: original.with_quantity(row.quantity),
                        });
                    }
                }
                (None, false) if row.quantity > QUANTITY_EPSILON => {
                    mutations.push(LedgerMutation::Create {
                        target,
                        entry: NewLedgerEntry::new(
                            self.user_id,
                            &row.ingredient,
                            row.unit,
                            row.quantity,
                        ),
                    });
                }
                (None, _) => {}
            }
        }

        mutations
    }
}

/// Identifiers of the entries a mutation list touches, for logging
pub fn touched_entries(mutations: &[LedgerMutation]) -> Vec<EntryId> {
    mutations
        .iter()
        .filter_map(|mutation| match mutation {
            LedgerMutation::Update { entry, .. } | LedgerMutation::Delete { entry, .. } => {
                Some(entry.id)
            }
            LedgerMutation::Create { .. } => None,
        })
        .collect()
}
