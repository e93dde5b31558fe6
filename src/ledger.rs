//! # Ledgers
//!
//! The kitchen keeps two quantity ledgers per user: the shopping list (what
//! open orders still need, the `needed` quantity) and the inventory (what is on
//! the shelf, the `count` quantity). Both share one entry shape.
//!
//! Entries are identified by ingredient name and unit. Names are matched
//! case-insensitively but stored exactly as first entered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::recipe_model::Unit;

/// Store-assigned ledger entry identifier
pub type EntryId = i64;

/// Which ledger an entry or mutation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    ShoppingList,
    Inventory,
}

/// Matching identity of a ledger entry: lower-cased name plus unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngredientKey {
    name: String,
    unit: Unit,
}

/// A persisted ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: String,
    /// Ingredient name, case preserved
    pub ingredient: String,
    pub unit: Unit,
    /// `needed` on the shopping list, `count` in the inventory
    pub quantity: f64,
}

/// A ledger entry that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub ingredient: String,
    pub unit: Unit,
    pub quantity: f64,
}

/// A single write against one ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerMutation {
    Create {
        target: LedgerKind,
        entry: NewLedgerEntry,
    },
    Update {
        target: LedgerKind,
        entry: LedgerEntry,
    },
    Delete {
        target: LedgerKind,
        entry: LedgerEntry,
    },
}

/// Both ledgers of one user as read at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub shopping_list: Vec<LedgerEntry>,
    pub inventory: Vec<LedgerEntry>,
}

impl LedgerKind {
    /// Storage table backing the ledger
    pub fn table_name(&self) -> &'static str {
        match self {
            LedgerKind::ShoppingList => "shopping_list",
            LedgerKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKind::ShoppingList => f.write_str("shopping list"),
            LedgerKind::Inventory => f.write_str("inventory"),
        }
    }
}

impl IngredientKey {
    pub fn new(name: &str, unit: Unit) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            unit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

impl LedgerEntry {
    pub fn key(&self) -> IngredientKey {
        IngredientKey::new(&self.ingredient, self.unit)
    }

    pub fn with_quantity(&self, quantity: f64) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

impl NewLedgerEntry {
    pub fn new(user_id: &str, ingredient: &str, unit: Unit, quantity: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            ingredient: ingredient.to_string(),
            unit,
            quantity,
        }
    }

    pub fn key(&self) -> IngredientKey {
        IngredientKey::new(&self.ingredient, self.unit)
    }

    /// Attach the identifier the store assigned
    pub fn into_entry(self, id: EntryId) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            ingredient: self.ingredient,
            unit: self.unit,
            quantity: self.quantity,
        }
    }
}

impl LedgerMutation {
    pub fn target(&self) -> LedgerKind {
        match self {
            LedgerMutation::Create { target, .. }
            | LedgerMutation::Update { target, .. }
            | LedgerMutation::Delete { target, .. } => *target,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            LedgerMutation::Create { .. } => "create",
            LedgerMutation::Update { .. } => "update",
            LedgerMutation::Delete { .. } => "delete",
        }
    }

    pub fn ingredient(&self) -> &str {
        match self {
            LedgerMutation::Create { entry, .. } => &entry.ingredient,
            LedgerMutation::Update { entry, .. } | LedgerMutation::Delete { entry, .. } => {
                &entry.ingredient
            }
        }
    }
}

impl fmt::Display for LedgerMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerMutation::Create { target, entry } => write!(
                f,
                "{target}: create {} {} {}",
                entry.ingredient, entry.quantity, entry.unit
            ),
            LedgerMutation::Update { target, entry } => write!(
                f,
                "{target}: set #{} {} to {} {}",
                entry.id, entry.ingredient, entry.quantity, entry.unit
            ),
            LedgerMutation::Delete { target, entry } => {
                write!(f, "{target}: delete #{} {}", entry.id, entry.ingredient)
            }
        }
    }
}

impl LedgerSnapshot {
    pub fn new(shopping_list: Vec<LedgerEntry>, inventory: Vec<LedgerEntry>) -> Self {
        Self {
            shopping_list,
            inventory,
        }
    }

    pub fn entries(&self, kind: LedgerKind) -> &[LedgerEntry] {
        match kind {
            LedgerKind::ShoppingList => &self.shopping_list,
            LedgerKind::Inventory => &self.inventory,
        }
    }

    pub fn entries_mut(&mut self, kind: LedgerKind) -> &mut Vec<LedgerEntry> {
        match kind {
            LedgerKind::ShoppingList => &mut self.shopping_list,
            LedgerKind::Inventory => &mut self.inventory,
        }
    }

    /// First entry of `kind` whose name and unit match the key
    pub fn find(&self, kind: LedgerKind, key: &IngredientKey) -> Option<&LedgerEntry> {
        self.entries(kind).iter().find(|entry| entry.key() == *key)
    }

    /// Sum of quantities over every entry of `kind` matching the key
    pub fn total_quantity(&self, kind: LedgerKind, key: &IngredientKey) -> f64 {
        self.entries(kind)
            .iter()
            .filter(|entry| entry.key() == *key)
            .map(|entry| entry.quantity)
            .sum()
    }

    /// Apply mutations in order, assigning ids to created entries via `next_id`
    ///
    /// Updates and deletes of unknown ids are ignored, like a remote store
    /// would ignore a write to a document that no longer exists.
    pub fn apply<F>(&mut self, mutations: &[LedgerMutation], mut next_id: F)
    where
        F: FnMut() -> EntryId,
    {
        for mutation in mutations {
            let entries = self.entries_mut(mutation.target());
            match mutation {
                LedgerMutation::Create { entry, .. } => {
                    entries.push(entry.clone().into_entry(next_id()));
                }
                LedgerMutation::Update { entry, .. } => {
                    if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
                        *existing = entry.clone();
                    }
                }
                LedgerMutation::Delete { entry, .. } => {
                    entries.retain(|e| e.id != entry.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: EntryId, name: &str, unit: Unit, quantity: f64) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: "u1".to_string(),
            ingredient: name.to_string(),
            unit,
            quantity,
        }
    }

    #[test]
    fn test_key_ignores_name_case() {
        assert_eq!(
            IngredientKey::new("Flour", Unit::Grams),
            IngredientKey::new("flour ", Unit::Grams)
        );
        assert_ne!(
            IngredientKey::new("Flour", Unit::Grams),
            IngredientKey::new("Flour", Unit::Count)
        );
    }

    #[test]
    fn test_find_and_total() {
        let snapshot = LedgerSnapshot::new(
            vec![entry(1, "Flour", Unit::Grams, 100.0)],
            vec![
                entry(2, "flour", Unit::Grams, 30.0),
                entry(3, "FLOUR", Unit::Grams, 20.0),
                entry(4, "Flour", Unit::Count, 1.0),
            ],
        );
        let key = IngredientKey::new("flour", Unit::Grams);

        assert_eq!(snapshot.find(LedgerKind::ShoppingList, &key).map(|e| e.id), Some(1));
        assert_eq!(snapshot.find(LedgerKind::Inventory, &key).map(|e| e.id), Some(2));
        assert_eq!(snapshot.total_quantity(LedgerKind::Inventory, &key), 50.0);
        assert!(snapshot
            .find(LedgerKind::Inventory, &IngredientKey::new("sugar", Unit::Grams))
            .is_none());
    }

    #[test]
    fn test_apply_mutations() {
        let mut snapshot = LedgerSnapshot::new(
            vec![
                entry(1, "Flour", Unit::Grams, 100.0),
                entry(2, "Eggs", Unit::Count, 6.0),
            ],
            Vec::new(),
        );
        let mut ids = 10..;
        snapshot.apply(
            &[
                LedgerMutation::Update {
                    target: LedgerKind::ShoppingList,
                    entry: entry(1, "Flour", Unit::Grams, 250.0),
                },
                LedgerMutation::Delete {
                    target: LedgerKind::ShoppingList,
                    entry: entry(2, "Eggs", Unit::Count, 6.0),
                },
                LedgerMutation::Create {
                    target: LedgerKind::Inventory,
                    entry: NewLedgerEntry::new("u1", "Milk", Unit::Milliliters, 500.0),
                },
            ],
            || ids.next().unwrap_or_default(),
        );

        assert_eq!(snapshot.shopping_list, vec![entry(1, "Flour", Unit::Grams, 250.0)]);
        assert_eq!(snapshot.inventory, vec![entry(10, "Milk", Unit::Milliliters, 500.0)]);
    }

    #[test]
    fn test_mutation_serialization() {
        let mutation = LedgerMutation::Delete {
            target: LedgerKind::Inventory,
            entry: entry(3, "Butter", Unit::Grams, 0.0),
        };
        let json = serde_json::to_value(&mutation).unwrap();

        assert_eq!(json["op"], "delete");
        assert_eq!(json["target"], "inventory");
        assert_eq!(json["entry"]["unit"], "g");
        assert_eq!(mutation.to_string(), "inventory: delete #3 Butter");
    }
}
