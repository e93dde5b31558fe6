//! # Order Data Model
//!
//! Customer orders reference recipes by identifier with a quantity per line.
//! An order starts out ongoing, is completed at most once, and can be deleted
//! from either state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::recipe_model::{RecipeCatalog, RecipeId};

/// Store-assigned order identifier
pub type OrderId = i64;

/// One (recipe, quantity) pair of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub recipe_id: RecipeId,
    pub quantity: u32,
}

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Ongoing,
    Completed,
}

/// Errors raised by order validation and state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order line for recipe {0} has a zero quantity")]
    ZeroQuantity(RecipeId),
    #[error("recipe {0} appears on more than one order line")]
    DuplicateRecipe(RecipeId),
    #[error("order {0} is already completed")]
    AlreadyCompleted(OrderId),
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),
}

/// A customer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier
    pub id: OrderId,

    /// Owner of the order (the signed-in kitchen user)
    pub user_id: String,

    /// Name of the customer the order is for
    pub customer_name: String,

    /// Ordered recipes
    pub lines: Vec<OrderLine>,

    /// Sum of recipe price × quantity, rounded to cents
    pub total_price: Decimal,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn new(recipe_id: RecipeId, quantity: u32) -> Self {
        Self {
            recipe_id,
            quantity,
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ongoing => "ongoing",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, OrderError> {
        match value {
            "ongoing" => Ok(OrderStatus::Ongoing),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Order {
    /// Create an ongoing order and compute its total from the catalog
    pub fn new(id: OrderId, customer_name: &str, lines: Vec<OrderLine>, catalog: &RecipeCatalog) -> Self {
        let total_price = Self::compute_total(&lines, catalog);
        Self {
            id,
            user_id: String::new(),
            customer_name: customer_name.trim().to_string(),
            lines,
            total_price,
            status: OrderStatus::Ongoing,
            created_at: Utc::now(),
        }
    }

    /// Set the owning user
    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Sum of selling price × quantity over the lines whose recipe resolves
    pub fn compute_total(lines: &[OrderLine], catalog: &RecipeCatalog) -> Decimal {
        lines
            .iter()
            .filter_map(|line| {
                catalog
                    .get_recipe(line.recipe_id)
                    .map(|recipe| recipe.selling_price * Decimal::from(line.quantity))
            })
            .sum::<Decimal>()
            .round_dp(2)
    }

    /// Every quantity must be positive and every recipe must appear once
    pub fn validate_lines(lines: &[OrderLine]) -> Result<(), OrderError> {
        let mut seen = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(OrderError::ZeroQuantity(line.recipe_id));
            }
            if seen.contains(&line.recipe_id) {
                return Err(OrderError::DuplicateRecipe(line.recipe_id));
            }
            seen.push(line.recipe_id);
        }
        Ok(())
    }

    /// Quantity ordered for a recipe, zero when absent
    pub fn quantity_of(&self, recipe_id: RecipeId) -> u32 {
        quantity_of(&self.lines, recipe_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Flip the order to completed; only allowed once
    pub fn mark_completed(&mut self) -> Result<(), OrderError> {
        if self.is_completed() {
            return Err(OrderError::AlreadyCompleted(self.id));
        }
        self.status = OrderStatus::Completed;
        Ok(())
    }
}

/// Increment the quantity of a recipe, adding a line when it is new
pub fn add_recipe(lines: &mut Vec<OrderLine>, recipe_id: RecipeId) {
    match lines.iter_mut().find(|line| line.recipe_id == recipe_id) {
        Some(line) => line.quantity += 1,
        None => lines.push(OrderLine::new(recipe_id, 1)),
    }
}

/// Decrement the quantity of a recipe, dropping the line when it reaches zero
pub fn remove_recipe(lines: &mut Vec<OrderLine>, recipe_id: RecipeId) {
    if let Some(index) = lines.iter().position(|line| line.recipe_id == recipe_id) {
        if lines[index].quantity <= 1 {
            lines.remove(index);
        } else {
            lines[index].quantity -= 1;
        }
    }
}

pub fn quantity_of(lines: &[OrderLine], recipe_id: RecipeId) -> u32 {
    lines
        .iter()
        .find(|line| line.recipe_id == recipe_id)
        .map_or(0, |line| line.quantity)
}
