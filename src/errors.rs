//! # Kitchen Error Types
//!
//! Errors surfaced by [`crate::service::KitchenService`]. Domain failures get
//! their own variant so callers can react to them; store failures are carried
//! as [`anyhow::Error`] with their context chain.

use thiserror::Error;

use crate::ledger::EntryId;
use crate::order_model::{OrderError, OrderId};
use crate::reconcile::ShortfallReport;
use crate::recipe_model::{RecipeError, RecipeId};

#[derive(Debug, Error)]
pub enum KitchenError {
    /// No user is signed in
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("recipe {0} not found")]
    RecipeNotFound(RecipeId),
    #[error("invalid recipe: {0}")]
    InvalidRecipe(#[from] RecipeError),
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),
    /// Completion refused; nothing was changed
    #[error("cannot complete order, missing ingredients:\n{0}")]
    InsufficientInventory(ShortfallReport),
    #[error("inventory entry {0} not found")]
    EntryNotFound(EntryId),
    /// Failure reported by the backing store
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type KitchenResult<T> = Result<T, KitchenError>;

impl KitchenError {
    /// Shortfall report when this is a refused completion
    pub fn shortfall(&self) -> Option<&ShortfallReport> {
        match self {
            KitchenError::InsufficientInventory(report) => Some(report),
            _ => None,
        }
    }
}
