//! # Recipe Data Model
//!
//! This module defines the recipe catalog: recipes with a selling price and an
//! ordered list of ingredient specs, plus the measurement units the kitchen
//! tracks ingredients in.
//!
//! ## Core Concepts
//!
//! - **Recipe**: A sellable item with a price and the ingredients one unit of it consumes
//! - **IngredientSpec**: An ingredient name, an amount and a unit
//! - **Unit**: One of grams, milliliters or a plain count
//! - **RecipeCatalog**: A read-only snapshot of recipes keyed by identifier
//!
//! ## Usage
//!
//! ```rust
//! use kitchen::recipe_model::{IngredientSpec, Recipe, RecipeCatalog, Unit};
//! use rust_decimal::Decimal;
//!
//! let cookies = Recipe::new(1, "Chocolate Chip Cookies", Decimal::new(1299, 2))
//!     .with_ingredient(IngredientSpec::new("Flour", 100.0, Unit::Grams))
//!     .with_ingredient(IngredientSpec::new("Chocolate Chips", 200.0, Unit::Grams));
//!
//! let catalog = RecipeCatalog::from_recipes(vec![cookies]);
//! assert!(catalog.get_recipe(1).is_some());
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Store-assigned recipe identifier
pub type RecipeId = i64;

/// Longest recipe name accepted
pub const MAX_RECIPE_NAME_LEN: usize = 255;

/// Measurement units tracked by the kitchen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    /// Weight in grams
    Grams,
    /// Volume in milliliters
    Milliliters,
    /// Individual pieces
    Count,
}

/// Errors raised while validating recipes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("recipe name is empty")]
    EmptyName,
    #[error("recipe name is longer than 255 characters")]
    NameTooLong,
    #[error("selling price cannot be negative: {0}")]
    NegativePrice(Decimal),
    #[error("ingredient #{0} has an empty name")]
    EmptyIngredientName(usize),
    #[error("ingredient '{name}' has an invalid amount: {amount}")]
    InvalidAmount { name: String, amount: f64 },
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}

/// One ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSpec {
    /// Ingredient name as entered by the user (case preserved)
    pub name: String,

    /// Amount consumed by one unit of the recipe
    pub amount: f64,

    /// Unit of the amount
    pub unit: Unit,
}

/// A sellable recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Store-assigned identifier
    pub id: RecipeId,

    /// Owner of the recipe
    pub user_id: String,

    /// Display name (e.g., "Brown Butter Sea Salt Cookies")
    pub name: String,

    /// Selling price of one unit
    pub selling_price: Decimal,

    /// Ingredients consumed by one unit, in entry order
    pub ingredients: Vec<IngredientSpec>,

    /// Optional reference to the recipe photo in blob storage
    pub image_ref: Option<String>,
}

/// Read-only snapshot of the recipe catalog
#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    recipes: HashMap<RecipeId, Recipe>,
}

impl Unit {
    /// All units, in display order
    pub const ALL: [Unit; 3] = [Unit::Grams, Unit::Milliliters, Unit::Count];

    /// Canonical short spelling used for storage and display
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Grams => "g",
            Unit::Milliliters => "mL",
            Unit::Count => "count",
        }
    }

    /// Human-readable label used in pickers
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Grams => "g (grams)",
            Unit::Milliliters => "mL (milliliters)",
            Unit::Count => "count",
        }
    }
}

impl FromStr for Unit {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" | "gramme" | "grammes" => Ok(Unit::Grams),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                Ok(Unit::Milliliters)
            }
            "count" | "pcs" | "pc" | "piece" | "pieces" => Ok(Unit::Count),
            _ => Err(RecipeError::UnknownUnit(s.to_string())),
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = RecipeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_str().to_string()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngredientSpec {
    pub fn new(name: &str, amount: f64, unit: Unit) -> Self {
        Self {
            name: name.to_string(),
            amount,
            unit,
        }
    }
}

impl Recipe {
    /// Create a recipe with no ingredients
    pub fn new(id: RecipeId, name: &str, selling_price: Decimal) -> Self {
        Self {
            id,
            user_id: String::new(),
            name: name.to_string(),
            selling_price,
            ingredients: Vec::new(),
            image_ref: None,
        }
    }

    /// Append an ingredient
    pub fn with_ingredient(mut self, ingredient: IngredientSpec) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    /// Set the owning user
    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Attach an image reference
    pub fn with_image_ref(mut self, image_ref: &str) -> Self {
        self.image_ref = Some(image_ref.to_string());
        self
    }

    /// Check the recipe before it is stored
    ///
    /// The name must pass [`validate_recipe_name`], the price must not be
    /// negative, and every ingredient needs a name and a finite positive amount.
    pub fn validate(&self) -> Result<(), RecipeError> {
        validate_recipe_name(&self.name)?;

        if self.selling_price < Decimal::ZERO {
            return Err(RecipeError::NegativePrice(self.selling_price));
        }

        for (index, ingredient) in self.ingredients.iter().enumerate() {
            if ingredient.name.trim().is_empty() {
                return Err(RecipeError::EmptyIngredientName(index));
            }
            if !ingredient.amount.is_finite() || ingredient.amount <= 0.0 {
                return Err(RecipeError::InvalidAmount {
                    name: ingredient.name.clone(),
                    amount: ingredient.amount,
                });
            }
        }

        Ok(())
    }
}

impl RecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of recipes; later duplicates win
    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.id, recipe);
    }

    /// Look up a recipe by identifier
    pub fn get_recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipes sorted by name, for stable listings
    pub fn recipes(&self) -> Vec<&Recipe> {
        let mut recipes: Vec<&Recipe> = self.recipes.values().collect();
        recipes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        recipes
    }
}

/// Validates a recipe name input, returning the trimmed name
pub fn validate_recipe_name(name: &str) -> Result<String, RecipeError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(RecipeError::EmptyName);
    }

    if trimmed.chars().count() > MAX_RECIPE_NAME_LEN {
        return Err(RecipeError::NameTooLong);
    }

    Ok(trimmed.to_string())
}

impl fmt::Display for IngredientSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.fract() == 0.0 {
            write!(f, "{} {} {}", self.amount as i64, self.unit, self.name)
        } else {
            write!(f, "{} {} {}", self.amount, self.unit, self.name)
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (${})", self.name, self.selling_price.round_dp(2))?;
        for ingredient in &self.ingredients {
            writeln!(f, "  • {}", ingredient)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies() -> Recipe {
        Recipe::new(1, "Chocolate Chip Cookies", Decimal::new(1299, 2))
            .with_ingredient(IngredientSpec::new("Chocolate Chips", 200.0, Unit::Grams))
    }

    #[test]
    fn test_unit_parsing_is_case_insensitive() {
        assert_eq!("g".parse::<Unit>().unwrap(), Unit::Grams);
        assert_eq!("G".parse::<Unit>().unwrap(), Unit::Grams);
        assert_eq!("mL".parse::<Unit>().unwrap(), Unit::Milliliters);
        assert_eq!("ML".parse::<Unit>().unwrap(), Unit::Milliliters);
        assert_eq!(" Count ".parse::<Unit>().unwrap(), Unit::Count);
        assert_eq!("pieces".parse::<Unit>().unwrap(), Unit::Count);
        assert!(matches!(
            "cups".parse::<Unit>(),
            Err(RecipeError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_unit_serde_uses_canonical_spelling() {
        let json = serde_json::to_string(&Unit::Milliliters).unwrap();
        assert_eq!(json, "\"mL\"");

        let unit: Unit = serde_json::from_str("\"ml\"").unwrap();
        assert_eq!(unit, Unit::Milliliters);

        assert!(serde_json::from_str::<Unit>("\"tbsp\"").is_err());
    }

    #[test]
    fn test_recipe_builder() {
        let recipe = cookies().with_user("user-1").with_image_ref("recipes/cookies.jpg");

        assert_eq!(recipe.name, "Chocolate Chip Cookies");
        assert_eq!(recipe.user_id, "user-1");
        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.image_ref.as_deref(), Some("recipes/cookies.jpg"));
        assert!(recipe.validate().is_ok());
    }

    #[test]
    fn test_recipe_validation_rejects_bad_ingredients() {
        let zero = cookies().with_ingredient(IngredientSpec::new("Salt", 0.0, Unit::Grams));
        assert!(matches!(
            zero.validate(),
            Err(RecipeError::InvalidAmount { .. })
        ));

        let unnamed = cookies().with_ingredient(IngredientSpec::new("  ", 1.0, Unit::Count));
        assert_eq!(unnamed.validate(), Err(RecipeError::EmptyIngredientName(1)));

        let nan = cookies().with_ingredient(IngredientSpec::new("Milk", f64::NAN, Unit::Milliliters));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_recipe_validation_rejects_negative_price() {
        let recipe = Recipe::new(2, "Refund", Decimal::new(-100, 2));
        assert!(matches!(recipe.validate(), Err(RecipeError::NegativePrice(_))));

        let free = Recipe::new(3, "Sample", Decimal::ZERO);
        assert!(free.validate().is_ok());
    }

    #[test]
    fn test_recipe_name_validation() {
        assert!(validate_recipe_name("Chocolate Chip Cookies").is_ok());
        assert!(validate_recipe_name("  Mom's Lasagna  ").is_ok());

        assert_eq!(validate_recipe_name(""), Err(RecipeError::EmptyName));
        assert_eq!(validate_recipe_name("   "), Err(RecipeError::EmptyName));
        assert_eq!(
            validate_recipe_name(&"a".repeat(256)),
            Err(RecipeError::NameTooLong)
        );
        assert_eq!(validate_recipe_name("  Test Recipe  ").unwrap(), "Test Recipe");
    }

    #[test]
    fn test_catalog_lookup() {
        let brownies = Recipe::new(2, "Brownies", Decimal::new(899, 2));
        let catalog = RecipeCatalog::from_recipes(vec![cookies(), brownies]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get_recipe(2).map(|r| r.name.as_str()), Some("Brownies"));
        assert!(catalog.get_recipe(42).is_none());

        let names: Vec<&str> = catalog.recipes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Brownies", "Chocolate Chip Cookies"]);
    }

    #[test]
    fn test_display_formatting() {
        let display = format!("{}", cookies());
        assert!(display.contains("Chocolate Chip Cookies ($12.99)"));
        assert!(display.contains("200 g Chocolate Chips"));

        let half = IngredientSpec::new("Vanilla", 2.5, Unit::Milliliters);
        assert_eq!(format!("{}", half), "2.5 mL Vanilla");
    }
}
