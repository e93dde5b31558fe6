//! # Kitchen
//!
//! Order fulfillment for a small kitchen: recipes with ingredient lists,
//! customer orders, and two ingredient ledgers per user (the shopping list and
//! the inventory) that are kept in step with the orders.
//!
//! The [`reconcile`] module holds the pure decision logic; [`service`] wires it
//! to a [`store::KitchenStore`] such as the Postgres-backed [`db::PgStore`].

pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod order_model;
pub mod reconcile;
pub mod recipe_model;
pub mod service;
pub mod session;
pub mod shopping;
pub mod store;
