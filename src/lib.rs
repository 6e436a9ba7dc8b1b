//! ShopEase - An e-commerce backend
//!
//! Accounts with a single live session per user, a catalog, per-user carts
//! valued at live prices, and atomic checkout into immutable orders.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
