// src/handlers/mod.rs
pub mod cache;
pub mod error;
pub mod forecast;
pub mod funds;
pub mod macro_data;
pub mod portfolio;
pub mod regime;
