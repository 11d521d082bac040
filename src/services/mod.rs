// src/services/mod.rs
pub mod allocation;
pub mod cache;
pub mod factors;
pub mod forecast;
pub mod macro_data;
pub mod numeric;
pub mod performance;
pub mod portfolio;
pub mod regime;
pub mod sources;
pub mod store;
pub mod tefas;
pub mod throttle;
pub mod yahoo;
