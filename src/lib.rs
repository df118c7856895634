//! AIT: Asset Inventory Toolkit
//!
//! Imports CSV and spreadsheet exports of IT hardware into a local SQLite
//! inventory, reconciling every row against the records already stored.

pub mod cli;
pub mod core;
pub mod import;
