//! Classifies sevDesk bank transactions and books them as vouchers.
//!
//! The building blocks are usable without the CLI: `normalize` and the resolvers in `resolve` find
//! contacts and cost centres for a payee, `rules` classifies donations, and `plan::PlanBuilder`
//! turns a `model::Snapshot` into a `model::VoucherPlan` for one `vouchers::VoucherType`.

mod api;
pub mod args;
pub mod commands;
mod config;
mod db;
mod error;
pub mod model;
pub mod normalize;
pub mod numbering;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod rules;
mod utils;
pub mod vouchers;


pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use model::Amount;
pub use normalize::normalize;
pub use vouchers::VoucherType;
