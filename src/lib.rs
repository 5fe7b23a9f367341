//! Shuffle player engine with a configurable no-repeat window, plus the
//! terminal front end built on it.

pub mod app;
pub mod config;
pub mod core;
pub mod eligibility;
pub mod error;
pub mod library;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod player;
pub mod playlist;
pub mod query;
pub mod ui;
