//! Service plumbing shared by every route module: errors, state, auth, config and bootstrapping.

pub mod aliases;
pub mod app_error;
pub mod app_state;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod pagination;
pub mod swagger;
