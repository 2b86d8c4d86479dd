pub mod activity;
pub mod api;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod monitor;
pub mod session;
pub mod strategy;
