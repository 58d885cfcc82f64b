//! Policy Tracker - a political news dashboard
//!
//! Pulls RSS headlines for configured politicians and issues, filters them by
//! keyword, and serves them alongside videos, a comment forum, a newsletter
//! signup and a headline sentiment report.

pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod news;
pub mod routes;
pub mod sentiment;
pub mod subscribers;
