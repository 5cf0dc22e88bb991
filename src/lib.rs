//! botdesk — terminal dashboard and admin client for a multi-tenant
//! chatbot platform.
//!
//! The platform itself (routing, bot reasoning, webhook delivery, quota
//! accounting) runs server-side; botdesk talks to its HTTP API with a
//! cookie session and reshapes the JSON for the terminal.

pub mod api;
pub mod chart;
pub mod cli;
pub mod config;
pub mod export;
pub mod knowledge;
pub mod reqlog;
pub mod session;
pub mod stats;
pub mod webhooks;
