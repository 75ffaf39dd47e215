//! CareControl core library
//!
//! Medication-tracking backend for nurses and caregivers: patient records
//! with embedded medication lists, the once-daily status reconciliation,
//! and the HTTP/WebSocket surface the views consume.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod medications;
pub mod models;
pub mod patients;
pub mod reconcile;
pub mod store;
pub mod views;
pub mod ws;

use crate::config::Settings;
use crate::store::CareStore;

/// Shared application state injected into every handler.
pub struct AppState {
    pub store: CareStore,
    pub settings: Settings,
}
