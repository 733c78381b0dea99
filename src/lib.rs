//! MedFlow - client-side data access for a hospital patient-flow dashboard
//!
//! Everything non-trivial (auth, row storage, filtered queries, realtime
//! change feeds, referential joins) is delegated to a hosted Supabase-style
//! backend; this crate is the typed access layer in front of it:
//!
//! - [`supabase::SupabaseClient`] - the one explicitly constructed handle to
//!   the backend, injected into each facade
//! - [`auth::AuthService`] - sign-in/out, registration, sessions
//! - [`database::DatabaseService`] - per-table reads/writes and realtime
//!   subscriptions
//! - [`dashboard::DashboardService`] - per-role view composition with
//!   concurrent reads and locally derived stats
//!
//! ```no_run
//! use std::sync::Arc;
//! use medflow::config::Config;
//! use medflow::database::DatabaseService;
//! use medflow::dashboard::DashboardService;
//! use medflow::supabase::SupabaseClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_default("medflow.toml");
//! medflow::logger::init(config.log_level());
//!
//! let client = Arc::new(SupabaseClient::new(&config.supabase)?);
//! let db = Arc::new(DatabaseService::new(client.clone()));
//! let dashboard = DashboardService::new(db.clone());
//!
//! let view = dashboard.admin_dashboard().await?;
//! println!("{} departments reporting", view.departments.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod errors;
pub mod logger;
pub mod models;
pub mod supabase;

pub use auth::AuthService;
pub use config::Config;
pub use dashboard::DashboardService;
pub use database::{DashboardStore, DatabaseService};
pub use errors::FlowError;
pub use supabase::SupabaseClient;
