//! # Trust Gate
//!
//! Two-plane HTTP admission gate for a fleet of internal services:
//!
//! - **Service plane**: callers identify with `X-Service-Name` + `X-API-Key`,
//!   checked against a shared key registry. A one-time bootstrap token lets
//!   the identity-issuing service (`auth` by default) in before any key for it
//!   exists, so it can sync its own.
//! - **User plane**: end users present HMAC-signed JWT bearer tokens.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → Timeout → Plane gate)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, bootstrap status, key sync, whoami, me)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TrustBootstrap (admission decision)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  KeyRegistry (timeout + cancellation) → dyn KeyStore        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MongoDB  |  in-memory                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trust_gate::{AppState, Config, build_router, store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let key_store = store::connect(&config).await?;
//!
//!     let state = AppState::new(key_store, config);
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod announce;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod trust;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use store::{KeyRegistry, KeyStore};
pub use trust::TrustBootstrap;
