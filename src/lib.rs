//! # mirrornet
//!
//! Network core for a catalog client that has to reach its APIs through
//! hostile networks.
//!
//! `mirrornet` combines three layers:
//!
//! - **DNS overrides**: a user-editable hosts table consulted before
//!   DNS-over-HTTPS and the system resolver
//! - **SNI bypass**: per-domain rewriting of outbound requests through a
//!   reverse proxy so the TLS handshake never names the blocked host
//! - **Mirror failover**: one primary catalog API plus three backup mirrors,
//!   with catalog-id reconciliation when a backup indexes a translated edition
//!
//! Settings live in a JSON file; every change is pushed into the resolver,
//! the SNI manager and the crawler without restarting anything.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mirrornet::context::NetworkContext;
//! use mirrornet::settings::SettingsStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SettingsStore::open("settings.json").await.unwrap());
//!     let ctx = NetworkContext::new(store).unwrap();
//!     let page = ctx.crawler().search("RJ392613", 1).await;
//!     println!("{} works", page.works.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`dns`] - Hosts table, DoH and the layered override resolver
//! - [`sni`] - Bypass rules and request rewriting
//! - [`http`] - Connection setup, JSON fetching and retry policy
//! - [`crawler`] - Mirror adapters and the failover orchestrator
//! - [`settings`] - Persisted settings and live propagation
//! - [`context`] - Wiring of all of the above

pub mod base;
pub mod context;
pub mod crawler;
pub mod dns;
pub mod http;
pub mod settings;
pub mod sni;
