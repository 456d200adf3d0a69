//! WebDAV front end and WebDAV remote client for cachedav.
//!
//! This crate connects the hybrid filesystem from `cachedav-core` to the
//! outside world on both ends:
//!
//! - [`WebDavClient`] implements the remote-store capability against an
//!   upstream WebDAV server (PROPFIND, ranged GET, MKCOL, DELETE, MOVE).
//! - [`HybridDav`] exposes a [`HybridFs`](cachedav_core::HybridFs) through
//!   dav-server, and [`WebDavServer`] serves it over HTTP with optional
//!   Basic authentication.
//!
//! # Example
//!
//! ```ignore
//! use cachedav_core::{CacheDir, HybridFs};
//! use cachedav_webdav::{ClientConfig, HybridDav, ServerConfig, WebDavClient, WebDavServer};
//! use std::sync::Arc;
//!
//! let remote = WebDavClient::new(ClientConfig::default())?;
//! remote.connect().await?;
//!
//! let cache = CacheDir::ensure("/cache").await?;
//! let fs = HybridFs::new(Arc::new(cache), Arc::new(remote));
//!
//! let server = WebDavServer::start(Box::new(HybridDav::new(fs)), ServerConfig::default()).await?;
//! println!("Serving on {}", server.url());
//! ```

mod client;
mod dir_entry;
mod error;
mod file;
mod filesystem;
mod metadata;
mod server;

pub use client::{ClientConfig, DEFAULT_REMOTE_URL, DEFAULT_TIMEOUT, WebDavClient};
pub use error::{WebDavError, WebDavResult, category_to_fs_error, proxy_error_to_fs_error};
pub use filesystem::HybridDav;
pub use server::{BasicAuth, DEFAULT_PORT, ServerConfig, WebDavServer};
