//! Client library for the Locksmith lock broker.
//!
//! A [`LockClient`] holds one persistent connection to a broker. Lock
//! requests are fire-and-forget: [`LockClient::acquire`] and
//! [`LockClient::release`] put a frame on the wire and return; the broker's
//! answer arrives asynchronously as a grant, delivered to the callback
//! registered in [`ClientOptions::on_acquired`]. There is no reply to wait
//! for and no automatic reconnection; a dropped connection is the caller's
//! to re-establish.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use locksmith_client::{ClientOptions, LockClient};
//!
//! # async fn example() -> Result<(), locksmith_client::ClientError> {
//! let client = LockClient::connect(ClientOptions {
//!     host: "localhost".to_owned(),
//!     port: 9000,
//!     tls: None,
//!     on_acquired: Some(Arc::new(|tag| println!("holding {tag}"))),
//! })
//! .await?;
//!
//! client.acquire("build-artifacts")?;
//! // ... the callback fires when the broker grants the lock ...
//! client.release("build-artifacts")?;
//! client.close();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod tls;

pub use client::{ClientOptions, GrantCallback, LockClient};
pub use error::ClientError;
pub use tls::{TlsIdentity, TlsOptions};
