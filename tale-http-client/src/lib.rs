//! Tale HTTP Client Library
//!
//! An unofficial client for the web API of the browser game The Tale. It
//! logs in (directly or through third-party authorisation), keeps the
//! session cookies and CSRF token, and exposes the hero, card and shop
//! operations.
//!
//! # Features
//!
//! - Typed client states: calls needing a session only exist on
//!   [`AuthenticatedClient`], so no request ever claims a session that was
//!   never established
//! - One static registry of API methods ([`ApiMethod`])
//! - Best-effort response decoding into [`Decoded`]
//! - Bounded polling of postponed tasks with an injectable [`Sleeper`]
//! - Secure TLS using rustls (no OpenSSL dependencies)
//! - Blocking synchronous API
//! - Well-typed errors using thiserror
//!
//! # Example
//!
//! ```no_run
//! use tale_http_client::TaleClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TaleClient::new()?;
//! let account = client.login("hero@example.com", "secret")?;
//!
//! let hero = account.hero_info(&[], None)?;
//! println!("Hero: {:?}", hero);
//!
//! account.receive_cards()?;
//! let cards = account.cards()?;
//! println!("Cards: {:?}", cards);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod parser;
mod poller;
mod registry;
mod session;
mod transport;
mod types;

pub use client::{
    AuthenticatedClient, DEFAULT_API_CLIENT, DEFAULT_BASE_URL, PendingAuthorisation, TaleClient,
    TaleClientBuilder,
};
pub use error::TaleError;
pub use parser::Decoded;
pub use poller::{PendingTask, PollPolicy, Sleeper, TaskState, ThreadSleeper, wait_for_task};
pub use registry::{ApiMethod, HttpVerb, MethodDescriptor};
pub use session::Session;
pub use types::{AuthorisationState, AuthorisationStatus, HeroAction, ThirdPartyApp};
