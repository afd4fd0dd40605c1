//! Client-side data synchronization store for the Pengu marketplace.
//!
//! The server is the source of truth; this crate keeps one in-memory
//! collection cache per entity type in sync with it through three paths:
//! a role-conditioned bulk load when the session user changes, per-operation
//! mutation handlers that merge the server's authoritative responses, and a
//! push-event listener that re-fetches whatever a pushed event touched.

pub mod config;
pub mod gateway;
pub mod live;
pub mod loader;
pub mod models;
mod mutations;
pub mod normalize;
pub mod notice;
pub mod session;
pub mod store;

pub use config::Config;
pub use gateway::{Gateway, GatewayError, HttpGateway};
pub use live::LiveListener;
pub use loader::Collection;
pub use notice::{Notice, NoticeLevel, NoticeSender};
pub use session::SessionFile;
pub use store::Store;

pub use pengu_proto::{ClientMessage, ServerEvent};
