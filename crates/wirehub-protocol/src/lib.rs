//! Wire protocol for wirehub.
//!
//! This crate defines what travels between clients and the hub:
//!
//! - **Identity** ([`AppId`], [`UserKey`]): the application namespace and
//!   the composite `"{app_id}_{user_id}"` key every authenticated lookup
//!   goes through.
//! - **Frames** ([`Request`], [`Response`], [`PushData`]): client commands,
//!   replies, and the push envelope used for system notifications.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session / Hub (connections)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AppId, HeartbeatData, LoginData, PushData, PushKind, Request,
    RequestHead, Response, ResponseBody, StatusCode, UserKey,
};
