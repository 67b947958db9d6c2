//! Core protocol types for wirehub's wire format.
//!
//! Every client frame is a small JSON object with a client-chosen `seq`, a
//! `cmd` naming the operation, and a command-specific `data` body. The hub
//! answers with the same `seq`/`cmd` and a `response` block carrying a
//! status code. System notifications reuse the response shape under
//! `cmd: "msg"` so clients parse a single envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The application (platform / tenant) namespace a user logs in under.
///
/// Serialized as a plain number thanks to `#[serde(transparent)]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The composite `"{app_id}_{user_id}"` key.
///
/// This is the only key the authenticated registry is indexed by, and the
/// string room membership is tested against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(String);

impl UserKey {
    /// Builds the key for a user inside an application.
    pub fn new(app_id: AppId, user_id: &str) -> Self {
        Self(format!("{app_id}_{user_id}"))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Status codes carried in every [`ResponseBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    NotLoggedIn,
    ParameterIllegal,
    UnauthorizedUserId,
    Unauthorized,
    ServerError,
    OperationFailure,
    RoutingNotExist,
}

impl StatusCode {
    /// The numeric code sent on the wire.
    pub fn code(self) -> u32 {
        match self {
            Self::Ok => 200,
            Self::NotLoggedIn => 1000,
            Self::ParameterIllegal => 1001,
            Self::UnauthorizedUserId => 1002,
            Self::Unauthorized => 1003,
            Self::ServerError => 1004,
            Self::OperationFailure => 1009,
            Self::RoutingNotExist => 1010,
        }
    }

    /// The default human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::NotLoggedIn => "not logged in",
            Self::ParameterIllegal => "illegal parameter",
            Self::UnauthorizedUserId => "user id does not match this connection",
            Self::Unauthorized => "unauthorized",
            Self::ServerError => "internal server error",
            Self::OperationFailure => "operation failed",
            Self::RoutingNotExist => "unknown command",
        }
    }
}

// ---------------------------------------------------------------------------
// Client → hub
// ---------------------------------------------------------------------------

/// The routing part of a request: just enough to pick a handler.
///
/// Decoding into this first ignores `data`, so an unknown command or a
/// malformed body still yields a `seq` to answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHead {
    #[serde(default)]
    pub seq: String,
    pub cmd: String,
}

/// A full request with a command-specific body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request<D> {
    #[serde(default)]
    pub seq: String,
    pub cmd: String,
    pub data: D,
}

/// Body of a `login` request.
///
/// Credential checking is not the hub's job; `service_token` is carried
/// through for whatever sits in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub service_token: String,
    pub app_id: AppId,
    pub user_id: String,
}

/// Body of a `heartbeat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatData {
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Hub → client
// ---------------------------------------------------------------------------

/// The `response` block of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody<D> {
    pub code: u32,
    pub code_msg: String,
    pub data: D,
}

/// A reply or push frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<D> {
    pub seq: String,
    pub cmd: String,
    pub response: ResponseBody<D>,
}

impl<D> Response<D> {
    /// Builds a reply to `seq`/`cmd` with the default message for `status`.
    pub fn new(
        seq: impl Into<String>,
        cmd: impl Into<String>,
        status: StatusCode,
        data: D,
    ) -> Self {
        Self {
            seq: seq.into(),
            cmd: cmd.into(),
            response: ResponseBody {
                code: status.code(),
                code_msg: status.message().to_string(),
                data,
            },
        }
    }
}

impl Response<PushData> {
    /// The command name every push frame travels under.
    pub const PUSH_CMD: &'static str = "msg";

    /// Builds a push frame stamped with an order id.
    pub fn push(
        order_id: impl Into<String>,
        kind: PushKind,
        from: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::new(
            order_id,
            Self::PUSH_CMD,
            StatusCode::Ok,
            PushData {
                target: String::new(),
                kind,
                msg: msg.into(),
                from: from.into(),
            },
        )
    }
}

/// What a push frame is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushKind {
    /// A user came online.
    Enter,
    /// A user went offline.
    Exit,
    /// Plain text relayed from another user.
    Text,
}

/// Body of a push frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushData {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: PushKind,
    pub msg: String,
    pub from: String,
}

// =========================================================================
// Tests
// =========================================================================
