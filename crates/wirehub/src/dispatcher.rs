//! Reference [`Dispatcher`]: the `login`, `heartbeat`, and `ping`
//! commands.
//!
//! Every request is answered on the same connection with its `seq` and
//! `cmd` echoed back and a status code. Frames that cannot even be read
//! as `{seq, cmd}` get `ParameterIllegal` with an empty `seq`.

use std::sync::Arc;

use wirehub_hub::{Dispatcher, Hub};
use wirehub_protocol::{
    AppId, Codec, HeartbeatData, JsonCodec, LoginData, Request, RequestHead,
    Response, StatusCode, UserKey,
};
use wirehub_session::{unix_now, Connection, OnlineInfo, PresenceStore};
use wirehub_transport::Socket;

/// Reply payload: most commands answer with no data.
type Reply = (StatusCode, Option<String>);

pub struct CommandDispatcher<S: Socket, P: PresenceStore> {
    hub: Hub<S>,
    presence: Arc<P>,
    app_ids: Vec<AppId>,
    codec: JsonCodec,
}

impl<S: Socket, P: PresenceStore> CommandDispatcher<S, P> {
    /// `app_ids` is the whitelist of applications users may log in under.
    pub fn new(hub: Hub<S>, presence: Arc<P>, app_ids: Vec<AppId>) -> Self {
        Self {
            hub,
            presence,
            app_ids,
            codec: JsonCodec,
        }
    }

    async fn login(&self, conn: &Arc<Connection<S>>, frame: &[u8]) -> Reply {
        let Ok(req) = self.codec.decode::<Request<LoginData>>(frame) else {
            return (StatusCode::ParameterIllegal, None);
        };
        let LoginData {
            app_id, user_id, ..
        } = req.data;

        if user_id.is_empty() || !self.app_ids.contains(&app_id) {
            return (StatusCode::ParameterIllegal, None);
        }
        if conn.is_authenticated() {
            return (StatusCode::OperationFailure, None);
        }

        let now = unix_now();
        let key = UserKey::new(app_id, &user_id);
        let info = OnlineInfo::online(conn.addr(), app_id, user_id.as_str(), now);
        if let Err(e) = self.presence.set_online_info(&key, info).await {
            tracing::warn!(%key, error = %e, "presence write failed on login");
            return (StatusCode::ServerError, None);
        }
        if let Err(e) = self.hub.login(conn, app_id, &user_id, now).await {
            tracing::warn!(%key, error = %e, "login not submitted");
            return (StatusCode::ServerError, None);
        }

        (StatusCode::Ok, Some(user_id))
    }

    async fn heartbeat(&self, conn: &Arc<Connection<S>>, frame: &[u8]) -> Reply {
        let Ok(req) = self.codec.decode::<Request<HeartbeatData>>(frame) else {
            return (StatusCode::ParameterIllegal, None);
        };
        if !conn.is_authenticated() {
            return (StatusCode::NotLoggedIn, None);
        }
        if conn.user_id() != req.data.user_id {
            return (StatusCode::UnauthorizedUserId, None);
        }

        let now = unix_now();
        conn.mark_heartbeat(now);

        let key = conn.key();
        match self.presence.get_online_info(&key).await {
            Ok(mut info) => {
                info.heartbeat(now);
                if let Err(e) = self.presence.set_online_info(&key, info).await {
                    tracing::warn!(%key, error = %e, "presence write failed on heartbeat");
                }
            }
            Err(e) => tracing::debug!(%key, error = %e, "no presence record to refresh"),
        }

        (StatusCode::Ok, None)
    }

    fn reply(&self, conn: &Connection<S>, seq: String, cmd: String, (status, data): Reply) {
        match self.codec.encode(&Response::new(seq, cmd, status, data)) {
            Ok(bytes) => conn.enqueue(bytes),
            Err(e) => tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode reply"),
        }
    }
}

impl<S: Socket, P: PresenceStore> Dispatcher<S> for CommandDispatcher<S, P> {
    async fn process(&self, conn: &Arc<Connection<S>>, frame: Vec<u8>) {
        let head: RequestHead = match self.codec.decode(&frame) {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "undecodable frame");
                self.reply(conn, String::new(), String::new(), (StatusCode::ParameterIllegal, None));
                return;
            }
        };
        tracing::debug!(conn_id = %conn.id(), seq = %head.seq, cmd = %head.cmd, "request");

        let reply = match head.cmd.as_str() {
            "login" => self.login(conn, &frame).await,
            "heartbeat" => self.heartbeat(conn, &frame).await,
            "ping" => (StatusCode::Ok, Some("pong".to_string())),
            _ => (StatusCode::RoutingNotExist, None),
        };
        self.reply(conn, head.seq, head.cmd, reply);
    }
}
