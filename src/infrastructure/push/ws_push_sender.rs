//! Websocket push sender.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::domain::entities::PushFrame;
use crate::domain::errors::DeliveryError;
use crate::domain::ports::PushSenderPort;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends push frames as JSON text messages over one websocket.
///
/// The connection is opened on first use. A failed send drops it and the
/// next send reconnects; the failed frame itself is not retried.
pub struct WsPushSender {
    endpoint: String,
    token: Option<String>,
    stream: Mutex<Option<WsStream>>,
}

impl WsPushSender {
    /// Creates a sender for `endpoint`, authenticating with `token` if set.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            stream: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<WsStream, DeliveryError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| DeliveryError::connection_failed(e.to_string()))?;

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| DeliveryError::connection_failed(format!("invalid token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) = timeout(CONNECTION_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| DeliveryError::connection_failed("connection timed out"))?
            .map_err(|e| DeliveryError::connection_failed(e.to_string()))?;

        info!(endpoint = %self.endpoint, "Connected to push endpoint");
        Ok(stream)
    }
}

#[async_trait]
impl PushSenderPort for WsPushSender {
    async fn send(&self, frame: &PushFrame) -> Result<(), DeliveryError> {
        let json =
            serde_json::to_string(frame).map_err(|e| DeliveryError::encoding(e.to_string()))?;

        let mut guard = self.stream.lock().await;
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        if let Err(e) = stream.send(WsMessage::Text(json.into())).await {
            warn!(endpoint = %self.endpoint, error = %e, "Push send failed, dropping connection");
            return Err(DeliveryError::send_failed(e.to_string()));
        }
        *guard = Some(stream);

        debug!(conversation_id = %frame.data.conversation_id, "Push frame sent");
        Ok(())
    }
}
