//! Bayeux long-poll client for one streaming channel
//!
//! The transport is plain HTTP POST against the org's `/cometd/<version>`
//! endpoint. A subscription is three phases: handshake (get a client id),
//! subscribe (attach to the channel with a replay position), then a repeating
//! connect long-poll that the server holds open until events arrive or its
//! own timeout elapses.
//!
//! Handshake or subscribe failure is fatal and surfaces to the caller of
//! [`StreamingClient::subscribe`]. Once the connect loop is running, dropped
//! connections self-heal: the loop re-handshakes with the last seen replay
//! position after a short backoff, emitting `Disconnected`/`Connected`
//! notices so the adapter can tell the user.

use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tether_config::{REPLAY_ALL_AVAILABLE, STREAMING_RECONNECT_BACKOFF_MS};
use tether_core::{Error, Result, StreamMessage};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Notices delivered to the adapter's event loop. All streaming activity,
/// transport state changes included, funnels through one channel so the
/// adapter processes it strictly in order.
#[derive(Debug, Clone)]
pub enum StreamingNotice {
    /// A channel (re)connected after a transport drop.
    Connected { channel: String },
    /// A channel lost its transport; reconnection is in progress.
    Disconnected { channel: String },
    /// The server rejected a streaming operation on an established channel.
    Error { channel: String, reason: String },
    /// An event arrived on a channel.
    Message(StreamMessage),
}

/// Connection parameters for one channel subscription.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    pub channel: String,
    /// Long-poll request timeout; must exceed the server's connect hold time.
    pub timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
}

impl StreamingConfig {
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            timeout_ms: tether_config::DEFAULT_STREAMING_TIMEOUT_MS,
            reconnect_backoff_ms: STREAMING_RECONNECT_BACKOFF_MS,
        }
    }
}

/// One element of a Bayeux response array. Only the fields the client reacts
/// to are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BayeuxMessage {
    channel: String,
    #[serde(default)]
    successful: Option<bool>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

pub struct StreamingClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    config: StreamingConfig,
    notices: mpsc::Sender<StreamingNotice>,
    client_id: Arc<Mutex<Option<String>>>,
    replay: Arc<AtomicI64>,
    shutdown: Arc<AtomicBool>,
}

impl StreamingClient {
    /// `client` must be built with a timeout longer than the server's
    /// long-poll hold; the caller owns proxy configuration.
    pub fn new(
        client: reqwest::Client,
        instance_url: &str,
        access_token: &str,
        config: StreamingConfig,
        notices: mpsc::Sender<StreamingNotice>,
    ) -> Self {
        let endpoint = format!(
            "{}/cometd/{}",
            instance_url,
            tether_config::STREAMING_API_VERSION
        );
        Self {
            client,
            endpoint,
            access_token: access_token.to_string(),
            config,
            notices,
            client_id: Arc::new(Mutex::new(None)),
            replay: Arc::new(AtomicI64::new(REPLAY_ALL_AVAILABLE)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    /// Handshake, subscribe, then start the connect loop in the background.
    ///
    /// Failure of either initial phase is returned to the caller and nothing
    /// is spawned; a launch cannot proceed without its subscriptions.
    pub async fn subscribe(&mut self) -> Result<()> {
        let mut worker = ConnectWorker {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            access_token: self.access_token.clone(),
            config: self.config.clone(),
            notices: self.notices.clone(),
            client_id: self.client_id.clone(),
            replay: self.replay.clone(),
            shutdown: self.shutdown.clone(),
            message_id: 0,
        };
        worker.handshake().await?;
        worker.subscribe().await?;
        debug!(channel = %self.config.channel, "streaming subscription established");
        tokio::spawn(async move { worker.run().await });
        Ok(())
    }

    /// Stop the connect loop and tell the server goodbye, best effort.
    pub async fn disconnect(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let client_id = self.client_id.lock().expect("client id lock").clone();
        if let Some(client_id) = client_id {
            let payload = json!([{
                "channel": "/meta/disconnect",
                "clientId": client_id,
            }]);
            let _ = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("OAuth {}", self.access_token))
                .json(&payload)
                .send()
                .await;
        }
        debug!(channel = %self.config.channel, "streaming client disconnected");
    }
}

/// Owns the connect loop state so the loop can re-handshake independently of
/// the handle the adapter holds.
struct ConnectWorker {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    config: StreamingConfig,
    notices: mpsc::Sender<StreamingNotice>,
    client_id: Arc<Mutex<Option<String>>>,
    replay: Arc<AtomicI64>,
    shutdown: Arc<AtomicBool>,
    message_id: u64,
}

impl ConnectWorker {
    async fn post(&mut self, payload: serde_json::Value) -> Result<Vec<BayeuxMessage>> {
        self.message_id += 1;
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("OAuth {}", self.access_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Communication(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Communication(format!(
                "streaming endpoint answered {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::Communication(e.to_string()))?;
        serde_json::from_str(&body).map_err(Error::from)
    }

    async fn handshake(&mut self) -> Result<()> {
        let id = self.message_id + 1;
        let payload = json!([{
            "id": id.to_string(),
            "channel": "/meta/handshake",
            "version": "1.0",
            "supportedConnectionTypes": ["long-polling"],
        }]);
        let messages = self.post(payload).await?;
        let ack = messages
            .iter()
            .find(|m| m.channel == "/meta/handshake")
            .ok_or_else(|| Error::Communication("no handshake acknowledgement".to_string()))?;
        if ack.successful != Some(true) {
            return Err(Error::Communication(format!(
                "streaming handshake failed: {}",
                ack.error.as_deref().unwrap_or("unknown error")
            )));
        }
        let client_id = ack
            .client_id
            .clone()
            .ok_or_else(|| Error::Communication("handshake carried no client id".to_string()))?;
        *self.client_id.lock().expect("client id lock") = Some(client_id);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<()> {
        let client_id = self.current_client_id()?;
        let id = self.message_id + 1;
        let replay = self.replay.load(Ordering::SeqCst);
        let payload = json!([{
            "id": id.to_string(),
            "channel": "/meta/subscribe",
            "clientId": client_id,
            "subscription": self.config.channel,
            "ext": { "replay": { self.config.channel.clone(): replay } },
        }]);
        let messages = self.post(payload).await?;
        let ack = messages
            .iter()
            .find(|m| m.channel == "/meta/subscribe")
            .ok_or_else(|| Error::Communication("no subscribe acknowledgement".to_string()))?;
        if ack.successful != Some(true) {
            return Err(Error::Communication(format!(
                "streaming subscribe to {} failed: {}",
                self.config.channel,
                ack.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(())
    }

    fn current_client_id(&self) -> Result<String> {
        self.client_id
            .lock()
            .expect("client id lock")
            .clone()
            .ok_or_else(|| Error::Communication("streaming client has no client id".to_string()))
    }

    async fn run(&mut self) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match self.connect_once().await {
                Ok(true) => {}
                Ok(false) => self.reconnect().await,
                Err(err) => {
                    warn!(channel = %self.config.channel, %err, "streaming connect failed");
                    self.reconnect().await;
                }
            }
        }
        trace!(channel = %self.config.channel, "connect loop stopped");
    }

    /// One long-poll cycle. `Ok(false)` means the server revoked the session
    /// and a fresh handshake is required.
    async fn connect_once(&mut self) -> Result<bool> {
        let client_id = self.current_client_id()?;
        let id = self.message_id + 1;
        let payload = json!([{
            "id": id.to_string(),
            "channel": "/meta/connect",
            "clientId": client_id,
            "connectionType": "long-polling",
        }]);
        let messages = self.post(payload).await?;
        for message in messages {
            if message.channel == "/meta/connect" {
                if message.successful != Some(true) {
                    return Ok(false);
                }
            } else if message.channel == self.config.channel {
                self.deliver(message).await;
            }
        }
        Ok(true)
    }

    async fn deliver(&mut self, message: BayeuxMessage) {
        let Some(data) = message.data else {
            return;
        };
        match serde_json::from_value::<StreamMessage>(data) {
            Ok(stream_message) => {
                self.replay
                    .store(stream_message.event.replay_id, Ordering::SeqCst);
                trace!(
                    channel = %self.config.channel,
                    replay_id = stream_message.event.replay_id,
                    "streaming message received"
                );
                if self
                    .notices
                    .send(StreamingNotice::Message(stream_message))
                    .await
                    .is_err()
                {
                    // adapter gone, nothing left to deliver to
                    self.shutdown.store(true, Ordering::SeqCst);
                }
            }
            Err(err) => {
                warn!(channel = %self.config.channel, %err, "undecodable streaming message");
                let _ = self
                    .notices
                    .send(StreamingNotice::Error {
                        channel: self.config.channel.clone(),
                        reason: err.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Re-handshake with backoff until the channel is live again. Resumes
    /// from the last delivered replay position, so no events are lost as long
    /// as the server still retains them.
    async fn reconnect(&mut self) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let _ = self
            .notices
            .send(StreamingNotice::Disconnected {
                channel: self.config.channel.clone(),
            })
            .await;
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(
                self.config.reconnect_backoff_ms,
            ))
            .await;
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let restored = match self.handshake().await {
                Ok(()) => self.subscribe().await,
                Err(err) => Err(err),
            };
            match restored {
                Ok(()) => {
                    debug!(channel = %self.config.channel, "streaming channel restored");
                    let _ = self
                        .notices
                        .send(StreamingNotice::Connected {
                            channel: self.config.channel.clone(),
                        })
                        .await;
                    return;
                }
                Err(err) => {
                    warn!(channel = %self.config.channel, %err, "streaming reconnect failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> StreamingConfig {
        StreamingConfig {
            channel: "/systemTopic/DebuggerEvent".to_string(),
            timeout_ms: 1_000,
            reconnect_backoff_ms: 10,
        }
    }

    fn client_for(server: &MockServer, notices: mpsc::Sender<StreamingNotice>) -> StreamingClient {
        tether_logging::init_test();
        StreamingClient::new(
            reqwest::Client::new(),
            &server.uri(),
            "00D!token",
            test_config(),
            notices,
        )
    }

    #[tokio::test]
    async fn test_handshake_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cometd/62.0"))
            .and(body_string_contains("/meta/handshake"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"channel":"/meta/handshake","successful":false,"error":"403::Handshake denied"}]"#,
            ))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::channel(8);
        let mut client = client_for(&server, tx);
        let err = client.subscribe().await.unwrap_err();
        match err {
            Error::Communication(reason) => assert!(reason.contains("Handshake denied")),
            other => panic!("expected Communication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_sends_replay_all_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/handshake"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"channel":"/meta/handshake","successful":true,"clientId":"abc123"}]"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/subscribe"))
            .and(body_string_contains(r#""/systemTopic/DebuggerEvent":-2"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"channel":"/meta/subscribe","successful":true}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        // park the connect loop so the test can finish deterministically
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/connect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"channel":"/meta/connect","successful":true}]"#)
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::channel(8);
        let mut client = client_for(&server, tx);
        client.subscribe().await.unwrap();
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_delivers_channel_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/handshake"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"channel":"/meta/handshake","successful":true,"clientId":"abc123"}]"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/subscribe"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"channel":"/meta/subscribe","successful":true}]"#,
            ))
            .mount(&server)
            .await;
        let event = r#"[
            {"channel":"/meta/connect","successful":true},
            {"channel":"/systemTopic/DebuggerEvent","data":{
                "event":{"replayId":9},
                "sobject":{"Type":"RequestStarted","SessionId":"07aFAKE","RequestId":"07nFAKE"}
            }}
        ]"#;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/connect"))
            .respond_with(ResponseTemplate::new(200).set_body_string(event))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("/meta/connect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"channel":"/meta/connect","successful":true}]"#)
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let mut client = client_for(&server, tx);
        client.subscribe().await.unwrap();

        let notice = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for notice")
            .expect("notice channel closed");
        match notice {
            StreamingNotice::Message(msg) => {
                assert_eq!(msg.event.replay_id, 9);
                assert_eq!(msg.sobject.request_id.as_deref(), Some("07nFAKE"));
            }
            other => panic!("expected message notice, got {other:?}"),
        }
        client.disconnect().await;
    }
}
