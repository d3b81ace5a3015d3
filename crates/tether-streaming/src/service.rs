//! Channel pair and replay dedupe for one debug session
//!
//! A session listens on two channels: the system topic (session lifecycle,
//! warnings) and the user topic (request start/stop/finish). Both feed the
//! same notice channel. Because a reconnect replays retained events, the
//! service also keeps the highest processed replay position per event kind
//! so the adapter can discard anything it has already acted on.

use crate::client::{StreamingClient, StreamingConfig, StreamingNotice};
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use tether_config::{WorkspaceSettings, SYSTEM_EVENT_CHANNEL, USER_EVENT_CHANNEL};
use tether_core::{ConnectionInfo, DebuggerEventType, Error, Result};
use tokio::sync::mpsc;
use tracing::info;

pub struct StreamingService {
    system: StreamingClient,
    user: StreamingClient,
    processed: HashMap<DebuggerEventType, i64>,
    ready: bool,
}

impl StreamingService {
    pub fn new(
        connection: &ConnectionInfo,
        settings: &WorkspaceSettings,
        notices: mpsc::Sender<StreamingNotice>,
    ) -> Result<Self> {
        let system_config = StreamingConfig::for_channel(SYSTEM_EVENT_CHANNEL);
        let user_config = StreamingConfig::for_channel(USER_EVENT_CHANNEL);
        let client = build_http_client(settings, system_config.timeout_ms)?;
        Ok(Self {
            system: StreamingClient::new(
                client.clone(),
                &connection.instance_url,
                &connection.access_token,
                system_config,
                notices.clone(),
            ),
            user: StreamingClient::new(
                client,
                &connection.instance_url,
                &connection.access_token,
                user_config,
                notices,
            ),
            processed: HashMap::new(),
            ready: false,
        })
    }

    /// Subscribe both channels. True only when every channel is connected;
    /// either failure aborts the launch, since the caller must not create a
    /// session record without live subscriptions.
    pub async fn subscribe(&mut self) -> Result<bool> {
        self.system.subscribe().await?;
        self.user.subscribe().await?;
        self.ready = true;
        info!("streaming subscriptions ready");
        Ok(true)
    }

    pub async fn disconnect(&mut self) {
        if !self.ready {
            return;
        }
        self.system.disconnect().await;
        self.user.disconnect().await;
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether an event at `replay_id` was already processed for this kind.
    /// Positions at or below the recorded high-water mark are duplicates.
    pub fn has_processed(&self, event_type: DebuggerEventType, replay_id: i64) -> bool {
        self.processed
            .get(&event_type)
            .is_some_and(|last| replay_id <= *last)
    }

    pub fn mark_processed(&mut self, event_type: DebuggerEventType, replay_id: i64) {
        let entry = self.processed.entry(event_type).or_insert(replay_id);
        if replay_id > *entry {
            *entry = replay_id;
        }
    }
}

fn build_http_client(settings: &WorkspaceSettings, timeout_ms: u64) -> Result<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().timeout(std::time::Duration::from_millis(timeout_ms));
    if let Some(proxy_url) = &settings.proxy_url {
        let mut proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| Error::Communication(format!("Invalid proxy url: {e}")))?;
        if let Some(auth) = &settings.proxy_auth {
            let value = HeaderValue::from_str(auth)
                .map_err(|e| Error::Communication(format!("Invalid proxy authorization: {e}")))?;
            proxy = proxy.custom_http_auth(value);
        }
        builder = builder.proxy(proxy);
        if !settings.proxy_strict_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }
    builder
        .build()
        .map_err(|e| Error::Communication(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> StreamingService {
        let (tx, _rx) = mpsc::channel(8);
        StreamingService::new(
            &ConnectionInfo {
                instance_url: "https://org.example.com".to_string(),
                access_token: "00D!token".to_string(),
            },
            &WorkspaceSettings::default(),
            tx,
        )
        .unwrap()
    }

    #[test]
    fn test_unseen_event_is_not_processed() {
        let service = service();
        assert!(!service.has_processed(DebuggerEventType::Stopped, 1));
    }

    #[test]
    fn test_replay_at_or_below_mark_is_duplicate() {
        let mut service = service();
        service.mark_processed(DebuggerEventType::Stopped, 10);
        assert!(service.has_processed(DebuggerEventType::Stopped, 9));
        assert!(service.has_processed(DebuggerEventType::Stopped, 10));
        assert!(!service.has_processed(DebuggerEventType::Stopped, 11));
    }

    #[test]
    fn test_marks_are_tracked_per_event_kind() {
        let mut service = service();
        service.mark_processed(DebuggerEventType::Stopped, 10);
        assert!(!service.has_processed(DebuggerEventType::RequestStarted, 10));
    }

    #[test]
    fn test_mark_never_moves_backwards() {
        let mut service = service();
        service.mark_processed(DebuggerEventType::Resumed, 10);
        service.mark_processed(DebuggerEventType::Resumed, 4);
        assert!(service.has_processed(DebuggerEventType::Resumed, 10));
        assert!(!service.has_processed(DebuggerEventType::Resumed, 11));
    }

    #[test]
    fn test_not_ready_before_subscribe() {
        let service = service();
        assert!(!service.is_ready());
    }
}
