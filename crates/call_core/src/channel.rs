use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use shared::{
    domain::CallId,
    protocol::{ChannelEvent, ChannelRequest},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{ChannelError, LiveUpdates, RECONNECT_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
    /// Waiting out the reconnect delay after a transport failure.
    Reconnecting,
}

struct ActiveConnection {
    commands: mpsc::UnboundedSender<ChannelRequest>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    task: JoinHandle<()>,
}

/// WebSocket subscription to the notifications feed.
///
/// A background task owns the socket. Any transport failure schedules one
/// reconnect after `reconnect_delay`, forever, until [`close`] is called.
/// Tracking handshakes are queued and only written once the socket is open;
/// after a reconnect the current tracked call is announced again.
///
/// [`close`]: LiveUpdateChannel::close
pub struct LiveUpdateChannel {
    url: String,
    reconnect_delay: Duration,
    state: Arc<watch::Sender<ChannelState>>,
    reconnects: Arc<AtomicU64>,
    tracked: Option<CallId>,
    active: Option<ActiveConnection>,
}

impl LiveUpdateChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_reconnect_delay(url, RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        Self {
            url: url.into(),
            reconnect_delay,
            state: Arc::new(state),
            reconnects: Arc::new(AtomicU64::new(0)),
            tracked: None,
            active: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tracked_call(&self) -> Option<&CallId> {
        self.tracked.as_ref()
    }

    /// Reconnects scheduled since the last `open`.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub async fn wait_until_open(&self) -> Result<(), ChannelError> {
        let mut state = self.state.subscribe();
        loop {
            match *state.borrow_and_update() {
                ChannelState::Open => return Ok(()),
                ChannelState::Closed => return Err(ChannelError::NotOpen),
                ChannelState::Connecting | ChannelState::Reconnecting => {}
            }
            if state.changed().await.is_err() {
                return Err(ChannelError::NotOpen);
            }
        }
    }
}

#[async_trait]
impl LiveUpdates for LiveUpdateChannel {
    fn open(&mut self) -> Result<(), ChannelError> {
        match Url::parse(&self.url) {
            Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => {}
            _ => return Err(ChannelError::InvalidUrl(self.url.clone())),
        }
        if self.active.is_some() {
            info!("closing existing live update channel before reopening");
            self.close();
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        // Fresh handles per connection: the previous task may outlive its abort.
        let (state, _) = watch::channel(ChannelState::Connecting);
        self.state = Arc::new(state);
        self.reconnects = Arc::new(AtomicU64::new(0));
        self.tracked = None;

        let task = tokio::spawn(run_connection(
            self.url.clone(),
            self.reconnect_delay,
            command_rx,
            event_tx,
            Arc::clone(&self.state),
            Arc::clone(&self.reconnects),
        ));
        self.active = Some(ActiveConnection {
            commands: command_tx,
            events: event_rx,
            task,
        });
        Ok(())
    }

    fn track(&mut self, call_id: &CallId) -> Result<(), ChannelError> {
        let active = self.active.as_ref().ok_or(ChannelError::NotOpen)?;
        active
            .commands
            .send(ChannelRequest::Start {
                transcription_id: call_id.clone(),
            })
            .map_err(|_| ChannelError::NotOpen)?;
        self.tracked = Some(call_id.clone());
        debug!(call_id = %call_id, "tracking call on live update channel");
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        let active = self.active.as_mut()?;
        active.events.recv().await
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            info!(url = %self.url, "live update channel closed");
        }
        self.tracked = None;
        self.state.send_replace(ChannelState::Closed);
    }

    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }
}

impl Drop for LiveUpdateChannel {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    mut commands: mpsc::UnboundedReceiver<ChannelRequest>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: Arc<watch::Sender<ChannelState>>,
    reconnects: Arc<AtomicU64>,
) {
    let mut tracked: Option<CallId> = None;
    loop {
        set_state(&state, ChannelState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!(url = %url, "live update channel open");
                let (mut writer, mut reader) = stream.split();

                // Handshakes requested while disconnected collapse to the latest.
                loop {
                    match commands.try_recv() {
                        Ok(ChannelRequest::Start { transcription_id }) => {
                            tracked = Some(transcription_id)
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => return,
                    }
                }
                set_state(&state, ChannelState::Open);

                let failure = 'session: {
                    if let Some(call_id) = &tracked {
                        let request = ChannelRequest::Start {
                            transcription_id: call_id.clone(),
                        };
                        if let Err(err) = send_request(&mut writer, &request).await {
                            break 'session err;
                        }
                    }
                    loop {
                        tokio::select! {
                            command = commands.recv() => match command {
                                Some(request) => {
                                    let ChannelRequest::Start { transcription_id } = &request;
                                    tracked = Some(transcription_id.clone());
                                    if let Err(err) = send_request(&mut writer, &request).await {
                                        break 'session err;
                                    }
                                }
                                None => {
                                    let _ = writer.close().await;
                                    return;
                                }
                            },
                            frame = reader.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<ChannelEvent>(&text) {
                                        Ok(event) => {
                                            if events.send(event).is_err() {
                                                return;
                                            }
                                        }
                                        Err(err) => {
                                            warn!(error = %err, "dropping malformed live update frame");
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    break 'session "closed by server".to_string();
                                }
                                Some(Ok(_)) => {}
                                Some(Err(err)) => break 'session err.to_string(),
                            },
                        }
                    }
                };
                warn!(url = %url, error = %failure, "live update channel dropped");
            }
            Err(err) => {
                warn!(url = %url, error = %err, "live update channel connect failed");
            }
        }

        set_state(&state, ChannelState::Reconnecting);
        let attempt = reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            attempt,
            delay_ms = reconnect_delay.as_millis() as u64,
            "retrying live update channel connection"
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Never overrides `Closed`.
fn set_state(state: &watch::Sender<ChannelState>, next: ChannelState) {
    state.send_if_modified(|current| {
        if *current == ChannelState::Closed || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

async fn send_request<S>(writer: &mut S, request: &ChannelRequest) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(request).map_err(|err| err.to_string())?;
    writer
        .send(Message::Text(text))
        .await
        .map_err(|err| err.to_string())
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
