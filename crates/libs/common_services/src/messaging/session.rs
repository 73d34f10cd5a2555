use crate::messaging::{
    Backoff, ChatSender, ChatTransport, DisconnectReason, FileCredentialStore, MessagingError,
    TransportEvent, TransportLink,
};
use app_state::BackoffSettings;
use common_types::ContactHandle;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// Where the chat session currently is. Only `Connected` accepts sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    /// Waiting for the operator to accept the challenge on their device.
    Pairing { challenge: Option<String> },
    Connected,
    /// Dropped; a reconnect is scheduled.
    Disconnected { reason: String },
    /// Logged out remotely. Nothing happens until fresh pairing is requested.
    LoggedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Pairing { .. } => write!(f, "pairing"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected { reason } => write!(f, "disconnected ({reason})"),
            Self::LoggedOut => write!(f, "logged out"),
        }
    }
}

enum Outcome {
    Stopped,
    LoggedOut,
    /// Stored credentials were refused before the link ever opened.
    Rejected,
    Lost(String),
}

/// The one long-lived connection to the chat network.
///
/// Owns pairing, credential persistence and reconnection. [`MessagingSession::start`]
/// spawns the connection loop and [`MessagingSession::stop`] ends it.
pub struct MessagingSession {
    transport: Arc<dyn ChatTransport>,
    credentials: FileCredentialStore,
    backoff: BackoffSettings,
    state: watch::Sender<SessionState>,
    /// Sends take this lock in submission order, one at a time.
    send_lane: Mutex<Option<Arc<dyn ChatSender>>>,
    pairing_requested: Notify,
    worker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl MessagingSession {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        credentials: FileCredentialStore,
        backoff: BackoffSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            transport,
            credentials,
            backoff,
            state,
            send_lane: Mutex::new(None),
            pairing_requested: Notify::new(),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Spawns the connection loop. Does nothing when it is already running.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
        {
            return;
        }
        info!("Starting messaging session");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run(cancel.clone()));
        *worker = Some((cancel, handle));
    }

    /// Stops the connection loop and waits for it to wind down.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some((cancel, handle)) = worker {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!("Messaging session task ended abnormally: {e}");
            }
        }
    }

    /// Leaves `LoggedOut` and starts a fresh pairing. Returns `false` in any other state.
    pub fn request_pairing(&self) -> bool {
        if self.state() == SessionState::LoggedOut {
            self.pairing_requested.notify_one();
            true
        } else {
            false
        }
    }

    /// Sends one message. Fails right away when the session is not connected.
    pub async fn send(&self, to: &ContactHandle, text: &str) -> Result<(), MessagingError> {
        let state = self.state();
        if state != SessionState::Connected {
            return Err(MessagingError::NotConnected(state));
        }
        let lane = self.send_lane.lock().await;
        let Some(sender) = lane.as_ref() else {
            return Err(MessagingError::NotConnected(self.state()));
        };
        sender.send_text(to.as_str(), text).await?;
        debug!("Sent message to {to}");
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        debug!("Messaging session is now {state}");
        self.state.send_replace(state);
    }

    async fn close_lane(&self) {
        self.send_lane.lock().await.take();
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.backoff);
        loop {
            let stored = self.credentials.load().await;
            let resuming = stored.is_some();
            if !resuming {
                self.set_state(SessionState::Pairing { challenge: None });
            }

            let outcome = select! {
                () = cancel.cancelled() => Outcome::Stopped,
                connected = self.transport.connect(stored) => match connected {
                    Ok(link) => self.drive(link, resuming, &mut backoff, &cancel).await,
                    Err(e) => Outcome::Lost(e.to_string()),
                },
            };
            self.close_lane().await;

            match outcome {
                Outcome::Stopped => break,
                Outcome::Rejected => {
                    warn!("Stored messaging credentials were rejected; starting a fresh pairing");
                    if let Err(e) = self.credentials.clear().await {
                        error!("Could not remove stale messaging credentials: {e}");
                        // Resuming again would only be refused the same way.
                        self.set_state(SessionState::Disconnected {
                            reason: "stale credentials could not be removed".to_owned(),
                        });
                        select! {
                            () = cancel.cancelled() => break,
                            () = time::sleep(backoff.next_delay()) => {}
                        }
                    }
                }
                Outcome::LoggedOut => {
                    if let Err(e) = self.credentials.clear().await {
                        error!("Could not remove stale messaging credentials: {e}");
                    }
                    self.set_state(SessionState::LoggedOut);
                    warn!("Messaging account was logged out; waiting for a pairing request");
                    select! {
                        () = cancel.cancelled() => break,
                        () = self.pairing_requested.notified() => {}
                    }
                    backoff.reset();
                }
                Outcome::Lost(reason) => {
                    let delay = backoff.next_delay();
                    warn!("Messaging connection lost ({reason}), reconnecting in {delay:?}");
                    self.set_state(SessionState::Disconnected { reason });
                    select! {
                        () = cancel.cancelled() => break,
                        () = time::sleep(delay) => {}
                    }
                }
            }
        }
        self.set_state(SessionState::Disconnected {
            reason: "session stopped".to_owned(),
        });
        info!("Messaging session stopped");
    }

    /// Follows one connection until it ends.
    async fn drive(
        &self,
        mut link: TransportLink,
        resumed: bool,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> Outcome {
        // A session may only count as connected once it can survive a restart.
        let mut persisted = resumed;
        let mut opened = false;
        loop {
            let event = select! {
                () = cancel.cancelled() => return Outcome::Stopped,
                event = link.events.recv() => event,
            };
            match event {
                Some(TransportEvent::PairingChallenge(challenge)) => {
                    info!("New pairing challenge issued");
                    self.set_state(SessionState::Pairing {
                        challenge: Some(challenge),
                    });
                }
                Some(TransportEvent::CredentialsUpdated(credentials)) => {
                    match self.credentials.save(&credentials).await {
                        Ok(()) => persisted = true,
                        Err(e) => error!("Could not persist messaging credentials: {e}"),
                    }
                }
                Some(TransportEvent::Open) => {
                    if !persisted {
                        return Outcome::Lost("credentials were not persisted".to_owned());
                    }
                    *self.send_lane.lock().await = Some(Arc::clone(&link.sender));
                    opened = true;
                    backoff.reset();
                    self.set_state(SessionState::Connected);
                    info!("Messaging session connected");
                }
                Some(TransportEvent::Closed(DisconnectReason::LoggedOut)) => {
                    return if resumed && !opened {
                        Outcome::Rejected
                    } else {
                        Outcome::LoggedOut
                    };
                }
                Some(TransportEvent::Closed(DisconnectReason::ConnectionLost(reason))) => {
                    self.set_state(SessionState::Disconnected {
                        reason: reason.clone(),
                    });
                    return Outcome::Lost(reason);
                }
                None => return Outcome::Lost("transport closed".to_owned()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{Credentials, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tokio::sync::mpsc;

    type Sent = Arc<std::sync::Mutex<Vec<(String, String)>>>;

    struct RecordingSender(Sent);

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
            self.0
                .lock()
                .expect("not poisoned")
                .push((to.to_owned(), text.to_owned()));
            Ok(())
        }
    }

    /// Hands every connection attempt to the test, which then plays the network.
    struct ScriptedTransport {
        attempts: mpsc::UnboundedSender<(Option<Credentials>, mpsc::Sender<TransportEvent>)>,
        sent: Sent,
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn connect(
            &self,
            credentials: Option<Credentials>,
        ) -> Result<TransportLink, TransportError> {
            let (events_tx, events) = mpsc::channel(8);
            self.attempts
                .send((credentials, events_tx))
                .map_err(|_| TransportError::Closed)?;
            Ok(TransportLink {
                events,
                sender: Arc::new(RecordingSender(Arc::clone(&self.sent))),
            })
        }
    }

    struct Harness {
        session: Arc<MessagingSession>,
        attempts: mpsc::UnboundedReceiver<(Option<Credentials>, mpsc::Sender<TransportEvent>)>,
        sent: Sent,
        credentials: FileCredentialStore,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().expect("tempdir");
        let (attempts_tx, attempts) = mpsc::unbounded_channel();
        let sent = Sent::default();
        let credentials = FileCredentialStore::new(dir.path().join("creds.json"));
        let session = Arc::new(MessagingSession::new(
            Arc::new(ScriptedTransport {
                attempts: attempts_tx,
                sent: Arc::clone(&sent),
            }),
            credentials.clone(),
            BackoffSettings {
                initial_ms: 1,
                max_ms: 5,
                multiplier: 2.0,
            },
        ));
        Harness {
            session,
            attempts,
            sent,
            credentials,
            _dir: dir,
        }
    }

    async fn wait_for(session: &MessagingSession, wanted: impl Fn(&SessionState) -> bool) {
        let mut rx = session.subscribe();
        time::timeout(Duration::from_secs(5), rx.wait_for(|s| wanted(s)))
            .await
            .expect("state reached in time")
            .expect("session alive");
    }

    fn guest() -> ContactHandle {
        ContactHandle::parse("+31 6 1234 5678").expect("valid")
    }

    async fn pair(h: &mut Harness) -> mpsc::Sender<TransportEvent> {
        let (credentials, events) = h.attempts.recv().await.expect("connect attempt");
        assert!(credentials.is_none());
        events
            .send(TransportEvent::PairingChallenge("2@abc".into()))
            .await
            .expect("live");
        wait_for(&h.session, |s| {
            *s == SessionState::Pairing {
                challenge: Some("2@abc".into()),
            }
        })
        .await;
        events
            .send(TransportEvent::CredentialsUpdated(json!({"token": "t1"})))
            .await
            .expect("live");
        events.send(TransportEvent::Open).await.expect("live");
        wait_for(&h.session, |s| *s == SessionState::Connected).await;
        events
    }

    #[tokio::test]
    async fn pairs_persists_and_sends() {
        let mut h = harness();
        h.session.start().await;
        let _events = pair(&mut h).await;

        assert_eq!(h.credentials.load().await, Some(json!({"token": "t1"})));
        h.session.send(&guest(), "hello").await.expect("connected");
        assert_eq!(
            h.sent.lock().expect("not poisoned").as_slice(),
            &[("31612345678".to_owned(), "hello".to_owned())]
        );
        h.session.stop().await;
    }

    #[tokio::test]
    async fn send_fails_fast_when_not_connected() {
        let h = harness();
        let err = h.session.send(&guest(), "hi").await.expect_err("idle");
        assert!(matches!(
            err,
            MessagingError::NotConnected(SessionState::Uninitialized)
        ));
    }

    #[tokio::test]
    async fn open_without_persisted_credentials_is_refused() {
        let mut h = harness();
        h.session.start().await;
        let (_, events) = h.attempts.recv().await.expect("connect attempt");
        events.send(TransportEvent::Open).await.expect("live");

        // The loop drops the connection and tries again instead of going live.
        let (credentials, _events) = h.attempts.recv().await.expect("second attempt");
        assert!(credentials.is_none());
        assert_ne!(h.session.state(), SessionState::Connected);
        h.session.stop().await;
    }

    #[tokio::test]
    async fn reconnects_with_stored_credentials_after_a_drop() {
        let mut h = harness();
        h.session.start().await;
        let events = pair(&mut h).await;

        events
            .send(TransportEvent::Closed(DisconnectReason::ConnectionLost(
                "socket reset".into(),
            )))
            .await
            .expect("live");
        let (credentials, events) = h.attempts.recv().await.expect("reconnect");
        assert_eq!(credentials, Some(json!({"token": "t1"})));

        events.send(TransportEvent::Open).await.expect("live");
        wait_for(&h.session, |s| *s == SessionState::Connected).await;
        h.session.stop().await;
    }

    #[tokio::test]
    async fn logout_is_terminal_until_pairing_is_requested() {
        let mut h = harness();
        assert!(!h.session.request_pairing());
        h.session.start().await;
        let events = pair(&mut h).await;

        events
            .send(TransportEvent::Closed(DisconnectReason::LoggedOut))
            .await
            .expect("live");
        wait_for(&h.session, |s| *s == SessionState::LoggedOut).await;
        assert!(h.credentials.load().await.is_none());
        time::sleep(Duration::from_millis(50)).await;
        assert!(h.attempts.try_recv().is_err(), "no automatic retry");

        assert!(h.session.request_pairing());
        let (credentials, _events) = h.attempts.recv().await.expect("fresh pairing");
        assert!(credentials.is_none());
        h.session.stop().await;
    }

    #[tokio::test]
    async fn rejected_stored_credentials_fall_back_to_pairing() {
        let mut h = harness();
        h.credentials
            .save(&json!({"token": "stale"}))
            .await
            .expect("saved");
        h.session.start().await;

        let (credentials, events) = h.attempts.recv().await.expect("resume attempt");
        assert_eq!(credentials, Some(json!({"token": "stale"})));
        events
            .send(TransportEvent::Closed(DisconnectReason::LoggedOut))
            .await
            .expect("live");

        let (credentials, events) = time::timeout(Duration::from_secs(5), h.attempts.recv())
            .await
            .expect("pairing attempt in time")
            .expect("pairing attempt");
        assert!(credentials.is_none());
        assert!(h.credentials.load().await.is_none());
        events
            .send(TransportEvent::PairingChallenge("2@fresh".into()))
            .await
            .expect("live");
        wait_for(&h.session, |s| {
            *s == SessionState::Pairing {
                challenge: Some("2@fresh".into()),
            }
        })
        .await;
        assert_ne!(h.session.state(), SessionState::LoggedOut);
        h.session.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let mut h = harness();
        h.session.start().await;
        let _events = pair(&mut h).await;

        h.session.stop().await;
        assert!(matches!(
            h.session.state(),
            SessionState::Disconnected { .. }
        ));
        assert!(h.session.send(&guest(), "late").await.is_err());
    }
}
