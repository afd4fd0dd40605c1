//! Live update listener: the push channel that keeps caches fresh between
//! explicit user actions.
//!
//! One websocket subscription per session, keyed to the current user's id.
//! The connection task only forwards decoded events over a channel; applying
//! them (`Store::handle_event`) happens on the store owner's task, so the
//! store needs no locking. Detach aborts the old task before any re-attach,
//! which is what prevents duplicate handlers across re-subscriptions.

use crate::gateway::Gateway;
use crate::loader::Collection;
use crate::normalize::decode;
use crate::store::Store;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use pengu_proto::{ClientMessage, ServerEvent};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// A running push-channel subscription. Attached on session start, detached
/// on logout or user change.
pub struct LiveListener {
    rx: UnboundedReceiver<ServerEvent>,
    handle: JoinHandle<()>,
}

impl LiveListener {
    /// Subscribe for the given user. Returns `None` without a user id, since
    /// the listener has nothing to key the subscription to.
    pub fn spawn(events_url: &str, user_id: Option<&str>, token: Option<&str>) -> Option<Self> {
        let user_id = user_id?.to_string();
        let url = events_url.to_string();
        let token = token.map(str::to_string);

        let (tx, rx) = unbounded_channel();
        let handle = tokio::spawn(run_listener(url, user_id, token, tx));

        Some(Self { rx, handle })
    }

    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Tear the subscription down. Must run before any re-attachment.
    pub fn detach(self) {
        self.handle.abort();
    }
}

impl Drop for LiveListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_listener(
    url: String,
    user_id: String,
    token: Option<String>,
    tx: UnboundedSender<ServerEvent>,
) {
    loop {
        if let Err(e) = listen_once(&url, &user_id, token.as_deref(), &tx).await {
            log::warn!("push channel listener error: {e:#}");
        }
        if tx.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn listen_once(
    url: &str,
    user_id: &str,
    token: Option<&str>,
    tx: &UnboundedSender<ServerEvent>,
) -> Result<()> {
    let mut request = url
        .into_client_request()
        .context("Failed to create push channel request")?;
    if let Some(token) = token {
        request
            .headers_mut()
            .insert(AUTHORIZATION, format!("Bearer {}", token).parse()?);
    }

    let (ws, _) = connect_async(request)
        .await
        .context("Failed to connect to push channel")?;
    let (mut write, mut read) = ws.split();

    let subscribe = ClientMessage::Subscribe {
        user_id: user_id.to_string(),
    };
    write
        .send(Message::Text(
            serde_json::to_string(&subscribe).context("Failed to serialize subscribe")?,
        ))
        .await
        .context("Failed to send subscribe")?;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        // Receiver detached; stop quietly.
                        return Ok(());
                    }
                }
                Err(e) => log::debug!("ignoring unrecognized push payload: {e}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("push channel websocket error: {e}");
                break;
            }
        }
    }

    Ok(())
}

impl<G: Gateway> Store<G> {
    /// Apply one pushed event: re-fetch the affected collection wholesale in
    /// its role-scoped form and show a role-appropriate notice.
    ///
    /// `notification_created` is the deliberate exception: its payload is
    /// the complete record, so it is normalized and prepended directly with
    /// no network round-trip.
    pub async fn handle_event(&mut self, event: ServerEvent) {
        let topic = event.topic().map(str::to_string);

        match event {
            ServerEvent::NotificationCreated(payload) => {
                match decode::<crate::models::Notification>(payload) {
                    Ok(notification) => {
                        self.notices
                            .info(format!("New notification: {}", notification.title));
                        self.notifications.insert(0, notification);
                    }
                    Err(e) => log::warn!("pushed notification did not decode: {e}"),
                }
            }
            ServerEvent::MessageReceived(_) => {
                self.refetch(Collection::Messages).await;
                self.notices.info(match topic {
                    Some(topic) => format!("New message: {topic}"),
                    None => "New message".to_string(),
                });
            }
            ServerEvent::RequestUpdated(_) => {
                self.refetch(Collection::Requests).await;
                self.role_notice(
                    "A service request changed",
                    "An open request changed",
                    "Your request was updated",
                );
            }
            ServerEvent::OrderUpdated(_) => {
                self.refetch(Collection::Orders).await;
                self.role_notice(
                    "An order changed",
                    "One of your orders changed",
                    "Your order was updated",
                );
            }
            ServerEvent::WithdrawalUpdated(_) => {
                self.refetch(Collection::Withdrawals).await;
                self.role_notice(
                    "A withdrawal changed",
                    "Your withdrawal was updated",
                    "Your withdrawal was updated",
                );
            }
            ServerEvent::QuoteUpdated(_) => {
                self.refetch(Collection::Quotes).await;
                self.role_notice(
                    "A quote changed",
                    "A quote you sent changed",
                    "You have quote activity",
                );
            }
            ServerEvent::ReviewCreated(_) => {
                self.refetch(Collection::Reviews).await;
                self.role_notice(
                    "A review was posted",
                    "You received a review",
                    "Your review was posted",
                );
            }
            ServerEvent::ExpertUpdated(_) => {
                self.refetch(Collection::Experts).await;
                self.notices.info("Expert directory updated");
            }
            ServerEvent::TransactionCreated(_) => {
                self.refetch(Collection::Transactions).await;
                self.role_notice(
                    "A transaction was recorded",
                    "You have a new transaction",
                    "You have a new transaction",
                );
            }
        }
    }
}
