//! Unlock request handling for an external transport.
//!
//! The transport (an HTTP endpoint, say) deserializes the request body
//! into an `UnlockRequest` and calls `handle_unlock`. On success every
//! subscriber of the `Notifier` receives an `UnlockedEvent`; the event
//! carries no key material and nobody waits for it to be delivered.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::crypto::Primitives;
use crate::errors::Result;
use crate::infofile::InfoFile;
use crate::keys::{self, Unlocked};
use crate::prompt::StoredPassphrase;

/// Body of an unlock request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UnlockRequest {
    Passphrase { passphrase: String },
}

/// Response body for a successful unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockResponse {
    /// Display form of the factor that worked.
    pub factor: String,
}

/// Notification published after a successful unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedEvent {
    pub message: String,
}

impl UnlockedEvent {
    pub fn unlocked() -> Self {
        Self {
            message: "unlocked".to_string(),
        }
    }
}

/// Channel capacity for pending notifications per subscriber.
const EVENT_CAPACITY: usize = 16;

/// Fan-out of unlock notifications to interested listeners.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<UnlockedEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnlockedEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no listeners is fine.
    pub fn publish(&self, event: UnlockedEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Run an unlock for a transport request.
///
/// Returns the unlocked master key to the in-process caller together
/// with the response body to send back.
pub fn handle_unlock(
    info: &InfoFile,
    request: UnlockRequest,
    primitives: &dyn Primitives,
    notifier: &Notifier,
) -> Result<(Unlocked, UnlockResponse)> {
    let UnlockRequest::Passphrase { passphrase } = request;
    let mut source = StoredPassphrase::new(passphrase);

    let unlocked = keys::unlock(info, primitives, &mut source)?;

    notifier.publish(UnlockedEvent::unlocked());
    tracing::info!("repository unlocked by request");

    let response = UnlockResponse {
        factor: unlocked.factor_id.to_string(),
    };
    Ok((unlocked, response))
}
