//! Host-facing adapter for running inside a sandboxed module.
//!
//! In a sandbox the crate is reachable only through a fixed namespace
//! of named entry points. This module maps host values (JSON records,
//! byte buffers as base64 strings) onto domain calls and back, and runs
//! the service loop that keeps the module resident until the host shuts
//! it down.
//!
//! The service holds no session state: a master key the host wants to
//! reuse is passed back in with every call.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

use crate::crypto::MasterKey;
use crate::errors::{RepoKeyError, Result};

/// Name under which the entry points are exposed to the host.
pub const NAMESPACE: &str = "Repokey";

/// Decrypt one file of the repository.
pub const DECRYPT_REQUEST: &str = "decryptRequest";

/// Open the repository index.
pub const GET_INDEX: &str = "getIndex";

/// Every entry point, in registration order.
pub const ENTRY_POINTS: [&str; 2] = [DECRYPT_REQUEST, GET_INDEX];

/// A request to decrypt one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    pub file_id: String,
}

/// Opaque handle to an opened index, owned by the content engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHandle(pub u64);

/// The bulk content engine the entry points delegate to.
pub trait RepositoryContent: Send + Sync {
    fn decrypt_request(&self, master_key: &MasterKey, request: &DecryptRequest) -> Result<Vec<u8>>;
    fn get_index(&self, master_key: &MasterKey) -> Result<IndexHandle>;
}

/// Error record handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostError {
    pub kind: &'static str,
    pub message: &'static str,
}

impl From<&RepoKeyError> for HostError {
    fn from(err: &RepoKeyError) -> Self {
        Self {
            kind: err.kind().as_str(),
            message: err.user_message(),
        }
    }
}

/// One call from the host, with the slot its answer goes into.
pub struct HostCall {
    pub entry_point: String,
    pub args: Value,
    pub reply: oneshot::Sender<std::result::Result<Value, HostError>>,
}

/// The exported service object.
pub struct SandboxService<C> {
    content: C,
}

impl<C: RepositoryContent> SandboxService<C> {
    pub fn new(content: C) -> Self {
        Self { content }
    }

    /// Dispatch one entry point call.
    pub fn call(&self, entry_point: &str, args: &Value) -> std::result::Result<Value, HostError> {
        let result = match entry_point {
            DECRYPT_REQUEST => self.decrypt_request(args),
            GET_INDEX => self.get_index(args),
            other => Err(RepoKeyError::CommandFailed(format!(
                "unknown entry point '{NAMESPACE}.{other}'"
            ))),
        };

        result.map_err(|e| {
            tracing::debug!(entry_point, error = %e, "entry point failed");
            HostError::from(&e)
        })
    }

    fn decrypt_request(&self, args: &Value) -> Result<Value> {
        let master_key = master_key_arg(args)?;
        let file_id = str_arg(args, "fileId")?;

        let data = self.content.decrypt_request(
            &master_key,
            &DecryptRequest {
                file_id: file_id.to_string(),
            },
        )?;

        Ok(json!({ "data": BASE64.encode(data) }))
    }

    fn get_index(&self, args: &Value) -> Result<Value> {
        let master_key = master_key_arg(args)?;
        let IndexHandle(handle) = self.content.get_index(&master_key)?;
        Ok(json!({ "handle": handle }))
    }

    /// Serve host calls until the host signals shutdown.
    ///
    /// The loop does not end when the call channel closes; only the
    /// shutdown signal (or dropping its sender) stops it.
    pub async fn serve(
        self,
        mut calls: mpsc::Receiver<HostCall>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        tracing::info!(namespace = NAMESPACE, entry_points = ?ENTRY_POINTS, "sandbox service ready");

        let mut accepting = true;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                call = calls.recv(), if accepting => match call {
                    Some(call) => {
                        let result = self.call(&call.entry_point, &call.args);
                        // The host may have stopped waiting for the answer.
                        let _ = call.reply.send(result);
                    }
                    None => {
                        tracing::debug!("host call channel closed, waiting for shutdown");
                        accepting = false;
                    }
                },
            }
        }

        tracing::info!(namespace = NAMESPACE, "sandbox service stopped");
    }
}

fn str_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| RepoKeyError::CommandFailed(format!("missing string argument '{name}'")))
}

fn master_key_arg(args: &Value) -> Result<MasterKey> {
    let encoded = str_arg(args, "masterKey")?;
    let bytes = Zeroizing::new(
        BASE64
            .decode(encoded)
            .map_err(|_| RepoKeyError::CommandFailed("masterKey is not base64".into()))?,
    );
    MasterKey::from_slice(&bytes)
}
