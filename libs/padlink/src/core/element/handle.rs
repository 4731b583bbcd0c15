// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Element identity, mailbox handle and the bounded cross-element call.

use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use super::messages::ElementMessage;
use crate::core::error::CallError;

/// A validated element identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ElementId(String);

impl ElementId {
    /// Parse and validate an element id.
    pub fn from_string(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() {
            return Err("Element ID cannot be empty".to_string());
        }
        if !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(format!("Element ID '{}' contains invalid characters", s));
        }
        Ok(Self(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable address of a running element.
#[derive(Clone)]
pub struct ElementHandle {
    id: ElementId,
    mailbox: Sender<ElementMessage>,
}

impl ElementHandle {
    pub(crate) fn new(id: ElementId, mailbox: Sender<ElementMessage>) -> Self {
        Self { id, mailbox }
    }

    #[inline]
    pub fn id(&self) -> &ElementId {
        &self.id
    }

    /// Fire-and-forget delivery. Returns `false` if the element is gone.
    pub fn send(&self, message: ElementMessage) -> bool {
        self.mailbox.send(message).is_ok()
    }

    /// Send a request carrying a reply channel and wait for the answer.
    ///
    /// A closed mailbox fails immediately. A dropped reply channel means the
    /// peer died while handling the request.
    pub fn call<T>(
        &self,
        request: impl FnOnce(Sender<T>) -> ElementMessage,
        timeout: Duration,
    ) -> Result<T, CallError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        if self.mailbox.send(request(reply_tx)).is_err() {
            return Err(CallError::CallFailure(format!(
                "element {} is not running",
                self.id
            )));
        }

        match reply_rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Disconnected) => Err(CallError::ChildDead(format!(
                "element {} exited before replying",
                self.id
            ))),
            Err(RecvTimeoutError::Timeout) => Err(CallError::CallFailure(format!(
                "element {} did not reply within {:?}",
                self.id, timeout
            ))),
        }
    }
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ElementHandle, crossbeam_channel::Receiver<ElementMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            ElementHandle::new(ElementId::from_string("peer").unwrap(), tx),
            rx,
        )
    }

    #[test]
    fn test_element_id_validation() {
        assert!(ElementId::from_string("source-1").is_ok());
        assert!(ElementId::from_string("").is_err());
        assert!(ElementId::from_string("bad id").is_err());
    }

    #[test]
    fn test_call_to_closed_mailbox_fails_immediately() {
        let (handle, rx) = handle();
        drop(rx);

        let result = handle.call(
            |reply| ElementMessage::Inspect { reply },
            Duration::from_secs(10),
        );
        assert!(matches!(result, Err(CallError::CallFailure(_))));
    }

    #[test]
    fn test_call_dropped_reply_is_child_dead() {
        let (handle, rx) = handle();
        let peer = std::thread::spawn(move || {
            // Accept the request, then die without answering.
            let message = rx.recv().unwrap();
            drop(message);
        });

        let result = handle.call(
            |reply| ElementMessage::Inspect { reply },
            Duration::from_secs(10),
        );
        peer.join().unwrap();
        assert!(matches!(result, Err(CallError::ChildDead(_))));
    }

    #[test]
    fn test_call_timeout() {
        let (handle, _rx) = handle();
        let result = handle.call(
            |reply| ElementMessage::Inspect { reply },
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(CallError::CallFailure(_))));
    }
}
