//! Per-device session registry
//!
//! One entry per device id, bound to the connection currently speaking
//! for that device. The registry is shared between the TCP connection
//! handlers (which create entries and drive the
//! registered/authenticated state) and the HTTP control plane (which
//! looks up a live connection to push command frames). It is handed to
//! both as an explicit handle, never ambient state.
//!
//! A device must be registered before it can authenticate; telemetry
//! handling consults both flags. Entries die with their connection: the
//! connection driver removes everything bound to it when the socket
//! closes, and a logout clears the entry immediately.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        RwLock,
    },
};

use tokio::sync::mpsc;

use crate::types::DeviceId;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("device {device_id} has no live connection")]
    NotConnected { device_id: DeviceId },

    #[error("outbound queue for device {device_id} is closed or full")]
    QueueUnavailable { device_id: DeviceId },
}

#[derive(Debug)]
struct Session {
    connection_id: usize,
    registered: bool,
    authenticated: bool,
    next_sequence: u16,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// Shared device-id-keyed session table. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct Sessions {
    inner: Arc<RwLock<HashMap<DeviceId, Session>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a device id to its current connection, creating the entry
    /// on first contact. Rebinding to a new connection keeps the
    /// registered/authenticated flags; they are lost only when the
    /// owning connection closes or the terminal logs out.
    pub fn bind(
        &self,
        device_id: DeviceId,
        connection_id: usize,
        outbound: mpsc::Sender<Vec<u8>>,
    ) {
        let mut sessions = self.inner.write().expect("sessions lock poisoned");

        match sessions.get_mut(&device_id) {
            Some(session) => {
                session.connection_id = connection_id;
                session.outbound = outbound;
            }
            None => {
                sessions.insert(
                    device_id,
                    Session {
                        connection_id,
                        registered: false,
                        authenticated: false,
                        next_sequence: 1,
                        outbound,
                    },
                );
            }
        }
    }

    pub fn is_registered(&self, device_id: DeviceId) -> bool {
        self.inner
            .read()
            .expect("sessions lock poisoned")
            .get(&device_id)
            .map(|session| session.registered)
            .unwrap_or(false)
    }

    pub fn is_authenticated(&self, device_id: DeviceId) -> bool {
        self.inner
            .read()
            .expect("sessions lock poisoned")
            .get(&device_id)
            .map(|session| session.authenticated)
            .unwrap_or(false)
    }

    pub fn mark_registered(&self, device_id: DeviceId) {
        let mut sessions = self.inner.write().expect("sessions lock poisoned");
        if let Some(session) = sessions.get_mut(&device_id) {
            session.registered = true;
        }
    }

    /// Marks the device authenticated. Fails silently if the device
    /// never registered; callers gate on [`is_registered`][Self::is_registered].
    pub fn mark_authenticated(&self, device_id: DeviceId) {
        let mut sessions = self.inner.write().expect("sessions lock poisoned");
        if let Some(session) = sessions.get_mut(&device_id) {
            if session.registered {
                session.authenticated = true;
            }
        }
    }

    /// Removes one device's session (terminal logout).
    pub fn clear(&self, device_id: DeviceId) {
        self.inner
            .write()
            .expect("sessions lock poisoned")
            .remove(&device_id);
    }

    /// Removes every session bound to a closed connection.
    pub fn remove_connection(&self, connection_id: usize) {
        self.inner
            .write()
            .expect("sessions lock poisoned")
            .retain(|_, session| session.connection_id != connection_id);
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("sessions lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds and queues a command frame for a connected device. The
    /// builder receives the per-device sequence number assigned to this
    /// command.
    pub fn push_command(
        &self,
        device_id: DeviceId,
        build: impl FnOnce(u16) -> Vec<u8>,
    ) -> Result<u16, CommandError> {
        let (sequence, outbound) = {
            let mut sessions = self.inner.write().expect("sessions lock poisoned");
            let session = sessions
                .get_mut(&device_id)
                .ok_or(CommandError::NotConnected { device_id })?;

            let sequence = session.next_sequence;
            session.next_sequence = session.next_sequence.wrapping_add(1);
            (sequence, session.outbound.clone())
        };

        outbound
            .try_send(build(sequence))
            .map_err(|_| CommandError::QueueUnavailable { device_id })?;

        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u8) -> DeviceId {
        DeviceId::from_bytes([0, 0, 0, 0, 0, id])
    }

    #[test]
    fn authentication_requires_registration() {
        let sessions = Sessions::new();
        let (sender, _receiver) = mpsc::channel(1);
        sessions.bind(device(1), 1, sender);

        sessions.mark_authenticated(device(1));
        assert!(!sessions.is_authenticated(device(1)));

        sessions.mark_registered(device(1));
        sessions.mark_authenticated(device(1));
        assert!(sessions.is_authenticated(device(1)));
    }

    #[test]
    fn closing_a_connection_only_removes_its_devices() {
        let sessions = Sessions::new();
        let (sender, _receiver) = mpsc::channel(1);
        sessions.bind(device(1), 1, sender.clone());
        sessions.bind(device(2), 2, sender);

        sessions.remove_connection(1);
        assert_eq!(sessions.len(), 1);
        assert!(!sessions.is_registered(device(1)));
    }

    #[test]
    fn rebinding_keeps_session_state() {
        let sessions = Sessions::new();
        let (sender, _receiver) = mpsc::channel(1);
        sessions.bind(device(1), 1, sender.clone());
        sessions.mark_registered(device(1));

        sessions.bind(device(1), 2, sender);
        assert!(sessions.is_registered(device(1)));

        // the old connection closing must not tear down the rebound session
        sessions.remove_connection(1);
        assert!(sessions.is_registered(device(1)));
    }

    #[test]
    fn push_command_assigns_increasing_sequences() {
        let sessions = Sessions::new();
        let (sender, mut receiver) = mpsc::channel(4);
        sessions.bind(device(1), 1, sender);

        let first = sessions
            .push_command(device(1), |sequence| vec![sequence as u8])
            .unwrap();
        let second = sessions
            .push_command(device(1), |sequence| vec![sequence as u8])
            .unwrap();

        assert_eq!(second, first.wrapping_add(1));
        assert_eq!(receiver.try_recv().unwrap(), vec![first as u8]);
        assert_eq!(receiver.try_recv().unwrap(), vec![second as u8]);
    }

    #[test]
    fn push_command_to_unknown_device_fails() {
        let sessions = Sessions::new();
        assert!(matches!(
            sessions.push_command(device(9), |_| vec![]),
            Err(CommandError::NotConnected { .. })
        ));
    }
}
