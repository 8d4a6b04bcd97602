//! Pool of field clients, one per physical endpoint.
//!
//! Two active devices may name the same `src`; they share one client and
//! the per-slot mutex serializes their request sequences. Links are opened
//! lazily on first use and survive until process teardown; a faulted link
//! is dropped and re-established on its next use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use fieldscan_config::{Connection, Device};

use crate::error::LinkError;
use crate::link::{Link, Transport};

/// Lifecycle of one client slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link established yet, or a connect attempt failed.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The link answered its last request.
    Connected,
    /// The link failed mid-conversation; next use reconnects.
    Faulted,
}

/// One endpoint's client and its state machine.
pub struct Slot<L> {
    connection: Connection,
    state: LinkState,
    link: Option<L>,
}

impl<L: Link> Slot<L> {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            state: LinkState::Disconnected,
            link: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Hand out the live link, (re)connecting first when the slot is
    /// disconnected or faulted.
    pub async fn ensure<T>(&mut self, transport: &T) -> Result<&mut L, LinkError>
    where
        T: Transport<Link = L>,
    {
        if self.state != LinkState::Connected || self.link.is_none() {
            self.link = None;
            self.state = LinkState::Connecting;
            match transport.connect(&self.connection).await {
                Ok(link) => {
                    debug!(endpoint = %self.connection.src, "link established");
                    self.link = Some(link);
                    self.state = LinkState::Connected;
                }
                Err(error) => {
                    self.state = LinkState::Disconnected;
                    return Err(error);
                }
            }
        }
        Ok(self.link.as_mut().expect("connected slot holds a link"))
    }

    /// Mark the link unusable; the next [`Slot::ensure`] reconnects.
    pub fn fault(&mut self) {
        self.state = LinkState::Faulted;
        self.link = None;
    }

    async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.state = LinkState::Disconnected;
    }
}

/// Endpoint-keyed pool of client slots.
pub struct ClientPool<T: Transport> {
    transport: T,
    slots: HashMap<String, Arc<Mutex<Slot<T::Link>>>>,
}

impl<T: Transport> ClientPool<T> {
    /// Build one slot per distinct `src` among the given devices. The
    /// first device naming an endpoint contributes its connection
    /// parameters.
    pub fn new<'d>(transport: T, devices: impl Iterator<Item = &'d Device>) -> Self {
        let mut slots = HashMap::new();
        for device in devices {
            slots
                .entry(device.connection.src.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Slot::new(device.connection.clone())))
                });
        }
        Self { transport, slots }
    }

    /// The slot serving one endpoint, shared with every device on it.
    pub fn slot(&self, src: &str) -> Option<Arc<Mutex<Slot<T::Link>>>> {
        self.slots.get(src).cloned()
    }

    /// The transport links are opened with.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Close every live link. Part of orderly shutdown only.
    pub async fn close_all(&self) {
        for slot in self.slots.values() {
            slot.lock().await.close().await;
        }
    }
}

impl<T: Transport> fmt::Debug for ClientPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientPool {{ endpoints: {} }}", self.slots.len())
    }
}
