pub mod callbacks;
pub mod config;
pub mod connection;
pub mod error;
pub mod forwarder;
pub mod host;
pub mod metric;
pub mod patch;
pub mod protocol;
pub mod registry;

#[cfg(test)]
mod testing;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::callbacks::CallbackRegistry;
use crate::connection::Connection;
use crate::registry::ElementRegistry;

pub use crate::config::{ClientConfig, Markers};
pub use crate::connection::{ConnectionState, STATUS_CLASSES};
pub use crate::error::{BindingError, CallbackError, HostError, SendError};
pub use crate::host::{DomEvent, EventHandler, HostBindings, ListenKind, SocketHandlers};
pub use crate::patch::ApplyOutcome;
pub use crate::protocol::{
    DecodeError, INBOUND_FRAME_CAP, InboundFrame, IncomingPatch, OutgoingEvent,
};
pub use serde_json;

pub(crate) struct ClientInner<H: HostBindings> {
    pub(crate) host: H,
    pub(crate) config: ClientConfig,
    pub(crate) connection: RefCell<Connection<H::Socket>>,
    pub(crate) registry: RefCell<ElementRegistry<H::Element>>,
    pub(crate) callbacks: RefCell<CallbackRegistry<H::Element>>,
    pub(crate) attach_pending: Cell<bool>,
    pub(crate) ready_scan_pending: Cell<bool>,
}

/// A page's connection to its server-side app.
///
/// Cloning is cheap and every clone drives the same connection. Socket,
/// listener and timer handlers hold weak references, so once the last clone
/// is dropped they become no-ops.
pub struct Client<H: HostBindings> {
    inner: Rc<ClientInner<H>>,
}

impl<H: HostBindings> Clone for Client<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostBindings> Client<H> {
    pub fn new(host: H, config: ClientConfig) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                host,
                config,
                connection: RefCell::new(Connection::default()),
                registry: RefCell::new(ElementRegistry::default()),
                callbacks: RefCell::new(CallbackRegistry::default()),
                attach_pending: Cell::new(false),
                ready_scan_pending: Cell::new(false),
            }),
        }
    }

    /// Opens the socket. A no-op while a socket is already connecting or open;
    /// after a close or error it opens a fresh one.
    pub fn connect(&self) -> Result<(), HostError> {
        connection::connect(&self.inner)
    }

    pub fn disconnect(&self) {
        connection::disconnect(&self.inner);
    }

    /// Binds every marked element once the socket is open. Safe to repeat.
    pub fn attach(&self) {
        registry::attach(&self.inner);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.borrow().state()
    }

    pub fn status_text(&self) -> String {
        let connection = self.inner.connection.borrow();
        connection.state().status_text(connection.url())
    }

    pub fn bound_ids(&self) -> Vec<String> {
        self.inner.registry.borrow().ids()
    }

    pub fn register_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&H::Element) + 'static,
    {
        self.inner
            .callbacks
            .borrow_mut()
            .register_element(name, callback);
    }

    pub fn register_page_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn() + 'static,
    {
        self.inner.callbacks.borrow_mut().register_page(name, callback);
    }

    pub fn unregister_callback(&self, name: &str) -> bool {
        self.inner.callbacks.borrow_mut().unregister(name)
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}
