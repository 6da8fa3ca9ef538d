use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::ClientInner;
use crate::error::{HostError, SendError};
use crate::host::{HostBindings, SocketHandlers};
use crate::protocol::{self, InboundFrame};
use crate::{patch, registry};

pub const STATUS_CLASSES: [&str; 3] = ["opened", "closed", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Error,
    Close,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }

    /// Body class mirroring this state, if any.
    pub fn status_class(self) -> Option<&'static str> {
        match self {
            Self::Open => Some("opened"),
            Self::Closed => Some("closed"),
            Self::Errored => Some("error"),
            Self::Connecting | Self::Closing => None,
        }
    }

    pub fn status_text(self, url: &str) -> String {
        match self {
            Self::Connecting => format!("Connecting to {url}"),
            Self::Open => format!("Opened connection to {url}"),
            Self::Closing => format!("Closing connection to {url}"),
            Self::Closed => format!("Closed connection to {url}"),
            Self::Errored => format!("Could not connect to {url}"),
        }
    }

    /// Next state for a socket callback, or `None` when the event does not
    /// move the machine. `Errored` absorbs the close that follows an error.
    pub fn on_event(self, event: SocketEvent) -> Option<ConnectionState> {
        match (self, event) {
            (Self::Connecting, SocketEvent::Open) => Some(Self::Open),
            (Self::Connecting | Self::Open | Self::Closing, SocketEvent::Error) => {
                Some(Self::Errored)
            }
            (Self::Connecting | Self::Open | Self::Closing, SocketEvent::Close) => {
                Some(Self::Closed)
            }
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single socket handle and its lifecycle state.
pub struct Connection<S> {
    pub(crate) state: ConnectionState,
    pub(crate) socket: Option<S>,
    pub(crate) generation: u64,
    pub(crate) url: String,
}

impl<S> Default for Connection<S> {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            socket: None,
            generation: 0,
            url: String::new(),
        }
    }
}

impl<S: Clone> Connection<S> {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The socket, if events may be sent on it right now.
    pub(crate) fn open_socket(&self) -> Result<S, SendError> {
        match (&self.socket, self.state) {
            (Some(socket), ConnectionState::Open) => Ok(socket.clone()),
            (_, state) => Err(SendError::Inert(state)),
        }
    }
}

pub(crate) fn connect<H: HostBindings>(inner: &Rc<ClientInner<H>>) -> Result<(), HostError> {
    {
        let connection = inner.connection.borrow();
        if connection.state.is_live() && connection.socket.is_some() {
            debug!("connect ignored; connection is already {}", connection.state);
            return Ok(());
        }
    }

    let url = inner.config.endpoint_url(
        &inner.host.location_hostname(),
        &inner.host.location_port(),
    );

    let generation = {
        let mut connection = inner.connection.borrow_mut();
        connection.generation += 1;
        connection.state = ConnectionState::Connecting;
        connection.url = url.clone();
        connection.generation
    };

    info!("connecting to {url}");
    update_status(inner);

    let handlers = socket_handlers(inner, generation);
    match inner.host.open_socket(&url, handlers) {
        Ok(socket) => {
            inner.connection.borrow_mut().socket = Some(socket);
            Ok(())
        }
        Err(err) => {
            error!("could not open socket to {url}: {err}");
            handle_event(inner, generation, SocketEvent::Error);
            Err(err)
        }
    }
}

pub(crate) fn disconnect<H: HostBindings>(inner: &Rc<ClientInner<H>>) {
    let socket = {
        let mut connection = inner.connection.borrow_mut();
        if !connection.state.is_live() {
            debug!("disconnect ignored; connection is {}", connection.state);
            return;
        }

        connection.state = ConnectionState::Closing;
        connection.socket.clone()
    };

    update_status(inner);

    if let Some(socket) = socket {
        inner.host.close_socket(&socket);
    }
}

fn socket_handlers<H: HostBindings>(inner: &Rc<ClientInner<H>>, generation: u64) -> SocketHandlers {
    let open = Rc::downgrade(inner);
    let message = Rc::downgrade(inner);
    let failure = Rc::downgrade(inner);
    let close = Rc::downgrade(inner);

    SocketHandlers {
        on_open: Box::new(move || {
            with_inner(&open, |inner| handle_event(inner, generation, SocketEvent::Open))
        }),
        on_message: Box::new(move |frame| {
            with_inner(&message, |inner| handle_message(inner, generation, frame))
        }),
        on_error: Box::new(move || {
            with_inner(&failure, |inner| handle_event(inner, generation, SocketEvent::Error))
        }),
        on_close: Box::new(move || {
            with_inner(&close, |inner| handle_event(inner, generation, SocketEvent::Close))
        }),
    }
}

fn with_inner<H: HostBindings>(weak: &Weak<ClientInner<H>>, f: impl FnOnce(&Rc<ClientInner<H>>)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

pub(crate) fn handle_event<H: HostBindings>(
    inner: &Rc<ClientInner<H>>,
    generation: u64,
    event: SocketEvent,
) {
    let next = {
        let mut connection = inner.connection.borrow_mut();
        if connection.generation != generation {
            debug!("ignoring {event:?} from superseded socket #{generation}");
            return;
        }

        let Some(next) = connection.state.on_event(event) else {
            debug!("{event:?} does not change a {} connection", connection.state);
            return;
        };

        connection.state = next;
        next
    };

    let url = inner.connection.borrow().url.clone();
    match next {
        ConnectionState::Open => info!("opened connection to {url}"),
        ConnectionState::Closed => info!("closed connection to {url}"),
        ConnectionState::Errored => error!("transport error on connection to {url}"),
        ConnectionState::Connecting | ConnectionState::Closing => {}
    }

    update_status(inner);

    if next == ConnectionState::Open {
        registry::attach(inner);
    }
}

fn handle_message<H: HostBindings>(inner: &Rc<ClientInner<H>>, generation: u64, frame: InboundFrame) {
    if inner.connection.borrow().generation != generation {
        debug!("ignoring frame from superseded socket #{generation}");
        return;
    }

    match protocol::decode(&frame, inner.config.max_inbound_frame) {
        Ok(incoming) => {
            patch::apply(&inner.host, &inner.config, &inner.callbacks, &incoming);
        }
        Err(err) => warn!("dropping inbound frame: {err}"),
    }
}

/// Mirrors the state into the status element and body class. Either surface
/// may be absent.
pub(crate) fn update_status<H: HostBindings>(inner: &ClientInner<H>) {
    let (state, url) = {
        let connection = inner.connection.borrow();
        (connection.state, connection.url.clone())
    };

    if let Some(status) = inner.host.element_by_id(&inner.config.status_element_id) {
        let text = Value::String(state.status_text(&url));
        if let Err(err) =
            inner
                .host
                .set_property(&status, &inner.config.markers.display_property, &text)
        {
            debug!("status text not updated: {err}");
        }
    }

    if let Some(body) = inner.host.body() {
        let current = state.status_class();
        for class in STATUS_CLASSES {
            inner.host.set_class(&body, class, current == Some(class));
        }
    }
}
