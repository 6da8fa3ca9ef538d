use serde_json::Value;

use crate::error::HostError;
use crate::protocol::InboundFrame;

/// DOM events the forwarder listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenKind {
    Click,
    Input,
    Change,
    KeyUp,
}

impl ListenKind {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Change => "change",
            Self::KeyUp => "keyup",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomEvent {
    /// Set for keyboard events.
    pub key: Option<String>,
}

pub type EventHandler = Box<dyn FnMut(DomEvent)>;

/// Socket lifecycle callbacks handed to [`HostBindings::open_socket`].
pub struct SocketHandlers {
    pub on_open: Box<dyn FnMut()>,
    pub on_message: Box<dyn FnMut(InboundFrame)>,
    pub on_error: Box<dyn FnMut()>,
    pub on_close: Box<dyn FnMut()>,
}

/// Everything the client needs from the page: the document, one socket, and
/// a timer.
///
/// Implementations must not call back into the client synchronously from any
/// of these methods; socket, listener, timer and ready handlers run later from
/// the host's own event loop.
pub trait HostBindings: 'static {
    /// Equality is node identity.
    type Element: Clone + PartialEq + 'static;
    type File: 'static;
    type Socket: Clone + 'static;

    fn location_path(&self) -> String;
    fn location_hostname(&self) -> String;
    fn location_port(&self) -> String;

    fn is_document_ready(&self) -> bool;
    fn on_document_ready(&self, handler: Box<dyn FnOnce()>);
    fn set_timeout(&self, delay_ms: u32, handler: Box<dyn FnOnce()>);

    fn elements_by_class(&self, class: &str) -> Vec<Self::Element>;
    fn elements_with_attribute(&self, attribute: &str) -> Vec<Self::Element>;
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn body(&self) -> Option<Self::Element>;

    /// `None` when the element has no id or an empty one.
    fn element_id(&self, element: &Self::Element) -> Option<String>;
    fn set_element_id(&self, element: &Self::Element, id: &str);
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;
    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    fn set_class(&self, element: &Self::Element, class: &str, enabled: bool);
    fn input_type(&self, element: &Self::Element) -> String;
    fn input_value(&self, element: &Self::Element) -> String;
    fn is_checked(&self, element: &Self::Element) -> bool;
    fn has_focus(&self, element: &Self::Element) -> bool;
    fn blur(&self, element: &Self::Element);

    /// Live property read; `None` when the property is undefined.
    fn property(&self, element: &Self::Element, name: &str) -> Option<Value>;
    /// Live property write (not an attribute write).
    fn set_property(
        &self,
        element: &Self::Element,
        name: &str,
        value: &Value,
    ) -> Result<(), HostError>;

    fn selected_files(&self, element: &Self::Element) -> Vec<Self::File>;
    fn file_name(&self, file: &Self::File) -> String;
    fn file_size(&self, file: &Self::File) -> u64;

    fn listen(&self, element: &Self::Element, kind: ListenKind, handler: EventHandler);

    fn open_socket(&self, url: &str, handlers: SocketHandlers) -> Result<Self::Socket, HostError>;
    fn send_text(&self, socket: &Self::Socket, text: &str) -> Result<(), HostError>;
    /// Sends the file content as a single binary frame.
    fn send_file(&self, socket: &Self::Socket, file: &Self::File) -> Result<(), HostError>;
    fn close_socket(&self, socket: &Self::Socket);
}
