use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::error::HostError;
use crate::host::{DomEvent, EventHandler, HostBindings, ListenKind, SocketHandlers};
use crate::protocol::{self, InboundFrame, OutgoingEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Binary(Vec<u8>),
}

impl Sent {
    pub fn event(path: &str, id: &str, value: &str) -> Self {
        Self::encoded(&OutgoingEvent::new(path, id, value))
    }

    pub fn file_event(path: &str, id: &str, name: &str, size: u64) -> Self {
        Self::encoded(&OutgoingEvent::new(path, id, name).with_file_size(size))
    }

    fn encoded(event: &OutgoingEvent) -> Self {
        Self::Text(protocol::encode(event).expect("encode event"))
    }
}

#[derive(Debug, Clone)]
pub struct FakeFile {
    name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ElementState {
    tag: String,
    id: RefCell<String>,
    classes: RefCell<Vec<String>>,
    attributes: RefCell<BTreeMap<String, String>>,
    properties: RefCell<BTreeMap<String, Value>>,
    property_writes: Cell<usize>,
    input_type: RefCell<String>,
    value: RefCell<String>,
    checked: Cell<bool>,
    focused: Cell<bool>,
    files: RefCell<Vec<FakeFile>>,
    listeners: RefCell<Vec<(ListenKind, EventHandler)>>,
}

/// A node handle. Clones refer to the same node.
#[derive(Clone)]
pub struct FakeElement(Rc<ElementState>);

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeElement")
            .field("tag", &self.0.tag)
            .field("id", &*self.0.id.borrow())
            .finish()
    }
}

impl PartialEq for FakeElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl FakeElement {
    fn new(tag: &str) -> Self {
        let input_type = if tag == "input" { "text" } else { "" };
        Self(Rc::new(ElementState {
            tag: tag.to_string(),
            input_type: RefCell::new(input_type.to_string()),
            ..ElementState::default()
        }))
    }

    pub fn id(&self) -> String {
        self.0.id.borrow().clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.classes.borrow().iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "value" => Some(Value::String(self.value())),
            "checked" => Some(Value::Bool(self.is_checked())),
            _ => self.0.properties.borrow().get(name).cloned(),
        }
    }

    /// A property rendered as text; empty when unset.
    pub fn text(&self, name: &str) -> String {
        match self.property(name) {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn property_writes(&self) -> usize {
        self.0.property_writes.get()
    }

    pub fn value(&self) -> String {
        self.0.value.borrow().clone()
    }

    pub fn set_value(&self, value: &str) {
        *self.0.value.borrow_mut() = value.to_string();
    }

    pub fn is_checked(&self) -> bool {
        self.0.checked.get()
    }

    pub fn set_checked(&self, checked: bool) {
        self.0.checked.set(checked);
    }

    pub fn focus(&self) {
        self.0.focused.set(true);
    }

    pub fn is_focused(&self) -> bool {
        self.0.focused.get()
    }

    pub fn select_file(&self, name: &str, bytes: Vec<u8>) {
        self.0.files.borrow_mut().push(FakeFile {
            name: name.to_string(),
            bytes,
        });
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    fn set_class(&self, class: &str, enabled: bool) {
        let mut classes = self.0.classes.borrow_mut();
        classes.retain(|c| c != class);
        if enabled {
            classes.push(class.to_string());
        }
    }

    fn write_property(&self, name: &str, value: &Value) {
        self.0.property_writes.set(self.0.property_writes.get() + 1);
        match name {
            "value" => {
                let text = match value {
                    Value::String(text) => text.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.set_value(&text);
            }
            "checked" => self.set_checked(value.as_bool().unwrap_or(false)),
            _ => {
                self.0
                    .properties
                    .borrow_mut()
                    .insert(name.to_string(), value.clone());
            }
        }
    }

    /// Runs this element's listeners for `kind`. Handlers are taken out for
    /// the call so they may touch the element freely.
    fn dispatch(&self, kind: ListenKind, event: DomEvent) {
        let mut listeners = std::mem::take(&mut *self.0.listeners.borrow_mut());
        for (listening, handler) in listeners.iter_mut() {
            if *listening == kind {
                handler(event.clone());
            }
        }

        let mut slot = self.0.listeners.borrow_mut();
        listeners.append(&mut slot);
        *slot = listeners;
    }
}

pub struct ElementBuilder {
    host: FakeHost,
    element: FakeElement,
}

impl ElementBuilder {
    pub fn id(self, id: &str) -> Self {
        *self.element.0.id.borrow_mut() = id.to_string();
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.element.set_attribute("name", name);
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.element.set_class(class, true);
        self
    }

    pub fn attr(self, name: &str, value: &str) -> Self {
        self.element.set_attribute(name, value);
        self
    }

    pub fn input_type(self, input_type: &str) -> Self {
        *self.element.0.input_type.borrow_mut() = input_type.to_string();
        self
    }

    /// Sets the live value, not the attribute.
    pub fn value(self, value: &str) -> Self {
        self.element.set_value(value);
        self
    }

    pub fn build(self) -> FakeElement {
        self.host.0.elements.borrow_mut().push(self.element.clone());
        self.element
    }
}

struct FakeSocket {
    handlers: Option<SocketHandlers>,
    closed: bool,
}

struct HostState {
    path: String,
    hostname: String,
    port: String,
    body: Option<FakeElement>,
    elements: RefCell<Vec<FakeElement>>,
    loading: Cell<bool>,
    ready_handlers: RefCell<Vec<Box<dyn FnOnce()>>>,
    timers: RefCell<Vec<(u32, Box<dyn FnOnce()>)>>,
    sockets: RefCell<Vec<FakeSocket>>,
    fail_next_open: RefCell<Option<String>>,
    sends_left: Cell<Option<usize>>,
    sent: RefCell<Vec<Sent>>,
}

#[derive(Clone)]
pub struct FakeHost(Rc<HostState>);

impl FakeHost {
    pub fn new(path: &str) -> Self {
        Self::with_body(path, Some(FakeElement::new("body")))
    }

    pub fn without_body(path: &str) -> Self {
        Self::with_body(path, None)
    }

    fn with_body(path: &str, body: Option<FakeElement>) -> Self {
        Self(Rc::new(HostState {
            path: path.to_string(),
            hostname: "localhost".to_string(),
            port: "8080".to_string(),
            body,
            elements: RefCell::new(Vec::new()),
            loading: Cell::new(false),
            ready_handlers: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            sockets: RefCell::new(Vec::new()),
            fail_next_open: RefCell::new(None),
            sends_left: Cell::new(None),
            sent: RefCell::new(Vec::new()),
        }))
    }

    pub fn add_element(&self, tag: &str) -> ElementBuilder {
        ElementBuilder {
            host: self.clone(),
            element: FakeElement::new(tag),
        }
    }

    /// Detaches `element` from the document.
    pub fn remove_element(&self, element: &FakeElement) {
        self.0.elements.borrow_mut().retain(|node| node != element);
    }

    pub fn pending_ready_handlers(&self) -> usize {
        self.0.ready_handlers.borrow().len()
    }

    pub fn body_element(&self) -> FakeElement {
        self.0.body.clone().expect("host has a body")
    }

    pub fn set_loading(&self, loading: bool) {
        self.0.loading.set(loading);
    }

    pub fn finish_loading(&self) {
        self.0.loading.set(false);
        let handlers = std::mem::take(&mut *self.0.ready_handlers.borrow_mut());
        for handler in handlers {
            handler();
        }
    }

    pub fn pending_timers(&self) -> Vec<u32> {
        self.0.timers.borrow().iter().map(|(delay, _)| *delay).collect()
    }

    /// Runs the timers pending right now; ones they schedule stay queued.
    pub fn run_timers(&self) {
        let timers = std::mem::take(&mut *self.0.timers.borrow_mut());
        for (_, handler) in timers {
            handler();
        }
    }

    pub fn socket_count(&self) -> usize {
        self.0.sockets.borrow().len()
    }

    pub fn socket_closed(&self, index: usize) -> bool {
        self.0.sockets.borrow()[index].closed
    }

    pub fn fail_next_open(&self, reason: &str) {
        *self.0.fail_next_open.borrow_mut() = Some(reason.to_string());
    }

    /// Lets `count` more sends through, then fails every later one.
    pub fn fail_sends_after(&self, count: usize) {
        self.0.sends_left.set(Some(count));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.0.sent.borrow().clone()
    }

    pub fn fire_open(&self, index: usize) {
        self.with_handlers(index, |handlers| (handlers.on_open)());
    }

    pub fn fire_error(&self, index: usize) {
        self.with_handlers(index, |handlers| (handlers.on_error)());
    }

    pub fn fire_close(&self, index: usize) {
        self.with_handlers(index, |handlers| (handlers.on_close)());
    }

    pub fn fire_text(&self, index: usize, text: &str) {
        let frame = InboundFrame::Text(text.to_string());
        self.with_handlers(index, move |handlers| (handlers.on_message)(frame));
    }

    pub fn fire_binary(&self, index: usize, bytes: Vec<u8>) {
        let frame = InboundFrame::Binary(bytes);
        self.with_handlers(index, move |handlers| (handlers.on_message)(frame));
    }

    pub fn dispatch_input(&self, element: &FakeElement) {
        element.dispatch(ListenKind::Input, DomEvent::default());
    }

    pub fn dispatch_click(&self, element: &FakeElement) {
        element.dispatch(ListenKind::Click, DomEvent::default());
    }

    pub fn dispatch_change(&self, element: &FakeElement) {
        element.dispatch(ListenKind::Change, DomEvent::default());
    }

    pub fn dispatch_key(&self, element: &FakeElement, key: &str) {
        element.dispatch(
            ListenKind::KeyUp,
            DomEvent {
                key: Some(key.to_string()),
            },
        );
    }

    fn with_handlers(&self, index: usize, f: impl FnOnce(&mut SocketHandlers)) {
        let taken = self.0.sockets.borrow_mut()[index].handlers.take();
        let Some(mut handlers) = taken else {
            return;
        };
        f(&mut handlers);
        self.0.sockets.borrow_mut()[index].handlers = Some(handlers);
    }

    fn record_send(&self, socket: usize, sent: Sent) -> Result<(), HostError> {
        if self.0.sockets.borrow()[socket].closed {
            return Err(HostError::Socket("socket is closed".to_string()));
        }
        match self.0.sends_left.get() {
            Some(0) => return Err(HostError::Socket("send failed".to_string())),
            Some(left) => self.0.sends_left.set(Some(left - 1)),
            None => {}
        }
        self.0.sent.borrow_mut().push(sent);
        Ok(())
    }
}

impl HostBindings for FakeHost {
    type Element = FakeElement;
    type File = FakeFile;
    type Socket = usize;

    fn location_path(&self) -> String {
        self.0.path.clone()
    }

    fn location_hostname(&self) -> String {
        self.0.hostname.clone()
    }

    fn location_port(&self) -> String {
        self.0.port.clone()
    }

    fn is_document_ready(&self) -> bool {
        !self.0.loading.get()
    }

    fn on_document_ready(&self, handler: Box<dyn FnOnce()>) {
        self.0.ready_handlers.borrow_mut().push(handler);
    }

    fn set_timeout(&self, delay_ms: u32, handler: Box<dyn FnOnce()>) {
        self.0.timers.borrow_mut().push((delay_ms, handler));
    }

    fn elements_by_class(&self, class: &str) -> Vec<FakeElement> {
        self.0
            .elements
            .borrow()
            .iter()
            .filter(|element| element.has_class(class))
            .cloned()
            .collect()
    }

    fn elements_with_attribute(&self, attribute: &str) -> Vec<FakeElement> {
        self.0
            .elements
            .borrow()
            .iter()
            .filter(|element| element.attribute(attribute).is_some())
            .cloned()
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<FakeElement> {
        self.0
            .elements
            .borrow()
            .iter()
            .find(|element| *element.0.id.borrow() == id)
            .cloned()
    }

    fn body(&self) -> Option<FakeElement> {
        self.0.body.clone()
    }

    fn element_id(&self, element: &FakeElement) -> Option<String> {
        Some(element.id()).filter(|id| !id.is_empty())
    }

    fn set_element_id(&self, element: &FakeElement, id: &str) {
        *element.0.id.borrow_mut() = id.to_string();
    }

    fn attribute(&self, element: &FakeElement, name: &str) -> Option<String> {
        element.attribute(name)
    }

    fn has_class(&self, element: &FakeElement, class: &str) -> bool {
        element.has_class(class)
    }

    fn set_class(&self, element: &FakeElement, class: &str, enabled: bool) {
        element.set_class(class, enabled);
    }

    fn input_type(&self, element: &FakeElement) -> String {
        element.0.input_type.borrow().clone()
    }

    fn input_value(&self, element: &FakeElement) -> String {
        element.value()
    }

    fn is_checked(&self, element: &FakeElement) -> bool {
        element.is_checked()
    }

    fn has_focus(&self, element: &FakeElement) -> bool {
        element.is_focused()
    }

    fn blur(&self, element: &FakeElement) {
        element.0.focused.set(false);
    }

    fn property(&self, element: &FakeElement, name: &str) -> Option<Value> {
        element.property(name)
    }

    fn set_property(&self, element: &FakeElement, name: &str, value: &Value) -> Result<(), HostError> {
        element.write_property(name, value);
        Ok(())
    }

    fn selected_files(&self, element: &FakeElement) -> Vec<FakeFile> {
        element.0.files.borrow().clone()
    }

    fn file_name(&self, file: &FakeFile) -> String {
        file.name.clone()
    }

    fn file_size(&self, file: &FakeFile) -> u64 {
        file.bytes.len() as u64
    }

    fn listen(&self, element: &FakeElement, kind: ListenKind, handler: EventHandler) {
        element.0.listeners.borrow_mut().push((kind, handler));
    }

    fn open_socket(&self, _url: &str, handlers: SocketHandlers) -> Result<usize, HostError> {
        if let Some(reason) = self.0.fail_next_open.borrow_mut().take() {
            return Err(HostError::Socket(reason));
        }

        let mut sockets = self.0.sockets.borrow_mut();
        sockets.push(FakeSocket {
            handlers: Some(handlers),
            closed: false,
        });
        Ok(sockets.len() - 1)
    }

    fn send_text(&self, socket: &usize, text: &str) -> Result<(), HostError> {
        self.record_send(*socket, Sent::Text(text.to_string()))
    }

    fn send_file(&self, socket: &usize, file: &FakeFile) -> Result<(), HostError> {
        self.record_send(*socket, Sent::Binary(file.bytes.clone()))
    }

    fn close_socket(&self, socket: &usize) {
        self.0.sockets.borrow_mut()[*socket].closed = true;
    }
}
