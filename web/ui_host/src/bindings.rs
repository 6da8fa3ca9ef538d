use std::rc::Rc;

use ehbanana_ui_runtime::serde_json::Value;
use ehbanana_ui_runtime::{
    DomEvent, EventHandler, HostBindings, HostError, InboundFrame, ListenKind, SocketHandlers,
};
use log::{debug, warn};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    BinaryType, Document, Element, Event, File, HtmlElement, HtmlInputElement, KeyboardEvent,
    MessageEvent, WebSocket, Window,
};

/// One open `WebSocket` plus the closures it calls into.
///
/// The closures live as long as the handle. Dropping it detaches them from the
/// socket first, so a late browser callback never reaches a freed closure.
pub struct WebSocketHandle {
    socket: WebSocket,
    _on_open: Closure<dyn FnMut()>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut()>,
    _on_close: Closure<dyn FnMut()>,
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
    }
}

/// [`HostBindings`] over the live browser document.
pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    pub fn from_window() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::Unavailable("window"))?;
        let document = window
            .document()
            .ok_or(HostError::Unavailable("document"))?;
        Ok(Self { window, document })
    }
}

fn js_detail(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn read(target: &JsValue, name: &str) -> Option<JsValue> {
    js_sys::Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined())
}

fn inbound_frame(event: &MessageEvent) -> Option<InboundFrame> {
    let data = event.data();
    if let Some(text) = data.as_string() {
        return Some(InboundFrame::Text(text));
    }
    data.dyn_into::<js_sys::ArrayBuffer>()
        .ok()
        .map(|buffer| InboundFrame::Binary(js_sys::Uint8Array::new(&buffer).to_vec()))
}

impl HostBindings for WebHost {
    type Element = Element;
    type File = File;
    type Socket = Rc<WebSocketHandle>;

    fn location_path(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn location_hostname(&self) -> String {
        self.window.location().hostname().unwrap_or_default()
    }

    fn location_port(&self) -> String {
        self.window.location().port().unwrap_or_default()
    }

    fn is_document_ready(&self) -> bool {
        read(&self.document, "readyState")
            .and_then(|state| state.as_string())
            .is_none_or(|state| state != "loading")
    }

    fn on_document_ready(&self, handler: Box<dyn FnOnce()>) {
        let callback = Closure::once_into_js(move || handler());
        if let Err(err) = self
            .document
            .add_event_listener_with_callback("DOMContentLoaded", callback.unchecked_ref())
        {
            warn!("could not wait for the document: {}", js_detail(&err));
        }
    }

    fn set_timeout(&self, delay_ms: u32, handler: Box<dyn FnOnce()>) {
        let callback = Closure::once_into_js(move || handler());
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            warn!("could not schedule timer: {}", js_detail(&err));
        }
    }

    fn elements_by_class(&self, class: &str) -> Vec<Element> {
        let collection = self.document.get_elements_by_class_name(class);
        (0..collection.length())
            .filter_map(|index| collection.item(index))
            .collect()
    }

    fn elements_with_attribute(&self, attribute: &str) -> Vec<Element> {
        let Ok(nodes) = self.document.query_selector_all(&format!("[{attribute}]")) else {
            debug!("attribute `{attribute}` is not a valid selector");
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|index| nodes.item(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn element_id(&self, element: &Element) -> Option<String> {
        let id = element.id();
        (!id.is_empty()).then_some(id)
    }

    fn set_element_id(&self, element: &Element, id: &str) {
        element.set_id(id);
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn set_class(&self, element: &Element, class: &str, enabled: bool) {
        if let Err(err) = element.class_list().toggle_with_force(class, enabled) {
            debug!("class `{class}` not toggled: {}", js_detail(&err));
        }
    }

    fn input_type(&self, element: &Element) -> String {
        read(element, "type")
            .and_then(|value| value.as_string())
            .unwrap_or_default()
    }

    fn input_value(&self, element: &Element) -> String {
        read(element, "value")
            .and_then(|value| value.as_string())
            .unwrap_or_default()
    }

    fn is_checked(&self, element: &Element) -> bool {
        read(element, "checked")
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    fn has_focus(&self, element: &Element) -> bool {
        self.document.active_element().as_ref() == Some(element)
    }

    fn blur(&self, element: &Element) {
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            if let Err(err) = element.blur() {
                debug!("blur failed: {}", js_detail(&err));
            }
        }
    }

    fn property(&self, element: &Element, name: &str) -> Option<Value> {
        let value = read(element, name)?;
        serde_wasm_bindgen::from_value(value).ok()
    }

    fn set_property(&self, element: &Element, name: &str, value: &Value) -> Result<(), HostError> {
        let property_error = |detail: String| HostError::Property {
            name: name.to_string(),
            detail,
        };

        let js = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| property_error(err.to_string()))?;

        match js_sys::Reflect::set(element, &JsValue::from_str(name), &js) {
            Ok(true) => Ok(()),
            Ok(false) => Err(property_error("assignment rejected".to_string())),
            Err(err) => Err(property_error(js_detail(&err))),
        }
    }

    fn selected_files(&self, element: &Element) -> Vec<File> {
        let Some(files) = element
            .dyn_ref::<HtmlInputElement>()
            .and_then(|input| input.files())
        else {
            return Vec::new();
        };
        (0..files.length())
            .filter_map(|index| files.get(index))
            .collect()
    }

    fn file_name(&self, file: &File) -> String {
        file.name()
    }

    fn file_size(&self, file: &File) -> u64 {
        file.size() as u64
    }

    fn listen(&self, element: &Element, kind: ListenKind, mut handler: EventHandler) {
        let closure = Closure::wrap(Box::new(move |event: Event| {
            let key = event
                .dyn_ref::<KeyboardEvent>()
                .map(|keyboard| keyboard.key());
            handler(DomEvent { key });
        }) as Box<dyn FnMut(Event)>);

        if let Err(err) =
            element.add_event_listener_with_callback(kind.event_name(), closure.as_ref().unchecked_ref())
        {
            warn!("could not listen for {}: {}", kind.event_name(), js_detail(&err));
        }

        // Listeners stay for the page's lifetime.
        closure.forget();
    }

    fn open_socket(&self, url: &str, handlers: SocketHandlers) -> Result<Self::Socket, HostError> {
        let socket = WebSocket::new(url).map_err(|err| HostError::Socket(js_detail(&err)))?;
        socket.set_binary_type(BinaryType::Arraybuffer);

        let SocketHandlers {
            on_open,
            mut on_message,
            on_error,
            on_close,
        } = handlers;

        let on_open = Closure::wrap(on_open);
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            match inbound_frame(&event) {
                Some(frame) => on_message(frame),
                None => warn!("dropping inbound frame of unsupported type"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        let on_error = Closure::wrap(on_error);
        let on_close = Closure::wrap(on_close);

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        Ok(Rc::new(WebSocketHandle {
            socket,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        }))
    }

    fn send_text(&self, socket: &Self::Socket, text: &str) -> Result<(), HostError> {
        socket
            .socket
            .send_with_str(text)
            .map_err(|err| HostError::Socket(js_detail(&err)))
    }

    fn send_file(&self, socket: &Self::Socket, file: &File) -> Result<(), HostError> {
        socket
            .socket
            .send_with_blob(file)
            .map_err(|err| HostError::Socket(js_detail(&err)))
    }

    fn close_socket(&self, socket: &Self::Socket) {
        if let Err(err) = socket.socket.close() {
            debug!("close failed: {}", js_detail(&err));
        }
    }
}
