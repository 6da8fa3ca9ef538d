use std::rc::Rc;

use log::{debug, warn};

use crate::ClientInner;
use crate::error::SendError;
use crate::host::{DomEvent, HostBindings, ListenKind};
use crate::protocol::{self, OutgoingEvent};
use crate::registry::Channel;

const ENTER_KEY: &str = "Enter";

pub fn listen_kind(channel: Channel) -> ListenKind {
    match channel {
        Channel::Click => ListenKind::Click,
        Channel::FileUpload => ListenKind::Change,
        Channel::InputChange => ListenKind::Input,
        Channel::EnterKey => ListenKind::KeyUp,
    }
}

/// The string sent for an element's current state. Checkboxes report their
/// checked flag instead of their value attribute.
pub fn event_value<H: HostBindings>(host: &H, element: &H::Element) -> String {
    if host.input_type(element) == "checkbox" {
        host.is_checked(element).to_string()
    } else {
        host.input_value(element)
    }
}

pub(crate) fn install<H: HostBindings>(
    inner: &Rc<ClientInner<H>>,
    element: H::Element,
    channel: Channel,
) {
    let weak = Rc::downgrade(inner);
    let target = element.clone();

    inner.host.listen(
        &element,
        listen_kind(channel),
        Box::new(move |event: DomEvent| {
            if let Some(inner) = weak.upgrade() {
                forward(&inner, &target, channel, &event);
            }
        }),
    );
}

pub(crate) fn forward<H: HostBindings>(
    inner: &Rc<ClientInner<H>>,
    element: &H::Element,
    channel: Channel,
    event: &DomEvent,
) {
    if channel == Channel::EnterKey {
        if event.key.as_deref() != Some(ENTER_KEY) {
            return;
        }
        inner.host.blur(element);
    }

    let Some(id) = inner.host.element_id(element) else {
        warn!("bound element lost its id; {channel:?} event dropped");
        return;
    };
    let path = inner.host.location_path();

    let result = match channel {
        Channel::FileUpload => send_files(inner, element, &path, &id),
        Channel::Click | Channel::InputChange | Channel::EnterKey => {
            let value = event_value(&inner.host, element);
            send_event(inner, &OutgoingEvent::new(path, id, value))
        }
    };

    if let Err(err) = result {
        debug!("{channel:?} event not forwarded: {err}");
    }
}

/// One describing event then the raw content, per file, in selection order.
fn send_files<H: HostBindings>(
    inner: &Rc<ClientInner<H>>,
    element: &H::Element,
    path: &str,
    id: &str,
) -> Result<(), SendError> {
    for file in inner.host.selected_files(element) {
        let event = OutgoingEvent::new(path, id, inner.host.file_name(&file))
            .with_file_size(inner.host.file_size(&file));

        let socket = inner.connection.borrow().open_socket()?;
        let text = protocol::encode(&event)?;
        inner.host.send_text(&socket, &text)?;
        inner.host.send_file(&socket, &file)?;
    }

    Ok(())
}

/// Fire-and-forget: a failed send is only reported, never retried.
pub(crate) fn send_event<H: HostBindings>(
    inner: &Rc<ClientInner<H>>,
    event: &OutgoingEvent,
) -> Result<(), SendError> {
    let socket = inner.connection.borrow().open_socket()?;
    let text = protocol::encode(event)?;
    inner.host.send_text(&socket, &text)?;
    Ok(())
}
