use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, warn};

use crate::ClientInner;
use crate::config::{ClientConfig, Markers};
use crate::connection::ConnectionState;
use crate::error::BindingError;
use crate::forwarder;
use crate::host::HostBindings;
use crate::protocol::OutgoingEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    OnLoad,
    OnEnter,
    MetricPrefix,
    Callback,
}

impl Role {
    pub fn marker(self, markers: &Markers) -> &str {
        match self {
            Self::Input => &markers.input_class,
            Self::OnLoad => &markers.on_load_class,
            Self::OnEnter => &markers.on_enter_class,
            Self::MetricPrefix => &markers.metric_prefix_class,
            Self::Callback => &markers.callback_attribute,
        }
    }
}

/// Where user interaction on a bound element is forwarded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Click,
    FileUpload,
    InputChange,
    EnterKey,
}

#[derive(Debug, Clone)]
pub struct Binding<E> {
    pub id: String,
    pub element: E,
    pub channel: Channel,
}

#[derive(Debug)]
pub struct ScanOutcome<E> {
    /// Listeners not installed by any earlier scan.
    pub bindings: Vec<Binding<E>>,
    pub on_load: Vec<OutgoingEvent>,
    pub skipped: Vec<BindingError>,
}

impl<E> Default for ScanOutcome<E> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            on_load: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// What the latest scan found. Nodes are tracked by identity, so several
/// nodes may share one id; nodes gone from the document drop out on the next
/// scan.
pub struct ElementRegistry<E> {
    ids: BTreeSet<String>,
    listening: Vec<(E, Channel)>,
    on_load_fired: Vec<(E, u64)>,
}

impl<E> Default for ElementRegistry<E> {
    fn default() -> Self {
        Self {
            ids: BTreeSet::new(),
            listening: Vec::new(),
            on_load_fired: Vec::new(),
        }
    }
}

impl<E: Clone + PartialEq> ElementRegistry<E> {
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Scans the document. `generation` identifies the socket the scan runs
    /// for; on-load events fire at most once per node per generation.
    pub fn scan<H>(
        &mut self,
        host: &H,
        config: &ClientConfig,
        path: &str,
        generation: u64,
    ) -> ScanOutcome<E>
    where
        H: HostBindings<Element = E>,
    {
        let markers = &config.markers;
        let mut next = Self::default();
        let mut outcome = ScanOutcome::default();

        for element in host.elements_by_class(&markers.input_class) {
            let Some(id) = next.identify(host, &element, Role::Input, markers, &mut outcome) else {
                continue;
            };
            let channel = input_channel(&host.input_type(&element));
            self.listen(&mut next, id, element, channel, &mut outcome);
        }

        for element in host.elements_by_class(&markers.on_load_class) {
            let Some(id) = next.identify(host, &element, Role::OnLoad, markers, &mut outcome) else {
                continue;
            };
            let fired = self
                .on_load_fired
                .iter()
                .any(|(node, fired)| *node == element && *fired == generation);
            if !fired {
                outcome
                    .on_load
                    .push(OutgoingEvent::new(path, id, config.on_load_value.clone()));
            }
            next.on_load_fired.push((element, generation));
        }

        for element in host.elements_by_class(&markers.on_enter_class) {
            let Some(id) = next.identify(host, &element, Role::OnEnter, markers, &mut outcome)
            else {
                continue;
            };
            self.listen(&mut next, id, element, Channel::EnterKey, &mut outcome);
        }

        // Patches address these by id, so they still need one.
        for element in host.elements_by_class(&markers.metric_prefix_class) {
            next.identify(host, &element, Role::MetricPrefix, markers, &mut outcome);
        }

        for element in host.elements_with_attribute(&markers.callback_attribute) {
            next.identify(host, &element, Role::Callback, markers, &mut outcome);
        }

        *self = next;
        outcome
    }

    fn identify<H>(
        &mut self,
        host: &H,
        element: &E,
        role: Role,
        markers: &Markers,
        outcome: &mut ScanOutcome<E>,
    ) -> Option<String>
    where
        H: HostBindings<Element = E>,
    {
        let Some(id) = resolve_identifier(host, element) else {
            let err = BindingError::MissingIdentifier {
                marker: role.marker(markers).to_string(),
            };
            warn!("{err}");
            outcome.skipped.push(err);
            return None;
        };

        self.ids.insert(id.clone());
        Some(id)
    }

    fn listen(
        &self,
        next: &mut Self,
        id: String,
        element: E,
        channel: Channel,
        outcome: &mut ScanOutcome<E>,
    ) {
        let installed = self
            .listening
            .iter()
            .any(|(node, listening)| *node == element && *listening == channel);
        if !installed {
            outcome.bindings.push(Binding {
                id,
                element: element.clone(),
                channel,
            });
        }
        next.listening.push((element, channel));
    }
}

/// The element's id, or its name promoted to id. `None` when it has neither.
pub fn resolve_identifier<H: HostBindings>(host: &H, element: &H::Element) -> Option<String> {
    if let Some(id) = host.element_id(element) {
        return Some(id);
    }

    let name = host
        .attribute(element, "name")
        .filter(|name| !name.is_empty())?;
    host.set_element_id(element, &name);
    Some(name)
}

pub fn input_channel(input_type: &str) -> Channel {
    match input_type {
        "button" => Channel::Click,
        "file" => Channel::FileUpload,
        _ => Channel::InputChange,
    }
}

/// Binds the document once the socket is open, polling on a fixed delay while
/// it is still connecting. At most one poll and one ready wait are pending.
pub(crate) fn attach<H: HostBindings>(inner: &Rc<ClientInner<H>>) {
    let state = inner.connection.borrow().state();
    match state {
        ConnectionState::Open => {}
        ConnectionState::Connecting => {
            if inner.attach_pending.replace(true) {
                debug!("attach already waiting for the socket");
                return;
            }
            let weak = Rc::downgrade(inner);
            inner.host.set_timeout(
                inner.config.attach_retry_ms,
                Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.attach_pending.set(false);
                        attach(&inner);
                    }
                }),
            );
            return;
        }
        state => {
            debug!("attach dropped; connection is {state}");
            return;
        }
    }

    scan_and_bind(inner);

    if !inner.host.is_document_ready() && !inner.ready_scan_pending.replace(true) {
        let weak = Rc::downgrade(inner);
        inner.host.on_document_ready(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ready_scan_pending.set(false);
                scan_and_bind(&inner);
            }
        }));
    }
}

fn scan_and_bind<H: HostBindings>(inner: &Rc<ClientInner<H>>) {
    let (state, generation) = {
        let connection = inner.connection.borrow();
        (connection.state(), connection.generation())
    };
    if state != ConnectionState::Open {
        debug!("scan skipped; connection is {state}");
        return;
    }

    let path = inner.host.location_path();
    let outcome = inner
        .registry
        .borrow_mut()
        .scan(&inner.host, &inner.config, &path, generation);

    debug!(
        "scan bound {} listener(s), {} on-load event(s), skipped {}",
        outcome.bindings.len(),
        outcome.on_load.len(),
        outcome.skipped.len()
    );

    for binding in outcome.bindings {
        debug!("forwarding {:?} from `{}`", binding.channel, binding.id);
        forwarder::install(inner, binding.element, binding.channel);
    }

    for event in &outcome.on_load {
        if let Err(err) = forwarder::send_event(inner, event) {
            warn!("on-load event for `{}` not sent: {err}", event.id);
        }
    }
}
