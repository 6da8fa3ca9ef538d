use std::cell::RefCell;

use log::{debug, trace, warn};
use serde_json::Value;

use crate::callbacks::CallbackRegistry;
use crate::config::ClientConfig;
use crate::host::HostBindings;
use crate::metric;
use crate::protocol::IncomingPatch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The patch targeted another view and was dropped whole.
    pub discarded: bool,
    pub applied: Vec<String>,
    pub missing: Vec<String>,
    pub malformed: Vec<String>,
}

pub fn apply<H: HostBindings>(
    host: &H,
    config: &ClientConfig,
    callbacks: &RefCell<CallbackRegistry<H::Element>>,
    patch: &IncomingPatch,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    let current_path = host.location_path();
    if !patch.targets(&current_path) {
        debug!(
            "discarding patch for {} while at {current_path}",
            patch.path
        );
        outcome.discarded = true;
        return outcome;
    }

    for (id, properties) in &patch.elements {
        let Some(properties) = properties.as_object() else {
            warn!("patch entry for `{id}` is not an object; skipped");
            outcome.malformed.push(id.clone());
            continue;
        };

        let Some(element) = host.element_by_id(id) else {
            warn!("patch references missing element `{id}`; skipped");
            outcome.missing.push(id.clone());
            continue;
        };

        for (name, value) in properties {
            if let Err(err) = host.set_property(&element, name, value) {
                warn!("patch for `{id}`: {err}");
            }
        }

        if host.has_class(&element, &config.markers.metric_prefix_class) {
            apply_metric_prefix(host, config, &element);
        }

        if let Some(name) = host.attribute(&element, &config.markers.callback_attribute) {
            invoke_element_callback(callbacks, &name, &element);
        }

        outcome.applied.push(id.clone());
    }

    invoke_page_callback(host, config, callbacks);

    outcome
}

/// Rewrites the element's display and value from its `num`, `unit` and
/// `sigfig`. Returns `false` when skipped because the element has focus.
pub fn apply_metric_prefix<H: HostBindings>(
    host: &H,
    config: &ClientConfig,
    element: &H::Element,
) -> bool {
    if host.has_focus(element) {
        trace!("metric prefix skipped for focused element");
        return false;
    }

    let markers = &config.markers;
    let number = lookup(host, element, "num").unwrap_or(Value::Null);
    let unit = lookup(host, element, &markers.unit_attribute)
        .map(|unit| match unit {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let significant_figures = lookup(host, element, &markers.sigfig_attribute)
        .and_then(|value| parse_significant_figures(&value))
        .unwrap_or(config.default_significant_figures);

    let text = Value::String(metric::format(&number, &unit, significant_figures));

    for surface in [markers.display_property.as_str(), "value"] {
        if let Err(err) = host.set_property(element, surface, &text) {
            warn!("metric prefix: {err}");
        }
    }

    true
}

/// Live property first, then the attribute of the same name.
fn lookup<H: HostBindings>(host: &H, element: &H::Element, name: &str) -> Option<Value> {
    host.property(element, name)
        .filter(|value| !value.is_null())
        .or_else(|| host.attribute(element, name).map(Value::String))
}

fn parse_significant_figures(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
    .filter(|figures| *figures > 0)
}

fn invoke_element_callback<E>(callbacks: &RefCell<CallbackRegistry<E>>, name: &str, element: &E) {
    let resolved = callbacks.borrow().element(name);
    match resolved {
        Ok(callback) => callback(element),
        Err(err) => trace!("{err}"),
    }
}

fn invoke_page_callback<H: HostBindings>(
    host: &H,
    config: &ClientConfig,
    callbacks: &RefCell<CallbackRegistry<H::Element>>,
) {
    let Some(body) = host.body() else {
        return;
    };
    let Some(name) = host.attribute(&body, &config.markers.page_callback_attribute) else {
        return;
    };

    let resolved = callbacks.borrow().page(&name);
    match resolved {
        Ok(callback) => callback(),
        Err(err) => trace!("{err}"),
    }
}
