use serde::Deserialize;

use crate::protocol::INBOUND_FRAME_CAP;

const DEFAULT_STATUS_ELEMENT_ID: &str = "websocket-status";
const DEFAULT_ATTACH_RETRY_MS: u32 = 100;
const DEFAULT_ON_LOAD_VALUE: &str = "on-load";
const DEFAULT_SIGNIFICANT_FIGURES: u32 = 3;

/// Client options, usually handed over by the hosting page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Endpoint override. Defaults to the page's own host and port.
    pub url: Option<String>,
    pub status_element_id: String,
    /// Delay between attach attempts made before the socket is open.
    pub attach_retry_ms: u32,
    pub on_load_value: String,
    pub default_significant_figures: u32,
    pub max_inbound_frame: usize,
    pub log_level: String,
    pub markers: Markers,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            status_element_id: DEFAULT_STATUS_ELEMENT_ID.to_string(),
            attach_retry_ms: DEFAULT_ATTACH_RETRY_MS,
            on_load_value: DEFAULT_ON_LOAD_VALUE.to_string(),
            default_significant_figures: DEFAULT_SIGNIFICANT_FIGURES,
            max_inbound_frame: INBOUND_FRAME_CAP,
            log_level: "info".to_string(),
            markers: Markers::default(),
        }
    }
}

impl ClientConfig {
    pub fn endpoint_url(&self, hostname: &str, port: &str) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        if port.is_empty() {
            format!("ws://{hostname}")
        } else {
            format!("ws://{hostname}:{port}")
        }
    }
}

/// The declarative class and attribute vocabulary read from the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Markers {
    pub input_class: String,
    pub on_load_class: String,
    pub on_enter_class: String,
    pub metric_prefix_class: String,
    pub callback_attribute: String,
    /// Read from the body element.
    pub page_callback_attribute: String,
    pub unit_attribute: String,
    pub sigfig_attribute: String,
    pub display_property: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            input_class: "eb-input".to_string(),
            on_load_class: "eb-onload".to_string(),
            on_enter_class: "eb-onenter".to_string(),
            metric_prefix_class: "eb-metric-prefix".to_string(),
            callback_attribute: "eb-callback".to_string(),
            page_callback_attribute: "eb-onmessage".to_string(),
            unit_attribute: "unit".to_string(),
            sigfig_attribute: "sigfig".to_string(),
            display_property: "innerHTML".to_string(),
        }
    }
}
