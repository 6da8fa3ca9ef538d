mod bindings;

use std::str::FromStr;

use ehbanana_ui_runtime::{Client, ClientConfig};
use log::{Level, warn};
use wasm_bindgen::prelude::*;
use web_sys::Element;

pub use crate::bindings::{WebHost, WebSocketHandle};

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn parse_options(options: JsValue) -> Result<ClientConfig, JsError> {
    if options.is_undefined() || options.is_null() {
        return Ok(ClientConfig::default());
    }
    serde_wasm_bindgen::from_value(options)
        .map_err(|err| JsError::new(&format!("Invalid client options: {err}")))
}

fn init_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::Info);
    // A second client on the same page keeps the first logger.
    _ = console_log::init_with_level(level);
}

#[wasm_bindgen]
pub struct WebClient {
    client: Client<WebHost>,
}

#[wasm_bindgen]
impl WebClient {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<WebClient, JsError> {
        let config = parse_options(options)?;
        init_logging(&config.log_level);
        let host = WebHost::from_window().map_err(|err| JsError::new(&err.to_string()))?;
        Ok(Self {
            client: Client::new(host, config),
        })
    }

    pub fn connect(&self) -> Result<(), JsError> {
        self.client
            .connect()
            .map_err(|err| JsError::new(&err.to_string()))
    }

    pub fn attach(&self) {
        self.client.attach();
    }

    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    pub fn status(&self) -> String {
        self.client.state().as_str().to_string()
    }

    #[wasm_bindgen(js_name = "statusText")]
    pub fn status_text(&self) -> String {
        self.client.status_text()
    }

    #[wasm_bindgen(js_name = "boundIds")]
    pub fn bound_ids(&self) -> Vec<String> {
        self.client.bound_ids()
    }

    /// Registers `callback(element)` under `name` for elements whose callback
    /// attribute names it.
    #[wasm_bindgen(js_name = "registerCallback")]
    pub fn register_callback(&self, name: &str, callback: js_sys::Function) {
        let label = name.to_string();
        self.client
            .register_callback(name, move |element: &Element| {
                if let Err(err) = callback.call1(&JsValue::NULL, element) {
                    warn!("callback `{label}` threw: {err:?}");
                }
            });
    }

    #[wasm_bindgen(js_name = "registerPageCallback")]
    pub fn register_page_callback(&self, name: &str, callback: js_sys::Function) {
        let label = name.to_string();
        self.client.register_page_callback(name, move || {
            if let Err(err) = callback.call0(&JsValue::NULL) {
                warn!("page callback `{label}` threw: {err:?}");
            }
        });
    }

    #[wasm_bindgen(js_name = "unregisterCallback")]
    pub fn unregister_callback(&self, name: &str) -> bool {
        self.client.unregister_callback(name)
    }
}

/// Creates a client, opens its socket and binds the page once it is open.
#[wasm_bindgen]
pub fn connect(options: JsValue) -> Result<WebClient, JsError> {
    let client = WebClient::new(options)?;
    client.connect()?;
    client.attach();
    Ok(client)
}
