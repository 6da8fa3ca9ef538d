use std::collections::HashMap;
use std::rc::Rc;

use crate::error::CallbackError;

pub type ElementCallback<E> = Rc<dyn Fn(&E)>;
pub type PageCallback = Rc<dyn Fn()>;

/// Named callbacks the hosting application exposes to patches.
///
/// Element callbacks are named by an element's callback attribute and receive
/// that element after a patch touched it. Page callbacks are named by the body
/// and run once per applied patch.
pub struct CallbackRegistry<E> {
    element: HashMap<String, ElementCallback<E>>,
    page: HashMap<String, PageCallback>,
}

impl<E> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self {
            element: HashMap::new(),
            page: HashMap::new(),
        }
    }
}

impl<E> CallbackRegistry<E> {
    pub fn register_element<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&E) + 'static,
    {
        self.element.insert(name.into(), Rc::new(callback));
    }

    pub fn register_page<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn() + 'static,
    {
        self.page.insert(name.into(), Rc::new(callback));
    }

    /// Removes callbacks of either kind registered under `name`.
    pub fn unregister(&mut self, name: &str) -> bool {
        let element = self.element.remove(name).is_some();
        let page = self.page.remove(name).is_some();
        element || page
    }

    pub fn element(&self, name: &str) -> Result<ElementCallback<E>, CallbackError> {
        self.element
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::NoSuchCallback(name.to_string()))
    }

    pub fn page(&self, name: &str) -> Result<PageCallback, CallbackError> {
        self.page
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::NoSuchCallback(name.to_string()))
    }
}
