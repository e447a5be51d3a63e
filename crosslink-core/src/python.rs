//! Python bindings for server-side code.

use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::LinkConfig;
use crate::error::Error;
use crate::key::RowKey;
use crate::session::Session;

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn to_keys(keys: Vec<String>) -> Vec<RowKey> {
    keys.into_iter().map(RowKey::from).collect()
}

fn from_keys<'a>(keys: impl IntoIterator<Item = &'a RowKey>) -> Vec<String> {
    keys.into_iter().map(|k| k.as_str().to_string()).collect()
}

/// Python-exposed session.
///
/// Writes from Python are server-origin mutations; they are delivered to
/// every attached consumer of the group.
#[pyclass(name = "LinkSession")]
pub struct PyLinkSession {
    session: Arc<Session>,
}

#[pymethods]
impl PyLinkSession {
    /// Create a session, optionally from a JSON configuration document.
    #[new]
    #[pyo3(signature = (config = None))]
    fn new(config: Option<&str>) -> PyResult<Self> {
        let config = match config {
            Some(text) => LinkConfig::from_json(text)?,
            None => LinkConfig::default(),
        };
        Ok(Self {
            session: Arc::new(Session::new(config)),
        })
    }

    fn select(&self, group: &str, keys: Vec<String>) -> PyResult<bool> {
        let outcome = self.session.group(group)?.server_set_selection(Some(to_keys(keys)));
        Ok(outcome.is_applied())
    }

    fn clear_selection(&self, group: &str) -> PyResult<bool> {
        let outcome = self.session.group(group)?.server_set_selection(None);
        Ok(outcome.is_applied())
    }

    /// The selected keys and whether the selection is active.
    fn selection(&self, group: &str) -> PyResult<(Vec<String>, bool)> {
        let state = self.session.group(group)?.selection();
        let (keys, active) = state.get();
        Ok((from_keys(keys), active))
    }

    #[pyo3(signature = (group, keys = None))]
    fn set_filter(&self, group: &str, keys: Option<Vec<String>>) -> PyResult<bool> {
        let outcome = self.session.group(group)?.server_set_filter(keys.map(to_keys));
        Ok(outcome.is_applied())
    }

    /// Keys visible under every filter source, or `None` when unrestricted.
    fn visible(&self, group: &str) -> PyResult<Option<Vec<String>>> {
        let visible = self.session.group(group)?.visible();
        Ok(visible.as_ref().map(|keys| from_keys(keys)))
    }

    /// Deliver all pending notifications that are due now.
    fn flush(&self) -> usize {
        self.session.flush(tokio::time::Instant::now())
    }

    fn close(&self) {
        self.session.close();
    }

    #[getter]
    fn closed(&self) -> bool {
        self.session.is_closed()
    }

    fn __repr__(&self) -> String {
        format!(
            "LinkSession(groups={}, closed={})",
            self.session.group_count(),
            self.session.is_closed()
        )
    }
}
