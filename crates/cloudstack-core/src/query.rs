//! Command parameter builder.
//!
//! CloudStack commands are plain key/value string parameters. [`ApiParams`] collects them from
//! typed inputs, and [`ApiRequest`] pairs them with the command name handed to an
//! [`ApiCaller`](crate::client::ApiCaller). [`ApiCommand`] ties a typed request to the
//! envelope its response decodes into.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Builder for command parameters.
///
/// Setting a key twice keeps the last value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApiParams {
    pairs: BTreeMap<&'static str, String>,
}

impl ApiParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }

    /// Set a required key/value pair.
    pub fn set<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.insert(key, value.to_string());
    }

    /// Set a key/value pair when the value is present.
    ///
    /// A present empty string is still sent; only `None` is skipped.
    pub fn set_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Set a key to the comma-joined rendering of `values`.
    pub fn set_list<I, T>(&mut self, key: &'static str, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let joined = values
            .into_iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.pairs.insert(key, joined);
    }

    /// Look up the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Returns true if `key` has been set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    /// Number of parameters collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the collected pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.pairs.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs.into_iter().collect()
    }
}

/// A single CloudStack command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    command: &'static str,
    params: ApiParams,
}

impl ApiRequest {
    /// Create a request for `command` with the given parameters.
    #[must_use]
    pub fn new(command: &'static str, params: ApiParams) -> Self {
        Self { command, params }
    }

    /// The command name, e.g. `deployVirtualMachine`.
    #[must_use]
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// The command parameters.
    #[must_use]
    pub fn params(&self) -> &ApiParams {
        &self.params
    }

    /// The top-level key CloudStack wraps this command's response in.
    #[must_use]
    pub fn envelope_key(&self) -> String {
        format!("{}response", self.command.to_lowercase())
    }
}

/// A typed CloudStack command.
///
/// Each command names itself, renders its parameters, and declares the response envelope it
/// decodes into. Envelopes are command specific and never shared.
pub trait ApiCommand {
    /// Command name sent as the `command` parameter.
    const NAME: &'static str;

    /// Envelope the response body decodes into.
    type Response: DeserializeOwned;

    /// Render the command parameters.
    fn to_params(&self) -> ApiParams;

    /// Build the request for this command.
    fn to_request(&self) -> ApiRequest {
        ApiRequest::new(Self::NAME, self.to_params())
    }
}
