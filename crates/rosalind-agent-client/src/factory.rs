// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-scoped client registry.
//!
//! The application builds one factory at startup and injects it; handlers
//! share the cached client, while tools and tests can ask for isolated ones.

use std::sync::{Arc, Mutex, PoisonError};

use rosalind_core::RosalindError;
use tracing::debug;

use crate::client::{AgentClient, ClientOptions};

#[derive(Debug)]
pub struct ClientFactory {
    defaults: ClientOptions,
    shared: Mutex<Option<Arc<AgentClient>>>,
}

impl ClientFactory {
    pub fn new(defaults: ClientOptions) -> Self {
        Self {
            defaults,
            shared: Mutex::new(None),
        }
    }

    /// Without options, return the cached client (building it on first use).
    /// With options, build a fresh client and make it the cached one.
    pub fn get_client(
        &self,
        options: Option<ClientOptions>,
    ) -> Result<Arc<AgentClient>, RosalindError> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        match options {
            None => {
                if let Some(client) = shared.as_ref() {
                    return Ok(Arc::clone(client));
                }
                let client = Arc::new(AgentClient::new(self.defaults.clone())?);
                debug!("agent client created");
                *shared = Some(Arc::clone(&client));
                Ok(client)
            }
            Some(options) => {
                let client = Arc::new(AgentClient::new(options)?);
                debug!("agent client replaced");
                *shared = Some(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// Shorthand for the cached client.
    pub fn shared(&self) -> Result<Arc<AgentClient>, RosalindError> {
        self.get_client(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn no_options_returns_the_same_instance() {
        let factory = ClientFactory::new(ClientOptions::default());
        let a = factory.get_client(None).unwrap();
        let b = factory.get_client(None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn options_build_a_distinct_instance() {
        let factory = ClientFactory::new(ClientOptions::default());
        let shared = factory.get_client(None).unwrap();
        let custom = factory
            .get_client(Some(ClientOptions {
                timeout: Duration::from_millis(250),
                ..ClientOptions::default()
            }))
            .unwrap();
        assert!(!Arc::ptr_eq(&shared, &custom));
        // The fresh instance replaces the cached one.
        assert!(Arc::ptr_eq(&custom, &factory.shared().unwrap()));
    }
}
