//! In-memory collaborators for supervisor and watcher tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;

use sl_core::error::{ProtocolError, TransportError};
use sl_core::traits::{
    CoordinatorDiscovery, NodeRegistrar, NodeRegistration, NodeTransport, Restarter,
};
use sl_core::{Candidate, LabelSet};

pub fn candidate() -> Candidate {
    Candidate::new(Url::parse("http://ci.example.com/").unwrap(), "secret")
}

fn failure(operation: &'static str) -> ProtocolError {
    ProtocolError::BadStatus {
        operation,
        status: 500,
        body: "injected".to_string(),
    }
}

/// Discovery that always succeeds or always fails
pub struct FakeDiscovery {
    pub fail: bool,
    pub discover_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl FakeDiscovery {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            discover_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CoordinatorDiscovery for FakeDiscovery {
    async fn discover(&self) -> Result<Candidate, ProtocolError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ProtocolError::NoResponse {
                address: "test".to_string(),
            })
        } else {
            Ok(candidate())
        }
    }

    async fn verify(&self, _candidate: &Candidate) -> Result<(), ProtocolError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Call recorded by [`FakeRegistrar`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Create(String),
    Get(String),
    Add(String, String),
    Remove(String, String),
}

/// Registry that records calls and can be told to fail specific ones
#[derive(Default)]
pub struct FakeRegistrar {
    pub assigned_name: Option<String>,
    pub fail_create: bool,
    pub fail_get: bool,
    pub fail_add: bool,
    pub fail_remove: bool,
    pub current_labels: Mutex<LabelSet>,
    pub calls: Mutex<Vec<RegistryCall>>,
    pub registered_labels: Mutex<VecDeque<LabelSet>>,
}

impl FakeRegistrar {
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RegistryCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NodeRegistrar for FakeRegistrar {
    async fn create_node(
        &self,
        _candidate: &Candidate,
        registration: &NodeRegistration,
    ) -> Result<String, ProtocolError> {
        self.record(RegistryCall::Create(registration.name.clone()));
        if self.fail_create {
            return Err(failure("create node"));
        }
        self.registered_labels
            .lock()
            .unwrap()
            .push_back(registration.labels.clone());
        *self.current_labels.lock().unwrap() = registration.labels.clone();
        Ok(self
            .assigned_name
            .clone()
            .unwrap_or_else(|| registration.name.clone()))
    }

    async fn get_labels(
        &self,
        _candidate: &Candidate,
        name: &str,
    ) -> Result<LabelSet, ProtocolError> {
        self.record(RegistryCall::Get(name.to_string()));
        if self.fail_get {
            return Err(failure("get labels"));
        }
        Ok(self.current_labels.lock().unwrap().clone())
    }

    async fn add_labels(
        &self,
        _candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError> {
        self.record(RegistryCall::Add(name.to_string(), labels.joined()));
        if self.fail_add {
            return Err(failure("add labels"));
        }
        self.current_labels.lock().unwrap().extend(labels);
        Ok(())
    }

    async fn remove_labels(
        &self,
        _candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError> {
        self.record(RegistryCall::Remove(name.to_string(), labels.joined()));
        if self.fail_remove {
            return Err(failure("remove labels"));
        }
        let mut current = self.current_labels.lock().unwrap();
        *current = current.iter().filter(|l| !labels.contains(l)).collect();
        Ok(())
    }
}

/// Transport that returns immediately with a fixed result
pub struct FakeTransport {
    pub fail: bool,
    pub hold: std::time::Duration,
    pub connected_as: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            hold: std::time::Duration::ZERO,
            connected_as: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NodeTransport for FakeTransport {
    async fn connect(&self, _candidate: &Candidate, node_name: &str) -> Result<(), TransportError> {
        self.connected_as.lock().unwrap().push(node_name.to_string());
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        if self.fail {
            Err(TransportError::ConnectionLost("injected".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Restarter that only counts
#[derive(Default)]
pub struct FakeRestarter {
    pub restarts: Mutex<Vec<Vec<String>>>,
}

impl FakeRestarter {
    pub fn count(&self) -> usize {
        self.restarts.lock().unwrap().len()
    }
}

impl Restarter for FakeRestarter {
    fn restart(&self, argv: &[String]) -> std::io::Result<()> {
        self.restarts.lock().unwrap().push(argv.to_vec());
        Ok(())
    }
}
