//! In-process transport that never touches the network.
//!
//! Every request is recorded and answered by a responder function, `200 OK`
//! unless configured otherwise. Useful for exercising virtual users and the
//! runner without an ingestion service.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use loadgen_profile::Request;

use crate::transport::{Error, StatusCode, Transport};

type Responder = Box<dyn Fn(&Request) -> Result<StatusCode, Error> + Send + Sync>;

pub struct SimulatorTransport {
    requests: Mutex<Vec<Request>>,
    responder: Responder,
}

impl Default for SimulatorTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatorTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorTransport")
            .field("requests", &self.len())
            .finish_non_exhaustive()
    }
}

impl SimulatorTransport {
    /// A transport that answers every request with `200 OK`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// A transport that answers every request with `status`.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self::with_responder(move |_| Ok(status))
    }

    #[must_use]
    pub fn with_responder(
        responder: impl Fn(&Request) -> Result<StatusCode, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(vec![]),
            responder: Box::new(responder),
        }
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Transport for SimulatorTransport {
    async fn send(&self, request: &Request) -> Result<StatusCode, Error> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        (self.responder)(request)
    }
}
