// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Collaborators
//!
//! In-memory implementations of the collaborator traits for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::transport::{
    EndpointMaterial, LocationSource, SharingEndpoint, SharingService, StatusResponder,
    StatusTransport, TransportCredentials, TransportError,
};
use crate::location::{LocationFix, LocationTracker};

/// A recorded status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub certificate: String,
    pub peer_certificate: String,
    pub peer_routing_address: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
enum MockReply {
    Reply(Result<String, TransportError>),
    Panic,
}

/// Mock transport serving canned replies per routing address.
///
/// One-shot replies queued with [`queue_response`](Self::queue_response) are
/// used first, then the standing reply from
/// [`set_response`](Self::set_response). Unknown addresses are unreachable.
#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<MockReply>>>,
    standing: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply returned for every request to `address`.
    pub fn set_response(&self, address: &str, response: Result<String, TransportError>) {
        self.standing
            .lock()
            .insert(address.to_string(), MockReply::Reply(response));
    }

    /// Queues a reply for the next request to `address`.
    pub fn queue_response(&self, address: &str, response: Result<String, TransportError>) {
        self.queued
            .lock()
            .entry(address.to_string())
            .or_default()
            .push_back(MockReply::Reply(response));
    }

    /// Makes the next request to `address` panic.
    pub fn queue_panic(&self, address: &str) {
        self.queued
            .lock()
            .entry(address.to_string())
            .or_default()
            .push_back(MockReply::Panic);
    }

    /// Returns all requests made so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made to `address`.
    pub fn request_count(&self, address: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.peer_routing_address == address)
            .count()
    }

    fn next_reply(&self, address: &str) -> MockReply {
        if let Some(reply) = self
            .queued
            .lock()
            .get_mut(address)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.standing
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_else(|| {
                MockReply::Reply(Err(TransportError::Unreachable(address.to_string())))
            })
    }
}

impl StatusTransport for MockTransport {
    fn fetch_status(
        &self,
        credentials: &TransportCredentials,
        peer_certificate: &str,
        peer_routing_address: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.requests.lock().push(FetchRequest {
            certificate: credentials.certificate.clone(),
            peer_certificate: peer_certificate.to_string(),
            peer_routing_address: peer_routing_address.to_string(),
            timeout,
        });

        match self.next_reply(peer_routing_address) {
            MockReply::Reply(reply) => reply,
            MockReply::Panic => panic!("mock transport failure for {}", peer_routing_address),
        }
    }
}

#[derive(Debug, Default)]
struct SharingCounters {
    active: AtomicUsize,
    max_active: AtomicUsize,
    stops: AtomicUsize,
    authorized: Mutex<Vec<String>>,
}

/// Mock sharing service tracking endpoint lifetimes.
#[derive(Default)]
pub struct MockSharingService {
    counters: Arc<SharingCounters>,
    launches: Mutex<Vec<EndpointMaterial>>,
    responder: Mutex<Option<StatusResponder>>,
    fail_next: Mutex<Option<TransportError>>,
}

impl MockSharingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next launch fail.
    pub fn fail_next_launch(&self, error: TransportError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Key material of every launch, oldest first.
    pub fn launches(&self) -> Vec<EndpointMaterial> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    /// Endpoints launched and not yet stopped.
    pub fn active_endpoints(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of endpoints that were ever running at once.
    pub fn max_concurrent_endpoints(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Access list of the most recent endpoint.
    pub fn authorized_certificates(&self) -> Vec<String> {
        self.counters.authorized.lock().clone()
    }

    /// Responder handed to the most recent endpoint.
    pub fn responder(&self) -> Option<StatusResponder> {
        self.responder.lock().clone()
    }
}

impl SharingService for MockSharingService {
    fn launch(
        &self,
        material: EndpointMaterial,
        responder: StatusResponder,
    ) -> Result<Box<dyn SharingEndpoint>, TransportError> {
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);
        *self.counters.authorized.lock() = material.authorized_certificates.clone();
        *self.responder.lock() = Some(responder);
        self.launches.lock().push(material);

        Ok(Box::new(MockEndpoint {
            counters: Arc::clone(&self.counters),
            stopped: false,
        }))
    }
}

struct MockEndpoint {
    counters: Arc<SharingCounters>,
    stopped: bool,
}

impl SharingEndpoint for MockEndpoint {
    fn set_authorized_certificates(&mut self, certificates: Vec<String>) {
        *self.counters.authorized.lock() = certificates;
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Mock location source driven by [`push`](Self::push).
#[derive(Debug, Default)]
pub struct MockLocationSource {
    tracker: Mutex<Option<Arc<LocationTracker>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.tracker.lock().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Delivers a fix as a provider would. Returns false when stopped or
    /// when the fix did not beat the current best.
    pub fn push(&self, fix: LocationFix) -> bool {
        match self.tracker.lock().as_ref() {
            Some(tracker) => tracker.offer(fix),
            None => false,
        }
    }
}

impl LocationSource for MockLocationSource {
    fn start(&self, tracker: Arc<LocationTracker>) -> Result<(), TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.tracker.lock() = Some(tracker);
        Ok(())
    }

    fn stop(&self) {
        if self.tracker.lock().take().is_some() {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
