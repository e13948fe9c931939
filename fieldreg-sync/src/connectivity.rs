//! Connectivity monitor: current state plus edge-triggered transitions.
//!
//! Edge-triggering keeps drain attempts proportional to actual connectivity
//! changes instead of to time: under flapping connectivity each transition
//! fires exactly one event, and repeated observations of the same state fire
//! none.

use std::time::Duration;

/// Current-state view of the network, injected wherever a component needs to
/// decide between "submit now" and "queue for later".
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// A state *transition*, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// offline → online: triggers an automatic drain attempt.
    CameOnline,
    /// online → offline: informational only.
    WentOffline,
}

/// Turns a stream of boolean observations into edges.
///
/// The first observation primes the detector and is not an edge; startup
/// catch-up is handled by an explicit initial drain, not a synthetic edge.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: Option<bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation, returning the edge it produced, if any.
    pub fn observe(&mut self, online: bool) -> Option<Edge> {
        let edge = match self.last {
            Some(prev) if prev == online => None,
            Some(false) => Some(Edge::CameOnline),
            Some(true) => Some(Edge::WentOffline),
            None => None,
        };
        self.last = Some(online);
        edge
    }

    /// Last observed state, if any observation has been made.
    pub fn last_state(&self) -> Option<bool> {
        self.last
    }
}

/// Edge detector with a subscriber list: each registered callback is invoked
/// exactly once per transition.
pub struct ConnectivityWatcher {
    detector: EdgeDetector,
    subscribers: Vec<Box<dyn Fn(Edge) + Send>>,
}

impl ConnectivityWatcher {
    pub fn new() -> Self {
        Self {
            detector: EdgeDetector::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl Fn(Edge) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// Feed one observation through the detector, notifying subscribers on a
    /// transition. Returns the edge for callers that also want it inline.
    pub fn observe(&mut self, online: bool) -> Option<Edge> {
        let edge = self.detector.observe(online)?;
        for subscriber in &self.subscribers {
            subscriber(edge);
        }
        Some(edge)
    }

    pub fn last_state(&self) -> Option<bool> {
        self.detector.last_state()
    }
}

impl Default for ConnectivityWatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// HTTP probe
// ---------------------------------------------------------------------------

/// Probes the submission endpoint with a short-timeout HEAD request.
///
/// Any HTTP response, even an error status, means the server is reachable,
/// so only transport failures count as offline.
#[derive(Debug, Clone)]
pub struct HttpConnectivity {
    agent: ureq::Agent,
    probe_url: String,
}

impl HttpConnectivity {
    pub fn new(probe_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            probe_url: probe_url.into(),
        }
    }
}

impl Connectivity for HttpConnectivity {
    fn is_online(&self) -> bool {
        match self.agent.head(&self.probe_url).call() {
            Ok(_) | Err(ureq::Error::Status(_, _)) => true,
            Err(ureq::Error::Transport(transport)) => {
                tracing::debug!("connectivity probe failed: {}", transport);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
