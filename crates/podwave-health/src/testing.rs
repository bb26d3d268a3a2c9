//! Scripted [`Prober`] for tests.
//!
//! Each URL has a queue of results; the last one repeats once the queue
//! is drained. URLs without a script fail to connect.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::probe::{ProbeError, ProbeFuture, ProbeRequest, ProbeResponse, Prober};

type Script = VecDeque<Result<ProbeResponse, ProbeError>>;

#[derive(Debug, Default)]
struct Inner {
    scripts: HashMap<String, Script>,
    calls: HashMap<String, u32>,
    requests: Vec<ProbeRequest>,
}

#[derive(Debug, Default)]
pub struct ScriptedProber {
    inner: Mutex<Inner>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `response`.
    pub fn respond(self, url: &str, response: ProbeResponse) -> Self {
        self.sequence(url, vec![Ok(response)])
    }

    /// Answer `url` with `results` in order, repeating the last one.
    pub fn sequence(self, url: &str, results: Vec<Result<ProbeResponse, ProbeError>>) -> Self {
        self.lock()
            .scripts
            .insert(url.to_string(), results.into_iter().collect());
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.lock().calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.lock().calls.values().sum()
    }

    /// Every request seen, in order.
    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        let mut inner = self.lock();
        *inner.calls.entry(request.url.clone()).or_insert(0) += 1;
        inner.requests.push(request.clone());

        let Some(script) = inner.scripts.get_mut(&request.url) else {
            return Err(ProbeError::Connect {
                address: request.url.clone(),
                reason: "connection refused".to_string(),
            });
        };
        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| unscripted(request))
        } else {
            script.front().cloned().unwrap_or_else(|| unscripted(request))
        }
    }
}

fn unscripted(request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
    Err(ProbeError::Http(format!("no scripted response for {}", request.url)))
}

impl Prober for ScriptedProber {
    fn probe<'a>(&'a self, request: &'a ProbeRequest) -> ProbeFuture<'a> {
        Box::pin(async move { self.next(request) })
    }
}
