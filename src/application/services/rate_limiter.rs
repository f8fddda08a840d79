//! Fixed-window request counting per (caller, endpoint class).
//!
//! # Algorithm
//!
//! On every [`RateLimiter::admit`]:
//!
//! 1. Look up or create the counter for the key
//! 2. If `now >= window_start + window`, reset `count` to 0 and start a new window at `now`
//! 3. If `count >= limit`, deny with `retry_after = window_start + window - now`
//! 4. Otherwise increment `count` and allow
//!
//! Steps 1-4 run while holding the key's entry in a sharded [`DashMap`], so
//! concurrent requests for the same key serialize and never double-admit,
//! while keys living in other shards proceed in parallel. The guard is never
//! held across an `.await`.
//!
//! Elapsed counters are reset lazily on access and dropped by
//! [`RateLimiter::sweep_expired`]; a missing counter is the same as an empty
//! window.

use axum::http::Method;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::utils::clock::Clock;

/// Endpoint grouping that selects which limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Read,
    Write,
}

impl EndpointClass {
    /// Safe methods count against the read limit, everything else against write.
    pub fn from_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            EndpointClass::Read
        } else {
            EndpointClass::Write
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Read => "read",
            EndpointClass::Write => "write",
        }
    }
}

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Verified token subject.
    Identity(String),
    /// Client address, for requests without an identity.
    Ip(IpAddr),
    /// Neither identity nor address known.
    Anonymous,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Identity(sub) => write!(f, "sub:{sub}"),
            Subject::Ip(ip) => write!(f, "ip:{ip}"),
            Subject::Anonymous => f.write_str("anonymous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub subject: Subject,
    pub class: EndpointClass,
}

impl RateLimitKey {
    pub fn new(subject: Subject, class: EndpointClass) -> Self {
        Self { subject, class }
    }
}

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub limit: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Limits per endpoint class, from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub read: WindowLimit,
    pub write: WindowLimit,
}

impl RateLimits {
    pub fn for_class(&self, class: EndpointClass) -> WindowLimit {
        match class {
            EndpointClass::Read => self.read,
            EndpointClass::Write => self.write,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            read: WindowLimit::new(120, Duration::seconds(60)),
            write: WindowLimit::new(30, Duration::seconds(60)),
        }
    }
}

/// Requests seen for one key in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub limit: u32,
    pub window: Duration,
}

impl WindowCounter {
    fn fresh(now: DateTime<Utc>, limit: WindowLimit) -> Self {
        Self {
            count: 0,
            window_start: now,
            limit: limit.limit,
            window: limit.window,
        }
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_start + self.window
    }

    fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_end()
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: std::time::Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Concurrency-safe fixed-window limiter.
pub struct RateLimiter {
    counters: DashMap<RateLimitKey, WindowCounter>,
    limits: RateLimits,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            limits,
            clock,
        }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Counts one request against `key` if the window has room.
    pub fn admit(&self, key: &RateLimitKey) -> Admission {
        let now = self.clock.now();
        let limit = self.limits.for_class(key.class);

        let mut counter = self
            .counters
            .entry(key.clone())
            .or_insert_with(|| WindowCounter::fresh(now, limit));

        if counter.is_elapsed(now) {
            *counter = WindowCounter::fresh(now, limit);
        }

        if counter.count >= counter.limit {
            let retry_after = (counter.window_end() - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            drop(counter);

            tracing::debug!(
                subject = %key.subject,
                class = key.class.as_str(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            metrics::counter!("rate_limit_denied_total", "class" => key.class.as_str())
                .increment(1);

            return Admission::Denied { retry_after };
        }

        counter.count += 1;
        Admission::Allowed {
            remaining: counter.limit - counter.count,
        }
    }

    /// Current counter for `key`, if one exists.
    pub fn snapshot(&self, key: &RateLimitKey) -> Option<WindowCounter> {
        self.counters.get(key).map(|c| *c)
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drops counters whose window has elapsed. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_elapsed(now));
        before.saturating_sub(self.counters.len())
    }
}
