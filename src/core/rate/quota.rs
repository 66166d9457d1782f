//! Quota snapshots, request estimates and ceiling selection

use crate::adapters::georef::GeorefApi;
use crate::config::RateConfig;
use crate::domain::ApiError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A quota time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Second,
    Minute,
    Hour,
    Day,
}

impl Window {
    /// Windows from finest to coarsest
    pub const ALL: [Window; 4] = [Window::Second, Window::Minute, Window::Hour, Window::Day];

    pub fn seconds(&self) -> u64 {
        match self {
            Window::Second => 1,
            Window::Minute => 60,
            Window::Hour => 3_600,
            Window::Day => 86_400,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Window::Second => "second",
            Window::Minute => "minute",
            Window::Hour => "hour",
            Window::Day => "day",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Allowance of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub limit: u64,
    pub remaining: u64,
}

/// Remaining-vs-limit allowances of the four windows
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QuotaSnapshot {
    pub second: Option<Tier>,
    pub minute: Option<Tier>,
    pub hour: Option<Tier>,
    pub day: Option<Tier>,
}

impl QuotaSnapshot {
    /// Parses `x-ratelimit-{limit,remaining}-<window>` headers
    ///
    /// Header names must be lowercase. A window is known when both of its
    /// headers are present.
    ///
    /// # Errors
    ///
    /// `QuotaUnavailable` if a header value is not an unsigned integer or
    /// no window is known at all.
    pub fn from_headers(headers: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut snapshot = Self::default();

        for window in Window::ALL {
            let limit = parse_header(headers, &format!("x-ratelimit-limit-{window}"))?;
            let remaining = parse_header(headers, &format!("x-ratelimit-remaining-{window}"))?;
            if let (Some(limit), Some(remaining)) = (limit, remaining) {
                snapshot.set(
                    window,
                    Tier {
                        limit,
                        remaining: remaining.min(limit),
                    },
                );
            }
        }

        if snapshot.tiers().next().is_none() {
            return Err(ApiError::QuotaUnavailable(
                "no x-ratelimit headers in response".to_string(),
            ));
        }
        Ok(snapshot)
    }

    /// Conservative quota assumed when the API does not report one
    pub fn fallback(config: &RateConfig) -> Self {
        let full = |limit| {
            Some(Tier {
                limit,
                remaining: limit,
            })
        };
        Self {
            second: full(config.fallback_per_second),
            minute: full(config.fallback_per_minute),
            hour: full(config.fallback_per_hour),
            day: full(config.fallback_per_day),
        }
    }

    /// Probes the deployment once; any failure yields the fallback quota
    pub async fn probe(api: &dyn GeorefApi, config: &RateConfig) -> Self {
        let parsed = match api.quota_headers().await {
            Ok(headers) => Self::from_headers(&headers),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(snapshot) => {
                tracing::debug!(base_url = api.base_url(), quota = ?snapshot, "Quota snapshot");
                snapshot
            }
            Err(e) => {
                tracing::debug!(
                    base_url = api.base_url(),
                    reason = %e,
                    "Quota unavailable, using fallback"
                );
                Self::fallback(config)
            }
        }
    }

    pub fn tier(&self, window: Window) -> Option<Tier> {
        match window {
            Window::Second => self.second,
            Window::Minute => self.minute,
            Window::Hour => self.hour,
            Window::Day => self.day,
        }
    }

    fn set(&mut self, window: Window, tier: Tier) {
        match window {
            Window::Second => self.second = Some(tier),
            Window::Minute => self.minute = Some(tier),
            Window::Hour => self.hour = Some(tier),
            Window::Day => self.day = Some(tier),
        }
    }

    /// Known windows, finest first
    pub fn tiers(&self) -> impl Iterator<Item = (Window, Tier)> + '_ {
        Window::ALL
            .into_iter()
            .filter_map(|w| self.tier(w).map(|t| (w, t)))
    }
}

fn parse_header(headers: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            ApiError::QuotaUnavailable(format!("malformed header {name}: '{raw}'"))
        }),
    }
}

/// Expected request count of a bulk operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestEstimate {
    /// One request per batch
    pub base_requests: u64,
    /// Base requests plus the share expected to need per-item fallback
    pub total_requests: u64,
}

impl RequestEstimate {
    /// `⌈N/B⌉ + ⌈inflation × ⌈N/B⌉⌉`
    pub fn new(units: usize, batch_size: usize, retry_inflation: f64) -> Self {
        let batch_size = batch_size.max(1) as u64;
        let base_requests = (units as u64).div_ceil(batch_size);
        // Epsilon keeps 0.6 × 10 from rounding up to 7
        let extra = (retry_inflation * base_requests as f64 - 1e-9).ceil().max(0.0) as u64;
        Self {
            base_requests,
            total_requests: base_requests + extra,
        }
    }
}

/// Requests-per-second ceiling derived from a quota snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateCeiling {
    /// Window whose remaining quota covers the estimate, if any
    pub window: Option<Window>,
    pub requests_per_second: f64,
}

impl RateCeiling {
    /// Picks the finest window whose remaining quota covers the estimate
    ///
    /// When no window covers it, the slowest sustainable rate over the
    /// known windows is used and a warning is logged.
    pub fn select(snapshot: &QuotaSnapshot, estimate: &RequestEstimate) -> Self {
        let needed = estimate.total_requests.max(1);

        if let Some((window, _)) = snapshot.tiers().find(|(_, tier)| tier.remaining >= needed) {
            return Self {
                window: Some(window),
                requests_per_second: needed as f64 / window.seconds() as f64,
            };
        }

        let sustainable = snapshot
            .tiers()
            .filter(|(_, tier)| tier.limit > 0)
            .map(|(window, tier)| tier.limit as f64 / window.seconds() as f64)
            .fold(f64::INFINITY, f64::min);
        let requests_per_second = if sustainable.is_finite() {
            sustainable
        } else {
            1.0 / Window::Day.seconds() as f64
        };

        tracing::warn!(
            total_requests = estimate.total_requests,
            requests_per_second,
            "Remaining quota does not cover the estimated workload, pacing at the slowest sustainable rate"
        );

        Self {
            window: None,
            requests_per_second,
        }
    }
}
