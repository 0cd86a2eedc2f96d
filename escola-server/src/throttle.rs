//! Request rate limiting.
//!
//! A [`RateThrottle`] keeps a sliding window of admitted request instants per
//! client key. A [`ThrottlePolicy`] groups several throttles that must all
//! admit a request; when any refuses, the longest wait wins.
//!
//! Two throttle flavours exist:
//! - [`RateThrottle::user`]: scope `user`, keyed by user id for authenticated
//!   callers and by client address for anonymous ones.
//! - [`RateThrottle::anon`]: a named scope that only counts anonymous callers
//!   and lets authenticated callers through untouched.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::error::ServerError;
use crate::middleware::auth::Caller;

/// `<requests>/<period>`, e.g. `5/day` or `100/m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub num_requests: u32,
    pub duration: Duration,
}

impl Rate {
    pub const SECOND: Duration = Duration::from_secs(1);
    pub const MINUTE: Duration = Duration::from_secs(60);
    pub const HOUR: Duration = Duration::from_secs(60 * 60);
    pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    pub const fn new(num_requests: u32, duration: Duration) -> Self {
        Self {
            num_requests,
            duration,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateParseError {
    #[error("missing '/' separator")]
    MissingSeparator,
    #[error("invalid request count '{0}'")]
    InvalidCount(String),
    #[error("unknown period '{0}' (expected s, m, h or d)")]
    InvalidPeriod(String),
}

impl FromStr for Rate {
    type Err = RateParseError;

    /// Only the first letter of the period is significant, so `m`, `min` and
    /// `minute` are all one minute.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, period) = s.trim().split_once('/').ok_or(RateParseError::MissingSeparator)?;
        let num_requests = num
            .trim()
            .parse::<u32>()
            .map_err(|_| RateParseError::InvalidCount(num.to_owned()))?;
        let duration = match period.trim().chars().next() {
            Some('s') => Self::SECOND,
            Some('m') => Self::MINUTE,
            Some('h') => Self::HOUR,
            Some('d') => Self::DAY,
            _ => return Err(RateParseError::InvalidPeriod(period.to_owned())),
        };
        Ok(Self::new(num_requests, duration))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.num_requests, self.duration.as_secs())
    }
}

/// Sliding-window throttle for one scope.
pub struct RateThrottle {
    scope: &'static str,
    rate: Rate,
    anonymous_only: bool,
    history: DashMap<String, VecDeque<Instant>>,
}

impl fmt::Debug for RateThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateThrottle")
            .field("scope", &self.scope)
            .field("rate", &self.rate)
            .field("anonymous_only", &self.anonymous_only)
            .field("tracked_keys", &self.history.len())
            .finish()
    }
}

impl RateThrottle {
    /// Throttle every caller, keyed by user id when authenticated.
    pub fn user(rate: Rate) -> Self {
        Self::with_scope("user", rate, false)
    }

    /// Throttle anonymous callers only, in their own bucket.
    pub fn anon(scope: &'static str, rate: Rate) -> Self {
        Self::with_scope(scope, rate, true)
    }

    fn with_scope(scope: &'static str, rate: Rate, anonymous_only: bool) -> Self {
        Self {
            scope,
            rate,
            anonymous_only,
            history: DashMap::new(),
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    fn cache_key(&self, caller: &Caller) -> Option<String> {
        match caller {
            Caller::User { id, .. } if !self.anonymous_only => {
                Some(format!("throttle_{}_{}", self.scope, id))
            }
            Caller::User { .. } => None,
            Caller::Anonymous { ident } => Some(format!("throttle_{}_{}", self.scope, ident)),
        }
    }

    /// Admit the request at `now`, or return how long until a slot frees up.
    ///
    /// Refused requests are not recorded, so a client hammering the endpoint
    /// regains access as soon as its oldest admitted request ages out.
    pub fn allow_at(&self, caller: &Caller, now: Instant) -> Result<(), Duration> {
        let Some(key) = self.cache_key(caller) else {
            return Ok(());
        };
        let window = self.rate.duration;
        let mut history = self.history.entry(key).or_default();

        while history
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            history.pop_front();
        }

        if history.len() >= self.rate.num_requests as usize {
            let wait = match history.front() {
                Some(oldest) => window.saturating_sub(now.duration_since(*oldest)),
                None => window,
            };
            return Err(wait);
        }

        history.push_back(now);
        Ok(())
    }

    /// Drop keys whose whole history has aged out.
    pub fn purge_expired(&self, now: Instant) {
        let window = self.rate.duration;
        self.history.retain(|_, history| {
            history
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < window)
        });
    }
}

/// A set of throttles that must all admit a request.
#[derive(Debug, Default)]
pub struct ThrottlePolicy {
    throttles: Vec<RateThrottle>,
}

impl ThrottlePolicy {
    pub fn new(throttles: Vec<RateThrottle>) -> Self {
        Self { throttles }
    }

    /// Every throttle sees the request; the longest wait among refusals is
    /// reported.
    pub fn check_at(&self, caller: &Caller, now: Instant) -> Result<(), ServerError> {
        let mut longest: Option<Duration> = None;
        for throttle in &self.throttles {
            if let Err(wait) = throttle.allow_at(caller, now) {
                debug!(
                    scope = throttle.scope(),
                    caller = %caller,
                    wait_ms = wait.as_millis() as u64,
                    "throttle refused request"
                );
                longest = Some(longest.map_or(wait, |w| w.max(wait)));
            }
        }
        match longest {
            Some(wait) => Err(ServerError::Throttled { wait }),
            None => Ok(()),
        }
    }

    pub fn check(&self, caller: &Caller) -> Result<(), ServerError> {
        self.check_at(caller, Instant::now())
    }

    pub fn purge_expired(&self, now: Instant) {
        for throttle in &self.throttles {
            throttle.purge_expired(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anon(ip: &str) -> Caller {
        Caller::Anonymous { ident: ip.to_owned() }
    }

    fn user(id: i64) -> Caller {
        Caller::User {
            id,
            username: format!("user{id}"),
        }
    }

    #[test]
    fn parses_rates_by_period_initial() {
        assert_eq!("5/day".parse::<Rate>(), Ok(Rate::new(5, Rate::DAY)));
        assert_eq!("100/m".parse::<Rate>(), Ok(Rate::new(100, Rate::MINUTE)));
        assert_eq!(" 3 / hour ".parse::<Rate>(), Ok(Rate::new(3, Rate::HOUR)));
        assert_eq!("1/sec".parse::<Rate>(), Ok(Rate::new(1, Rate::SECOND)));
    }

    #[test]
    fn rejects_malformed_rates() {
        assert_eq!("5".parse::<Rate>(), Err(RateParseError::MissingSeparator));
        assert!(matches!("x/day".parse::<Rate>(), Err(RateParseError::InvalidCount(_))));
        assert!(matches!("5/week".parse::<Rate>(), Err(RateParseError::InvalidPeriod(_))));
    }

    #[test]
    fn refuses_once_window_is_full_and_reports_wait() {
        let throttle = RateThrottle::anon("matricula_anon", Rate::new(2, Rate::MINUTE));
        let t0 = Instant::now();
        let caller = anon("10.0.0.1");

        assert!(throttle.allow_at(&caller, t0).is_ok());
        assert!(throttle.allow_at(&caller, t0 + Duration::from_secs(10)).is_ok());

        let wait = throttle
            .allow_at(&caller, t0 + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(40));
    }

    #[test]
    fn admits_again_after_oldest_request_ages_out() {
        let throttle = RateThrottle::anon("matricula_anon", Rate::new(1, Rate::MINUTE));
        let t0 = Instant::now();
        let caller = anon("10.0.0.1");

        assert!(throttle.allow_at(&caller, t0).is_ok());
        assert!(throttle.allow_at(&caller, t0 + Duration::from_secs(59)).is_err());
        assert!(throttle.allow_at(&caller, t0 + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn anon_throttle_ignores_authenticated_callers() {
        let throttle = RateThrottle::anon("matricula_anon", Rate::new(0, Rate::DAY));
        assert!(throttle.allow_at(&user(1), Instant::now()).is_ok());
        assert!(throttle.allow_at(&anon("1.2.3.4"), Instant::now()).is_err());
    }

    #[test]
    fn user_throttle_keys_by_identity() {
        let throttle = RateThrottle::user(Rate::new(1, Rate::DAY));
        let now = Instant::now();
        assert!(throttle.allow_at(&user(1), now).is_ok());
        assert!(throttle.allow_at(&user(1), now).is_err());
        assert!(throttle.allow_at(&user(2), now).is_ok());
        assert!(throttle.allow_at(&anon("1.2.3.4"), now).is_ok());
    }

    #[test]
    fn policy_requires_every_throttle_and_reports_longest_wait() {
        let policy = ThrottlePolicy::new(vec![
            RateThrottle::user(Rate::new(1, Rate::MINUTE)),
            RateThrottle::anon("matricula_anon", Rate::new(1, Rate::HOUR)),
        ]);
        let now = Instant::now();
        let caller = anon("10.0.0.9");

        assert!(policy.check_at(&caller, now).is_ok());
        match policy.check_at(&caller, now) {
            Err(ServerError::Throttled { wait }) => assert_eq!(wait, Rate::HOUR),
            other => panic!("expected throttled, got {other:?}"),
        }
        // An authenticated caller only meets the user throttle.
        assert!(policy.check_at(&user(7), now).is_ok());
    }

    #[test]
    fn purge_drops_stale_keys() {
        let throttle = RateThrottle::anon("matricula_anon", Rate::new(5, Rate::SECOND));
        let t0 = Instant::now();
        throttle.allow_at(&anon("a"), t0).unwrap();
        throttle.purge_expired(t0 + Duration::from_secs(2));
        assert_eq!(throttle.history.len(), 0);
    }
}
