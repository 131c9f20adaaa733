//! Timeout supervision.
//!
//! Three restartable countdown timers share one deadline table: ping
//! (connection liveness), request (response latency), and idle (teardown
//! of unused connections). The engine arms and cancels deadlines; the
//! session driver sleeps until [`Timers::next_deadline`] and feeds a tick
//! back in, so expirations run on the same serialized context as
//! everything else.
//!
//! Every operation is idempotent: cancelling an unarmed timer, re-arming
//! an armed one, and disabling an already-disabled idle timer are all
//! no-ops by construction.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Default ping timeout: inbound keepalives must arrive this often.
pub const PING_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default request timeout: a correlated response must arrive this fast.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default idle timeout: unused connections are torn down after this.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Identity of one supervised timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Connection liveness guard.
    Ping,
    /// Response latency guard.
    Request,
    /// Inactivity guard; suppressed while subscriptions are live.
    Idle,
}

/// Deadline table for the three supervised timers.
///
/// Generic over `Instant` so tests drive a virtual clock.
#[derive(Debug, Clone)]
pub struct Timers<I> {
    ping_timeout: Duration,
    request_timeout: Duration,
    idle_timeout: Duration,
    ping_deadline: Option<I>,
    request_deadline: Option<I>,
    idle_deadline: Option<I>,
    idle_disabled: bool,
}

impl<I> Timers<I>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<I, Output = Duration>,
{
    /// Table with the default timeout periods; nothing armed.
    pub fn new() -> Self {
        Self::with_timeouts(PING_TIMEOUT, REQUEST_TIMEOUT, IDLE_TIMEOUT)
    }

    /// Table with custom periods; nothing armed.
    pub fn with_timeouts(ping: Duration, request: Duration, idle: Duration) -> Self {
        Self {
            ping_timeout: ping,
            request_timeout: request,
            idle_timeout: idle,
            ping_deadline: None,
            request_deadline: None,
            idle_deadline: None,
            idle_disabled: false,
        }
    }

    /// Arms (or re-arms) a timer to fire one period after `now`.
    ///
    /// Arming the idle timer while it is disabled is a no-op; the other
    /// timers have no disabled state.
    pub fn set(&mut self, kind: TimerKind, now: I) {
        match kind {
            TimerKind::Ping => self.ping_deadline = Some(now + self.ping_timeout),
            TimerKind::Request => self.request_deadline = Some(now + self.request_timeout),
            TimerKind::Idle => {
                if !self.idle_disabled {
                    self.idle_deadline = Some(now + self.idle_timeout);
                }
            },
        }
    }

    /// Disarms a timer. No-op when already unarmed or fired.
    pub fn cancel(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Ping => self.ping_deadline = None,
            TimerKind::Request => self.request_deadline = None,
            TimerKind::Idle => self.idle_deadline = None,
        }
    }

    /// Disarms every timer.
    pub fn cancel_all(&mut self) {
        self.ping_deadline = None;
        self.request_deadline = None;
        self.idle_deadline = None;
    }

    /// Suppresses the idle timer entirely (active subscriptions keep the
    /// connection open indefinitely).
    pub fn disable_idle(&mut self) {
        self.idle_disabled = true;
        self.idle_deadline = None;
    }

    /// Lifts the idle suppression and arms the timer immediately, so an
    /// idle connection with no subscriptions left is guaranteed a
    /// teardown deadline even if nothing is sent afterwards.
    pub fn enable_idle(&mut self, now: I) {
        self.idle_disabled = false;
        self.idle_deadline = Some(now + self.idle_timeout);
    }

    /// Lifts the idle suppression without arming the timer. Used on full
    /// disconnect, where the suppression would otherwise outlive the
    /// subscriptions that justified it.
    pub fn clear_idle_suppression(&mut self) {
        self.idle_disabled = false;
    }

    /// Whether a timer is currently armed.
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Ping => self.ping_deadline.is_some(),
            TimerKind::Request => self.request_deadline.is_some(),
            TimerKind::Idle => self.idle_deadline.is_some(),
        }
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<I> {
        [self.ping_deadline, self.request_deadline, self.idle_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    /// Returns the timer that expired at or before `now`, disarming it.
    ///
    /// At most one expiry is reported per call; all expirations route to
    /// the same disconnect handling, so the first is enough and the rest
    /// are cleared with it there.
    pub fn take_expired(&mut self, now: I) -> Option<TimerKind> {
        if self.ping_deadline.is_some_and(|deadline| deadline <= now) {
            self.ping_deadline = None;
            return Some(TimerKind::Ping);
        }
        if self.request_deadline.is_some_and(|deadline| deadline <= now) {
            self.request_deadline = None;
            return Some(TimerKind::Request);
        }
        if self.idle_deadline.is_some_and(|deadline| deadline <= now) {
            self.idle_deadline = None;
            return Some(TimerKind::Idle);
        }
        None
    }
}

impl<I> Default for Timers<I>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<I, Output = Duration>,
{
    fn default() -> Self {
        Self::new()
    }
}
