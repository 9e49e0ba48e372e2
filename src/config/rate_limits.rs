/// Actions guarded by the per-user limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Match,
    Message,
    Report,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::Match => "match",
            RateAction::Message => "message",
            RateAction::Report => "report",
        }
    }
}

/// Per-user limits. Matching is the costly one: every request that reaches
/// the oracle is a paid model call.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub match_requests_per_hour: u32,
    pub messages_per_hour: u32,
    pub reports_per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits {
            match_requests_per_hour: 30,
            messages_per_hour: 120,
            reports_per_day: 20,
        }
    }
}

impl RateLimits {
    pub fn limit_for_action(&self, action: RateAction) -> (u32, RateWindow) {
        match action {
            RateAction::Match => (self.match_requests_per_hour, RateWindow::Hour),
            RateAction::Message => (self.messages_per_hour, RateWindow::Hour),
            RateAction::Report => (self.reports_per_day, RateWindow::Day),
        }
    }
}

/// Time window for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

/// Calculate current window timestamp for rate limiting
pub fn current_window(window_seconds: u64) -> u64 {
    let now = time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
    now / window_seconds
}
