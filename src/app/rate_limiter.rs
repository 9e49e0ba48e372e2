use anyhow::Result;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::config::rate_limits::{current_window, RateAction, RateLimits, RateWindow};
use crate::infra::cache::RedisCache;

pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Fixed-window counters in Redis, keyed by subject, action and window index.
#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self {
            cache,
            limits: RateLimits::default(),
        }
    }

    pub async fn check(&self, user_id: Uuid, action: RateAction) -> Result<RateLimitInfo> {
        let (limit, window) = self.limits.limit_for_action(action);
        let key = window_key(&user_id.to_string(), action.as_str(), window);
        let info = self.check_key(&key, limit).await?;
        if info.limited {
            tracing::debug!(
                user_id = %user_id,
                action = action.as_str(),
                limit,
                "rate limit exceeded"
            );
        }
        Ok(info)
    }

    pub async fn increment(&self, user_id: Uuid, action: RateAction) -> Result<()> {
        let (_, window) = self.limits.limit_for_action(action);
        let key = window_key(&user_id.to_string(), action.as_str(), window);
        self.increment_key(&key, window).await
    }

    /// Check rate limit by IP address (for unauthenticated requests)
    pub async fn check_ip(
        &self,
        ip: &str,
        action: &str,
        limit: u32,
        window: RateWindow,
    ) -> Result<bool> {
        let key = window_key(&format!("ip:{}", ip), action, window);
        let info = self.check_key(&key, limit).await?;
        if info.limited {
            tracing::debug!(ip, action, limit, "IP rate limit exceeded");
        }
        Ok(info.limited)
    }

    pub async fn increment_ip(&self, ip: &str, action: &str, window: RateWindow) -> Result<()> {
        let key = window_key(&format!("ip:{}", ip), action, window);
        self.increment_key(&key, window).await
    }

    async fn check_key(&self, key: &str, limit: u32) -> Result<RateLimitInfo> {
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let count: Option<u32> = conn.get(key).await?;
        let count = count.unwrap_or(0);

        Ok(RateLimitInfo {
            limited: count >= limit,
            limit,
            remaining: limit.saturating_sub(count),
        })
    }

    async fn increment_key(&self, key: &str, window: RateWindow) -> Result<()> {
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let count: u32 = conn.incr(key, 1).await?;
        // First hit in this window owns the expiry.
        if count == 1 {
            let _: () = conn.expire(key, window.seconds() as i64).await?;
        }
        Ok(())
    }
}

fn window_key(subject: &str, action: &str, window: RateWindow) -> String {
    format!(
        "ratelimit:{}:{}:{}",
        subject,
        action,
        current_window(window.seconds())
    )
}
