//! Expiry decisions for stored credentials.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::token::TokenRecord;
use crate::time::Clock;

/// Credentials are treated as expired this long before their real expiry.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// `true` once `now` reaches `expires_at - 5 minutes`.
pub fn is_expired(record: &TokenRecord, clock: &dyn Clock) -> bool {
    is_expired_with_margin(record, clock, DEFAULT_EXPIRY_MARGIN)
}

/// `true` once `now` reaches `expires_at - margin`; the boundary counts as expired.
pub fn is_expired_with_margin(record: &TokenRecord, clock: &dyn Clock, margin: Duration) -> bool {
    expires_within(record.expires_at, clock.now(), margin)
}

pub(crate) fn expires_within(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    margin: Duration,
) -> bool {
    let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
    match expires_at.checked_sub_signed(margin) {
        Some(deadline) => now >= deadline,
        None => true,
    }
}
