// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key expiry strings: a positive count followed by a unit.
//!
//! `H` hours, `D` days, `M` months of 30 days, `Y` years of 365 days.
//! Units are case-insensitive; the unit may also lead (`D1`).

use chrono::{DateTime, Duration, Utc};

use super::error::{LedgerError, LedgerResult};

fn unit_duration(unit: char, count: i64) -> Option<Duration> {
    let hours = match unit.to_ascii_uppercase() {
        'H' => count,
        'D' => count.checked_mul(24)?,
        'M' => count.checked_mul(24 * 30)?,
        'Y' => count.checked_mul(24 * 365)?,
        _ => return None,
    };
    Duration::try_hours(hours)
}

/// Parse an expiry string into a duration.
pub fn parse_expiry(input: &str) -> LedgerResult<Duration> {
    let invalid = || LedgerError::InvalidExpiry(input.to_string());
    let trimmed = input.trim();

    let (count, unit) = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some(first), _) if first.is_ascii_alphabetic() => (&trimmed[first.len_utf8()..], first),
        (_, Some(last)) if last.is_ascii_alphabetic() => {
            (&trimmed[..trimmed.len() - last.len_utf8()], last)
        }
        _ => return Err(invalid()),
    };

    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let count: i64 = count.parse().map_err(|_| invalid())?;
    if count <= 0 {
        return Err(invalid());
    }

    unit_duration(unit, count).ok_or_else(invalid)
}

/// Absolute expiry instant for `input`, measured from `now`.
pub fn expires_at(now: DateTime<Utc>, input: &str) -> LedgerResult<DateTime<Utc>> {
    let duration = parse_expiry(input)?;
    now.checked_add_signed(duration)
        .ok_or_else(|| LedgerError::InvalidExpiry(input.to_string()))
}
