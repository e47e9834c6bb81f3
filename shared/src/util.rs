use std::sync::atomic::{AtomicI64, Ordering};

/// Current UTC timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: per-process sequence (4096 ids per ms)
///
/// Ids are strictly increasing within a process, so id order matches
/// creation order even for same-millisecond writes. Bursts beyond 4096 ids
/// in one millisecond borrow from the next millisecond's range.
pub fn snowflake_id() -> i64 {
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let candidate = ((now - EPOCH_MS) & 0x1FF_FFFF_FFFF) << 12; // 41 bits
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let id = if candidate > last { candidate } else { last + 1 };
        match LAST_ID.compare_exchange_weak(last, id, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return id,
            Err(observed) => last = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_ids_are_positive_and_time_prefixed() {
        let a = snowflake_id();
        assert!(a > 0);
        let b = snowflake_id();
        assert!(b >> 12 >= a >> 12);
    }

    #[test]
    fn snowflake_ids_are_strictly_increasing() {
        // A tight loop lands many calls in the same millisecond; the
        // sequence bits must keep them in creation order.
        let mut prev = snowflake_id();
        for _ in 0..1_000 {
            let next = snowflake_id();
            assert!(next > prev);
            prev = next;
        }
    }
}
