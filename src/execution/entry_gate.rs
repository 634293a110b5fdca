use chrono::{DateTime, Duration, Utc};

/// Gatekeeper for new entries: cooldown since the last fill, a cap on
/// concurrently open positions, and an optional wall-clock minute alignment.
///
/// `try_enter` both checks and records: a successful check stamps the entry
/// time in the same call, so two checks in one cycle cannot both pass.
#[derive(Debug, Clone)]
pub struct EntryGate {
    cooldown: Duration,
    max_open_positions: usize,
    minute_alignment: Option<u32>,
    last_entry: Option<DateTime<Utc>>,
}

impl EntryGate {
    pub fn new(cooldown: Duration, max_open_positions: usize, minute_alignment: Option<u32>) -> Self {
        Self {
            cooldown,
            max_open_positions,
            minute_alignment,
            last_entry: None,
        }
    }

    pub fn last_entry(&self) -> Option<DateTime<Utc>> {
        self.last_entry
    }

    /// Whether an entry is permitted right now; records `now` as the last
    /// entry time when it is.
    pub fn try_enter(&mut self, now: DateTime<Utc>, open_count: usize) -> bool {
        if open_count >= self.max_open_positions {
            tracing::debug!(open_count, max = self.max_open_positions, "entry blocked: position cap");
            return false;
        }

        if let Some(alignment) = self.minute_alignment {
            use chrono::Timelike;
            if now.minute() % alignment != 0 {
                tracing::debug!(minute = now.minute(), alignment, "entry blocked: off-boundary minute");
                return false;
            }
        }

        if let Some(last) = self.last_entry {
            if now - last < self.cooldown {
                tracing::debug!(elapsed_secs = (now - last).num_seconds(), "entry blocked: cooldown");
                return false;
            }
        }

        self.last_entry = Some(now);
        true
    }

    /// Roll back the stamp after a failed order so the next cycle may retry.
    pub fn revoke(&mut self, previous: Option<DateTime<Utc>>) {
        self.last_entry = previous;
    }
}
