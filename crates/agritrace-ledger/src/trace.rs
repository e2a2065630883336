use agritrace_core::types::TraceCode;
use chrono::NaiveDate;

/// Store-scoped trace code counter.
///
/// The sequence only ever increases, and codes reported as taken are
/// skipped, so one sequence never issues a duplicate.
#[derive(Clone, Debug)]
pub struct TraceSequence {
    next: u32,
}

impl TraceSequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next free code for `date`.
    pub fn issue(&mut self, date: NaiveDate, is_taken: impl Fn(&TraceCode) -> bool) -> TraceCode {
        loop {
            let code = TraceCode::new(date, self.next);
            self.next = self.next.saturating_add(1);
            if !is_taken(&code) {
                return code;
            }
        }
    }
}

impl Default for TraceSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 26).unwrap()
    }

    #[test]
    fn first_code_is_001() {
        let mut seq = TraceSequence::new();
        assert_eq!(seq.issue(day(), |_| false).as_str(), "TRACE-20241226-001");
        assert_eq!(seq.issue(day(), |_| false).as_str(), "TRACE-20241226-002");
    }

    #[test]
    fn skips_taken_codes() {
        let taken: HashSet<String> =
            ["TRACE-20241226-001", "TRACE-20241226-002"].iter().map(|s| s.to_string()).collect();
        let mut seq = TraceSequence::new();
        let code = seq.issue(day(), |c| taken.contains(c.as_str()));
        assert_eq!(code.as_str(), "TRACE-20241226-003");
        assert_eq!(seq.issue(day(), |c| taken.contains(c.as_str())).as_str(), "TRACE-20241226-004");
    }
}
