/// Counters for the question list of a running or finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    /// Questions without an answer yet.
    pub remaining: usize,
    /// Zero-based cursor position.
    pub current: usize,
    pub bookmarked: usize,
    /// Set once the session has ended, by submit or by time-up.
    pub is_complete: bool,
}

impl SessionProgress {
    /// Share of questions answered, rounded half up; 0 for an empty list.
    #[must_use]
    pub fn answered_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let percent = (self.answered * 200 + self.total) / (self.total * 2);
        u32::try_from(percent).unwrap_or(100)
    }
}
