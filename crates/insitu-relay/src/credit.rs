/// Bytes read from the file but not yet overwritten.
///
/// This is the ceiling on any direct write: writing past it would clobber
/// source bytes the filter has not seen yet.
#[derive(Debug, Default, Clone)]
pub struct Credit {
    available: u64,
    total_read: u64,
    total_written: u64,
}

impl Credit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `n` bytes read from the file.
    pub fn increase(&mut self, n: usize) {
        self.available += n as u64;
        self.total_read += n as u64;
    }

    /// Record `n` bytes committed to the file.
    pub fn decrease(&mut self, n: usize) {
        debug_assert!(
            n as u64 <= self.available,
            "wrote {n} bytes with only {} bytes of credit",
            self.available
        );
        self.available = self.available.saturating_sub(n as u64);
        self.total_written += n as u64;
    }

    /// Largest direct write allowed right now.
    pub fn available(&self) -> u64 {
        self.available
    }

    /// Clamp a write of `len` bytes to the current credit.
    pub fn budget(&self, len: usize) -> usize {
        usize::try_from(self.available).map_or(len, |avail| avail.min(len))
    }

    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_and_decrease() {
        let mut credit = Credit::new();
        credit.increase(100);
        credit.decrease(40);

        assert_eq!(credit.available(), 60);
        assert_eq!(credit.total_read(), 100);
        assert_eq!(credit.total_written(), 40);
    }

    #[test]
    fn test_budget_clamps_to_credit() {
        let mut credit = Credit::new();
        assert_eq!(credit.budget(10), 0);

        credit.increase(4);
        assert_eq!(credit.budget(10), 4);
        assert_eq!(credit.budget(3), 3);
    }

    #[test]
    #[should_panic(expected = "credit")]
    #[cfg(debug_assertions)]
    fn test_overdraw_panics_in_debug() {
        let mut credit = Credit::new();
        credit.increase(1);
        credit.decrease(2);
    }
}
