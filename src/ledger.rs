/// Bookkeeping for storage capacity. Pure arithmetic on unsigned magnitudes, no I/O.
///
/// The ledger distinguishes *available* capacity from *debt*: if the files found in the
///  shared folder at startup already exceed the configured quota, the surplus is recorded
///  as debt. Debt must be repaid (by removing files) before usable capacity reappears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceLedger {
    available: u64,
    debt: u64,
}

impl SpaceLedger {
    pub fn new(quota: u64) -> SpaceLedger {
        SpaceLedger {
            available: quota,
            debt: 0,
        }
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn debt(&self) -> u64 {
        self.debt
    }

    /// Accounts for a file that already exists at startup. If the file is bigger than the
    ///  remaining capacity, available space drops to zero and the shortfall becomes debt.
    pub fn reserve(&mut self, size: u64) {
        if size <= self.available {
            self.available -= size;
        }
        else {
            self.debt += size - self.available;
            self.available = 0;
        }
    }

    /// Commits capacity for an admitted upload.
    ///
    /// Callers must have checked `size <= available()` beforehand; uploads are never
    ///  admitted while they would cause debt.
    pub fn charge(&mut self, size: u64) {
        debug_assert!(size <= self.available);
        self.available = self.available.saturating_sub(size);
    }

    /// Returns capacity when a file is removed. Debt is repaid first; only the remainder
    ///  increases available space.
    pub fn refund(&mut self, size: u64) {
        let repaid = self.debt.min(size);
        self.debt -= repaid;
        self.available += size - repaid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::fits(100, 30, 70, 0)]
    #[case::exact(100, 100, 0, 0)]
    #[case::overflows(100, 150, 0, 50)]
    #[case::zero(100, 0, 100, 0)]
    fn test_reserve(#[case] quota: u64, #[case] size: u64, #[case] expected_available: u64, #[case] expected_debt: u64) {
        let mut ledger = SpaceLedger::new(quota);
        ledger.reserve(size);
        assert_eq!(ledger.available(), expected_available);
        assert_eq!(ledger.debt(), expected_debt);
    }

    #[test]
    fn test_reserve_accumulates_debt() {
        let mut ledger = SpaceLedger::new(10);
        ledger.reserve(8);
        ledger.reserve(8);
        assert_eq!(ledger.available(), 0);
        assert_eq!(ledger.debt(), 6);
    }

    #[rstest]
    #[case::partial(100, 40, 60)]
    #[case::all(100, 100, 0)]
    fn test_charge(#[case] quota: u64, #[case] size: u64, #[case] expected_available: u64) {
        let mut ledger = SpaceLedger::new(quota);
        ledger.charge(size);
        assert_eq!(ledger.available(), expected_available);
        assert_eq!(ledger.debt(), 0);
    }

    #[rstest]
    #[case::no_debt(50, 0, 30, 80, 0)]
    #[case::debt_absorbs_all(0, 40, 30, 0, 10)]
    #[case::debt_absorbs_exactly(0, 30, 30, 0, 0)]
    #[case::debt_absorbs_part(0, 10, 30, 20, 0)]
    fn test_refund(
        #[case] available: u64,
        #[case] debt: u64,
        #[case] size: u64,
        #[case] expected_available: u64,
        #[case] expected_debt: u64,
    ) {
        let mut ledger = SpaceLedger { available, debt };
        ledger.refund(size);
        assert_eq!(ledger.available(), expected_available);
        assert_eq!(ledger.debt(), expected_debt);
    }

    /// quota 100, one pre-existing file of 150 bytes: no capacity and 50 bytes of debt;
    ///  removing that file repays the debt and restores the full quota.
    #[test]
    fn test_overcommitted_startup_then_remove() {
        let mut ledger = SpaceLedger::new(100);
        ledger.reserve(150);
        assert_eq!(ledger.available(), 0);
        assert_eq!(ledger.debt(), 50);

        ledger.refund(150);
        assert_eq!(ledger.available(), 100);
        assert_eq!(ledger.debt(), 0);
    }

    #[test]
    fn test_refund_does_not_grow_available_while_in_debt() {
        let mut ledger = SpaceLedger::new(100);
        ledger.reserve(300);
        assert_eq!(ledger.debt(), 200);

        ledger.refund(120);
        assert_eq!(ledger.available(), 0);
        assert_eq!(ledger.debt(), 80);
    }
}
