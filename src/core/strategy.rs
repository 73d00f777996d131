use std::cmp::Ordering;

use super::types::{Account, Strategy};

impl Strategy {
    /// Total order used to pick the surplus target; the first account wins.
    ///
    /// Ties fall through to a secondary key and finally to the account id,
    /// which is unique within a run, so no two open accounts compare equal.
    pub fn compare(self, a: &Account, b: &Account) -> Ordering {
        let primary = match self {
            Strategy::Avalanche => b
                .annual_rate
                .total_cmp(&a.annual_rate)
                .then_with(|| b.balance.total_cmp(&a.balance)),
            Strategy::Snowball => a
                .balance
                .total_cmp(&b.balance)
                .then_with(|| a.minimum_payment.total_cmp(&b.minimum_payment)),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    pub fn sort(self, accounts: &mut [Account]) {
        accounts.sort_by(|a, b| self.compare(a, b));
    }
}
