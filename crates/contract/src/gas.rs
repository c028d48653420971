//! Gas metering for invocation-scoped resource accounting.

use crate::{Error, Result};

/// Tracks gas spending against a hard limit for one invocation.
///
/// The meter is created at invocation start and discarded at invocation end
/// regardless of outcome; already-charged gas is never refunded.
pub struct GasMeter {
    limit: i64,
    consumed: i64,
}

impl GasMeter {
    /// Creates a meter with the given limit.
    ///
    /// A negative limit means unlimited and never exhausts; this mode is
    /// intended for tests and diagnostics only.
    pub fn new(limit: i64) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Creates an unlimited meter.
    pub fn unlimited() -> Self {
        Self::new(-1)
    }

    /// Charges the meter, failing without side effects when the limit
    /// cannot cover the amount.
    ///
    /// Callers must apply the side effect being paid for only after this
    /// returns `Ok`.
    pub fn charge(&mut self, amount: i64) -> Result<()> {
        if amount < 0 {
            return Err(Error::InvalidArgument(
                "gas amount cannot be negative".to_string(),
            ));
        }
        if self.limit >= 0 && self.consumed.saturating_add(amount) > self.limit {
            return Err(Error::GasLimitExceeded {
                requested: amount,
                remaining: self.remaining(),
            });
        }
        self.consumed = self.consumed.saturating_add(amount);
        log::trace!("gas charged: {} (total {}/{})", amount, self.consumed, self.limit);
        Ok(())
    }

    /// Gets the remaining balance.
    pub fn remaining(&self) -> i64 {
        if self.limit < 0 {
            i64::MAX
        } else {
            self.limit - self.consumed
        }
    }

    /// Gets the gas consumed so far.
    pub fn consumed(&self) -> i64 {
        self.consumed
    }

    /// Gets the configured limit.
    pub fn limit(&self) -> i64 {
        self.limit
    }
}
