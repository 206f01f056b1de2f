/// Whether `correction` entries may take a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionPolicy {
    /// Corrections obey the non-negative floor like every other entry.
    #[default]
    Reject,
    /// Entries with reason `correction` bypass the floor.
    AllowNegative,
}

/// Ledger behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Reads of unknown items fail with `UnknownItem` instead of returning
    /// an empty result.
    pub strict_items: bool,

    /// Appends referencing an unknown item create it.
    pub auto_register: bool,

    pub correction_policy: CorrectionPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strict_items: false,
            auto_register: true,
            correction_policy: CorrectionPolicy::Reject,
        }
    }
}

impl LedgerConfig {
    /// Lenient reads, auto-registration, no correction bypass.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_items = strict;
        self
    }

    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn correction_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.correction_policy = policy;
        self
    }
}
