/// Hardforks of the L1 chain, in activation order.
///
/// The ordering drives conditional block header fields and transaction type
/// support, so comparisons like `hardfork >= Hardfork::London` must match
/// activation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Hardfork {
    Frontier,
    Homestead,
    Dao,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    MuirGlacier,
    Berlin,
    London,
    ArrowGlacier,
    GrayGlacier,
    Merge,
    Shanghai,
    Cancun,
}

impl Default for Hardfork {
    fn default() -> Self {
        Self::Cancun
    }
}

impl Hardfork {
    /// Whether the hardfork supports EIP-2930 access list transactions.
    pub fn supports_access_lists(&self) -> bool {
        *self >= Self::Berlin
    }

    /// Whether the hardfork supports EIP-1559 fee market transactions and
    /// block base fees.
    pub fn supports_eip1559(&self) -> bool {
        *self >= Self::London
    }

    /// Whether proof-of-work fields (difficulty, nonce) are zeroed out.
    pub fn is_post_merge(&self) -> bool {
        *self >= Self::Merge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_ordering() {
        assert!(Hardfork::Berlin < Hardfork::London);
        assert!(Hardfork::London < Hardfork::Merge);
        assert!(Hardfork::Shanghai.supports_eip1559());
        assert!(!Hardfork::Istanbul.supports_access_lists());
    }
}
