use std::fmt::{Display, Formatter};

use crate::B256;

/// A block tag, referring to a block by its position in the chain rather than
/// by number or hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    /// The earliest block, i.e. the genesis block.
    Earliest,
    /// The latest mined block.
    Latest,
    /// The next block to be mined.
    Pending,
    /// The latest safe head block.
    Safe,
    /// The latest finalized block.
    Finalized,
}

impl Display for BlockTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BlockTag::Earliest => "earliest",
            BlockTag::Latest => "latest",
            BlockTag::Pending => "pending",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
        })
    }
}

/// A block spec as introduced by EIP-1898: either a number or a hash, tagged
/// to disambiguate the two.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Eip1898BlockSpec {
    /// A block hash.
    #[serde(rename_all = "camelCase")]
    Hash {
        /// The block's hash.
        block_hash: B256,
        /// Whether the block must be a canonical block.
        require_canonical: Option<bool>,
    },
    /// A block number.
    #[serde(rename_all = "camelCase")]
    Number {
        /// The block's number.
        #[serde(with = "crate::serde::u64")]
        block_number: u64,
    },
}

impl Display for Eip1898BlockSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Eip1898BlockSpec::Hash { block_hash, .. } => block_hash.fmt(f),
            Eip1898BlockSpec::Number { block_number } => block_number.fmt(f),
        }
    }
}

/// A specification of the block to operate on, as accepted by RPC-style
/// methods.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum BlockSpec {
    /// A block number.
    #[serde(with = "crate::serde::u64")]
    Number(u64),
    /// A block tag.
    Tag(BlockTag),
    /// A block spec per EIP-1898.
    Eip1898(Eip1898BlockSpec),
}

macro_rules! impl_block_tag_constructors {
    ($($tag:ident => $fn_name:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Constructs a `BlockSpec` for the `", stringify!($fn_name), "` block tag.")]
            pub fn $fn_name() -> Self {
                Self::Tag(BlockTag::$tag)
            }
        )+
    };
}

impl BlockSpec {
    impl_block_tag_constructors! {
        Earliest => earliest,
        Latest => latest,
        Pending => pending,
        Safe => safe,
        Finalized => finalized,
    }

    /// Constructs a `BlockSpec` for the provided block number.
    pub fn block_number(block_number: u64) -> Self {
        Self::Number(block_number)
    }

    /// Constructs an EIP-1898 `BlockSpec` for the provided block hash.
    pub fn block_hash(block_hash: B256, require_canonical: Option<bool>) -> Self {
        Self::Eip1898(Eip1898BlockSpec::Hash {
            block_hash,
            require_canonical,
        })
    }

    /// Whether the spec refers to the pending block.
    pub fn is_pending(&self) -> bool {
        matches!(self, BlockSpec::Tag(BlockTag::Pending))
    }
}

impl Display for BlockSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockSpec::Number(block_number) => block_number.fmt(f),
            BlockSpec::Tag(tag) => tag.fmt(f),
            BlockSpec::Eip1898(spec) => spec.fmt(f),
        }
    }
}

/// A block spec for methods that predate EIP-1898 and only accept a number or
/// a tag.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum PreEip1898BlockSpec {
    /// A block number.
    #[serde(with = "crate::serde::u64")]
    Number(u64),
    /// A block tag.
    Tag(BlockTag),
}

impl From<PreEip1898BlockSpec> for BlockSpec {
    fn from(value: PreEip1898BlockSpec) -> Self {
        match value {
            PreEip1898BlockSpec::Number(block_number) => BlockSpec::Number(block_number),
            PreEip1898BlockSpec::Tag(tag) => BlockSpec::Tag(tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::b256;

    #[test]
    fn deserialize_block_specs() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::from_str::<BlockSpec>(r#""0x10""#)?,
            BlockSpec::Number(16)
        );
        assert_eq!(
            serde_json::from_str::<BlockSpec>(r#""pending""#)?,
            BlockSpec::pending()
        );

        let hash = b256!("c014ba5e00000000000000000000000000000000000000000000000000000000");
        assert_eq!(
            serde_json::from_str::<BlockSpec>(&format!(r#"{{"blockHash":"{hash}"}}"#))?,
            BlockSpec::block_hash(hash, None)
        );

        Ok(())
    }

    #[test]
    fn display_block_specs() {
        assert_eq!(BlockSpec::Number(16).to_string(), "16");
        assert_eq!(BlockSpec::latest().to_string(), "latest");
    }
}
