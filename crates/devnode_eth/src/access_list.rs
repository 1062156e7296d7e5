use std::ops::Deref;

use alloy_rlp::{RlpDecodable, RlpDecodableWrapper, RlpEncodable, RlpEncodableWrapper};

use crate::{Address, B256};

/// Access list
// NB: Need to use `RlpEncodableWrapper` else we get an extra [] in the output
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    RlpDecodableWrapper,
    RlpEncodableWrapper,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct AccessList(pub Vec<AccessListItem>);

impl Deref for AccessList {
    type Target = Vec<AccessListItem>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<AccessListItem>> for AccessList {
    fn from(src: Vec<AccessListItem>) -> AccessList {
        AccessList(src)
    }
}

impl From<AccessList> for Vec<AccessListItem> {
    fn from(src: AccessList) -> Vec<AccessListItem> {
        src.0
    }
}

/// Access list item
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    RlpDecodable,
    RlpEncodable,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Accessed address
    pub address: Address,
    /// Accessed storage keys
    pub storage_keys: Vec<B256>,
}
