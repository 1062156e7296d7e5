use devnode_eth::{
    filter::LogFilterOptions, Address, BlockSpec, PreEip1898BlockSpec, B256, U256,
};

/// Methods for requests to a remote Ethereum node.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "method", content = "params")]
pub enum RequestMethod {
    /// `eth_blockNumber`
    #[serde(
        rename = "eth_blockNumber",
        with = "devnode_eth::serde::empty_params"
    )]
    BlockNumber(()),
    /// `eth_chainId`
    #[serde(rename = "eth_chainId", with = "devnode_eth::serde::empty_params")]
    ChainId(()),
    /// `eth_getBalance`
    #[serde(rename = "eth_getBalance")]
    GetBalance(Address, Option<BlockSpec>),
    /// `eth_getBlockByHash`
    #[serde(rename = "eth_getBlockByHash")]
    GetBlockByHash(
        /// The block's hash.
        B256,
        /// Whether to include full transaction data.
        bool,
    ),
    /// `eth_getBlockByNumber`
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber(
        /// The block's number or a tag.
        PreEip1898BlockSpec,
        /// Whether to include full transaction data.
        bool,
    ),
    /// `eth_getCode`
    #[serde(rename = "eth_getCode")]
    GetCode(Address, Option<BlockSpec>),
    /// `eth_getLogs`
    #[serde(rename = "eth_getLogs", with = "devnode_eth::serde::sequence")]
    GetLogs(LogFilterOptions),
    /// `eth_getStorageAt`
    #[serde(rename = "eth_getStorageAt")]
    GetStorageAt(Address, U256, Option<BlockSpec>),
    /// `eth_getTransactionByHash`
    #[serde(
        rename = "eth_getTransactionByHash",
        with = "devnode_eth::serde::sequence"
    )]
    GetTransactionByHash(B256),
    /// `eth_getTransactionCount`
    #[serde(rename = "eth_getTransactionCount")]
    GetTransactionCount(Address, Option<BlockSpec>),
    /// `eth_getTransactionReceipt`
    #[serde(
        rename = "eth_getTransactionReceipt",
        with = "devnode_eth::serde::sequence"
    )]
    GetTransactionReceipt(B256),
    /// `net_version`
    #[serde(rename = "net_version", with = "devnode_eth::serde::empty_params")]
    NetVersion(()),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc;

    fn request_json(method: RequestMethod) -> serde_json::Value {
        serde_json::to_value(jsonrpc::Request {
            version: jsonrpc::Version::V2_0,
            id: jsonrpc::Id::Num(0),
            method,
        })
        .expect("serializes")
    }

    #[test]
    fn parameterless_methods_serialize_with_empty_params() {
        let request = request_json(RequestMethod::BlockNumber(()));

        assert_eq!(request["method"], "eth_blockNumber");
        assert_eq!(request["params"], serde_json::json!([]));
        assert_eq!(request["jsonrpc"], "2.0");
    }

    #[test]
    fn single_argument_methods_serialize_as_sequence() {
        let hash: B256 = "0x854a9427d54aaca361e7c592b4c3dc7da279c52a00cad157dab0365dcc27578d"
            .parse()
            .expect("valid hash");

        let request = request_json(RequestMethod::GetTransactionByHash(hash));

        assert_eq!(request["method"], "eth_getTransactionByHash");
        assert_eq!(
            request["params"],
            serde_json::json!([
                "0x854a9427d54aaca361e7c592b4c3dc7da279c52a00cad157dab0365dcc27578d"
            ])
        );
    }

    #[test]
    fn block_spec_arguments_serialize_positionally() {
        let address: Address = "0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e"
            .parse()
            .expect("valid address");

        let request = request_json(RequestMethod::GetBalance(
            address,
            Some(BlockSpec::latest()),
        ));

        assert_eq!(request["method"], "eth_getBalance");
        assert_eq!(
            request["params"],
            serde_json::json!(["0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e", "latest"])
        );

        let request = request_json(RequestMethod::GetBlockByNumber(
            PreEip1898BlockSpec::Number(42),
            true,
        ));

        assert_eq!(request["params"], serde_json::json!(["0x2a", true]));
    }
}
