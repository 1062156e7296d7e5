use std::fmt;

/// The JSON-RPC 2.0 version marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    /// Version 2.0 of the JSON-RPC specification.
    V2_0,
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Version::V2_0 => serializer.serialize_str("2.0"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VersionVisitor;

        impl serde::de::Visitor<'_> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "2.0" => Ok(Version::V2_0),
                    _ => Err(serde::de::Error::custom(
                        "The JSON-RPC version must be \"2.0\"",
                    )),
                }
            }
        }

        deserializer.deserialize_identifier(VersionVisitor)
    }
}

/// The id of a JSON-RPC request, echoed back in the response.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Id {
    /// A numerical id.
    Num(u64),
    /// A string id.
    Str(String),
}

/// A JSON-RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Request<MethodT> {
    /// The JSON-RPC version.
    #[serde(rename = "jsonrpc")]
    pub version: Version,
    /// The id of the request.
    pub id: Id,
    /// The method to invoke, including its parameters.
    #[serde(flatten)]
    pub method: MethodT,
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Error {
    /// The error code.
    pub code: i16,
    /// The error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "JSON-RPC error: code = {}, message = {}",
            self.code, self.message
        )?;

        if let Some(data) = &self.data {
            write!(formatter, ", data = {data}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// The payload of a JSON-RPC response: either a result or an error object.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum ResponseData<T> {
    /// A failed invocation.
    Error {
        /// The error object.
        error: Error,
    },
    /// A successful invocation.
    Success {
        /// The result of the invocation.
        result: T,
    },
}

impl<T> ResponseData<T> {
    /// Converts the response data into a `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            ResponseData::Success { result } => Ok(result),
            ResponseData::Error { error } => Err(error),
        }
    }
}

/// A JSON-RPC response.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Response<T> {
    /// The JSON-RPC version.
    #[serde(rename = "jsonrpc")]
    pub version: Version,
    /// The id of the request this responds to.
    pub id: Id,
    /// The payload of the response.
    #[serde(flatten)]
    pub data: ResponseData<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_success_parses() {
        let response: Response<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#,
        )
        .expect("deserializes");

        assert_eq!(response.id, Id::Num(1));
        assert_eq!(response.data.into_result().expect("success"), "0x1");
    }

    #[test]
    fn response_error_parses() {
        let response: Response<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"a","error":{"code":-32000,"message":"header not found"}}"#,
        )
        .expect("deserializes");

        assert_eq!(response.id, Id::Str("a".to_string()));

        let error = response.data.into_result().expect_err("error response");
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "header not found");
        assert!(error.data.is_none());
    }

    #[test]
    fn invalid_version_is_rejected() {
        let result = serde_json::from_str::<Response<String>>(
            r#"{"jsonrpc":"1.0","id":1,"result":"0x1"}"#,
        );

        assert!(result.is_err());
    }
}
