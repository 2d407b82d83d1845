//! Opaque message bodies.
//!
//! The forwarding core never looks inside a body. Contract types are thin
//! wrappers that carry the encoded bytes from one side of the proxy to the other.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use thiserror::Error;

use crate::error::RpcError;

/// Body encoding as announced by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    Thrift,
    Json,
    Proto,
    #[default]
    Raw,
}

impl Encoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Thrift => "thrift",
            Encoding::Json => "json",
            Encoding::Proto => "proto",
            Encoding::Raw => "raw",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported encoding: {0}")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thrift" => Ok(Encoding::Thrift),
            "json" => Ok(Encoding::Json),
            "proto" | "protobuf" => Ok(Encoding::Proto),
            "raw" => Ok(Encoding::Raw),
            other => Err(UnknownEncoding(other.to_owned())),
        }
    }
}

/// Encoded body plus its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    encoding: Encoding,
    body: Bytes,
}

impl Payload {
    #[must_use]
    pub fn new(encoding: Encoding, body: impl Into<Bytes>) -> Self {
        Self {
            encoding,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn empty(encoding: Encoding) -> Self {
        Self {
            encoding,
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A typed request or response of a service contract.
pub trait Message: Sized + Send + 'static {
    /// `false` when the contract declares no arguments or no result for this
    /// slot. The payload still travels unchanged.
    const HAS_BODY: bool = true;

    /// Build the message from an encoded payload.
    ///
    /// # Errors
    /// Returns an error if the payload cannot represent this message.
    fn from_payload(payload: Payload) -> Result<Self, RpcError>;

    fn into_payload(self) -> Payload;
}

impl Message for Payload {
    fn from_payload(payload: Payload) -> Result<Self, RpcError> {
        Ok(payload)
    }

    fn into_payload(self) -> Payload {
        self
    }
}

/// Declare newtype messages that carry their payload verbatim.
///
/// ```ignore
/// relaykit::opaque_message! {
///     /// Request of `StartWorkflowExecution`.
///     StartWorkflowExecutionRequest,
///     StartWorkflowExecutionResponse,
/// }
/// ```
#[macro_export]
macro_rules! opaque_message {
    (@define $has_body:literal; $(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name($crate::Payload);

        impl $name {
            #[must_use]
            pub fn new(payload: $crate::Payload) -> Self {
                Self(payload)
            }

            #[must_use]
            pub fn payload(&self) -> &$crate::Payload {
                &self.0
            }
        }

        impl ::std::convert::From<$crate::Payload> for $name {
            fn from(payload: $crate::Payload) -> Self {
                Self(payload)
            }
        }

        impl $crate::Message for $name {
            const HAS_BODY: bool = $has_body;

            fn from_payload(payload: $crate::Payload) -> ::std::result::Result<Self, $crate::RpcError> {
                Ok(Self(payload))
            }

            fn into_payload(self) -> $crate::Payload {
                self.0
            }
        }
    };
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $( $crate::opaque_message!(@define true; $(#[$meta])* $name); )+
    };
}

/// Like [`opaque_message!`], for slots the contract declares empty: no
/// arguments, or a result that only reports success. The payload is still
/// carried verbatim, so a Thrift void result reaches the caller unchanged.
#[macro_export]
macro_rules! bodiless_message {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $( $crate::opaque_message!(@define false; $(#[$meta])* $name); )+
    };
}
