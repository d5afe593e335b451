// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`TestRun`](crate::TestRun).
///
/// Returned by [`TestRun::serialize`](crate::TestRun::serialize) and
/// [`TestRun::to_string`](crate::TestRun::to_string).
#[derive(Debug, Error)]
#[error("error serializing TRX report")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

/// An error that occurs while reading a [`TestRun`](crate::TestRun) back from XML.
///
/// Returned by [`TestRun::deserialize_from_str`](crate::TestRun::deserialize_from_str).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeserializeError {
    /// The document is not well-formed XML.
    #[error("error reading TRX report")]
    Xml(#[from] quick_xml::Error),

    /// An attribute value could not be interpreted.
    #[error("invalid value `{value}` for attribute `{attribute}` on element `{element}`")]
    InvalidAttribute {
        /// The element carrying the attribute.
        element: String,

        /// The attribute name.
        attribute: &'static str,

        /// The raw attribute value.
        value: String,
    },

    /// A required attribute was not present.
    #[error("element `{element}` is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The element that is missing the attribute.
        element: String,

        /// The attribute name.
        attribute: &'static str,
    },

    /// A required element was not present.
    #[error("missing required element `{element}`")]
    MissingElement {
        /// The element name.
        element: &'static str,
    },
}
