//! Value-model error types.

use thiserror::Error;

/// Errors raised by the value model: lexical parsing, datatype resolution,
/// and bag construction.
///
/// At load time these surface as fatal configuration errors; at evaluation
/// time the caller maps them to an Indeterminate with a `syntax-error` or
/// `processing-error` status.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ValueError {
    /// A literal string is not a valid lexical form for its datatype.
    #[error("invalid {datatype} literal '{lexical}': {reason}")]
    InvalidLexicalForm {
        /// Short name of the target datatype.
        datatype: String,
        /// The offending lexical value.
        lexical: String,
        /// What made it invalid.
        reason: String,
    },

    /// A datatype URI is neither standard nor registered.
    #[error("unknown datatype: {uri}")]
    UnknownDatatype {
        /// The unresolved datatype URI.
        uri: String,
    },

    /// A datatype URI was registered twice.
    #[error("datatype already registered: {uri}")]
    DuplicateDatatype {
        /// The duplicated datatype URI.
        uri: String,
    },

    /// A value of one datatype was inserted into a bag of another.
    #[error("bag of {bag_datatype} cannot hold a {value_datatype} value")]
    MixedBag {
        /// The bag's declared element datatype.
        bag_datatype: String,
        /// The datatype of the rejected value.
        value_datatype: String,
    },
}

impl ValueError {
    /// Shorthand for [`ValueError::InvalidLexicalForm`].
    pub fn lexical(datatype: impl Into<String>, lexical: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLexicalForm {
            datatype: datatype.into(),
            lexical: lexical.into(),
            reason: reason.into(),
        }
    }
}
