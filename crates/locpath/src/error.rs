use core::fmt;

/// Error codes raised while evaluating a location path.
///
/// Only the subset of XPath/XQuery codes the path core can emit is listed;
/// `FOER0000` covers generic failures such as unsupported test combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOER0000, // generic error
    FORG0006, // effective boolean value not defined for the sequence
    XPDY0002, // context item undefined
    XPTY0004, // type error in an operand
    XPTY0018, // last path step mixes nodes and atomic values
    XPTY0019, // path step applied to a non-node
    XPTY0020, // axis step context item is not a node
    XPST0008, // undeclared variable
    XPST0081, // unresolved namespace prefix
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOER0000 => "err:FOER0000",
            ErrorCode::FORG0006 => "err:FORG0006",
            ErrorCode::XPDY0002 => "err:XPDY0002",
            ErrorCode::XPTY0004 => "err:XPTY0004",
            ErrorCode::XPTY0018 => "err:XPTY0018",
            ErrorCode::XPTY0019 => "err:XPTY0019",
            ErrorCode::XPTY0020 => "err:XPTY0020",
            ErrorCode::XPST0008 => "err:XPST0008",
            ErrorCode::XPST0081 => "err:XPST0081",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        use ErrorCode::*;
        Some(match s {
            "err:FOER0000" => FOER0000,
            "err:FORG0006" => FORG0006,
            "err:XPDY0002" => XPDY0002,
            "err:XPTY0004" => XPTY0004,
            "err:XPTY0018" => XPTY0018,
            "err:XPTY0019" => XPTY0019,
            "err:XPTY0020" => XPTY0020,
            "err:XPST0008" => XPST0008,
            "err:XPST0081" => XPST0081,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a path evaluation.
///
/// `Query` errors are fatal to the running evaluation and carry the offending
/// step or expression (rendered) when one is known. `Cancelled` is the
/// cooperative abort signal and never denotes a faulty query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("error: {message} ({code}){}", .context.as_deref().map(|c| format!(" in {c}")).unwrap_or_default())]
    Query {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },
    #[error("evaluation cancelled")]
    Cancelled,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Error::Query {
            code,
            message: msg.into(),
            context: None,
        }
    }

    /// Attach the rendered step or expression that raised this error.
    /// Cancellation and errors that already carry a context are left untouched.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            Error::Query {
                code,
                message,
                context: None,
            } => Error::Query {
                code,
                message,
                context: Some(ctx.to_string()),
            },
            other => other,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Query { code, .. } => Some(*code),
            Error::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn no_context() -> Self {
        Self::from_code(ErrorCode::XPDY0002, "context item is undefined")
    }

    pub fn not_a_node(what: impl fmt::Display) -> Self {
        Self::from_code(ErrorCode::XPTY0019, format!("path step requires a node, found {what}"))
    }

    pub fn mixed_path() -> Self {
        Self::from_code(
            ErrorCode::XPTY0018,
            "path step yields both nodes and atomic values",
        )
    }

    pub fn unsupported(feature: &str) -> Self {
        Self::from_code(ErrorCode::FOER0000, format!("not supported: {feature}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_attached_once() {
        let err = Error::no_context().with_context("child::a").with_context("child::b");
        assert_eq!(
            err.to_string(),
            "error: context item is undefined (err:XPDY0002) in child::a"
        );
        assert_eq!(err.code(), Some(ErrorCode::XPDY0002));
    }

    #[test]
    fn cancellation_has_no_code() {
        let err = Error::Cancelled.with_context("child::a");
        assert!(err.is_cancelled());
        assert_eq!(err.code(), None);
        assert_eq!(ErrorCode::from_code("err:XPTY0018"), Some(ErrorCode::XPTY0018));
    }
}
