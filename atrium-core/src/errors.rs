//! # Errors
//!
//! Atrium carries a small set of structured errors through `anyhow::Error`.
//! Core goals:
//! - consistent status codes + class names
//! - can flow through any caller as `anyhow::Error` and be recovered later
//! - transport-agnostic (the adapter crate decides how to serialize)
//!
//! Validation failures attach their field errors as a JSON object under
//! `errors`, e.g. `{"name": ["required"]}`; the adapter surfaces them next
//! to the offending field instead of as a hard failure page.

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for atrium core APIs.
pub type AtriumResult<T> = std::result::Result<T, AnyError>;

/// Error classes the tenancy engine produces.
///
/// `IsolationMissing` is the one class that is never recoverable by the
/// caller: a tenant-scoped operation ran without an isolation context, and
/// guessing a default endpoint would leak data across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    Conflict,         // 409
    Unprocessable,    // 422
    IsolationMissing, // 500 (fatal for the operation)
    GeneralError,     // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::IsolationMissing => 500,
            ErrorKind::GeneralError => 500,
        }
    }

    /// Error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::IsolationMissing => "IsolationContextMissing",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::IsolationMissing => "isolation-context-missing",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// A structured atrium error that can live inside `anyhow::Error`.
///
/// Fields:
/// - name
/// - message
/// - code (HTTP status)
/// - class_name
/// - data (optional)
/// - errors (optional, field-attached validation errors)
#[derive(Debug)]
pub struct AtriumError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub errors: Option<serde_json::Value>,
    pub source: Option<AnyError>,
}

impl AtriumError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: serde_json::Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a single-field validation message, e.g. `field_error("name", "required")`.
    pub fn field_error(self, field: &str, message: impl Into<String>) -> Self {
        self.with_errors(serde_json::json!({ field: [message.into()] }))
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through `?`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Downcast an `anyhow::Error` to an `AtriumError` if possible.
    pub fn from_anyhow(err: &AnyError) -> Option<&AtriumError> {
        err.downcast_ref::<AtriumError>()
    }

    /// Turn any error into an AtriumError:
    /// - if it’s already an AtriumError, keep it (lossless)
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> AtriumError {
        match err.downcast::<AtriumError>() {
            Ok(atrium) => atrium,
            Err(other) => {
                AtriumError::new(ErrorKind::GeneralError, other.to_string()).with_source(other)
            }
        }
    }

    /// A “safe” version suitable for returning to clients:
    /// - keep kind/message/code/class_name/data/errors
    /// - drop the inner `source` (stack/secret details)
    pub fn sanitize_for_client(&self) -> AtriumError {
        AtriumError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    /// JSON payload for transports.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn isolation_missing(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IsolationMissing, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for AtriumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for AtriumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for “bail with AtriumError”.
#[macro_export]
macro_rules! bail_atrium {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::AtriumError::$ctor($msg).into_anyhow());
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::AtriumError::$ctor(format!($fmt, $($arg)*)).into_anyhow());
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_preserves_structured_errors() {
        let err = AtriumError::forbidden("no access")
            .field_error("tenant", "You do not have access to this team")
            .into_anyhow();

        let back = AtriumError::normalize(err);
        assert_eq!(back.kind, ErrorKind::Forbidden);
        assert_eq!(back.code(), 403);
        assert_eq!(
            back.errors.unwrap()["tenant"][0],
            "You do not have access to this team"
        );
    }

    #[test]
    fn normalize_wraps_plain_errors_as_general() {
        let back = AtriumError::normalize(anyhow::anyhow!("boom"));
        assert_eq!(back.kind, ErrorKind::GeneralError);
        assert!(back.message.contains("boom"));
    }

    #[test]
    fn isolation_missing_shape() {
        let err = AtriumError::isolation_missing("no active tenant");
        assert_eq!(err.code(), 500);
        assert_eq!(err.name(), "IsolationContextMissing");
        assert_eq!(err.class_name(), "isolation-context-missing");
    }
}
