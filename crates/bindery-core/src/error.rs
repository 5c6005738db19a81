// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bindery.
//
// The variants are deliberately fine-grained: `IncorrectPassword` drives a
// password-retry prompt in the front end, so it must never be folded into a
// generic decode failure.

use thiserror::Error;

/// Top-level error type for all Bindery operations.
#[derive(Debug, Error)]
pub enum BinderyError {
    // -- Decode errors --
    #[error("malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("incorrect or missing password for encrypted document")]
    IncorrectPassword,

    // -- Image errors --
    #[error("cannot decode image as {0}")]
    UnsupportedImage(String),

    // -- Rasterisation errors --
    #[error("page could not be rasterised: {0}")]
    Render(String),

    // -- Operation preconditions --
    #[error("no {0} supplied")]
    EmptyInput(&'static str),

    #[error("operation needs {needed} input(s), got {got}")]
    InsufficientInput { needed: usize, got: usize },

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    // -- Storage / persistence (CLI edge) --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BinderyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_password_is_distinct() {
        // The match must be able to single this variant out; the unlock flow
        // depends on it.
        let err = BinderyError::IncorrectPassword;
        assert!(matches!(err, BinderyError::IncorrectPassword));
        assert!(!matches!(err, BinderyError::MalformedDocument(_)));
    }

    #[test]
    fn insufficient_input_message_names_counts() {
        let err = BinderyError::InsufficientInput { needed: 2, got: 1 };
        assert_eq!(err.to_string(), "operation needs 2 input(s), got 1");
    }
}
