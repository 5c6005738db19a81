// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every engine error is mapped to plain English with a clear suggestion, so
// the front end never has to show a raw parser message.

use crate::error::BinderyError;

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying again with different input can succeed.
    pub retriable: bool,
}

/// Convert a `BinderyError` into a `HumanError`.
pub fn humanize_error(err: &BinderyError) -> HumanError {
    match err {
        BinderyError::MalformedDocument(detail) => HumanError {
            message: "This PDF file could not be read.".into(),
            suggestion: format!(
                "The file may be damaged or not a real PDF. Try re-exporting it. ({detail})"
            ),
            retriable: false,
        },

        // The wrong-password case gets its own wording so the front end can
        // offer a retry with a new password instead of a generic failure.
        BinderyError::IncorrectPassword => HumanError {
            message: "The password is not correct.".into(),
            suggestion: "Check the password and try again.".into(),
            retriable: true,
        },

        BinderyError::UnsupportedImage(kind) => HumanError {
            message: "This image could not be read.".into(),
            suggestion: format!(
                "The file does not look like a valid {kind} image. Check the file extension matches its contents."
            ),
            retriable: false,
        },

        BinderyError::Render(detail) => HumanError {
            message: "A page could not be converted to an image.".into(),
            suggestion: format!("The page uses content this tool cannot draw. ({detail})"),
            retriable: false,
        },

        BinderyError::EmptyInput(what) => HumanError {
            message: format!("No {what} was provided."),
            suggestion: format!("Add a {what}, then run the operation again."),
            retriable: true,
        },

        BinderyError::InsufficientInput { needed, got } => HumanError {
            message: "The wrong number of files was selected.".into(),
            suggestion: format!("This operation needs {needed} file(s); you selected {got}."),
            retriable: true,
        },

        BinderyError::PageOutOfRange { page, count } => HumanError {
            message: "That page does not exist.".into(),
            suggestion: format!("Page {page} was requested but the document has {count} pages."),
            retriable: false,
        },

        BinderyError::Io(detail) => HumanError {
            message: "A file could not be read or written.".into(),
            suggestion: format!("Check the file exists and you have permission. ({detail})"),
            retriable: true,
        },

        BinderyError::Serialization(detail) => HumanError {
            message: "Settings could not be saved or loaded.".into(),
            suggestion: format!("The settings file may be damaged. ({detail})"),
            retriable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_is_retriable() {
        let human = humanize_error(&BinderyError::IncorrectPassword);
        assert!(human.retriable);
        assert!(human.message.to_lowercase().contains("password"));
    }

    #[test]
    fn malformed_document_is_not_retriable() {
        let human = humanize_error(&BinderyError::MalformedDocument("bad xref".into()));
        assert!(!human.retriable);
        assert!(human.suggestion.contains("bad xref"));
    }
}
