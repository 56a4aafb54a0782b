//! Input validation for user-supplied chat text and credentials
//!
//! Checks run before anything is put on the wire so that obviously bad input
//! fails locally with a precise error instead of a vague server reply.

use thiserror::Error;

use crate::constants::MAX_MESSAGE_LENGTH;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too long: {0} characters (max: {1})")]
    MessageTooLong(usize, usize),

    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Username contains control characters")]
    InvalidUsername,
}

/// Validate a chat message and return the trimmed text to send
///
/// # Examples
///
/// ```
/// use hamlet_link_common::validation::validate_chat_message;
///
/// assert_eq!(validate_chat_message("  hello ").unwrap(), "hello");
/// assert!(validate_chat_message("   ").is_err());
/// ```
pub fn validate_chat_message(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    let length = trimmed.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::MessageTooLong(length, MAX_MESSAGE_LENGTH));
    }

    Ok(trimmed.to_string())
}

/// Validate login or registration credentials
///
/// Returns the trimmed username. The password is sent as typed.
pub fn validate_credentials(user: &str, password: &str) -> Result<String, ValidationError> {
    let user = user.trim();
    if user.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }

    if user.chars().any(char::is_control) {
        return Err(ValidationError::InvalidUsername);
    }

    Ok(user.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_chat_message_trims() {
        assert_eq!(validate_chat_message("hi").unwrap(), "hi");
        assert_eq!(validate_chat_message("\t /help \n").unwrap(), "/help");
    }

    #[test]
    fn test_validate_chat_message_empty() {
        assert_eq!(
            validate_chat_message(""),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(
            validate_chat_message(" \n\t"),
            Err(ValidationError::EmptyMessage)
        );
    }

    #[test]
    fn test_validate_chat_message_length_limit() {
        let at_limit = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(validate_chat_message(&at_limit).is_ok());

        let over = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert_eq!(
            validate_chat_message(&over),
            Err(ValidationError::MessageTooLong(
                MAX_MESSAGE_LENGTH + 1,
                MAX_MESSAGE_LENGTH
            ))
        );
    }

    #[test]
    fn test_validate_chat_message_counts_characters() {
        // 2000 multi-byte characters are within the limit
        let text = "é".repeat(MAX_MESSAGE_LENGTH);
        assert!(validate_chat_message(&text).is_ok());
    }

    #[test]
    fn test_validate_credentials() {
        assert_eq!(validate_credentials(" alice ", "pw").unwrap(), "alice");
        assert_eq!(
            validate_credentials("", "pw"),
            Err(ValidationError::MissingCredentials)
        );
        assert_eq!(
            validate_credentials("alice", ""),
            Err(ValidationError::MissingCredentials)
        );
        assert_eq!(
            validate_credentials("ali\u{0}ce", "pw"),
            Err(ValidationError::InvalidUsername)
        );
    }
}
