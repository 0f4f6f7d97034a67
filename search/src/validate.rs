//! Client-side checks run before a new macro is submitted.

use ghmacros_protocol::ErrorCode;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    EmptyName,
    NameContainsSpaces,
    EmptyUrl,
    InvalidUrl,
}

impl InvalidReason {
    pub fn error_code(self) -> ErrorCode {
        match self {
            InvalidReason::EmptyName => ErrorCode::EmptyName,
            InvalidReason::NameContainsSpaces => ErrorCode::NameContainsSpaces,
            InvalidReason::EmptyUrl => ErrorCode::EmptyUrl,
            InvalidReason::InvalidUrl => ErrorCode::InvalidUrl,
        }
    }

    pub fn user_message(self) -> &'static str {
        self.error_code().user_message()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
}

/// Checks are applied in order; the first failure wins.
pub fn validate_new_macro(name: &str, url: &str) -> Validation {
    if name.is_empty() {
        return Validation::Invalid(InvalidReason::EmptyName);
    }
    if name.contains(' ') {
        return Validation::Invalid(InvalidReason::NameContainsSpaces);
    }
    if url.is_empty() {
        return Validation::Invalid(InvalidReason::EmptyUrl);
    }
    if Url::parse(url).is_err() {
        return Validation::Invalid(InvalidReason::InvalidUrl);
    }
    Validation::Valid
}

/// Whether `url` already points at GitHub's user-content CDN.
pub fn is_github_media_link(url: &str) -> bool {
    Url::parse(url).is_ok_and(|url| {
        url.host_str()
            .is_some_and(|host| host.ends_with("githubusercontent.com"))
    })
}
