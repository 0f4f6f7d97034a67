use serde::Deserialize;
use serde::Serialize;

use crate::MacroItem;

/// Result code returned by the add endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ErrorCode {
    Success,
    EmptyName,
    NameContainsSpaces,
    NameAlreadyExist,
    EmptyUrl,
    InvalidUrl,
    UrlHostnameNotSupported,
    FileIsTooBig,
    FileFormatNotSupported,
    TransientError,
    MissingMandatoryFields,
    InfraFailure,
    PermanentError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown add error code {0}")]
pub struct UnknownErrorCode(pub u8);

impl ErrorCode {
    /// Message shown to the user when adding a macro fails with this code.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCode::Success => "Added successfully",
            ErrorCode::EmptyName => "Name is empty",
            ErrorCode::NameContainsSpaces => "Name can't contain spaces",
            ErrorCode::NameAlreadyExist => "Name is already taken",
            ErrorCode::EmptyUrl => "URL is empty",
            ErrorCode::InvalidUrl => "URL is not valid",
            ErrorCode::UrlHostnameNotSupported => {
                "Only Github URLs are allowed. Drop the image into the comment box and get its URL from the Preview tab"
            }
            ErrorCode::FileIsTooBig => "Image exceeds 10Mb. Please reduce its size and try again",
            ErrorCode::FileFormatNotSupported => {
                "URL is not a valid supported image (jpeg/png/gif/bmp)"
            }
            ErrorCode::TransientError
            | ErrorCode::MissingMandatoryFields
            | ErrorCode::InfraFailure
            | ErrorCode::PermanentError => "Something went wrong, please try again later",
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Success => 0,
            ErrorCode::EmptyName => 1,
            ErrorCode::NameContainsSpaces => 2,
            ErrorCode::NameAlreadyExist => 3,
            ErrorCode::EmptyUrl => 4,
            ErrorCode::InvalidUrl => 5,
            ErrorCode::UrlHostnameNotSupported => 6,
            ErrorCode::FileIsTooBig => 7,
            ErrorCode::FileFormatNotSupported => 8,
            ErrorCode::TransientError => 9,
            ErrorCode::MissingMandatoryFields => 10,
            ErrorCode::InfraFailure => 11,
            ErrorCode::PermanentError => 12,
        }
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::EmptyName,
            2 => ErrorCode::NameContainsSpaces,
            3 => ErrorCode::NameAlreadyExist,
            4 => ErrorCode::EmptyUrl,
            5 => ErrorCode::InvalidUrl,
            6 => ErrorCode::UrlHostnameNotSupported,
            7 => ErrorCode::FileIsTooBig,
            8 => ErrorCode::FileFormatNotSupported,
            9 => ErrorCode::TransientError,
            10 => ErrorCode::MissingMandatoryFields,
            11 => ErrorCode::InfraFailure,
            12 => ErrorCode::PermanentError,
            other => return Err(UnknownErrorCode(other)),
        })
    }
}

/// Body returned by the add endpoint. `data` is only set on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMacroResponse {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MacroItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn codes_decode_from_numbers() -> anyhow::Result<()> {
        let resp: AddMacroResponse = serde_json::from_str(r#"{"code":3}"#)?;
        assert_eq!(resp.code, ErrorCode::NameAlreadyExist);
        assert_eq!(resp.data, None);

        let resp: AddMacroResponse =
            serde_json::from_str(r#"{"code":0,"data":{"name":"a","url":"u"}}"#)?;
        assert_eq!(resp.code, ErrorCode::Success);
        assert_eq!(resp.data, Some(MacroItem::new("a", "u")));
        Ok(())
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(serde_json::from_str::<AddMacroResponse>(r#"{"code":42}"#).is_err());
    }

    #[test]
    fn every_code_round_trips_through_its_number() {
        for raw in 0u8..=12 {
            let code = ErrorCode::try_from(raw).map(u8::from);
            assert_eq!(code, Ok(raw));
        }
    }
}
