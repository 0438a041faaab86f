// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Admission error types.

use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// HTTP status reported for a malformed request.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// HTTP status reported when the webhook itself fails.
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// AdmissionError represents errors that can occur during admission.
///
/// Shape problems inside an admitted object are not errors: plugins absorb them
/// and let the object through unchanged. Only failures that prevent a response
/// from being built end up here.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// BadRequest indicates a malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Internal represents an internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization indicates the mutated object could not be encoded.
    #[error("failed to encode mutated object: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Config indicates an invalid plugin configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AdmissionError {
    /// Create a new BadRequest error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdmissionError::BadRequest(msg.into())
    }

    /// Create an Internal error.
    pub fn internal_error(msg: impl Into<String>) -> Self {
        AdmissionError::Internal(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        AdmissionError::Config(msg.into())
    }

    /// Returns the HTTP status code the transport should report for this error.
    pub fn code(&self) -> u16 {
        match self {
            AdmissionError::BadRequest(_) | AdmissionError::Config(_) => STATUS_BAD_REQUEST,
            AdmissionError::Internal(_) | AdmissionError::Serialization(_) => {
                STATUS_INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AdmissionError::bad_request("bad object").to_string(), "bad object");
        assert_eq!(
            AdmissionError::internal_error("boom").to_string(),
            "internal error: boom"
        );
        assert_eq!(
            AdmissionError::config("role is empty").to_string(),
            "invalid configuration: role is empty"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AdmissionError::bad_request("x").code(), 400);
        assert_eq!(AdmissionError::config("x").code(), 400);
        assert_eq!(AdmissionError::internal_error("x").code(), 500);

        let encode_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AdmissionError::Serialization(encode_err);
        assert_eq!(err.code(), 500);
        assert!(err.to_string().starts_with("failed to encode mutated object"));
    }
}
