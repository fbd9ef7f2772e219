use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("request decoding failure: {0}")]
    Decode(String),
    #[error("queue failure: {0}")]
    Queue(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Body returned to the HTTP caller. Never includes internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Decode(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Queue(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError};

    #[test]
    fn decode_error_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::Decode("expected value at line 1".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn queue_error_maps_to_internal_so_slack_retries() {
        let interface =
            ApplicationError::Queue("queue lane closed".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
