use thiserror::Error;

/// Order context validation failures. These abort a request before any
/// pipeline stage runs and are the only errors the entry point surfaces
/// directly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order context is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("order context field `{0}` is missing or empty")]
    MissingField(&'static str),
    #[error("order date `{value}` is not a YYYY-MM-DD calendar date")]
    InvalidOrderDate { value: String },
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MalformedJson(_) => {
                "The order details could not be read. Check the order information and try again."
            }
            Self::MissingField(_) => {
                "Some required order details are missing. Check the order information and try again."
            }
            Self::InvalidOrderDate { .. } => {
                "The order date could not be read. Check the order information and try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ValidationError;

    #[test]
    fn user_messages_never_leak_raw_input() {
        let error = ValidationError::MalformedJson("expected `,` at line 1".to_owned());
        assert!(!error.user_message().contains("line 1"));

        let error = ValidationError::InvalidOrderDate { value: "04/20/2025".to_owned() };
        assert!(!error.user_message().contains("04/20"));
    }
}
