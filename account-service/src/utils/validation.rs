use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::services::ServiceError;

/// JSON body extractor whose rejection renders as a `validation_failed` error.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServiceError::ValidationFailed(format!("Json parse error: {}", e.body_text())))?;

        Ok(JsonBody(value))
    }
}

/// Trimmed and lower-cased, the form used as the uniqueness key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims an optional field. Blank counts as not provided.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some("".to_string())), None);
        assert_eq!(normalize_optional(Some("   ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" Grace ".to_string())),
            Some("Grace".to_string())
        );
    }
}
