use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Pagination metadata attached to list responses.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Envelope every endpoint answers with, errors included.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    /// A single resource; `meta` is present but empty.
    pub fn single(message: impl Into<String>, data: T) -> Self {
        Self::success(message, data, Some(Meta::empty()))
    }

    /// One page of a list, with its page, size and the unpaged total.
    pub fn paged(message: impl Into<String>, data: T, meta: Meta) -> Self {
        Self::success(message, data, Some(meta))
    }
}

impl ApiResponse<ErrorBody> {
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            data: Some(ErrorBody {
                error: message.clone(),
            }),
            message,
            meta: Some(Meta::empty()),
        }
    }
}
