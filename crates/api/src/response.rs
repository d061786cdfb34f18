//! Shared response envelope for API handlers.
//!
//! Every successful response is `{ "success": true, "data": ... }`; errors
//! carry `success: false` (see [`crate::error::AppError`]).

use serde::Serialize;

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
