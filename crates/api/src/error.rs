//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use ledger::LedgerError;
use stock_store::StoreError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body is `{"error": message, "kind": kind}`, where `kind` is
/// the machine-readable name of the underlying error.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Ledger or alert evaluation error.
    Ledger(LedgerError),
    /// Receipt or order fulfillment error.
    Fulfillment(FulfillmentError),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Ledger(err) => err.kind(),
            ApiError::Fulfillment(err) => err.kind(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(err) => ledger_status(err),
            ApiError::Fulfillment(err) => fulfillment_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        metrics::counter!("api_errors_total", "kind" => kind).increment(1);

        let mut body = serde_json::json!({ "error": self.to_string(), "kind": kind });
        if let ApiError::Fulfillment(FulfillmentError::InsufficientStock { shortfalls, .. }) =
            &self
        {
            body["shortfalls"] = serde_json::json!(shortfalls);
        }

        if status.is_server_error() {
            tracing::error!(error = %self, kind, "internal server error");
        }

        (status, axum::Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => f.write_str(msg),
            ApiError::Ledger(err) => write!(f, "{err}"),
            ApiError::Fulfillment(err) => write!(f, "{err}"),
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnknownItem(_) => StatusCode::NOT_FOUND,
        LedgerError::OutOfOrderTimestamp { .. } | LedgerError::InsufficientStock { .. } => {
            StatusCode::CONFLICT
        }
        LedgerError::NoThresholdConfigured(_) | LedgerError::InvalidQuantity { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::Store(StoreError::SequenceConflict { .. }) => StatusCode::CONFLICT,
        LedgerError::IntegrityViolation { .. } | LedgerError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn fulfillment_status(err: &FulfillmentError) -> StatusCode {
    match err {
        FulfillmentError::UnknownSku(_) | FulfillmentError::UnknownMaterial(_) => {
            StatusCode::NOT_FOUND
        }
        FulfillmentError::InvalidLine { .. } => StatusCode::BAD_REQUEST,
        FulfillmentError::InsufficientStock { .. } => StatusCode::CONFLICT,
        FulfillmentError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FulfillmentError::Ledger(err) => ledger_status(err),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ItemId, Quantity};
    use stock_store::SequenceNumber;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let item = ItemId::new("bolt-1");

        assert_eq!(
            ApiError::from(LedgerError::UnknownItem(item.clone())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::InsufficientStock {
                item_id: item.clone(),
                balance: Quantity::new(1),
                delta: Quantity::new(-2),
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::NoThresholdConfigured(item.clone())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(LedgerError::Store(StoreError::SequenceConflict {
                item_id: item.clone(),
                expected: SequenceNumber::new(2),
                actual: SequenceNumber::new(3),
            }))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::IntegrityViolation {
                item_id: item,
                cached: Quantity::new(1),
                replayed: Quantity::new(2),
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn kind_passes_through_wrapped_errors() {
        let err = ApiError::from(FulfillmentError::Ledger(LedgerError::UnknownItem(
            ItemId::new("bolt-1"),
        )));
        assert_eq!(err.kind(), "unknown_item");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
