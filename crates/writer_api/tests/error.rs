use reqwest::StatusCode;

use session_contract::BackendError;
use writer_api::error::parse_error_message;
use writer_api::WriterApiError;

#[test]
fn parse_error_message_reads_detail_string() {
    let body = r#"{"detail":"Draft not found"}"#;
    assert_eq!(
        parse_error_message(StatusCode::NOT_FOUND, body),
        "Draft not found"
    );
}

#[test]
fn parse_error_message_joins_validation_details() {
    let body = r#"{"detail":[{"loc":["body","chapter"],"msg":"field required"},{"msg":"value is not a valid integer"}]}"#;
    assert_eq!(
        parse_error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
        "field required; value is not a valid integer"
    );
}

#[test]
fn parse_error_message_reads_error_field() {
    let body = r#"{"success":false,"error":"max revisions reached"}"#;
    assert_eq!(
        parse_error_message(StatusCode::BAD_REQUEST, body),
        "max revisions reached"
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    let body = "raw failure text";
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
    assert_eq!(message, "raw failure text");
}

#[test]
fn parse_error_message_uses_reason_for_empty_body() {
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}

#[test]
fn writer_errors_convert_into_backend_errors() {
    assert_eq!(
        BackendError::from(WriterApiError::Status(
            StatusCode::NOT_FOUND,
            "missing".to_owned()
        )),
        BackendError::Status {
            status: 404,
            message: "missing".to_owned()
        }
    );
    assert_eq!(
        BackendError::from(WriterApiError::Rejected("no".to_owned())),
        BackendError::Rejected("no".to_owned())
    );
    assert_eq!(
        BackendError::from(WriterApiError::Cancelled),
        BackendError::Cancelled
    );
    assert!(matches!(
        BackendError::from(WriterApiError::RetryExhausted {
            status: None,
            last_error: Some("reset".to_owned())
        }),
        BackendError::Transport(_)
    ));
}
