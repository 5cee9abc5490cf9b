use pretty_assertions::assert_eq;
use serde_json::json;
use session_contract::{
    AiContentRange, ContinueRequest, DraftStatus, FeedbackAction, FeedbackRequest,
    SaveDraftRequest, SessionScope, StartSessionRequest,
};
use writer_api::payload::{
    AckBody, ContinueBody, ContinueResponseBody, DraftBody, FeedbackBody, SaveDraftBody,
    StartSessionBody,
};
use writer_api::WriterApiError;

fn scope() -> SessionScope {
    SessionScope::new("novel-1", "ch-03")
}

#[test]
fn start_body_uses_backend_field_names() {
    let body = StartSessionBody::new(
        &scope(),
        StartSessionRequest {
            chapter_id: "ch-03".to_owned(),
            title: "The Storm".to_owned(),
            goal: "Introduce the antagonist".to_owned(),
            participant_ids: vec!["lin".to_owned(), "mo".to_owned()],
            target_word_count: 2000,
        },
    );

    assert_eq!(
        serde_json::to_value(&body).expect("serialize"),
        json!({
            "project_id": "novel-1",
            "chapter": "ch-03",
            "chapter_title": "The Storm",
            "chapter_goal": "Introduce the antagonist",
            "characters": ["lin", "mo"],
            "target_words": 2000
        })
    );
}

#[test]
fn continue_body_omits_insert_position_for_append() {
    let request = ContinueRequest {
        chapter_id: "ch-03".to_owned(),
        existing_content: "Once.".to_owned(),
        instruction: "keep going".to_owned(),
        target_word_count: 500,
        insert_position: None,
    };
    let value = serde_json::to_value(ContinueBody::new(&scope(), request.clone()))
        .expect("serialize");
    assert!(value.get("insert_position").is_none());

    let insert = ContinueRequest {
        insert_position: Some(3),
        ..request
    };
    let value = serde_json::to_value(ContinueBody::new(&scope(), insert)).expect("serialize");
    assert_eq!(value["insert_position"], json!(3));
    assert_eq!(value["existing_content"], json!("Once."));
}

#[test]
fn feedback_body_maps_comment_to_content() {
    let body = FeedbackBody::from(FeedbackRequest {
        action: FeedbackAction::Revise,
        comment: Some("tighten the dialogue".to_owned()),
    });
    assert_eq!(
        serde_json::to_value(&body).expect("serialize"),
        json!({"action": "revise", "content": "tighten the dialogue"})
    );

    let confirm = FeedbackBody::from(FeedbackRequest {
        action: FeedbackAction::Confirm,
        comment: None,
    });
    assert_eq!(
        serde_json::to_value(&confirm).expect("serialize"),
        json!({"action": "confirm"})
    );
}

#[test]
fn save_body_uses_chapter_key() {
    let body = SaveDraftBody::from(SaveDraftRequest {
        chapter_id: "ch-03".to_owned(),
        content: "text".to_owned(),
        word_count: 4,
        status: DraftStatus::Draft,
    });
    assert_eq!(
        serde_json::to_value(&body).expect("serialize"),
        json!({"chapter": "ch-03", "content": "text", "word_count": 4, "status": "draft"})
    );
}

#[test]
fn continue_response_keeps_explicit_range() {
    let body: ContinueResponseBody = serde_json::from_value(json!({
        "success": true,
        "draft": {"content": "Hello world", "word_count": 11},
        "new_content_length": 11,
        "ai_content_range": {"start": 6, "end": 11}
    }))
    .expect("deserialize");

    let response = body.into_response().expect("response");
    assert_eq!(response.draft.content, "Hello world");
    assert_eq!(response.new_content_length, 11);
    assert_eq!(response.ai_content_range, Some(AiContentRange::new(6, 11)));
}

#[test]
fn continue_response_defaults_lengths_from_content() {
    let body: ContinueResponseBody = serde_json::from_value(json!({
        "draft": {"content": "夜色很深"}
    }))
    .expect("deserialize");

    let response = body.into_response().expect("response");
    assert_eq!(response.new_content_length, 4);
    assert_eq!(response.draft.word_count, 4);
    assert_eq!(response.ai_content_range, None);
}

#[test]
fn continue_response_success_false_is_rejected_with_error_text() {
    let body: ContinueResponseBody = serde_json::from_value(json!({
        "success": false,
        "error": "model unavailable"
    }))
    .expect("deserialize");

    match body.into_response() {
        Err(WriterApiError::Rejected(message)) => assert_eq!(message, "model unavailable"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn continue_response_without_draft_is_malformed() {
    let body: ContinueResponseBody =
        serde_json::from_value(json!({"success": true})).expect("deserialize");
    assert!(matches!(
        body.into_response(),
        Err(WriterApiError::MalformedResponse(_))
    ));
}

#[test]
fn ack_body_falls_back_to_message_when_error_missing() {
    let ack: AckBody = serde_json::from_value(json!({
        "success": false,
        "message": "confirm the current version instead"
    }))
    .expect("deserialize");

    match ack.into_result() {
        Err(WriterApiError::Rejected(message)) => {
            assert_eq!(message, "confirm the current version instead")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn ack_body_without_success_flag_is_accepted() {
    let ack: AckBody = serde_json::from_value(json!({"status": "waiting"})).expect("deserialize");
    assert!(ack.into_result().is_ok());
}

#[test]
fn draft_body_converts_with_fallbacks() {
    let body: DraftBody = serde_json::from_value(json!({
        "project_id": "novel-1",
        "chapter": "ch-03",
        "version": 4,
        "content": "abc",
        "status": "reviewed",
        "created_at": "2024-01-01T00:00:00"
    }))
    .expect("deserialize");

    let draft = body.into_draft("fallback");
    assert_eq!(draft.chapter_id, "ch-03");
    assert_eq!(draft.version, 4);
    assert_eq!(draft.word_count, 3);
    assert_eq!(draft.status, DraftStatus::Reviewed);

    let bare: DraftBody = serde_json::from_value(json!({"version": 1, "content": ""}))
        .expect("deserialize");
    assert_eq!(bare.into_draft("ch-09").chapter_id, "ch-09");
}
