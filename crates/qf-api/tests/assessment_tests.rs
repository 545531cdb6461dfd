use axum::http::StatusCode;
use qf_api::assessment::{AssessmentAnswerResponse, AssessmentQuestionResponse};
use qf_engine::{SessionStore, adaptive::LevelChange};
use serde_json::json;
use uuid::Uuid;

use crate::common::{TestClient, TestStateBuilder, fixtures};

#[tokio::test]
async fn test_first_question_at_start_level() {
    let (state, _usage) = TestStateBuilder::new().build().unwrap();
    let assessment_id = fixtures::seed_assessment(&state, Uuid::new_v4());
    let client = TestClient::new(state);

    let response = client
        .get(&format!("/assessments/{assessment_id}/question"))
        .await;
    response.assert_status(StatusCode::OK);

    let question: AssessmentQuestionResponse = response.json();
    assert_eq!(question.level, 3);
    assert_eq!(question.questions_answered, 0);
    assert_eq!(question.questions_remaining, 20);
    assert_eq!(question.question.level, 3);
}

#[tokio::test]
async fn test_three_correct_answers_advance() {
    let (state, mut usage) = TestStateBuilder::new().build().unwrap();
    let assessment_id = fixtures::seed_assessment(&state, Uuid::new_v4());
    let client = TestClient::new(state.clone());

    let mut last = None;
    for _ in 0..3 {
        client
            .get(&format!("/assessments/{assessment_id}/question"))
            .await
            .assert_status(StatusCode::OK);
        let correct = fixtures::assessment_correct_index(&state, assessment_id);

        let response = client
            .post_json(
                &format!("/assessments/{assessment_id}/answer"),
                &json!({ "selected_index": correct, "time_spent_secs": 6.0 }),
            )
            .await;
        response.assert_status(StatusCode::OK);
        last = Some(response.json::<AssessmentAnswerResponse>());
    }

    let last = last.unwrap();
    assert_eq!(last.level_change, LevelChange::Advanced { from: 3, to: 4 });
    assert_eq!(last.level, 4);
    assert_eq!(last.questions_remaining, 17);
    assert!(!last.is_complete);

    let mut logged = 0;
    while usage.try_recv().is_ok() {
        logged += 1;
    }
    assert_eq!(logged, 3);

    let stored = state.assessments.load(assessment_id).unwrap();
    assert_eq!(stored.session.state().highest_level_reached, 4);
}

#[tokio::test]
async fn test_result_while_in_progress_is_conflict() {
    let (state, _usage) = TestStateBuilder::new().build().unwrap();
    let assessment_id = fixtures::seed_assessment(&state, Uuid::new_v4());
    let client = TestClient::new(state);

    let response = client
        .get(&format!("/assessments/{assessment_id}/result"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "conflict");
}

#[tokio::test]
async fn test_start_requires_topics() {
    let (state, _usage) = TestStateBuilder::new().build().unwrap();
    let client = TestClient::new(state);

    let response = client
        .post_json(
            "/assessments",
            &json!({ "user_id": Uuid::new_v4(), "subject": "mathematics", "topics": [] }),
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "validation_error");
}

#[tokio::test]
async fn test_answer_unknown_assessment() {
    let (state, _usage) = TestStateBuilder::new().build().unwrap();
    let client = TestClient::new(state);

    client
        .post_json(
            &format!("/assessments/{}/answer", Uuid::new_v4()),
            &json!({ "selected_index": 0, "time_spent_secs": 1.0 }),
        )
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
