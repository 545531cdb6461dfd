mod routes;

pub use routes::{
    AssessmentAnswerResponse, AssessmentQuestionResponse, AssessmentResultResponse,
    StartAssessmentRequest, routes,
};
