mod routes;

pub use routes::{
    FinishResponse, PracticeAnswerResponse, PracticeQuestionResponse, RevealResponse,
    StartPracticeRequest, routes,
};
