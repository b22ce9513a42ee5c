//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::Turn;
use crate::domain::{Question, QuestionKind, QuestionPreference, UserProfile};
use crate::report::Report;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession(StartIn),
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        answer: String,
    },
    ViewSession {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Question {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        question: QuestionOut,
        #[serde(rename = "questionNumber")]
        question_number: usize,
        #[serde(rename = "maxQuestions")]
        max_questions: usize,
    },
    Report {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        report: Report,
    },
    Error {
        code: String,
        message: String,
    },
}

impl From<TurnOut> for ServerWsMessage {
    fn from(t: TurnOut) -> Self {
        match t {
            TurnOut::Question { session_id, question, question_number, max_questions } =>
                ServerWsMessage::Question { session_id, question, question_number, max_questions },
            TurnOut::Report { session_id, report } => ServerWsMessage::Report { session_id, report },
        }
    }
}

/// DTO for a pending question. Indicator tags stay server-side.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionOut {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl From<&Question> for QuestionOut {
    fn from(q: &Question) -> Self {
        QuestionOut {
            text: q.prompt.clone(),
            kind: q.kind,
            options: q.options.clone(),
        }
    }
}

/// DTO used by both WS and HTTP for the result of a session operation.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOut {
    Question {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        question: QuestionOut,
        #[serde(rename = "questionNumber")]
        question_number: usize,
        #[serde(rename = "maxQuestions")]
        max_questions: usize,
    },
    Report {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        report: Report,
    },
}

/// Convert an assessment `Turn` to the public DTO.
pub fn to_out(session_id: Uuid, turn: Turn) -> TurnOut {
    match turn {
        Turn::Question { question, number, max } => TurnOut::Question {
            session_id,
            question: QuestionOut::from(&question),
            question_number: number,
            max_questions: max,
        },
        Turn::Report(report) => TurnOut::Report { session_id, report },
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct StartIn {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub background: String,
    #[serde(rename = "questionPreference", default)]
    pub question_preference: QuestionPreference,
    /// Restart an existing session under the same id.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<Uuid>,
}

impl StartIn {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: self.name.trim().to_string(),
            age: self.age.trim().to_string(),
            background: self.background.trim().to_string(),
        }
    }
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub sessions: usize,
    pub documents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_parse_by_type_tag() {
        let start: ClientWsMessage = serde_json::from_value(json!({
            "type": "start_session",
            "name": "Ada",
            "age": "36",
            "background": "engineering",
            "questionPreference": "mcq"
        }))
        .unwrap();
        match start {
            ClientWsMessage::StartSession(s) => {
                assert_eq!(s.question_preference, QuestionPreference::MultipleChoice);
                assert!(s.session_id.is_none());
                assert_eq!(s.profile().name, "Ada");
            }
            other => panic!("unexpected {:?}", other),
        }

        let id = Uuid::new_v4();
        let submit: ClientWsMessage =
            serde_json::from_value(json!({"type": "submit_answer", "sessionId": id, "answer": "Yes"})).unwrap();
        assert!(matches!(submit, ClientWsMessage::SubmitAnswer { session_id, .. } if session_id == id));
    }

    #[test]
    fn question_turn_serializes_camel_case_without_indicators() {
        let id = Uuid::new_v4();
        let q = Question {
            prompt: "Do you sing?".into(),
            kind: QuestionKind::MultipleChoice,
            options: vec!["Yes".into(), "No".into()],
            indicators: vec!["musical".into()],
            rationale: "music".into(),
        };
        let v = serde_json::to_value(to_out(id, Turn::Question { question: q, number: 2, max: 10 })).unwrap();
        assert_eq!(v["type"], "question");
        assert_eq!(v["sessionId"], json!(id));
        assert_eq!(v["questionNumber"], 2);
        assert_eq!(v["maxQuestions"], 10);
        assert_eq!(v["question"]["type"], "mcq");
        assert_eq!(v["question"]["options"], json!(["Yes", "No"]));
        assert!(v["question"].get("indicators").is_none());
    }
}
