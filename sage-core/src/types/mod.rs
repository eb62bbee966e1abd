//! Domain types for the assessment kernel

mod interaction;
mod question;
mod session;

pub use interaction::Interaction;
pub use question::{AnswerLabel, BloomLevel, IrtParams, Question, QuestionOption};
pub use session::{KcState, Quiz, Session, SessionCondition, User};
