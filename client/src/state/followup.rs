//! One-question-at-a-time follow-up flow.
//!
//! The server supplies a batch of clarifying questions and a `ready` flag.
//! The flow walks the batch in order, recording each answer (an empty
//! answer for a skipped question), and hands the collected answers plus the
//! server's `ready` flag to the completion callback once the batch runs out.
//! The callback runs exactly once.
//!
//! [`gather_answers`] drives repeated rounds: each request carries every
//! answer so far, and rounds continue until a completed batch reports
//! `ready`, the batch comes back empty, the caller stops, or the round cap
//! is reached.

#[cfg(test)]
#[path = "followup_test.rs"]
mod followup_test;

use std::sync::{Arc, Mutex, PoisonError};

use records::{FollowUpAnswer, FollowUpQuestions};
use tracing::debug;
use uuid::Uuid;

use crate::net::{ChatApi, ClientError};

/// Most question rounds asked before diagnosing anyway.
pub const MAX_FOLLOWUP_ROUNDS: usize = 3;

/// Completion callback: collected answers and the server's `ready` flag.
pub type OnComplete = Box<dyn FnOnce(Vec<FollowUpAnswer>, bool) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FollowUpError {
    #[error("answer must not be empty")]
    EmptyAnswer,
    #[error("all questions have been answered")]
    Finished,
}

pub struct FollowUpFlow {
    questions: Vec<String>,
    ready: bool,
    index: usize,
    answers: Vec<FollowUpAnswer>,
    on_complete: Option<OnComplete>,
}

impl std::fmt::Debug for FollowUpFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUpFlow")
            .field("questions", &self.questions)
            .field("ready", &self.ready)
            .field("index", &self.index)
            .field("answers", &self.answers)
            .finish_non_exhaustive()
    }
}

impl FollowUpFlow {
    /// Start a flow over `batch`. An empty batch completes immediately.
    pub fn new(batch: FollowUpQuestions, on_complete: impl FnOnce(Vec<FollowUpAnswer>, bool) + Send + 'static) -> Self {
        let questions = batch
            .questions
            .into_iter()
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty())
            .collect();
        let mut flow = Self {
            questions,
            ready: batch.ready,
            index: 0,
            answers: Vec::new(),
            on_complete: Some(Box::new(on_complete)),
        };
        flow.complete_if_exhausted();
        flow
    }

    /// Question awaiting an answer, or `None` once the flow is complete.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.questions.get(self.index).map(String::as_str)
    }

    /// Zero-based position of the current question.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index >= self.questions.len()
    }

    #[must_use]
    pub fn answers(&self) -> &[FollowUpAnswer] {
        &self.answers
    }

    /// Record `answer` for the current question and advance.
    ///
    /// # Errors
    ///
    /// `EmptyAnswer` for blank input (the index does not move), `Finished`
    /// once every question has been answered.
    pub fn answer(&mut self, answer: &str) -> Result<(), FollowUpError> {
        if self.is_complete() {
            return Err(FollowUpError::Finished);
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(FollowUpError::EmptyAnswer);
        }
        self.record(answer.to_owned());
        Ok(())
    }

    /// Record an empty answer for the current question and advance.
    ///
    /// # Errors
    ///
    /// `Finished` once every question has been answered.
    pub fn skip(&mut self) -> Result<(), FollowUpError> {
        if self.is_complete() {
            return Err(FollowUpError::Finished);
        }
        self.record(String::new());
        Ok(())
    }

    fn record(&mut self, answer: String) {
        let question = self.questions[self.index].clone();
        self.answers.push(FollowUpAnswer { question, answer });
        self.index += 1;
        self.complete_if_exhausted();
    }

    fn complete_if_exhausted(&mut self) {
        if !self.is_complete() {
            return;
        }
        if let Some(done) = self.on_complete.take() {
            done(self.answers.clone(), self.ready);
        }
    }
}

// =============================================================================
// ROUNDS
// =============================================================================

/// What the person did with the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpReply {
    Answer(String),
    Skip,
    /// Stop asking; keep what has been answered.
    Stop,
}

/// Outcome of [`gather_answers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gathered {
    /// Answers from every round, in the order they were given.
    pub answers: Vec<FollowUpAnswer>,
    /// `ready` from the last completed batch.
    pub ready: bool,
    /// Requests made to the server.
    pub rounds: usize,
}

/// Ask clarifying questions round by round.
///
/// `ask` is called once per question with the flow positioned on it.
///
/// # Errors
///
/// Fails on the first request error or on an error from `ask`. A blank
/// [`FollowUpReply::Answer`] is an `EmptyAnswer` error.
pub async fn gather_answers<E>(
    chat: &ChatApi,
    session_id: Uuid,
    description: &str,
    max_rounds: usize,
    mut ask: impl FnMut(&FollowUpFlow) -> Result<FollowUpReply, E>,
) -> Result<Gathered, E>
where
    E: From<ClientError> + From<FollowUpError>,
{
    let mut gathered = Gathered::default();
    while gathered.rounds < max_rounds {
        let batch = chat.followup_questions(session_id, description, &gathered.answers).await?;
        gathered.rounds += 1;

        let finished: Arc<Mutex<Option<(Vec<FollowUpAnswer>, bool)>>> = Arc::default();
        let sink = finished.clone();
        let mut flow = FollowUpFlow::new(batch, move |answers, ready| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some((answers, ready));
        });

        while !flow.is_complete() {
            match ask(&flow)? {
                FollowUpReply::Answer(text) => flow.answer(&text)?,
                FollowUpReply::Skip => flow.skip()?,
                FollowUpReply::Stop => break,
            }
        }

        // Unset when the caller stopped partway through the batch.
        let completed = finished.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some((answers, ready)) = completed else {
            gathered.answers.extend_from_slice(flow.answers());
            break;
        };
        debug!(round = gathered.rounds, answers = answers.len(), ready, "follow-up round complete");
        gathered.answers.extend(answers);
        gathered.ready = ready;
        if ready || flow.is_empty() {
            break;
        }
    }
    Ok(gathered)
}

/// Fold answered questions into a description for the next diagnosis call.
/// Skipped questions are left out.
#[must_use]
pub fn with_answers(description: &str, answers: &[FollowUpAnswer]) -> String {
    let mut out = description.trim().to_owned();
    for item in answers.iter().filter(|a| !a.answer.trim().is_empty()) {
        out.push_str("\n\nQ: ");
        out.push_str(item.question.trim());
        out.push_str("\nA: ");
        out.push_str(item.answer.trim());
    }
    out
}
