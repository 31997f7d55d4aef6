//! Chat-driven diagnosis wizard.
//!
//! DESIGN
//! ======
//! The wizard is a small state machine over [`WizardStep`]. Each operation
//! is valid in a fixed set of steps and performs at most one network call
//! through a [`DiagnosisBackend`]; the step only changes once that call
//! succeeds. A failed call, an invalid transition, or a local validation
//! error leaves the step exactly where it was.
//!
//! ```text
//! Initial --start--> EnhanceDescription --approve--> (diagnose)
//!                      |  ^                              |
//!               reject |  | retry_enhancement            v
//!                      v  |                     IssueMatches
//!                    EditMode --submit--> (diagnose) ProblemMatches
//!                      ^                            AiDiagnosis
//!                      +------- describe_again ---------+
//! ```
//!
//! A diagnosis result only reaches a terminal step when its payload is
//! populated; `existing_solutions` results are shown in `ProblemMatches`.

#[cfg(test)]
#[path = "wizard_test.rs"]
mod wizard_test;

use records::{
    DiagnosisKind, DiagnosisResult, EnhancedDescription, Equipment, EquipmentMatch, MIN_DESCRIPTION_LEN, Message,
    Session,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::chat::ChatStore;
use crate::net::{ChatApi, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Initial,
    EnhanceDescription,
    EditMode,
    IssueMatches,
    ProblemMatches,
    AiDiagnosis,
}

impl WizardStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::EnhanceDescription => "enhance_description",
            Self::EditMode => "edit_mode",
            Self::IssueMatches => "issue_matches",
            Self::ProblemMatches => "problem_matches",
            Self::AiDiagnosis => "ai_diagnosis",
        }
    }

    /// Steps that display a diagnosis result.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::IssueMatches | Self::ProblemMatches | Self::AiDiagnosis)
    }

    /// Terminal step that displays a result of `kind`.
    #[must_use]
    pub fn for_result(kind: DiagnosisKind) -> Self {
        match kind {
            DiagnosisKind::IssueMatches => Self::IssueMatches,
            DiagnosisKind::ExistingSolutions | DiagnosisKind::ProblemMatches => Self::ProblemMatches,
            DiagnosisKind::AiDiagnosis => Self::AiDiagnosis,
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{op} is not available in the {step} step")]
    InvalidTransition { op: &'static str, step: WizardStep },
    #[error("description must be at least {} characters", MIN_DESCRIPTION_LEN)]
    DescriptionTooShort,
    #[error("no chat session")]
    NoSession,
    #[error("server returned an empty {0} result")]
    EmptyResult(DiagnosisKind),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Server calls the wizard depends on.
#[async_trait::async_trait]
pub trait DiagnosisBackend: Send + Sync {
    async fn equipment_search(&self, session_id: Uuid, query: &str) -> Result<Vec<EquipmentMatch>, ClientError>;

    async fn enhance_description(
        &self,
        session_id: Uuid,
        description: &str,
    ) -> Result<EnhancedDescription, ClientError>;

    async fn diagnose(
        &self,
        session_id: Uuid,
        description: &str,
        equipment_id: Option<Uuid>,
    ) -> Result<DiagnosisResult, ClientError>;

    async fn messages(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError>;
}

#[async_trait::async_trait]
impl DiagnosisBackend for ChatApi {
    async fn equipment_search(&self, session_id: Uuid, query: &str) -> Result<Vec<EquipmentMatch>, ClientError> {
        ChatApi::equipment_search(self, session_id, query).await
    }

    async fn enhance_description(
        &self,
        session_id: Uuid,
        description: &str,
    ) -> Result<EnhancedDescription, ClientError> {
        ChatApi::enhance_description(self, session_id, description).await
    }

    async fn diagnose(
        &self,
        session_id: Uuid,
        description: &str,
        equipment_id: Option<Uuid>,
    ) -> Result<DiagnosisResult, ClientError> {
        ChatApi::diagnose(self, session_id, description, equipment_id).await
    }

    async fn messages(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError> {
        ChatApi::list_messages(self, session_id).await
    }
}

/// Reject descriptions too short to diagnose, without touching the network.
fn validate_description(text: &str) -> Result<&str, WizardError> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_DESCRIPTION_LEN {
        return Err(WizardError::DescriptionTooShort);
    }
    Ok(trimmed)
}

pub struct DiagnosisWizard<B> {
    backend: B,
    store: ChatStore,
    step: WizardStep,
    /// Text in the editor: the original description until the user edits it.
    draft: String,
    last_submitted: Option<String>,
}

impl<B: DiagnosisBackend> DiagnosisWizard<B> {
    pub fn new(backend: B, session: Session) -> Self {
        Self {
            backend,
            store: ChatStore::new(session),
            step: WizardStep::Initial,
            draft: String::new(),
            last_submitted: None,
        }
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current editor text. In `EditMode` this is what the user revises.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub fn enhancement(&self) -> Option<&EnhancedDescription> {
        self.store.enhancement.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&DiagnosisResult> {
        self.store.diagnosis.as_ref()
    }

    fn require_step(&self, op: &'static str, allowed: &[WizardStep]) -> Result<(), WizardError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition { op, step: self.step })
        }
    }

    fn session_id(&self) -> Result<Uuid, WizardError> {
        self.store.session_id().ok_or(WizardError::NoSession)
    }

    // =========================================================================
    // EQUIPMENT
    // =========================================================================

    /// Search the caller's equipment. A single match is selected
    /// automatically.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Initial`, or the backend error.
    pub async fn search_equipment(&mut self, query: &str) -> Result<Vec<EquipmentMatch>, WizardError> {
        self.require_step("search_equipment", &[WizardStep::Initial])?;
        let session_id = self.session_id()?;
        let matches = self.backend.equipment_search(session_id, query).await?;
        if let [only] = matches.as_slice() {
            info!(%session_id, equipment_id = %only.equipment.id, "equipment recognised");
            self.store.equipment = Some(only.equipment.clone());
        }
        Ok(matches)
    }

    /// Pick one of several search matches by hand.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Initial`.
    pub fn select_equipment(&mut self, equipment: Equipment) -> Result<(), WizardError> {
        self.require_step("select_equipment", &[WizardStep::Initial])?;
        self.store.equipment = Some(equipment);
        Ok(())
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// `Initial → EnhanceDescription`.
    ///
    /// # Errors
    ///
    /// `DescriptionTooShort` without a network call; otherwise the backend
    /// error, in which case the wizard stays in `Initial`.
    pub async fn start_diagnosis(&mut self, text: &str) -> Result<&EnhancedDescription, WizardError> {
        self.require_step("start_diagnosis", &[WizardStep::Initial])?;
        let text = validate_description(text)?.to_owned();
        self.draft.clone_from(&text);
        self.enhance(text).await
    }

    /// `EnhanceDescription → diagnose` with the enhanced text.
    ///
    /// # Errors
    ///
    /// Backend errors and unpopulated results; the step is left unchanged.
    pub async fn approve(&mut self) -> Result<&DiagnosisResult, WizardError> {
        self.require_step("approve", &[WizardStep::EnhanceDescription])?;
        let Some(enhancement) = self.store.enhancement.as_ref() else {
            return Err(WizardError::InvalidTransition { op: "approve", step: self.step });
        };
        let text = enhancement.enhanced.clone();
        self.run_diagnosis(text).await
    }

    /// `EnhanceDescription → EditMode`, pre-filled with the original text.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `EnhanceDescription`.
    pub fn reject(&mut self) -> Result<&str, WizardError> {
        self.require_step("reject", &[WizardStep::EnhanceDescription])?;
        if let Some(enhancement) = &self.store.enhancement {
            self.draft.clone_from(&enhancement.original);
        }
        self.step = WizardStep::EditMode;
        Ok(&self.draft)
    }

    /// `EditMode → diagnose` with the user's edited text.
    ///
    /// # Errors
    ///
    /// `DescriptionTooShort` without a network call; backend errors and
    /// unpopulated results leave the wizard in `EditMode`.
    pub async fn submit(&mut self, text: &str) -> Result<&DiagnosisResult, WizardError> {
        self.require_step("submit", &[WizardStep::EditMode])?;
        let text = validate_description(text)?.to_owned();
        self.draft.clone_from(&text);
        self.run_diagnosis(text).await
    }

    /// `EditMode → EnhanceDescription`, enhancing the edited text.
    ///
    /// # Errors
    ///
    /// `DescriptionTooShort` without a network call; backend errors leave
    /// the wizard in `EditMode`.
    pub async fn retry_enhancement(&mut self, text: &str) -> Result<&EnhancedDescription, WizardError> {
        self.require_step("retry_enhancement", &[WizardStep::EditMode])?;
        let text = validate_description(text)?.to_owned();
        self.draft.clone_from(&text);
        self.enhance(text).await
    }

    /// Terminal step `→ EditMode` with the last submitted description.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside a terminal step.
    pub fn describe_again(&mut self) -> Result<&str, WizardError> {
        self.require_step(
            "describe_again",
            &[WizardStep::IssueMatches, WizardStep::ProblemMatches, WizardStep::AiDiagnosis],
        )?;
        if let Some(last) = &self.last_submitted {
            self.draft.clone_from(last);
        }
        self.store.clear_diagnosis();
        self.step = WizardStep::EditMode;
        Ok(&self.draft)
    }

    /// Reload the message log. Valid in any step.
    ///
    /// # Errors
    ///
    /// The backend error; the previous log is kept.
    pub async fn refresh_messages(&mut self) -> Result<&[Message], WizardError> {
        let session_id = self.session_id()?;
        let messages = self.backend.messages(session_id).await?;
        self.store.set_messages(messages);
        Ok(&self.store.messages)
    }

    // =========================================================================
    // NETWORK STEPS
    // =========================================================================

    async fn enhance(&mut self, text: String) -> Result<&EnhancedDescription, WizardError> {
        let session_id = self.session_id()?;
        let enhanced = self.backend.enhance_description(session_id, &text).await?;
        info!(%session_id, from = %self.step, "description enhanced");
        self.step = WizardStep::EnhanceDescription;
        Ok(self.store.enhancement.insert(enhanced))
    }

    async fn run_diagnosis(&mut self, text: String) -> Result<&DiagnosisResult, WizardError> {
        let session_id = self.session_id()?;
        let equipment_id = self.store.equipment_id();
        let result = self.backend.diagnose(session_id, &text, equipment_id).await?;
        let kind = result.kind();
        if !result.is_populated() {
            warn!(%session_id, kind = %kind, step = %self.step, "diagnosis result has no payload");
            return Err(WizardError::EmptyResult(kind));
        }

        self.step = WizardStep::for_result(kind);
        self.last_submitted = Some(text);
        info!(%session_id, kind = %kind, step = %self.step, "diagnosis received");
        Ok(self.store.diagnosis.insert(result))
    }
}
