//! Client-side diagnosis state.

pub mod chat;
pub mod followup;
pub mod wizard;

pub use chat::ChatStore;
pub use followup::{
    FollowUpError, FollowUpFlow, FollowUpReply, Gathered, MAX_FOLLOWUP_ROUNDS, gather_answers, with_answers,
};
pub use wizard::{DiagnosisBackend, DiagnosisWizard, WizardError, WizardStep};
