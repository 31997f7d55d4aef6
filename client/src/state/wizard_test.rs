use std::collections::VecDeque;
use std::sync::Mutex;

use records::{
    AiDiagnosis, EquipmentStatus, Issue, IssueMatch, IssuePriority, IssueStatus, Problem, ResolvedBy, SessionStatus,
    Severity, Solution,
};

use super::*;

// =============================================================================
// FIXTURES
// =============================================================================

#[derive(Default)]
struct MockBackend {
    enhancements: Mutex<VecDeque<Result<EnhancedDescription, ClientError>>>,
    results: Mutex<VecDeque<Result<DiagnosisResult, ClientError>>>,
    matches: Mutex<Vec<EquipmentMatch>>,
    diagnosed: Mutex<Vec<(String, Option<Uuid>)>>,
    calls: Mutex<usize>,
}

impl MockBackend {
    fn enhance_ok(self, original: &str, enhanced: &str) -> Self {
        self.enhancements
            .lock()
            .unwrap()
            .push_back(Ok(EnhancedDescription { original: original.into(), enhanced: enhanced.into() }));
        self
    }

    fn enhance_err(self) -> Self {
        self.enhancements.lock().unwrap().push_back(Err(upstream()));
        self
    }

    fn result(self, result: Result<DiagnosisResult, ClientError>) -> Self {
        self.results.lock().unwrap().push_back(result);
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn hit(&self) {
        *self.calls.lock().unwrap() += 1;
    }
}

#[async_trait::async_trait]
impl DiagnosisBackend for MockBackend {
    async fn equipment_search(&self, _session_id: Uuid, _query: &str) -> Result<Vec<EquipmentMatch>, ClientError> {
        self.hit();
        Ok(self.matches.lock().unwrap().clone())
    }

    async fn enhance_description(
        &self,
        _session_id: Uuid,
        _description: &str,
    ) -> Result<EnhancedDescription, ClientError> {
        self.hit();
        self.enhancements.lock().unwrap().pop_front().unwrap_or_else(|| Err(upstream()))
    }

    async fn diagnose(
        &self,
        _session_id: Uuid,
        description: &str,
        equipment_id: Option<Uuid>,
    ) -> Result<DiagnosisResult, ClientError> {
        self.hit();
        self.diagnosed.lock().unwrap().push((description.to_owned(), equipment_id));
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| Err(upstream()))
    }

    async fn messages(&self, _session_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.hit();
        Ok(Vec::new())
    }
}

fn upstream() -> ClientError {
    ClientError::Api { status: 502, code: "E_LLM_UPSTREAM".into(), message: "upstream failed".into() }
}

fn session() -> Session {
    Session {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        status: SessionStatus::Active,
        metadata: serde_json::json!({}),
        created_at: 0,
    }
}

fn equipment() -> Equipment {
    Equipment {
        id: Uuid::new_v4(),
        business_id: Uuid::new_v4(),
        name: "Walk-in cooler".into(),
        manufacturer: "Kolpak".into(),
        model: "KF7".into(),
        category: "refrigeration".into(),
        serial_number: None,
        location: None,
        status: EquipmentStatus::Operational,
        purchase_date: None,
        notes: None,
        created_at: 0,
    }
}

fn problem(with_solution: bool) -> Problem {
    let id = Uuid::new_v4();
    let solutions = if with_solution {
        vec![Solution {
            id: Uuid::new_v4(),
            problem_id: id,
            cause: "iced evaporator".into(),
            treatment: "defrost and replace timer".into(),
            cost: None,
            resolved_by: ResolvedBy::Technician,
            effectiveness: 4.0,
            created_at: 0,
        }]
    } else {
        Vec::new()
    };
    Problem {
        id,
        description: "cooler not holding temperature".into(),
        equipment_id: None,
        category: Some("refrigeration".into()),
        created_at: 0,
        solutions,
    }
}

fn issue_matches() -> DiagnosisResult {
    DiagnosisResult::IssueMatches {
        issues: vec![IssueMatch {
            issue: Issue {
                id: Uuid::new_v4(),
                business_id: Uuid::new_v4(),
                equipment_id: None,
                problem_id: None,
                technician_id: None,
                title: "Cooler warm".into(),
                description: "cooler warm since morning".into(),
                status: IssueStatus::Open,
                priority: IssuePriority::High,
                created_at: 0,
                updated_at: 0,
            },
            score: 0.5,
        }],
    }
}

fn ai(summary: &str, causes: &[&str]) -> DiagnosisResult {
    DiagnosisResult::AiDiagnosis {
        diagnosis: AiDiagnosis {
            summary: summary.into(),
            possible_causes: causes.iter().map(|c| (*c).to_owned()).collect(),
            recommended_steps: Vec::new(),
            severity: Severity::Medium,
            requires_technician: false,
            confidence: 0.6,
        },
    }
}

const ORIGINAL: &str = "the walk-in cooler is warm";
const ENHANCED: &str = "Walk-in cooler not holding set temperature";

/// Wizard already sitting in `EnhanceDescription`.
async fn enhanced_wizard(backend: MockBackend) -> DiagnosisWizard<MockBackend> {
    backend
        .enhancements
        .lock()
        .unwrap()
        .push_front(Ok(EnhancedDescription { original: ORIGINAL.into(), enhanced: ENHANCED.into() }));
    let mut wizard = DiagnosisWizard::new(backend, session());
    wizard.start_diagnosis(ORIGINAL).await.unwrap();
    wizard
}

// =============================================================================
// START & ENHANCE
// =============================================================================

#[tokio::test]
async fn start_moves_to_enhance_description() {
    let wizard = enhanced_wizard(MockBackend::default()).await;
    assert_eq!(wizard.step(), WizardStep::EnhanceDescription);
    assert_eq!(wizard.enhancement().unwrap().enhanced, ENHANCED);
    assert_eq!(wizard.draft(), ORIGINAL);
}

#[tokio::test]
async fn enhancement_failure_stays_in_initial() {
    let mut wizard = DiagnosisWizard::new(MockBackend::default().enhance_err(), session());
    let err = wizard.start_diagnosis(ORIGINAL).await.unwrap_err();
    assert!(matches!(err, WizardError::Client(ClientError::Api { status: 502, .. })));
    assert_eq!(wizard.step(), WizardStep::Initial);
    assert!(wizard.enhancement().is_none());
}

#[tokio::test]
async fn short_start_is_rejected_locally() {
    let mut wizard = DiagnosisWizard::new(MockBackend::default(), session());
    let err = wizard.start_diagnosis("  warm  ").await.unwrap_err();
    assert!(matches!(err, WizardError::DescriptionTooShort));
    assert_eq!(wizard.backend().calls(), 0);
    assert_eq!(wizard.step(), WizardStep::Initial);
}

// =============================================================================
// DIAGNOSE
// =============================================================================

#[tokio::test]
async fn approve_diagnoses_enhanced_text() {
    let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(issue_matches()))).await;
    wizard.approve().await.unwrap();
    assert_eq!(wizard.step(), WizardStep::IssueMatches);
    assert_eq!(wizard.backend().diagnosed.lock().unwrap()[0].0, ENHANCED);
}

#[tokio::test]
async fn existing_solutions_display_in_problem_matches() {
    let result = DiagnosisResult::ExistingSolutions { problems: vec![problem(true)] };
    let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(result))).await;
    wizard.approve().await.unwrap();
    assert_eq!(wizard.step(), WizardStep::ProblemMatches);
    assert!(matches!(wizard.result(), Some(DiagnosisResult::ExistingSolutions { .. })));
}

#[tokio::test]
async fn unpopulated_results_never_reach_a_terminal_step() {
    let empties = [
        DiagnosisResult::IssueMatches { issues: Vec::new() },
        DiagnosisResult::ProblemMatches { problems: Vec::new() },
        DiagnosisResult::ExistingSolutions { problems: vec![problem(false)] },
        ai("   ", &[]),
    ];
    for empty in empties {
        let kind = empty.kind();
        let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(empty))).await;
        let err = wizard.approve().await.unwrap_err();
        assert!(matches!(err, WizardError::EmptyResult(k) if k == kind), "{kind}");
        assert_eq!(wizard.step(), WizardStep::EnhanceDescription);
        assert!(wizard.result().is_none());
    }
}

#[tokio::test]
async fn terminal_step_always_matches_populated_payload() {
    let results = [
        issue_matches(),
        DiagnosisResult::ProblemMatches { problems: vec![problem(false)] },
        DiagnosisResult::ExistingSolutions { problems: vec![problem(true)] },
        ai("", &["failed condenser fan"]),
    ];
    for result in results {
        let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(result))).await;
        wizard.approve().await.unwrap();
        let shown = wizard.result().unwrap();
        assert!(wizard.step().is_terminal());
        assert!(shown.is_populated());
        assert_eq!(wizard.step(), WizardStep::for_result(shown.kind()));
    }
}

#[tokio::test]
async fn diagnose_failure_keeps_step() {
    let mut wizard = enhanced_wizard(MockBackend::default().result(Err(upstream()))).await;
    assert!(wizard.approve().await.is_err());
    assert_eq!(wizard.step(), WizardStep::EnhanceDescription);
}

#[tokio::test]
async fn recognised_equipment_is_sent_with_diagnosis() {
    let backend = MockBackend::default().enhance_ok(ORIGINAL, ENHANCED).result(Ok(ai("coil iced", &[])));
    let machine = equipment();
    backend.matches.lock().unwrap().push(EquipmentMatch { equipment: machine.clone(), score: 1.0 });

    let mut wizard = DiagnosisWizard::new(backend, session());
    let matches = wizard.search_equipment("kolpak walk-in").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(wizard.store().equipment_id(), Some(machine.id));

    wizard.start_diagnosis(ORIGINAL).await.unwrap();
    wizard.approve().await.unwrap();
    assert_eq!(wizard.backend().diagnosed.lock().unwrap()[0].1, Some(machine.id));
}

#[tokio::test]
async fn multiple_matches_are_not_auto_selected() {
    let backend = MockBackend::default();
    for _ in 0..2 {
        backend.matches.lock().unwrap().push(EquipmentMatch { equipment: equipment(), score: 0.5 });
    }
    let mut wizard = DiagnosisWizard::new(backend, session());
    assert_eq!(wizard.search_equipment("cooler").await.unwrap().len(), 2);
    assert!(wizard.store().equipment.is_none());

    let chosen = equipment();
    wizard.select_equipment(chosen.clone()).unwrap();
    assert_eq!(wizard.store().equipment_id(), Some(chosen.id));
}

// =============================================================================
// EDIT MODE
// =============================================================================

#[tokio::test]
async fn reject_restores_original_text() {
    let mut wizard = enhanced_wizard(MockBackend::default()).await;
    let draft = wizard.reject().unwrap().to_owned();
    assert_eq!(wizard.step(), WizardStep::EditMode);
    assert_eq!(draft, ORIGINAL);
}

#[tokio::test]
async fn reject_after_retry_restores_latest_original() {
    let edited = "cooler warm and fan is silent";
    let backend = MockBackend::default().enhance_ok(edited, "Evaporator fan failure suspected");
    let mut wizard = enhanced_wizard(backend).await;
    wizard.reject().unwrap();
    wizard.retry_enhancement(edited).await.unwrap();
    assert_eq!(wizard.step(), WizardStep::EnhanceDescription);
    assert_eq!(wizard.reject().unwrap(), edited);
}

#[tokio::test]
async fn short_edit_is_rejected_without_network_call() {
    let mut wizard = enhanced_wizard(MockBackend::default()).await;
    wizard.reject().unwrap();
    let before = wizard.backend().calls();

    for text in ["", "too short", "   123456789   "] {
        let err = wizard.submit(text).await.unwrap_err();
        assert!(matches!(err, WizardError::DescriptionTooShort), "{text:?}");
        let err = wizard.retry_enhancement(text).await.unwrap_err();
        assert!(matches!(err, WizardError::DescriptionTooShort), "{text:?}");
    }
    assert_eq!(wizard.backend().calls(), before);
    assert_eq!(wizard.step(), WizardStep::EditMode);
    assert_eq!(wizard.draft(), ORIGINAL);
}

#[tokio::test]
async fn submit_diagnoses_edited_text() {
    let edited = "  fryer oil takes forever to heat  ";
    let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(ai("thermostat drift", &[])))).await;
    wizard.reject().unwrap();
    wizard.submit(edited).await.unwrap();
    assert_eq!(wizard.step(), WizardStep::AiDiagnosis);
    assert_eq!(wizard.backend().diagnosed.lock().unwrap()[0].0, edited.trim());
}

#[tokio::test]
async fn retry_failure_stays_in_edit_mode() {
    let mut wizard = enhanced_wizard(MockBackend::default().enhance_err()).await;
    wizard.reject().unwrap();
    assert!(wizard.retry_enhancement("walk-in still warm overnight").await.is_err());
    assert_eq!(wizard.step(), WizardStep::EditMode);
}

#[tokio::test]
async fn describe_again_returns_to_edit_mode_with_last_text() {
    let mut wizard = enhanced_wizard(MockBackend::default().result(Ok(issue_matches()))).await;
    wizard.approve().await.unwrap();

    let draft = wizard.describe_again().unwrap().to_owned();
    assert_eq!(wizard.step(), WizardStep::EditMode);
    assert_eq!(draft, ENHANCED);
    assert!(wizard.result().is_none());
}

// =============================================================================
// INVALID TRANSITIONS
// =============================================================================

#[tokio::test]
async fn operations_outside_their_step_are_rejected() {
    let mut wizard = DiagnosisWizard::new(MockBackend::default(), session());
    assert!(matches!(
        wizard.approve().await,
        Err(WizardError::InvalidTransition { op: "approve", step: WizardStep::Initial })
    ));
    assert!(matches!(wizard.reject(), Err(WizardError::InvalidTransition { .. })));
    assert!(matches!(wizard.submit(ORIGINAL).await, Err(WizardError::InvalidTransition { .. })));
    assert!(matches!(wizard.describe_again(), Err(WizardError::InvalidTransition { .. })));
    assert_eq!(wizard.step(), WizardStep::Initial);
    assert_eq!(wizard.backend().calls(), 0);

    let mut wizard = enhanced_wizard(MockBackend::default()).await;
    assert!(matches!(wizard.start_diagnosis(ORIGINAL).await, Err(WizardError::InvalidTransition { .. })));
    assert!(matches!(wizard.search_equipment("x").await, Err(WizardError::InvalidTransition { .. })));
    assert!(matches!(wizard.describe_again(), Err(WizardError::InvalidTransition { .. })));
    assert_eq!(wizard.step(), WizardStep::EnhanceDescription);
}

#[test]
fn invalid_transition_message_names_step() {
    let err = WizardError::InvalidTransition { op: "approve", step: WizardStep::EditMode };
    assert_eq!(err.to_string(), "approve is not available in the edit_mode step");
}
