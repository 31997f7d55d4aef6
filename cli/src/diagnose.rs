//! Interactive diagnosis session on the terminal.
//!
//! Drives the client-side wizard with line-based prompts. Every failure is
//! printed as a blocking alert; the wizard stays where it was and the user
//! decides what to do next.

use std::io::{self, BufRead, BufReader, Write};

use clap::Args;
use client::net::{ChatApi, ClientError};
use client::state::{
    DiagnosisWizard, FollowUpFlow, FollowUpReply, MAX_FOLLOWUP_ROUNDS, WizardError, WizardStep, gather_answers,
    with_answers,
};
use records::{DiagnosisResult, MIN_DESCRIPTION_LEN};
use uuid::Uuid;

use crate::{CliContext, CliError};

#[derive(Args, Debug)]
pub(crate) struct DiagnoseArgs {
    /// Continue an existing chat session.
    #[arg(long)]
    session_id: Option<Uuid>,

    /// Equipment to look up first, e.g. "kolpak walk-in".
    #[arg(long)]
    equipment: Option<String>,

    /// Problem description; prompted for when absent.
    #[arg(long)]
    description: Option<String>,

    /// Skip the clarifying-question round.
    #[arg(long)]
    no_followup: bool,
}

/// What the user chose at a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    Text(String),
    /// End of input.
    Quit,
}

pub(crate) fn read_reply(input: &mut impl BufRead, label: &str) -> Result<Reply, CliError> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Reply::Quit);
    }
    Ok(Reply::Text(line.trim().to_owned()))
}

/// Print `error` and wait for Enter before continuing.
fn alert(input: &mut impl BufRead, error: &dyn std::fmt::Display) -> Result<bool, CliError> {
    eprintln!("\n  error: {error}");
    Ok(read_reply(input, "  press Enter to continue ")? != Reply::Quit)
}

/// Session has ended server-side; nothing left to do interactively.
fn is_fatal(error: &WizardError) -> bool {
    matches!(error, WizardError::Client(ClientError::Unauthorized) | WizardError::NoSession)
}

pub(crate) async fn run(ctx: &CliContext, args: DiagnoseArgs) -> Result<(), CliError> {
    // Unlocked between reads; `Stdin` takes its lock per call.
    let mut input = BufReader::new(io::stdin());

    let session = match args.session_id {
        Some(id) => ctx.chat.get_session(id).await?,
        None => ctx.chat.create_session().await?,
    };
    println!("session {}", session.id);
    let session_id = session.id;
    let mut wizard = DiagnosisWizard::new(ctx.chat.clone(), session);

    if let Some(query) = args.equipment.as_deref() {
        pick_equipment(&mut wizard, &mut input, query).await?;
    }

    let Some(mut description) = initial_description(&mut input, args.description)? else {
        return Ok(());
    };
    if !args.no_followup {
        description = ask_followups(ctx, &mut input, session_id, description).await?;
    }

    // Initial -> EnhanceDescription; retried until it succeeds or input ends.
    loop {
        match wizard.start_diagnosis(&description).await {
            Ok(_) => break,
            Err(error) if is_fatal(&error) => return Err(error.into()),
            Err(error) => {
                if !alert(&mut input, &error)? {
                    return Ok(());
                }
                match read_reply(&mut input, "describe the problem: ")? {
                    Reply::Text(text) => description = text,
                    Reply::Quit => return Ok(()),
                }
            }
        }
    }

    loop {
        let outcome = match wizard.step() {
            WizardStep::EnhanceDescription => enhance_step(&mut wizard, &mut input).await?,
            WizardStep::EditMode => edit_step(&mut wizard, &mut input).await?,
            step if step.is_terminal() => result_step(&mut wizard, &mut input)?,
            _ => return Ok(()),
        };
        match outcome {
            Step::Continue => {}
            Step::Done => return Ok(()),
            Step::Failed(error) if is_fatal(&error) => return Err(error.into()),
            Step::Failed(error) => {
                if !alert(&mut input, &error)? {
                    return Ok(());
                }
            }
        }
    }
}

enum Step {
    Continue,
    Done,
    Failed(WizardError),
}

impl<T> From<Result<T, WizardError>> for Step {
    fn from(result: Result<T, WizardError>) -> Self {
        match result {
            Ok(_) => Self::Continue,
            Err(error) => Self::Failed(error),
        }
    }
}

async fn pick_equipment(
    wizard: &mut DiagnosisWizard<ChatApi>,
    input: &mut impl BufRead,
    query: &str,
) -> Result<(), CliError> {
    let matches = wizard.search_equipment(query).await?;
    match matches.as_slice() {
        [] => println!("no equipment matched {query:?}; continuing without"),
        [only] => println!("equipment: {}", only.equipment.label()),
        many => {
            for (i, m) in many.iter().enumerate() {
                println!("  {}. {} (score {:.2})", i + 1, m.equipment.label(), m.score);
            }
            if let Reply::Text(choice) = read_reply(input, "pick equipment (blank to skip): ")? {
                if let Some(picked) = parse_choice(&choice, many.len()) {
                    wizard.select_equipment(many[picked].equipment.clone())?;
                }
            }
        }
    }
    Ok(())
}

fn initial_description(input: &mut impl BufRead, given: Option<String>) -> Result<Option<String>, CliError> {
    if let Some(text) = given {
        return Ok(Some(text));
    }
    loop {
        match read_reply(input, "describe the problem: ")? {
            Reply::Quit => return Ok(None),
            Reply::Text(text) if text.chars().count() >= MIN_DESCRIPTION_LEN => return Ok(Some(text)),
            Reply::Text(_) => eprintln!("  please use at least {MIN_DESCRIPTION_LEN} characters"),
        }
    }
}

/// Clarifying-question rounds; answers are folded into the text. A failed
/// request skips the questions rather than the diagnosis.
async fn ask_followups(
    ctx: &CliContext,
    input: &mut impl BufRead,
    session_id: Uuid,
    description: String,
) -> Result<String, CliError> {
    let ask = |flow: &FollowUpFlow| -> Result<FollowUpReply, CliError> {
        let question = flow.current().unwrap_or_default();
        println!("  ({}/{}) {question}", flow.index() + 1, flow.len());
        Ok(followup_reply(read_reply(input, "  answer (blank to skip): ")?))
    };
    let gathered = gather_answers(&ctx.chat, session_id, &description, MAX_FOLLOWUP_ROUNDS, ask).await;
    match gathered {
        Ok(gathered) => {
            tracing::debug!(rounds = gathered.rounds, ready = gathered.ready, "follow-up finished");
            Ok(with_answers(&description, &gathered.answers))
        }
        Err(CliError::Client(error)) if !matches!(error, ClientError::Unauthorized) => {
            eprintln!("  skipping follow-up questions: {error}");
            Ok(description)
        }
        Err(error) => Err(error),
    }
}

/// Blank input skips the question; end of input stops asking.
pub(crate) fn followup_reply(reply: Reply) -> FollowUpReply {
    match reply {
        Reply::Text(answer) if answer.is_empty() => FollowUpReply::Skip,
        Reply::Text(answer) => FollowUpReply::Answer(answer),
        Reply::Quit => FollowUpReply::Stop,
    }
}

async fn enhance_step(
    wizard: &mut DiagnosisWizard<ChatApi>,
    input: &mut impl BufRead,
) -> Result<Step, CliError> {
    if let Some(enhancement) = wizard.enhancement() {
        println!("\n  you wrote: {}", enhancement.original);
        println!("  suggested: {}", enhancement.enhanced);
    }
    Ok(match read_reply(input, "use the suggestion? [y]es / [n]o: ")? {
        Reply::Quit => Step::Done,
        Reply::Text(choice) if choice.eq_ignore_ascii_case("n") || choice.eq_ignore_ascii_case("no") => {
            wizard.reject().into()
        }
        Reply::Text(_) => wizard.approve().await.into(),
    })
}

async fn edit_step(
    wizard: &mut DiagnosisWizard<ChatApi>,
    input: &mut impl BufRead,
) -> Result<Step, CliError> {
    println!("\n  current description: {}", wizard.draft());
    let reply = read_reply(input, "edit (blank keeps it, prefix with '?' to re-enhance): ")?;
    let Reply::Text(text) = reply else {
        return Ok(Step::Done);
    };
    let (retry, text) = match text.strip_prefix('?') {
        Some(rest) => (true, rest.trim().to_owned()),
        None => (false, text),
    };
    let text = if text.is_empty() { wizard.draft().to_owned() } else { text };
    Ok(if retry {
        wizard.retry_enhancement(&text).await.into()
    } else {
        wizard.submit(&text).await.into()
    })
}

fn result_step(
    wizard: &mut DiagnosisWizard<ChatApi>,
    input: &mut impl BufRead,
) -> Result<Step, CliError> {
    if let Some(result) = wizard.result() {
        println!();
        print!("{}", render_result(result));
    }
    Ok(match read_reply(input, "[d]escribe again or [q]uit: ")? {
        Reply::Text(choice) if choice.eq_ignore_ascii_case("d") => wizard.describe_again().into(),
        _ => Step::Done,
    })
}

/// 1-based menu choice to a 0-based index.
pub(crate) fn parse_choice(raw: &str, len: usize) -> Option<usize> {
    let n: usize = raw.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

pub(crate) fn render_result(result: &DiagnosisResult) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(out, "  {}", result.summary());
    match result {
        DiagnosisResult::IssueMatches { issues } => {
            for m in issues {
                let _ = writeln!(
                    out,
                    "  - [{}] {} ({}, {:.0}% match)",
                    m.issue.status,
                    m.issue.title,
                    m.issue.priority,
                    m.score * 100.0
                );
            }
        }
        DiagnosisResult::ExistingSolutions { problems } | DiagnosisResult::ProblemMatches { problems } => {
            for problem in problems {
                let _ = writeln!(out, "  - {}", problem.description);
                for solution in &problem.solutions {
                    let _ = writeln!(
                        out,
                        "      cause: {}; fix: {} (effectiveness {:.1}/5)",
                        solution.cause, solution.treatment, solution.effectiveness
                    );
                }
            }
        }
        DiagnosisResult::AiDiagnosis { diagnosis } => {
            let _ = writeln!(out, "  severity: {}", diagnosis.severity);
            for cause in &diagnosis.possible_causes {
                let _ = writeln!(out, "  - possible cause: {cause}");
            }
            for (i, step) in diagnosis.recommended_steps.iter().enumerate() {
                let _ = writeln!(out, "  {}. {step}", i + 1);
            }
            if diagnosis.requires_technician {
                let _ = writeln!(out, "  a technician visit is recommended");
            }
        }
    }
    out
}
