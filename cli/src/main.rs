mod diagnose;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use client::net::{ChatApi, ClientError, HttpClient, IssueApi, IssueQuery, ProblemQuery, ServerApi};
use client::state::{FollowUpError, WizardError};
use records::IssueStatus;
use records::input::{
    BusinessPatch, EmployeePatch, EquipmentPatch, IssuePatch, NewBusiness, NewEmployee, NewEquipment, NewIssue,
    NewProblem, NewReview, NewSolution, NewTechnician, SolutionPatch, TechnicianPatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; run `fixdesk login verify` and pass --token or set FIXDESK_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    FollowUp(#[from] FollowUpError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
}

#[derive(Parser, Debug)]
#[command(name = "fixdesk", about = "FixDesk equipment maintenance CLI")]
struct Cli {
    #[arg(long, env = "FIXDESK_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "FIXDESK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Login(LoginCommand),
    Me,
    Logout,
    Api(ApiCommand),
    Upload(UploadCommand),
    Chat(ChatCommand),
    /// Interactive diagnosis of an equipment problem.
    Diagnose(diagnose::DiagnoseArgs),
}

#[derive(Args, Debug)]
struct LoginCommand {
    #[command(subcommand)]
    command: LoginSubcommand,
}

#[derive(Subcommand, Debug)]
enum LoginSubcommand {
    /// Email a one-time access code.
    RequestCode { email: String },
    /// Exchange the code for a session token and print it.
    Verify { email: String, code: String },
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    Business(BusinessCommand),
    Employee(EmployeeCommand),
    Equipment(EquipmentCommand),
    Problem(ProblemCommand),
    Solution(SolutionCommand),
    Issue(IssueCommand),
    Technician(TechnicianCommand),
}

#[derive(Args, Debug)]
struct BusinessCommand {
    #[command(subcommand)]
    command: BusinessSubcommand,
}

#[derive(Subcommand, Debug)]
enum BusinessSubcommand {
    List,
    Read {
        business_id: Uuid,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        business_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        business_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct EmployeeCommand {
    #[command(subcommand)]
    command: EmployeeSubcommand,
}

#[derive(Subcommand, Debug)]
enum EmployeeSubcommand {
    List {
        business_id: Uuid,
    },
    Add {
        business_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Update {
        employee_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        employee_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct EquipmentCommand {
    #[command(subcommand)]
    command: EquipmentSubcommand,
}

#[derive(Subcommand, Debug)]
enum EquipmentSubcommand {
    List {
        #[arg(long)]
        business_id: Option<Uuid>,
    },
    Read {
        equipment_id: Uuid,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        equipment_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        equipment_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct ProblemCommand {
    #[command(subcommand)]
    command: ProblemSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProblemSubcommand {
    List {
        #[arg(long)]
        equipment_id: Option<Uuid>,
        #[arg(long)]
        category: Option<String>,
    },
    Read {
        problem_id: Uuid,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Delete {
        problem_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct SolutionCommand {
    #[command(subcommand)]
    command: SolutionSubcommand,
}

#[derive(Subcommand, Debug)]
enum SolutionSubcommand {
    List {
        problem_id: Uuid,
    },
    Add {
        problem_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Update {
        solution_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        solution_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct IssueCommand {
    #[command(subcommand)]
    command: IssueSubcommand,
}

#[derive(Subcommand, Debug)]
enum IssueSubcommand {
    List {
        #[arg(long)]
        business_id: Option<Uuid>,
        #[arg(long)]
        equipment_id: Option<Uuid>,
        #[arg(long)]
        status: Option<IssueStatus>,
    },
    Read {
        issue_id: Uuid,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        issue_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Assign {
        issue_id: Uuid,
        #[arg(long)]
        technician_id: Uuid,
    },
    Delete {
        issue_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct TechnicianCommand {
    #[command(subcommand)]
    command: TechnicianSubcommand,
}

#[derive(Subcommand, Debug)]
enum TechnicianSubcommand {
    List {
        #[arg(long)]
        specialty: Option<String>,
    },
    Read {
        technician_id: Uuid,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        technician_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        technician_id: Uuid,
    },
    Reviews {
        technician_id: Uuid,
    },
    Review {
        technician_id: Uuid,
        #[arg(long)]
        score: i16,
        #[arg(long)]
        issue_id: Option<Uuid>,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Args, Debug)]
struct UploadCommand {
    #[command(subcommand)]
    command: UploadSubcommand,
}

#[derive(Subcommand, Debug)]
enum UploadSubcommand {
    Put {
        path: PathBuf,
        #[arg(long)]
        folder: Option<String>,
    },
    Url {
        key: String,
    },
    Delete {
        key: String,
    },
}

#[derive(Args, Debug)]
struct ChatCommand {
    #[command(subcommand)]
    command: ChatSubcommand,
}

#[derive(Subcommand, Debug)]
enum ChatSubcommand {
    New,
    Read { session_id: Uuid },
    Messages { session_id: Uuid },
}

/// Facades sharing one signed-in HTTP client.
#[derive(Debug, Clone)]
struct CliContext {
    http: HttpClient,
    chat: ChatApi,
    issues: IssueApi,
    server: ServerApi,
}

impl CliContext {
    fn new(base_url: &str, token: Option<String>) -> Result<Self, CliError> {
        let http = HttpClient::new(base_url)?;
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            http.sign_in(token.trim());
        }
        http.on_sign_out(|| {
            eprintln!("session expired; run `fixdesk login verify` to sign in again");
        });
        Ok(Self {
            chat: ChatApi::new(http.clone()),
            issues: IssueApi::new(http.clone()),
            server: ServerApi::new(http.clone()),
            http,
        })
    }

    fn require_token(&self) -> Result<(), CliError> {
        if self.http.is_signed_in() { Ok(()) } else { Err(CliError::MissingToken) }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::new(&cli.base_url, cli.token)?;

    match cli.command {
        Command::Ping => {
            ctx.server.health().await?;
            println!("ok");
            Ok(())
        }
        Command::Login(login) => run_login(&ctx, login).await,
        Command::Me => {
            ctx.require_token()?;
            print_json(&ctx.server.me().await?)
        }
        Command::Logout => {
            ctx.require_token()?;
            ctx.server.logout().await?;
            println!("signed out");
            Ok(())
        }
        Command::Api(api) => {
            ctx.require_token()?;
            run_api(&ctx, api).await
        }
        Command::Upload(upload) => {
            ctx.require_token()?;
            run_upload(&ctx, upload).await
        }
        Command::Chat(chat) => {
            ctx.require_token()?;
            run_chat(&ctx, chat).await
        }
        Command::Diagnose(args) => {
            ctx.require_token()?;
            diagnose::run(&ctx, args).await
        }
    }
}

async fn run_login(ctx: &CliContext, login: LoginCommand) -> Result<(), CliError> {
    match login.command {
        LoginSubcommand::RequestCode { email } => {
            ctx.server.request_code(&email).await?;
            println!("access code sent to {}", email.trim());
            Ok(())
        }
        LoginSubcommand::Verify { email, code } => {
            let signed = ctx.server.verify_code(&email, &code).await?;
            eprintln!("signed in as {} <{}>", signed.user.name, signed.user.email);
            println!("{}", signed.token);
            Ok(())
        }
    }
}

async fn run_api(ctx: &CliContext, api: ApiCommand) -> Result<(), CliError> {
    match api.command {
        ApiSubcommand::Business(business) => run_api_business(ctx, business).await,
        ApiSubcommand::Employee(employee) => run_api_employee(ctx, employee).await,
        ApiSubcommand::Equipment(equipment) => run_api_equipment(ctx, equipment).await,
        ApiSubcommand::Problem(problem) => run_api_problem(ctx, problem).await,
        ApiSubcommand::Solution(solution) => run_api_solution(ctx, solution).await,
        ApiSubcommand::Issue(issue) => run_api_issue(ctx, issue).await,
        ApiSubcommand::Technician(technician) => run_api_technician(ctx, technician).await,
    }
}

async fn run_api_business(ctx: &CliContext, business: BusinessCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match business.command {
        BusinessSubcommand::List => print_json(&api.list_businesses().await?),
        BusinessSubcommand::Read { business_id } => print_json(&api.get_business(business_id).await?),
        BusinessSubcommand::Create { data } => {
            let input: NewBusiness = parse_data(&data)?;
            print_json(&api.create_business(&input).await?)
        }
        BusinessSubcommand::Update { business_id, data } => {
            let patch: BusinessPatch = parse_data(&data)?;
            print_json(&api.update_business(business_id, &patch).await?)
        }
        BusinessSubcommand::Delete { business_id } => {
            api.delete_business(business_id).await?;
            print_deleted("business", business_id)
        }
    }
}

async fn run_api_employee(ctx: &CliContext, employee: EmployeeCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match employee.command {
        EmployeeSubcommand::List { business_id } => print_json(&api.list_employees(business_id).await?),
        EmployeeSubcommand::Add { business_id, data } => {
            let input: NewEmployee = parse_data(&data)?;
            print_json(&api.add_employee(business_id, &input).await?)
        }
        EmployeeSubcommand::Update { employee_id, data } => {
            let patch: EmployeePatch = parse_data(&data)?;
            print_json(&api.update_employee(employee_id, &patch).await?)
        }
        EmployeeSubcommand::Delete { employee_id } => {
            api.delete_employee(employee_id).await?;
            print_deleted("employee", employee_id)
        }
    }
}

async fn run_api_equipment(ctx: &CliContext, equipment: EquipmentCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match equipment.command {
        EquipmentSubcommand::List { business_id } => print_json(&api.list_equipment(business_id).await?),
        EquipmentSubcommand::Read { equipment_id } => print_json(&api.get_equipment(equipment_id).await?),
        EquipmentSubcommand::Create { data } => {
            let input: NewEquipment = parse_data(&data)?;
            print_json(&api.create_equipment(&input).await?)
        }
        EquipmentSubcommand::Update { equipment_id, data } => {
            let patch: EquipmentPatch = parse_data(&data)?;
            print_json(&api.update_equipment(equipment_id, &patch).await?)
        }
        EquipmentSubcommand::Delete { equipment_id } => {
            api.delete_equipment(equipment_id).await?;
            print_deleted("equipment", equipment_id)
        }
    }
}

async fn run_api_problem(ctx: &CliContext, problem: ProblemCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match problem.command {
        ProblemSubcommand::List { equipment_id, category } => {
            print_json(&api.list_problems(&ProblemQuery { equipment_id, category }).await?)
        }
        ProblemSubcommand::Read { problem_id } => print_json(&api.get_problem(problem_id).await?),
        ProblemSubcommand::Create { data } => {
            let input: NewProblem = parse_data(&data)?;
            print_json(&api.create_problem(&input).await?)
        }
        ProblemSubcommand::Delete { problem_id } => {
            api.delete_problem(problem_id).await?;
            print_deleted("problem", problem_id)
        }
    }
}

async fn run_api_solution(ctx: &CliContext, solution: SolutionCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match solution.command {
        SolutionSubcommand::List { problem_id } => print_json(&api.list_solutions(problem_id).await?),
        SolutionSubcommand::Add { problem_id, data } => {
            let input: NewSolution = parse_data(&data)?;
            print_json(&api.add_solution(problem_id, &input).await?)
        }
        SolutionSubcommand::Update { solution_id, data } => {
            let patch: SolutionPatch = parse_data(&data)?;
            print_json(&api.update_solution(solution_id, &patch).await?)
        }
        SolutionSubcommand::Delete { solution_id } => {
            api.delete_solution(solution_id).await?;
            print_deleted("solution", solution_id)
        }
    }
}

async fn run_api_issue(ctx: &CliContext, issue: IssueCommand) -> Result<(), CliError> {
    let api = &ctx.issues;
    match issue.command {
        IssueSubcommand::List { business_id, equipment_id, status } => {
            print_json(&api.list_issues(&IssueQuery { business_id, equipment_id, status }).await?)
        }
        IssueSubcommand::Read { issue_id } => print_json(&api.get_issue(issue_id).await?),
        IssueSubcommand::Create { data } => {
            let input: NewIssue = parse_data(&data)?;
            print_json(&api.create_issue(&input).await?)
        }
        IssueSubcommand::Update { issue_id, data } => {
            let patch: IssuePatch = parse_data(&data)?;
            print_json(&api.update_issue(issue_id, &patch).await?)
        }
        IssueSubcommand::Assign { issue_id, technician_id } => {
            print_json(&api.assign_technician(issue_id, technician_id).await?)
        }
        IssueSubcommand::Delete { issue_id } => {
            api.delete_issue(issue_id).await?;
            print_deleted("issue", issue_id)
        }
    }
}

async fn run_api_technician(ctx: &CliContext, technician: TechnicianCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match technician.command {
        TechnicianSubcommand::List { specialty } => print_json(&api.list_technicians(specialty.as_deref()).await?),
        TechnicianSubcommand::Read { technician_id } => print_json(&api.get_technician(technician_id).await?),
        TechnicianSubcommand::Create { data } => {
            let input: NewTechnician = parse_data(&data)?;
            print_json(&api.create_technician(&input).await?)
        }
        TechnicianSubcommand::Update { technician_id, data } => {
            let patch: TechnicianPatch = parse_data(&data)?;
            print_json(&api.update_technician(technician_id, &patch).await?)
        }
        TechnicianSubcommand::Delete { technician_id } => {
            api.delete_technician(technician_id).await?;
            print_deleted("technician", technician_id)
        }
        TechnicianSubcommand::Reviews { technician_id } => print_json(&api.list_reviews(technician_id).await?),
        TechnicianSubcommand::Review { technician_id, score, issue_id, comment } => {
            let input = NewReview { score, issue_id, comment };
            print_json(&api.add_review(technician_id, &input).await?)
        }
    }
}

async fn run_upload(ctx: &CliContext, upload: UploadCommand) -> Result<(), CliError> {
    let api = &ctx.server;
    match upload.command {
        UploadSubcommand::Put { path, folder } => {
            let content_type = content_type_for(&path)?;
            let file_name = path
                .file_name()
                .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
            let bytes = std::fs::read(&path)?;
            print_json(&api.upload(bytes, &file_name, content_type, folder.as_deref()).await?)
        }
        UploadSubcommand::Url { key } => print_json(&api.download_url(&key).await?),
        UploadSubcommand::Delete { key } => {
            api.delete_upload(&key).await?;
            println!("deleted {key}");
            Ok(())
        }
    }
}

async fn run_chat(ctx: &CliContext, chat: ChatCommand) -> Result<(), CliError> {
    let api = &ctx.chat;
    match chat.command {
        ChatSubcommand::New => print_json(&api.create_session().await?),
        ChatSubcommand::Read { session_id } => print_json(&api.get_session(session_id).await?),
        ChatSubcommand::Messages { session_id } => print_json(&api.list_messages(session_id).await?),
    }
}

/// MIME type the server will accept for `path`, judged by extension.
fn content_type_for(path: &Path) -> Result<&'static str, CliError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        "pdf" => Ok("application/pdf"),
        "mp4" => Ok("video/mp4"),
        _ => Err(CliError::UnsupportedFile(path.display().to_string())),
    }
}

fn parse_data<T: DeserializeOwned>(data: &str) -> Result<T, CliError> {
    Ok(serde_json::from_str(data)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_deleted(kind: &str, id: Uuid) -> Result<(), CliError> {
    println!("deleted {kind} {id}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
