use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trainer_client::api::HealthResponse;
use trainer_client::shutdown::{install_shutdown_handler, ShutdownSignal};
use trainer_client::{
    ClientConfig, GradingService, HttpGradingService, Job, JobId, JobState, Poller, Session,
    SharedSession, SubmissionController, SubmitMode, Task, TaskCatalog, TrainerError,
};

#[derive(Parser, Debug)]
#[command(name = "trainer")]
#[command(version)]
#[command(about = "Submit exercise solutions to a grading service and follow their verdicts")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Browse the task catalog
    Tasks {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Submit a solution and follow it until it is graded
    Submit {
        #[command(flatten)]
        client: ClientArgs,

        /// Task to solve
        task_id: String,

        /// File containing the solution
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Grading mode
        #[arg(long, short = 'm', default_value = "check")]
        mode: SubmitMode,

        /// Print the job ID and exit without waiting for the verdict
        #[arg(long)]
        no_watch: bool,
    },

    /// Job management commands
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },

    /// Show grading service health
    Health {
        #[command(flatten)]
        client: ClientArgs,
    },
}

// =============================================================================
// Client Arguments (shared by all commands)
// =============================================================================

#[derive(clap::Args, Debug)]
struct ClientArgs {
    /// Grading service base URL (overrides TRAINER_API_BASE_URL)
    #[arg(long, short = 'a')]
    api_base: Option<String>,

    /// Poll interval in milliseconds (overrides TRAINER_POLL_INTERVAL_MS)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum TaskCommands {
    /// List available tasks
    List,
    /// Show a task and its statement
    Show {
        /// The task ID
        task_id: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Get the current snapshot of a job
    Status {
        /// The job ID
        job_id: String,
    },
    /// Follow a job until it reaches a terminal state
    Watch {
        /// The job ID
        job_id: String,
    },
    /// Cancel a queued job
    Cancel {
        /// The job ID
        job_id: String,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobSubmitOutput {
    job_id: String,
    task_id: String,
    mode: SubmitMode,
}

#[derive(Serialize)]
struct JobCancelOutput {
    job_id: String,
    cancelled: bool,
}

#[derive(Serialize)]
struct TaskShowOutput<'a> {
    #[serde(flatten)]
    task: &'a Task,
    statement: &'a str,
}

#[derive(Serialize)]
struct WatchOutput<'a> {
    job: &'a Job,
    editor: &'a str,
}

// =============================================================================
// Session Context
// =============================================================================

struct Context {
    config: ClientConfig,
    service: Arc<dyn GradingService>,
    session: SharedSession,
    output: OutputFormat,
}

impl Context {
    fn new(args: ClientArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = args.api_base {
            config = config.with_base_url(url);
        }
        if let Some(ms) = args.poll_interval_ms {
            config = config.with_poll_interval_ms(ms);
        }

        let service: Arc<dyn GradingService> = Arc::new(HttpGradingService::new(&config)?);
        Ok(Self {
            config,
            service,
            session: Session::new().shared(),
            output: args.output,
        })
    }

    fn controller(&self) -> SubmissionController {
        SubmissionController::new(self.service.clone(), self.session.clone(), &self.config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn fail(context: &str, err: &TrainerError) -> ! {
    match err {
        TrainerError::Validation(msg) => eprintln!("Error: {}", msg),
        _ => eprintln!("Error: {}: {}", context, err),
    }
    if matches!(err, TrainerError::Transport(_)) {
        eprintln!("Hint: Use -a to point at the grading service, e.g.:");
        eprintln!("  trainer tasks -a http://<host>:<port> list");
    }
    std::process::exit(1);
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else if first_line.len() < s.trim_end().len() {
        format!("{}...", first_line)
    } else {
        first_line.to_string()
    }
}

fn print_block(title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    println!("{}:", title);
    for line in body.lines() {
        println!("  {}", line);
    }
}

/// One-line progress description of a job.
fn progress_line(job: &Job) -> String {
    match &job.state {
        JobState::Queued {
            queue_position,
            eta_ms,
        } => {
            let mut line = "QUEUED".to_string();
            if let Some(pos) = queue_position {
                line.push_str(&format!("  position {}", pos + 1));
            }
            if let Some(eta) = eta_ms {
                line.push_str(&format!("  eta ~{}ms", eta));
            }
            line
        }
        JobState::Running { running_for_ms } => match running_for_ms {
            Some(ms) => format!("RUNNING  for {}ms", ms),
            None => "RUNNING".to_string(),
        },
        JobState::Done { result } => format!("DONE     {}", result.verdict),
        JobState::Error { message, .. } => {
            format!("ERROR    {}", message.as_deref().unwrap_or("unknown error"))
        }
    }
}

fn print_job_table(job: &Job) {
    println!("Job ID:      {}", job.id);
    println!("State:       {}", job.state.name().to_uppercase());
    println!("Created:     {}", job.created_at.to_rfc3339());
    if let Some(started) = job.started_at {
        println!("Started:     {}", started.to_rfc3339());
    }
    if let Some(finished) = job.finished_at {
        println!("Finished:    {}", finished.to_rfc3339());
    }

    match &job.state {
        JobState::Queued {
            queue_position,
            eta_ms,
        } => {
            if let Some(pos) = queue_position {
                println!("Position:    {}", pos + 1);
            }
            if let Some(eta) = eta_ms {
                println!("ETA:         ~{}ms", eta);
            }
        }
        JobState::Running { running_for_ms } => {
            if let Some(ms) = running_for_ms {
                println!("Running for: {}ms", ms);
            }
        }
        JobState::Done { .. } => {}
        JobState::Error { message, .. } => {
            if let Some(msg) = message {
                println!("Error:       {}", msg);
            }
        }
    }

    if let Some(result) = job.result() {
        println!(
            "Verdict:     {} ({})",
            result.verdict,
            result.verdict.code()
        );
        println!("Time:        {:.2}ms", result.time_ms);
        print_block("Compilation Output", &result.compile_log);
        print_block("Stderr", &result.stderr);

        if !result.test_results.is_empty() {
            println!();
            println!(
                "Tests passed: {}/{}",
                result.passed_count(),
                result.test_results.len()
            );
            println!(
                "{:<6} {:<8} {:>10}  {:<22} ACTUAL",
                "TEST", "RESULT", "TIME", "EXPECTED"
            );
            println!("{}", "-".repeat(72));
            for test in &result.test_results {
                println!(
                    "{:<6} {:<8} {:>8.2}ms  {:<22} {}",
                    format!("#{}", test.test_num),
                    if test.passed { "pass" } else { "FAIL" },
                    test.time_ms,
                    truncate(&test.expected, 20),
                    truncate(&test.actual, 20)
                );
            }
        }
    }
}

fn print_job(job: &Job, output: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(job)?),
        OutputFormat::Table => print_job_table(job),
    }
    Ok(())
}

/// Poll `job_id` until it is terminal or `shutdown` fires. The job must
/// already be registered and current in the session.
async fn watch_job(
    ctx: &Context,
    job_id: &JobId,
    shutdown: &CancellationToken,
) -> Option<Job> {
    let already = ctx.session.read().await.job(job_id).cloned();
    if let Some(job) = already.filter(Job::is_terminal) {
        return Some(job);
    }

    let (tx, mut rx) = mpsc::channel(16);
    let poller = Poller::new(
        ctx.service.clone(),
        ctx.session.clone(),
        ctx.config.poll_interval(),
    )
    .with_updates(tx)
    .spawn(shutdown);

    let mut last_line = String::new();
    let finished = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break None,
            update = rx.recv() => match update {
                Some(job) if &job.id == job_id => {
                    if matches!(ctx.output, OutputFormat::Table) {
                        let line = progress_line(&job);
                        if line != last_line {
                            eprintln!("[{}] {}", job.id, line);
                            last_line = line;
                        }
                    }
                    if job.is_terminal() {
                        break Some(job);
                    }
                }
                Some(_) => continue,
                None => break None,
            },
        }
    };

    poller.stop().await;
    finished
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_tasks_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let mut catalog = TaskCatalog::new(ctx.service.clone());
    let tasks = match catalog.list_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => fail("Failed to fetch tasks", &e),
    };

    match ctx.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(tasks)?),
        OutputFormat::Table => {
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!("{:<24} {:<16} {:>8}  TITLE", "TASK ID", "MODULE", "LIMIT");
                println!("{}", "-".repeat(72));
                for task in tasks {
                    println!(
                        "{:<24} {:<16} {:>6}ms  {}",
                        task.id, task.module, task.time_limit_ms, task.title
                    );
                }
                println!();
                println!("{} tasks", tasks.len());
            }
        }
    }
    Ok(())
}

async fn handle_tasks_show(ctx: &Context, task_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut catalog = TaskCatalog::new(ctx.service.clone());
    let task = match catalog.task(&task_id).await {
        Ok(task) => task,
        Err(e) => fail("Failed to fetch task", &e),
    };
    let statement = match catalog.statement(&task).await {
        Ok(statement) => statement,
        Err(e) => fail("Failed to fetch statement", &e),
    };

    match ctx.output {
        OutputFormat::Json => {
            let output = TaskShowOutput {
                task: &task,
                statement: &statement,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("{}", task.title);
            println!("{}", "=".repeat(task.title.chars().count().max(8)));
            println!("Task ID:    {}", task.id);
            println!("Module:     {}", task.module);
            println!("Type:       {}", task.kind);
            println!("Time limit: {}ms", task.time_limit_ms);
            if let Some(mb) = task.memory_mb {
                println!("Memory:     {}MB", mb);
            }
            println!();
            println!("{}", statement);
            if let Some(starter) = &task.starter_code {
                println!();
                print_block("Starter code", starter);
            }
        }
    }
    Ok(())
}

async fn handle_submit(
    ctx: &Context,
    task_id: String,
    file: PathBuf,
    mode: SubmitMode,
    no_watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let code = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let mut catalog = TaskCatalog::new(ctx.service.clone());
    let task = match catalog.task(&task_id).await {
        Ok(task) => task,
        Err(e) => fail("Failed to fetch task", &e),
    };

    {
        let mut session = ctx.session.write().await;
        session.set_editor(code);
        session.select_task(Some(task));
    }

    let controller = ctx.controller();
    let handle = match controller.submit_selected(mode).await {
        Ok(handle) => handle,
        Err(e) => fail("Job submission failed", &e),
    };

    if no_watch {
        match ctx.output {
            OutputFormat::Json => {
                let output = JobSubmitOutput {
                    job_id: handle.id.to_string(),
                    task_id: handle.task_id,
                    mode,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Job submitted successfully!");
                println!("Job ID: {}", handle.id);
            }
        }
        return Ok(());
    }

    if matches!(ctx.output, OutputFormat::Table) {
        eprintln!("Submitted job {} for task {}", handle.id, handle.task_id);
    }

    let shutdown = install_shutdown_handler();
    let Some(job) = watch_job(ctx, &handle.id, shutdown.token()).await else {
        eprintln!("Interrupted, cancelling job {}...", handle.id);
        if controller.cancel(&handle.id).await {
            eprintln!("Job cancelled.");
        } else {
            eprintln!("Job could not be cancelled; it may still be graded.");
        }
        let signal = shutdown.received().unwrap_or(ShutdownSignal::Interrupt);
        std::process::exit(signal.exit_code());
    };

    let editor = ctx.session.read().await.editor().to_string();
    match ctx.output {
        OutputFormat::Json => {
            let output = WatchOutput {
                job: &job,
                editor: &editor,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print_job_table(&job);
            if matches!(job.state, JobState::Done { .. }) {
                println!();
                print_block("Output", &editor);
            }
        }
    }

    if !matches!(job.state, JobState::Done { .. }) {
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_job_status(ctx: &Context, job_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let job = match ctx.service.get_job(&JobId::new(job_id)).await {
        Ok(job) => job,
        Err(e) => fail("Failed to fetch job", &e),
    };
    print_job(&job, &ctx.output)
}

async fn handle_job_watch(ctx: &Context, job_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let job_id = JobId::new(job_id);
    if let Err(e) = ctx.controller().track(&job_id).await {
        fail("Failed to fetch job", &e);
    }

    let shutdown = install_shutdown_handler();
    match watch_job(ctx, &job_id, shutdown.token()).await {
        Some(job) => print_job(&job, &ctx.output),
        None => {
            eprintln!("Stopped watching job {}", job_id);
            Ok(())
        }
    }
}

async fn handle_job_cancel(ctx: &Context, job_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let job_id = JobId::new(job_id);
    let cancelled = ctx.controller().cancel(&job_id).await;

    match ctx.output {
        OutputFormat::Json => {
            let output = JobCancelOutput {
                job_id: job_id.to_string(),
                cancelled,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if cancelled {
                println!("Job {} cancelled.", job_id);
            } else {
                println!("Job {} could not be cancelled (already running, finished or unknown).", job_id);
            }
        }
    }
    Ok(())
}

async fn handle_health(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let health: HealthResponse = match ctx.service.health().await {
        Ok(health) => health,
        Err(e) => fail("Health check failed", &e),
    };

    match ctx.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&health)?),
        OutputFormat::Table => {
            println!("Grading Service");
            println!("{}", "=".repeat(40));
            println!("URL:     {}", ctx.config.base_url);
            println!("Status:  {}", health.status);
            println!("Workers: {}", health.workers);
            println!("Queued:  {}", health.queue_size);
            println!("Jobs:    {}", health.jobs_count);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Tasks { client, command } => {
            let ctx = Context::new(client)?;
            match command {
                TaskCommands::List => handle_tasks_list(&ctx).await?,
                TaskCommands::Show { task_id } => handle_tasks_show(&ctx, task_id).await?,
            }
        }
        Commands::Submit {
            client,
            task_id,
            file,
            mode,
            no_watch,
        } => {
            let ctx = Context::new(client)?;
            handle_submit(&ctx, task_id, file, mode, no_watch).await?;
        }
        Commands::Job { client, command } => {
            let ctx = Context::new(client)?;
            match command {
                JobCommands::Status { job_id } => handle_job_status(&ctx, job_id).await?,
                JobCommands::Watch { job_id } => handle_job_watch(&ctx, job_id).await?,
                JobCommands::Cancel { job_id } => handle_job_cancel(&ctx, job_id).await?,
            }
        }
        Commands::Health { client } => {
            let ctx = Context::new(client)?;
            handle_health(&ctx).await?;
        }
    }

    Ok(())
}
