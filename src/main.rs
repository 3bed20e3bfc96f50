//! Clinic portal
//!
//! Command-line front-end for patients and managers.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use clinic_portal::ai::{GeminiClient, HealthAssistant};
use clinic_portal::checkin::{self, Branch, CheckInWizard, SimulatedFaceCapture, WizardState};
use clinic_portal::config::{self, Config};
use clinic_portal::models::{
    Account, Appointment, HealthRequest, NewAccount, NewRequest, PatientDetails, RequestDecision,
    Role,
};
use clinic_portal::{RecordStore, StorageBackend};

#[derive(Parser)]
#[command(name = "clinic-portal", about = "Patient and manager clinic portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Store records in this directory instead of the configured storage
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a patient or manager account
    Register {
        #[arg(long, default_value = "patient")]
        role: Role,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        card_number: Option<String>,
        #[arg(long)]
        insurance: Option<String>,
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        mother_name: Option<String>,
        #[arg(long)]
        plan_type: Option<String>,
        #[arg(long)]
        valid_until: Option<String>,
        #[arg(long)]
        unit: Option<String>,
    },
    /// Sign in with an email or card number
    Login {
        identifier: String,
        #[arg(long, default_value = "patient")]
        role: Role,
    },
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List appointments (own appointments for patients, all for managers)
    Appointments,
    /// Run the pre-check-in for an appointment
    CheckIn {
        appointment_id: String,
        /// Clinic code (regional affiliate flow)
        #[arg(long)]
        code: Option<String>,
        /// Confirm the registration data (simplified flow)
        #[arg(long)]
        confirm: bool,
    },
    /// Authorization and exam requests
    Request {
        #[command(subcommand)]
        action: RequestCommand,
    },
    /// Validated check-in tokens (manager)
    Tokens,
    /// Dashboard counters (manager)
    Stats,
    /// Ask the health assistant
    Ask {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Subcommand)]
enum RequestCommand {
    /// Submit a new request for the signed-in patient
    Submit {
        #[arg(long = "type")]
        kind: String,
        description: String,
    },
    /// Own requests for patients, pending requests for managers
    List,
    Approve { id: String },
    Reject { id: String },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn require_session(store: &RecordStore<StorageBackend>, role: Role) -> Result<Account> {
    match store.current_session()? {
        Some(account) if account.role == role => Ok(account),
        Some(account) => bail!("this command needs a {} session, signed in as {}", role, account.role),
        None => bail!("not signed in, run `clinic-portal login` first"),
    }
}

fn print_appointment(apt: &Appointment) {
    println!(
        "{}  {} {}  {} ({})  {}  {}  [{}]{}",
        apt.id,
        apt.date,
        apt.time,
        apt.doctor_name,
        apt.specialty,
        apt.location,
        apt.patient_name,
        apt.check_in_status(),
        apt.validation_token()
            .map(|t| format!(" token {}", t))
            .unwrap_or_default()
    );
}

fn print_request(req: &HealthRequest) {
    println!(
        "{}  {}  {}  {}: {}  [{}]",
        req.id, req.date, req.patient_name, req.kind, req.description, req.status
    );
}

async fn check_in(
    store: &RecordStore<StorageBackend>,
    config: &Config,
    appointment_id: &str,
    code: Option<String>,
    confirm: bool,
) -> Result<()> {
    let patient = require_session(store, Role::Patient)?;
    let appointment = store
        .list_appointments()?
        .into_iter()
        .find(|a| a.id == appointment_id)
        .ok_or_else(|| anyhow!("appointment {} not found", appointment_id))?;
    if appointment.patient_name != patient.name {
        bail!("appointment {} belongs to another patient", appointment_id);
    }

    let mut wizard = CheckInWizard::new(&appointment, &patient);
    if wizard.state() == WizardState::Completed {
        println!("Check-in already validated. Token: {}", wizard.token().unwrap_or_default());
        return Ok(());
    }
    if !wizard.is_open() {
        bail!("check-in for appointment {} is not open yet", appointment_id);
    }

    let token = match wizard.branch() {
        Branch::Verified => {
            let code = code.context("the regional check-in needs the clinic code, pass --code")?;
            checkin::regional_token(&code)?;
            println!("Starting face capture...");
            wizard
                .start_biometric(&SimulatedFaceCapture::new(config.check_in.biometric_delay()))
                .await?;
            println!("Face verified.");
            wizard.submit_clinic_code(&code, store)?
        }
        Branch::Simplified => {
            let identity = wizard.identity();
            println!("Name:         {}", identity.name);
            println!("Card number:  {}", identity.card_number.as_deref().unwrap_or("-"));
            println!("Valid until:  {}", identity.valid_until.as_deref().unwrap_or("-"));
            println!("Mother's name: {}", identity.mother_name.as_deref().unwrap_or("-"));
            if !confirm {
                bail!("review the data above and run again with --confirm");
            }
            wizard.confirm_data(store)?
        }
    };

    println!("Check-in validated. Show this token at the reception: {}", token);
    Ok(())
}

async fn run(cli: Cli, mut config: Config) -> Result<()> {
    if let Some(dir) = cli.data_dir {
        config.storage.backend = "file".into();
        config.storage.path = dir;
    }
    let backend = StorageBackend::from_config(&config.storage).context("Failed to open storage")?;
    let store = RecordStore::new(backend);

    match cli.command {
        Commands::Register {
            role,
            name,
            email,
            card_number,
            insurance,
            birth_date,
            mother_name,
            plan_type,
            valid_until,
            unit,
        } => {
            let account = store.register(NewAccount {
                role,
                name,
                email,
                details: PatientDetails {
                    birth_date,
                    mother_name,
                    insurance_name: insurance,
                    card_number,
                    plan_type,
                    valid_until,
                    clinic_unit: unit,
                },
            })?;
            println!("Registered {} account {}", account.role, account.id);
        }
        Commands::Login { identifier, role } => {
            let account = store.login(&identifier, role)?;
            println!("Welcome, {}", account.name);
        }
        Commands::Logout => {
            store.logout()?;
            println!("Signed out");
        }
        Commands::Whoami => match store.current_session()? {
            Some(account) => println!("{} <{}> ({})", account.name, account.email, account.role),
            None => println!("Not signed in"),
        },
        Commands::Appointments => {
            let account = store
                .current_session()?
                .context("not signed in, run `clinic-portal login` first")?;
            store
                .list_appointments()?
                .iter()
                .filter(|a| account.role == Role::Manager || a.patient_name == account.name)
                .for_each(print_appointment);
        }
        Commands::CheckIn {
            appointment_id,
            code,
            confirm,
        } => check_in(&store, &config, &appointment_id, code, confirm).await?,
        Commands::Request { action } => match action {
            RequestCommand::Submit { kind, description } => {
                let patient = require_session(&store, Role::Patient)?;
                let saved = store.save_request(NewRequest::new(patient.name, kind, description))?;
                print_request(&saved);
            }
            RequestCommand::List => {
                let account = store
                    .current_session()?
                    .context("not signed in, run `clinic-portal login` first")?;
                let requests = match account.role {
                    Role::Patient => store.requests_for_patient(&account.name)?,
                    Role::Manager => store.pending_requests()?,
                };
                requests.iter().for_each(print_request);
            }
            RequestCommand::Approve { id } => review(&store, &id, RequestDecision::Approve)?,
            RequestCommand::Reject { id } => review(&store, &id, RequestDecision::Reject)?,
        },
        Commands::Tokens => {
            require_session(&store, Role::Manager)?;
            store.validated_check_ins()?.iter().for_each(print_appointment);
        }
        Commands::Stats => {
            require_session(&store, Role::Manager)?;
            let stats = store.dashboard_stats()?;
            println!("Validated check-ins: {}", stats.validated_check_ins);
            println!("Appointments:        {}", stats.appointments);
            println!("Pending requests:    {}", stats.pending_requests);
        }
        Commands::Ask { text } => {
            let assistant = HealthAssistant::new(GeminiClient::new(&config.assistant)?);
            println!("{}", assistant.reply(&text.join(" ")).await);
        }
    }
    Ok(())
}

fn review(store: &RecordStore<StorageBackend>, id: &str, decision: RequestDecision) -> Result<()> {
    require_session(store, Role::Manager)?;
    match store.review_request(id, decision)? {
        Some(request) => print_request(&request),
        None => bail!("request {} not found", id),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = config::load_config().context("Failed to load configuration")?;

    // Initialize logger
    init_tracing(config.logging.json);

    let cli = Cli::parse();
    run(cli, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_portal::config::{
        AssistantConfig, CheckInConfig, LoggingConfig, StorageConfig,
    };
    use clinic_portal::models::{AppointmentUpdate, CheckIn, CheckInStatus};
    use clinic_portal::MemoryStorage;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            storage: StorageConfig {
                backend: "memory".into(),
                path: PathBuf::from("data"),
            },
            assistant: AssistantConfig {
                api_key: None,
                model: "gemini-3-flash-preview".into(),
                base_url: "http://localhost/".into(),
                temperature: 0.6,
            },
            check_in: CheckInConfig {
                biometric_delay_ms: 60_000,
            },
            logging: LoggingConfig { json: false },
        }
    }

    fn signed_in_patient(insurer: &str) -> RecordStore<StorageBackend> {
        let store = RecordStore::new(StorageBackend::Memory(MemoryStorage::new()));
        store
            .register(NewAccount::patient(
                "João Silva Oliveira",
                "joao@example.com",
                "0032998877665544",
                insurer,
            ))
            .unwrap();
        store.login("joao@example.com", Role::Patient).unwrap();
        store
    }

    fn status(store: &RecordStore<StorageBackend>) -> CheckInStatus {
        store.list_appointments().unwrap()[0].check_in_status()
    }

    #[tokio::test(start_paused = true)]
    async fn bad_clinic_code_fails_before_the_capture() {
        let store = signed_in_patient("Unimed Porto Alegre");
        let started = tokio::time::Instant::now();

        let result = check_in(&store, &test_config(), "apt_demo_1", Some("88".into()), false).await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(status(&store), CheckInStatus::Available);
    }

    #[tokio::test]
    async fn not_started_appointment_is_refused() {
        let store = signed_in_patient("Unimed Nordeste");
        store
            .update_appointment("apt_demo_1", AppointmentUpdate::check_in(CheckIn::NotStarted))
            .unwrap();

        let result = check_in(&store, &test_config(), "apt_demo_1", None, true).await;

        assert!(result.is_err());
        assert_eq!(status(&store), CheckInStatus::NotStarted);
    }
}
