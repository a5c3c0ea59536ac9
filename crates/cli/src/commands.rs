//! CLI commands

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use medicat_core::{
    Category, CategoryType, FormType, GenericName, Manufacturer, MedicineForm, MedicineInput,
    RecordId, RouteAccess, SearchFilters, Segment, SessionContext, UnitOfMeasurement, highlight,
};
use medicat_http::client::{
    AuxiliaryResource, CategoryInput, FormInput, GenericNameInput, LogoUpload, ManufacturerInput,
};
use medicat_http::{CatalogClient, Navigator};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a command needs to talk to the backend
pub struct Context {
    pub client: CatalogClient,
    pub session: SessionContext,
    pub credentials_path: PathBuf,
}

/// Tells the user to sign in again when the session could not be recovered
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        warn!(path, "Session ended");
        eprintln!("Your session has expired. Run `medicat login` to sign in again.");
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the credential pair
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "MEDICAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Revoke the refresh credential and forget the session
    Logout,

    /// Show whether a session is active
    Status,

    /// Browse and administer medicines
    Medicines {
        #[command(subcommand)]
        command: MedicineCommands,
    },

    /// Search medicines
    Search {
        query: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Category code (ANT, ANL, APR, VIT, SUP, OTH)
        #[arg(long, value_parser = parse_code::<CategoryType>)]
        category: Option<CategoryType>,

        /// Form code (TBL, SYR, INJ, ONT, DRP, OTH)
        #[arg(long, value_parser = parse_code::<FormType>)]
        form: Option<FormType>,

        /// Manufacturer id
        #[arg(long)]
        manufacturer: Option<RecordId>,
    },

    /// Medicine categories
    Categories {
        #[command(subcommand)]
        command: NameCommands,
    },

    /// Dosage forms
    Forms {
        #[command(subcommand)]
        command: FormCommands,
    },

    /// Generic names
    GenericNames {
        #[command(subcommand)]
        command: NameCommands,
    },

    /// Manufacturers
    Manufacturers {
        #[command(subcommand)]
        command: ManufacturerCommands,
    },
}

#[derive(Subcommand)]
pub enum MedicineCommands {
    /// List one page of medicines
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Show a single medicine
    Show { id: Uuid },

    /// Add a medicine
    Add(MedicineArgs),

    /// Replace a medicine's fields
    Edit {
        id: Uuid,

        #[command(flatten)]
        fields: MedicineArgs,
    },

    /// Delete a medicine
    Delete { id: Uuid },
}

#[derive(Args, Debug, Default)]
pub struct MedicineArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    price: Option<Decimal>,

    #[arg(long)]
    batch_number: Option<String>,

    #[arg(long)]
    stock_quantity: Option<u32>,

    /// Unit code (TBL, CAP, SYR, ONT, OTH)
    #[arg(long, value_parser = parse_code::<UnitOfMeasurement>)]
    unit: Option<UnitOfMeasurement>,

    #[arg(long)]
    prescription_required: Option<bool>,

    #[arg(long)]
    available: Option<bool>,

    #[arg(long)]
    featured: Option<bool>,

    /// Generic name id
    #[arg(long)]
    generic_name: Option<RecordId>,

    /// Category id
    #[arg(long)]
    category: Option<RecordId>,

    /// Form id
    #[arg(long)]
    form: Option<RecordId>,

    /// Manufacturer id
    #[arg(long)]
    manufacturer: Option<RecordId>,
}

impl From<MedicineArgs> for MedicineInput {
    fn from(args: MedicineArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            price: args.price,
            batch_number: args.batch_number,
            stock_quantity: args.stock_quantity,
            unit_of_measurement: args.unit,
            prescription_required: args.prescription_required,
            is_available: args.available,
            is_featured: args.featured,
            generic_name: args.generic_name,
            category: args.category,
            form: args.form,
            manufacturer: args.manufacturer,
        }
    }
}

/// Subcommands for resources that only carry a name
#[derive(Subcommand)]
pub enum NameCommands {
    List,
    Add { name: String },
    Edit { id: RecordId, name: String },
    Delete { id: RecordId },
}

#[derive(Subcommand)]
pub enum FormCommands {
    List,
    Add { form_type: String },
    Edit { id: RecordId, form_type: String },
    Delete { id: RecordId },
}

#[derive(Subcommand)]
pub enum ManufacturerCommands {
    List,
    Add(ManufacturerArgs),
    Edit {
        id: RecordId,

        #[command(flatten)]
        fields: ManufacturerArgs,
    },
    Delete { id: RecordId },
}

#[derive(Args, Debug)]
pub struct ManufacturerArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    contact_info: Option<String>,

    #[arg(long)]
    website: Option<String>,

    /// Logo image to upload
    #[arg(long)]
    logo: Option<PathBuf>,
}

impl ManufacturerArgs {
    fn into_input(self) -> Result<ManufacturerInput> {
        let logo = self.logo.as_deref().map(read_logo).transpose()?;
        Ok(ManufacturerInput {
            name: self.name,
            contact_info: self.contact_info,
            website: self.website,
            logo,
        })
    }
}

fn read_logo(path: &Path) -> Result<LogoUpload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read logo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "logo".to_string(), |name| name.to_string_lossy().into_owned());
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("svg") => Some("image/svg+xml"),
        _ => None,
    };
    Ok(LogoUpload {
        file_name,
        mime: mime.map(str::to_string),
        bytes,
    })
}

/// Parse a backend code such as `ANL` into its enum
fn parse_code<T: DeserializeOwned>(code: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(code.to_uppercase()))
        .map_err(|_| format!("unknown code {code:?}"))
}

/// One operation on a reference-data collection
enum RecordAction<I> {
    List,
    Create(I),
    Update(RecordId, I),
    Delete(RecordId),
}

impl RecordAction<CategoryInput> {
    fn from_names(command: NameCommands) -> Self {
        match command {
            NameCommands::List => Self::List,
            NameCommands::Add { name } => Self::Create(CategoryInput { name }),
            NameCommands::Edit { id, name } => Self::Update(id, CategoryInput { name }),
            NameCommands::Delete { id } => Self::Delete(id),
        }
    }
}

impl RecordAction<GenericNameInput> {
    fn from_names(command: NameCommands) -> Self {
        match command {
            NameCommands::List => Self::List,
            NameCommands::Add { name } => Self::Create(GenericNameInput { name }),
            NameCommands::Edit { id, name } => Self::Update(id, GenericNameInput { name }),
            NameCommands::Delete { id } => Self::Delete(id),
        }
    }
}

impl From<FormCommands> for RecordAction<FormInput> {
    fn from(command: FormCommands) -> Self {
        match command {
            FormCommands::List => Self::List,
            FormCommands::Add { form_type } => Self::Create(FormInput { form_type }),
            FormCommands::Edit { id, form_type } => Self::Update(id, FormInput { form_type }),
            FormCommands::Delete { id } => Self::Delete(id),
        }
    }
}

impl RecordAction<ManufacturerInput> {
    fn from_manufacturers(command: ManufacturerCommands) -> Result<Self> {
        Ok(match command {
            ManufacturerCommands::List => Self::List,
            ManufacturerCommands::Add(fields) => Self::Create(fields.into_input()?),
            ManufacturerCommands::Edit { id, fields } => Self::Update(id, fields.into_input()?),
            ManufacturerCommands::Delete { id } => Self::Delete(id),
        })
    }
}

impl<I> RecordAction<I> {
    const fn is_mutation(&self) -> bool {
        !matches!(self, Self::List)
    }
}

/// One-line rendering of a record
trait Describe {
    fn describe(&self) -> String;
}

impl Describe for Category {
    fn describe(&self) -> String {
        format!("{:>5}  {}", self.id, self.name)
    }
}

impl Describe for MedicineForm {
    fn describe(&self) -> String {
        format!("{:>5}  {}", self.id, self.form_type)
    }
}

impl Describe for GenericName {
    fn describe(&self) -> String {
        format!("{:>5}  {}", self.id, self.name)
    }
}

impl Describe for Manufacturer {
    fn describe(&self) -> String {
        let mut line = format!("{:>5}  {}", self.id, self.name);
        for extra in [&self.contact_info, &self.website].into_iter().flatten() {
            line.push_str("  ");
            line.push_str(extra);
        }
        line
    }
}

impl Commands {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Login { username, password } => login(ctx, &username, password).await,
            Self::Logout => logout(ctx).await,
            Self::Status => {
                status(ctx);
                Ok(())
            }
            Self::Medicines { command } => command.execute(ctx).await,
            Self::Search {
                query,
                page,
                category,
                form,
                manufacturer,
            } => {
                let filters = SearchFilters {
                    category,
                    form,
                    manufacturer,
                };
                search(ctx, &query, page, &filters).await
            }
            Self::Categories { command } => {
                run_records::<Category>(ctx, RecordAction::<CategoryInput>::from_names(command))
                    .await
            }
            Self::Forms { command } => run_records::<MedicineForm>(ctx, command.into()).await,
            Self::GenericNames { command } => {
                run_records::<GenericName>(
                    ctx,
                    RecordAction::<GenericNameInput>::from_names(command),
                )
                .await
            }
            Self::Manufacturers { command } => {
                let action = RecordAction::<ManufacturerInput>::from_manufacturers(command)?;
                run_records::<Manufacturer>(ctx, action).await
            }
        }
    }
}

impl MedicineCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let client = &ctx.client;
        match self {
            Self::List { page } => {
                let listing = client.list_medicines(page).await?;
                for medicine in &listing.results {
                    println!(
                        "{}  {:<30}  {:>10}  stock {:>5}  {}",
                        medicine.id,
                        medicine.name,
                        medicine.price,
                        medicine.stock_quantity,
                        medicine.generic_name().unwrap_or("-")
                    );
                }
                println!(
                    "page {} of {} ({} medicines)",
                    page.max(1),
                    listing.total_pages(),
                    listing.count
                );
            }
            Self::Show { id } => {
                let medicine = client.get_medicine(id).await?;
                println!("{}", serde_json::to_string_pretty(&medicine)?);
            }
            Self::Add(fields) => {
                require_session(&ctx.session)?;
                let medicine = client.create_medicine(&fields.into()).await?;
                println!("Created medicine {} ({})", medicine.name, medicine.id);
            }
            Self::Edit { id, fields } => {
                require_session(&ctx.session)?;
                let medicine = client.update_medicine(id, &fields.into()).await?;
                println!("Updated medicine {} ({})", medicine.name, medicine.id);
            }
            Self::Delete { id } => {
                require_session(&ctx.session)?;
                client.delete_medicine(id).await?;
                println!("Deleted medicine {id}");
            }
        }
        Ok(())
    }
}

/// Fail unless the session guard grants access
fn require_session(session: &SessionContext) -> Result<()> {
    match session.guard() {
        RouteAccess::Granted => Ok(()),
        RouteAccess::Redirect(_) => bail!("log in first: medicat login --username <USERNAME>"),
    }
}

async fn login(ctx: &Context, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    ctx.client.login(username, &password).await?;
    println!("Logged in as {username}");
    Ok(())
}

fn read_password() -> Result<String> {
    let stdin = std::io::stdin();
    let line = if stdin.is_terminal() {
        rpassword::prompt_password("Password: ").context("failed to read password from terminal")?
    } else {
        let mut line = String::new();
        stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read password from stdin")?;
        line
    };
    password_from_line(&line)
}

fn password_from_line(line: &str) -> Result<String> {
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password.to_string())
}

async fn logout(ctx: &Context) -> Result<()> {
    // Revocation is best effort; local credentials are always cleared
    match ctx.client.revoke().await {
        Ok(true) => info!("Refresh credential revoked"),
        Ok(false) => {}
        Err(err) => warn!("Could not revoke refresh credential: {err}"),
    }
    ctx.session.logout()?;
    println!("Logged out");
    Ok(())
}

fn status(ctx: &Context) {
    if ctx.session.is_authenticated() {
        println!("Signed in ({})", ctx.credentials_path.display());
    } else {
        println!("Not signed in");
    }
}

async fn search(ctx: &Context, query: &str, page: u32, filters: &SearchFilters) -> Result<()> {
    let results = ctx.client.search_medicines(query, page, filters).await?;
    let ansi = std::io::stdout().is_terminal();

    if results.results.is_empty() {
        println!("No medicines match {query:?}");
        return Ok(());
    }

    for hit in &results.results {
        let name = render(&highlight(&hit.medicine.name, hit.spans("name")), ansi);
        let generic = hit.medicine.generic_name().map_or_else(
            || "-".to_string(),
            |generic| render(&highlight(generic, hit.spans("generic_name")), ansi),
        );
        println!(
            "{}  {name}  ({generic})  {}",
            hit.medicine.id, hit.medicine.price
        );
    }
    println!(
        "page {} of {} ({} matches)",
        page.max(1),
        results.total_pages(),
        results.count
    );
    Ok(())
}

/// Join highlight segments, marking matches in bold yellow or brackets
fn render(segments: &[Segment<'_>], ansi: bool) -> String {
    segments
        .iter()
        .map(|segment| match (segment.matched, ansi) {
            (false, _) => segment.text.to_string(),
            (true, true) => format!("\x1b[1;33m{}\x1b[0m", segment.text),
            (true, false) => format!("[{}]", segment.text),
        })
        .collect()
}

async fn run_records<R>(ctx: &Context, action: RecordAction<R::Input>) -> Result<()>
where
    R: AuxiliaryResource + Describe,
{
    if action.is_mutation() {
        require_session(&ctx.session)?;
    }

    let client = &ctx.client;
    match action {
        RecordAction::List => {
            let records = client.list_records::<R>().await?;
            if records.is_empty() {
                println!("No {} yet", R::LABEL);
            }
            for record in &records {
                println!("{}", record.describe());
            }
        }
        RecordAction::Create(input) => {
            let record = client.create_record::<R>(&input).await?;
            println!("Created {}", record.describe());
        }
        RecordAction::Update(id, input) => {
            let record = client.update_record::<R>(id, &input).await?;
            println!("Updated {}", record.describe());
        }
        RecordAction::Delete(id) => {
            client.delete_record::<R>(id).await?;
            println!("Deleted {id} from {}", R::LABEL);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicat_core::{MatchSpan, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn piped_password_drops_line_ending() {
        assert_eq!(password_from_line("s3cret\r\n").unwrap(), "s3cret");
        assert_eq!(password_from_line(" padded \n").unwrap(), " padded ");
        assert!(password_from_line("\n").is_err());
        assert!(password_from_line("").is_err());
    }

    #[test]
    fn codes_parse_case_insensitively() {
        assert_eq!(parse_code::<CategoryType>("anl"), Ok(CategoryType::Analgesic));
        assert_eq!(parse_code::<FormType>("DRP"), Ok(FormType::Drops));
        assert!(parse_code::<FormType>("XYZ").is_err());
    }

    #[test]
    fn render_marks_matches() {
        let segments = highlight("Paracetamol", &[MatchSpan::new(0, 4)]);
        assert_eq!(render(&segments, false), "[Para]cetamol");
        assert_eq!(render(&segments, true), "\x1b[1;33mPara\x1b[0mcetamol");
    }

    #[test]
    fn mutations_require_a_session() {
        let session = SessionContext::new(Arc::new(MemoryStore::new()));
        assert!(require_session(&session).is_err());

        session.login();
        assert!(require_session(&session).is_ok());

        assert!(!RecordAction::<CategoryInput>::List.is_mutation());
        assert!(RecordAction::<CategoryInput>::Delete(1).is_mutation());
    }

    #[test]
    fn medicine_args_map_to_input() {
        let args = MedicineArgs {
            name: Some("Ibuprofen".into()),
            unit: Some(UnitOfMeasurement::Capsule),
            available: Some(false),
            ..MedicineArgs::default()
        };
        let input = MedicineInput::from(args);
        assert_eq!(input.name.as_deref(), Some("Ibuprofen"));
        assert_eq!(input.unit_of_measurement, Some(UnitOfMeasurement::Capsule));
        assert_eq!(input.is_available, Some(false));
        assert_eq!(input.price, None);
    }

    #[test]
    fn manufacturer_logo_is_read_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("acme.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let input = ManufacturerArgs {
            name: "Acme".into(),
            contact_info: None,
            website: None,
            logo: Some(path),
        }
        .into_input()
        .unwrap();

        let logo = input.logo.unwrap();
        assert_eq!(logo.file_name, "acme.png");
        assert_eq!(logo.mime.as_deref(), Some("image/png"));
        assert_eq!(logo.bytes, vec![1, 2, 3]);
    }
}
