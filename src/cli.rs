//! Kommandoradsgränssnitt för opsboard

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::models::petty_cash::balance;
use crate::models::{
    AppSettings, Asset, AssetCondition, AssetStatus, CashKind, ElectricityInput, Lead, MaintenanceRecord,
    PettyCashTransaction, PipelineStage, Profile, Role, TransportMode, TravelActivity,
    TravelSegmentInput, WaterDayInput, WaterWeekInput,
};
use crate::services::aggregator::{summarize, summarize_period, PeriodFilter, Summary};
use crate::services::calculator::{self, Calculator};
use crate::services::export::{ExportFormat, ExportService, ReportType};
use crate::services::user_admin::{NewUser, UserAdminService};
use crate::utils::date::parse_date;
use crate::utils::error::AppError;
use crate::utils::numeric::{parse_lenient, parse_lenient_count};
use crate::utils::path::get_config_path;

#[derive(Debug, Parser)]
#[command(name = "opsboard", version, about = "Intern verksamhetsdashboard")]
pub struct Cli {
    /// Inställningsfil (TOML)
    #[arg(long, global = true, value_name = "FIL")]
    pub config: Option<PathBuf>,

    /// Databasfil, ersätter värdet i inställningarna
    #[arg(long, global = true, value_name = "FIL")]
    pub db: Option<PathBuf>,

    /// Mer loggning (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Skriv resultat som JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Profilen (e-post) som utför kommandot
    #[arg(long = "as", global = true, value_name = "E-POST")]
    pub as_user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Vattenförbrukning
    Water {
        #[command(subcommand)]
        action: WaterCommand,
    },
    /// Elförbrukning
    Electricity {
        #[command(subcommand)]
        action: ElectricityCommand,
    },
    /// Tjänsteresor
    Travel {
        #[command(subcommand)]
        action: TravelCommand,
    },
    /// Operativa tillgångar
    Asset {
        #[command(subcommand)]
        action: AssetCommand,
    },
    /// Småkassa
    PettyCash {
        #[command(subcommand)]
        action: PettyCashCommand,
    },
    /// Affärsutvecklingens pipeline
    Lead {
        #[command(subcommand)]
        action: LeadCommand,
    },
    /// Exportera en rapport
    Export(ExportArgs),
    /// Användare
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Applikationsinställningar
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Debug, Args)]
pub struct PeriodArgs {
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,
}

impl PeriodArgs {
    fn filter(&self) -> PeriodFilter {
        PeriodFilter::new(self.from, self.to)
    }
}

#[derive(Debug, Subcommand)]
pub enum WaterCommand {
    /// Beräkna en dag utan att spara
    Preview {
        /// Antal personer; ogiltigt värde räknas som 0
        #[arg(long, default_value = "0")]
        headcount: String,
        #[arg(long)]
        holiday: bool,
    },
    /// Spara en vecka (DATUM=ANTAL per dag)
    SaveWeek {
        #[arg(long, value_parser = parse_date_arg)]
        week: NaiveDate,
        #[arg(long = "day", value_name = "DATUM=ANTAL")]
        days: Vec<String>,
        #[arg(long = "holiday", value_name = "DATUM", value_parser = parse_date_arg)]
        holidays: Vec<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        evidence: Option<String>,
    },
    /// Summering för period, i år och månadssnitt
    Summary(PeriodArgs),
    /// Visa eller ändra koefficienter
    Config(WaterConfigArgs),
}

#[derive(Debug, Args)]
pub struct WaterConfigArgs {
    #[arg(long)]
    pub hand_wash_frequency: Option<f64>,
    #[arg(long)]
    pub hand_wash_volume: Option<f64>,
    #[arg(long)]
    pub toilet_flush_frequency: Option<f64>,
    #[arg(long)]
    pub toilet_flush_volume: Option<f64>,
    #[arg(long)]
    pub emission_factor: Option<f64>,
    #[arg(long)]
    pub cost: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum ElectricityCommand {
    /// Beräkna en period utan att spara
    Preview {
        #[arg(long, default_value = "0")]
        kwh: String,
    },
    /// Spara en mätperiod
    Save {
        #[arg(long, value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date_arg)]
        end: NaiveDate,
        #[arg(long)]
        kwh: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        evidence: Option<String>,
    },
    Summary(PeriodArgs),
    Config(ElectricityConfigArgs),
}

#[derive(Debug, Args)]
pub struct ElectricityConfigArgs {
    /// Företagets andel i procent
    #[arg(long)]
    pub allocation: Option<f64>,
    #[arg(long)]
    pub emission_factor: Option<f64>,
    #[arg(long)]
    pub cost: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum TravelCommand {
    AddActivity {
        #[arg(long)]
        title: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long)]
        description: Option<String>,
    },
    AddSegment {
        #[arg(long)]
        activity: i64,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_mode_arg)]
        mode: TransportMode,
        #[arg(long)]
        subtype: Option<String>,
        #[arg(long)]
        km: String,
        #[arg(long, default_value_t = 1)]
        passengers: i64,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: Option<String>,
    },
    /// Aktiviteter med summerade sträckor
    Activities,
    Summary(PeriodArgs),
    /// Sätt en utsläppsfaktor (kg CO2e per km)
    Factor {
        #[arg(long, value_parser = parse_mode_arg)]
        mode: TransportMode,
        #[arg(long)]
        subtype: Option<String>,
        #[arg(long)]
        value: f64,
    },
}

#[derive(Debug, Subcommand)]
pub enum AssetCommand {
    Create {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        purchase_value: f64,
        #[arg(long, default_value_t = 0.0)]
        current_value: f64,
    },
    Assign {
        code: String,
        /// Mottagarens e-post
        #[arg(long)]
        to: String,
        #[arg(long)]
        note: Option<String>,
    },
    Return {
        code: String,
        #[arg(long)]
        note: Option<String>,
    },
    Condition {
        code: String,
        #[arg(value_parser = parse_condition_arg)]
        condition: AssetCondition,
        #[arg(long)]
        note: Option<String>,
    },
    Status {
        code: String,
        #[arg(value_parser = parse_status_arg)]
        status: AssetStatus,
        #[arg(long)]
        note: Option<String>,
    },
    Values {
        code: String,
        #[arg(long)]
        purchase_value: f64,
        #[arg(long)]
        current_value: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Registrera service
    Service {
        code: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        #[arg(long)]
        vendor: Option<String>,
    },
    List {
        #[arg(long, value_parser = parse_status_arg)]
        status: Option<AssetStatus>,
        /// Endast tillgångar som innehas av profilen (e-post)
        #[arg(long, conflicts_with = "status")]
        holder: Option<String>,
    },
    Logs {
        code: String,
    },
    Delete {
        code: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PettyCashCommand {
    Add {
        #[arg(long, value_enum)]
        kind: CashKindArg,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    List(PeriodArgs),
    /// Saldo och utgifter för period
    Summary {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LeadCommand {
    Create {
        #[arg(long)]
        company: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        value: f64,
    },
    Move {
        id: i64,
        #[arg(value_parser = parse_stage_arg)]
        stage: PipelineStage,
        #[arg(long)]
        note: Option<String>,
    },
    List,
    History {
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub report: ReportArg,
    #[arg(long, value_enum, default_value_t = FormatArg::Xlsx)]
    pub format: FormatArg,
    #[command(flatten)]
    pub period: PeriodArgs,
    /// Målfil; standard är exportkatalogen
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Skapa första administratören i en tom databas
    BootstrapAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_role_arg, default_value = "staff")]
        role: Role,
        #[arg(long)]
        department: Option<String>,
    },
    List,
    Deactivate {
        email: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Visa gällande inställningar
    Show,
    /// Skriv standardinställningar till inställningsfilen
    Init {
        /// Skriv över en befintlig fil
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CashKindArg {
    TopUp,
    Expense,
}

impl From<CashKindArg> for CashKind {
    fn from(arg: CashKindArg) -> Self {
        match arg {
            CashKindArg::TopUp => CashKind::TopUp,
            CashKindArg::Expense => CashKind::Expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportArg {
    Water,
    Electricity,
    Travel,
    Assets,
    PettyCash,
}

impl From<ReportArg> for ReportType {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Water => ReportType::Water,
            ReportArg::Electricity => ReportType::Electricity,
            ReportArg::Travel => ReportType::Travel,
            ReportArg::Assets => ReportType::Assets,
            ReportArg::PettyCash => ReportType::PettyCash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Xlsx,
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Xlsx => ExportFormat::Xlsx,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("ogiltigt datum: {}", s))
}

fn parse_mode_arg(s: &str) -> Result<TransportMode, String> {
    TransportMode::from_db_str(&s.to_lowercase()).ok_or_else(|| format!("okänt färdmedel: {}", s))
}

fn parse_condition_arg(s: &str) -> Result<AssetCondition, String> {
    AssetCondition::from_db_str(&s.to_lowercase()).ok_or_else(|| format!("okänt skick: {}", s))
}

fn parse_status_arg(s: &str) -> Result<AssetStatus, String> {
    AssetStatus::from_db_str(&s.to_lowercase()).ok_or_else(|| format!("okänd status: {}", s))
}

fn parse_stage_arg(s: &str) -> Result<PipelineStage, String> {
    PipelineStage::from_db_str(&s.to_lowercase()).ok_or_else(|| format!("okänt steg: {}", s))
}

fn parse_role_arg(s: &str) -> Result<Role, String> {
    match s.to_lowercase().as_str() {
        "admin" => Ok(Role::Admin),
        "manager" => Ok(Role::Manager),
        "staff" => Ok(Role::Staff),
        _ => Err(format!("okänd roll: {}", s)),
    }
}

/// Tolka `DATUM=ANTAL`. Ett ogiltigt antal blir 0.
fn parse_day_entry(entry: &str) -> Result<WaterDayInput> {
    let (date, count) = entry
        .split_once('=')
        .ok_or_else(|| AppError::validation(format!("förväntade DATUM=ANTAL: {}", entry)))?;
    let date = parse_date(date.trim())
        .ok_or_else(|| AppError::validation(format!("ogiltigt datum: {}", date)))?;
    Ok(WaterDayInput::new(date, parse_lenient_count(count)))
}

/// Ladda inställningar, initiera loggning och kör kommandot
pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(get_config_path);
    let mut settings = AppSettings::load_from(&config_path);
    if let Some(db) = &cli.db {
        settings.database_path = db.clone();
    }

    let level = settings.log_level.raised_by(cli.verbose).to_tracing();
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Inställningar från {}", config_path.display());

    if let Command::Settings { action } = &cli.command {
        return settings_command(action, &settings, &config_path, cli.json);
    }

    let db = Database::open(&settings.database_path)
        .with_context(|| format!("Kunde inte öppna {}", settings.database_path.display()))?;

    let session = Session {
        db,
        settings,
        json: cli.json,
        as_user: cli.as_user,
        today: Local::now().date_naive(),
    };

    match cli.command {
        Command::Water { action } => session.water(action),
        Command::Electricity { action } => session.electricity(action),
        Command::Travel { action } => session.travel(action),
        Command::Asset { action } => session.asset(action),
        Command::PettyCash { action } => session.petty_cash(action),
        Command::Lead { action } => session.lead(action),
        Command::Export(args) => session.export(args),
        Command::User { action } => session.user(action),
        Command::Settings { .. } => Ok(()),
    }
}

fn settings_command(
    action: &SettingsCommand,
    settings: &AppSettings,
    config_path: &std::path::Path,
    json: bool,
) -> Result<()> {
    match action {
        SettingsCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(settings)?);
            } else {
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(settings)?);
            }
        }
        SettingsCommand::Init { force } => {
            if config_path.exists() && !force {
                return Err(AppError::already_exists(format!(
                    "{} (använd --force)",
                    config_path.display()
                ))
                .into());
            }
            settings.save_to(config_path)?;
            info!("Inställningar sparade i {}", config_path.display());
        }
    }
    Ok(())
}

struct Session {
    db: Database,
    settings: AppSettings,
    json: bool,
    as_user: Option<String>,
    today: NaiveDate,
}

#[derive(Serialize)]
struct WaterSummary {
    liters: Summary,
    carbon_kg: Summary,
    cost: Summary,
}

#[derive(Serialize)]
struct ElectricitySummary {
    company_kwh: Summary,
    carbon_kg: Summary,
    cost: Summary,
}

#[derive(Serialize)]
struct TravelSummary {
    distance_km: Summary,
    emission_kg: Summary,
}

#[derive(Serialize)]
struct CashSummary {
    balance: f64,
    expenses: Summary,
}

impl Session {
    fn calculator(&self) -> Calculator {
        Calculator::new(self.settings.negative_input_policy)
    }

    /// Profilen som anges med `--as`
    fn actor(&self) -> Result<Profile> {
        let email = self
            .as_user
            .as_deref()
            .ok_or_else(|| AppError::validation("Ange vilken profil som utför kommandot med --as"))?;
        let profile = self
            .db
            .profiles()
            .find_by_email(email)?
            .ok_or_else(|| AppError::not_found(format!("Profil {}", email)))?;
        Ok(profile)
    }

    fn profile_id(&self, email: &str) -> Result<i64> {
        self.db
            .profiles()
            .find_by_email(email)?
            .and_then(|p| p.id)
            .ok_or_else(|| AppError::not_found(format!("Profil {}", email)).into())
    }

    fn asset_by_code(&self, code: &str) -> Result<Asset> {
        let asset = self
            .db
            .assets()
            .find_by_code(code)?
            .ok_or_else(|| AppError::not_found(format!("Tillgång {}", code)))?;
        Ok(asset)
    }

    fn asset_id(&self, code: &str) -> Result<i64> {
        self.asset_by_code(code)?
            .id
            .ok_or_else(|| AppError::not_found(format!("Tillgång {}", code)).into())
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    fn water(&self, action: WaterCommand) -> Result<()> {
        let repo = self.db.water();

        match action {
            WaterCommand::Preview { headcount, holiday } => {
                let config = repo.load_config_or_default();
                let headcount = parse_lenient_count(&headcount);
                let figures = self.calculator().water_figures(headcount, holiday, &config);
                self.emit(&figures, || {
                    format!(
                        "{:.1} l, {:.3} kg CO2e, kostnad {:.2}",
                        figures.liters, figures.carbon_kg, figures.cost
                    )
                })
            }
            WaterCommand::SaveWeek {
                week,
                days,
                holidays,
                notes,
                evidence,
            } => {
                let mut inputs = days
                    .iter()
                    .map(|entry| parse_day_entry(entry))
                    .collect::<Result<Vec<_>>>()?;
                inputs.extend(holidays.into_iter().map(WaterDayInput::holiday));

                let mut input = WaterWeekInput::new(week, inputs);
                input.notes = notes;
                input.evidence_url = evidence;

                let report = repo.save_week(&self.actor()?, &input, &self.calculator())?;
                self.emit(&report, || {
                    format!(
                        "Vecka {}: {:.1} l, {:.3} kg CO2e",
                        report.week_start, report.total_liters, report.total_carbon_kg
                    )
                })
            }
            WaterCommand::Summary(period) => {
                let logs = repo.find_all_logs()?;
                let filter = period.filter();
                let summary = WaterSummary {
                    liters: summarize_period(&logs, &filter, self.today, |l| l.water_liters),
                    carbon_kg: summarize_period(&logs, &filter, self.today, |l| l.carbon_kg),
                    cost: summarize_period(&logs, &filter, self.today, |l| l.cost),
                };
                self.emit(&summary, || {
                    format!(
                        "{} dagar\nVatten: {:.1} l (i år {:.1}, snitt/mån {:.1})\nCO2e: {:.3} kg (i år {:.3})\nKostnad: {:.2} (i år {:.2})",
                        summary.liters.count,
                        summary.liters.period_total,
                        summary.liters.ytd_total,
                        summary.liters.monthly_average,
                        summary.carbon_kg.period_total,
                        summary.carbon_kg.ytd_total,
                        summary.cost.period_total,
                        summary.cost.ytd_total
                    )
                })
            }
            WaterCommand::Config(args) => {
                let mut config = repo.load_config()?;
                let changed = [
                    args.hand_wash_frequency.map(|v| config.hand_wash_frequency_per_day = v),
                    args.hand_wash_volume.map(|v| config.hand_wash_volume_liters = v),
                    args.toilet_flush_frequency.map(|v| config.toilet_flush_frequency_per_day = v),
                    args.toilet_flush_volume.map(|v| config.toilet_flush_volume_liters = v),
                    args.emission_factor.map(|v| config.emission_factor_per_cubic_meter = v),
                    args.cost.map(|v| config.cost_per_cubic_meter = v),
                ]
                .iter()
                .any(Option::is_some);

                if changed {
                    repo.save_config(&self.actor()?, &config)?;
                }
                self.emit(&config, || format!("{:#?}", config))
            }
        }
    }

    fn electricity(&self, action: ElectricityCommand) -> Result<()> {
        let repo = self.db.electricity();

        match action {
            ElectricityCommand::Preview { kwh } => {
                let config = repo.load_config_or_default();
                let kwh = self.calculator().policy().apply(parse_lenient(&kwh));
                let figures = calculator::electricity(kwh, &config);
                self.emit(&figures, || {
                    format!(
                        "{:.1} kWh, {:.3} kg CO2e, kostnad {:.2}",
                        figures.company_kwh, figures.carbon_kg, figures.cost
                    )
                })
            }
            ElectricityCommand::Save {
                start,
                end,
                kwh,
                notes,
                evidence,
            } => {
                let mut input = ElectricityInput::new(start, end, parse_lenient(&kwh));
                input.notes = notes;
                input.evidence_url = evidence;

                let log = repo.save(&self.actor()?, &input, &self.calculator())?;
                self.emit(&log, || {
                    format!(
                        "{} - {}: {:.1} kWh, {:.3} kg CO2e",
                        log.start_date, log.end_date, log.company_kwh, log.carbon_kg
                    )
                })
            }
            ElectricityCommand::Summary(period) => {
                let logs = repo.find_all()?;
                let filter = period.filter();
                let summary = ElectricitySummary {
                    company_kwh: summarize_period(&logs, &filter, self.today, |l| l.company_kwh),
                    carbon_kg: summarize_period(&logs, &filter, self.today, |l| l.carbon_kg),
                    cost: summarize_period(&logs, &filter, self.today, |l| l.cost),
                };
                self.emit(&summary, || {
                    format!(
                        "{} perioder\nEl: {:.1} kWh (i år {:.1}, snitt/mån {:.1})\nCO2e: {:.3} kg (i år {:.3})\nKostnad: {:.2} (i år {:.2})",
                        summary.company_kwh.count,
                        summary.company_kwh.period_total,
                        summary.company_kwh.ytd_total,
                        summary.company_kwh.monthly_average,
                        summary.carbon_kg.period_total,
                        summary.carbon_kg.ytd_total,
                        summary.cost.period_total,
                        summary.cost.ytd_total
                    )
                })
            }
            ElectricityCommand::Config(args) => {
                let mut config = repo.load_config()?;
                let changed = [
                    args.allocation.map(|v| config.allocation_percentage = v),
                    args.emission_factor.map(|v| config.emission_factor_per_kwh = v),
                    args.cost.map(|v| config.cost_per_kwh = v),
                ]
                .iter()
                .any(Option::is_some);

                if changed {
                    repo.save_config(&self.actor()?, &config)?;
                }
                self.emit(&config, || format!("{:#?}", config))
            }
        }
    }

    fn travel(&self, action: TravelCommand) -> Result<()> {
        let repo = self.db.travel();

        match action {
            TravelCommand::AddActivity {
                title,
                date,
                description,
            } => {
                let mut activity = TravelActivity::new(title, date);
                activity.description = description;
                repo.create_activity(&self.actor()?, &mut activity)?;
                self.emit(&activity, || {
                    format!("Aktivitet {} skapad", activity.id.unwrap_or_default())
                })
            }
            TravelCommand::AddSegment {
                activity,
                date,
                mode,
                subtype,
                km,
                passengers,
                origin,
                destination,
            } => {
                let mut input = TravelSegmentInput::new(date, mode, parse_lenient(&km));
                input.transport_subtype = subtype;
                input.passenger_count = passengers;
                input.origin = origin;
                input.destination = destination;

                let log = repo.add_segment(&self.actor()?, activity, &input, &self.calculator())?;
                self.emit(&log, || {
                    format!(
                        "{} {:.1} km: {:.3} kg CO2e",
                        log.transport_mode.display_name(),
                        log.distance_km,
                        log.emission_kg
                    )
                })
            }
            TravelCommand::Activities => {
                let mut rows = Vec::new();
                for activity in repo.find_all_activities()? {
                    let totals = match activity.id {
                        Some(id) => repo.activity_totals(id)?,
                        None => Default::default(),
                    };
                    rows.push((activity, totals));
                }
                self.emit(&rows, || {
                    rows.iter()
                        .map(|(a, t)| {
                            format!(
                                "{:>4}  {}  {:<30} {:>3} sträckor {:>8.1} km {:>8.3} kg",
                                a.id.unwrap_or_default(),
                                a.activity_date,
                                a.title,
                                t.segments,
                                t.distance_km,
                                t.emission_kg
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            TravelCommand::Summary(period) => {
                let logs = repo.find_all_logs()?;
                let filter = period.filter();
                let summary = TravelSummary {
                    distance_km: summarize_period(&logs, &filter, self.today, |l| l.distance_km),
                    emission_kg: summarize_period(&logs, &filter, self.today, |l| l.emission_kg),
                };
                self.emit(&summary, || {
                    format!(
                        "{} sträckor\nAvstånd: {:.1} km (i år {:.1})\nCO2e: {:.3} kg (i år {:.3}, snitt/mån {:.3})",
                        summary.distance_km.count,
                        summary.distance_km.period_total,
                        summary.distance_km.ytd_total,
                        summary.emission_kg.period_total,
                        summary.emission_kg.ytd_total,
                        summary.emission_kg.monthly_average
                    )
                })
            }
            TravelCommand::Factor {
                mode,
                subtype,
                value,
            } => {
                let mut config = repo.load_config()?;
                config.set_factor(mode, subtype.as_deref(), value);
                repo.save_config(&self.actor()?, &config)?;
                self.emit(&config, || {
                    config
                        .factors
                        .iter()
                        .map(|(k, v)| format!("{:<20} {}", k, v))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
        }
    }

    fn asset(&self, action: AssetCommand) -> Result<()> {
        let repo = self.db.assets();

        let asset = match action {
            AssetCommand::Create {
                code,
                name,
                category,
                location,
                purchase_value,
                current_value,
            } => {
                let mut asset = Asset::new(code, name, category);
                asset.location = location;
                asset.purchase_value = purchase_value;
                asset.current_value = current_value;
                repo.create(&self.actor()?, &mut asset)?;
                asset
            }
            AssetCommand::Assign { code, to, note } => {
                let holder_id = self.profile_id(&to)?;
                repo.assign(&self.actor()?, self.asset_id(&code)?, holder_id, note.as_deref())?
            }
            AssetCommand::Return { code, note } => {
                repo.return_asset(&self.actor()?, self.asset_id(&code)?, note.as_deref())?
            }
            AssetCommand::Condition {
                code,
                condition,
                note,
            } => repo.update_condition(
                &self.actor()?,
                self.asset_id(&code)?,
                condition,
                note.as_deref(),
            )?,
            AssetCommand::Status { code, status, note } => {
                repo.set_status(&self.actor()?, self.asset_id(&code)?, status, note.as_deref())?
            }
            AssetCommand::Values {
                code,
                purchase_value,
                current_value,
                note,
            } => repo.update_values(
                &self.actor()?,
                self.asset_id(&code)?,
                purchase_value,
                current_value,
                note.as_deref(),
            )?,
            AssetCommand::Service {
                code,
                date,
                description,
                cost,
                vendor,
            } => {
                let mut record = MaintenanceRecord::new(self.asset_id(&code)?, date, description, cost);
                record.vendor = vendor;
                self.db.maintenance().create(&self.actor()?, &mut record)?;
                let total = self.db.maintenance().total_cost(record.asset_id)?;
                return self.emit(&record, || {
                    format!("Service registrerad för {} (totalt {:.2})", code, total)
                });
            }
            AssetCommand::List { status, holder } => {
                let assets = match (status, holder) {
                    (Some(status), _) => repo.find_by_status(status)?,
                    (None, Some(email)) => repo.find_by_holder(self.profile_id(&email)?)?,
                    (None, None) => repo.find_all()?,
                };
                return self.emit(&assets, || {
                    assets
                        .iter()
                        .map(|a| {
                            format!(
                                "{:<10} {:<30} {:<12} {:<10} {}",
                                a.code,
                                a.name,
                                a.status.display_name(),
                                a.condition.display_name(),
                                a.current_holder_id
                                    .map(|id| id.to_string())
                                    .unwrap_or_else(|| "-".into())
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                });
            }
            AssetCommand::Logs { code } => {
                let logs = repo.logs_for(self.asset_id(&code)?)?;
                return self.emit(&logs, || {
                    logs.iter()
                        .map(|l| {
                            format!(
                                "{}  {:<12} {:?} -> {:?}  {}",
                                l.created_at.as_deref().unwrap_or(""),
                                l.kind,
                                l.previous_holder_id,
                                l.new_holder_id,
                                l.note.as_deref().unwrap_or("")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                });
            }
            AssetCommand::Delete { code } => {
                repo.delete(&self.actor()?, self.asset_id(&code)?)?;
                return self.emit(&code, || format!("{} borttagen", code));
            }
        };

        self.emit(&asset, || {
            format!(
                "{} {}: {} ({})",
                asset.code,
                asset.name,
                asset.status.display_name(),
                asset.condition.display_name()
            )
        })
    }

    fn petty_cash(&self, action: PettyCashCommand) -> Result<()> {
        let repo = self.db.petty_cash();

        match action {
            PettyCashCommand::Add {
                kind,
                amount,
                category,
                date,
                description,
            } => {
                let mut transaction = PettyCashTransaction::new(
                    date.unwrap_or(self.today),
                    kind.into(),
                    amount,
                    category,
                );
                transaction.description = description;
                repo.create(&self.actor()?, &mut transaction)?;

                let balance = balance(&repo.find_all()?);
                self.emit(&transaction, || {
                    format!(
                        "{} {:.2} registrerad, saldo {:.2}",
                        transaction.kind.display_name(),
                        transaction.amount,
                        balance
                    )
                })
            }
            PettyCashCommand::List(period) => {
                let filter = period.filter();
                let transactions: Vec<_> = repo
                    .find_all()?
                    .into_iter()
                    .filter(|t| filter.contains(t.date))
                    .collect();
                self.emit(&transactions, || {
                    transactions
                        .iter()
                        .map(|t| {
                            format!(
                                "{}  {:>10.2}  {:<15} {}",
                                t.date,
                                t.signed_amount(),
                                t.category,
                                t.description.as_deref().unwrap_or("")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            PettyCashCommand::Summary { period, category } => {
                let transactions = repo.find_all()?;
                let expenses = summarize(
                    &transactions,
                    &period.filter(),
                    self.today,
                    |t| t.amount,
                    |t| {
                        t.kind == CashKind::Expense
                            && category.as_deref().map_or(true, |c| t.category == c)
                    },
                );
                let summary = CashSummary {
                    balance: balance(&transactions),
                    expenses,
                };
                self.emit(&summary, || {
                    format!(
                        "Saldo: {:.2}\nUtgifter: {:.2} ({} st)\nI år: {:.2}, snitt/mån {:.2}",
                        summary.balance,
                        summary.expenses.period_total,
                        summary.expenses.count,
                        summary.expenses.ytd_total,
                        summary.expenses.monthly_average
                    )
                })
            }
        }
    }

    fn lead(&self, action: LeadCommand) -> Result<()> {
        let repo = self.db.pipeline();

        match action {
            LeadCommand::Create {
                company,
                contact,
                value,
            } => {
                let actor = self.actor()?;
                let mut lead = Lead::new(company, value);
                lead.contact_name = contact;
                lead.owner_id = actor.id;
                repo.create(&actor, &mut lead)?;
                self.emit(&lead, || {
                    format!("Lead {} skapad", lead.id.unwrap_or_default())
                })
            }
            LeadCommand::Move { id, stage, note } => {
                let lead = repo.move_stage(&self.actor()?, id, stage, note.as_deref())?;
                self.emit(&lead, || {
                    format!("{}: {}", lead.company_name, lead.stage.display_name())
                })
            }
            LeadCommand::List => {
                let leads = repo.find_all()?;
                self.emit(&leads, || {
                    PipelineStage::all()
                        .iter()
                        .map(|stage| {
                            let names: Vec<&str> = leads
                                .iter()
                                .filter(|l| l.stage == *stage)
                                .map(|l| l.company_name.as_str())
                                .collect();
                            format!("{:<12} {}", stage.display_name(), names.join(", "))
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            LeadCommand::History { id } => {
                let activities = repo.activities(id)?;
                self.emit(&activities, || {
                    activities
                        .iter()
                        .map(|a| {
                            format!(
                                "{}  {} -> {}  {}",
                                a.created_at.as_deref().unwrap_or(""),
                                a.from_stage.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                                a.to_stage,
                                a.note.as_deref().unwrap_or("")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
        }
    }

    fn export(&self, args: ExportArgs) -> Result<()> {
        let report: ReportType = args.report.into();
        let format: ExportFormat = args.format.into();

        let path = match args.out {
            Some(path) => path,
            None => {
                std::fs::create_dir_all(&self.settings.export_directory)
                    .context("Kunde inte skapa exportkatalog")?;
                self.settings
                    .export_directory
                    .join(ExportService::generate_filename(report, format))
            }
        };

        let result = ExportService::new(&self.db).export_report(
            report,
            format,
            &args.period.filter(),
            &path,
        )?;

        #[derive(Serialize)]
        struct Exported<'a> {
            path: &'a std::path::Path,
            rows: usize,
            bytes: u64,
        }

        self.emit(
            &Exported {
                path: &path,
                rows: result.row_count,
                bytes: result.file_size,
            },
            || format!("{} -> {}", result.summary(), path.display()),
        )
    }

    fn user(&self, action: UserCommand) -> Result<()> {
        match action {
            UserCommand::BootstrapAdmin { email, name } => {
                let admin = self.db.profiles().bootstrap_admin(&email, &name)?;
                self.emit(&admin, || format!("Administratör {} skapad", admin.email))
            }
            UserCommand::Create {
                email,
                name,
                role,
                department,
            } => {
                let mut new_user = NewUser::new(email, name, role);
                new_user.department = department;
                let profile = UserAdminService::new(&self.db).create_user(&self.actor()?, new_user)?;
                self.emit(&profile, || {
                    format!("{} skapad ({})", profile.email, profile.role.display_name())
                })
            }
            UserCommand::List => {
                let profiles = self.db.profiles().find_all()?;
                self.emit(&profiles, || {
                    profiles
                        .iter()
                        .map(|p| {
                            format!(
                                "{:<30} {:<25} {:<14} {}",
                                p.email,
                                p.full_name,
                                p.role.display_name(),
                                if p.is_active { "aktiv" } else { "inaktiv" }
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            UserCommand::Deactivate { email } => {
                let target = self.profile_id(&email)?;
                self.db.profiles().set_active(&self.actor()?, target, false)?;
                self.emit(&email, || format!("{} inaktiverad", email))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from([
            "opsboard",
            "-vv",
            "--json",
            "--as",
            "boss@example.com",
            "asset",
            "assign",
            "IT-001",
            "--to",
            "anna@example.com",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert_eq!(cli.as_user.as_deref(), Some("boss@example.com"));
        assert!(matches!(
            cli.command,
            Command::Asset {
                action: AssetCommand::Assign { .. }
            }
        ));
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::parse_from([
            "opsboard",
            "export",
            "petty-cash",
            "--format",
            "csv",
            "--from",
            "2024-01-01",
        ]);
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.report, ReportArg::PettyCash);
                assert_eq!(args.format, FormatArg::Csv);
                assert_eq!(args.period.from, NaiveDate::from_ymd_opt(2024, 1, 1));
            }
            other => panic!("fel kommando: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let result = Cli::try_parse_from([
            "opsboard", "travel", "factor", "--mode", "rocket", "--value", "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_day_entry() {
        let day = parse_day_entry("2024-05-06=12").unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(day.headcount, 12);

        assert_eq!(parse_day_entry("2024-05-06=tolv").unwrap().headcount, 0);
        assert_eq!(parse_day_entry("2024-05-06=12,7").unwrap().headcount, 12);
        assert!(parse_day_entry("2024-05-06").is_err());
    }
}
