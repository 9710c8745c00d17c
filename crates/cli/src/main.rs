use api_shared::{
    AtRiskRes, ClassificationRes, ClassifiedMeasurementRes, CreateMeasurementReq, DashboardRes,
    NearbyRes, OperatorsRes, RecentRes, RegionsRes, ReportQuery,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use muac_core::store::FileStore;
use muac_core::{
    data_dir_from_env_value, run_label_migration, thresholds_from_env_values, CoreConfig,
    CoreError, Location, MeasurementService, Operator, Patient, ProximityService, RecordId,
    Region, ReportService, Stores,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "muac")]
#[command(about = "MUAC nutrition surveillance CLI")]
struct Cli {
    /// Data directory (defaults to MUAC_DATA_DIR, then ./muac_data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a value without storing it
    Classify {
        /// Arm circumference in centimetres
        value: f64,
    },
    /// Record and classify a measurement
    Record {
        /// Arm circumference in centimetres
        value: f64,
        /// Patient id
        patient_id: String,
        /// Operator id
        operator_id: String,
        /// Free-text note (max 500 characters)
        #[arg(long)]
        note: Option<String>,
    },
    /// Show a measurement with its labels
    Show {
        /// Measurement id
        id: String,
    },
    /// Re-point a measurement at the labels for the current thresholds
    Reclassify {
        /// Measurement id
        id: String,
    },
    /// Headline counts and latest-measurement distribution
    Dashboard(ReportArgs),
    /// Distribution per region
    Regions(ReportArgs),
    /// Most recent measurements
    Recent(ReportArgs),
    /// Patients whose latest measurement is moderate or severe
    AtRisk(ReportArgs),
    /// Activity per operator
    Operators(ReportArgs),
    /// Locations near a coordinate
    Nearby {
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        lng: f64,
        /// Search radius in kilometres (default 10)
        #[arg(long)]
        radius_km: Option<f64>,
    },
    /// Backfill severity codes on legacy label rows
    MigrateLabels,
    /// Register a region
    AddRegion {
        /// Region name
        name: String,
        /// Existing id to update (a new id is generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Register an operator
    AddOperator {
        /// Operator name
        name: String,
        #[arg(long)]
        region_id: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Register a patient
    AddPatient {
        /// Patient name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        region_id: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Register a location
    AddLocation {
        /// Location name
        name: String,
        /// Latitude as stored text
        #[arg(allow_negative_numbers = true)]
        latitude: String,
        /// Longitude as stored text
        #[arg(allow_negative_numbers = true)]
        longitude: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        id: Option<String>,
    },
}

/// Filters shared by the report commands.
#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    region_id: Option<String>,
    #[arg(long)]
    operator_id: Option<String>,
    /// Window in days
    #[arg(long)]
    days: Option<u32>,
    /// Maximum rows
    #[arg(long)]
    limit: Option<usize>,
}

impl From<ReportArgs> for ReportQuery {
    fn from(args: ReportArgs) -> Self {
        ReportQuery {
            region_id: args.region_id,
            operator_id: args.operator_id,
            days: args.days,
            limit: args.limit,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_optional_id(raw: Option<String>) -> Result<Option<RecordId>, CoreError> {
    raw.as_deref().map(RecordId::parse).transpose()
}

fn id_or_new(raw: Option<String>) -> Result<RecordId, CoreError> {
    Ok(parse_optional_id(raw)?.unwrap_or_else(RecordId::new))
}

fn load_config(data_dir: Option<PathBuf>) -> Result<CoreConfig, CoreError> {
    let data_dir = data_dir
        .unwrap_or_else(|| data_dir_from_env_value(std::env::var("MUAC_DATA_DIR").ok()));
    let thresholds = thresholds_from_env_values(
        std::env::var("MUAC_SEVERE_THRESHOLD").ok(),
        std::env::var("MUAC_NORMAL_THRESHOLD").ok(),
        std::env::var("MUAC_MAX_VALUE").ok(),
    )?;
    Ok(CoreConfig::new(data_dir, thresholds))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Run `muac --help` for usage.");
        return Ok(());
    };

    let cfg = Arc::new(load_config(cli.data_dir)?);
    let store = Arc::new(FileStore::open(cfg.data_dir())?);
    let stores = Stores::file(store.clone())?;

    match command {
        Commands::Classify { value } => {
            let thresholds = cfg.thresholds();
            if !thresholds.is_valid_value(value) {
                return Err(CoreError::InvalidInput(format!(
                    "value must be greater than 0 and at most {}",
                    thresholds.max_value()
                ))
                .into());
            }
            print_json(&ClassificationRes::from(thresholds.classify(value)))?;
        }
        Commands::Record {
            value,
            patient_id,
            operator_id,
            note,
        } => {
            let input = CreateMeasurementReq {
                value,
                note,
                patient_id,
                operator_id,
            }
            .into_new_measurement()?;
            let service = MeasurementService::new(cfg.clone(), stores);
            let result = service.create_classified(input)?;
            print_json(&ClassifiedMeasurementRes::from(result))?;
        }
        Commands::Show { id } => {
            let service = MeasurementService::new(cfg.clone(), stores);
            let result = service.get_classified(RecordId::parse(&id)?)?;
            print_json(&ClassifiedMeasurementRes::from(result))?;
        }
        Commands::Reclassify { id } => {
            let service = MeasurementService::new(cfg.clone(), stores);
            let result = service.reclassify(RecordId::parse(&id)?)?;
            print_json(&ClassifiedMeasurementRes::from(result))?;
        }
        Commands::Dashboard(args) => {
            let filters = ReportQuery::from(args).to_filters()?;
            let summary = ReportService::new(cfg.clone(), stores).dashboard(&filters)?;
            print_json(&DashboardRes::from(summary))?;
        }
        Commands::Regions(args) => {
            let filters = ReportQuery::from(args).to_filters()?;
            let rows = ReportService::new(cfg.clone(), stores).by_region(&filters)?;
            print_json(&RegionsRes {
                regions: rows.into_iter().map(Into::into).collect(),
            })?;
        }
        Commands::Recent(args) => {
            let filters = ReportQuery::from(args).to_filters()?;
            let rows = ReportService::new(cfg.clone(), stores).recent(&filters)?;
            print_json(&RecentRes {
                measurements: rows.into_iter().map(Into::into).collect(),
            })?;
        }
        Commands::AtRisk(args) => {
            let filters = ReportQuery::from(args).to_filters()?;
            let report = ReportService::new(cfg.clone(), stores).at_risk(&filters)?;
            print_json(&AtRiskRes::from(report))?;
        }
        Commands::Operators(args) => {
            let filters = ReportQuery::from(args).to_filters()?;
            let rows = ReportService::new(cfg.clone(), stores).operator_activity(&filters)?;
            print_json(&OperatorsRes {
                operators: rows.into_iter().map(Into::into).collect(),
            })?;
        }
        Commands::Nearby {
            lat,
            lng,
            radius_km,
        } => {
            let rows = ProximityService::new(stores.locations).nearby(lat, lng, radius_km)?;
            print_json(&NearbyRes {
                locations: rows.into_iter().map(Into::into).collect(),
            })?;
        }
        Commands::MigrateLabels => {
            let report = run_label_migration(&stores)?;
            print_json(&report)?;
        }
        Commands::AddRegion { name, id } => {
            let region = Region {
                id: id_or_new(id)?,
                name,
            };
            store.add_region(region.clone())?;
            println!("Saved region {} ({})", region.name, region.id);
        }
        Commands::AddOperator {
            name,
            region_id,
            id,
        } => {
            let operator = Operator {
                id: id_or_new(id)?,
                name,
                region_id: parse_optional_id(region_id)?,
            };
            store.add_operator(operator.clone())?;
            println!("Saved operator {} ({})", operator.name, operator.id);
        }
        Commands::AddPatient {
            name,
            birth_date,
            region_id,
            id,
        } => {
            let birth_date = birth_date
                .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                .transpose()?;
            let patient = Patient {
                id: id_or_new(id)?,
                name,
                birth_date,
                region_id: parse_optional_id(region_id)?,
            };
            store.add_patient(patient.clone())?;
            println!("Saved patient {} ({})", patient.name, patient.id);
        }
        Commands::AddLocation {
            name,
            latitude,
            longitude,
            description,
            id,
        } => {
            let location = Location {
                id: id_or_new(id)?,
                name,
                latitude,
                longitude,
                description,
            };
            store.add_location(location.clone())?;
            println!("Saved location {} ({})", location.name, location.id);
        }
    }

    Ok(())
}
