//! Command surface for the traffic-violation record manager.
//!
//! Embedders can drive it through [`run_cli`] for a parsed command line, or
//! [`run_command`] against an already loaded and authenticated
//! [`AppConfig`].

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use traffic_violations_core::{
    AppConfig, AuthCheck, FieldSchema, ViolationId, ViolationRecord, ID_LABEL,
};
use traffic_violations_store_sqlite::{initialize_schema, ViolationService};

/// Config file read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "traffic_violations.toml";

/// Environment prefix for overrides, e.g. `TRAFFIC_VIOLATIONS__AUTH__PASSWORD`.
pub const ENV_PREFIX: &str = "TRAFFIC_VIOLATIONS";

const TABLE_LABELS: [&str; 5] = [
    "Plate Number",
    "Driver Name",
    "Charge",
    "Year",
    "Penalty Amount",
];

#[derive(Debug, Parser)]
#[command(name = "tv")]
#[command(about = "Traffic violation record manager")]
pub struct Cli {
    /// TOML config file; defaults to `traffic_violations.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
pub struct Credentials {
    #[arg(long, global = true)]
    username: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the violations table if missing.
    Init,
    /// Print the editable fields in schema order.
    Fields,
    /// Check credentials only.
    Login,
    List(OutputArgs),
    Show(ShowArgs),
    Search(SearchArgs),
    /// Add a record from one value per editable field, in schema order.
    Add(RecordArgs),
    /// Replace every editable field of an existing record.
    Update(UpdateArgs),
    Delete(IdArgs),
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(long, default_value = "")]
    term: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    values: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long)]
    id: i64,
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    values: Vec<String>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(long)]
    id: i64,
}

/// Loads configuration, applies the login gate, then runs the command.
///
/// # Errors
/// Returns an error when configuration is invalid, credentials do not match,
/// or the command itself fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    config.validate()?;

    if !matches!(cli.command, Command::Fields) {
        authenticate(&config, &cli.credentials)?;
    }

    run_command(cli.command, &config)
}

/// Runs one command against the configured store. Callers are responsible
/// for authentication. `fields` and `login` never open the store.
///
/// # Errors
/// Returns an error when validation or storage fails, or when `show` names
/// an unknown record.
pub fn run_command(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Fields => {
            print_fields(&FieldSchema::traffic_violation());
            return Ok(());
        }
        Command::Login => {
            println!("authenticated");
            return Ok(());
        }
        _ => {}
    }

    let service = ViolationService::sqlite(config);
    initialize_schema(service.repository().scope(), service.schema())
        .context("failed to initialize violations schema")?;

    match command {
        Command::Fields | Command::Login => {}
        Command::Init => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "database": config.database.path.display().to_string(),
                    "initialized": true,
                }))?
            );
        }
        Command::List(args) => {
            let records = service.get_all_violations()?;
            emit_records(service.schema(), &records, args.json)?;
        }
        Command::Show(args) => {
            let id = ViolationId(args.id);
            let record = service
                .get_violation(id)?
                .ok_or_else(|| anyhow!("no violation record with id {id}"))?;
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&record_json(service.schema(), &record))?
                );
            } else {
                print_record_detail(service.schema(), &record);
            }
        }
        Command::Search(args) => {
            let records = service.search_violations(&args.term)?;
            emit_records(service.schema(), &records, args.json)?;
        }
        Command::Add(args) => {
            let id = service.create_violation(&args.values)?;
            println!("{}", serde_json::to_string_pretty(&json!({ "id": id }))?);
        }
        Command::Update(args) => {
            let id = ViolationId(args.id);
            let updated = service.update_violation(id, &args.values)?;
            if updated == 0 {
                warn!(%id, "update matched no record");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "id": id, "updated": updated }))?
            );
        }
        Command::Delete(args) => {
            let id = ViolationId(args.id);
            let deleted = service.delete_violation(id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "id": id, "deleted": deleted }))?
            );
        }
    }

    Ok(())
}

/// Layers the optional TOML file under `TRAFFIC_VIOLATIONS__*` environment
/// overrides on top of built-in defaults. An explicitly named file must exist.
///
/// # Errors
/// Returns an error when a source cannot be read or does not deserialize.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (file, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    debug!(path = %file.display(), required, "loading configuration");

    config::Config::builder()
        .add_source(config::File::from(file).required(required))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .and_then(|settings| settings.try_deserialize::<AppConfig>())
        .with_context(|| format!("failed to load configuration from {}", file.display()))
}

fn authenticate(config: &AppConfig, credentials: &Credentials) -> Result<()> {
    let username = credentials.username.as_deref().unwrap_or_default();
    let password = credentials.password.as_deref().unwrap_or_default();

    if AuthCheck::from_config(config).authenticate(username, password) {
        Ok(())
    } else {
        warn!(username, "login rejected");
        bail!("invalid username or password")
    }
}

fn emit_records(schema: &FieldSchema, records: &[ViolationRecord], as_json: bool) -> Result<()> {
    if as_json {
        let rows = records
            .iter()
            .map(|record| record_json(schema, record))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_record_table(schema, records);
    }
    Ok(())
}

fn record_json(schema: &FieldSchema, record: &ViolationRecord) -> Value {
    let mut object = Map::new();
    object.insert(ID_LABEL.to_string(), json!(record.id));
    for (field, value) in schema.fields().iter().zip(&record.values) {
        object.insert(field.label.to_string(), Value::String(value.clone()));
    }
    Value::Object(object)
}

fn print_fields(schema: &FieldSchema) {
    println!("{:<4} {:<24} {:<24} kind", "pos", "label", "column");
    println!("{}", "-".repeat(64));
    for (position, field) in schema.fields().iter().enumerate() {
        println!(
            "{:<4} {:<24} {:<24} {}",
            position + 1,
            field.label,
            field.column,
            field.kind.as_str()
        );
    }
}

fn print_record_table(schema: &FieldSchema, records: &[ViolationRecord]) {
    println!(
        "{:<8} {:<14} {:<24} {:<16} {:<6} {:<14}",
        ID_LABEL, TABLE_LABELS[0], TABLE_LABELS[1], TABLE_LABELS[2], TABLE_LABELS[3], TABLE_LABELS[4]
    );
    println!("{}", "-".repeat(87));

    for record in records {
        let cell = |label: &str| record.value(schema, label).unwrap_or_default();
        println!(
            "{:<8} {:<14} {:<24} {:<16} {:<6} {:<14}",
            record.id.0,
            cell(TABLE_LABELS[0]),
            cell(TABLE_LABELS[1]),
            cell(TABLE_LABELS[2]),
            cell(TABLE_LABELS[3]),
            cell(TABLE_LABELS[4])
        );
    }
    println!("{} record(s)", records.len());
}

fn print_record_detail(schema: &FieldSchema, record: &ViolationRecord) {
    println!("{ID_LABEL:<24} {}", record.id);
    for (field, value) in schema.fields().iter().zip(&record.values) {
        println!("{:<24} {}", field.label, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn parse(args: &[&str]) -> Cli {
        match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(err) => panic!("failed to parse {args:?}: {err}"),
        }
    }

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err:#}"),
        }
    }

    #[test]
    fn global_options_are_accepted_after_the_subcommand() {
        let cli = parse(&[
            "tv", "list", "--json", "--db", "x.sqlite3", "--username", "admin", "--password", "pw",
        ]);
        assert_eq!(cli.db, Some(PathBuf::from("x.sqlite3")));
        assert_eq!(cli.credentials.username.as_deref(), Some("admin"));
        assert!(matches!(cli.command, Command::List(OutputArgs { json: true })));
    }

    #[test]
    fn record_values_accept_leading_hyphens() {
        let cli = parse(&["tv", "update", "--id", "4", "ABC", "-3.5"]);
        match cli.command {
            Command::Update(args) => {
                assert_eq!(args.id, 4);
                assert_eq!(args.values, vec!["ABC".to_string(), "-3.5".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn add_requires_values() {
        assert!(Cli::try_parse_from(["tv", "add"]).is_err());
    }

    #[test]
    fn search_term_defaults_to_empty() {
        match parse(&["tv", "search"]).command {
            Command::Search(args) => assert!(args.term.is_empty()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_default_config_file_yields_defaults() {
        let config = must(load_config(None));
        assert_eq!(config.auth.username, AppConfig::default().auth.username);
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let path = std::env::temp_dir().join(format!("tv-missing-{}.toml", Ulid::new()));
        assert!(load_config(Some(path.as_path())).is_err());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("tv-config-{}.toml", Ulid::new()));
        let written = std::fs::write(
            &path,
            "[database]\npath = \"/tmp/custom.sqlite3\"\n\n[auth]\nusername = \"officer\"\n",
        );
        if let Err(err) = written {
            panic!("failed to write config fixture: {err}");
        }

        let config = load_config(Some(path.as_path()));
        let _ = std::fs::remove_file(path);
        let config = must(config);

        assert_eq!(config.database.path, PathBuf::from("/tmp/custom.sqlite3"));
        assert_eq!(config.auth.username, "officer");
        assert_eq!(config.auth.password, AppConfig::default().auth.password);
    }

    #[test]
    fn wrong_credentials_are_rejected() {
        let config = AppConfig::default();
        let credentials = Credentials {
            username: Some("admin".to_string()),
            password: Some("nope".to_string()),
        };
        let err = match authenticate(&config, &credentials) {
            Ok(()) => panic!("expected rejection"),
            Err(err) => err,
        };
        assert_eq!(err.to_string(), "invalid username or password");

        let missing = Credentials {
            username: None,
            password: None,
        };
        assert!(authenticate(&config, &missing).is_err());
    }

    #[test]
    fn record_json_keys_follow_schema_order() {
        let schema = FieldSchema::traffic_violation();
        let record = ViolationRecord {
            id: ViolationId(3),
            values: schema
                .editable_labels()
                .iter()
                .map(|label| format!("{label} value"))
                .collect(),
        };

        let value = record_json(&schema, &record);
        let keys: Vec<&str> = match value.as_object() {
            Some(object) => object.keys().map(String::as_str).collect(),
            None => panic!("expected JSON object"),
        };
        assert_eq!(keys, schema.labels());
        assert_eq!(value[ID_LABEL], json!(3));
        assert_eq!(value["Charge"], json!("Charge value"));
    }
}
