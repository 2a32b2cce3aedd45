use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::import::MAX_SHEET_ROWS;
use crate::util::parse_date_arg;
use crate::workbook::DEFAULT_MAX_FILE_SIZE;

#[derive(Parser, Debug)]
#[command(
    name = "xray",
    version,
    about = "Import and manage METRC lab-testing invoice records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a spreadsheet, or every spreadsheet in a directory
    Import(ImportArgs),
    #[command(subcommand)]
    Records(RecordsCommand),
    Stats(StatsArgs),
    /// Write the (filtered) records to an .xlsx or .csv file
    Export(ExportArgs),
    /// Show upload history, newest first
    Uploads(UploadsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "XRAY_DB_PATH", default_value = "data/xray-records.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Substring match on customer
    #[arg(long)]
    pub customer: Option<String>,

    /// Substring match on METRC tag
    #[arg(long)]
    pub metrc_tag: Option<String>,

    #[arg(long)]
    pub compliance_status: Option<String>,

    #[arg(long, value_parser = parse_date_arg)]
    pub date_from: Option<String>,

    #[arg(long, value_parser = parse_date_arg)]
    pub date_to: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    pub path: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Worksheet to read; defaults to the first one
    #[arg(long)]
    pub sheet: Option<String>,

    /// Last 1-based sheet row that will be read
    #[arg(long, default_value_t = MAX_SHEET_ROWS)]
    pub max_rows: usize,

    #[arg(long, env = "XRAY_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    #[arg(long, default_value_t = false)]
    pub strict_headers: bool,

    #[arg(long, default_value_t = false)]
    pub skip_existing_tags: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommand {
    List(ListArgs),
    Show(ShowArgs),
    /// Apply the same field changes to one or more records
    Update(UpdateArgs),
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub id: i64,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(required = true)]
    pub ids: Vec<i64>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub metrc_tag: Option<String>,

    #[arg(long)]
    pub metrc_tag_full: Option<String>,

    #[arg(long)]
    pub apex_invoice_note: Option<String>,

    #[arg(long)]
    pub invoice_to: Option<String>,

    #[arg(long)]
    pub customer: Option<String>,

    #[arg(long)]
    pub invoice_weight: Option<f64>,

    #[arg(long)]
    pub invoice_number: Option<String>,

    #[arg(long)]
    pub paid_date: Option<String>,

    /// A count, or a free-text description of the failed analytes
    #[arg(long)]
    pub tests_failed: Option<String>,

    #[arg(long)]
    pub lab: Option<String>,

    #[arg(long)]
    pub compliance_status: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(required = true)]
    pub ids: Vec<i64>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Destination file; `.csv` writes CSV, anything else xlsx.
    /// Defaults to `xray-records-export-<today>.xlsx`.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Args, Debug, Clone)]
pub struct UploadsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl From<FilterArgs> for crate::model::RecordFilters {
    fn from(args: FilterArgs) -> Self {
        Self {
            customer: args.customer,
            metrc_tag: args.metrc_tag,
            compliance_status: args.compliance_status,
            date_from: args.date_from,
            date_to: args.date_to,
        }
    }
}
