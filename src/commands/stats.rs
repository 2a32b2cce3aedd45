use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::StatsArgs;
use crate::store::{DB_SCHEMA_VERSION, RecordStore, SqliteRecordStore};
use crate::util::write_json_stdout;

pub fn run(args: StatsArgs) -> Result<()> {
    let store = SqliteRecordStore::open(&args.store.db_path)?;
    let stats = store.stats()?;

    info!(
        path = %args.store.db_path.display(),
        schema_version = DB_SCHEMA_VERSION,
        total = stats.total,
        pending = stats.pending,
        passed = stats.passed,
        paid = stats.paid,
        unpaid = stats.unpaid,
        "database status"
    );

    if args.json {
        return write_json_stdout(&stats);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Total records:  {}", stats.total)?;
    writeln!(output, "Pending:        {}", stats.pending)?;
    writeln!(output, "Passed:         {}", stats.passed)?;
    writeln!(output, "Paid:           {}", stats.paid)?;
    writeln!(output, "Unpaid:         {}", stats.unpaid)?;
    output.flush()?;
    Ok(())
}
