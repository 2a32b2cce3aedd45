use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::UploadsArgs;
use crate::store::SqliteRecordStore;
use crate::util::write_json_stdout;

pub fn run(args: UploadsArgs) -> Result<()> {
    let store = SqliteRecordStore::open(&args.store.db_path)?;
    let uploads = store.list_uploads(args.limit)?;
    info!(count = uploads.len(), limit = args.limit, "loaded upload history");

    if args.json {
        return write_json_stdout(&uploads);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Uploads: {}", uploads.len())?;
    for upload in &uploads {
        writeln!(
            output,
            "{}\t{}\t{}\t[{}]\t{} bytes\taccepted={} imported={} failed={}\tsha256={}",
            upload.id,
            upload.uploaded_at,
            upload.filename,
            upload.sheet_name,
            upload.file_size,
            upload.rows_accepted,
            upload.records_imported,
            upload.records_failed,
            upload.sha256,
        )?;
    }
    output.flush()?;
    Ok(())
}
