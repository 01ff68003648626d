//! dbseed interchange - loading CSV files into a live schema
//!
//! The importer orders tables so parents load before children, maps CSV
//! columns onto table columns and synthesizes any parent rows a child
//! references but the database does not hold yet.
//!
//! # Example
//!
//! ```rust,ignore
//! let schema = client.get_schema_info("public").await?;
//! let importer = CsvImporter::new(client.clone(), schema);
//! let summary = importer.import_csv_files(Path::new("./testdata"), true).await?;
//! println!("{} rows added", summary.total_rows_added());
//! ```

mod csv_import;

pub use csv_import::{
    CsvImportError, CsvImportProgress, CsvImportProgressCallback, CsvImportResult, CsvImporter,
    ImportSummary, discover_csv_files,
};
