mod cell_access;
mod column_map;
mod composite;
mod orchestrate;
mod row_normalize;
mod run;
mod sheet_walk;

pub use column_map::parse_tests_failed;
pub use composite::is_valid_metrc_tag;
pub use run::run;
pub use sheet_walk::MAX_SHEET_ROWS;
