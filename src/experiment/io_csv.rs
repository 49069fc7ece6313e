// Primitives for reading CSV files.

use crate::experiment::config_reader::ManagerSource;
use crate::experiment::io_common::{clean_header_cell, ManagerColumns};
use crate::experiment::*;

pub fn read_csv_managers(path: &str, source: &ManagerSource) -> ExpResult<Vec<ManagerRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let header: Vec<Option<String>> = rdr
        .headers()
        .context(CsvLineParseSnafu { path, lineno: 1usize })?
        .iter()
        .map(|s| Some(clean_header_cell(s)))
        .collect();
    debug!("read_csv_managers: header: {:?}", header);
    let columns = ManagerColumns::locate(&header, source, path)?;

    let mut res: Vec<ManagerRecord> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let row: Vec<Option<String>> = line.iter().map(|s| Some(s.to_string())).collect();
        debug!("read_csv_managers: lineno: {:?} row: {:?}", lineno, row);
        if let Some(rec) = columns.record(&row, path, lineno) {
            res.push(rec);
        }
    }
    Ok(res)
}
