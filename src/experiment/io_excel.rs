use calamine::DataType;

use crate::experiment::config_reader::ManagerSource;
use crate::experiment::io_common::{clean_header_cell, ManagerColumns};
use crate::experiment::*;

pub fn read_excel_managers(path: &str, source: &ManagerSource) -> ExpResult<Vec<ManagerRecord>> {
    let wrange = get_range(path, source)?;

    let mut iter = wrange.rows();
    let header: Vec<Option<String>> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(|dt| match dt {
            DataType::String(s) => Some(clean_header_cell(s)),
            _ => None,
        })
        .collect();
    debug!("read_excel_managers: header: {:?}", header);
    let columns = ManagerColumns::locate(&header, source, path)?;

    let mut res: Vec<ManagerRecord> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let cells: Vec<Option<String>> = row
            .iter()
            .map(|dt| read_cell(dt, path, lineno))
            .collect::<ExpResult<Vec<Option<String>>>>()?;
        debug!("read_excel_managers: lineno: {:?} row: {:?}", lineno, cells);
        if let Some(rec) = columns.record(&cells, path, lineno) {
            res.push(rec);
        }
    }
    Ok(res)
}

fn read_cell(cell: &DataType, path: &str, lineno: usize) -> ExpResult<Option<String>> {
    match cell {
        DataType::String(s) => Ok(Some(s.clone())),
        DataType::Int(i) => Ok(Some(i.to_string())),
        // Ids and amounts are integers, but Excel stores every number as a float.
        DataType::Float(f) if f.fract() == 0.0 => Ok(Some(format!("{}", *f as i64))),
        DataType::Float(f) => Ok(Some(f.to_string())),
        DataType::Bool(b) => Ok(Some(b.to_string())),
        DataType::Empty => Ok(None),
        _ => ExcelWrongCellTypeSnafu {
            path,
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

fn get_range(path: &str, source: &ManagerSource) -> ExpResult<calamine::Range<DataType>> {
    let worksheet_name_o = source.excel_worksheet_name.clone();
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}
