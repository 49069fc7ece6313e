use std::collections::HashMap;
use std::path::Path;

use crate::experiment::config_reader::ManagerSource;
use crate::experiment::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Header cells may start with a byte order mark when the file was exported from a
/// spreadsheet program.
pub fn clean_header_cell(s: &str) -> String {
    s.trim_start_matches('\u{feff}').trim().to_string()
}

/// Positions of the manager columns in a file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ManagerColumns {
    pub id: usize,
    pub preference: usize,
    pub stated_amount: Option<usize>,
    pub correct_amount: Option<usize>,
    pub threshold: Option<usize>,
}

impl ManagerColumns {
    /// Finds the columns in the header. The id and the preference columns are
    /// mandatory.
    pub fn locate(
        header: &[Option<String>],
        source: &ManagerSource,
        path: &str,
    ) -> ExpResult<ManagerColumns> {
        let col_names: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .filter_map(|(idx, x)| x.as_deref().map(|s| (s, idx)))
            .collect();
        debug!("locate: path: {:?} col_names: {:?}", path, col_names);

        let required = |name: &str| -> ExpResult<usize> {
            col_names
                .get(name)
                .copied()
                .context(MissingColumnSnafu { column: name, path })
        };
        let optional = |name: &str| -> Option<usize> {
            let res = col_names.get(name).copied();
            if res.is_none() {
                info!(
                    "{}: no column {:?}, the default value will be used",
                    simplify_file_name(path),
                    name
                );
            }
            res
        };

        Ok(ManagerColumns {
            id: required(source.id_column())?,
            preference: required(source.preference_column())?,
            stated_amount: optional(source.stated_amount_column()),
            correct_amount: optional(source.correct_amount_column()),
            threshold: optional(source.threshold_column()),
        })
    }

    /// Turns one row into a manager. Rows without an id or with an unknown
    /// preference are skipped.
    pub fn record(&self, row: &[Option<String>], path: &str, lineno: usize) -> Option<ManagerRecord> {
        let cell = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| row.get(i))
                .cloned()
                .flatten()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let id = match cell(Some(self.id)) {
            Some(id) => id,
            None => {
                warn!(
                    "{}:{}: skipping row without manager id",
                    simplify_file_name(path),
                    lineno
                );
                return None;
            }
        };
        let raw_preference = cell(Some(self.preference)).unwrap_or_default();
        let preference = match Preference::parse(&raw_preference) {
            Some(p) => p,
            None => {
                warn!(
                    "{}:{}: skipping manager {}: unknown preference {:?}",
                    simplify_file_name(path),
                    lineno,
                    id,
                    raw_preference
                );
                return None;
            }
        };
        let threshold_integer = cell(self.threshold).and_then(|s| match parse_integer(&s) {
            Some(x) => Some(x),
            None => {
                warn!(
                    "{}:{}: manager {}: cannot read threshold {:?}, using the default",
                    simplify_file_name(path),
                    lineno,
                    id,
                    s
                );
                None
            }
        });

        Some(ManagerRecord {
            id,
            preference,
            stated_amount: cell(self.stated_amount),
            correct_amount: cell(self.correct_amount),
            threshold_integer,
        })
    }
}

/// Integers may be written as floats by spreadsheet programs ("8.0").
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<Option<String>> {
        cols.iter().map(|s| Some(s.to_string())).collect()
    }

    fn row(cells: &[&str]) -> Vec<Option<String>> {
        cells.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn optional_columns_can_be_missing() {
        let source = ManagerSource::new("csv", "m.csv");
        let cols = ManagerColumns::locate(
            &header(&["main1playerprefer", "x", "participantid_in_session"]),
            &source,
            "m.csv",
        )
        .unwrap();
        assert_eq!(cols.id, 2);
        assert_eq!(cols.preference, 0);
        assert_eq!(cols.threshold, None);
        let rec = cols.record(&row(&["Right", "", "7"]), "m.csv", 2).unwrap();
        assert_eq!(rec, ManagerRecord::new("7", Preference::Right));
    }

    #[test]
    fn missing_preference_column_is_an_error() {
        let source = ManagerSource::new("csv", "m.csv");
        let res = ManagerColumns::locate(&header(&["participantid_in_session"]), &source, "m.csv");
        assert!(matches!(
            res,
            Err(ExperimentError::MissingColumn { ref column, .. }) if column == "main1playerprefer"
        ));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let source = ManagerSource::new("csv", "m.csv");
        let cols = ManagerColumns::locate(
            &header(&[
                "participantid_in_session",
                "main1playerprefer",
                "main1playerthreshold_integer",
            ]),
            &source,
            "m.csv",
        )
        .unwrap();
        assert_eq!(cols.record(&row(&["1", "left", "8"]), "m.csv", 2), None);
        assert_eq!(cols.record(&row(&["", "Left", "8"]), "m.csv", 3), None);
        let rec = cols.record(&row(&["3", " Left ", "6.0"]), "m.csv", 4).unwrap();
        assert_eq!(rec.threshold_integer, Some(6));
        let rec = cols.record(&row(&["4", "Left", "six"]), "m.csv", 5).unwrap();
        assert_eq!(rec.threshold_or_default(), 8);
        // Short rows read as empty cells.
        let rec = cols.record(&row(&["5", "Right"]), "m.csv", 6).unwrap();
        assert_eq!(rec.threshold_integer, None);
    }

    #[test]
    fn header_cells_are_cleaned() {
        assert_eq!(
            clean_header_cell("\u{feff}participantid_in_session "),
            "participantid_in_session"
        );
        assert_eq!(simplify_file_name("/a/b/managers.csv"), "managers.csv");
    }
}
