use serde::Deserialize;

use crate::experiment::*;

/// One row of a responses file: what a participant submitted on each page.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ResponseRow {
    pub participant: u32,
    pub prefer: Option<String>,
    #[serde(rename = "choiceE")]
    pub choice_e: Option<String>,
    #[serde(rename = "choiceM")]
    pub choice_m: Option<String>,
    #[serde(rename = "choiceT")]
    pub choice_t: Option<String>,
    #[serde(rename = "choiceO")]
    pub choice_o: Option<String>,
    pub report_probability: Option<i64>,
    #[serde(default)]
    pub charity_1: Option<String>,
    #[serde(default)]
    pub charity_2: Option<String>,
    #[serde(default)]
    pub dictator_keep: Option<i64>,
}

impl ResponseRow {
    pub fn participant_id(&self) -> ParticipantId {
        ParticipantId(self.participant)
    }

    pub fn preference(&self) -> Option<Preference> {
        self.prefer.as_deref().and_then(Preference::parse)
    }

    /// None when the understanding questions were not answered.
    pub fn answers(&self) -> Option<ComprehensionAnswers> {
        if self.choice_e.is_none()
            && self.choice_m.is_none()
            && self.choice_t.is_none()
            && self.choice_o.is_none()
        {
            return None;
        }
        let s = |x: &Option<String>| x.as_deref().unwrap_or("").trim().to_string();
        Some(ComprehensionAnswers {
            choice_e: s(&self.choice_e),
            choice_m: s(&self.choice_m),
            choice_t: s(&self.choice_t),
            choice_o: s(&self.choice_o),
        })
    }
}

pub fn read_responses(path: &str) -> ExpResult<Vec<ResponseRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut res: Vec<ResponseRow> = Vec::new();
    for (idx, row_r) in rdr.deserialize::<ResponseRow>().enumerate() {
        let lineno = idx + 2;
        let row = row_r.context(CsvLineParseSnafu { path, lineno })?;
        debug!("read_responses: lineno: {:?} row: {:?}", lineno, row);
        res.push(row);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_cells_are_missing_answers() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            b"participant,prefer,choiceE,choiceM,choiceT,choiceO,report_probability\n\
              1,Left,Klee,Kandinsky,Kandinsky,NRA,40\n\
              2,Right,,,,,\n",
        )
        .unwrap();
        f.flush().unwrap();
        let rows = read_responses(f.path().to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].preference(), Some(Preference::Left));
        assert_eq!(
            rows[0].answers(),
            Some(ComprehensionAnswers::new("Klee", "Kandinsky", "Kandinsky", "NRA"))
        );
        assert_eq!(rows[0].report_probability, Some(40));
        assert_eq!(rows[1].answers(), None);
        assert_eq!(rows[1].report_probability, None);
        assert_eq!(rows[0].charity_1, None);
    }

    #[test]
    fn charity_and_dictator_columns_are_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            b"participant,prefer,charity_1,charity_2,report_probability,dictator_keep\n\
              4,Right,NRA,Red Cross,10,7\n",
        )
        .unwrap();
        f.flush().unwrap();
        let rows = read_responses(f.path().to_str().unwrap()).unwrap();
        assert_eq!(rows[0].charity_1.as_deref(), Some("NRA"));
        assert_eq!(rows[0].charity_2.as_deref(), Some("Red Cross"));
        assert_eq!(rows[0].dictator_keep, Some(7));
        assert_eq!(rows[0].answers(), None);
    }
}
