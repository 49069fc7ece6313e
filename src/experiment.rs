use log::{debug, info, warn};

use manager_matching::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde_json::json;
use serde_json::Value as JSValue;
use std::collections::HashSet;
use text_diff::print_diff;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod io_responses;

use crate::experiment::config_reader::*;
use crate::experiment::io_responses::{read_responses, ResponseRow};

#[derive(Debug, Snafu)]
pub enum ExperimentError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet or no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("{path}, row {lineno}: cannot read cell {content}"))]
    ExcelWrongCellType {
        path: String,
        lineno: usize,
        content: String,
    },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}, line {lineno}: cannot parse line"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("{path}: missing column {column}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("{path}: manager id {id} was already defined"))]
    DuplicateManagerId { id: String, path: String },
    #[snafu(display("Unknown provider {provider} for {path}"))]
    UnknownProvider { provider: String, path: String },

    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Cannot interpret option {field}: {value}"))]
    InvalidRule { field: String, value: String },
    #[snafu(display("Cannot find the directory of the configuration file"))]
    MissingParentDir {},
    #[snafu(display("Session error: {source}"))]
    SessionFailure { source: MatchingErrors },
    #[snafu(display("Difference detected between the session summary and the reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl ExperimentError {
    /// Errors caused by the manager dataset. The session still runs when one of them
    /// occurs, without any manager.
    pub fn is_data_source(&self) -> bool {
        matches!(
            self,
            ExperimentError::OpeningExcel { .. }
                | ExperimentError::EmptyExcel { .. }
                | ExperimentError::ExcelWrongCellType { .. }
                | ExperimentError::CsvOpen { .. }
                | ExperimentError::CsvLineParse { .. }
                | ExperimentError::MissingColumn { .. }
                | ExperimentError::DuplicateManagerId { .. }
                | ExperimentError::UnknownProvider { .. }
        )
    }
}

pub type ExpResult<T> = Result<T, ExperimentError>;

fn read_manager_data(root_path: &Path, source: &ManagerSource) -> ExpResult<Vec<ManagerRecord>> {
    let p: PathBuf = root_path.join(&source.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read manager file {:?}", p2);
    match source.provider.as_str() {
        "csv" => io_csv::read_csv_managers(&p2, source),
        "xlsx" | "excel" => io_excel::read_excel_managers(&p2, source),
        x => UnknownProviderSnafu {
            provider: x,
            path: p2,
        }
        .fail(),
    }
}

/// Reads all the sources in order. Ids must be unique across the sources.
fn read_managers(root_path: &Path, sources: &[ManagerSource]) -> ExpResult<Vec<ManagerRecord>> {
    if sources.is_empty() {
        whatever!("No manager source was provided");
    }
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<ManagerRecord> = Vec::new();
    for source in sources {
        let records = read_manager_data(root_path, source)?;
        info!(
            "Read {} managers from {:?}",
            records.len(),
            source.file_path
        );
        for rec in records {
            ensure!(
                seen.insert(rec.id.clone()),
                DuplicateManagerIdSnafu {
                    id: rec.id.clone(),
                    path: source.file_path.clone(),
                }
            );
            res.push(rec);
        }
    }
    Ok(res)
}

/// Walks one participant through the pages, using their recorded answers.
fn replay_participant(session: &Session, row: &ResponseRow) -> Result<(), MatchingErrors> {
    let pid = row.participant_id();
    // Unmatched participants still go through the pages, with the default values.
    if let Err(e) = session.role(pid) {
        debug!("replay_participant: {} has no manager: {}", pid, e);
    }
    session.advance(pid)?;

    match row.preference() {
        Some(pref) => {
            session.painting(pid, pref)?;
        }
        None => {
            warn!(
                "Participant {}: no valid painting choice ({:?}), stopping",
                pid, row.prefer
            );
            return Ok(());
        }
    }
    advance_to(session, pid, Page::SurveyC)?;
    if let (Some(c1), Some(c2)) = (&row.charity_1, &row.charity_2) {
        if let Err(e) = session.survey_charity(pid, c1, c2) {
            warn!("Participant {}: charity answers ignored: {}", pid, e);
        }
    }
    advance_to(session, pid, Page::Understanding)?;

    let answers = match row.answers() {
        Some(a) => a,
        None => return Ok(()),
    };
    let outcome = session.understanding(pid, &answers)?;
    if let Some(msg) = outcome.error_message() {
        info!("Participant {}: {}", pid, msg.replace('\n', " "));
        return Ok(());
    }
    advance_to(session, pid, Page::Audit)?;

    let draw = session.audit_draw(pid)?;
    debug!("replay_participant: {} draw: {}", pid, draw);
    let probability = match row.report_probability {
        Some(p) => p,
        None => return Ok(()),
    };
    session.audit(pid, probability)?;
    advance_to(session, pid, Page::Dictator)?;
    if let Some(keep) = row.dictator_keep {
        if let Err(e) = session.dictator(pid, keep) {
            warn!("Participant {}: dictator allocation ignored: {}", pid, e);
        }
    }
    advance_to(session, pid, Page::Result)?;
    session.result(pid)?;
    Ok(())
}

fn advance_to(session: &Session, pid: ParticipantId, page: Page) -> Result<(), MatchingErrors> {
    while session.participant(pid)?.page() != page {
        session.advance(pid)?;
    }
    Ok(())
}

fn replay(session: &Session, rows: &[ResponseRow]) {
    // Everyone reaches the Role page, in the order they joined.
    for pid in session.participant_ids() {
        if let Err(e) = session.role(pid) {
            warn!("Participant {}: {}", pid, e);
        }
    }
    for row in rows {
        if let Err(e) = replay_participant(session, row) {
            warn!("Participant {}: {}", row.participant_id(), e);
        }
    }
}

fn mode_name(mode: AssignmentMode) -> &'static str {
    match mode {
        AssignmentMode::Reactive => "reactive",
        AssignmentMode::PreAllocate => "preAllocate",
    }
}

fn status_name(p: &ParticipantState) -> &'static str {
    match (p.maybe_assignment(), p.unmatched_reason()) {
        (Some(_), _) => "matched",
        (None, Some(UnmatchedReason::NoManagerData)) => "noManagerData",
        (None, Some(UnmatchedReason::PoolExhausted)) => "poolExhausted",
        (None, None) => "pending",
    }
}

fn participant_to_json(p: &ParticipantState, rules: &PaymentRules) -> JSValue {
    let payoff = p.payoff_record(rules).ok();
    json!({
        "participant": p.id().0,
        "status": status_name(p),
        "managerId": p.manager_id_or_default(),
        "managerPreference": p.manager_preference_or_default(),
        "team": p.team_or_default(),
        "organization": p.organization_or_default(),
        "statedAmount": p.stated_amount_or_default(),
        "correctAmount": p.correct_amount_or_default(),
        "thresholdInteger": p.threshold_or_default(),
        "order": p.maybe_assignment().map(|a| a.order),
        "timestamp": p.maybe_assignment().map(|a| a.timestamp.clone()),
        "prefer": p.preference().map(|x| x.as_str()),
        "pairType": p.pair_type().map(|x| match x {
            PairType::Same => "same",
            PairType::Different => "different",
        }),
        "page": format!("{:?}", p.page()),
        "understandingAttempts": p.understanding_attempts(),
        "understandingFirstTryCorrect": p.understanding_first_try_correct(),
        "understandingPassed": p.understanding_passed(),
        "reportDraw": p.report_draw(),
        "reportProbability": p.report_probability(),
        "report": p.report(),
        "charity1": p.charity_1(),
        "charity2": p.charity_2(),
        "dictatorKeep": p.dictator_keep(),
        "bonusAmount": payoff.as_ref().map(|r| format_amount(r.bonus_amount)),
        "managerTotalPayment": payoff.as_ref().map(|r| format_amount(r.manager_total_payment)),
        "payoff": format_amount(rules.participation_payoff),
    })
}

fn build_summary_js(config: &ExperimentConfig, session: &Session) -> ExpResult<JSValue> {
    let counters = session.balance();
    let mut participants: Vec<JSValue> = Vec::new();
    for pid in session.participant_ids() {
        let p = session.participant(pid).context(SessionFailureSnafu {})?;
        participants.push(participant_to_json(&p, &session.rules().payment));
    }
    let data_source = match session.data_source_error() {
        None => json!({"status": "ok"}),
        Some(e) => json!({"status": "unavailable", "error": e}),
    };
    Ok(json!({
        "session": {
            "sessionName": config.session_settings.session_name,
            "startTime": session.start_time(),
            "assignmentMode": mode_name(session.mode()),
            "numParticipants": session.num_participants(),
            "numManagers": session.num_managers(),
        },
        "dataSource": data_source,
        "balance": {
            "sameCount": counters.same_count,
            "differentCount": counters.different_count,
            "gap": counters.gap(),
        },
        "participants": participants,
    }))
}

fn write_summary(out: &str, pretty_js: &str) -> ExpResult<()> {
    if out == "stdout" {
        println!("{}", pretty_js);
    } else {
        fs::write(out, pretty_js).context(WritingSummarySnafu { path: out })?;
        info!("Summary written to {}", out);
    }
    Ok(())
}

/// Runs one session from a configuration file (or from the command line options
/// only) and writes its summary.
///
/// out: "stdout" or a file path. It takes precedence over the output path of the
/// configuration. Without either, the summary is printed.
pub fn run_experiment(
    config_path: Option<String>,
    check_summary_path: Option<String>,
    out: Option<String>,
    overrides: &ConfigOverrides,
) -> ExpResult<()> {
    let (mut config, root_p): (ExperimentConfig, PathBuf) = match &config_path {
        Some(p) => {
            let config = read_config(p)?;
            let root = Path::new(p)
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (config, root)
        }
        None => (ExperimentConfig::default(), PathBuf::from(".")),
    };
    overrides.apply(&mut config);
    info!("config: {:?}", config);

    // Validate the rules:
    let rules = config.rules.validate()?;
    let seed = config.rules.seed()?;

    let managers = read_managers(&root_p, &config.manager_sources);
    let rows: Vec<ResponseRow> = match &config.responses {
        Some(r) => read_responses(&root_p.join(&r.file_path).display().to_string())?,
        None => Vec::new(),
    };

    let max_response = rows.iter().map(|r| r.participant as usize).max();
    let session = match managers {
        Ok(records) => {
            let pool = ManagerPool::new(records).context(SessionFailureSnafu {})?;
            let num_participants = config
                .session_settings
                .num_participants
                .map(|n| n as usize)
                .or(max_response)
                .unwrap_or(pool.len());
            Session::new(pool, num_participants, &rules, seed)
        }
        Err(e) if e.is_data_source() => {
            let num_participants = config
                .session_settings
                .num_participants
                .map(|n| n as usize)
                .or(max_response)
                .unwrap_or(0);
            Session::without_managers(num_participants, &rules, seed, &e.to_string())
        }
        Err(e) => return Err(e),
    };

    replay(&session, &rows);

    let result_js = build_summary_js(&config, &session)?;
    let pretty_js_stats =
        serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path: Option<String> = out.or_else(|| {
        config
            .session_settings
            .output_path
            .as_ref()
            .map(|p| root_p.join(p).display().to_string())
    });
    write_summary(out_path.as_deref().unwrap_or("stdout"), &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let mut current = result_js;
        strip_timestamps(&mut current);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        let pretty_js_current =
            serde_json::to_string_pretty(&current).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_current {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_current.as_str(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
        info!("The summary matches the reference {}", summary_p);
    }

    Ok(())
}

#[cfg(test)]
fn test_dir() -> String {
    option_env!("MATCHRUN_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata"))
        .to_string()
}

/// Runs the scenario stored under `testdata/<test_name>` and returns its summary.
#[cfg(test)]
pub fn test_wrapper(test_name: &str) -> JSValue {
    let out = tempfile::NamedTempFile::new().unwrap();
    let out_path = out.path().display().to_string();
    let config_path = format!("{}/{}/_config.json", test_dir(), test_name);
    info!("Running test {}", test_name);
    let res = run_experiment(
        Some(config_path),
        None,
        Some(out_path.clone()),
        &ConfigOverrides::default(),
    );
    if let Err(e) = &res {
        eprintln!("An error occured {}", e);
    }
    assert!(res.is_ok(), "{:?}", res);
    let contents = fs::read_to_string(&out_path).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participants(js: &JSValue) -> Vec<JSValue> {
        js["participants"].as_array().unwrap().clone()
    }

    fn with_status(js: &JSValue, status: &str) -> usize {
        participants(js)
            .iter()
            .filter(|p| p["status"] == status)
            .count()
    }

    #[test]
    fn basic_preallocate() {
        let js = test_wrapper("basic_preallocate");
        assert_eq!(js["session"]["assignmentMode"], "preAllocate");
        assert_eq!(js["dataSource"]["status"], "ok");
        assert_eq!(with_status(&js, "matched"), 6);
        let ps = participants(&js);
        let ids: HashSet<&str> = ps.iter().map(|p| p["managerId"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 6);

        // Odd participants get Left managers, even participants Right managers.
        for (idx, p) in ps.iter().enumerate() {
            let expected = if idx % 2 == 0 { "Left" } else { "Right" };
            assert_eq!(p["managerPreference"], expected);
        }

        // Participant 1 picked Left with a Left manager, participant 2 Left with a
        // Right manager.
        assert_eq!(ps[0]["pairType"], "same");
        assert_eq!(ps[1]["pairType"], "different");
        assert_eq!(js["balance"]["sameCount"], 2);
        assert_eq!(js["balance"]["differentCount"], 1);

        // Every Left manager stated 12: full bonus, and a probability of 0 never reports.
        assert_ne!(ps[0]["report"], JSValue::Bool(true));
        assert_eq!(ps[0]["bonusAmount"], "2.00");
        assert_eq!(ps[0]["managerTotalPayment"], "2.67");
        assert_eq!(ps[0]["understandingAttempts"], 1);
        assert_eq!(ps[0]["team"], "Klee");

        // Charity and dictator answers are part of the record.
        assert_eq!(ps[0]["charity1"], "Red Cross");
        assert_eq!(ps[0]["charity2"], "NRA");
        assert_eq!(ps[0]["dictatorKeep"], JSValue::Null);
        assert_eq!(ps[2]["charity1"], JSValue::Null);

        // Participant 4 never answered.
        assert_eq!(ps[3]["page"], "Role");
        assert_eq!(ps[3]["report"], JSValue::Null);
        assert_eq!(ps[3]["managerTotalPayment"], "0.67");
    }

    #[test]
    fn shortage_reactive() {
        let js = test_wrapper("shortage_reactive");
        assert_eq!(js["session"]["assignmentMode"], "reactive");
        assert_eq!(with_status(&js, "matched"), 5);
        assert_eq!(with_status(&js, "poolExhausted"), 3);
        for p in participants(&js) {
            if p["status"] == "poolExhausted" {
                assert_eq!(p["managerId"], "Not matched");
                assert_eq!(p["team"], "Not assigned");
                assert_eq!(p["thresholdInteger"], 8);
                assert_eq!(p["bonusAmount"], JSValue::Null);
            }
        }
        let orders: HashSet<u64> = participants(&js)
            .iter()
            .filter_map(|p| p["order"].as_u64())
            .collect();
        assert_eq!(orders, (1..=5).collect());

        // Participant 6 has no manager but still records a painting.
        let p6 = &participants(&js)[5];
        assert_eq!(p6["status"], "poolExhausted");
        assert_eq!(p6["prefer"], "Left");
        assert_eq!(p6["pairType"], JSValue::Null);
    }

    #[test]
    fn missing_file() {
        let js = test_wrapper("missing_file");
        assert_eq!(js["dataSource"]["status"], "unavailable");
        assert_eq!(js["session"]["numManagers"], 0);
        assert_eq!(with_status(&js, "noManagerData"), 3);
        assert_eq!(participants(&js)[0]["statedAmount"], "Not available");
    }

    #[test]
    fn missing_column() {
        let js = test_wrapper("missing_column");
        assert_eq!(js["dataSource"]["status"], "unavailable");
        assert!(js["dataSource"]["error"]
            .as_str()
            .unwrap()
            .contains("main1playerprefer"));
        assert_eq!(with_status(&js, "noManagerData"), 2);
    }

    #[test]
    fn bom_csv() {
        let js = test_wrapper("bom_csv");
        assert_eq!(js["dataSource"]["status"], "ok");
        assert_eq!(js["session"]["numManagers"], 2);
        assert_eq!(with_status(&js, "matched"), 2);
    }

    #[test]
    fn multi_source() {
        let js = test_wrapper("multi_source");
        assert_eq!(js["session"]["numManagers"], 4);
        assert_eq!(with_status(&js, "matched"), 4);
    }

    #[test]
    fn duplicate_ids_across_sources() {
        let js = test_wrapper("duplicate_ids");
        assert_eq!(js["dataSource"]["status"], "unavailable");
        assert_eq!(with_status(&js, "noManagerData"), 2);
    }

    #[test]
    fn seeded_runs_match_their_reference() {
        let config_path = format!("{}/shortage_reactive/_config.json", test_dir());
        let first = tempfile::NamedTempFile::new().unwrap();
        let first_path = first.path().display().to_string();
        run_experiment(
            Some(config_path.clone()),
            None,
            Some(first_path.clone()),
            &ConfigOverrides::default(),
        )
        .unwrap();
        let second = tempfile::NamedTempFile::new().unwrap();
        let res = run_experiment(
            Some(config_path.clone()),
            Some(first_path),
            Some(second.path().display().to_string()),
            &ConfigOverrides::default(),
        );
        assert!(res.is_ok(), "{:?}", res);

        // A different seed gives a different session.
        let other_seed = ConfigOverrides {
            seed: Some(999),
            mode: Some("preAllocate".to_string()),
            ..ConfigOverrides::default()
        };
        let res = run_experiment(
            Some(config_path),
            Some(first.path().display().to_string()),
            Some(second.path().display().to_string()),
            &other_seed,
        );
        assert!(matches!(res, Err(ExperimentError::ReferenceMismatch {})));
    }

    #[test]
    fn unknown_provider_degrades() {
        let mut config = ExperimentConfig::default();
        config
            .manager_sources
            .push(ManagerSource::new("parquet", "m.parquet"));
        let err = read_managers(Path::new("."), &config.manager_sources).unwrap_err();
        assert!(err.is_data_source());
        let err = read_managers(Path::new("."), &[]).unwrap_err();
        assert!(!err.is_data_source());
    }
}
