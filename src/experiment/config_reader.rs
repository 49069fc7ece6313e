use crate::experiment::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

pub const DEFAULT_ID_COLUMN: &str = "participantid_in_session";
pub const DEFAULT_PREFERENCE_COLUMN: &str = "main1playerprefer";
pub const DEFAULT_STATED_AMOUNT_COLUMN: &str = "main1playerstated_amount";
pub const DEFAULT_CORRECT_AMOUNT_COLUMN: &str = "main1playerbriefing_correct_amou";
pub const DEFAULT_THRESHOLD_COLUMN: &str = "main1playerthreshold_integer";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    #[serde(rename = "sessionName")]
    pub session_name: String,
    #[serde(rename = "numParticipants")]
    pub num_participants: Option<u32>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            session_name: "session".to_string(),
            num_participants: None,
            output_path: None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
    #[serde(rename = "preferenceColumn")]
    pub preference_column: Option<String>,
    #[serde(rename = "statedAmountColumn")]
    pub stated_amount_column: Option<String>,
    #[serde(rename = "correctAmountColumn")]
    pub correct_amount_column: Option<String>,
    #[serde(rename = "thresholdColumn")]
    pub threshold_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl ManagerSource {
    pub fn new(provider: &str, file_path: &str) -> ManagerSource {
        ManagerSource {
            provider: provider.to_string(),
            file_path: file_path.to_string(),
            id_column: None,
            preference_column: None,
            stated_amount_column: None,
            correct_amount_column: None,
            threshold_column: None,
            excel_worksheet_name: None,
        }
    }

    pub fn id_column(&self) -> &str {
        self.id_column.as_deref().unwrap_or(DEFAULT_ID_COLUMN)
    }

    pub fn preference_column(&self) -> &str {
        self.preference_column
            .as_deref()
            .unwrap_or(DEFAULT_PREFERENCE_COLUMN)
    }

    pub fn stated_amount_column(&self) -> &str {
        self.stated_amount_column
            .as_deref()
            .unwrap_or(DEFAULT_STATED_AMOUNT_COLUMN)
    }

    pub fn correct_amount_column(&self) -> &str {
        self.correct_amount_column
            .as_deref()
            .unwrap_or(DEFAULT_CORRECT_AMOUNT_COLUMN)
    }

    pub fn threshold_column(&self) -> &str {
        self.threshold_column
            .as_deref()
            .unwrap_or(DEFAULT_THRESHOLD_COLUMN)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentRules {
    #[serde(rename = "assignmentMode")]
    pub assignment_mode: Option<String>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<JSValue>,
    #[serde(rename = "balanceThreshold")]
    pub balance_threshold: Option<i64>,
    #[serde(rename = "biasBase")]
    pub bias_base: Option<f64>,
    #[serde(rename = "biasStep")]
    pub bias_step: Option<f64>,
    #[serde(rename = "biasCap")]
    pub bias_cap: Option<f64>,
    #[serde(rename = "basePayment")]
    pub base_payment: Option<f64>,
    #[serde(rename = "bonusThreshold")]
    pub bonus_threshold: Option<i64>,
    #[serde(rename = "bonusRate")]
    pub bonus_rate: Option<f64>,
    #[serde(rename = "bonusCap")]
    pub bonus_cap: Option<f64>,
    #[serde(rename = "participationPayoff")]
    pub participation_payoff: Option<f64>,
}

impl ExperimentRules {
    pub fn assignment_mode(&self) -> ExpResult<AssignmentMode> {
        match self.assignment_mode.as_deref() {
            None | Some("preAllocate") => Ok(AssignmentMode::PreAllocate),
            Some("reactive") => Ok(AssignmentMode::Reactive),
            Some(x) => InvalidRuleSnafu {
                field: "assignmentMode",
                value: x,
            }
            .fail(),
        }
    }

    pub fn seed(&self) -> ExpResult<Option<u64>> {
        match &self.random_seed {
            None | Some(JSValue::Null) => Ok(None),
            Some(JSValue::Number(n)) => n.as_u64().map(Some).context(InvalidRuleSnafu {
                field: "randomSeed",
                value: n.to_string(),
            }),
            Some(JSValue::String(s)) => {
                s.trim()
                    .parse::<u64>()
                    .ok()
                    .map(Some)
                    .context(InvalidRuleSnafu {
                        field: "randomSeed",
                        value: s,
                    })
            }
            Some(x) => InvalidRuleSnafu {
                field: "randomSeed",
                value: x.to_string(),
            }
            .fail(),
        }
    }

    /// Checks the values and fills in the defaults.
    pub fn validate(&self) -> ExpResult<MatchingRules> {
        let d = MatchingRules::DEFAULT_RULES;
        let res = MatchingRules {
            assignment_mode: self.assignment_mode()?,
            balance_threshold: non_negative_int("balanceThreshold", self.balance_threshold)?
                .unwrap_or(d.balance_threshold),
            bias_base: probability("biasBase", self.bias_base)?.unwrap_or(d.bias_base),
            bias_step: probability("biasStep", self.bias_step)?.unwrap_or(d.bias_step),
            bias_cap: probability("biasCap", self.bias_cap)?.unwrap_or(d.bias_cap),
            payment: PaymentRules {
                base_payment: non_negative("basePayment", self.base_payment)?
                    .unwrap_or(d.payment.base_payment),
                bonus_threshold: non_negative_int("bonusThreshold", self.bonus_threshold)?
                    .unwrap_or(d.payment.bonus_threshold),
                bonus_rate: non_negative("bonusRate", self.bonus_rate)?
                    .unwrap_or(d.payment.bonus_rate),
                bonus_cap: non_negative("bonusCap", self.bonus_cap)?
                    .unwrap_or(d.payment.bonus_cap),
                participation_payoff: non_negative(
                    "participationPayoff",
                    self.participation_payoff,
                )?
                .unwrap_or(d.payment.participation_payoff),
            },
        };
        Ok(res)
    }
}

fn probability(field: &str, x: Option<f64>) -> ExpResult<Option<f64>> {
    match x {
        Some(v) if !(0.0..=1.0).contains(&v) => InvalidRuleSnafu {
            field,
            value: v.to_string(),
        }
        .fail(),
        x => Ok(x),
    }
}

fn non_negative(field: &str, x: Option<f64>) -> ExpResult<Option<f64>> {
    match x {
        Some(v) if !(v >= 0.0 && v.is_finite()) => InvalidRuleSnafu {
            field,
            value: v.to_string(),
        }
        .fail(),
        x => Ok(x),
    }
}

fn non_negative_int(field: &str, x: Option<i64>) -> ExpResult<Option<i64>> {
    match x {
        Some(v) if v < 0 => InvalidRuleSnafu {
            field,
            value: v.to_string(),
        }
        .fail(),
        x => Ok(x),
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(rename = "sessionSettings", default)]
    pub session_settings: SessionSettings,
    #[serde(rename = "managerSources", default)]
    pub manager_sources: Vec<ManagerSource>,
    pub responses: Option<ResponsesSource>,
    #[serde(default)]
    pub rules: ExperimentRules,
}

/// Values given on the command line. They take precedence over the configuration
/// file.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub input_type: Option<String>,
    pub excel_worksheet_name: Option<String>,
    pub participants: Option<u32>,
    pub responses: Option<String>,
    pub mode: Option<String>,
    pub seed: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(input) = &self.input {
            let provider = match &self.input_type {
                Some(t) => t.clone(),
                None if input.ends_with(".xlsx") => "xlsx".to_string(),
                None => "csv".to_string(),
            };
            let mut source = ManagerSource::new(&provider, input);
            source.excel_worksheet_name = self.excel_worksheet_name.clone();
            config.manager_sources = vec![source];
        }
        if let Some(n) = self.participants {
            config.session_settings.num_participants = Some(n);
        }
        if let Some(p) = &self.responses {
            config.responses = Some(ResponsesSource {
                file_path: p.clone(),
            });
        }
        if let Some(m) = &self.mode {
            config.rules.assignment_mode = Some(m.clone());
        }
        if let Some(s) = self.seed {
            config.rules.random_seed = Some(JSValue::from(s));
        }
    }
}

pub fn read_config(path: &str) -> ExpResult<ExperimentConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ExperimentConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Reads a summary written by a previous run, without its timestamps.
pub fn read_summary(path: &str) -> ExpResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let mut js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    strip_timestamps(&mut js);
    Ok(js)
}

/// Removes the wall clock values, which differ between two runs of the same session.
pub fn strip_timestamps(js: &mut JSValue) {
    match js {
        JSValue::Object(m) => {
            m.remove("timestamp");
            m.remove("startTime");
            for v in m.values_mut() {
                strip_timestamps(v);
            }
        }
        JSValue::Array(l) => {
            for v in l.iter_mut() {
                strip_timestamps(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_rules_use_the_defaults() {
        let rules = ExperimentRules::default().validate().unwrap();
        assert_eq!(rules, MatchingRules::DEFAULT_RULES);
    }

    #[test]
    fn rules_are_parsed() {
        let js = json!({
            "assignmentMode": "reactive",
            "randomSeed": "42",
            "biasCap": 0.9,
            "bonusCap": 3.0
        });
        let rules: ExperimentRules = serde_json::from_value(js).unwrap();
        let m = rules.validate().unwrap();
        assert_eq!(m.assignment_mode, AssignmentMode::Reactive);
        assert_eq!(m.bias_cap, 0.9);
        assert_eq!(m.payment.bonus_cap, 3.0);
        assert_eq!(m.bias_base, 0.5);
        assert_eq!(rules.seed().unwrap(), Some(42));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let rules = ExperimentRules {
            assignment_mode: Some("random".to_string()),
            ..ExperimentRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(ExperimentError::InvalidRule { .. })
        ));
        let rules = ExperimentRules {
            bias_cap: Some(1.5),
            ..ExperimentRules::default()
        };
        assert!(rules.validate().is_err());
        let rules = ExperimentRules {
            random_seed: Some(json!(-3)),
            ..ExperimentRules::default()
        };
        assert!(rules.seed().is_err());
    }

    #[test]
    fn overrides_replace_the_sources() {
        let mut config = ExperimentConfig::default();
        config
            .manager_sources
            .push(ManagerSource::new("csv", "a.csv"));
        let o = ConfigOverrides {
            input: Some("managers.xlsx".to_string()),
            participants: Some(12),
            seed: Some(5),
            ..ConfigOverrides::default()
        };
        o.apply(&mut config);
        assert_eq!(
            config.manager_sources,
            vec![ManagerSource::new("xlsx", "managers.xlsx")]
        );
        assert_eq!(config.session_settings.num_participants, Some(12));
        assert_eq!(config.rules.seed().unwrap(), Some(5));
    }

    #[test]
    fn timestamps_are_stripped_everywhere() {
        let mut js = json!({
            "session": {"startTime": "x", "name": "a"},
            "participants": [{"timestamp": "y", "managerId": "m1"}]
        });
        strip_timestamps(&mut js);
        assert_eq!(
            js,
            json!({"session": {"name": "a"}, "participants": [{"managerId": "m1"}]})
        );
    }
}
