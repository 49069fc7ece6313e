use log::{debug, info};

use rand::Rng;

use crate::config::*;
use crate::participant::ParticipantState;

/// Bonus earned by a manager who was not reported:
/// `min(max(stated - threshold, 0) * rate, cap)`.
pub fn bonus_amount(stated_amount: i64, rules: &PaymentRules) -> f64 {
    let excess = (stated_amount - rules.bonus_threshold).max(0) as f64;
    (excess * rules.bonus_rate).min(rules.bonus_cap)
}

/// A reported manager only receives the base payment.
pub fn manager_total_payment(report: bool, bonus: f64, rules: &PaymentRules) -> f64 {
    if report {
        rules.base_payment
    } else {
        rules.base_payment + bonus
    }
}

/// The report goes through when the stated probability beats the draw.
pub fn report_decision(probability: u8, draw: u8) -> bool {
    probability > draw
}

/// Stated amounts that are missing or not an integer count as 0.
pub fn parse_stated_amount(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
}

pub fn validate_probability(value: i64) -> Result<u8, MatchingErrors> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(MatchingErrors::InvalidProbability { value })
    }
}

/// Uniform integer in `[0, 100]`.
pub fn draw_report_number<R: Rng>(rng: &mut R) -> u8 {
    rng.gen_range(0..=100)
}

/// Amounts are shown with two decimals.
pub fn format_amount(x: f64) -> String {
    format!("{:.2}", x)
}

/// The final record of one participant.
#[derive(PartialEq, Debug, Clone)]
pub struct PayoffRecord {
    pub participant: ParticipantId,
    pub manager_id: String,
    pub team: String,
    pub organization: String,
    pub report: bool,
    pub stated_amount: String,
    pub correct_amount: String,
    pub bonus_amount: f64,
    pub manager_total_payment: f64,
    pub payoff: f64,
}

impl ParticipantState {
    /// Returns the stored draw, drawing it the first time.
    pub fn report_draw_or_insert<R: Rng>(&mut self, rng: &mut R) -> u8 {
        match self.report_draw {
            Some(d) => d,
            None => {
                let d = draw_report_number(rng);
                self.report_draw = Some(d);
                d
            }
        }
    }

    /// Stores the reporting probability and the decision against the stored draw.
    ///
    /// The first decision is final: later submissions return it unchanged.
    pub fn submit_report_probability<R: Rng>(
        &mut self,
        probability: i64,
        rng: &mut R,
    ) -> Result<bool, MatchingErrors> {
        self.assignment()?;
        if let Some(report) = self.report {
            debug!(
                "Participant {} already submitted a report probability, keeping {}",
                self.id, report
            );
            return Ok(report);
        }
        let probability = validate_probability(probability)?;
        let draw = self.report_draw_or_insert(rng);
        let report = report_decision(probability, draw);
        self.report_probability = Some(probability);
        self.report = Some(report);
        info!(
            "Participant {} report probability {} draw {} -> report: {}",
            self.id, probability, draw, report
        );
        Ok(report)
    }

    /// Computes the payments. A participant who never reached the audit counts
    /// as not reporting.
    pub fn payoff_record(&self, rules: &PaymentRules) -> Result<PayoffRecord, MatchingErrors> {
        let a = self.assignment()?;
        let report = self.report.unwrap_or(false);
        let bonus = bonus_amount(parse_stated_amount(a.stated_amount.as_deref()), rules);
        Ok(PayoffRecord {
            participant: self.id,
            manager_id: a.manager_id.clone(),
            team: a.team_label.clone(),
            organization: a.organization.clone(),
            report,
            stated_amount: self.stated_amount_or_default().to_string(),
            correct_amount: self.correct_amount_or_default().to_string(),
            bonus_amount: bonus,
            manager_total_payment: manager_total_payment(report, bonus, rules),
            payoff: rules.participation_payoff,
        })
    }
}
