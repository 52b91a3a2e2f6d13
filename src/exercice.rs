use crate::balancer::{verify_balance_sheet, VerificationResult};
use crate::error::{Result, StatementError};
use crate::schema::StatementType;
use crate::statement::StatementResult;
use crate::utils::{last_day_of_month, months_between};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A fiscal period of one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Exercice {
    pub id: String,

    pub company_id: String,

    #[schemars(description = "Fiscal year the exercice is named after, e.g. 2023")]
    pub name: i32,

    #[schemars(description = "First day of the period (YYYY-MM-DD)")]
    pub start_date: NaiveDate,

    #[schemars(description = "Last day of the period (YYYY-MM-DD)")]
    pub end_date: NaiveDate,
}

impl Exercice {
    /// A calendar exercice, 1 January to 31 December of `year`.
    pub fn for_year(id: impl Into<String>, company_id: impl Into<String>, year: i32) -> Result<Self> {
        Self::closing_in(id, company_id, year, 12)
    }

    /// A twelve-month exercice ending on the last day of `closing_month` of `year`, e.g. 1 July
    /// 2023 to 30 June 2024 for `(2024, 6)`. The exercice is named after its closing year.
    pub fn closing_in(
        id: impl Into<String>,
        company_id: impl Into<String>,
        year: i32,
        closing_month: u32,
    ) -> Result<Self> {
        let id = id.into();
        let (start_year, start_month) = if closing_month == 12 {
            (year, 1)
        } else {
            (year - 1, closing_month + 1)
        };

        let (start_date, end_date) = NaiveDate::from_ymd_opt(start_year, start_month, 1)
            .zip(last_day_of_month(year, closing_month))
            .ok_or_else(|| StatementError::InvalidExercice {
                id: id.clone(),
                details: format!("no closing date for month {} of {}", closing_month, year),
            })?;

        Ok(Self {
            id,
            company_id: company_id.into(),
            name: year,
            start_date,
            end_date,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date <= self.start_date {
            return Err(StatementError::InvalidExercice {
                id: self.id.clone(),
                details: format!(
                    "end date {} is not after start date {}",
                    self.end_date, self.start_date
                ),
            });
        }
        Ok(())
    }

    /// Number of calendar months the period touches; a calendar year gives 12.
    pub fn duration_months(&self) -> i32 {
        months_between(self.start_date, self.end_date) + 1
    }
}

/// The four statements produced for one exercice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatements {
    pub exercice: Exercice,
    pub bilan_actif: StatementResult,
    pub bilan_passif: StatementResult,
    pub compte_resultat: StatementResult,
    pub flux_tresorerie: StatementResult,
}

impl FinancialStatements {
    pub fn get(&self, statement: StatementType) -> &StatementResult {
        match statement {
            StatementType::BilanActif => &self.bilan_actif,
            StatementType::BilanPassif => &self.bilan_passif,
            StatementType::CompteResultat => &self.compte_resultat,
            StatementType::FluxTresorerie => &self.flux_tresorerie,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatementResult> {
        StatementType::ALL.into_iter().map(move |t| self.get(t))
    }

    pub fn verify(&self, tolerance: f64) -> Result<VerificationResult> {
        verify_balance_sheet(&self.bilan_actif, &self.bilan_passif, tolerance)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = format!(
            "# États financiers {} ({} au {})\n\n",
            self.exercice.name, self.exercice.start_date, self.exercice.end_date
        );
        for statement in self.iter() {
            output.push('#');
            output.push_str(&statement.to_markdown());
            output.push('\n');
        }
        output
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(FinancialStatements);
        serde_json::to_string_pretty(&schema)
    }
}
