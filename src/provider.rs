//! Where balances come from and where finished statements go.

use crate::error::{Result, StatementError};
use crate::exercice::{Exercice, FinancialStatements};
use crate::ingestion::BalanceRow;
use crate::FinancialStatementsProcessor;
use log::{debug, info};
use std::collections::HashMap;

/// Source of trial balances, one per (company, exercice).
pub trait BalanceProvider {
    fn load_balance(&self, company_id: &str, exercice_id: &str) -> Result<Vec<BalanceRow>>;
}

/// Destination of generated statements.
pub trait StatementSink {
    fn persist(&mut self, statements: &FinancialStatements) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredBalance {
    company_id: String,
    rows: Vec<BalanceRow>,
}

/// Keeps one balance per exercice and the last statements generated for it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBalanceStore {
    balances: HashMap<String, StoredBalance>,
    statements: HashMap<String, FinancialStatements>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the balance of an exercice. Returns the rows it replaced.
    pub fn save_balance(
        &mut self,
        company_id: impl Into<String>,
        exercice_id: impl Into<String>,
        rows: Vec<BalanceRow>,
    ) -> Option<Vec<BalanceRow>> {
        let exercice_id = exercice_id.into();
        debug!("Saving {} balance rows for exercice {}", rows.len(), exercice_id);

        self.balances
            .insert(
                exercice_id,
                StoredBalance {
                    company_id: company_id.into(),
                    rows,
                },
            )
            .map(|previous| previous.rows)
    }

    pub fn statements(&self, exercice_id: &str) -> Option<&FinancialStatements> {
        self.statements.get(exercice_id)
    }

    pub fn balance_count(&self) -> usize {
        self.balances.len()
    }
}

impl BalanceProvider for InMemoryBalanceStore {
    fn load_balance(&self, company_id: &str, exercice_id: &str) -> Result<Vec<BalanceRow>> {
        self.balances
            .get(exercice_id)
            .filter(|stored| stored.company_id == company_id)
            .map(|stored| stored.rows.clone())
            .ok_or_else(|| StatementError::BalanceNotFound {
                company_id: company_id.to_string(),
                exercice_id: exercice_id.to_string(),
            })
    }
}

impl StatementSink for InMemoryBalanceStore {
    fn persist(&mut self, statements: &FinancialStatements) -> Result<()> {
        self.statements
            .insert(statements.exercice.id.clone(), statements.clone());
        Ok(())
    }
}

/// Loads the balance of `exercice`, builds its four statements, hands them to `sink` and
/// returns them.
pub fn generate_financial_statements<P, S>(
    provider: &P,
    sink: &mut S,
    exercice: &Exercice,
) -> Result<FinancialStatements>
where
    P: BalanceProvider + ?Sized,
    S: StatementSink + ?Sized,
{
    exercice.validate()?;

    let rows = provider.load_balance(&exercice.company_id, &exercice.id)?;
    let statements = FinancialStatementsProcessor::process(exercice, &rows)?;
    sink.persist(&statements)?;

    info!(
        "Generated financial statements for exercice {} of company {}",
        exercice.id, exercice.company_id
    );
    Ok(statements)
}
