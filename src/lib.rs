//! # SYSCOHADA Statements
//!
//! A library for turning a company's trial balance (balance générale) into the four
//! SYSCOHADA financial statements: Bilan Actif, Bilan Passif, Compte de Résultat and
//! Tableau des Flux de Trésorerie.
//!
//! ## Core Concepts
//!
//! - **Balance rows**: one row per account, with debits, credits and a net solde
//! - **Statement schemas**: JSON data listing each statement's lines, the account prefixes
//!   feeding the leaf lines and the signed formulas of the totals
//! - **Leaf lines**: sum every row whose account number starts with one of their prefixes
//! - **Computed lines**: signed sums of other lines, evaluated once per build
//! - **Integrity**: schemas are validated at load time (unique references, no cycles, every
//!   leaf reaching the grand total once) and Actif = Passif can be enforced per exercice
//!
//! ## Example
//!
//! ```rust,ignore
//! use syscohada_statements::*;
//!
//! let rows = vec![
//!     BalanceRow::from_cells("701", Some("Ventes de marchandises"), "", "", "1 000,00"),
//!     BalanceRow::from_cells("601", Some("Achats de marchandises"), "", "", "400,00"),
//! ];
//!
//! let compte_resultat = build_statement(StatementType::CompteResultat, &rows)?;
//! assert_eq!(compte_resultat.amount("XA"), Some(600.0));
//! println!("{}", compte_resultat.to_markdown());
//! ```

pub mod assembler;
pub mod balancer;
pub mod calculator;
pub mod error;
pub mod evaluator;
pub mod exercice;
pub mod ingestion;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod utils;

pub use assembler::StatementAssembler;
pub use balancer::{verify_balance_sheet, BalanceSheetVerifier, VerificationResult};
pub use calculator::{compute_leaf_total, matches_prefix};
pub use error::{Result, StatementError};
pub use evaluator::FormulaEvaluator;
pub use exercice::{Exercice, FinancialStatements};
pub use ingestion::*;
pub use provider::{
    generate_financial_statements, BalanceProvider, InMemoryBalanceStore, StatementSink,
};
pub use registry::{validate_schema, Registry, SchemaViolation};
pub use schema::*;
pub use statement::*;
pub use utils::*;

use log::{debug, info};

/// Builds one statement with the embedded SYSCOHADA schemas.
pub fn build_statement(statement: StatementType, rows: &[BalanceRow]) -> Result<StatementResult> {
    StatementAssembler::new(Registry::builtin()?).build(statement, rows)
}

pub struct FinancialStatementsProcessor;

impl FinancialStatementsProcessor {
    pub fn process(exercice: &Exercice, rows: &[BalanceRow]) -> Result<FinancialStatements> {
        Self::process_with_registry(Registry::builtin()?, exercice, rows)
    }

    /// Same as [`FinancialStatementsProcessor::process`], against another schema revision.
    pub fn process_with_registry(
        registry: &Registry,
        exercice: &Exercice,
        rows: &[BalanceRow],
    ) -> Result<FinancialStatements> {
        exercice.validate()?;

        info!(
            "Processing exercice {} ({}) for company {}",
            exercice.name, exercice.id, exercice.company_id
        );
        debug!("Trial balance contains {} rows", rows.len());

        let assembler = StatementAssembler::new(registry);

        Ok(FinancialStatements {
            exercice: exercice.clone(),
            bilan_actif: assembler.build(StatementType::BilanActif, rows)?,
            bilan_passif: assembler.build(StatementType::BilanPassif, rows)?,
            compte_resultat: assembler.build(StatementType::CompteResultat, rows)?,
            flux_tresorerie: assembler.build(StatementType::FluxTresorerie, rows)?,
        })
    }

    pub fn process_with_verification(
        exercice: &Exercice,
        rows: &[BalanceRow],
        tolerance: f64,
    ) -> Result<FinancialStatements> {
        let statements = Self::process(exercice, rows)?;

        let verification = statements.verify(tolerance)?;
        debug!(
            "Balance sheet verified: Actif {} = Passif {}",
            verification.actif, verification.passif
        );

        Ok(statements)
    }
}

pub fn process_financial_statements(
    exercice: &Exercice,
    rows: &[BalanceRow],
) -> Result<FinancialStatements> {
    FinancialStatementsProcessor::process(exercice, rows)
}

pub fn process_with_verification(
    exercice: &Exercice,
    rows: &[BalanceRow],
    tolerance: f64,
) -> Result<FinancialStatements> {
    FinancialStatementsProcessor::process_with_verification(exercice, rows, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_rows() -> Vec<BalanceRow> {
        vec![
            BalanceRow::new("101").with_credits(10000.0).with_solde(10000.0),
            BalanceRow::new("162").with_credits(5000.0).with_solde(5000.0),
            BalanceRow::new("401").with_credits(3000.0).with_solde(3000.0),
            BalanceRow::new("222").with_debits(8000.0).with_solde(8000.0),
            BalanceRow::new("311").with_debits(4000.0).with_solde(4000.0),
            BalanceRow::new("411").with_debits(2500.0).with_solde(2500.0),
            BalanceRow::new("521").with_debits(3500.0).with_solde(3500.0),
        ]
    }

    #[test]
    fn test_end_to_end_processing() {
        let exercice = Exercice::for_year("ex-2023", "acme", 2023).unwrap();
        let statements = FinancialStatementsProcessor::process(&exercice, &balanced_rows()).unwrap();

        assert_eq!(statements.exercice, exercice);
        assert_eq!(statements.bilan_actif.grand_total_amount(), 18000.0);
        assert_eq!(statements.bilan_passif.grand_total_amount(), 18000.0);
        assert_eq!(statements.bilan_actif.amount("AZ"), Some(8000.0));
        assert_eq!(statements.bilan_passif.amount("CP"), Some(10000.0));
        assert_eq!(statements.compte_resultat.grand_total_amount(), 0.0);
    }

    #[test]
    fn test_process_with_verification() {
        let exercice = Exercice::for_year("ex-2023", "acme", 2023).unwrap();
        assert!(process_with_verification(&exercice, &balanced_rows(), 0.01).is_ok());

        let mut rows = balanced_rows();
        rows.push(BalanceRow::new("521").with_solde(1.0));
        let result = process_with_verification(&exercice, &rows, 0.01);
        assert!(matches!(
            result,
            Err(StatementError::BalanceSheetMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_exercice_is_rejected() {
        let mut exercice = Exercice::for_year("ex-2023", "acme", 2023).unwrap();
        exercice.end_date = exercice.start_date;
        assert!(process_financial_statements(&exercice, &balanced_rows()).is_err());
    }

    #[test]
    fn test_build_statement_uses_builtin_schemas() {
        let rows = vec![BalanceRow::new("661").with_solde(1200.0)];
        let result = build_statement(StatementType::CompteResultat, &rows).unwrap();

        assert_eq!(result.amount("RK"), Some(1200.0));
        assert_eq!(result.amount("XD"), Some(-1200.0));
        assert_eq!(result.grand_total.reference, "XI");
        assert_eq!(result.grand_total_amount(), -1200.0);
    }
}
