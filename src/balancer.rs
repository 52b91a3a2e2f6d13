use crate::error::{Result, StatementError};
use crate::statement::StatementResult;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of a successful balance-sheet check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    #[schemars(description = "Net grand total of the assets side (BZ)")]
    pub actif: f64,

    #[schemars(description = "Net grand total of the liabilities side (DZ)")]
    pub passif: f64,

    #[schemars(description = "Actif minus Passif; within the tolerance")]
    pub difference: f64,

    pub tolerance: f64,
}

/// Compares both sides of a balance sheet built from the same trial balance.
pub struct BalanceSheetVerifier<'a> {
    actif: &'a StatementResult,
    passif: &'a StatementResult,
}

impl<'a> BalanceSheetVerifier<'a> {
    pub fn new(actif: &'a StatementResult, passif: &'a StatementResult) -> Self {
        Self { actif, passif }
    }

    pub fn verify(&self, tolerance: f64) -> Result<VerificationResult> {
        let actif = self.actif.grand_total_amount();
        let passif = self.passif.grand_total_amount();
        let difference = actif - passif;

        debug!(
            "Balance sheet check: {} {} vs {} {} (tolerance {})",
            self.actif.grand_total.reference,
            actif,
            self.passif.grand_total.reference,
            passif,
            tolerance
        );

        if difference.abs() > tolerance {
            return Err(StatementError::BalanceSheetMismatch {
                actif,
                passif,
                difference,
            });
        }

        Ok(VerificationResult {
            actif,
            passif,
            difference,
            tolerance,
        })
    }
}

/// Fails with [`StatementError::BalanceSheetMismatch`] when `|Actif - Passif| > tolerance`.
pub fn verify_balance_sheet(
    actif: &StatementResult,
    passif: &StatementResult,
    tolerance: f64,
) -> Result<VerificationResult> {
    BalanceSheetVerifier::new(actif, passif).verify(tolerance)
}
