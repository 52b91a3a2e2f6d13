use crate::registry::SchemaViolation;
use crate::schema::StatementType;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    /// Violations keyed by the statement they were found in; checks spanning both balance
    /// sheet sides are keyed `BilanActif/BilanPassif`.
    #[error("Invalid schema: {}", format_failures(.failures))]
    InvalidSchema {
        failures: BTreeMap<String, Vec<SchemaViolation>>,
    },

    #[error("Circular formula: {}", .cycle.join(" -> "))]
    CircularFormula { cycle: Vec<String> },

    #[error("Unknown line reference '{reference}' in {statement}")]
    UnknownReference { statement: String, reference: String },

    #[error("No schema registered for statement {0}")]
    UnknownStatement(StatementType),

    #[error("Missing CSV column: {0}")]
    MissingColumn(String),

    #[error("No balance found for exercice {exercice_id} of company {company_id}")]
    BalanceNotFound {
        company_id: String,
        exercice_id: String,
    },

    #[error("Invalid exercice {id}: {details}")]
    InvalidExercice { id: String, details: String },

    #[error("Balance sheet mismatch: Actif ({actif}) != Passif ({passif}), difference {difference}")]
    BalanceSheetMismatch {
        actif: f64,
        passif: f64,
        difference: f64,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_failures(failures: &BTreeMap<String, Vec<SchemaViolation>>) -> String {
    failures
        .iter()
        .map(|(statement, violations)| {
            let listed = violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            format!("{}: {}", statement, listed)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub type Result<T> = std::result::Result<T, StatementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_formula_message_names_cycle() {
        let err = StatementError::CircularFormula {
            cycle: vec!["XA".to_string(), "XB".to_string(), "XA".to_string()],
        };
        assert_eq!(err.to_string(), "Circular formula: XA -> XB -> XA");
    }

    #[test]
    fn test_invalid_schema_lists_every_violation() {
        let mut failures = BTreeMap::new();
        failures.insert(
            "CompteResultat".to_string(),
            vec![
                SchemaViolation::DuplicateReference {
                    reference: "XE".to_string(),
                },
                SchemaViolation::UnknownReference {
                    line: "XG".to_string(),
                    reference: "XZ".to_string(),
                },
            ],
        );
        failures.insert(
            "FluxTresorerie".to_string(),
            vec![SchemaViolation::UnknownGrandTotal {
                reference: "ZH".to_string(),
            }],
        );
        let message = StatementError::InvalidSchema { failures }.to_string();
        assert!(message.contains("CompteResultat: "));
        assert!(message.contains("XE"));
        assert!(message.contains("XZ"));
        assert!(message.contains(" | FluxTresorerie: grand total 'ZH' is not defined"));
    }
}
