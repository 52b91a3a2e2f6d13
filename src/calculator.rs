//! Leaf aggregation: sums the trial-balance rows that belong to a statement line.

use crate::ingestion::BalanceRow;
use crate::schema::ValueKind;
use crate::statement::LineValue;

/// True when `account_number` rolls up into `prefix` (`"4191"` belongs to `"419"`, not `"42"`).
pub fn matches_prefix(account_number: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    !prefix.is_empty() && account_number.trim().starts_with(prefix)
}

pub fn is_member(row: &BalanceRow, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|prefix| matches_prefix(&row.account_number, prefix))
}

/// Aggregates every row whose account number starts with one of `prefixes`.
///
/// Balance-sheet lines collect debits as `brut`, credits as `amort` and the net balance as
/// `net`; income and cash-flow lines collect the solde as `montant`. Rows are summed in input
/// order, and no match gives zero.
pub fn compute_leaf_total(rows: &[BalanceRow], prefixes: &[String], kind: ValueKind) -> LineValue {
    rows.iter()
        .filter(|row| is_member(row, prefixes))
        .fold(LineValue::zero(kind), |total, row| {
            total.add_scaled(row_value(row, kind), 1.0)
        })
}

pub fn row_value(row: &BalanceRow, kind: ValueKind) -> LineValue {
    match kind {
        ValueKind::Bilan => LineValue::Bilan {
            brut: row.debit_amount(),
            amort: row.credit_amount(),
            net: row.net_amount(),
        },
        ValueKind::Montant => LineValue::Montant {
            montant: row.solde_amount(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_prefix_matching() {
        assert!(matches_prefix("4191", "419"));
        assert!(!matches_prefix("4191", "42"));
        assert!(matches_prefix(" 401100 ", "401"));
        assert!(matches_prefix("22", "22"));
        assert!(!matches_prefix("2", "22"));
        assert!(!matches_prefix("401", ""));
    }

    #[test]
    fn test_bilan_leaf_sums_matching_rows() {
        let rows = vec![
            BalanceRow::new("2411").with_debits(1000.0).with_credits(200.0).with_solde(800.0),
            BalanceRow::new("2412").with_debits(500.0).with_credits(100.0),
            BalanceRow::new("2811").with_credits(50.0).with_solde(-50.0),
        ];
        let total = compute_leaf_total(&rows, &prefixes(&["241"]), ValueKind::Bilan);
        assert_eq!(
            total,
            LineValue::Bilan {
                brut: 1500.0,
                amort: 300.0,
                net: 1200.0
            }
        );
    }

    #[test]
    fn test_montant_leaf_uses_solde() {
        let rows = vec![
            BalanceRow::new("701").with_solde(1000.0),
            BalanceRow::new("7011").with_credits(250.0).with_solde(250.0),
            BalanceRow::new("702").with_solde(999.0),
            BalanceRow::new("7012").with_credits(75.0),
        ];
        let total = compute_leaf_total(&rows, &prefixes(&["701"]), ValueKind::Montant);
        assert_eq!(total, LineValue::Montant { montant: 1250.0 });
    }

    #[test]
    fn test_no_match_is_zero() {
        let rows = vec![BalanceRow::new("601").with_solde(10.0)];
        assert_eq!(
            compute_leaf_total(&rows, &prefixes(&["70"]), ValueKind::Montant),
            LineValue::Montant { montant: 0.0 }
        );
        assert_eq!(
            compute_leaf_total(&[], &prefixes(&["70"]), ValueKind::Bilan),
            LineValue::zero(ValueKind::Bilan)
        );
    }

    #[test]
    fn test_row_matching_several_prefixes_counts_once() {
        let rows = vec![BalanceRow::new("4011").with_solde(300.0)];
        let total = compute_leaf_total(&rows, &prefixes(&["40", "401"]), ValueKind::Montant);
        assert_eq!(total.comparable(), 300.0);
    }
}
