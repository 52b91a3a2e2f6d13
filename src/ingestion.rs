use crate::error::{Result, StatementError};
use crate::utils::parse_amount;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One account of a trial balance.
///
/// Amounts are `None` when the source cell was blank or unreadable; every accessor reads
/// them as zero so a sparse balance never blocks statement generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub account_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default, alias = "brut", deserialize_with = "deserialize_amount")]
    pub debits: Option<f64>,

    #[serde(default, alias = "amort", deserialize_with = "deserialize_amount")]
    pub credits: Option<f64>,

    #[serde(default, alias = "net", deserialize_with = "deserialize_amount")]
    pub solde: Option<f64>,
}

impl BalanceRow {
    pub fn new(account_number: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.account = Some(label.into());
        self
    }

    pub fn with_debits(mut self, value: f64) -> Self {
        self.debits = Some(value);
        self
    }

    pub fn with_credits(mut self, value: f64) -> Self {
        self.credits = Some(value);
        self
    }

    pub fn with_solde(mut self, value: f64) -> Self {
        self.solde = Some(value);
        self
    }

    /// Builds a row from raw, possibly French-formatted cells.
    pub fn from_cells(
        account_number: &str,
        account: Option<&str>,
        debits: &str,
        credits: &str,
        solde: &str,
    ) -> Self {
        Self {
            account_number: account_number.trim().to_string(),
            account: account
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string),
            debits: parse_amount(debits),
            credits: parse_amount(credits),
            solde: parse_amount(solde),
        }
    }

    pub fn debit_amount(&self) -> f64 {
        self.debits.unwrap_or(0.0)
    }

    pub fn credit_amount(&self) -> f64 {
        self.credits.unwrap_or(0.0)
    }

    pub fn solde_amount(&self) -> f64 {
        self.solde.unwrap_or(0.0)
    }

    /// Net balance: the reported solde, or debits minus credits when no solde was given.
    pub fn net_amount(&self) -> f64 {
        self.solde
            .unwrap_or_else(|| self.debit_amount() - self.credit_amount())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawAmount::Number(value)) if value.is_finite() => Some(value),
        Some(RawAmount::Text(text)) => parse_amount(&text),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvImportOptions {
    /// Field delimiter; detected from the header line when `None`.
    #[serde(default)]
    pub delimiter: Option<u8>,

    /// Drop lines whose account number is blank (subtotal or title lines of exported balances).
    #[serde(default = "default_skip_blank_accounts")]
    pub skip_blank_accounts: bool,
}

fn default_skip_blank_accounts() -> bool {
    true
}

impl Default for CsvImportOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            skip_blank_accounts: default_skip_blank_accounts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    AccountNumber,
    Account,
    Debits,
    Credits,
    Solde,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        match normalize_header(header).as_str() {
            "numero de compte" => Some(Column::AccountNumber),
            "libelle du compte" => Some(Column::Account),
            "debit" => Some(Column::Debits),
            "credit" => Some(Column::Credits),
            "solde" => Some(Column::Solde),
            _ => None,
        }
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Default)]
struct ColumnMap {
    account_number: Option<usize>,
    account: Option<usize>,
    debits: Option<usize>,
    credits: Option<usize>,
    solde: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let slot = match Column::from_header(header) {
                Some(Column::AccountNumber) => &mut map.account_number,
                Some(Column::Account) => &mut map.account,
                Some(Column::Debits) => &mut map.debits,
                Some(Column::Credits) => &mut map.credits,
                Some(Column::Solde) => &mut map.solde,
                None => {
                    debug!("Ignoring unmapped balance column '{}'", header);
                    continue;
                }
            };
            slot.get_or_insert(idx);
        }

        if map.account_number.is_none() {
            return Err(StatementError::MissingColumn("Numéro de compte".to_string()));
        }

        Ok(map)
    }

    fn cell<'r>(record: &'r StringRecord, column: Option<usize>) -> &'r str {
        column.and_then(|idx| record.get(idx)).unwrap_or("")
    }

    fn row(&self, record: &StringRecord) -> BalanceRow {
        let account = self.account.and_then(|idx| record.get(idx));
        BalanceRow::from_cells(
            Self::cell(record, self.account_number),
            account,
            Self::cell(record, self.debits),
            Self::cell(record, self.credits),
            Self::cell(record, self.solde),
        )
    }
}

fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.contains(';') {
        b';'
    } else if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Reads an uploaded trial balance.
///
/// The first record is the header row; columns are matched by their French names
/// ("Numéro de compte", "Libellé du compte", "Débit", "Crédit", "Solde").
pub fn parse_balance_csv<R: Read>(mut reader: R, options: &CsvImportOptions) -> Result<Vec<BalanceRow>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    parse_balance_str(&content, options)
}

pub fn parse_balance_str(content: &str, options: &CsvImportOptions) -> Result<Vec<BalanceRow>> {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(content));

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = columns.row(&record);
        if row.account_number.is_empty() && options.skip_blank_accounts {
            warn!("Skipping balance line {}: no account number", idx + 2);
            continue;
        }
        rows.push(row);
    }

    debug!("Parsed {} balance rows", rows.len());
    Ok(rows)
}

/// The seven SYSCOHADA account classes shown in the balance view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountClass {
    Capitaux,
    Immobilisations,
    Stocks,
    Tiers,
    Tresorerie,
    Charges,
    Produits,
}

impl AccountClass {
    pub const ALL: [AccountClass; 7] = [
        AccountClass::Capitaux,
        AccountClass::Immobilisations,
        AccountClass::Stocks,
        AccountClass::Tiers,
        AccountClass::Tresorerie,
        AccountClass::Charges,
        AccountClass::Produits,
    ];

    pub fn from_account_number(account_number: &str) -> Option<Self> {
        match account_number.trim().chars().next()? {
            '1' => Some(AccountClass::Capitaux),
            '2' => Some(AccountClass::Immobilisations),
            '3' => Some(AccountClass::Stocks),
            '4' => Some(AccountClass::Tiers),
            '5' => Some(AccountClass::Tresorerie),
            '6' => Some(AccountClass::Charges),
            '7' => Some(AccountClass::Produits),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountClass::Capitaux => "Classe 1 : Comptes de Capitaux",
            AccountClass::Immobilisations => "Classe 2 : Comptes d'Immobilisations",
            AccountClass::Stocks => "Classe 3 : Comptes de Stocks",
            AccountClass::Tiers => "Classe 4 : Comptes de Tiers",
            AccountClass::Tresorerie => "Classe 5 : Comptes de Trésorerie",
            AccountClass::Charges => "Classe 6 : Comptes de Charges",
            AccountClass::Produits => "Classe 7 : Comptes de Produits",
        }
    }
}

/// Groups rows by account class. Every class is present, possibly empty; rows of classes
/// 8 and 9 are left out.
pub fn group_by_class(rows: &[BalanceRow]) -> BTreeMap<AccountClass, Vec<BalanceRow>> {
    let mut classes: BTreeMap<AccountClass, Vec<BalanceRow>> = AccountClass::ALL
        .iter()
        .map(|class| (*class, Vec::new()))
        .collect();

    for row in rows {
        if let Some(class) = AccountClass::from_account_number(&row.account_number) {
            classes.entry(class).or_default().push(row.clone());
        }
    }

    classes
}
