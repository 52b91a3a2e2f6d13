use anyhow::Context;
use syscohada_statements::{
    generate_financial_statements, group_by_class, parse_balance_str, CsvImportOptions, Exercice,
    InMemoryBalanceStore, StatementType,
};

const BALANCE: &str = "\
Numéro de compte;Libellé du compte;Débit;Crédit;Solde
101000;Capital social;;10 000 000,00;10 000 000,00
162000;Emprunts;;5 000 000,00;5 000 000,00
401100;Fournisseurs;;3 000 000,00;3 000 000,00
222000;Terrains bâtis;8 000 000,00;;8 000 000,00
311000;Marchandises;4 000 000,00;;4 000 000,00
411100;Clients;2 500 000,00;;2 500 000,00
521000;Banque;5 600 000,00;;5 600 000,00
701100;Ventes de marchandises;;12 000 000,00;12 000 000,00
601100;Achats de marchandises;7 500 000,00;;7 500 000,00
661000;Salaires;2 400 000,00;;2 400 000,00
";

fn main() -> anyhow::Result<()> {
    let rows = parse_balance_str(BALANCE, &CsvImportOptions::default())
        .context("balance CSV should parse")?;

    println!("Balance par classe:");
    for (class, rows) in group_by_class(&rows) {
        let total: f64 = rows.iter().map(|row| row.solde_amount()).sum();
        println!("  {:<40} {:>3} comptes {:>15.2}", class.label(), rows.len(), total);
    }

    let mut store = InMemoryBalanceStore::new();
    store.save_balance("demo-co", "ex-2023", rows);
    let exercice = Exercice::for_year("ex-2023", "demo-co", 2023)?;

    let provider = store.clone();
    let statements = generate_financial_statements(&provider, &mut store, &exercice)?;

    match statements.verify(0.01) {
        Ok(check) => println!("\nActif = Passif = {:.2}", check.actif),
        Err(e) => println!("\nBilan déséquilibré: {}", e),
    }

    println!("\n{}", statements.get(StatementType::CompteResultat).to_markdown());
    println!("{}", statements.bilan_actif.to_csv()?);

    Ok(())
}
