//! The centsible command line interface.

use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use time::{Date, macros::format_description};

use centsible::{
    Ledger, LedgerSnapshot,
    models::{
        AccountId, AccountKind, AccountUpdate, BudgetId, CategoryId, Month, NewAccount, Transaction,
        TransactionDraft, TransactionId, TransactionKind, category_info, expense_categories,
        income_categories,
    },
    stores::{JsonLedgerStore, LedgerStore, SqliteLedgerStore, TransactionFilter, initialize},
};

#[derive(Parser, Debug)]
#[command(version, about = "Track accounts, transactions and monthly budgets.")]
struct Cli {
    #[command(flatten)]
    backend: Backend,

    /// The owner whose ledger to operate on (SQLite databases hold one
    /// ledger per owner).
    #[arg(long, default_value = "default")]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Backend {
    /// Path to a SQLite database file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Path to a directory of JSON ledger files.
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    AddAccount {
        name: String,

        /// bank, cash, credit, savings or other.
        #[arg(long, default_value = "bank")]
        kind: AccountKind,

        /// The opening balance.
        #[arg(long, default_value_t = 0.0)]
        balance: f64,
    },
    /// List all accounts and the total balance.
    Accounts,
    /// Edit an account's name or kind.
    UpdateAccount {
        id: AccountId,

        #[arg(long)]
        name: Option<String>,

        /// bank, cash, credit, savings or other.
        #[arg(long)]
        kind: Option<AccountKind>,
    },
    /// Delete an account that no transaction references.
    DeleteAccount { id: AccountId },
    /// Record income into an account.
    Income {
        amount: f64,
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        category: CategoryId,
        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record an expense from an account.
    Expense {
        amount: f64,
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        category: CategoryId,
        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move money between two accounts.
    Transfer {
        amount: f64,
        #[arg(long)]
        from: AccountId,
        #[arg(long)]
        to: AccountId,
        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a transaction and undo its balance changes.
    DeleteTransaction { id: TransactionId },
    /// List the built-in expense and income categories.
    Categories,
    /// List transactions, optionally filtered.
    List {
        #[arg(long)]
        account: Option<AccountId>,
        /// income, expense or transfer.
        #[arg(long)]
        kind: Option<TransactionKind>,
        /// Earliest date to include, as YYYY-MM-DD.
        #[arg(long)]
        from: Option<String>,
        /// Latest date to include, as YYYY-MM-DD.
        #[arg(long)]
        to: Option<String>,
        /// Only transactions within this month, as YYYY-MM.
        #[arg(long)]
        month: Option<Month>,
    },
    /// Show total income and expenses for a month.
    Summary {
        /// The month as YYYY-MM.
        month: Month,
    },
    /// Set the budget for a category and month.
    SetBudget {
        category: CategoryId,
        /// The month as YYYY-MM.
        month: Month,
        amount: f64,
    },
    /// List budgets, optionally only for one month.
    Budgets {
        /// The month as YYYY-MM.
        #[arg(long)]
        month: Option<Month>,
    },
    /// Delete a budget.
    DeleteBudget { id: BudgetId },
    /// Show spending against the budget for a category and month.
    Usage {
        category: CategoryId,
        /// The month as YYYY-MM.
        month: Month,
    },
    /// Write the whole ledger as JSON to a file or standard output.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the whole ledger with a previously exported snapshot.
    Import { path: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match (&cli.backend.db, &cli.backend.dir) {
        (Some(path), _) => open_sqlite_ledger(path, &cli.owner)
            .and_then(|ledger| run_command(ledger, cli.command)),
        (None, Some(directory)) => {
            run_command(Ledger::new(JsonLedgerStore::new(directory)), cli.command)
        }
        // The argument group requires one of the two.
        (None, None) => unreachable!(),
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn open_sqlite_ledger(
    path: &PathBuf,
    owner: &str,
) -> Result<Ledger<SqliteLedgerStore>, Box<dyn std::error::Error>> {
    let connection = Connection::open(path)?;
    initialize(&connection)?;

    Ok(Ledger::new(SqliteLedgerStore::new(
        Arc::new(Mutex::new(connection)),
        owner,
    )))
}

fn run_command<S: LedgerStore>(
    mut ledger: Ledger<S>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::AddAccount {
            name,
            kind,
            balance,
        } => {
            let account = ledger.create_account(NewAccount {
                name,
                kind,
                balance,
            })?;
            println!("created account {} ({})", account.id, account.name);
        }
        Command::Accounts => {
            for account in ledger.accounts()? {
                println!(
                    "{}  {:<20} {:<8} {:>12.2}",
                    account.id, account.name, account.kind, account.balance
                );
            }
            println!("total balance: {:.2}", ledger.total_balance()?);
        }
        Command::UpdateAccount { id, name, kind } => {
            let account = ledger.update_account(id, AccountUpdate { name, kind })?;
            println!("updated account {} ({})", account.id, account.name);
        }
        Command::DeleteAccount { id } => {
            ledger.delete_account(id)?;
            println!("deleted account {id}");
        }
        Command::Income {
            amount,
            account,
            category,
            date,
            note,
        } => {
            let mut draft = TransactionDraft::income(amount, account, category, parse_date(&date)?);
            if let Some(note) = note {
                draft = draft.note(note);
            }
            let transaction = ledger.add_transaction(draft)?;
            println!("recorded income {}", transaction.id);
        }
        Command::Expense {
            amount,
            account,
            category,
            date,
            note,
        } => {
            let mut draft =
                TransactionDraft::expense(amount, account, category, parse_date(&date)?);
            if let Some(note) = note {
                draft = draft.note(note);
            }
            let transaction = ledger.add_transaction(draft)?;
            println!("recorded expense {}", transaction.id);
        }
        Command::Transfer {
            amount,
            from,
            to,
            date,
            note,
        } => {
            let mut draft = TransactionDraft::transfer(amount, from, to, parse_date(&date)?);
            if let Some(note) = note {
                draft = draft.note(note);
            }
            let transaction = ledger.add_transaction(draft)?;
            println!("recorded transfer {}", transaction.id);
        }
        Command::DeleteTransaction { id } => {
            ledger.delete_transaction(id)?;
            println!("deleted transaction {id}");
        }
        Command::Categories => {
            println!("expense categories:");
            for info in expense_categories() {
                println!("  {:<16} {}", info.id, info.name);
            }
            println!("income categories:");
            for info in income_categories() {
                println!("  {:<16} {}", info.id, info.name);
            }
        }
        Command::List {
            account,
            kind,
            from,
            to,
            month,
        } => {
            let filter = TransactionFilter {
                account_id: account,
                kind,
                date_from: from.as_deref().map(parse_date).transpose()?,
                date_to: to.as_deref().map(parse_date).transpose()?,
                month,
            };

            for transaction in ledger.transactions(&filter)? {
                print_transaction(&transaction);
            }
        }
        Command::Summary { month } => {
            let summary = ledger.monthly_summary(month)?;
            println!("income:  {:>12.2}", summary.income);
            println!("expense: {:>12.2}", summary.expense);
            println!("net:     {:>12.2}", summary.net());
        }
        Command::SetBudget {
            category,
            month,
            amount,
        } => {
            let budget = ledger.upsert_budget(category, month, amount)?;
            println!(
                "budget for {} in {}: {:.2}",
                category_name(&budget.category),
                budget.month,
                budget.amount
            );
        }
        Command::Budgets { month } => {
            for budget in ledger.budgets(month)? {
                println!(
                    "{}  {}  {:<16} {:>12.2}",
                    budget.id,
                    budget.month,
                    category_name(&budget.category),
                    budget.amount
                );
            }
        }
        Command::DeleteBudget { id } => {
            ledger.delete_budget(id)?;
            println!("deleted budget {id}");
        }
        Command::Usage { category, month } => {
            let usage = ledger.budget_usage(&category, month)?;
            println!("spent: {:.2}", usage.spent);
            match usage.target {
                Some(target) => println!(
                    "budget: {:.2} ({:.2} remaining)",
                    target,
                    usage.remaining().unwrap_or_default()
                ),
                None => println!("no budget set for {}", category_name(&category)),
            }
        }
        Command::Export { out } => {
            let snapshot = ledger.export()?;
            match out {
                Some(path) => {
                    serde_json::to_writer_pretty(File::create(&path)?, &snapshot)?;
                    println!("exported ledger to {}", path.display());
                }
                None => {
                    serde_json::to_writer_pretty(std::io::stdout().lock(), &snapshot)?;
                    println!();
                }
            }
        }
        Command::Import { path } => {
            let snapshot: LedgerSnapshot = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
            ledger.import(snapshot)?;
            println!("imported ledger from {}", path.display());
        }
    }

    Ok(())
}

fn parse_date(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
}

fn print_transaction(transaction: &Transaction) {
    let detail = match transaction.kind {
        TransactionKind::Transfer => match transaction.to_account_id {
            Some(to) => format!("-> {to}"),
            None => "-> ?".to_string(),
        },
        _ => transaction
            .category
            .as_ref()
            .map(category_name)
            .unwrap_or_default(),
    };

    println!(
        "{}  {}  {:<8} {:>12.2}  {}  {}",
        transaction.id,
        transaction.date,
        transaction.kind,
        transaction.amount,
        detail,
        transaction.note.as_deref().unwrap_or("")
    );
}

/// The display name for a category, falling back to the raw ID for
/// categories outside the built-in catalogues.
fn category_name(category: &CategoryId) -> String {
    match category_info(category) {
        Some(info) => info.name.to_string(),
        None => category.as_str().to_string(),
    }
}
