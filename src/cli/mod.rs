use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::LedgerService;
use crate::config::Config;
use crate::domain::{
    AccountType, CategoryType, NewTransaction, TransactionFilter, TransactionPatch, UserId,
    format_amount, parse_amount,
};

/// Spendbook - expense tracker with consistent account balances
#[derive(Parser)]
#[command(name = "spendbook")]
#[command(about = "Track income and expenses per account; balances always match the ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides SPENDBOOK_DB_PATH)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Record a transaction (positive = income, negative = expense)
    Add {
        /// Signed amount (e.g., "1200.00" or "-45.50")
        #[arg(allow_negative_numbers = true)]
        amount: String,

        /// User ID or email
        #[arg(short, long)]
        user: String,

        /// Account ID
        #[arg(short, long)]
        account: Uuid,

        /// Category ID
        #[arg(short, long)]
        category: Uuid,

        /// Description of the transaction
        #[arg(short = 'm', long)]
        description: String,

        /// Date of the transaction (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Edit fields of a transaction
    Edit {
        /// Transaction ID
        id: Uuid,

        /// Move to another account of the same user
        #[arg(short, long)]
        account: Option<Uuid>,

        /// New category ID
        #[arg(short, long)]
        category: Option<Uuid>,

        /// New signed amount
        #[arg(long, allow_negative_numbers = true)]
        amount: Option<String>,

        /// New description
        #[arg(short = 'm', long)]
        description: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a transaction
    Remove {
        /// Transaction ID
        id: Uuid,
    },

    /// Show detailed transaction information
    Show {
        /// Transaction ID
        id: Uuid,
    },

    /// List transactions, newest first
    List {
        /// User ID or email
        #[arg(short, long)]
        user: String,

        /// Filter by account ID
        #[arg(short, long)]
        account: Option<Uuid>,

        /// Filter by category ID
        #[arg(short, long)]
        category: Option<Uuid>,

        /// Filter from date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,

        /// Minimum signed amount
        #[arg(long, allow_negative_numbers = true)]
        min: Option<String>,

        /// Maximum signed amount
        #[arg(long, allow_negative_numbers = true)]
        max: Option<String>,

        /// Page size (1-100)
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Number of matches to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Spending per category
    Summary {
        /// User ID or email
        #[arg(short, long)]
        user: String,

        /// From date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from_date: Option<String>,

        /// To date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,
    },

    /// Net total of a calendar month
    Monthly {
        /// User ID or email
        #[arg(short, long)]
        user: String,

        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,
    },

    /// Verify that every balance matches its transactions
    Check,

    /// Recompute an account balance from its transactions
    Reconcile {
        /// Account ID
        account: Uuid,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, accounts, full
        #[arg(default_value = "transactions")]
        export_type: String,

        /// User ID or email
        #[arg(short, long)]
        user: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Create {
        /// Email address (unique)
        email: String,

        /// Display name
        name: String,

        /// Currency code
        #[arg(short, long, default_value = "USD")]
        currency: String,
    },

    /// Show a user and their accounts
    Show {
        /// User ID or email
        user: String,
    },

    /// Update name or currency
    Update {
        /// User ID or email
        user: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        currency: Option<String>,
    },

    /// Delete a user without accounts
    Delete {
        /// User ID or email
        user: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account name
        name: String,

        /// Owner (user ID or email)
        #[arg(short, long)]
        user: String,

        /// Account type: bank, cash, credit_card
        #[arg(short = 't', long = "type", default_value = "bank")]
        account_type: String,
    },

    /// List a user's accounts
    List {
        /// Owner (user ID or email)
        #[arg(short, long)]
        user: String,

        /// Include inactive accounts
        #[arg(short, long)]
        all: bool,
    },

    /// Show account details
    Show {
        /// Account ID
        id: Uuid,
    },

    /// Rename, retype or (de)activate an account
    Update {
        /// Account ID
        id: Uuid,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 't', long = "type")]
        account_type: Option<String>,

        /// Mark the account active (true) or inactive (false)
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete an empty account
    Delete {
        /// Account ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Create {
        /// Category name
        name: String,

        /// Category type: income, expense
        #[arg(short = 't', long = "type")]
        category_type: String,

        /// Color as #RRGGBB
        #[arg(short, long)]
        color: Option<String>,
    },

    /// List categories
    List {
        /// Only income or expense categories
        #[arg(short = 't', long = "type")]
        category_type: Option<String>,
    },

    /// Rename or recolor a category
    Update {
        /// Category ID
        id: Uuid,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        color: Option<String>,
    },

    /// Delete an unused category
    Delete {
        /// Category ID
        id: Uuid,
    },
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let config = Config::from_env()?;
        Ok(match &self.database {
            Some(path) => config.with_database_path(path.clone()),
            None => config,
        })
    }

    pub async fn run(self) -> Result<()> {
        crate::logging::init_tracing(self.verbose);
        let config = self.config()?;

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&config).await?;
            println!("Database initialized: {}", config.database_path);
            return Ok(());
        }

        let service = LedgerService::connect(&config).await?;

        match self.command {
            Commands::Init => {}

            Commands::User(cmd) => run_user_command(&service, cmd).await?,

            Commands::Account(cmd) => run_account_command(&service, cmd).await?,

            Commands::Category(cmd) => run_category_command(&service, cmd).await?,

            Commands::Add {
                amount,
                user,
                account,
                category,
                description,
                date,
            } => {
                let user_id = resolve_user(&service, &user).await?;
                let amount = parse_amount(&amount)
                    .context("Invalid amount format. Use '50.00' or '-12.5'")?;
                let date = match date {
                    Some(date_str) => parse_date(&date_str)?,
                    None => Utc::now().date_naive(),
                };

                let details = service
                    .create_transaction(NewTransaction {
                        user_id,
                        account_id: account,
                        category_id: category,
                        amount,
                        description,
                        date,
                    })
                    .await?;

                println!(
                    "Recorded {} on {} ({}), balance now {}",
                    format_amount(details.transaction.amount),
                    details.account.name,
                    details.transaction.id,
                    format_amount(details.account.balance)
                );
            }

            Commands::Edit {
                id,
                account,
                category,
                amount,
                description,
                date,
            } => {
                let patch = TransactionPatch {
                    account_id: account,
                    category_id: category,
                    amount: amount
                        .map(|a| parse_amount(&a))
                        .transpose()
                        .context("Invalid amount")?,
                    description,
                    date: date.map(|d| parse_date(&d)).transpose()?,
                };
                if patch.is_empty() {
                    anyhow::bail!("Nothing to change. Pass at least one field to edit.");
                }

                let details = service.update_transaction(id, patch).await?;
                println!(
                    "Updated transaction {}: {} on {}",
                    details.transaction.id,
                    format_amount(details.transaction.amount),
                    details.account.name
                );
            }

            Commands::Remove { id } => {
                let removed = service.delete_transaction(id).await?;
                println!(
                    "Deleted transaction {} ({})",
                    removed.id,
                    format_amount(removed.amount)
                );
            }

            Commands::Show { id } => run_show_command(&service, id).await?,

            Commands::List {
                user,
                account,
                category,
                from_date,
                to_date,
                min,
                max,
                limit,
                offset,
            } => {
                let user_id = resolve_user(&service, &user).await?;
                let mut filter = TransactionFilter::for_user(user_id)
                    .with_dates(
                        from_date.map(|s| parse_date(&s)).transpose()?,
                        to_date.map(|s| parse_date(&s)).transpose()?,
                    )
                    .with_amounts(
                        min.map(|s| parse_amount(&s)).transpose().context("Invalid min")?,
                        max.map(|s| parse_amount(&s)).transpose().context("Invalid max")?,
                    )
                    .page(limit, offset);
                if let Some(account_id) = account {
                    filter = filter.with_account(account_id);
                }
                if let Some(category_id) = category {
                    filter = filter.with_category(category_id);
                }
                run_list_command(&service, filter).await?;
            }

            Commands::Summary {
                user,
                from_date,
                to_date,
            } => {
                let user_id = resolve_user(&service, &user).await?;
                let start = from_date.map(|s| parse_date(&s)).transpose()?;
                let end = to_date.map(|s| parse_date(&s)).transpose()?;
                run_summary_command(&service, user_id, start, end).await?;
            }

            Commands::Monthly { user, year, month } => {
                let user_id = resolve_user(&service, &user).await?;
                let today = Utc::now().date_naive();
                let monthly = service
                    .get_monthly_total(
                        user_id,
                        year.unwrap_or(today.year()),
                        month.unwrap_or(today.month()),
                    )
                    .await?;
                println!(
                    "{}-{:02} ({} to {}): {}",
                    monthly.year,
                    monthly.month,
                    monthly.first_day,
                    monthly.last_day,
                    format_amount(monthly.total)
                );
            }

            Commands::Check => run_check_command(&service).await?,

            Commands::Reconcile { account } => {
                let drift = service.reconcile_account(account).await?;
                if drift.stored == drift.expected {
                    println!(
                        "Account {} already consistent: {}",
                        account,
                        format_amount(drift.expected)
                    );
                } else {
                    println!(
                        "Account {} repaired: {} -> {}",
                        account,
                        format_amount(drift.stored),
                        format_amount(drift.expected)
                    );
                }
            }

            Commands::Export {
                export_type,
                user,
                output,
            } => {
                let user_id = resolve_user(&service, &user).await?;
                run_export_command(&service, user_id, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Create {
            email,
            name,
            currency,
        } => {
            let user = service.create_user(&email, &name, &currency).await?;
            println!("Created user: {} <{}> ({})", user.name, user.email, user.id);
        }

        UserCommands::Show { user } => {
            let user_id = resolve_user(service, &user).await?;
            let user = service.get_user(user_id).await?;
            let accounts = service.list_accounts(user_id, false).await?;

            println!("User: {}", user.name);
            println!("  ID:       {}", user.id);
            println!("  Email:    {}", user.email);
            println!("  Currency: {}", user.currency);
            println!(
                "  Created:  {}",
                user.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Accounts: {}", accounts.len());
        }

        UserCommands::Update {
            user,
            name,
            currency,
        } => {
            let user_id = resolve_user(service, &user).await?;
            let user = service
                .update_user(user_id, name.as_deref(), currency.as_deref())
                .await?;
            println!("Updated user: {} ({})", user.name, user.currency);
        }

        UserCommands::Delete { user } => {
            let user_id = resolve_user(service, &user).await?;
            service.delete_user(user_id).await?;
            println!("Deleted user: {}", user_id);
        }
    }
    Ok(())
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            name,
            user,
            account_type,
        } => {
            let user_id = resolve_user(service, &user).await?;
            let account_type = parse_account_type(&account_type)?;
            let account = service.create_account(user_id, &name, account_type).await?;
            println!(
                "Created account: {} ({}) {}",
                account.name, account.account_type, account.id
            );
        }

        AccountCommands::List { user, all } => {
            let user_id = resolve_user(service, &user).await?;
            let accounts = service.list_accounts(user_id, !all).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<36}  {:<20} {:<12} {:>12}",
                    "ID", "NAME", "TYPE", "BALANCE"
                );
                println!("{}", "-".repeat(84));
                for account in accounts {
                    println!(
                        "{:<36}  {:<20} {:<12} {:>12}{}",
                        account.id,
                        truncate(&account.name, 20),
                        account.account_type,
                        format_amount(account.balance),
                        if account.is_active { "" } else { "  (inactive)" }
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            let owner = service.get_user(account.user_id).await?;

            println!("Account: {}", account.name);
            println!("  ID:      {}", account.id);
            println!("  Owner:   {} <{}>", owner.name, owner.email);
            println!("  Type:    {}", account.account_type);
            println!(
                "  Active:  {}",
                if account.is_active { "yes" } else { "no" }
            );
            println!(
                "  Balance: {} {}",
                format_amount(account.balance),
                owner.currency
            );
            println!(
                "  Created: {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        AccountCommands::Update {
            id,
            name,
            account_type,
            active,
        } => {
            let account_type = account_type
                .map(|t| parse_account_type(&t))
                .transpose()?;
            let account = service
                .update_account(id, name.as_deref(), account_type, active)
                .await?;
            println!("Updated account: {} ({})", account.name, account.account_type);
        }

        AccountCommands::Delete { id } => {
            service.delete_account(id).await?;
            println!("Deleted account: {}", id);
        }
    }
    Ok(())
}

async fn run_category_command(service: &LedgerService, cmd: CategoryCommands) -> Result<()> {
    match cmd {
        CategoryCommands::Create {
            name,
            category_type,
            color,
        } => {
            let category_type = parse_category_type(&category_type)?;
            let category = service
                .create_category(&name, category_type, color.as_deref())
                .await?;
            println!(
                "Created category: {} ({}) {}",
                category.name, category.category_type, category.id
            );
        }

        CategoryCommands::List { category_type } => {
            let categories = match category_type {
                Some(t) => {
                    service
                        .list_categories_by_type(parse_category_type(&t)?)
                        .await?
                }
                None => service.list_categories().await?,
            };
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                println!("{:<36}  {:<20} {:<8} {:<8}", "ID", "NAME", "TYPE", "COLOR");
                println!("{}", "-".repeat(76));
                for category in categories {
                    println!(
                        "{:<36}  {:<20} {:<8} {:<8}",
                        category.id,
                        truncate(&category.name, 20),
                        category.category_type,
                        category.color
                    );
                }
            }
        }

        CategoryCommands::Update { id, name, color } => {
            let category = service
                .update_category(id, name.as_deref(), color.as_deref())
                .await?;
            println!("Updated category: {} {}", category.name, category.color);
        }

        CategoryCommands::Delete { id } => {
            service.delete_category(id).await?;
            println!("Deleted category: {}", id);
        }
    }
    Ok(())
}

async fn run_show_command(service: &LedgerService, id: Uuid) -> Result<()> {
    let details = service.get_transaction(id).await?;
    let transaction = &details.transaction;

    println!("Transaction: {}", transaction.id);
    println!("  Sequence:    {}", transaction.sequence);
    println!("  Date:        {}", transaction.date.format("%Y-%m-%d"));
    println!("  Amount:      {}", format_amount(transaction.amount));
    println!(
        "  Account:     {} ({})",
        details.account.name, details.account.id
    );
    println!(
        "  Category:    {} [{}]",
        details.category.name, details.category.category_type
    );
    println!("  Description: {}", transaction.description);
    println!("  Revision:    {}", transaction.revision);
    println!(
        "  Recorded at: {}",
        transaction.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if transaction.updated_at != transaction.created_at {
        println!(
            "  Updated at:  {}",
            transaction.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn run_list_command(service: &LedgerService, filter: TransactionFilter) -> Result<()> {
    let page = service.get_transactions(filter).await?;

    if page.items.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:<15} {:<15} DESCRIPTION",
        "DATE", "AMOUNT", "ACCOUNT", "CATEGORY"
    );
    println!("{}", "-".repeat(80));
    for details in &page.items {
        println!(
            "{:<12} {:>12} {:<15} {:<15} {}",
            details.transaction.date.format("%Y-%m-%d"),
            format_amount(details.transaction.amount),
            truncate(&details.account.name, 15),
            truncate(&details.category.name, 15),
            truncate(&details.transaction.description, 30)
        );
    }
    println!();
    println!(
        "Showing {}-{} of {}",
        u64::from(page.offset) + 1,
        u64::from(page.offset) + page.items.len() as u64,
        page.total_count
    );
    Ok(())
}

async fn run_summary_command(
    service: &LedgerService,
    user_id: UserId,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    let summaries = service.get_transaction_summary(user_id, start, end).await?;

    if summaries.is_empty() {
        println!("No transactions in this period.");
        return Ok(());
    }

    println!("{:<20} {:>14} {:>8}", "CATEGORY", "TOTAL", "COUNT");
    println!("{}", "-".repeat(44));
    for summary in summaries {
        println!(
            "{:<20} {:>14} {:>8}",
            truncate(&summary.category_name, 20),
            format_amount(summary.total_amount),
            summary.count
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Users:        {}", report.user_count);
    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    for drift in &report.drifts {
        println!(
            "  - account {}: stored {} but transactions sum to {}",
            drift.account_id,
            format_amount(drift.stored),
            format_amount(drift.expected)
        );
    }
    if report.ownership_violations > 0 {
        println!(
            "  - {} transaction(s) reference an account of another user",
            report.ownership_violations
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

async fn run_export_command(
    service: &LedgerService,
    user_id: UserId,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter.export_transactions_csv(user_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "accounts" => {
            let count = exporter.export_accounts_csv(user_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} accounts", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_user_json(user_id, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} accounts and {} transactions",
                    snapshot.accounts.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, accounts, full",
                export_type
            );
        }
    }

    Ok(())
}

/// Accept either a user ID or an email address.
async fn resolve_user(service: &LedgerService, user: &str) -> Result<UserId> {
    if let Ok(id) = Uuid::parse_str(user) {
        return Ok(id);
    }
    Ok(service.get_user_by_email(user).await?.id)
}

fn parse_account_type(s: &str) -> Result<AccountType> {
    AccountType::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid account type '{}'. Valid types: bank, cash, credit_card",
            s
        )
    })
}

fn parse_category_type(s: &str) -> Result<CategoryType> {
    CategoryType::from_str(s).ok_or_else(|| {
        anyhow::anyhow!("Invalid category type '{}'. Valid types: income, expense", s)
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}
