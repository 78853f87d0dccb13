//! Bill command - upload, review, schedule and pay stored bills.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use console::style;
use rust_decimal::Decimal;
use tracing::debug;

use economiza_core::extraction::rules::{parse_brazilian_amount, parse_dmy_date};
use economiza_core::models::EconomizaConfig;
use economiza_core::service::{ChatEntry, NewBill, ReceiptUpload, ScheduleRequest};
use economiza_core::{
    Bill, BillCorrections, BillFilter, BillId, BillService, BillStatus, BillType,
    DocumentTextExtractor, JsonFileStore, LocalStorage, PaymentId, PaymentMethod, UserId,
};

use super::extract::build_processor;
use super::{content_type_for, load_config};

/// Arguments for the bill command.
#[derive(Args)]
pub struct BillArgs {
    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<UserId>,

    /// Use only the rule-based parser
    #[arg(long, global = true)]
    no_ai: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: BillCommand,
}

#[derive(Subcommand)]
enum BillCommand {
    /// Store a bill document (PDF or image)
    Upload {
        file: PathBuf,
        /// Run extraction right after storing
        #[arg(long)]
        process: bool,
    },

    /// Run extraction over a bill's document
    Process { bill: BillId },

    /// List bills
    List(ListArgs),

    /// Show a bill with its document and payments
    Show { bill: BillId },

    /// Record a bill or income by hand
    Create(CreateArgs),

    /// Confirm a bill, optionally correcting it
    Confirm(ConfirmArgs),

    /// Reject a bill
    Reject { bill: BillId },

    /// Schedule the payment of a confirmed bill
    Schedule(ScheduleArgs),

    /// Mark a bill as paid
    Pay(PayArgs),

    /// Mark past-due bills as overdue
    Overdue {
        /// Reference date (default: today)
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },

    /// Delete a bill and its files
    Delete { bill: BillId },

    /// Check a payment against its bill
    Reconcile { payment: PaymentId },
}

#[derive(Args)]
struct ListArgs {
    /// Earliest due date
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Latest due date
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    #[arg(long)]
    status: Option<BillStatus>,

    /// Issuer substring
    #[arg(long)]
    issuer: Option<String>,

    /// Only document-derived bills
    #[arg(long, conflicts_with = "manual_only")]
    bills_only: bool,

    /// Only manual entries
    #[arg(long)]
    manual_only: bool,
}

#[derive(Args)]
struct CreateArgs {
    /// Amount (150.50 or 150,50)
    #[arg(long, value_parser = parse_amount)]
    amount: Decimal,

    /// expense or income
    #[arg(long = "type", default_value = "expense")]
    kind: BillType,

    #[arg(long, value_parser = parse_date)]
    due: Option<NaiveDate>,

    #[arg(long)]
    issuer: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    barcode: Option<String>,

    /// Initial status (pending, confirmed or scheduled)
    #[arg(long)]
    status: Option<BillStatus>,

    /// Split the amount into monthly installments
    #[arg(long)]
    installments: Option<u32>,
}

#[derive(Args)]
struct ConfirmArgs {
    bill: BillId,

    #[arg(long, value_parser = parse_amount)]
    amount: Option<Decimal>,

    #[arg(long, value_parser = parse_date)]
    due: Option<NaiveDate>,

    #[arg(long)]
    issuer: Option<String>,

    #[arg(long)]
    barcode: Option<String>,

    #[arg(long)]
    category: Option<String>,
}

#[derive(Args)]
struct ScheduleArgs {
    bill: BillId,

    /// Payment date
    #[arg(long, value_parser = parse_date)]
    date: NaiveDate,

    #[arg(long)]
    method: Option<PaymentMethod>,

    /// Reminder offsets in days before the due date
    #[arg(long, value_delimiter = ',')]
    notify: Option<Vec<u32>>,

    /// Reference date (default: today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Args)]
struct PayArgs {
    bill: BillId,

    /// Execution date (default: today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Payment receipt to store
    #[arg(long)]
    receipt: Option<PathBuf>,
}

/// Accept ISO (2024-12-15) or Brazilian (15/12/2024) dates.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_dmy_date(s))
        .ok_or_else(|| format!("invalid date: {} (use YYYY-MM-DD or DD/MM/YYYY)", s))
}

/// Accept plain (150.50) or Brazilian (1.234,56) amounts.
fn parse_amount(s: &str) -> Result<Decimal, String> {
    let parsed = if s.contains(',') {
        parse_brazilian_amount(s)
    } else {
        Decimal::from_str(s.trim()).ok()
    };
    parsed.ok_or_else(|| format!("invalid amount: {}", s))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn build_service(config: &EconomizaConfig, no_ai: bool) -> anyhow::Result<BillService> {
    let repo = JsonFileStore::open(&config.storage.store_file)?;
    let storage = LocalStorage::new(&config.storage.data_dir);
    let ocr = DocumentTextExtractor::from_config(config);
    debug!(
        "Store at {}, documents under {}",
        config.storage.store_file.display(),
        config.storage.data_dir.display()
    );

    Ok(BillService::new(
        Arc::new(repo),
        Arc::new(storage),
        Arc::new(ocr),
        build_processor(config, no_ai),
    )
    .with_config(config))
}

pub async fn run(args: BillArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let owner = args.user.unwrap_or(config.user_id);
    let service = build_service(&config, args.no_ai)?;
    let json = args.json;

    match args.command {
        BillCommand::Upload { file, process } => {
            let bytes = fs::read(&file)?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document");
            let receipt = service
                .upload(owner, filename, content_type_for(&file), &bytes)
                .await?;

            if process {
                let processed = service.process_document(owner, receipt.bill_id).await?;
                print_value(json, &processed, || {
                    format!(
                        "{} Bill {} extracted with confidence {:.2} -> {}",
                        style("✓").green(),
                        receipt.bill_id,
                        processed.fields.confidence,
                        processed.bill_status
                    )
                })?;
            } else {
                print_value(json, &receipt, || {
                    format!("{} Uploaded bill {}", style("✓").green(), receipt.bill_id)
                })?;
            }
        }
        BillCommand::Process { bill } => {
            let processed = service.process_document(owner, bill).await?;
            print_value(json, &processed, || {
                format!(
                    "{} Bill {} extracted with confidence {:.2} -> {}",
                    style("✓").green(),
                    bill,
                    processed.fields.confidence,
                    processed.bill_status
                )
            })?;
        }
        BillCommand::List(list) => {
            let filter = BillFilter {
                from: list.from,
                to: list.to,
                status: list.status,
                issuer: list.issuer,
                is_bill: if list.bills_only {
                    Some(true)
                } else if list.manual_only {
                    Some(false)
                } else {
                    None
                },
            };
            let bills = service.list(owner, &filter).await?;
            print_value(json, &bills, || format_bill_table(&bills))?;
        }
        BillCommand::Show { bill } => {
            let details = service.get(owner, bill).await?;
            print_value(json, &details, || {
                let mut out = format_bill(&details.bill);
                if let Some(document) = &details.document {
                    out.push_str(&format!("Document:   {}\n", document.storage_path));
                }
                for payment in &details.payments {
                    out.push_str(&format!(
                        "Payment:    {} {} {} {}\n",
                        payment.id,
                        payment.method,
                        payment
                            .executed_date
                            .or(payment.scheduled_date)
                            .map(|d| d.to_string())
                            .unwrap_or_default(),
                        payment.status
                    ));
                }
                out
            })?;
        }
        BillCommand::Create(create) => {
            let bills = match create.installments {
                Some(count) => {
                    service
                        .create_from_chat(
                            owner,
                            ChatEntry {
                                kind: create.kind,
                                amount: create.amount,
                                issuer: create.issuer,
                                category: create.category,
                                due_date: create.due,
                                installments: count,
                            },
                        )
                        .await?
                }
                None => {
                    let bill = service
                        .create_manual(
                            owner,
                            NewBill {
                                kind: create.kind,
                                amount: create.amount,
                                due_date: create.due,
                                issuer: create.issuer,
                                category: create.category,
                                barcode: create.barcode,
                                status: create.status,
                                is_bill: None,
                            },
                        )
                        .await?;
                    vec![bill]
                }
            };
            print_value(json, &bills, || {
                bills
                    .iter()
                    .map(|b| format!("{} Created bill {}", style("✓").green(), b.id))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        BillCommand::Confirm(confirm) => {
            let corrections = BillCorrections {
                issuer: confirm.issuer,
                amount: confirm.amount,
                due_date: confirm.due,
                barcode: confirm.barcode,
                category: confirm.category,
            };
            let bill = service.confirm(owner, confirm.bill, Some(corrections)).await?;
            print_value(json, &bill, || {
                format!("{} Confirmed bill {}", style("✓").green(), bill.id)
            })?;
        }
        BillCommand::Reject { bill } => {
            let bill = service.reject(owner, bill).await?;
            print_value(json, &bill, || {
                format!("{} Rejected bill {}", style("✓").green(), bill.id)
            })?;
        }
        BillCommand::Schedule(schedule) => {
            let request = ScheduleRequest {
                scheduled_date: schedule.date,
                method: schedule.method,
                notify_before_days: schedule.notify,
            };
            let payment = service
                .schedule(owner, schedule.bill, request, schedule.today.unwrap_or_else(today))
                .await?;
            print_value(json, &payment, || {
                let reminders = payment
                    .reminders
                    .iter()
                    .map(|r| r.remind_on.to_string())
                    .collect::<Vec<_>>();
                format!(
                    "{} Scheduled payment {} on {} ({} reminders: {})",
                    style("✓").green(),
                    payment.id,
                    schedule.date,
                    reminders.len(),
                    reminders.join(", ")
                )
            })?;
        }
        BillCommand::Pay(pay) => {
            let receipt = pay.receipt.as_deref().map(read_receipt).transpose()?;
            let payment = service
                .mark_paid(owner, pay.bill, pay.date.unwrap_or_else(today), receipt)
                .await?;
            print_value(json, &payment, || {
                format!(
                    "{} Bill {} paid (payment {})",
                    style("✓").green(),
                    pay.bill,
                    payment.id
                )
            })?;
        }
        BillCommand::Overdue { today: date } => {
            let count = service
                .refresh_overdue(owner, date.unwrap_or_else(today))
                .await?;
            print_value(json, &serde_json::json!({ "overdue": count }), || {
                format!("{} {} bills marked overdue", style("ℹ").blue(), count)
            })?;
        }
        BillCommand::Delete { bill } => {
            service.delete(owner, bill).await?;
            print_value(json, &serde_json::json!({ "deleted": bill }), || {
                format!("{} Deleted bill {}", style("✓").green(), bill)
            })?;
        }
        BillCommand::Reconcile { payment } => {
            let result = service.reconcile(owner, payment).await?;
            print_value(json, &result, || {
                if result.matched {
                    format!(
                        "{} Payment {} reconciled (confidence {:.2})",
                        style("✓").green(),
                        payment,
                        result.match_confidence
                    )
                } else {
                    format!(
                        "{} No match for payment {} (confidence {:.2})",
                        style("✗").red(),
                        payment,
                        result.match_confidence
                    )
                }
            })?;
        }
    }

    Ok(())
}

fn read_receipt(path: &Path) -> anyhow::Result<ReceiptUpload> {
    Ok(ReceiptUpload {
        filename: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("receipt")
            .to_string(),
        content_type: content_type_for(path).to_string(),
        bytes: fs::read(path)?,
    })
}

fn print_value<T: serde::Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn format_bill(bill: &Bill) -> String {
    let mut out = String::new();
    out.push_str(&format!("Bill:       {}\n", bill.id));
    out.push_str(&format!("Status:     {}\n", bill.status));
    out.push_str(&format!("Type:       {}\n", bill.kind));
    out.push_str(&format!("Issuer:     {}\n", bill.issuer.as_deref().unwrap_or("-")));
    out.push_str(&format!(
        "Amount:     {}\n",
        bill.amount
            .map(|a| format!("{} {}", a, bill.currency))
            .unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "Due date:   {}\n",
        bill.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    if let Some(barcode) = &bill.barcode {
        out.push_str(&format!("Barcode:    {}\n", barcode));
    }
    if let Some(category) = &bill.category {
        out.push_str(&format!("Category:   {}\n", category));
    }
    out.push_str(&format!("Confidence: {:.2}\n", bill.confidence));
    out
}

fn format_bill_table(bills: &[Bill]) -> String {
    if bills.is_empty() {
        return "No bills found".to_string();
    }

    bills
        .iter()
        .map(|b| {
            format!(
                "{}  {:<10}  {:>12}  {:<10}  {}",
                b.id,
                b.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                b.amount.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
                b.status,
                b.issuer.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
