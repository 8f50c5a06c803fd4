use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

mod config;
mod db;
mod error;
mod job;
mod loader;
mod logger;
mod models;
mod notify;
mod report;
mod status;
mod store;
mod summary;
mod templates;

use crate::config::Config;
use crate::job::ReminderJob;
use crate::notify::{EmailLog, TracingSink};
use crate::status::ScheduleBook;
use crate::store::Store;

#[derive(Parser)]
#[command(name = "learntrack")]
#[command(about = "Course deadline tracking and daily reminder job", long_about = None)]
struct Cli {
    /// Read users, schedules and enrollments from JSON files in this directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import users, course schedules and enrollments from CSV files
    Import {
        #[arg(long)]
        users: Option<PathBuf>,
        #[arg(long)]
        schedules: Option<PathBuf>,
        #[arg(long)]
        enrollments: Option<PathBuf>,
    },
    /// Show course statuses and a summary for one user
    Status {
        #[arg(long)]
        user: String,
        /// Evaluation date (UTC calendar day), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate a markdown dashboard
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Run the daily reminder job
    Run {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a page of the email log
    Logs {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init_logging()?;

    let cli = Cli::parse();
    let config = Config::from_env();
    let store = Store::open(cli.data_dir, &config).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool()?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            users,
            schedules,
            enrollments,
        } => {
            let counts = db::import_csv(
                store.pool()?,
                users.as_deref(),
                schedules.as_deref(),
                enrollments.as_deref(),
            )
            .await?;
            println!(
                "Imported {} users, {} schedules and {} enrollments.",
                counts.users, counts.schedules, counts.enrollments
            );
        }
        Commands::Status { user, date } => {
            let on = date.unwrap_or_else(today);
            let data = store.load().await?;
            let profile = data
                .users
                .iter()
                .find(|candidate| candidate.user_id == user)
                .with_context(|| format!("user {user} not found"))?;

            let book = ScheduleBook::new(&data.schedules);
            let classified = book.classify_all(
                data.enrollments.iter().filter(|e| e.user_id == profile.user_id),
                on,
            );

            println!("{} <{}> as of {}", profile.name, profile.email, on);
            if classified.statuses.is_empty() && classified.skipped.is_empty() {
                println!("No enrollments found.");
                return Ok(());
            }
            for status in &classified.statuses {
                println!("- {} [{}] {}", status.course_id, status.status, status.message);
            }
            for skipped in &classified.skipped {
                println!("- skipped: {skipped}");
            }

            let summary = summary::summarize(&classified.statuses);
            println!(
                "{} of {} completed ({:.0}%), {} in progress, {} needing attention ({})",
                summary.completed,
                summary.total_courses,
                summary.progress_percentage,
                summary.in_progress,
                summary.needs_attention_count,
                summary.severity().label()
            );
        }
        Commands::Report { date, out } => {
            let on = date.unwrap_or_else(today);
            let data = store.load().await?;
            let report = report::build_report(&data, on);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Run { date, json } => {
            let on = date.unwrap_or_else(today);
            let data = store.load().await?;
            let job = ReminderJob::new(config.sender.clone());
            let mut sink = TracingSink::default();
            let mut log = EmailLog::new();

            let report = job.run(&data, on, &mut sink, &mut log);
            let saved = store.append_email_log(log.records()).await?;
            tracing::info!(saved, "Email log updated");

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            let stats = &report.stats;
            println!("Reminder job for {on}");
            println!("Users processed: {}", stats.users_processed);
            println!("Users needing reminders: {}", stats.users_needing_reminders);
            println!("Reminder emails sent: {}", stats.reminder_emails_sent);
            println!("Manager summaries sent: {}", stats.manager_summaries_sent);
            println!("Total emails sent: {}", stats.total_emails_sent);
            println!("Delivery failures: {}", stats.delivery_failures);

            if report.warnings.is_empty() {
                println!("Job completed.");
            } else {
                println!(
                    "Job completed with {} warnings ({} schedules missing, {} date problems, {} unknown users):",
                    report.warnings.len(),
                    stats.schedules_missing,
                    stats.invalid_dates,
                    stats.orphaned_enrollments
                );
                for warning in &report.warnings {
                    println!("- {warning}");
                }
            }
        }
        Commands::Logs { page, per_page } => {
            let (page, stats) = store.email_log_page(page, per_page).await?;
            if page.logs.is_empty() {
                println!("No emails on this page.");
            }
            for record in &page.logs {
                println!(
                    "{} {} -> {}: {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.kind.as_str(),
                    record.to,
                    record.subject
                );
            }
            println!(
                "Page {} of {} ({} emails: {} reminders, {} manager summaries)",
                page.page,
                page.total_pages,
                stats.total_sent,
                stats.user_reminders,
                stats.manager_summaries
            );
        }
    }

    Ok(())
}
