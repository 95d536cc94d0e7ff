use anyhow::Result;
use chrono::{DateTime, Utc};
use legalitea::config::mask_sensitive_data;
use legalitea::database::Database;
use legalitea::models::SavedAnalysis;
use std::env;

#[derive(Debug, Default)]
struct PurgeStats {
    active: u64,
    expired_found: usize,
    deleted: u64,
}

impl PurgeStats {
    fn print_summary(&self, dry_run: bool) {
        println!("\n=== Purge Summary ===");
        println!("Active analyses: {}", self.active);
        println!("Expired analyses found: {}", self.expired_found);

        if dry_run {
            println!("Analyses that WOULD BE deleted: {}", self.expired_found);
            println!("\n** DRY RUN MODE - No changes were made **");
        } else {
            println!("Analyses deleted: {}", self.deleted);
        }
    }
}

fn preview_line(saved: &SavedAnalysis, now: DateTime<Utc>) -> String {
    let expired_for = now - saved.expires_at;
    format!(
        "{} | {} | {} | expired {}h ago",
        saved.id,
        mask_sensitive_data(&saved.email),
        saved.document_name.as_deref().unwrap_or("(unnamed)"),
        expired_for.num_hours()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let dry_run = args.iter().any(|arg| arg == "--dry-run");

    println!("=== Expired Analysis Purge ===");
    if dry_run {
        println!("** RUNNING IN DRY-RUN MODE **");
    }

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:legalitea.db".to_string());
    println!("\nConnecting to database: {}", mask_sensitive_data(&database_url));
    let db = Database::new(&database_url).await?;

    let now = Utc::now();
    let expired = db.list_expired(now).await?;

    let mut stats = PurgeStats {
        active: db.count_active(now).await?,
        expired_found: expired.len(),
        ..PurgeStats::default()
    };

    if expired.is_empty() {
        println!("\nNo expired analyses found.");
        stats.print_summary(dry_run);
        return Ok(());
    }

    println!("\nFound {} expired analyses:", expired.len());
    for (i, saved) in expired.iter().enumerate() {
        // Show first 10 in live mode, all in dry-run
        if i < 10 || dry_run {
            println!("  {}", preview_line(saved, now));
        } else {
            println!("  ... and {} more", expired.len() - 10);
            break;
        }
    }

    if !dry_run {
        stats.deleted = db.delete_expired(now).await?;
    }

    stats.print_summary(dry_run);
    Ok(())
}
