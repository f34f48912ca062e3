use anyhow::Result;
use ochem_academy::database::Database;
use sqlx::Row;
use std::env;

// Columns the draft workflow added to the questions table. Stores created
// before that release are missing them and every publish call fails with
// "no such column: published" until they are added.
const DRAFT_WORKFLOW_COLUMNS: &[(&str, &str)] = &[
    ("published", "INTEGER NOT NULL DEFAULT 0"),
    ("draft_of", "TEXT"),
];

#[derive(Debug)]
struct MigrationStats {
    existing_columns: Vec<String>,
    missing_columns: Vec<String>,
    columns_added: usize,
    errors: Vec<String>,
}

impl MigrationStats {
    fn new() -> Self {
        Self {
            existing_columns: Vec::new(),
            missing_columns: Vec::new(),
            columns_added: 0,
            errors: Vec::new(),
        }
    }

    fn print_summary(&self, dry_run: bool) {
        println!("\n=== Migration Summary ===");
        println!("Columns already present: {:?}", self.existing_columns);
        println!("Columns missing: {:?}", self.missing_columns);

        if dry_run {
            println!("Columns that WOULD BE added: {}", self.missing_columns.len());
            println!("\n** DRY RUN MODE - No changes were made **");
        } else {
            println!("Columns successfully added: {}", self.columns_added);
            if !self.errors.is_empty() {
                println!("Errors encountered: {}", self.errors.len());
                for error in &self.errors {
                    println!("  - {}", error);
                }
            }
        }
    }
}

async fn find_missing_columns(db: &Database) -> Result<(Vec<String>, Vec<String>)> {
    let rows = sqlx::query("PRAGMA table_info(questions)")
        .fetch_all(&db.pool)
        .await?;

    let present: Vec<String> = rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    let missing = DRAFT_WORKFLOW_COLUMNS
        .iter()
        .filter(|(name, _)| !present.iter().any(|p| p == name))
        .map(|(name, _)| name.to_string())
        .collect();

    Ok((present, missing))
}

async fn add_columns(db: &Database, missing: &[String], stats: &mut MigrationStats) {
    for (name, definition) in DRAFT_WORKFLOW_COLUMNS {
        if !missing.iter().any(|m| m == name) {
            continue;
        }

        let sql = format!("ALTER TABLE questions ADD COLUMN {name} {definition}");
        match sqlx::query(&sql).execute(&db.pool).await {
            Ok(_) => {
                stats.columns_added += 1;
                println!("✓ Added column '{}' to questions table", name);
            }
            Err(e) => {
                stats
                    .errors
                    .push(format!("Failed to add column '{}': {}", name, e));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let dry_run = args.contains(&"--dry-run".to_string());

    println!("=== Questions Table Schema Repair Tool ===");
    if dry_run {
        println!("** RUNNING IN DRY-RUN MODE **");
        println!("This will show what would be changed without making any updates.");
    } else {
        println!("** LIVE MODE - Changes will be made to the database **");
        println!("Make sure you have backed up your database before proceeding!");
    }

    // Connect to database
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:ochem_academy.db".to_string());

    println!("\nConnecting to database: {}", database_url);
    let db = Database::new(&database_url).await?;

    println!("\nInspecting questions table schema...");
    let (present, missing) = find_missing_columns(&db).await?;

    let mut stats = MigrationStats::new();
    stats.existing_columns = present;
    stats.missing_columns = missing.clone();

    if missing.is_empty() {
        println!("\n✓ Questions table already has the draft workflow columns.");
        stats.print_summary(dry_run);
        return Ok(());
    }

    println!("\nMissing columns: {:?}", missing);

    if dry_run {
        for (name, definition) in DRAFT_WORKFLOW_COLUMNS {
            if missing.iter().any(|m| m == name) {
                println!("Would run: ALTER TABLE questions ADD COLUMN {name} {definition}");
            }
        }
        stats.print_summary(true);
        println!("\nTo perform the actual migration, run:");
        println!("cargo run --bin add_question_columns");
        return Ok(());
    }

    // Confirm before proceeding
    println!("\nProceed with adding {} column(s)? (y/N): ", missing.len());
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim().to_lowercase() != "y" {
        println!("Migration cancelled.");
        return Ok(());
    }

    println!("\nApplying schema changes...");
    add_columns(&db, &missing, &mut stats).await;

    stats.print_summary(false);

    Ok(())
}
