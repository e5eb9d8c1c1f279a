//! Command-line interface for spcf.
//!
//! Provides commands for setting up a project, onboarding users,
//! turning designer output into seeds and inspecting the operation log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::FactoryConfig;
use crate::core::{install_default_templates, Factory};
use crate::domain::ArtifactKind;

/// spcf - Synai Prompt & Context Factory
#[derive(Parser, Debug)]
#[command(name = "spcf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Operation log database (overrides configuration)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directories, database and default templates
    Setup,

    /// Onboard a new user
    Onboard {
        /// Human-readable identifier for the user (e.g., email)
        user_identifier: String,

        /// Aggregate context and prepare designer input instead of an assessment
        #[arg(long)]
        with_context: bool,

        /// Write the prepared designer input to this file
        #[arg(long, requires = "with_context")]
        designer_input: Option<PathBuf>,
    },

    /// Turn a designer model response into a seed prompt
    Seed {
        /// User to generate the seed for
        user_id: String,

        /// File containing the designer's XML response
        response_file: PathBuf,

        /// Print JSON embedded in the seed's <data> element
        #[arg(long)]
        extract_data: bool,
    },

    /// List all users
    Users {
        /// Show file and operation counts per user
        #[arg(short, long)]
        detailed: bool,
    },

    /// List a user's artifact files
    Files {
        user_id: String,

        /// Only this kind (context, prompts, seeds, feedback, interaction_dumps)
        #[arg(short, long)]
        kind: Option<ArtifactKind>,
    },

    /// Show a user's operation history (newest first)
    History {
        user_id: String,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let mut config = FactoryConfig::load().context("Failed to load configuration")?;
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }

        match self.command {
            Commands::Setup => setup(config),
            Commands::Onboard {
                user_identifier,
                with_context,
                designer_input,
            } => onboard(config, &user_identifier, with_context, designer_input),
            Commands::Seed {
                user_id,
                response_file,
                extract_data,
            } => seed(config, &user_id, &response_file, extract_data),
            Commands::Users { detailed } => list_users(config, detailed),
            Commands::Files { user_id, kind } => list_files(config, &user_id, kind),
            Commands::History { user_id, json } => history(config, &user_id, json),
            Commands::Config => show_config(&config),
        }
    }
}

fn open(config: FactoryConfig) -> Result<Factory> {
    let db_path = config.db_path.clone();
    Factory::open(config)
        .with_context(|| format!("Failed to open factory at {}", db_path.display()))
}

fn setup(config: FactoryConfig) -> Result<()> {
    let factory = open(config)?;
    let config = factory.config();

    let written = install_default_templates(config).context("Failed to install templates")?;

    println!("Data directory: {}", config.data_dir.display());
    println!("Database:       {}", config.db_path.display());
    println!("Templates:      {}", config.base_prompts_dir.display());
    for path in &written {
        println!("  created {}", path.display());
    }
    if written.is_empty() {
        println!("  templates already present");
    }

    Ok(())
}

fn onboard(
    config: FactoryConfig,
    user_identifier: &str,
    with_context: bool,
    designer_input: Option<PathBuf>,
) -> Result<()> {
    let factory = open(config)?;

    let user_id = if with_context {
        let prepared = factory
            .onboard_user_with_context_to_seed(user_identifier)
            .with_context(|| format!("Failed to onboard {}", user_identifier))?;

        println!("User created with ID: {}", prepared.user_id);
        println!(
            "Context directory: {}",
            factory.user_paths(&prepared.user_id)?.context().display()
        );

        match designer_input {
            Some(path) => {
                std::fs::write(&path, &prepared.designer_input).with_context(|| {
                    format!("Failed to write designer input: {}", path.display())
                })?;
                println!("Designer input written to {}", path.display());
            }
            None => println!(
                "Designer input prepared ({} chars)",
                prepared.designer_input.chars().count()
            ),
        }

        println!("\nNext steps:");
        println!("  1. Add context files to the context directory");
        println!("  2. Run the designer model with the prepared input");
        println!("  3. Run `spcf seed {} <response.xml>`", prepared.user_id);
        prepared.user_id
    } else {
        let user_id = factory
            .onboard_new_user_no_context(user_identifier)
            .with_context(|| format!("Failed to onboard {}", user_identifier))?;

        println!("User created with ID: {}", user_id);
        println!(
            "Assessment prompts: {}",
            factory.user_paths(&user_id)?.prompts().display()
        );
        user_id
    };

    let summary = factory.user_summary(&user_id)?;
    println!("\nTotal operations: {}", summary.total_operations);

    Ok(())
}

fn seed(config: FactoryConfig, user_id: &str, response_file: &Path, extract: bool) -> Result<()> {
    let factory = open(config)?;

    let response = std::fs::read_to_string(response_file).with_context(|| {
        format!("Failed to read designer output: {}", response_file.display())
    })?;
    eprintln!("Read {} characters from designer output", response.chars().count());

    let seed_path = factory
        .process_seed_from_designer_output(user_id, &response)
        .with_context(|| format!("Failed to generate seed for {}", user_id))?;
    println!("Seed prompt saved to: {}", seed_path.display());

    if extract {
        match factory.extract_seed_data(&seed_path)? {
            Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
            None => println!("No structured data found in seed"),
        }
    }

    let summary = factory.user_summary(user_id)?;
    println!("\nTotal operations: {}", summary.total_operations);
    println!("Seeds generated:  {}", summary.file_count(ArtifactKind::Seeds));

    Ok(())
}

fn list_users(config: FactoryConfig, detailed: bool) -> Result<()> {
    let factory = open(config)?;
    let users = factory.list_users()?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("Total users: {}\n", users.len());

    for (i, user_id) in users.iter().enumerate() {
        println!("{}. {}", i + 1, user_id);

        if !detailed {
            continue;
        }

        match factory.user_summary(user_id) {
            Ok(summary) => {
                for (kind, count) in &summary.file_counts {
                    if *count > 0 {
                        println!("   {}: {} file(s)", kind, count);
                    }
                }
                println!("   operations: {}", summary.total_operations);
                for (op_type, count) in &summary.operation_types {
                    println!("     {}: {}", op_type, count);
                }
                if let Some(last) = &summary.last_operation {
                    println!("   last activity: {} ({})", last.timestamp, last.operation_type);
                }
            }
            Err(e) => println!("   error getting summary: {}", e),
        }
    }

    Ok(())
}

fn list_files(config: FactoryConfig, user_id: &str, kind: Option<ArtifactKind>) -> Result<()> {
    let factory = open(config)?;
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => ArtifactKind::ALL.to_vec(),
    };

    for kind in kinds {
        let files = factory
            .list_artifacts(user_id, kind)
            .with_context(|| format!("Failed to list {} for {}", kind, user_id))?;

        println!("{} ({}):", kind, files.len());
        for path in &files {
            if let Some(name) = path.file_name() {
                println!("  {}", name.to_string_lossy());
            }
        }
    }

    Ok(())
}

fn history(config: FactoryConfig, user_id: &str, json: bool) -> Result<()> {
    let factory = open(config)?;
    let records = factory.operations_for_user(user_id)?;

    if records.is_empty() {
        println!("No operations recorded for {}", user_id);
        return Ok(());
    }

    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
            continue;
        }

        println!(
            "{}  {:<12} {:<30} {}",
            record.timestamp,
            record.status.as_str(),
            record.operation_type.as_str(),
            record.pipeline_name.as_deref().unwrap_or("-")
        );
        if let Some(notes) = &record.notes {
            println!("    {}", notes);
        }
    }

    Ok(())
}

fn show_config(config: &FactoryConfig) -> Result<()> {
    println!("Configuration:");
    println!(
        "  Config file:   {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("  Home:          {}", config.home.display());
    println!("  Data:          {}", config.data_dir.display());
    println!("  Database:      {}", config.db_path.display());
    println!("  Templates:     {}", config.base_prompts_dir.display());
    println!("  Context files: {}", config.context_patterns.join(", "));
    println!("  User id len:   {}", config.user_id_length);

    Ok(())
}
