//! CLI tool for pruning, validating and auditing ownership metadata

use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use maintainers::yaml::prettify_file;
use maintainers::{
    audit_groups, check_urls, export_rows, files_by_label, find_aliases_file, find_owner_files, find_sigs_yaml,
    prune, validate, write_labels_csv, write_owners_csv, AuditOptions, AuditReport, MaintainersConfig, Period,
    PruneReport, Severity,
};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "maintainers")]
#[command(about = "Keep OWNERS, OWNERS_ALIASES and sigs.yaml accurate and tidy", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the repository holding the ownership files
    #[arg(short = 'r', long, default_value = ".")]
    root: PathBuf,

    /// Path to custom configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove stale GitHub ids from OWNERS and OWNERS_ALIASES
    Prune {
        /// Do not modify any files (pass `--dryrun false` to rewrite)
        #[arg(long, action = ArgAction::Set)]
        dryrun: Option<bool>,

        /// Skip the GitHub PR comment count check
        #[arg(long)]
        skip_github: bool,

        /// Skip the devstats contribution count check
        #[arg(long)]
        skip_devstats: bool,

        /// Repository name as known to devstats
        #[arg(long)]
        repository_devstats: Option<String>,

        /// GitHub repository searched for PR comments
        #[arg(long)]
        repository_github: Option<String>,

        /// Devstats period: y (year), q (quarter) or m (month)
        #[arg(long)]
        period_devstats: Option<Period>,

        /// Comma-separated users to prune regardless of activity
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Comma-separated users never to prune
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Comma-separated ownership files never to rewrite
        #[arg(long, value_delimiter = ',')]
        exclude_files: Vec<String>,

        /// Output format
        #[arg(short = 'f', long, default_value = "text")]
        format: ReportFormat,
    },

    /// Ensure all OWNERS related files are valid YAML and look the same
    Prettify {
        /// Indentation width
        #[arg(long, default_value = "2")]
        indent: usize,

        /// Re-indent sigs.yaml as well
        #[arg(long)]
        include_sigs_yaml: bool,
    },

    /// Ensure OWNERS, OWNERS_ALIASES and sigs.yaml have the correct data structure
    Validate {
        /// Compare the OWNERS files of the GitHub repository with sigs.yaml
        #[arg(long)]
        check_github: bool,

        /// Output format
        #[arg(short = 'f', long, default_value = "text")]
        format: ReportFormat,
    },

    /// Audit groups of sigs.yaml (names, directories or `all`)
    Audit {
        /// Groups to audit
        #[arg(required = true)]
        names: Vec<String>,

        /// Checkout of kubernetes/kubernetes, for classifying its OWNERS files
        #[arg(long)]
        kubernetes_directory: Option<PathBuf>,

        /// Skip charter and OWNERS link checks
        #[arg(long)]
        offline: bool,

        /// Output format
        #[arg(short = 'f', long, default_value = "text")]
        format: ReportFormat,
    },

    /// Export contents of OWNERS and OWNERS_ALIASES as a CSV file
    Export {
        /// Output file
        #[arg(short = 'o', long, default_value = "owners.csv")]
        output: PathBuf,
    },

    /// Print the OWNERS files of every label
    Labels {
        /// Output file
        #[arg(short = 'o', long, default_value = "labels.csv")]
        output: PathBuf,
    },

    /// Ensure all the URLs in a YAML file are still valid
    CheckUrls {
        /// YAML file to check
        #[arg(long, default_value = "sigs.yaml")]
        yaml_file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug)]
enum ReportFormat {
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        match MaintainersConfig::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => fail("Failed to load config", e),
        }
    } else {
        MaintainersConfig::default()
    };

    match cli.command {
        Commands::Prune {
            dryrun,
            skip_github,
            skip_devstats,
            repository_devstats,
            repository_github,
            period_devstats,
            include,
            exclude,
            exclude_files,
            format,
        } => {
            let options = &mut config.prune;
            options.skip_github |= skip_github;
            options.skip_devstats |= skip_devstats;
            if let Some(repository) = repository_devstats {
                options.devstats_repository = repository;
            }
            if let Some(repository) = repository_github {
                options.github_repository = repository;
            }
            if let Some(period) = period_devstats {
                options.period = period;
            }
            options.include.extend(include);
            options.exclude.extend(exclude);
            options.exclude_files.extend(exclude_files);
            if let Some(dry_run) = dryrun {
                config.rewrite.dry_run = dry_run;
            }

            let spinner = spinner("Looking up maintainer activity...");
            let result = prune(&cli.root, &config).await;
            spinner.finish_and_clear();

            match result {
                Ok(report) => match format {
                    ReportFormat::Json => print_json(&report),
                    ReportFormat::Text => display_prune(&report),
                },
                Err(e) => fail("Prune failed", e),
            }
        }

        Commands::Prettify {
            indent,
            include_sigs_yaml,
        } => {
            let mut files = match find_owner_files(&cli.root) {
                Ok(files) => files,
                Err(e) => fail("Failed to find OWNERS files", e),
            };
            files.extend(find_aliases_file(&cli.root));
            if include_sigs_yaml {
                files.extend(find_sigs_yaml(&cli.root));
            }

            for path in &files {
                if let Err(e) = prettify_file(path, indent) {
                    fail(&format!("Failed to prettify {}", path.display()), e);
                }
                info!("Prettified {}", path.display());
            }
            println!("{} Prettified {} files", "Success:".green().bold(), files.len());
        }

        Commands::Validate { check_github, format } => {
            let spinner = spinner("Validating ownership files...");
            let result = validate(&cli.root, &config, check_github).await;
            spinner.finish_and_clear();

            let report = match result {
                Ok(report) => report,
                Err(e) => fail("Validation failed", e),
            };
            match format {
                ReportFormat::Json => print_json(&report),
                ReportFormat::Text => display_findings(&report),
            }
            if report.has_errors() {
                process::exit(1);
            }
        }

        Commands::Audit {
            names,
            kubernetes_directory,
            offline,
            format,
        } => {
            let Some(sigs_yaml) = find_sigs_yaml(&cli.root) else {
                eprintln!(
                    "{} unable to find sigs.yaml in {}",
                    "Error:".red().bold(),
                    cli.root.display()
                );
                process::exit(1);
            };
            let kubernetes_dir = match kubernetes_directory {
                Some(dir) if !dir.exists() => {
                    eprintln!(
                        "{} please use --kubernetes-directory to set the path to the kubernetes directory. {} does not exist",
                        "Error:".red().bold(),
                        dir.display()
                    );
                    process::exit(1);
                }
                Some(dir) => Some(dir),
                None => default_kubernetes_directory(),
            };

            let options = AuditOptions {
                names,
                community_dir: cli.root.clone(),
                kubernetes_dir,
                offline,
            };

            let spinner = spinner("Auditing groups...");
            let result = audit_groups(&sigs_yaml, &options, &config.network).await;
            spinner.finish_and_clear();

            match result {
                Ok(report) => match format {
                    ReportFormat::Json => print_json(&report),
                    ReportFormat::Text => display_findings(&report),
                },
                Err(e) => fail("Audit failed", e),
            }
        }

        Commands::Export { output } => {
            let rows = match export_rows(&cli.root) {
                Ok(rows) => rows,
                Err(e) => fail("Export failed", e),
            };
            if let Err(e) = write_owners_csv(&output, &rows) {
                fail("Failed to write export", e);
            }
            println!("Exported {} rows to: {}", rows.len(), output.display());
        }

        Commands::Labels { output } => {
            let labels = match files_by_label(&cli.root) {
                Ok(labels) => labels,
                Err(e) => fail("Failed to collect labels", e),
            };
            for (label, files) in &labels {
                println!("{}:", label.bold());
                for file in files {
                    println!("\t{}", file);
                }
            }
            if let Err(e) = write_labels_csv(&output, &labels) {
                fail("Failed to write labels", e);
            }
            println!("\nLabels written to: {}", output.display());
        }

        Commands::CheckUrls { yaml_file } => {
            println!("Processing {}", yaml_file.display());
            let spinner = spinner("Checking urls...");
            let result = check_urls(&yaml_file, &config.network).await;
            spinner.finish_and_clear();

            let failures = match result {
                Ok(failures) => failures,
                Err(e) => fail("URL check failed", e),
            };
            for failure in &failures {
                println!("{}", failure.to_string().red());
            }
            if !failures.is_empty() {
                eprintln!("{} {} invalid urls", "Failed:".red().bold(), failures.len());
                process::exit(1);
            }
            println!("{} All urls are reachable", "Success:".green().bold());
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn fail(context: &str, error: impl Display) -> ! {
    eprintln!("{} {}: {}", "Error:".red().bold(), context, error);
    process::exit(1);
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// `$GOPATH/src/k8s.io/kubernetes`, when it exists
fn default_kubernetes_directory() -> Option<PathBuf> {
    let gopath = std::env::var_os("GOPATH")?;
    let dir = Path::new(&gopath).join("src/k8s.io/kubernetes");
    dir.exists().then_some(dir)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Failed to serialize report", e),
    }
}

fn display_prune(report: &PruneReport) {
    println!("\n{}", "=== Prune Summary ===".bold());
    for file in &report.files {
        println!("Processed {}", file.display());
    }
    println!("Found {} unique aliases", report.alias_count);
    println!("Found {} unique users", report.unique_users);

    println!(
        "\n{} {} devstats repo and {} github repo: {}",
        "Contributions from".bold(),
        report.devstats_repository.cyan(),
        report.github_repository.cyan(),
        report.contributions.len()
    );
    println!("GitHub ID : Devstats contrib count : GitHub PR comment count");
    for item in &report.contributions {
        let id = if item.id != item.alias {
            format!("{}({})", item.id, item.alias)
        } else {
            item.id.clone()
        };
        println!("{} : {} : {}", id, count(item.contributions), count(item.pr_comments));
    }

    if !report.missing.is_empty() {
        println!(
            "\n{} {}: {}",
            "Missing contributions in".bold(),
            report.devstats_repository,
            report.missing.len()
        );
        for id in &report.missing {
            println!("{}", id.yellow());
        }
    }
    if !report.low_activity.is_empty() {
        println!(
            "\n{} {}: {}",
            "Low reviews/approvals in".bold(),
            report.github_repository,
            report.low_activity.len()
        );
        for id in &report.low_activity {
            println!("{}", id.yellow());
        }
    }

    println!("\nUsers to prune: {}", report.to_prune.len());
    for id in &report.to_prune {
        println!("  - {}", id.red());
    }

    if report.dry_run {
        println!(
            "\n{} --dryrun is set to true, will skip updating OWNERS and OWNERS_ALIASES",
            "Note:".yellow().bold()
        );
    } else {
        println!("\n{} Updated {} files", "Success:".green().bold(), report.rewritten.len());
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn display_findings(report: &AuditReport) {
    println!("\n{}", format!("=== {} ===", report.title).bold());

    for finding in &report.findings {
        let line = finding.to_string();
        let line = match finding.severity {
            Severity::Error => line.red(),
            Severity::Warning => line.yellow(),
            Severity::Optional => line.cyan(),
            Severity::Info => line.normal(),
        };
        println!("{}", line);
    }

    println!();
    println!(
        "  {} {}",
        "●".red(),
        format!("Errors: {}", report.count(Severity::Error)).red()
    );
    println!(
        "  {} {}",
        "●".yellow(),
        format!("Warnings: {}", report.count(Severity::Warning)).yellow()
    );
    println!(
        "  {} {}",
        "●".cyan(),
        format!("Optional: {}", report.count(Severity::Optional)).cyan()
    );
    println!("  ● Info: {}", report.count(Severity::Info));
}
