//! researchdeck CLI - PowerPoint research briefings
//!
//! Serves the agent trigger over HTTP and renders, inspects or scaffolds
//! templates locally.

mod server;
#[cfg(test)]
mod test_runner;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use researchdeck::research::REQUIRED_KEYS;
use researchdeck::{Presentation, ReportBuilder, ResearchBundle};
use serde_json::{Map, Value};
use server::ServeOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Research briefing decks from JSON research
#[derive(Parser)]
#[command(
    name = "researchdeck",
    author = "iyulab",
    version,
    about = "Fill PowerPoint research briefings from JSON research",
    long_about = "researchdeck - PowerPoint research briefing generator.\n\n\
                  Fills {{Token}} placeholders in a template with a company profile,\n\
                  key metrics, highlights and industry research."
)]
struct Cli {
    /// Log filter, e.g. `info` or `researchdeck=debug` (overrides -v)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP agent trigger
    Serve(ServeOptions),

    /// Render a deck from research files
    Render {
        /// Request body holding all four research documents
        #[arg(long, conflicts_with_all = ["profile", "metrics", "highlights", "industry"])]
        request: Option<PathBuf>,

        /// Company profile (CompanyReseachData1)
        #[arg(long, requires_all = ["metrics", "highlights", "industry"])]
        profile: Option<PathBuf>,

        /// Key metrics (CompanyReseachData2)
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Highlights (CompanyReseachData3)
        #[arg(long)]
        highlights: Option<PathBuf>,

        /// Industry research (IndustryResearch)
        #[arg(long)]
        industry: Option<PathBuf>,

        /// Template (default: built-in starter template)
        #[arg(short, long, env = "PPTX_TEMPLATE")]
        template: Option<PathBuf>,

        /// Output file path (default: POC_<timestamp>.pptx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the slides and placeholders of a template
    Inspect {
        /// Template or deck path
        input: PathBuf,
    },

    /// Write the built-in starter template
    InitTemplate {
        /// Output file path
        #[arg(default_value = "template.pptx")]
        output: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.log_level.as_deref()) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, log_level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None if verbose => EnvFilter::new("info"),
        None => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve(opt) => {
            println!(
                "{} Serving on port {} at {}",
                "✓".green().bold(),
                opt.port,
                server::TRIGGER_ROUTE
            );
            async_std::task::block_on(opt.serve())?;
        }

        Commands::Render {
            request,
            profile,
            metrics,
            highlights,
            industry,
            template,
            output,
        } => {
            let pb = create_spinner("Reading research...");
            let body = match request {
                Some(path) => read_json(&path)?,
                None => {
                    let paths = [profile, metrics, highlights, industry];
                    let mut body = Map::new();
                    for (key, path) in REQUIRED_KEYS.iter().zip(paths) {
                        let path = path.ok_or_else(|| {
                            format!("missing research file for {} (or use --request)", key)
                        })?;
                        body.insert(key.to_string(), read_json(&path)?);
                    }
                    Value::Object(body)
                }
            };
            let bundle = ResearchBundle::from_value(body)?;

            pb.set_message("Filling template...");
            let builder = match template {
                Some(path) => ReportBuilder::from_path(path)?,
                None => ReportBuilder::new(researchdeck::starter_template()?),
            };
            let report = builder.build(&bundle)?;

            let output = output
                .unwrap_or_else(|| PathBuf::from(researchdeck::output_file_name(Utc::now())));
            fs::write(&output, &report.bytes)?;
            pb.finish_and_clear();

            println!(
                "{} Rendered {} ({} slides): {}",
                "✓".green().bold(),
                report.company_name,
                report.slide_count,
                output.display()
            );
        }

        Commands::Inspect { input } => {
            let pb = create_spinner("Reading template...");
            let prs = Presentation::open(&input)?;
            pb.finish_and_clear();

            println!("{}", "Template Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Slides".bold(), prs.slide_count());

            for index in 0..prs.slide_count() {
                let texts = prs.slide_texts(index);
                let tokens = placeholders(&texts);
                println!(
                    "\n{} {}",
                    format!("Slide {}", index + 1).cyan().bold(),
                    texts.first().map(String::as_str).unwrap_or_default()
                );
                if tokens.is_empty() {
                    println!("  {}", "no placeholders".dimmed());
                }
                for token in tokens {
                    println!("  {}", token.yellow());
                }
                let tables = prs.slide_table_count(index);
                if tables > 0 {
                    println!("  {}: {}", "Tables".bold(), tables);
                }
            }
        }

        Commands::InitTemplate { output, force } => {
            if output.exists() && !force {
                return Err(format!("{} exists (use --force to replace it)", output.display()).into());
            }
            fs::write(&output, researchdeck::starter_template()?)?;
            println!(
                "{} Wrote starter template: {}",
                "✓".green().bold(),
                output.display()
            );
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e).into())
}

/// `{{Token}}` placeholders in slide text, in order of appearance.
fn placeholders(texts: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for text in texts {
        let mut rest = text.as_str();
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start..].find("}}") else {
                break;
            };
            let token = &rest[start..start + len + 2];
            if !found.iter().any(|t| t == token) {
                found.push(token.to_string());
            }
            rest = &rest[start + len + 2..];
        }
    }
    found
}

fn print_version() {
    println!("{} {}", "researchdeck".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("PowerPoint research briefings from JSON research");
    println!();
    println!("Placeholders: {{{{CompanyName}}}}, {{{{CompanyResearch1}}}}-{{{{CompanyResearch3}}}}, {{{{IndustryResearch}}}}, {{{{IndustryTitle}}}}");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        let texts = vec![
            "{{CompanyName}} Research Briefing".to_string(),
            "{{CompanyResearch1}} and {{CompanyName}}".to_string(),
            "unterminated {{Oops".to_string(),
        ];
        assert_eq!(
            placeholders(&texts),
            vec!["{{CompanyName}}", "{{CompanyResearch1}}"]
        );
    }

    #[test]
    fn test_cli_parses_render_files() {
        let cli = Cli::try_parse_from([
            "researchdeck",
            "render",
            "--profile",
            "a.json",
            "--metrics",
            "b.json",
            "--highlights",
            "c.json",
            "--industry",
            "d.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Render { profile: Some(_), .. }));
    }

    #[test]
    fn test_cli_rejects_mixed_render_inputs() {
        let result = Cli::try_parse_from([
            "researchdeck",
            "render",
            "--request",
            "body.json",
            "--profile",
            "a.json",
        ]);
        assert!(result.is_err());
    }
}
