use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use stratai_core::{
    Config, ConfigLoader, Credentials, ReportSection, ResearchOrchestrator, ResearchRequest,
    SectionLevel, SecretValue, TelemetryOptions, download_file_name, format_report,
    init_telemetry, render_document, report_sections,
};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "stratai-cli",
    version,
    about = "StratAI AI use-case research from the terminal"
)]
struct Cli {
    /// Path to a TOML configuration file (defaults to `STRATAI_CONFIG` or `config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a company and industry with the three-agent crew.
    Run(RunArgs),
    /// Split a markdown file into report sections without running research.
    Format(FormatArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Company to research.
    #[arg(long)]
    company: String,

    /// Industry the company operates in.
    #[arg(long)]
    industry: String,

    /// Serper Dev API key.
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    serper_api_key: Option<String>,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Write the PDF report here; pass a directory to use the default file name.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Print the report sections as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Markdown file to format.
    #[arg(long)]
    input: PathBuf,

    /// Print the sections as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.clone())?;
    init_telemetry(TelemetryOptions::from_logging(&config.logging))?;

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args, config).await?,
            Command::Format(args) => format_command(args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs, config: Config) -> Result<()> {
    let company = args.company.trim().to_string();
    let industry = args.industry.trim().to_string();
    if company.is_empty() || industry.is_empty() {
        return Err(anyhow!("--company and --industry must not be empty"));
    }

    let search_key = SecretValue::from_input_or_env(
        args.serper_api_key.as_deref(),
        &config.search.api_key_env,
    )?;
    let llm_key =
        SecretValue::from_input_or_env(args.openai_api_key.as_deref(), &config.llm.api_key_env)?;

    info!(%company, %industry, model = %config.llm.model, "starting StratAI research");

    let orchestrator = ResearchOrchestrator::new(config);
    let request = ResearchRequest::new(
        company.clone(),
        industry.clone(),
        Credentials::new(search_key, llm_key),
    );
    let result = orchestrator.run(&request).await?;

    print_sections(&report_sections(&result), args.json)?;

    if let Some(target) = args.pdf {
        let path = if target.is_dir() {
            target.join(download_file_name(&company, &industry))
        } else {
            target
        };
        let bytes = render_document(&company, &industry, Some(&result))?;
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "PDF report written");
    }

    Ok(())
}

fn format_command(args: FormatArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    print_sections(&format_report(Some(&raw)), args.json)
}

fn print_sections(sections: &[ReportSection], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sections)?);
        return Ok(());
    }

    for section in sections {
        match section.level {
            SectionLevel::TitleLarge => println!("\n== {} ==\n", section.text),
            SectionLevel::TitleMedium => println!("\n-- {} --\n", section.text),
            SectionLevel::Body => println!("{}\n", section.text.trim()),
        }
    }
    Ok(())
}
