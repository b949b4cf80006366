use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use readmit_core::config::cohort_size_from_env_value;
use readmit_core::constants::{DEFAULT_PAGE_SIZE, MAX_COHORT_SIZE, RESULTS_EXPORT_FILENAME};
use readmit_core::{
    builtin_samples, export_cohort, export_results, normalise_row, pick_sample, run_upload,
    samples_from_json, validate_upload_name, BatchState, Cohort, ExplainConfig,
    NormalizedPatientInput, PatientReport, SortDirection, SortKey, ViewState,
};
use readmit_explain::FallbackExplainer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "readmit")]
#[command(about = "Readmission risk dashboard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured prediction host
    Health,
    /// Run a workbook through the prediction backend and save the results
    Upload {
        /// .xls or .xlsx file with one patient per row
        file: PathBuf,
        /// Where to write the results workbook
        #[arg(long, default_value = RESULTS_EXPORT_FILENAME)]
        out: PathBuf,
        /// Probe hosts first and start with the first healthy one
        #[arg(long)]
        prefer_healthy: bool,
    },
    /// Seed a synthetic cohort and print one page of it
    Demo {
        /// Number of synthetic patients (defaults to READMIT_DEMO_COHORT_SIZE or 28)
        #[arg(long)]
        count: Option<usize>,
        /// RNG seed for a reproducible cohort
        #[arg(long)]
        seed: Option<u64>,
        /// Patient id substring
        #[arg(long, default_value = "")]
        query: String,
        /// Exact specialty
        #[arg(long, default_value = "")]
        specialty: String,
        /// Exact age bucket, e.g. "[60-70)"
        #[arg(long, default_value = "")]
        age: String,
        /// Sort key
        #[arg(long, default_value = "readmission_probability", value_parser = parse_sort_key)]
        sort: SortKey,
        /// asc or desc
        #[arg(long, default_value = "desc", value_parser = parse_sort_direction)]
        dir: SortDirection,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        per_page: usize,
        /// Also write the whole cohort to this workbook
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print the JSON report for this row id instead of the table
        #[arg(long)]
        report: Option<u64>,
    },
    /// Submit one patient, given as a JSON object of model inputs
    Explain {
        /// JSON file; missing counts default to 0 and time_in_hospital to 1
        #[arg(long)]
        json: PathBuf,
    },
    /// Submit one patient picked at random from a sample file
    Sample {
        /// JSON array of patient rows; the built-in sample is used when absent or unusable
        #[arg(long)]
        file: Option<PathBuf>,
        /// RNG seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    s.parse().map_err(|e: readmit_core::CoreError| e.to_string())
}

fn parse_sort_direction(s: &str) -> Result<SortDirection, String> {
    s.parse().map_err(|e: readmit_core::CoreError| e.to_string())
}

fn explain_config() -> anyhow::Result<ExplainConfig> {
    Ok(ExplainConfig::from_env_values(
        std::env::var("READMIT_API_BASE").ok(),
        std::env::var("READMIT_FALLBACK_APIS").ok(),
        std::env::var("READMIT_REQUEST_TIMEOUT_SECS").ok(),
    )?)
}

async fn health() -> anyhow::Result<()> {
    let explainer = FallbackExplainer::from_config(&explain_config()?)?;
    for host in explainer.probe_health().await {
        if host.healthy {
            println!(
                "{}: {}",
                host.endpoint,
                host.status.as_deref().unwrap_or("healthy")
            );
        } else {
            println!("{}: unreachable", host.endpoint);
        }
    }
    Ok(())
}

async fn upload(file: PathBuf, out: PathBuf, prefer_healthy: bool) -> anyhow::Result<()> {
    let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    validate_upload_name(name)?;
    let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;

    let mut explainer = FallbackExplainer::from_config(&explain_config()?)?;
    if prefer_healthy {
        if let Some(host) = explainer.prefer_healthy().await {
            println!("Using {host}");
        }
    }

    let outcomes = run_upload(&explainer, &bytes, |state| match state {
        BatchState::Submitting { completed, total } if completed > 0 => {
            eprintln!("[{completed}/{total}] submitted");
        }
        BatchState::Done { succeeded, failed } => {
            eprintln!("Done: {succeeded} succeeded, {failed} failed");
        }
        _ => {}
    })
    .await?;

    for outcome in outcomes.iter().filter(|o| o.is_error()) {
        eprintln!(
            "Row {}: {}",
            outcome.index,
            outcome.error().unwrap_or_default()
        );
    }

    std::fs::write(&out, export_results(&outcomes)?)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {} rows to {}", outcomes.len(), out.display());
    Ok(())
}

fn demo(
    count: Option<usize>,
    seed: Option<u64>,
    view: ViewState,
    export: Option<PathBuf>,
    report: Option<u64>,
) -> anyhow::Result<()> {
    let count = match count {
        Some(n) => n.min(MAX_COHORT_SIZE),
        None => cohort_size_from_env_value(std::env::var("READMIT_DEMO_COHORT_SIZE").ok())?,
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut cohort = Cohort::default();
    cohort.seed_demo(count, &mut rng);

    if let Some(path) = export {
        std::fs::write(&path, export_cohort(cohort.records())?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {} patients to {}", cohort.len(), path.display());
    }

    if let Some(id) = report {
        let record = cohort
            .find(id)
            .with_context(|| format!("no patient with id {id}"))?;
        let report = PatientReport::from(record);
        println!("{}", String::from_utf8_lossy(&report.to_json_bytes()?));
        return Ok(());
    }

    let kpis = cohort.kpis();
    println!(
        "Patients: {}  High risk: {}%  Average probability: {:.1}%",
        kpis.total,
        kpis.high_pct,
        kpis.avg_prob * 100.0
    );

    let slice = cohort.view(&view);
    if slice.is_empty() {
        println!("No data");
        return Ok(());
    }
    for record in &slice.rows {
        println!(
            "{:>6}  {:<10} {:<8} {:<18} {:>6.1}%  {}",
            record.id,
            record.patient_id,
            record.age.as_deref().unwrap_or("-"),
            record.medical_specialty.as_deref().unwrap_or("-"),
            record.readmission_probability.value() * 100.0,
            record.risk_label
        );
    }
    println!(
        "Page {} of {} ({} matching)",
        slice.page,
        slice.page_count.max(1),
        slice.total
    );
    Ok(())
}

/// Reads one patient from a JSON object, normalised exactly like an uploaded row.
fn read_input(path: &Path) -> anyhow::Result<NormalizedPatientInput> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
    match value.as_object() {
        Some(row) => Ok(normalise_row(row)),
        None => bail!("{} must contain a JSON object", path.display()),
    }
}

fn read_samples(file: Option<&Path>) -> Vec<NormalizedPatientInput> {
    let Some(path) = file else {
        return builtin_samples();
    };
    match std::fs::read(path) {
        Ok(bytes) => samples_from_json(&bytes),
        Err(e) => {
            tracing::warn!("cannot read {}: {e}, using built-in sample", path.display());
            builtin_samples()
        }
    }
}

async fn submit(input: &NormalizedPatientInput) -> anyhow::Result<()> {
    let explainer = FallbackExplainer::from_config(&explain_config()?)?;
    let explanation = explainer.submit_for_explanation(input).await?;
    println!("{}", serde_json::to_string_pretty(&explanation)?);
    Ok(())
}

async fn explain(json: PathBuf) -> anyhow::Result<()> {
    submit(&read_input(&json)?).await
}

async fn sample(file: Option<PathBuf>, seed: Option<u64>) -> anyhow::Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let input = pick_sample(&read_samples(file.as_deref()), &mut rng);
    eprintln!("{}", serde_json::to_string(&input)?);
    submit(&input).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("readmit_explain=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => health().await?,
        Some(Commands::Upload {
            file,
            out,
            prefer_healthy,
        }) => upload(file, out, prefer_healthy).await?,
        Some(Commands::Demo {
            count,
            seed,
            query,
            specialty,
            age,
            sort,
            dir,
            page,
            per_page,
            export,
            report,
        }) => {
            let mut view = ViewState::new(per_page);
            view.set_filter(query, specialty, age);
            view.set_sort(sort, dir);
            view.set_page(page);
            demo(count, seed, view, export, report)?;
        }
        Some(Commands::Explain { json }) => explain(json).await?,
        Some(Commands::Sample { file, seed }) => sample(file, seed).await?,
        None => {
            println!("Use 'readmit --help' for commands");
        }
    }

    Ok(())
}
