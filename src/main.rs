use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use verdiq::golden::{self, Manifest};
use verdiq::images::{self, HttpFetcher};
use verdiq::report::{RunReport, now_rfc3339, today};
use verdiq::store::LinkWarning;
use verdiq::validate::{self, Mode, Severity};
use verdiq::{
    AffiliatePolicy, PipelineConfig, PipelineError, ProductStore, Region, Variant, audit, reconcile,
    render, splice, store,
};

#[derive(Parser, Debug)]
#[command(
    name = "verdiq",
    version,
    about = "Keep affiliate review pages in sync with one product store"
)]
struct Cli {
    /// JSON config file; `verdiq.json` in the working directory is used when present.
    #[arg(long, global = true, env = "VERDIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Product store path.
    #[arg(long, global = true, env = "VERDIQ_STORE")]
    store: Option<PathBuf>,

    /// Golden-data manifest path.
    #[arg(long, global = true, env = "VERDIQ_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Directory receiving `<command>-report.json`.
    #[arg(long, global = true, env = "VERDIQ_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Affiliate tracking ID every link must carry.
    #[arg(long, global = true, env = "VERDIQ_TRACKING_ID")]
    tracking_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the store and run the schema checks.
    Check,
    /// Merge candidate records into the store.
    Reconcile {
        #[arg(long)]
        candidates: PathBuf,
        /// Remove this record id after merging (repeatable).
        #[arg(long = "remove", value_name = "ID")]
        remove: Vec<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Write nothing when any candidate conflicts.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Render one fragment variant from the store.
    Render {
        #[arg(long, default_value = "grid")]
        variant: Variant,
        /// Write the fragment here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace one generated region of a page.
    Splice {
        #[arg(long)]
        page: Option<PathBuf>,
        #[arg(long, default_value = "grid")]
        variant: Variant,
        /// Replace the inner content of the element with this id.
        #[arg(long, conflicts_with_all = ["start", "end"])]
        element_id: Option<String>,
        #[arg(long, requires = "end")]
        start: Option<String>,
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Pre-rendered fragment; rendered from the store when omitted.
        #[arg(long)]
        fragment: Option<PathBuf>,
    },
    /// Golden-data drift detection.
    Golden {
        #[command(subcommand)]
        action: GoldenAction,
    },
    /// Field-level content checks.
    Validate {
        /// Treat affiliate-link violations as errors.
        #[arg(long, default_value_t = false)]
        deploy: bool,
    },
    /// Audit a finished page against the store.
    Audit {
        #[arg(long)]
        page: Option<PathBuf>,
    },
    /// Drift + content checks (+ page audit when a page is given).
    DeployGate {
        #[arg(long)]
        page: Option<PathBuf>,
    },
    /// Affiliate link tools.
    Affiliate {
        #[command(subcommand)]
        action: AffiliateAction,
    },
    /// Download external product images and point records at local copies.
    FetchImages {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Rewrite the page price legend from the tier constants.
    SyncPriceGuide,
}

#[derive(Subcommand, Debug)]
enum GoldenAction {
    Validate,
    /// Record the current store as the new golden data.
    Rebaseline,
}

#[derive(Subcommand, Debug)]
enum AffiliateAction {
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    Normalize {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("❌ {err:#}");
            ExitCode::from(2)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(path) = &cli.store {
        config.store_path = path.clone();
    }
    if let Some(path) = &cli.manifest {
        config.manifest_path = path.clone();
    }
    if let Some(dir) = &cli.report_dir {
        config.report_dir = dir.clone();
    }
    if let Some(id) = &cli.tracking_id {
        config.tracking_id = id.clone();
    }
    config.check()?;
    Ok(config)
}

/// Returns whether the command passed.
async fn run(cli: Cli) -> Result<bool> {
    let config = resolve_config(&cli)?;
    let policy = config.affiliate_policy();

    match cli.command {
        Command::Check => cmd_check(&config),
        Command::Reconcile {
            candidates,
            remove,
            dry_run,
            strict,
        } => cmd_reconcile(&config, &policy, &candidates, &remove, dry_run, strict),
        Command::Render { variant, out } => cmd_render(&config, variant, out.as_deref()),
        Command::Splice {
            page,
            variant,
            element_id,
            start,
            end,
            fragment,
        } => {
            let region = match (element_id, start, end) {
                (Some(id), _, _) => Region::element(id),
                (None, Some(start), Some(end)) => Region::markers(start, end),
                _ => Region::for_variant(variant),
            };
            let page = page.unwrap_or_else(|| config.page_path.clone());
            cmd_splice(&config, &page, variant, &region, fragment.as_deref())
        }
        Command::Golden { action } => match action {
            GoldenAction::Validate => cmd_golden_validate(&config),
            GoldenAction::Rebaseline => cmd_golden_rebaseline(&config),
        },
        Command::Validate { deploy } => cmd_validate(&config, &policy, deploy),
        Command::Audit { page } => {
            let page = page.unwrap_or_else(|| config.page_path.clone());
            cmd_audit(&config, &policy, &page)
        }
        Command::DeployGate { page } => cmd_deploy_gate(&config, &policy, page.as_deref()),
        Command::Affiliate { action } => match action {
            AffiliateAction::Check { urls } => cmd_affiliate_check(&config, &policy, &urls),
            AffiliateAction::Normalize { urls } => cmd_affiliate_normalize(&config, &policy, &urls),
        },
        Command::FetchImages { dry_run } => cmd_fetch_images(&config, &policy, dry_run).await,
        Command::SyncPriceGuide => cmd_sync_price_guide(&config, &policy),
    }
}

fn load_store(config: &PipelineConfig) -> Result<ProductStore> {
    store::load(&config.store_path)
        .with_context(|| format!("loading product store {}", config.store_path.display()))
}

/// Writes the store and prints any affiliate links the policy rejects.
fn save_store(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    products: &ProductStore,
) -> Result<Vec<LinkWarning>> {
    let warnings = store::save_checked(products, &config.store_path, policy)
        .with_context(|| format!("saving product store {}", config.store_path.display()))?;
    for warning in &warnings {
        println!("⚠️ [{}] {}", warning.id, warning.message);
    }
    Ok(warnings)
}

fn load_manifest(config: &PipelineConfig) -> Result<Manifest> {
    Manifest::load(&config.manifest_path)
        .with_context(|| format!("loading manifest {}", config.manifest_path.display()))
}

/// Prints the summary and writes the report file.
fn finish(config: &PipelineConfig, report: RunReport) -> Result<bool> {
    let path = report
        .write(&config.report_dir)
        .with_context(|| format!("writing {}", report.file_name()))?;
    println!("{}", report.summary());
    println!("   report: {}", path.display());
    Ok(report.passed)
}

fn count_findings(findings: &[validate::Finding]) -> (usize, usize) {
    let errors = validate::error_count(findings);
    (errors, findings.len() - errors)
}

fn print_findings(findings: &[validate::Finding]) {
    for finding in findings {
        let mark = match finding.severity {
            Severity::Error => "❌",
            Severity::Warning => "⚠️",
        };
        println!("{mark} [{}] {}", finding.subject, finding.message);
    }
}

fn cmd_check(config: &PipelineConfig) -> Result<bool> {
    match store::load(&config.store_path) {
        Ok(products) => {
            let details = json!({
                "store": config.store_path,
                "products": products.products.len(),
                "title": products.page.title,
            });
            finish(config, RunReport::new("check", true, details)?)
        }
        Err(PipelineError::Schema(message)) => {
            println!("❌ {message}");
            let details = json!({ "store": config.store_path, "error": message });
            finish(config, RunReport::new("check", false, details)?.with_counts(1, 0))
        }
        Err(err) => Err(err)
            .with_context(|| format!("loading product store {}", config.store_path.display())),
    }
}

fn cmd_reconcile(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    candidates_path: &Path,
    remove: &[String],
    dry_run: bool,
    strict: bool,
) -> Result<bool> {
    let current = load_store(config)?;
    let text = fs::read_to_string(candidates_path)
        .with_context(|| format!("reading candidates {}", candidates_path.display()))?;
    let candidates = reconcile::parse_candidates(&text).context("parsing candidates")?;

    let mut outcome = reconcile::reconcile(&current, &candidates);
    for conflict in &outcome.conflicts {
        println!("❌ {}: {}", conflict.name, conflict.reason);
    }
    for name in &outcome.removed_candidates {
        println!("⚠️ not in candidates, kept: {name}");
    }

    // Conflicting candidates are already left out of `updated`.
    let passed = !outcome.has_conflicts();
    let mut removed = Vec::new();
    let mut link_warnings = Vec::new();
    let mut written = false;
    if strict && !passed {
        tracing::warn!(conflicts = outcome.conflicts.len(), "strict mode, store left unchanged");
    } else {
        removed = store::remove_records(&mut outcome.updated, remove)?;
        outcome.updated.touch(&today());
        if dry_run {
            tracing::info!("dry run, store not written");
        } else {
            link_warnings = save_store(config, policy, &outcome.updated)?;
            written = true;
        }
        if !passed {
            tracing::warn!(
                conflicts = outcome.conflicts.len(),
                "conflicting candidates skipped, other merges kept"
            );
        }
    }

    let details = json!({
        "dryRun": dry_run,
        "strict": strict,
        "written": written,
        "outcome": outcome,
        "removed": removed,
        "linkWarnings": link_warnings,
    });
    let warnings = outcome.removed_candidates.len() + link_warnings.len();
    let report = RunReport::new("reconcile", passed, details)?
        .with_counts(outcome.conflicts.len(), warnings);
    finish(config, report)
}

fn cmd_render(config: &PipelineConfig, variant: Variant, out: Option<&Path>) -> Result<bool> {
    let products = load_store(config)?;
    let fragment = render::generate(&products.products, variant);
    match out {
        Some(path) => {
            store::write_atomic(fragment.as_bytes(), path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✅ {variant} fragment written to {}", path.display());
        }
        None => {
            std::io::stdout()
                .write_all(fragment.as_bytes())
                .context("writing fragment to stdout")?;
        }
    }
    let details = json!({
        "variant": variant.name(),
        "products": products.products.len(),
        "bytes": fragment.len(),
        "out": out,
    });
    let report = RunReport::new("render", true, details)?;
    report
        .write(&config.report_dir)
        .with_context(|| format!("writing {}", report.file_name()))?;
    Ok(true)
}

fn cmd_splice(
    config: &PipelineConfig,
    page: &Path,
    variant: Variant,
    region: &Region,
    fragment_path: Option<&Path>,
) -> Result<bool> {
    let document =
        fs::read_to_string(page).with_context(|| format!("reading page {}", page.display()))?;
    let fragment = match fragment_path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading fragment {}", path.display()))?,
        None => render::generate(&load_store(config)?.products, variant),
    };

    let outcome = match splice::splice(&document, region, &fragment) {
        Ok(outcome) => outcome,
        Err(err @ (PipelineError::MarkerNotFound { .. }
        | PipelineError::DuplicateMarker { .. }
        | PipelineError::InvalidFragment(_))) => {
            println!("❌ {err}");
            let details = json!({ "page": page, "error": err.to_string() });
            return finish(config, RunReport::new("splice", false, details)?.with_counts(1, 0));
        }
        Err(err) => return Err(err.into()),
    };

    if outcome.changed {
        store::write_atomic(outcome.document.as_bytes(), page)
            .with_context(|| format!("writing page {}", page.display()))?;
        tracing::info!(page = %page.display(), "page updated");
    } else {
        tracing::info!(page = %page.display(), "page already up to date");
    }
    let details = json!({ "page": page, "variant": variant.name(), "changed": outcome.changed });
    finish(config, RunReport::new("splice", true, details)?)
}

fn cmd_golden_validate(config: &PipelineConfig) -> Result<bool> {
    let products = load_store(config)?;
    let manifest = load_manifest(config)?;
    let drift = golden::validate(&products, &manifest)?;
    for mismatch in &drift.mismatches {
        println!("❌ {} ({:?})", mismatch.chunk_id, mismatch.kind);
    }
    let errors = drift.mismatches.len();
    let report = RunReport::new("golden validate", drift.passed, &drift)?.with_counts(errors, 0);
    finish(config, report)
}

fn cmd_golden_rebaseline(config: &PipelineConfig) -> Result<bool> {
    let products = load_store(config)?;
    let manifest = golden::rebaseline(
        &products,
        config.chunk_size,
        &now_rfc3339(),
        &config.manifest_path,
    )?;
    let details = json!({
        "manifest": config.manifest_path,
        "chunks": manifest.chunks.len(),
        "chunkSize": manifest.chunk_size,
    });
    finish(config, RunReport::new("golden rebaseline", true, details)?)
}

fn cmd_validate(config: &PipelineConfig, policy: &AffiliatePolicy, deploy: bool) -> Result<bool> {
    let products = load_store(config)?;
    let mode = if deploy { Mode::Deploy } else { Mode::Exploratory };
    let findings = validate::check_store(&products, policy, mode);
    print_findings(&findings);
    let (errors, warnings) = count_findings(&findings);
    let details = json!({
        "deploy": deploy,
        "products": products.products.len(),
        "findings": findings,
    });
    finish(
        config,
        RunReport::new("validate", errors == 0, details)?.with_counts(errors, warnings),
    )
}

fn cmd_audit(config: &PipelineConfig, policy: &AffiliatePolicy, page: &Path) -> Result<bool> {
    let products = load_store(config)?;
    let html =
        fs::read_to_string(page).with_context(|| format!("reading page {}", page.display()))?;
    let audit = audit::audit_page(&html, &products, policy);
    print_findings(&audit.findings);
    let (errors, warnings) = count_findings(&audit.findings);
    finish(
        config,
        RunReport::new("audit", audit.passed, &audit)?.with_counts(errors, warnings),
    )
}

fn cmd_deploy_gate(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    page: Option<&Path>,
) -> Result<bool> {
    let products = load_store(config)?;
    let manifest = load_manifest(config)?;
    let gate = validate::deploy_gate(&products, &manifest, policy)?;
    for mismatch in &gate.drift.mismatches {
        println!("❌ golden data {} ({:?})", mismatch.chunk_id, mismatch.kind);
    }
    print_findings(&gate.findings);

    let audit = match page {
        Some(page) => {
            let html = fs::read_to_string(page)
                .with_context(|| format!("reading page {}", page.display()))?;
            let audit = audit::audit_page(&html, &products, policy);
            print_findings(&audit.findings);
            Some(audit)
        }
        None => None,
    };

    let passed = gate.can_deploy && audit.as_ref().is_none_or(|a| a.passed);
    let (mut errors, mut warnings) = count_findings(&gate.findings);
    errors += gate.drift.mismatches.len();
    if let Some(audit) = &audit {
        let (e, w) = count_findings(&audit.findings);
        errors += e;
        warnings += w;
    }
    let details = json!({ "canDeploy": passed, "gate": gate, "audit": audit });
    finish(
        config,
        RunReport::new("deploy-gate", passed, details)?.with_counts(errors, warnings),
    )
}

fn cmd_affiliate_check(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    urls: &[String],
) -> Result<bool> {
    let mut results = Vec::new();
    let mut errors = 0;
    for url in urls {
        match policy.check(url) {
            Ok(()) => {
                println!("✅ {url}");
                results.push(json!({ "url": url, "valid": true }));
            }
            Err(violation) => {
                errors += 1;
                println!("❌ {url}: {violation}");
                results.push(json!({
                    "url": url,
                    "valid": false,
                    "violation": violation.to_string(),
                }));
            }
        }
    }
    let report = RunReport::new("affiliate check", errors == 0, results)?.with_counts(errors, 0);
    finish(config, report)
}

fn cmd_affiliate_normalize(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    urls: &[String],
) -> Result<bool> {
    let mut results = Vec::new();
    let mut errors = 0;
    for url in urls {
        match policy.normalize(url) {
            Ok(normalized) => {
                println!("{normalized}");
                results.push(json!({ "url": url, "normalized": normalized }));
            }
            Err(violation) => {
                errors += 1;
                eprintln!("❌ {url}: {violation}");
                results.push(json!({ "url": url, "violation": violation.to_string() }));
            }
        }
    }
    let report =
        RunReport::new("affiliate normalize", errors == 0, results)?.with_counts(errors, 0);
    report
        .write(&config.report_dir)
        .with_context(|| format!("writing {}", report.file_name()))?;
    Ok(report.passed)
}

async fn cmd_fetch_images(
    config: &PipelineConfig,
    policy: &AffiliatePolicy,
    dry_run: bool,
) -> Result<bool> {
    let mut products = load_store(config)?;
    if dry_run {
        let pending: Vec<_> = products
            .products
            .iter()
            .filter(|p| p.has_external_image())
            .map(|p| json!({ "id": p.id, "url": p.image_ref }))
            .collect();
        for item in &pending {
            println!("⬇️ {} {}", item["id"], item["url"]);
        }
        let details = json!({ "dryRun": true, "pending": pending });
        return finish(config, RunReport::new("fetch-images", true, details)?);
    }

    let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.user_agent)?;
    let report = images::localize_images(
        &mut products,
        &fetcher,
        &config.image_dir,
        &config.image_public_prefix,
    )
    .await?;
    let mut link_warnings = Vec::new();
    if !report.downloaded.is_empty() {
        link_warnings = save_store(config, policy, &products)?;
    }
    for failure in &report.failed {
        println!("⚠️ {}: {}", failure.id, failure.reason);
    }
    let mut details = serde_json::to_value(&report)?;
    details["linkWarnings"] = json!(link_warnings);
    let warnings = report.failed.len() + link_warnings.len();
    let run = RunReport::new("fetch-images", true, details)?.with_counts(0, warnings);
    finish(config, run)
}

fn cmd_sync_price_guide(config: &PipelineConfig, policy: &AffiliatePolicy) -> Result<bool> {
    let mut products = load_store(config)?;
    let changed = products.sync_price_guide();
    let mut link_warnings = Vec::new();
    if changed {
        products.touch(&today());
        link_warnings = save_store(config, policy, &products)?;
    } else {
        tracing::info!("price guide already matches tier constants");
    }
    let details = json!({
        "changed": changed,
        "priceGuide": products.page.price_guide,
        "linkWarnings": link_warnings,
    });
    let report =
        RunReport::new("sync-price-guide", true, details)?.with_counts(0, link_warnings.len());
    finish(config, report)
}
