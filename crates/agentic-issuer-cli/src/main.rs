//! AgenticIssuer CLI — `aiss` command.
//!
//! Creates issuer identities, issues and revokes claims, answers revocation
//! status queries and publishes pending states. Identities live in a file
//! store, signing keys in passphrase-sealed key files, and states are
//! anchored on the in-process development ledger.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use agentic_issuer::time::micros_to_rfc3339;
use agentic_issuer::{
    ClaimId, ClaimRequest, DirectorySchemaResolver, FileKeyStore, FileStore, Identifier,
    IdentityInfo, IdentityMetadata, IdentityMode, IdentityState, Issuer, IssuerConfig,
    LocalLedger, MerklizedRootPosition, RevocationReason, SubjectPosition,
};

const PASSPHRASE_ENV: &str = "AISS_PASSPHRASE";
const HOME_ENV: &str = "AISS_HOME";

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| anyhow!("neither {HOME_ENV} nor HOME is set"))?;
    Ok(PathBuf::from(home).join(".agentic").join("issuer"))
}

// ── Passphrase helper ─────────────────────────────────────────────────────────

fn read_passphrase(flag: Option<String>) -> Result<String> {
    if let Some(passphrase) = flag.or_else(|| std::env::var(PASSPHRASE_ENV).ok()) {
        return Ok(passphrase);
    }
    eprint!("Enter key passphrase: ");
    let mut passphrase = String::new();
    std::io::stdin()
        .read_line(&mut passphrase)
        .context("failed to read passphrase")?;
    let passphrase = passphrase.trim().to_string();
    if passphrase.is_empty() {
        return Err(anyhow!("passphrase cannot be empty"));
    }
    Ok(passphrase)
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// AgenticIssuer CLI — issue verifiable claims from ledger-anchored issuer
/// identities.
#[derive(Parser, Debug)]
#[command(
    name = "aiss",
    about = "AgenticIssuer CLI",
    version,
    long_about = "aiss — AgenticIssuer CLI\n\nCreate issuer identities, issue and revoke claims, query revocation\nstatus and publish identity states."
)]
struct Cli {
    /// Data directory (default: $AISS_HOME or ~/.agentic/issuer)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Config file (default: <dir>/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding claim schemas (default: <dir>/schemas)
    #[arg(long, global = true)]
    schemas: Option<PathBuf>,

    /// Key passphrase (default: $AISS_PASSPHRASE, else prompt)
    #[arg(long, global = true)]
    passphrase: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new issuer identity
    Init {
        /// Endpoint recorded in the auth claim (default: server_url)
        #[arg(long)]
        endpoint: Option<String>,

        /// Identity mode (standard, immutable, relay)
        #[arg(long, default_value = "standard")]
        mode: String,

        /// Leave the genesis state pending
        #[arg(long)]
        no_publish: bool,
    },

    /// Display identity information
    Show {
        /// Issuer identifier (did:aiss:...)
        identifier: String,
    },

    /// List all identities
    List,

    /// Issue a claim
    Issue {
        /// Issuer identifier (did:aiss:...)
        identifier: String,

        /// Schema location (file:// URI or path relative to the schema dir)
        #[arg(long)]
        schema: String,

        /// Credential type defined by the schema
        #[arg(long = "type")]
        credential_type: String,

        /// Credential subject as JSON
        #[arg(long)]
        subject: String,

        /// Expiration as Unix seconds
        #[arg(long)]
        expiration: Option<u64>,

        /// Claim version
        #[arg(long, default_value_t = 0)]
        version: u32,

        /// Where the subject id is committed (none, index, value)
        #[arg(long, default_value = "index")]
        subject_position: String,

        /// Where the subject data root is committed (none, index, value)
        #[arg(long, default_value = "none")]
        merklized_root_position: String,

        /// Leave the resulting state pending
        #[arg(long)]
        no_publish: bool,

        /// Print the W3C credential document
        #[arg(long)]
        credential: bool,
    },

    /// Revoke a claim by its revocation nonce
    Revoke {
        /// Issuer identifier (did:aiss:...)
        identifier: String,

        /// Revocation nonce of the claim
        nonce: u64,

        /// Reason (compromised, superseded, policy_violation,
        /// manual_revocation, holder_request, or custom text)
        #[arg(long)]
        reason: Option<String>,

        /// Leave the resulting state pending
        #[arg(long)]
        no_publish: bool,
    },

    /// Show a claim
    Claim {
        /// Issuer identifier (did:aiss:...)
        identifier: String,

        /// Claim ID (aclm_...)
        claim_id: String,

        /// Print the W3C credential document
        #[arg(long)]
        credential: bool,
    },

    /// Revocation status of a nonce, with its proof
    Status {
        /// Issuer identifier (did:aiss:...)
        identifier: String,

        /// Revocation nonce
        nonce: u64,

        /// Print the full status document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish the pending state
    ///
    /// Each run anchors on a fresh in-process development ledger, so block
    /// numbers restart at 1 on every invocation and are not comparable
    /// across runs.
    Publish {
        /// Issuer identifier (did:aiss:...)
        identifier: String,
    },

    /// Show the state history
    States {
        /// Issuer identifier (did:aiss:...)
        identifier: String,
    },
}

// ── Composition root ──────────────────────────────────────────────────────────

struct Session {
    issuer: Issuer,
}

fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<IssuerConfig> {
    if let Some(path) = explicit {
        return IssuerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let path = dir.join("config.json");
    if path.exists() {
        return IssuerConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let mut config = IssuerConfig::default();
    // The development ledger confirms on the first poll.
    config.publisher.poll_interval_ms = 50;
    config.publisher.max_wait_ms = 5_000;
    Ok(config)
}

fn open(cli: &Cli, needs_keys: bool) -> Result<Session> {
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;

    log::debug!("data directory {}", dir.display());

    let config = load_config(&dir, cli.config.as_deref())?;
    let schemas = cli.schemas.clone().unwrap_or_else(|| dir.join("schemas"));
    let store = FileStore::new(dir.join("identities")).context("failed to open identity store")?;

    let mut builder = Issuer::builder(config)
        .store(Arc::new(store))
        .schemas(Arc::new(DirectorySchemaResolver::new(schemas)))
        .ledger(Arc::new(LocalLedger::new()));
    if needs_keys {
        let passphrase = read_passphrase(cli.passphrase.clone())?;
        let keys =
            FileKeyStore::new(dir.join("keys"), &passphrase).context("failed to open key store")?;
        builder = builder.keys(Arc::new(keys));
    }
    let issuer = builder.build().context("invalid issuer configuration")?;
    Ok(Session { issuer })
}

fn parse_identifier(s: &str) -> Result<Identifier> {
    Identifier::parse(s).with_context(|| format!("invalid identifier '{s}'"))
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = run(&cli).await;

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let verbose = cli.verbose;
    match &cli.command {
        Commands::Init {
            endpoint,
            mode,
            no_publish,
        } => cmd_init(cli, endpoint.clone(), mode, *no_publish, verbose).await,
        Commands::Show { identifier } => cmd_show(cli, identifier).await,
        Commands::List => cmd_list(cli).await,
        Commands::Issue {
            identifier,
            schema,
            credential_type,
            subject,
            expiration,
            version,
            subject_position,
            merklized_root_position,
            no_publish,
            credential,
        } => {
            let subject: serde_json::Value =
                serde_json::from_str(subject).context("--subject must be valid JSON")?;
            let mut request = ClaimRequest::new(schema, credential_type, subject)
                .version(*version)
                .subject_position(
                    subject_position
                        .parse::<SubjectPosition>()
                        .context("invalid --subject-position")?,
                )
                .merklized_root_position(
                    merklized_root_position
                        .parse::<MerklizedRootPosition>()
                        .context("invalid --merklized-root-position")?,
                );
            if let Some(expiration) = expiration {
                request = request.expiration(*expiration);
            }
            cmd_issue(cli, identifier, request, *no_publish, *credential, verbose).await
        }
        Commands::Revoke {
            identifier,
            nonce,
            reason,
            no_publish,
        } => cmd_revoke(cli, identifier, *nonce, reason.as_deref(), *no_publish).await,
        Commands::Claim {
            identifier,
            claim_id,
            credential,
        } => cmd_claim(cli, identifier, claim_id, *credential).await,
        Commands::Status {
            identifier,
            nonce,
            json,
        } => cmd_status(cli, identifier, *nonce, *json).await,
        Commands::Publish { identifier } => cmd_publish(cli, identifier).await,
        Commands::States { identifier } => cmd_states(cli, identifier).await,
    }
}

// ── Identity commands ─────────────────────────────────────────────────────────

async fn cmd_init(
    cli: &Cli,
    endpoint: Option<String>,
    mode: &str,
    no_publish: bool,
    verbose: bool,
) -> Result<()> {
    let mode: IdentityMode = mode.parse().context("invalid --mode")?;
    let ctx = open(cli, true)?;

    let metadata = IdentityMetadata {
        endpoint: endpoint.unwrap_or_default(),
        mode,
    };
    let info = ctx
        .issuer
        .create_identity(metadata)
        .await
        .context("failed to create identity")?;

    println!("Created identity");
    println!("  ID:     {}", info.identifier);
    println!("  Mode:   {}", info.mode);
    if verbose {
        println!("  Key:    {}", info.public_key);
        println!("  Endpoint: {}", info.endpoint);
        println!("  Created: {}", micros_to_rfc3339(info.created_at));
    }

    if !no_publish {
        publish_and_report(&ctx.issuer, &info.identifier).await?;
    } else {
        println!("  State:  {} ({})", info.state_hash, info.status);
    }
    Ok(())
}

async fn cmd_show(cli: &Cli, identifier: &str) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let ctx = open(cli, false)?;
    let info = ctx
        .issuer
        .get_identity(&identifier)
        .await
        .context("failed to load identity")?;
    print_info(&info);
    Ok(())
}

async fn cmd_list(cli: &Cli) -> Result<()> {
    let ctx = open(cli, false)?;
    let identities = ctx
        .issuer
        .list_identities()
        .await
        .context("failed to list identities")?;

    if identities.is_empty() {
        println!("No identities found");
        return Ok(());
    }

    println!("{:<60} {:<10} {:<10} CLAIMS", "ID", "MODE", "STATUS");
    println!("{}", "-".repeat(90));
    for info in &identities {
        println!(
            "{:<60} {:<10} {:<10} {}",
            info.identifier.to_string(),
            info.mode.to_string(),
            info.status.to_string(),
            info.claim_count
        );
    }
    Ok(())
}

fn print_info(info: &IdentityInfo) {
    println!("Identity: {}", info.identifier);
    println!("  Mode:            {}", info.mode);
    println!("  Public Key:      {}", info.public_key);
    println!("  Endpoint:        {}", info.endpoint);
    println!("  Created:         {}", micros_to_rfc3339(info.created_at));
    println!("  State:           {} ({})", info.state_hash, info.status);
    println!("  Claims root:     {}", info.claims_tree_root);
    println!("  Revocation root: {}", info.revocation_tree_root);
    println!("  Roots root:      {}", info.root_of_roots);
    println!(
        "  Counts:          {} state(s), {} claim(s), {} revocation(s)",
        info.state_count, info.claim_count, info.revocation_count
    );
    if info.unpublished_changes {
        println!("  Unpublished changes waiting");
    }
    if let Some(reason) = &info.halted {
        println!("  HALTED: {reason}");
    }
}

// ── Claim commands ────────────────────────────────────────────────────────────

async fn cmd_issue(
    cli: &Cli,
    identifier: &str,
    request: ClaimRequest,
    no_publish: bool,
    credential: bool,
    verbose: bool,
) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let ctx = open(cli, true)?;
    let claim = ctx
        .issuer
        .create_claim(&identifier, request)
        .await
        .context("failed to issue claim")?;

    if credential {
        print_json(&claim.to_credential())?;
    } else {
        println!("Issued claim {}", claim.id);
        println!("  Nonce:  {}", claim.revocation_nonce);
        println!("  Type:   {}", claim.credential_type);
        println!("  Status: {}", claim.credential_status.id);
        if verbose {
            println!("  Index:  {}", claim.index);
            println!("  Value:  {}", claim.value);
        }
    }

    if !no_publish {
        publish_and_report(&ctx.issuer, &identifier).await?;
    }
    Ok(())
}

async fn cmd_revoke(
    cli: &Cli,
    identifier: &str,
    nonce: u64,
    reason: Option<&str>,
    no_publish: bool,
) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let reason = reason
        .map(RevocationReason::parse)
        .unwrap_or(RevocationReason::ManualRevocation);
    let ctx = open(cli, true)?;
    let status = ctx
        .issuer
        .revoke_claim(&identifier, nonce, reason)
        .await
        .context("failed to revoke claim")?;

    println!("Revoked nonce {nonce}");
    println!("  Revocation root: {}", status.revocation_tree_root);

    if !no_publish {
        publish_and_report(&ctx.issuer, &identifier).await?;
    }
    Ok(())
}

async fn cmd_claim(cli: &Cli, identifier: &str, claim_id: &str, credential: bool) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let claim_id = ClaimId::parse(claim_id).context("invalid claim id")?;
    let ctx = open(cli, false)?;
    let claim = ctx
        .issuer
        .get_claim(&identifier, &claim_id)
        .await
        .context("failed to load claim")?;

    if credential {
        return print_json(&claim.to_credential());
    }

    println!("Claim: {}", claim.id);
    println!("  Issuer:  {}", claim.identifier);
    println!("  Schema:  {}", claim.schema_url);
    println!("  Type:    {}", claim.credential_type);
    println!("  Nonce:   {}", claim.revocation_nonce);
    println!("  Issued:  {}", micros_to_rfc3339(claim.issuance_date));
    if let Some(expiration) = claim.expiration {
        println!("  Expires: {}", micros_to_rfc3339(expiration.saturating_mul(1_000_000)));
    }
    match claim.verify_signature() {
        Ok(()) => println!("  Signature: valid"),
        Err(e) => println!("  Signature: INVALID ({e})"),
    }
    match claim.proof.claims_tree_root {
        Some(root) => match claim.verify_inclusion(&root) {
            Ok(()) => println!("  Inclusion: valid against {root}"),
            Err(e) => println!("  Inclusion: INVALID ({e})"),
        },
        None => println!("  Inclusion: none (signature-only claim)"),
    }
    Ok(())
}

async fn cmd_status(cli: &Cli, identifier: &str, nonce: u64, json: bool) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let ctx = open(cli, false)?;
    let status = ctx
        .issuer
        .get_revocation_status(&identifier, nonce)
        .await
        .context("failed to query revocation status")?;

    if json {
        return print_json(&status);
    }

    println!("Nonce {nonce}: {}", if status.revoked { "REVOKED" } else { "not revoked" });
    println!("  Revocation root: {}", status.revocation_tree_root);
    if let Some(state) = &status.latest_state {
        println!("  State:           {} ({})", state.state_hash, state.status);
    }
    if let Some(revocation) = &status.revocation {
        println!("  Reason:          {}", revocation.reason.as_str());
        println!("  Revoked at:      {}", micros_to_rfc3339(revocation.revoked_at));
    }
    match status.verify() {
        Ok(()) => println!("  Proof: valid"),
        Err(e) => println!("  Proof: INVALID ({e})"),
    }
    Ok(())
}

// ── State commands ────────────────────────────────────────────────────────────

async fn cmd_publish(cli: &Cli, identifier: &str) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let ctx = open(cli, false)?;
    publish_and_report(&ctx.issuer, &identifier).await
}

async fn cmd_states(cli: &Cli, identifier: &str) -> Result<()> {
    let identifier = parse_identifier(identifier)?;
    let ctx = open(cli, false)?;
    let states = ctx
        .issuer
        .get_states(&identifier)
        .await
        .context("failed to load states")?;

    println!("{:<4} {:<66} {:<10} {:<8} CREATED", "#", "STATE", "STATUS", "BLOCK");
    println!("{}", "-".repeat(120));
    for (i, state) in states.iter().enumerate() {
        println!(
            "{:<4} {:<66} {:<10} {:<8} {}",
            i,
            state.state_hash.to_string(),
            state.status.to_string(),
            state
                .block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".into()),
            micros_to_rfc3339(state.created_at)
        );
        if let Some(reason) = &state.failure_reason {
            println!("     failure: {reason}");
        }
    }
    Ok(())
}

async fn publish_and_report(issuer: &Issuer, identifier: &Identifier) -> Result<()> {
    let published = issuer
        .publish_pending_state(identifier)
        .await
        .context("failed to publish state")?;
    match published {
        Some(state) => print_published(&state),
        None => println!("  Nothing to publish"),
    }
    Ok(())
}

fn print_published(state: &IdentityState) {
    println!("  State:  {} ({})", state.state_hash, state.status);
    if let Some(block) = state.block_number {
        println!("  Block:  {block}");
    }
    if let Some(reason) = &state.failure_reason {
        println!("  Failure: {reason}");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
