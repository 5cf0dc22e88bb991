//! CLI command implementations for the botdesk dashboard.
//!
//! Provides subcommand handlers for:
//! - `botdesk login|register|logout|whoami` — session lifecycle
//! - `botdesk overview` — usage snapshot and conversation aggregates
//! - `botdesk chart` — activity chart rows
//! - `botdesk convos` — conversation list with optional export
//! - `botdesk clients ...` — tenant administration (admin role)
//! - `botdesk knowledge ...` — knowledge-base gate and builds (client role)
//! - `botdesk webhooks ...` — webhook subscription status (client role)
//! - `botdesk channels ...` — channel connection proofs (client role)
//! - `botdesk config show|init|set|reset` — configuration management
//! - `botdesk doctor` — local environment check

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::Local;
use colored::Colorize;
use regex::Regex;
use serde_json::json;

use crate::api::types::{
    Ack, ChartResponse, ClientRecord, Conversation, Envelope, HealthReport, HealthWarning,
    IgMedia, IgProfile, Me, SavedClient, StatsSnapshot, WebhookStatus, WhatsAppStatus,
};
use crate::api::{ApiClient, multipart::MultipartForm, urlencode};
use crate::chart::{self, TimeframeMode};
use crate::config;
use crate::export::{self, ExportFormat};
use crate::knowledge::{self, BuildForm, BuildInput};
use crate::reqlog;
use crate::session::{self, Role, SessionCache};
use crate::stats;
use crate::webhooks;

/// Output format for data-rendering commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// botdesk login | register | logout | whoami
// ---------------------------------------------------------------------------

/// Log in and cache the session cookie and identity.
pub fn run_login(api: &mut ApiClient, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };

    let body = json!({ "email": email, "password": password });
    let (_response, cookie): (serde_json::Value, _) =
        api.post_capturing_cookie("/api/login", &body)?;

    let cookie = cookie.context("login succeeded but the server set no session cookie")?;
    api.set_cookie(Some(cookie.clone()));

    let me: Me = api.get_json("/api/me").context("login verification failed")?;

    let cache = SessionCache {
        role: Some(me.role.clone()),
        email: me.email.clone(),
        client_id: me.client_id.clone(),
        cookie: Some(cookie),
    };
    cache.save()?;

    println!(
        "{} logged in as {} ({})",
        "✓".green().bold(),
        me.email.as_deref().unwrap_or(email),
        me.role
    );
    Ok(())
}

/// Register a new account. Validates locally before posting.
pub fn run_register(
    api: &mut ApiClient,
    name: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }

    let email = email.trim().to_lowercase();
    if email.is_empty() {
        bail!("email must not be empty");
    }

    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    if password.len() < 6 {
        bail!("password must be at least 6 characters");
    }

    let body = json!({ "name": name, "email": email, "password": password });
    let (_response, cookie): (serde_json::Value, _) =
        api.post_capturing_cookie("/api/register", &body)?;

    println!("{} account created for {email}", "✓".green().bold());

    // Registration logs the new account in when the server sets a cookie.
    if let Some(cookie) = cookie {
        api.set_cookie(Some(cookie.clone()));
        if let Ok(me) = api.get_json::<Me>("/api/me") {
            let cache = SessionCache {
                role: Some(me.role.clone()),
                email: me.email.clone(),
                client_id: me.client_id.clone(),
                cookie: Some(cookie),
            };
            cache.save()?;
            println!("  logged in as {} ({})", email, me.role);
        }
    }

    Ok(())
}

/// Log out and invalidate the cached session.
///
/// The local cache is cleared even when the server call fails: a stale
/// cookie on disk is worse than an orphaned server session.
pub fn run_logout(api: &ApiClient) -> Result<()> {
    if let Err(err) = api.post_ok("/api/logout") {
        eprintln!("{} server logout failed: {err:#}", "warning:".yellow().bold());
    }

    SessionCache::clear()?;
    println!("{} logged out", "✓".green().bold());
    Ok(())
}

/// Show the current session identity.
pub fn run_whoami(api: &ApiClient) -> Result<()> {
    let me = session::require_login(api)?;
    println!("{}  {}", "role:".bold(), me.role);
    if let Some(email) = &me.email {
        println!("{} {email}", "email:".bold());
    }
    if let Some(client_id) = &me.client_id {
        println!("{} {client_id}", "client:".bold());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk overview
// ---------------------------------------------------------------------------

/// Usage snapshot plus conversation aggregates for the logged-in role.
pub fn run_overview(api: &ApiClient, format: OutputFormat) -> Result<()> {
    let me = session::require_login(api)?;

    let (snapshot, convos) = if me.role == Role::Admin.as_str() {
        let snapshot: StatsSnapshot = api.get_json_with_retry("/api/stats")?;
        let convos: Vec<Conversation> = api.get_json_with_retry("/api/conversations")?;
        (snapshot, convos)
    } else {
        let id = own_client_id(&me)?;
        let snapshot: StatsSnapshot =
            api.get_json_with_retry(&format!("/api/stats/{}", urlencode(id)))?;
        let convos: Vec<Conversation> =
            api.get_json_with_retry(&format!("/api/conversations/{}", urlencode(id)))?;
        (snapshot, convos)
    };

    let aggregates = stats::aggregate(&convos, Local::now().date_naive());
    let is_client = me.role == Role::Client.as_str();

    match format {
        OutputFormat::Json => {
            let out = json!({
                "totalClients": snapshot.total_clients,
                "used": snapshot.used,
                "quota": snapshot.quota,
                "remaining": snapshot.remaining(),
                "totalHumanRequests": snapshot.total_human_requests,
                "totalTourRequests": snapshot.total_tour_requests,
                "totalorderRequests": snapshot.total_order_requests,
                "conversations": aggregates,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Csv => {
            println!("metric,value");
            if !is_client {
                println!("total_clients,{}", snapshot.total_clients);
            }
            println!("used,{}", snapshot.used);
            println!("quota,{}", snapshot.quota);
            println!("remaining,{}", snapshot.remaining());
            println!("conversations_total,{}", aggregates.total);
            println!("avg_messages,{}", aggregates.avg_messages);
            println!("active_today,{}", aggregates.active_today);
            if is_client {
                println!("human_requests,{}", snapshot.total_human_requests);
                println!("tour_requests,{}", snapshot.total_tour_requests);
                println!("order_requests,{}", snapshot.total_order_requests);
            }
        }
        OutputFormat::Table => {
            println!("{}", "Platform Overview".bold().cyan());
            println!("{}", "=".repeat(50));
            if !is_client {
                println!("  {} {}", "Clients:    ".bold(), snapshot.total_clients);
            }
            println!(
                "  {} {} / {} ({} remaining)",
                "Quota used: ".bold(),
                format_number(snapshot.used),
                format_number(snapshot.quota),
                format_number(snapshot.remaining())
            );
            if is_client {
                println!(
                    "  {} human {} / tour {} / order {}",
                    "Handovers:  ".bold(),
                    snapshot.total_human_requests,
                    snapshot.total_tour_requests,
                    snapshot.total_order_requests
                );
            }
            println!();
            print_aggregates(&aggregates);
        }
    }

    Ok(())
}

fn print_aggregates(aggregates: &stats::ConversationStats) {
    println!("{}", "Conversations".bold().cyan());
    println!(
        "  Total: {}  Avg messages: {}  Active today: {}",
        aggregates.total, aggregates.avg_messages, aggregates.active_today
    );
    let s = &aggregates.by_source;
    println!(
        "  Sources: web {}  messenger {}  instagram {}  whatsapp {}  other {}",
        s.web, s.messenger, s.instagram, s.whatsapp, s.other
    );
}

// ---------------------------------------------------------------------------
// botdesk chart
// ---------------------------------------------------------------------------

/// Activity chart rows for a timeframe.
pub fn run_chart(
    api: &ApiClient,
    mode: TimeframeMode,
    client: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let me = session::require_login(api)?;

    let path = match (client, me.role == Role::Client.as_str()) {
        (Some(id), _) => format!("/api/stats/{}?mode={}", urlencode(&id), mode.as_str()),
        (None, true) => {
            let id = own_client_id(&me)?;
            format!("/api/stats/{}?mode={}", urlencode(id), mode.as_str())
        }
        (None, false) => format!("/api/stats?mode={}", mode.as_str()),
    };

    let response: ChartResponse = api.get_json(&path)?;
    let points = chart::normalize(mode, &response.into_buckets());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&points)?),
        OutputFormat::Csv => {
            println!("label,messages");
            for point in &points {
                println!("{},{}", point.label, point.messages);
            }
        }
        OutputFormat::Table => {
            println!("{}", format!("Activity ({})", mode.as_str()).bold().cyan());
            println!("{}", "=".repeat(40));
            if points.is_empty() {
                println!("  {}", "no data for this timeframe".yellow());
                return Ok(());
            }
            let max = points.iter().map(|p| p.messages).max().unwrap_or(1).max(1);
            for point in &points {
                let width = (point.messages * 30 / max) as usize;
                println!(
                    "  {:>8}  {:>6}  {}",
                    point.label,
                    point.messages,
                    "█".repeat(width).blue()
                );
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk convos
// ---------------------------------------------------------------------------

/// Conversation list with aggregates and optional file export.
pub fn run_convos(
    api: &ApiClient,
    client: Option<String>,
    source: Option<String>,
    export_format: Option<ExportFormat>,
    out: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let me = session::require_login(api)?;

    let target = client.or_else(|| me.client_id.clone());
    let path = match &target {
        Some(id) => {
            let query = source
                .as_deref()
                .map(|s| format!("?source={}", urlencode(s)))
                .unwrap_or_default();
            format!("/api/conversations/{}{query}", urlencode(id))
        }
        None => "/api/conversations".to_string(),
    };

    let convos: Vec<Conversation> = api.get_json_with_retry(&path)?;

    if let Some(export_format) = export_format {
        if convos.is_empty() {
            println!("{}", "nothing to export".yellow());
            return Ok(());
        }
        let written = export::write_export(export_format, &convos, out.as_deref())?;
        println!(
            "{} exported {} conversations to {}",
            "✓".green().bold(),
            convos.len(),
            written.display()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", export::to_json(&convos)?),
        OutputFormat::Csv => println!("{}", export::to_csv(&convos)),
        OutputFormat::Table => {
            let aggregates = stats::aggregate(&convos, Local::now().date_naive());
            print_aggregates(&aggregates);
            println!();

            if convos.is_empty() {
                println!("  {}", "no conversations".yellow());
                return Ok(());
            }

            println!(
                "  {:<4} {:<10} {:<24} {:>8}  Updated",
                "#", "Source", "User", "Messages"
            );
            println!("  {}", "-".repeat(70));
            for (i, convo) in convos.iter().enumerate() {
                println!(
                    "  {:<4} {:<10} {:<24} {:>8}  {}",
                    i,
                    convo.source.as_deref().unwrap_or("-"),
                    truncate(convo.display_user(), 24),
                    convo.history.len(),
                    convo.updated_at.as_deref().unwrap_or("-").dimmed()
                );
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk clients ...
// ---------------------------------------------------------------------------

/// Tenant fields settable from the command line. Unset fields are left
/// untouched on update.
#[derive(Debug, Default, clap::Args)]
pub struct ClientFieldArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub quota: Option<u64>,
    #[arg(long)]
    pub page_id: Option<String>,
    #[arg(long)]
    pub page_name: Option<String>,
    #[arg(long)]
    pub ig_id: Option<String>,
    #[arg(long)]
    pub page_access_token: Option<String>,
    #[arg(long)]
    pub verify_token: Option<String>,
    #[arg(long)]
    pub system_prompt: Option<String>,
    #[arg(long)]
    pub faqs: Option<String>,
    #[arg(long)]
    pub business_name: Option<String>,
    /// Knowledge file to attach after saving. Repeatable.
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}

impl ClientFieldArgs {
    fn apply(&self, record: &mut ClientRecord) {
        if let Some(v) = &self.name {
            record.name = v.clone();
        }
        if let Some(v) = &self.email {
            record.email = v.clone();
        }
        if let Some(v) = self.quota {
            record.quota = v;
        }
        if let Some(v) = &self.page_id {
            record.page_id = Some(v.clone());
        }
        if let Some(v) = &self.page_name {
            record.page_name = Some(v.clone());
        }
        if let Some(v) = &self.ig_id {
            record.ig_id = Some(v.clone());
        }
        if let Some(v) = &self.page_access_token {
            record.page_access_token = Some(v.clone());
        }
        if let Some(v) = &self.verify_token {
            record.verify_token = Some(v.clone());
        }
        if let Some(v) = &self.system_prompt {
            record.system_prompt = Some(v.clone());
        }
        if let Some(v) = &self.faqs {
            record.faqs = Some(v.clone());
        }
        if let Some(v) = &self.business_name {
            record.business_name = Some(v.clone());
        }
    }
}

/// List all tenants from the admin stats snapshot.
pub fn run_clients_list(api: &ApiClient, format: OutputFormat) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    let snapshot: StatsSnapshot = api.get_json_with_retry("/api/stats")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot.clients)?);
        }
        OutputFormat::Csv => {
            println!("client_id,name,email,used,quota,active,files");
            for client in &snapshot.clients {
                println!(
                    "{},{},{},{},{},{},{}",
                    client.client_id.as_deref().unwrap_or(""),
                    client.name.replace(',', " "),
                    client.email,
                    client.used,
                    client.quota,
                    client.active,
                    client.files.len()
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", "Clients".bold().cyan());
            println!("{}", "=".repeat(78));
            println!(
                "  {:<14} {:<20} {:>12} {:>7} {:>6}  Last active",
                "ID", "Name", "Used/Quota", "Active", "Files"
            );
            println!("  {}", "-".repeat(76));
            for client in &snapshot.clients {
                let active = if client.active {
                    "yes".green()
                } else {
                    "no".red()
                };
                println!(
                    "  {:<14} {:<20} {:>12} {:>7} {:>6}  {}",
                    truncate(client.client_id.as_deref().unwrap_or("-"), 14),
                    truncate(&client.name, 20),
                    format!("{}/{}", client.used, client.quota),
                    active,
                    client.files.len(),
                    client.last_active.as_deref().unwrap_or("-").dimmed()
                );
            }
        }
    }

    Ok(())
}

/// Show one tenant record.
pub fn run_clients_show(api: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    let record: ClientRecord = api.get_json(&format!("/api/clients/{}", urlencode(id)))?;

    match format {
        OutputFormat::Json | OutputFormat::Csv => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        OutputFormat::Table => {
            println!("{}", record.name.bold().cyan());
            println!("{}", "=".repeat(50));
            println!("  {} {}", "ID:       ".bold(), record.client_id.as_deref().unwrap_or("-"));
            println!("  {} {}", "Email:    ".bold(), record.email);
            println!(
                "  {} {} / {} ({} remaining)",
                "Quota:    ".bold(),
                record.used,
                record.quota,
                record.remaining()
            );
            println!(
                "  {} {}",
                "Active:   ".bold(),
                if record.active { "yes".green() } else { "no".red() }
            );
            println!(
                "  {} {}",
                "Page:     ".bold(),
                record.page_id.as_deref().unwrap_or("-")
            );
            println!(
                "  {} {}",
                "Instagram:".bold(),
                record.ig_id.as_deref().unwrap_or("-")
            );
            let gate = knowledge::gate_from_client(&record);
            println!(
                "  {} {} (v{})",
                "Knowledge:".bold(),
                if gate.ready {
                    gate.status.green()
                } else {
                    gate.status.yellow()
                },
                gate.version
            );
            if !record.files.is_empty() {
                println!("  {}", "Files:".bold());
                for file in &record.files {
                    println!("    {}  {}", file.id.dimmed(), file.name);
                }
            }
        }
    }

    Ok(())
}

/// Create a tenant, then upload any attached files.
pub fn run_clients_add(api: &ApiClient, fields: ClientFieldArgs) -> Result<()> {
    session::require_role(api, Role::Admin)?;

    if fields.name.is_none() || fields.email.is_none() {
        bail!("--name and --email are required when adding a client");
    }

    let mut record = ClientRecord {
        active: true,
        ..Default::default()
    };
    fields.apply(&mut record);

    let body = serde_json::to_value(&record)?;
    let saved: SavedClient = api.post_json("/api/clients", &body)?;
    let saved = saved.into_inner();
    let id = saved
        .client_id
        .context("server response is missing clientId")?;

    println!("{} created client {id}", "✓".green().bold());
    upload_files(api, &id, &fields.files)?;

    println!();
    run_clients_list(api, OutputFormat::Table)
}

/// Update a tenant by sending back the whole fetched record with the given
/// fields overridden.
pub fn run_clients_update(api: &ApiClient, id: &str, fields: ClientFieldArgs) -> Result<()> {
    session::require_role(api, Role::Admin)?;

    let mut record: ClientRecord = api.get_json(&format!("/api/clients/{}", urlencode(id)))?;
    fields.apply(&mut record);

    let body = serde_json::to_value(&record)?;
    let saved: SavedClient = api.put_json(&format!("/api/clients/{}", urlencode(id)), &body)?;
    let saved = saved.into_inner();

    println!(
        "{} updated client {}",
        "✓".green().bold(),
        saved.client_id.as_deref().unwrap_or(id)
    );
    upload_files(api, id, &fields.files)?;

    println!();
    run_clients_list(api, OutputFormat::Table)
}

pub fn run_clients_delete(api: &ApiClient, id: &str) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    api.delete_ok(&format!("/api/clients/{}", urlencode(id)))?;
    println!("{} deleted client {id}", "✓".green().bold());
    Ok(())
}

/// Flip a tenant's `active` flag by round-tripping the whole record.
pub fn run_clients_set_active(api: &ApiClient, id: &str, active: bool) -> Result<()> {
    session::require_role(api, Role::Admin)?;

    let mut record: ClientRecord = api.get_json(&format!("/api/clients/{}", urlencode(id)))?;
    record.active = active;

    let body = serde_json::to_value(&record)?;
    let _: SavedClient = api.put_json(&format!("/api/clients/{}", urlencode(id)), &body)?;

    println!(
        "{} client {id} is now {}",
        "✓".green().bold(),
        if active { "active".green() } else { "inactive".red() }
    );
    Ok(())
}

pub fn run_clients_renew(api: &ApiClient, id: &str) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    api.post_ok(&format!("/admin/renew/{}", urlencode(id)))?;
    println!("{} renewed quota for {id}", "✓".green().bold());
    Ok(())
}

pub fn run_clients_renew_all(api: &ApiClient) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    api.post_ok("/admin/renew-all")?;
    println!("{} renewed quota for all clients", "✓".green().bold());
    Ok(())
}

pub fn run_clients_upload(api: &ApiClient, id: &str, files: Vec<PathBuf>) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    if files.is_empty() {
        bail!("pass at least one --file");
    }
    upload_files(api, id, &files)
}

/// Delete an attached file, then confirm against fresh stats.
pub fn run_clients_delete_file(api: &ApiClient, id: &str, file_id: &str) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    api.delete_ok(&format!(
        "/clients/{}/files/{}",
        urlencode(id),
        urlencode(file_id)
    ))?;
    println!("{} deleted file {file_id}", "✓".green().bold());

    // Confirm against fresh stats.
    let snapshot: StatsSnapshot = api.get_json_with_retry("/api/stats")?;
    if let Some(client) = snapshot
        .clients
        .iter()
        .find(|c| c.client_id.as_deref() == Some(id))
    {
        println!("  {} file(s) remaining", client.files.len());
    }
    Ok(())
}

/// Health report for one tenant. Fetch failures degrade to synthesized
/// warnings instead of aborting.
pub fn run_clients_health(api: &ApiClient, id: &str) -> Result<()> {
    session::require_role(api, Role::Admin)?;
    let report = fetch_health(api, id);

    println!("{}", format!("Health: {id}").bold().cyan());
    println!("{}", "=".repeat(40));
    print_health_item("Status", report.status == "ok", &report.status);

    if report.warnings.is_empty() {
        println!("  {}", "no warnings".dimmed());
    }
    for warning in &report.warnings {
        let severity = match warning.severity.as_str() {
            "error" => warning.severity.red().bold(),
            "warning" => warning.severity.yellow(),
            _ => warning.severity.normal(),
        };
        println!("  [{severity}] {} — {}", warning.code.bold(), warning.message);
    }

    Ok(())
}

fn fetch_health(api: &ApiClient, id: &str) -> HealthReport {
    match api.get_json::<HealthReport>(&format!("/api/clients/{}/health", urlencode(id))) {
        Ok(report) => report,
        Err(err) => HealthReport {
            status: "unknown".to_string(),
            warnings: vec![HealthWarning {
                code: "HEALTH_FETCH_FAILED".to_string(),
                severity: "warning".to_string(),
                message: format!("could not fetch health: {err:#}"),
            }],
        },
    }
}

/// Upload files one at a time to `/upload/:clientId`. Any failed upload
/// aborts the remaining ones.
fn upload_files(api: &ApiClient, client_id: &str, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let data = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin");
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);

        let mut form = MultipartForm::new();
        form.file("file", filename, "application/octet-stream", &data)
            .text("name", name);

        let _: serde_json::Value =
            api.post_multipart(&format!("/upload/{}", urlencode(client_id)), form)?;
        println!("  uploaded {}", filename.dimmed());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk knowledge ...
// ---------------------------------------------------------------------------

/// Structured build form fields, all optional but at least one required.
#[derive(Debug, Default, clap::Args)]
pub struct BuildFormArgs {
    #[arg(long)]
    pub business_name: Option<String>,
    #[arg(long)]
    pub business_type: Option<String>,
    #[arg(long)]
    pub city_area: Option<String>,
    #[arg(long)]
    pub hours: Option<String>,
    #[arg(long)]
    pub phone_whatsapp: Option<String>,
    #[arg(long)]
    pub services: Option<String>,
    #[arg(long)]
    pub faqs: Option<String>,
    #[arg(long)]
    pub listings_summary: Option<String>,
    #[arg(long)]
    pub payment_plans: Option<String>,
    #[arg(long)]
    pub policies: Option<String>,
}

impl BuildFormArgs {
    fn into_form(self) -> BuildForm {
        BuildForm {
            business_name: self.business_name.unwrap_or_default(),
            business_type: self.business_type.unwrap_or_default(),
            city_area: self.city_area.unwrap_or_default(),
            hours: self.hours.unwrap_or_default(),
            phone_whatsapp: self.phone_whatsapp.unwrap_or_default(),
            services: self.services.unwrap_or_default(),
            faqs: self.faqs.unwrap_or_default(),
            listings_summary: self.listings_summary.unwrap_or_default(),
            payment_plans: self.payment_plans.unwrap_or_default(),
            policies: self.policies.unwrap_or_default(),
        }
    }
}

/// Show the knowledge-base gate for the logged-in client.
pub fn run_knowledge_status(api: &ApiClient, bot_type: &str) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let gate = knowledge::fetch_gate(api, id, bot_type);
    let status = if gate.ready {
        gate.status.green().bold()
    } else {
        gate.status.yellow().bold()
    };
    println!("{} {status}", "Knowledge base:".bold());
    println!("  version: {}", gate.version);
    println!(
        "  connections: {}",
        if gate.ready {
            "unlocked".green()
        } else {
            "locked until the bot is built".yellow()
        }
    );
    Ok(())
}

/// Build the knowledge base from structured form fields.
pub fn run_knowledge_build(api: &ApiClient, form: BuildFormArgs, bot_type: &str) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    knowledge::submit_build(api, id, bot_type, &BuildInput::Form(form.into_form()))?;
    println!("{} bot built. Connections are now unlocked.", "✓".green().bold());
    Ok(())
}

/// Build the knowledge base from pasted text.
pub fn run_knowledge_paste(
    api: &ApiClient,
    section: &str,
    text: &str,
    bot_type: &str,
) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let input = BuildInput::Text {
        section: section.to_string(),
        text: text.to_string(),
    };
    knowledge::submit_build(api, id, bot_type, &input)?;
    println!("{} bot built. Connections are now unlocked.", "✓".green().bold());
    Ok(())
}

/// Build the knowledge base from a .txt file upload.
pub fn run_knowledge_upload(
    api: &ApiClient,
    section: &str,
    path: PathBuf,
    bot_type: &str,
) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let input = BuildInput::File {
        section: section.to_string(),
        path,
    };
    knowledge::submit_build(api, id, bot_type, &input)?;
    println!("{} bot built. Connections are now unlocked.", "✓".green().bold());
    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk webhooks ...
// ---------------------------------------------------------------------------

pub fn run_webhooks_status(api: &ApiClient, format: OutputFormat) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let status: WebhookStatus =
        api.get_json(&format!("/api/webhooks/status/{}", urlencode(id)))?;

    match format {
        OutputFormat::Json | OutputFormat::Csv => {
            let out = json!({
                "webhookSubscribed": status.subscribed,
                "webhookFields": status.fields,
                "webhookSubscribedAt": status.subscribed_at,
                "lastWebhookAt": status.last_webhook_at,
                "lastWebhookType": status.last_webhook_type,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", "Webhook Status".bold().cyan());
            println!("{}", "=".repeat(40));
            print_health_item(
                "Subscribed",
                status.subscribed,
                status.subscribed_at.as_deref().unwrap_or("never"),
            );
            if !status.fields.is_empty() {
                println!("  {} {}", "Fields:".bold(), status.fields.join(", "));
            }
            println!(
                "  {} {} ({})",
                "Last event:".bold(),
                status.last_webhook_at.as_deref().unwrap_or("none"),
                status.last_webhook_type.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

pub fn run_webhooks_subscribe(api: &ApiClient) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let ack: Ack = api.post_empty(&format!("/api/webhooks/subscribe/{}", urlencode(id)))?;
    if !ack.accepted() {
        bail!("subscribe failed: {ack:?}");
    }
    println!("{} webhook subscribed", "✓".green().bold());
    Ok(())
}

/// Show the last webhook payload, optionally reduced to its messages.
pub fn run_webhooks_last(api: &ApiClient, messages_only: bool) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let payload: serde_json::Value =
        api.get_json(&format!("/api/webhooks/last/{}", urlencode(id)))?;

    if messages_only {
        match webhooks::extract_messages(&payload) {
            Some(messages) => println!("{}", serde_json::to_string_pretty(&messages)?),
            None => {
                eprintln!(
                    "{} no messages found in payload, showing full payload",
                    "note:".yellow()
                );
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk channels ...
// ---------------------------------------------------------------------------

/// Text sent by default for channel test messages.
const DEFAULT_TEST_TEXT: &str = "✅ Test message from dashboard";
const DEFAULT_WA_TEST_TEXT: &str = "✅ Test message from dashboard (WhatsApp)";
const REVIEW_TEST_TEXT: &str = "Your appointment has been scheduled.";

/// Print the Facebook OAuth URL. The connect flow needs a browser.
pub fn run_channels_facebook(api: &ApiClient, bot_type: &str) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;
    ensure_bot_ready(api, id, bot_type)?;

    println!("Open this URL in a browser to connect your Facebook page:");
    println!("  {}/auth/facebook?clientId={}", api.base_url(), urlencode(id));
    Ok(())
}

pub fn run_channels_whatsapp_status(api: &ApiClient, format: OutputFormat) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let status: WhatsAppStatus =
        api.get_json(&format!("/api/whatsapp/status?clientId={}", urlencode(id)))?;

    match format {
        OutputFormat::Json | OutputFormat::Csv => {
            let out = json!({
                "ok": status.ok,
                "connected": status.connected,
                "wabaId": status.waba_id,
                "phoneNumberId": status.phone_number_id,
                "displayPhone": status.display_phone,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", "WhatsApp".bold().cyan());
            println!("{}", "=".repeat(40));
            print_health_item(
                "Connected",
                status.connected,
                status.display_phone.as_deref().unwrap_or("no number"),
            );
            if let Some(waba) = &status.waba_id {
                println!("  {} {waba}", "WABA:  ".bold());
            }
            if let Some(phone_id) = &status.phone_number_id {
                println!("  {} {phone_id}", "Number:".bold());
            }
        }
    }

    Ok(())
}

/// Print the WhatsApp OAuth URL. The connect flow needs a browser.
pub fn run_channels_whatsapp_connect(api: &ApiClient, bot_type: &str) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;
    ensure_bot_ready(api, id, bot_type)?;

    println!("Open this URL in a browser to connect WhatsApp:");
    println!("  {}/auth/whatsapp?clientId={}", api.base_url(), urlencode(id));
    Ok(())
}

pub fn run_channels_whatsapp_send_test(
    api: &ApiClient,
    to: &str,
    text: Option<String>,
    bot_type: &str,
) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;
    ensure_bot_ready(api, id, bot_type)?;

    if !is_valid_phone(to) {
        bail!("'{to}' is not a valid phone number (expected 8-15 digits, optional leading +)");
    }

    let body = json!({
        "clientId": id,
        "to": to,
        "text": text.unwrap_or_else(|| DEFAULT_WA_TEST_TEXT.to_string()),
    });
    let ack: Ack = api.post_json("/whatsapp/send-test", &body)?;
    if !ack.accepted() {
        bail!("send failed: {ack:?}");
    }
    println!("{} test message sent to {to}", "✓".green().bold());
    Ok(())
}

pub fn run_channels_ig_profile(api: &ApiClient) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let envelope: Envelope<IgProfile> = api.get_json(&format!(
        "/instagram/review/profile?clientId={}",
        urlencode(id)
    ))?;
    let profile = envelope.into_data()?;

    println!("{}", format!("@{}", profile.username).bold().cyan());
    println!("  {} {}", "Name:     ".bold(), profile.name);
    println!("  {} {}", "Followers:".bold(), format_number(profile.followers_count));
    println!("  {} {}", "Media:    ".bold(), format_number(profile.media_count));
    if !profile.biography.is_empty() {
        println!("  {} {}", "Bio:      ".bold(), profile.biography);
    }
    Ok(())
}

pub fn run_channels_ig_media(api: &ApiClient) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;

    let envelope: Envelope<Vec<IgMedia>> = api.get_json(&format!(
        "/instagram/review/media?clientId={}",
        urlencode(id)
    ))?;
    let media = envelope.into_data()?;

    if media.is_empty() {
        println!("{}", "no media".yellow());
        return Ok(());
    }

    println!("{}", "Recent Media".bold().cyan());
    for item in &media {
        println!(
            "  {:<10} {}  {}",
            item.media_type,
            truncate(item.caption.as_deref().unwrap_or("-"), 40),
            item.permalink.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}

pub fn run_channels_ig_send_dm(
    api: &ApiClient,
    recipient: Option<String>,
    text: Option<String>,
    bot_type: &str,
) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;
    ensure_bot_ready(api, id, bot_type)?;

    let body = json!({
        "clientId": id,
        "recipientId": recipient,
        "text": text.unwrap_or_else(|| DEFAULT_TEST_TEXT.to_string()),
    });
    let envelope: Envelope<serde_json::Value> =
        api.post_json("/instagram/review/send-dm", &body)?;
    envelope.into_data()?;

    println!("{} Instagram DM sent", "✓".green().bold());
    Ok(())
}

/// Send the fixed Messenger review test message.
pub fn run_channels_send_review_test(
    api: &ApiClient,
    page_id: Option<String>,
    psid: &str,
    bot_type: &str,
) -> Result<()> {
    let me = session::require_role(api, Role::Client)?;
    let id = own_client_id(&me)?;
    ensure_bot_ready(api, id, bot_type)?;

    // Fall back to the page the client record is wired to.
    let page_id = match page_id {
        Some(p) => p,
        None => {
            let record: ClientRecord =
                api.get_json(&format!("/api/clients/{}", urlencode(id)))?;
            record
                .page_id
                .context("no --page-id given and the client has no connected page")?
        }
    };

    let body = json!({
        "pageId": page_id,
        "psid": psid,
        "text": REVIEW_TEST_TEXT,
    });
    let ack: Ack = api.post_json("/api/review/send-test", &body)?;
    if !ack.accepted() {
        bail!("send failed: {ack:?}");
    }
    println!("{} review test message sent", "✓".green().bold());
    Ok(())
}

/// Refuse channel connect/test actions while the knowledge base is not
/// built. Fails closed when the gate cannot be fetched.
fn ensure_bot_ready(api: &ApiClient, client_id: &str, bot_type: &str) -> Result<()> {
    let gate = knowledge::fetch_gate(api, client_id, bot_type);
    if !gate.ready {
        bail!(
            "connections are locked until the bot is built (knowledge status: {}). \
             Run `botdesk knowledge build` first.",
            gate.status
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective botdesk Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let exists = config::config_file().map(|p| p.exists()).unwrap_or(false);
    if !exists {
        println!(
            "{}",
            "No config file found. Run `botdesk config init` to create one.".dimmed()
        );
    }
    Ok(())
}

pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} wrote {}", "✓".green().bold(), path.display());
    Ok(())
}

pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} {key} = {value}", "✓".green().bold());
    Ok(())
}

pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!("{} reset {}", "✓".green().bold(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// botdesk doctor
// ---------------------------------------------------------------------------

/// Check the local environment: config file, session cache, API
/// reachability, request log.
pub fn run_doctor(api: &ApiClient) -> Result<()> {
    println!("{}", "botdesk Doctor".bold().cyan());
    println!("{}", "=".repeat(40));

    let config_exists = config::config_file().map(|p| p.exists()).unwrap_or(false);
    print_health_item(
        "Config file",
        config_exists,
        if config_exists {
            "~/.botdesk/config.toml found"
        } else {
            "not found (run `botdesk config init` to create)"
        },
    );

    let cache = SessionCache::load();
    let session_ok = cache.cookie.is_some();
    let session_detail = match (&cache.role, &cache.email) {
        (Some(role), Some(email)) => format!("{email} ({role})"),
        _ => "not logged in".to_string(),
    };
    print_health_item("Session", session_ok, &session_detail);

    match api.probe("/api/me") {
        Ok(status) => {
            let logged_in = (200..300).contains(&status);
            print_health_item(
                "API",
                true,
                &if logged_in {
                    format!("reachable at {} (session valid)", api.base_url())
                } else {
                    format!("reachable at {} (HTTP {status}, session invalid)", api.base_url())
                },
            );
        }
        Err(err) => print_health_item("API", false, &format!("unreachable: {err}")),
    }

    let entries = reqlog::read_all_entries();
    let log_exists = reqlog::request_log_path().map(|p| p.exists()).unwrap_or(false);
    print_health_item(
        "Request log",
        log_exists,
        &if log_exists {
            format!("{} entries", entries.len())
        } else {
            "no log file yet".to_string()
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn own_client_id(me: &Me) -> Result<&str> {
    me.client_id
        .as_deref()
        .context("the server returned no clientId for this account")
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Matches a phone number: optional leading `+`, 8 to 15 digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{8,15}$").expect("phone regex must compile"));

fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

/// Format a number with comma separators for readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
