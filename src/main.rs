use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use botdesk::api::ApiClient;
use botdesk::chart::TimeframeMode;
use botdesk::cli::{self, BuildFormArgs, ClientFieldArgs, OutputFormat};
use botdesk::config;
use botdesk::export::ExportFormat;
use botdesk::session::SessionCache;

#[derive(Debug, Parser)]
#[command(name = "botdesk")]
#[command(about = "Terminal dashboard and admin client for the chatbot platform")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in and cache the session
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for if omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Register a new account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Prompted for if omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Log out and clear the cached session
    Logout,
    /// Show the current session identity
    Whoami,
    /// Usage snapshot and conversation aggregates
    Overview {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Activity chart rows
    Chart {
        /// Timeframe: daily, weekly, monthly
        #[arg(long, value_enum, default_value = "weekly")]
        mode: TimeframeMode,
        /// Chart a specific client (admin)
        #[arg(long)]
        client: Option<String>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Conversation list with optional file export
    Convos {
        /// List a specific client's conversations (admin)
        #[arg(long)]
        client: Option<String>,
        /// Filter by source: web, messenger, instagram, whatsapp
        #[arg(long)]
        source: Option<String>,
        /// Export to a file instead of printing
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
        /// Export file path (defaults to conversations.json/.csv)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Tenant administration (admin role)
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// Knowledge-base status and builds (client role)
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommands,
    },
    /// Webhook subscription status (client role)
    Webhooks {
        #[command(subcommand)]
        command: WebhooksCommands,
    },
    /// Channel connection status and test sends (client role)
    Channels {
        #[command(subcommand)]
        command: ChannelsCommands,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Check the local environment: config, session, API, request log
    Doctor,
}

#[derive(Debug, Subcommand)]
enum ClientsCommands {
    /// List all tenants
    List {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show one tenant record
    Show {
        id: String,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Create a tenant (requires --name and --email)
    Add {
        #[command(flatten)]
        fields: ClientFieldArgs,
    },
    /// Update tenant fields
    Update {
        id: String,
        #[command(flatten)]
        fields: ClientFieldArgs,
    },
    /// Delete a tenant
    Delete { id: String },
    /// Mark a tenant active
    Activate { id: String },
    /// Mark a tenant inactive
    Deactivate { id: String },
    /// Renew one tenant's quota
    Renew { id: String },
    /// Renew every tenant's quota
    RenewAll,
    /// Upload knowledge files to a tenant
    Upload {
        id: String,
        #[arg(long = "file", value_name = "PATH", required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete an attached file
    DeleteFile { id: String, file_id: String },
    /// Show a tenant's health report
    Health { id: String },
}

#[derive(Debug, Subcommand)]
enum KnowledgeCommands {
    /// Show the knowledge-base gate
    Status {
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Build from structured form fields (at least one required)
    Build {
        #[command(flatten)]
        form: BuildFormArgs,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Build from pasted text
    Paste {
        #[arg(long)]
        text: String,
        /// Section: faqs, listings, offers, hours, policies, paymentPlans, mixed
        #[arg(long, default_value = "mixed")]
        section: String,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Build from a .txt file
    Upload {
        file: PathBuf,
        /// Section: faqs, listings, offers, hours, policies, paymentPlans, mixed
        #[arg(long, default_value = "mixed")]
        section: String,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
}

#[derive(Debug, Subcommand)]
enum WebhooksCommands {
    /// Show subscription status and last event info
    Status {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Subscribe the connected page to webhook events
    Subscribe,
    /// Show the last received webhook payload
    Last {
        /// Show only the messages extracted from the payload
        #[arg(long)]
        messages_only: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ChannelsCommands {
    /// Print the Facebook page connect URL
    Facebook {
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Show WhatsApp connection status
    WhatsappStatus {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Print the WhatsApp connect URL
    WhatsappConnect {
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Send a WhatsApp test message
    WhatsappSendTest {
        #[arg(long)]
        to: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Show the connected Instagram profile
    IgProfile,
    /// List recent Instagram media
    IgMedia,
    /// Send an Instagram test DM
    IgSendDm {
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
    /// Send the fixed Messenger review test message
    SendReviewTest {
        #[arg(long)]
        page_id: Option<String>,
        #[arg(long)]
        psid: String,
        #[arg(long, default_value = "default")]
        bot_type: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Show the effective (merged) configuration
    Show,
    /// Write the default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Set a config value (dotted key, e.g. api.retries)
    Set { key: String, value: String },
    /// Reset the config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let cfg = config::load();
    if !cfg.output.color {
        colored::control::set_override(false);
    }

    let cache = SessionCache::load();
    let mut api = ApiClient::from_config(&cfg, cache.cookie);

    match app.command {
        Commands::Login { email, password } => cli::run_login(&mut api, &email, password),
        Commands::Register {
            name,
            email,
            password,
        } => cli::run_register(&mut api, &name, &email, password),
        Commands::Logout => cli::run_logout(&api),
        Commands::Whoami => cli::run_whoami(&api),
        Commands::Overview { format } => {
            cli::run_overview(&api, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Chart {
            mode,
            client,
            format,
        } => cli::run_chart(&api, mode, client, OutputFormat::from_str_opt(Some(&format))),
        Commands::Convos {
            client,
            source,
            export,
            out,
            format,
        } => cli::run_convos(
            &api,
            client,
            source,
            export,
            out,
            OutputFormat::from_str_opt(Some(&format)),
        ),
        Commands::Clients { command } => match command {
            ClientsCommands::List { format } => {
                cli::run_clients_list(&api, OutputFormat::from_str_opt(Some(&format)))
            }
            ClientsCommands::Show { id, format } => {
                cli::run_clients_show(&api, &id, OutputFormat::from_str_opt(Some(&format)))
            }
            ClientsCommands::Add { fields } => cli::run_clients_add(&api, fields),
            ClientsCommands::Update { id, fields } => cli::run_clients_update(&api, &id, fields),
            ClientsCommands::Delete { id } => cli::run_clients_delete(&api, &id),
            ClientsCommands::Activate { id } => cli::run_clients_set_active(&api, &id, true),
            ClientsCommands::Deactivate { id } => cli::run_clients_set_active(&api, &id, false),
            ClientsCommands::Renew { id } => cli::run_clients_renew(&api, &id),
            ClientsCommands::RenewAll => cli::run_clients_renew_all(&api),
            ClientsCommands::Upload { id, files } => cli::run_clients_upload(&api, &id, files),
            ClientsCommands::DeleteFile { id, file_id } => {
                cli::run_clients_delete_file(&api, &id, &file_id)
            }
            ClientsCommands::Health { id } => cli::run_clients_health(&api, &id),
        },
        Commands::Knowledge { command } => match command {
            KnowledgeCommands::Status { bot_type } => cli::run_knowledge_status(&api, &bot_type),
            KnowledgeCommands::Build { form, bot_type } => {
                cli::run_knowledge_build(&api, form, &bot_type)
            }
            KnowledgeCommands::Paste {
                text,
                section,
                bot_type,
            } => cli::run_knowledge_paste(&api, &section, &text, &bot_type),
            KnowledgeCommands::Upload {
                file,
                section,
                bot_type,
            } => cli::run_knowledge_upload(&api, &section, file, &bot_type),
        },
        Commands::Webhooks { command } => match command {
            WebhooksCommands::Status { format } => {
                cli::run_webhooks_status(&api, OutputFormat::from_str_opt(Some(&format)))
            }
            WebhooksCommands::Subscribe => cli::run_webhooks_subscribe(&api),
            WebhooksCommands::Last { messages_only } => {
                cli::run_webhooks_last(&api, messages_only)
            }
        },
        Commands::Channels { command } => match command {
            ChannelsCommands::Facebook { bot_type } => cli::run_channels_facebook(&api, &bot_type),
            ChannelsCommands::WhatsappStatus { format } => {
                cli::run_channels_whatsapp_status(&api, OutputFormat::from_str_opt(Some(&format)))
            }
            ChannelsCommands::WhatsappConnect { bot_type } => {
                cli::run_channels_whatsapp_connect(&api, &bot_type)
            }
            ChannelsCommands::WhatsappSendTest { to, text, bot_type } => {
                cli::run_channels_whatsapp_send_test(&api, &to, text, &bot_type)
            }
            ChannelsCommands::IgProfile => cli::run_channels_ig_profile(&api),
            ChannelsCommands::IgMedia => cli::run_channels_ig_media(&api),
            ChannelsCommands::IgSendDm {
                recipient,
                text,
                bot_type,
            } => cli::run_channels_ig_send_dm(&api, recipient, text, &bot_type),
            ChannelsCommands::SendReviewTest {
                page_id,
                psid,
                bot_type,
            } => cli::run_channels_send_review_test(&api, page_id, &psid, &bot_type),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::run_config_show(),
            ConfigCommands::Init { force } => cli::run_config_init(force),
            ConfigCommands::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigCommands::Reset => cli::run_config_reset(),
        },
        Commands::Doctor => cli::run_doctor(&api),
    }
}
