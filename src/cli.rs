use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::client::HttpClient;
use crate::config::AppConfig;
use crate::error::Result;
use crate::notify::{show_foreground, NotificationPayload};
use crate::platform::{detect_platform, UnsupportedMessaging};
use crate::prefs::{NotificationPrefs, PrefsService};
use crate::push::PushManager;
use crate::store::TokenStore;
use crate::ui::UI;

#[derive(Parser)]
#[command(
    name = "storelink",
    about = "Franchise ERP companion client",
    long_about = "StoreLink - Franchise ERP companion client

OVERVIEW:
  Sign in to the ERP backend, keep the session alive across token rotation,
  and manage push registration and notification preferences for a store.

QUICK START:
  storelink login <EMAIL>               # Sign in and register for push
  storelink status                      # Show session and push state
  storelink prefs show                  # Show notification preferences
  storelink prefs set --threshold-days 5 --apply
  storelink logout                      # Revoke push and end the session",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use an alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),

    /// Revoke push registration and end the session
    Logout,

    /// Show session and push registration status
    #[command(aliases = &["st"])]
    Status,

    /// Manage notification preferences
    Prefs(PrefsArgs),

    /// Manage push registration
    Push(PushArgs),

    /// Render a notification payload the way the app would (debugging aid)
    Notify(NotifyArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    pub email: String,

    /// Skip push registration after signing in
    #[arg(long)]
    pub no_push: bool,
}

#[derive(Args)]
pub struct PrefsArgs {
    #[command(subcommand)]
    pub command: PrefsCommand,
}

#[derive(Subcommand)]
pub enum PrefsCommand {
    Show,
    Set(PrefsSetArgs),
}

#[derive(Args)]
pub struct PrefsSetArgs {
    #[arg(long)]
    pub notice: Option<bool>,

    #[arg(long)]
    pub stock_low: Option<bool>,

    #[arg(long)]
    pub expire_soon: Option<bool>,

    /// Expiry warning window in days (1 to 30)
    #[arg(long)]
    pub threshold_days: Option<i64>,

    /// Re-align topic subscriptions after saving
    #[arg(long)]
    pub apply: bool,
}

#[derive(Args)]
pub struct PushArgs {
    #[command(subcommand)]
    pub command: PushCommand,
}

#[derive(Subcommand)]
pub enum PushCommand {
    /// Acquire a token and register it with the server
    Register,
    /// Revoke the registered token
    Revoke,
}

#[derive(Args)]
pub struct NotifyArgs {
    /// Raw payload JSON as delivered by the push service
    pub payload: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetVerbose { enabled: String },
    Reset,
}

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    async fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load(self.config_path.as_deref()).await
    }

    /// Build the client stack shared by every authenticated command
    async fn build_client(&self, config: &AppConfig) -> Result<(HttpClient, Arc<TokenStore>)> {
        let client_config = config.to_client_config();
        let store = Arc::new(TokenStore::new(client_config.token_storage.clone().into())?);
        let client = HttpClient::new(client_config, store.clone())?;
        Ok((client, store))
    }

    fn push_manager(&self, config: &AppConfig, store: Arc<TokenStore>) -> PushManager {
        let client_config = config.to_client_config();
        let platform = detect_platform(&client_config, None, Arc::new(UnsupportedMessaging));
        PushManager::new(platform, store)
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::Prefs(args) => self.handle_prefs(args).await,
            Commands::Push(args) => self.handle_push(args).await,
            Commands::Notify(args) => self.handle_notify(args).await,
            Commands::Config(args) => self.handle_config(args).await,
        }
    }

    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let config = self.load_config().await?;
        let (client, store) = self.build_client(&config).await?;

        let password = Password::new().with_prompt("Password").interact()?;

        // A 401 during login is a bad credential, not an expired session
        client.view().set_login_view(true);
        let auth = AuthService::new(store.clone());
        let session = auth.login(&client, &args.email, &password).await?;
        client.view().set_login_view(false);

        self.ui.success(&format!(
            "Signed in to store {} as {}",
            session.store_id, args.email
        ));

        if !args.no_push {
            let mut push = self.push_manager(&config, store);
            if let Some(token) = push.initialize().await? {
                push.register_with_server(&client, &token, session.store_id)
                    .await?;
                self.ui.info("Push notifications registered.");
            }
        }
        Ok(())
    }

    async fn handle_logout(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        let (client, store) = self.build_client(&config).await?;

        if !store.has_session() {
            self.ui.warning("Not signed in.");
            return Ok(());
        }

        let mut push = self.push_manager(&config, store.clone());
        let auth = AuthService::new(store);
        auth.logout(&client, &mut push).await?;
        self.ui.success("Signed out.");
        Ok(())
    }

    async fn handle_status(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        let (client, store) = self.build_client(&config).await?;

        let signed_in = store.has_session();
        let mut rows = vec![
            ("Endpoint", config.endpoint.clone()),
            ("Session", self.ui.format_session_status(signed_in)),
        ];

        if signed_in {
            let auth = AuthService::new(store.clone());
            match auth.me(&client).await {
                Ok(me) => {
                    rows.push(("Store", me.store_id.to_string()));
                    rows.push(("Name", self.ui.format_field(me.store_name)));
                    rows.push(("Email", self.ui.format_field(me.email)));
                }
                Err(e) => rows.push(("Profile", format!("unavailable ({})", e.code()))),
            }
        }

        rows.push((
            "Push token",
            self.ui.format_field(store.push_token().map(redact_token)),
        ));

        self.ui.card("StoreLink Status", rows);
        Ok(())
    }

    async fn handle_prefs(&mut self, args: PrefsArgs) -> Result<()> {
        let config = self.load_config().await?;
        let (client, store) = self.build_client(&config).await?;
        let prefs_service = PrefsService::new();

        match args.command {
            PrefsCommand::Show => {
                let prefs = prefs_service.load(&client).await;
                self.ui.card(
                    "Notification Preferences",
                    vec![
                        ("Notices", on_off(prefs.notice_enabled())),
                        ("Low stock", on_off(prefs.stock_low_enabled())),
                        ("Expiring soon", on_off(prefs.expire_soon_enabled())),
                        ("Threshold days", prefs.threshold().to_string()),
                    ],
                );
            }
            PrefsCommand::Set(set) => {
                let current = prefs_service.load(&client).await;
                let updated = NotificationPrefs {
                    cat_notice: Some(set.notice.unwrap_or_else(|| current.notice_enabled())),
                    cat_stock_low: Some(
                        set.stock_low.unwrap_or_else(|| current.stock_low_enabled()),
                    ),
                    cat_expire_soon: Some(
                        set.expire_soon.unwrap_or_else(|| current.expire_soon_enabled()),
                    ),
                    threshold_days: Some(
                        set.threshold_days.unwrap_or_else(|| current.threshold()),
                    ),
                    store_id: current.store_id,
                };
                prefs_service.save(&client, &updated, set.apply).await?;
                self.ui.success("Preferences saved.");

                if set.apply {
                    if let Some(token) = store.push_token() {
                        let auth = AuthService::new(store.clone());
                        let store_id = auth.me(&client).await?.store_id;
                        let push = self.push_manager(&config, store);
                        push.register_with_server(&client, &token, store_id).await?;
                        self.ui.info("Topic subscriptions re-aligned.");
                    } else {
                        self.ui.warning("No push token registered; nothing to apply.");
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_push(&mut self, args: PushArgs) -> Result<()> {
        let config = self.load_config().await?;
        let (client, store) = self.build_client(&config).await?;
        let mut push = self.push_manager(&config, store.clone());

        match args.command {
            PushCommand::Register => {
                let auth = AuthService::new(store);
                let store_id = auth.me(&client).await?.store_id;
                match push.initialize().await? {
                    Some(token) => {
                        push.register_with_server(&client, &token, store_id).await?;
                        self.ui.success("Push registration complete.");
                    }
                    None => self.ui.error("Push registration unavailable."),
                }
            }
            PushCommand::Revoke => {
                push.cleanup(&client).await?;
                self.ui.success("Push registration revoked.");
            }
        }
        Ok(())
    }

    async fn handle_notify(&mut self, args: NotifyArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client_config = config.to_client_config();

        let payload: NotificationPayload = serde_json::from_str(&args.payload)?;
        show_foreground(
            &self.ui,
            &payload,
            &client_config.origin(),
            &client_config.link_base_path,
        );
        Ok(())
    }

    async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        let mut config = self.load_config().await?;

        match args.command {
            ConfigCommand::Show => {
                self.ui.card(
                    "Configuration",
                    vec![
                        ("Endpoint", config.endpoint.clone()),
                        ("Timeout", format!("{}s", config.timeout)),
                        ("Verbose", config.verbose.to_string()),
                        (
                            "Platform",
                            config.platform.clone().unwrap_or_else(|| "web".to_string()),
                        ),
                    ],
                );
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => {
                config.endpoint = url;
            }
            ConfigCommand::SetTimeout { seconds } => {
                config.timeout = seconds;
            }
            ConfigCommand::SetVerbose { enabled } => {
                config.verbose = matches!(enabled.as_str(), "true" | "on" | "1");
            }
            ConfigCommand::Reset => {
                config = AppConfig::default();
            }
        }

        config.to_client_config().validate()?;
        self.save_config(&config).await?;
        self.ui.success("Configuration updated.");
        Ok(())
    }

    async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(crate::config::default_config_path);
        config.save(&path).await
    }
}

fn on_off(enabled: bool) -> String {
    if enabled { "on" } else { "off" }.to_string()
}

/// Keep enough of the token to recognize it in logs, nothing more
fn redact_token(token: String) -> String {
    if token.chars().count() > 12 {
        let head: String = token.chars().take(12).collect();
        format!("{}...", head)
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_token_truncates_long_tokens() {
        let redacted = redact_token("abcdefghijklmnopqrstuvwxyz".to_string());
        assert_eq!(redacted, "abcdefghijkl...");
    }

    #[test]
    fn test_redact_token_keeps_short_tokens() {
        assert_eq!(redact_token("short".to_string()), "short");
    }

    #[test]
    fn test_cli_parses_prefs_set() {
        let cli = Cli::parse_from([
            "storelink",
            "prefs",
            "set",
            "--stock-low",
            "false",
            "--threshold-days",
            "5",
            "--apply",
        ]);
        match cli.command {
            Commands::Prefs(PrefsArgs {
                command: PrefsCommand::Set(args),
            }) => {
                assert_eq!(args.stock_low, Some(false));
                assert_eq!(args.threshold_days, Some(5));
                assert!(args.apply);
            }
            _ => panic!("expected prefs set"),
        }
    }

    #[test]
    fn test_cli_parses_notify_payload() {
        let cli = Cli::parse_from(["storelink", "notify", r#"{"data":{"link":"notices/3"}}"#]);
        match cli.command {
            Commands::Notify(args) => {
                assert!(args.payload.contains("notices/3"));
            }
            _ => panic!("expected notify"),
        }
    }

    #[test]
    fn test_cli_parses_login() {
        let cli = Cli::parse_from(["storelink", "login", "owner@store.example", "--no-push"]);
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.email, "owner@store.example");
                assert!(args.no_push);
            }
            _ => panic!("expected login"),
        }
    }
}
