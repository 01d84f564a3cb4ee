use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use pyroprompts::events::LogSink;
use pyroprompts::runtime::RealRuntime;
use pyroprompts::{ClientConfig, PyroPromptsClient};
use serde_json::Value;

/// pyroprompts - PyroPrompts API client
///
/// Credentials and host are read from PYROPROMPTS_CLIENT_ID,
/// PYROPROMPTS_CLIENT_SECRET, PYROPROMPTS_HOST and PYROPROMPTS_HTTPS unless
/// given as flags.
///
/// Examples:
///   pyroprompts trigger '{"workflow_id": 1}'
///   pyroprompts executions -f workflow=1
#[derive(Parser, Debug)]
#[command(author, version = env!("PYROPROMPTS_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API host, with optional port
    #[arg(long, env = "PYROPROMPTS_HOST", value_name = "HOST", global = true)]
    host: Option<String>,

    /// Use plain http instead of https
    #[arg(long, global = true)]
    insecure: bool,

    /// OAuth2 client id
    #[arg(long, env = "PYROPROMPTS_CLIENT_ID", value_name = "ID", global = true)]
    client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(
        long,
        env = "PYROPROMPTS_CLIENT_SECRET",
        hide_env_values = true,
        value_name = "SECRET",
        global = true
    )]
    client_secret: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Maximum attempts per request when connecting times out
    #[arg(long, value_name = "N", global = true)]
    max_attempts: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Trigger a workflow with an inline JSON body
    Trigger(TriggerArgs),

    /// List workflow executions
    Executions(FilterArgs),

    /// List store items
    StoreItems(FilterArgs),

    /// List project snippets
    Snippets(FilterArgs),
}

#[derive(clap::Args, Debug)]
struct TriggerArgs {
    /// Trigger payload as JSON
    #[arg(value_name = "JSON")]
    body: String,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Filter as key=value (repeatable)
    #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,
}

fn parse_filter(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(anyhow!("filter key must not be empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env(&RealRuntime);

        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if self.insecure {
            config = config.with_https(false);
        }
        if let Some(id) = &self.client_id {
            config.client_id = Some(id.clone());
        }
        if let Some(secret) = &self.client_secret {
            config.client_secret = Some(secret.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.max_attempts {
            config = config.with_request_max_attempts(attempts);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    // stdout carries the response; events go through the log facade.
    let client = PyroPromptsClient::new(cli.config())?.with_event_sink(Arc::new(LogSink));

    let result = match &cli.command {
        Commands::Trigger(args) => {
            let body: Value =
                serde_json::from_str(&args.body).context("Trigger body is not valid JSON")?;
            client.workflow_trigger(&body).await?
        }
        Commands::Executions(args) => client.get_workflow_executions(&args.pairs()).await?,
        Commands::StoreItems(args) => client.get_store_items(&args.pairs()).await?,
        Commands::Snippets(args) => client.get_project_snippets(&args.pairs()).await?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

impl FilterArgs {
    fn pairs(&self) -> Vec<(&str, &str)> {
        self.filters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_trigger_parsing() {
        let cli = Cli::try_parse_from(["pyroprompts", "trigger", r#"{"a": 1}"#]).unwrap();
        match cli.command {
            Commands::Trigger(args) => assert_eq!(args.body, r#"{"a": 1}"#),
            _ => panic!("Expected Trigger command"),
        }
    }

    #[test]
    fn test_cli_filters_parsing() {
        let cli = Cli::try_parse_from([
            "pyroprompts",
            "executions",
            "-f",
            "workflow=1",
            "--filter",
            "status=a=b",
        ])
        .unwrap();
        match cli.command {
            Commands::Executions(args) => {
                assert_eq!(
                    args.pairs(),
                    vec![("workflow", "1"), ("status", "a=b")]
                );
            }
            _ => panic!("Expected Executions command"),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_filter() {
        assert!(Cli::try_parse_from(["pyroprompts", "snippets", "-f", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["pyroprompts", "snippets", "-f", "=x"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "pyroprompts",
            "store-items",
            "--host",
            "localhost:9000",
            "--insecure",
            "--client-id",
            "cid",
            "--client-secret",
            "csecret",
            "--timeout",
            "3",
            "--max-attempts",
            "5",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.host, "localhost:9000");
        assert!(!config.https);
        assert_eq!(config.client_id.as_deref(), Some("cid"));
        assert_eq!(config.client_secret.as_deref(), Some("csecret"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.request_max_attempts, 5);
    }

    #[test]
    fn test_cli_connection_flags_fall_back_to_env() {
        use clap::CommandFactory;
        use std::ffi::OsStr;

        let command = Cli::command();
        let arg = |id: &str| {
            command
                .get_arguments()
                .find(|a| a.get_id() == id)
                .unwrap()
                .clone()
        };

        assert_eq!(arg("host").get_env(), Some(OsStr::new("PYROPROMPTS_HOST")));
        assert_eq!(
            arg("client_id").get_env(),
            Some(OsStr::new("PYROPROMPTS_CLIENT_ID"))
        );

        let secret = arg("client_secret");
        assert_eq!(secret.get_env(), Some(OsStr::new("PYROPROMPTS_CLIENT_SECRET")));
        assert!(secret.is_hide_env_values_set());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["pyroprompts"]).is_err());
    }
}
