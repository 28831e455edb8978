//!
//! picnic server configuration
//! ---------------------------
//! Resolved once at startup: built-in defaults, then `PICNIC_*` environment
//! variables, then command line flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::identity::{DEFAULT_IDENTITY_URL, DEFAULT_SESSION_TTL};

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_SITE_URL: &str = "https://piknikai.lt";

pub const HELP: &str = "picnic server\n\nUSAGE:\n  picnic_server [--http-port N] [--data-dir PATH] [--store memory|file|none] [--identity local|rest] [--insecure-cookies]\n\nOPTIONS:\n  --http-port N        HTTP port (env: PICNIC_HTTP_PORT, default 7878)\n  --data-dir PATH      Data folder for the file store (env: PICNIC_DATA_DIR, default data)\n  --store MODE         Document store backend (env: PICNIC_STORE, default memory)\n  --identity MODE      Identity backend (env: PICNIC_IDENTITY, default local)\n  --insecure-cookies   Send the session cookie without Secure (env: PICNIC_SECURE_COOKIES=false)\n\nOther environment: PICNIC_IDENTITY_URL, PICNIC_API_KEY, PICNIC_IDENTITY_ADMIN_TOKEN,\n  PICNIC_SESSION_TTL_SECS, PICNIC_SITE_URL, PICNIC_ENFORCE_PRICE_TOTAL,\n  PICNIC_ADMIN_EMAIL, PICNIC_ADMIN_PASSWORD, PICNIC_HTTP_TIMEOUT_SECS\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode { Memory, File, None }

impl StoreMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(StoreMode::Memory),
            "file" | "json" => Some(StoreMode::File),
            "none" | "off" => Some(StoreMode::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode { Local, Rest }

impl IdentityMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Some(IdentityMode::Local),
            "rest" | "identitytoolkit" => Some(IdentityMode::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub store: StoreMode,
    pub identity: IdentityMode,
    pub identity_url: String,
    pub api_key: Option<String>,
    pub identity_admin_token: Option<String>,
    pub secure_cookies: bool,
    pub session_ttl: Duration,
    pub site_url: String,
    pub enforce_price_total: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub http_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            data_dir: PathBuf::from("data"),
            store: StoreMode::Memory,
            identity: IdentityMode::Local,
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            api_key: None,
            identity_admin_token: None,
            secure_cookies: true,
            session_ttl: DEFAULT_SESSION_TTL,
            site_url: DEFAULT_SITE_URL.to_string(),
            enforce_price_total: false,
            admin_email: None,
            admin_password: None,
            http_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub fn wants_help(args: &[String]) -> bool {
    has_flag(args, "--help") || has_flag(args, "-h")
}

impl ServerConfig {
    /// Resolve from the process environment and `std::env::args()`.
    pub fn load() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::resolve(|name| std::env::var(name).ok(), &args)
    }

    /// Resolve against an arbitrary environment lookup. Unparseable values are
    /// startup errors rather than silent defaults.
    pub fn resolve(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Result<Self> {
        let mut cfg = ServerConfig::default();
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = env("PICNIC_HTTP_PORT") { cfg.http_port = parse_port(&v, "PICNIC_HTTP_PORT")?; }
        if let Some(v) = env("PICNIC_DATA_DIR") { cfg.data_dir = PathBuf::from(v); }
        if let Some(v) = env("PICNIC_STORE") { cfg.store = parse_store(&v)?; }
        if let Some(v) = env("PICNIC_IDENTITY") { cfg.identity = parse_identity(&v)?; }
        if let Some(v) = env("PICNIC_IDENTITY_URL") { cfg.identity_url = v; }
        cfg.api_key = env("PICNIC_API_KEY");
        cfg.identity_admin_token = env("PICNIC_IDENTITY_ADMIN_TOKEN");
        if let Some(v) = env("PICNIC_SECURE_COOKIES") { cfg.secure_cookies = parse_flag(&v, "PICNIC_SECURE_COOKIES")?; }
        if let Some(v) = env("PICNIC_SESSION_TTL_SECS") { cfg.session_ttl = Duration::from_secs(parse_secs(&v, "PICNIC_SESSION_TTL_SECS")?); }
        if let Some(v) = env("PICNIC_SITE_URL") { cfg.site_url = v; }
        if let Some(v) = env("PICNIC_ENFORCE_PRICE_TOTAL") { cfg.enforce_price_total = parse_flag(&v, "PICNIC_ENFORCE_PRICE_TOTAL")?; }
        cfg.admin_email = env("PICNIC_ADMIN_EMAIL");
        cfg.admin_password = env("PICNIC_ADMIN_PASSWORD");
        if let Some(v) = env("PICNIC_HTTP_TIMEOUT_SECS") { cfg.http_timeout = Duration::from_secs(parse_secs(&v, "PICNIC_HTTP_TIMEOUT_SECS")?); }

        // command line overrides environment
        if let Some(v) = arg_value(args, "--http-port") { cfg.http_port = parse_port(v, "--http-port")?; }
        if let Some(v) = arg_value(args, "--data-dir") { cfg.data_dir = PathBuf::from(v); }
        if let Some(v) = arg_value(args, "--store") { cfg.store = parse_store(v)?; }
        if let Some(v) = arg_value(args, "--identity") { cfg.identity = parse_identity(v)?; }
        if has_flag(args, "--insecure-cookies") { cfg.secure_cookies = false; }

        if cfg.identity == IdentityMode::Rest && cfg.api_key.is_none() {
            bail!("identity mode 'rest' requires PICNIC_API_KEY");
        }
        Ok(cfg)
    }
}

fn parse_port(v: &str, source: &str) -> Result<u16> {
    v.trim().parse::<u16>().map_err(|_| anyhow::anyhow!("{}: invalid port '{}'", source, v))
}

fn parse_secs(v: &str, source: &str) -> Result<u64> {
    match v.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => bail!("{}: expected a positive number of seconds, got '{}'", source, v),
    }
}

fn parse_flag(v: &str, source: &str) -> Result<bool> {
    parse_bool(v).ok_or_else(|| anyhow::anyhow!("{}: expected true/false, got '{}'", source, v))
}

fn parse_store(v: &str) -> Result<StoreMode> {
    StoreMode::parse(v).ok_or_else(|| anyhow::anyhow!("unknown store mode '{}' (memory|file|none)", v))
}

fn parse_identity(v: &str) -> Result<IdentityMode> {
    IdentityMode::parse(v).ok_or_else(|| anyhow::anyhow!("unknown identity mode '{}' (local|rest)", v))
}
