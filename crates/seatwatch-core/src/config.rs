use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use chrono::NaiveTime;

use crate::{
    domain::ChatId,
    errors::Error,
    notify::Window,
    registration::RegistrationSettings,
    scan::{NotifyMode, ScanSettings},
    Result,
};

/// Run one scan and exit, or keep running on a schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Once,
    Schedule,
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "once" => Ok(RunMode::Once),
            "schedule" => Ok(RunMode::Schedule),
            other => Err(Error::Config(format!(
                "RUN_MODE must be once or schedule, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Once => "once",
            RunMode::Schedule => "schedule",
        })
    }
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Inventory
    pub snipeit_base_url: String,
    pub snipeit_api_token: String,
    pub page_size: usize,
    pub request_timeout: Duration,

    // Chat
    pub telegram_bot_token: String,
    pub dry_run: bool,

    // Files
    pub user_map_path: PathBuf,
    pub state_path: PathBuf,

    // Notification policy
    pub notify_days: i64,
    pub notify_only_on_day: Option<i64>,
    pub include_expired: bool,
    pub notify_mode: NotifyMode,
    pub fallback_chat_id: Option<ChatId>,

    // Scheduling
    pub run_mode: RunMode,
    pub schedule_time: NaiveTime,

    // Registration
    pub enable_registration: bool,
    pub admin_chat_ids: Vec<ChatId>,
    pub poll_interval: Duration,
}

impl Config {
    /// Load from the process environment. Call [`load_dotenv`] first to
    /// pick up a `.env` file.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, then normalize and validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let text = |key: &str| get(key).filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            text(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };
        let snipeit_base_url = normalize_base_url(&required("SNIPEIT_BASE_URL"));
        let snipeit_api_token = required("SNIPEIT_API_TOKEN");
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN");
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required env vars: {}",
                missing.join(", ")
            )));
        }

        let notify_only_on_day = match text("NOTIFY_ONLY_ON_DAY") {
            Some(v) => Some(v.parse::<i64>().map_err(|_| {
                Error::Config("NOTIFY_ONLY_ON_DAY must be integer".to_string())
            })?),
            None => None,
        };

        let schedule_time = text("SCHEDULE_TIME").unwrap_or_else(|| "12:00".to_string());
        let schedule_time = NaiveTime::parse_from_str(&schedule_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&schedule_time, "%H:%M:%S"))
            .map_err(|_| {
                Error::Config(format!("SCHEDULE_TIME must be HH:MM, got {schedule_time:?}"))
            })?;

        let page_size = parse_num::<usize>(text("PAGE_SIZE"), "PAGE_SIZE", 100)?;
        if page_size == 0 {
            return Err(Error::Config("PAGE_SIZE must be positive".to_string()));
        }

        let cfg = Self {
            snipeit_base_url,
            snipeit_api_token,
            page_size,
            request_timeout: Duration::from_secs(parse_num(
                text("REQUEST_TIMEOUT"),
                "REQUEST_TIMEOUT",
                30,
            )?),
            telegram_bot_token,
            dry_run: parse_bool(get("DRY_RUN")),
            user_map_path: PathBuf::from(
                text("USER_CHAT_MAP_PATH").unwrap_or_else(|| "user_map.json".to_string()),
            ),
            state_path: PathBuf::from(text("STATE_PATH").unwrap_or_else(|| "state.json".to_string())),
            notify_days: parse_num(text("NOTIFY_DAYS"), "NOTIFY_DAYS", 14)?,
            notify_only_on_day,
            include_expired: parse_bool(get("INCLUDE_EXPIRED")),
            notify_mode: text("NOTIFY_MODE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            fallback_chat_id: text("FALLBACK_CHAT_ID").map(ChatId::from),
            run_mode: text("RUN_MODE").map(|v| v.parse()).transpose()?.unwrap_or_default(),
            schedule_time,
            enable_registration: parse_bool(get("ENABLE_REGISTRATION")),
            admin_chat_ids: parse_csv(get("ADMIN_CHAT_IDS")),
            poll_interval: Duration::from_secs(parse_num(text("POLL_SECONDS"), "POLL_SECONDS", 30)?),
        };

        if cfg.enable_registration && cfg.admin_chat_ids.is_empty() {
            return Err(Error::Config(
                "ENABLE_REGISTRATION requires ADMIN_CHAT_IDS".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn window(&self) -> Window {
        Window {
            days: self.notify_days,
            include_expired: self.include_expired,
            only_on_day: self.notify_only_on_day,
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            window: self.window(),
            mode: self.notify_mode,
            page_size: self.page_size,
            admins: self.admin_chat_ids.clone(),
            fallback_chat_id: self.fallback_chat_id.clone(),
        }
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            admins: self.admin_chat_ids.clone(),
            long_poll_seconds: u32::try_from(self.poll_interval.as_secs()).unwrap_or(u32::MAX),
        }
    }
}

/// Merge `.env` from the working directory into the environment. Variables
/// already set win; a missing file is fine.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// `https://host` and `https://host/api` both become `https://host/api/v1`.
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() || url.ends_with("/api/v1") {
        url.to_string()
    } else if url.ends_with("/api") {
        format!("{url}/v1")
    } else {
        format!("{url}/api/v1")
    }
}

fn parse_bool(v: Option<String>) -> bool {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        )
    })
    .unwrap_or(false)
}

fn parse_num<T: FromStr>(v: Option<String>, key: &str, default: T) -> Result<T> {
    match v {
        Some(s) => s
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} must be an integer, got {s:?}"))),
        None => Ok(default),
    }
}

fn parse_csv(v: Option<String>) -> Vec<ChatId> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ChatId::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let mut map: HashMap<String, String> = [
            ("SNIPEIT_BASE_URL", "https://assets.example.com"),
            ("SNIPEIT_API_TOKEN", "tok"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.snipeit_base_url, "https://assets.example.com/api/v1");
        assert_eq!(cfg.notify_days, 14);
        assert_eq!(cfg.notify_only_on_day, None);
        assert!(!cfg.include_expired);
        assert_eq!(cfg.notify_mode, NotifyMode::Broadcast);
        assert_eq!(cfg.run_mode, RunMode::Once);
        assert_eq!(cfg.schedule_time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.user_map_path, PathBuf::from("user_map.json"));
        assert_eq!(cfg.state_path, PathBuf::from("state.json"));
        assert!(cfg.admin_chat_ids.is_empty());
        assert!(!cfg.dry_run);
    }

    #[test]
    fn overrides() {
        let cfg = load(&[
            ("NOTIFY_DAYS", "30"),
            ("NOTIFY_ONLY_ON_DAY", "-1"),
            ("INCLUDE_EXPIRED", "Yes"),
            ("NOTIFY_MODE", "per_seat"),
            ("RUN_MODE", "SCHEDULE"),
            ("SCHEDULE_TIME", "08:30"),
            ("DRY_RUN", "on"),
            ("ENABLE_REGISTRATION", "1"),
            ("ADMIN_CHAT_IDS", " 1, ,-100200 ,"),
            ("FALLBACK_CHAT_ID", "@ops_channel"),
            ("POLL_SECONDS", "50"),
        ])
        .unwrap();
        assert_eq!(cfg.notify_days, 30);
        assert_eq!(cfg.notify_only_on_day, Some(-1));
        assert!(cfg.include_expired);
        assert_eq!(cfg.notify_mode, NotifyMode::PerSeat);
        assert_eq!(cfg.run_mode, RunMode::Schedule);
        assert_eq!(cfg.schedule_time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert!(cfg.dry_run);
        assert_eq!(cfg.admin_chat_ids, vec![ChatId::from("1"), ChatId::from("-100200")]);
        assert_eq!(cfg.fallback_chat_id, Some(ChatId::from("@ops_channel")));
        assert_eq!(cfg.registration_settings().long_poll_seconds, 50);
        assert_eq!(cfg.window().only_on_day, Some(-1));
    }

    #[test]
    fn missing_required_are_listed_together() {
        let err = Config::from_lookup(|k| (k == "SNIPEIT_API_TOKEN").then(|| "x".to_string()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("SNIPEIT_BASE_URL"), "{err}");
        assert!(err.contains("TELEGRAM_BOT_TOKEN"), "{err}");
        assert!(!err.contains("SNIPEIT_API_TOKEN"), "{err}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("NOTIFY_ONLY_ON_DAY", "soon")]).is_err());
        assert!(load(&[("NOTIFY_DAYS", "two weeks")]).is_err());
        assert!(load(&[("SCHEDULE_TIME", "noon")]).is_err());
        assert!(load(&[("RUN_MODE", "forever")]).is_err());
        assert!(load(&[("PAGE_SIZE", "0")]).is_err());
        assert!(load(&[("ENABLE_REGISTRATION", "true")]).is_err());
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("https://h/"), "https://h/api/v1");
        assert_eq!(normalize_base_url("https://h/api"), "https://h/api/v1");
        assert_eq!(normalize_base_url("https://h/api/v1/"), "https://h/api/v1");
        assert_eq!(normalize_base_url(""), "");
    }
}
