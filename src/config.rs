use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// `None` disables every AI feature; handlers fall back to canned output.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Program plus arguments, e.g. `sendmail -t`. Unset means log-only delivery.
    pub command: Option<Vec<String>>,
    pub from: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// UTC hour of the daily reminder run.
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
    pub mail: MailConfig,
    pub reminders: ReminderConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "fittrack".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fittrack-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let llm = LlmConfig {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".into()
            }),
        };
        let mail = MailConfig {
            command: std::env::var("MAIL_COMMAND").ok().and_then(|v| split_command(&v)),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "FitTrack <noreply@fittrack.local>".into()),
            timeout_secs: parse_or("MAIL_TIMEOUT_SECS", 30),
        };
        let reminders = ReminderConfig {
            enabled: std::env::var("REMINDERS_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            hour: parse_or::<u8>("REMINDER_HOUR", 9).min(23),
            minute: parse_or::<u8>("REMINDER_MINUTE", 0).min(59),
        };

        Ok(Self {
            database_url,
            jwt,
            llm,
            mail,
            reminders,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn split_command(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_handles_arguments_and_blank_input() {
        assert_eq!(
            split_command("sendmail -t -i"),
            Some(vec!["sendmail".to_string(), "-t".to_string(), "-i".to_string()])
        );
        assert_eq!(split_command("   "), None);
    }

    #[test]
    fn parse_or_falls_back_on_missing_key() {
        let v: u64 = parse_or("FITTRACK_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(v, 42);
    }
}
