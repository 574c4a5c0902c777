//! Delivery goes through an external program (e.g. `sendmail -t`) that reads
//! a complete RFC 5322 message on stdin. No retries: a failed send is
//! recorded by the caller and dropped.

use std::{process::Stdio, time::Duration};

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hands the message off and returns its Message-ID.
    async fn send(&self, msg: &OutgoingEmail) -> anyhow::Result<String>;
}

fn sender_domain(from: &str) -> &str {
    from.rsplit_once('@')
        .map(|(_, d)| d.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("fittrack.local")
}

pub fn new_message_id(from: &str) -> String {
    format!("<{}@{}>", Uuid::new_v4().simple(), sender_domain(from))
}

/// RFC 2047 encoded-word for non-ASCII header values.
pub fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", Base64::encode_string(value.as_bytes()))
    }
}

pub fn render_message(
    from: &str,
    msg: &OutgoingEmail,
    message_id: &str,
    date: OffsetDateTime,
) -> anyhow::Result<String> {
    for (name, value) in [("From", from), ("To", msg.to.as_str()), ("Subject", msg.subject.as_str())] {
        if value.contains(['\r', '\n']) {
            bail!("line break in {} header", name);
        }
    }

    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", from));
    out.push_str(&format!("To: {}\r\n", msg.to));
    out.push_str(&format!("Subject: {}\r\n", encode_header(&msg.subject)));
    out.push_str(&format!("Date: {}\r\n", date.format(&Rfc2822).context("format Date header")?));
    out.push_str(&format!("Message-ID: {}\r\n", message_id));
    out.push_str("MIME-Version: 1.0\r\n");

    match &msg.html {
        None => {
            out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
            out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            out.push_str(&msg.text);
            out.push_str("\r\n");
        }
        Some(html) => {
            let boundary = format!("=_fittrack_{}", Uuid::new_v4().simple());
            out.push_str(&format!(
                "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
                boundary
            ));
            for (ctype, body) in [("text/plain", msg.text.as_str()), ("text/html", html.as_str())] {
                out.push_str(&format!("--{}\r\n", boundary));
                out.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", ctype));
                out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
                out.push_str(body);
                out.push_str("\r\n");
            }
            out.push_str(&format!("--{}--\r\n", boundary));
        }
    }
    Ok(out)
}

pub struct CommandMailer {
    program: String,
    args: Vec<String>,
    from: String,
    timeout: Duration,
}

impl CommandMailer {
    pub fn new(argv: Vec<String>, from: String, timeout: Duration) -> anyhow::Result<Self> {
        let mut argv = argv.into_iter();
        let Some(program) = argv.next() else {
            bail!("mail command is empty");
        };
        Ok(Self {
            program,
            args: argv.collect(),
            from,
            timeout,
        })
    }
}

#[async_trait]
impl Mailer for CommandMailer {
    #[instrument(skip(self, msg), fields(program = %self.program, to = %msg.to))]
    async fn send(&self, msg: &OutgoingEmail) -> anyhow::Result<String> {
        let message_id = new_message_id(&self.from);
        let raw = render_message(&self.from, msg, &message_id, OffsetDateTime::now_utc())?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn mail command '{}'", self.program))?;

        let run = async move {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(raw.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => bail!("mail command timed out after {}s", self.timeout.as_secs_f32()),
            Ok(res) => res.context("mail command i/o")?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("mail command failed ({}): {}", output.status, stderr.trim());
        }

        debug!(%message_id, "mail handed to command");
        Ok(message_id)
    }
}

/// Stands in when no mail command is configured.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: String) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, msg: &OutgoingEmail) -> anyhow::Result<String> {
        let message_id = new_message_id(&self.from);
        info!(to = %msg.to, subject = %msg.subject, %message_id, "mail not delivered (log only)");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample(html: Option<&str>) -> OutgoingEmail {
        OutgoingEmail {
            to: "ann@example.com".into(),
            subject: "Daily reminder".into(),
            text: "Log your meals".into(),
            html: html.map(str::to_string),
        }
    }

    fn sh(script: &str, timeout: Duration) -> CommandMailer {
        CommandMailer::new(
            vec!["sh".into(), "-c".into(), script.into()],
            "FitTrack <noreply@fittrack.test>".into(),
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn message_ids_use_sender_domain() {
        let id = new_message_id("FitTrack <noreply@fittrack.test>");
        assert!(id.starts_with('<') && id.ends_with("@fittrack.test>"));
        assert!(new_message_id("nobody").ends_with("@fittrack.local>"));
    }

    #[test]
    fn renders_plain_message() {
        let raw = render_message(
            "noreply@fittrack.test",
            &sample(None),
            "<id@fittrack.test>",
            datetime!(2024-05-10 09:00 UTC),
        )
        .unwrap();
        assert!(raw.starts_with("From: noreply@fittrack.test\r\nTo: ann@example.com\r\n"));
        assert!(raw.contains("Subject: Daily reminder\r\n"));
        assert!(raw.contains("Message-ID: <id@fittrack.test>\r\n"));
        assert!(raw.contains("Date: Fri, 10 May 2024 09:00:00 +0000\r\n"));
        assert!(raw.contains("text/plain; charset=utf-8"));
        assert!(raw.ends_with("\r\n\r\nLog your meals\r\n"));
    }

    #[test]
    fn renders_alternative_parts_when_html_present() {
        let raw = render_message(
            "noreply@fittrack.test",
            &sample(Some("<p>Log your meals</p>")),
            "<id@fittrack.test>",
            datetime!(2024-05-10 09:00 UTC),
        )
        .unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html; charset=utf-8"));
        assert!(raw.contains("<p>Log your meals</p>"));
        assert!(raw.trim_end().ends_with("--"));
    }

    #[test]
    fn rejects_header_injection() {
        let mut msg = sample(None);
        msg.subject = "hi\r\nBcc: everyone@example.com".into();
        let err = render_message("a@b.c", &msg, "<x@b.c>", OffsetDateTime::now_utc()).unwrap_err();
        assert!(err.to_string().contains("Subject"));
    }

    #[test]
    fn non_ascii_subjects_are_encoded() {
        assert_eq!(encode_header("plain"), "plain");
        let encoded = encode_header("Bravo, Zoë");
        assert!(encoded.starts_with("=?UTF-8?B?") && encoded.ends_with("?="));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandMailer::new(vec![], "a@b.c".into(), Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn command_success_returns_message_id() {
        let mailer = sh("cat >/dev/null", Duration::from_secs(5));
        let id = mailer.send(&sample(None)).await.unwrap();
        assert!(id.ends_with("@fittrack.test>"));
    }

    #[tokio::test]
    async fn command_failure_reports_stderr() {
        let mailer = sh("cat >/dev/null; echo 'relay denied' >&2; exit 3", Duration::from_secs(5));
        let err = mailer.send(&sample(None)).await.unwrap_err();
        assert!(err.to_string().contains("relay denied"));
    }

    #[tokio::test]
    async fn command_timeout_is_an_error() {
        let mailer = sh("sleep 5", Duration::from_millis(100));
        let err = mailer.send(&sample(None)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn log_mailer_always_accepts() {
        let mailer = LogMailer::new("noreply@fittrack.test".into());
        assert!(mailer.send(&sample(None)).await.is_ok());
    }
}
