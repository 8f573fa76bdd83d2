use std::time::Duration;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{ClassifiedEvent, DEFAULT_SIZE, EventKind, StockStatus};
use pricewatch_core::traits::Notifier;
use pricewatch_core::util::truncate_chars;
use reqwest::Client;
use serde::Serialize;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_FOOTER: &str = "pricewatch";

const COLOR_IN_STOCK: u32 = 0x00ff00;
const COLOR_UNAVAILABLE: u32 = 0xff0000;

const MAX_TITLE_CHARS: usize = 256;
const MAX_FIELD_CHARS: usize = 1024;
const MAX_FOOTER_CHARS: usize = 2048;
const MAX_LISTED: usize = 5;

/// Chat webhook notifier posting one embed per event.
///
/// The payload follows the Discord webhook format (`content` for plain
/// status messages, `embeds` for events). Each message is attempted up to
/// three times, two seconds apart.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    attempts: u32,
    retry_delay: Duration,
    footer: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            footer: DEFAULT_FOOTER.to_string(),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    async fn post(&self, payload: &WebhookPayload) -> Result<(), AppError> {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.post_once(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Webhook delivery failed");
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(AppError::NotifyError(match last_error {
            Some(e) => e.to_string(),
            None => "no delivery attempted".to_string(),
        }))
    }

    async fn post_once(&self, payload: &WebhookPayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(DEFAULT_TIMEOUT.as_secs())
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: "webhook".to_string(),
            });
        }
        Ok(())
    }
}

// ---- Webhook payload types ----

#[derive(Debug, Serialize)]
struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    color: u32,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Thumbnail>,
    footer: Footer,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn inline(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline: true,
        }
    }

    fn block(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value: truncate_chars(&value, MAX_FIELD_CHARS),
            inline: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Serialize)]
struct Footer {
    text: String,
}

fn money(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("£{v:.2}"),
        _ => "N/A".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn listed(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items
            .iter()
            .take(MAX_LISTED)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn event_embed(event: &ClassifiedEvent, footer: &str) -> Embed {
    let record = &event.record;

    let (previous, change, badge) = match event.kind {
        EventKind::New => (
            "N/A (New)".to_string(),
            "N/A (New)".to_string(),
            "New".to_string(),
        ),
        EventKind::PriceChange {
            previous_price,
            delta,
        } => {
            let direction = event
                .kind
                .direction()
                .map(|d| capitalize(d.as_str()))
                .unwrap_or_default();
            (
                money(Some(previous_price)),
                format!("{direction} £{:.2}", delta.abs()),
                direction,
            )
        }
    };

    let mut badges = vec![badge];
    if record.recently_reduced {
        badges.push("Recently Reduced".to_string());
    }

    let color = if record.stock_status == StockStatus::InStock {
        COLOR_IN_STOCK
    } else {
        COLOR_UNAVAILABLE
    };

    Embed {
        title: truncate_chars(&record.name, MAX_TITLE_CHARS),
        url: record.url.clone(),
        color,
        fields: vec![
            EmbedField::inline("Current Price", money(record.current_price)),
            EmbedField::inline("Previous Price", previous),
            EmbedField::inline("Change", change),
            EmbedField::inline("Original Price", money(record.original_price)),
            EmbedField::inline("Discount", format!("{:.2}%", record.discount_pct)),
            EmbedField::inline("Stock", record.stock_status.to_string()),
            EmbedField::inline("Category", record.category.clone()),
            EmbedField::block("Sizes", listed(&record.sizes, DEFAULT_SIZE)),
            EmbedField::block("Variants", listed(&record.variant_names, "None")),
        ],
        thumbnail: record
            .image_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| Thumbnail { url: url.clone() }),
        footer: Footer {
            text: truncate_chars(
                &format!("{footer} | {}", badges.join(" | ")),
                MAX_FOOTER_CHARS,
            ),
        },
    }
}

impl Notifier for WebhookNotifier {
    async fn notify_event(&self, event: &ClassifiedEvent) -> Result<(), AppError> {
        let payload = WebhookPayload {
            content: None,
            embeds: vec![event_embed(event, &self.footer)],
        };
        self.post(&payload).await?;
        tracing::info!(product_id = %event.record.product_id, kind = event.kind.label(), "Webhook sent");
        Ok(())
    }

    async fn notify_status(&self, message: &str) -> Result<(), AppError> {
        let payload = WebhookPayload {
            content: Some(message.to_string()),
            embeds: Vec::new(),
        };
        self.post(&payload).await
    }
}
