//! The VIC system prompt.
//!
//! The persona template lives in `prompts/vic.md` and has four slots:
//! `{current_date_time}`, `{username}`, `{liturgy}` and `{random_verse}`.
//! A prompt is rendered once per agent, like a session-scoped constant.

use chrono::Datelike;
use tracing::{debug, warn};
use vicagent_tools::{LiturgyClient, current_date_time, describe_day};

const TEMPLATE: &str = include_str!("../prompts/vic.md");

/// Used when the calendar cannot be reached.
pub const LITURGY_UNAVAILABLE: &str = "unavailable";

const VERSES: &[&str] = &[
    "\"In the beginning was the Word, and the Word was with God, and the Word was God.\" (John 1:1)",
    "\"The heavens declare the glory of God; the sky proclaims its builder's craft.\" (Psalm 19:2)",
    "\"Be still and know that I am God.\" (Psalm 46:11)",
    "\"Trust in the Lord with all your heart, on your own intelligence do not rely.\" (Proverbs 3:5)",
    "\"For I know well the plans I have in mind for you, plans for your welfare and not for woe, so as to give you a future of hope.\" (Jeremiah 29:11)",
    "\"Come to me, all you who labor and are burdened, and I will give you rest.\" (Matthew 11:28)",
    "\"Ask and it will be given to you; seek and you will find; knock and the door will be opened to you.\" (Matthew 7:7)",
    "\"Love is patient, love is kind.\" (1 Corinthians 13:4)",
    "\"I am the way and the truth and the life.\" (John 14:6)",
    "\"We know that all things work for good for those who love God.\" (Romans 8:28)",
    "\"Faith is the realization of what is hoped for and evidence of things not seen.\" (Hebrews 11:1)",
    "\"The Lord is my shepherd; there is nothing I lack.\" (Psalm 23:1)",
    "\"Where your treasure is, there also will your heart be.\" (Matthew 6:21)",
    "\"The truth will set you free.\" (John 8:32)",
];

/// Pick a verse at random.
pub fn random_verse() -> &'static str {
    use rand::Rng;
    let mut rng = rand::rng();
    VERSES[rng.random_range(0..VERSES.len())]
}

/// Today's liturgy in one line, or [`LITURGY_UNAVAILABLE`].
pub async fn liturgy_for_today(client: &LiturgyClient) -> String {
    let today = chrono::Local::now().date_naive();
    match client.day(today.year(), today.month(), today.day()).await {
        Ok(day) => {
            let text = describe_day(&day);
            debug!(liturgy = %text, "Fetched liturgy for today");
            text
        }
        Err(e) => {
            warn!(error = %e, "Liturgy lookup failed");
            LITURGY_UNAVAILABLE.to_string()
        }
    }
}

/// The values filled into the persona template.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub username: String,
    pub liturgy: String,
    pub random_verse: String,
}

impl SystemPrompt {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            liturgy: LITURGY_UNAVAILABLE.to_string(),
            random_verse: random_verse().to_string(),
        }
    }

    pub fn with_liturgy(mut self, liturgy: impl Into<String>) -> Self {
        self.liturgy = liturgy.into();
        self
    }

    /// Render with the current local time.
    pub fn render(&self) -> String {
        self.render_at(&current_date_time())
    }

    pub fn render_at(&self, date_time: &str) -> String {
        TEMPLATE
            .replace("{current_date_time}", date_time)
            .replace("{username}", &self.username)
            .replace("{liturgy}", &self.liturgy)
            .replace("{random_verse}", &self.random_verse)
    }
}
