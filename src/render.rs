//! Key image output.

use crate::client::StreamDeck;
use crate::error::{DeckError, Result};
use crate::protocol::Target;
use crate::types::{KeyTexts, TitleParameters};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Draws artwork and text onto a key
#[async_trait]
pub trait KeyRenderer: Send + Sync {
    /// Show the image at `image_url` with optional text lines on the key
    async fn draw(
        &self,
        context: &str,
        image_url: &str,
        texts: Option<&KeyTexts>,
        title_parameters: Option<&TitleParameters>,
    ) -> Result<()>;

    /// Restore the key's default image
    async fn clear(&self, context: &str) -> Result<()>;
}

/// Renderer that hands the artwork to the host as a data URL and the texts
/// as a multi-line title
#[derive(Clone)]
pub struct HostRenderer {
    deck: StreamDeck,
    http: reqwest::Client,
}

impl HostRenderer {
    pub fn new(deck: StreamDeck) -> Self {
        Self {
            deck,
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_data_url(&self, image_url: &str) -> Result<String> {
        let response = self.http.get(image_url).timeout(FETCH_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeckError::Transport {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?;

        Ok(data_url(&mime, &bytes))
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[async_trait]
impl KeyRenderer for HostRenderer {
    async fn draw(
        &self,
        context: &str,
        image_url: &str,
        texts: Option<&KeyTexts>,
        title_parameters: Option<&TitleParameters>,
    ) -> Result<()> {
        let image = self.fetch_data_url(image_url).await?;
        self.deck.set_image(context, Some(&image), Target::Both, None);

        // no texts hands the title back to the user's own one
        let show = title_parameters.map(|p| p.show_title).unwrap_or(true);
        let title = texts.filter(|_| show).map(|texts| texts.lines().join("\n"));
        self.deck.set_title(context, title.as_deref(), Target::Both, None);
        Ok(())
    }

    async fn clear(&self, context: &str) -> Result<()> {
        self.deck.set_image(context, None, Target::Both, None);
        self.deck.set_title(context, None, Target::Both, None);
        Ok(())
    }
}
