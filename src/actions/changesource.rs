use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

/// Switches between TV, line-in and the queue
pub struct ChangeSource;

/// `(prefix, suffix)` of the local transport URI for a `source` setting
fn local_transport(source: Option<&str>) -> (&'static str, &'static str) {
    match source {
        Some("tv") => ("x-sonos-htastream", ":spdif"),
        Some("line_in") => ("x-rincon-stream", ""),
        _ => ("x-rincon-queue", "#0"),
    }
}

#[async_trait]
impl Action for ChangeSource {
    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let settings = event.settings();
        let (prefix, suffix) = local_transport(settings.text("source").as_deref());
        cx.sonos.set_local_transport(prefix, suffix).await?;

        if settings.flag("play") {
            cx.sonos.play().await?;
        }
        Ok(())
    }
}
