use anyhow::{Context, Result};
use assistant_session::avatar::{AvatarWidget, StaticHost, WidgetHandle};
use assistant_session::config::{SessionConfig, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("Failed to load settings")?;

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let widget = WidgetHandle::new();
    let session = assistant_session::connect(
        settings.client_config(),
        SessionConfig::default(),
        widget.clone(),
        Arc::new(StaticHost::new("localhost")),
    )
    .context("Failed to start session")?;

    // The avatar shows up a little after the page, like a script loading late.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        widget.install(
            AvatarWidget::new()
                .with_is_loaded(|| true)
                .with_speak(|request| {
                    println!("(avatar says) {}", request.text());
                    Ok(())
                })
                .with_set_intent(|intent| {
                    tracing::debug!("avatar intent: {}", intent);
                    Ok(())
                }),
        );
    });

    let mut view = session.subscribe();
    tokio::spawn(async move {
        let mut shown = 0;
        let mut last_error = None;
        while view.changed().await.is_ok() {
            let current = view.borrow_and_update().clone();
            for message in current.transcript.iter().skip(shown) {
                let who = if message.is_user() { "you" } else { "assistant" };
                println!("[{}] {}: {}", message.timestamp().format("%H:%M:%S"), who, message.text());
            }
            shown = current.transcript.len();

            let error = current.state.last_error().map(str::to_string);
            if error.is_some() && error != last_error {
                println!("! {}", error.as_deref().unwrap_or_default());
            }
            last_error = error;
        }
    });

    println!("Type a message and press enter. Ctrl-C quits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => session.submit(&line).await?,
                None => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}
