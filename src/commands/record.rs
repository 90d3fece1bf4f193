//! Interactive voice message recording.
//!
//! Runs the trigger UI, toggles the capture controller on Space/Enter or on an
//! external SIGUSR1, and waits for outstanding hand-offs before exiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::MicnoteConfig;
use crate::errors::SessionResult;
use crate::recording::runtime::MediaRuntime;
use crate::recording::{
    CaptureController, CaptureSettings, CpalRuntime, IndicatorState, PendingClip, TriggerCommand,
    TriggerControl, TriggerTui,
};
use crate::upload::{AttachmentDrop, Delivery, UploadSink};

type Handoffs = JoinSet<SessionResult<Delivery>>;

/// Records voice messages until the user quits.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the terminal UI cannot be set up or drawn
pub async fn handle_record() -> Result<(), anyhow::Error> {
    tracing::info!("=== micnote recorder started ===");

    let config = MicnoteConfig::load_or_create().map_err(|err| {
        tracing::error!("Failed to load configuration: {err}");
        anyhow::anyhow!(
            "Configuration error: {err}\n\nPlease check ~/.config/micnote/micnote.toml and try again."
        )
    })?;
    tracing::info!(
        "Configuration loaded: device={}, preferences={:?}, frame_rate={}, attachments={}",
        config.recording.device,
        config.recording.preferred_encodings,
        config.recording.frame_rate,
        config.upload.attachment_dir.display()
    );

    let indicator = IndicatorState::new();
    let trigger: Arc<dyn TriggerControl> = Arc::new(indicator.clone());
    let uploader: Arc<dyn UploadSink> = Arc::new(AttachmentDrop::new(
        config.upload.attachment_dir.clone(),
        config.upload.copy_to_clipboard,
    ));
    let frame_interval = config.recording.frame_interval();
    let settings = CaptureSettings {
        preferred_encodings: config.recording.preferred_encodings.clone(),
        frame_interval,
        ..CaptureSettings::default()
    };
    let mut controller = CaptureController::new(
        CpalRuntime::new(config.recording.device.clone()),
        trigger,
        uploader,
        settings,
    );

    let external_toggle = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, external_toggle.clone())
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let mut tui =
        TriggerTui::new(indicator.clone()).map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let mut handoffs = Handoffs::new();
    let outcome = trigger_loop(
        &mut tui,
        &mut controller,
        &indicator,
        &external_toggle,
        &mut handoffs,
        frame_interval,
    )
    .await;

    // Quitting mid-recording still sends what was captured.
    if let Some(pending) = controller.stop() {
        tracing::info!("Quit while recording; finishing the clip");
        handoffs.spawn(report(pending, indicator.clone()));
    }

    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    if !handoffs.is_empty() {
        println!("Finishing voice message...");
    }
    while let Some(joined) = handoffs.join_next().await {
        match joined {
            Ok(Ok(delivery)) => println!("{}", delivery_status(&delivery)),
            Ok(Err(e)) => eprintln!("Voice message not sent: {}", e.notice()),
            Err(e) => tracing::error!("Hand-off task failed: {e}"),
        }
    }

    tracing::info!("=== micnote recorder exited ===");
    outcome
}

async fn trigger_loop<R: MediaRuntime>(
    tui: &mut TriggerTui,
    controller: &mut CaptureController<R>,
    indicator: &IndicatorState,
    external_toggle: &AtomicBool,
    handoffs: &mut Handoffs,
    frame_interval: Duration,
) -> Result<(), anyhow::Error> {
    tracing::debug!("Entering trigger loop. Space/Enter toggles, Escape/q quits.");

    loop {
        if external_toggle.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: toggling recording");
            toggle(controller, indicator, handoffs).await;
        }

        match tui.handle_input() {
            Ok(TriggerCommand::Continue) | Ok(TriggerCommand::Dismiss) => {}
            Ok(TriggerCommand::Toggle) => toggle(controller, indicator, handoffs).await,
            Ok(TriggerCommand::Quit) => return Ok(()),
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                return Err(anyhow::anyhow!("Input handling error: {e}"));
            }
        }

        while let Some(joined) = handoffs.try_join_next() {
            if let Err(e) = joined {
                tracing::error!("Hand-off task failed: {e}");
            }
        }

        tui.render()
            .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;

        // Yields to the feedback loop and hand-off tasks on this thread.
        tokio::time::sleep(frame_interval).await;
    }
}

async fn toggle<R: MediaRuntime>(
    controller: &mut CaptureController<R>,
    indicator: &IndicatorState,
    handoffs: &mut Handoffs,
) {
    if let Some(pending) = controller.stop() {
        handoffs.spawn(report(pending, indicator.clone()));
        return;
    }

    match controller.start().await {
        Ok(()) => tracing::debug!(
            "Encoder {:?} recording {}",
            controller.encoder_state(),
            controller.selected_encoding().unwrap_or("with the default encoder")
        ),
        // The controller has already reset the trigger and raised a notice.
        Err(e) => tracing::debug!("Recording not started: {e}"),
    }
}

/// Waits for a clip's hand-off and shows where it went.
async fn report(pending: PendingClip, indicator: IndicatorState) -> SessionResult<Delivery> {
    let result = pending.wait().await;
    if let Ok(delivery) = &result {
        indicator.set_status(delivery_status(delivery));
    }
    result
}

fn delivery_status(delivery: &Delivery) -> String {
    format!(
        "sent {} ({}, {:.1} KB)",
        delivery.location,
        delivery.media_type,
        delivery.bytes as f64 / 1024.0
    )
}
