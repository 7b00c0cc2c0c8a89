mod battery;
mod config;
mod controller;
mod icon;
mod types;
mod ui {
    pub mod tray;
}

use anyhow::{Context, Result, bail};
use gtk4::glib;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::battery::AcpiReader;
use crate::controller::TrayController;
use crate::icon::{GaugeStyle, IconRenderer};
use crate::ui::tray::{BatteryTray, TrayHandle, spawn_service};

const EMBED_CHECK_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::load_config();
    let style = GaugeStyle::from_config(&config).context("building gauge style")?;
    let renderer = IconRenderer::new(&style);
    let reader = AcpiReader::from_config(&config.command);

    let main_loop = glib::MainLoop::new(None, false);
    let embedded = Arc::new(AtomicBool::new(false));

    let service = ksni::TrayService::new(BatteryTray::new(
        renderer.disabled(),
        main_loop.clone(),
        embedded.clone(),
    ));
    let handle = service.handle();
    let service_failure = spawn_service(move || service.run(), main_loop.clone());

    let controller = Rc::new(RefCell::new(TrayController::new(
        reader,
        renderer,
        TrayHandle::new(handle),
    )));

    let poll_interval = config.poll_interval_secs;
    let embed_timeout = Duration::from_secs(config.embed_timeout_secs);
    let started = Instant::now();

    glib::timeout_add_local(EMBED_CHECK_INTERVAL, move || {
        if !embedded.load(Ordering::Acquire) {
            if started.elapsed() < embed_timeout {
                return glib::ControlFlow::Continue;
            }
            warn!(
                "No StatusNotifierWatcher after {:?}, polling anyway",
                embed_timeout
            );
        }

        controller.borrow_mut().start();

        let controller = controller.clone();
        glib::timeout_add_seconds_local(poll_interval, move || {
            controller.borrow_mut().tick();
            glib::ControlFlow::Continue
        });
        glib::ControlFlow::Break
    });

    info!("Battery tray started (poll every {}s)", poll_interval);
    main_loop.run();

    let failure = service_failure.lock().ok().and_then(|slot| slot.clone());
    if let Some(reason) = failure {
        bail!("tray service stopped: {reason}");
    }
    info!("Exiting");
    Ok(())
}
