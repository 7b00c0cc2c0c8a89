use gtk4::glib;
use ksni::menu::StandardItem;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::controller::TraySurface;
use crate::icon::GaugeBitmap;
use crate::types::NO_DATA_TEXT;

const TRAY_ID: &str = "battery-tray";
const TRAY_TITLE: &str = "Battery";

/// StatusNotifierItem state. Lives on the ksni service thread and is only
/// changed through [`TrayHandle`].
pub struct BatteryTray {
    icon: ksni::Icon,
    tooltip: String,
    embedded: Arc<AtomicBool>,
    main_loop: glib::MainLoop,
}

impl BatteryTray {
    pub fn new(initial: &GaugeBitmap, main_loop: glib::MainLoop, embedded: Arc<AtomicBool>) -> Self {
        Self {
            icon: to_icon(initial),
            tooltip: NO_DATA_TEXT.to_string(),
            embedded,
            main_loop,
        }
    }

    fn quit(&mut self) {
        info!("Quit selected from tray menu");
        self.main_loop.quit();
    }
}

fn to_icon(bitmap: &GaugeBitmap) -> ksni::Icon {
    ksni::Icon {
        width: bitmap.width() as i32,
        height: bitmap.height() as i32,
        data: bitmap.to_argb32(),
    }
}

impl ksni::Tray for BatteryTray {
    fn id(&self) -> String {
        TRAY_ID.to_string()
    }

    fn title(&self) -> String {
        TRAY_TITLE.to_string()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::Hardware
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        vec![self.icon.clone()]
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            title: TRAY_TITLE.to_string(),
            description: self.tooltip.clone(),
            ..Default::default()
        }
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Quit".into(),
                icon_name: "application-exit".into(),
                activate: Box::new(|tray: &mut Self| tray.quit()),
                ..Default::default()
            }
            .into(),
        ]
    }

    fn watcher_online(&self) {
        self.embedded.store(true, Ordering::Release);
    }

    fn watcher_offine(&self) -> bool {
        warn!("StatusNotifierWatcher went away, waiting for it to return");
        self.embedded.store(false, Ordering::Release);
        true
    }
}

/// Main-loop side of the tray.
pub struct TrayHandle {
    handle: ksni::Handle<BatteryTray>,
}

impl TrayHandle {
    pub fn new(handle: ksni::Handle<BatteryTray>) -> Self {
        Self { handle }
    }
}

impl TraySurface for TrayHandle {
    fn set_icon(&mut self, bitmap: &GaugeBitmap) {
        let icon = to_icon(bitmap);
        self.handle.update(move |tray| tray.icon = icon);
    }

    fn set_tooltip(&mut self, text: &str) {
        let text = text.to_string();
        self.handle.update(move |tray| tray.tooltip = text);
    }
}

/// Why the tray service stopped, if it stopped with an error.
pub type ServiceFailure = Arc<Mutex<Option<String>>>;

/// Run the D-Bus side of the tray on its own thread. When it stops, for
/// whatever reason, the main loop is quit so the process does not keep
/// polling with no icon on screen.
pub fn spawn_service<F, E>(run: F, main_loop: glib::MainLoop) -> ServiceFailure
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: Display,
{
    let failure = ServiceFailure::default();
    let slot = failure.clone();
    std::thread::spawn(move || {
        match run() {
            Ok(()) => info!("Tray service shut down"),
            Err(e) => {
                error!("Tray service failed: {}", e);
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(e.to_string());
                }
            }
        }
        main_loop.quit();
    });
    failure
}
