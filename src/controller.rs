use tracing::{debug, info};

use crate::battery::BatteryReader;
use crate::icon::{GaugeBitmap, IconRenderer};
use crate::types::ColorBand;

/// Where the rendered gauge ends up.
pub trait TraySurface {
    fn set_icon(&mut self, bitmap: &GaugeBitmap);
    fn set_tooltip(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayState {
    /// Waiting for the host shell to pick up the icon.
    Initializing,
    Running,
}

pub struct TrayController<R, S> {
    reader: R,
    renderer: IconRenderer,
    surface: S,
    state: TrayState,
}

impl<R: BatteryReader, S: TraySurface> TrayController<R, S> {
    pub fn new(reader: R, renderer: IconRenderer, surface: S) -> Self {
        Self {
            reader,
            renderer,
            surface,
            state: TrayState::Initializing,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> TrayState {
        self.state
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Switch to `Running` and refresh right away. Returns `None` if
    /// polling had already started.
    pub fn start(&mut self) -> Option<ColorBand> {
        if self.state == TrayState::Running {
            return None;
        }
        info!("Tray icon ready, polling battery status");
        self.state = TrayState::Running;
        Some(self.refresh())
    }

    /// One timer tick. Ignored until [`start`](Self::start) has run.
    pub fn tick(&mut self) -> Option<ColorBand> {
        match self.state {
            TrayState::Initializing => {
                debug!("Tick before the tray icon was embedded, skipping");
                None
            }
            TrayState::Running => Some(self.refresh()),
        }
    }

    fn refresh(&mut self) -> ColorBand {
        let reading = self.reader.read();
        let (bitmap, band) = self.renderer.render(reading.level);
        debug!(level = ?reading.level, ?band, "Battery polled");

        self.surface.set_icon(&bitmap);
        self.surface.set_tooltip(&reading.description);
        band
    }
}
