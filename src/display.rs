// Window output and quit-key polling

use crate::error::{MoodCamError, Result};
use opencv::core::Mat;
use opencv::highgui;
use tracing::{info, warn};

/// Shows annotated frames and reports whether the user asked to quit
pub trait Presenter {
    /// Replaces the window contents with `img`
    fn show(&mut self, img: &Mat) -> Result<()>;

    /// Waits up to `timeout_ms` for a key press; true iff it was the quit key
    fn poll_quit(&mut self, timeout_ms: i32) -> Result<bool>;
}

/// True iff a raw `wait_key` code is the given key, ignoring modifier bits
pub fn is_quit_key(code: i32, quit_key: char) -> bool {
    code >= 0 && (code & 0xFF) == quit_key as i32
}

/// OpenCV HighGUI window
pub struct HighGuiPresenter {
    title: String,
    quit_key: char,
}

impl HighGuiPresenter {
    /// Creates the named window
    pub fn new(title: &str, quit_key: char) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| MoodCamError::Display(format!("Failed to create window: {e}")))?;
        info!("Opened window {:?}, press '{}' to quit", title, quit_key);
        Ok(Self {
            title: title.to_string(),
            quit_key,
        })
    }
}

impl Presenter for HighGuiPresenter {
    fn show(&mut self, img: &Mat) -> Result<()> {
        highgui::imshow(&self.title, img)
            .map_err(|e| MoodCamError::Display(format!("Failed to show frame: {e}")))
    }

    fn poll_quit(&mut self, timeout_ms: i32) -> Result<bool> {
        let code = highgui::wait_key(timeout_ms)
            .map_err(|e| MoodCamError::Display(format!("Failed to poll keyboard: {e}")))?;
        Ok(is_quit_key(code, self.quit_key))
    }
}

impl Drop for HighGuiPresenter {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.title) {
            warn!("Error closing window: {}", e);
        }
    }
}
