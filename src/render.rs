//! ==============================================================================
//! render.rs - render targets for the sensor snapshot
//! ==============================================================================
//!
//! purpose:
//!     a render target is wherever the pretty-printed state ends up. the
//!     watcher rewrites it after every merged frame.
//!
//! targets:
//!     - TerminalTarget: clears the screen and prints to stdout
//!     - FileTarget: rewrites one file per render (e.g. for a kiosk page)
//!     - MemoryTarget: keeps the last text in memory (tests, embedding)
//!
//! ==============================================================================

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{RenderConfig, TargetKind};
use crate::error::RenderError;

/// sink that displays the rendered state as text
pub trait RenderTarget {
    fn render(&mut self, text: &str) -> Result<(), RenderError>;
}

impl<T: RenderTarget + ?Sized> RenderTarget for Box<T> {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        (**self).render(text)
    }
}

/// pick the target named in the config
///
/// fails with MissingTarget if a file target's directory does not exist.
pub fn open_target(config: &RenderConfig) -> Result<Box<dyn RenderTarget + Send>, RenderError> {
    match config.target {
        TargetKind::Terminal => Ok(Box::new(TerminalTarget::new(io::stdout()))),
        TargetKind::File => Ok(Box::new(FileTarget::open(&config.path)?)),
    }
}

// ==============================================================================
// terminal
// ==============================================================================

/// ansi: clear screen, cursor home
const CLEAR: &str = "\x1b[2J\x1b[H";

pub struct TerminalTarget<W: Write> {
    out: W,
}

impl<W: Write> TerminalTarget<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RenderTarget for TerminalTarget<W> {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        writeln!(self.out, "{CLEAR}{text}")?;
        self.out.flush()?;
        Ok(())
    }
}

// ==============================================================================
// file
// ==============================================================================

pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    /// the file itself may not exist yet, its directory must
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(RenderError::MissingTarget(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// hidden sibling named after the full file name: `state.json` -> `.state.json.tmp`
    fn scratch_path(&self) -> PathBuf {
        let mut name = OsString::from(".");
        name.push(self.path.file_name().unwrap_or_else(|| OsStr::new("render")));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RenderTarget for FileTarget {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        // write beside the target and rename, so readers never see half a frame
        let tmp = self.scratch_path();
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ==============================================================================
// memory
// ==============================================================================

#[derive(Debug, Default)]
pub struct MemoryTarget {
    last: Option<String>,
    renders: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl RenderTarget for MemoryTarget {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        self.last = Some(text.to_string());
        self.renders += 1;
        Ok(())
    }
}
