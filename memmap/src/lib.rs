//! Memory maps of a Tiliqua SoC, as seen from the CPU bus.
//!
//! A [`MemoryMap`] is an ordered list of named address windows.  The order is
//! significant: consumers (such as the `memory.x` generator) walk the windows
//! in insertion order, which is also the order of the `[[window]]` tables in a
//! memory-map file.

use std::{error::Error, fs::read_to_string, path::Path};

use itertools::Itertools;
use jzon::JsonValue;
use serde::Deserialize;

fn default_ratio() -> u32 {
    1
}

/// A named address range.  `stop` is exclusive.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
pub struct MemoryWindow {
    pub name: String,
    pub start: u64,
    pub stop: u64,
    /// Bus data width ratio of the window; carried along, never interpreted here.
    #[serde(default = "default_ratio")]
    pub ratio: u32,
}

impl MemoryWindow {
    pub fn new(name: impl Into<String>, start: u64, stop: u64) -> Self {
        MemoryWindow {
            name: name.into(),
            start,
            stop,
            ratio: 1,
        }
    }

    pub fn with_ratio(self, ratio: u32) -> Self {
        Self { ratio, ..self }
    }

    /// The window length.  Wraps instead of panicking on inverted windows.
    pub fn size(&self) -> u64 {
        self.stop.wrapping_sub(self.start)
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.stop
    }

    pub fn overlaps(&self, other: &MemoryWindow) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemoryMapError {
    EmptyName,
    EmptyWindow(String),
    ZeroRatio(String),
    DuplicateName(String),
    Overlap(String, String),
}

impl std::fmt::Display for MemoryMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryMapError::EmptyName => write!(f, "window name is empty"),
            MemoryMapError::EmptyWindow(name) => {
                write!(f, "window {name} does not cover any addresses")
            }
            MemoryMapError::ZeroRatio(name) => write!(f, "window {name} has a zero ratio"),
            MemoryMapError::DuplicateName(name) => write!(f, "window {name} defined twice"),
            MemoryMapError::Overlap(a, b) => write!(f, "window {a} overlaps window {b}"),
        }
    }
}

impl Error for MemoryMapError {}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryMap {
    /// The windows, in iteration order.  Pushing here directly bypasses
    /// validation; use [`MemoryMap::add_window`] for checked insertion.
    pub windows: Vec<MemoryWindow>,
}

#[derive(Deserialize)]
struct MemoryMapFile {
    #[serde(default)]
    window: Vec<MemoryWindow>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_window(&mut self, window: MemoryWindow) -> Result<(), MemoryMapError> {
        if window.name.is_empty() {
            return Err(MemoryMapError::EmptyName);
        }
        if window.stop <= window.start {
            return Err(MemoryMapError::EmptyWindow(window.name));
        }
        if window.ratio == 0 {
            return Err(MemoryMapError::ZeroRatio(window.name));
        }
        for other in &self.windows {
            if other.name == window.name {
                return Err(MemoryMapError::DuplicateName(window.name));
            }
            if other.overlaps(&window) {
                return Err(MemoryMapError::Overlap(window.name, other.name.clone()));
            }
        }
        self.windows.push(window);
        Ok(())
    }

    pub fn windows(&self) -> impl Iterator<Item = &MemoryWindow> {
        self.windows.iter()
    }

    pub fn window(&self, name: &str) -> Option<&MemoryWindow> {
        self.windows.iter().find(|w| w.name == name)
    }

    /// Finds the window an address decodes to, if any.
    pub fn decode(&self, addr: u64) -> Option<&MemoryWindow> {
        self.windows.iter().find(|w| w.contains(addr))
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn from_toml(s: &str) -> Result<Self, Box<dyn Error>> {
        let file: MemoryMapFile = toml::from_str(s)?;
        let mut res = MemoryMap::new();
        for window in file.window {
            res.add_window(window)?;
        }
        Ok(res)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let s = read_to_string(path)?;
        Self::from_toml(&s)
    }
}

impl From<&MemoryWindow> for JsonValue {
    fn from(window: &MemoryWindow) -> Self {
        jzon::object! {
            name: window.name.as_str(),
            start: window.start,
            stop: window.stop,
            ratio: window.ratio,
        }
    }
}

impl From<&MemoryMap> for JsonValue {
    fn from(map: &MemoryMap) -> Self {
        jzon::object! {
            windows: Vec::from_iter(map.windows.iter()),
        }
    }
}

impl std::fmt::Display for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{name}: 0x{start:08x}..0x{stop:08x} RATIO {ratio}",
            name = self.name,
            start = self.start,
            stop = self.stop,
            ratio = self.ratio
        )
    }
}

impl std::fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for window in &self.windows {
            writeln!(f, "\tWINDOW {window}")?;
        }
        let total: u64 = self.windows.iter().map(|w| w.size()).sum();
        writeln!(
            f,
            "\tNAMES: {names}",
            names = self.windows.iter().map(|w| w.name.as_str()).join(", ")
        )?;
        writeln!(f, "\tTOTAL: 0x{total:x}")?;
        Ok(())
    }
}
