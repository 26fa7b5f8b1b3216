//! Generates Rust support files for Tiliqua SoC designs.
//!
//! Currently this is the `memory.x` linker fragment consumed by `riscv-rt`:
//! one `MEMORY` region per RAM/ROM window of the SoC, followed by the
//! `REGION_ALIAS` set that places every output section into a single RAM.

use std::{
    collections::BTreeSet,
    fs,
    io::{self, Write},
    path::Path,
};

use tiliqua_memmap::{MemoryMap, MemoryWindow};

mod clock;

pub use clock::{Clock, FixedClock, SystemClock, Timestamp, TimestampError};

/// Windows that become `MEMORY` regions; everything else is peripheral space.
pub const MEMORY_REGIONS: [&str; 4] = ["bootrom", "scratchpad", "mainram", "hyperram"];

/// Region aliases emitted, in order.
pub const REGION_ALIASES: [&str; 6] = [
    "REGION_TEXT",
    "REGION_RODATA",
    "REGION_DATA",
    "REGION_BSS",
    "REGION_HEAP",
    "REGION_STACK",
];

pub const PREFERRED_RAM: &str = "mainram";
pub const FALLBACK_RAM: &str = "scratchpad";

pub fn is_memory_region(name: &str) -> bool {
    MEMORY_REGIONS.contains(&name)
}

fn resolve_ram(regions: &BTreeSet<&str>) -> &'static str {
    if regions.contains(PREFERRED_RAM) {
        PREFERRED_RAM
    } else {
        FALLBACK_RAM
    }
}

pub struct GenRust<'a> {
    map: &'a MemoryMap,
    strict: bool,
}

impl<'a> GenRust<'a> {
    pub fn new(map: &'a MemoryMap) -> Self {
        GenRust { map, strict: false }
    }

    /// In strict mode, a map without any RAM the aliases could point at is an
    /// error instead of producing aliases to a missing `scratchpad` region.
    pub fn strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }

    /// The windows that will become `MEMORY` regions, in map order.
    pub fn regions(&self) -> impl Iterator<Item = &'a MemoryWindow> + use<'a> {
        self.map.windows().filter(|w| is_memory_region(&w.name))
    }

    /// The region every `REGION_*` alias points at.
    pub fn ram_region(&self) -> &'static str {
        resolve_ram(&self.regions().map(|w| w.name.as_str()).collect())
    }

    fn check_ram(&self) -> io::Result<()> {
        if self
            .regions()
            .any(|w| w.name == PREFERRED_RAM || w.name == FALLBACK_RAM)
        {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("memory map has neither {PREFERRED_RAM} nor {FALLBACK_RAM}"),
        ))
    }

    /// Writes a `memory.x` for the memory map to `file`.
    pub fn generate_memory_x(&self, file: &mut dyn Write, clock: &dyn Clock) -> io::Result<()> {
        if self.strict {
            self.check_ram()?;
        }

        // warning header
        writeln!(file, "/*")?;
        writeln!(
            file,
            " * Automatically generated by tiliqua-genrust; edits will be discarded on rebuild."
        )?;
        writeln!(
            file,
            " * (Most header files phrase this 'Do not edit.'; be warned accordingly.)"
        )?;
        writeln!(file, " *")?;
        writeln!(file, " * Generated: {now}.", now = clock.now())?;
        writeln!(file, " */")?;
        writeln!(file)?;

        let mut regions = BTreeSet::new();
        writeln!(file, "MEMORY {{")?;
        for window in self.map.windows() {
            if !is_memory_region(&window.name) {
                log::debug!("skipping non-memory resource: {}", window.name);
                continue;
            }
            writeln!(
                file,
                "    {name} : ORIGIN = 0x{start:08x}, LENGTH = 0x{len:08x}",
                name = window.name,
                start = window.start,
                len = window.size()
            )?;
            regions.insert(window.name.as_str());
        }
        writeln!(file, "}}")?;
        writeln!(file)?;

        let ram = resolve_ram(&regions);
        for alias in REGION_ALIASES {
            writeln!(file, "REGION_ALIAS(\"{alias}\", {ram});")?;
        }
        Ok(())
    }

    pub fn memory_x_string(&self, clock: &dyn Clock) -> io::Result<String> {
        let mut buf = Vec::new();
        self.generate_memory_x(&mut buf, clock)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Writes a `memory.x` file.  The file is left untouched if generation fails.
    pub fn write_memory_x<P: AsRef<Path>>(&self, path: P, clock: &dyn Clock) -> io::Result<()> {
        let mut buf = Vec::new();
        self.generate_memory_x(&mut buf, clock)?;
        fs::write(path, buf)
    }
}
