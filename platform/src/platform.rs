use std::collections::BTreeMap;

use itertools::Itertools;
use jzon::JsonValue;

use crate::{
    resources::{
        Connector, DiffPairs, PinDir, Pins, Resource, Subsignal, UlpiPins, attrs, uart_resource,
        ulpi_resource,
    },
    units::Frequency,
};

/// DRAM bus I/O (de)skewing constants.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RamTimings {
    pub clock_skew: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Platform {
    pub name: String,
    pub device: String,
    pub package: String,
    pub speed: String,
    pub default_clk: String,
    pub default_rst: String,
    pub default_usb_connection: String,
    pub ram_timings: RamTimings,
    pub resources: Vec<Resource>,
    pub connectors: Vec<Connector>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlatformError {
    UnknownResource(String, u32),
    DuplicateResource(String, u32),
    DuplicateConnector(String, u32),
    UnknownConnector { path: String, conn: String },
    BadConnectorPin { path: String, conn: String, pin: String },
    PinConflict { pin: String, users: Vec<String> },
    EmptyPins { path: String },
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::UnknownResource(name, number) => {
                write!(f, "resource {name}#{number} does not exist")
            }
            PlatformError::DuplicateResource(name, number) => {
                write!(f, "resource {name}#{number} defined twice")
            }
            PlatformError::DuplicateConnector(name, number) => {
                write!(f, "connector {name}_{number} defined twice")
            }
            PlatformError::UnknownConnector { path, conn } => {
                write!(f, "{path}: connector {conn} does not exist")
            }
            PlatformError::BadConnectorPin { path, conn, pin } => {
                write!(f, "{path}: connector {conn} has no usable pin {pin}")
            }
            PlatformError::PinConflict { pin, users } => {
                write!(f, "pin {pin} used by {}", users.iter().join(", "))
            }
            PlatformError::EmptyPins { path } => write!(f, "{path}: empty pin name"),
        }
    }
}

impl std::error::Error for PlatformError {}

const LVCMOS33: (&str, &str) = ("IO_TYPE", "LVCMOS33");

impl Platform {
    /// Tiliqua (ECP5 45F) board.  R2 audio front-end on the FFC, HyperRAM, RP2040 bridge.
    pub fn tiliqua() -> Self {
        let resources = vec![
            // BOOTSEL (shared)
            Resource::new("rst", 0, Pins::new_n("C4", PinDir::Input)).with_attrs(attrs([LVCMOS33])),
            // 48MHz master
            Resource::new("clk48", 0, Pins::new("A8", PinDir::Input))
                .with_clock(Frequency::from_mhz(48))
                .with_attrs(attrs([LVCMOS33])),
            // PROGRAMN, triggers self-reconfiguration
            Resource::new("self_program", 0, Pins::new_n("T13", PinDir::Output))
                .with_attrs(attrs([LVCMOS33, ("PULLMODE", "UP")])),
            Resource::new("led", 0, Pins::new_n("B7", PinDir::Output)).with_attrs(attrs([LVCMOS33])),
            Resource::new("led", 1, Pins::new_n("A3", PinDir::Output)).with_attrs(attrs([LVCMOS33])),
            // RP2040 bridge
            uart_resource(0, "A4", "B4", attrs([LVCMOS33, ("PULLMODE", "UP")])),
            // MIDI
            uart_resource(1, "D5", "B8", attrs([LVCMOS33, ("PULLMODE", "UP")])),
            ulpi_resource(
                "target_phy",
                0,
                UlpiPins {
                    data: "D6 D4 E4 A5 B5 A6 B6 B3",
                    clk: "D7",
                    clk_dir: PinDir::Output,
                    dir: "A2",
                    nxt: "C5",
                    stp: "C6",
                    rst: "C7",
                    rst_invert: true,
                },
                attrs([LVCMOS33]),
            ),
            // FFC connector to the audio board on the back.
            Resource::with_subsignals(
                "audio_ffc",
                0,
                vec![
                    Subsignal::new("sdin1", Pins::new("D8", PinDir::Output)),
                    Subsignal::new("sdout1", Pins::new("C9", PinDir::Input)),
                    Subsignal::new("lrck", Pins::new("C10", PinDir::Output)),
                    Subsignal::new("bick", Pins::new("D9", PinDir::Output)),
                    Subsignal::new("mclk", Pins::new("B11", PinDir::Output)),
                    Subsignal::new("pdn", Pins::new("C11", PinDir::Output)),
                    Subsignal::new("i2c_sda", Pins::new("D13", PinDir::InOut)),
                    Subsignal::new("i2c_scl", Pins::new("C13", PinDir::InOut)),
                ],
            ),
            // SCK goes through USRMCLK, so it has no pin here.
            Resource::with_subsignals(
                "spi_flash",
                0,
                vec![
                    Subsignal::new("sdi", Pins::new("T8", PinDir::Output)),
                    Subsignal::new("sdo", Pins::new("T7", PinDir::Input)),
                    Subsignal::new("cs", Pins::new_n("N8", PinDir::Output)),
                ],
            )
            .with_attrs(attrs([LVCMOS33])),
            // HyperRAM
            Resource::with_subsignals(
                "ram",
                0,
                vec![
                    Subsignal::new("clk", DiffPairs::new("C3", "D3", PinDir::Output))
                        .with_attrs(attrs([("IO_TYPE", "LVCMOS33D")])),
                    Subsignal::new("dq", Pins::new("F2 B1 C2 E1 E3 E2 F3 G4", PinDir::InOut)),
                    Subsignal::new("rwds", Pins::new("D1", PinDir::InOut)),
                    Subsignal::new("cs", Pins::new("B2", PinDir::Output)),
                    Subsignal::new("reset", Pins::new_n("C1", PinDir::Output)),
                ],
            )
            .with_attrs(attrs([LVCMOS33, ("SLEWRATE", "FAST")])),
        ];
        let connectors = vec![
            Connector::new("pmod", 0, "A9 A13 B14 C14 - - B9 B13 A14 D14 - -"),
            Connector::new("pmod", 1, "A10 B15 C15 C16 - - B10 A15 B16 D16 - -"),
        ];
        Platform {
            name: "Tiliqua (45F)".into(),
            device: "LFE5U-45F".into(),
            package: "BG256".into(),
            speed: "7".into(),
            default_clk: "clk48".into(),
            default_rst: "rst".into(),
            default_usb_connection: "ulpi".into(),
            // Max skew to meet IO setup times.
            ram_timings: RamTimings { clock_skew: 127 },
            resources,
            connectors,
        }
    }

    /// Full part name as the vendor toolchain spells it.
    pub fn part(&self) -> String {
        format!("{}-{}{}", self.device, self.speed, self.package)
    }

    pub fn resource(&self, name: &str, number: u32) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.name == name && r.number == number)
    }

    pub fn lookup(&self, name: &str, number: u32) -> Result<&Resource, PlatformError> {
        self.resource(name, number)
            .ok_or_else(|| PlatformError::UnknownResource(name.to_string(), number))
    }

    pub fn default_clock(&self) -> Result<&Resource, PlatformError> {
        self.lookup(&self.default_clk, 0)
    }

    pub fn default_reset(&self) -> Result<&Resource, PlatformError> {
        self.lookup(&self.default_rst, 0)
    }

    pub fn connector(&self, name: &str, number: u32) -> Option<&Connector> {
        self.connectors
            .iter()
            .find(|c| c.name == name && c.number == number)
    }

    pub fn add_resources(&mut self, resources: impl IntoIterator<Item = Resource>) {
        self.resources.extend(resources);
    }

    /// Maps every used package pin to its users, resolving connector-relative pins.
    /// Pins that cannot be resolved are reported as errors.
    pub fn pin_map(&self) -> (BTreeMap<String, Vec<String>>, Vec<PlatformError>) {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut errors = vec![];
        for res in &self.resources {
            for pu in res.pin_uses() {
                let pin = match pu.conn {
                    None => pu.pin.to_string(),
                    Some(conn) => {
                        let Some(connector) = self.connectors.iter().find(|c| c.matches(conn))
                        else {
                            errors.push(PlatformError::UnknownConnector {
                                path: pu.path,
                                conn: conn.to_string(),
                            });
                            continue;
                        };
                        match pu.pin.parse().ok().and_then(|idx| connector.pin(idx)) {
                            Some(pin) => pin.to_string(),
                            None => {
                                errors.push(PlatformError::BadConnectorPin {
                                    path: pu.path,
                                    conn: conn.to_string(),
                                    pin: pu.pin.to_string(),
                                });
                                continue;
                            }
                        }
                    }
                };
                map.entry(pin).or_default().push(pu.path);
            }
        }
        (map, errors)
    }

    /// Checks that resources and connectors are unique, every I/O names at least one
    /// non-empty pin, and every package pin is used once.
    pub fn check(&self) -> Vec<PlatformError> {
        let mut errors = vec![];
        for (i, res) in self.resources.iter().enumerate() {
            if self.resources[..i]
                .iter()
                .any(|r| r.name == res.name && r.number == res.number)
            {
                errors.push(PlatformError::DuplicateResource(
                    res.name.clone(),
                    res.number,
                ));
            }
        }
        for (i, conn) in self.connectors.iter().enumerate() {
            if self.connectors[..i]
                .iter()
                .any(|c| c.name == conn.name && c.number == conn.number)
            {
                errors.push(PlatformError::DuplicateConnector(
                    conn.name.clone(),
                    conn.number,
                ));
            }
        }
        for res in &self.resources {
            for (path, io) in res.ios() {
                let names = io.names();
                if names.is_empty() || names.iter().any(|name| name.is_empty()) {
                    errors.push(PlatformError::EmptyPins { path });
                }
            }
        }
        let (map, pin_errors) = self.pin_map();
        errors.extend(pin_errors);
        for (pin, users) in map {
            if users.len() > 1 {
                errors.push(PlatformError::PinConflict { pin, users });
            }
        }
        errors
    }
}

/// A DVI output on a PMOD, as used by the video demos.
pub fn gpdi_resource(pmod: u32) -> Resource {
    let pin = |n: &str| Pins::new(n, PinDir::Output).on_connector("pmod", pmod);
    Resource::with_subsignals(
        &format!("gpdi{pmod}"),
        pmod,
        vec![
            Subsignal::new("data2_p", pin("1")),
            Subsignal::new("data1_p", pin("2")),
            Subsignal::new("data0_p", pin("3")),
            Subsignal::new("clk_p", pin("4")),
            Subsignal::new("data2_n", pin("7")),
            Subsignal::new("data1_n", pin("8")),
            Subsignal::new("data0_n", pin("9")),
            Subsignal::new("clk_n", pin("10")),
        ],
    )
    .with_attrs(attrs([LVCMOS33]))
}

fn pad_sort_key(name: &str) -> (usize, &str, u32) {
    if let Some(pos) = name.find(|x: char| x.is_ascii_digit()) {
        (pos, &name[..pos], name[pos..].parse().unwrap_or(0))
    } else {
        (name.len(), name, 0)
    }
}

/// Pin-by-pin listing of a platform, in package ball order.
pub struct PinListing<'a>(pub &'a Platform);

impl std::fmt::Display for PinListing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (map, _) = self.0.pin_map();
        for (pin, users) in map.iter().sorted_by_key(|(k, _)| pad_sort_key(k)) {
            writeln!(f, "\t{pin:4}: {users}", users = users.iter().join(" + "))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\tNAME: {}", self.name)?;
        writeln!(f, "\tPART: {}", self.part())?;
        writeln!(
            f,
            "\tDEFAULTS: CLK {clk} RST {rst} USB {usb}",
            clk = self.default_clk,
            rst = self.default_rst,
            usb = self.default_usb_connection
        )?;
        writeln!(f, "\tRAM CLOCK SKEW: {}", self.ram_timings.clock_skew)?;
        Ok(())
    }
}

impl From<&Platform> for JsonValue {
    fn from(platform: &Platform) -> Self {
        jzon::object! {
            name: platform.name.as_str(),
            device: platform.device.as_str(),
            package: platform.package.as_str(),
            speed: platform.speed.as_str(),
            default_clk: platform.default_clk.as_str(),
            default_rst: platform.default_rst.as_str(),
            default_usb_connection: platform.default_usb_connection.as_str(),
            ram_timings: jzon::object! {
                clock_skew: platform.ram_timings.clock_skew,
            },
            resources: Vec::from_iter(platform.resources.iter()),
            connectors: Vec::from_iter(platform.connectors.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::resources::ResourceBody;

    use super::*;

    #[test]
    fn tiliqua_is_consistent() {
        let platform = Platform::tiliqua();
        let errors = platform.check();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(platform.part(), "LFE5U-45F-7BG256");
        let clk = platform.default_clock().unwrap();
        assert_eq!(clk.clock, Some(Frequency::from_mhz(48)));
        let rst = platform.default_reset().unwrap();
        assert_eq!(rst.pin_uses()[0].pin, "C4");
        assert!(rst.pin_uses()[0].invert);
    }

    #[test]
    fn tiliqua_resources() {
        let platform = Platform::tiliqua();
        assert_eq!(platform.resources.len(), 11);
        let phy = platform.resource("target_phy", 0).unwrap();
        let data = phy.subsignal("data").unwrap();
        assert_eq!(data.io.names().len(), 8);
        assert_eq!(data.io.dir(), PinDir::InOut);
        assert!(phy.subsignal("rst").unwrap().io.invert());
        assert_eq!(phy.subsignal("clk").unwrap().io.dir(), PinDir::Output);

        let ram = platform.resource("ram", 0).unwrap();
        assert_eq!(
            ram.effective_attrs(Some("clk"))["IO_TYPE"],
            "LVCMOS33D"
        );
        assert_eq!(ram.effective_attrs(Some("dq"))["SLEWRATE"], "FAST");

        let ffc = platform.resource("audio_ffc", 0).unwrap();
        assert!(ffc.attrs.is_empty());
        let ResourceBody::Subsignals(ref subs) = ffc.body else {
            unreachable!()
        };
        assert_eq!(subs.len(), 8);

        assert!(platform.resource("led", 1).is_some());
        assert!(platform.resource("led", 2).is_none());
        assert_eq!(
            platform.lookup("button_b", 0).unwrap_err().to_string(),
            "resource button_b#0 does not exist"
        );
    }

    #[test]
    fn pin_conflicts() {
        let mut platform = Platform::tiliqua();
        platform.add_resources([
            Resource::new("button_b", 0, Pins::new_n("C4", PinDir::Input)),
            Resource::new("led", 0, Pins::new("E5", PinDir::Output)),
        ]);
        let errors = platform.check();
        assert_eq!(
            errors,
            [
                PlatformError::DuplicateResource("led".into(), 0),
                PlatformError::PinConflict {
                    pin: "C4".into(),
                    users: vec!["rst_0".into(), "button_b_0".into()],
                },
            ]
        );
        assert_eq!(errors[1].to_string(), "pin C4 used by rst_0, button_b_0");
    }

    #[test]
    fn empty_pins() {
        let mut platform = Platform::tiliqua();
        let mut blank = Pins::new("E5", PinDir::Output);
        blank.names.push(String::new());
        platform.add_resources([
            Resource::new("ghost", 0, Pins::new("", PinDir::Output)),
            Resource::with_subsignals(
                "spi",
                0,
                vec![
                    Subsignal::new("clk", Pins::new("E6", PinDir::Output)),
                    Subsignal::new("copi", blank),
                    Subsignal::new("cipo", Pins::new(" ", PinDir::Input)),
                ],
            ),
        ]);
        let errors = platform.check();
        assert_eq!(
            errors,
            [
                PlatformError::EmptyPins {
                    path: "ghost_0".into()
                },
                PlatformError::EmptyPins {
                    path: "spi_0.copi".into()
                },
                PlatformError::EmptyPins {
                    path: "spi_0.cipo".into()
                },
            ]
        );
        assert_eq!(errors[0].to_string(), "ghost_0: empty pin name");
    }

    #[test]
    fn connector_resources() {
        let mut platform = Platform::tiliqua();
        platform.add_resources([gpdi_resource(0)]);
        assert!(platform.check().is_empty());
        let (map, _) = platform.pin_map();
        assert_eq!(map["A9"], ["gpdi0_0.data2_p"]);
        assert_eq!(map["D14"], ["gpdi0_0.clk_n"]);

        platform.add_resources([
            Resource::new("gpio", 0, Pins::new("5", PinDir::InOut).on_connector("pmod", 1)),
            Resource::new("gpio", 1, Pins::new("1", PinDir::InOut).on_connector("pmod", 2)),
        ]);
        assert_eq!(
            platform.check(),
            [
                PlatformError::BadConnectorPin {
                    path: "gpio_0".into(),
                    conn: "pmod_1".into(),
                    pin: "5".into(),
                },
                PlatformError::UnknownConnector {
                    path: "gpio_1".into(),
                    conn: "pmod_2".into(),
                },
            ]
        );
    }

    #[test]
    fn listing() {
        let platform = Platform::tiliqua();
        let listing = PinListing(&platform).to_string();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 46);
        assert_eq!(lines[0], "\tA2  : target_phy_0.dir");
        assert!(lines.contains(&"\tA8  : clk48_0"));
        assert!(lines.contains(&"\tB11 : audio_ffc_0.mclk"));
        let a_pins: Vec<_> = lines
            .iter()
            .take_while(|l| l.starts_with("\tA"))
            .map(|l| l[1..].split_whitespace().next().unwrap())
            .collect();
        assert_eq!(a_pins, ["A2", "A3", "A4", "A5", "A6", "A8"]);
    }

    #[test]
    fn json() {
        let platform = Platform::tiliqua();
        let json = JsonValue::from(&platform);
        assert_eq!(json["device"], "LFE5U-45F");
        assert_eq!(json["ram_timings"]["clock_skew"], 127);
        assert_eq!(json["resources"].len(), 11);
        assert_eq!(json["resources"][1]["clock"], 48_000_000u64);
        assert_eq!(json["resources"][10]["subsignals"]["clk"]["kind"], "diff_pairs");
        assert_eq!(json["connectors"][0]["pins"][4], JsonValue::Null);
    }
}
