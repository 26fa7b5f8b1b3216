use std::collections::BTreeMap;

use itertools::Itertools;
use jzon::JsonValue;

use crate::units::Frequency;

pub type Attrs = BTreeMap<String, String>;

pub fn attrs<const N: usize>(items: [(&str, &str); N]) -> Attrs {
    items
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PinDir {
    Input,
    Output,
    InOut,
    /// Raw access, direction left to the requester.
    Raw,
}

impl std::fmt::Display for PinDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinDir::Input => write!(f, "i"),
            PinDir::Output => write!(f, "o"),
            PinDir::InOut => write!(f, "io"),
            PinDir::Raw => write!(f, "-"),
        }
    }
}

/// A reference to pins of a connector, by connector name and number.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConnectorRef {
    pub name: String,
    pub number: u32,
}

impl std::fmt::Display for ConnectorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.name, self.number)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Pins {
    /// Package ball names, or 1-based connector pin numbers when `conn` is set.
    pub names: Vec<String>,
    pub dir: PinDir,
    pub invert: bool,
    pub conn: Option<ConnectorRef>,
}

impl Pins {
    pub fn new(names: &str, dir: PinDir) -> Self {
        Pins {
            names: names.split_whitespace().map(String::from).collect(),
            dir,
            invert: false,
            conn: None,
        }
    }

    /// Active-low pins.
    pub fn new_n(names: &str, dir: PinDir) -> Self {
        Self::new(names, dir).inverted()
    }

    pub fn inverted(self) -> Self {
        Self {
            invert: true,
            ..self
        }
    }

    pub fn on_connector(self, name: &str, number: u32) -> Self {
        Self {
            conn: Some(ConnectorRef {
                name: name.to_string(),
                number,
            }),
            ..self
        }
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }
}

impl std::fmt::Display for Pins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PINS")?;
        if self.invert {
            write!(f, "N")?;
        }
        write!(f, " {}", self.names.iter().join(" "))?;
        if let Some(ref conn) = self.conn {
            write!(f, " ON {conn}")?;
        }
        write!(f, " {dir}", dir = self.dir)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiffPairs {
    pub p: Vec<String>,
    pub n: Vec<String>,
    pub dir: PinDir,
    pub invert: bool,
}

impl DiffPairs {
    /// # Panics
    ///
    /// Panics if `p` and `n` list a different number of pins.
    pub fn new(p: &str, n: &str, dir: PinDir) -> Self {
        let p: Vec<_> = p.split_whitespace().map(String::from).collect();
        let n: Vec<_> = n.split_whitespace().map(String::from).collect();
        assert_eq!(p.len(), n.len(), "diff pair width mismatch");
        DiffPairs {
            p,
            n,
            dir,
            invert: false,
        }
    }
}

impl std::fmt::Display for DiffPairs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DIFF")?;
        if self.invert {
            write!(f, "N")?;
        }
        for (p, n) in self.p.iter().zip(&self.n) {
            write!(f, " {p}/{n}")?;
        }
        write!(f, " {dir}", dir = self.dir)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Io {
    Pins(Pins),
    DiffPairs(DiffPairs),
}

impl Io {
    pub fn dir(&self) -> PinDir {
        match self {
            Io::Pins(pins) => pins.dir,
            Io::DiffPairs(pairs) => pairs.dir,
        }
    }

    pub fn invert(&self) -> bool {
        match self {
            Io::Pins(pins) => pins.invert,
            Io::DiffPairs(pairs) => pairs.invert,
        }
    }

    pub fn conn(&self) -> Option<&ConnectorRef> {
        match self {
            Io::Pins(pins) => pins.conn.as_ref(),
            Io::DiffPairs(_) => None,
        }
    }

    /// Pin names as written, `p` before `n` for differential pairs.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Io::Pins(pins) => pins.names.iter().map(|x| x.as_str()).collect(),
            Io::DiffPairs(pairs) => pairs
                .p
                .iter()
                .chain(&pairs.n)
                .map(|x| x.as_str())
                .collect(),
        }
    }
}

impl From<Pins> for Io {
    fn from(value: Pins) -> Self {
        Io::Pins(value)
    }
}

impl From<DiffPairs> for Io {
    fn from(value: DiffPairs) -> Self {
        Io::DiffPairs(value)
    }
}

impl std::fmt::Display for Io {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Io::Pins(pins) => write!(f, "{pins}"),
            Io::DiffPairs(pairs) => write!(f, "{pairs}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Subsignal {
    pub name: String,
    pub io: Io,
    pub attrs: Attrs,
}

impl Subsignal {
    pub fn new(name: &str, io: impl Into<Io>) -> Self {
        Subsignal {
            name: name.to_string(),
            io: io.into(),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Self { attrs, ..self }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceBody {
    Io(Io),
    Subsignals(Vec<Subsignal>),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Resource {
    pub name: String,
    pub number: u32,
    pub body: ResourceBody,
    /// Clock constraint, for clock inputs.
    pub clock: Option<Frequency>,
    pub attrs: Attrs,
}

/// One physical use of a pin by a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinUse<'a> {
    /// `name_number` or `name_number.subsignal`.
    pub path: String,
    pub pin: &'a str,
    pub conn: Option<&'a ConnectorRef>,
    pub dir: PinDir,
    pub invert: bool,
}

impl Resource {
    pub fn new(name: &str, number: u32, io: impl Into<Io>) -> Self {
        Resource {
            name: name.to_string(),
            number,
            body: ResourceBody::Io(io.into()),
            clock: None,
            attrs: Attrs::new(),
        }
    }

    pub fn with_subsignals(name: &str, number: u32, subsignals: Vec<Subsignal>) -> Self {
        Resource {
            name: name.to_string(),
            number,
            body: ResourceBody::Subsignals(subsignals),
            clock: None,
            attrs: Attrs::new(),
        }
    }

    pub fn with_clock(self, clock: Frequency) -> Self {
        Self {
            clock: Some(clock),
            ..self
        }
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Self { attrs, ..self }
    }

    pub fn subsignal(&self, name: &str) -> Option<&Subsignal> {
        match self.body {
            ResourceBody::Io(_) => None,
            ResourceBody::Subsignals(ref subsignals) => {
                subsignals.iter().find(|s| s.name == name)
            }
        }
    }

    /// Attributes in effect for a subsignal: the resource's, overridden by the subsignal's.
    pub fn effective_attrs(&self, subsignal: Option<&str>) -> Attrs {
        let mut res = self.attrs.clone();
        if let Some(sub) = subsignal.and_then(|name| self.subsignal(name)) {
            res.extend(sub.attrs.clone());
        }
        res
    }

    /// Every I/O of the resource with its `name_number[.subsignal]` path.
    pub fn ios(&self) -> Vec<(String, &Io)> {
        match self.body {
            ResourceBody::Io(ref io) => vec![(format!("{}_{}", self.name, self.number), io)],
            ResourceBody::Subsignals(ref subsignals) => subsignals
                .iter()
                .map(|sub| {
                    (
                        format!("{}_{}.{}", self.name, self.number, sub.name),
                        &sub.io,
                    )
                })
                .collect(),
        }
    }

    pub fn pin_uses(&self) -> Vec<PinUse<'_>> {
        let mut res = vec![];
        match self.body {
            ResourceBody::Io(ref io) => {
                let path = format!("{}_{}", self.name, self.number);
                for pin in io.names() {
                    res.push(PinUse {
                        path: path.clone(),
                        pin,
                        conn: io.conn(),
                        dir: io.dir(),
                        invert: io.invert(),
                    });
                }
            }
            ResourceBody::Subsignals(ref subsignals) => {
                for sub in subsignals {
                    let path = format!("{}_{}.{}", self.name, self.number, sub.name);
                    for pin in sub.io.names() {
                        res.push(PinUse {
                            path: path.clone(),
                            pin,
                            conn: sub.io.conn(),
                            dir: sub.io.dir(),
                            invert: sub.io.invert(),
                        });
                    }
                }
            }
        }
        res
    }
}

fn fmt_attrs(attrs: &Attrs) -> String {
    if attrs.is_empty() {
        String::new()
    } else {
        format!(
            " [{}]",
            attrs.iter().map(|(k, v)| format!("{k}={v}")).join(", ")
        )
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\t{name} {number}:", name = self.name, number = self.number)?;
        if let Some(clock) = self.clock {
            write!(f, " CLOCK {clock}")?;
        }
        match self.body {
            ResourceBody::Io(ref io) => {
                writeln!(f, " {io}{attrs}", attrs = fmt_attrs(&self.attrs))?;
            }
            ResourceBody::Subsignals(ref subsignals) => {
                writeln!(f, "{attrs}", attrs = fmt_attrs(&self.attrs))?;
                for sub in subsignals {
                    writeln!(
                        f,
                        "\t\t{name}: {io}{attrs}",
                        name = sub.name,
                        io = sub.io,
                        attrs = fmt_attrs(&sub.attrs)
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn attrs_json(attrs: &Attrs) -> JsonValue {
    jzon::object::Object::from_iter(attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))).into()
}

impl From<&Io> for JsonValue {
    fn from(io: &Io) -> Self {
        match io {
            Io::Pins(pins) => {
                let conn = pins
                    .conn
                    .as_ref()
                    .map_or(JsonValue::Null, |conn| {
                        jzon::array![conn.name.as_str(), conn.number]
                    });
                jzon::object! {
                    kind: "pins",
                    pins: Vec::from_iter(pins.names.iter().map(|x| x.as_str())),
                    dir: pins.dir.to_string(),
                    invert: pins.invert,
                    conn: conn,
                }
            }
            Io::DiffPairs(pairs) => jzon::object! {
                kind: "diff_pairs",
                p: Vec::from_iter(pairs.p.iter().map(|x| x.as_str())),
                n: Vec::from_iter(pairs.n.iter().map(|x| x.as_str())),
                dir: pairs.dir.to_string(),
                invert: pairs.invert,
            },
        }
    }
}

impl From<&Resource> for JsonValue {
    fn from(res: &Resource) -> Self {
        let clock = res.clock.map_or(JsonValue::Null, JsonValue::from);
        let mut obj = jzon::object! {
            name: res.name.as_str(),
            number: res.number,
            attrs: attrs_json(&res.attrs),
            clock: clock,
        };
        match res.body {
            ResourceBody::Io(ref io) => {
                obj["io"] = io.into();
            }
            ResourceBody::Subsignals(ref subsignals) => {
                obj["subsignals"] = jzon::object::Object::from_iter(subsignals.iter().map(|sub| {
                    let mut io = JsonValue::from(&sub.io);
                    io["attrs"] = attrs_json(&sub.attrs);
                    (sub.name.as_str(), io)
                }))
                .into();
            }
        }
        obj
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Connector {
    pub name: String,
    pub number: u32,
    /// Physical pins in connector order; `None` for `-` (not connected).
    pub pins: Vec<Option<String>>,
}

impl Connector {
    pub fn new(name: &str, number: u32, pins: &str) -> Self {
        Connector {
            name: name.to_string(),
            number,
            pins: pins
                .split_whitespace()
                .map(|p| if p == "-" { None } else { Some(p.to_string()) })
                .collect(),
        }
    }

    /// Looks up a 1-based connector pin.
    pub fn pin(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.pins.get(index - 1)?.as_deref()
    }

    pub fn matches(&self, conn: &ConnectorRef) -> bool {
        self.name == conn.name && self.number == conn.number
    }
}

impl std::fmt::Display for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\t{name} {number}:", name = self.name, number = self.number)?;
        for pin in &self.pins {
            write!(f, " {}", pin.as_deref().unwrap_or("-"))?;
        }
        writeln!(f)
    }
}

impl From<&Connector> for JsonValue {
    fn from(conn: &Connector) -> Self {
        jzon::object! {
            name: conn.name.as_str(),
            number: conn.number,
            pins: Vec::from_iter(conn.pins.iter().map(|p| p.as_deref().map_or(JsonValue::Null, JsonValue::from))),
        }
    }
}

/// Pin assignments of a generic UART: `rx` input, `tx` output.
pub fn uart_resource(number: u32, rx: &str, tx: &str, attrs: Attrs) -> Resource {
    Resource::with_subsignals(
        "uart",
        number,
        vec![
            Subsignal::new("rx", Pins::new(rx, PinDir::Input)),
            Subsignal::new("tx", Pins::new(tx, PinDir::Output)),
        ],
    )
    .with_attrs(attrs)
}

/// Pin assignments of a ULPI USB PHY.
#[derive(Clone, Debug)]
pub struct UlpiPins<'a> {
    pub data: &'a str,
    pub clk: &'a str,
    /// Direction of the clock pin: input when the PHY drives it, output otherwise.
    pub clk_dir: PinDir,
    pub dir: &'a str,
    pub nxt: &'a str,
    pub stp: &'a str,
    pub rst: &'a str,
    pub rst_invert: bool,
}

pub fn ulpi_resource(name: &str, number: u32, pins: UlpiPins<'_>, attrs: Attrs) -> Resource {
    let mut rst = Pins::new(pins.rst, PinDir::Output);
    if pins.rst_invert {
        rst = rst.inverted();
    }
    Resource::with_subsignals(
        name,
        number,
        vec![
            Subsignal::new("data", Pins::new(pins.data, PinDir::InOut)),
            Subsignal::new("clk", Pins::new(pins.clk, pins.clk_dir)),
            Subsignal::new("dir", Pins::new(pins.dir, PinDir::Input)),
            Subsignal::new("nxt", Pins::new(pins.nxt, PinDir::Input)),
            Subsignal::new("stp", Pins::new(pins.stp, PinDir::Output)),
            Subsignal::new("rst", rst),
        ],
    )
    .with_attrs(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins() {
        let pins = Pins::new_n("C4", PinDir::Input);
        assert_eq!(pins.names, ["C4"]);
        assert!(pins.invert);
        assert_eq!(pins.to_string(), "PINSN C4 i");
        let pins = Pins::new("1 2 3", PinDir::Output).on_connector("pmod", 0);
        assert_eq!(pins.width(), 3);
        assert_eq!(pins.to_string(), "PINS 1 2 3 ON pmod_0 o");
    }

    #[test]
    fn connector_pins() {
        let conn = Connector::new("pmod", 0, "A9 A13 B14 C14 - - B9 B13 A14 D14 - -");
        assert_eq!(conn.pins.len(), 12);
        assert_eq!(conn.pin(0), None);
        assert_eq!(conn.pin(1), Some("A9"));
        assert_eq!(conn.pin(5), None);
        assert_eq!(conn.pin(10), Some("D14"));
        assert_eq!(conn.pin(13), None);
        assert_eq!(
            conn.to_string(),
            "\tpmod 0: A9 A13 B14 C14 - - B9 B13 A14 D14 - -\n"
        );
    }

    #[test]
    fn uart() {
        let res = uart_resource(1, "D5", "B8", attrs([("IO_TYPE", "LVCMOS33")]));
        let uses = res.pin_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].path, "uart_1.rx");
        assert_eq!(uses[0].pin, "D5");
        assert_eq!(uses[0].dir, PinDir::Input);
        assert_eq!(uses[1].path, "uart_1.tx");
        assert_eq!(uses[1].dir, PinDir::Output);
        assert_eq!(
            res.to_string(),
            "\tuart 1: [IO_TYPE=LVCMOS33]\n\
             \t\trx: PINS D5 i\n\
             \t\ttx: PINS B8 o\n"
        );
    }

    #[test]
    fn subsignal_attrs_override() {
        let res = Resource::with_subsignals(
            "ram",
            0,
            vec![
                Subsignal::new("clk", DiffPairs::new("C3", "D3", PinDir::Output))
                    .with_attrs(attrs([("IO_TYPE", "LVCMOS33D")])),
                Subsignal::new("cs", Pins::new("B2", PinDir::Output)),
            ],
        )
        .with_attrs(attrs([("IO_TYPE", "LVCMOS33"), ("SLEWRATE", "FAST")]));
        assert_eq!(
            res.effective_attrs(Some("clk")),
            attrs([("IO_TYPE", "LVCMOS33D"), ("SLEWRATE", "FAST")])
        );
        assert_eq!(res.effective_attrs(Some("cs")), res.attrs);
        let pins: Vec<_> = res.pin_uses().into_iter().map(|u| u.pin).collect();
        assert_eq!(pins, ["C3", "D3", "B2"]);
    }

    #[test]
    fn resource_ios() {
        let res = uart_resource(0, "A4", "B4", Attrs::new());
        let paths: Vec<_> = res.ios().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, ["uart_0.rx", "uart_0.tx"]);
        let res = Resource::new("led", 1, Pins::new("A3", PinDir::Output));
        let ios = res.ios();
        assert_eq!(ios.len(), 1);
        assert_eq!(ios[0].0, "led_1");
        assert_eq!(ios[0].1.names(), ["A3"]);
    }

    #[test]
    fn json() {
        let res = Resource::new("clk48", 0, Pins::new("A8", PinDir::Input))
            .with_clock(Frequency::from_mhz(48));
        let json = JsonValue::from(&res);
        assert_eq!(json["name"], "clk48");
        assert_eq!(json["clock"], 48_000_000u64);
        assert_eq!(json["io"]["pins"][0], "A8");
        assert_eq!(json["io"]["dir"], "i");
    }
}
