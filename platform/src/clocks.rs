//! The clock and reset network of a Tiliqua design.
//!
//! The network is kept as plain data: vendor primitive instances with their
//! parameters, port connections and synthesis attributes, plus the clock
//! domains they drive.  Nominal domain frequencies are derived from the
//! constraints declared on the pads and the `FREQUENCY_PIN_*` attributes;
//! nothing here synthesizes PLL settings.

use indexmap::IndexMap;
use itertools::Itertools;
use jzon::JsonValue;

use crate::{
    platform::{Platform, PlatformError},
    units::{Decimal, Frequency},
};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Net {
    /// The single-ended input of a platform resource (number 0).
    Pad(String),
    Signal(String),
    SignalBit(String, u32),
    Inverted(Box<Net>),
    /// The clock of a domain.
    Clock(String),
    Const(u64),
}

impl Net {
    pub fn signal(name: &str) -> Self {
        Net::Signal(name.to_string())
    }

    pub fn clock(domain: &str) -> Self {
        Net::Clock(domain.to_string())
    }

    pub fn inverted(self) -> Self {
        Net::Inverted(Box::new(self))
    }
}

impl std::fmt::Display for Net {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Net::Pad(res) => write!(f, "pad({res})"),
            Net::Signal(name) => write!(f, "{name}"),
            Net::SignalBit(name, bit) => write!(f, "{name}[{bit}]"),
            Net::Inverted(net) => write!(f, "~{net}"),
            Net::Clock(domain) => write!(f, "clk({domain})"),
            Net::Const(val) => write!(f, "{val}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Param {
    Str(String),
    Int(i64),
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Str(s) => write!(f, "\"{s}\""),
            Param::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&Param> for JsonValue {
    fn from(value: &Param) -> Self {
        match value {
            Param::Str(s) => s.as_str().into(),
            Param::Int(i) => (*i).into(),
        }
    }
}

/// A vendor primitive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    pub name: String,
    pub primitive: String,
    pub params: IndexMap<String, Param>,
    pub inputs: IndexMap<String, Net>,
    pub outputs: IndexMap<String, Net>,
    pub attrs: IndexMap<String, String>,
}

impl Instance {
    pub fn new(name: &str, primitive: &str) -> Self {
        Instance {
            name: name.to_string(),
            primitive: primitive.to_string(),
            params: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            attrs: IndexMap::new(),
        }
    }

    pub fn param(mut self, name: &str, val: &str) -> Self {
        self.params
            .insert(name.to_string(), Param::Str(val.to_string()));
        self
    }

    pub fn param_int(mut self, name: &str, val: i64) -> Self {
        self.params.insert(name.to_string(), Param::Int(val));
        self
    }

    pub fn input(mut self, port: &str, net: Net) -> Self {
        self.inputs.insert(port.to_string(), net);
        self
    }

    pub fn output(mut self, port: &str, net: Net) -> Self {
        self.outputs.insert(port.to_string(), net);
        self
    }

    pub fn attr(mut self, name: &str, val: &str) -> Self {
        self.attrs.insert(name.to_string(), val.to_string());
        self
    }

    pub fn is_pll(&self) -> bool {
        self.primitive == "EHXPLLL"
    }

    pub fn is_divider(&self) -> bool {
        self.primitive == "CLKDIVF"
    }
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\tINSTANCE {name}: {prim}", name = self.name, prim = self.primitive)?;
        for (k, v) in &self.params {
            writeln!(f, "\t\tPARAM {k} = {v}")?;
        }
        for (k, v) in &self.inputs {
            writeln!(f, "\t\tIN {k} = {v}")?;
        }
        for (k, v) in &self.outputs {
            writeln!(f, "\t\tOUT {k} = {v}")?;
        }
        for (k, v) in &self.attrs {
            writeln!(f, "\t\tATTR {k} = {v}")?;
        }
        Ok(())
    }
}

impl From<&Instance> for JsonValue {
    fn from(inst: &Instance) -> Self {
        jzon::object! {
            name: inst.name.as_str(),
            primitive: inst.primitive.as_str(),
            params: jzon::object::Object::from_iter(inst.params.iter().map(|(k, v)| (k.as_str(), JsonValue::from(v)))),
            inputs: jzon::object::Object::from_iter(inst.inputs.iter().map(|(k, v)| (k.as_str(), v.to_string()))),
            outputs: jzon::object::Object::from_iter(inst.outputs.iter().map(|(k, v)| (k.as_str(), v.to_string()))),
            attrs: jzon::object::Object::from_iter(inst.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        }
    }
}

/// A register exposed to the rest of the design for runtime control of the network.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ControlSignal {
    pub name: String,
    pub width: u32,
    pub reset: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ClockSource {
    /// Straight from a platform clock resource.
    Pad(String),
    Instance { instance: String, port: String },
    /// Same clock as another domain.
    Domain(String),
}

impl std::fmt::Display for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockSource::Pad(res) => write!(f, "PAD {res}"),
            ClockSource::Instance { instance, port } => write!(f, "{instance}.{port}"),
            ClockSource::Domain(domain) => write!(f, "DOMAIN {domain}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClockDomain {
    pub name: String,
    pub clock: ClockSource,
    pub reset: Option<Net>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClockError {
    UnknownDomain(String),
    DuplicateDomain(String),
    UnknownInstance { domain: String, instance: String },
    UnknownPort { instance: String, port: String },
    UnknownResource(String),
    UnknownNet { instance: String, port: String, net: String },
    NotAClock { domain: String, instance: String },
    NotDriven { domain: String, instance: String, port: String, net: String },
    NoFrequency(String),
    BadDivider(String),
    Cycle(Vec<String>),
    BadReset(String),
}

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockError::UnknownDomain(domain) => write!(f, "domain {domain} does not exist"),
            ClockError::DuplicateDomain(domain) => write!(f, "domain {domain} defined twice"),
            ClockError::UnknownInstance { domain, instance } => {
                write!(f, "domain {domain}: instance {instance} does not exist")
            }
            ClockError::UnknownPort { instance, port } => {
                write!(f, "instance {instance} has no output {port}")
            }
            ClockError::UnknownResource(res) => write!(f, "resource {res} does not exist"),
            ClockError::UnknownNet {
                instance,
                port,
                net,
            } => write!(f, "instance {instance} port {port}: unknown net {net}"),
            ClockError::NotDriven {
                domain,
                instance,
                port,
                net,
            } => write!(
                f,
                "domain {domain}: {instance}.{port} drives {net}, not the domain clock"
            ),
            ClockError::NotAClock { domain, instance } => {
                write!(f, "domain {domain}: instance {instance} is not a clock generator")
            }
            ClockError::NoFrequency(domain) => {
                write!(f, "domain {domain}: no frequency declared")
            }
            ClockError::BadDivider(instance) => write!(f, "instance {instance}: bad DIV"),
            ClockError::Cycle(path) => {
                write!(f, "clock domain cycle: {}", path.iter().join(" -> "))
            }
            ClockError::BadReset(domain) => {
                write!(f, "domain {domain}: reset is not driven by a PLL lock")
            }
        }
    }
}

impl std::error::Error for ClockError {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClockNetwork {
    pub signals: Vec<ControlSignal>,
    pub instances: Vec<Instance>,
    pub domains: Vec<ClockDomain>,
}

fn ehxplll_head(name: &str) -> Instance {
    Instance::new(name, "EHXPLLL")
        .param("PLLRST_ENA", "ENABLED")
        .param("INTFB_WAKE", "DISABLED")
        .param("STDBY_ENABLE", "DISABLED")
        .param("DPHASE_SOURCE", "DISABLED")
        .param("OUTDIVIDER_MUXA", "DIVA")
        .param("OUTDIVIDER_MUXB", "DIVB")
        .param("OUTDIVIDER_MUXC", "DIVC")
        .param("OUTDIVIDER_MUXD", "DIVD")
}

fn clkdivf(name: &str, input: &str, output: &str, align: &str) -> Instance {
    Instance::new(name, "CLKDIVF")
        .param("GSR", "DISABLED")
        .param("DIV", "2.0")
        .input("CLKI", Net::clock(input))
        .input("RST", Net::signal("locked120").inverted())
        .input("ALIGNWD", Net::signal(align))
        .output("CDIVX", Net::clock(output))
}

impl ClockNetwork {
    /// The Tiliqua clock tree: a 120 MHz PLL with a 90 degree output, /2 dividers
    /// for the half-rate domains, and a separate 12.288 MHz audio PLL.
    pub fn tiliqua(platform: &Platform) -> Result<Self, PlatformError> {
        let clk = platform.default_clock()?.name.clone();
        let rst = platform.default_reset()?.name.clone();
        let pad = |name: &str| Net::Pad(name.to_string());
        let signals = [
            ("phase_sel", 2, 0),
            ("phase_dir", 1, 1),
            ("phase_step", 1, 1),
            ("phase_load", 1, 1),
            ("slip_hr2x", 1, 0),
            ("slip_hr2x90", 1, 0),
        ]
        .into_iter()
        .map(|(name, width, reset)| ControlSignal {
            name: name.to_string(),
            width,
            reset,
        })
        .collect();

        // 48 MHz in, 120 MHz out on CLKOP/CLKOS/CLKOS2, CLKOS2 at 90 degrees.
        let pll = ehxplll_head("pll")
            .param_int("CLKI_DIV", 2)
            .param("CLKOP_ENABLE", "ENABLED")
            .param_int("CLKOP_DIV", 5)
            .param_int("CLKOP_CPHASE", 2)
            .param_int("CLKOP_FPHASE", 0)
            .param("CLKOS_ENABLE", "ENABLED")
            .param_int("CLKOS_DIV", 5)
            .param_int("CLKOS_CPHASE", 2)
            .param_int("CLKOS_FPHASE", 0)
            .param("CLKOS2_ENABLE", "ENABLED")
            .param_int("CLKOS2_DIV", 5)
            .param_int("CLKOS2_CPHASE", 3)
            .param_int("CLKOS2_FPHASE", 2)
            .param("FEEDBK_PATH", "CLKOP")
            .param_int("CLKFB_DIV", 5)
            .input("CLKI", pad(&clk))
            .input("CLKFB", Net::signal("feedback120"))
            .input("RST", pad(&rst))
            .input("PHASESEL0", Net::SignalBit("phase_sel".into(), 0))
            .input("PHASESEL1", Net::SignalBit("phase_sel".into(), 1))
            .input("PHASEDIR", Net::signal("phase_dir"))
            .input("PHASESTEP", Net::signal("phase_step"))
            .input("PHASELOADREG", Net::signal("phase_load"))
            .input("STDBY", Net::Const(0))
            .input("PLLWAKESYNC", Net::Const(0))
            .input("ENCLKOP", Net::Const(0))
            .input("ENCLKOS", Net::Const(0))
            .input("ENCLKOS2", Net::Const(0))
            .input("ENCLKOS3", Net::Const(0))
            .output("CLKOP", Net::signal("feedback120"))
            .output("CLKOS", Net::clock("hr2x"))
            .output("CLKOS2", Net::clock("hr2x_90"))
            .output("LOCK", Net::signal("locked120"))
            .attr("FREQUENCY_PIN_CLKI", "48")
            .attr("FREQUENCY_PIN_CLKOP", "120")
            .attr("FREQUENCY_PIN_CLKOS", "120")
            .attr("FREQUENCY_PIN_CLKOS2", "120")
            .attr("ICP_CURRENT", "12")
            .attr("LPF_RESISTOR", "8");

        // 256 * 48 kHz
        let audio_pll = ehxplll_head("audio_pll")
            .param_int("CLKI_DIV", 5)
            .param("CLKOP_ENABLE", "ENABLED")
            .param_int("CLKOP_DIV", 32)
            .param_int("CLKOP_CPHASE", 9)
            .param_int("CLKOP_FPHASE", 0)
            .param("CLKOS_ENABLE", "ENABLED")
            .param_int("CLKOS_DIV", 50)
            .param_int("CLKOS_CPHASE", 0)
            .param_int("CLKOS_FPHASE", 0)
            .param("FEEDBK_PATH", "CLKOP")
            .param_int("CLKFB_DIV", 2)
            .input("CLKI", pad(&clk))
            .input("CLKFB", Net::signal("feedback12"))
            .input("RST", pad(&rst))
            .input("PHASESEL0", Net::Const(0))
            .input("PHASESEL1", Net::Const(0))
            .input("PHASEDIR", Net::Const(1))
            .input("PHASESTEP", Net::Const(1))
            .input("PHASELOADREG", Net::Const(1))
            .input("STDBY", Net::Const(0))
            .input("PLLWAKESYNC", Net::Const(0))
            .input("ENCLKOP", Net::Const(0))
            .input("ENCLKOS2", Net::Const(0))
            .output("LOCK", Net::signal("locked12"))
            .output("CLKOP", Net::signal("feedback12"))
            .output("CLKOS", Net::clock("audio"))
            .attr("FREQUENCY_PIN_CLKI", "48")
            .attr("FREQUENCY_PIN_CLKOS", "12.288")
            .attr("ICP_CURRENT", "12")
            .attr("LPF_RESISTOR", "8")
            .attr("MFG_ENABLE_FILTEROPAMP", "1")
            .attr("MFG_GMCREF_SEL", "2");

        let instances = vec![
            pll,
            audio_pll,
            clkdivf("clkdiv_hr", "hr2x", "hr", "slip_hr2x"),
            clkdivf("clkdiv_hr_90", "hr2x_90", "hr_90", "slip_hr2x90"),
        ];

        let from_inst = |instance: &str, port: &str| ClockSource::Instance {
            instance: instance.to_string(),
            port: port.to_string(),
        };
        let hr = || ClockSource::Domain("hr".to_string());
        let locked120 = || Some(Net::signal("locked120").inverted());
        let domain = |name: &str, clock, reset| ClockDomain {
            name: name.to_string(),
            clock,
            reset,
        };
        let domains = vec![
            domain("hr2x", from_inst("pll", "CLKOS"), locked120()),
            domain("hr2x_90", from_inst("pll", "CLKOS2"), locked120()),
            domain("hr", from_inst("clkdiv_hr", "CDIVX"), locked120()),
            domain("hr_90", from_inst("clkdiv_hr_90", "CDIVX"), locked120()),
            domain("sync", hr(), locked120()),
            domain("usb", hr(), locked120()),
            domain("fast", hr(), locked120()),
            domain(
                "audio",
                from_inst("audio_pll", "CLKOS"),
                Some(Net::signal("locked12").inverted()),
            ),
            domain("raw48", ClockSource::Pad(clk.clone()), None),
        ];

        Ok(ClockNetwork {
            signals,
            instances,
            domains,
        })
    }

    pub fn domain(&self, name: &str) -> Option<&ClockDomain> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn pll(&self, name: &str) -> Option<&Instance> {
        self.instance(name).filter(|i| i.is_pll())
    }

    pub fn divider(&self, name: &str) -> Option<&Instance> {
        self.instance(name).filter(|i| i.is_divider())
    }

    pub fn signal(&self, name: &str) -> Option<&ControlSignal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// The instance output port driving `net`, if any.
    fn driver(&self, net: &Net) -> Option<(&Instance, &str)> {
        self.instances.iter().find_map(|inst| {
            inst.outputs
                .iter()
                .find(|&(_, n)| n == net)
                .map(|(port, _)| (inst, port.as_str()))
        })
    }

    /// The PLL whose lock output holds `domain` in reset.
    pub fn reset_pll(&self, domain: &str) -> Option<&Instance> {
        let mut net = self.domain(domain)?.reset.as_ref()?;
        while let Net::Inverted(inner) = net {
            net = &**inner;
        }
        match self.driver(net)? {
            (inst, "LOCK") if inst.is_pll() => Some(inst),
            _ => None,
        }
    }

    /// Nominal frequency of a domain, from the constraints declared on its sources.
    pub fn frequency(&self, platform: &Platform, domain: &str) -> Result<Frequency, ClockError> {
        self.resolve(platform, domain, &mut vec![])
    }

    fn resolve(
        &self,
        platform: &Platform,
        domain: &str,
        path: &mut Vec<String>,
    ) -> Result<Frequency, ClockError> {
        if path.iter().any(|d| d == domain) {
            let mut cycle = path.clone();
            cycle.push(domain.to_string());
            return Err(ClockError::Cycle(cycle));
        }
        let dom = self
            .domain(domain)
            .ok_or_else(|| ClockError::UnknownDomain(domain.to_string()))?;
        path.push(domain.to_string());
        let res = match dom.clock {
            ClockSource::Pad(ref res) => platform
                .resource(res, 0)
                .ok_or_else(|| ClockError::UnknownResource(res.clone()))?
                .clock
                .ok_or_else(|| ClockError::NoFrequency(domain.to_string())),
            ClockSource::Domain(ref other) => self.resolve(platform, other, path),
            ClockSource::Instance {
                ref instance,
                ref port,
            } => {
                let inst = self
                    .instance(instance)
                    .ok_or_else(|| ClockError::UnknownInstance {
                        domain: domain.to_string(),
                        instance: instance.clone(),
                    })?;
                if !inst.outputs.contains_key(port) {
                    return Err(ClockError::UnknownPort {
                        instance: instance.clone(),
                        port: port.clone(),
                    });
                }
                if inst.is_pll() {
                    inst.attrs
                        .get(&format!("FREQUENCY_PIN_{port}"))
                        .and_then(|f| Frequency::parse_mhz(f))
                        .ok_or_else(|| ClockError::NoFrequency(domain.to_string()))
                } else if inst.is_divider() {
                    let Some(Net::Clock(input)) = inst.inputs.get("CLKI") else {
                        return Err(ClockError::NoFrequency(domain.to_string()));
                    };
                    let div = match inst.params.get("DIV") {
                        Some(Param::Str(div)) => Decimal::parse(div),
                        Some(&Param::Int(div)) => u64::try_from(div).ok().map(|mantissa| {
                            Decimal { mantissa, scale: 0 }
                        }),
                        None => None,
                    }
                    .ok_or_else(|| ClockError::BadDivider(instance.clone()))?;
                    self.resolve(platform, input, path)?
                        .div_decimal(div)
                        .ok_or_else(|| ClockError::BadDivider(instance.clone()))
                } else {
                    Err(ClockError::NotAClock {
                        domain: domain.to_string(),
                        instance: instance.clone(),
                    })
                }
            }
        };
        path.pop();
        res
    }

    fn check_net(&self, platform: &Platform, net: &Net) -> bool {
        match net {
            Net::Pad(res) => platform.resource(res, 0).is_some(),
            Net::Signal(name) | Net::SignalBit(name, _) => {
                self.signal(name).is_some() || self.driver(&Net::Signal(name.clone())).is_some()
            }
            Net::Inverted(net) => self.check_net(platform, net),
            Net::Clock(domain) => self.domain(domain).is_some(),
            Net::Const(_) => true,
        }
    }

    /// Checks that every domain resolves to a frequency, every reset comes from a
    /// PLL lock, and every instance input is connected to something that exists.
    pub fn check(&self, platform: &Platform) -> Vec<ClockError> {
        let mut errors = vec![];
        for (i, dom) in self.domains.iter().enumerate() {
            if self.domains[..i].iter().any(|d| d.name == dom.name) {
                errors.push(ClockError::DuplicateDomain(dom.name.clone()));
            }
            if let ClockSource::Instance {
                ref instance,
                ref port,
            } = dom.clock
                && let Some(inst) = self.instance(instance)
                && let Some(net) = inst.outputs.get(port)
                && *net != Net::Clock(dom.name.clone())
            {
                errors.push(ClockError::NotDriven {
                    domain: dom.name.clone(),
                    instance: instance.clone(),
                    port: port.clone(),
                    net: net.to_string(),
                });
            }
            if let Err(e) = self.frequency(platform, &dom.name) {
                errors.push(e);
            }
            if dom.reset.is_some() && self.reset_pll(&dom.name).is_none() {
                errors.push(ClockError::BadReset(dom.name.clone()));
            }
        }
        for inst in &self.instances {
            for (port, net) in &inst.inputs {
                if !self.check_net(platform, net) {
                    errors.push(ClockError::UnknownNet {
                        instance: inst.name.clone(),
                        port: port.clone(),
                        net: net.to_string(),
                    });
                }
            }
        }
        errors
    }
}

/// Per-domain frequency listing.
pub struct FrequencyListing<'a>(pub &'a ClockNetwork, pub &'a Platform);

impl std::fmt::Display for FrequencyListing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for dom in &self.0.domains {
            match self.0.frequency(self.1, &dom.name) {
                Ok(freq) => writeln!(f, "\t{name:8} {freq}", name = dom.name)?,
                Err(e) => writeln!(f, "\t{name:8} ERROR: {e}", name = dom.name)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for ClockNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for sig in &self.signals {
            writeln!(
                f,
                "\tSIGNAL {name}: {width} RESET {reset}",
                name = sig.name,
                width = sig.width,
                reset = sig.reset
            )?;
        }
        for inst in &self.instances {
            write!(f, "{inst}")?;
        }
        for dom in &self.domains {
            write!(f, "\tDOMAIN {name}: {clock}", name = dom.name, clock = dom.clock)?;
            if let Some(ref reset) = dom.reset {
                write!(f, " RESET {reset}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl From<&ClockNetwork> for JsonValue {
    fn from(net: &ClockNetwork) -> Self {
        jzon::object! {
            signals: Vec::from_iter(net.signals.iter().map(|sig| jzon::object! {
                name: sig.name.as_str(),
                width: sig.width,
                reset: sig.reset,
            })),
            instances: Vec::from_iter(net.instances.iter()),
            domains: Vec::from_iter(net.domains.iter().map(|dom| {
                let reset = dom.reset.as_ref().map_or(JsonValue::Null, |r| r.to_string().into());
                jzon::object! {
                    name: dom.name.as_str(),
                    clock: dom.clock.to_string(),
                    reset: reset,
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> (Platform, ClockNetwork) {
        let platform = Platform::tiliqua();
        let network = ClockNetwork::tiliqua(&platform).unwrap();
        (platform, network)
    }

    #[test]
    fn tiliqua_is_consistent() {
        let (platform, network) = network();
        let errors = network.check(&platform);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(network.domains.len(), 9);
        assert_eq!(network.signals.len(), 6);
        assert_eq!(network.signal("phase_sel").unwrap().width, 2);
        assert_eq!(network.signal("phase_dir").unwrap().reset, 1);
    }

    #[test]
    fn frequencies() {
        let (platform, network) = network();
        for (domain, hz) in [
            ("raw48", 48_000_000),
            ("hr2x", 120_000_000),
            ("hr2x_90", 120_000_000),
            ("hr", 60_000_000),
            ("hr_90", 60_000_000),
            ("sync", 60_000_000),
            ("usb", 60_000_000),
            ("fast", 60_000_000),
            ("audio", 12_288_000),
        ] {
            assert_eq!(
                network.frequency(&platform, domain),
                Ok(Frequency::from_hz(hz)),
                "{domain}"
            );
        }
        assert_eq!(
            network.frequency(&platform, "video"),
            Err(ClockError::UnknownDomain("video".into()))
        );
    }

    #[test]
    fn resets() {
        let (_, network) = network();
        for domain in ["hr2x", "hr2x_90", "hr", "hr_90", "sync", "usb", "fast"] {
            assert_eq!(network.reset_pll(domain).unwrap().name, "pll", "{domain}");
        }
        assert_eq!(network.reset_pll("audio").unwrap().name, "audio_pll");
        assert!(network.reset_pll("raw48").is_none());
    }

    #[test]
    fn lookups() {
        let (_, network) = network();
        let pll = network.pll("pll").unwrap();
        assert_eq!(pll.params["CLKOS2_CPHASE"], Param::Int(3));
        assert_eq!(pll.params["FEEDBK_PATH"], Param::Str("CLKOP".into()));
        assert_eq!(pll.inputs["PHASESEL1"], Net::SignalBit("phase_sel".into(), 1));
        assert_eq!(network.pll("audio_pll").unwrap().attrs["MFG_GMCREF_SEL"], "2");
        assert!(network.pll("clkdiv_hr").is_none());
        let div = network.divider("clkdiv_hr_90").unwrap();
        assert_eq!(div.inputs["ALIGNWD"], Net::signal("slip_hr2x90"));
        assert_eq!(div.inputs["RST"].to_string(), "~locked120");
        assert!(network.divider("pll").is_none());
    }

    #[test]
    fn broken_networks() {
        let (platform, mut network) = network();
        network.domains.push(ClockDomain {
            name: "a".into(),
            clock: ClockSource::Domain("b".into()),
            reset: None,
        });
        network.domains.push(ClockDomain {
            name: "b".into(),
            clock: ClockSource::Domain("a".into()),
            reset: Some(Net::signal("phase_dir")),
        });
        network.domains.push(ClockDomain {
            name: "hr".into(),
            clock: ClockSource::Instance {
                instance: "pll".into(),
                port: "CLKOS3".into(),
            },
            reset: None,
        });
        network.domains.push(ClockDomain {
            name: "x".into(),
            clock: ClockSource::Instance {
                instance: "pll".into(),
                port: "CLKOP".into(),
            },
            reset: None,
        });
        assert_eq!(
            network.frequency(&platform, "x"),
            Ok(Frequency::from_mhz(120))
        );
        assert_eq!(
            network.frequency(&platform, "a"),
            Err(ClockError::Cycle(vec!["a".into(), "b".into(), "a".into()]))
        );
        let errors = network.check(&platform);
        assert_eq!(
            errors,
            [
                ClockError::Cycle(vec!["a".into(), "b".into(), "a".into()]),
                ClockError::Cycle(vec!["b".into(), "a".into(), "b".into()]),
                ClockError::BadReset("b".into()),
                ClockError::DuplicateDomain("hr".into()),
                ClockError::NotDriven {
                    domain: "x".into(),
                    instance: "pll".into(),
                    port: "CLKOP".into(),
                    net: "feedback120".into(),
                },
            ]
        );
        assert_eq!(
            errors[0].to_string(),
            "clock domain cycle: a -> b -> a"
        );
        assert_eq!(
            errors[4].to_string(),
            "domain x: pll.CLKOP drives feedback120, not the domain clock"
        );
    }

    #[test]
    fn divider_needs_a_ratio() {
        let (platform, mut network) = network();
        network.instances[2].params.insert("DIV".into(), Param::Str("0".into()));
        assert_eq!(
            network.frequency(&platform, "sync"),
            Err(ClockError::BadDivider("clkdiv_hr".into()))
        );
    }

    #[test]
    fn dump() {
        let (platform, network) = network();
        let dump = network.to_string();
        assert!(dump.starts_with("\tSIGNAL phase_sel: 2 RESET 0\n"));
        assert!(dump.contains("\tINSTANCE pll: EHXPLLL\n\t\tPARAM PLLRST_ENA = \"ENABLED\"\n"));
        assert!(dump.contains("\t\tIN CLKI = pad(clk48)\n"));
        assert!(dump.contains("\t\tOUT CLKOS = clk(audio)\n"));
        assert!(dump.contains("\tDOMAIN sync: DOMAIN hr RESET ~locked120\n"));
        assert!(dump.ends_with("\tDOMAIN raw48: PAD clk48\n"));
        let listing = FrequencyListing(&network, &platform).to_string();
        assert!(listing.contains("\taudio    12.288 MHz\n"));

        let json = JsonValue::from(&network);
        assert_eq!(json["instances"][0]["params"]["CLKI_DIV"], 2);
        assert_eq!(json["instances"][1]["attrs"]["FREQUENCY_PIN_CLKOS"], "12.288");
        assert_eq!(json["domains"][7]["reset"], "~locked12");
        assert_eq!(json["domains"][8]["reset"], JsonValue::Null);
    }
}
