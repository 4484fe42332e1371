//! Generate dbus-glib service-side GInterfaces from D-Bus introspection XML.
//!
//! The XML is first parsed into a validated [`Spec`], then [`generate`]
//! renders a header and a body for every interface node in it.

mod config;
mod error;
mod generate;
pub mod names;
mod parse;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use generate::{generate, Output};
pub use parse::parse;
pub use types::GType;

/// A parsed specification document.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    /// Interface nodes, in document order.
    pub nodes: Vec<Node>,
}

/// A `<node>` carrying exactly one interface.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Reason given by a `causes-havoc` attribute, if the interface is
    /// marked unstable.
    pub causes_havoc: Option<String>,
    pub interface: Interface,
}

#[derive(Debug, Clone, Default)]
pub struct Interface {
    /// Dotted D-Bus name, e.g. `org.example.Thing`.
    pub name: String,
    pub methods: Vec<Method>,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Default)]
pub struct Method {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Method {
    pub fn args(&self, direction: Direction) -> impl Iterator<Item = &Arg> {
        self.args.iter().filter(move |a| a.direction == direction)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Signal {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub direction: Direction,
    /// The D-Bus type signature as written in the XML.
    pub signature: String,
    pub ty: GType,
}

/// Parse `xml` and generate both output files for it.
pub fn generate_from_xml(xml: &str, config: &Config) -> Result<Output> {
    let spec = parse(xml)?;
    generate(&spec, config)
}
