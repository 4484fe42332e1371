use crate::error::{Error, Result};
use crate::types::type_to_gtype;
use crate::{Arg, Direction, Interface, Method, Node, Signal, Spec};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader;

struct Rdr<'x> {
    xml: Reader<&'x [u8]>,
}

fn tag(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Attribute by its qualified name, so `type` and `tp:type` stay distinct.
fn get_attr(start: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Attribute by its local name, ignoring any namespace prefix.
fn get_attr_local(start: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a D-Bus introspection document into a validated [`Spec`].
///
/// `<node>` elements are collected wherever they appear. Every one of them
/// must hold exactly one `<interface>`, unless it has no interface and only
/// serves to group child nodes. Elements the generator does not use
/// (annotations, docstrings, extension elements) are skipped.
pub fn parse(xml: &str) -> Result<Spec> {
    let mut xml = Reader::from_str(xml);
    xml.trim_text(true);
    xml.expand_empty_elements(true);
    let mut rdr = Rdr { xml };
    let mut spec = Spec::default();
    loop {
        match rdr.xml.read_event()? {
            XmlEvent::Start(start) => rdr.read_element(&start, &mut spec.nodes)?,
            XmlEvent::Eof => break,
            _ => {}
        }
    }
    tracing::debug!(nodes = spec.nodes.len(), "parsed specification");
    Ok(spec)
}

impl<'x> Rdr<'x> {
    fn read_element(&mut self, start: &BytesStart, nodes: &mut Vec<Node>) -> Result<()> {
        if start.name().as_ref() == b"node" {
            return self.read_node(start, nodes);
        }
        loop {
            match self.xml.read_event()? {
                XmlEvent::Start(child) => self.read_element(&child, nodes)?,
                XmlEvent::End(_) => return Ok(()),
                XmlEvent::Eof => return Err(Error::UnexpectedEof(tag(start))),
                _ => {}
            }
        }
    }

    fn skip(&mut self, start: &BytesStart) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.xml.read_event()? {
                XmlEvent::Start(_) => depth += 1,
                XmlEvent::End(_) if depth == 0 => return Ok(()),
                XmlEvent::End(_) => depth -= 1,
                XmlEvent::Eof => return Err(Error::UnexpectedEof(tag(start))),
                _ => {}
            }
        }
    }

    fn read_node(&mut self, start: &BytesStart, nodes: &mut Vec<Node>) -> Result<()> {
        let name = get_attr(start, "name")?.unwrap_or_default();
        let mut causes_havoc = get_attr_local(start, "causes-havoc")?.filter(|r| !r.is_empty());
        let mut interfaces = vec![];
        let mut children = 0;
        loop {
            match self.xml.read_event()? {
                XmlEvent::Start(e) => match e.name().as_ref() {
                    b"interface" => {
                        let (iface, havoc) = self.read_interface(&e)?;
                        causes_havoc = causes_havoc.or(havoc);
                        interfaces.push(iface);
                    }
                    b"node" => {
                        children += 1;
                        self.read_node(&e, nodes)?;
                    }
                    _ => self.skip(&e)?,
                },
                XmlEvent::End(_) => break,
                XmlEvent::Eof => return Err(Error::UnexpectedEof(tag(start))),
                _ => {}
            }
        }

        if interfaces.is_empty() && children > 0 {
            return Ok(());
        }
        if interfaces.len() != 1 {
            return Err(Error::InterfaceCount { node: name, found: interfaces.len() });
        }
        let interface = interfaces.remove(0);
        nodes.push(Node { name, causes_havoc, interface });
        Ok(())
    }

    fn read_interface(&mut self, start: &BytesStart) -> Result<(Interface, Option<String>)> {
        let name = get_attr(start, "name")?.ok_or(Error::MissingName("interface"))?;
        let causes_havoc = get_attr_local(start, "causes-havoc")?.filter(|r| !r.is_empty());
        let mut methods = vec![];
        let mut signals = vec![];
        loop {
            match self.xml.read_event()? {
                XmlEvent::Start(e) => match e.name().as_ref() {
                    b"method" => methods.push(self.read_method(&e, &name)?),
                    b"signal" => signals.push(self.read_signal(&e, &name)?),
                    _ => self.skip(&e)?,
                },
                XmlEvent::End(_) => break,
                XmlEvent::Eof => return Err(Error::UnexpectedEof(tag(start))),
                _ => {}
            }
        }
        Ok((Interface { name, methods, signals }, causes_havoc))
    }

    fn read_method(&mut self, start: &BytesStart, iface: &str) -> Result<Method> {
        let name = get_attr(start, "name")?.ok_or(Error::MissingName("method"))?;
        let member = format!("{iface}.{name}");
        let args = self.read_args(start, &member, false)?;
        Ok(Method { name, args })
    }

    fn read_signal(&mut self, start: &BytesStart, iface: &str) -> Result<Signal> {
        let name = get_attr(start, "name")?.ok_or(Error::MissingName("signal"))?;
        let member = format!("{iface}.{name}");
        let args = self.read_args(start, &member, true)?;
        Ok(Signal { name, args })
    }

    fn read_args(&mut self, start: &BytesStart, member: &str, signal: bool) -> Result<Vec<Arg>> {
        let mut args = vec![];
        loop {
            match self.xml.read_event()? {
                XmlEvent::Start(e) => {
                    if e.name().as_ref() == b"arg" {
                        args.push(read_arg(&e, member, signal)?);
                    }
                    self.skip(&e)?;
                }
                XmlEvent::End(_) => return Ok(args),
                XmlEvent::Eof => return Err(Error::UnexpectedEof(tag(start))),
                _ => {}
            }
        }
    }
}

fn read_arg(start: &BytesStart, member: &str, signal: bool) -> Result<Arg> {
    let name = get_attr(start, "name")?.filter(|n| !n.is_empty());
    let Some(signature) = get_attr(start, "type")? else {
        return Err(Error::MissingType {
            member: member.to_string(),
            arg: name.unwrap_or_default(),
        });
    };
    // signal args are always outbound, whatever they claim
    let direction = if signal {
        Direction::Out
    } else {
        match get_attr(start, "direction")?.as_deref() {
            None | Some("") | Some("in") => Direction::In,
            Some("out") => Direction::Out,
            Some(other) => {
                return Err(Error::Direction {
                    member: member.to_string(),
                    direction: other.to_string(),
                })
            }
        }
    };
    let ty = type_to_gtype(&signature)?;
    Ok(Arg { name, direction, signature, ty })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const THING: &str = r#"<?xml version="1.0" ?>
<node name="/Thing" xmlns:tp="http://telepathy.freedesktop.org/wiki/DbusSpec#extensions-v0">
  <tp:copyright>Someone</tp:copyright>
  <interface name="org.example.Thing">
    <annotation name="org.freedesktop.DBus.Deprecated" value="false"/>
    <method name="DoStuff">
      <tp:docstring>Does <em>stuff</em>.</tp:docstring>
      <arg name="name" type="s" tp:type="Name">
        <tp:docstring>who</tp:docstring>
      </arg>
      <arg direction="out" type="i"/>
      <arg name="flags" direction="in" type="u"/>
    </method>
    <signal name="StuffHappened">
      <arg name="what" type="s"/>
      <arg type="au"/>
    </signal>
  </interface>
</node>
"#;

    #[test]
    fn parses_members_in_order() {
        let spec = parse(THING).unwrap();
        assert_eq!(spec.nodes.len(), 1);
        let node = &spec.nodes[0];
        assert_eq!(node.name, "/Thing");
        assert!(node.causes_havoc.is_none());
        assert_eq!(node.interface.name, "org.example.Thing");

        let method = &node.interface.methods[0];
        assert_eq!(method.name, "DoStuff");
        assert_eq!(method.args.len(), 3);
        assert_eq!(method.args[0].name.as_deref(), Some("name"));
        assert_eq!(method.args[0].signature, "s");
        assert_eq!(method.args[1].direction, Direction::Out);
        assert_eq!(method.args[1].name, None);
        assert_eq!(method.args(Direction::In).count(), 2);

        let signal = &node.interface.signals[0];
        assert_eq!(signal.name, "StuffHappened");
        assert_eq!(signal.args.len(), 2);
        assert_eq!(signal.args[1].ty.marshal, "BOXED");
    }

    #[test]
    fn finds_nodes_below_other_roots() {
        let xml = r#"<tp:spec xmlns:tp="x">
            <node name="/B"><interface name="org.example.B"/></node>
            <node name="/A"><interface name="org.example.A"/></node>
        </tp:spec>"#;
        let spec = parse(xml).unwrap();
        let names: Vec<_> = spec.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["/B", "/A"]);
    }

    #[test]
    fn container_nodes_are_not_interfaces() {
        let xml = r#"<node>
            <node name="Thing"><interface name="org.example.Thing"/></node>
        </node>"#;
        let spec = parse(xml).unwrap();
        assert_eq!(spec.nodes.len(), 1);
        assert_eq!(spec.nodes[0].name, "Thing");
    }

    #[test]
    fn havoc_on_node_or_interface() {
        let xml = r#"<node name="/A" causes-havoc="experimental"><interface name="a.A"/></node>"#;
        assert_eq!(parse(xml).unwrap().nodes[0].causes_havoc.as_deref(), Some("experimental"));
        let xml = r#"<node name="/A" xmlns:tp="x"><interface name="a.A" tp:causes-havoc="yes"/></node>"#;
        assert_eq!(parse(xml).unwrap().nodes[0].causes_havoc.as_deref(), Some("yes"));
    }

    #[test]
    fn rejects_wrong_interface_count() {
        let two = r#"<node name="/A"><interface name="a.A"/><interface name="a.B"/></node>"#;
        let err = parse(two).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(matches!(err, Error::InterfaceCount { found: 2, .. }));

        let none = r#"<node name="/A"></node>"#;
        assert!(matches!(parse(none).unwrap_err(), Error::InterfaceCount { found: 0, .. }));
    }

    #[test]
    fn rejects_bad_direction() {
        let xml = r#"<node name="/A"><interface name="a.A">
            <method name="M"><arg type="s" direction="inout"/></method>
        </interface></node>"#;
        let err = parse(xml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.to_string().contains("inout"));
    }

    #[test]
    fn rejects_unknown_types() {
        let xml = r#"<node name="/A"><interface name="a.A">
            <method name="M"><arg type="h"/></method>
        </interface></node>"#;
        assert_eq!(parse(xml).unwrap_err().kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn rejects_malformed_xml() {
        let err = parse(r#"<node name="/A"><interface name="a.A"></node>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
