//! Conversions between D-Bus naming conventions and the C identifiers the
//! generated GInterface code uses.

use std::fmt::{self, Display};

/// `CamelCase` to `lower_snake_case`.
///
/// An uppercase letter gets an underscore in front of it when it follows a
/// lowercase letter or digit, or when it ends an uppercase run and is itself
/// followed by a lowercase letter, so `GetURLList` becomes `get_url_list`.
/// Input without uppercase letters passes through untouched.
pub struct Lower<'s>(pub &'s str);

impl Display for Lower<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars: Vec<char> = self.0.chars().collect();
        let Some((&first, rest)) = chars.split_first() else {
            return Ok(());
        };
        write!(f, "{}", first.to_lowercase())?;
        let mut last_upper = first.is_uppercase();
        for (i, &c) in rest.iter().enumerate() {
            if !c.is_uppercase() {
                write!(f, "{c}")?;
                last_upper = false;
                continue;
            }
            let next_lower = rest.get(i + 1).is_some_and(|n| n.is_lowercase());
            if !last_upper || next_lower {
                f.write_str("_")?;
            }
            write!(f, "{}", c.to_lowercase())?;
            last_upper = true;
        }
        Ok(())
    }
}

/// Member name mangling as done by dbus-glib's `_dbus_gutils_wincaps_to_uscore`.
///
/// The object info tables that dbus-binding-tool generates name their
/// callbacks this way, so this must agree with it letter for letter,
/// including the way it splits acronyms (`SendDTMF` becomes `send_dt_mf`).
pub struct Wincaps<'s>(pub &'s str);

impl Display for Wincaps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(self.0.len() + 4);
        for c in self.0.chars() {
            if c.is_ascii_uppercase() {
                let second_last = out.chars().rev().nth(1);
                if !out.is_empty() && second_last != Some('_') {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        f.write_str(&out)
    }
}

pub fn camelcase_to_lower(s: &str) -> String {
    Lower(s).to_string()
}

pub fn wincaps_to_uscore(s: &str) -> String {
    Wincaps(s).to_string()
}

/// `org.example.Thing` to `org_example_thing`.
pub fn interface_symbol(dotted: &str) -> String {
    dotted.replace('.', "_").to_lowercase()
}

/// The four spellings of the generator prefix, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    /// As given on the command line, e.g. `Tp_Svc_`.
    pub given: String,
    /// Separators removed, used for type names: `TpSvc`.
    pub mixed: String,
    /// `tp_svc_`
    pub lower: String,
    /// `TP_SVC_`
    pub upper: String,
}

impl Prefixes {
    pub fn new(prefix: &str) -> Prefixes {
        Prefixes {
            given: prefix.to_string(),
            mixed: prefix.replace('_', ""),
            lower: prefix.to_lowercase(),
            upper: prefix.to_uppercase(),
        }
    }
}

/// Spellings of a `<node name="...">` used in identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeNames {
    /// `Channel_Type_Text` becomes `ChannelTypeText`.
    pub mixed: String,
    pub lower: String,
    pub upper: String,
}

impl NodeNames {
    pub fn new(node_name: &str) -> NodeNames {
        let name = node_name.replace('/', "");
        NodeNames {
            mixed: name.replace('_', ""),
            lower: name.to_lowercase(),
            upper: name.to_uppercase(),
        }
    }
}
