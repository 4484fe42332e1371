//! Mapping from D-Bus type signatures to the C and GType spellings used by
//! dbus-glib.

use crate::error::{Error, Result};

/// How one D-Bus type is represented on the C side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GType {
    /// C type, including the trailing space or `*` so the parameter name can
    /// be appended directly: `"gint "`, `"gchar *"`.
    pub ctype: String,
    /// GType expression passed to `g_signal_new`.
    pub gtype: String,
    /// Marshaller tag (`INT`, `STRING`, `BOXED`, ...).
    pub marshal: &'static str,
    /// The value is passed by reference and gets a `const` qualifier in
    /// parameter lists.
    pub pointer: bool,
}

impl GType {
    fn new(ctype: &str, gtype: impl Into<String>, marshal: &'static str, pointer: bool) -> GType {
        GType { ctype: ctype.to_string(), gtype: gtype.into(), marshal, pointer }
    }

    /// The C type as it appears in a parameter list.
    pub fn param_ctype(&self) -> String {
        if self.pointer {
            format!("const {}", self.ctype)
        } else {
            self.ctype.clone()
        }
    }
}

/// Key types a dbus-glib hash table may be indexed by.
const MAP_KEYS: &[char] = &['y', 'b', 'n', 'q', 'i', 'u', 's', 'o', 'g'];

/// Map one complete D-Bus type signature to its C representation.
pub fn type_to_gtype(sig: &str) -> Result<GType> {
    let unsupported = || Error::UnsupportedType(sig.to_string());
    let ty = match sig {
        "y" => GType::new("guchar ", "G_TYPE_UCHAR", "UCHAR", false),
        "b" => GType::new("gboolean ", "G_TYPE_BOOLEAN", "BOOLEAN", false),
        "n" | "i" => GType::new("gint ", "G_TYPE_INT", "INT", false),
        "q" | "u" => GType::new("guint ", "G_TYPE_UINT", "UINT", false),
        "x" => GType::new("gint64 ", "G_TYPE_INT64", "INT64", false),
        "t" => GType::new("guint64 ", "G_TYPE_UINT64", "UINT64", false),
        "d" => GType::new("gdouble ", "G_TYPE_DOUBLE", "DOUBLE", false),
        "s" => GType::new("gchar *", "G_TYPE_STRING", "STRING", true),
        "g" => GType::new("gchar *", "DBUS_TYPE_G_SIGNATURE", "STRING", true),
        "o" => GType::new("gchar *", "DBUS_TYPE_G_OBJECT_PATH", "BOXED", true),
        "v" => GType::new("GValue *", "G_TYPE_VALUE", "BOXED", true),
        "as" => GType::new("gchar **", "G_TYPE_STRV", "BOXED", true),
        "ay" => GType::new(
            "GArray *",
            "dbus_g_type_get_collection (\"GArray\", G_TYPE_UCHAR)",
            "BOXED",
            true,
        ),
        "au" => GType::new("GArray *", "DBUS_TYPE_G_UINT_ARRAY", "BOXED", true),
        "ai" => GType::new("GArray *", "DBUS_TYPE_G_INT_ARRAY", "BOXED", true),
        "ax" => GType::new("GArray *", "DBUS_TYPE_G_INT64_ARRAY", "BOXED", true),
        "at" => GType::new("GArray *", "DBUS_TYPE_G_UINT64_ARRAY", "BOXED", true),
        "ad" => GType::new("GArray *", "DBUS_TYPE_G_DOUBLE_ARRAY", "BOXED", true),
        "ab" => GType::new("GArray *", "DBUS_TYPE_G_BOOLEAN_ARRAY", "BOXED", true),
        "ao" => GType::new(
            "GPtrArray *",
            "dbus_g_type_get_collection (\"GPtrArray\", DBUS_TYPE_G_OBJECT_PATH)",
            "BOXED",
            true,
        ),
        "a{ss}" => GType::new("GHashTable *", "DBUS_TYPE_G_STRING_STRING_HASHTABLE", "BOXED", false),
        _ if sig.starts_with("a{") => {
            let inner = sig[2..].strip_suffix('}').ok_or_else(unsupported)?;
            let key = inner.chars().next().ok_or_else(unsupported)?;
            if !MAP_KEYS.contains(&key) {
                return Err(unsupported());
            }
            let key = type_to_gtype(&inner[..1])?;
            let value = type_to_gtype(&inner[1..])?;
            GType::new(
                "GHashTable *",
                format!("(dbus_g_type_get_map (\"GHashTable\", {}, {}))", key.gtype, value.gtype),
                "BOXED",
                false,
            )
        }
        _ if sig.starts_with("a(") || sig.starts_with("aa") => {
            let elem = type_to_gtype(&sig[1..])?;
            GType::new(
                "GPtrArray *",
                format!("(dbus_g_type_get_collection (\"GPtrArray\", {}))", elem.gtype),
                "BOXED",
                true,
            )
        }
        _ if sig.starts_with('(') => {
            let inner = sig[1..].strip_suffix(')').ok_or_else(unsupported)?;
            let mut gtype = String::from("(dbus_g_type_get_struct (\"GValueArray\", ");
            for member in split_signature(inner)? {
                gtype.push_str(&type_to_gtype(member)?.gtype);
                gtype.push_str(", ");
            }
            gtype.push_str("G_TYPE_INVALID))");
            GType::new("GValueArray *", gtype, "BOXED", true)
        }
        _ => return Err(unsupported()),
    };
    tracing::trace!(signature = sig, ctype = %ty.ctype, "mapped type");
    Ok(ty)
}

/// Split a signature into its complete types: `"sa{sv}(ii)"` gives
/// `["s", "a{sv}", "(ii)"]`.
pub fn split_signature(sig: &str) -> Result<Vec<&str>> {
    let bytes = sig.as_bytes();
    let mut types = vec![];
    let mut i = 0;
    while i < bytes.len() {
        let end = complete_type_end(bytes, i).ok_or_else(|| Error::UnsupportedType(sig.to_string()))?;
        types.push(&sig[i..end]);
        i = end;
    }
    Ok(types)
}

/// Index one past the complete type starting at `start`.
fn complete_type_end(sig: &[u8], start: usize) -> Option<usize> {
    match *sig.get(start)? {
        b'a' => complete_type_end(sig, start + 1),
        open @ (b'(' | b'{') => {
            let close = if open == b'(' { b')' } else { b'}' };
            let mut i = start + 1;
            while *sig.get(i)? != close {
                i = complete_type_end(sig, i)?;
            }
            Some(i + 1)
        }
        b')' | b'}' => None,
        _ => Some(start + 1),
    }
}

/// Marshallers GLib ships, named `g_cclosure_marshal_VOID__<NAME>`.
const GLIB_MARSHALLERS: &[&str] = &[
    "VOID", "BOOLEAN", "CHAR", "UCHAR", "INT", "STRING", "UINT", "LONG", "ULONG", "ENUM",
    "FLAGS", "FLOAT", "DOUBLE", "PARAM", "BOXED", "POINTER", "OBJECT", "UINT_POINTER",
];

/// Name of the marshaller for a signal returning nothing and taking
/// arguments with the given marshal tags.
///
/// Signatures GLib has no stock marshaller for get `<prefix>_marshal_VOID__...`,
/// the name a separately generated marshaller list uses for them.
pub fn signal_marshal_name(tags: &[&str], prefix: &str) -> String {
    let name = if tags.is_empty() { "VOID".to_string() } else { tags.join("_") };
    if GLIB_MARSHALLERS.contains(&name.as_str()) {
        format!("g_cclosure_marshal_VOID__{name}")
    } else {
        format!("{prefix}_marshal_VOID__{name}")
    }
}
