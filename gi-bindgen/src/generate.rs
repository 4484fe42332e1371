use crate::config::Config;
use crate::error::{Error, Result};
use crate::names::{camelcase_to_lower, interface_symbol, wincaps_to_uscore, NodeNames, Prefixes};
use crate::types::signal_marshal_name;
use crate::{Arg, Direction, Method, Node, Signal, Spec};

macro_rules! emitln {
    ($out:expr) => {
        $out.push(String::new())
    };
    ($out:expr, $($t:tt)*) => {
        $out.push(format!($($t)*))
    };
}

/// The generated header (`<basename>.h`) and body (`<basename>.c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub header: String,
    pub body: String,
}

/// Generate the GInterface header and body for every node in `spec`.
///
/// Nodes are emitted sorted by name; members keep their document order.
/// Nothing is produced if any node is unstable and the config does not
/// allow it.
pub fn generate(spec: &Spec, config: &Config) -> Result<Output> {
    if !config.allow_unstable {
        if let Some(node) = spec.nodes.iter().find(|n| n.causes_havoc.is_some()) {
            return Err(Error::Unstable {
                interface: node.interface.name.clone(),
                reason: node.causes_havoc.clone().unwrap_or_default(),
            });
        }
    }

    let mut nodes: Vec<&Node> = spec.nodes.iter().collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut g = Gen { config, header: vec![], body: vec![] };
    g.prologue();
    for node in nodes {
        g.node(node);
    }
    g.epilogue();
    Ok(Output { header: g.header.join("\n"), body: g.body.join("\n") })
}

struct Gen<'c> {
    config: &'c Config,
    header: Vec<String>,
    body: Vec<String>,
}

/// Identifiers shared by everything generated for one node.
struct NodeCx<'n> {
    names: NodeNames,
    iface: &'n str,
    /// `TpSvcThing`
    class: String,
    /// `tp_svc_thing`
    func: String,
    /// `TP_SVC_THING`
    macro_name: String,
    /// `TP_SVC_TYPE_THING`
    gtype: String,
}

impl<'n> NodeCx<'n> {
    fn new(prefixes: &Prefixes, node: &'n Node) -> NodeCx<'n> {
        let names = NodeNames::new(&node.name);
        NodeCx {
            class: format!("{}{}", prefixes.mixed, names.mixed),
            func: format!("{}{}", prefixes.lower, names.lower),
            macro_name: format!("{}{}", prefixes.upper, names.upper),
            gtype: format!("{}TYPE_{}", prefixes.upper, names.upper),
            iface: &node.interface.name,
            names,
        }
    }

    fn signal_const(&self, signal: &Signal) -> String {
        format!("SIGNAL_{}_{}", self.names.upper, signal.name)
    }
}

/// A C parameter: type spelling (ending in a space or `*`) and name.
struct Param {
    ctype: String,
    name: String,
    gtype: String,
    marshal: &'static str,
}

impl Param {
    fn decl(&self) -> String {
        format!("{}{}", self.ctype, self.name)
    }

    fn doc(&self, sig: &str) -> String {
        format!(" * @{}: {} (D-Bus type {sig})", self.name, self.ctype.trim_end())
    }
}

/// Name args `<word>_<name>`, or `<word>N` where N counts only the unnamed
/// args seen so far.
fn params<'a>(args: impl Iterator<Item = &'a Arg>, word: &str) -> Vec<(Param, &'a str)> {
    let mut unnamed = 0;
    args.map(|arg| {
        let name = match &arg.name {
            Some(name) => format!("{word}_{name}"),
            None => {
                unnamed += 1;
                format!("{word}{}", unnamed - 1)
            }
        };
        let param = Param {
            ctype: arg.ty.param_ctype(),
            name,
            gtype: arg.ty.gtype.clone(),
            marshal: arg.ty.marshal,
        };
        (param, arg.signature.as_str())
    })
    .collect()
}

fn method_params(method: &Method, direction: Direction) -> Vec<(Param, &str)> {
    params(method.args(direction), direction.as_str())
}

fn include_guard(basename: &str) -> String {
    let stem: String = basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("__{stem}_H__")
}

impl Gen<'_> {
    fn prologue(&mut self) {
        let guard = include_guard(&self.config.basename);
        emitln!(self.header, "#ifndef {guard}");
        emitln!(self.header, "#define {guard}");
        emitln!(self.header);
        emitln!(self.header, "#include <glib-object.h>");
        emitln!(self.header, "#include <dbus/dbus-glib.h>");
        emitln!(self.header);
        emitln!(self.header, "G_BEGIN_DECLS");
        emitln!(self.header);

        emitln!(self.body, "#include \"{}.h\"", self.config.basename);
        emitln!(self.body);
        for header in &self.config.headers {
            emitln!(self.body, "#include {header}");
        }
        emitln!(self.body);
    }

    fn epilogue(&mut self) {
        emitln!(self.header);
        emitln!(self.header, "G_END_DECLS");
        emitln!(self.header);
        emitln!(self.header, "#endif /* {} */", include_guard(&self.config.basename));
        emitln!(self.header);

        emitln!(self.body);
        for header in &self.config.end_headers {
            emitln!(self.body, "#include {header}");
        }
        emitln!(self.body);
    }

    fn node(&mut self, node: &Node) {
        let cx = NodeCx::new(&self.config.prefixes, node);
        let methods = &node.interface.methods;
        let signals = &node.interface.signals;
        tracing::debug!(
            node = %node.name,
            interface = cx.iface,
            symbol = %interface_symbol(cx.iface),
            methods = methods.len(),
            signals = signals.len(),
            "generating interface"
        );

        emitln!(self.body, "const DBusGObjectInfo dbus_glib_{}_object_info;", cx.func);
        emitln!(self.body);

        emitln!(self.body, "struct _{}Class {{", cx.class);
        emitln!(self.body, "    GTypeInterface parent_class;");
        for method in methods {
            let member = camelcase_to_lower(&method.name);
            emitln!(self.body, "    {}_{member}_impl {member};", cx.func);
        }
        emitln!(self.body, "}};");
        emitln!(self.body);

        if !signals.is_empty() {
            emitln!(self.body, "enum {{");
            for signal in signals {
                emitln!(self.body, "    {},", cx.signal_const(signal));
            }
            emitln!(self.body, "    N_{}_SIGNALS", cx.names.upper);
            emitln!(self.body, "}};");
            emitln!(
                self.body,
                "static guint {}_signals[N_{}_SIGNALS] = {{0}};",
                cx.names.lower,
                cx.names.upper
            );
            emitln!(self.body);
        }

        emitln!(self.body, "static void {}_base_init (gpointer klass);", cx.func);
        emitln!(self.body);
        self.get_type(&cx);
        self.type_macros(&cx);

        for method in methods {
            self.method(&cx, method);
        }
        let mut base_init = vec![];
        for signal in signals {
            base_init.extend(self.signal(&cx, signal));
        }
        self.base_init(&cx, base_init);

        emitln!(self.header);
    }

    fn get_type(&mut self, cx: &NodeCx) {
        let b = &mut self.body;
        emitln!(b, "GType");
        emitln!(b, "{}_get_type (void)", cx.func);
        emitln!(b, "{{");
        emitln!(b, "  static GType type = 0;");
        emitln!(b);
        emitln!(b, "  if (G_UNLIKELY (type == 0))");
        emitln!(b, "    {{");
        emitln!(b, "      static const GTypeInfo info = {{");
        emitln!(b, "        sizeof ({}Class),", cx.class);
        emitln!(b, "        {}_base_init, /* base_init */", cx.func);
        emitln!(b, "        NULL, /* base_finalize */");
        emitln!(b, "        NULL, /* class_init */");
        emitln!(b, "        NULL, /* class_finalize */");
        emitln!(b, "        NULL, /* class_data */");
        emitln!(b, "        0,");
        emitln!(b, "        0, /* n_preallocs */");
        emitln!(b, "        NULL /* instance_init */");
        emitln!(b, "      }};");
        emitln!(b);
        emitln!(b, "      type = g_type_register_static (G_TYPE_INTERFACE,");
        emitln!(b, "          \"{}\", &info, 0);", cx.class);
        emitln!(b, "    }}");
        emitln!(b);
        emitln!(b, "  return type;");
        emitln!(b, "}}");
        emitln!(b);
    }

    fn type_macros(&mut self, cx: &NodeCx) {
        let h = &mut self.header;
        emitln!(h, "/**");
        emitln!(h, " * {}:", cx.class);
        emitln!(h, " *");
        emitln!(h, " * Dummy typedef representing any implementation of this interface.");
        emitln!(h, " */");
        emitln!(h, "typedef struct _{0} {0};", cx.class);
        emitln!(h);
        emitln!(h, "/**");
        emitln!(h, " * {}Class:", cx.class);
        emitln!(h, " *");
        emitln!(h, " * The class of {}.", cx.class);
        emitln!(h, " */");
        emitln!(h, "typedef struct _{0}Class {0}Class;", cx.class);
        emitln!(h);
        emitln!(h, "GType {}_get_type (void);", cx.func);

        emitln!(h, "#define {} \\", cx.gtype);
        emitln!(h, "  ({}_get_type ())", cx.func);
        emitln!(h, "#define {}(obj) \\", cx.macro_name);
        emitln!(h, "  (G_TYPE_CHECK_INSTANCE_CAST((obj), {}, {}))", cx.gtype, cx.class);
        emitln!(h, "#define {}IS_{}(obj) \\", self.config.prefixes.upper, cx.names.upper);
        emitln!(h, "  (G_TYPE_CHECK_INSTANCE_TYPE((obj), {}))", cx.gtype);
        emitln!(h, "#define {}_GET_CLASS(obj) \\", cx.macro_name);
        emitln!(h, "  (G_TYPE_INSTANCE_GET_INTERFACE((obj), {}, {}Class))", cx.gtype, cx.class);
        emitln!(h);
        emitln!(h);
    }

    fn method(&mut self, cx: &NodeCx, method: &Method) {
        let dbus_name = &method.name;
        let member = camelcase_to_lower(dbus_name);
        let stub = format!("{}_{member}", cx.func);
        let impl_name = format!("{stub}_impl");
        let ret_name = format!("{}_return_from_{member}", cx.func);
        let implement = format!("{}_implement_{member}", cx.func);
        let in_args = method_params(method, Direction::In);
        let out_args = method_params(method, Direction::Out);
        tracing::debug!(method = %dbus_name, stub = %stub, ins = in_args.len(), outs = out_args.len());

        // callback typedef: declared in the header, documented in the body
        emitln!(self.body, "/**");
        emitln!(self.body, " * {impl_name}:");
        emitln!(self.body, " * @self: The object implementing this interface");
        for (p, sig) in &in_args {
            emitln!(self.body, "{}", p.doc(sig));
        }
        emitln!(self.body, " * @context: Used to return values or throw an error");
        emitln!(self.body, " *");
        emitln!(self.body, " * The signature of an implementation of the D-Bus method");
        emitln!(self.body, " * {dbus_name} on interface {}.", cx.iface);
        emitln!(self.body, " */");
        emitln!(self.header, "typedef void (*{impl_name}) ({} *self,", cx.class);
        for (p, _) in &in_args {
            emitln!(self.header, "    {},", p.decl());
        }
        emitln!(self.header, "    DBusGMethodInvocation *context);");

        // dispatch stub, static in the body
        emitln!(self.body, "static void");
        emitln!(self.body, "{stub} ({} *self,", cx.class);
        for (p, _) in &in_args {
            emitln!(self.body, "    {},", p.decl());
        }
        emitln!(self.body, "    DBusGMethodInvocation *context)");
        emitln!(self.body, "{{");
        emitln!(self.body, "  {impl_name} impl = ({}_GET_CLASS (self)->{member});", cx.macro_name);
        emitln!(self.body);
        emitln!(self.body, "  if (impl != NULL)");
        let call: Vec<&str> = std::iter::once("self")
            .chain(in_args.iter().map(|(p, _)| p.name.as_str()))
            .chain(std::iter::once("context"))
            .collect();
        emitln!(self.body, "    {{");
        emitln!(self.body, "      (impl) ({});", call.join(",\n        "));
        emitln!(self.body, "    }}");
        emitln!(self.body, "  else");
        emitln!(self.body, "    {{");
        match &self.config.not_implemented_func {
            Some(func) => emitln!(self.body, "      {func} (context);"),
            None => {
                emitln!(self.body, "      GError e = {{ DBUS_GERROR, ");
                emitln!(self.body, "           DBUS_GERROR_UNKNOWN_METHOD,");
                emitln!(self.body, "           \"Method not implemented\" }};");
                emitln!(self.body);
                emitln!(self.body, "      dbus_g_method_return_error (context, &e);");
            }
        }
        emitln!(self.body, "    }}");
        emitln!(self.body, "}}");
        emitln!(self.body);

        // dbus-binding-tool names the object info callback its own way;
        // point that name at the stub when the two disagree
        let dbus_glib_name = format!("{}_{}", cx.func, wincaps_to_uscore(dbus_name));
        if dbus_glib_name != stub {
            emitln!(self.body, "#define {dbus_glib_name} {stub}");
        }

        emitln!(self.header, "void {implement} ({}Class *klass, {impl_name} impl);", cx.class);

        emitln!(self.body, "/**");
        emitln!(self.body, " * {implement}:");
        emitln!(self.body, " * @klass: A class whose instances implement this interface");
        emitln!(self.body, " * @impl: A callback used to implement the {dbus_name} D-Bus method");
        emitln!(self.body, " *");
        emitln!(self.body, " * Register an implementation for the {dbus_name} method in the vtable");
        emitln!(self.body, " * of an implementation of this interface. To be called from");
        emitln!(self.body, " * the interface init function.");
        emitln!(self.body, " */");
        emitln!(self.body, "void");
        emitln!(self.body, "{implement} ({}Class *klass, {impl_name} impl)", cx.class);
        emitln!(self.body, "{{");
        emitln!(self.body, "  klass->{member} = impl;");
        emitln!(self.body, "}}");
        emitln!(self.body);

        // return helper, static inline in the header
        emitln!(self.header, "/**");
        emitln!(self.header, " * {ret_name}:");
        emitln!(self.header, " * @context: The D-Bus method invocation context");
        for (p, sig) in &out_args {
            emitln!(self.header, "{}", p.doc(sig));
        }
        emitln!(self.header, " *");
        emitln!(self.header, " * Return successfully by calling dbus_g_method_return().");
        emitln!(self.header, " * This inline function exists only to provide type-safety.");
        emitln!(self.header, " */");
        let decl: Vec<String> = std::iter::once("DBusGMethodInvocation *context".to_string())
            .chain(out_args.iter().map(|(p, _)| p.decl()))
            .collect();
        let decl = decl.join(",\n    ");
        emitln!(self.header, "static inline");
        emitln!(self.header, "/* this comment is to stop gtkdoc realising this is static */");
        emitln!(self.header, "void {ret_name} ({decl});");
        emitln!(self.header, "static inline void");
        emitln!(self.header, "{ret_name} ({decl})");
        emitln!(self.header, "{{");
        let call: Vec<&str> = std::iter::once("context")
            .chain(out_args.iter().map(|(p, _)| p.name.as_str()))
            .collect();
        emitln!(self.header, "  dbus_g_method_return ({});", call.join(",\n      "));
        emitln!(self.header, "}}");
        emitln!(self.header);
    }

    /// Emit the signal's emitter function and return the statements that
    /// register it from base_init.
    fn signal(&mut self, cx: &NodeCx, signal: &Signal) -> Vec<String> {
        let dbus_name = &signal.name;
        let stub = format!("{}_emit_{}", cx.func, camelcase_to_lower(dbus_name));
        let const_name = cx.signal_const(signal);
        let args = params(signal.args.iter(), "arg");
        tracing::debug!(signal = %dbus_name, stub = %stub, args = args.len());

        let decl: Vec<String> = std::iter::once("gpointer instance".to_string())
            .chain(args.iter().map(|(p, _)| p.decl()))
            .collect();
        let decl = decl.join(",\n    ");
        emitln!(self.header, "void {stub} ({decl});");

        emitln!(self.body, "/**");
        emitln!(self.body, " * {stub}:");
        emitln!(self.body, " * @instance: The object implementing this interface");
        for (p, sig) in &args {
            emitln!(self.body, "{}", p.doc(sig));
        }
        emitln!(self.body, " *");
        emitln!(self.body, " * Type-safe wrapper around g_signal_emit to emit the");
        emitln!(self.body, " * {dbus_name} signal on interface {}.", cx.iface);
        emitln!(self.body, " */");
        emitln!(self.body, "void");
        emitln!(self.body, "{stub} ({decl})");
        emitln!(self.body, "{{");
        emitln!(self.body, "  g_assert (instance != NULL);");
        emitln!(self.body, "  g_assert (G_TYPE_CHECK_INSTANCE_TYPE (instance, {}));", cx.gtype);
        let table_entry = format!("{}_signals[{const_name}]", cx.names.lower);
        let emit: Vec<&str> = ["instance", table_entry.as_str(), "0"]
            .into_iter()
            .chain(args.iter().map(|(p, _)| p.name.as_str()))
            .collect();
        emitln!(self.body, "  g_signal_emit ({});", emit.join(",\n      "));
        emitln!(self.body, "}}");
        emitln!(self.body);

        let tags: Vec<&str> = args.iter().map(|(p, _)| p.marshal).collect();
        let marshaller = signal_marshal_name(&tags, &self.config.signal_marshal_prefix);
        let gtypes: Vec<String> = std::iter::once(args.len().to_string())
            .chain(args.iter().map(|(p, _)| p.gtype.clone()))
            .collect();

        let mut base_init = vec![];
        emitln!(base_init, "  {table_entry} =");
        emitln!(base_init, "  g_signal_new (\"{}\",", wincaps_to_uscore(dbus_name).replace('_', "-"));
        emitln!(base_init, "      G_OBJECT_CLASS_TYPE (klass),");
        emitln!(base_init, "      G_SIGNAL_RUN_LAST|G_SIGNAL_DETAILED,");
        emitln!(base_init, "      0,");
        emitln!(base_init, "      NULL, NULL,");
        emitln!(base_init, "      {marshaller},");
        emitln!(base_init, "      G_TYPE_NONE,");
        emitln!(base_init, "      {});", gtypes.join(",\n      "));
        emitln!(base_init);
        base_init
    }

    fn base_init(&mut self, cx: &NodeCx, signal_registrations: Vec<String>) {
        let b = &mut self.body;
        emitln!(b, "static void");
        emitln!(b, "{}_base_init (gpointer klass)", cx.func);
        emitln!(b, "{{");
        emitln!(b, "  static gboolean initialized = FALSE;");
        emitln!(b);
        emitln!(b, "  if (initialized)");
        emitln!(b, "    return;");
        emitln!(b);
        emitln!(b, "  initialized = TRUE;");
        emitln!(b);
        b.extend(signal_registrations);
        emitln!(b, "  dbus_g_object_type_install_info ({}_get_type (),", cx.func);
        emitln!(b, "      &dbus_glib_{}_object_info);", cx.func);
        emitln!(b, "}}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn gen(xml: &str, prefix: &str) -> Output {
        let config = Config::new(prefix).unwrap();
        generate(&parse(xml).unwrap(), &config).unwrap()
    }

    #[test]
    fn guard_from_basename() {
        assert_eq!(include_guard("_gen/svc-ifaces"), "___GEN_SVC_IFACES_H__");
        assert_eq!(include_guard("tp_svc_ginterfaces"), "__TP_SVC_GINTERFACES_H__");
    }

    #[test]
    fn synthetic_names_count_unnamed_only() {
        let xml = r#"<node name="/A"><interface name="a.A">
            <method name="M">
              <arg type="s"/>
              <arg name="foo" type="u"/>
              <arg type="i"/>
              <arg type="b" direction="out"/>
            </method>
        </interface></node>"#;
        let out = gen(xml, "x_");
        assert!(out.header.contains(
            "typedef void (*x_a_m_impl) (xA *self,\n    const gchar *in0,\n    guint in_foo,\n    gint in1,\n    DBusGMethodInvocation *context);"
        ));
        assert!(out.header.contains("void x_a_return_from_m (DBusGMethodInvocation *context,\n    gboolean out0);"));
        assert!(out.body.contains("      (impl) (self,\n        in0,\n        in_foo,\n        in1,\n        context);"));
    }

    #[test]
    fn alias_only_when_manglers_disagree() {
        let xml = r#"<node name="/A"><interface name="a.A">
            <method name="GetURLList"/>
            <method name="DoStuff"/>
        </interface></node>"#;
        let out = gen(xml, "x_");
        assert!(out.body.contains("#define x_a_get_ur_llist x_a_get_url_list\n"));
        assert!(!out.body.contains("#define x_a_do_stuff "));
    }

    #[test]
    fn signal_table_is_dense() {
        let xml = r#"<node name="/A"><interface name="a.A">
            <signal name="One"/>
            <signal name="Two"><arg type="u"/><arg name="s" type="s"/></signal>
            <signal name="Three"/>
        </interface></node>"#;
        let out = gen(xml, "x_");
        assert!(out.body.contains(
            "enum {\n    SIGNAL_A_One,\n    SIGNAL_A_Two,\n    SIGNAL_A_Three,\n    N_A_SIGNALS\n};\nstatic guint a_signals[N_A_SIGNALS] = {0};"
        ));
        assert!(out.body.contains("      x_marshal_VOID__UINT_STRING,"));
        assert!(out.body.contains("      g_cclosure_marshal_VOID__VOID,"));
        assert!(out.header.contains("void x_a_emit_two (gpointer instance,\n    guint arg0,\n    const gchar *arg_s);"));
        assert_eq!(out.body.matches("g_signal_new (").count(), 3);
    }

    #[test]
    fn no_signal_table_without_signals() {
        let xml = r#"<node name="/A"><interface name="a.A"><method name="M"/></interface></node>"#;
        let out = gen(xml, "x_");
        assert!(!out.body.contains("enum {"));
        assert!(!out.body.contains("_signals["));
    }

    #[test]
    fn not_implemented_hook() {
        let xml = r#"<node name="/A"><interface name="a.A"><method name="M"/></interface></node>"#;
        let config = Config::new("x_").unwrap().with_not_implemented_func("x_not_implemented");
        let out = generate(&parse(xml).unwrap(), &config).unwrap();
        assert!(out.body.contains("      x_not_implemented (context);"));
        assert!(!out.body.contains("DBUS_GERROR_UNKNOWN_METHOD"));
    }

    #[test]
    fn nodes_sorted_by_name() {
        let xml = r#"<tp:spec xmlns:tp="x">
            <node name="/b"><interface name="x.B"/></node>
            <node name="/C"><interface name="x.C"/></node>
            <node name="/a"><interface name="x.A"/></node>
        </tp:spec>"#;
        let out = gen(xml, "x_");
        let c = out.header.find("GType x_c_get_type").unwrap();
        let a = out.header.find("GType x_a_get_type").unwrap();
        let b = out.header.find("GType x_b_get_type").unwrap();
        assert!(c < a && a < b);
    }
}
