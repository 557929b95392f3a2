// Graphviz export of a flow graph annotated with liveness. One node per instruction, labelled
// with its sorted live-in set, its key and rendered text, and its sorted live-out set; one edge
// per successor relation. Move nodes are drawn green and all others blue. Font size, line width
// and arrow size grow with the node count so large procedures stay readable when the picture is
// scaled down to a page. The attributes are presentation only.

//! Graphviz rendering of liveness results.

use super::liveness::{format_set, Liveness};

struct Style {
    font_size: f64,
    line_width: f64,
    arrow_size: f64,
}

impl Style {
    fn for_nodes(n: usize) -> Self {
        let n = n as f64;
        Self {
            font_size: f64::max(30.0, (n + 1.0).sqrt().sqrt() * n * 1.2),
            line_width: f64::max(3.0, (n + 1.0).sqrt() * 1.4),
            arrow_size: f64::max(2.0, (n + 1.0).sqrt().sqrt()),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Liveness<'_> {
    /// Render the annotated flow graph as a `dot` document titled `name`.
    pub fn to_dot(&self, name: &str) -> String {
        let graph = self.graph();
        let style = Style::for_nodes(graph.len());
        let mut out = String::new();

        out.push_str("digraph \"Flow graph\" {\n");
        out.push_str("labelloc=\"t\";\n");
        out.push_str(&format!("fontsize={:.2};\n", style.font_size));
        out.push_str(&format!("label=\"{}\";\n", escape(name)));
        out.push_str("  graph [size=\"6.5, 9\", ratio=fill];\n");

        for node in graph.nodes() {
            let label = format!(
                "{}\\n{}: {}\\n{}",
                format_set(&self.live_in_sorted(node)),
                node,
                escape(&graph.instr(node).to_string()),
                format_set(&self.live_out_sorted(node)),
            );
            let color = if graph.is_move(node) { "green" } else { "blue" };
            out.push_str(&format!(
                "  n{node} [label=\"{label}\", fontsize={:.2}, style=\"setlinewidth({:.2})\", color={color}];\n",
                style.font_size, style.line_width
            ));
        }
        for node in graph.nodes() {
            for succ in graph.succ(node) {
                out.push_str(&format!(
                    "  n{node} -> n{succ} [arrowhead=normal, arrowsize={:.2}, style=\"setlinewidth({:.2})\"];\n",
                    style.arrow_size, style.line_width
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}
