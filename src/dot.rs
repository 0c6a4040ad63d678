use std::fmt::Display;

use itertools::Itertools;

use crate::automaton::Pdrta;

fn sanitize_dot_ident(name: &str) -> String {
    name.chars()
        .filter_map(|chr| match chr {
            c if c.is_alphanumeric() || c == '_' => Some(c),
            '|' | ':' | ',' | '-' => Some('_'),
            _ => None,
        })
        .join("")
}

fn escape_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

/// Objects that can be exported to the DOT format of graphviz.
pub trait Dottable {
    /// Compute the graphviz representation, for more information on the DOT format,
    /// see the [graphviz documentation](https://graphviz.org/doc/info/lang.html).
    fn dot_representation(&self) -> String {
        let header = std::iter::once(format!(
            "digraph {} {{",
            sanitize_dot_ident(&self.dot_name().unwrap_or("A".to_string()))
        ))
        .chain(self.dot_header_statements());

        let states = self.dot_states().map(|(ident, attributes)| {
            format!(
                "{} [{}]",
                sanitize_dot_ident(&ident),
                attributes.into_iter().map(|attr| attr.to_string()).join(", ")
            )
        });

        let transitions = self.dot_transitions().map(|(source, target, attributes)| {
            format!(
                "{} -> {} [{}]",
                sanitize_dot_ident(&source),
                sanitize_dot_ident(&target),
                attributes.into_iter().map(|attr| attr.to_string()).join(", ")
            )
        });

        header
            .chain(states)
            .chain(transitions)
            .chain(std::iter::once("}".to_string()))
            .join("\n")
    }

    /// Additional statements placed after the opening of the graph.
    fn dot_header_statements(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::empty()
    }

    /// The name of the graph.
    fn dot_name(&self) -> Option<String>;

    /// Identifiers and attributes of all nodes.
    fn dot_states(&self) -> impl Iterator<Item = (String, Vec<DotStateAttribute>)> + '_;

    /// Source and target identifiers and the attributes of all edges.
    fn dot_transitions(
        &self,
    ) -> impl Iterator<Item = (String, String, Vec<DotTransitionAttribute>)> + '_;

    /// Runs the `dot` executable on the DOT representation and returns the rendered bytes in
    /// the given output `format`, e.g. `png` or `svg`. Only available with the `graphviz`
    /// feature.
    #[cfg(feature = "graphviz")]
    fn render(&self, format: &str) -> Result<Vec<u8>, std::io::Error> {
        use std::io::Write;

        let dot = self.dot_representation();
        tracing::trace!("rendering dot representation as {format}\n{dot}");
        let mut child = std::process::Command::new("dot")
            .arg(format!("-T{format}"))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(dot.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "dot exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(output.stdout)
    }

    /// Renders into the file at `path`, choosing the format by its extension (`png` if there
    /// is none). The image is written to a temporary file next to `path` first, so `path` is
    /// either replaced completely or left untouched. Only available with the `graphviz`
    /// feature.
    #[cfg(feature = "graphviz")]
    fn render_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        use std::io::Write;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let image = self.render(format)?;
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(directory)?;
        staged.write_all(&image)?;
        staged.persist(path)?;
        tracing::debug!("rendered {} bytes of {format} to {}", image.len(), path.display());
        Ok(())
    }
}

impl Dottable for Pdrta {
    fn dot_name(&self) -> Option<String> {
        Some("PDRTA".into())
    }

    fn dot_header_statements(&self) -> impl Iterator<Item = String> + '_ {
        [
            "rankdir=LR".to_string(),
            "init [label=\"\", shape=none]".to_string(),
            format!("init -> q{}", self.root()),
        ]
        .into_iter()
    }

    fn dot_states(&self) -> impl Iterator<Item = (String, Vec<DotStateAttribute>)> + '_ {
        self.states().map(move |state| {
            let id = state.id();
            (
                format!("q{id}"),
                vec![
                    DotStateAttribute::Shape("circle".into()),
                    DotStateAttribute::Label(format!("{id}\\n{:.3}", self.end_probability(id))),
                ],
            )
        })
    }

    fn dot_transitions(
        &self,
    ) -> impl Iterator<Item = (String, String, Vec<DotTransitionAttribute>)> + '_ {
        self.transitions().map(move |t| {
            let name = self
                .alphabet()
                .name(t.symbol)
                .map(str::to_string)
                .unwrap_or_else(|| t.symbol.to_string());
            let probability =
                self.transition_probability(t.source, t.symbol, t.interval.begin());
            (
                format!("q{}", t.source),
                format!("q{}", t.target),
                vec![DotTransitionAttribute::Label(format!(
                    "{name} [{}, {}] {probability:.3}",
                    t.interval.begin(),
                    t.interval.end()
                ))],
            )
        })
    }
}

/// Enum that abstracts attributes of nodes in the DOT format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotStateAttribute {
    /// The label of a node
    Label(String),
    /// The shape of a node
    Shape(String),
}

impl Display for DotStateAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotStateAttribute::Label(s) => write!(f, "label=\"{}\"", escape_label(s)),
            DotStateAttribute::Shape(s) => write!(f, "shape=\"{s}\""),
        }
    }
}

/// Enum that abstracts attributes of edges in the DOT format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotTransitionAttribute {
    /// The label of an edge
    Label(String),
}

impl Display for DotTransitionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotTransitionAttribute::Label(lbl) => write!(f, "label=\"{}\"", escape_label(lbl)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        histogram::HistogramBins,
        sample::{TimedSample, TimedWord},
    };

    #[test]
    fn pdrta_to_dot() {
        let sample = TimedSample::from_words(
            2,
            [vec![(0, 3)], vec![(0, 3), (1, 7)]].map(TimedWord::new),
        )
        .unwrap();
        let pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
        let dot = pdrta.dot_representation();
        assert!(dot.starts_with("digraph PDRTA {"));
        assert!(dot.contains("init -> q0"));
        assert!(dot.contains("q0 -> q1 [label=\"0 [0, 7] 1.000\"]"));
        assert!(dot.contains("q1 [shape=\"circle\", label=\"1\\n0.500\"]"));
        assert!(dot.ends_with('}'));
        assert_eq!(sanitize_dot_ident("a|b, c"), "a_b_c");
        assert_eq!(DotTransitionAttribute::Label("\"x\"".into()).to_string(), "label=\"\\\"x\\\"\"");
    }

    #[cfg(feature = "graphviz")]
    #[test_log::test]
    fn render_to_file() {
        let sample = TimedSample::from_words(1, [vec![(0, 2)], vec![]].map(TimedWord::new)).unwrap();
        let pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("result.svg");
        match pdrta.render_to_file(&path) {
            Ok(()) => {
                let svg = std::fs::read_to_string(&path).unwrap();
                assert!(svg.contains("<svg"));
                assert!(svg.contains("q0"));
            }
            // without graphviz installed nothing may be left behind
            Err(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound, "{e}");
                assert!(!path.exists());
                assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
            }
        }
    }
}
