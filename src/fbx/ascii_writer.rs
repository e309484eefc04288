//! ASCII FBX serialization.

use std::io::Write;

use log::info;

use super::error::{FbxError, Result};
use super::node::{FbxDocument, FbxNode, FbxVersion, Property};

/// Writes an FBX document in the text format.
///
/// The format has no header bytes and no footer, so repeated writes to the
/// same open stream are valid and simply concatenate.
pub struct AsciiWriter<W: Write> {
    stream: W,
}

impl<W: Write> AsciiWriter<W> {
    pub fn new(stream: W) -> Self {
        AsciiWriter { stream }
    }

    /// Consume the writer and return the output stream.
    pub fn into_inner(self) -> W {
        self.stream
    }

    /// Serialize a document to the stream.
    pub fn write(&mut self, document: &FbxDocument) -> Result<()> {
        info!(
            "Writing ASCII FBX document: version {}, {} top-level nodes",
            document.version.as_u32(),
            document.nodes.len()
        );
        let mut out = String::new();

        // Version comment; required by many importers.
        let version = document.version.as_u32();
        out.push_str(&format!(
            "; FBX {}.{}.{} project file\n\n",
            version / 1000,
            (version % 1000) / 100,
            (version % 100) / 10
        ));

        // Versions before 7.1 emit bare elements with no count framing.
        let frame_arrays = document.version >= FbxVersion::V7_1;
        for node in &document.nodes {
            build_node(node, &mut out, frame_arrays, 0)?;
            out.push('\n');
        }
        self.stream.write_all(out.as_bytes())?;
        Ok(())
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn build_node(node: &FbxNode, out: &mut String, frame_arrays: bool, depth: usize) -> Result<()> {
    push_indent(out, depth);
    out.push_str(&node.name);
    out.push(':');

    let mut first = true;
    for property in &node.properties {
        if !first {
            out.push(',');
        }
        out.push(' ');
        match property {
            Property::Byte(v) => out.push_str(&v.to_string()),
            Property::Short(v) => out.push_str(&v.to_string()),
            Property::Int(v) => out.push_str(&v.to_string()),
            Property::Long(v) => out.push_str(&v.to_string()),
            Property::Float(v) => {
                require_finite(property, v.is_finite())?;
                out.push_str(&float_literal(format!("{:?}", v)));
            }
            Property::Double(v) => {
                require_finite(property, v.is_finite())?;
                out.push_str(&float_literal(format!("{:?}", v)));
            }
            Property::Bool(v) => out.push(if *v { 'T' } else { 'F' }),
            Property::String(s) => {
                // Quoted verbatim; the format has no escape sequences.
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Property::Bytes(v) => {
                build_array(out, v.len(), v.iter().map(|e| e.to_string()), frame_arrays, depth)
            }
            Property::IntArray(v) => {
                build_array(out, v.len(), v.iter().map(|e| e.to_string()), frame_arrays, depth)
            }
            Property::LongArray(v) => {
                build_array(out, v.len(), v.iter().map(|e| e.to_string()), frame_arrays, depth)
            }
            Property::FloatArray(v) => {
                require_finite(property, v.iter().all(|e| e.is_finite()))?;
                build_array(
                    out,
                    v.len(),
                    v.iter().map(|e| float_literal(format!("{:?}", e))),
                    frame_arrays,
                    depth,
                )
            }
            Property::DoubleArray(v) => {
                require_finite(property, v.iter().all(|e| e.is_finite()))?;
                build_array(
                    out,
                    v.len(),
                    v.iter().map(|e| float_literal(format!("{:?}", e))),
                    frame_arrays,
                    depth,
                )
            }
            Property::BoolArray(v) => build_array(
                out,
                v.len(),
                v.iter().map(|e| if *e { "1" } else { "0" }.to_string()),
                frame_arrays,
                depth,
            ),
        }
        first = false;
    }

    if !node.children.is_empty() {
        out.push_str(" {\n");
        for child in node.children.iter().flatten() {
            build_node(child, out, frame_arrays, depth + 1)?;
        }
        push_indent(out, depth);
        out.push('}');
    }
    out.push('\n');
    Ok(())
}

// The text grammar has no literal for NaN or infinity.
fn require_finite(property: &Property, finite: bool) -> Result<()> {
    if finite {
        Ok(())
    } else {
        Err(FbxError::UnsupportedType {
            type_name: property.type_name(),
            context: "text property (value is not finite)",
        })
    }
}

// `*count { a: e,e,... }` at 7.1 and later, bare comma-joined elements
// before that.
fn build_array<I>(out: &mut String, count: usize, elements: I, frame: bool, depth: usize)
where
    I: Iterator<Item = String>,
{
    if frame {
        out.push('*');
        out.push_str(&count.to_string());
        out.push_str(" {\n");
        push_indent(out, depth + 1);
        out.push_str("a: ");
    }
    let mut first = true;
    for element in elements {
        if !first {
            out.push(',');
        }
        out.push_str(&element);
        first = false;
    }
    if frame {
        out.push('\n');
        push_indent(out, depth);
        out.push('}');
    }
}

// Keeps float literals re-parseable as floats: the tokenizer keys off the
// decimal point, so a mantissa without one gets ".0" spliced in.
fn float_literal(mut text: String) -> String {
    if !text.contains('.') {
        match text.find(['e', 'E']) {
            Some(pos) => text.insert_str(pos, ".0"),
            None => text.push_str(".0"),
        }
    }
    text
}
