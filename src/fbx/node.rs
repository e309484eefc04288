//! Data structures shared by every codec: documents, nodes and properties.

use super::error::{FbxError, Result};

/// FBX format version. Governs minor layout differences between otherwise
/// identical files (most visibly the ASCII array framing, see the writer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FbxVersion {
    V6_0,
    V6_1,
    V7_0,
    /// First version to frame ASCII arrays as `*count { a: ... }`.
    V7_1,
    V7_2,
    V7_3,
    V7_4,
    V7_5,
}

impl FbxVersion {
    /// The version integer as stored in file headers and footers.
    pub fn as_u32(self) -> u32 {
        match self {
            FbxVersion::V6_0 => 6000,
            FbxVersion::V6_1 => 6100,
            FbxVersion::V7_0 => 7000,
            FbxVersion::V7_1 => 7100,
            FbxVersion::V7_2 => 7200,
            FbxVersion::V7_3 => 7300,
            FbxVersion::V7_4 => 7400,
            FbxVersion::V7_5 => 7500,
        }
    }
}

impl Default for FbxVersion {
    fn default() -> Self {
        FbxVersion::V7_4
    }
}

impl TryFrom<u32> for FbxVersion {
    type Error = FbxError;
    fn try_from(v: u32) -> Result<Self> {
        match v {
            6000 => Ok(FbxVersion::V6_0),
            6100 => Ok(FbxVersion::V6_1),
            7000 => Ok(FbxVersion::V7_0),
            7100 => Ok(FbxVersion::V7_1),
            7200 => Ok(FbxVersion::V7_2),
            7300 => Ok(FbxVersion::V7_3),
            7400 => Ok(FbxVersion::V7_4),
            7500 => Ok(FbxVersion::V7_5),
            other => Err(FbxError::UnsupportedVersion(other)),
        }
    }
}

/// One typed value attached to a node.
///
/// The set of kinds is closed: scalars, strings, raw byte blobs and
/// homogeneous arrays. Nodes never nest inside properties.
///
/// `Byte` only ever appears as a narrowing artifact of the ASCII reader;
/// the binary format has no tag for it and refuses to write one.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    String(String),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    BoolArray(Vec<bool>),
}

impl Property {
    /// A short static name for the kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Property::Byte(_) => "byte",
            Property::Short(_) => "i16",
            Property::Int(_) => "i32",
            Property::Long(_) => "i64",
            Property::Float(_) => "f32",
            Property::Double(_) => "f64",
            Property::Bool(_) => "bool",
            Property::Bytes(_) => "bytes",
            Property::String(_) => "string",
            Property::IntArray(_) => "i32 array",
            Property::LongArray(_) => "i64 array",
            Property::FloatArray(_) => "f32 array",
            Property::DoubleArray(_) => "f64 array",
            Property::BoolArray(_) => "bool array",
        }
    }

    /// The property value as an `i32`, if it is an integer scalar that fits.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Property::Byte(v) => Some(v as i32),
            Property::Short(v) => Some(v as i32),
            Property::Int(v) => Some(v),
            Property::Long(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }

    /// The property value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i16> for Property {
    fn from(v: i16) -> Self {
        Property::Short(v)
    }
}
impl From<i32> for Property {
    fn from(v: i32) -> Self {
        Property::Int(v)
    }
}
impl From<i64> for Property {
    fn from(v: i64) -> Self {
        Property::Long(v)
    }
}
impl From<f32> for Property {
    fn from(v: f32) -> Self {
        Property::Float(v)
    }
}
impl From<f64> for Property {
    fn from(v: f64) -> Self {
        Property::Double(v)
    }
}
impl From<bool> for Property {
    fn from(v: bool) -> Self {
        Property::Bool(v)
    }
}
impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Property::String(v.to_string())
    }
}
impl From<String> for Property {
    fn from(v: String) -> Self {
        Property::String(v)
    }
}
impl From<Vec<u8>> for Property {
    fn from(v: Vec<u8>) -> Self {
        Property::Bytes(v)
    }
}
impl From<Vec<i32>> for Property {
    fn from(v: Vec<i32>) -> Self {
        Property::IntArray(v)
    }
}
impl From<Vec<i64>> for Property {
    fn from(v: Vec<i64>) -> Self {
        Property::LongArray(v)
    }
}
impl From<Vec<f32>> for Property {
    fn from(v: Vec<f32>) -> Self {
        Property::FloatArray(v)
    }
}
impl From<Vec<f64>> for Property {
    fn from(v: Vec<f64>) -> Self {
        Property::DoubleArray(v)
    }
}
impl From<Vec<bool>> for Property {
    fn from(v: Vec<bool>) -> Self {
        Property::BoolArray(v)
    }
}

/// A node in an FBX tree: a name, an ordered property list and ordered
/// child nodes.
///
/// A child list containing one or more `None` entries is treated differently
/// than an empty list, and represented differently in all FBX output files:
/// it stands for a block that was explicitly opened and closed with no
/// content, and must round-trip as such.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FbxNode {
    /// The node name, which is often a class type.
    /// Must be at most 255 bytes to be written to a binary stream.
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Option<FbxNode>>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>) -> Self {
        FbxNode {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Whether the node carries no data at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.properties.is_empty() && self.children.is_empty()
    }

    /// The first property, if any. Most leaf nodes carry exactly one value.
    pub fn value(&self) -> Option<&Property> {
        self.properties.first()
    }

    /// Append a named child and return a mutable reference to it.
    pub fn add(&mut self, name: impl Into<String>) -> &mut FbxNode {
        self.children.push(Some(FbxNode::new(name)));
        match self.children.last_mut() {
            Some(Some(node)) => node,
            _ => unreachable!(),
        }
    }

    /// Append a named child with an initial value, plus any extra trailing
    /// properties, and return a mutable reference to it.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Property>,
    ) -> &mut FbxNode {
        let node = self.add(name);
        node.properties.push(value.into());
        node
    }

    /// Append a named child carrying the given properties in order, and
    /// return a mutable reference to it.
    pub fn add_values(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Property>,
    ) -> &mut FbxNode {
        let node = self.add(name);
        node.properties.extend(values);
        node
    }

    /// The first direct child with the given name, skipping null sentinels.
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        find_child(&self.children, name)
    }

    /// Resolve a `/`-delimited path by repeated child lookup.
    ///
    /// Empty segments are skipped; resolution stops at the first segment
    /// with no matching child.
    pub fn get_relative(&self, path: &str) -> Option<&FbxNode> {
        let mut node = self;
        for seg in path.split('/') {
            if seg.is_empty() {
                continue;
            }
            node = node.child(seg)?;
        }
        Some(node)
    }
}

/// An FBX document: a format version plus an ordered list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FbxDocument {
    pub version: FbxVersion,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    pub fn new(version: FbxVersion) -> Self {
        FbxDocument {
            version,
            nodes: Vec::new(),
        }
    }

    /// Append a named top-level node and return a mutable reference to it.
    pub fn add(&mut self, name: impl Into<String>) -> &mut FbxNode {
        self.nodes.push(FbxNode::new(name));
        match self.nodes.last_mut() {
            Some(node) => node,
            None => unreachable!(),
        }
    }

    /// Append a named top-level node with an initial value and return a
    /// mutable reference to it.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Property>,
    ) -> &mut FbxNode {
        let node = self.add(name);
        node.properties.push(value.into());
        node
    }

    /// The first top-level node with the given name.
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Resolve a `/`-delimited path starting from the top-level nodes.
    pub fn get_relative(&self, path: &str) -> Option<&FbxNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut node = self.child(first)?;
        for seg in segments {
            node = node.child(seg)?;
        }
        Some(node)
    }
}

fn find_child<'a>(children: &'a [Option<FbxNode>], name: &str) -> Option<&'a FbxNode> {
    children
        .iter()
        .filter_map(|c| c.as_ref())
        .find(|n| n.name == name)
}
