//! The tag tree.
//!
//! `Tag` is a closed set of variants. Lists carry their element type in
//! their own variant (`List::Int(Vec<i32>)`, `List::Compound(Vec<Compound>)`
//! and so on), so a heterogeneous list cannot be built in the first place.
//! Compounds keep insertion order and unique keys.

use std::fmt;

use crate::error::{NbtError, Result};

/// Type discriminant as stored in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
}

impl TagType {
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => TagType::End,
            1 => TagType::Byte,
            2 => TagType::Short,
            3 => TagType::Int,
            4 => TagType::Long,
            5 => TagType::Float,
            6 => TagType::Double,
            7 => TagType::ByteArray,
            8 => TagType::String,
            9 => TagType::List,
            10 => TagType::Compound,
            11 => TagType::IntArray,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TagType::End => "TAG_End",
            TagType::Byte => "TAG_Byte",
            TagType::Short => "TAG_Short",
            TagType::Int => "TAG_Int",
            TagType::Long => "TAG_Long",
            TagType::Float => "TAG_Float",
            TagType::Double => "TAG_Double",
            TagType::ByteArray => "TAG_Byte_Array",
            TagType::String => "TAG_String",
            TagType::List => "TAG_List",
            TagType::Compound => "TAG_Compound",
            TagType::IntArray => "TAG_Int_Array",
        }
    }
}

impl TryFrom<u8> for TagType {
    type Error = NbtError;

    fn try_from(id: u8) -> Result<Self> {
        TagType::from_id(id).ok_or_else(|| NbtError::malformed(format!("unknown tag type {id}")))
    }
}

#[derive(Debug, Clone)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
}

impl Tag {
    pub fn tag_type(&self) -> TagType {
        match self {
            Tag::End => TagType::End,
            Tag::Byte(_) => TagType::Byte,
            Tag::Short(_) => TagType::Short,
            Tag::Int(_) => TagType::Int,
            Tag::Long(_) => TagType::Long,
            Tag::Float(_) => TagType::Float,
            Tag::Double(_) => TagType::Double,
            Tag::ByteArray(_) => TagType::ByteArray,
            Tag::String(_) => TagType::String,
            Tag::List(_) => TagType::List,
            Tag::Compound(_) => TagType::Compound,
            Tag::IntArray(_) => TagType::IntArray,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Tag::List(l) => Some(l),
            _ => None,
        }
    }
}

// Floats compare by bit pattern: a decoded tree must be identical to the
// encoded one, NaN payloads included.
impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::End, Tag::End) => true,
            (Tag::Byte(a), Tag::Byte(b)) => a == b,
            (Tag::Short(a), Tag::Short(b)) => a == b,
            (Tag::Int(a), Tag::Int(b)) => a == b,
            (Tag::Long(a), Tag::Long(b)) => a == b,
            (Tag::Float(a), Tag::Float(b)) => a.to_bits() == b.to_bits(),
            (Tag::Double(a), Tag::Double(b)) => a.to_bits() == b.to_bits(),
            (Tag::ByteArray(a), Tag::ByteArray(b)) => a == b,
            (Tag::String(a), Tag::String(b)) => a == b,
            (Tag::List(a), Tag::List(b)) => a == b,
            (Tag::Compound(a), Tag::Compound(b)) => a == b,
            (Tag::IntArray(a), Tag::IntArray(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Tag {
            fn from(value: $ty) -> Self {
                Tag::$variant(value)
            }
        })*
    };
}

impl_from! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Vec<u8> => ByteArray,
    String => String,
    List => List,
    Compound => Compound,
    Vec<i32> => IntArray,
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::String(value.to_string())
    }
}

/// A homogeneous list. The variant is the declared element type.
#[derive(Debug, Clone)]
pub enum List {
    End,
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ByteArray(Vec<Vec<u8>>),
    String(Vec<String>),
    List(Vec<List>),
    Compound(Vec<Compound>),
    IntArray(Vec<Vec<i32>>),
}

impl List {
    /// An empty list declaring `element_type`.
    pub fn new(element_type: TagType) -> Self {
        match element_type {
            TagType::End => List::End,
            TagType::Byte => List::Byte(Vec::new()),
            TagType::Short => List::Short(Vec::new()),
            TagType::Int => List::Int(Vec::new()),
            TagType::Long => List::Long(Vec::new()),
            TagType::Float => List::Float(Vec::new()),
            TagType::Double => List::Double(Vec::new()),
            TagType::ByteArray => List::ByteArray(Vec::new()),
            TagType::String => List::String(Vec::new()),
            TagType::List => List::List(Vec::new()),
            TagType::Compound => List::Compound(Vec::new()),
            TagType::IntArray => List::IntArray(Vec::new()),
        }
    }

    pub fn element_type(&self) -> TagType {
        match self {
            List::End => TagType::End,
            List::Byte(_) => TagType::Byte,
            List::Short(_) => TagType::Short,
            List::Int(_) => TagType::Int,
            List::Long(_) => TagType::Long,
            List::Float(_) => TagType::Float,
            List::Double(_) => TagType::Double,
            List::ByteArray(_) => TagType::ByteArray,
            List::String(_) => TagType::String,
            List::List(_) => TagType::List,
            List::Compound(_) => TagType::Compound,
            List::IntArray(_) => TagType::IntArray,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            List::End => 0,
            List::Byte(v) => v.len(),
            List::Short(v) => v.len(),
            List::Int(v) => v.len(),
            List::Long(v) => v.len(),
            List::Float(v) => v.len(),
            List::Double(v) => v.len(),
            List::ByteArray(v) => v.len(),
            List::String(v) => v.len(),
            List::List(v) => v.len(),
            List::Compound(v) => v.len(),
            List::IntArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a tag, rejecting anything that is not of the element type.
    pub fn push(&mut self, tag: Tag) -> Result<()> {
        let expected = self.element_type();
        match (self, tag) {
            (List::Byte(v), Tag::Byte(x)) => v.push(x),
            (List::Short(v), Tag::Short(x)) => v.push(x),
            (List::Int(v), Tag::Int(x)) => v.push(x),
            (List::Long(v), Tag::Long(x)) => v.push(x),
            (List::Float(v), Tag::Float(x)) => v.push(x),
            (List::Double(v), Tag::Double(x)) => v.push(x),
            (List::ByteArray(v), Tag::ByteArray(x)) => v.push(x),
            (List::String(v), Tag::String(x)) => v.push(x),
            (List::List(v), Tag::List(x)) => v.push(x),
            (List::Compound(v), Tag::Compound(x)) => v.push(x),
            (List::IntArray(v), Tag::IntArray(x)) => v.push(x),
            (_, tag) => {
                return Err(NbtError::ListTypeMismatch {
                    expected,
                    found: tag.tag_type(),
                });
            }
        }
        Ok(())
    }

    /// Element `index` as an owned tag.
    pub fn get(&self, index: usize) -> Option<Tag> {
        Some(match self {
            List::End => return None,
            List::Byte(v) => Tag::Byte(*v.get(index)?),
            List::Short(v) => Tag::Short(*v.get(index)?),
            List::Int(v) => Tag::Int(*v.get(index)?),
            List::Long(v) => Tag::Long(*v.get(index)?),
            List::Float(v) => Tag::Float(*v.get(index)?),
            List::Double(v) => Tag::Double(*v.get(index)?),
            List::ByteArray(v) => Tag::ByteArray(v.get(index)?.clone()),
            List::String(v) => Tag::String(v.get(index)?.clone()),
            List::List(v) => Tag::List(v.get(index)?.clone()),
            List::Compound(v) => Tag::Compound(v.get(index)?.clone()),
            List::IntArray(v) => Tag::IntArray(v.get(index)?.clone()),
        })
    }

    pub fn as_compounds(&self) -> Option<&[Compound]> {
        match self {
            List::Compound(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (List::End, List::End) => true,
            (List::Byte(a), List::Byte(b)) => a == b,
            (List::Short(a), List::Short(b)) => a == b,
            (List::Int(a), List::Int(b)) => a == b,
            (List::Long(a), List::Long(b)) => a == b,
            (List::Float(a), List::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (List::Double(a), List::Double(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (List::ByteArray(a), List::ByteArray(b)) => a == b,
            (List::String(a), List::String(b)) => a == b,
            (List::List(a), List::List(b)) => a == b,
            (List::Compound(a), List::Compound(b)) => a == b,
            (List::IntArray(a), List::IntArray(b)) => a == b,
            _ => false,
        }
    }
}

/// Named tags in insertion order. Inserting an existing name replaces the
/// previous tag in place.
#[derive(Debug, Clone, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a tag, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, tag: impl Into<Tag>) -> Option<Tag> {
        let name = name.into();
        let tag = tag.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, tag)),
            None => {
                self.entries.push((name, tag));
                None
            }
        }
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, tag: impl Into<Tag>) -> Self {
        self.insert(name, tag);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.iter().find(|(key, _)| key == name).map(|(_, tag)| tag)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, tag)| tag)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(key, tag)| (key.as_str(), tag))
    }

    pub fn has_tag(&self, name: &str, tag_type: TagType) -> bool {
        self.get(name).is_some_and(|tag| tag.tag_type() == tag_type)
    }

    /// Whether `name` is a byte array, of exactly `len` bytes if given.
    pub fn has_byte_array(&self, name: &str, len: Option<usize>) -> bool {
        self.get_byte_array(name)
            .is_some_and(|bytes| len.is_none_or(|len| bytes.len() == len))
    }

    pub fn has_int_array(&self, name: &str, len: Option<usize>) -> bool {
        self.get_int_array(name)
            .is_some_and(|ints| len.is_none_or(|len| ints.len() == len))
    }

    pub fn has_list(&self, name: &str, element_type: TagType) -> bool {
        self.get_list(name)
            .is_some_and(|list| list.element_type() == element_type)
    }

    pub fn get_byte(&self, name: &str) -> Option<i8> {
        match self.get(name)? {
            Tag::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_short(&self, name: &str) -> Option<i16> {
        match self.get(name)? {
            Tag::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Tag::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            Tag::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Tag::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Tag::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_byte_array(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_int_array(&self, name: &str) -> Option<&[i32]> {
        match self.get(name)? {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&List> {
        self.get(name)?.as_list()
    }

    pub fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name)?.as_compound()
    }
}

// Mapping equality: same keys with equal tags, independent of order.
impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, tag)| other.get(key).is_some_and(|t| t == tag))
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        let mut compound = Compound::new();
        for (name, tag) in iter {
            compound.insert(name, tag);
        }
        compound
    }
}

fn dump_tag(f: &mut fmt::Formatter<'_>, indent: usize, name: Option<&str>, tag: &Tag) -> fmt::Result {
    write!(f, "{:indent$}{}", "", tag.tag_type().name(), indent = indent)?;
    if let Some(name) = name {
        write!(f, "(\"{name}\")")?;
    }
    match tag {
        Tag::End => writeln!(f),
        Tag::Byte(v) => writeln!(f, ": {v}"),
        Tag::Short(v) => writeln!(f, ": {v}"),
        Tag::Int(v) => writeln!(f, ": {v}"),
        Tag::Long(v) => writeln!(f, ": {v}"),
        Tag::Float(v) => writeln!(f, ": {v}"),
        Tag::Double(v) => writeln!(f, ": {v}"),
        Tag::String(v) => writeln!(f, ": {v}"),
        Tag::ByteArray(v) => writeln!(f, ": {} entries", v.len()),
        Tag::IntArray(v) => writeln!(f, ": {} entries", v.len()),
        Tag::List(list) => {
            writeln!(
                f,
                ": {} entries of type {}",
                list.len(),
                list.element_type().name()
            )?;
            writeln!(f, "{:indent$}{{", "", indent = indent)?;
            for i in 0..list.len() {
                if let Some(element) = list.get(i) {
                    dump_tag(f, indent + 3, None, &element)?;
                }
            }
            writeln!(f, "{:indent$}}}", "", indent = indent)
        }
        Tag::Compound(compound) => {
            writeln!(f, ": {} entries", compound.len())?;
            writeln!(f, "{:indent$}{{", "", indent = indent)?;
            for (key, child) in compound.iter() {
                dump_tag(f, indent + 3, Some(key), child)?;
            }
            writeln!(f, "{:indent$}}}", "", indent = indent)
        }
    }
}

/// Indented dump, one tag per line.
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dump_tag(f, 0, None, self)
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, tag) in self.iter() {
            dump_tag(f, 0, Some(key), tag)?;
        }
        Ok(())
    }
}
