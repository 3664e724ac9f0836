//! Binary encoding of tag trees.
//!
//! All numbers are big-endian. A named tag is `type, name, payload`; list
//! elements are bare payloads behind a single element type and an i32
//! count; compounds are named tags closed by a `TAG_End` byte.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{NbtError, Result};
use crate::tag::{Compound, List, Tag, TagType};

/// Nesting limit for lists and compounds. Real chunk data stays far below.
pub const MAX_DEPTH: usize = 512;

/// Reads a full named tag: type byte, name, payload.
///
/// A lone `TAG_End` is returned with an empty name and no payload.
pub fn read_named<R: Read>(reader: &mut R) -> Result<(String, Tag)> {
    let tag_type = read_type(reader)?;
    if tag_type == TagType::End {
        return Ok((String::new(), Tag::End));
    }
    let name = read_string(reader)?;
    let tag = read_payload(reader, tag_type, 0)?;
    Ok((name, tag))
}

pub fn write_named<W: Write>(writer: &mut W, name: &str, tag: &Tag) -> Result<()> {
    writer.write_u8(tag.tag_type().id())?;
    if let Tag::End = tag {
        return Ok(());
    }
    write_string(writer, name)?;
    write_payload(writer, tag)
}

fn read_type<R: Read>(reader: &mut R) -> Result<TagType> {
    let id = reader
        .read_u8()
        .map_err(|e| NbtError::truncated(e, "tag type"))?;
    TagType::try_from(id)
}

fn read_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let len = reader
        .read_i32::<BigEndian>()
        .map_err(|e| NbtError::truncated(e, what))?;
    usize::try_from(len).map_err(|_| NbtError::malformed(format!("negative {what} length {len}")))
}

// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_bytes<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(NbtError::malformed(format!(
            "{what} of {len} bytes reads past end of stream"
        )));
    }
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader
        .read_u16::<BigEndian>()
        .map_err(|e| NbtError::truncated(e, "string length"))?;
    let bytes = read_bytes(reader, len as usize, "string")?;
    String::from_utf8(bytes).map_err(|e| NbtError::malformed(format!("invalid UTF-8 string: {e}")))
}

fn read_int_array<R: Read>(reader: &mut R) -> Result<Vec<i32>> {
    let len = read_len(reader, "int array")?;
    let bytes = read_bytes(reader, len.saturating_mul(4), "int array")?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_payload<R: Read>(reader: &mut R, tag_type: TagType, depth: usize) -> Result<Tag> {
    let what = tag_type.name();
    let tag = match tag_type {
        TagType::End => Tag::End,
        TagType::Byte => Tag::Byte(reader.read_i8().map_err(|e| NbtError::truncated(e, what))?),
        TagType::Short => Tag::Short(
            reader
                .read_i16::<BigEndian>()
                .map_err(|e| NbtError::truncated(e, what))?,
        ),
        TagType::Int => Tag::Int(
            reader
                .read_i32::<BigEndian>()
                .map_err(|e| NbtError::truncated(e, what))?,
        ),
        TagType::Long => Tag::Long(
            reader
                .read_i64::<BigEndian>()
                .map_err(|e| NbtError::truncated(e, what))?,
        ),
        TagType::Float => Tag::Float(
            reader
                .read_f32::<BigEndian>()
                .map_err(|e| NbtError::truncated(e, what))?,
        ),
        TagType::Double => Tag::Double(
            reader
                .read_f64::<BigEndian>()
                .map_err(|e| NbtError::truncated(e, what))?,
        ),
        TagType::ByteArray => {
            let len = read_len(reader, "byte array")?;
            Tag::ByteArray(read_bytes(reader, len, "byte array")?)
        }
        TagType::String => Tag::String(read_string(reader)?),
        TagType::IntArray => Tag::IntArray(read_int_array(reader)?),
        TagType::List => Tag::List(read_list(reader, depth + 1)?),
        TagType::Compound => Tag::Compound(read_compound(reader, depth + 1)?),
    };
    Ok(tag)
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(NbtError::malformed(format!(
            "nesting deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

fn read_list<R: Read>(reader: &mut R, depth: usize) -> Result<List> {
    check_depth(depth)?;
    let element_type = read_type(reader)?;
    let len = read_len(reader, "list")?;
    if element_type == TagType::End && len > 0 {
        return Err(NbtError::malformed(format!(
            "list of {len} TAG_End elements"
        )));
    }
    let mut list = List::new(element_type);
    for _ in 0..len {
        list.push(read_payload(reader, element_type, depth)?)?;
    }
    Ok(list)
}

pub(crate) fn read_compound<R: Read>(reader: &mut R, depth: usize) -> Result<Compound> {
    check_depth(depth)?;
    let mut compound = Compound::new();
    loop {
        let tag_type = read_type(reader)?;
        if tag_type == TagType::End {
            return Ok(compound);
        }
        let name = read_string(reader)?;
        let tag = read_payload(reader, tag_type, depth)?;
        compound.insert(name, tag);
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes does not fit a u16 length", value.len()),
        )
    })?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "sequence too long for an i32 length")
    })?;
    writer.write_i32::<BigEndian>(len)?;
    Ok(())
}

fn write_int_array<W: Write>(writer: &mut W, values: &[i32]) -> Result<()> {
    write_len(writer, values.len())?;
    for value in values {
        writer.write_i32::<BigEndian>(*value)?;
    }
    Ok(())
}

fn write_payload<W: Write>(writer: &mut W, tag: &Tag) -> Result<()> {
    match tag {
        Tag::End => {}
        Tag::Byte(v) => writer.write_i8(*v)?,
        Tag::Short(v) => writer.write_i16::<BigEndian>(*v)?,
        Tag::Int(v) => writer.write_i32::<BigEndian>(*v)?,
        Tag::Long(v) => writer.write_i64::<BigEndian>(*v)?,
        Tag::Float(v) => writer.write_f32::<BigEndian>(*v)?,
        Tag::Double(v) => writer.write_f64::<BigEndian>(*v)?,
        Tag::ByteArray(v) => {
            write_len(writer, v.len())?;
            writer.write_all(v)?;
        }
        Tag::String(v) => write_string(writer, v)?,
        Tag::IntArray(v) => write_int_array(writer, v)?,
        Tag::List(list) => write_list(writer, list)?,
        Tag::Compound(compound) => write_compound(writer, compound)?,
    }
    Ok(())
}

fn write_list<W: Write>(writer: &mut W, list: &List) -> Result<()> {
    writer.write_u8(list.element_type().id())?;
    write_len(writer, list.len())?;
    match list {
        List::End => {}
        List::Byte(v) => v.iter().try_for_each(|x| writer.write_i8(*x))?,
        List::Short(v) => v.iter().try_for_each(|x| writer.write_i16::<BigEndian>(*x))?,
        List::Int(v) => v.iter().try_for_each(|x| writer.write_i32::<BigEndian>(*x))?,
        List::Long(v) => v.iter().try_for_each(|x| writer.write_i64::<BigEndian>(*x))?,
        List::Float(v) => v.iter().try_for_each(|x| writer.write_f32::<BigEndian>(*x))?,
        List::Double(v) => v.iter().try_for_each(|x| writer.write_f64::<BigEndian>(*x))?,
        List::ByteArray(v) => {
            for bytes in v {
                write_len(writer, bytes.len())?;
                writer.write_all(bytes)?;
            }
        }
        List::String(v) => {
            for s in v {
                write_string(writer, s)?;
            }
        }
        List::List(v) => {
            for inner in v {
                write_list(writer, inner)?;
            }
        }
        List::Compound(v) => {
            for compound in v {
                write_compound(writer, compound)?;
            }
        }
        List::IntArray(v) => {
            for ints in v {
                write_int_array(writer, ints)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn write_compound<W: Write>(writer: &mut W, compound: &Compound) -> Result<()> {
    for (name, tag) in compound.iter() {
        write_named(writer, name, tag)?;
    }
    writer.write_u8(TagType::End.id())?;
    Ok(())
}
