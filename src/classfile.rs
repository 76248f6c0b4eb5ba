//! Just enough of the class-file format to pull out the `SourceFile` and
//! `SourceDebugExtension` attributes.

use crate::error::ClassFileError;
use tracing::trace;

const MAGIC: u32 = 0xCAFE_BABE;

/// Debug attributes of one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDebugInfo {
    /// `SourceFile`: name of the file the class was compiled from
    pub source_file: Option<String>,
    /// `SourceDebugExtension`: usually a debug map
    pub debug_extension: Option<String>,
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Constant pool with only the UTF-8 entries kept
struct ConstantPool<'a> {
    utf8: Vec<Option<&'a [u8]>>,
}

impl<'a> ConstantPool<'a> {
    fn read(reader: &mut ByteReader<'a>) -> Result<Self, ClassFileError> {
        let count = reader.u16()?;
        let mut utf8 = vec![None; usize::from(count)];

        let mut index = 1u16;
        while index < count {
            let tag = reader.u8()?;
            let mut slots = 1;
            match tag {
                1 => {
                    let len = reader.u16()?;
                    utf8[usize::from(index)] = Some(reader.take(usize::from(len))?);
                }
                // Class, String, MethodType, Module, Package
                7 | 8 | 16 | 19 | 20 => {
                    reader.take(2)?;
                }
                // MethodHandle
                15 => {
                    reader.take(3)?;
                }
                // Integer, Float, member refs, NameAndType, Dynamic, InvokeDynamic
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.take(4)?;
                }
                // Long and Double occupy two slots
                5 | 6 => {
                    reader.take(8)?;
                    slots = 2;
                }
                _ => return Err(ClassFileError::BadConstant { index, tag }),
            }
            index = index.saturating_add(slots);
        }

        Ok(Self { utf8 })
    }

    fn raw(&self, index: u16) -> Option<&'a [u8]> {
        self.utf8.get(usize::from(index)).copied().flatten()
    }

    fn string(&self, index: u16) -> Result<String, ClassFileError> {
        self.raw(index)
            .and_then(decode_modified_utf8)
            .ok_or(ClassFileError::BadUtf8 { index })
    }
}

/// Skip a fields or methods table
fn skip_members(reader: &mut ByteReader<'_>) -> Result<(), ClassFileError> {
    let count = reader.u16()?;
    for _ in 0..count {
        reader.take(6)?; // access flags, name, descriptor
        let attributes = reader.u16()?;
        for _ in 0..attributes {
            reader.take(2)?;
            let len = reader.u32()?;
            reader.take(len as usize)?;
        }
    }
    Ok(())
}

/// Read the class-level debug attributes from a class file image
pub fn read_debug_info(bytes: &[u8]) -> Result<ClassDebugInfo, ClassFileError> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    reader.take(4)?; // minor, major version

    let pool = ConstantPool::read(&mut reader)?;

    reader.take(6)?; // access flags, this class, super class
    let interfaces = reader.u16()?;
    reader.take(usize::from(interfaces) * 2)?;

    skip_members(&mut reader)?; // fields
    skip_members(&mut reader)?; // methods

    let mut info = ClassDebugInfo::default();
    let attributes = reader.u16()?;
    for _ in 0..attributes {
        let name = reader.u16()?;
        let len = reader.u32()?;
        let body = reader.take(len as usize)?;

        match pool.raw(name) {
            Some(b"SourceFile") if body.len() >= 2 => {
                let index = u16::from_be_bytes([body[0], body[1]]);
                info.source_file = Some(pool.string(index)?);
            }
            Some(b"SourceDebugExtension") => {
                info.debug_extension = Some(String::from_utf8_lossy(body).into_owned());
            }
            _ => {}
        }
    }

    trace!(
        target: "classfile",
        source_file = info.source_file.as_deref(),
        has_debug_extension = info.debug_extension.is_some(),
        "read class debug attributes"
    );

    Ok(info)
}

/// Decode the JVM's modified UTF-8 (two-byte NUL, surrogates encoded
/// separately)
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let continuation = |k: usize| bytes.get(i + k).filter(|c| *c & 0xC0 == 0x80).map(|c| u16::from(c & 0x3F));
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | continuation(1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push((u16::from(b & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_entry(out: &mut Vec<u8>, text: &[u8]) {
        out.push(1);
        out.extend_from_slice(&(text.len() as u16).to_be_bytes());
        out.extend_from_slice(text);
    }

    /// Minimal class image. Pool: 1 "SourceFile", 2 Long (2 slots),
    /// 4 source name, 5 "SourceDebugExtension", 6 "Code", 7 Class #4
    fn class_image(source: &[u8], smap: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&8u16.to_be_bytes());
        utf8_entry(&mut out, b"SourceFile");
        out.push(5);
        out.extend_from_slice(&[0; 8]);
        utf8_entry(&mut out, source);
        utf8_entry(&mut out, b"SourceDebugExtension");
        utf8_entry(&mut out, b"Code");
        out.extend_from_slice(&[7, 0, 4]);

        out.extend_from_slice(&[0, 0x21, 0, 7, 0, 0]); // flags, this, super
        out.extend_from_slice(&[0, 0]); // interfaces
        out.extend_from_slice(&[0, 0]); // fields
        // one method with a Code attribute
        out.extend_from_slice(&[0, 1, 0, 1, 0, 6, 0, 6, 0, 1, 0, 6]);
        out.extend_from_slice(&3u32.to_be_bytes());
        out.extend_from_slice(&[1, 2, 3]);

        let count: u16 = if smap.is_some() { 2 } else { 1 };
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&[0, 1]);
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&[0, 4]);
        if let Some(smap) = smap {
            out.extend_from_slice(&[0, 5]);
            out.extend_from_slice(&(smap.len() as u32).to_be_bytes());
            out.extend_from_slice(smap);
        }
        out
    }

    #[test]
    fn test_reads_attributes() {
        let image = class_image(b"hello_jsp.java", Some(b"SMAP\nhello_jsp.java\n"));
        let info = read_debug_info(&image).unwrap();
        assert_eq!(info.source_file.as_deref(), Some("hello_jsp.java"));
        assert_eq!(info.debug_extension.as_deref(), Some("SMAP\nhello_jsp.java\n"));
    }

    #[test]
    fn test_missing_debug_extension() {
        let info = read_debug_info(&class_image(b"A.java", None)).unwrap();
        assert_eq!(info.source_file.as_deref(), Some("A.java"));
        assert_eq!(info.debug_extension, None);
    }

    #[test]
    fn test_modified_utf8_source_name() {
        // "é" and an encoded NUL
        let info = read_debug_info(&class_image(b"\xc3\xa9\xc0\x80.kt", None)).unwrap();
        assert_eq!(info.source_file.as_deref(), Some("é\0.kt"));
    }

    #[test]
    fn test_bad_utf8() {
        let err = read_debug_info(&class_image(b"\xff", None)).unwrap_err();
        assert_eq!(err, ClassFileError::BadUtf8 { index: 4 });
    }

    #[test]
    fn test_bad_magic() {
        let err = read_debug_info(&[0xde, 0xad, 0xbe, 0xef, 0, 0]).unwrap_err();
        assert_eq!(err, ClassFileError::BadMagic(0xdeadbeef));
    }

    #[test]
    fn test_truncated() {
        let image = class_image(b"A.java", Some(b"SMAP"));
        let err = read_debug_info(&image[..image.len() - 2]).unwrap_err();
        assert!(matches!(err, ClassFileError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_constant_tag() {
        let mut image = MAGIC.to_be_bytes().to_vec();
        image.extend_from_slice(&[0, 0, 0, 52, 0, 2, 99]);
        let err = read_debug_info(&image).unwrap_err();
        assert_eq!(err, ClassFileError::BadConstant { index: 1, tag: 99 });
    }
}
