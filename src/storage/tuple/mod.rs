use crate::errors::Result;
use crate::storage::page::PageId;
use crate::storage::StorageError;
use std::fmt;
use std::sync::Arc;

/// Maximum payload bytes of a string field.
pub const STRING_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Bytes the type occupies inside a tuple slot.
    pub fn len(self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str => 4 + STRING_LEN,
        }
    }

    fn parse(self, bytes: &[u8]) -> Result<Field> {
        match self {
            Type::Int => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                Ok(Field::Int(i32::from_be_bytes(raw)))
            }
            Type::Str => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                let len = (u32::from_be_bytes(raw) as usize).min(STRING_LEN);
                let s = std::str::from_utf8(&bytes[4..4 + len])
                    .map_err(|_| StorageError::InvalidUtf8)?;
                Ok(Field::Str(s.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn get_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Appends exactly `self.get_type().len()` bytes to `buf`.
    fn serialize(&self, buf: &mut Vec<u8>) {
        match self {
            Field::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Field::Str(s) => {
                let mut end = s.len().min(STRING_LEN);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                let bytes = &s.as_bytes()[..end];
                buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                buf.extend_from_slice(bytes);
                buf.resize(buf.len() + STRING_LEN - bytes.len(), 0);
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TdItem {
    field_type: Type,
    name: Option<String>,
}

/// Schema of a table: an ordered list of typed, optionally named fields.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    pub fn new(types: &[Type], names: &[&str]) -> Self {
        let items = types
            .iter()
            .enumerate()
            .map(|(i, t)| TdItem {
                field_type: *t,
                name: names.get(i).map(|n| n.to_string()),
            })
            .collect();
        Self { items }
    }

    pub fn unnamed(types: &[Type]) -> Self {
        Self::new(types, &[])
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.name.as_deref())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    /// Byte width of one tuple.
    pub fn size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.items.iter().map(|item| item.field_type)
    }
}

// Two schemas are equal when their field types line up; names are ignored.
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.types().eq(other.types())
    }
}

impl Eq for TupleDesc {}

/// Physical location of a stored tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        let matches = fields.len() == desc.num_fields()
            && fields.iter().zip(desc.types()).all(|(f, t)| f.get_type() == t);
        if !matches {
            return Err(StorageError::SchemaMismatch.into());
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.desc.size());
        for field in &self.fields {
            field.serialize(&mut buf);
        }
        buf
    }

    pub(crate) fn from_bytes(desc: &Arc<TupleDesc>, bytes: &[u8]) -> Result<Self> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for t in desc.types() {
            fields.push(t.parse(&bytes[offset..offset + t.len()])?);
            offset += t.len();
        }
        Ok(Self {
            desc: desc.clone(),
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self.fields.iter().map(|field| field.to_string()).collect();
        write!(f, "{}", cols.join("\t"))
    }
}
