use std::sync::Arc;

pub type SchemaRef = Arc<Schema>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn with_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Position of the first field called `name`. Names are not required to
    /// be unique.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Binary,
    Utf8,
    List(Box<Field>),
    Struct(Vec<Field>),
}

impl DataType {
    /// Byte width of one value for fixed-width types. Boolean is bit-packed
    /// and has no byte width.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::Boolean | Self::Binary | Self::Utf8 | Self::List(_) | Self::Struct(_) => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::List(_) | Self::Struct(_))
    }

    /// Child fields in declaration order: one for List, one per member for
    /// Struct, none otherwise.
    pub fn children(&self) -> &[Field] {
        match self {
            Self::List(field) => std::slice::from_ref(field.as_ref()),
            Self::Struct(fields) => fields.as_slice(),
            _ => &[],
        }
    }

    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Self::Boolean => 0x01,
            Self::Int8 => 0x02,
            Self::Int16 => 0x03,
            Self::Int32 => 0x04,
            Self::Int64 => 0x05,
            Self::UInt8 => 0x06,
            Self::UInt16 => 0x07,
            Self::UInt32 => 0x08,
            Self::UInt64 => 0x09,
            Self::Float32 => 0x0A,
            Self::Float64 => 0x0B,
            Self::Binary => 0x10,
            Self::Utf8 => 0x11,
            Self::List(_) => 0x20,
            Self::Struct(_) => 0x21,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children() {
        let item = Field::new("item", DataType::Int32, true);
        let list = DataType::List(Box::new(item.clone()));
        assert_eq!(list.children(), &[item.clone()]);

        let point = DataType::Struct(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Float64, false),
        ]);
        assert_eq!(point.children().len(), 2);
        assert_eq!(point.children()[1].name(), "y");

        assert!(DataType::Utf8.children().is_empty());
        assert!(list.is_nested());
        assert!(!DataType::Boolean.is_nested());
    }

    #[test]
    fn test_index_of_returns_first_match() {
        let schema = Schema::with_fields(vec![
            Field::new("a", DataType::Int8, false),
            Field::new("b", DataType::Utf8, true),
            Field::new("a", DataType::Int64, false),
        ]);
        assert_eq!(schema.index_of("a"), Some(0));
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
    }
}
