//! A `serde` deserializer over [`RawInput`].
//!
//! It only supports the types that can be built out of strings: strings themselves,
//! sequences of strings, options, newtypes and unit-only enums.
//! Everything else is reported as an unsupported type, a configuration error rather than
//! a validation failure.
use std::any::type_name;
use std::fmt::Display;

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::input::{RawInput, RawValue};

macro_rules! unsupported_type {
    ($trait_fn:ident) => {
        fn $trait_fn<V>(self, _: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            Err(InputDeserializationError::unsupported_type(type_name::<
                V::Value,
            >()))
        }
    };
}

#[derive(Debug)]
pub(super) struct InputDeserializationError {
    pub(super) kind: ErrorKind,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum ErrorKind {
    /// The target type can't be built from strings.
    UnsupportedType { name: &'static str },
    /// A required field is missing from the input.
    MissingField { field: &'static str },
    /// Catch-all, e.g. an unknown enum variant.
    Message(String),
}

impl InputDeserializationError {
    fn unsupported_type(name: &'static str) -> Self {
        Self {
            kind: ErrorKind::UnsupportedType { name },
        }
    }

    fn multiple_values(n: usize) -> Self {
        Self {
            kind: ErrorKind::Message(format!("Expected a single value, received {n} values")),
        }
    }
}

impl de::Error for InputDeserializationError {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Self {
            kind: ErrorKind::Message(msg.to_string()),
        }
    }

    fn missing_field(field: &'static str) -> Self {
        Self {
            kind: ErrorKind::MissingField { field },
        }
    }
}

impl Display for InputDeserializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::UnsupportedType { name } => write!(f, "`{name}` is not supported"),
            ErrorKind::MissingField { field } => write!(f, "missing field `{field}`"),
            ErrorKind::Message(m) => f.write_str(m),
        }
    }
}

impl std::error::Error for InputDeserializationError {}

/// Deserialize a [`RawInput`] as a map.
///
/// Keys that are present but carry no value are skipped, i.e. they are treated as if
/// they were missing.
pub(super) struct InputDeserializer<'de> {
    input: &'de RawInput,
}

impl<'de> InputDeserializer<'de> {
    pub(super) fn new(input: &'de RawInput) -> Self {
        Self { input }
    }
}

impl<'de> Deserializer<'de> for InputDeserializer<'de> {
    type Error = InputDeserializationError;

    unsupported_type!(deserialize_bool);
    unsupported_type!(deserialize_i8);
    unsupported_type!(deserialize_i16);
    unsupported_type!(deserialize_i32);
    unsupported_type!(deserialize_i64);
    unsupported_type!(deserialize_u8);
    unsupported_type!(deserialize_u16);
    unsupported_type!(deserialize_u32);
    unsupported_type!(deserialize_u64);
    unsupported_type!(deserialize_f32);
    unsupported_type!(deserialize_f64);
    unsupported_type!(deserialize_char);
    unsupported_type!(deserialize_str);
    unsupported_type!(deserialize_string);
    unsupported_type!(deserialize_bytes);
    unsupported_type!(deserialize_byte_buf);
    unsupported_type!(deserialize_option);
    unsupported_type!(deserialize_unit);
    unsupported_type!(deserialize_seq);
    unsupported_type!(deserialize_identifier);

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(EntriesAccess {
            entries: self.input.iter(),
            value: None,
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

struct EntriesAccess<'de, I> {
    entries: I,
    value: Option<&'de RawValue>,
}

impl<'de, I> MapAccess<'de> for EntriesAccess<'de, I>
where
    I: Iterator<Item = (&'de str, &'de RawValue)>,
{
    type Error = InputDeserializationError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        let next = self
            .entries
            .by_ref()
            .find(|(_, value)| !matches!(value, RawValue::Absent));
        match next {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(BorrowedStrDeserializer::<Self::Error>::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        match self.value.take() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)),
            None => Err(de::Error::custom("value is missing")),
        }
    }
}

/// Deserialize the value associated with a single key.
#[derive(Clone, Copy)]
enum ValueDeserializer<'de> {
    One(&'de str),
    Many(&'de [String]),
}

impl<'de> ValueDeserializer<'de> {
    fn new(value: &'de RawValue) -> Self {
        match value {
            RawValue::Single(s) => ValueDeserializer::One(s),
            RawValue::Multiple(values) => ValueDeserializer::Many(values),
            RawValue::Absent => ValueDeserializer::Many(&[]),
        }
    }

    fn single(self) -> Result<&'de str, InputDeserializationError> {
        match self {
            ValueDeserializer::One(s) => Ok(s),
            ValueDeserializer::Many(values) => {
                Err(InputDeserializationError::multiple_values(values.len()))
            }
        }
    }
}

impl<'de> Deserializer<'de> for ValueDeserializer<'de> {
    type Error = InputDeserializationError;

    unsupported_type!(deserialize_bool);
    unsupported_type!(deserialize_i8);
    unsupported_type!(deserialize_i16);
    unsupported_type!(deserialize_i32);
    unsupported_type!(deserialize_i64);
    unsupported_type!(deserialize_u8);
    unsupported_type!(deserialize_u16);
    unsupported_type!(deserialize_u32);
    unsupported_type!(deserialize_u64);
    unsupported_type!(deserialize_f32);
    unsupported_type!(deserialize_f64);
    unsupported_type!(deserialize_char);
    unsupported_type!(deserialize_bytes);
    unsupported_type!(deserialize_byte_buf);
    unsupported_type!(deserialize_unit);
    unsupported_type!(deserialize_map);

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self {
            ValueDeserializer::One(s) => visitor.visit_borrowed_str(s),
            ValueDeserializer::Many(_) => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.single()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self {
            ValueDeserializer::One(s) => visitor.visit_seq(ElementsAccess {
                elements: std::iter::once(s),
            }),
            ValueDeserializer::Many(values) => visitor.visit_seq(ElementsAccess {
                elements: values.iter().map(String::as_str),
            }),
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(BorrowedStrDeserializer::<Self::Error>::new(self.single()?))
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(InputDeserializationError::unsupported_type(type_name::<
            V::Value,
        >()))
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

struct ElementsAccess<I> {
    elements: I,
}

impl<'de, I> SeqAccess<'de> for ElementsAccess<I>
where
    I: Iterator<Item = &'de str>,
{
    type Error = InputDeserializationError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.elements.next() {
            Some(element) => seed.deserialize(ValueDeserializer::One(element)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        self.elements.size_hint().1
    }
}

/// Retrieve the field names of a struct, as declared in its `Deserialize` implementation.
///
/// Returns `None` if `T` doesn't deserialize itself as a struct.
pub(super) fn struct_fields<'de, T>() -> Option<&'static [&'static str]>
where
    T: de::Deserialize<'de>,
{
    struct FieldsProbe<'a> {
        fields: &'a mut Option<&'static [&'static str]>,
    }

    impl<'de> Deserializer<'de> for FieldsProbe<'_> {
        type Error = de::value::Error;

        fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            Err(de::Error::custom("not a struct"))
        }

        fn deserialize_struct<V>(
            self,
            _name: &'static str,
            fields: &'static [&'static str],
            _visitor: V,
        ) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            *self.fields = Some(fields);
            Err(de::Error::custom("fields collected"))
        }

        serde::forward_to_deserialize_any! {
            bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
            bytes byte_buf option unit unit_struct newtype_struct seq tuple
            tuple_struct map enum identifier ignored_any
        }
    }

    let mut fields = None;
    let _ = T::deserialize(FieldsProbe {
        fields: &mut fields,
    });
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Category {
        Tech,
        Design,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Post {
        category: Category,
        slug: String,
        #[serde(default)]
        tags: Vec<String>,
        sort: Option<String>,
    }

    fn deserialize<T: de::DeserializeOwned>(input: &RawInput) -> Result<T, ErrorKind> {
        T::deserialize(InputDeserializer::new(input)).map_err(|e| e.kind)
    }

    #[test]
    fn structs_with_strings_enums_and_sequences() {
        let input = RawInput::from_query("category=tech&slug=hello&tags=a&tags=b");
        let post: Post = deserialize(&input).unwrap();
        assert_eq!(
            post,
            Post {
                category: Category::Tech,
                slug: "hello".into(),
                tags: vec!["a".into(), "b".into()],
                sort: None,
            }
        );
    }

    #[test]
    fn absent_values_are_treated_as_missing() {
        let input = RawInput::new()
            .with("category", "design")
            .with("slug", "x")
            .with("sort", None::<String>)
            .with("tags", None::<String>);
        let post: Post = deserialize(&input).unwrap();
        assert_eq!(post.sort, None);
        assert!(post.tags.is_empty());
    }

    #[test]
    fn missing_fields_are_reported_by_name() {
        let input = RawInput::new().with("category", "tech");
        let err = deserialize::<Post>(&input).unwrap_err();
        assert_eq!(err, ErrorKind::MissingField { field: "slug" });
    }

    #[test]
    fn numbers_are_not_supported() {
        #[derive(serde::Deserialize, Debug)]
        struct Page {
            #[allow(dead_code)]
            page: u32,
        }
        let err = deserialize::<Page>(&RawInput::new().with("page", "1")).unwrap_err();
        assert_eq!(err, ErrorKind::UnsupportedType { name: "u32" });
    }

    #[test]
    fn struct_fields_are_introspected() {
        assert_eq!(
            struct_fields::<Post>(),
            Some(&["category", "slug", "tags", "sort"][..])
        );
        assert_eq!(struct_fields::<String>(), None);
    }
}
