use alloc::{string::String, vec::Vec};
use core::{cmp, fmt, marker::PhantomData};

use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};

use crate::{byte_array::ByteArray, ptr_array::PtrArray};

const MAX_DESERIALIZE_SIZE: usize = 1 << 12;

impl Serialize for ByteArray {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self)
    }
}

struct ByteArrayVisitor;

impl<'de> de::Visitor<'de> for ByteArrayVisitor {
    type Value = ByteArray;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a byte string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.into())
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.into())
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.into())
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.into())
    }

    fn visit_seq<V>(self, mut seq: V) -> Result<Self::Value, V::Error>
    where
        V: de::SeqAccess<'de>,
    {
        let capacity = cmp::min(seq.size_hint().unwrap_or(0), MAX_DESERIALIZE_SIZE);
        let mut bytes = ByteArray::sized_new(capacity);
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.append(&[byte]);
        }
        Ok(bytes)
    }
}

impl<'de> Deserialize<'de> for ByteArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_byte_buf(ByteArrayVisitor)
    }
}

/// Serialized as the sequence of its elements, the terminator excluded.
impl<T: Serialize> Serialize for PtrArray<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for item in self {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

struct PtrArrayVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> de::Visitor<'de> for PtrArrayVisitor<T> {
    type Value = PtrArray<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of optional elements")
    }

    fn visit_seq<V>(self, mut seq: V) -> Result<Self::Value, V::Error>
    where
        V: de::SeqAccess<'de>,
    {
        let capacity = cmp::min(
            seq.size_hint().unwrap_or(0),
            MAX_DESERIALIZE_SIZE / cmp::max(core::mem::size_of::<Option<T>>(), 1),
        );
        let mut array = PtrArray::sized_new(capacity);
        while let Some(item) = seq.next_element()? {
            array.add(item);
        }
        Ok(array)
    }
}

/// Deserialized without a free function.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for PtrArray<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(PtrArrayVisitor(PhantomData))
    }
}
