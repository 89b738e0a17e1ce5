use bstr::{BStr, ByteSlice};

use crate::byte_array::ByteArray;

impl ByteArray {
    /// Views the bytes as a byte string, for display and text-like searching.
    pub fn as_bstr(&self) -> &BStr {
        self.as_slice().as_bstr()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use bstr::ByteSlice;

    use super::*;

    #[test]
    fn bstr_view() {
        let bytes = ByteArray::from(b"key=\xffvalue");
        assert_eq!(format!("{}", bytes.as_bstr()), "key=\u{FFFD}value");
        assert_eq!(bytes.as_bstr().find("value"), Some(5));
    }
}
