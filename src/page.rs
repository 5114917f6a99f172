//! In-memory buffer the size of one disk block, with typed accessors.

use crate::codec;

/// A fixed-size in-memory buffer representing the contents of one block.
///
/// `Page` imposes exactly the structure the core needs and nothing more:
/// big-endian `i32`s, and length-prefixed byte strings / ASCII strings. Any
/// further structure (slotted records, schemas, catalogs) is the
/// responsibility of layers above the buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    contents: Vec<u8>,
}

impl Page {
    /// Creates a new page of `block_size` zeroed bytes.
    pub fn new(block_size: usize) -> Self {
        Self {
            contents: vec![0u8; block_size],
        }
    }

    /// Wraps an existing byte buffer as a page (used by the log manager,
    /// which builds a record's bytes directly before handing them to
    /// [`crate::log::LogManager::append`]).
    pub fn from_bytes(contents: Vec<u8>) -> Self {
        Self { contents }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.contents
    }

    pub fn get_int(&self, offset: usize) -> i32 {
        codec::decode_i32(&self.contents, offset)
    }

    pub fn set_int(&mut self, offset: usize, value: i32) {
        let bytes = value.to_be_bytes();
        self.contents[offset..offset + codec::INT_BYTES].copy_from_slice(&bytes);
    }

    pub fn get_bytes(&self, offset: usize) -> Vec<u8> {
        codec::decode_bytes(&self.contents, offset).0
    }

    pub fn set_bytes(&mut self, offset: usize, value: &[u8]) {
        self.set_int(offset, value.len() as i32);
        let start = offset + codec::INT_BYTES;
        self.contents[start..start + value.len()].copy_from_slice(value);
    }

    pub fn get_string(&self, offset: usize) -> String {
        codec::decode_string(&self.contents, offset).0
    }

    /// Panics if `value` is not ASCII — see [`codec::encode_string`] for why.
    pub fn set_string(&mut self, offset: usize, value: &str) {
        assert!(
            value.is_ascii(),
            "Page::set_string only supports ASCII strings, got {value:?}"
        );
        self.set_bytes(offset, value.as_bytes());
    }

    /// On-page size, in bytes, of a string of `char_count` ASCII characters.
    pub const fn max_length(char_count: usize) -> usize {
        codec::max_length(char_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_page_is_zeroed() {
        let page = Page::new(400);
        assert_eq!(page.len(), 400);
        assert!(page.contents().iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn int_round_trips(offset in 0usize..390, value in any::<i32>()) {
            let mut page = Page::new(400);
            page.set_int(offset, value);
            prop_assert_eq!(page.get_int(offset), value);
        }

        #[test]
        fn string_round_trips(offset in 0usize..300, s in "[a-zA-Z0-9 ]{0,80}") {
            let mut page = Page::new(400);
            prop_assume!(offset + Page::max_length(s.len()) <= 400);
            page.set_string(offset, &s);
            prop_assert_eq!(page.get_string(offset), s);
        }

        #[test]
        fn bytes_round_trips(offset in 0usize..300, data in proptest::collection::vec(any::<u8>(), 0..80)) {
            let mut page = Page::new(400);
            prop_assume!(offset + codec::max_length(data.len()) <= 400);
            page.set_bytes(offset, &data);
            prop_assert_eq!(page.get_bytes(offset), data);
        }
    }

    #[test]
    fn max_length_accounts_for_length_prefix() {
        assert_eq!(Page::max_length(0), 4);
        assert_eq!(Page::max_length(5), 9);
    }

    #[test]
    #[should_panic(expected = "only supports ASCII")]
    fn set_string_rejects_non_ascii() {
        let mut page = Page::new(400);
        page.set_string(0, "café");
    }
}
