//! A byte-granular memory model with copy-on-write pages.

use crate::architecture::Endian;
use crate::memory::MemoryPermissions;
use crate::memory::Value;
use crate::Error;
use crate::RC;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The size of the copy-on-write pages.
pub const PAGE_SIZE: usize = 1024;
pub const PAGE_MASK: u64 = !(PAGE_SIZE as u64 - 1);

/// A memory page.
///
/// These pages do not line up 1-to-1 with pages of the target architecture.
/// They are used for performance reasons in the copy-on-write memory model.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page {
    cells: Vec<Option<Value>>,
    permissions: Option<MemoryPermissions>,
}

impl Page {
    fn new(size: usize) -> Page {
        Page {
            cells: vec![None; size],
            permissions: None,
        }
    }

    fn store(&mut self, offset: usize, value: Value) {
        self.cells[offset] = Some(value);
    }

    fn load(&self, offset: usize) -> Option<&Value> {
        self.cells[offset].as_ref()
    }

    pub fn permissions(&self) -> Option<&MemoryPermissions> {
        self.permissions.as_ref()
    }

    pub fn set_permissions(&mut self, permissions: Option<MemoryPermissions>) {
        self.permissions = permissions;
    }
}

/// A copy-on-write paged memory model.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Memory {
    endian: Endian,
    pages: HashMap<u64, RC<Page>>,
}

impl Memory {
    /// Create a new paged memory model with the given endianness.
    pub fn new(endian: Endian) -> Memory {
        Memory {
            endian,
            pages: HashMap::new(),
        }
    }

    /// Get the endiannes of this memory model
    pub fn endian(&self) -> Endian {
        self.endian.clone()
    }

    /// Get the permissions for the given address.
    ///
    /// `None` means no permissions were ever set, and the address is
    /// unrestricted.
    pub fn permissions(&self, address: u64) -> Option<MemoryPermissions> {
        self.pages
            .get(&(address & PAGE_MASK))
            .and_then(|page| page.permissions().cloned())
    }

    /// Set memory permissions for every page touched by the given range.
    pub fn set_permissions(&mut self, address: u64, len: u64, permissions: MemoryPermissions) {
        if len == 0 {
            return;
        }
        let last_page = address.wrapping_add(len - 1) & PAGE_MASK;
        let mut page_address = address & PAGE_MASK;
        loop {
            RC::make_mut(
                self.pages
                    .entry(page_address)
                    .or_insert_with(|| RC::new(Page::new(PAGE_SIZE))),
            )
            .set_permissions(Some(permissions));
            if page_address == last_page {
                break;
            }
            page_address = page_address.wrapping_add(PAGE_SIZE as u64);
        }
    }

    fn writable(&self, address: u64) -> bool {
        self.permissions(address)
            .map(|permissions| permissions.contains(MemoryPermissions::WRITE))
            .unwrap_or(true)
    }

    fn store_cell(&mut self, address: u64, value: Value) {
        let page_address = address & PAGE_MASK;
        let offset = (address & !PAGE_MASK) as usize;

        if let Some(page) = self.pages.get_mut(&page_address) {
            RC::make_mut(page).store(offset, value);
            return;
        }
        let mut page = Page::new(PAGE_SIZE);
        page.store(offset, value);
        self.pages.insert(page_address, RC::new(page));
    }

    fn load_cell(&self, address: u64) -> Option<&Value> {
        let page_address = address & PAGE_MASK;
        let offset = (address & !PAGE_MASK) as usize;
        self.pages
            .get(&page_address)
            .and_then(|page| page.load(offset))
    }

    /// Store a sequence of 8-bit values starting at `address`.
    ///
    /// Either every byte is stored, or, if a byte is not 8 bits wide or falls
    /// on a page without write permission, none are.
    pub fn store_bytes(&mut self, address: u64, bytes: &[Value]) -> Result<(), Error> {
        for (i, byte) in bytes.iter().enumerate() {
            let byte_address = address.wrapping_add(i as u64);
            if byte.bits() != 8 {
                return Err(format!(
                    "Storing a {}-bit value as a byte at 0x{:x}",
                    byte.bits(),
                    byte_address
                )
                .into());
            }
            if !self.writable(byte_address) {
                return Err(Error::PermissionDenied(byte_address));
            }
        }

        for (i, byte) in bytes.iter().enumerate() {
            self.store_cell(address.wrapping_add(i as u64), byte.clone());
        }

        Ok(())
    }

    /// Load `length` 8-bit values starting at `address`.
    ///
    /// Fails with `Error::UnmappedRead` on the first byte which has never been
    /// written.
    pub fn load_bytes(&self, address: u64, length: usize) -> Result<Vec<Value>, Error> {
        (0..length)
            .map(|i| {
                let byte_address = address.wrapping_add(i as u64);
                self.load_cell(byte_address)
                    .cloned()
                    .ok_or(Error::UnmappedRead(byte_address))
            })
            .collect()
    }

    /// Store a value at the given address, laid out by this memory's
    /// endianness.
    ///
    /// The value must have a bit-width >= 8, and the bit-width must be evenly
    /// divisible by 8.
    pub fn store(&mut self, address: u64, value: &Value) -> Result<(), Error> {
        let bytes = value.to_bytes(&self.endian)?;
        self.store_bytes(address, &bytes)
    }

    /// Loads a value from the given address.
    ///
    /// `bits` must be >= 8, and evenly divisible by 8.
    pub fn load(&self, address: u64, bits: usize) -> Result<Value, Error> {
        if bits % 8 != 0 || bits == 0 {
            return Err(format!("Loading paged memory with invalid bit-width {}", bits).into());
        }
        let bytes = self.load_bytes(address, bits / 8)?;
        Value::from_bytes(&bytes, &self.endian)
    }
}

#[cfg(test)]
mod memory_tests {
    use crate::architecture::Endian;
    use crate::memory::paged::{Memory, PAGE_SIZE};
    use crate::memory::{MemoryPermissions, Value};
    use crate::Error;

    #[test]
    fn big_endian() {
        let mut memory = Memory::new(Endian::Big);

        let value = Value::concrete(0xAABBCCDD, 32);

        memory.store(0x100, &value).unwrap();

        assert_eq!(memory.load(0x100, 32).unwrap(), value);
        assert_eq!(memory.load(0x100, 8).unwrap(), Value::concrete(0xAA, 8));
        assert_eq!(memory.load(0x103, 8).unwrap(), Value::concrete(0xDD, 8));

        memory.store(0x102, &Value::concrete(0xFF, 8)).unwrap();

        assert_eq!(
            memory.load(0x100, 32).unwrap(),
            Value::concrete(0xAABBFFDD, 32)
        );

        memory.store(0x104, &Value::concrete(0x11223344, 32)).unwrap();

        assert_eq!(
            memory.load(0x101, 32).unwrap(),
            Value::concrete(0xBBFFDD11, 32)
        );
    }

    #[test]
    fn little_endian() {
        let mut memory = Memory::new(Endian::Little);

        memory.store(0x100, &Value::concrete(0xAABBCCDD, 32)).unwrap();
        memory.store(0x104, &Value::concrete(0x11223344, 32)).unwrap();

        assert_eq!(memory.load(0x100, 8).unwrap(), Value::concrete(0xDD, 8));
        assert_eq!(
            memory.load(0x101, 32).unwrap(),
            Value::concrete(0x44AABBCC, 32)
        );
    }

    #[test]
    fn crosses_pages() {
        let mut memory = Memory::new(Endian::Little);
        let address = PAGE_SIZE as u64 - 2;
        let bytes = Value::from_u8s(&[1, 2, 3, 4]);

        memory.store_bytes(address, &bytes).unwrap();

        assert_eq!(memory.load_bytes(address, 4).unwrap(), bytes);
        assert_eq!(memory.pages.len(), 2);
    }

    #[test]
    fn unmapped() {
        let mut memory = Memory::new(Endian::Little);
        memory.store_bytes(0x200, &Value::from_u8s(&[1, 2])).unwrap();

        match memory.load_bytes(0x200, 3) {
            Err(Error::UnmappedRead(address)) => assert_eq!(address, 0x202),
            _ => panic!("expected an unmapped read"),
        }
    }

    #[test]
    fn permissions() {
        let mut memory = Memory::new(Endian::Little);
        memory.set_permissions(0x1000, 0x10, MemoryPermissions::READ);

        let result = memory.store_bytes(0x0ffe, &Value::from_u8s(&[1, 2, 3, 4]));
        assert!(matches!(result, Err(Error::PermissionDenied(0x1000))));
        // nothing from the rejected write was stored
        assert!(memory.load_bytes(0x0ffe, 1).is_err());

        memory.store_bytes(0x0ffe, &Value::from_u8s(&[1, 2])).unwrap();
    }

    #[test]
    fn clones_do_not_share_writes() {
        let mut memory = Memory::new(Endian::Little);
        memory.store(0x100, &Value::concrete(0x41, 8)).unwrap();

        let mut fork = memory.clone();
        fork.store(0x100, &Value::concrete(0x42, 8)).unwrap();

        assert_eq!(memory.load(0x100, 8).unwrap(), Value::concrete(0x41, 8));
        assert_eq!(fork.load(0x100, 8).unwrap(), Value::concrete(0x42, 8));
    }
}
