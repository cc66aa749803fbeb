//! Building and inspecting LE advertising payloads.
//!
//! An advertising payload (or scan response payload) is a sequence of AD
//! structures, each framed as `length(1) | type(1) | data(length - 1)`. The
//! type codes come from the "Common Data Types" section of the [Bluetooth
//! Assigned Numbers][0] registry.
//!
//! [`Advertisement`] composes structures into a fixed buffer for
//! [`gap::AdvertisingConfig`](crate::gap::AdvertisingConfig);
//! [`AdStructures`] walks the structures of a payload received in a
//! [`device found`](crate::gap::GapEvent::DeviceFound) event.
//!
//! [0]: https://www.bluetooth.com/specifications/assigned-numbers/

use byteorder::{ByteOrder, LittleEndian};

/// AD type codes used by this module, from the Bluetooth Assigned Numbers
/// registry.
pub mod ad_type {
    /// Flags (Core Specification Supplement, Part A, Section 1.3).
    pub const FLAGS: u8 = 0x01;
    /// Complete List of 16-bit Service Class UUIDs.
    pub const COMPLETE_LIST_OF_16_BIT_SERVICE_UUIDS: u8 = 0x03;
    /// Shortened Local Name.
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    /// Complete Local Name.
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    /// Service Data - 16-bit UUID.
    pub const SERVICE_DATA_16_BIT_UUID: u8 = 0x16;
    /// Manufacturer Specific Data.
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;
}

/// Common values for the [`Flags`](Advertisement::Flags) AD structure.
pub mod flags {
    /// LE Limited Discoverable Mode.
    pub const LE_LIMITED_DISCOVERABLE: u8 = 0x01;
    /// LE General Discoverable Mode.
    pub const LE_GENERAL_DISCOVERABLE: u8 = 0x02;
    /// BR/EDR Not Supported.
    pub const BR_EDR_NOT_SUPPORTED: u8 = 0x04;
}

/// One AD structure, for composing an advertising payload.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Advertisement<'a> {
    /// Advertising flags. A connectable LE-only advertiser typically sends
    /// [`LE_GENERAL_DISCOVERABLE`](flags::LE_GENERAL_DISCOVERABLE) `|`
    /// [`BR_EDR_NOT_SUPPORTED`](flags::BR_EDR_NOT_SUPPORTED).
    Flags(u8),
    /// Shortened local name of the device.
    ShortenedLocalName(&'a str),
    /// Complete local name of the device.
    CompleteLocalName(&'a str),
    /// Complete list of 16-bit service class UUIDs.
    CompleteListOf16BitServiceUuids(&'a [u16]),
    /// Service data with a 16-bit UUID. The first parameter is the UUID, the
    /// second is the payload.
    ServiceData16BitUuid(u16, &'a [u8]),
    /// Manufacturer-specific data. The first parameter is the company
    /// identifier, the second is the payload.
    ManufacturerSpecificData(u16, &'a [u8]),
}

impl Advertisement<'_> {
    /// Gets the length of the encoded AD structure, in bytes.
    ///
    /// This includes the length byte itself.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        use Advertisement::*;
        2 + match self {
            Flags(_) => 1,
            ShortenedLocalName(n) | CompleteLocalName(n) => n.len(),
            CompleteListOf16BitServiceUuids(u) => 2 * u.len(),
            ServiceData16BitUuid(_, b) | ManufacturerSpecificData(_, b) => 2 + b.len(),
        }
    }

    const fn get_type(&self) -> u8 {
        use Advertisement::*;
        match self {
            Flags(_) => ad_type::FLAGS,
            ShortenedLocalName(_) => ad_type::SHORTENED_LOCAL_NAME,
            CompleteLocalName(_) => ad_type::COMPLETE_LOCAL_NAME,
            CompleteListOf16BitServiceUuids(_) => ad_type::COMPLETE_LIST_OF_16_BIT_SERVICE_UUIDS,
            ServiceData16BitUuid(_, _) => ad_type::SERVICE_DATA_16_BIT_UUID,
            ManufacturerSpecificData(_, _) => ad_type::MANUFACTURER_SPECIFIC_DATA,
        }
    }

    /// Serialize the AD structure into the given buffer, and return the
    /// number of bytes written.
    ///
    /// A whole legacy advertising payload is at most 31 bytes; the caller
    /// tracks the running total when composing several structures.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`Self::len()`].
    pub fn copy_into_slice(&self, bytes: &mut [u8]) -> usize {
        use Advertisement::*;
        let len = self.len();
        // Don't count the length byte.
        bytes[0] = (len - 1) as u8;
        bytes[1] = self.get_type();
        match self {
            Flags(f) => {
                bytes[2] = *f;
            }
            ShortenedLocalName(n) | CompleteLocalName(n) => {
                bytes[2..2 + n.len()].copy_from_slice(n.as_bytes());
            }
            CompleteListOf16BitServiceUuids(uuids) => {
                for (i, uuid) in uuids.iter().enumerate() {
                    LittleEndian::write_u16(&mut bytes[2 + 2 * i..], *uuid);
                }
            }
            ServiceData16BitUuid(u, b) | ManufacturerSpecificData(u, b) => {
                LittleEndian::write_u16(&mut bytes[2..], *u);
                bytes[4..4 + b.len()].copy_from_slice(b);
            }
        }
        len
    }
}

/// One AD structure as found in a received payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdStructure<'a> {
    /// AD type code of the structure.
    pub ad_type: u8,
    /// Raw data of the structure, after the type byte.
    pub data: &'a [u8],
}

/// Iterator over the AD structures of a raw advertising payload.
///
/// Iteration ends at the first zero length byte (early-termination padding)
/// or the moment the remaining bytes cannot hold the structure their length
/// byte declares.
#[derive(Copy, Clone, Debug)]
pub struct AdStructures<'a> {
    bytes: &'a [u8],
}

impl<'a> AdStructures<'a> {
    /// Starts walking the AD structures of `payload`.
    pub fn new(payload: &'a [u8]) -> AdStructures<'a> {
        AdStructures { bytes: payload }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<AdStructure<'a>> {
        let (&len, rest) = self.bytes.split_first()?;
        let len = len as usize;
        if len == 0 || rest.len() < len {
            self.bytes = &[];
            return None;
        }
        let structure = AdStructure {
            ad_type: rest[0],
            data: &rest[1..len],
        };
        self.bytes = &rest[len..];
        Some(structure)
    }
}

/// Finds the first AD structure of the given type in `payload`.
pub fn find(payload: &[u8], ad_type: u8) -> Option<&[u8]> {
    AdStructures::new(payload)
        .find(|s| s.ad_type == ad_type)
        .map(|s| s.data)
}

/// Extracts the advertised device name, preferring the complete local name
/// over the shortened one. Returns `None` if no name is advertised or the
/// name is not valid UTF-8.
pub fn local_name(payload: &[u8]) -> Option<&str> {
    find(payload, ad_type::COMPLETE_LOCAL_NAME)
        .or_else(|| find(payload, ad_type::SHORTENED_LOCAL_NAME))
        .and_then(|name| core::str::from_utf8(name).ok())
}
